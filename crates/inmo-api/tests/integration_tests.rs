//! Integration tests for the Inmo API.
//!
//! Every route is exercised through the full router with an in-memory
//! database and an in-process gateway. Each test builds its own state.

use std::io::Write;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use inmo_api::create_router;
use inmo_api::error::ErrorBody;
use inmo_api::handlers::{
    CacheClearedResponse, HealthResponse, LogsResponse, PropertiesResponse, ReloadResponse,
    StatusResponse,
};
use inmo_api::state::AppState;
use inmo_chat::{ChatReply, MetricsSnapshot, EXHAUSTED_MESSAGE};
use inmo_core::config::InmoConfig;
use inmo_core::types::{Listing, OperationKind, PropertyKind};
use inmo_gateway::FixedGateway;
use inmo_storage::Database;

// =============================================================================
// Helpers
// =============================================================================

fn catalog() -> Vec<Listing> {
    vec![
        Listing::new(
            "p1",
            "Depto 2 amb luminoso",
            "Palermo",
            180000.0,
            OperationKind::Sale,
            PropertyKind::Apartment,
        )
        .with_rooms(2)
        .with_area(50.0),
        Listing::new(
            "p2",
            "Depto con balcón",
            "Palermo",
            250000.0,
            OperationKind::Sale,
            PropertyKind::Apartment,
        )
        .with_rooms(3)
        .with_area(70.0),
        Listing::new(
            "b1",
            "Casa con jardín",
            "Belgrano",
            420000.0,
            OperationKind::Sale,
            PropertyKind::House,
        )
        .with_rooms(5)
        .with_area(200.0),
        Listing::new(
            "r1",
            "Monoambiente",
            "Almagro",
            400.0,
            OperationKind::Rental,
            PropertyKind::Apartment,
        )
        .with_rooms(1)
        .with_area(30.0),
    ]
}

/// Fresh state over an in-memory catalog, answering with `gateway`.
fn make_state_with(gateway: FixedGateway) -> AppState {
    let mut config = InmoConfig::default();
    config.storage.feed_path = None;
    let db = Arc::new(Database::in_memory().unwrap());
    let state = AppState::new(config, db, Arc::new(gateway));
    state.search.store().replace_all(&catalog()).unwrap();
    state
}

fn make_state() -> AppState {
    make_state_with(FixedGateway::replying("Encontré opciones para vos."))
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, json: &str) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(json.to_string()))
        .unwrap()
}

/// Read full response body bytes.
async fn body_bytes(resp: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .unwrap()
        .to_vec()
}

// =============================================================================
// Service info
// =============================================================================

#[tokio::test]
async fn test_health_happy_path() {
    let app = create_router(make_state());
    let resp = app.oneshot(get("/health")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let health: HealthResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(health.status, "healthy");
    assert_eq!(health.listings, 4);
    assert_eq!(health.cache_size, 0);
}

#[tokio::test]
async fn test_status_reports_gateway_ok() {
    let app = create_router(make_state_with(FixedGateway::replying("OK")));
    let resp = app.oneshot(get("/status")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let status: StatusResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(status.status, "operational");
    assert_eq!(status.gateway.name, "fixed");
    assert_eq!(status.gateway.status, "ok");
    assert!(status.gateway.error.is_none());
    assert_eq!(status.metrics.gateway_calls, 1);
    assert_eq!(status.metrics.total_requests, 0);
}

#[tokio::test]
async fn test_status_reports_gateway_failure() {
    let app = create_router(make_state_with(FixedGateway::exhausted()));
    let resp = app.oneshot(get("/status")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let status: StatusResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(status.status, "degraded");
    assert_eq!(status.gateway.status, "error");
    assert!(status.gateway.error.is_some());
}

#[tokio::test]
async fn test_status_rejects_unexpected_reply() {
    let app = create_router(make_state_with(FixedGateway::replying("hola")));
    let resp = app.oneshot(get("/status")).await.unwrap();

    let status: StatusResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(status.gateway.status, "error");
    assert!(status.gateway.error.unwrap().contains("hola"));
}

#[tokio::test]
async fn test_root_describes_usage() {
    let app = create_router(make_state());
    let resp = app.oneshot(get("/")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let json: Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(json["usage"]["endpoint"], "/chat");
    assert_eq!(json["usage"]["method"], "POST");
}

// =============================================================================
// Chat
// =============================================================================

#[tokio::test]
async fn test_chat_palermo_search() {
    let app = create_router(make_state());
    let resp = app
        .oneshot(post_json(
            "/chat",
            r#"{"message": "Busco departamento en Palermo hasta 200000"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let reply: ChatReply = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(reply.response, "Encontré opciones para vos.");
    assert!(reply.search_performed);
    assert_eq!(reply.results_count, Some(1));
    assert_eq!(reply.listings.unwrap()[0].id, "p1");
}

#[tokio::test]
async fn test_chat_spanish_request_fields() {
    let app = create_router(make_state());
    let resp = app
        .oneshot(post_json(
            "/chat",
            r#"{
                "message": "contame más del segundo",
                "channel": "whatsapp",
                "es_seguimiento": true,
                "contexto_anterior": {"resultados": [
                    {"id": "p1", "titulo": "Depto 2 amb luminoso", "barrio": "Palermo", "precio": 180000},
                    {"id": "p2", "titulo": "Depto con balcón", "barrio": "Palermo", "precio": 250000}
                ]}
            }"#,
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let reply: ChatReply = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert!(reply.search_performed);
    assert_eq!(reply.results_count, Some(2));
}

#[tokio::test]
async fn test_chat_empty_message_rejected() {
    let app = create_router(make_state());
    let resp = app
        .oneshot(post_json("/chat", r#"{"message": "   "}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: ErrorBody = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(body.error, "unprocessable_entity");
}

#[tokio::test]
async fn test_chat_too_long_message_rejected() {
    let app = create_router(make_state());
    let long = "a".repeat(1001);
    let resp = app
        .oneshot(post_json("/chat", &format!(r#"{{"message": "{}"}}"#, long)))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_chat_exhausted_gateway_still_answers() {
    let app = create_router(make_state_with(FixedGateway::exhausted()));
    let resp = app
        .oneshot(post_json("/chat", r#"{"message": "depto en palermo"}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let reply: ChatReply = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(reply.response, EXHAUSTED_MESSAGE);
    assert!(reply.search_performed);
}

// =============================================================================
// Listings
// =============================================================================

#[tokio::test]
async fn test_properties_default_lists_cheapest_first() {
    let app = create_router(make_state());
    let resp = app.oneshot(get("/properties")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body: PropertiesResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(body.total, 4);
    let ids: Vec<&str> = body.listings.iter().map(|l| l.id.as_str()).collect();
    assert_eq!(ids, vec!["r1", "p1", "p2", "b1"]);
}

#[tokio::test]
async fn test_properties_filters_and_aliases() {
    let app = create_router(make_state());
    let resp = app
        .oneshot(get("/properties?barrio=Palermo&min_rooms=3&limit=5"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body: PropertiesResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(body.total, 1);
    assert_eq!(body.listings[0].id, "p2");
    assert_eq!(body.filters.neighborhood.as_deref(), Some("palermo"));
}

#[tokio::test]
async fn test_properties_limit() {
    let app = create_router(make_state());
    let resp = app.oneshot(get("/properties?limit=2")).await.unwrap();
    let body: PropertiesResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(body.total, 2);
}

#[tokio::test]
async fn test_properties_invalid_range() {
    let app = create_router(make_state());
    let resp = app
        .oneshot(get("/properties?min_price=500&max_price=100"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_property_by_id() {
    let state = make_state();

    let resp = create_router(state.clone())
        .oneshot(get("/properties/b1"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let listing: Listing = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(listing.title, "Casa con jardín");

    let resp = create_router(state).oneshot(get("/properties/nope")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: ErrorBody = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(body.error, "not_found");
}

// =============================================================================
// Logs and metrics
// =============================================================================

#[tokio::test]
async fn test_logs_and_metrics_after_chat() {
    let state = make_state();

    for (message, channel) in [("hola", "web"), ("depto en palermo", "whatsapp")] {
        let resp = create_router(state.clone())
            .oneshot(post_json(
                "/chat",
                &format!(r#"{{"message": "{}", "channel": "{}"}}"#, message, channel),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let resp = create_router(state.clone()).oneshot(get("/logs")).await.unwrap();
    let logs: LogsResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(logs.total, 2);
    assert_eq!(logs.entries[0].user_message, "depto en palermo");

    let resp = create_router(state.clone())
        .oneshot(get("/logs?channel=web&limit=5"))
        .await
        .unwrap();
    let logs: LogsResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(logs.total, 1);
    assert_eq!(logs.entries[0].channel, "web");

    let resp = create_router(state).oneshot(get("/metrics")).await.unwrap();
    let snap: MetricsSnapshot = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(snap.total_requests, 2);
    assert_eq!(snap.successful_requests, 2);
    assert_eq!(snap.gateway_calls, 2);
    assert_eq!(snap.search_queries, 1);
    assert_eq!(snap.cache_size, 1);
}

// =============================================================================
// Administration
// =============================================================================

#[tokio::test]
async fn test_clear_cache() {
    let state = make_state();
    create_router(state.clone())
        .oneshot(get("/properties?barrio=palermo"))
        .await
        .unwrap();
    assert_eq!(state.search.cache().len(), 1);

    let resp = create_router(state.clone())
        .oneshot(Request::delete("/cache").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body: CacheClearedResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(body.message, "Cache limpiado correctamente");
    assert_eq!(body.cleared, 1);
    assert!(state.search.cache().is_empty());
}

#[tokio::test]
async fn test_reload_without_feed() {
    let app = create_router(make_state());
    let resp = app
        .oneshot(Request::post("/admin/reload").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_reload_from_feed() {
    let mut feed = tempfile::NamedTempFile::new().unwrap();
    feed.write_all(
        r#"[
            {"id_temporal": "n1", "titulo": "PH con terraza", "barrio": "Boedo", "operacion": "venta", "tipo": "ph", "precio": 150000},
            {"id_temporal": "n2", "titulo": "Casa", "barrio": "Flores", "operacion": "venta", "tipo": "casa", "precio": "210000"},
            {"id_temporal": "n3", "titulo": "Sin precio", "barrio": "Flores", "operacion": "venta", "tipo": "casa"}
        ]"#
        .as_bytes(),
    )
    .unwrap();

    let state = make_state().with_feed_path(Some(feed.path().to_path_buf()));
    let resp = create_router(state.clone())
        .oneshot(Request::post("/admin/reload").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let report: ReloadResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(report.total, 3);
    assert_eq!(report.loaded, 2);
    assert_eq!(report.skipped, 1);

    let resp = create_router(state).oneshot(get("/properties")).await.unwrap();
    let body: PropertiesResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    let ids: Vec<&str> = body.listings.iter().map(|l| l.id.as_str()).collect();
    assert_eq!(ids, vec!["n1", "n2"]);
}
