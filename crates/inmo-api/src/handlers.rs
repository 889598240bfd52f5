//! Route handler functions for all API endpoints.
//!
//! Each handler extracts query/path parameters via axum extractors,
//! interacts with AppState services, and returns JSON responses.

use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use inmo_chat::{ChatReply, ChatRequest, MetricsSnapshot};
use inmo_core::types::{ConversationEntry, FilterSet, Listing};

use crate::error::ApiError;
use crate::state::AppState;

const DEFAULT_PROPERTIES_LIMIT: usize = 20;
const DEFAULT_LOGS_LIMIT: usize = 10;
const MAX_LOGS_LIMIT: usize = 500;
const STATUS_PROMPT: &str = "Respondé solo con OK";

// =============================================================================
// Query parameter types
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct PropertyParams {
    #[serde(alias = "barrio")]
    pub neighborhood: Option<String>,
    #[serde(alias = "precio_min")]
    pub min_price: Option<f64>,
    #[serde(alias = "precio_max")]
    pub max_price: Option<f64>,
    #[serde(alias = "ambientes")]
    pub min_rooms: Option<u32>,
    #[serde(alias = "operacion")]
    pub operation: Option<String>,
    #[serde(alias = "tipo")]
    pub kind: Option<String>,
    pub min_area: Option<f64>,
    pub max_area: Option<f64>,
    pub limit: Option<usize>,
}

impl PropertyParams {
    fn filters(&self) -> FilterSet {
        FilterSet {
            neighborhood: self.neighborhood.clone(),
            min_price: self.min_price,
            max_price: self.max_price,
            min_rooms: self.min_rooms,
            operation: self.operation.clone(),
            kind: self.kind.clone(),
            min_area: self.min_area,
            max_area: self.max_area,
        }
        .normalized()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LogParams {
    pub limit: Option<usize>,
    pub channel: Option<String>,
}

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct PropertiesResponse {
    pub listings: Vec<Listing>,
    pub total: usize,
    pub filters: FilterSet,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LogsResponse {
    pub entries: Vec<ConversationEntry>,
    pub total: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CacheClearedResponse {
    pub message: String,
    pub cleared: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReloadResponse {
    pub total: usize,
    pub loaded: usize,
    pub skipped: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub listings: u64,
    pub cache_size: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GatewayStatus {
    pub name: String,
    /// "ok" when the test completion answered as asked, "error" otherwise.
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub latency_ms: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub gateway: GatewayStatus,
    pub metrics: MetricsSnapshot,
}

// =============================================================================
// Chat
// =============================================================================

/// POST /chat - run one conversational exchange.
pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatReply>, ApiError> {
    let reply = state.chat.handle(&request).await?;
    Ok(Json(reply))
}

// =============================================================================
// Listings
// =============================================================================

/// GET /properties - direct filtered search, cheapest first.
pub async fn properties(
    State(state): State<AppState>,
    Query(params): Query<PropertyParams>,
) -> Result<Json<PropertiesResponse>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_PROPERTIES_LIMIT);
    if limit == 0 {
        return Err(ApiError::BadRequest("limit must be at least 1".to_string()));
    }
    if let (Some(min), Some(max)) = (params.min_price, params.max_price) {
        if min > max {
            return Err(ApiError::BadRequest(
                "min_price cannot exceed max_price".to_string(),
            ));
        }
    }

    let filters = params.filters();
    state.metrics.record_search();
    let listings = state.search.search_limited(&filters, limit);

    Ok(Json(PropertiesResponse {
        total: listings.len(),
        listings,
        filters,
    }))
}

/// GET /properties/{id} - one listing by id.
pub async fn property(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Listing>, ApiError> {
    state
        .search
        .store()
        .find_by_id(&id)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Listing {} not found", id)))
}

// =============================================================================
// Conversation log and metrics
// =============================================================================

/// GET /logs - most recent exchanges, newest first.
pub async fn logs(
    State(state): State<AppState>,
    Query(params): Query<LogParams>,
) -> Json<LogsResponse> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_LOGS_LIMIT)
        .clamp(1, MAX_LOGS_LIMIT);
    let channel = params
        .channel
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());

    let entries = state.log.recent_entries(channel, limit);
    Json(LogsResponse {
        total: entries.len(),
        entries,
    })
}

/// GET /metrics - request counters and cache size.
pub async fn metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot(state.search.cache().len()))
}

// =============================================================================
// Administration
// =============================================================================

/// DELETE /cache - drop every cached search result.
pub async fn clear_cache(State(state): State<AppState>) -> Json<CacheClearedResponse> {
    let cleared = state.search.cache().clear();
    tracing::info!(cleared, "Query cache cleared on request");
    Json(CacheClearedResponse {
        message: "Cache limpiado correctamente".to_string(),
        cleared,
    })
}

/// POST /admin/reload - replace the catalog from the configured feed.
pub async fn reload(State(state): State<AppState>) -> Result<Json<ReloadResponse>, ApiError> {
    let path = state.feed_path.clone().ok_or_else(|| {
        ApiError::ServiceUnavailable("No listings feed configured".to_string())
    })?;

    let search = state.search.clone();
    let report = tokio::task::spawn_blocking(move || search.reload(&path))
        .await
        .map_err(|e| ApiError::Internal(format!("Reload task failed: {}", e)))??;

    Ok(Json(ReloadResponse {
        total: report.total,
        loaded: report.loaded,
        skipped: report.skipped,
    }))
}

// =============================================================================
// Service info
// =============================================================================

/// GET /health - health check.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let listings = state.search.store().count().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to count listings");
        0
    });

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        listings,
        cache_size: state.search.cache().len(),
    })
}

/// GET /status - live gateway check plus request counters.
///
/// Sends one short completion upstream, so it costs a real gateway call.
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let started = Instant::now();
    state.metrics.record_gateway_call();
    let outcome = state.gateway.complete(STATUS_PROMPT).await;
    let latency_ms = started.elapsed().as_millis() as u64;

    let error = match outcome {
        Ok(reply) if reply.to_uppercase().contains("OK") => None,
        Ok(reply) => Some(format!("unexpected reply: {}", reply.trim())),
        Err(e) => {
            tracing::warn!(
                gateway = state.gateway.name(),
                error = %e,
                "Gateway status check failed"
            );
            Some(e.to_string())
        }
    };

    Json(StatusResponse {
        status: if error.is_none() { "operational" } else { "degraded" }.to_string(),
        gateway: GatewayStatus {
            name: state.gateway.name().to_string(),
            status: if error.is_none() { "ok" } else { "error" }.to_string(),
            error,
            latency_ms,
        },
        metrics: state.metrics.snapshot(state.search.cache().len()),
    })
}

/// GET / - service description and usage.
pub async fn root() -> Json<Value> {
    Json(json!({
        "service": "inmo",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "POST /chat": "Conversational property search",
            "GET /properties": "Direct search (neighborhood, min_price, max_price, min_rooms, operation, kind, min_area, max_area, limit)",
            "GET /properties/{id}": "One listing by id",
            "GET /logs": "Recent exchanges (limit, channel)",
            "GET /metrics": "Request counters",
            "DELETE /cache": "Clear cached search results",
            "POST /admin/reload": "Reload the listings feed",
            "GET /health": "Health check",
            "GET /status": "Live gateway check and request counters"
        },
        "usage": {
            "endpoint": "/chat",
            "method": "POST",
            "body": {
                "message": "Busco departamento en Palermo hasta 200000",
                "channel": "web"
            }
        }
    }))
}
