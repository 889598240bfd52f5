//! Listing store: filtered, price-ordered retrieval over the `listings` table.
//!
//! Query failures never reach the caller. They are logged and degrade to an
//! empty result, so a broken store looks like an empty catalog.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use rusqlite::types::{FromSql, ToSql};
use rusqlite::OptionalExtension;
use tracing::{debug, error, info, warn};

use inmo_core::error::InmoError;
use inmo_core::types::{CatalogFacets, FilterSet, Listing, LoadReport};

use crate::db::Database;
use crate::feed;

/// Default maximum number of listings returned by a query.
pub const DEFAULT_RESULT_LIMIT: u32 = 50;

const LISTING_COLUMNS: &str = "id, title, neighborhood, price, price_currency, rooms, area_sqm,
    description, operation, kind, address, age_years, condition, orientation, monthly_fee,
    monthly_fee_currency, amenities, garage, balcony, pool, pets_allowed, air_conditioning,
    media_info, documents, videos, photos, processed_at";

/// Repository for property listings.
pub struct ListingStore {
    db: Arc<Database>,
    result_limit: u32,
    reads: AtomicU64,
}

impl ListingStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self::with_result_limit(db, DEFAULT_RESULT_LIMIT)
    }

    pub fn with_result_limit(db: Arc<Database>, result_limit: u32) -> Self {
        Self {
            db,
            result_limit: result_limit.max(1),
            reads: AtomicU64::new(0),
        }
    }

    pub fn result_limit(&self) -> u32 {
        self.result_limit
    }

    /// Number of times a query touched the underlying table.
    pub fn store_reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Listings satisfying every present predicate, cheapest first, capped at
    /// the configured result limit. Storage errors yield an empty result.
    pub fn query(&self, filters: &FilterSet) -> Vec<Listing> {
        self.query_with_limit(filters, self.result_limit)
    }

    /// Like [`query`](Self::query) with a caller limit, clamped to the store's.
    pub fn query_with_limit(&self, filters: &FilterSet, limit: u32) -> Vec<Listing> {
        match self.try_query(filters, limit.min(self.result_limit)) {
            Ok(listings) => listings,
            Err(e) => {
                error!(error = %e, ?filters, "Listing query failed; returning no results");
                Vec::new()
            }
        }
    }

    /// Fallible query, for callers that want to see storage errors.
    pub fn try_query(&self, filters: &FilterSet, limit: u32) -> Result<Vec<Listing>, InmoError> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        let (sql, params) = build_query(filters, limit);
        debug!(%sql, "Listing query");

        self.db.with_conn(|conn| {
            let params_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();

            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| InmoError::Storage(format!("Listing query prepare: {}", e)))?;

            let rows = stmt
                .query_map(params_refs.as_slice(), |row| Ok(row_to_listing(row)))
                .map_err(|e| InmoError::Storage(format!("Listing query: {}", e)))?;

            let mut listings = Vec::new();
            for row in rows {
                let listing = row.map_err(|e| InmoError::Storage(e.to_string()))??;
                listings.push(listing);
            }
            Ok(listings)
        })
    }

    /// Find a listing by its identifier.
    pub fn find_by_id(&self, id: &str) -> Result<Option<Listing>, InmoError> {
        self.db.with_conn(|conn| {
            let sql = format!("SELECT {} FROM listings WHERE id = ?1", LISTING_COLUMNS);
            let result = conn
                .query_row(&sql, rusqlite::params![id], |row| Ok(row_to_listing(row)))
                .optional()
                .map_err(|e| InmoError::Storage(e.to_string()))?;
            result.transpose()
        })
    }

    /// Cheapest listing whose title contains `fragment` (case-insensitive).
    pub fn find_by_title(&self, fragment: &str) -> Result<Option<Listing>, InmoError> {
        let fragment = fragment.trim();
        if fragment.is_empty() {
            return Ok(None);
        }

        self.db.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM listings
                 WHERE fold_lower(title) LIKE fold_lower(?1) ESCAPE '\\'
                 ORDER BY price ASC, id ASC
                 LIMIT 1",
                LISTING_COLUMNS
            );
            let result = conn
                .query_row(&sql, rusqlite::params![like_pattern(fragment)], |row| {
                    Ok(row_to_listing(row))
                })
                .optional()
                .map_err(|e| InmoError::Storage(e.to_string()))?;
            result.transpose()
        })
    }

    /// Total number of listings.
    pub fn count(&self) -> Result<u64, InmoError> {
        self.db.with_conn(|conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM listings", [], |row| row.get(0))
                .map_err(|e| InmoError::Storage(e.to_string()))?;
            Ok(count as u64)
        })
    }

    /// Distinct lowercased neighborhoods, kinds and operations in the catalog.
    pub fn facets(&self) -> CatalogFacets {
        let result = self.db.with_conn(|conn| {
            Ok(CatalogFacets {
                neighborhoods: distinct_values(conn, "neighborhood")?,
                kinds: distinct_values(conn, "kind")?,
                operations: distinct_values(conn, "operation")?,
            })
        });

        result.unwrap_or_else(|e| {
            error!(error = %e, "Failed to read catalog facets");
            CatalogFacets::default()
        })
    }

    // -------------------------------------------------------------------------
    // Bulk load
    // -------------------------------------------------------------------------

    /// Replace the full listing set inside one transaction.
    ///
    /// Readers either see the old set or the new one, never a mix.
    pub fn replace_all(&self, listings: &[Listing]) -> Result<usize, InmoError> {
        self.db.with_conn(|conn| {
            let tx = conn
                .unchecked_transaction()
                .map_err(|e| InmoError::Storage(format!("Failed to begin reload: {}", e)))?;

            tx.execute("DELETE FROM listings", [])
                .map_err(|e| InmoError::Storage(format!("Failed to clear listings: {}", e)))?;

            {
                let mut stmt = tx
                    .prepare(
                        "INSERT OR REPLACE INTO listings (id, title, neighborhood, price,
                            price_currency, rooms, area_sqm, description, operation, kind,
                            address, age_years, condition, orientation, monthly_fee,
                            monthly_fee_currency, amenities, garage, balcony, pool,
                            pets_allowed, air_conditioning, media_info, documents, videos,
                            photos, processed_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                            ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27)",
                    )
                    .map_err(|e| InmoError::Storage(e.to_string()))?;

                for l in listings {
                    stmt.execute(rusqlite::params![
                        l.id,
                        l.title,
                        l.neighborhood,
                        l.price,
                        l.price_currency,
                        l.rooms,
                        l.area_sqm,
                        l.description,
                        l.operation,
                        l.kind,
                        l.address,
                        l.age_years,
                        l.condition,
                        l.orientation,
                        l.monthly_fee,
                        l.monthly_fee_currency,
                        l.amenities,
                        l.garage,
                        l.balcony,
                        l.pool,
                        l.pets_allowed,
                        l.air_conditioning,
                        l.media_info,
                        serde_json::to_string(&l.documents)?,
                        serde_json::to_string(&l.videos)?,
                        serde_json::to_string(&l.photos)?,
                        l.processed_at.timestamp(),
                    ])
                    .map_err(|e| {
                        InmoError::Storage(format!("Failed to insert listing {}: {}", l.id, e))
                    })?;
                }
            }

            tx.commit()
                .map_err(|e| InmoError::Storage(format!("Failed to commit reload: {}", e)))?;
            Ok(listings.len())
        })
    }

    /// Parse a feed document and replace the store with its valid records.
    pub fn load_records(&self, raw: &str) -> Result<LoadReport, InmoError> {
        self.load_parsed(feed::parse_feed(raw)?)
    }

    /// Read a feed file and replace the store with its valid records.
    pub fn load_feed(&self, path: &Path) -> Result<LoadReport, InmoError> {
        self.load_parsed(feed::read_feed(path)?)
    }

    fn load_parsed(&self, parsed: feed::ParsedFeed) -> Result<LoadReport, InmoError> {
        if parsed.listings.is_empty() {
            warn!(total = parsed.total, "Feed has no valid listings; store will be empty");
        }

        let loaded = self.replace_all(&parsed.listings)?;
        let report = LoadReport {
            total: parsed.total,
            loaded,
            skipped: parsed.skipped,
        };
        info!(
            total = report.total,
            loaded = report.loaded,
            skipped = report.skipped,
            "Listings feed loaded"
        );
        Ok(report)
    }

    /// Startup initialization: bulk-load the feed when the store is empty.
    ///
    /// Failures leave the store empty and are logged as a degraded state.
    pub fn initialize(&self, feed_path: Option<&Path>) -> Option<LoadReport> {
        match self.count() {
            Ok(0) => {}
            Ok(count) => {
                info!(count, "Listing store ready");
                return None;
            }
            Err(e) => {
                error!(error = %e, "Listing store unavailable; running degraded");
                return None;
            }
        }

        let Some(path) = feed_path else {
            warn!("Listing store is empty and no feed is configured");
            return None;
        };

        match self.load_feed(path) {
            Ok(report) => Some(report),
            Err(e) => {
                error!(
                    error = %e,
                    feed = %path.display(),
                    "Initial listings load failed; running degraded with an empty store"
                );
                None
            }
        }
    }
}

impl std::fmt::Debug for ListingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListingStore")
            .field("result_limit", &self.result_limit)
            .field("reads", &self.store_reads())
            .finish()
    }
}

// ============================================================================
// Query building
// ============================================================================

/// Escape LIKE wildcards and wrap in `%...%`.
fn like_pattern(value: &str) -> String {
    let escaped = value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// Build the SELECT for a filter set: conjunctive predicates, text as
/// case-insensitive substring, numeric bounds inclusive, price ascending.
pub(crate) fn build_query(filters: &FilterSet, limit: u32) -> (String, Vec<Box<dyn ToSql>>) {
    let f = filters.normalized();
    let mut clauses: Vec<&str> = Vec::new();
    let mut params: Vec<Box<dyn ToSql>> = Vec::new();

    let text_predicates = [
        ("fold_lower(neighborhood) LIKE fold_lower(?) ESCAPE '\\'", f.neighborhood),
        ("fold_lower(operation) LIKE fold_lower(?) ESCAPE '\\'", f.operation),
        ("fold_lower(kind) LIKE fold_lower(?) ESCAPE '\\'", f.kind),
    ];
    for (clause, value) in text_predicates {
        if let Some(v) = value {
            clauses.push(clause);
            params.push(Box::new(like_pattern(&v)));
        }
    }

    let numeric_predicates = [
        ("price >= ?", f.min_price),
        ("price <= ?", f.max_price),
        ("rooms >= ?", f.min_rooms.map(f64::from)),
        ("area_sqm >= ?", f.min_area),
        ("area_sqm <= ?", f.max_area),
    ];
    for (clause, value) in numeric_predicates {
        if let Some(v) = value {
            clauses.push(clause);
            params.push(Box::new(v));
        }
    }

    let mut sql = format!("SELECT {} FROM listings", LISTING_COLUMNS);
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY price ASC, id ASC LIMIT ?");
    params.push(Box::new(i64::from(limit)));

    (sql, params)
}

fn distinct_values(conn: &rusqlite::Connection, column: &str) -> Result<Vec<String>, InmoError> {
    let sql = format!(
        "SELECT DISTINCT fold_lower({col}) FROM listings WHERE {col} != '' ORDER BY 1",
        col = column
    );
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| InmoError::Storage(e.to_string()))?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(|e| InmoError::Storage(e.to_string()))?;

    let mut values = Vec::new();
    for row in rows {
        values.push(row.map_err(|e| InmoError::Storage(e.to_string()))?);
    }
    Ok(values)
}

// ============================================================================
// Row conversion
// ============================================================================

fn col<T: FromSql>(row: &rusqlite::Row<'_>, idx: usize) -> Result<T, InmoError> {
    row.get(idx).map_err(|e| InmoError::Storage(e.to_string()))
}

fn uri_column(row: &rusqlite::Row<'_>, idx: usize) -> Result<Vec<String>, InmoError> {
    let raw: String = col(row, idx)?;
    Ok(serde_json::from_str(&raw).unwrap_or_default())
}

fn row_to_listing(row: &rusqlite::Row<'_>) -> Result<Listing, InmoError> {
    let processed_at: i64 = col(row, 26)?;

    Ok(Listing {
        id: col(row, 0)?,
        title: col(row, 1)?,
        neighborhood: col(row, 2)?,
        price: col(row, 3)?,
        price_currency: col(row, 4)?,
        rooms: col(row, 5)?,
        area_sqm: col(row, 6)?,
        description: col(row, 7)?,
        operation: col(row, 8)?,
        kind: col(row, 9)?,
        address: col(row, 10)?,
        age_years: col(row, 11)?,
        condition: col(row, 12)?,
        orientation: col(row, 13)?,
        monthly_fee: col(row, 14)?,
        monthly_fee_currency: col(row, 15)?,
        amenities: col(row, 16)?,
        garage: col(row, 17)?,
        balcony: col(row, 18)?,
        pool: col(row, 19)?,
        pets_allowed: col(row, 20)?,
        air_conditioning: col(row, 21)?,
        media_info: col(row, 22)?,
        documents: uri_column(row, 23)?,
        videos: uri_column(row, 24)?,
        photos: uri_column(row, 25)?,
        processed_at: Utc
            .timestamp_opt(processed_at, 0)
            .single()
            .unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use inmo_core::types::{OperationKind, PropertyKind};
    use serde_json::json;

    fn make_store() -> ListingStore {
        ListingStore::new(Arc::new(Database::in_memory().unwrap()))
    }

    fn listing(id: &str, neighborhood: &str, price: f64) -> Listing {
        Listing::new(
            id,
            format!("Departamento en {}", neighborhood),
            neighborhood,
            price,
            OperationKind::Sale,
            PropertyKind::Apartment,
        )
        .with_rooms(2)
        .with_area(50.0)
    }

    fn seeded_store() -> ListingStore {
        let store = make_store();
        let mut casa = listing("c1", "Belgrano", 400000.0).with_rooms(5).with_area(200.0);
        casa.kind = "casa".to_string();
        casa.title = "Casa con jardín".to_string();
        let mut rental = listing("r1", "Palermo", 900.0);
        rental.operation = "alquiler".to_string();

        store
            .replace_all(&[
                listing("p1", "Palermo", 250000.0),
                listing("p2", "Palermo", 400000.0).with_rooms(3),
                listing("v1", "Villa Crespo", 120000.0),
                casa,
                rental,
            ])
            .unwrap();
        store
    }

    #[test]
    fn test_empty_filters_sorted_and_limited() {
        let store = ListingStore::with_result_limit(
            Arc::new(Database::in_memory().unwrap()),
            DEFAULT_RESULT_LIMIT,
        );
        let batch: Vec<Listing> = (0..60)
            .map(|i| listing(&format!("id-{}", i), "Recoleta", ((i * 7919) % 1000) as f64))
            .collect();
        store.replace_all(&batch).unwrap();

        let results = store.query(&FilterSet::default());
        assert_eq!(results.len(), 50);
        assert!(results.windows(2).all(|w| w[0].price <= w[1].price));
    }

    #[test]
    fn test_results_satisfy_every_predicate() {
        let store = seeded_store();
        let filter_sets = vec![
            FilterSet {
                neighborhood: Some("PALERMO".to_string()),
                ..Default::default()
            },
            FilterSet {
                operation: Some("venta".to_string()),
                min_rooms: Some(3),
                ..Default::default()
            },
            FilterSet {
                kind: Some("dep".to_string()),
                min_price: Some(120000.0),
                max_price: Some(250000.0),
                ..Default::default()
            },
            FilterSet {
                min_area: Some(50.0),
                max_area: Some(50.0),
                ..Default::default()
            },
        ];

        for filters in filter_sets {
            let results = store.query(&filters);
            assert!(!results.is_empty(), "no results for {:?}", filters);
            for l in &results {
                assert!(filters.matches(l), "{} violates {:?}", l.id, filters);
            }
        }
    }

    #[test]
    fn test_inclusive_bounds() {
        let store = seeded_store();
        let filters = FilterSet {
            min_price: Some(120000.0),
            max_price: Some(250000.0),
            ..Default::default()
        };
        let ids: Vec<String> = store.query(&filters).into_iter().map(|l| l.id).collect();
        assert_eq!(ids, vec!["v1", "p1"]);
    }

    #[test]
    fn test_palermo_under_300k() {
        let store = seeded_store();
        let filters = FilterSet {
            neighborhood: Some("palermo".to_string()),
            max_price: Some(300000.0),
            operation: Some("venta".to_string()),
            ..Default::default()
        };
        let results = store.query(&filters);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].price, 250000.0);
    }

    #[test]
    fn test_non_ascii_text_is_case_insensitive() {
        let store = make_store();
        let mut upper = listing("n1", "NUÑEZ", 180000.0);
        upper.title = "DÚPLEX EN NUÑEZ".to_string();
        store.replace_all(&[upper, listing("b1", "Belgrano", 90000.0)]).unwrap();

        let filters = FilterSet {
            neighborhood: Some("nuñez".to_string()),
            ..Default::default()
        };
        let results = store.query(&filters);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "n1");
        assert!(filters.matches(&results[0]));

        assert_eq!(store.find_by_title("dúplex").unwrap().unwrap().id, "n1");
        assert_eq!(store.facets().neighborhoods, vec!["belgrano", "nuñez"]);
    }

    #[test]
    fn test_like_wildcards_are_literal() {
        let store = seeded_store();
        let filters = FilterSet {
            neighborhood: Some("%".to_string()),
            ..Default::default()
        };
        assert!(store.query(&filters).is_empty());
    }

    #[test]
    fn test_caller_limit_clamped() {
        let store = ListingStore::with_result_limit(Arc::new(Database::in_memory().unwrap()), 2);
        store
            .replace_all(&[
                listing("a", "Boedo", 1.0),
                listing("b", "Boedo", 2.0),
                listing("c", "Boedo", 3.0),
            ])
            .unwrap();
        assert_eq!(store.query_with_limit(&FilterSet::default(), 10).len(), 2);
        assert_eq!(store.query_with_limit(&FilterSet::default(), 1).len(), 1);
    }

    #[test]
    fn test_store_reads_counter() {
        let store = seeded_store();
        assert_eq!(store.store_reads(), 0);
        store.query(&FilterSet::default());
        store.query(&FilterSet::default());
        assert_eq!(store.store_reads(), 2);
    }

    #[test]
    fn test_replace_all_is_full_replace() {
        let store = seeded_store();
        assert_eq!(store.count().unwrap(), 5);

        store.replace_all(&[listing("n1", "Flores", 10.0)]).unwrap();
        assert_eq!(store.count().unwrap(), 1);
        assert!(store.find_by_id("p1").unwrap().is_none());
    }

    #[test]
    fn test_round_trip_extras() {
        let store = make_store();
        let mut l = listing("x1", "Nuñez", 99000.0);
        l.photos = vec!["https://a".to_string(), "https://b".to_string()];
        l.garage = Some("si".to_string());
        l.monthly_fee = Some(30000.0);
        l.age_years = Some(12);
        store.replace_all(std::slice::from_ref(&l)).unwrap();

        let found = store.find_by_id("x1").unwrap().unwrap();
        assert_eq!(found.photos, l.photos);
        assert_eq!(found.garage.as_deref(), Some("si"));
        assert_eq!(found.monthly_fee, Some(30000.0));
        assert_eq!(found.age_years, Some(12));
        assert_eq!(found.processed_at.timestamp(), l.processed_at.timestamp());
    }

    #[test]
    fn test_find_by_title() {
        let store = seeded_store();
        assert_eq!(store.find_by_title("CASA CON").unwrap().unwrap().id, "c1");
        // Cheapest match wins.
        assert_eq!(store.find_by_title("palermo").unwrap().unwrap().id, "r1");
        assert!(store.find_by_title("mansión").unwrap().is_none());
        assert!(store.find_by_title("   ").unwrap().is_none());
    }

    #[test]
    fn test_facets() {
        let store = seeded_store();
        let facets = store.facets();
        assert_eq!(facets.neighborhoods, vec!["belgrano", "palermo", "villa crespo"]);
        assert_eq!(facets.kinds, vec!["casa", "departamento"]);
        assert_eq!(facets.operations, vec!["alquiler", "venta"]);
    }

    #[test]
    fn test_load_records_skips_missing_price() {
        let store = make_store();
        let feed = json!([
            {"titulo": "A", "barrio": "Palermo", "precio": 100, "operacion": "venta", "tipo": "casa"},
            {"titulo": "B", "barrio": "Palermo", "operacion": "venta", "tipo": "casa"},
            {"titulo": "C", "barrio": "Boedo", "precio": "300", "operacion": "alquiler", "tipo": "ph"},
        ]);

        let report = store.load_records(&feed.to_string()).unwrap();
        assert_eq!(report.total, 3);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.loaded, report.total - report.skipped);
        assert_eq!(store.count().unwrap(), 2);

        let titles: Vec<String> = store
            .query(&FilterSet::default())
            .into_iter()
            .map(|l| l.title)
            .collect();
        assert_eq!(titles, vec!["A", "C"]);
    }

    #[test]
    fn test_initialize_loads_when_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("properties.json");
        let feed = json!([
            {"titulo": "A", "barrio": "Palermo", "precio": 1, "operacion": "venta", "tipo": "casa"}
        ]);
        std::fs::write(&path, feed.to_string()).unwrap();

        let store = make_store();
        let report = store.initialize(Some(&path)).unwrap();
        assert_eq!(report.loaded, 1);

        // Second call sees a populated store and does nothing.
        assert!(store.initialize(Some(&path)).is_none());
    }

    #[test]
    fn test_initialize_degrades_on_bad_feed() {
        let store = make_store();
        assert!(store
            .initialize(Some(Path::new("/missing/properties.json")))
            .is_none());
        assert_eq!(store.count().unwrap(), 0);
        assert!(store.query(&FilterSet::default()).is_empty());
    }

    #[test]
    fn test_build_query_shape() {
        let filters = FilterSet {
            neighborhood: Some(" Palermo ".to_string()),
            max_price: Some(1.0),
            ..Default::default()
        };
        let (sql, params) = build_query(&filters, 50);
        assert!(sql.contains("fold_lower(neighborhood) LIKE fold_lower(?)"));
        assert!(sql.contains("price <= ?"));
        assert!(sql.ends_with("ORDER BY price ASC, id ASC LIMIT ?"));
        assert_eq!(params.len(), 3);
    }
}
