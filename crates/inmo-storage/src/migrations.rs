//! Database schema migrations.
//!
//! Applies the canonical schema: the `listings` table, the append-only
//! `conversation_log` table, and the `schema_migrations` tracker.

use rusqlite::Connection;
use tracing::info;

use inmo_core::error::InmoError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), InmoError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| InmoError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| InmoError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: initial_schema");
    }

    Ok(())
}

/// Version 1: listings and conversation log.
fn apply_v1(conn: &Connection) -> Result<(), InmoError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS listings (
            id                   TEXT PRIMARY KEY NOT NULL,
            title                TEXT NOT NULL,
            neighborhood         TEXT NOT NULL,
            price                REAL NOT NULL CHECK (price >= 0),
            price_currency       TEXT NOT NULL DEFAULT 'USD',
            rooms                INTEGER NOT NULL DEFAULT 0 CHECK (rooms >= 0),
            area_sqm             REAL NOT NULL DEFAULT 0 CHECK (area_sqm >= 0),
            description          TEXT NOT NULL DEFAULT '',
            operation            TEXT NOT NULL,
            kind                 TEXT NOT NULL,
            address              TEXT,
            age_years            INTEGER,
            condition            TEXT,
            orientation          TEXT,
            monthly_fee          REAL,
            monthly_fee_currency TEXT NOT NULL DEFAULT 'ARS',
            amenities            TEXT,
            garage               TEXT,
            balcony              TEXT,
            pool                 TEXT,
            pets_allowed         TEXT,
            air_conditioning     TEXT,
            media_info           TEXT,
            documents            TEXT NOT NULL DEFAULT '[]',
            videos               TEXT NOT NULL DEFAULT '[]',
            photos               TEXT NOT NULL DEFAULT '[]',
            processed_at         INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_listings_price
            ON listings (price ASC);

        CREATE INDEX IF NOT EXISTS idx_listings_neighborhood
            ON listings (neighborhood);

        CREATE TABLE IF NOT EXISTS conversation_log (
            id                INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp         INTEGER NOT NULL,
            channel           TEXT NOT NULL,
            user_message      TEXT NOT NULL,
            bot_response      TEXT NOT NULL,
            response_time     REAL NOT NULL DEFAULT 0,
            search_performed  INTEGER NOT NULL DEFAULT 0,
            results_count     INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_conversation_channel
            ON conversation_log (channel, id DESC);

        INSERT OR IGNORE INTO schema_migrations (version, name) VALUES (1, 'initial_schema');
        ",
    )
    .map_err(|e| InmoError::Storage(format!("Failed to apply migration v1: {}", e)))?;

    Ok(())
}
