//! Database connection management.
//!
//! Wraps a single rusqlite Connection in a Mutex for thread-safe access.
//! Configures WAL mode on initialization, registers the SQL helper
//! functions and applies the schema.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;
use tracing::info;

use inmo_core::error::InmoError;

use crate::migrations;

/// Thread-safe SQLite database wrapper.
///
/// Holds both the listings table and the conversation log. The connection
/// is wrapped in a Mutex since rusqlite Connection is not Sync.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a database at the given path.
    ///
    /// Creates the parent directory, configures WAL mode and
    /// synchronous=NORMAL, then runs all pending migrations.
    pub fn new(path: &Path) -> Result<Self, InmoError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .map_err(|e| InmoError::Storage(format!("Failed to open database: {}", e)))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -16384;",
        )
        .map_err(|e| InmoError::Storage(format!("Failed to set pragmas: {}", e)))?;

        register_functions(&conn)?;
        info!("Database opened at {}", path.display());

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.with_conn(migrations::run_migrations)?;

        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn in_memory() -> Result<Self, InmoError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| InmoError::Storage(format!("Failed to open in-memory db: {}", e)))?;
        register_functions(&conn)?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.with_conn(migrations::run_migrations)?;

        Ok(db)
    }

    /// Execute a closure with a reference to the underlying connection.
    ///
    /// The mutex is held for the duration of the closure, so a transaction
    /// opened inside it is never interleaved with another caller's reads.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, InmoError>
    where
        F: FnOnce(&Connection) -> Result<T, InmoError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| InmoError::Storage(format!("Database lock poisoned: {}", e)))?;
        f(&conn)
    }
}

/// Register `fold_lower(text)`, a Unicode-aware lowercase. SQLite's own
/// `LOWER` only folds ASCII, so "NUÑEZ" would never match "nuñez".
fn register_functions(conn: &Connection) -> Result<(), InmoError> {
    conn.create_scalar_function(
        "fold_lower",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text = ctx.get::<Option<String>>(0)?;
            Ok(text.map(|t| t.to_lowercase()))
        },
    )
    .map_err(|e| InmoError::Storage(format!("Failed to register SQL functions: {}", e)))
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish()
    }
}
