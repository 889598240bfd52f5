//! Append-only conversation log with per-channel recent-context reads.
//!
//! Failures are logged and converted to empty/absent results so that a
//! logging problem never aborts the exchange that produced it.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use rusqlite::types::ToSql;
use rusqlite::OptionalExtension;
use tracing::error;

use inmo_core::error::InmoError;
use inmo_core::types::ConversationEntry;

use crate::db::Database;

/// Repository for chat exchanges.
pub struct ConversationLog {
    db: Arc<Database>,
}

impl ConversationLog {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Record an exchange. Errors are logged, not returned.
    pub fn append(&self, entry: &ConversationEntry) {
        if let Err(e) = self.try_append(entry) {
            error!(error = %e, channel = %entry.channel, "Failed to record conversation");
        }
    }

    /// Record an exchange and return its row id.
    pub fn try_append(&self, entry: &ConversationEntry) -> Result<i64, InmoError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO conversation_log (timestamp, channel, user_message, bot_response,
                    response_time, search_performed, results_count)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    entry.timestamp.timestamp(),
                    entry.channel,
                    entry.user_message,
                    entry.bot_response,
                    entry.response_time,
                    entry.search_performed as i32,
                    entry.results_count,
                ],
            )
            .map_err(|e| InmoError::Storage(format!("Failed to append conversation: {}", e)))?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// The last `limit` user messages on `channel`, oldest first.
    pub fn recent_messages(&self, channel: &str, limit: usize) -> Vec<String> {
        let result = self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT user_message FROM conversation_log
                     WHERE channel = ?1
                     ORDER BY id DESC
                     LIMIT ?2",
                )
                .map_err(|e| InmoError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(rusqlite::params![channel, limit as i64], |row| {
                    row.get::<_, String>(0)
                })
                .map_err(|e| InmoError::Storage(e.to_string()))?;

            let mut messages = Vec::new();
            for row in rows {
                messages.push(row.map_err(|e| InmoError::Storage(e.to_string()))?);
            }
            messages.reverse();
            Ok(messages)
        });

        result.unwrap_or_else(|e| {
            error!(error = %e, channel, "Failed to read recent messages");
            Vec::new()
        })
    }

    /// The most recent generated response on `channel`.
    pub fn last_response(&self, channel: &str) -> Option<String> {
        let result = self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT bot_response FROM conversation_log
                 WHERE channel = ?1
                 ORDER BY id DESC
                 LIMIT 1",
                rusqlite::params![channel],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(|e| InmoError::Storage(e.to_string()))
        });

        result.unwrap_or_else(|e| {
            error!(error = %e, channel, "Failed to read last response");
            None
        })
    }

    /// Newest-first entries, optionally restricted to one channel.
    pub fn recent_entries(&self, channel: Option<&str>, limit: usize) -> Vec<ConversationEntry> {
        let result = self.db.with_conn(|conn| {
            let (sql, params_vec): (&str, Vec<Box<dyn ToSql>>) = match channel {
                Some(ch) => (
                    "SELECT id, timestamp, channel, user_message, bot_response, response_time,
                            search_performed, results_count
                     FROM conversation_log
                     WHERE channel = ?1
                     ORDER BY id DESC
                     LIMIT ?2",
                    vec![
                        Box::new(ch.to_string()) as Box<dyn ToSql>,
                        Box::new(limit as i64),
                    ],
                ),
                None => (
                    "SELECT id, timestamp, channel, user_message, bot_response, response_time,
                            search_performed, results_count
                     FROM conversation_log
                     ORDER BY id DESC
                     LIMIT ?1",
                    vec![Box::new(limit as i64) as Box<dyn ToSql>],
                ),
            };
            let params_refs: Vec<&dyn ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();

            let mut stmt = conn
                .prepare(sql)
                .map_err(|e| InmoError::Storage(format!("Log query prepare: {}", e)))?;

            let rows = stmt
                .query_map(params_refs.as_slice(), |row| {
                    let timestamp: i64 = row.get(1)?;
                    let search_performed: i32 = row.get(6)?;
                    Ok(ConversationEntry {
                        id: Some(row.get(0)?),
                        timestamp: Utc
                            .timestamp_opt(timestamp, 0)
                            .single()
                            .unwrap_or_default(),
                        channel: row.get(2)?,
                        user_message: row.get(3)?,
                        bot_response: row.get(4)?,
                        response_time: row.get(5)?,
                        search_performed: search_performed != 0,
                        results_count: row.get(7)?,
                    })
                })
                .map_err(|e| InmoError::Storage(format!("Log query: {}", e)))?;

            let mut entries = Vec::new();
            for row in rows {
                entries.push(row.map_err(|e| InmoError::Storage(e.to_string()))?);
            }
            Ok(entries)
        });

        result.unwrap_or_else(|e| {
            error!(error = %e, "Failed to read conversation log");
            Vec::new()
        })
    }

    /// Total number of recorded exchanges.
    pub fn count(&self) -> Result<u64, InmoError> {
        self.db.with_conn(|conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM conversation_log", [], |row| row.get(0))
                .map_err(|e| InmoError::Storage(e.to_string()))?;
            Ok(count as u64)
        })
    }
}
