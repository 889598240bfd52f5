//! Inmo Storage crate - SQLite persistence for listings and conversations.
//!
//! Provides a WAL-mode SQLite database with migrations, the listings feed
//! parser, the price-ordered listing store, the TTL query cache composed in
//! front of it, and the append-only conversation log.

pub mod cache;
pub mod conversation;
pub mod db;
pub mod feed;
pub mod listings;
pub mod migrations;
pub mod search;

pub use cache::QueryCache;
pub use conversation::ConversationLog;
pub use db::Database;
pub use feed::{parse_feed, read_feed, ParsedFeed, RecordError};
pub use listings::ListingStore;
pub use search::ListingSearch;
