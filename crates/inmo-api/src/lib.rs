//! Inmo API crate - axum HTTP server and route handlers.
//!
//! Exposes the chat endpoint, direct listing search, the conversation log,
//! metrics, cache and catalog administration, and health checks.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
