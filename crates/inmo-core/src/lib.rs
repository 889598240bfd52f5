pub mod config;
pub mod error;
pub mod types;

pub use config::InmoConfig;
pub use error::{InmoError, Result};
pub use types::*;
