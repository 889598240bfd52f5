use thiserror::Error;

/// Top-level error type for the inmo workspace.
///
/// Subsystem crates define their own error types and implement
/// `From<InmoError>` where they need to absorb core failures with `?`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum InmoError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Feed error: {0}")]
    Feed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for InmoError {
    fn from(err: toml::de::Error) -> Self {
        InmoError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for InmoError {
    fn from(err: toml::ser::Error) -> Self {
        InmoError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for InmoError {
    fn from(err: serde_json::Error) -> Self {
        InmoError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for inmo operations.
pub type Result<T> = std::result::Result<T, InmoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = InmoError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing field");

        let err = InmoError::Storage("database locked".to_string());
        assert_eq!(err.to_string(), "Storage error: database locked");

        let err = InmoError::Feed("not an array".to_string());
        assert_eq!(err.to_string(), "Feed error: not an array");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: InmoError = io_err.into();
        assert!(matches!(err, InmoError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: InmoError = json_err.into();
        assert!(matches!(err, InmoError::Serialization(_)));
    }

    #[test]
    fn test_toml_error_conversion() {
        let toml_err = toml::from_str::<toml::Value>("= broken").unwrap_err();
        let err: InmoError = toml_err.into();
        assert!(matches!(err, InmoError::Config(_)));
    }
}
