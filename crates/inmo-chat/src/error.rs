//! Error types for the chat pipeline.

use inmo_core::error::InmoError;

/// Errors from the chat pipeline.
///
/// Only request validation and storage plumbing surface as errors; a failed
/// completion is answered with a fallback message instead.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("storage error: {0}")]
    StorageError(String),
}

impl From<InmoError> for ChatError {
    fn from(err: InmoError) -> Self {
        ChatError::StorageError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_error_display() {
        assert_eq!(ChatError::EmptyMessage.to_string(), "message cannot be empty");
        assert_eq!(
            ChatError::MessageTooLong(1000).to_string(),
            "message exceeds maximum length of 1000 characters"
        );
        assert_eq!(
            ChatError::StorageError("disk full".to_string()).to_string(),
            "storage error: disk full"
        );
    }

    #[test]
    fn test_chat_error_from_inmo_error() {
        let chat_err: ChatError = InmoError::Storage("connection lost".to_string()).into();
        assert!(matches!(chat_err, ChatError::StorageError(_)));
        assert!(chat_err.to_string().contains("connection lost"));
    }
}
