//! Error types for codebroker.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("Daemon not running. Start codebrokerd and try again.")]
    DaemonNotRunning,

    #[error("Socket error: {0}")]
    Socket(String),

    #[error("Message too large: {size} bytes (limit {limit})")]
    MessageTooLarge { size: usize, limit: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_too_large_display() {
        let err = BrokerError::MessageTooLarge {
            size: 2048,
            limit: 1024,
        };
        assert_eq!(err.to_string(), "Message too large: 2048 bytes (limit 1024)");
    }

    #[test]
    fn test_json_error_converts() {
        let parse: Result<serde_json::Value, _> = serde_json::from_str("{");
        let err: BrokerError = parse.unwrap_err().into();
        assert!(matches!(err, BrokerError::Json(_)));
    }
}
