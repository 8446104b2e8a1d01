//! Generation backends.
//!
//! Both backend kinds sit behind narrow async traits so the router can be
//! exercised with fakes instead of real HTTP calls and subprocesses.

pub mod fake;
pub mod local;
pub mod remote;

use crate::availability::RemoteCredential;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub use fake::{FakeLocalBackend, FakeRemoteBackend};
pub use local::LlamaCppBackend;
pub use remote::HttpRemoteBackend;

/// Failure of a single remote attempt
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BackendError {
    #[error("no remote credential configured")]
    NotConfigured,

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("request timeout after {0:?}")]
    Timeout(Duration),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected response shape: {0}")]
    InvalidResponse(String),
}

/// Failure of a local inference attempt.
///
/// The `Display` text is what the client receives as the response.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LocalFailure {
    #[error("Sorry, offline mode is not configured.")]
    NotConfigured,

    #[error("Sorry, the request timed out. Please try again with a shorter prompt.")]
    Timeout(Duration),

    #[error("Sorry, there was an error processing your request: {stderr}")]
    Exit { code: Option<i32>, stderr: String },

    #[error("Sorry, I encountered an error: {0}")]
    Scratch(String),

    #[error("Sorry, I encountered an error: {0}")]
    Spawn(String),
}

/// Network completion service
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    /// One completion attempt against the provider named by `slot`
    async fn complete(&self, slot: &RemoteCredential, prompt: &str) -> Result<String, BackendError>;
}

/// On-machine completion
#[async_trait]
pub trait LocalBackend: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, LocalFailure>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_failure_messages() {
        assert_eq!(
            LocalFailure::Timeout(Duration::from_secs(60)).to_string(),
            "Sorry, the request timed out. Please try again with a shorter prompt."
        );
        let exit = LocalFailure::Exit {
            code: Some(1),
            stderr: "model load failed".to_string(),
        };
        assert_eq!(
            exit.to_string(),
            "Sorry, there was an error processing your request: model load failed"
        );
    }

    #[test]
    fn test_backend_error_display() {
        let err = BackendError::Status {
            status: 401,
            body: "bad key".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 401: bad key");
    }
}
