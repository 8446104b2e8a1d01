//! Response normalizer - folds every outcome into a `ResponseEnvelope`.

use crate::router::GenerationResult;
use chrono::Utc;
use codebroker_common::{BrokerError, InboundRequest, ResponseEnvelope, INVALID_FORMAT_MESSAGE};

/// What the pipeline produced for a request
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Text from a backend or from fallback guidance
    Generated(GenerationResult),
    /// Help text that is a valid answer, e.g. for an unknown action
    Informational(String),
    /// Internal failure while processing
    Failed(String),
}

/// Wrap an outcome, echoing the request's action, persona and mode verbatim
pub fn wrap(outcome: Outcome, request: &InboundRequest) -> ResponseEnvelope {
    let (success, response, error) = match outcome {
        Outcome::Generated(result) => (true, Some(result.text), None),
        Outcome::Informational(text) => (true, Some(text), None),
        Outcome::Failed(message) => (false, None, Some(message)),
    };

    ResponseEnvelope {
        success,
        response,
        error,
        action: request.action.clone(),
        persona: Some(request.persona.clone()),
        mode: Some(request.mode.clone()),
        timestamp: Utc::now(),
    }
}

/// Envelope for a line that could not be decoded. There is no request to echo.
pub fn invalid_format() -> ResponseEnvelope {
    bare_error(INVALID_FORMAT_MESSAGE.to_string())
}

/// Envelope for an inbound line over the size limit
pub fn too_large(size: usize, limit: usize) -> ResponseEnvelope {
    bare_error(BrokerError::MessageTooLarge { size, limit }.to_string())
}

fn bare_error(message: String) -> ResponseEnvelope {
    ResponseEnvelope {
        success: false,
        response: None,
        error: Some(message),
        action: None,
        persona: None,
        mode: None,
        timestamp: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::BackendUsed;

    fn request() -> InboundRequest {
        InboundRequest::new("chat", "hi")
            .with_persona("pirate")
            .with_mode("hybrid")
    }

    #[test]
    fn test_generated_echoes_raw_fields() {
        let before = Utc::now();
        let envelope = wrap(
            Outcome::Generated(GenerationResult {
                text: "Hello".to_string(),
                backend: BackendUsed::RemotePrimary,
            }),
            &request(),
        );

        assert!(envelope.success);
        assert!(envelope.is_consistent());
        assert_eq!(envelope.response.as_deref(), Some("Hello"));
        assert_eq!(envelope.action.as_deref(), Some("chat"));
        assert_eq!(envelope.persona.as_deref(), Some("pirate"));
        assert_eq!(envelope.mode.as_deref(), Some("hybrid"));
        assert!(envelope.timestamp >= before);
    }

    #[test]
    fn test_informational_is_success() {
        let envelope = wrap(Outcome::Informational("help".to_string()), &request());
        assert!(envelope.success);
        assert!(envelope.is_consistent());
    }

    #[test]
    fn test_failed_carries_error() {
        let envelope = wrap(Outcome::Failed("boom".to_string()), &request());
        assert!(!envelope.success);
        assert!(envelope.is_consistent());
        assert_eq!(envelope.error.as_deref(), Some("boom"));
        assert_eq!(envelope.action.as_deref(), Some("chat"));
    }

    #[test]
    fn test_missing_action_stays_absent() {
        let mut req = request();
        req.action = None;
        let envelope = wrap(Outcome::Informational("x".to_string()), &req);
        assert!(envelope.action.is_none());
    }

    #[test]
    fn test_bare_errors() {
        let envelope = invalid_format();
        assert!(envelope.is_consistent());
        assert_eq!(envelope.error.as_deref(), Some("Invalid JSON format"));

        let envelope = too_large(2048, 1024);
        assert!(!envelope.success);
        assert!(envelope.error.unwrap().contains("2048"));
    }
}
