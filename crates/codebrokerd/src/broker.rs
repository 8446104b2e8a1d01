//! Request pipeline: decode, compose, route, normalize.
//!
//! Nothing in here returns an error to the transport. Every request,
//! including one whose processing panics, ends in exactly one envelope.

use crate::availability::BackendAvailability;
use crate::backends::{HttpRemoteBackend, LlamaCppBackend};
use crate::config::Config;
use crate::fallback::fallback_text;
use crate::normalizer::{self, Outcome};
use crate::prompt;
use crate::router::GenerationRouter;
use anyhow::Result;
use codebroker_common::{Action, InboundRequest, Mode, PersonaId, ResponseEnvelope};
use std::any::Any;
use std::sync::Arc;
use tracing::{error, info, warn};

pub struct Broker {
    router: GenerationRouter,
}

impl Broker {
    pub fn new(router: GenerationRouter) -> Self {
        Self { router }
    }

    /// Wire the real HTTP and llama.cpp backends around a probed availability
    pub fn from_config(config: &Config, availability: BackendAvailability) -> Result<Self> {
        let remote = HttpRemoteBackend::new(config.remote.clone(), config.timeouts.remote())?;
        let local = LlamaCppBackend::from_availability(
            &availability,
            &config.local,
            config.timeouts.local(),
        );

        Ok(Self::new(GenerationRouter::new(
            Arc::new(availability),
            Arc::new(remote),
            Arc::new(local),
        )))
    }

    pub fn availability(&self) -> &BackendAvailability {
        self.router.availability()
    }

    /// Run the pipeline for a decoded request
    pub async fn process(&self, request: &InboundRequest) -> Outcome {
        let Some(action) = request.action.as_deref().and_then(Action::parse) else {
            warn!("Unknown action: {:?}", request.action);
            return Outcome::Informational(unknown_action_text(request.action.as_deref()));
        };

        let persona = PersonaId::resolve(&request.persona);
        let prompt = prompt::compose(action, &request.content, persona, &request.options);
        let result = self.router.route(&prompt, Mode::parse(&request.mode)).await;

        info!(
            "Handled {} (persona={}) via {}",
            action, persona, result.backend
        );
        Outcome::Generated(result)
    }

    pub async fn handle(&self, request: &InboundRequest) -> ResponseEnvelope {
        let outcome = self.process(request).await;
        normalizer::wrap(outcome, request)
    }

    /// Handle a request in its own task so a panic fails only this request
    pub async fn handle_isolated(broker: Arc<Broker>, request: InboundRequest) -> ResponseEnvelope {
        let echo = request.clone();
        let task = tokio::spawn(async move { broker.handle(&request).await });

        match task.await {
            Ok(envelope) => envelope,
            Err(e) => {
                let message = if e.is_panic() {
                    panic_message(e.into_panic())
                } else {
                    e.to_string()
                };
                error!("Request processing failed: {}", message);
                normalizer::wrap(Outcome::Failed(message), &echo)
            }
        }
    }

    /// Decode one inbound line and answer it
    pub async fn handle_line(broker: &Arc<Broker>, line: &str) -> ResponseEnvelope {
        match InboundRequest::decode(line) {
            Ok(request) => {
                info!("Received request: {}", request.action_name());
                Self::handle_isolated(Arc::clone(broker), request).await
            }
            Err(e) => {
                warn!("Undecodable request line: {}", e);
                normalizer::invalid_format()
            }
        }
    }
}

/// Help text for an unrecognized or missing action, followed by the
/// canned guidance matching the raw action string
pub fn unknown_action_text(action: Option<&str>) -> String {
    let raw = action.unwrap_or("");
    let shown = action.unwrap_or("(missing)");
    format!(
        "Unknown action: {}. Available actions: {}\n\n{}",
        shown,
        Action::valid_names(),
        fallback_text(raw)
    )
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "request processing panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::availability::RemoteProvider;
    use crate::backends::{FakeLocalBackend, FakeRemoteBackend};
    use crate::fallback::FallbackCategory;

    fn broker(
        availability: BackendAvailability,
        remote: &Arc<FakeRemoteBackend>,
        local: &Arc<FakeLocalBackend>,
    ) -> Broker {
        Broker::new(GenerationRouter::new(
            Arc::new(availability),
            remote.clone(),
            local.clone(),
        ))
    }

    #[test]
    fn test_unknown_action_text() {
        let text = unknown_action_text(Some("please-explain"));
        assert!(text.starts_with(
            "Unknown action: please-explain. Available actions: explain, translate, optimize, chat, fix_error\n\n"
        ));
        assert!(text.ends_with(FallbackCategory::Explain.text()));

        let text = unknown_action_text(None);
        assert!(text.starts_with("Unknown action: (missing)."));
        assert!(text.ends_with(FallbackCategory::General.text()));
    }

    #[tokio::test]
    async fn test_unknown_action_skips_backends() {
        let remote = Arc::new(FakeRemoteBackend::succeeding("unused"));
        let local = Arc::new(FakeLocalBackend::succeeding("unused"));
        let availability = BackendAvailability::none().with_remote(RemoteProvider::Primary, "sk");
        let broker = broker(availability, &remote, &local);

        let envelope = broker.handle(&InboundRequest::new("summarize", "x")).await;
        assert!(envelope.success);
        assert!(envelope.response.unwrap().starts_with("Unknown action: summarize."));
        assert_eq!(remote.call_count(), 0);
        assert_eq!(local.call_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_persona_uses_teacher_prompt() {
        let remote = Arc::new(FakeRemoteBackend::succeeding("ok"));
        let local = Arc::new(FakeLocalBackend::succeeding("unused"));
        let availability = BackendAvailability::none().with_remote(RemoteProvider::Primary, "sk");
        let broker = broker(availability, &remote, &local);

        let request = InboundRequest::new("chat", "hi").with_persona("pirate");
        let envelope = broker.handle(&request).await;
        assert_eq!(envelope.persona.as_deref(), Some("pirate"));

        let teacher = PersonaId::Teacher.profile().system_prompt;
        assert!(remote.calls()[0].1.starts_with(teacher));
    }

    #[tokio::test]
    async fn test_handle_line_invalid_json() {
        let remote = Arc::new(FakeRemoteBackend::succeeding("unused"));
        let local = Arc::new(FakeLocalBackend::succeeding("unused"));
        let broker = Arc::new(broker(BackendAvailability::none(), &remote, &local));

        let envelope = Broker::handle_line(&broker, "{not json").await;
        assert!(!envelope.success);
        assert_eq!(envelope.error.as_deref(), Some("Invalid JSON format"));
        assert!(envelope.action.is_none());
    }

    #[tokio::test]
    async fn test_handle_line_lenient_fields() {
        let remote = Arc::new(FakeRemoteBackend::succeeding("ok"));
        let local = Arc::new(FakeLocalBackend::succeeding("unused"));
        let availability = BackendAvailability::none().with_remote(RemoteProvider::Primary, "sk");
        let broker = Arc::new(broker(availability, &remote, &local));

        let lines = [
            r#"{"action":"translate","content":"x","options":{"targetLanguage":"Go","indent":4}}"#,
            r#"{"action":"explain","content":"x","persona":null}"#,
            r#"{"action":"explain","content":"x","options":null}"#,
        ];
        for line in lines {
            let envelope = Broker::handle_line(&broker, line).await;
            assert!(envelope.success, "rejected {}", line);
            assert_eq!(envelope.response.as_deref(), Some("ok"));
        }

        let calls = remote.calls();
        assert!(calls[0].1.contains("translate the following code to Go:"));
        assert!(calls[1].1.starts_with(PersonaId::Teacher.profile().system_prompt));
    }

    #[test]
    fn test_panic_message_payloads() {
        assert_eq!(panic_message(Box::new("static")), "static");
        assert_eq!(panic_message(Box::new("owned".to_string())), "owned");
        assert_eq!(panic_message(Box::new(7_u8)), "request processing panicked");
    }
}
