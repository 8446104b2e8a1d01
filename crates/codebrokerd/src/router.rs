//! Generation router - backend selection and the fallback chain.
//!
//! ```text
//!   resolve ──► Remote ──ok──► done (remote-primary / remote-secondary)
//!      │          │
//!      │          └─fail─► Local if configured, else Fallback
//!      ├────────► Local ───► done (answer or descriptive failure text)
//!      └────────► Fallback ► done (canned guidance)
//! ```
//!
//! At most one remote attempt and one local attempt per request. A failed
//! remote slot is never retried against the next slot.

use crate::availability::{BackendAvailability, RemoteProvider};
use crate::backends::{BackendError, LocalBackend, LocalFailure, RemoteBackend};
use crate::fallback::fallback_text;
use codebroker_common::Mode;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Which path produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendUsed {
    RemotePrimary,
    RemoteSecondary,
    Local,
    None,
}

impl From<RemoteProvider> for BackendUsed {
    fn from(provider: RemoteProvider) -> Self {
        match provider {
            RemoteProvider::Primary => Self::RemotePrimary,
            RemoteProvider::Secondary => Self::RemoteSecondary,
        }
    }
}

impl fmt::Display for BackendUsed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RemotePrimary => write!(f, "remote-primary"),
            Self::RemoteSecondary => write!(f, "remote-secondary"),
            Self::Local => write!(f, "local"),
            Self::None => write!(f, "none"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationResult {
    pub text: String,
    pub backend: BackendUsed,
}

/// Router states after mode resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteState {
    Remote,
    Local,
    Fallback,
}

impl RouteState {
    /// Pick the first state for a requested mode.
    ///
    /// The requested mode wins when available; otherwise remote is preferred
    /// over local, and with neither configured we go straight to fallback.
    pub fn resolve(requested: Option<Mode>, availability: &BackendAvailability) -> Self {
        match requested {
            Some(Mode::Online) if availability.remote_configured() => Self::Remote,
            Some(Mode::Offline) if availability.local_configured() => Self::Local,
            _ if availability.remote_configured() => Self::Remote,
            _ if availability.local_configured() => Self::Local,
            _ => Self::Fallback,
        }
    }

    /// Next state after a failed remote attempt
    pub fn after_remote_failure(availability: &BackendAvailability) -> Self {
        if availability.local_configured() {
            Self::Local
        } else {
            Self::Fallback
        }
    }
}

pub struct GenerationRouter {
    availability: Arc<BackendAvailability>,
    remote: Arc<dyn RemoteBackend>,
    local: Arc<dyn LocalBackend>,
}

impl GenerationRouter {
    pub fn new(
        availability: Arc<BackendAvailability>,
        remote: Arc<dyn RemoteBackend>,
        local: Arc<dyn LocalBackend>,
    ) -> Self {
        Self {
            availability,
            remote,
            local,
        }
    }

    pub fn availability(&self) -> &BackendAvailability {
        &self.availability
    }

    /// Produce a result for `prompt`. Never fails.
    pub async fn route(&self, prompt: &str, requested: Option<Mode>) -> GenerationResult {
        let mut state = RouteState::resolve(requested, &self.availability);
        info!(
            "Route: requested={}, start={:?}",
            requested.map(|m| m.as_str()).unwrap_or("unrecognized"),
            state
        );

        loop {
            state = match state {
                RouteState::Remote => match self.attempt_remote(prompt).await {
                    Ok(result) => return result,
                    Err(e) => {
                        error!("Online generation failed: {}", e);
                        let next = RouteState::after_remote_failure(&self.availability);
                        warn!("Falling back to {:?}", next);
                        next
                    }
                },
                RouteState::Local => match self.local.generate(prompt).await {
                    Ok(text) => {
                        return GenerationResult {
                            text,
                            backend: BackendUsed::Local,
                        }
                    }
                    Err(LocalFailure::NotConfigured) => {
                        warn!("Local backend not configured, using fallback text");
                        RouteState::Fallback
                    }
                    Err(failure) => {
                        error!("Offline generation failed: {:?}", failure);
                        return GenerationResult {
                            text: failure.to_string(),
                            backend: BackendUsed::Local,
                        };
                    }
                },
                RouteState::Fallback => {
                    return GenerationResult {
                        text: fallback_text(prompt).to_string(),
                        backend: BackendUsed::None,
                    }
                }
            };
        }
    }

    /// Single attempt against the highest priority configured slot
    async fn attempt_remote(&self, prompt: &str) -> Result<GenerationResult, BackendError> {
        let slot = self
            .availability
            .preferred_remote()
            .ok_or(BackendError::NotConfigured)?;

        let text = self.remote.complete(slot, prompt).await?;
        Ok(GenerationResult {
            text,
            backend: slot.provider.into(),
        })
    }
}
