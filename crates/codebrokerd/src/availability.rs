//! Backend availability - which generation paths are usable.
//!
//! Probed once at startup and shared read-only afterwards. Probing reads the
//! environment, lists the models directory and may spawn the candidate local
//! executable with `--version`, so it must never run per request.

use crate::config::{Config, LocalConfig};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Remote provider slots in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteProvider {
    Primary,
    Secondary,
}

impl fmt::Display for RemoteProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "remote-primary"),
            Self::Secondary => write!(f, "remote-secondary"),
        }
    }
}

/// A configured remote slot and its credential
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteCredential {
    pub provider: RemoteProvider,
    pub secret: String,
}

impl fmt::Debug for RemoteCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteCredential")
            .field("provider", &self.provider)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Snapshot of usable backends
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendAvailability {
    remote: Vec<RemoteCredential>,
    local_model_path: Option<PathBuf>,
    local_executable_path: Option<PathBuf>,
}

impl BackendAvailability {
    /// Nothing configured: pure fallback-text mode
    pub fn none() -> Self {
        Self::default()
    }

    /// Add a remote slot. Slots keep priority order regardless of insertion order.
    pub fn with_remote(mut self, provider: RemoteProvider, secret: impl Into<String>) -> Self {
        self.remote.retain(|c| c.provider != provider);
        self.remote.push(RemoteCredential {
            provider,
            secret: secret.into(),
        });
        self.remote.sort_by_key(|c| match c.provider {
            RemoteProvider::Primary => 0,
            RemoteProvider::Secondary => 1,
        });
        self
    }

    pub fn with_local(mut self, model: impl Into<PathBuf>, executable: impl Into<PathBuf>) -> Self {
        self.local_model_path = Some(model.into());
        self.local_executable_path = Some(executable.into());
        self
    }

    pub fn remote_configured(&self) -> bool {
        !self.remote.is_empty()
    }

    /// True only when both the model artifact and the executable were found
    pub fn local_configured(&self) -> bool {
        self.local_model_path.is_some() && self.local_executable_path.is_some()
    }

    /// Highest priority configured remote slot
    pub fn preferred_remote(&self) -> Option<&RemoteCredential> {
        self.remote.first()
    }

    pub fn remote_slots(&self) -> &[RemoteCredential] {
        &self.remote
    }

    pub fn local_model_path(&self) -> Option<&Path> {
        self.local_model_path.as_deref()
    }

    pub fn local_executable_path(&self) -> Option<&Path> {
        self.local_executable_path.as_deref()
    }
}

/// Probe the process environment and filesystem
pub async fn probe(config: &Config) -> BackendAvailability {
    probe_with_env(config, |name| std::env::var(name).ok()).await
}

/// Probe with an explicit environment lookup
pub async fn probe_with_env<F>(config: &Config, lookup: F) -> BackendAvailability
where
    F: Fn(&str) -> Option<String>,
{
    let mut availability = BackendAvailability::none();

    let slots = [
        (RemoteProvider::Primary, &config.remote.primary.credential_env),
        (RemoteProvider::Secondary, &config.remote.secondary.credential_env),
    ];
    for (provider, env_name) in slots {
        match lookup(env_name) {
            Some(secret) if !secret.is_empty() => {
                info!("Remote slot {} configured via {}", provider, env_name);
                availability = availability.with_remote(provider, secret);
            }
            _ => debug!("{} not set", env_name),
        }
    }
    if !availability.remote_configured() {
        warn!("No remote credentials found, online mode unavailable");
    }

    let models_dir = config.local.models_dir();
    availability.local_model_path = find_model_artifact(&models_dir, &config.local.model_extensions);
    availability.local_executable_path =
        locate_executable(&config.local, config.timeouts.probe()).await;

    if availability.local_configured() {
        info!(
            "Offline mode configured: {} with {}",
            display_opt(availability.local_executable_path()),
            display_opt(availability.local_model_path())
        );
    } else {
        info!(
            "Offline mode not available - model: {}, executable: {}",
            display_opt(availability.local_model_path()),
            display_opt(availability.local_executable_path())
        );
    }

    availability
}

fn display_opt(path: Option<&Path>) -> String {
    path.map(|p| p.display().to_string())
        .unwrap_or_else(|| "none".to_string())
}

/// First directory entry whose name ends with a recognized extension.
///
/// Entries are visited in directory listing order, which is not sorted.
pub fn find_model_artifact(dir: &Path, extensions: &[String]) -> Option<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Models directory {} unreadable: {}", dir.display(), e);
            return None;
        }
    };

    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if extensions.iter().any(|ext| name.ends_with(ext.as_str())) {
            return Some(entry.path());
        }
    }
    None
}

/// Candidate executable locations, in search order
pub fn executable_candidates(local: &LocalConfig) -> Vec<PathBuf> {
    vec![
        local.base_dir.join(&local.executable_name),
        local.base_dir.join("llama.cpp").join(&local.executable_name),
        PathBuf::from(&local.executable_name),
    ]
}

/// Locate the local inference executable.
///
/// The first candidate that exists on disk wins. Otherwise each candidate is
/// invoked with `--version` in order, which covers the bare name resolved
/// through PATH.
pub async fn locate_executable(local: &LocalConfig, probe_timeout: Duration) -> Option<PathBuf> {
    let candidates = executable_candidates(local);
    if let Some(found) = candidates.iter().find(|c| c.exists()) {
        return Some(found.clone());
    }
    first_responsive(&candidates, probe_timeout).await
}

/// First candidate whose `--version` succeeds within `probe_timeout`.
/// A candidate that hangs costs at most one timeout.
pub async fn first_responsive(candidates: &[PathBuf], probe_timeout: Duration) -> Option<PathBuf> {
    for candidate in candidates {
        if responds_to_version(candidate, probe_timeout).await {
            return Some(candidate.clone());
        }
    }
    None
}

/// Run `<program> --version` and report whether it exits successfully in time
pub async fn responds_to_version(program: &Path, probe_timeout: Duration) -> bool {
    let child = Command::new(program)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .status();

    match tokio::time::timeout(probe_timeout, child).await {
        Ok(Ok(status)) => status.success(),
        Ok(Err(e)) => {
            debug!("{} --version failed to start: {}", program.display(), e);
            false
        }
        Err(_) => {
            warn!(
                "{} --version timed out after {:?}",
                program.display(),
                probe_timeout
            );
            false
        }
    }
}
