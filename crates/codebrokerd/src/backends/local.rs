//! Local inference through a llama.cpp style executable.
//!
//! Every call writes the prompt to a fresh scratch file, runs the executable
//! against the model artifact with a fixed flag set and a hard wall-clock
//! limit, then removes the scratch file whatever the outcome.

use super::{LocalBackend, LocalFailure};
use crate::availability::BackendAvailability;
use crate::config::{InferenceParams, LocalConfig};
use async_trait::async_trait;
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::{debug, error, warn};

/// Returned when the executable produced nothing usable
pub const EMPTY_OUTPUT_TEXT: &str = "I apologize, but I couldn't generate a proper response.";

/// Number of leading prompt characters used to spot an echoed prompt
const ECHO_PREFIX_CHARS: usize = 50;

#[derive(Debug, Clone)]
struct LocalInstallation {
    executable: PathBuf,
    model: PathBuf,
}

pub struct LlamaCppBackend {
    installation: Option<LocalInstallation>,
    params: InferenceParams,
    timeout: Duration,
    scratch_dir: Option<PathBuf>,
}

impl LlamaCppBackend {
    /// Build from the probed availability. Without a model and an executable
    /// every call fails with `LocalFailure::NotConfigured`.
    pub fn from_availability(
        availability: &BackendAvailability,
        local: &LocalConfig,
        timeout: Duration,
    ) -> Self {
        let installation = match (
            availability.local_executable_path(),
            availability.local_model_path(),
        ) {
            (Some(executable), Some(model)) => Some(LocalInstallation {
                executable: executable.to_path_buf(),
                model: model.to_path_buf(),
            }),
            _ => None,
        };

        Self {
            installation,
            params: local.inference.clone(),
            timeout,
            scratch_dir: local.scratch_dir.clone(),
        }
    }

    pub fn new(
        executable: impl Into<PathBuf>,
        model: impl Into<PathBuf>,
        params: InferenceParams,
        timeout: Duration,
    ) -> Self {
        Self {
            installation: Some(LocalInstallation {
                executable: executable.into(),
                model: model.into(),
            }),
            params,
            timeout,
            scratch_dir: None,
        }
    }

    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    fn write_scratch(&self, prompt: &str) -> Result<NamedTempFile, LocalFailure> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("codebroker-prompt-").suffix(".txt");

        let mut file = match &self.scratch_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(|e| LocalFailure::Scratch(format!("failed to create prompt file: {}", e)))?;

        file.write_all(prompt.as_bytes())
            .and_then(|_| file.flush())
            .map_err(|e| LocalFailure::Scratch(format!("failed to write prompt file: {}", e)))?;

        Ok(file)
    }

    async fn run(
        &self,
        installation: &LocalInstallation,
        prompt_file: &Path,
    ) -> Result<String, LocalFailure> {
        let args = inference_args(&self.params, &installation.model, prompt_file);
        debug!("Running {} {:?}", installation.executable.display(), args);

        let child = Command::new(&installation.executable)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                error!("Failed to start {}: {}", installation.executable.display(), e);
                LocalFailure::Spawn(e.to_string())
            })?;

        // Dropping the child on timeout kills it
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(LocalFailure::Spawn(e.to_string())),
            Err(_) => {
                warn!("Local inference exceeded {:?}, killed", self.timeout);
                return Err(LocalFailure::Timeout(self.timeout));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            error!("Local inference error: {}", stderr);
            return Err(LocalFailure::Exit {
                code: output.status.code(),
                stderr,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl LocalBackend for LlamaCppBackend {
    async fn generate(&self, prompt: &str) -> Result<String, LocalFailure> {
        let installation = self
            .installation
            .as_ref()
            .ok_or(LocalFailure::NotConfigured)?;

        let scratch = self.write_scratch(prompt)?;
        let result = self.run(installation, scratch.path()).await;

        let scratch_path = scratch.path().to_path_buf();
        if let Err(e) = scratch.close() {
            warn!("Failed to remove {}: {}", scratch_path.display(), e);
        }

        result.map(|raw| clean_output(&raw, prompt))
    }
}

/// Flag set understood by llama.cpp style binaries
pub fn inference_args(params: &InferenceParams, model: &Path, prompt_file: &Path) -> Vec<OsString> {
    vec![
        "-m".into(),
        model.as_os_str().to_owned(),
        "-f".into(),
        prompt_file.as_os_str().to_owned(),
        "-n".into(),
        params.max_tokens.to_string().into(),
        "-t".into(),
        params.threads.to_string().into(),
        "--temp".into(),
        params.temperature.to_string().into(),
        "--top-p".into(),
        params.top_p.to_string().into(),
        "--repeat-penalty".into(),
        params.repeat_penalty.to_string().into(),
    ]
}

/// Strip an echoed prompt from raw executable output.
///
/// Leading lines that are blank or start with the first 50 characters of the
/// prompt are skipped; the answer starts at the first line that is neither.
/// If no such line exists the output is kept whole.
pub fn clean_output(raw: &str, prompt: &str) -> String {
    let prefix: String = prompt.chars().take(ECHO_PREFIX_CHARS).collect();
    let lines: Vec<&str> = raw.trim().split('\n').collect();

    let start = lines
        .iter()
        .position(|line| !line.trim().is_empty() && !line.starts_with(prefix.as_str()))
        .unwrap_or(0);

    let cleaned = lines[start..].join("\n").trim().to_string();
    if cleaned.is_empty() {
        EMPTY_OUTPUT_TEXT.to_string()
    } else {
        cleaned
    }
}
