//! Configuration management for codebrokerd.
//!
//! Loads settings from `$CODEBROKER_CONFIG`, /etc/codebroker/config.toml or
//! /var/lib/codebroker/config.toml, in that order, or uses defaults.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "CODEBROKER_CONFIG";

/// Config file path
pub const CONFIG_PATH: &str = "/etc/codebroker/config.toml";

/// Default config file path for fallback
pub const DEFAULT_CONFIG_PATH: &str = "/var/lib/codebroker/config.toml";

/// Request and health listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    /// Request listener port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Health endpoint port
    #[serde(default = "default_health_port")]
    pub health_port: u16,

    /// Largest accepted request line in bytes
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8765
}

fn default_health_port() -> u16 {
    8766
}

fn default_max_message_bytes() -> usize {
    1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            health_port: default_health_port(),
            max_message_bytes: default_max_message_bytes(),
        }
    }
}

/// The three independent timeout classes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Any HTTP call to a remote completion service
    #[serde(default = "default_remote_timeout")]
    pub remote_secs: u64,

    /// Wall clock limit for one local inference process
    #[serde(default = "default_local_timeout")]
    pub local_secs: u64,

    /// `--version` probe of a candidate local executable at startup
    #[serde(default = "default_probe_timeout")]
    pub probe_secs: u64,
}

fn default_remote_timeout() -> u64 {
    30
}

fn default_local_timeout() -> u64 {
    60
}

fn default_probe_timeout() -> u64 {
    5
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            remote_secs: default_remote_timeout(),
            local_secs: default_local_timeout(),
            probe_secs: default_probe_timeout(),
        }
    }
}

impl TimeoutConfig {
    pub fn remote(&self) -> Duration {
        Duration::from_secs(self.remote_secs)
    }

    pub fn local(&self) -> Duration {
        Duration::from_secs(self.local_secs)
    }

    pub fn probe(&self) -> Duration {
        Duration::from_secs(self.probe_secs)
    }
}

/// One remote completion provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteProviderConfig {
    /// Environment variable holding the bearer credential
    pub credential_env: String,
    pub endpoint: String,
    pub model: String,
    #[serde(default = "default_remote_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_remote_max_tokens() -> u32 {
    1000
}

fn default_temperature() -> f32 {
    0.7
}

fn default_primary() -> RemoteProviderConfig {
    RemoteProviderConfig {
        credential_env: "OPENAI_API_KEY".to_string(),
        endpoint: "https://api.openai.com/v1/completions".to_string(),
        model: "gpt-3.5-turbo-instruct".to_string(),
        max_tokens: default_remote_max_tokens(),
        temperature: default_temperature(),
    }
}

fn default_secondary() -> RemoteProviderConfig {
    RemoteProviderConfig {
        credential_env: "GROQ_API_KEY".to_string(),
        endpoint: "https://api.groq.com/openai/v1/completions".to_string(),
        model: "mixtral-8x7b-32768".to_string(),
        max_tokens: default_remote_max_tokens(),
        temperature: default_temperature(),
    }
}

/// Remote providers in priority order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default = "default_primary")]
    pub primary: RemoteProviderConfig,

    #[serde(default = "default_secondary")]
    pub secondary: RemoteProviderConfig,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            primary: default_primary(),
            secondary: default_secondary(),
        }
    }
}

/// Local llama.cpp style backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalConfig {
    /// Directory searched for the executable (and its llama.cpp subdirectory)
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,

    /// Directory scanned for a model artifact. Defaults to `<base_dir>/models`.
    #[serde(default)]
    pub models_dir: Option<PathBuf>,

    #[serde(default = "default_executable_name")]
    pub executable_name: String,

    /// Recognized model file extensions
    #[serde(default = "default_model_extensions")]
    pub model_extensions: Vec<String>,

    /// Where prompt scratch files are created. System temp dir when unset.
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,

    #[serde(default)]
    pub inference: InferenceParams,
}

fn default_base_dir() -> PathBuf {
    PathBuf::from("/var/lib/codebroker")
}

fn default_executable_name() -> String {
    if cfg!(windows) {
        "llama.exe".to_string()
    } else {
        "llama".to_string()
    }
}

fn default_model_extensions() -> Vec<String> {
    vec![".ggml".to_string(), ".bin".to_string(), ".gguf".to_string()]
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            models_dir: None,
            executable_name: default_executable_name(),
            model_extensions: default_model_extensions(),
            scratch_dir: None,
            inference: InferenceParams::default(),
        }
    }
}

impl LocalConfig {
    pub fn models_dir(&self) -> PathBuf {
        self.models_dir
            .clone()
            .unwrap_or_else(|| self.base_dir.join("models"))
    }
}

/// Fixed parameter set passed to the local inference executable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceParams {
    #[serde(default = "default_local_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_threads")]
    pub threads: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_repeat_penalty")]
    pub repeat_penalty: f32,
}

fn default_local_max_tokens() -> u32 {
    500
}

fn default_threads() -> u32 {
    4
}

fn default_top_p() -> f32 {
    0.9
}

fn default_repeat_penalty() -> f32 {
    1.1
}

impl Default for InferenceParams {
    fn default() -> Self {
        Self {
            max_tokens: default_local_max_tokens(),
            threads: default_threads(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            repeat_penalty: default_repeat_penalty(),
        }
    }
}

/// Full daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub timeouts: TimeoutConfig,

    #[serde(default)]
    pub remote: RemoteConfig,

    #[serde(default)]
    pub local: LocalConfig,
}

impl Config {
    /// Load config from file, or return defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            match Self::load_from_path(&path) {
                Ok(config) => return config,
                Err(e) => warn!("Failed to load {} from {}: {}", CONFIG_ENV, path, e),
            }
        }

        Self::load_from_path(CONFIG_PATH)
            .or_else(|_| Self::load_from_path(DEFAULT_CONFIG_PATH))
            .unwrap_or_else(|e| {
                warn!("Config not found, using defaults: {}", e);
                Config::default()
            })
    }

    /// Load config from specific path
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn request_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn health_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.health_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 8765);
        assert_eq!(config.server.health_port, 8766);
        assert_eq!(config.server.max_message_bytes, 1_048_576);
        assert_eq!(config.timeouts.remote_secs, 30);
        assert_eq!(config.timeouts.local_secs, 60);
        assert_eq!(config.timeouts.probe_secs, 5);
        assert_eq!(config.remote.primary.credential_env, "OPENAI_API_KEY");
        assert_eq!(config.remote.secondary.credential_env, "GROQ_API_KEY");
        assert_eq!(config.local.inference.max_tokens, 500);
        assert_eq!(config.local.inference.threads, 4);
    }

    #[test]
    fn test_models_dir_defaults_under_base_dir() {
        let mut local = LocalConfig::default();
        local.base_dir = PathBuf::from("/opt/broker");
        assert_eq!(local.models_dir(), PathBuf::from("/opt/broker/models"));

        local.models_dir = Some(PathBuf::from("/srv/models"));
        assert_eq!(local.models_dir(), PathBuf::from("/srv/models"));
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
[server]
port = 9000

[timeouts]
local_secs = 120

[remote.secondary]
credential_env = "MY_GROQ"
endpoint = "http://127.0.0.1:9999/v1/completions"
model = "tiny"

[local]
base_dir = "/opt/llm"
model_extensions = [".gguf"]
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.health_port, 8766);
        assert_eq!(config.timeouts.local_secs, 120);
        // Other timeout classes keep their own defaults
        assert_eq!(config.timeouts.remote_secs, 30);
        assert_eq!(config.timeouts.probe_secs, 5);
        assert_eq!(config.remote.secondary.credential_env, "MY_GROQ");
        assert_eq!(config.remote.secondary.max_tokens, 1000);
        assert_eq!(config.remote.primary.model, "gpt-3.5-turbo-instruct");
        assert_eq!(config.local.model_extensions, vec![".gguf".to_string()]);
        assert_eq!(config.local.inference.top_p, 0.9);
    }

    #[test]
    fn test_load_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[timeouts]\nprobe_secs = 2\n").unwrap();

        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.timeouts.probe(), Duration::from_secs(2));
        assert!(Config::load_from_path(dir.path().join("missing.toml")).is_err());
    }
}
