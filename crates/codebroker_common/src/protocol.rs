//! Wire protocol between codebrokerd and its clients.
//!
//! One JSON object per line in each direction. Clients send
//! [`InboundRequest`]; the daemon answers every line with exactly one
//! [`ResponseEnvelope`]. A [`ConnectionNotice`] is sent once when a
//! connection is accepted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Error text for lines that cannot be decoded into a request
pub const INVALID_FORMAT_MESSAGE: &str = "Invalid JSON format";

/// Code-assistance actions the broker understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Explain,
    Translate,
    Optimize,
    Chat,
    FixError,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::Explain,
        Action::Translate,
        Action::Optimize,
        Action::Chat,
        Action::FixError,
    ];

    /// Parse a wire action name. Unknown names return `None`.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "explain" => Some(Self::Explain),
            "translate" => Some(Self::Translate),
            "optimize" => Some(Self::Optimize),
            "chat" => Some(Self::Chat),
            "fix_error" => Some(Self::FixError),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Explain => "explain",
            Self::Translate => "translate",
            Self::Optimize => "optimize",
            Self::Chat => "chat",
            Self::FixError => "fix_error",
        }
    }

    /// Comma separated list of every valid action name
    pub fn valid_names() -> String {
        Self::ALL
            .iter()
            .map(|a| a.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Requested generation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Remote completion service
    Online,
    /// On-machine model
    Offline,
}

impl Mode {
    /// Parse a wire mode name. Unknown names return `None`, which the router
    /// treats as "requested mode unavailable".
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "online" => Some(Self::Online),
            "offline" => Some(Self::Offline),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded request line.
///
/// Fields stay as raw strings so the response can echo exactly what the
/// client sent, including unknown actions and personas. Absent or `null`
/// fields take their defaults; option values that are not strings are kept
/// but never read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundRequest {
    #[serde(default)]
    pub action: Option<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub content: String,

    #[serde(default = "default_persona", deserialize_with = "persona_or_default")]
    pub persona: String,

    #[serde(default = "default_mode", deserialize_with = "mode_or_default")]
    pub mode: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub options: HashMap<String, Value>,
}

fn default_persona() -> String {
    "teacher".to_string()
}

fn default_mode() -> String {
    "online".to_string()
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn persona_or_default<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(default_persona))
}

fn mode_or_default<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(default_mode))
}

impl InboundRequest {
    pub fn new(action: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            action: Some(action.into()),
            content: content.into(),
            persona: default_persona(),
            mode: default_mode(),
            options: HashMap::new(),
        }
    }

    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = persona.into();
        self
    }

    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = mode.into();
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), Value::String(value.into()));
        self
    }

    /// String value of an option; absent or non-string values read as `None`
    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(Value::as_str)
    }

    /// Decode a single request line
    pub fn decode(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line.trim())
    }

    /// Action name as sent, or an empty string when absent
    pub fn action_name(&self) -> &str {
        self.action.as_deref().unwrap_or("")
    }
}

/// Canonical response for a single request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,

    pub timestamp: DateTime<Utc>,
}

impl ResponseEnvelope {
    /// Exactly one of `response` / `error` is present, matching `success`
    pub fn is_consistent(&self) -> bool {
        if self.success {
            self.response.is_some() && self.error.is_none()
        } else {
            self.response.is_none() && self.error.is_some()
        }
    }
}

/// Greeting sent once per accepted connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionNotice {
    #[serde(rename = "type")]
    pub kind: String,
    pub success: bool,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ConnectionNotice {
    pub fn connected() -> Self {
        Self {
            kind: "connection".to_string(),
            success: true,
            message: "Connected to codebroker".to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Body of the health endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub remote_configured: bool,
    pub local_configured: bool,
}
