//! Remote completions over HTTP.
//!
//! Both providers speak the same completions schema: `{model, prompt,
//! max_tokens, temperature}` posted with a bearer credential, answered with
//! `choices[0].text`. Any deviation from that shape fails the attempt.

use super::{BackendError, RemoteBackend};
use crate::availability::{RemoteCredential, RemoteProvider};
use crate::config::{RemoteConfig, RemoteProviderConfig};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

/// Completions request body
#[derive(Debug, Serialize)]
pub struct CompletionRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    text: String,
}

/// Extract `choices[0].text` from a completions response body
pub fn parse_completion(body: &str) -> Result<String, BackendError> {
    let response: CompletionResponse = serde_json::from_str(body)
        .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;

    response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.text.trim().to_string())
        .ok_or_else(|| BackendError::InvalidResponse("empty choices".to_string()))
}

/// HTTP client for the configured remote providers
pub struct HttpRemoteBackend {
    client: reqwest::Client,
    providers: RemoteConfig,
    timeout: Duration,
}

impl HttpRemoteBackend {
    pub fn new(providers: RemoteConfig, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;

        Ok(Self {
            client,
            providers,
            timeout,
        })
    }

    fn provider(&self, provider: RemoteProvider) -> &RemoteProviderConfig {
        match provider {
            RemoteProvider::Primary => &self.providers.primary,
            RemoteProvider::Secondary => &self.providers.secondary,
        }
    }
}

#[async_trait]
impl RemoteBackend for HttpRemoteBackend {
    async fn complete(&self, slot: &RemoteCredential, prompt: &str) -> Result<String, BackendError> {
        let provider = self.provider(slot.provider);
        let body = CompletionRequest {
            model: &provider.model,
            prompt,
            max_tokens: provider.max_tokens,
            temperature: provider.temperature,
        };

        debug!("POST {} ({})", provider.endpoint, slot.provider);

        let response = self
            .client
            .post(&provider.endpoint)
            .bearer_auth(&slot.secret)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BackendError::Timeout(self.timeout)
                } else {
                    BackendError::Http(format!("Request failed: {}", e))
                }
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            if e.is_timeout() {
                BackendError::Timeout(self.timeout)
            } else {
                BackendError::Http(format!("Failed to read body: {}", e))
            }
        })?;

        if !status.is_success() {
            error!("{} returned HTTP {}", slot.provider, status);
            return Err(BackendError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        parse_completion(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_completion() {
        let body = r#"{"id":"cmpl-1","choices":[{"text":"  fn main() {}\n","index":0}]}"#;
        assert_eq!(parse_completion(body).unwrap(), "fn main() {}");
    }

    #[test]
    fn test_parse_completion_uses_first_choice() {
        let body = r#"{"choices":[{"text":"first"},{"text":"second"}]}"#;
        assert_eq!(parse_completion(body).unwrap(), "first");
    }

    #[test]
    fn test_parse_completion_rejects_chat_shape() {
        let body = r#"{"choices":[{"message":{"content":"hi"}}]}"#;
        assert!(matches!(
            parse_completion(body),
            Err(BackendError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_parse_completion_rejects_empty_choices() {
        assert!(matches!(
            parse_completion(r#"{"choices":[]}"#),
            Err(BackendError::InvalidResponse(_))
        ));
        assert!(parse_completion("not json").is_err());
    }

    #[test]
    fn test_request_body_shape() {
        let body = CompletionRequest {
            model: "gpt-3.5-turbo-instruct",
            prompt: "hello",
            max_tokens: 1000,
            temperature: 0.7,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "gpt-3.5-turbo-instruct");
        assert_eq!(json["prompt"], "hello");
        assert_eq!(json["max_tokens"], 1000);
        assert!(json.get("temperature").is_some());
    }
}
