//! Fake backends for testing.
//!
//! Responses are consumed in order; the last one repeats. Every call is
//! recorded so tests can assert which paths the router actually took.

use super::{BackendError, LocalBackend, LocalFailure, RemoteBackend};
use crate::availability::{RemoteCredential, RemoteProvider};
use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn next_response<T: Clone>(responses: &Mutex<Vec<T>>) -> Option<T> {
    let mut responses = lock(responses);
    match responses.len() {
        0 => None,
        1 => Some(responses[0].clone()),
        _ => Some(responses.remove(0)),
    }
}

/// Fake remote provider
pub struct FakeRemoteBackend {
    responses: Mutex<Vec<Result<String, BackendError>>>,
    calls: Mutex<Vec<(RemoteProvider, String)>>,
}

impl FakeRemoteBackend {
    pub fn new(responses: Vec<Result<String, BackendError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn succeeding(text: impl Into<String>) -> Self {
        Self::new(vec![Ok(text.into())])
    }

    pub fn failing(error: BackendError) -> Self {
        Self::new(vec![Err(error)])
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Provider and prompt of every call, in order
    pub fn calls(&self) -> Vec<(RemoteProvider, String)> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl RemoteBackend for FakeRemoteBackend {
    async fn complete(&self, slot: &RemoteCredential, prompt: &str) -> Result<String, BackendError> {
        lock(&self.calls).push((slot.provider, prompt.to_string()));
        next_response(&self.responses).unwrap_or_else(|| {
            Err(BackendError::InvalidResponse(
                "fake has no responses".to_string(),
            ))
        })
    }
}

/// Fake local model
pub struct FakeLocalBackend {
    responses: Mutex<Vec<Result<String, LocalFailure>>>,
    prompts: Mutex<Vec<String>>,
}

impl FakeLocalBackend {
    pub fn new(responses: Vec<Result<String, LocalFailure>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn succeeding(text: impl Into<String>) -> Self {
        Self::new(vec![Ok(text.into())])
    }

    pub fn failing(failure: LocalFailure) -> Self {
        Self::new(vec![Err(failure)])
    }

    pub fn call_count(&self) -> usize {
        lock(&self.prompts).len()
    }

    pub fn prompts(&self) -> Vec<String> {
        lock(&self.prompts).clone()
    }
}

#[async_trait]
impl LocalBackend for FakeLocalBackend {
    async fn generate(&self, prompt: &str) -> Result<String, LocalFailure> {
        lock(&self.prompts).push(prompt.to_string());
        next_response(&self.responses).unwrap_or(Err(LocalFailure::NotConfigured))
    }
}
