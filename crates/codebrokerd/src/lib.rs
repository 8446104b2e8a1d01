//! codebrokerd library - exposes modules for testing.

pub mod availability;
pub mod backends;
pub mod broker;
pub mod config;
pub mod fallback;
pub mod health;
pub mod normalizer;
pub mod prompt;
pub mod router;
pub mod server;
