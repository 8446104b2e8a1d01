//! Shared types for codebroker components.
//!
//! The daemon and the client both speak the line-delimited JSON protocol
//! defined here.

pub mod error;
pub mod persona;
pub mod protocol;

pub use error::BrokerError;
pub use persona::{PersonaId, PersonaProfile, Style};
pub use protocol::{
    Action, ConnectionNotice, HealthReport, InboundRequest, Mode, ResponseEnvelope,
    INVALID_FORMAT_MESSAGE,
};

/// Version of the codebroker components
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
