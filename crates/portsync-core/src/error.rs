//! Error types for portsync
//!
//! Collaborators report their outcome through [`crate::PortQuery`]; this module
//! classifies what the orchestrator and the daemon make of those outcomes.

use thiserror::Error;

/// Result type alias for portsync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for portsync
#[derive(Error, Debug)]
pub enum Error {
    /// Credentials were rejected by a collaborator
    #[error("{service} auth error: {message}")]
    Authentication {
        /// Service that rejected the credentials
        service: &'static str,
        /// Error message reported by the collaborator
        message: String,
    },

    /// A collaborator could not be reached or answered with an error
    #[error("{service} unreachable: {message}")]
    Unreachable {
        /// Service that failed
        service: &'static str,
        /// Error message reported by the collaborator
        message: String,
    },

    /// The client never reported the port that was written
    #[error("Port verification failed: expected {expected}, got {}", display_port(.last_seen))]
    VerificationFailed {
        /// Port written to the client
        expected: u16,
        /// Last port read back, if any read succeeded
        last_seen: Option<u16>,
    },

    /// Services did not become ready within the startup budget
    #[error("Services not ready after {attempts} attempts")]
    StartupTimeout {
        /// Attempts made before giving up
        attempts: u32,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(String),
}

impl Error {
    /// Create an authentication error
    pub fn auth(service: &'static str, message: impl Into<String>) -> Self {
        Self::Authentication {
            service,
            message: message.into(),
        }
    }

    /// Create an unreachable-service error
    pub fn unreachable(service: &'static str, message: impl Into<String>) -> Self {
        Self::Unreachable {
            service,
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Whether this error comes from rejected credentials
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }
}

fn display_port(port: &Option<u16>) -> String {
    port.map(|p| p.to_string()).unwrap_or_else(|| "none".to_string())
}
