// # Port Query Result
//
// Every collaborator call returns a classified outcome instead of raising.
// The engine matches on all three variants, so a new failure class cannot be
// silently ignored at a call site.

/// Outcome of a single port query against a collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortQuery {
    /// The collaborator answered.
    ///
    /// `None` means there is currently no value to report (for the gateway:
    /// the VPN is disconnected or forwarding is inactive). It is not an error.
    Ok(Option<u16>),

    /// Credentials were rejected. Never retried by the engine within the
    /// same operation.
    AuthFailure(String),

    /// Network error, timeout, server error or malformed payload.
    TransientFailure(String),
}

impl PortQuery {
    /// Successful answer carrying a port
    pub fn port(port: u16) -> Self {
        Self::Ok(Some(port))
    }

    /// Successful answer without a value
    pub fn no_port() -> Self {
        Self::Ok(None)
    }

    /// Create an authentication failure
    pub fn auth_failure(msg: impl Into<String>) -> Self {
        Self::AuthFailure(msg.into())
    }

    /// Create a transient failure
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::TransientFailure(msg.into())
    }

    /// Whether the collaborator answered, with or without a value
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::AuthFailure(_))
    }

    /// The reported port, if the query succeeded with a value
    pub fn value(&self) -> Option<u16> {
        match self {
            Self::Ok(port) => *port,
            _ => None,
        }
    }

    /// The failure message, if the query failed
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Ok(_) => None,
            Self::AuthFailure(msg) | Self::TransientFailure(msg) => Some(msg),
        }
    }
}
