//! # Standardized Error Types
//!
//! The error taxonomy shared by every crate in the stylist workspace. Each
//! crate keeps its own `thiserror` enum and maps it onto an [`ErrorKind`]
//! through [`Classify`], which decides whether the failure is absorbed into a
//! fallback or surfaces to the HTTP layer.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Categorizes different kinds of errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Malformed request; rejected before any stage runs
    Validation,
    /// Failure talking to the model endpoint (timeout, network, HTTP status)
    Transport,
    /// Model output could not be parsed
    Decode,
    /// The wardrobe/profile service failed or returned an unexpected shape
    UpstreamDependency,
    /// Anything else
    Unhandled,
}

impl ErrorKind {
    /// HTTP status this kind maps to when it reaches the HTTP layer.
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorKind::Validation => 400,
            _ => 500,
        }
    }

    /// Whether the orchestrator converts this kind into a fallback value
    /// instead of failing the request.
    pub fn is_absorbed(&self) -> bool {
        matches!(
            self,
            ErrorKind::Transport | ErrorKind::Decode | ErrorKind::UpstreamDependency
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "ValidationError",
            ErrorKind::Transport => "TransportError",
            ErrorKind::Decode => "DecodeError",
            ErrorKind::UpstreamDependency => "UpstreamDependencyError",
            ErrorKind::Unhandled => "UnhandledError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Implemented by every crate-level error enum.
pub trait Classify {
    fn kind(&self) -> ErrorKind;

    /// Retryable at the transport level. Only transport errors can be.
    fn is_retryable(&self) -> bool {
        false
    }
}
