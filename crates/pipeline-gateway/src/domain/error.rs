//! Gateway error types.
//!
//! Status codes follow the gRPC numbering so RPC front-ends can map errors
//! without a lookup table of their own.

use crate::domain::config::ConfigError;
use pipeline_bus::{RequestId, TransportError};

/// Numeric status codes reported for gateway errors
pub mod codes {
    pub const INVALID_ARGUMENT: i32 = 3;
    pub const INTERNAL: i32 = 13;
    pub const UNAVAILABLE: i32 = 14;
}

/// Errors surfaced to gateway callers
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The client opened a stream and sent no requests
    #[error("received an empty request stream from the client")]
    EmptyInput,

    /// Sending to or receiving from the backend failed
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    /// The backend answered with something other than a response
    #[error("expected a response envelope for request {request_id}")]
    UnexpectedPayload { request_id: RequestId },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl GatewayError {
    /// Status code for this error
    pub fn code(&self) -> i32 {
        match self {
            GatewayError::EmptyInput => codes::INVALID_ARGUMENT,
            GatewayError::Transport(_) => codes::UNAVAILABLE,
            GatewayError::UnexpectedPayload { .. } | GatewayError::Config(_) => codes::INTERNAL,
        }
    }

    /// Caused by the client rather than the gateway or backend
    pub fn is_client_error(&self) -> bool {
        matches!(self, GatewayError::EmptyInput)
    }
}

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;
