//! # Transport Contracts
//!
//! The gateway never talks to sockets directly. It acquires a [`Transport`]
//! handle from a [`Connector`] at the start of a call and drops it at the end;
//! dropping the handle is what closes the underlying connection.

use crate::envelope::Envelope;
use async_trait::async_trait;
use thiserror::Error;

/// Transport error types
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// No connection could be established.
    #[error("connect failed: {0}")]
    Connect(String),

    /// An envelope could not be handed to the backend.
    #[error("send failed: {0}")]
    Send(String),

    /// Receiving the next envelope failed.
    #[error("receive failed: {0}")]
    Recv(String),

    /// The peer closed the connection.
    #[error("connection closed")]
    Closed,
}

/// A per-call connection to the backend.
///
/// Handles are owned by exactly one call. Implementations release their
/// connection in `Drop`.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Send one envelope.
    async fn send(&self, envelope: Envelope) -> Result<(), TransportError>;

    /// Receive the next envelope from the backend.
    ///
    /// Envelopes arrive in the order the backend answers, which need not be
    /// the order they were sent in.
    async fn recv(&self) -> Result<Envelope, TransportError>;

    /// Number of completed sends.
    fn sent(&self) -> u64;

    /// Number of completed receives.
    fn received(&self) -> u64;
}

/// Hands out [`Transport`] handles.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Handle: Transport;

    /// Acquire a fresh handle for one call.
    async fn connect(&self) -> Result<Self::Handle, TransportError>;
}
