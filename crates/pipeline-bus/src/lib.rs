//! # Pipeline Bus - Envelopes and Transports Between Pipeline Stages
//!
//! Everything a gateway needs to forward work to a backend without knowing
//! how the bytes move.
//!
//! ## Message Flow
//!
//! ```text
//! ┌──────────────┐   Envelope(Request)    ┌──────────────┐
//! │   Gateway    │ ─────── send() ──────→ │    Worker    │
//! │              │                        │              │
//! │              │ ←────── recv() ─────── │              │
//! └──────────────┘   Envelope(Response)   └──────────────┘
//!        route: [gateway] → [gateway, worker] → [gateway, worker, gateway]
//! ```
//!
//! ## Contracts
//!
//! - Every message is wrapped in an [`Envelope`] whose route is append-only
//! - A [`Transport`] handle belongs to one call and is released on drop
//! - The in-process [`ChannelConnector`] and [`Worker`] back the demo binary
//!   and the test suite

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod channel;
pub mod envelope;
pub mod transport;
pub mod worker;

// Re-export main types
pub use channel::{BackendConnection, ChannelConnector, ChannelTransport, ConnectorStats};
pub use envelope::{Envelope, Hop, Payload, Request, RequestId, Response, RouteEntry};
pub use transport::{Connector, Transport, TransportError};
pub use worker::Worker;

/// Maximum pending connections a [`ChannelConnector`] buffers before
/// `connect()` waits for the backend to accept.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
