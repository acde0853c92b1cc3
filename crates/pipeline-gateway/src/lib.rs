//! # Pipeline Gateway - Forwards Client Calls to a Backend Pipeline
//!
//! Accepts unary calls and request streams, wraps each request in an
//! [`Envelope`](pipeline_bus::Envelope), and forwards it over a per-call
//! [`Transport`](pipeline_bus::Transport) handle.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       PIPELINE GATEWAY                        │
//! ├──────────────────────────────────────────────────────────────┤
//! │   client ──→ PipelineRpc ──→ Gateway ──→ Connector::connect   │
//! │                                 │                             │
//! │            ┌────────────────────┴───────────────────┐         │
//! │            ▼                                        ▼         │
//! │      unary::round_trip                  prefetch::PrefetchStream
//! │      (send 1, recv 1)             (bounded window of in-flight │
//! │            │                       send/recv pairs)           │
//! │            └──────────────→ extract ←───────────────┘         │
//! │                        (route += gateway hop)                 │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Streaming Calls
//!
//! The first `prefetch` requests are sent before anything is awaited. After
//! that, every delivered response admits up to `prefetch_on_recv` more, and
//! the window never holds more than `max(prefetch, prefetch_on_recv)`.
//! Responses come back in completion order.
//!
//! # Usage
//!
//! ```ignore
//! use pipeline_gateway::{Gateway, GatewayConfig};
//!
//! let gateway = Gateway::new(GatewayConfig::default(), connector)?;
//! let mut responses = gateway.call(requests).await?;
//! while let Some(response) = responses.next().await {
//!     println!("{:?}", response?);
//! }
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod domain;
pub mod pipeline;
pub mod rpc;
pub mod service;
pub mod telemetry;

// Re-exports
pub use domain::{
    ConfigError, GatewayConfig, GatewayError, GatewayResult, LoggingConfig, PipelineStats,
    StatsSnapshot, WindowPolicy,
};
pub use pipeline::{Phase, PipelineTiming, PrefetchStream};
pub use rpc::{PipelineRpc, RequestStream, ResponseStream};
pub use service::Gateway;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
