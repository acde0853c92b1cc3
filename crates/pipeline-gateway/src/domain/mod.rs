//! Domain types for the Pipeline Gateway.
//!
//! Configuration, errors, window sizing and per-call counters. Nothing here
//! touches a transport.

pub mod config;
pub mod error;
pub mod stats;
pub mod window;

// Re-exports for convenience
pub use config::{ConfigError, GatewayConfig, LoggingConfig};
pub use error::{GatewayError, GatewayResult};
pub use stats::{PipelineStats, StatsSnapshot};
pub use window::WindowPolicy;
