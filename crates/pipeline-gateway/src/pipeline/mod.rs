//! Request forwarding pipelines.
//!
//! - [`unary`]: one request, one response
//! - [`prefetch`]: a request stream answered through a bounded sliding window
//! - [`extract`]: route tagging and response unwrapping shared by both

pub mod extract;
pub mod prefetch;
pub mod unary;

pub use extract::extract;
pub use prefetch::{Phase, PipelineTiming, PrefetchStream};
pub use unary::round_trip;
