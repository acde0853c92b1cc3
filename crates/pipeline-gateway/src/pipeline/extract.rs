//! Response extraction.

use crate::domain::error::GatewayError;
use pipeline_bus::{Envelope, Hop, Response};

/// Record `hop` on a received envelope and unwrap its response.
///
/// Takes the envelope by value, so each envelope is tagged at most once.
pub fn extract(mut envelope: Envelope, hop: &Hop) -> Result<Response, GatewayError> {
    envelope.add_route(hop);
    envelope
        .into_response()
        .map_err(|envelope| GatewayError::UnexpectedPayload {
            request_id: envelope.request_id(),
        })
}
