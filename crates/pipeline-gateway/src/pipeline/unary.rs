//! Unary round trip: one request, one response.

use crate::domain::error::GatewayError;
use crate::pipeline::extract::extract;
use pipeline_bus::{Envelope, Hop, Request, Response, Transport};
use tracing::debug;

/// Send `request` over `transport` and wait for one reply.
///
/// Takes the handle by value: it is released when this future completes or is
/// dropped, whatever the outcome.
pub async fn round_trip<T: Transport>(
    transport: T,
    hop: &Hop,
    request: Request,
) -> Result<Response, GatewayError> {
    let request_id = request.request_id;
    transport.send(Envelope::request(request, hop)).await?;
    debug!(request_id = %request_id, "Sent unary request");

    let envelope = transport.recv().await?;
    let response = extract(envelope, hop)?;
    debug!(
        request_id = %request_id,
        hops = response.route.len(),
        "Received unary response"
    );
    Ok(response)
}
