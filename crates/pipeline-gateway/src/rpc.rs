//! Object-safe call surface for RPC front-ends.
//!
//! A server adapter (gRPC, HTTP streaming, ...) holds an
//! `Arc<dyn PipelineRpc>` and never names the connector type.

use crate::domain::error::GatewayError;
use crate::service::Gateway;
use async_trait::async_trait;
use futures::Stream;
use pipeline_bus::{Connector, Request, Response};
use std::pin::Pin;

/// Requests arriving from a client
pub type RequestStream = Pin<Box<dyn Stream<Item = Request> + Send>>;

/// Responses going back to a client
pub type ResponseStream = Pin<Box<dyn Stream<Item = Result<Response, GatewayError>> + Send>>;

/// The two call shapes a gateway serves
#[async_trait]
pub trait PipelineRpc: Send + Sync {
    /// One request, one response
    async fn call_unary(&self, request: Request) -> Result<Response, GatewayError>;

    /// A request stream answered in completion order
    async fn call(&self, requests: RequestStream) -> Result<ResponseStream, GatewayError>;
}

#[async_trait]
impl<C: Connector> PipelineRpc for Gateway<C> {
    async fn call_unary(&self, request: Request) -> Result<Response, GatewayError> {
        Gateway::call_unary(self, request).await
    }

    async fn call(&self, requests: RequestStream) -> Result<ResponseStream, GatewayError> {
        let responses = Gateway::call(self, requests).await?;
        Ok(Box::pin(responses))
    }
}
