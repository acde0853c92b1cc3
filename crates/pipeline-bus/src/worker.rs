//! # Worker
//!
//! An in-process backend stage. A [`Worker`] accepts [`BackendConnection`]s,
//! records itself on every request's route and answers each one after a
//! latency chosen per request. Requests on one connection are answered
//! concurrently, so the latency policy decides the order replies come back in.

use crate::channel::BackendConnection;
use crate::envelope::{Envelope, Hop, Payload, Request};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Computes a response body from a request.
pub type Handler = Arc<dyn Fn(&Request) -> serde_json::Value + Send + Sync>;

/// Latency for the `n`-th request (zero-based) on a connection.
pub type Latency = Arc<dyn Fn(u64) -> Duration + Send + Sync>;

/// In-process backend stage.
pub struct Worker {
    hop: Hop,
    handler: Handler,
    latency: Latency,
}

impl Worker {
    /// A worker that answers every request with its own body, immediately.
    pub fn echo(hop: Hop) -> Self {
        Self {
            hop,
            handler: Arc::new(|request: &Request| request.body.clone()),
            latency: Arc::new(|_| Duration::ZERO),
        }
    }

    /// Replace the response handler.
    #[must_use]
    pub fn with_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Request) -> serde_json::Value + Send + Sync + 'static,
    {
        self.handler = Arc::new(handler);
        self
    }

    /// Replace the latency policy.
    #[must_use]
    pub fn with_latency<F>(mut self, latency: F) -> Self
    where
        F: Fn(u64) -> Duration + Send + Sync + 'static,
    {
        self.latency = Arc::new(latency);
        self
    }

    pub fn hop(&self) -> &Hop {
        &self.hop
    }

    /// Serve connections in a background task.
    pub fn spawn(self, incoming: mpsc::Receiver<BackendConnection>) -> JoinHandle<()> {
        tokio::spawn(self.run(incoming))
    }

    /// Serve connections until the connector is dropped.
    pub async fn run(self, mut incoming: mpsc::Receiver<BackendConnection>) {
        info!(worker = %self.hop, "Worker started");
        let worker = Arc::new(self);

        while let Some(connection) = incoming.recv().await {
            tokio::spawn(Arc::clone(&worker).serve(connection));
        }

        info!(worker = %worker.hop, "Worker stopped, connector dropped");
    }

    async fn serve(self: Arc<Self>, mut connection: BackendConnection) {
        let id = connection.id();
        let mut seq = 0u64;
        debug!(worker = %self.hop, connection = id, "Serving connection");

        while let Some(envelope) = connection.recv().await {
            let delay = (self.latency)(seq);
            seq += 1;

            let Some(reply) = self.answer(envelope) else {
                continue;
            };
            let responder = connection.responder();

            tokio::spawn(async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                if responder.send(reply).await.is_err() {
                    debug!(connection = id, "Reply dropped, gateway hung up");
                }
            });
        }

        debug!(worker = %self.hop, connection = id, handled = seq, "Connection closed");
    }

    fn answer(&self, mut envelope: Envelope) -> Option<Envelope> {
        let body = match envelope.payload() {
            Payload::Request(request) => (self.handler)(request),
            Payload::Response(_) => {
                warn!(
                    worker = %self.hop,
                    request_id = %envelope.request_id(),
                    "Worker received a response envelope, ignoring"
                );
                return None;
            }
        };

        envelope.add_route(&self.hop);
        Some(envelope.into_reply(&self.hop, body))
    }
}
