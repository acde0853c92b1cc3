//! # In-Process Channel Transport
//!
//! A [`Connector`] backed by `tokio::sync::mpsc`. Each `connect()` creates a
//! fresh pair of bounded channels; the backend half is delivered to whoever
//! holds the listener returned by [`ChannelConnector::new`].
//!
//! Suitable for single-process deployments, the demo binary and tests.

use crate::envelope::Envelope;
use crate::transport::{Connector, Transport, TransportError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

/// Connection bookkeeping shared by a connector and its handles.
#[derive(Debug, Default)]
pub struct ConnectorStats {
    next_id: AtomicU64,
    opened: AtomicU64,
    released: AtomicU64,
}

impl ConnectorStats {
    /// Total handles handed out
    pub fn opened(&self) -> u64 {
        self.opened.load(Ordering::Relaxed)
    }

    /// Total handles dropped
    pub fn released(&self) -> u64 {
        self.released.load(Ordering::Relaxed)
    }

    /// Handles currently alive
    pub fn active(&self) -> u64 {
        self.opened().saturating_sub(self.released())
    }
}

/// Backend side of one connection.
#[derive(Debug)]
pub struct BackendConnection {
    id: u64,
    requests: mpsc::Receiver<Envelope>,
    responses: mpsc::Sender<Envelope>,
}

impl BackendConnection {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Next envelope from the gateway, `None` once the handle is dropped.
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.requests.recv().await
    }

    /// Sender for replies; clone it into per-request tasks.
    pub fn responder(&self) -> mpsc::Sender<Envelope> {
        self.responses.clone()
    }
}

/// Connector for the in-process transport.
#[derive(Clone)]
pub struct ChannelConnector {
    listener: mpsc::Sender<BackendConnection>,
    capacity: usize,
    stats: Arc<ConnectorStats>,
}

impl ChannelConnector {
    /// Create a connector whose per-connection channels hold `capacity`
    /// envelopes in each direction.
    ///
    /// The returned receiver yields one [`BackendConnection`] per `connect()`.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<BackendConnection>) {
        let (listener, incoming) = mpsc::channel(crate::DEFAULT_CHANNEL_CAPACITY);
        let connector = Self {
            listener,
            capacity: capacity.max(1),
            stats: Arc::new(ConnectorStats::default()),
        };
        (connector, incoming)
    }

    pub fn stats(&self) -> Arc<ConnectorStats> {
        Arc::clone(&self.stats)
    }
}

#[async_trait]
impl Connector for ChannelConnector {
    type Handle = ChannelTransport;

    async fn connect(&self) -> Result<ChannelTransport, TransportError> {
        let (req_tx, req_rx) = mpsc::channel(self.capacity);
        let (resp_tx, resp_rx) = mpsc::channel(self.capacity);
        let id = self.stats.next_id.fetch_add(1, Ordering::Relaxed);

        let backend = BackendConnection {
            id,
            requests: req_rx,
            responses: resp_tx,
        };
        self.listener
            .send(backend)
            .await
            .map_err(|_| TransportError::Connect("no backend is listening".into()))?;

        self.stats.opened.fetch_add(1, Ordering::Relaxed);
        debug!(connection = id, "Transport connected");

        Ok(ChannelTransport {
            id,
            outbound: req_tx,
            inbound: Mutex::new(resp_rx),
            sent: AtomicU64::new(0),
            received: AtomicU64::new(0),
            stats: Arc::clone(&self.stats),
        })
    }
}

/// Gateway side of one connection.
pub struct ChannelTransport {
    id: u64,
    outbound: mpsc::Sender<Envelope>,
    inbound: Mutex<mpsc::Receiver<Envelope>>,
    sent: AtomicU64,
    received: AtomicU64,
    stats: Arc<ConnectorStats>,
}

impl ChannelTransport {
    pub fn id(&self) -> u64 {
        self.id
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn send(&self, envelope: Envelope) -> Result<(), TransportError> {
        self.outbound
            .send(envelope)
            .await
            .map_err(|_| TransportError::Closed)?;
        self.sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn recv(&self) -> Result<Envelope, TransportError> {
        let mut inbound = self.inbound.lock().await;
        let envelope = inbound.recv().await.ok_or(TransportError::Closed)?;
        self.received.fetch_add(1, Ordering::Relaxed);
        Ok(envelope)
    }

    fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }
}

impl Drop for ChannelTransport {
    fn drop(&mut self) {
        self.stats.released.fetch_add(1, Ordering::Relaxed);
        debug!(
            connection = self.id,
            sent = self.sent(),
            received = self.received(),
            "Transport released"
        );
    }
}
