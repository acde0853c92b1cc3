//! # Scripted Transport
//!
//! A [`Transport`] that answers every request itself, after a per-request
//! latency, and can be told to fail a given send. A shared [`Probe`] lets the
//! test observe what the gateway did to the handle.

use async_trait::async_trait;
use pipeline_bus::{Connector, Envelope, Hop, Payload, Transport, TransportError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};

type LatencyFn = Arc<dyn Fn(u64) -> Duration + Send + Sync>;

/// What a test can observe about the handles one connector handed out
#[derive(Debug, Default)]
pub struct Probe {
    connects: AtomicU64,
    sends: AtomicU64,
    recvs: AtomicU64,
    max_outstanding: AtomicU64,
    released: AtomicU64,
}

impl Probe {
    pub fn connects(&self) -> u64 {
        self.connects.load(Ordering::SeqCst)
    }

    /// Attempted sends, including a scripted failure
    pub fn sends(&self) -> u64 {
        self.sends.load(Ordering::SeqCst)
    }

    pub fn recvs(&self) -> u64 {
        self.recvs.load(Ordering::SeqCst)
    }

    /// Highest number of accepted sends not yet matched by a receive
    pub fn max_outstanding(&self) -> u64 {
        self.max_outstanding.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> u64 {
        self.released.load(Ordering::SeqCst)
    }
}

/// Hands out [`ScriptedTransport`] handles sharing one [`Probe`]
#[derive(Clone)]
pub struct ScriptedConnector {
    hop: Hop,
    latency: LatencyFn,
    fail_on_send: Option<u64>,
    probe: Arc<Probe>,
}

impl ScriptedConnector {
    /// Echo backend answering immediately
    pub fn echo() -> Self {
        Self {
            hop: Hop::new("scripted", "s-0"),
            latency: Arc::new(|_| Duration::ZERO),
            fail_on_send: None,
            probe: Arc::new(Probe::default()),
        }
    }

    /// Delay before answering the request sent at position `seq` (0-based)
    pub fn with_latency<F>(mut self, latency: F) -> Self
    where
        F: Fn(u64) -> Duration + Send + Sync + 'static,
    {
        self.latency = Arc::new(latency);
        self
    }

    /// Fail the `n`th send (1-based) of each handle
    pub fn fail_on_send(mut self, n: u64) -> Self {
        self.fail_on_send = Some(n);
        self
    }

    pub fn hop(&self) -> &Hop {
        &self.hop
    }

    pub fn probe(&self) -> Arc<Probe> {
        Arc::clone(&self.probe)
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    type Handle = ScriptedTransport;

    async fn connect(&self) -> Result<ScriptedTransport, TransportError> {
        self.probe.connects.fetch_add(1, Ordering::SeqCst);
        let (replies_tx, replies_rx) = mpsc::unbounded_channel();
        Ok(ScriptedTransport {
            script: self.clone(),
            replies_tx,
            replies: Mutex::new(replies_rx),
            seq: AtomicU64::new(0),
            sent: AtomicU64::new(0),
            received: AtomicU64::new(0),
            outstanding: AtomicU64::new(0),
        })
    }
}

/// One scripted connection
pub struct ScriptedTransport {
    script: ScriptedConnector,
    replies_tx: mpsc::UnboundedSender<Envelope>,
    replies: Mutex<mpsc::UnboundedReceiver<Envelope>>,
    seq: AtomicU64,
    sent: AtomicU64,
    received: AtomicU64,
    outstanding: AtomicU64,
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, mut envelope: Envelope) -> Result<(), TransportError> {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        let probe = &self.script.probe;
        probe.sends.fetch_add(1, Ordering::SeqCst);

        if self.script.fail_on_send == Some(seq + 1) {
            return Err(TransportError::Send(format!("scripted failure on send {}", seq + 1)));
        }

        let body = match envelope.payload() {
            Payload::Request(request) => request.body.clone(),
            Payload::Response(_) => {
                return Err(TransportError::Send("expected a request envelope".into()))
            }
        };
        envelope.add_route(&self.script.hop);
        let reply = envelope.into_reply(&self.script.hop, body);

        let outstanding = self.outstanding.fetch_add(1, Ordering::SeqCst) + 1;
        probe.max_outstanding.fetch_max(outstanding, Ordering::SeqCst);
        self.sent.fetch_add(1, Ordering::SeqCst);

        let delay = (self.script.latency)(seq);
        let replies = self.replies_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // The handle may be gone by now
            let _ = replies.send(reply);
        });
        Ok(())
    }

    async fn recv(&self) -> Result<Envelope, TransportError> {
        let envelope = self
            .replies
            .lock()
            .await
            .recv()
            .await
            .ok_or(TransportError::Closed)?;

        self.outstanding.fetch_sub(1, Ordering::SeqCst);
        self.received.fetch_add(1, Ordering::SeqCst);
        self.script.probe.recvs.fetch_add(1, Ordering::SeqCst);
        Ok(envelope)
    }

    fn sent(&self) -> u64 {
        self.sent.load(Ordering::SeqCst)
    }

    fn received(&self) -> u64 {
        self.received.load(Ordering::SeqCst)
    }
}

impl Drop for ScriptedTransport {
    fn drop(&mut self) {
        self.script.probe.released.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline_bus::Request;
    use serde_json::json;

    #[tokio::test]
    async fn test_scripted_echo() {
        let connector = ScriptedConnector::echo();
        let probe = connector.probe();
        let handle = connector.connect().await.unwrap();

        let request = Request::new(json!("ping"));
        let id = request.request_id;
        handle
            .send(Envelope::request(request, &Hop::new("gateway", "gw")))
            .await
            .unwrap();
        let reply = handle.recv().await.unwrap();

        assert_eq!(reply.request_id(), id);
        assert_eq!(reply.sender(), "scripted");
        assert_eq!((handle.sent(), handle.received()), (1, 1));
        assert_eq!(probe.max_outstanding(), 1);

        drop(handle);
        assert_eq!(probe.released(), 1);
    }

    #[tokio::test]
    async fn test_scripted_failure() {
        let connector = ScriptedConnector::echo().fail_on_send(2);
        let handle = connector.connect().await.unwrap();
        let gateway = Hop::new("gateway", "gw");

        assert!(handle
            .send(Envelope::request(Request::new(json!(1)), &gateway))
            .await
            .is_ok());
        assert!(matches!(
            handle
                .send(Envelope::request(Request::new(json!(2)), &gateway))
                .await,
            Err(TransportError::Send(_))
        ));
        assert_eq!(handle.sent(), 1);
        assert_eq!(connector.probe().sends(), 2);
    }
}
