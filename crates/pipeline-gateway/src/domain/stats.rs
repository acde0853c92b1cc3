//! Per-call pipeline counters.
//!
//! Written only by the call's scheduler; anyone holding the `Arc` may read.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one streaming call
#[derive(Debug, Default)]
pub struct PipelineStats {
    /// Requests admitted into the window
    sent: AtomicU64,
    /// Responses delivered to the consumer
    received: AtomicU64,
}

impl PipelineStats {
    pub(crate) fn record_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    /// Requests sent but not yet answered
    pub fn pending(&self) -> u64 {
        self.snapshot().pending
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        // received first: sent only grows, so the pair never shows received > sent
        let received = self.received();
        let sent = self.sent();
        StatsSnapshot {
            sent,
            received,
            pending: sent.saturating_sub(received),
        }
    }
}

/// Point-in-time view of [`PipelineStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub sent: u64,
    pub received: u64,
    pub pending: u64,
}
