//! Streaming prefetch scheduler.
//!
//! Turns a stream of client requests into a stream of backend responses while
//! keeping a bounded window of requests in flight on one transport handle.
//!
//! ```text
//!              ┌─────────────┐  window full or      ┌─────────────┐
//!   start ───→ │ Prefetching │ ──source exhausted─→ │  Streaming  │ ──window empty and──→ Done
//!              └──────┬──────┘                      └──────┬──────┘   source exhausted
//!                     │ zero requests                      │ transport failure
//!                     ▼                                    ▼
//!               Err(EmptyInput)                       Err(Transport)
//! ```
//!
//! Every in-flight request is a future in a `FuturesUnordered`, polled only
//! from `poll_next`, so the whole call runs on the consumer's task. Responses
//! are yielded in completion order, not submission order. Dropping the stream
//! cancels the outstanding futures and releases the transport handle.

use crate::domain::error::GatewayError;
use crate::domain::stats::{PipelineStats, StatsSnapshot};
use crate::domain::window::WindowPolicy;
use crate::pipeline::extract::extract;
use futures::future::BoxFuture;
use futures::stream::{FusedStream, FuturesUnordered, Stream, StreamExt};
use futures::FutureExt;
use pin_project_lite::pin_project;
use pipeline_bus::{Envelope, Hop, Request, Response, Transport};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use std::time::Duration;
use tokio::time::{Instant, Sleep};
use tracing::{debug, error, info, info_span, warn, Span};

type InFlight = BoxFuture<'static, Result<Response, GatewayError>>;

/// Diagnostic timing for a streaming call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineTiming {
    /// Warn once when the initial fill is still running after this
    pub prefetch_warn_after: Duration,
    /// Minimum time between progress snapshots
    pub stats_interval: Duration,
}

impl Default for PipelineTiming {
    fn default() -> Self {
        Self {
            prefetch_warn_after: Duration::from_secs(5),
            stats_interval: Duration::from_secs(1),
        }
    }
}

/// Where a streaming call is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Prefetching,
    Streaming,
    Done,
}

/// Result of pulling one more request from the source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    Admitted,
    Exhausted,
}

pin_project! {
    /// Response stream of one streaming call.
    ///
    /// Yields `Ok(response)` per request in completion order. A failure is
    /// yielded once as `Err` and ends the stream.
    pub struct PrefetchStream<S, T> {
        #[pin]
        source: S,
        pipeline: Pipeline<T>,
    }
}

impl<S, T> PrefetchStream<S, T>
where
    S: Stream<Item = Request>,
    T: Transport,
{
    /// Start a call over an already acquired handle. Nothing is sent until the
    /// stream is first polled.
    pub fn new(
        source: S,
        transport: T,
        hop: Hop,
        policy: WindowPolicy,
        timing: PipelineTiming,
    ) -> Self {
        let span = info_span!(
            "stream_call",
            call_id = %uuid::Uuid::new_v4(),
            gateway = %hop,
        );
        let now = Instant::now();

        Self {
            source,
            pipeline: Pipeline {
                transport: Some(Arc::new(transport)),
                hop,
                policy,
                timing,
                window: FuturesUnordered::new(),
                stats: Arc::new(PipelineStats::default()),
                credit: 0,
                exhausted: false,
                phase: Phase::Prefetching,
                prefetch_started: None,
                prefetch_timer: None,
                prefetch_warned: false,
                last_snapshot: now,
                span,
            },
        }
    }
}

impl<S, T> PrefetchStream<S, T> {
    /// Current `sent` / `received` / `pending` counts
    pub fn stats(&self) -> StatsSnapshot {
        self.pipeline.stats.snapshot()
    }

    /// Shared counters, readable while the stream is being consumed elsewhere
    pub fn stats_handle(&self) -> Arc<PipelineStats> {
        Arc::clone(&self.pipeline.stats)
    }

    /// Requests currently in the window
    pub fn in_flight(&self) -> usize {
        self.pipeline.window.len()
    }

    pub fn phase(&self) -> Phase {
        self.pipeline.phase
    }

    pub fn policy(&self) -> WindowPolicy {
        self.pipeline.policy
    }
}

impl<S, T> Stream for PrefetchStream<S, T>
where
    S: Stream<Item = Request>,
    T: Transport,
{
    type Item = Result<Response, GatewayError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        let mut source = this.source;
        let pipeline = this.pipeline;
        let span = pipeline.span.clone();
        let _entered = span.enter();

        match pipeline.phase {
            Phase::Prefetching => {
                pipeline.prefetch_started.get_or_insert_with(Instant::now);
                pipeline.fill(source.as_mut(), cx);

                if pipeline.exhausted && pipeline.window.is_empty() && pipeline.stats.sent() == 0 {
                    error!(
                        "Received an empty request stream from the client, \
                         check that the client's request source yields anything"
                    );
                    pipeline.finish();
                    return Poll::Ready(Some(Err(GatewayError::EmptyInput)));
                }

                if pipeline.exhausted || pipeline.window.len() >= pipeline.policy.initial() {
                    pipeline.prefetch_filled();
                    pipeline.phase = Phase::Streaming;
                } else {
                    pipeline.poll_prefetch_timer(cx);
                }
                pipeline.poll_window(cx)
            }
            Phase::Streaming => {
                pipeline.refill(source.as_mut(), cx);
                pipeline.poll_window(cx)
            }
            Phase::Done => Poll::Ready(None),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self.pipeline.phase {
            Phase::Done => (0, Some(0)),
            _ => (self.pipeline.window.len(), None),
        }
    }
}

impl<S, T> FusedStream for PrefetchStream<S, T>
where
    S: Stream<Item = Request>,
    T: Transport,
{
    fn is_terminated(&self) -> bool {
        self.pipeline.phase == Phase::Done
    }
}

/// Call state apart from the pinned request source.
struct Pipeline<T> {
    /// `None` once the call reached a terminal state
    transport: Option<Arc<T>>,
    hop: Hop,
    policy: WindowPolicy,
    timing: PipelineTiming,
    window: FuturesUnordered<InFlight>,
    stats: Arc<PipelineStats>,
    /// Admissions owed by delivered responses
    credit: usize,
    exhausted: bool,
    phase: Phase,
    prefetch_started: Option<Instant>,
    /// Armed while prefetching, fires the slow fill warning
    prefetch_timer: Option<Pin<Box<Sleep>>>,
    prefetch_warned: bool,
    last_snapshot: Instant,
    span: Span,
}

impl<T: Transport> Pipeline<T> {
    /// Pull one request from the source and put it in flight.
    fn try_admit<S>(&mut self, source: Pin<&mut S>, cx: &mut Context<'_>) -> Poll<Admission>
    where
        S: Stream<Item = Request>,
    {
        if self.exhausted {
            return Poll::Ready(Admission::Exhausted);
        }

        match ready!(source.poll_next(cx)) {
            Some(request) => {
                self.admit(request);
                Poll::Ready(Admission::Admitted)
            }
            None => {
                self.exhausted = true;
                debug!(sent = self.stats.sent(), "Request source exhausted");
                Poll::Ready(Admission::Exhausted)
            }
        }
    }

    fn admit(&mut self, request: Request) {
        // Admission only happens before `finish`
        let Some(transport) = self.transport.as_ref().map(Arc::clone) else {
            return;
        };
        let request_id = request.request_id;
        let envelope = Envelope::request(request, &self.hop);

        self.stats.record_sent();
        self.window
            .push(exchange(transport, envelope, self.hop.clone()).boxed());

        debug!(
            request_id = %request_id,
            in_flight = self.window.len(),
            "Admitted request"
        );
    }

    /// Top the window up to `initial`, stopping early if the source is not ready.
    fn fill<S>(&mut self, mut source: Pin<&mut S>, cx: &mut Context<'_>)
    where
        S: Stream<Item = Request>,
    {
        while self.window.len() < self.policy.initial() {
            match self.try_admit(source.as_mut(), cx) {
                Poll::Ready(Admission::Admitted) => {}
                Poll::Ready(Admission::Exhausted) | Poll::Pending => break,
            }
        }
    }

    /// Spend credit on new admissions in source order, never past the window cap.
    fn refill<S>(&mut self, mut source: Pin<&mut S>, cx: &mut Context<'_>)
    where
        S: Stream<Item = Request>,
    {
        while self.credit > 0 && self.window.len() < self.policy.capacity() {
            match self.try_admit(source.as_mut(), cx) {
                Poll::Ready(Admission::Admitted) => self.credit -= 1,
                Poll::Ready(Admission::Exhausted) => self.credit = 0,
                Poll::Pending => break,
            }
        }
    }

    fn poll_window(&mut self, cx: &mut Context<'_>) -> Poll<Option<Result<Response, GatewayError>>> {
        match self.window.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(response))) => {
                self.stats.record_received();
                // While prefetching, `fill` replaces delivered requests instead
                if self.phase == Phase::Streaming {
                    self.credit =
                        (self.credit + self.policy.replenish()).min(self.policy.capacity());
                }
                debug!(
                    request_id = %response.request_id,
                    in_flight = self.window.len(),
                    "Delivered response"
                );
                self.maybe_snapshot();
                Poll::Ready(Some(Ok(response)))
            }
            Poll::Ready(Some(Err(err))) => {
                let snapshot = self.stats.snapshot();
                error!(
                    error = %err,
                    sent = snapshot.sent,
                    received = snapshot.received,
                    pending = snapshot.pending,
                    "Streaming call aborted"
                );
                self.finish();
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(None) if self.exhausted => {
                let snapshot = self.stats.snapshot();
                debug_assert_eq!(snapshot.sent, snapshot.received);
                info!(
                    sent = snapshot.sent,
                    received = snapshot.received,
                    "Streaming call complete"
                );
                self.finish();
                Poll::Ready(None)
            }
            // Empty window with the source not exhausted: `fill` or `refill`
            // registered the waker with the source.
            Poll::Ready(None) | Poll::Pending => Poll::Pending,
        }
    }

    /// Warn once if the fill is still running after `prefetch_warn_after`.
    fn poll_prefetch_timer(&mut self, cx: &mut Context<'_>) {
        if self.prefetch_warned {
            return;
        }
        let warn_after = self.timing.prefetch_warn_after;
        let timer = self
            .prefetch_timer
            .get_or_insert_with(|| Box::pin(tokio::time::sleep(warn_after)));
        if timer.as_mut().poll(cx).is_ready() {
            self.prefetch_timer = None;
            self.warn_slow_prefetch();
        }
    }

    fn warn_slow_prefetch(&mut self) {
        self.prefetch_warned = true;
        warn!(
            prefetch = self.policy.initial(),
            in_flight = self.window.len(),
            sent = self.stats.sent(),
            elapsed_ms = self.prefetch_elapsed().as_millis() as u64,
            "Prefetching is taking longer than expected; if this keeps happening, \
             lower `prefetch` or check that the client keeps sending requests"
        );
    }

    fn prefetch_filled(&mut self) {
        self.prefetch_timer = None;
        let elapsed = self.prefetch_elapsed();
        if !self.prefetch_warned && elapsed > self.timing.prefetch_warn_after {
            self.warn_slow_prefetch();
        }
        debug!(
            prefetch = self.policy.initial(),
            in_flight = self.window.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Prefetch filled"
        );
    }

    fn prefetch_elapsed(&self) -> Duration {
        self.prefetch_started
            .map(|started| started.elapsed())
            .unwrap_or_default()
    }

    fn maybe_snapshot(&mut self) {
        if self.last_snapshot.elapsed() < self.timing.stats_interval {
            return;
        }
        self.last_snapshot = Instant::now();
        let snapshot = self.stats.snapshot();
        info!(
            sent = snapshot.sent,
            received = snapshot.received,
            pending = snapshot.pending,
            "Pipeline progress"
        );
    }
}

impl<T> Pipeline<T> {
    /// Terminal state: cancel whatever is left and release the handle.
    fn finish(&mut self) {
        self.window = FuturesUnordered::new();
        self.transport = None;
        self.prefetch_timer = None;
        self.phase = Phase::Done;
    }
}

impl<T> Drop for Pipeline<T> {
    fn drop(&mut self) {
        if self.phase != Phase::Done {
            let _entered = self.span.enter();
            debug!(
                in_flight = self.window.len(),
                sent = self.stats.sent(),
                received = self.stats.received(),
                "Stream dropped by consumer, cancelling in-flight requests"
            );
        }
    }
}

/// One in-flight request: send, then wait for the next reply on the handle.
async fn exchange<T: Transport>(
    transport: Arc<T>,
    envelope: Envelope,
    hop: Hop,
) -> Result<Response, GatewayError> {
    transport.send(envelope).await?;
    let reply = transport.recv().await?;
    extract(reply, &hop)
}
