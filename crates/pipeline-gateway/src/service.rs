//! Gateway service: turns client calls into backend round trips.
//!
//! Each call acquires its own transport handle from the [`Connector`]; nothing
//! is shared between calls except the configuration.

use crate::domain::config::GatewayConfig;
use crate::domain::error::GatewayError;
use crate::domain::window::WindowPolicy;
use crate::pipeline::prefetch::{PipelineTiming, PrefetchStream};
use crate::pipeline::unary::round_trip;
use futures::Stream;
use pipeline_bus::{Connector, Hop, Request, Response};
use tracing::{info, info_span, Instrument};

/// Request forwarding gateway
pub struct Gateway<C> {
    config: GatewayConfig,
    hop: Hop,
    window: WindowPolicy,
    timing: PipelineTiming,
    connector: C,
}

impl<C: Connector> Gateway<C> {
    /// Create a gateway over `connector`
    pub fn new(config: GatewayConfig, connector: C) -> Result<Self, GatewayError> {
        config.validate()?;
        let window = config.window()?;
        let timing = PipelineTiming {
            prefetch_warn_after: config.prefetch_warn_after,
            stats_interval: config.stats_interval,
        };
        let hop = config.hop();

        info!(
            gateway = %hop,
            prefetch = window.initial(),
            prefetch_on_recv = window.replenish(),
            "Gateway ready"
        );

        Ok(Self {
            config,
            hop,
            window,
            timing,
            connector,
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// The hop recorded on every route passing through this gateway
    pub fn hop(&self) -> &Hop {
        &self.hop
    }

    pub fn window(&self) -> WindowPolicy {
        self.window
    }

    /// Forward one request and wait for its response.
    pub async fn call_unary(&self, request: Request) -> Result<Response, GatewayError> {
        let span = info_span!(
            "unary_call",
            call_id = %uuid::Uuid::new_v4(),
            request_id = %request.request_id,
        );

        async move {
            let transport = self.connector.connect().await?;
            round_trip(transport, &self.hop, request).await
        }
        .instrument(span)
        .await
    }

    /// Forward a stream of requests with the configured window.
    ///
    /// Fails only if no handle can be acquired. Everything after that,
    /// including an empty request stream, is reported through the returned
    /// stream.
    pub async fn call<S>(
        &self,
        requests: S,
    ) -> Result<PrefetchStream<S, C::Handle>, GatewayError>
    where
        S: Stream<Item = Request>,
    {
        self.call_with(requests, self.window).await
    }

    /// [`call`](Self::call) with a per-call window instead of the configured one
    pub async fn call_with<S>(
        &self,
        requests: S,
        window: WindowPolicy,
    ) -> Result<PrefetchStream<S, C::Handle>, GatewayError>
    where
        S: Stream<Item = Request>,
    {
        let transport = self.connector.connect().await?;
        Ok(PrefetchStream::new(
            requests,
            transport,
            self.hop.clone(),
            window,
            self.timing,
        ))
    }
}
