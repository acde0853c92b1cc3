//! # Window Properties
//!
//! Property tests over arbitrary source lengths, window sizes and latencies:
//!
//! - the window never holds more than `max(prefetch, prefetch_on_recv)`
//! - `received <= sent` whenever the consumer looks
//! - a completed call yields exactly one response per request

#[cfg(test)]
mod tests {
    use crate::doubles::ScriptedConnector;
    use futures::{stream, StreamExt};
    use pipeline_bus::{Connector, Hop, Request};
    use pipeline_gateway::{GatewayError, PipelineTiming, PrefetchStream, WindowPolicy};
    use proptest::prelude::*;
    use serde_json::json;
    use std::collections::BTreeSet;
    use std::time::Duration;

    struct Outcome {
        yielded: Vec<u64>,
        empty_input: bool,
        peak_window: usize,
        max_outstanding: u64,
        balanced: bool,
        released: u64,
    }

    fn run_call(n: u64, initial: usize, replenish: usize, jitter: u64) -> Outcome {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .start_paused(true)
            .build()
            .unwrap();

        runtime.block_on(async move {
            let connector = ScriptedConnector::echo()
                .with_latency(move |seq| Duration::from_millis((seq * 7 + jitter) % 11));
            let probe = connector.probe();
            let handle = connector.connect().await.unwrap();
            let policy = WindowPolicy::new(initial, replenish).unwrap();

            let mut call = PrefetchStream::new(
                stream::iter((0..n).map(|i| Request::new(json!(i)))),
                handle,
                Hop::new("gateway", "gw-prop"),
                policy,
                PipelineTiming::default(),
            );

            let mut outcome = Outcome {
                yielded: Vec::new(),
                empty_input: false,
                peak_window: 0,
                max_outstanding: 0,
                balanced: true,
                released: 0,
            };
            while let Some(item) = call.next().await {
                outcome.peak_window = outcome.peak_window.max(call.in_flight());
                let stats = call.stats();
                outcome.balanced &= stats.received <= stats.sent;
                match item {
                    Ok(response) => outcome.yielded.push(response.body.as_u64().unwrap()),
                    Err(GatewayError::EmptyInput) => outcome.empty_input = true,
                    Err(other) => panic!("unexpected failure: {}", other),
                }
            }
            let stats = call.stats();
            outcome.balanced &= stats.sent == stats.received;
            outcome.max_outstanding = probe.max_outstanding();
            outcome.released = probe.released();
            outcome
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_window_never_exceeds_capacity(
            n in 1u64..40,
            initial in 1usize..8,
            replenish in 1usize..8,
            jitter in 0u64..11,
        ) {
            let capacity = initial.max(replenish);
            let outcome = run_call(n, initial, replenish, jitter);

            prop_assert!(outcome.peak_window <= capacity);
            prop_assert!(outcome.max_outstanding <= capacity as u64);
            prop_assert!(outcome.balanced);
        }

        #[test]
        fn prop_every_request_answered_once(
            n in 0u64..40,
            initial in 1usize..8,
            replenish in 1usize..8,
            jitter in 0u64..11,
        ) {
            let outcome = run_call(n, initial, replenish, jitter);

            if n == 0 {
                prop_assert!(outcome.empty_input);
                prop_assert!(outcome.yielded.is_empty());
            } else {
                prop_assert!(!outcome.empty_input);
                prop_assert_eq!(outcome.yielded.len() as u64, n);
                let distinct: BTreeSet<_> = outcome.yielded.iter().copied().collect();
                prop_assert_eq!(distinct, (0..n).collect::<BTreeSet<_>>());
            }
            prop_assert_eq!(outcome.released, 1);
        }
    }
}
