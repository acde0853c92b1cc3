//! # Gateway Scenarios
//!
//! End-to-end calls through [`Gateway`] over the scripted transport:
//!
//! 1. **Happy path**: every request answered, counters balanced
//! 2. **Empty input**: one client error, nothing sent
//! 3. **Unary parity**: a one-request stream matches the unary call
//! 4. **Send failure**: the call aborts and the handle is released once

#[cfg(test)]
mod tests {
    use crate::doubles::ScriptedConnector;
    use futures::{stream, StreamExt};
    use pipeline_bus::{Request, Response, TransportError};
    use pipeline_gateway::{Gateway, GatewayConfig, GatewayError, StatsSnapshot};
    use serde_json::json;
    use std::time::Duration;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    fn config(prefetch: usize, prefetch_on_recv: usize) -> GatewayConfig {
        GatewayConfig {
            name: "gateway".into(),
            identity: "gw-it".into(),
            prefetch,
            prefetch_on_recv,
            ..GatewayConfig::default()
        }
    }

    fn requests(n: u64) -> Vec<Request> {
        (0..n).map(|i| Request::new(json!({ "seq": i }))).collect()
    }

    fn route_names(response: &Response) -> Vec<String> {
        response.route.iter().map(|e| e.hop.name.clone()).collect()
    }

    // =============================================================================
    // SCENARIOS
    // =============================================================================

    /// Five requests through a 2/1 window
    #[tokio::test]
    async fn test_five_requests_all_answered() {
        let connector = ScriptedConnector::echo().with_latency(|seq| Duration::from_millis(seq % 3));
        let probe = connector.probe();
        let gateway = Gateway::new(config(2, 1), connector).unwrap();

        let mut responses = gateway.call(stream::iter(requests(5))).await.unwrap();
        let mut seen = Vec::new();
        while let Some(item) = responses.next().await {
            let response = item.expect("no failure scripted");
            seen.push(response.body["seq"].as_u64().unwrap());
            let stats = responses.stats();
            assert!(stats.received <= stats.sent);
        }
        seen.sort_unstable();

        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
        assert_eq!(
            responses.stats(),
            StatsSnapshot {
                sent: 5,
                received: 5,
                pending: 0
            }
        );
        assert_eq!(probe.sends(), 5);
        assert_eq!(probe.recvs(), 5);
        assert!(probe.max_outstanding() <= 2);
        assert_eq!(probe.connects(), 1);
        assert_eq!(probe.released(), 1);
    }

    /// No requests at all
    #[tokio::test]
    async fn test_empty_stream_reports_client_error() {
        let connector = ScriptedConnector::echo();
        let probe = connector.probe();
        let gateway = Gateway::new(config(2, 1), connector).unwrap();

        let items: Vec<_> = gateway
            .call(stream::iter(requests(0)))
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(items.len(), 1);
        match &items[0] {
            Err(err @ GatewayError::EmptyInput) => assert!(err.is_client_error()),
            other => panic!("expected EmptyInput, got {:?}", other),
        }
        assert_eq!(probe.sends(), 0);
        assert_eq!(probe.released(), 1);
    }

    /// A single request streams the same way it round-trips
    #[tokio::test]
    async fn test_single_request_matches_unary() {
        let gateway = Gateway::new(config(1, 1), ScriptedConnector::echo()).unwrap();
        let body = json!({"text": "hello"});

        let unary = gateway.call_unary(Request::new(body.clone())).await.unwrap();
        let streamed: Vec<_> = gateway
            .call(stream::iter(vec![Request::new(body.clone())]))
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(streamed.len(), 1);
        let streamed = streamed[0].as_ref().unwrap();
        assert_eq!(unary.body, streamed.body);
        assert_eq!(route_names(&unary), route_names(streamed));
        assert_eq!(route_names(&unary), vec!["gateway", "scripted", "gateway"]);
    }

    /// Third send fails with five requests in the window
    #[tokio::test]
    async fn test_send_failure_aborts_call() {
        let connector = ScriptedConnector::echo()
            .with_latency(|_| Duration::from_millis(10))
            .fail_on_send(3);
        let probe = connector.probe();
        let gateway = Gateway::new(config(5, 1), connector).unwrap();

        let mut responses = gateway.call(stream::iter(requests(5))).await.unwrap();
        let mut ok = 0;
        let mut failure = None;
        while let Some(item) = responses.next().await {
            match item {
                Ok(_) => ok += 1,
                Err(err) => {
                    assert_eq!(probe.released(), 1);
                    failure = Some(err);
                }
            }
        }

        assert!(ok <= 2);
        assert!(matches!(
            failure,
            Some(GatewayError::Transport(TransportError::Send(_)))
        ));
        assert!(responses.next().await.is_none());
        assert_eq!(probe.released(), 1);
    }

    /// A failure after some responses were already delivered
    #[tokio::test]
    async fn test_failure_mid_stream_keeps_earlier_responses() {
        let connector = ScriptedConnector::echo().fail_on_send(4);
        let probe = connector.probe();
        let gateway = Gateway::new(config(1, 1), connector).unwrap();

        let items: Vec<_> = gateway
            .call(stream::iter(requests(6)))
            .await
            .unwrap()
            .collect()
            .await;

        // Sequential window: the first three complete before the fourth is sent
        assert_eq!(items.len(), 4);
        assert!(items[..3].iter().all(Result::is_ok));
        assert!(items[3].is_err());
        assert_eq!(probe.sends(), 4);
        assert_eq!(probe.released(), 1);
    }

    /// Unary calls use a fresh handle each time
    #[tokio::test]
    async fn test_unary_handles_not_shared() {
        let connector = ScriptedConnector::echo();
        let probe = connector.probe();
        let gateway = Gateway::new(config(4, 1), connector).unwrap();

        for i in 0..3 {
            let response = gateway.call_unary(Request::new(json!(i))).await.unwrap();
            assert_eq!(response.body, json!(i));
        }

        assert_eq!(probe.connects(), 3);
        assert_eq!(probe.released(), 3);
    }
}
