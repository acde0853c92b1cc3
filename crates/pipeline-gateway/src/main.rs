//! # Pipeline Gateway
//!
//! Demo entry point: streams stdin through a gateway backed by an in-process
//! echo worker.
//!
//! ```text
//! pipeline-gateway [config.json] < requests.jsonl > responses.jsonl
//! ```
//!
//! Each non-empty stdin line becomes one request. Lines that parse as JSON
//! are sent as that value, anything else as a JSON string. Each response is
//! printed as one JSON line. Logs go to stderr.

use anyhow::{Context, Result};
use futures::StreamExt;
use pipeline_bus::{ChannelConnector, Hop, Request, Worker, DEFAULT_CHANNEL_CAPACITY};
use pipeline_gateway::{telemetry, Gateway, GatewayConfig};
use serde_json::Value;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_stream::wrappers::LinesStream;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config =
        GatewayConfig::load(config_path.as_deref()).context("failed to load configuration")?;
    telemetry::init_tracing(&config.logging)?;

    info!(
        version = pipeline_gateway::VERSION,
        config = ?config_path,
        "Starting pipeline gateway"
    );

    let (connector, incoming) = ChannelConnector::new(DEFAULT_CHANNEL_CAPACITY);
    let worker = Worker::echo(Hop::new("echo", uuid::Uuid::new_v4().to_string())).spawn(incoming);
    let gateway = Gateway::new(config, connector)?;

    let lines = LinesStream::new(BufReader::new(tokio::io::stdin()).lines());
    let requests = lines.filter_map(|line| async move {
        match line {
            Ok(line) if line.trim().is_empty() => None,
            Ok(line) => Some(Request::new(parse_body(&line))),
            Err(e) => {
                warn!(error = %e, "Skipping unreadable stdin line");
                None
            }
        }
    });

    let mut responses = Box::pin(gateway.call(requests).await?);
    let mut stdout = tokio::io::stdout();
    let mut failure = None;

    while let Some(item) = responses.next().await {
        match item {
            Ok(response) => {
                let mut line = serde_json::to_vec(&response)?;
                line.push(b'\n');
                stdout.write_all(&line).await?;
            }
            Err(e) => {
                error!(code = e.code(), error = %e, "Call failed");
                failure = Some(e);
            }
        }
    }
    stdout.flush().await?;

    let stats = responses.stats();
    info!(sent = stats.sent, received = stats.received, "Gateway finished");

    drop(responses);
    worker.abort();

    match failure {
        Some(e) => Err(e).context("streaming call failed"),
        None => Ok(()),
    }
}

fn parse_body(line: &str) -> Value {
    serde_json::from_str(line).unwrap_or_else(|_| Value::String(line.to_string()))
}
