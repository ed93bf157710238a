mod host;
mod script;
mod sink;

use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use webrtc_audio_route::{DeviceModuleOptions, DiagnosticsSink, RouteConfig};

use host::SimHost;
use sink::{print_events, ChannelSink};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "route_sim=debug,webrtc_audio_route=debug".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = RouteConfig::from_env();
    let options = DeviceModuleOptions::from_env();
    info!("Starting route simulator with {config:?}");

    let (tx, rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(print_events(rx));
    let sink: Arc<dyn DiagnosticsSink> = Arc::new(ChannelSink::new(tx));
    let mut host = SimHost::new(config, options, Some(sink));

    let reader: Box<dyn AsyncBufRead + Unpin + Send> = match std::env::args().nth(1) {
        Some(path) => {
            let file = tokio::fs::File::open(&path)
                .await
                .with_context(|| format!("Failed to open script {path}"))?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };

    let mut lines = reader.lines();
    let mut line_no = 0usize;
    while let Some(line) = lines.next_line().await.context("Failed to read script")? {
        line_no += 1;
        match script::parse_line(&line) {
            Ok(Some(command)) => host.execute(command).await,
            Ok(None) => {}
            Err(e) => warn!("Line {line_no}: {e}"),
        }
    }

    host.shutdown().await;
    let emitted = printer.await.context("Event printer failed")?;
    info!("Simulation finished, {emitted} events emitted");
    Ok(())
}
