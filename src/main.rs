//! radiolink - connect to a FlexRadio and follow its status and meters.
//!
//! Usage: `radiolink [radio-addr]`
//!
//! Logs response traffic and meter activity until Ctrl-C, then prints the
//! panadapter and IQ stream registries as JSON.

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use radiolink::{Session, SessionConfig, Sinks};

#[tokio::main]
async fn main() -> Result<()> {
    let mut config = SessionConfig::load().context("Failed to load configuration")?;
    if let Some(addr) = std::env::args().nth(1) {
        config.radio_addr = addr;
    }

    let default_filter = if config.debug {
        "radiolink=debug"
    } else {
        "radiolink=info"
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    tracing::info!("Starting radiolink v{}", env!("CARGO_PKG_VERSION"));

    let mut sinks = Sinks::new();
    let mut responses = sinks.bind_responses(config.sink_capacity);
    let mut meters = sinks.bind_meter(config.sink_capacity);

    let session = Session::connect(&config, sinks)
        .await
        .with_context(|| format!("Failed to connect to {}", config.command_addr()))?;
    session
        .subscribe(&config.subscriptions)
        .await
        .context("Failed to send subscriptions")?;

    let mut meter_packets: u64 = 0;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = &mut shutdown => {
                result.context("Failed to listen for Ctrl-C")?;
                tracing::info!("Interrupted");
                break;
            }
            line = responses.recv() => match line {
                Some(line) => tracing::info!("{}", line),
                None => {
                    tracing::info!("Radio closed the connection");
                    break;
                }
            },
            Some(packet) = meters.recv() => {
                meter_packets += 1;
                tracing::debug!(
                    stream_id = packet.stream_id,
                    readings = packet.readings.len(),
                    "Meter packet"
                );
            }
        }
    }

    tracing::info!(
        "Session handle {}, {} meter packets",
        session.handle().unwrap_or("<none>"),
        meter_packets
    );

    let snapshot = serde_json::json!({
        "handle": session.handle(),
        "panadapters": session.panadapters().snapshot(),
        "iq_streams": session.iq_streams().snapshot(),
    });
    drop(session);
    println!(
        "{}",
        serde_json::to_string_pretty(&snapshot).context("Failed to serialize registries")?
    );

    Ok(())
}
