use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use patchbay_core::{ConfigManager, HttpApiClient, PatchCommand, PatchConsole, PatchEvent};

/// Patch and live-control console core for DMX rigs.
#[derive(Parser, Debug)]
#[command(name = "patchbay")]
#[command(about = "Address-space patching and live-state console for a remote lighting backend")]
struct Args {
    /// Base URL of the remote lighting backend (overrides config)
    #[arg(long)]
    api_url: Option<String>,

    /// DMX universe to poll live levels for (overrides config)
    #[arg(long)]
    universe: Option<u16>,

    /// Level poll interval in seconds (overrides config)
    #[arg(long)]
    poll_interval: Option<u32>,

    /// Path to config.json
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    env_logger::init();
    let args = Args::parse();

    let mut config = ConfigManager::new(args.config);
    let mut settings = config.load()?;
    if let Some(api_url) = args.api_url {
        settings.api_base_url = api_url;
    }
    if let Some(universe) = args.universe {
        settings.universe = universe;
    }
    if let Some(poll_interval) = args.poll_interval {
        settings.poll_interval_secs = poll_interval;
    }
    ConfigManager::validate_settings(&settings)
        .map_err(|errors| anyhow::anyhow!("invalid settings: {}", errors.join(", ")))?;

    log::info!(
        "connecting to {} (universe {}, polling every {}s)",
        settings.api_base_url,
        settings.universe,
        settings.poll_interval_secs
    );

    let client = Arc::new(HttpApiClient::new(
        &settings.api_base_url,
        Duration::from_secs(settings.request_timeout_secs as u64),
    )?);

    let (event_tx, mut event_rx) = tokio::sync::mpsc::unbounded_channel();
    let (command_tx, command_rx) = tokio::sync::mpsc::unbounded_channel();

    let console = PatchConsole::new(client, settings, event_tx);

    // Log console events; a UI would render these instead.
    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match event {
                PatchEvent::ConflictDetected { owners } => {
                    let names: Vec<&str> = owners.iter().map(|o| o.name.as_str()).collect();
                    log::warn!("conflict with: {}", names.join(", "));
                }
                PatchEvent::InsufficientSpace { requested, placed } => {
                    log::warn!("only {} of {} requested slots fit", placed, requested);
                }
                PatchEvent::CommitFailed { context } => log::warn!("commit failed: {}", context),
                PatchEvent::Error(message) => log::error!("{}", message),
                other => log::info!("{:?}", other),
            }
        }
    });

    command_tx.send(PatchCommand::Refresh)?;

    let shutdown_tx = command_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(PatchCommand::Shutdown);
        }
    });

    console.run(command_rx).await;
    Ok(())
}
