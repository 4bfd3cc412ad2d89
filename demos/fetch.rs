//! Example fetching one model file with progress bars and resume support.
//!
//! ```text
//! cargo run --example fetch -- <url> <md5> [directory]
//! ```
//!
//! Interrupt it halfway and run it again: the download resumes from the
//! `incomplete-` file left in the directory.

use color_eyre::eyre::{eyre, Result};
use modelfetch::registry::{MemoryRegistry, ModelInfo, Registry};
use modelfetch::telemetry::{ChannelTelemetry, TelemetryEvent};
use modelfetch::DownloaderBuilder;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("modelfetch=info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let usage = || eyre!("usage: fetch <url> <md5> [directory]");
    let url = args.next().ok_or_else(usage)?;
    let digest = args.next().ok_or_else(usage)?;
    let directory = args.next().unwrap_or_else(|| "models".to_string());

    let filename = url
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .ok_or_else(|| eyre!("cannot derive a file name from {url}"))?
        .to_string();

    let registry = Arc::new(MemoryRegistry::new(&directory));
    registry.scan_directory().ok();
    registry.insert(ModelInfo::new(&filename).with_url(&url).with_digest(digest));

    let (telemetry, mut events) = ChannelTelemetry::new();
    let downloader = DownloaderBuilder::new(registry.clone())
        .retries(3)
        .telemetry(Arc::new(telemetry))
        .build()?;

    downloader.start_download(&filename).await?;

    let outcome = loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) if event.is_terminal() => break event,
                Some(_) => continue,
                None => return Err(eyre!("downloader went away")),
            },
            _ = tokio::signal::ctrl_c() => {
                downloader.cancel_download(&filename).await;
                println!("\nCancelled, run again to resume.");
                break TelemetryEvent::DownloadCancelled { filename: filename.clone() };
            }
        }
    };
    downloader.shutdown().await?;

    let info = registry
        .model_info(&filename)
        .ok_or_else(|| eyre!("{filename} vanished from the registry"))?;
    match outcome {
        TelemetryEvent::DownloadFinished { success: true, .. } => {
            println!("Installed {}", info.install_path().display());
        }
        TelemetryEvent::DownloadCancelled { .. } => {}
        _ => return Err(eyre!("{}", info.download_error)),
    }

    Ok(())
}
