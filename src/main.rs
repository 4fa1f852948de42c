use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::json;
use tracing::{debug, info};
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use stream_relay::{
    Client, ConfigManager, EventBus, EventKind, MediaKind, StreamClient, TrackEvent,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file if it exists
    let env_file_path = dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            if cfg!(debug_assertions) {
                "stream_relay=debug,warn".into()
            } else {
                "stream_relay=info,warn".into()
            }
        }))
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    info!("stream-relay starting");

    match env_file_path {
        Some(path) => info!("Loaded environment variables from {}", path.display()),
        None => debug!("No .env file found. Using existing environment variables."),
    };

    let config_manager = ConfigManager::new()
        .await
        .context("Failed to load configuration")?;
    let mut config = config_manager.get_config().await;
    if let Some(host) = std::env::args().nth(1) {
        config.host = host;
    }
    info!(path = %config_manager.path().display(), host = %config.host, "Configuration loaded");

    let bus = EventBus::new(config.bus_capacity, config.replay_size);
    let client = Arc::new(Client::with_config(config.host.clone(), bus, config)?);
    let stream_client = StreamClient::new(Arc::clone(&client));

    stream_client.on_track(|track| {
        info!(
            track_id = %track.track_id,
            kind = ?track.kind,
            streams = ?track.stream_ids,
            metadata = %track.metadata,
            "Track forwarded"
        );
        Ok(())
    });
    let first_track = stream_client.once(EventKind::Track);

    client.mark_connected().await?;
    client
        .publish(
            TrackEvent::new("demo-video", MediaKind::Video)
                .with_stream("demo")
                .with_metadata(json!({ "mock": true })),
        )
        .await?;

    tokio::time::timeout(Duration::from_secs(5), first_track)
        .await
        .context("Timed out waiting for the demo track")?
        .context("Relay stopped before the demo track arrived")?;

    client.mark_disconnected(None).await?;
    let stats = stream_client.stats().await;
    info!(
        forwarded = stats.forwarded,
        filtered = stats.filtered,
        unhandled = stats.unhandled,
        "Relay statistics"
    );

    stream_client.shutdown().await?;
    info!("stream-relay stopped");
    Ok(())
}
