//! Configuration drives the stream client's forward policy
use std::sync::Arc;

use anyhow::Result;

use stream_relay::{
    Client, ConfigManager, EventBus, EventKind, ForwardPolicy, RelayConfig, StreamClient,
};

#[tokio::test]
async fn test_config_file_sets_forward_policy() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("stream-relay.json");
    std::fs::write(
        &path,
        r#"{ "host": "fakeServiceHost", "bus_capacity": 32, "forward": ["track", "error"] }"#,
    )?;

    let manager = ConfigManager::with_path(&path).await?;
    let config = manager.get_config().await;
    assert_eq!(config.bus_capacity, 32);

    let bus = EventBus::new(config.bus_capacity, config.replay_size);
    let client = Arc::new(Client::with_config(config.host.clone(), bus, config)?);
    let stream = StreamClient::new(client);

    assert_eq!(
        stream.policy(),
        ForwardPolicy::only([EventKind::Track, EventKind::Error])
    );
    Ok(())
}

#[tokio::test]
async fn test_invalid_config_rejected_by_client() {
    let config = RelayConfig {
        host: "fakeServiceHost".into(),
        bus_capacity: 8,
        replay_size: 0,
        forward: vec!["tracks".into()],
    };

    let result = Client::with_config("fakeServiceHost", EventBus::default(), config);
    assert!(result.is_err());
}
