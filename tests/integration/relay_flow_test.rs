//! End-to-end relay behaviour through the public API
use std::time::Duration;

use anyhow::Result;
use serde_json::json;
use tokio::time::timeout;

use stream_relay::{EventKind, EventPayload, ForwardPolicy, MediaKind, TrackEvent};

use crate::test_harness::{wait_for_stats, TestEnvironment, TestSubscriber, HOST};

/// Track emitted on the bus reaches the stream client's listener
#[tokio::test]
async fn test_webrtc_track_is_emitted_by_stream_client() -> Result<()> {
    let env = TestEnvironment::new(&["track"])?;
    let received = env.stream.once(EventKind::Track);

    env.bus
        .emit(
            "test",
            TrackEvent::new("remote-video", MediaKind::Video).with_metadata(json!({ "mock": true })),
        )
        .await?;

    let data = timeout(Duration::from_secs(1), received).await??;
    assert_eq!(data.as_track().map(|t| t.metadata["mock"].clone()), Some(json!(true)));
    Ok(())
}

/// Events from the client transport arrive in publish order
#[tokio::test]
async fn test_client_events_arrive_in_order() -> Result<()> {
    let env = TestEnvironment::new(&["*"])?;
    let subscriber = TestSubscriber::attach(&env.stream, EventKind::Track);
    let lifecycle = TestSubscriber::attach(&env.stream, EventKind::Connected);

    env.client.mark_connected().await?;
    for i in 0..5 {
        env.client
            .publish(TrackEvent::new(format!("t{i}"), MediaKind::Audio))
            .await?;
    }

    assert!(subscriber.wait_for(5, 1000).await, "should forward all tracks");
    assert!(lifecycle.wait_for(1, 1000).await, "should forward connection");

    let ids: Vec<_> = subscriber
        .events()
        .iter()
        .filter_map(|p| p.as_track().map(|t| t.track_id.clone()))
        .collect();
    assert_eq!(ids, vec!["t0", "t1", "t2", "t3", "t4"]);
    assert_eq!(
        lifecycle.events(),
        vec![EventPayload::Connected { host: HOST.into() }]
    );
    Ok(())
}

/// Two stream clients over one bus apply their own policies
#[tokio::test]
async fn test_independent_stream_clients() -> Result<()> {
    let env = TestEnvironment::new(&["track"])?;
    let messages_stream = env.extra_stream(ForwardPolicy::only([EventKind::Message]));

    let tracks = TestSubscriber::attach(&env.stream, EventKind::Track);
    let messages = TestSubscriber::attach(&messages_stream, EventKind::Message);
    let ignored = TestSubscriber::attach(&messages_stream, EventKind::Track);

    env.client.publish(EventPayload::Message(json!("chat"))).await?;
    env.client
        .publish(TrackEvent::new("t1", MediaKind::Video))
        .await?;

    assert!(tracks.wait_for(1, 1000).await);
    assert!(messages.wait_for(1, 1000).await);

    let stats = wait_for_stats(&messages_stream, |s| s.filtered == 1, 1000).await;
    assert_eq!(stats.forwarded, 1);
    assert_eq!(stats.filtered, 1);
    assert!(ignored.events().is_empty());
    assert_eq!(env.bus.subscriber_count(), 2);
    Ok(())
}

/// Shutting down one stream client leaves the others running
#[tokio::test]
async fn test_shutdown_isolated() -> Result<()> {
    let env = TestEnvironment::new(&["track"])?;
    let other = env.extra_stream(ForwardPolicy::default());
    let tracks = TestSubscriber::attach(&other, EventKind::Track);

    env.stream.shutdown().await?;
    env.client
        .publish(TrackEvent::new("t1", MediaKind::Audio))
        .await?;

    assert!(tracks.wait_for(1, 1000).await);
    assert!(!env.stream.is_running().await);
    assert!(other.is_running().await);
    Ok(())
}
