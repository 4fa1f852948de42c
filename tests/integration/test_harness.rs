//! Integration test harness
//! Wires a bus, a client and a stream client, and collects forwarded payloads

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use tokio::time::sleep;

use stream_relay::{
    Client, EventBus, EventKind, EventPayload, ForwardPolicy, RelayConfig, RelayStats,
    StreamClient,
};

pub const HOST: &str = "fakeServiceHost";

/// Listener that records every payload it receives
pub struct TestSubscriber {
    events: Arc<Mutex<Vec<EventPayload>>>,
}

impl TestSubscriber {
    /// Attach a recording listener for `kind` to `stream`
    pub fn attach(stream: &StreamClient, kind: EventKind) -> Self {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        stream.on(kind, move |payload| {
            sink.lock().unwrap().push(payload.clone());
            Ok(())
        });
        Self { events }
    }

    pub fn events(&self) -> Vec<EventPayload> {
        self.events.lock().unwrap().clone()
    }

    /// Wait until at least `count` payloads arrived
    pub async fn wait_for(&self, count: usize, timeout_ms: u64) -> bool {
        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(timeout_ms);

        while start.elapsed() < timeout {
            if self.events.lock().unwrap().len() >= count {
                return true;
            }
            sleep(Duration::from_millis(10)).await;
        }
        false
    }
}

/// Test environment for integration tests
pub struct TestEnvironment {
    pub bus: EventBus,
    pub client: Arc<Client>,
    pub stream: StreamClient,
}

impl TestEnvironment {
    /// Environment forwarding the given event names
    pub fn new(forward: &[&str]) -> Result<Self> {
        let config = RelayConfig {
            host: HOST.to_string(),
            bus_capacity: 128,
            replay_size: 16,
            forward: forward.iter().map(|name| name.to_string()).collect(),
        };

        let bus = EventBus::new(config.bus_capacity, config.replay_size);
        let client = Arc::new(Client::with_config(HOST, bus.clone(), config)?);
        let stream = StreamClient::new(Arc::clone(&client));

        Ok(Self { bus, client, stream })
    }

    /// A second stream client over the same client
    pub fn extra_stream(&self, policy: ForwardPolicy) -> StreamClient {
        StreamClient::with_policy(Arc::clone(&self.client), policy)
    }
}

/// Poll relay statistics until `done` holds or the timeout passes
pub async fn wait_for_stats<F>(stream: &StreamClient, done: F, timeout_ms: u64) -> RelayStats
where
    F: Fn(&RelayStats) -> bool,
{
    let start = std::time::Instant::now();
    let timeout = Duration::from_millis(timeout_ms);

    loop {
        let stats = stream.stats().await;
        if done(&stats) || start.elapsed() >= timeout {
            return stats;
        }
        sleep(Duration::from_millis(10)).await;
    }
}
