//! Host client that feeds transport events onto the bus

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, instrument};

use crate::config::RelayConfig;
use crate::error::{invalid_host, RelayResult};
use crate::events::{BusEvent, EventBus, EventPayload};

/// Client bound to a single host.
///
/// The transport that talks to the host is not part of this crate; it hands
/// whatever it receives to [`Client::publish`], which stamps the event with
/// the host and puts it on the shared bus.
#[derive(Debug)]
pub struct Client {
    host: String,
    bus: EventBus,
    config: RelayConfig,
    connected: AtomicBool,
}

impl Client {
    /// Create a client for `host`, forwarding `track` events.
    ///
    /// The stored configuration mirrors `host` and the bus it is given.
    pub fn new(host: impl Into<String>, bus: EventBus) -> RelayResult<Self> {
        let host = host.into();
        let config = RelayConfig::for_host(host.as_str(), bus.capacity(), bus.replay_size());
        Self::with_config(host, bus, config)
    }

    #[instrument(skip(host, bus, config), level = "debug")]
    pub fn with_config(
        host: impl Into<String>,
        bus: EventBus,
        config: RelayConfig,
    ) -> RelayResult<Self> {
        let host = host.into();
        validate_host(&host)?;
        config.validate()?;

        info!(host = %host, "Creating new client");
        Ok(Self {
            host,
            bus,
            config,
            connected: AtomicBool::new(false),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Handle to the bus this client publishes on
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Publish a payload received from the host
    pub async fn publish(&self, payload: impl Into<EventPayload>) -> RelayResult<usize> {
        let event = BusEvent::new(self.host.as_str(), payload);
        debug!(host = %self.host, kind = %event.kind(), "Client publishing event");
        self.bus.publish(event).await
    }

    /// Record that the transport reached the host
    pub async fn mark_connected(&self) -> RelayResult<usize> {
        self.connected.store(true, Ordering::SeqCst);
        info!(host = %self.host, "Client connected");
        self.publish(EventPayload::Connected {
            host: self.host.clone(),
        })
        .await
    }

    /// Record that the transport lost the host
    pub async fn mark_disconnected(&self, reason: Option<String>) -> RelayResult<usize> {
        self.connected.store(false, Ordering::SeqCst);
        info!(host = %self.host, reason = ?reason, "Client disconnected");
        self.publish(EventPayload::Disconnected {
            host: self.host.clone(),
            reason,
        })
        .await
    }
}

fn validate_host(host: &str) -> RelayResult<()> {
    if host.is_empty() {
        return Err(invalid_host(host, "host must not be empty"));
    }
    if host.chars().any(char::is_whitespace) {
        return Err(invalid_host(host, "host must not contain whitespace"));
    }
    Ok(())
}
