use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, trace, warn};
use uuid::Uuid;

use crate::error::{event_bus_publish_failed, RelayResult};
use crate::flow::TraceContext;

pub mod payload;
pub mod streams;

pub use payload::{EventKind, EventPayload, MediaKind, TrackEvent};
pub use streams::{EventStream, Subscriber};

// Event bus capacity constants
pub const EVENT_BUS_CAPACITY: usize = 1000;
pub const EVENT_BUFFER_SIZE: usize = 100;

/// Envelope for everything that travels over the bus
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusEvent {
    /// Unique event ID
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    /// Component that produced the event, usually a client host
    pub source: String,
    /// Timestamp when the event was created
    pub timestamp: DateTime<Utc>,
    /// Typed event data
    pub payload: EventPayload,
    /// Trace context for observability (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<TraceContext>,
}

impl BusEvent {
    pub fn new(source: impl Into<String>, payload: impl Into<EventPayload>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source: source.into(),
            timestamp: Utc::now(),
            payload: payload.into(),
            trace: None,
        }
    }

    /// Create a new event that records its path through the relay
    pub fn traced(source: impl Into<String>, payload: impl Into<EventPayload>) -> Self {
        let mut event = Self::new(source, payload);
        event.trace = Some(TraceContext::new(event.source.clone(), event.kind()));
        event
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }
}

/// Statistics about event bus activity
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventBusStats {
    /// Number of events delivered to at least one receiver
    pub events_published: u64,
    /// Number of events nobody was subscribed for
    pub events_dropped: u64,
    /// Count of events by source
    pub source_counts: HashMap<String, u64>,
    /// Count of events by kind
    pub kind_counts: HashMap<EventKind, u64>,
}

/// Event bus shared by clients and relays.
///
/// Cloning is cheap; every clone publishes into the same channel.
#[derive(Clone)]
pub struct EventBus {
    stream: Arc<EventStream<BusEvent>>,
    capacity: usize,
    stats: Arc<RwLock<EventBusStats>>,
}

impl EventBus {
    /// Create a new event bus with the given channel capacity and replay size
    pub fn new(capacity: usize, buffer_size: usize) -> Self {
        info!(capacity, buffer_size, "Creating new event bus");
        Self {
            stream: Arc::new(EventStream::new(capacity, buffer_size)),
            capacity,
            stats: Arc::new(RwLock::new(EventBusStats::default())),
        }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> Subscriber<BusEvent> {
        trace!("New subscriber registered to event bus");
        self.stream.subscribe()
    }

    /// Publish an event to all subscribers
    pub async fn publish(&self, mut event: BusEvent) -> RelayResult<usize> {
        if event.source.trim().is_empty() {
            return Err(event_bus_publish_failed("event source must not be empty"));
        }

        let source = event.source.clone();
        let kind = event.kind();

        trace!(source = %source, kind = %kind, "Publishing event to bus");

        if let Some(trace_context) = event.trace.as_mut() {
            trace_context
                .add_span("publish", "EventBus")
                .context(Some(serde_json::json!({
                    "bus_capacity": self.capacity,
                    "subscribers": self.subscriber_count(),
                })));
        }

        let receivers = self.stream.publish(event).await;

        let mut stats = self.stats.write().await;
        if receivers == 0 {
            stats.events_dropped += 1;
            warn!(source = %source, kind = %kind, "No receivers for event, message dropped");
        } else {
            stats.events_published += 1;
            trace!(receivers, "Event published successfully");
        }
        *stats.source_counts.entry(source).or_insert(0) += 1;
        *stats.kind_counts.entry(kind).or_insert(0) += 1;

        Ok(receivers)
    }

    /// Build an envelope around `payload` and publish it
    pub async fn emit(
        &self,
        source: &str,
        payload: impl Into<EventPayload>,
    ) -> RelayResult<usize> {
        self.publish(BusEvent::new(source, payload)).await
    }

    /// Get current event bus statistics
    pub async fn stats(&self) -> EventBusStats {
        self.stats.read().await.clone()
    }

    /// Reset all statistics counters
    pub async fn reset_stats(&self) {
        info!("Resetting event bus statistics");
        *self.stats.write().await = EventBusStats::default();
    }

    /// Recently published events, oldest first
    pub async fn replay(&self) -> Vec<BusEvent> {
        self.stream.replay().await
    }

    /// Get the configured capacity of the event bus
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of recent events kept for replay
    pub fn replay_size(&self) -> usize {
        self.stream.buffer_size()
    }

    /// Get the current number of subscribers
    pub fn subscriber_count(&self) -> usize {
        self.stream.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(EVENT_BUS_CAPACITY, EVENT_BUFFER_SIZE)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("capacity", &self.capacity)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
