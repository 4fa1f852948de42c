use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{unknown_event, RelayError};

/// Closed set of event kinds carried on the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A remote media track became available
    Track,
    /// The client reached its host
    Connected,
    /// The client lost its host
    Disconnected,
    /// Application message from the host
    Message,
    /// Error reported by the transport
    Error,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        EventKind::Track,
        EventKind::Connected,
        EventKind::Disconnected,
        EventKind::Message,
        EventKind::Error,
    ];

    /// Canonical event name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Track => "track",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Message => "message",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| unknown_event(s))
    }
}

/// Media type of a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Audio,
    Video,
}

/// A remote track announced by the transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackEvent {
    /// Transport-assigned track identifier
    pub track_id: String,
    /// Audio or video
    pub kind: MediaKind,
    /// Media streams the track belongs to
    #[serde(default)]
    pub stream_ids: Vec<String>,
    /// Opaque extra data, passed through untouched
    #[serde(default)]
    pub metadata: Value,
}

impl TrackEvent {
    pub fn new(track_id: impl Into<String>, kind: MediaKind) -> Self {
        Self {
            track_id: track_id.into(),
            kind,
            stream_ids: Vec::new(),
            metadata: Value::Null,
        }
    }

    pub fn with_stream(mut self, stream_id: impl Into<String>) -> Self {
        self.stream_ids.push(stream_id.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Payload of a bus event, one variant per [`EventKind`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum EventPayload {
    Track(TrackEvent),
    Connected {
        host: String,
    },
    Disconnected {
        host: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    Message(Value),
    Error {
        message: String,
        recoverable: bool,
    },
}

impl EventPayload {
    /// Kind of this payload
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Track(_) => EventKind::Track,
            Self::Connected { .. } => EventKind::Connected,
            Self::Disconnected { .. } => EventKind::Disconnected,
            Self::Message(_) => EventKind::Message,
            Self::Error { .. } => EventKind::Error,
        }
    }

    /// The track carried by this payload, if any
    pub fn as_track(&self) -> Option<&TrackEvent> {
        match self {
            Self::Track(track) => Some(track),
            _ => None,
        }
    }
}

impl From<TrackEvent> for EventPayload {
    fn from(track: TrackEvent) -> Self {
        Self::Track(track)
    }
}
