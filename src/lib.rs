//! Typed event bus and the stream client relay built on top of it.
//!
//! A [`Client`] publishes what its transport receives onto an injected
//! [`EventBus`]; a [`StreamClient`] wrapping that client re-emits the event
//! kinds allowed by its [`ForwardPolicy`] to its own listeners.

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod flow;
pub mod stream;

#[cfg(test)]
mod tests;

pub use client::Client;
pub use config::{ConfigManager, RelayConfig};
pub use error::{ErrorCode, ErrorSeverity, RelayError, RelayResult};
pub use events::{
    BusEvent, EventBus, EventBusStats, EventKind, EventPayload, MediaKind, TrackEvent,
    EVENT_BUFFER_SIZE, EVENT_BUS_CAPACITY,
};
pub use flow::{TraceContext, TraceSpan};
pub use stream::{ForwardPolicy, ListenerId, RelayStats, StreamClient};
