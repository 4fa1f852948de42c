//! Unit tests for the event bus
//!
//! Relay, listener and config tests live next to their modules.
