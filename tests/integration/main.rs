//! Integration tests for stream-relay
//! These tests exercise the bus, client and stream client together

mod test_harness;

mod config_test;
mod relay_flow_test;
