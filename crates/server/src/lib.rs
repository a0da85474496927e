//! HTTP and WebSocket shell around the convertino core.

pub mod api;
pub mod metrics;
pub mod state;
