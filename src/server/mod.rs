//! Tracking server.
//!
//! This module provides:
//! - The accept loop over a Unix socket or TCP listener
//! - Per-connection command dispatch to the watch manager
//! - Logging setup

mod app;
mod dispatch;
mod observability;

pub use app::App;
pub use dispatch::Dispatcher;
pub use observability::{init_tracing, spans, TracingConfig};
