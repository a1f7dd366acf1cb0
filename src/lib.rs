//! File Tracker
//!
//! Daemon that watches individually registered files and reports metadata
//! about every modification to a collector service.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod runtime;
pub mod server;
pub mod transport;
pub mod watcher;

pub use config::Config;
pub use error::{Error, Result};
