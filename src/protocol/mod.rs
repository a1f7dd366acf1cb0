//! Client/server wire protocol.
//!
//! This module provides:
//! - `Command` and `CommandResult` tagged unions
//! - Tracking status codes and per-file results
//! - The server configuration snapshot returned by `ping`
//! - Length-prefixed JSON framing for one-shot exchanges

mod codec;
mod command;
mod configuration;
mod result;

pub use codec::{decode, encode, read_message, write_message, MAX_MESSAGE_BYTES};
pub use command::{Command, TrackedFile};
pub use configuration::{ServerConfiguration, Transport};
pub use result::{CommandResult, TrackingResult, TrackingStatus};
