//! IPC Layer - one-directional worker → supervisor message channel
//!
//! This module provides:
//! - The message envelope
//! - Newline-delimited JSON framing over the worker's stdout
//! - Sinks the worker writes messages to

pub mod codec;
pub mod messages;
pub mod sink;

pub use codec::{decode_line, encode_line, pump_messages};
pub use messages::Message;
pub use sink::{CollectingSink, LogSink, MessageSink, StdoutSink};
