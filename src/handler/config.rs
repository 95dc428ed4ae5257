//! Handler configuration.
//!
//! Every field has a default, so a config file only names what it changes:
//!
//! ```
//! use msgwire::handler::{FlushPolicy, HandlerConfig};
//! use msgwire::protocol::FramingKind;
//!
//! let config: HandlerConfig = serde_json::from_str(
//!     r#"{ "framing": "newline-delimited", "flush_policy": "batched" }"#,
//! ).unwrap();
//! assert_eq!(config.framing, FramingKind::NewlineDelimited);
//! assert_eq!(config.flush_policy, FlushPolicy::Batched);
//! assert_eq!(config.max_message_size, msgwire::protocol::DEFAULT_MAX_MESSAGE_SIZE);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::codec::TextEncoding;
use crate::protocol::{FramingKind, DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_READ_SIZE};

/// Default time allowed for flushing and shutting down the output on dispose.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// When written frames are flushed to the output stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlushPolicy {
    /// Flush after every frame. The peer sees each message as soon as
    /// `write` returns, at the cost of one flush per message.
    #[default]
    PerMessage,
    /// Never flush implicitly; call `flush` (or dispose) to push buffered
    /// frames out. Only differs from `PerMessage` on buffering streams.
    Batched,
}

/// Configuration for a [`MessageHandler`](super::MessageHandler).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandlerConfig {
    /// Charset of message payloads.
    pub encoding: TextEncoding,
    /// Built-in wire format.
    pub framing: FramingKind,
    /// Flushing behavior of the write path.
    pub flush_policy: FlushPolicy,
    /// Largest encoded message accepted in either direction.
    pub max_message_size: usize,
    /// Bytes requested from the input stream per read.
    pub read_buffer_size: usize,
    /// Teardown budget for the output stream, in milliseconds.
    pub shutdown_timeout_ms: u64,
}

impl HandlerConfig {
    /// Teardown budget as a `Duration`.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            encoding: TextEncoding::Utf8,
            framing: FramingKind::HeaderDelimited,
            flush_policy: FlushPolicy::PerMessage,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            read_buffer_size: DEFAULT_READ_SIZE,
            shutdown_timeout_ms: DEFAULT_SHUTDOWN_TIMEOUT.as_millis() as u64,
        }
    }
}
