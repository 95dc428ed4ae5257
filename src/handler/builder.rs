//! Fluent construction of a [`MessageHandler`].

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};

use super::{FlushPolicy, HandlerConfig, MessageHandler};
use crate::codec::TextEncoding;
use crate::protocol::{FramingKind, FramingStrategy};
use crate::transport::{BoxedReader, BoxedWriter};

/// Builder for configuring and creating a message handler.
///
/// Supply either stream, both, or neither; the handler's capabilities follow
/// from what was supplied.
///
/// # Example
///
/// ```
/// use msgwire::MessageHandler;
/// use msgwire::protocol::FramingKind;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let (local, _remote) = tokio::io::duplex(1024);
/// let handler = MessageHandler::builder()
///     .output(local)
///     .framing(FramingKind::NewlineDelimited)
///     .build();
///
/// assert!(handler.can_write());
/// assert!(!handler.can_read());
/// # }
/// ```
#[derive(Default)]
pub struct HandlerBuilder {
    output: Option<BoxedWriter>,
    input: Option<BoxedReader>,
    config: HandlerConfig,
    framing: Option<Arc<dyn FramingStrategy>>,
}

impl HandlerBuilder {
    /// Create a builder with default configuration and no streams.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the output stream.
    pub fn output<W>(mut self, stream: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        self.output = Some(Box::new(stream));
        self
    }

    /// Set the input stream.
    pub fn input<R>(mut self, stream: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        self.input = Some(Box::new(stream));
        self
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: HandlerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the payload encoding.
    ///
    /// Default: UTF-8
    pub fn encoding(mut self, encoding: TextEncoding) -> Self {
        self.config.encoding = encoding;
        self
    }

    /// Select a built-in wire format.
    ///
    /// Default: `HeaderDelimited`
    pub fn framing(mut self, kind: FramingKind) -> Self {
        self.config.framing = kind;
        self
    }

    /// Use a custom framing strategy, overriding [`framing`](Self::framing).
    pub fn framing_strategy(mut self, strategy: Arc<dyn FramingStrategy>) -> Self {
        self.framing = Some(strategy);
        self
    }

    /// Set the flush policy.
    ///
    /// Default: `PerMessage`
    pub fn flush_policy(mut self, policy: FlushPolicy) -> Self {
        self.config.flush_policy = policy;
        self
    }

    /// Set the largest encoded message accepted by the built-in framings.
    ///
    /// Default: 16 MiB
    pub fn max_message_size(mut self, limit: usize) -> Self {
        self.config.max_message_size = limit;
        self
    }

    /// Set how many bytes are requested from the input per read.
    ///
    /// Default: 64 KiB
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.config.read_buffer_size = size;
        self
    }

    /// Set the teardown budget for the output stream.
    ///
    /// Default: 5 seconds
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.config.shutdown_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Build the handler.
    ///
    /// # Panics
    ///
    /// If an output stream was supplied and no Tokio runtime is running.
    pub fn build(self) -> MessageHandler {
        let framing = self
            .framing
            .unwrap_or_else(|| self.config.framing.build(self.config.max_message_size));
        MessageHandler::with_framing(self.output, self.input, &self.config, framing)
    }
}
