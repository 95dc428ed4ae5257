//! The delimited message handler.
//!
//! Owns up to two streams and exchanges whole text messages over them. All
//! operations take `&self`, so one handler wrapped in an `Arc` is shared by
//! the tasks of an RPC engine.
//!
//! # Failure precedence
//!
//! Every operation checks, before touching a stream:
//!
//! 1. caller's token canceled → `OperationCanceled` (even when disposed)
//! 2. handler disposed → `ObjectDisposed`
//! 3. direction not configured → `InvalidOperation`

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;

use super::{HandlerBuilder, HandlerConfig};
use crate::codec::{JsonCodec, TextEncoding};
use crate::error::{MsgwireError, Result};
use crate::lifecycle::{DisposalState, Lifecycle};
use crate::protocol::{FrameBuffer, FramingStrategy};
use crate::reader::MessageReader;
use crate::transport::{self, BoxedReader, BoxedWriter};
use crate::writer::MessageWriter;

const NO_OUTPUT: &str = "no output stream configured";
const NO_INPUT: &str = "no input stream configured";

/// Duplex message transport over an optional output and an optional input
/// stream.
///
/// # Example
///
/// ```
/// use msgwire::{HandlerConfig, MessageHandler};
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> msgwire::Result<()> {
/// let (a, b) = tokio::io::duplex(4096);
/// let client = MessageHandler::from_duplex(a, HandlerConfig::default());
/// let server = MessageHandler::from_duplex(b, HandlerConfig::default());
/// let cancel = CancellationToken::new();
///
/// client.write(r#"{"jsonrpc":"2.0","method":"ping"}"#, &cancel).await?;
/// let received = server.read(&cancel).await?;
/// assert_eq!(received.as_deref(), Some(r#"{"jsonrpc":"2.0","method":"ping"}"#));
///
/// client.dispose().await;
/// assert_eq!(server.read(&cancel).await?, None);
/// # Ok(())
/// # }
/// ```
pub struct MessageHandler {
    writer: Option<MessageWriter>,
    reader: Option<MessageReader>,
    framing: Arc<dyn FramingStrategy>,
    encoding: TextEncoding,
    lifecycle: Lifecycle,
}

impl MessageHandler {
    /// Create a handler from already-boxed streams.
    ///
    /// `can_write()` is fixed to `output.is_some()` and `can_read()` to
    /// `input.is_some()` for the life of the handler.
    ///
    /// # Panics
    ///
    /// If an output stream is supplied outside a Tokio runtime: the output
    /// is driven by a spawned writer task.
    pub fn new(
        output: Option<BoxedWriter>,
        input: Option<BoxedReader>,
        config: HandlerConfig,
    ) -> Self {
        let framing = config.framing.build(config.max_message_size);
        Self::with_framing(output, input, &config, framing)
    }

    /// Create a handler reading and writing one bidirectional stream.
    pub fn from_duplex<S>(stream: S, config: HandlerConfig) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (input, output) = transport::split(stream);
        Self::new(Some(output), Some(input), config)
    }

    /// Create a builder.
    pub fn builder() -> HandlerBuilder {
        HandlerBuilder::new()
    }

    pub(crate) fn with_framing(
        output: Option<BoxedWriter>,
        input: Option<BoxedReader>,
        config: &HandlerConfig,
        framing: Arc<dyn FramingStrategy>,
    ) -> Self {
        let lifecycle = Lifecycle::new();
        let writer = output.map(|stream| {
            MessageWriter::spawn(
                stream,
                framing.clone(),
                config.encoding,
                config.flush_policy,
                config.shutdown_timeout(),
                lifecycle.token(),
            )
        });
        let reader = input.map(|stream| {
            let buffer =
                FrameBuffer::with_read_size(framing.clone(), config.encoding, config.read_buffer_size);
            MessageReader::new(stream, buffer)
        });

        tracing::debug!(
            framing = framing.name(),
            encoding = %config.encoding,
            can_read = reader.is_some(),
            can_write = writer.is_some(),
            "message handler created"
        );

        Self {
            writer,
            reader,
            framing,
            encoding: config.encoding,
            lifecycle,
        }
    }

    /// Whether an input stream was supplied.
    #[inline]
    pub fn can_read(&self) -> bool {
        self.reader.is_some()
    }

    /// Whether an output stream was supplied.
    #[inline]
    pub fn can_write(&self) -> bool {
        self.writer.is_some()
    }

    /// Payload encoding.
    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    /// Name of the framing strategy.
    pub fn framing_name(&self) -> &'static str {
        self.framing.name()
    }

    /// Frame and write one message.
    ///
    /// Concurrent writes are queued first come, first served and never
    /// interleave. `cancel` is honored until the first byte of the frame is
    /// sent. Dropping the returned future before that point withdraws the
    /// message; after it, the frame is still written whole.
    ///
    /// # Errors
    ///
    /// `OperationCanceled`, `ObjectDisposed`, `InvalidOperation`, `Encoding`,
    /// `Framing`, or `Io` (which also disposes the handler).
    pub async fn write(&self, message: &str, cancel: &CancellationToken) -> Result<()> {
        self.check_entry(cancel, self.can_write(), NO_OUTPUT)?;
        let writer = self.writer.as_ref().ok_or(MsgwireError::InvalidOperation(NO_OUTPUT))?;

        let result = writer.write(message, cancel, &self.lifecycle).await;
        self.observe(result).await
    }

    /// Serialize `value` as JSON and write it as one message.
    pub async fn write_json<T: Serialize>(&self, value: &T, cancel: &CancellationToken) -> Result<()> {
        self.check_entry(cancel, self.can_write(), NO_OUTPUT)?;
        let message = JsonCodec::encode(value)?;
        self.write(&message, cancel).await
    }

    /// Push buffered output to the peer. Needed with `FlushPolicy::Batched`.
    pub async fn flush(&self, cancel: &CancellationToken) -> Result<()> {
        self.check_entry(cancel, self.can_write(), NO_OUTPUT)?;
        let writer = self.writer.as_ref().ok_or(MsgwireError::InvalidOperation(NO_OUTPUT))?;

        let result = writer.flush(cancel, &self.lifecycle).await;
        self.observe(result).await
    }

    /// Read one message.
    ///
    /// Returns `Ok(None)` once the peer closed the stream cleanly between
    /// messages. Concurrent reads queue behind each other.
    ///
    /// # Errors
    ///
    /// `OperationCanceled`, `ObjectDisposed`, `InvalidOperation`, `Framing`
    /// (repeated by every later read), `ConnectionClosed` if the input ended
    /// inside a frame, or `Io` (which also disposes the handler).
    pub async fn read(&self, cancel: &CancellationToken) -> Result<Option<String>> {
        self.check_entry(cancel, self.can_read(), NO_INPUT)?;
        let reader = self.reader.as_ref().ok_or(MsgwireError::InvalidOperation(NO_INPUT))?;

        let result = reader.read(cancel, &self.lifecycle).await;
        self.observe(result).await
    }

    /// Read one message and deserialize it from JSON.
    pub async fn read_json<T: DeserializeOwned>(&self, cancel: &CancellationToken) -> Result<Option<T>> {
        match self.read(cancel).await? {
            Some(message) => Ok(Some(JsonCodec::decode(&message)?)),
            None => Ok(None),
        }
    }

    /// True once disposal has begun. Never reverts.
    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.lifecycle.is_disposed()
    }

    /// Current disposal state.
    pub fn disposal_state(&self) -> DisposalState {
        self.lifecycle.state()
    }

    /// Release both streams.
    ///
    /// The first call tears down: in-flight reads and writes fail with
    /// `ObjectDisposed`, the output is flushed and shut down (bounded by the
    /// configured shutdown timeout), the input is dropped. Later or
    /// concurrent calls return immediately; [`disposed`](Self::disposed)
    /// waits for the teardown itself.
    pub async fn dispose(&self) {
        if !self.lifecycle.begin() {
            return;
        }
        tracing::debug!(framing = self.framing.name(), "disposing message handler");

        if let Some(writer) = &self.writer {
            writer.close().await;
        }
        if let Some(reader) = &self.reader {
            reader.close().await;
        }

        self.lifecycle.finish();
        tracing::debug!("message handler disposed");
    }

    /// Wait until a dispose call has released both streams.
    pub async fn disposed(&self) {
        self.lifecycle.disposed().await
    }

    fn check_entry(&self, cancel: &CancellationToken, capable: bool, missing: &'static str) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(MsgwireError::OperationCanceled);
        }
        if self.lifecycle.is_disposed() {
            return Err(MsgwireError::ObjectDisposed);
        }
        if !capable {
            return Err(MsgwireError::InvalidOperation(missing));
        }
        Ok(())
    }

    /// Dispose on stream failure; the failing path has released its turn.
    async fn observe<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(MsgwireError::Io(e)) = &result {
            tracing::warn!(error = %e, "stream failure, disposing message handler");
            self.dispose().await;
        }
        result
    }
}

impl fmt::Debug for MessageHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageHandler")
            .field("can_read", &self.can_read())
            .field("can_write", &self.can_write())
            .field("framing", &self.framing.name())
            .field("encoding", &self.encoding)
            .field("state", &self.disposal_state())
            .finish()
    }
}
