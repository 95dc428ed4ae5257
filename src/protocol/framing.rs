//! The framing contract shared by every wire format.
//!
//! A strategy turns one message into one self-delimiting frame, and inspects
//! a growing byte buffer to decide whether a whole frame is present. It does
//! no I/O, so each strategy is tested directly against byte slices.

use std::fmt;
use std::sync::Arc;

use bytes::BytesMut;
use serde::{Deserialize, Serialize};

use super::{HeaderDelimited, LengthPrefixed, NewlineDelimited};
use crate::codec::TextEncoding;
use crate::error::Result;

/// Default maximum encoded message size (16 MiB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Result of inspecting buffered bytes for one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    /// The bytes so far are a valid prefix of a frame; read more.
    Incomplete,
    /// A whole frame starts the buffer.
    Complete {
        /// The decoded message.
        message: String,
        /// Number of bytes the frame occupies, headers included.
        consumed: usize,
    },
    /// The bytes can never become a valid frame.
    Malformed(String),
}

/// Serialize/parse pair defining one wire format.
///
/// Implementations must satisfy the round-trip law: for every message that
/// `serialize` accepts, `try_parse` on the produced bytes returns
/// `Complete` with the same message and the full frame length, and returns
/// `Incomplete` on every strict prefix of it.
pub trait FramingStrategy: Send + Sync + fmt::Debug {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Append the frame for `message` to `dst`.
    ///
    /// # Errors
    ///
    /// - `Encoding` if `message` has chars `encoding` cannot represent
    /// - `Framing` if the message cannot be delimited by this format
    ///
    /// `dst` is left untouched on error.
    fn serialize(&self, message: &str, encoding: TextEncoding, dst: &mut BytesMut) -> Result<()>;

    /// Inspect `buffer` for a complete frame at its start.
    fn try_parse(&self, buffer: &[u8], encoding: TextEncoding) -> ParseOutcome;

    /// Like [`try_parse`](Self::try_parse) on a buffer that only grew since
    /// an earlier call returned `Incomplete` along with `scanned`.
    ///
    /// Returns the outcome and, for `Incomplete`, how many leading bytes need
    /// not be examined again (at most `buffer.len()`). Strategies whose parse
    /// cost does not grow with the buffer keep this default, which starts
    /// over every time.
    fn resume_parse(
        &self,
        buffer: &[u8],
        scanned: usize,
        encoding: TextEncoding,
    ) -> (ParseOutcome, usize) {
        let _ = scanned;
        (self.try_parse(buffer, encoding), 0)
    }
}

/// Built-in framing formats, selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FramingKind {
    /// `Content-Length` header block, then payload (default).
    #[default]
    HeaderDelimited,
    /// One message per line.
    NewlineDelimited,
    /// 4-byte big-endian length, then payload.
    LengthPrefixed,
}

impl FramingKind {
    /// Instantiate the strategy with the given message size limit.
    pub fn build(self, max_message_size: usize) -> Arc<dyn FramingStrategy> {
        match self {
            FramingKind::HeaderDelimited => {
                Arc::new(HeaderDelimited::with_max_message_size(max_message_size))
            }
            FramingKind::NewlineDelimited => {
                Arc::new(NewlineDelimited::with_max_message_size(max_message_size))
            }
            FramingKind::LengthPrefixed => {
                Arc::new(LengthPrefixed::with_max_message_size(max_message_size))
            }
        }
    }
}

/// Shared size check used by the built-in strategies when serializing.
pub(crate) fn check_size(len: usize, max_message_size: usize) -> Result<()> {
    if len > max_message_size {
        return Err(crate::error::MsgwireError::Framing(format!(
            "Message size {} exceeds maximum {}",
            len, max_message_size
        )));
    }
    Ok(())
}
