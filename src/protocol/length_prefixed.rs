//! Binary length-prefixed framing.
//!
//! ```text
//! ┌──────────────┬───────────────────┐
//! │ Length       │ Payload           │
//! │ 4 bytes      │ Length bytes      │
//! │ uint32 BE    │ encoded text      │
//! └──────────────┴───────────────────┘
//! ```

use bytes::{BufMut, BytesMut};

use super::framing::{check_size, FramingStrategy, ParseOutcome, DEFAULT_MAX_MESSAGE_SIZE};
use crate::codec::TextEncoding;
use crate::error::{MsgwireError, Result};

/// Prefix size in bytes.
pub const PREFIX_SIZE: usize = 4;

/// 4-byte big-endian length prefix framing.
#[derive(Debug, Clone)]
pub struct LengthPrefixed {
    max_message_size: usize,
}

impl LengthPrefixed {
    /// Create with the default message size limit.
    pub fn new() -> Self {
        Self::with_max_message_size(DEFAULT_MAX_MESSAGE_SIZE)
    }

    /// Create with a custom message size limit.
    pub fn with_max_message_size(max_message_size: usize) -> Self {
        Self { max_message_size }
    }
}

impl Default for LengthPrefixed {
    fn default() -> Self {
        Self::new()
    }
}

impl FramingStrategy for LengthPrefixed {
    fn name(&self) -> &'static str {
        "length-prefixed"
    }

    fn serialize(&self, message: &str, encoding: TextEncoding, dst: &mut BytesMut) -> Result<()> {
        let payload = encoding.encode(message)?;
        check_size(payload.len(), self.max_message_size)?;
        let len = u32::try_from(payload.len()).map_err(|_| {
            MsgwireError::Framing(format!(
                "Message size {} does not fit a 32-bit prefix",
                payload.len()
            ))
        })?;

        dst.reserve(PREFIX_SIZE + payload.len());
        dst.put_u32(len);
        dst.put_slice(&payload);
        Ok(())
    }

    fn try_parse(&self, buffer: &[u8], encoding: TextEncoding) -> ParseOutcome {
        if buffer.len() < PREFIX_SIZE {
            return ParseOutcome::Incomplete;
        }

        let len = u32::from_be_bytes([buffer[0], buffer[1], buffer[2], buffer[3]]) as usize;
        if len > self.max_message_size {
            return ParseOutcome::Malformed(format!(
                "Payload size {} exceeds maximum {}",
                len, self.max_message_size
            ));
        }

        let frame_end = PREFIX_SIZE + len;
        if buffer.len() < frame_end {
            return ParseOutcome::Incomplete;
        }

        match encoding.decode(&buffer[PREFIX_SIZE..frame_end]) {
            Ok(message) => ParseOutcome::Complete {
                message,
                consumed: frame_end,
            },
            Err(reason) => ParseOutcome::Malformed(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format() {
        let mut buf = BytesMut::new();
        LengthPrefixed::new()
            .serialize("hello", TextEncoding::Utf8, &mut buf)
            .unwrap();
        assert_eq!(&buf[..], b"\x00\x00\x00\x05hello");
    }

    #[test]
    fn test_fragmented_prefix_and_payload() {
        let framing = LengthPrefixed::new();
        let buf = b"\x00\x00\x00\x03abc\x00";
        assert_eq!(framing.try_parse(&buf[..2], TextEncoding::Utf8), ParseOutcome::Incomplete);
        assert_eq!(framing.try_parse(&buf[..5], TextEncoding::Utf8), ParseOutcome::Incomplete);
        assert_eq!(
            framing.try_parse(buf, TextEncoding::Utf8),
            ParseOutcome::Complete {
                message: "abc".to_string(),
                consumed: 7,
            }
        );
    }

    #[test]
    fn test_empty_payload() {
        assert_eq!(
            LengthPrefixed::new().try_parse(&[0, 0, 0, 0], TextEncoding::Utf8),
            ParseOutcome::Complete {
                message: String::new(),
                consumed: 4,
            }
        );
    }

    #[test]
    fn test_max_size_validation() {
        let framing = LengthPrefixed::with_max_message_size(100);
        let outcome = framing.try_parse(&1000u32.to_be_bytes(), TextEncoding::Utf8);
        assert!(matches!(outcome, ParseOutcome::Malformed(r) if r.contains("exceeds maximum")));
    }

    #[test]
    fn test_invalid_payload_encoding() {
        assert!(matches!(
            LengthPrefixed::new().try_parse(b"\x00\x00\x00\x01\x80", TextEncoding::Ascii),
            ParseOutcome::Malformed(_)
        ));
    }
}
