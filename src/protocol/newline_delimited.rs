//! Newline-delimited framing: one message per line.
//!
//! The delimiter is `\n` in the message encoding (two bytes for UTF-16), and
//! the search only looks at code-unit boundaries. A `\r` right before the
//! delimiter is dropped on read, so peers writing `\r\n` interoperate.
//! Messages containing `\n`, or ending in `\r`, cannot be framed this way.

use bytes::{BufMut, BytesMut};

use super::framing::{check_size, FramingStrategy, ParseOutcome, DEFAULT_MAX_MESSAGE_SIZE};
use crate::codec::TextEncoding;
use crate::error::{MsgwireError, Result};

/// Line framing.
#[derive(Debug, Clone)]
pub struct NewlineDelimited {
    max_message_size: usize,
    crlf: bool,
}

impl NewlineDelimited {
    /// Create with the default message size limit, writing `\n`.
    pub fn new() -> Self {
        Self::with_max_message_size(DEFAULT_MAX_MESSAGE_SIZE)
    }

    /// Create with a custom message size limit, writing `\n`.
    pub fn with_max_message_size(max_message_size: usize) -> Self {
        Self {
            max_message_size,
            crlf: false,
        }
    }

    /// Write `\r\n` instead of `\n`.
    pub fn crlf(mut self) -> Self {
        self.crlf = true;
        self
    }
}

impl Default for NewlineDelimited {
    fn default() -> Self {
        Self::new()
    }
}

fn line_feed(encoding: TextEncoding) -> &'static [u8] {
    match encoding {
        TextEncoding::Utf16Le => &[0x0A, 0x00],
        TextEncoding::Utf16Be => &[0x00, 0x0A],
        _ => b"\n",
    }
}

fn carriage_return(encoding: TextEncoding) -> &'static [u8] {
    match encoding {
        TextEncoding::Utf16Le => &[0x0D, 0x00],
        TextEncoding::Utf16Be => &[0x00, 0x0D],
        _ => b"\r",
    }
}

impl FramingStrategy for NewlineDelimited {
    fn name(&self) -> &'static str {
        "newline-delimited"
    }

    fn serialize(&self, message: &str, encoding: TextEncoding, dst: &mut BytesMut) -> Result<()> {
        if message.contains('\n') {
            return Err(MsgwireError::Framing(
                "message contains the newline delimiter".to_string(),
            ));
        }
        if message.ends_with('\r') {
            return Err(MsgwireError::Framing(
                "message ends with a carriage return".to_string(),
            ));
        }
        let payload = encoding.encode(message)?;
        check_size(payload.len(), self.max_message_size)?;

        let lf = line_feed(encoding);
        let cr = carriage_return(encoding);
        dst.reserve(payload.len() + lf.len() + cr.len());
        dst.put_slice(&payload);
        if self.crlf {
            dst.put_slice(cr);
        }
        dst.put_slice(lf);
        Ok(())
    }

    fn try_parse(&self, buffer: &[u8], encoding: TextEncoding) -> ParseOutcome {
        self.resume_parse(buffer, 0, encoding).0
    }

    fn resume_parse(
        &self,
        buffer: &[u8],
        scanned: usize,
        encoding: TextEncoding,
    ) -> (ParseOutcome, usize) {
        let lf = line_feed(encoding);
        let width = lf.len();
        let aligned = buffer.len() - buffer.len() % width;
        // Units before `start` were already searched for the delimiter.
        let start = (scanned - scanned % width).min(aligned);

        let line_end = buffer[start..]
            .chunks_exact(width)
            .position(|unit| unit == lf)
            .map(|index| start + index * width);

        let line_end = match line_end {
            Some(end) => end,
            // Room for the payload plus an optional `\r`.
            None if buffer.len() > self.max_message_size + width => {
                let reason = format!("no line delimiter within {} bytes", self.max_message_size);
                return (ParseOutcome::Malformed(reason), 0);
            }
            None => return (ParseOutcome::Incomplete, aligned),
        };

        let mut line = &buffer[..line_end];
        if line.ends_with(carriage_return(encoding)) {
            line = &line[..line.len() - width];
        }
        if line.len() > self.max_message_size {
            let reason = format!(
                "line of {} bytes exceeds maximum {}",
                line.len(),
                self.max_message_size
            );
            return (ParseOutcome::Malformed(reason), 0);
        }

        let outcome = match encoding.decode(line) {
            Ok(message) => ParseOutcome::Complete {
                message,
                consumed: line_end + width,
            },
            Err(reason) => ParseOutcome::Malformed(reason),
        };
        (outcome, 0)
    }
}
