//! Frame buffer for accumulating partial reads.
//!
//! Uses `bytes::BytesMut` so consumed frames are released from the front
//! without copying the remainder. The buffer owns the framing strategy and
//! encoding it parses with; bytes left after a complete frame stay buffered
//! for the next extraction.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use msgwire::codec::TextEncoding;
//! use msgwire::protocol::{FrameBuffer, NewlineDelimited};
//!
//! let mut buffer = FrameBuffer::new(Arc::new(NewlineDelimited::new()), TextEncoding::Utf8);
//!
//! // Data arrives in chunks from the stream
//! assert!(buffer.push(b"{\"id\":1}\n{\"id\"").unwrap() == vec!["{\"id\":1}".to_string()]);
//! assert_eq!(buffer.push(b":2}\n").unwrap(), vec!["{\"id\":2}".to_string()]);
//! assert!(buffer.is_empty());
//! ```

use std::sync::Arc;

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use super::framing::{FramingStrategy, ParseOutcome};
use crate::codec::TextEncoding;
use crate::error::{MsgwireError, Result};

/// Default number of bytes requested from the stream per read (64 KiB).
pub const DEFAULT_READ_SIZE: usize = 64 * 1024;

/// Buffer for accumulating incoming bytes and extracting complete messages.
pub struct FrameBuffer {
    /// Accumulated bytes from stream reads.
    buffer: BytesMut,
    /// Wire format used to find frame boundaries.
    framing: Arc<dyn FramingStrategy>,
    /// Charset of message payloads.
    encoding: TextEncoding,
    /// Bytes reserved before each stream read.
    read_size: usize,
    /// Leading bytes the strategy has already searched without finding a
    /// frame boundary. Reset whenever the front of the buffer moves.
    scanned: usize,
}

impl FrameBuffer {
    /// Create a new frame buffer with the default read size.
    pub fn new(framing: Arc<dyn FramingStrategy>, encoding: TextEncoding) -> Self {
        Self::with_read_size(framing, encoding, DEFAULT_READ_SIZE)
    }

    /// Create a new frame buffer with a custom read size.
    pub fn with_read_size(
        framing: Arc<dyn FramingStrategy>,
        encoding: TextEncoding,
        read_size: usize,
    ) -> Self {
        let read_size = read_size.max(1);
        Self {
            buffer: BytesMut::with_capacity(read_size),
            framing,
            encoding,
            read_size,
            scanned: 0,
        }
    }

    /// Push data into the buffer and extract all complete messages.
    ///
    /// Partial data is kept for the next push.
    ///
    /// # Errors
    ///
    /// Returns `Framing` if the strategy reports malformed bytes. Messages
    /// completed before the malformed frame are lost with the error.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<String>> {
        self.buffer.extend_from_slice(data);

        let mut messages = Vec::new();
        while let Some(message) = self.try_extract()? {
            messages.push(message);
        }
        Ok(messages)
    }

    /// Try to extract a single message from the buffer.
    ///
    /// Returns:
    /// - `Ok(Some(message))` if a complete frame was consumed
    /// - `Ok(None)` if more data is needed
    /// - `Err(Framing)` if the buffered bytes can never form a frame
    pub fn try_extract(&mut self) -> Result<Option<String>> {
        let (outcome, scanned) = self
            .framing
            .resume_parse(&self.buffer, self.scanned, self.encoding);
        match outcome {
            ParseOutcome::Incomplete => {
                self.scanned = scanned.min(self.buffer.len());
                Ok(None)
            }
            ParseOutcome::Complete { message, consumed } => {
                self.scanned = 0;
                if consumed == 0 || consumed > self.buffer.len() {
                    return Err(MsgwireError::Framing(format!(
                        "{} reported {} consumed bytes of {} buffered",
                        self.framing.name(),
                        consumed,
                        self.buffer.len()
                    )));
                }
                self.buffer.advance(consumed);
                Ok(Some(message))
            }
            ParseOutcome::Malformed(reason) => {
                self.scanned = 0;
                Err(MsgwireError::Framing(reason))
            }
        }
    }

    /// Read once from `reader`, appending to the buffer.
    ///
    /// Returns the number of bytes read; `0` means end of stream. Cancel
    /// safe: if the future is dropped no bytes are lost.
    pub async fn fill_from<R>(&mut self, reader: &mut R) -> std::io::Result<usize>
    where
        R: AsyncRead + Unpin,
    {
        self.buffer.reserve(self.read_size);
        reader.read_buf(&mut self.buffer).await
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Discard all buffered bytes.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.scanned = 0;
    }

    /// Name of the framing strategy in use.
    pub fn framing_name(&self) -> &'static str {
        self.framing.name()
    }
}

impl std::fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("buffered", &self.buffer.len())
            .field("framing", &self.framing.name())
            .field("encoding", &self.encoding)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    use proptest::prelude::*;

    use crate::protocol::{HeaderDelimited, LengthPrefixed, NewlineDelimited};

    fn header_buffer() -> FrameBuffer {
        FrameBuffer::new(Arc::new(HeaderDelimited::new()), TextEncoding::Utf8)
    }

    fn make_frame(message: &str) -> Vec<u8> {
        let mut buf = BytesMut::new();
        HeaderDelimited::new()
            .serialize(message, TextEncoding::Utf8, &mut buf)
            .unwrap();
        buf.to_vec()
    }

    #[test]
    fn test_single_complete_frame() {
        let mut buffer = header_buffer();
        let messages = buffer.push(&make_frame("hello")).unwrap();
        assert_eq!(messages, vec!["hello".to_string()]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_multiple_frames_in_one_push() {
        let mut buffer = header_buffer();
        let mut combined = make_frame("first");
        combined.extend(make_frame("second"));
        combined.extend(make_frame("third"));

        let messages = buffer.push(&combined).unwrap();
        assert_eq!(messages, vec!["first", "second", "third"]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_mixed_complete_and_partial() {
        let mut buffer = header_buffer();
        let frame1 = make_frame("first");
        let frame2 = make_frame("second");

        let mut data = frame1.clone();
        data.extend_from_slice(&frame2[..5]);

        let messages = buffer.push(&data).unwrap();
        assert_eq!(messages, vec!["first"]);
        assert_eq!(buffer.len(), 5);

        let messages = buffer.push(&frame2[5..]).unwrap();
        assert_eq!(messages, vec!["second"]);
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut buffer = header_buffer();
        let mut all = Vec::new();
        for byte in make_frame("hi") {
            all.extend(buffer.push(&[byte]).unwrap());
        }
        assert_eq!(all, vec!["hi"]);
    }

    #[test]
    fn test_malformed_surfaces_as_framing_error() {
        let mut buffer = FrameBuffer::new(
            Arc::new(LengthPrefixed::with_max_message_size(100)),
            TextEncoding::Utf8,
        );
        let result = buffer.push(&1000u32.to_be_bytes());
        assert!(matches!(result, Err(MsgwireError::Framing(_))));
    }

    #[derive(Debug)]
    struct ZeroConsumed;

    impl FramingStrategy for ZeroConsumed {
        fn name(&self) -> &'static str {
            "zero-consumed"
        }

        fn serialize(&self, _: &str, _: TextEncoding, _: &mut BytesMut) -> Result<()> {
            Ok(())
        }

        fn try_parse(&self, _: &[u8], _: TextEncoding) -> ParseOutcome {
            ParseOutcome::Complete {
                message: String::new(),
                consumed: 0,
            }
        }
    }

    #[test]
    fn test_rejects_strategy_consuming_nothing() {
        let mut buffer = FrameBuffer::new(Arc::new(ZeroConsumed), TextEncoding::Utf8);
        let err = buffer.push(b"x").unwrap_err();
        assert!(err.to_string().contains("zero-consumed"));
    }

    #[test]
    fn test_long_line_in_small_chunks_is_linear() {
        let mut buffer = FrameBuffer::new(Arc::new(NewlineDelimited::new()), TextEncoding::Utf8);
        let line = vec![b'a'; 4 * 1024 * 1024];

        let started = Instant::now();
        for chunk in line.chunks(4 * 1024) {
            assert!(buffer.push(chunk).unwrap().is_empty());
        }
        let messages = buffer.push(b"\n").unwrap();
        let elapsed = started.elapsed();

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].len(), line.len());
        assert!(elapsed < Duration::from_secs(5), "took {:?}", elapsed);
    }

    #[test]
    fn test_scan_offset_resets_between_frames() {
        let mut buffer = FrameBuffer::new(Arc::new(NewlineDelimited::new()), TextEncoding::Utf8);
        assert!(buffer.push(b"first").unwrap().is_empty());
        assert_eq!(buffer.scanned, 5);

        assert_eq!(buffer.push(b"\nsec").unwrap(), vec!["first"]);
        assert_eq!(buffer.scanned, 3);

        buffer.clear();
        assert_eq!(buffer.scanned, 0);
        assert_eq!(buffer.push(b"x\n").unwrap(), vec!["x"]);
    }

    #[test]
    fn test_clear() {
        let mut buffer = header_buffer();
        buffer.push(b"Content-Le").unwrap();
        assert_eq!(buffer.len(), 10);
        buffer.clear();
        assert!(buffer.is_empty());
    }

    #[tokio::test]
    async fn test_fill_from_stream() {
        let (mut client, mut server) = tokio::io::duplex(64);
        tokio::io::AsyncWriteExt::write_all(&mut client, &make_frame("streamed"))
            .await
            .unwrap();
        drop(client);

        let mut buffer = FrameBuffer::with_read_size(
            Arc::new(HeaderDelimited::new()),
            TextEncoding::Utf8,
            4,
        );
        let mut messages = Vec::new();
        loop {
            let n = buffer.fill_from(&mut server).await.unwrap();
            if n == 0 {
                break;
            }
            while let Some(m) = buffer.try_extract().unwrap() {
                messages.push(m);
            }
        }
        assert_eq!(messages, vec!["streamed"]);
        assert!(buffer.is_empty());
    }

    fn arb_encoding() -> impl Strategy<Value = TextEncoding> {
        prop_oneof![
            Just(TextEncoding::Utf8),
            Just(TextEncoding::Ascii),
            Just(TextEncoding::Latin1),
            Just(TextEncoding::Utf16Le),
            Just(TextEncoding::Utf16Be),
        ]
    }

    /// Map `text` onto a message every strategy accepts under `encoding`.
    fn framable(encoding: TextEncoding, text: &str) -> String {
        let mapped: String = text
            .chars()
            .map(|c| match encoding {
                TextEncoding::Ascii if !c.is_ascii() => '?',
                TextEncoding::Latin1 if u32::from(c) > 0xFF => '?',
                _ if c == '\n' => ' ',
                _ => c,
            })
            .collect();
        mapped.trim_end_matches('\r').to_string()
    }

    proptest! {
        #[test]
        fn test_chunked_stream_yields_messages_in_order(
            encoding in arb_encoding(),
            texts in prop::collection::vec(".{0,40}", 1..8),
            chunk in 1usize..17,
        ) {
            let messages: Vec<String> = texts.iter().map(|t| framable(encoding, t)).collect();
            let framings: Vec<Arc<dyn FramingStrategy>> = vec![
                Arc::new(HeaderDelimited::new()),
                Arc::new(NewlineDelimited::new()),
                Arc::new(NewlineDelimited::new().crlf()),
                Arc::new(LengthPrefixed::new()),
            ];
            for framing in framings {
                let mut wire = BytesMut::new();
                for message in &messages {
                    framing.serialize(message, encoding, &mut wire).unwrap();
                }

                let mut buffer = FrameBuffer::new(framing.clone(), encoding);
                let mut received = Vec::new();
                for piece in wire.chunks(chunk) {
                    received.extend(buffer.push(piece).unwrap());
                }
                prop_assert_eq!(&received, &messages, "framing {}", framing.name());
                prop_assert!(buffer.is_empty());
            }
        }
    }
}
