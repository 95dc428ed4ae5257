//! HTTP-style header framing, as used by JSON-RPC over stdio and LSP.
//!
//! ```text
//! Content-Length: 47\r\n
//! Content-Type: application/vscode-jsonrpc; charset=utf-16le\r\n   (optional)
//! \r\n
//! <47 bytes of payload>
//! ```
//!
//! `Content-Length` counts payload bytes, not characters. `Content-Type` is
//! only written when the payload is not UTF-8; when read, its `charset`
//! parameter overrides the handler's encoding for that one message.

use bytes::{BufMut, BytesMut};

use super::framing::{check_size, FramingStrategy, ParseOutcome, DEFAULT_MAX_MESSAGE_SIZE};
use crate::codec::TextEncoding;
use crate::error::Result;

/// Maximum size of the header block, terminator included.
pub const MAX_HEADER_BLOCK: usize = 8 * 1024;

/// Media type written in `Content-Type`.
pub const CONTENT_TYPE: &str = "application/vscode-jsonrpc";

const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// `Content-Length` header framing.
#[derive(Debug, Clone)]
pub struct HeaderDelimited {
    max_message_size: usize,
}

impl HeaderDelimited {
    /// Create with the default message size limit.
    pub fn new() -> Self {
        Self::with_max_message_size(DEFAULT_MAX_MESSAGE_SIZE)
    }

    /// Create with a custom message size limit.
    pub fn with_max_message_size(max_message_size: usize) -> Self {
        Self { max_message_size }
    }
}

impl Default for HeaderDelimited {
    fn default() -> Self {
        Self::new()
    }
}

/// Fields pulled out of a header block.
struct Headers {
    content_length: usize,
    charset: Option<TextEncoding>,
}

fn parse_headers(block: &[u8]) -> std::result::Result<Headers, String> {
    let text = std::str::from_utf8(block)
        .ok()
        .filter(|t| t.is_ascii())
        .ok_or_else(|| "header block is not ascii".to_string())?;

    let mut content_length = None;
    let mut charset = None;

    for line in text.split("\r\n") {
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| format!("header line without ':': {:?}", line))?;
        let name = name.trim();
        let value = value.trim();

        if name.eq_ignore_ascii_case("content-length") {
            if content_length.is_some() {
                return Err("duplicate Content-Length header".to_string());
            }
            let len = value
                .parse::<usize>()
                .map_err(|_| format!("invalid Content-Length: {:?}", value))?;
            content_length = Some(len);
        } else if name.eq_ignore_ascii_case("content-type") {
            for param in value.split(';').skip(1) {
                if let Some((key, label)) = param.split_once('=') {
                    if key.trim().eq_ignore_ascii_case("charset") {
                        let encoding = TextEncoding::from_label(label)
                            .ok_or_else(|| format!("unsupported charset: {:?}", label.trim()))?;
                        charset = Some(encoding);
                    }
                }
            }
        }
        // Unknown headers are ignored.
    }

    Ok(Headers {
        content_length: content_length
            .ok_or_else(|| "missing Content-Length header".to_string())?,
        charset,
    })
}

impl FramingStrategy for HeaderDelimited {
    fn name(&self) -> &'static str {
        "header-delimited"
    }

    fn serialize(&self, message: &str, encoding: TextEncoding, dst: &mut BytesMut) -> Result<()> {
        let payload = encoding.encode(message)?;
        check_size(payload.len(), self.max_message_size)?;

        let mut header = format!("Content-Length: {}\r\n", payload.len());
        if encoding != TextEncoding::Utf8 {
            header.push_str(&format!(
                "Content-Type: {}; charset={}\r\n",
                CONTENT_TYPE,
                encoding.label()
            ));
        }
        header.push_str("\r\n");

        dst.reserve(header.len() + payload.len());
        dst.put_slice(header.as_bytes());
        dst.put_slice(&payload);
        Ok(())
    }

    fn try_parse(&self, buffer: &[u8], encoding: TextEncoding) -> ParseOutcome {
        let window = &buffer[..buffer.len().min(MAX_HEADER_BLOCK)];
        let header_end = match window
            .windows(HEADER_TERMINATOR.len())
            .position(|w| w == HEADER_TERMINATOR)
        {
            Some(pos) => pos,
            None if buffer.len() >= MAX_HEADER_BLOCK => {
                return ParseOutcome::Malformed(format!(
                    "header block exceeds {} bytes",
                    MAX_HEADER_BLOCK
                ));
            }
            None => return ParseOutcome::Incomplete,
        };

        let headers = match parse_headers(&buffer[..header_end]) {
            Ok(h) => h,
            Err(reason) => return ParseOutcome::Malformed(reason),
        };
        if headers.content_length > self.max_message_size {
            return ParseOutcome::Malformed(format!(
                "Content-Length {} exceeds maximum {}",
                headers.content_length, self.max_message_size
            ));
        }

        let body_start = header_end + HEADER_TERMINATOR.len();
        let frame_end = body_start + headers.content_length;
        if buffer.len() < frame_end {
            return ParseOutcome::Incomplete;
        }

        let encoding = headers.charset.unwrap_or(encoding);
        match encoding.decode(&buffer[body_start..frame_end]) {
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
    use crate::error::MsgwireError;

    fn frame(message: &str, encoding: TextEncoding) -> BytesMut {
        let mut buf = BytesMut::new();
        HeaderDelimited::new()
            .serialize(message, encoding, &mut buf)
            .unwrap();
        buf
    }

    #[test]
    fn test_utf8_wire_format() {
        let buf = frame(r#"{"id":1}"#, TextEncoding::Utf8);
        assert_eq!(&buf[..], b"Content-Length: 8\r\n\r\n{\"id\":1}");
    }

    #[test]
    fn test_content_length_counts_bytes() {
        let buf = frame("é", TextEncoding::Utf8);
        assert!(buf.starts_with(b"Content-Length: 2\r\n"));
    }

    #[test]
    fn test_non_utf8_writes_content_type() {
        let buf = frame("hi", TextEncoding::Utf16Le);
        let text = String::from_utf8_lossy(&buf);
        assert!(text.starts_with("Content-Length: 4\r\nContent-Type: application/vscode-jsonrpc; charset=utf-16le\r\n\r\n"));
    }

    #[test]
    fn test_parse_complete_with_remainder() {
        let mut buf = frame("first", TextEncoding::Utf8);
        let first_len = buf.len();
        buf.extend_from_slice(b"Content-Len");

        let outcome = HeaderDelimited::new().try_parse(&buf, TextEncoding::Utf8);
        assert_eq!(
            outcome,
            ParseOutcome::Complete {
                message: "first".to_string(),
                consumed: first_len,
            }
        );
    }

    #[test]
    fn test_every_prefix_is_incomplete() {
        let buf = frame("prefix check", TextEncoding::Utf8);
        let framing = HeaderDelimited::new();
        for end in 0..buf.len() {
            assert_eq!(
                framing.try_parse(&buf[..end], TextEncoding::Utf8),
                ParseOutcome::Incomplete,
                "prefix of {} bytes",
                end
            );
        }
    }

    #[test]
    fn test_charset_overrides_configured_encoding() {
        let buf = frame("über", TextEncoding::Latin1);
        let outcome = HeaderDelimited::new().try_parse(&buf, TextEncoding::Utf8);
        assert!(matches!(outcome, ParseOutcome::Complete { ref message, .. } if message == "über"));
    }

    #[test]
    fn test_header_names_case_insensitive_and_extra_headers_ignored() {
        let buf = b"X-Trace: abc\r\ncontent-length:  2\r\n\r\nok";
        let outcome = HeaderDelimited::new().try_parse(buf, TextEncoding::Utf8);
        assert_eq!(
            outcome,
            ParseOutcome::Complete {
                message: "ok".to_string(),
                consumed: buf.len(),
            }
        );
    }

    #[test]
    fn test_malformed_headers() {
        let framing = HeaderDelimited::new();
        let cases: &[&[u8]] = &[
            b"Content-Type: text/plain\r\n\r\n",
            b"Content-Length: ten\r\n\r\n",
            b"Content-Length: 1\r\nContent-Length: 1\r\n\r\nx",
            b"garbage\r\n\r\n",
            b"Content-Length: 2\r\nContent-Type: a; charset=koi8-r\r\n\r\nok",
            b"Content-Length: 1\r\nX: \xff\r\n\r\nx",
        ];
        for case in cases {
            assert!(
                matches!(framing.try_parse(case, TextEncoding::Utf8), ParseOutcome::Malformed(_)),
                "expected malformed: {:?}",
                String::from_utf8_lossy(case)
            );
        }
    }

    #[test]
    fn test_oversized_header_block() {
        let buf = vec![b'a'; MAX_HEADER_BLOCK];
        assert!(matches!(
            HeaderDelimited::new().try_parse(&buf, TextEncoding::Utf8),
            ParseOutcome::Malformed(_)
        ));
        assert_eq!(
            HeaderDelimited::new().try_parse(&buf[..100], TextEncoding::Utf8),
            ParseOutcome::Incomplete
        );
    }

    #[test]
    fn test_content_length_limit() {
        let framing = HeaderDelimited::with_max_message_size(4);
        let outcome = framing.try_parse(b"Content-Length: 5\r\n\r\n", TextEncoding::Utf8);
        assert!(matches!(outcome, ParseOutcome::Malformed(r) if r.contains("exceeds maximum")));

        let mut buf = BytesMut::new();
        let err = framing.serialize("hello", TextEncoding::Utf8, &mut buf).unwrap_err();
        assert!(matches!(err, MsgwireError::Framing(_)));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_invalid_payload_bytes() {
        let buf = b"Content-Length: 2\r\n\r\n\xff\xfe";
        assert!(matches!(
            HeaderDelimited::new().try_parse(buf, TextEncoding::Utf8),
            ParseOutcome::Malformed(_)
        ));
    }

    #[test]
    fn test_encoding_error_leaves_buffer_untouched() {
        let mut buf = BytesMut::from(&b"keep"[..]);
        let err = HeaderDelimited::new()
            .serialize("€", TextEncoding::Ascii, &mut buf)
            .unwrap_err();
        assert!(matches!(err, MsgwireError::Encoding(_)));
        assert_eq!(&buf[..], b"keep");
    }
}
