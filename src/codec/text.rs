//! Text encodings for message payloads.
//!
//! Messages are Rust strings; the wire carries them in whichever charset the
//! peer expects. UTF-8 is the default and the only one that cannot fail on
//! encode.
//!
//! # Example
//!
//! ```
//! use msgwire::codec::TextEncoding;
//!
//! let bytes = TextEncoding::Latin1.encode("café").unwrap();
//! assert_eq!(bytes, b"caf\xe9");
//! assert_eq!(TextEncoding::Latin1.decode(&bytes).unwrap(), "café");
//!
//! assert!(TextEncoding::Ascii.encode("café").is_err());
//! ```

use std::fmt;

use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::{MsgwireError, Result};

/// Character encoding used to convert messages to and from bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TextEncoding {
    /// UTF-8 (default).
    #[default]
    #[serde(rename = "utf-8", alias = "utf8")]
    Utf8,
    /// 7-bit US-ASCII.
    #[serde(rename = "us-ascii", alias = "ascii")]
    Ascii,
    /// ISO-8859-1: every char up to U+00FF maps to one byte.
    #[serde(rename = "iso-8859-1", alias = "latin1")]
    Latin1,
    /// UTF-16, little endian, no BOM.
    #[serde(rename = "utf-16le")]
    Utf16Le,
    /// UTF-16, big endian, no BOM.
    #[serde(rename = "utf-16be")]
    Utf16Be,
}

impl TextEncoding {
    /// Canonical charset label, as written in a `Content-Type` header.
    pub fn label(self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Ascii => "us-ascii",
            TextEncoding::Latin1 => "iso-8859-1",
            TextEncoding::Utf16Le => "utf-16le",
            TextEncoding::Utf16Be => "utf-16be",
        }
    }

    /// Look up an encoding by charset label (case-insensitive).
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim().trim_matches('"').to_ascii_lowercase();
        match label.as_str() {
            "utf-8" | "utf8" => Some(TextEncoding::Utf8),
            "us-ascii" | "ascii" => Some(TextEncoding::Ascii),
            "iso-8859-1" | "latin1" | "iso_8859-1" => Some(TextEncoding::Latin1),
            "utf-16le" | "utf-16" | "unicode" => Some(TextEncoding::Utf16Le),
            "utf-16be" | "unicodefffe" => Some(TextEncoding::Utf16Be),
            _ => None,
        }
    }

    /// Width in bytes of one code unit (1 for byte encodings, 2 for UTF-16).
    #[inline]
    pub fn unit_width(self) -> usize {
        match self {
            TextEncoding::Utf16Le | TextEncoding::Utf16Be => 2,
            _ => 1,
        }
    }

    /// Encode `text`, appending the bytes to `dst`.
    ///
    /// On error nothing past the last representable char is written, and the
    /// caller is expected to discard `dst`.
    pub fn encode_into(self, text: &str, dst: &mut BytesMut) -> Result<()> {
        match self {
            TextEncoding::Utf8 => dst.extend_from_slice(text.as_bytes()),
            TextEncoding::Ascii => {
                dst.reserve(text.len());
                for (offset, ch) in text.char_indices() {
                    if !ch.is_ascii() {
                        return Err(unrepresentable(self, ch, offset));
                    }
                    dst.put_u8(ch as u8);
                }
            }
            TextEncoding::Latin1 => {
                dst.reserve(text.len());
                for (offset, ch) in text.char_indices() {
                    let code = u32::from(ch);
                    if code > 0xFF {
                        return Err(unrepresentable(self, ch, offset));
                    }
                    dst.put_u8(code as u8);
                }
            }
            TextEncoding::Utf16Le => {
                dst.reserve(text.len() * 2);
                for unit in text.encode_utf16() {
                    dst.put_u16_le(unit);
                }
            }
            TextEncoding::Utf16Be => {
                dst.reserve(text.len() * 2);
                for unit in text.encode_utf16() {
                    dst.put_u16(unit);
                }
            }
        }
        Ok(())
    }

    /// Encode `text` into a fresh buffer.
    pub fn encode(self, text: &str) -> Result<Vec<u8>> {
        let mut buf = BytesMut::with_capacity(text.len());
        self.encode_into(text, &mut buf)?;
        Ok(buf.to_vec())
    }

    /// Decode `bytes` into a string.
    ///
    /// The error is a human-readable reason; framing strategies surface it as
    /// a malformed frame.
    pub fn decode(self, bytes: &[u8]) -> std::result::Result<String, String> {
        match self {
            TextEncoding::Utf8 => std::str::from_utf8(bytes)
                .map(str::to_owned)
                .map_err(|e| format!("invalid utf-8: {}", e)),
            TextEncoding::Ascii => match bytes.iter().position(|b| !b.is_ascii()) {
                Some(offset) => Err(format!(
                    "byte 0x{:02x} at offset {} is not us-ascii",
                    bytes[offset], offset
                )),
                None => Ok(bytes.iter().map(|&b| b as char).collect()),
            },
            TextEncoding::Latin1 => Ok(bytes.iter().map(|&b| b as char).collect()),
            TextEncoding::Utf16Le | TextEncoding::Utf16Be => {
                if bytes.len() % 2 != 0 {
                    return Err(format!("odd byte count {} for {}", bytes.len(), self));
                }
                let units = bytes.chunks_exact(2).map(|pair| {
                    let pair = [pair[0], pair[1]];
                    if self == TextEncoding::Utf16Le {
                        u16::from_le_bytes(pair)
                    } else {
                        u16::from_be_bytes(pair)
                    }
                });
                char::decode_utf16(units)
                    .collect::<std::result::Result<String, _>>()
                    .map_err(|e| format!("invalid {}: {}", self, e))
            }
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn unrepresentable(encoding: TextEncoding, ch: char, offset: usize) -> MsgwireError {
    MsgwireError::Encoding(format!(
        "character {:?} (U+{:04X}) at offset {} is not representable in {}",
        ch,
        u32::from(ch),
        offset,
        encoding
    ))
}
