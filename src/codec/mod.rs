//! Codec module - conversion between messages and payload bytes.
//!
//! - [`TextEncoding`] - charset used for message text on the wire
//! - [`JsonCodec`] - serde_json helpers for JSON-RPC payloads
//!
//! # Design
//!
//! Codecs are plain values and marker structs rather than trait objects.
//! Framing strategies receive the encoding by value on every call, so one
//! strategy instance can serve handlers configured with different charsets.

mod json;
mod text;

pub use json::JsonCodec;
pub use text::TextEncoding;
