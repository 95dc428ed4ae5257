//! JSON codec using `serde_json`.
//!
//! Output is always compact: `serde_json::to_string` escapes control
//! characters inside strings, so an encoded value never contains a raw
//! newline and is safe for every framing strategy.
//!
//! # Example
//!
//! ```
//! use msgwire::codec::JsonCodec;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct Ping {
//!     id: u32,
//!     note: String,
//! }
//!
//! let msg = Ping { id: 1, note: "two\nlines".to_string() };
//! let text = JsonCodec::encode(&msg).unwrap();
//! assert!(!text.contains('\n'));
//! let back: Ping = JsonCodec::decode(&text).unwrap();
//! assert_eq!(back, msg);
//! ```

use crate::error::Result;

/// JSON codec for message payloads.
pub struct JsonCodec;

impl JsonCodec {
    /// Encode a value as a compact JSON message.
    #[inline]
    pub fn encode<T: serde::Serialize>(value: &T) -> Result<String> {
        Ok(serde_json::to_string(value)?)
    }

    /// Decode a JSON message into a value.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(message: &str) -> Result<T> {
        Ok(serde_json::from_str(message)?)
    }
}
