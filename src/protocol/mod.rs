//! Protocol module - framing strategies and frame buffering.
//!
//! This module implements the wire side of the handler:
//! - the [`FramingStrategy`] contract with its three-way [`ParseOutcome`]
//! - `Content-Length` header framing (default), line framing and
//!   length-prefixed framing
//! - [`FrameBuffer`] for accumulating partial reads

mod frame_buffer;
mod framing;
mod header_delimited;
mod length_prefixed;
mod newline_delimited;

pub use frame_buffer::{FrameBuffer, DEFAULT_READ_SIZE};
pub use framing::{FramingKind, FramingStrategy, ParseOutcome, DEFAULT_MAX_MESSAGE_SIZE};
pub use header_delimited::{HeaderDelimited, CONTENT_TYPE, MAX_HEADER_BLOCK};
pub use length_prefixed::{LengthPrefixed, PREFIX_SIZE};
pub use newline_delimited::NewlineDelimited;
