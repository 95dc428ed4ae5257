//! # msgwire
//!
//! Delimited message transport over async byte streams.
//!
//! A [`MessageHandler`] turns an output stream and an input stream (either
//! optional) into a channel of whole text messages, the layer an RPC engine
//! such as a JSON-RPC client sits on.
//!
//! ## Architecture
//!
//! - **Framing** ([`protocol`]): pluggable wire formats. `Content-Length`
//!   headers by default, newline-delimited and 4-byte length prefix built in.
//! - **Write path**: frames queue for a dedicated writer task and never
//!   interleave, even when a caller drops its `write` future.
//! - **Read path**: one read in flight, later reads queue; surplus bytes carry
//!   over to the next message.
//! - **Lifecycle** ([`lifecycle`]): dispose once, wake every pending
//!   operation, close both streams.
//!
//! ## Example
//!
//! ```
//! use msgwire::{HandlerConfig, MessageHandler};
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> msgwire::Result<()> {
//! let (a, b) = tokio::io::duplex(1024);
//! let client = MessageHandler::from_duplex(a, HandlerConfig::default());
//! let server = MessageHandler::from_duplex(b, HandlerConfig::default());
//! let cancel = CancellationToken::new();
//!
//! client.write("hello", &cancel).await?;
//! assert_eq!(server.read(&cancel).await?.as_deref(), Some("hello"));
//!
//! client.dispose().await;
//! server.dispose().await;
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod error;
pub mod handler;
pub mod lifecycle;
pub mod protocol;
pub mod transport;

mod reader;
mod writer;

pub use codec::TextEncoding;
pub use error::{MsgwireError, Result};
pub use handler::{FlushPolicy, HandlerBuilder, HandlerConfig, MessageHandler};
pub use lifecycle::DisposalState;
pub use protocol::{FramingKind, FramingStrategy, ParseOutcome};
pub use tokio_util::sync::CancellationToken;
