//! Handler module - the message handler and its configuration.
//!
//! Provides:
//! - [`MessageHandler`] - frames, writes, reads and de-frames messages
//! - [`HandlerBuilder`] - fluent construction
//! - [`HandlerConfig`] / [`FlushPolicy`] - serde-loadable settings
//!
//! # Example
//!
//! ```
//! use msgwire::MessageHandler;
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let (_peer, input) = tokio::io::duplex(64);
//! let handler = MessageHandler::builder().input(input).build();
//!
//! let err = handler.write("hi", &CancellationToken::new()).await.unwrap_err();
//! assert!(matches!(err, msgwire::MsgwireError::InvalidOperation(_)));
//! # }
//! ```

mod builder;
mod config;
mod message_handler;

pub use builder::HandlerBuilder;
pub use config::{FlushPolicy, HandlerConfig, DEFAULT_SHUTDOWN_TIMEOUT};
pub use message_handler::MessageHandler;
