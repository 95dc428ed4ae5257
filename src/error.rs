//! Error types for msgwire.

use thiserror::Error;

/// Main error type for all handler operations.
///
/// Callers branch on the variant: `OperationCanceled` and `ObjectDisposed`
/// in particular are kept distinct so an RPC layer can tell a shutdown it
/// requested apart from a caller giving up.
#[derive(Debug, Error)]
pub enum MsgwireError {
    /// The handler lacks the stream this operation needs.
    #[error("Invalid operation: {0}")]
    InvalidOperation(&'static str),

    /// The handler was disposed before or during the operation.
    #[error("Handler has been disposed")]
    ObjectDisposed,

    /// The caller's cancellation token fired.
    #[error("Operation canceled")]
    OperationCanceled,

    /// The byte stream could not be split into frames, or a message cannot
    /// be framed by the configured strategy.
    #[error("Framing error: {0}")]
    Framing(String),

    /// The input stream ended in the middle of a frame.
    #[error("Connection closed with {buffered} bytes of an incomplete frame")]
    ConnectionClosed {
        /// Number of bytes received for the truncated frame.
        buffered: usize,
    },

    /// A message is not representable in the configured encoding.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// I/O error on one of the underlying streams.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MsgwireError {
    /// Whether the connection should be treated as unusable after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MsgwireError::Io(_)
                | MsgwireError::Framing(_)
                | MsgwireError::ConnectionClosed { .. }
                | MsgwireError::ObjectDisposed
        )
    }
}

/// Result type alias using MsgwireError.
pub type Result<T> = std::result::Result<T, MsgwireError>;
