//! Transport module - adapters from tokio streams to handler inputs.
//!
//! The handler owns its streams as boxed trait objects so one handler type
//! serves pipes, sockets, stdio and in-memory duplexes alike.
//!
//! # Example
//!
//! ```
//! use msgwire::transport;
//!
//! let (stream, _peer) = tokio::io::duplex(1024);
//! let (reader, writer) = transport::split(stream);
//! # drop((reader, writer));
//! ```

use tokio::io::{AsyncRead, AsyncWrite};

/// Owned input stream.
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Owned output stream.
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Box an input stream.
pub fn reader<R>(stream: R) -> BoxedReader
where
    R: AsyncRead + Send + Unpin + 'static,
{
    Box::new(stream)
}

/// Box an output stream.
pub fn writer<W>(stream: W) -> BoxedWriter
where
    W: AsyncWrite + Send + Unpin + 'static,
{
    Box::new(stream)
}

/// Split a bidirectional stream into independently owned halves.
pub fn split<S>(stream: S) -> (BoxedReader, BoxedWriter)
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (read_half, write_half) = tokio::io::split(stream);
    (Box::new(read_half), Box::new(write_half))
}

/// This process's stdin and stdout, the usual JSON-RPC server transport.
///
/// Anything else printed to stdout corrupts the stream; send logs to stderr.
pub fn stdio() -> (BoxedReader, BoxedWriter) {
    (Box::new(tokio::io::stdin()), Box::new(tokio::io::stdout()))
}
