//! Dedicated writer task for frame sending.
//!
//! # Architecture
//!
//! ```text
//! Caller 1 ─┐
//! Caller 2 ─┼─► serialize ─► mpsc::Sender<Command> ─► Writer Task ─► output stream
//! Caller N ─┘                                            │
//!                                            oneshot ◄───┘ (per-frame outcome)
//! ```
//!
//! Frames are built on the caller's task, so encoding errors never reach the
//! queue. The writer task owns the stream and writes one frame at a time in
//! channel order. Because no caller future ever touches the stream, dropping
//! a `write` future cannot leave half a frame behind: a frame that has
//! started is always finished by the task.
//!
//! # Cancellation
//!
//! Each queued frame carries a [`Ticket`]. A caller that gives up (its token
//! fires or its future is dropped) withdraws the ticket; the task skips
//! withdrawn frames. Once the task has claimed a ticket the caller's token is
//! honored only until the first byte is accepted by the stream. Disposal is
//! honored at every await, and the task then flushes and shuts the stream
//! down within the shutdown budget.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::codec::TextEncoding;
use crate::error::{MsgwireError, Result};
use crate::handler::FlushPolicy;
use crate::lifecycle::Lifecycle;
use crate::protocol::FramingStrategy;
use crate::transport::BoxedWriter;

/// Frames that may wait for the writer task before callers block on send.
const WRITE_QUEUE_CAPACITY: usize = 64;

const QUEUED: u8 = 0;
const STARTED: u8 = 1;
const WITHDRAWN: u8 = 2;

/// Claim on a queued frame, shared by the caller and the writer task.
#[derive(Clone)]
struct Ticket(Arc<AtomicU8>);

impl Ticket {
    fn new() -> Self {
        Self(Arc::new(AtomicU8::new(QUEUED)))
    }

    /// Writer side: claim the frame. False if the caller already gave up.
    fn start(&self) -> bool {
        self.0
            .compare_exchange(QUEUED, STARTED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Caller side: take the frame back. False once writing has begun.
    fn withdraw(&self) -> bool {
        self.0
            .compare_exchange(QUEUED, WITHDRAWN, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Withdraws the frame if the caller's future is dropped while it is queued.
struct WithdrawOnDrop(Ticket);

impl Drop for WithdrawOnDrop {
    fn drop(&mut self) {
        self.0.withdraw();
    }
}

enum Command {
    Frame {
        frame: Bytes,
        cancel: CancellationToken,
        ticket: Ticket,
        reply: oneshot::Sender<Result<()>>,
    },
    Flush {
        cancel: CancellationToken,
        reply: oneshot::Sender<Result<()>>,
    },
}

impl Command {
    fn refuse(self) {
        let reply = match self {
            Command::Frame { reply, .. } | Command::Flush { reply, .. } => reply,
        };
        let _ = reply.send(Err(MsgwireError::ObjectDisposed));
    }
}

/// Output half of a handler.
pub(crate) struct MessageWriter {
    tx: mpsc::Sender<Command>,
    /// `None` once teardown has joined the task.
    task: Mutex<Option<JoinHandle<()>>>,
    framing: Arc<dyn FramingStrategy>,
    encoding: TextEncoding,
}

impl MessageWriter {
    /// Spawn the writer task for `stream`. Must run inside a Tokio runtime.
    ///
    /// The task ends when `disposed` fires or the writer is dropped, and
    /// always flushes and shuts the stream down on the way out.
    pub(crate) fn spawn(
        stream: BoxedWriter,
        framing: Arc<dyn FramingStrategy>,
        encoding: TextEncoding,
        flush_policy: FlushPolicy,
        shutdown_timeout: Duration,
        disposed: CancellationToken,
    ) -> Self {
        let (tx, rx) = mpsc::channel(WRITE_QUEUE_CAPACITY);
        let task = tokio::spawn(writer_loop(
            rx,
            stream,
            flush_policy,
            shutdown_timeout,
            disposed,
        ));

        Self {
            tx,
            task: Mutex::new(Some(task)),
            framing,
            encoding,
        }
    }

    /// Frame one message and wait until the writer task has written it.
    pub(crate) async fn write(
        &self,
        message: &str,
        cancel: &CancellationToken,
        lifecycle: &Lifecycle,
    ) -> Result<()> {
        let mut frame = BytesMut::new();
        self.framing.serialize(message, self.encoding, &mut frame)?;
        let bytes = frame.len();

        let ticket = Ticket::new();
        let (reply, mut done) = oneshot::channel();
        let command = Command::Frame {
            frame: frame.freeze(),
            cancel: cancel.clone(),
            ticket: ticket.clone(),
            reply,
        };
        self.enqueue(command, cancel, lifecycle).await?;
        let queued = WithdrawOnDrop(ticket);

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            outcome = &mut done => Some(outcome),
            _ = lifecycle.signaled() => return Err(MsgwireError::ObjectDisposed),
        };
        let outcome = match outcome {
            Some(outcome) => outcome,
            None => {
                if queued.0.withdraw() {
                    return Err(MsgwireError::OperationCanceled);
                }
                // Claimed by the task: it reports whether the token won the
                // race for the first byte.
                tokio::select! {
                    biased;
                    outcome = done => outcome,
                    _ = lifecycle.signaled() => return Err(MsgwireError::ObjectDisposed),
                }
            }
        };

        let result = outcome.unwrap_or(Err(MsgwireError::ObjectDisposed));
        if result.is_ok() {
            tracing::trace!(bytes, framing = self.framing.name(), "frame written");
        }
        result
    }

    /// Flush bytes the stream has buffered.
    pub(crate) async fn flush(&self, cancel: &CancellationToken, lifecycle: &Lifecycle) -> Result<()> {
        let (reply, done) = oneshot::channel();
        let command = Command::Flush {
            cancel: cancel.clone(),
            reply,
        };
        self.enqueue(command, cancel, lifecycle).await?;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(MsgwireError::OperationCanceled),
            outcome = done => outcome.unwrap_or(Err(MsgwireError::ObjectDisposed)),
            _ = lifecycle.signaled() => Err(MsgwireError::ObjectDisposed),
        }
    }

    /// Wait for the writer task to finish its teardown.
    ///
    /// Only called once disposal has begun, which is what stops the task.
    pub(crate) async fn close(&self) {
        let Some(task) = self.task.lock().await.take() else {
            return;
        };
        if let Err(e) = task.await {
            tracing::warn!(error = %e, "writer task failed");
        }
    }

    async fn enqueue(
        &self,
        command: Command,
        cancel: &CancellationToken,
        lifecycle: &Lifecycle,
    ) -> Result<()> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(MsgwireError::OperationCanceled),
            _ = lifecycle.signaled() => Err(MsgwireError::ObjectDisposed),
            sent = self.tx.send(command) => sent.map_err(|_| MsgwireError::ObjectDisposed),
        }
    }
}

/// Receives commands and writes them to the stream, one at a time.
async fn writer_loop(
    mut rx: mpsc::Receiver<Command>,
    mut stream: BoxedWriter,
    flush_policy: FlushPolicy,
    shutdown_timeout: Duration,
    disposed: CancellationToken,
) {
    loop {
        let command = tokio::select! {
            biased;
            _ = disposed.cancelled() => break,
            command = rx.recv() => match command {
                Some(command) => command,
                None => break,
            },
        };

        match command {
            Command::Frame {
                frame,
                cancel,
                ticket,
                reply,
            } => {
                if !ticket.start() {
                    tracing::trace!(bytes = frame.len(), "skipping withdrawn frame");
                    continue;
                }
                let mut result = write_frame(&mut stream, &frame, &cancel, &disposed).await;
                if result.is_ok() && flush_policy == FlushPolicy::PerMessage {
                    result = flush_stream(&mut stream, &disposed).await;
                }
                let _ = reply.send(result);
            }
            Command::Flush { cancel, reply } => {
                let result = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(MsgwireError::OperationCanceled),
                    result = flush_stream(&mut stream, &disposed) => result,
                };
                let _ = reply.send(result);
            }
        }
    }

    rx.close();
    while let Ok(command) = rx.try_recv() {
        command.refuse();
    }

    let shutdown = async {
        stream.flush().await?;
        stream.shutdown().await
    };
    match tokio::time::timeout(shutdown_timeout, shutdown).await {
        Ok(Ok(())) => tracing::debug!("output stream closed"),
        Ok(Err(e)) => tracing::debug!(error = %e, "output stream shutdown failed"),
        Err(_) => tracing::warn!(timeout = ?shutdown_timeout, "output stream shutdown timed out"),
    }
}

/// Write all of `frame`, honoring `cancel` only before the first byte.
async fn write_frame(
    stream: &mut BoxedWriter,
    frame: &[u8],
    cancel: &CancellationToken,
    disposed: &CancellationToken,
) -> Result<()> {
    if frame.is_empty() {
        return Ok(());
    }

    let mut written = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(MsgwireError::OperationCanceled),
        _ = disposed.cancelled() => return Err(MsgwireError::ObjectDisposed),
        n = stream.write(frame) => n?,
    };
    if written == 0 {
        return Err(write_zero());
    }

    while written < frame.len() {
        let n = tokio::select! {
            biased;
            _ = disposed.cancelled() => return Err(MsgwireError::ObjectDisposed),
            n = stream.write(&frame[written..]) => n?,
        };
        if n == 0 {
            return Err(write_zero());
        }
        written += n;
    }
    Ok(())
}

fn write_zero() -> MsgwireError {
    MsgwireError::Io(std::io::Error::new(
        std::io::ErrorKind::WriteZero,
        "output stream accepted no bytes",
    ))
}

async fn flush_stream(stream: &mut BoxedWriter, disposed: &CancellationToken) -> Result<()> {
    tokio::select! {
        biased;
        _ = disposed.cancelled() => Err(MsgwireError::ObjectDisposed),
        result = stream.flush() => Ok(result?),
    }
}
