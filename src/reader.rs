//! Read path: pulls bytes from the input stream until a frame completes.
//!
//! One read is in flight at a time. Concurrent callers queue on the read
//! state's mutex and are served in arrival order, each receiving one whole
//! message. Bytes read past the end of a frame stay in the [`FrameBuffer`]
//! for the next caller.
//!
//! Cancellation and disposal are both observed at every stream read. A
//! stream read that loses the race is dropped before it completes, and
//! `read_buf` is cancel safe, so bytes already buffered are never lost.

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::{MsgwireError, Result};
use crate::lifecycle::Lifecycle;
use crate::protocol::FrameBuffer;
use crate::transport::BoxedReader;

struct ReadState {
    /// `None` once teardown has released the stream.
    stream: Option<BoxedReader>,
    buffer: FrameBuffer,
    /// The stream reported end of input.
    finished: bool,
    /// Set by the first malformed frame; repeated to every later read.
    fault: Option<String>,
}

/// Input half of a handler.
pub(crate) struct MessageReader {
    state: Mutex<ReadState>,
}

impl MessageReader {
    pub(crate) fn new(stream: BoxedReader, buffer: FrameBuffer) -> Self {
        Self {
            state: Mutex::new(ReadState {
                stream: Some(stream),
                buffer,
                finished: false,
                fault: None,
            }),
        }
    }

    /// Read one message; `Ok(None)` after a clean end of stream.
    pub(crate) async fn read(
        &self,
        cancel: &CancellationToken,
        lifecycle: &Lifecycle,
    ) -> Result<Option<String>> {
        let mut guard = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(MsgwireError::OperationCanceled),
            _ = lifecycle.signaled() => return Err(MsgwireError::ObjectDisposed),
            guard = self.state.lock() => guard,
        };
        let ReadState {
            stream,
            buffer,
            finished,
            fault,
        } = &mut *guard;

        if let Some(reason) = fault {
            return Err(MsgwireError::Framing(reason.clone()));
        }

        loop {
            match buffer.try_extract() {
                Ok(Some(message)) => {
                    tracing::trace!(
                        chars = message.len(),
                        remaining = buffer.len(),
                        "message read"
                    );
                    return Ok(Some(message));
                }
                Ok(None) => {}
                Err(e) => {
                    if let MsgwireError::Framing(reason) = &e {
                        tracing::debug!(framing = buffer.framing_name(), %reason, "malformed frame");
                        *fault = Some(reason.clone());
                    }
                    buffer.clear();
                    return Err(e);
                }
            }

            if *finished {
                return Ok(None);
            }

            let reader = stream.as_mut().ok_or(MsgwireError::ObjectDisposed)?;
            let n = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(MsgwireError::OperationCanceled),
                _ = lifecycle.signaled() => return Err(MsgwireError::ObjectDisposed),
                n = buffer.fill_from(reader) => n?,
            };

            if n == 0 {
                *finished = true;
                if !buffer.is_empty() {
                    let buffered = buffer.len();
                    buffer.clear();
                    tracing::debug!(buffered, "input ended inside a frame");
                    return Err(MsgwireError::ConnectionClosed { buffered });
                }
                tracing::debug!("input stream ended");
                return Ok(None);
            }
        }
    }

    /// Drop the stream and any buffered bytes. Teardown only.
    pub(crate) async fn close(&self) {
        let mut state = self.state.lock().await;
        if state.stream.take().is_some() {
            tracing::debug!(discarded = state.buffer.len(), "input stream closed");
        }
        state.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::codec::TextEncoding;
    use crate::protocol::NewlineDelimited;
    use tokio::io::{duplex, AsyncWriteExt, DuplexStream};

    fn line_reader(stream: DuplexStream) -> MessageReader {
        let buffer = FrameBuffer::new(Arc::new(NewlineDelimited::new()), TextEncoding::Utf8);
        MessageReader::new(Box::new(stream), buffer)
    }

    #[tokio::test]
    async fn test_reads_messages_then_clean_end() {
        let (mut peer, local) = duplex(256);
        let reader = line_reader(local);
        let lifecycle = Lifecycle::new();
        let cancel = CancellationToken::new();

        peer.write_all(b"one\ntwo\n").await.unwrap();
        drop(peer);

        assert_eq!(reader.read(&cancel, &lifecycle).await.unwrap().as_deref(), Some("one"));
        assert_eq!(reader.read(&cancel, &lifecycle).await.unwrap().as_deref(), Some("two"));
        assert_eq!(reader.read(&cancel, &lifecycle).await.unwrap(), None);
        // End of stream is sticky.
        assert_eq!(reader.read(&cancel, &lifecycle).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_truncated_frame_is_connection_closed() {
        let (mut peer, local) = duplex(256);
        let reader = line_reader(local);
        let lifecycle = Lifecycle::new();
        let cancel = CancellationToken::new();

        peer.write_all(b"whole\npart").await.unwrap();
        drop(peer);

        assert_eq!(reader.read(&cancel, &lifecycle).await.unwrap().as_deref(), Some("whole"));
        let err = reader.read(&cancel, &lifecycle).await.unwrap_err();
        assert!(matches!(err, MsgwireError::ConnectionClosed { buffered: 4 }));
        assert_eq!(reader.read(&cancel, &lifecycle).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_malformed_frame_faults_the_path() {
        let (mut peer, local) = duplex(256);
        let reader = line_reader(local);
        let lifecycle = Lifecycle::new();
        let cancel = CancellationToken::new();

        peer.write_all(b"\xff\xfe\nfine\n").await.unwrap();

        assert!(matches!(
            reader.read(&cancel, &lifecycle).await,
            Err(MsgwireError::Framing(_))
        ));
        assert!(matches!(
            reader.read(&cancel, &lifecycle).await,
            Err(MsgwireError::Framing(_))
        ));
    }

    #[tokio::test]
    async fn test_cancel_keeps_partial_frame() {
        let (mut peer, local) = duplex(256);
        let reader = Arc::new(line_reader(local));
        let lifecycle = Arc::new(Lifecycle::new());

        peer.write_all(b"hal").await.unwrap();

        let cancel = CancellationToken::new();
        let pending = {
            let reader = reader.clone();
            let lifecycle = lifecycle.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { reader.read(&cancel, &lifecycle).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();
        assert!(matches!(
            pending.await.unwrap(),
            Err(MsgwireError::OperationCanceled)
        ));

        peer.write_all(b"f\n").await.unwrap();
        let message = reader
            .read(&CancellationToken::new(), &lifecycle)
            .await
            .unwrap();
        assert_eq!(message.as_deref(), Some("half"));
    }

    #[tokio::test]
    async fn test_disposal_wakes_blocked_read() {
        let (_peer, local) = duplex(256);
        let reader = Arc::new(line_reader(local));
        let lifecycle = Arc::new(Lifecycle::new());

        let pending = {
            let reader = reader.clone();
            let lifecycle = lifecycle.clone();
            tokio::spawn(async move { reader.read(&CancellationToken::new(), &lifecycle).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        lifecycle.begin();

        let result = tokio::time::timeout(Duration::from_secs(1), pending)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Err(MsgwireError::ObjectDisposed)));

        reader.close().await;
        assert!(reader.state.lock().await.stream.is_none());
    }

    #[tokio::test]
    async fn test_queued_reads_each_get_one_message() {
        let (mut peer, local) = duplex(256);
        let reader = Arc::new(line_reader(local));
        let lifecycle = Arc::new(Lifecycle::new());

        let tasks: Vec<_> = (0..3)
            .map(|_| {
                let reader = reader.clone();
                let lifecycle = lifecycle.clone();
                tokio::spawn(async move {
                    reader.read(&CancellationToken::new(), &lifecycle).await
                })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(10)).await;
        peer.write_all(b"a\nb\nc\n").await.unwrap();

        let mut got = Vec::new();
        for task in tasks {
            got.push(task.await.unwrap().unwrap().unwrap());
        }
        got.sort();
        assert_eq!(got, vec!["a", "b", "c"]);
    }
}
