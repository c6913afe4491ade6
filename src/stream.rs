//! Streaming chat pipeline.
//!
//! A producer task reads SSE lines from the response body, decodes every
//! data frame into a [`ChatResponse`] and forwards its first [`Choice`]
//! through a bounded channel. The consumer side is [`ChoiceStream`].
//!
//! The producer stops when it sees `data: [DONE]`, when the body ends, after
//! forwarding a decode or transport error, when the cancellation token
//! fires, or when the `ChoiceStream` is dropped. In every case the body is
//! dropped with the task, which releases the connection.
//!
//! There is no idle timeout between frames: a server that keeps the
//! connection open without sending anything keeps the consumer waiting until
//! it cancels.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};
use tracing::debug;

use crate::api::chat::{ChatResponse, Choice};
use crate::client::ClientError;
use crate::sse::{self, Frame};

/// Default number of decoded choices buffered ahead of the consumer.
pub const DEFAULT_STREAM_BUFFER: usize = 64;

/// Stream of choices produced by a streaming chat call.
///
/// Yields choices in frame order. After an `Err` item (decode error,
/// transport error or [`ClientError::StreamCancelled`]) the stream ends.
pub struct ChoiceStream {
    rx: mpsc::Receiver<Result<Choice, ClientError>>,
    cancelled: Pin<Box<WaitForCancellationFutureOwned>>,
    done: bool,
}

impl ChoiceStream {
    /// Spawn the producer task over a stream of SSE lines.
    ///
    /// `capacity` bounds how many decoded choices may wait for the consumer;
    /// once full, the producer stops reading the body until there is room.
    /// Must be called within a tokio runtime.
    pub fn spawn<S>(lines: S, cancel: CancellationToken, capacity: usize) -> Self
    where
        S: Stream<Item = Result<String, ClientError>> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        tokio::spawn(produce(lines, tx, cancel.clone()));

        Self {
            rx,
            cancelled: Box::pin(cancel.cancelled_owned()),
            done: false,
        }
    }
}

impl Stream for ChoiceStream {
    type Item = Result<Choice, ClientError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        if this.cancelled.as_mut().poll(cx).is_ready() {
            this.done = true;
            this.rx.close();
            return Poll::Ready(Some(Err(ClientError::StreamCancelled)));
        }

        match this.rx.poll_recv(cx) {
            Poll::Ready(Some(item)) => {
                if item.is_err() {
                    this.done = true;
                }
                Poll::Ready(Some(item))
            }
            Poll::Ready(None) => {
                this.done = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl std::fmt::Debug for ChoiceStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChoiceStream")
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

/// What a single SSE line amounts to.
#[derive(Debug)]
pub(crate) enum Step {
    Emit(Choice),
    Skip,
    Done,
}

/// Decode one SSE line.
///
/// Frames that decode to `null`, or carry no choices, are skipped. Only the
/// first choice of a frame is kept.
pub(crate) fn decode_line(line: &str) -> Result<Step, ClientError> {
    match sse::parse_frame(line) {
        Frame::Skip => Ok(Step::Skip),
        Frame::Done => Ok(Step::Done),
        Frame::Data(data) => {
            let response: Option<ChatResponse> = serde_json::from_str(data)
                .map_err(|e| ClientError::InvalidFrame(format!("{e} | frame: {data}")))?;

            Ok(response
                .and_then(|r| r.choices.into_iter().next())
                .map_or(Step::Skip, Step::Emit))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Termination {
    Done,
    EndOfStream,
    Failed,
    Cancelled,
    Abandoned,
}

async fn produce<S>(
    lines: S,
    tx: mpsc::Sender<Result<Choice, ClientError>>,
    cancel: CancellationToken,
) where
    S: Stream<Item = Result<String, ClientError>> + Send + 'static,
{
    let mut lines = Box::pin(lines);
    let mut emitted = 0usize;

    let termination = loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break Termination::Cancelled,
            _ = tx.closed() => break Termination::Abandoned,
            next = lines.next() => next,
        };

        let line = match next {
            Some(Ok(line)) => line,
            Some(Err(e)) => {
                break deliver(&tx, &cancel, Err(e))
                    .await
                    .err()
                    .unwrap_or(Termination::Failed)
            }
            None => break Termination::EndOfStream,
        };

        match decode_line(&line) {
            Ok(Step::Skip) => continue,
            Ok(Step::Done) => break Termination::Done,
            Ok(Step::Emit(choice)) => {
                if let Err(termination) = deliver(&tx, &cancel, Ok(choice)).await {
                    break termination;
                }
                emitted += 1;
            }
            Err(e) => {
                break deliver(&tx, &cancel, Err(e))
                    .await
                    .err()
                    .unwrap_or(Termination::Failed)
            }
        }
    };

    debug!(?termination, emitted, "chat stream closed");
}

/// Hand one item to the consumer, waiting for room in the channel.
async fn deliver(
    tx: &mpsc::Sender<Result<Choice, ClientError>>,
    cancel: &CancellationToken,
    item: Result<Choice, ClientError>,
) -> Result<(), Termination> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Termination::Cancelled),
        sent = tx.send(item) => sent.map_err(|_| Termination::Abandoned),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures::stream;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn frame(content: &str) -> String {
        serde_json::json!({
            "id": "chunk",
            "object": "chat.completion.chunk",
            "created": 1,
            "model": "deepseek-chat",
            "choices": [{"index": 0, "delta": {"content": content}, "finish_reason": null}]
        })
        .to_string()
    }

    fn body(lines: &[String]) -> impl Stream<Item = Result<String, ClientError>> + Send + 'static {
        let owned: Vec<Result<String, ClientError>> = lines.iter().cloned().map(Ok).collect();
        stream::iter(owned)
    }

    fn spawn(lines: impl Stream<Item = Result<String, ClientError>> + Send + 'static) -> ChoiceStream {
        ChoiceStream::spawn(lines, CancellationToken::new(), DEFAULT_STREAM_BUFFER)
    }

    async fn contents(stream: ChoiceStream) -> Vec<String> {
        stream
            .map(|choice| choice.unwrap().content().unwrap_or_default().to_string())
            .collect()
            .await
    }

    /// Sets the flag when dropped, i.e. when the producer lets go of the body.
    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_decode_line_steps() {
        assert!(matches!(decode_line("").unwrap(), Step::Skip));
        assert!(matches!(decode_line("data: [DONE]").unwrap(), Step::Done));
        assert!(matches!(decode_line("data: null").unwrap(), Step::Skip));
        assert!(matches!(
            decode_line(r#"data: {"id":"x","choices":[]}"#).unwrap(),
            Step::Skip
        ));
        assert!(matches!(
            decode_line(&format!("data: {}", frame("hi"))).unwrap(),
            Step::Emit(_)
        ));

        let err = decode_line("data: {not json").unwrap_err();
        assert!(matches!(err, ClientError::InvalidFrame(_)));
        assert!(err.to_string().contains("{not json"));
    }

    #[test]
    fn test_decode_line_keeps_first_choice_only() {
        let line = r#"data: {"choices":[{"index":0,"delta":{"content":"a"}},{"index":1,"delta":{"content":"b"}}]}"#;
        match decode_line(line).unwrap() {
            Step::Emit(choice) => {
                assert_eq!(choice.index, 0);
                assert_eq!(choice.content(), Some("a"));
            }
            other => panic!("unexpected step: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_emits_in_order_until_done() {
        let lines = vec![
            format!("data: {}", frame("Hel")),
            String::new(),
            format!("data: {}", frame("lo")),
            "data: [DONE]".to_string(),
            format!("data: {}", frame("after done")),
        ];
        assert_eq!(contents(spawn(body(&lines))).await, vec!["Hel", "lo"]);
    }

    #[tokio::test]
    async fn test_blank_and_empty_choice_frames_do_not_terminate() {
        let lines = vec![
            "   ".to_string(),
            ": keep-alive".to_string(),
            r#"data: {"id":"x","choices":[]}"#.to_string(),
            "data: null".to_string(),
            "data".to_string(),
            format!("data: {}", frame("still here")),
        ];
        assert_eq!(contents(spawn(body(&lines))).await, vec!["still here"]);
    }

    #[tokio::test]
    async fn test_end_of_stream_without_sentinel() {
        let lines = vec![format!("data: {}", frame("a")), format!("data: {}", frame("b"))];
        assert_eq!(contents(spawn(body(&lines))).await, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_malformed_frame_is_fatal() {
        let lines = vec![
            format!("data: {}", frame("ok")),
            "data: {\"choices\": [".to_string(),
            format!("data: {}", frame("unreachable")),
        ];
        let items: Vec<_> = spawn(body(&lines)).collect().await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap().content(), Some("ok"));
        assert!(items[1].as_ref().unwrap_err().is_decode());
    }

    #[tokio::test]
    async fn test_transport_error_is_forwarded() {
        let lines: Vec<Result<String, ClientError>> = vec![
            Ok(format!("data: {}", frame("a"))),
            Err(ClientError::InvalidFrame("connection reset".to_string())),
        ];
        let items: Vec<_> = spawn(stream::iter(lines)).collect().await;

        assert_eq!(items.len(), 2);
        assert!(items[1].is_err());
    }

    #[tokio::test]
    async fn test_byte_chunks_through_sse_lines() {
        let payload = format!(
            "data: {}\n\ndata: {}\n\ndata: [DONE]\n\n",
            frame("Hello, "),
            frame("world")
        );
        let chunks: Vec<Result<Bytes, ClientError>> = payload
            .as_bytes()
            .chunks(7)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();

        let stream = spawn(sse::lines(stream::iter(chunks)));
        assert_eq!(contents(stream).await.concat(), "Hello, world");
    }

    #[tokio::test]
    async fn test_cancellation_ends_stream() {
        let cancel = CancellationToken::new();
        let released = Arc::new(AtomicBool::new(false));
        let flag = DropFlag(released.clone());

        let lines = body(&[format!("data: {}", frame("first"))])
            .chain(stream::pending())
            .map(move |line| {
                let _keep = &flag;
                line
            });
        let mut stream = ChoiceStream::spawn(lines, cancel.clone(), 4);

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.content(), Some("first"));

        cancel.cancel();
        assert!(matches!(
            stream.next().await,
            Some(Err(ClientError::StreamCancelled))
        ));
        assert!(stream.next().await.is_none());

        tokio::time::timeout(Duration::from_secs(5), async {
            while !released.load(Ordering::SeqCst) {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("producer should drop the body after cancellation");
    }

    #[tokio::test]
    async fn test_dropping_stream_stops_producer() {
        let released = Arc::new(AtomicBool::new(false));
        let flag = DropFlag(released.clone());

        let lines = body(&[format!("data: {}", frame("only"))])
            .chain(stream::pending())
            .map(move |line| {
                let _keep = &flag;
                line
            });
        let mut stream = spawn(lines);
        assert!(stream.next().await.unwrap().is_ok());
        drop(stream);

        tokio::time::timeout(Duration::from_secs(5), async {
            while !released.load(Ordering::SeqCst) {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("producer should drop the body once the consumer is gone");
    }

    #[tokio::test]
    async fn test_bounded_buffer_applies_backpressure() {
        let capacity = 2;
        let pulled = Arc::new(AtomicUsize::new(0));
        let counter = pulled.clone();
        let lines: Vec<String> = (0..50).map(|i| format!("data: {}", frame(&i.to_string()))).collect();
        let counted = body(&lines).map(move |line| {
            counter.fetch_add(1, Ordering::SeqCst);
            line
        });
        let mut stream = ChoiceStream::spawn(counted, CancellationToken::new(), capacity);

        // Nothing is consumed yet: the producer must stall once the channel is full.
        tokio::time::sleep(Duration::from_millis(100)).await;
        let before_consuming = pulled.load(Ordering::SeqCst);
        assert!(before_consuming >= 1);
        assert!(before_consuming <= capacity + 2, "pulled {before_consuming} lines");

        let mut seen = Vec::new();
        while let Some(choice) = stream.next().await {
            seen.push(choice.unwrap().content().unwrap().to_string());
        }
        assert_eq!(seen, (0..50).map(|i| i.to_string()).collect::<Vec<_>>());
        assert_eq!(pulled.load(Ordering::SeqCst), 50);
    }
}
