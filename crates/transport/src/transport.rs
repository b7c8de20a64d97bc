use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use crate::error::TransportResult;
use crate::ids::StreamTarget;
use crate::reply::ChatReply;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:8000";
pub const DEFAULT_STREAM_PATH: &str = "/chat-stream";
pub const DEFAULT_CHAT_PATH: &str = "/chat";
pub const DEFAULT_MESSAGE_PARAM: &str = "user_message";
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    pub endpoint: String,
    pub stream_path: String,
    pub chat_path: String,
    pub message_param: String,
    /// `None` waits on a silent stream forever.
    pub idle_timeout: Option<Duration>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            stream_path: DEFAULT_STREAM_PATH.to_string(),
            chat_path: DEFAULT_CHAT_PATH.to_string(),
            message_param: DEFAULT_MESSAGE_PARAM.to_string(),
            idle_timeout: Some(DEFAULT_IDLE_TIMEOUT),
        }
    }
}

impl TransportConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim().trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    pub fn with_stream_path(mut self, stream_path: impl Into<String>) -> Self {
        self.stream_path = stream_path.into();
        self
    }

    pub fn with_chat_path(mut self, chat_path: impl Into<String>) -> Self {
        self.chat_path = chat_path.into();
        self
    }

    pub fn with_message_param(mut self, message_param: impl Into<String>) -> Self {
        self.message_param = message_param.into();
        self
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Option<Duration>) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    pub target: StreamTarget,
    pub message: String,
}

impl StreamRequest {
    pub fn new(target: StreamTarget, message: impl Into<String>) -> Self {
        Self {
            target,
            message: message.into(),
        }
    }
}

/// One unit delivered by a stream worker, before any decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramePayload {
    /// The `data` field of one server-sent event.
    Data(String),
    /// The connection failed; no further frames follow.
    Error(String),
    /// The server closed the stream; no further frames follow.
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFrame {
    pub target: StreamTarget,
    pub payload: FramePayload,
}

impl StreamFrame {
    pub fn data(target: StreamTarget, data: impl Into<String>) -> Self {
        Self {
            target,
            payload: FramePayload::Data(data.into()),
        }
    }

    pub fn error(target: StreamTarget, message: impl Into<String>) -> Self {
        Self {
            target,
            payload: FramePayload::Error(message.into()),
        }
    }

    pub fn closed(target: StreamTarget) -> Self {
        Self {
            target,
            payload: FramePayload::Closed,
        }
    }

    /// Returns true when no frame of the same stream can follow this one.
    pub fn is_terminal(&self) -> bool {
        !matches!(self.payload, FramePayload::Data(_))
    }
}

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
pub type StreamWorker = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Receiving half of one live connection.
///
/// Cancelling or dropping it tells the worker to stop reading from the network.
pub struct FrameStream {
    target: StreamTarget,
    frames: mpsc::UnboundedReceiver<StreamFrame>,
    cancel_tx: Option<oneshot::Sender<()>>,
}

pub struct StreamHandle {
    pub stream: FrameStream,
    pub worker: StreamWorker,
}

impl FrameStream {
    pub(crate) fn new(
        target: StreamTarget,
        frames: mpsc::UnboundedReceiver<StreamFrame>,
        cancel_tx: oneshot::Sender<()>,
    ) -> Self {
        Self {
            target,
            frames,
            cancel_tx: Some(cancel_tx),
        }
    }

    pub fn target(&self) -> StreamTarget {
        self.target
    }

    pub async fn recv(&mut self) -> Option<StreamFrame> {
        self.frames.recv().await
    }

    pub fn try_recv(&mut self) -> Option<StreamFrame> {
        self.frames.try_recv().ok()
    }

    /// Signals the worker and stops accepting frames. Safe to call repeatedly.
    pub fn cancel(&mut self) -> bool {
        self.frames.close();
        self.cancel_tx
            .take()
            .map(|tx| tx.send(()).is_ok())
            .unwrap_or(false)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_tx.is_none()
    }
}

impl Drop for FrameStream {
    fn drop(&mut self) {
        if let Some(cancel_tx) = self.cancel_tx.take() {
            let _ = cancel_tx.send(());
        }
    }
}

pub trait ChatTransport: Send + Sync {
    fn name(&self) -> &str;
    /// Opens one push subscription for `request.message`.
    fn open_stream(&self, request: StreamRequest) -> TransportResult<StreamHandle>;
    /// Performs the request/response variant of the chat call.
    fn ask<'a>(&'a self, message: &'a str) -> BoxFuture<'a, TransportResult<ChatReply>>;
}

/// Creates the channel pair backing one connection.
///
/// The sender goes to the worker, the `FrameStream` to the consumer, and the
/// oneshot receiver resolves once the consumer cancels or drops its half.
pub fn make_frame_stream(
    target: StreamTarget,
) -> (
    mpsc::UnboundedSender<StreamFrame>,
    FrameStream,
    oneshot::Receiver<()>,
) {
    let (frame_tx, frame_rx) = mpsc::unbounded_channel();
    let (cancel_tx, cancel_rx) = oneshot::channel();
    (
        frame_tx,
        FrameStream::new(target, frame_rx, cancel_tx),
        cancel_rx,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{ConversationId, StreamSessionId};

    fn target() -> StreamTarget {
        StreamTarget::new(ConversationId::new(1), StreamSessionId::new(1))
    }

    #[tokio::test]
    async fn frames_arrive_in_send_order() {
        let (frame_tx, mut stream, _cancel_rx) = make_frame_stream(target());
        frame_tx.send(StreamFrame::data(target(), "a")).unwrap();
        frame_tx.send(StreamFrame::data(target(), "b")).unwrap();
        frame_tx.send(StreamFrame::closed(target())).unwrap();

        assert_eq!(stream.recv().await, Some(StreamFrame::data(target(), "a")));
        assert_eq!(stream.recv().await, Some(StreamFrame::data(target(), "b")));
        let last = stream.recv().await.unwrap();
        assert!(last.is_terminal());
    }

    #[tokio::test]
    async fn cancel_is_idempotent_and_signals_worker() {
        let (frame_tx, mut stream, cancel_rx) = make_frame_stream(target());
        assert!(stream.cancel());
        assert!(!stream.cancel());
        assert!(stream.is_cancelled());
        assert!(cancel_rx.await.is_ok());
        assert!(frame_tx.send(StreamFrame::data(target(), "late")).is_err());
    }

    #[tokio::test]
    async fn dropping_the_stream_signals_worker() {
        let (_frame_tx, stream, cancel_rx) = make_frame_stream(target());
        drop(stream);
        assert!(cancel_rx.await.is_ok());
    }

    #[test]
    fn config_trims_trailing_slash() {
        let config = TransportConfig::new(" http://example.test/ ");
        assert_eq!(config.endpoint, "http://example.test");
        assert_eq!(config.stream_path, DEFAULT_STREAM_PATH);
    }
}
