#![deny(unsafe_code)]

//! HTTP plumbing for the dashboard assistant: event-stream subscriptions and the
//! request/response chat call.

use std::sync::Arc;

mod error;
mod ids;
mod reply;
mod sse;
mod transport;

pub use error::{TransportError, TransportResult};
pub use ids::{ConversationId, StreamSessionId, StreamTarget};
pub use reply::{ChatReply, ReplyRow};
pub use sse::{SSE_TRANSPORT_NAME, SseTransport};
pub use transport::{
    BoxFuture, ChatTransport, DEFAULT_CHAT_PATH, DEFAULT_ENDPOINT, DEFAULT_IDLE_TIMEOUT,
    DEFAULT_MESSAGE_PARAM, DEFAULT_STREAM_PATH, FramePayload, FrameStream, StreamFrame,
    StreamHandle, StreamRequest, StreamWorker, TransportConfig, make_frame_stream,
};

pub fn create_transport(config: TransportConfig) -> TransportResult<Arc<dyn ChatTransport>> {
    Ok(Arc::new(SseTransport::new(config)?))
}
