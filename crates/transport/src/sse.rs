use std::time::Duration;

use futures::StreamExt;
use reqwest_eventsource::{Event, EventSource};
use snafu::{ResultExt, ensure};
use tokio::sync::{mpsc, oneshot};
use url::Url;

use crate::error::{
    BuildClientSnafu, DecodeReplySnafu, EmptyMessageSnafu, InvalidEndpointSnafu, OpenStreamSnafu,
    RequestSnafu, ResponseStatusSnafu, TransportResult,
};
use crate::ids::StreamTarget;
use crate::reply::ChatReply;
use crate::transport::{
    BoxFuture, ChatTransport, FramePayload, StreamFrame, StreamHandle, StreamRequest,
    StreamWorker, TransportConfig, make_frame_stream,
};

pub const SSE_TRANSPORT_NAME: &str = "sse";

/// Transport talking to the dashboard backend over HTTP.
///
/// Streams are Server-Sent Events subscriptions; the request/response call is a
/// JSON POST.
pub struct SseTransport {
    config: TransportConfig,
    client: reqwest::Client,
}

impl SseTransport {
    pub fn new(config: TransportConfig) -> TransportResult<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context(BuildClientSnafu {
                stage: "sse-transport-new",
            })?;
        Self::with_client(config, client)
    }

    pub fn with_client(config: TransportConfig, client: reqwest::Client) -> TransportResult<Self> {
        // Validate once so every later URL join only deals with paths.
        Url::parse(&config.endpoint).context(InvalidEndpointSnafu {
            stage: "sse-transport-validate-endpoint",
            endpoint: config.endpoint.clone(),
        })?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    fn endpoint_url(&self, path: &str, stage: &'static str) -> TransportResult<Url> {
        let joined = format!("{}{}", self.config.endpoint.trim_end_matches('/'), path);
        Url::parse(&joined).context(InvalidEndpointSnafu {
            stage,
            endpoint: joined.clone(),
        })
    }

    /// Builds the subscription URL with the message as a percent-encoded query parameter.
    pub fn stream_url(&self, message: &str) -> TransportResult<Url> {
        let mut url = self.endpoint_url(&self.config.stream_path, "build-stream-url")?;
        url.query_pairs_mut()
            .append_pair(&self.config.message_param, message);
        Ok(url)
    }

    pub fn chat_url(&self) -> TransportResult<Url> {
        self.endpoint_url(&self.config.chat_path, "build-chat-url")
    }

    fn send_frame(
        frame_tx: &mpsc::UnboundedSender<StreamFrame>,
        target: StreamTarget,
        payload: FramePayload,
    ) -> bool {
        frame_tx.send(StreamFrame { target, payload }).is_ok()
    }

    async fn next_event(
        events: &mut EventSource,
        idle_timeout: Option<Duration>,
    ) -> Result<Option<Result<Event, reqwest_eventsource::Error>>, tokio::time::error::Elapsed>
    {
        match idle_timeout {
            Some(limit) => tokio::time::timeout(limit, events.next()).await,
            None => Ok(events.next().await),
        }
    }

    async fn run_stream_worker(
        target: StreamTarget,
        mut events: EventSource,
        idle_timeout: Option<Duration>,
        frame_tx: mpsc::UnboundedSender<StreamFrame>,
        mut cancel_rx: oneshot::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                _ = &mut cancel_rx => {
                    tracing::debug!(target = %target, "event stream cancelled");
                    break;
                }
                next = Self::next_event(&mut events, idle_timeout) => {
                    let payload = match next {
                        Ok(Some(Ok(Event::Open))) => {
                            tracing::debug!(target = %target, "event stream opened");
                            continue;
                        }
                        Ok(Some(Ok(Event::Message(message)))) => FramePayload::Data(message.data),
                        Ok(Some(Err(reqwest_eventsource::Error::StreamEnded))) | Ok(None) => {
                            tracing::debug!(target = %target, "event stream ended by server");
                            FramePayload::Closed
                        }
                        Ok(Some(Err(error))) => {
                            tracing::warn!(target = %target, error = %error, "event stream failed");
                            FramePayload::Error(error.to_string())
                        }
                        Err(_) => {
                            tracing::warn!(
                                target = %target,
                                idle_timeout = ?idle_timeout,
                                "event stream went silent past the idle timeout"
                            );
                            FramePayload::Error("event stream idle timeout elapsed".to_string())
                        }
                    };

                    let terminal = !matches!(payload, FramePayload::Data(_));
                    if !Self::send_frame(&frame_tx, target, payload) || terminal {
                        break;
                    }
                }
            }
        }

        // EventSource reconnects on its own unless closed; every exit path is final here.
        events.close();
    }
}

impl ChatTransport for SseTransport {
    fn name(&self) -> &str {
        SSE_TRANSPORT_NAME
    }

    fn open_stream(&self, request: StreamRequest) -> TransportResult<StreamHandle> {
        let target = request.target;
        ensure!(
            !request.message.trim().is_empty(),
            EmptyMessageSnafu {
                stage: "open-stream",
                target,
            }
        );

        let url = self.stream_url(&request.message)?;
        tracing::debug!(target = %target, url = %url, "opening event stream");

        let builder = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "text/event-stream");
        let events = EventSource::new(builder).context(OpenStreamSnafu {
            stage: "open-stream-event-source",
            target,
        })?;

        let (frame_tx, stream, cancel_rx) = make_frame_stream(target);
        let worker: StreamWorker = Box::pin(Self::run_stream_worker(
            target,
            events,
            self.config.idle_timeout,
            frame_tx,
            cancel_rx,
        ));

        Ok(StreamHandle { stream, worker })
    }

    fn ask<'a>(&'a self, message: &'a str) -> BoxFuture<'a, TransportResult<ChatReply>> {
        Box::pin(async move {
            let url = self.chat_url()?;
            let response = self
                .client
                .post(url)
                .json(&serde_json::json!({ "message": message }))
                .send()
                .await
                .context(RequestSnafu {
                    stage: "send-chat-request",
                })?;

            let status = response.status();
            let body = response.text().await.context(RequestSnafu {
                stage: "read-chat-response",
            })?;

            if !status.is_success() {
                tracing::warn!(status = status.as_u16(), body = %body, "chat request rejected");
                return ResponseStatusSnafu {
                    stage: "chat-http-status",
                    status: status.as_u16(),
                    body,
                }
                .fail();
            }

            ChatReply::from_body(&body).context(DecodeReplySnafu {
                stage: "decode-chat-reply",
            })
        })
    }
}
