use std::sync::Arc;

use dashchat_transport::{
    ChatReply, ChatTransport, ConversationId, FramePayload, FrameStream, StreamFrame,
    StreamRequest, StreamSessionId, StreamTarget,
};
use snafu::{ResultExt, Snafu};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use super::accumulator::TextAccumulator;
use super::dispatcher::SideEffectDispatcher;
use super::events::StreamEvent;
use super::frame::decode_payload;
use super::host::HostBindings;
use super::stream_state::{StreamState, StreamTransition};
use super::transcript::{EntryDraft, EntryId, ResultTable, Transcript};

/// Shown when the event stream fails or stops early.
pub const STREAM_ERROR_MESSAGE: &str = "Erro na conexão com o assistente.";
/// Shown when the request/response chat call fails.
pub const REQUEST_ERROR_MESSAGE: &str = "Erro ao obter resposta.";

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ChatError {
    #[snafu(display("tokio runtime unavailable on `{stage}`: {source}"))]
    RuntimeUnavailable {
        stage: &'static str,
        source: tokio::runtime::TryCurrentError,
    },
}

pub type ChatResult<T> = Result<T, ChatError>;

/// What `submit` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Blank input; nothing changed.
    Ignored,
    Opened(StreamTarget),
    /// The connection could not be opened; an error entry was appended.
    Failed(StreamTarget),
}

struct ActiveConnection {
    target: StreamTarget,
    stream: FrameStream,
    worker_task: JoinHandle<()>,
}

/// One conversation with the assistant.
///
/// Owns the transcript, the pending flag and at most one live connection. Every
/// mutation goes through `&mut self`, so frames are applied strictly one at a time.
pub struct ChatSession {
    conversation_id: ConversationId,
    transport: Arc<dyn ChatTransport>,
    runtime: Handle,
    transcript: Transcript,
    accumulator: TextAccumulator,
    dispatcher: SideEffectDispatcher,
    stream_state: StreamState,
    active: Option<ActiveConnection>,
    next_stream_session_id: StreamSessionId,
    pending: bool,
}

impl ChatSession {
    /// Must be called from within a tokio runtime; stream workers are spawned on it.
    pub fn new(
        conversation_id: ConversationId,
        transport: Arc<dyn ChatTransport>,
        host: HostBindings,
    ) -> ChatResult<Self> {
        let runtime = Handle::try_current().context(RuntimeUnavailableSnafu {
            stage: "chat-session-new",
        })?;

        Ok(Self {
            conversation_id,
            transport,
            runtime,
            transcript: Transcript::new(),
            accumulator: TextAccumulator::new(),
            dispatcher: SideEffectDispatcher::new(host),
            stream_state: StreamState::Idle,
            active: None,
            next_stream_session_id: StreamSessionId::new(1),
            pending: false,
        })
    }

    pub fn conversation_id(&self) -> ConversationId {
        self.conversation_id
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn stream_state(&self) -> &StreamState {
        &self.stream_state
    }

    pub fn active_target(&self) -> Option<StreamTarget> {
        self.active.as_ref().map(|active| active.target)
    }

    pub fn host(&self) -> &HostBindings {
        self.dispatcher.host()
    }

    /// Sends a message over a fresh event stream, superseding any exchange in flight.
    pub fn submit(&mut self, text: &str) -> SubmitOutcome {
        let text = text.trim();
        if text.is_empty() {
            return SubmitOutcome::Ignored;
        }

        self.close();
        self.transcript.append(EntryDraft::user(text));
        self.pending = true;

        let target = self.alloc_stream_target();
        match self.transport.open_stream(StreamRequest::new(target, text)) {
            Ok(handle) => {
                self.apply_transition(StreamTransition::Open(target));
                let worker_task = self.runtime.spawn(handle.worker);
                self.active = Some(ActiveConnection {
                    target,
                    stream: handle.stream,
                    worker_task,
                });
                tracing::debug!(target = %target, transport = self.transport.name(), "stream opened");
                SubmitOutcome::Opened(target)
            }
            Err(error) => {
                tracing::warn!(target = %target, error = %error, "failed to open stream");
                self.pending = false;
                self.transcript.append(EntryDraft::error(STREAM_ERROR_MESSAGE));
                SubmitOutcome::Failed(target)
            }
        }
    }

    /// Closes the live connection, if any. Returns false when nothing was open.
    ///
    /// Once this returns, no frame of that connection can reach the transcript.
    pub fn close(&mut self) -> bool {
        let Some(active) = self.active.take() else {
            return false;
        };

        Self::shutdown(active.stream, active.worker_task);
        self.apply_transition(StreamTransition::Cancel(active.target));
        if let Some(entry) = self.accumulator.finish(&mut self.transcript) {
            tracing::debug!(entry = ?entry, "finalized streaming entry of a closed stream");
        }
        self.pending = false;
        tracing::debug!(target = %active.target, "stream closed");
        true
    }

    /// Waits for the next frame of the live connection.
    ///
    /// A connection whose worker vanished without a terminal frame reports `Closed`.
    pub async fn next_frame(&mut self) -> Option<StreamFrame> {
        let active = self.active.as_mut()?;
        let target = active.target;
        Some(
            active
                .stream
                .recv()
                .await
                .unwrap_or_else(|| StreamFrame::closed(target)),
        )
    }

    /// Applies frames that already arrived without waiting. Returns how many were seen.
    pub fn process_ready_frames(&mut self) -> usize {
        let mut processed = 0;
        while let Some(frame) = self
            .active
            .as_mut()
            .and_then(|active| active.stream.try_recv())
        {
            self.handle_frame(frame);
            processed += 1;
        }
        processed
    }

    /// Drives the live connection until it finishes, fails or is closed.
    pub async fn run_until_idle(&mut self) {
        while let Some(frame) = self.next_frame().await {
            self.handle_frame(frame);
        }
    }

    /// Applies one frame. Frames of any connection but the live one are dropped.
    pub fn handle_frame(&mut self, frame: StreamFrame) {
        let target = frame.target;
        if !self.stream_event_is_current(target) {
            tracing::trace!(target = %target, "dropping frame from a stale stream");
            return;
        }

        match frame.payload {
            FramePayload::Data(data) => {
                if let Some(event) = decode_payload(&data) {
                    self.apply_event(target, event);
                }
            }
            FramePayload::Error(message) => self.fail_stream(target, message),
            FramePayload::Closed => {
                self.fail_stream(target, "event stream ended before run_finished".to_string())
            }
        }
    }

    /// Request/response variant of a chat turn.
    pub async fn ask(&mut self, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }

        self.close();
        self.transcript.append(EntryDraft::user(text));
        self.pending = true;

        let transport = Arc::clone(&self.transport);
        let succeeded = match transport.ask(text).await {
            Ok(reply) => {
                self.append_reply(reply);
                true
            }
            Err(error) => {
                tracing::warn!(error = %error, "chat request failed");
                self.transcript.append(EntryDraft::error(REQUEST_ERROR_MESSAGE));
                false
            }
        };

        self.pending = false;
        succeeded
    }

    pub fn toggle_expanded(&mut self, id: EntryId) -> bool {
        self.transcript.toggle_expanded(id)
    }

    fn apply_event(&mut self, target: StreamTarget, event: StreamEvent) {
        let clears_pending = event.clears_pending();

        match event {
            StreamEvent::RunStarted => {
                tracing::debug!(target = %target, "assistant run started");
            }
            StreamEvent::RunFinished => {
                tracing::debug!(target = %target, "assistant run finished");
                self.finish_stream(target, StreamTransition::Complete(target));
            }
            StreamEvent::TextStart => {
                self.accumulator.start(&mut self.transcript);
            }
            StreamEvent::TextDelta { delta } => {
                self.accumulator.push_delta(&mut self.transcript, &delta);
            }
            StreamEvent::TextEnd => {
                self.accumulator.end(&mut self.transcript);
            }
            StreamEvent::Raw(raw) => {
                self.dispatcher.dispatch(raw, &mut self.transcript);
            }
        }

        if clears_pending {
            self.pending = false;
        }
    }

    fn fail_stream(&mut self, target: StreamTarget, message: String) {
        tracing::warn!(target = %target, error = %message, "stream failed");
        self.finish_stream(target, StreamTransition::Fail { target, message });
        self.transcript.append(EntryDraft::error(STREAM_ERROR_MESSAGE));
    }

    fn finish_stream(&mut self, target: StreamTarget, transition: StreamTransition) {
        let Some(active) = self.active.take_if(|active| active.target == target) else {
            return;
        };

        Self::shutdown(active.stream, active.worker_task);
        self.apply_transition(transition);
        self.accumulator.finish(&mut self.transcript);
        self.pending = false;
    }

    fn shutdown(mut stream: FrameStream, worker_task: JoinHandle<()>) {
        stream.cancel();
        worker_task.abort();
    }

    fn append_reply(&mut self, reply: ChatReply) {
        if let Some(reasoning) = reply.reasoning {
            self.transcript.append(EntryDraft::reasoning(reasoning));
        }
        if let Some(query) = reply.query {
            self.transcript.append(EntryDraft::query(query));
        }
        self.transcript
            .append(EntryDraft::results(ResultTable::from_rows(reply.results)));
        if let Some(final_answer) = reply.final_answer {
            self.transcript.append(EntryDraft::final_answer(final_answer));
        }
    }

    fn apply_transition(&mut self, transition: StreamTransition) {
        match self.stream_state.apply(transition) {
            Ok(next_state) => self.stream_state = next_state,
            Err(rejection) => {
                tracing::warn!(rejection = ?rejection, "rejected stream state transition");
            }
        }
    }

    fn stream_event_is_current(&self, target: StreamTarget) -> bool {
        self.stream_state.accepts_stream_event(target)
    }

    fn alloc_stream_target(&mut self) -> StreamTarget {
        let target = StreamTarget::new(self.conversation_id, self.next_stream_session_id);
        // Reserve immediately so no later submit can reuse a target.
        self.next_stream_session_id = self.next_stream_session_id.next();
        target
    }
}
