pub mod accumulator;
pub mod dispatcher;
/// Typed events decoded from stream frames.
pub mod events;
pub mod frame;
/// Host-owned state the assistant may change.
pub mod host;
pub mod session;
/// Connection lifecycle and stale-frame gating.
pub mod stream_state;
pub mod transcript;

pub use accumulator::{AccumulatorOutcome, AccumulatorState, TextAccumulator};
pub use dispatcher::{DispatchOutcome, SideEffectDispatcher};
pub use events::{FilterUpdate, RawEvent, StreamEvent};
pub use frame::{decode_line, decode_payload};
pub use host::{ChangeCallback, DashboardFilters, HostBindings, HostState, Theme};
pub use session::{
    ChatError, ChatResult, ChatSession, REQUEST_ERROR_MESSAGE, STREAM_ERROR_MESSAGE,
    SubmitOutcome,
};
pub use stream_state::{
    StreamState, StreamTransition, StreamTransitionRejection, StreamTransitionResult,
};
pub use transcript::{
    EntryDraft, EntryId, EntryKind, Origin, ResultTable, Transcript, TranscriptEntry,
};
