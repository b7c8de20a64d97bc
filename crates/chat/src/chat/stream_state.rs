use dashchat_transport::StreamTarget;

/// Connection lifecycle of one conversation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StreamState {
    #[default]
    Idle,
    Streaming(StreamTarget),
    Done(StreamTarget),
    Failed {
        target: StreamTarget,
        message: String,
    },
    Cancelled(StreamTarget),
}

/// State transition input for the connection lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamTransition {
    Open(StreamTarget),
    Complete(StreamTarget),
    Fail {
        target: StreamTarget,
        message: String,
    },
    Cancel(StreamTarget),
}

/// Rejection reason for illegal stream transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamTransitionRejection {
    AlreadyStreaming {
        active: StreamTarget,
        attempted: StreamTarget,
    },
    NoActiveStream,
    SessionMismatch {
        active: StreamTarget,
        attempted: StreamTarget,
    },
}

pub type StreamTransitionResult = Result<StreamState, StreamTransitionRejection>;

impl StreamState {
    pub fn active_target(&self) -> Option<StreamTarget> {
        match self {
            Self::Streaming(target) => Some(*target),
            Self::Idle | Self::Done(_) | Self::Failed { .. } | Self::Cancelled(_) => None,
        }
    }

    /// Returns true when a frame for `target` may still touch the transcript.
    pub fn accepts_stream_event(&self, target: StreamTarget) -> bool {
        matches!(self, Self::Streaming(active) if *active == target)
    }

    /// Applies one transition.
    ///
    /// Any non-streaming state may open a new connection; terminal transitions must
    /// name the active connection exactly.
    pub fn apply(&self, transition: StreamTransition) -> StreamTransitionResult {
        match transition {
            StreamTransition::Open(target) => self.apply_open(target),
            StreamTransition::Complete(target) => {
                self.apply_terminal(target, || Self::Done(target))
            }
            StreamTransition::Fail { target, message } => {
                self.apply_terminal(target, || Self::Failed { target, message })
            }
            StreamTransition::Cancel(target) => {
                self.apply_terminal(target, || Self::Cancelled(target))
            }
        }
    }

    fn apply_open(&self, target: StreamTarget) -> StreamTransitionResult {
        match self {
            Self::Streaming(active) if *active != target => {
                Err(StreamTransitionRejection::AlreadyStreaming {
                    active: *active,
                    attempted: target,
                })
            }
            Self::Streaming(_) => Ok(self.clone()),
            Self::Idle | Self::Done(_) | Self::Failed { .. } | Self::Cancelled(_) => {
                Ok(Self::Streaming(target))
            }
        }
    }

    fn apply_terminal(
        &self,
        target: StreamTarget,
        next: impl FnOnce() -> Self,
    ) -> StreamTransitionResult {
        match self {
            Self::Streaming(active) if *active == target => Ok(next()),
            Self::Streaming(active) => Err(StreamTransitionRejection::SessionMismatch {
                active: *active,
                attempted: target,
            }),
            Self::Idle | Self::Done(_) | Self::Failed { .. } | Self::Cancelled(_) => {
                Err(StreamTransitionRejection::NoActiveStream)
            }
        }
    }
}
