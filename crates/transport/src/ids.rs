use std::fmt;

// Macro keeps all ID wrappers structurally identical.
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);

        impl $name {
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            pub const fn get(self) -> u64 {
                self.0
            }

            /// Returns the following identifier, saturating at `u64::MAX`.
            pub const fn next(self) -> Self {
                Self(self.0.saturating_add(1))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(formatter, "{}-{}", $prefix, self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self::new(value)
            }
        }
    };
}

define_id!(
    /// Stable identifier for one conversation.
    ConversationId,
    "conversation"
);

define_id!(
    /// Identifier for one streaming exchange.
    ///
    /// This must change on every submit so stale frames can be rejected.
    StreamSessionId,
    "stream"
);

/// Stream routing key used for stale-frame rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamTarget {
    pub conversation_id: ConversationId,
    pub session_id: StreamSessionId,
}

impl StreamTarget {
    pub const fn new(conversation_id: ConversationId, session_id: StreamSessionId) -> Self {
        Self {
            conversation_id,
            session_id,
        }
    }
}

impl fmt::Display for StreamTarget {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}/{}", self.conversation_id, self.session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_session_id_differs_and_orders_after() {
        let first = StreamSessionId::new(7);
        let second = first.next();
        assert!(second > first);
        assert_eq!(second.get(), 8);
        assert_eq!(StreamSessionId::new(u64::MAX).next().get(), u64::MAX);
    }

    #[test]
    fn targets_with_different_sessions_are_not_equal() {
        let conversation = ConversationId::new(1);
        let old = StreamTarget::new(conversation, StreamSessionId::new(1));
        let new = StreamTarget::new(conversation, StreamSessionId::new(2));
        assert_ne!(old, new);
        assert_eq!(old.to_string(), "conversation-1/stream-1");
    }
}
