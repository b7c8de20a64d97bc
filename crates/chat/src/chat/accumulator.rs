use super::transcript::{EntryDraft, EntryId, Transcript};

/// Assistant-reply sub-flow state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccumulatorState {
    #[default]
    Idle,
    Streaming(EntryId),
}

/// What one accumulator step did to the transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccumulatorOutcome {
    Started {
        entry: EntryId,
        /// Entry that was still streaming and got finalized first.
        finalized_stale: Option<EntryId>,
    },
    Appended(EntryId),
    Finalized(EntryId),
    /// Nothing was streaming; the transcript is unchanged.
    Ignored,
}

/// Assembles streamed text deltas into one assistant message at a time.
#[derive(Debug, Clone, Default)]
pub struct TextAccumulator {
    state: AccumulatorState,
}

impl TextAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> AccumulatorState {
        self.state
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self.state, AccumulatorState::Streaming(_))
    }

    /// Idle -> Streaming. A message still open from an earlier start is finalized
    /// first so only one entry streams at a time.
    pub fn start(&mut self, transcript: &mut Transcript) -> AccumulatorOutcome {
        let finalized_stale = self.finish(transcript);
        if let Some(stale) = finalized_stale {
            tracing::debug!(entry = ?stale, "text start while streaming; finalized previous entry");
        }

        let entry = transcript.append(EntryDraft::assistant_streaming());
        self.state = AccumulatorState::Streaming(entry);
        AccumulatorOutcome::Started {
            entry,
            finalized_stale,
        }
    }

    /// Streaming -> Streaming. A delta only lands when the open message is still the
    /// last transcript entry; otherwise it is dropped.
    pub fn push_delta(&mut self, transcript: &mut Transcript, delta: &str) -> AccumulatorOutcome {
        let AccumulatorState::Streaming(entry) = self.state else {
            tracing::trace!(delta_len = delta.len(), "dropping text delta with no open message");
            return AccumulatorOutcome::Ignored;
        };

        if transcript.append_delta_to_last(delta) {
            AccumulatorOutcome::Appended(entry)
        } else {
            // Another entry landed after the streaming one; it stays open for `end`.
            tracing::trace!(entry = ?entry, "dropping text delta behind a later entry");
            AccumulatorOutcome::Ignored
        }
    }

    /// Streaming -> Idle.
    pub fn end(&mut self, transcript: &mut Transcript) -> AccumulatorOutcome {
        match self.finish(transcript) {
            Some(entry) => AccumulatorOutcome::Finalized(entry),
            None => AccumulatorOutcome::Ignored,
        }
    }

    /// Finalizes whatever is streaming, used when a connection goes away mid-message.
    pub fn finish(&mut self, transcript: &mut Transcript) -> Option<EntryId> {
        let state = std::mem::take(&mut self.state);
        match state {
            AccumulatorState::Streaming(_) => transcript.finalize_last(),
            AccumulatorState::Idle => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::transcript::{EntryKind, Origin};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn finalized_text_is_the_concatenation_of_deltas() {
        let mut transcript = Transcript::new();
        let mut accumulator = TextAccumulator::new();
        let deltas = ["Vendas ", "de ", "março: ", "R$ 1.234,56", "", "!"];

        let AccumulatorOutcome::Started { entry, .. } = accumulator.start(&mut transcript) else {
            panic!("start must open an entry");
        };
        for delta in deltas {
            assert_eq!(
                accumulator.push_delta(&mut transcript, delta),
                AccumulatorOutcome::Appended(entry)
            );
        }
        assert_eq!(
            accumulator.end(&mut transcript),
            AccumulatorOutcome::Finalized(entry)
        );

        let finalized = transcript.get(entry).unwrap();
        assert_eq!(finalized.text.as_deref(), Some(deltas.concat().as_str()));
        assert_eq!(finalized.origin, Origin::Assistant);
        assert_eq!(finalized.kind, EntryKind::Plain);
        assert!(!finalized.is_streaming);
        assert_eq!(accumulator.state(), AccumulatorState::Idle);
    }

    #[test]
    fn delta_before_start_changes_nothing() {
        let mut transcript = Transcript::new();
        let mut accumulator = TextAccumulator::new();

        assert_eq!(
            accumulator.push_delta(&mut transcript, "orphan"),
            AccumulatorOutcome::Ignored
        );
        assert!(transcript.is_empty());
    }

    #[test]
    fn end_without_start_is_ignored() {
        let mut transcript = Transcript::new();
        let mut accumulator = TextAccumulator::new();
        assert_eq!(accumulator.end(&mut transcript), AccumulatorOutcome::Ignored);
    }

    #[test]
    fn delta_after_an_interleaved_note_is_dropped_and_end_still_finalizes() {
        let mut transcript = Transcript::new();
        let mut accumulator = TextAccumulator::new();

        let AccumulatorOutcome::Started { entry, .. } = accumulator.start(&mut transcript) else {
            panic!("start must open an entry");
        };
        accumulator.push_delta(&mut transcript, "Anal");
        transcript.append(EntryDraft::system_note("Tema alterado para dark."));

        assert_eq!(
            accumulator.push_delta(&mut transcript, "isando"),
            AccumulatorOutcome::Ignored
        );
        assert!(accumulator.is_streaming());
        assert_eq!(transcript.get(entry).unwrap().text.as_deref(), Some("Anal"));
        assert_eq!(
            accumulator.end(&mut transcript),
            AccumulatorOutcome::Finalized(entry)
        );
        assert!(!transcript.get(entry).unwrap().is_streaming);
    }

    #[test]
    fn second_start_finalizes_the_stale_entry() {
        let mut transcript = Transcript::new();
        let mut accumulator = TextAccumulator::new();

        let AccumulatorOutcome::Started { entry: first, .. } = accumulator.start(&mut transcript)
        else {
            panic!("start must open an entry");
        };
        accumulator.push_delta(&mut transcript, "primeiro");

        let outcome = accumulator.start(&mut transcript);
        let AccumulatorOutcome::Started {
            entry: second,
            finalized_stale,
        } = outcome
        else {
            panic!("start must open an entry");
        };
        assert_eq!(finalized_stale, Some(first));
        accumulator.push_delta(&mut transcript, "segundo");

        assert!(!transcript.get(first).unwrap().is_streaming);
        assert_eq!(transcript.get(first).unwrap().text.as_deref(), Some("primeiro"));
        assert_eq!(transcript.get(second).unwrap().text.as_deref(), Some("segundo"));
        let streaming = transcript
            .entries()
            .iter()
            .filter(|entry| entry.is_streaming)
            .count();
        assert_eq!(streaming, 1);
    }

    proptest! {
        #[test]
        fn prop_finalized_text_is_concatenation_of_any_deltas(
            deltas in prop::collection::vec(".{0,12}", 0..24)
        ) {
            let mut transcript = Transcript::new();
            let mut accumulator = TextAccumulator::new();

            accumulator.start(&mut transcript);
            for delta in &deltas {
                accumulator.push_delta(&mut transcript, delta);
            }
            let entry = accumulator.end(&mut transcript);

            let AccumulatorOutcome::Finalized(id) = entry else {
                panic!("end must finalize the open entry");
            };
            let finalized = transcript.get(id).unwrap();
            prop_assert_eq!(finalized.text.clone().unwrap_or_default(), deltas.concat());
            prop_assert!(!finalized.is_streaming);
            prop_assert_eq!(transcript.len(), 1);
        }
    }
}
