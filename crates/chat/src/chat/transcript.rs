use serde_json::{Map, Value};

/// Stable identifier for one transcript entry.
///
/// Identifiers are handed out by [`Transcript::append`] in strictly increasing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(pub u64);

impl EntryId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Who produced an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    User,
    Assistant,
    System,
}

/// Rendering class of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Plain,
    Reasoning,
    Query,
    Results,
    FinalAnswer,
    Error,
    Image,
}

/// Rows of a `results` entry with one shared column set.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultTable {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl ResultTable {
    /// Builds a table from loosely shaped rows.
    ///
    /// Columns are the union of all row keys in first-seen order; a row missing a
    /// column gets `null`, and nested arrays or objects are kept as their JSON text.
    pub fn from_rows(rows: impl IntoIterator<Item = Map<String, Value>>) -> Self {
        let rows = rows.into_iter().collect::<Vec<_>>();
        let mut columns: Vec<String> = Vec::new();
        for row in &rows {
            for key in row.keys() {
                if !columns.iter().any(|column| column == key) {
                    columns.push(key.clone());
                }
            }
        }

        let rows = rows
            .into_iter()
            .map(|mut row| {
                columns
                    .iter()
                    .map(|column| scalar(row.remove(column).unwrap_or(Value::Null)))
                    .collect()
            })
            .collect();

        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

fn scalar(value: Value) -> Value {
    match value {
        Value::Array(_) | Value::Object(_) => Value::String(value.to_string()),
        other => other,
    }
}

/// One visible unit of the conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptEntry {
    pub id: EntryId,
    pub origin: Origin,
    pub kind: EntryKind,
    pub text: Option<String>,
    pub tabular_data: Option<ResultTable>,
    pub image_data: Option<Vec<u8>>,
    pub is_expanded: bool,
    pub is_streaming: bool,
}

/// Entry contents before the transcript assigns an identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryDraft {
    pub origin: Origin,
    pub kind: EntryKind,
    pub text: Option<String>,
    pub tabular_data: Option<ResultTable>,
    pub image_data: Option<Vec<u8>>,
    pub is_streaming: bool,
}

impl EntryDraft {
    fn text(origin: Origin, kind: EntryKind, text: impl Into<String>) -> Self {
        Self {
            origin,
            kind,
            text: Some(text.into()),
            tabular_data: None,
            image_data: None,
            is_streaming: false,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::text(Origin::User, EntryKind::Plain, text)
    }

    /// Empty assistant message that will receive deltas.
    pub fn assistant_streaming() -> Self {
        Self {
            is_streaming: true,
            ..Self::text(Origin::Assistant, EntryKind::Plain, String::new())
        }
    }

    pub fn system_note(text: impl Into<String>) -> Self {
        Self::text(Origin::System, EntryKind::Plain, text)
    }

    pub fn reasoning(text: impl Into<String>) -> Self {
        Self::text(Origin::Assistant, EntryKind::Reasoning, text)
    }

    pub fn query(text: impl Into<String>) -> Self {
        Self::text(Origin::Assistant, EntryKind::Query, text)
    }

    pub fn final_answer(text: impl Into<String>) -> Self {
        Self::text(Origin::Assistant, EntryKind::FinalAnswer, text)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::text(Origin::System, EntryKind::Error, text)
    }

    pub fn results(table: ResultTable) -> Self {
        Self {
            origin: Origin::Assistant,
            kind: EntryKind::Results,
            text: None,
            tabular_data: Some(table),
            image_data: None,
            is_streaming: false,
        }
    }

    pub fn image(bytes: Vec<u8>) -> Self {
        Self {
            origin: Origin::Assistant,
            kind: EntryKind::Image,
            text: None,
            tabular_data: None,
            image_data: Some(bytes),
            is_streaming: false,
        }
    }
}

/// Ordered, append-only conversation log.
///
/// The only in-place mutations are delta appends to the streaming entry, its
/// finalization, and toggling `is_expanded` on results.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
    next_id: u64,
    streaming: Option<usize>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&TranscriptEntry> {
        self.entries.last()
    }

    pub fn get(&self, id: EntryId) -> Option<&TranscriptEntry> {
        self.position(id).map(|index| &self.entries[index])
    }

    pub fn streaming_entry(&self) -> Option<&TranscriptEntry> {
        self.streaming.map(|index| &self.entries[index])
    }

    /// Appends an entry and returns its freshly assigned id.
    ///
    /// A streaming draft is only accepted while no other entry streams; otherwise it
    /// is stored finalized.
    pub fn append(&mut self, draft: EntryDraft) -> EntryId {
        self.next_id = self.next_id.saturating_add(1);
        let id = EntryId::new(self.next_id);
        let is_streaming = draft.is_streaming && self.streaming.is_none();

        if is_streaming {
            self.streaming = Some(self.entries.len());
        }

        self.entries.push(TranscriptEntry {
            id,
            origin: draft.origin,
            kind: draft.kind,
            text: draft.text,
            tabular_data: draft.tabular_data,
            image_data: draft.image_data,
            is_expanded: false,
            is_streaming,
        });
        id
    }

    /// Concatenates `delta` onto the last entry if it is the streaming one.
    ///
    /// Returns false, leaving the transcript untouched, when no entry streams or
    /// another entry was appended after it.
    pub fn append_delta_to_last(&mut self, delta: &str) -> bool {
        let Some(index) = self
            .streaming
            .filter(|index| index + 1 == self.entries.len())
        else {
            return false;
        };

        self.entries[index]
            .text
            .get_or_insert_with(String::new)
            .push_str(delta);
        true
    }

    /// Marks the streaming entry immutable and returns its id.
    pub fn finalize_last(&mut self) -> Option<EntryId> {
        let index = self.streaming.take()?;
        let entry = &mut self.entries[index];
        entry.is_streaming = false;
        Some(entry.id)
    }

    /// Flips `is_expanded` on one results entry. Other kinds are left untouched.
    pub fn toggle_expanded(&mut self, id: EntryId) -> bool {
        let Some(index) = self.position(id) else {
            return false;
        };

        let entry = &mut self.entries[index];
        if entry.kind != EntryKind::Results {
            return false;
        }

        entry.is_expanded = !entry.is_expanded;
        true
    }

    fn position(&self, id: EntryId) -> Option<usize> {
        // Ids are strictly increasing, so insertion order is also id order.
        self.entries
            .binary_search_by_key(&id, |entry| entry.id)
            .ok()
    }
}
