//! Plain-text rendering of a transcript for terminals and logs.

use std::fmt::Write as _;

use serde_json::Value;

use crate::chat::{EntryKind, Origin, ResultTable, Transcript, TranscriptEntry};

pub const REASONING_HEADING: &str = "Raciocínio";
pub const QUERY_HEADING: &str = "Consulta SQL";
pub const RESULTS_HEADING: &str = "Resultados";
pub const FINAL_ANSWER_HEADING: &str = "Conclusão";
pub const NO_RESULTS: &str = "Sem resultados.";
pub const STREAMING_CURSOR: &str = "▍";

pub fn render_transcript(transcript: &Transcript) -> String {
    transcript
        .entries()
        .iter()
        .map(render_entry)
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn render_entry(entry: &TranscriptEntry) -> String {
    let text = entry.text.as_deref().unwrap_or_default();
    match entry.kind {
        EntryKind::Plain => match entry.origin {
            Origin::User => format!("[{}] > {text}", entry.id.0),
            Origin::Assistant if entry.is_streaming => {
                format!("[{}] {text}{STREAMING_CURSOR}", entry.id.0)
            }
            Origin::Assistant => format!("[{}] {text}", entry.id.0),
            Origin::System => format!("[{}] · {text}", entry.id.0),
        },
        EntryKind::Reasoning => format!("[{}] {REASONING_HEADING}\n{text}", entry.id.0),
        EntryKind::Query => {
            let mut out = format!("[{}] {QUERY_HEADING}", entry.id.0);
            for line in text.lines() {
                let _ = write!(out, "\n    {line}");
            }
            out
        }
        EntryKind::Results => render_results(entry),
        EntryKind::FinalAnswer => format!("[{}] {FINAL_ANSWER_HEADING}\n{text}", entry.id.0),
        EntryKind::Error => format!("[{}] ! {text}", entry.id.0),
        EntryKind::Image => {
            let len = entry.image_data.as_ref().map_or(0, Vec::len);
            format!("[{}] [gráfico: {len} bytes]", entry.id.0)
        }
    }
}

fn render_results(entry: &TranscriptEntry) -> String {
    let marker = if entry.is_expanded { "▲" } else { "▼" };
    let mut out = format!("[{}] {RESULTS_HEADING} {marker}", entry.id.0);
    if !entry.is_expanded {
        return out;
    }

    match entry.tabular_data.as_ref().filter(|table| !table.is_empty()) {
        Some(table) => {
            out.push('\n');
            out.push_str(&render_table(table));
        }
        None => {
            out.push('\n');
            out.push_str(NO_RESULTS);
        }
    }
    out
}

/// Renders rows as a pipe-separated table with padded columns.
pub fn render_table(table: &ResultTable) -> String {
    let cells = table
        .rows()
        .iter()
        .map(|row| row.iter().map(cell_text).collect::<Vec<_>>())
        .collect::<Vec<_>>();

    let widths = table
        .columns()
        .iter()
        .enumerate()
        .map(|(index, column)| {
            cells
                .iter()
                .map(|row| row[index].chars().count())
                .chain(std::iter::once(column.chars().count()))
                .max()
                .unwrap_or_default()
        })
        .collect::<Vec<_>>();

    let mut lines = Vec::with_capacity(cells.len() + 2);
    lines.push(padded_row(table.columns().iter().map(String::as_str), &widths));
    lines.push(
        widths
            .iter()
            .map(|width| "-".repeat(*width))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    for row in &cells {
        lines.push(padded_row(row.iter().map(String::as_str), &widths));
    }
    lines.join("\n")
}

fn padded_row<'a>(values: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    values
        .zip(widths)
        .map(|(value, width)| format!("{value:<width$}"))
        .collect::<Vec<_>>()
        .join(" | ")
        .trim_end()
        .to_string()
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
