use serde::Deserialize;

use super::events::{FilterUpdate, RawEvent, StreamEvent};

// Wire shapes. The backend's AG-UI encoder emits upper-case tags, hand-written
// producers use the lower-case ones; both are accepted.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum WireEvent {
    #[serde(rename = "run_started", alias = "RUN_STARTED")]
    RunStarted,
    #[serde(rename = "run_finished", alias = "RUN_FINISHED")]
    RunFinished,
    #[serde(rename = "text_message_start", alias = "TEXT_MESSAGE_START")]
    TextMessageStart,
    #[serde(rename = "text_message_content", alias = "TEXT_MESSAGE_CONTENT")]
    TextMessageContent { delta: String },
    #[serde(rename = "text_message_end", alias = "TEXT_MESSAGE_END")]
    TextMessageEnd,
    #[serde(rename = "raw", alias = "RAW")]
    Raw { event: WireRawEvent },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum WireRawEvent {
    #[serde(rename = "filter_update")]
    FilterUpdate {
        #[serde(default)]
        filters: FilterUpdate,
    },
    #[serde(rename = "toggle_theme")]
    ToggleTheme {
        #[serde(default, alias = "tema")]
        theme: Option<String>,
    },
    #[serde(rename = "chart", alias = "chart_image")]
    Chart { image: String },
    #[serde(other)]
    Unknown,
}

impl From<WireEvent> for StreamEvent {
    fn from(event: WireEvent) -> Self {
        match event {
            WireEvent::RunStarted => Self::RunStarted,
            WireEvent::RunFinished => Self::RunFinished,
            WireEvent::TextMessageStart => Self::TextStart,
            WireEvent::TextMessageContent { delta } => Self::TextDelta { delta },
            WireEvent::TextMessageEnd => Self::TextEnd,
            WireEvent::Raw { event } => Self::Raw(event.into()),
        }
    }
}

impl From<WireRawEvent> for RawEvent {
    fn from(event: WireRawEvent) -> Self {
        match event {
            WireRawEvent::FilterUpdate { filters } => Self::FilterUpdate(filters),
            WireRawEvent::ToggleTheme { theme } => Self::ToggleTheme { theme },
            WireRawEvent::Chart { image } => Self::ChartImage { image },
            WireRawEvent::Unknown => Self::Unknown,
        }
    }
}

/// Decodes the payload of one stream frame.
///
/// The backend writes `data: ` in front of frames its encoder already prefixed, so
/// one leading `data:` inside the payload is stripped. Blank or malformed payloads
/// yield `None`; decoding never fails louder than that.
pub fn decode_payload(payload: &str) -> Option<StreamEvent> {
    let payload = payload.trim();
    let payload = payload
        .strip_prefix("data:")
        .map_or(payload, str::trim_start);
    if payload.is_empty() {
        return None;
    }

    match serde_json::from_str::<WireEvent>(payload) {
        Ok(event) => Some(event.into()),
        Err(error) => {
            tracing::trace!(error = %error, payload, "dropping undecodable stream frame");
            None
        }
    }
}

/// Decodes one raw event-stream line. Only `data:` lines carry events.
pub fn decode_line(line: &str) -> Option<StreamEvent> {
    let data = line.trim_end_matches(['\r', '\n']).strip_prefix("data:")?;
    decode_payload(data.strip_prefix(' ').unwrap_or(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn lifecycle_and_text_frames_decode() {
        assert_eq!(decode_payload(r#"{"type":"run_started"}"#), Some(StreamEvent::RunStarted));
        assert_eq!(decode_payload(r#"{"type":"run_finished"}"#), Some(StreamEvent::RunFinished));
        assert_eq!(
            decode_payload(r#"{"type":"text_message_start","messageId":"m1","role":"assistant"}"#),
            Some(StreamEvent::TextStart)
        );
        assert_eq!(
            decode_payload(r#"{"type":"text_message_content","delta":"Anal"}"#),
            Some(StreamEvent::TextDelta {
                delta: "Anal".to_string()
            })
        );
        assert_eq!(decode_payload(r#"{"type":"text_message_end"}"#), Some(StreamEvent::TextEnd));
    }

    #[test]
    fn upper_case_encoder_tags_decode() {
        assert_eq!(
            decode_payload(r#"{"type":"RUN_STARTED","threadId":"t","runId":"r"}"#),
            Some(StreamEvent::RunStarted)
        );
        assert_eq!(
            decode_payload(r#"{"type":"TEXT_MESSAGE_CONTENT","messageId":"m","delta":"x"}"#),
            Some(StreamEvent::TextDelta {
                delta: "x".to_string()
            })
        );
    }

    #[test]
    fn doubly_prefixed_encoder_frames_decode() {
        assert_eq!(
            decode_payload("data: {\"type\":\"RUN_STARTED\",\"threadId\":\"t\",\"runId\":\"r\"}\n\n"),
            Some(StreamEvent::RunStarted)
        );
        assert_eq!(
            decode_payload(r#"data:{"type":"TEXT_MESSAGE_CONTENT","messageId":"m","delta":"Olá"}"#),
            Some(StreamEvent::TextDelta {
                delta: "Olá".to_string()
            })
        );
        assert_eq!(
            decode_line(r#"data: data: {"type":"RUN_FINISHED","threadId":"t","runId":"r"}"#),
            Some(StreamEvent::RunFinished)
        );
        assert_eq!(decode_payload("data: "), None);
    }

    #[test]
    fn raw_sub_events_decode() {
        assert_eq!(
            decode_payload(
                r#"{"type":"raw","event":{"type":"filter_update","filters":{"category":"livros"}}}"#
            ),
            Some(StreamEvent::Raw(RawEvent::FilterUpdate(FilterUpdate {
                category: Some("livros".to_string()),
                ..FilterUpdate::default()
            })))
        );
        assert_eq!(
            decode_payload(r#"{"type":"raw","event":{"type":"toggle_theme"}}"#),
            Some(StreamEvent::Raw(RawEvent::ToggleTheme { theme: None }))
        );
        assert_eq!(
            decode_payload(r#"{"type":"RAW","event":{"type":"toggle_theme","tema":"dark"}}"#),
            Some(StreamEvent::Raw(RawEvent::ToggleTheme {
                theme: Some("dark".to_string())
            }))
        );
        assert_eq!(
            decode_payload(r#"{"type":"raw","event":{"type":"chart","image":"aGk="}}"#),
            Some(StreamEvent::Raw(RawEvent::ChartImage {
                image: "aGk=".to_string()
            }))
        );
    }

    #[test]
    fn portuguese_filter_keys_are_accepted() {
        let event = decode_payload(
            r#"{"type":"raw","event":{"type":"filter_update","filters":{"data_inicial":"2024-03-01","data_final":"2024-03-31"}}}"#,
        );
        assert_eq!(
            event,
            Some(StreamEvent::Raw(RawEvent::FilterUpdate(FilterUpdate {
                start_date: Some("2024-03-01".to_string()),
                end_date: Some("2024-03-31".to_string()),
                category: None,
            })))
        );
    }

    #[test]
    fn unknown_raw_sub_type_falls_through() {
        assert_eq!(
            decode_payload(r#"{"type":"raw","event":{"type":"confetti","amount":3}}"#),
            Some(StreamEvent::Raw(RawEvent::Unknown))
        );
    }

    #[test]
    fn malformed_or_empty_payloads_are_dropped() {
        assert_eq!(decode_payload(""), None);
        assert_eq!(decode_payload("   "), None);
        assert_eq!(decode_payload("{not json"), None);
        assert_eq!(decode_payload(r#"{"type":"step_started"}"#), None);
        assert_eq!(decode_payload(r#"{"type":"text_message_content"}"#), None);
        assert_eq!(decode_payload(r#"{"delta":"no tag"}"#), None);
    }

    #[test]
    fn only_data_lines_carry_events() {
        assert_eq!(
            decode_line("data: {\"type\":\"run_started\"}\r\n"),
            Some(StreamEvent::RunStarted)
        );
        assert_eq!(decode_line("data:{\"type\":\"text_message_end\"}"), Some(StreamEvent::TextEnd));
        assert_eq!(decode_line(": keepalive"), None);
        assert_eq!(decode_line("event: message"), None);
        assert_eq!(decode_line(""), None);
        assert_eq!(decode_line("data: "), None);
    }
}
