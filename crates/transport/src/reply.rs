use serde::Deserialize;
use serde_json::{Map, Value};

/// One result row as delivered by the backend, columns in wire order.
pub type ReplyRow = Map<String, Value>;

/// Answer of the request/response chat call.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ChatReply {
    #[serde(default)]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default, deserialize_with = "deserialize_rows")]
    pub results: Vec<ReplyRow>,
    #[serde(default)]
    pub final_answer: Option<String>,
}

impl ChatReply {
    /// Decodes a reply body, unwrapping the optional `json_dict` envelope.
    ///
    /// The envelope holds either the reply object itself or its JSON text.
    pub fn from_body(body: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(body)?;
        Self::from_value(value)
    }

    pub fn from_value(mut value: Value) -> Result<Self, serde_json::Error> {
        if let Some(inner) = value.get_mut("json_dict").map(Value::take) {
            value = match inner {
                Value::String(text) => serde_json::from_str(&text)?,
                Value::Null => value,
                other => other,
            };
        }
        serde_json::from_value(value)
    }
}

fn deserialize_rows<'de, D>(deserializer: D) -> Result<Vec<ReplyRow>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    // Agents sometimes answer with a message string where rows were expected.
    let value = Option::<Value>::deserialize(deserializer)?;
    let rows = match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(row) => Some(row),
                _ => None,
            })
            .collect(),
        Some(Value::Object(row)) => vec![row],
        _ => Vec::new(),
    };
    Ok(rows)
}
