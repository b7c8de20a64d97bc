use serde::Deserialize;

/// Decoded stream event, consumed once by the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    RunStarted,
    RunFinished,
    TextStart,
    TextDelta { delta: String },
    TextEnd,
    Raw(RawEvent),
}

/// Side-effect events tunnelled through the `raw` frame type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawEvent {
    FilterUpdate(FilterUpdate),
    ToggleTheme { theme: Option<String> },
    ChartImage { image: String },
    /// Any sub-type this client does not know; ignored.
    Unknown,
}

/// Partial filter change; absent fields leave the current value alone.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct FilterUpdate {
    #[serde(default, alias = "data_inicial")]
    pub start_date: Option<String>,
    #[serde(default, alias = "data_final")]
    pub end_date: Option<String>,
    #[serde(default, alias = "categoria")]
    pub category: Option<String>,
}

impl FilterUpdate {
    pub fn is_empty(&self) -> bool {
        self.start_date.is_none() && self.end_date.is_none() && self.category.is_none()
    }
}

impl StreamEvent {
    /// Returns true for events that end the visible "waiting" phase of an exchange.
    pub fn clears_pending(&self) -> bool {
        matches!(self, Self::RunFinished | Self::TextEnd)
    }

    /// Returns true for the event after which the server sends nothing more.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::RunFinished)
    }
}
