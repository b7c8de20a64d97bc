use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use super::events::{FilterUpdate, RawEvent};
use super::host::{DashboardFilters, HostBindings, Theme};
use super::transcript::{EntryDraft, EntryId, Transcript};

/// Result of dispatching one `raw` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    FiltersChanged {
        filters: DashboardFilters,
        note: EntryId,
    },
    ThemeChanged {
        theme: Theme,
        note: EntryId,
    },
    ChartInserted(EntryId),
    Ignored,
}

/// Turns side-effect events into host state changes and transcript entries.
#[derive(Clone)]
pub struct SideEffectDispatcher {
    host: HostBindings,
}

impl SideEffectDispatcher {
    pub fn new(host: HostBindings) -> Self {
        Self { host }
    }

    pub fn host(&self) -> &HostBindings {
        &self.host
    }

    pub fn dispatch(&self, event: RawEvent, transcript: &mut Transcript) -> DispatchOutcome {
        match event {
            RawEvent::FilterUpdate(update) => self.update_filters(&update, transcript),
            RawEvent::ToggleTheme { theme } => self.toggle_theme(theme.as_deref(), transcript),
            RawEvent::ChartImage { image } => Self::insert_chart(&image, transcript),
            RawEvent::Unknown => {
                tracing::trace!("ignoring unknown raw event");
                DispatchOutcome::Ignored
            }
        }
    }

    fn update_filters(&self, update: &FilterUpdate, transcript: &mut Transcript) -> DispatchOutcome {
        let filters = self.host.filters.current().merged(update);
        self.host.filters.request_change(filters.clone());
        tracing::debug!(filters = ?filters, "dashboard filters updated from stream");

        let note = transcript.append(EntryDraft::system_note(filter_note(update)));
        DispatchOutcome::FiltersChanged { filters, note }
    }

    fn toggle_theme(&self, requested: Option<&str>, transcript: &mut Transcript) -> DispatchOutcome {
        let current = *self.host.theme.current();
        let theme = match requested.map(|value| (value, Theme::parse(value))) {
            Some((_, Some(theme))) => theme,
            Some((value, None)) => {
                tracing::warn!(requested = value, "unrecognized theme; toggling instead");
                current.toggled()
            }
            None => current.toggled(),
        };

        self.host.theme.request_change(theme);
        tracing::debug!(from = %current, to = %theme, "theme changed from stream");

        let note = transcript.append(EntryDraft::system_note(format!("Tema alterado para {theme}.")));
        DispatchOutcome::ThemeChanged { theme, note }
    }

    fn insert_chart(image: &str, transcript: &mut Transcript) -> DispatchOutcome {
        // Producers sometimes send a full data URL instead of bare base64.
        let encoded = image
            .split_once("base64,")
            .map_or(image, |(_, data)| data)
            .trim();

        match STANDARD.decode(encoded) {
            Ok(bytes) if !bytes.is_empty() => {
                DispatchOutcome::ChartInserted(transcript.append(EntryDraft::image(bytes)))
            }
            Ok(_) => {
                tracing::warn!("dropping chart event with an empty image");
                DispatchOutcome::Ignored
            }
            Err(error) => {
                tracing::warn!(error = %error, "dropping chart event with undecodable image");
                DispatchOutcome::Ignored
            }
        }
    }
}

fn filter_note(update: &FilterUpdate) -> String {
    let mut parts = Vec::new();
    if let Some(value) = &update.start_date {
        parts.push(format!("data inicial = {value}"));
    }
    if let Some(value) = &update.end_date {
        parts.push(format!("data final = {value}"));
    }
    if let Some(value) = &update.category {
        parts.push(format!("categoria = {value}"));
    }

    if parts.is_empty() {
        "Filtros reaplicados sem alterações.".to_string()
    } else {
        format!("Filtros atualizados: {}.", parts.join(", "))
    }
}
