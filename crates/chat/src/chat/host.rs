use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};

use super::events::FilterUpdate;

/// Display theme owned by the host application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn name(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("light") || value.eq_ignore_ascii_case("claro") {
            Some(Self::Light)
        } else if value.eq_ignore_ascii_case("dark") || value.eq_ignore_ascii_case("escuro") {
            Some(Self::Dark)
        } else {
            None
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.name())
    }
}

/// Filters applied to the dashboard charts.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DashboardFilters {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub category: Option<String>,
}

impl DashboardFilters {
    /// Overlays the present fields of `update`; absent ones keep their current value.
    pub fn merged(&self, update: &FilterUpdate) -> Self {
        Self {
            start_date: update
                .start_date
                .clone()
                .or_else(|| self.start_date.clone()),
            end_date: update.end_date.clone().or_else(|| self.end_date.clone()),
            category: update.category.clone().or_else(|| self.category.clone()),
        }
    }
}

pub type ChangeCallback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// A value owned by the host plus the host's change callback.
///
/// The chat core reads the current value and requests changes; the host stays the
/// single source of truth and learns about every change through the callback.
pub struct HostState<T> {
    value: Arc<ArcSwap<T>>,
    on_change: ChangeCallback<T>,
}

impl<T> Clone for HostState<T> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            on_change: Arc::clone(&self.on_change),
        }
    }
}

impl<T> HostState<T> {
    pub fn new(initial: T, on_change: impl Fn(&T) + Send + Sync + 'static) -> Self {
        Self::from_shared(Arc::new(ArcSwap::from_pointee(initial)), on_change)
    }

    /// Wraps a store the host already shares with other components.
    pub fn from_shared(
        value: Arc<ArcSwap<T>>,
        on_change: impl Fn(&T) + Send + Sync + 'static,
    ) -> Self {
        Self {
            value,
            on_change: Arc::new(on_change),
        }
    }

    pub fn current(&self) -> Arc<T> {
        self.value.load_full()
    }

    pub fn shared(&self) -> Arc<ArcSwap<T>> {
        Arc::clone(&self.value)
    }

    /// Stores `next` and notifies the host exactly once.
    pub fn request_change(&self, next: T) {
        let next = Arc::new(next);
        self.value.store(Arc::clone(&next));
        (self.on_change)(&next);
    }
}

impl<T> HostState<T>
where
    T: Default,
{
    /// State with a default value and a callback that does nothing.
    pub fn detached() -> Self {
        Self::new(T::default(), |_| {})
    }
}

/// Host-owned state the side-effect events may change.
#[derive(Clone)]
pub struct HostBindings {
    pub filters: HostState<DashboardFilters>,
    pub theme: HostState<Theme>,
}

impl HostBindings {
    pub fn new(filters: HostState<DashboardFilters>, theme: HostState<Theme>) -> Self {
        Self { filters, theme }
    }

    pub fn detached() -> Self {
        Self::new(HostState::detached(), HostState::detached())
    }
}
