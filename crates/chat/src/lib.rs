#![deny(unsafe_code)]

/// Streaming chat core for the dashboard assistant.
///
/// Decodes assistant stream frames, reduces them into an ordered transcript and
/// forwards side effects (filters, theme, charts) to the host.
pub mod chat;
/// Plain-text transcript rendering.
pub mod render;
/// Settings persistence.
pub mod settings;
