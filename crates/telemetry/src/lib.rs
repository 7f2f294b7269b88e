//! Traceability for memwindow selections.
//!
//! Keeps a bounded history of recent selection results and renders them
//! for operators: exclusion-reason summaries and a plain-text trace of
//! what was included, what was dropped, and why.

pub mod debug;
pub mod session_log;

pub use debug::{exclusion_summary, format_selection_debug};
pub use session_log::SessionLog;

/// Errors from the telemetry subsystem.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}
