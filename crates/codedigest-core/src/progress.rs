//! Progress event type shared by traversal and assembly.

use serde::{Deserialize, Serialize};

/// Fire-and-forget progress event.
///
/// Sink delivery failures never affect traversal or assembly correctness;
/// senders drop events when nobody is listening.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Operation emitting the event ("scan", "assemble").
    pub op: String,
    /// Current phase within the operation.
    pub mode: String,
    /// Completion estimate, when one is known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent: Option<f64>,
    /// Human-readable detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ProgressEvent {
    /// Create a new progress event.
    pub fn new(op: impl Into<String>, mode: impl Into<String>) -> Self {
        Self {
            op: op.into(),
            mode: mode.into(),
            percent: None,
            message: None,
        }
    }

    /// Attach a completion percentage.
    pub fn with_percent(mut self, percent: f64) -> Self {
        self.percent = Some(percent);
        self
    }

    /// Attach a detail message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}
