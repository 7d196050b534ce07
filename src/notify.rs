//! Notification events emitted by the engines
//!
//! Engines return these as plain values alongside their results; an outer
//! dispatcher owns delivery, rendering and read-state. The core never calls
//! a notifier inline.
use crate::model::TimeStamp;
use chrono::Utc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub recipient_id: String,
    pub title: String,
    pub message: String,
    pub severity: Severity,
    pub created_at: TimeStamp<Utc>,
}

impl Notification {
    pub fn new(
        recipient_id: impl Into<String>,
        title: impl Into<String>,
        message: impl Into<String>,
        severity: Severity,
    ) -> Self {
        Self {
            recipient_id: recipient_id.into(),
            title: title.into(),
            message: message.into(),
            severity,
            created_at: TimeStamp::now(),
        }
    }

    pub fn info(
        recipient_id: impl Into<String>,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(recipient_id, title, message, Severity::Info)
    }

    pub fn success(
        recipient_id: impl Into<String>,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(recipient_id, title, message, Severity::Success)
    }

    pub fn warning(
        recipient_id: impl Into<String>,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(recipient_id, title, message, Severity::Warning)
    }

    pub fn error(
        recipient_id: impl Into<String>,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(recipient_id, title, message, Severity::Error)
    }
}
