//! Completion notifications.
//!
//! Notifications record intent only: nothing is delivered and nothing can
//! fail, so the pipeline reports `notificationSent: true` unconditionally.

/// Signals that a pipeline run finished for `recipient`.
pub trait Notifier: Send + Sync {
    fn notify(&self, recipient: &str);
}

/// Notifier that emits structured log events for the requester and for a
/// fixed audit recipient.
pub struct LogNotifier {
    audit_recipient: String,
}

impl LogNotifier {
    pub fn new(audit_recipient: impl Into<String>) -> Self {
        Self {
            audit_recipient: audit_recipient.into(),
        }
    }
}

impl Notifier for LogNotifier {
    fn notify(&self, recipient: &str) {
        tracing::info!(recipient, "notification sent");
        tracing::info!(
            recipient = %self.audit_recipient,
            "required notification recipient"
        );
    }
}
