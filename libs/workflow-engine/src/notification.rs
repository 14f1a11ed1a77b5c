//! Best-effort notification delivery for paused runs.
//!
//! Fires when a run pauses for an approval or a form; delivery is
//! fire-and-forget and never blocks or fails the run. A real webhook/email
//! delivery backend is out of scope here — this is the interface such a
//! backend would implement.

use async_trait::async_trait;

/// Notifies an external recipient that a run is waiting on them.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, recipient: &str, message: &str);
}

/// Default sink: logs via `tracing` and otherwise does nothing. Stands in
/// for a real webhook/email delivery layer, which is out of scope.
#[derive(Debug, Default)]
pub struct LoggingNotificationSink;

#[async_trait]
impl NotificationSink for LoggingNotificationSink {
    async fn notify(&self, recipient: &str, message: &str) {
        tracing::info!(recipient, message, "run paused, notification due");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn logging_sink_does_not_panic() {
        let sink = LoggingNotificationSink;
        sink.notify("alice@example.com", "approval needed").await;
    }
}
