use crate::types::AlertEvent;

/// Receiver of emitted alerts.
///
/// Called from the monitoring loop's task, one call per emission. Implementors
/// that touch display state shared with other tasks bring their own
/// synchronization.
pub trait AlertSink: Send + Sync {
    fn on_alert(&self, event: &AlertEvent);
}

impl<F> AlertSink for F
where
    F: Fn(&AlertEvent) + Send + Sync,
{
    fn on_alert(&self, event: &AlertEvent) {
        self(event)
    }
}
