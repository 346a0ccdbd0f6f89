//! Operator notifications for unrecoverable worker faults.

/// Delivery is best effort; failures are logged by the implementation.
pub trait Notifier: Send + Sync {
    fn notify_failure(&self, subject: &str, body: &str);
}

/// Writes notifications to the error log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify_failure(&self, subject: &str, body: &str) {
        log::error!("{}\n{}", subject, body);
    }
}
