//! Outbound mail and in-app notification seams.
//!
//! Two deliberately different contracts: OTP mail delivery is
//! fallible and gating (no session exists until the code is known to
//! have been sent), while in-app notifications are fire-and-forget
//! and may never block or fail a ledger operation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use swapdesk_types::UserId;
use tracing::info;

use crate::clients::{BoxFuture, NetworkFailure, NetworkResult};

/// Delivers one-time codes. A failed send aborts session issuance.
pub trait MailSink: Send + Sync {
    fn send_otp(&self, email: String, code: String) -> BoxFuture<'_, NetworkResult<()>>;
}

/// Fire-and-forget in-app notifications.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, user_id: UserId, subject: String, body: String) -> BoxFuture<'_, ()>;
}

pub type DynMailSink = Arc<dyn MailSink>;
pub type DynNotificationSink = Arc<dyn NotificationSink>;

/// Production default until a push channel exists: notifications go to
/// the structured log.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl NotificationSink for LogNotifier {
    fn notify(&self, user_id: UserId, subject: String, body: String) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            info!(user = %user_id, %subject, %body, "notification");
        })
    }
}

/// Mock mail sink for testing. Records sends; can fail on demand.
#[derive(Default)]
pub struct RecordingMail {
    sent: Mutex<Vec<(String, String)>>,
    fail_next: AtomicBool,
}

impl RecordingMail {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_next(&self, fail: bool) {
        self.fail_next.store(fail, Ordering::SeqCst);
    }

    /// `(email, code)` pairs sent so far.
    #[must_use]
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().clone()
    }

    /// The most recently mailed code, for test verification flows.
    #[must_use]
    pub fn last_code(&self) -> Option<String> {
        self.sent.lock().last().map(|(_, code)| code.clone())
    }
}

impl MailSink for RecordingMail {
    fn send_otp(&self, email: String, code: String) -> BoxFuture<'_, NetworkResult<()>> {
        Box::pin(async move {
            if self.fail_next.swap(false, Ordering::SeqCst) {
                return Err(NetworkFailure::new("mail delivery failed"));
            }
            self.sent.lock().push((email, code));
            Ok(())
        })
    }
}

/// Mock notification sink for testing.
#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<(UserId, String)>>,
}

impl RecordingNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `(user, subject)` pairs delivered so far.
    #[must_use]
    pub fn notices(&self) -> Vec<(UserId, String)> {
        self.notices.lock().clone()
    }
}

impl NotificationSink for RecordingNotifier {
    fn notify(&self, user_id: UserId, subject: String, _body: String) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.notices.lock().push((user_id, subject));
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recording_mail_captures_codes() {
        let mail = RecordingMail::new();
        mail.send_otp("user@example.com".to_string(), "123456".to_string())
            .await
            .unwrap();
        assert_eq!(mail.last_code().as_deref(), Some("123456"));
    }

    #[tokio::test]
    async fn recording_mail_fails_once_when_told() {
        let mail = RecordingMail::new();
        mail.set_fail_next(true);
        assert!(
            mail.send_otp("user@example.com".to_string(), "123456".to_string())
                .await
                .is_err()
        );
        // Subsequent sends succeed again.
        assert!(
            mail.send_otp("user@example.com".to_string(), "654321".to_string())
                .await
                .is_ok()
        );
        assert_eq!(mail.sent().len(), 1);
    }

    #[tokio::test]
    async fn notifier_records_subjects() {
        let notifier = RecordingNotifier::new();
        let user = UserId::new();
        notifier
            .notify(user, "Withdrawal completed".to_string(), String::new())
            .await;
        assert_eq!(notifier.notices(), vec![(user, "Withdrawal completed".to_string())]);
    }
}
