use chrono::{DateTime, Utc};

use crate::models::users::Model as User;

/// Outbound notifications. Calls are fire-and-forget: implementations must not
/// block and cannot fail the operation that triggered them.
pub trait Notifier: Send + Sync {
    fn password_reset_requested(&self, user: &User, token: &str, expires_at: DateTime<Utc>);
}

/// Writes notifications to the log instead of delivering them. The reset
/// token itself is never logged.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn password_reset_requested(&self, user: &User, _token: &str, expires_at: DateTime<Utc>) {
        tracing::info!(user_id = %user.id, %expires_at, "Password reset link ready for delivery");
    }
}
