//! Reminder job model — one scheduled one-shot notification.

use chrono::{DateTime, Utc};

/// Maximum reminder message length. Enforced by the command layer, not by
/// the scheduler.
pub const MAX_MESSAGE_LEN: usize = 500;

/// A one-shot reminder awaiting its due time.
#[derive(Debug, Clone, PartialEq)]
pub struct ReminderJob {
    /// Store-assigned row id.
    pub id: i64,
    /// Recipient user id (direct-channel target).
    pub user_id: String,
    /// Fallback channel id, used only when the direct send fails.
    /// Empty means no fallback.
    pub channel_id: String,
    /// Message text (≤ [`MAX_MESSAGE_LEN`], caller-enforced).
    pub message: String,
    /// Absolute due time, second precision.
    pub due_at: DateTime<Utc>,
}

impl ReminderJob {
    /// Delivery text as shown to the recipient.
    pub fn render(&self) -> String {
        format!(
            "⏰ **Time's up, <@{}>!**\nReminder: \"{}\"",
            self.user_id, self.message
        )
    }
}
