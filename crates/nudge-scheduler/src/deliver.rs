//! Delivery of fired reminders — direct channel first, then fallback.

use std::sync::Arc;

use nudge_core::Messenger;

use crate::job::ReminderJob;
use crate::persistence::SchedulerDb;

/// Delivers fired jobs and reconciles store state on success.
pub struct NotificationDispatcher {
    messenger: Arc<dyn Messenger>,
    store: Arc<SchedulerDb>,
}

impl NotificationDispatcher {
    pub fn new(messenger: Arc<dyn Messenger>, store: Arc<SchedulerDb>) -> Self {
        Self { messenger, store }
    }

    /// Attempt delivery: open a direct channel to the recipient; if that
    /// send fails, fall back to the job's channel id when non-empty. On
    /// success the store row is deleted. Both attempts failing is terminal
    /// for the job — logged, never retried.
    ///
    /// Returns `true` when the message was delivered.
    pub async fn deliver(&self, job: &ReminderJob) -> bool {
        let content = job.render();

        match self.messenger.open_direct(&job.user_id).await {
            Ok(dm_channel) => match self.messenger.send(&dm_channel, &content).await {
                Ok(()) => {
                    self.cleanup(job.id);
                    tracing::info!("✅ Reminder {} delivered via DM", job.id);
                    return true;
                }
                Err(e) => tracing::warn!("⚠️ DM failed for reminder {}: {e}", job.id),
            },
            Err(e) => tracing::warn!("⚠️ Could not open DM for reminder {}: {e}", job.id),
        }

        if job.channel_id.is_empty() {
            tracing::warn!("❌ Reminder {} failed: no DM and no channel fallback", job.id);
            return false;
        }

        match self.messenger.send(&job.channel_id, &content).await {
            Ok(()) => {
                self.cleanup(job.id);
                tracing::info!("✅ Reminder {} delivered via channel fallback", job.id);
                true
            }
            Err(e) => {
                tracing::warn!("❌ Failed to send reminder {} to channel: {e}", job.id);
                false
            }
        }
    }

    fn cleanup(&self, id: i64) {
        if let Err(e) = self.store.delete_reminder(id) {
            tracing::warn!("⚠️ Failed to delete reminder {id} after delivery: {e}");
        }
    }
}
