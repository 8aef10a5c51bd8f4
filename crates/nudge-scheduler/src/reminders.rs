//! Reminder scheduling — one single-fire timer per pending job.
//!
//! The index maps job id → (job, timer task). Scheduling an id that is
//! already live aborts the old timer before installing the new one, so at
//! most one fire can ever happen per schedule generation. The index lock is
//! held only for map mutation, never across delivery.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::task::JoinHandle;

use nudge_core::error::Result;

use crate::deliver::NotificationDispatcher;
use crate::job::ReminderJob;
use crate::persistence::SchedulerDb;

struct ScheduledJob {
    job: ReminderJob,
    timer: JoinHandle<()>,
}

type JobIndex = Arc<Mutex<HashMap<i64, ScheduledJob>>>;

/// In-process index of pending reminder timers.
#[derive(Clone)]
pub struct ReminderScheduler {
    jobs: JobIndex,
    dispatcher: Arc<NotificationDispatcher>,
    store: Arc<SchedulerDb>,
}

impl ReminderScheduler {
    pub fn new(store: Arc<SchedulerDb>, dispatcher: Arc<NotificationDispatcher>) -> Self {
        Self {
            jobs: Arc::new(Mutex::new(HashMap::new())),
            dispatcher,
            store,
        }
    }

    /// Install a single-fire timer for `job`. The persisted row must already
    /// exist — scheduling a job that was never durably stored would not
    /// survive a restart. Due times in the past clamp to an immediate fire.
    pub fn schedule(&self, job: ReminderJob) {
        // Negative deltas fail the conversion and clamp to zero.
        let delay = (job.due_at - Utc::now()).to_std().unwrap_or_default();

        let mut jobs = self.jobs.lock().unwrap();
        if let Some(prev) = jobs.remove(&job.id) {
            prev.timer.abort();
        }

        let id = job.id;
        let due_at = job.due_at;
        let timer = tokio::spawn({
            let dispatcher = Arc::clone(&self.dispatcher);
            let index = Arc::clone(&self.jobs);
            let job = job.clone();
            async move {
                tokio::time::sleep(delay).await;
                if dispatcher.deliver(&job).await {
                    index.lock().unwrap().remove(&job.id);
                }
            }
        });

        jobs.insert(id, ScheduledJob { job, timer });
        tracing::info!("⏰ Scheduled reminder {id} for {}", due_at.to_rfc3339());
    }

    /// Stop the timer for `id` and drop the index entry; no-op when absent.
    /// Durable cancellation (marking the row inactive) is the caller's
    /// business.
    pub fn cancel(&self, id: i64) {
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(entry) = jobs.remove(&id) {
            entry.timer.abort();
            tracing::info!("🗑️ Cancelled reminder {id}");
        }
    }

    /// Whether a live index entry exists for `id`.
    pub fn contains(&self, id: i64) -> bool {
        self.jobs.lock().unwrap().contains_key(&id)
    }

    /// Number of live index entries.
    pub fn pending_count(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }

    /// Snapshot of the pending jobs, soonest first.
    pub fn pending_jobs(&self) -> Vec<ReminderJob> {
        let jobs = self.jobs.lock().unwrap();
        let mut pending: Vec<ReminderJob> = jobs.values().map(|e| e.job.clone()).collect();
        pending.sort_by_key(|j| j.due_at);
        pending
    }

    /// Re-arm timers for every active row still due in the future. Rows
    /// already past due are skipped on purpose — re-firing them would
    /// unleash a storm of stale reminders after downtime. Store scan errors
    /// surface to the caller; unreadable rows were already skipped by the
    /// store layer.
    pub fn restore_all(&self) -> Result<usize> {
        let rows = self.store.active_reminders()?;
        let now = Utc::now();
        let mut count = 0usize;
        for job in rows {
            if job.due_at > now {
                self.schedule(job);
                count += 1;
            }
        }
        tracing::info!("🔁 Restored {count} pending reminders");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use nudge_core::Messenger;
    use nudge_core::error::{NudgeError, Result as CoreResult};

    struct MockMessenger {
        dm_allowed: bool,
        sends: StdMutex<Vec<(String, String)>>,
    }

    impl MockMessenger {
        fn new(dm_allowed: bool) -> Arc<Self> {
            Arc::new(Self { dm_allowed, sends: StdMutex::new(Vec::new()) })
        }

        fn sends(&self) -> Vec<(String, String)> {
            self.sends.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Messenger for MockMessenger {
        async fn open_direct(&self, user_id: &str) -> CoreResult<String> {
            if self.dm_allowed {
                Ok(format!("dm:{user_id}"))
            } else {
                Err(NudgeError::Channel("no direct-channel capability".into()))
            }
        }

        async fn send(&self, channel_id: &str, text: &str) -> CoreResult<()> {
            self.sends
                .lock()
                .unwrap()
                .push((channel_id.to_string(), text.to_string()));
            Ok(())
        }
    }

    fn setup(dm_allowed: bool) -> (ReminderScheduler, Arc<SchedulerDb>, Arc<MockMessenger>) {
        let store = Arc::new(SchedulerDb::open_in_memory().unwrap());
        let messenger = MockMessenger::new(dm_allowed);
        let dispatcher = Arc::new(NotificationDispatcher::new(
            messenger.clone() as Arc<dyn Messenger>,
            Arc::clone(&store),
        ));
        let scheduler = ReminderScheduler::new(Arc::clone(&store), dispatcher);
        (scheduler, store, messenger)
    }

    fn job(id: i64, channel_id: &str, message: &str, due_in_secs: i64) -> ReminderJob {
        ReminderJob {
            id,
            user_id: "u1".into(),
            channel_id: channel_id.into(),
            message: message.into(),
            due_at: Utc::now() + ChronoDuration::seconds(due_in_secs),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn past_due_clamps_to_immediate_fire() {
        let (scheduler, _store, messenger) = setup(true);
        scheduler.schedule(job(1, "", "overdue", -3600));

        tokio::time::sleep(Duration::from_millis(50)).await;
        let sends = messenger.sends();
        assert_eq!(sends.len(), 1);
        assert_eq!(sends[0].0, "dm:u1");
        assert!(!scheduler.contains(1));
    }

    #[tokio::test(start_paused = true)]
    async fn reschedule_supersedes_prior_timer() {
        let (scheduler, _store, messenger) = setup(true);
        scheduler.schedule(job(1, "", "first", 5));
        scheduler.schedule(job(1, "", "second", 8));
        assert_eq!(scheduler.pending_count(), 1);

        tokio::time::sleep(Duration::from_secs(20)).await;
        let sends = messenger.sends();
        assert_eq!(sends.len(), 1);
        assert!(sends[0].1.contains("second"));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_any_delivery() {
        let (scheduler, _store, messenger) = setup(true);
        scheduler.schedule(job(1, "", "never", 10));
        scheduler.cancel(1);
        assert!(!scheduler.contains(1));

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(messenger.sends().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_unknown_id_is_noop() {
        let (scheduler, _store, _messenger) = setup(true);
        scheduler.cancel(42);
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn fallback_delivery_cleans_store_and_index() {
        // Recipient has no direct-channel capability; the fallback channel
        // accepts the message, so the row is deleted and no timer remains.
        let (scheduler, store, messenger) = setup(false);
        let id = store
            .insert_reminder("u1", "chan-7", "fall back", Utc::now().timestamp())
            .unwrap();
        scheduler.schedule(ReminderJob {
            id,
            user_id: "u1".into(),
            channel_id: "chan-7".into(),
            message: "fall back".into(),
            due_at: Utc::now(),
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        let sends = messenger.sends();
        assert_eq!(sends.len(), 1);
        assert_eq!(sends[0].0, "chan-7");
        assert!(store.active_reminders().unwrap().is_empty());
        assert!(!scheduler.contains(id));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_both_attempts_leaves_row_active() {
        // No DM capability and no fallback channel: the job is terminal,
        // the row stays active, and the stale index entry is tolerated.
        let (scheduler, store, messenger) = setup(false);
        let id = store
            .insert_reminder("u1", "", "lost", Utc::now().timestamp())
            .unwrap();
        scheduler.schedule(ReminderJob {
            id,
            user_id: "u1".into(),
            channel_id: String::new(),
            message: "lost".into(),
            due_at: Utc::now(),
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(messenger.sends().is_empty());
        assert_eq!(store.active_reminders().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn restore_skips_past_due_rows() {
        let (scheduler, store, _messenger) = setup(true);
        let now = Utc::now().timestamp();
        store.insert_reminder("u1", "", "stale", now - 100).unwrap();
        let fresh_a = store.insert_reminder("u1", "", "a", now + 600).unwrap();
        let fresh_b = store.insert_reminder("u2", "", "b", now + 900).unwrap();

        let restored = scheduler.restore_all().unwrap();
        assert_eq!(restored, 2);
        assert!(scheduler.contains(fresh_a));
        assert!(scheduler.contains(fresh_b));
        assert_eq!(scheduler.pending_count(), 2);

        let pending = scheduler.pending_jobs();
        assert_eq!(pending[0].message, "a");
        assert_eq!(pending[1].message, "b");
    }
}
