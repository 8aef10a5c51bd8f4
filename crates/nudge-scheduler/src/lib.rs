//! # Nudge Scheduler
//!
//! Delayed-notification scheduling and periodic fan-out dispatch.
//!
//! ## Architecture
//! ```text
//! ReminderScheduler (one tokio timer per pending job)
//!   └── on fire → NotificationDispatcher
//!                   ├── direct channel (DM)
//!                   └── fallback channel
//!
//! LoopManager (cancellation token per running loop)
//!   └── loop runner (tokio interval, 1s floor)
//!         └── per tick → WebhookDispatcher
//!               └── concurrent POST to every endpoint
//! ```
//!
//! SQLite is the source of truth across restarts: a reminder row is written
//! before its timer is installed, and pending rows are re-armed at startup.
//! Loop rows are persisted but not auto-started — loops do not survive
//! restart.

pub mod deliver;
pub mod job;
pub mod looper;
pub mod persistence;
pub mod reminders;
pub mod webhook;

pub use deliver::NotificationDispatcher;
pub use job::{MAX_MESSAGE_LEN, ReminderJob};
pub use looper::{LoopConfig, LoopManager, MIN_INTERVAL_MS, ThreadMap, WebhookEndpoint};
pub use persistence::SchedulerDb;
pub use reminders::ReminderScheduler;
pub use webhook::WebhookDispatcher;
