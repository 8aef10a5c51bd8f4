//! Periodic webhook loops — named, independently cancellable fan-out tasks.
//!
//! One loop per channel key. Starting a running key is a no-op; stopping
//! signals the runner's cancellation token and drops the index entry
//! without waiting for an in-flight round.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use nudge_core::error::Result;

use crate::persistence::SchedulerDb;
use crate::webhook::WebhookDispatcher;

/// Interval floor — a loop can never tick faster than this.
pub const MIN_INTERVAL_MS: u64 = 1000;

/// Loop configuration as persisted in the `webhook_loops` config column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopConfig {
    #[serde(rename = "channelId")]
    pub channel_id: String,
    #[serde(rename = "channelName", default)]
    pub channel_name: String,
    /// Tick interval in milliseconds, floor-clamped at runtime.
    #[serde(default)]
    pub interval: u64,
    #[serde(default)]
    pub message: String,
    #[serde(rename = "webhook_author", default)]
    pub webhook_author: String,
    #[serde(rename = "webhook_avatar", default)]
    pub webhook_avatar: String,
}

/// channelId → threadId mapping persisted alongside a loop. Not consumed by
/// the runtime today; kept for schema compatibility.
pub type ThreadMap = HashMap<String, String>;

/// One dispatch endpoint — an opaque id/secret pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEndpoint {
    #[serde(rename = "id")]
    pub hook_id: String,
    #[serde(rename = "token")]
    pub hook_token: String,
    #[serde(rename = "channelName", default)]
    pub channel_name: String,
}

struct LoopInstance {
    config: LoopConfig,
    cancel: CancellationToken,
}

/// Owns the index of running loops.
pub struct LoopManager {
    loops: Mutex<HashMap<String, LoopInstance>>,
    dispatcher: Arc<WebhookDispatcher>,
    store: Arc<SchedulerDb>,
}

impl LoopManager {
    pub fn new(dispatcher: Arc<WebhookDispatcher>, store: Arc<SchedulerDb>) -> Self {
        Self {
            loops: Mutex::new(HashMap::new()),
            dispatcher,
            store,
        }
    }

    /// Start a loop keyed by `config.channel_id`. Idempotent: a running key
    /// keeps its original config and endpoints, the duplicate start is
    /// dropped.
    pub fn start_loop(&self, config: LoopConfig, endpoints: Vec<WebhookEndpoint>) {
        let mut loops = self.loops.lock().unwrap();
        if loops.contains_key(&config.channel_id) {
            return;
        }

        let cancel = CancellationToken::new();
        let key = config.channel_id.clone();
        tokio::spawn(run_loop(
            config.clone(),
            endpoints,
            Arc::clone(&self.dispatcher),
            cancel.clone(),
        ));
        loops.insert(key, LoopInstance { config, cancel });
    }

    /// Signal cancellation and drop the index entry. No-op on unknown keys.
    /// Does not wait for an in-flight round to finish.
    pub fn stop_loop(&self, key: &str) {
        let mut loops = self.loops.lock().unwrap();
        if let Some(instance) = loops.remove(key) {
            instance.cancel.cancel();
            tracing::info!("🛑 Stopped loop for {}", instance.config.channel_name);
        }
    }

    /// Whether a loop is live for `key`.
    pub fn is_running(&self, key: &str) -> bool {
        self.loops.lock().unwrap().contains_key(key)
    }

    /// Keys of all running loops.
    pub fn active_loops(&self) -> Vec<String> {
        self.loops.lock().unwrap().keys().cloned().collect()
    }

    /// Config of a running loop, if any.
    pub fn loop_config(&self, key: &str) -> Option<LoopConfig> {
        self.loops.lock().unwrap().get(key).map(|i| i.config.clone())
    }

    /// Scan persisted loop rows. This does not reconstruct runtime loops —
    /// loops do not survive restart. Rows are counted and logged so the gap
    /// stays visible at startup.
    pub fn load_from_db(&self) -> Result<usize> {
        let rows = self.store.loop_rows()?;
        let count = rows.len();
        tracing::info!("📦 Loaded {count} loop configurations from DB (not auto-started)");
        Ok(count)
    }
}

/// Effective tick interval for a configured millisecond value.
fn effective_interval(interval_ms: u64) -> Duration {
    Duration::from_millis(interval_ms.max(MIN_INTERVAL_MS))
}

/// Per-loop runner: one dispatch round immediately, then one per tick until
/// cancelled. The round is awaited before the next tick wait, so rounds
/// never overlap; a round longer than the interval makes the ticker burst.
async fn run_loop(
    config: LoopConfig,
    endpoints: Vec<WebhookEndpoint>,
    dispatcher: Arc<WebhookDispatcher>,
    cancel: CancellationToken,
) {
    let interval = effective_interval(config.interval);
    tracing::info!(
        "▶️ Starting loop for {} with interval {}ms",
        config.channel_name,
        interval.as_millis()
    );

    let mut ticker = tokio::time::interval(interval);
    // The first interval tick completes immediately and serves as the
    // initial round.
    ticker.tick().await;
    dispatcher.dispatch_round(&config, &endpoints).await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => dispatcher.dispatch_round(&config, &endpoints).await,
        }
    }
}
