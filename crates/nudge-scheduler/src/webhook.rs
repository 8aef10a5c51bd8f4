//! Webhook fan-out — one payload, N endpoints, concurrent POSTs over a
//! shared connection-pooled client.

use std::sync::Arc;
use std::time::Duration;

use nudge_core::error::{NudgeError, Result};

use crate::looper::{LoopConfig, WebhookEndpoint};

const DEFAULT_ENDPOINT_BASE: &str = "https://discord.com/api/webhooks";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Executes dispatch rounds. One instance is shared by every loop; the
/// pooled client is safe for concurrent use.
pub struct WebhookDispatcher {
    client: reqwest::Client,
    endpoint_base: String,
}

impl WebhookDispatcher {
    /// Build with a pooled client: fixed per-request timeout, bounded
    /// idle-connection reuse.
    pub fn new(endpoint_base: &str, request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .pool_max_idle_per_host(100)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| NudgeError::Dispatch(format!("http client: {e}")))?;
        Ok(Self {
            client,
            endpoint_base: endpoint_base.trim_end_matches('/').to_string(),
        })
    }

    /// Default endpoint base and timeout.
    pub fn with_defaults() -> Result<Self> {
        Self::new(DEFAULT_ENDPOINT_BASE, DEFAULT_REQUEST_TIMEOUT)
    }

    /// One dispatch round: POST the loop's payload to every endpoint
    /// concurrently and wait for all requests to finish. Endpoint failures
    /// (transport error, non-2xx, 429) are logged and never abort the
    /// round or affect sibling requests.
    pub async fn dispatch_round(&self, config: &LoopConfig, endpoints: &[WebhookEndpoint]) {
        let payload = Arc::new(serde_json::json!({
            "content": config.message,
            "username": config.webhook_author,
            "avatar_url": config.webhook_avatar,
        }));

        let mut requests = Vec::with_capacity(endpoints.len());
        for endpoint in endpoints {
            let client = self.client.clone();
            let url = format!(
                "{}/{}/{}",
                self.endpoint_base, endpoint.hook_id, endpoint.hook_token
            );
            let name = if endpoint.channel_name.is_empty() {
                endpoint.hook_id.clone()
            } else {
                endpoint.channel_name.clone()
            };
            let payload = Arc::clone(&payload);
            requests.push(tokio::spawn(async move {
                match client.post(&url).json(payload.as_ref()).send().await {
                    Ok(resp) if resp.status().as_u16() == 429 => {
                        tracing::warn!("⏳ Webhook {name} rate limited (429), not retrying");
                    }
                    Ok(resp) if !resp.status().is_success() => {
                        tracing::warn!("⚠️ Webhook {name} returned {}", resp.status());
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!("⚠️ Webhook {name} failed: {e}"),
                }
            }));
        }

        futures::future::join_all(requests).await;
    }
}
