//! Console messenger — prints deliveries to stdout.
//! Lets the engine run locally without a chat transport wired in.

use async_trait::async_trait;

use nudge_core::Messenger;
use nudge_core::error::Result;

/// Writes every delivery to stdout. Direct channels are synthesized as
/// `dm:<user_id>`.
#[derive(Debug, Default)]
pub struct ConsoleMessenger;

impl ConsoleMessenger {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Messenger for ConsoleMessenger {
    async fn open_direct(&self, user_id: &str) -> Result<String> {
        Ok(format!("dm:{user_id}"))
    }

    async fn send(&self, channel_id: &str, text: &str) -> Result<()> {
        println!("[{channel_id}] {text}");
        tracing::debug!("📤 Console message sent to {channel_id}");
        Ok(())
    }
}
