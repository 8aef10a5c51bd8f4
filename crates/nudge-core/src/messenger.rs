//! Messaging-session seam — the chat-transport collaborator boundary.
//!
//! The engine only needs two capabilities from whatever chat session it is
//! plugged into: open a direct channel to a recipient, and send text to a
//! named channel. Both are fallible and report the error to the caller.

use async_trait::async_trait;

use crate::error::Result;

/// Capabilities required from the chat-session transport.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Open (or look up) a direct channel to `user_id` and return its
    /// channel id.
    async fn open_direct(&self, user_id: &str) -> Result<String>;

    /// Send `text` to a named channel.
    async fn send(&self, channel_id: &str, text: &str) -> Result<()>;
}
