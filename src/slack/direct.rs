//! Opening (or reusing) direct-message channels

use crate::directory::{DirectMessageLink, DirectoryCache};
use crate::error::{Result, SlackBotError};
use crate::slack::{ApiParams, ControlApi};
use serde_json::Value;
use std::sync::Arc;

const OPEN_METHOD: &str = "im.open";

/// Returns the direct-message channel for a user, opening it at most once
///
/// A link already present in the cache is reused without any network call.
/// Otherwise `im.open` is called and the returned channel is recorded before
/// the id is handed back, so every later send to that user reuses it.
/// Two concurrent opens for the same user may both reach the API; the platform
/// answers both with the same channel and the last recorded link wins.
pub struct DirectMessageOpener {
    api: Arc<dyn ControlApi>,
    cache: Arc<DirectoryCache>,
}

impl DirectMessageOpener {
    pub fn new(api: Arc<dyn ControlApi>, cache: Arc<DirectoryCache>) -> Self {
        Self { api, cache }
    }

    pub async fn open_for(&self, user_id: &str) -> Result<String> {
        if let Some(link) = self.cache.find_link(user_id).await? {
            tracing::trace!(
                user_id = %user_id,
                channel_id = %link.channel_id,
                "Reusing direct-message channel"
            );
            return Ok(link.channel_id);
        }

        tracing::debug!(user_id = %user_id, "Opening direct-message channel");

        let mut params = ApiParams::new();
        params.insert("user".to_string(), Value::String(user_id.to_string()));

        let response = self.api.call(OPEN_METHOD, params).await?;
        let channel_id = opened_channel_id(&response)?;

        self.cache
            .record_link(DirectMessageLink::new(user_id, channel_id.clone()))
            .await;

        Ok(channel_id)
    }
}

/// `channel` is usually an object carrying `id`, but a bare id string is accepted too
fn opened_channel_id(response: &Value) -> Result<String> {
    let channel = response.get("channel");

    channel
        .and_then(Value::as_str)
        .or_else(|| channel.and_then(|c| c.get("id")).and_then(Value::as_str))
        .map(str::to_string)
        .ok_or_else(|| SlackBotError::malformed(OPEN_METHOD, "missing `channel.id`"))
}
