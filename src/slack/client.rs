use crate::config::SlackConfig;
use crate::error::{Result, SlackBotError};
use crate::logging::Timer;
use crate::slack::{Delivery, PostOptions};
use async_trait::async_trait;
use slack_morphism::prelude::*;
use std::sync::Arc;

/// Outbound send primitive used once a target id is known
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Post to a channel, group, direct-message channel or user id
    async fn post(&self, target: &str, text: &str, options: &PostOptions) -> Result<Delivery>;

    /// Post a message only `user` can see in `channel`
    async fn post_ephemeral(
        &self,
        channel: &str,
        user: &str,
        text: &str,
        options: &PostOptions,
    ) -> Result<Delivery>;

    /// Replace the text of an existing message
    async fn update(
        &self,
        channel: &str,
        ts: &str,
        text: &str,
        options: &PostOptions,
    ) -> Result<Delivery>;
}

pub struct SlackClient {
    client: Arc<SlackHyperClient>,
    token: SlackApiToken,
}

impl SlackClient {
    pub fn new(config: &SlackConfig) -> Result<Self> {
        let connector = SlackClientHyperConnector::new()
            .map_err(|e| SlackBotError::transport("connect", e))?
            .with_slack_api_url(config.api_base_url.trim_end_matches('/'));

        let client = Arc::new(slack_morphism::SlackClient::new(connector));
        let token = SlackApiToken::new(config.bot_token.clone().into());

        Ok(Self { client, token })
    }
}

#[async_trait]
impl MessageSender for SlackClient {
    async fn post(&self, target: &str, text: &str, options: &PostOptions) -> Result<Delivery> {
        let _timer = Timer::new("slack_api.chat.postMessage");
        let session = self.client.open_session(&self.token);

        let mut request = SlackApiChatPostMessageRequest::new(
            target.into(),
            SlackMessageContent::new().with_text(text.into()),
        );

        request.username = options.username.clone();
        request.icon_emoji = options.icon_emoji.clone();
        request.icon_url = options.icon_url.clone();
        request.as_user = options.as_user;
        request.link_names = options.link_names;
        request.unfurl_links = options.unfurl_links;
        request.unfurl_media = options.unfurl_media;
        if let Some(ts) = &options.thread_ts {
            request.thread_ts = Some(ts.as_str().into());
        }

        let response = session
            .chat_post_message(&request)
            .await
            .map_err(|e| SlackBotError::transport("chat.postMessage", e))?;

        tracing::debug!(channel = %response.channel, ts = %response.ts, "Posted message");

        Ok(Delivery {
            channel: response.channel.to_string(),
            ts: Some(response.ts.to_string()),
        })
    }

    async fn post_ephemeral(
        &self,
        channel: &str,
        user: &str,
        text: &str,
        options: &PostOptions,
    ) -> Result<Delivery> {
        let _timer = Timer::new("slack_api.chat.postEphemeral");
        let session = self.client.open_session(&self.token);

        let mut request = SlackApiChatPostEphemeralRequest::new(
            channel.into(),
            SlackUserId(user.to_string()),
            SlackMessageContent::new().with_text(text.into()),
        );

        request.username = options.username.clone();
        request.icon_emoji = options.icon_emoji.clone();
        request.icon_url = options.icon_url.clone();
        request.as_user = options.as_user;
        request.link_names = options.link_names;
        if let Some(ts) = &options.thread_ts {
            request.thread_ts = Some(ts.as_str().into());
        }

        session
            .chat_post_ephemeral(&request)
            .await
            .map_err(|e| SlackBotError::transport("chat.postEphemeral", e))?;

        Ok(Delivery {
            channel: channel.to_string(),
            ts: None,
        })
    }

    async fn update(
        &self,
        channel: &str,
        ts: &str,
        text: &str,
        options: &PostOptions,
    ) -> Result<Delivery> {
        let _timer = Timer::new("slack_api.chat.update");
        let session = self.client.open_session(&self.token);

        let request = update_request(channel, ts, text, options);
        let response = session
            .chat_update(&request)
            .await
            .map_err(|e| SlackBotError::transport("chat.update", e))?;

        Ok(Delivery {
            channel: response.channel.to_string(),
            ts: Some(response.ts.to_string()),
        })
    }
}

fn update_request(
    channel: &str,
    ts: &str,
    text: &str,
    options: &PostOptions,
) -> SlackApiChatUpdateRequest {
    let mut request = SlackApiChatUpdateRequest::new(
        channel.into(),
        SlackMessageContent::new().with_text(text.into()),
        ts.into(),
    );
    request.as_user = options.as_user;
    request.link_names = options.link_names;
    request
}
