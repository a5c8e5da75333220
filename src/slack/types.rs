use serde::{Deserialize, Serialize};

/// Per-message options passed through to the send primitive
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostOptions {
    /// Display name to post under
    pub username: Option<String>,
    pub icon_emoji: Option<String>,
    pub icon_url: Option<String>,
    pub as_user: Option<bool>,
    /// Reply inside this thread
    pub thread_ts: Option<String>,
    pub link_names: Option<bool>,
    pub unfurl_links: Option<bool>,
    pub unfurl_media: Option<bool>,

    /// Post user messages to the user id itself (shown in the Slackbot
    /// conversation) instead of opening a direct-message channel
    #[serde(default)]
    pub slackbot: bool,
}

impl PostOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_icon_emoji(mut self, emoji: impl Into<String>) -> Self {
        self.icon_emoji = Some(emoji.into());
        self
    }

    pub fn in_thread(mut self, thread_ts: impl Into<String>) -> Self {
        self.thread_ts = Some(thread_ts.into());
        self
    }

    pub fn via_slackbot(mut self) -> Self {
        self.slackbot = true;
        self
    }

    /// Fill `username` when the caller left it empty
    pub fn or_username(mut self, username: Option<&str>) -> Self {
        if self.username.is_none() {
            self.username = username.map(str::to_string);
        }
        self
    }
}

/// Where a message landed
///
/// Ephemeral posts are not stored by the platform and carry no `ts`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    pub channel: String,
    pub ts: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_or_username_keeps_explicit_name() {
        let options = PostOptions::new().with_username("deploy-bot").or_username(Some("bot"));
        assert_eq!(options.username.as_deref(), Some("deploy-bot"));

        let options = PostOptions::new().or_username(Some("bot"));
        assert_eq!(options.username.as_deref(), Some("bot"));

        let options = PostOptions::new().or_username(None);
        assert_eq!(options.username, None);
    }

    #[test]
    fn test_builder() {
        let options = PostOptions::new()
            .with_icon_emoji(":robot_face:")
            .in_thread("1700000000.000100")
            .via_slackbot();

        assert_eq!(options.icon_emoji.as_deref(), Some(":robot_face:"));
        assert_eq!(options.thread_ts.as_deref(), Some("1700000000.000100"));
        assert!(options.slackbot);
    }
}
