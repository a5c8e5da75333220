use crate::error::{Result, SlackBotError};
use crate::slack::DEFAULT_API_BASE_URL;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Settings {
    pub slack: SlackConfig,
    pub stream: StreamConfig,
}

#[derive(Debug, Clone)]
pub struct SlackConfig {
    pub bot_token: String,
    /// Default `username` for outgoing messages
    pub bot_name: Option<String>,
    pub api_base_url: String,
}

#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Heartbeat interval in seconds, 0 disables it
    pub ping_interval_secs: u64,
    /// Start the session as soon as the bot is built
    pub auto_connect: bool,
}

impl StreamConfig {
    pub fn ping_interval(&self) -> Option<Duration> {
        (self.ping_interval_secs > 0).then(|| Duration::from_secs(self.ping_interval_secs))
    }
}

pub fn load_settings() -> Result<Settings> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    settings_from(|key| std::env::var(key).ok())
}

/// Build settings from any variable source (the process environment in production)
pub fn settings_from(var: impl Fn(&str) -> Option<String>) -> Result<Settings> {
    let slack = SlackConfig {
        bot_token: var("SLACK_BOT_TOKEN")
            .filter(|t| !t.is_empty())
            .ok_or_else(|| SlackBotError::Config("SLACK_BOT_TOKEN not set".to_string()))?,
        bot_name: var("SLACK_BOT_NAME").filter(|n| !n.is_empty()),
        api_base_url: var("SLACK_API_BASE_URL")
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
    };

    let stream = StreamConfig {
        ping_interval_secs: var("SLACK_PING_INTERVAL_SECS")
            .unwrap_or_else(|| "30".to_string())
            .parse()
            .map_err(|_| SlackBotError::Config("Invalid SLACK_PING_INTERVAL_SECS".to_string()))?,
        auto_connect: parse_bool(
            &var("SLACK_AUTO_CONNECT").unwrap_or_else(|| "true".to_string()),
        )
        .ok_or_else(|| SlackBotError::Config("Invalid SLACK_AUTO_CONNECT".to_string()))?,
    };

    Ok(Settings { slack, stream })
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
