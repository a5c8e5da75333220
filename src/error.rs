use crate::directory::EntryKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SlackBotError {
    /// The control API could not be reached or answered `ok: false`.
    #[error("Slack API call {method} failed: {message}")]
    Transport { method: String, message: String },

    /// No entry with that name (or id) exists in the searched collections.
    #[error("{} not found: {name}", kind_label(.kind))]
    NotFound {
        kind: Option<EntryKind>,
        name: String,
    },

    /// The control API answered with data we cannot interpret.
    #[error("Malformed response from {method}: {reason}")]
    MalformedResponse { method: String, reason: String },

    #[error("Session error: {0}")]
    Session(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl SlackBotError {
    pub fn transport(method: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Transport {
            method: method.into(),
            message: message.to_string(),
        }
    }

    pub fn malformed(method: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            method: method.into(),
            reason: reason.into(),
        }
    }

    pub fn not_found(kind: Option<EntryKind>, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// Only transport failures are worth retrying; everything else will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        self.is_transport()
    }
}

fn kind_label(kind: &Option<EntryKind>) -> &'static str {
    kind.map(|k| k.as_str()).unwrap_or("target")
}

pub type Result<T> = std::result::Result<T, SlackBotError>;
