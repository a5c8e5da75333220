//! Directory entry types shared by the cache, the resolver and the router

use crate::error::{Result, SlackBotError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Kind of a name-addressable directory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Channel,
    Group,
    User,
}

impl EntryKind {
    /// Search order used whenever a bare name could refer to more than one kind
    pub const PRECEDENCE: [EntryKind; 3] = [EntryKind::Channel, EntryKind::Group, EntryKind::User];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Channel => "channel",
            EntryKind::Group => "group",
            EntryKind::User => "user",
        }
    }

    pub fn collection(&self) -> CollectionKind {
        match self {
            EntryKind::Channel => CollectionKind::Channels,
            EntryKind::Group => CollectionKind::Groups,
            EntryKind::User => CollectionKind::Users,
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The four collections held by the directory cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    Channels,
    Groups,
    Users,
    DirectMessages,
}

impl CollectionKind {
    pub const ALL: [CollectionKind; 4] = [
        CollectionKind::Channels,
        CollectionKind::Groups,
        CollectionKind::Users,
        CollectionKind::DirectMessages,
    ];

    /// Control API method that lists this collection
    pub fn list_method(&self) -> &'static str {
        match self {
            CollectionKind::Channels => "channels.list",
            CollectionKind::Groups => "groups.list",
            CollectionKind::Users => "users.list",
            CollectionKind::DirectMessages => "im.list",
        }
    }

    /// Key under which list responses carry their entries
    pub fn list_key(&self) -> &'static str {
        match self {
            CollectionKind::Channels => "channels",
            CollectionKind::Groups => "groups",
            CollectionKind::Users => "members",
            CollectionKind::DirectMessages => "ims",
        }
    }

    /// Key under which the bootstrap snapshot carries this collection
    pub fn snapshot_key(&self) -> &'static str {
        match self {
            CollectionKind::Channels => "channels",
            CollectionKind::Groups => "groups",
            CollectionKind::Users => "users",
            CollectionKind::DirectMessages => "ims",
        }
    }
}

/// A channel, private group or user as listed by the control API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    /// Opaque identifier (e.g., C024BE91L, G024BE91L, U024BE7LH)
    pub id: String,

    /// Name without sigil (e.g., "general", "alice")
    pub name: String,

    pub details: EntryDetails,
}

/// Kind-specific attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntryDetails {
    Channel {
        is_archived: bool,
        is_member: bool,
        topic: Option<String>,
    },
    Group {
        is_archived: bool,
        topic: Option<String>,
    },
    User {
        real_name: Option<String>,
        display_name: Option<String>,
        email: Option<String>,
        is_bot: bool,
        deleted: bool,
    },
}

impl DirectoryEntry {
    /// Minimal entry with default attributes for the given kind
    pub fn new(kind: EntryKind, id: impl Into<String>, name: impl Into<String>) -> Self {
        let details = match kind {
            EntryKind::Channel => EntryDetails::Channel {
                is_archived: false,
                is_member: false,
                topic: None,
            },
            EntryKind::Group => EntryDetails::Group {
                is_archived: false,
                topic: None,
            },
            EntryKind::User => EntryDetails::User {
                real_name: None,
                display_name: None,
                email: None,
                is_bot: false,
                deleted: false,
            },
        };

        Self {
            id: id.into(),
            name: name.into(),
            details,
        }
    }

    pub fn kind(&self) -> EntryKind {
        match self.details {
            EntryDetails::Channel { .. } => EntryKind::Channel,
            EntryDetails::Group { .. } => EntryKind::Group,
            EntryDetails::User { .. } => EntryKind::User,
        }
    }

    pub fn email(&self) -> Option<&str> {
        match &self.details {
            EntryDetails::User { email, .. } => email.as_deref(),
            _ => None,
        }
    }

    /// Name with the conventional sigil (`#general`, `@alice`)
    pub fn display_name(&self) -> String {
        match self.kind() {
            EntryKind::Channel | EntryKind::Group => format!("#{}", self.name),
            EntryKind::User => format!("@{}", self.name),
        }
    }

    /// Parse one listed object. `id` and `name` are mandatory.
    pub fn from_json(kind: EntryKind, value: &Value, method: &str) -> Result<Self> {
        let id = required_str(value, "id", method)?;
        let name = required_str(value, "name", method)?;

        let details = match kind {
            EntryKind::Channel => EntryDetails::Channel {
                is_archived: flag(value, "is_archived"),
                is_member: flag(value, "is_member"),
                topic: topic(value),
            },
            EntryKind::Group => EntryDetails::Group {
                is_archived: flag(value, "is_archived"),
                topic: topic(value),
            },
            EntryKind::User => {
                let profile = value.get("profile");
                EntryDetails::User {
                    real_name: optional_str(value, "real_name")
                        .or_else(|| profile.and_then(|p| optional_str(p, "real_name"))),
                    display_name: profile
                        .and_then(|p| optional_str(p, "display_name"))
                        .filter(|s| !s.is_empty()),
                    email: profile.and_then(|p| optional_str(p, "email")),
                    is_bot: flag(value, "is_bot"),
                    deleted: flag(value, "deleted"),
                }
            }
        };

        Ok(Self { id, name, details })
    }
}

/// Pairs a user with the direct-message channel opened for them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectMessageLink {
    pub user_id: String,
    pub channel_id: String,
}

impl DirectMessageLink {
    pub fn new(user_id: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            channel_id: channel_id.into(),
        }
    }

    /// Parse one `im` object (`{"id": "D…", "user": "U…"}`)
    pub fn from_json(value: &Value, method: &str) -> Result<Self> {
        Ok(Self {
            channel_id: required_str(value, "id", method)?,
            user_id: required_str(value, "user", method)?,
        })
    }
}

/// Parse an array of listed objects into entries of one kind
pub fn parse_entries(kind: EntryKind, value: &Value, method: &str) -> Result<Vec<DirectoryEntry>> {
    as_array(value, method)?
        .iter()
        .map(|item| DirectoryEntry::from_json(kind, item, method))
        .collect()
}

/// Parse an array of `im` objects into direct-message links
pub fn parse_links(value: &Value, method: &str) -> Result<Vec<DirectMessageLink>> {
    as_array(value, method)?
        .iter()
        .map(|item| DirectMessageLink::from_json(item, method))
        .collect()
}

fn as_array<'a>(value: &'a Value, method: &str) -> Result<&'a Vec<Value>> {
    value
        .as_array()
        .ok_or_else(|| SlackBotError::malformed(method, "expected an array of entries"))
}

fn required_str(value: &Value, field: &str, method: &str) -> Result<String> {
    value
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| SlackBotError::malformed(method, format!("entry is missing `{field}`")))
}

fn optional_str(value: &Value, field: &str) -> Option<String> {
    value.get(field).and_then(Value::as_str).map(str::to_string)
}

fn flag(value: &Value, field: &str) -> bool {
    value.get(field).and_then(Value::as_bool).unwrap_or(false)
}

fn topic(value: &Value) -> Option<String> {
    value
        .get("topic")
        .and_then(|t| t.get("value"))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
