//! Bare-name resolution against the directory cache

use crate::directory::cache::DirectoryCache;
use crate::directory::collection::Collection;
use crate::directory::types::{DirectoryEntry, EntryKind};
use crate::error::{Result, SlackBotError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Identifier and kind a name resolved to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolved {
    pub id: String,
    pub kind: EntryKind,
}

impl From<&DirectoryEntry> for Resolved {
    fn from(entry: &DirectoryEntry) -> Self {
        Self {
            id: entry.id.clone(),
            kind: entry.kind(),
        }
    }
}

/// Strip one leading `#` or `@`. A sigil anywhere else is part of the name.
pub fn clean_name(name: &str) -> &str {
    name.strip_prefix(['#', '@']).unwrap_or(name)
}

/// Turns bare names (and ids) into directory entries
///
/// Without an explicit kind the collections are searched in
/// [`EntryKind::PRECEDENCE`] order and the first collection with a match wins.
/// Collections are only fetched when the search reaches them, and `NotFound`
/// is reported only after every searched collection was read successfully.
#[derive(Clone)]
pub struct NameResolver {
    cache: Arc<DirectoryCache>,
}

impl NameResolver {
    pub fn new(cache: Arc<DirectoryCache>) -> Self {
        Self { cache }
    }

    pub async fn resolve(&self, name: &str) -> Result<Resolved> {
        self.find_entry(name, None).await.map(|entry| Resolved::from(&entry))
    }

    pub async fn resolve_kind(&self, name: &str, kind: EntryKind) -> Result<Resolved> {
        self.find_entry(name, Some(kind))
            .await
            .map(|entry| Resolved::from(&entry))
    }

    /// Find the entry a bare name refers to, optionally within one kind only
    pub async fn find_entry(&self, name: &str, kind: Option<EntryKind>) -> Result<DirectoryEntry> {
        let name = clean_name(name);

        let found = self
            .search(kind, |collection| collection.find_by_name(name).cloned())
            .await?;

        match found {
            Some(entry) => {
                tracing::debug!(name = %name, id = %entry.id, kind = %entry.kind(), "Resolved name");
                Ok(entry)
            }
            None => {
                tracing::debug!(name = %name, kind = ?kind, "Name not found in directory");
                Err(SlackBotError::not_found(kind, name))
            }
        }
    }

    /// Inverse lookup: the entry carrying this identifier
    pub async fn resolve_by_id(&self, id: &str) -> Result<DirectoryEntry> {
        self.search(None, |collection| collection.find_by_id(id).cloned())
            .await?
            .ok_or_else(|| SlackBotError::not_found(None, id))
    }

    /// User whose profile carries this email address
    pub async fn user_by_email(&self, email: &str) -> Result<DirectoryEntry> {
        self.search(Some(EntryKind::User), |collection| {
            collection.find_by_email(email).cloned()
        })
        .await?
        .ok_or_else(|| SlackBotError::not_found(Some(EntryKind::User), email))
    }

    async fn search<F>(&self, kind: Option<EntryKind>, find: F) -> Result<Option<DirectoryEntry>>
    where
        F: Fn(&Collection<DirectoryEntry>) -> Option<DirectoryEntry>,
    {
        let kinds: &[EntryKind] = match &kind {
            Some(kind) => std::slice::from_ref(kind),
            None => &EntryKind::PRECEDENCE,
        };

        for kind in kinds {
            let collection = self.cache.get_collection(*kind).await?;
            if let Some(entry) = find(collection.as_ref()) {
                return Ok(Some(entry));
            }
        }

        Ok(None)
    }
}
