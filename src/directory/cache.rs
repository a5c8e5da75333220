//! Directory cache with whole-collection population

use crate::directory::collection::Collection;
use crate::directory::types::{
    CollectionKind, DirectMessageLink, DirectoryEntry, EntryKind, parse_entries, parse_links,
};
use crate::error::{Result, SlackBotError};
use crate::slack::{ApiParams, ControlApi};
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Cache statistics for monitoring
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub fetches: u64,
    pub fetch_errors: u64,
    pub dm_opens: u64,
    pub dm_reuses: u64,
}

/// One fetch gate per collection; population of a kind is serialized behind it
#[derive(Default)]
struct FetchGates {
    channels: Mutex<()>,
    groups: Mutex<()>,
    users: Mutex<()>,
    direct_messages: Mutex<()>,
}

impl FetchGates {
    fn get(&self, kind: CollectionKind) -> &Mutex<()> {
        match kind {
            CollectionKind::Channels => &self.channels,
            CollectionKind::Groups => &self.groups,
            CollectionKind::Users => &self.users,
            CollectionKind::DirectMessages => &self.direct_messages,
        }
    }
}

/// Team directory: channels, groups, users and direct-message links
///
/// A collection is either absent (never populated) or holds a complete list
/// from a single fetch or snapshot. Nothing expires; once a collection is
/// populated it is served from memory for the lifetime of the cache.
///
/// Concurrent first reads of the same collection are coalesced: one caller
/// fetches, the others wait on that collection's gate and then read the stored
/// result. A failed fetch leaves the collection unpopulated so the next read
/// retries.
pub struct DirectoryCache {
    api: Arc<dyn ControlApi>,

    /// Populated entry collections; a missing key means unpopulated
    entries: DashMap<EntryKind, Arc<Collection<DirectoryEntry>>>,

    /// Direct-message links, `None` until populated
    links: RwLock<Option<Arc<Collection<DirectMessageLink>>>>,

    gates: FetchGates,

    stats: RwLock<CacheStats>,
}

impl DirectoryCache {
    pub fn new(api: Arc<dyn ControlApi>) -> Self {
        tracing::debug!("Creating directory cache");

        Self {
            api,
            entries: DashMap::new(),
            links: RwLock::new(None),
            gates: FetchGates::default(),
            stats: RwLock::new(CacheStats::default()),
        }
    }

    /// Get a channel, group or user collection, fetching it on first use
    pub async fn get_collection(&self, kind: EntryKind) -> Result<Arc<Collection<DirectoryEntry>>> {
        if let Some(collection) = self.cached_entries(kind) {
            self.stats.write().await.hits += 1;
            tracing::trace!(kind = %kind, entries = collection.len(), "Directory cache hit");
            return Ok(collection);
        }

        let _gate = self.gates.get(kind.collection()).lock().await;

        // Another caller may have populated it while we waited
        if let Some(collection) = self.cached_entries(kind) {
            self.stats.write().await.hits += 1;
            tracing::trace!(kind = %kind, "Directory collection populated while waiting");
            return Ok(collection);
        }

        self.stats.write().await.misses += 1;
        tracing::debug!(kind = %kind, "Directory cache miss, fetching from Slack API");

        let collection_kind = kind.collection();
        let payload = self.fetch(collection_kind).await?;
        let entries = parse_entries(kind, &payload, collection_kind.list_method())?;

        tracing::info!(kind = %kind, entries = entries.len(), "Fetched and cached collection");

        let collection = Arc::new(Collection::new(entries));
        self.entries.insert(kind, collection.clone());
        Ok(collection)
    }

    /// Get the direct-message link collection, fetching it on first use
    pub async fn get_links(&self) -> Result<Arc<Collection<DirectMessageLink>>> {
        if let Some(links) = self.links.read().await.clone() {
            self.stats.write().await.hits += 1;
            tracing::trace!(links = links.len(), "Direct-message link cache hit");
            return Ok(links);
        }

        let _gate = self.gates.get(CollectionKind::DirectMessages).lock().await;

        if let Some(links) = self.links.read().await.clone() {
            self.stats.write().await.hits += 1;
            return Ok(links);
        }

        self.stats.write().await.misses += 1;
        tracing::debug!("Direct-message link cache miss, fetching from Slack API");

        let payload = self.fetch(CollectionKind::DirectMessages).await?;
        let links = parse_links(&payload, CollectionKind::DirectMessages.list_method())?;

        tracing::info!(links = links.len(), "Fetched and cached direct-message links");

        let collection = Arc::new(Collection::new(links));
        *self.links.write().await = Some(collection.clone());
        Ok(collection)
    }

    /// Replace a collection wholesale (used when seeding from a snapshot)
    pub fn set_collection(&self, kind: EntryKind, entries: Vec<DirectoryEntry>) {
        tracing::debug!(kind = %kind, entries = entries.len(), "Seeding directory collection");
        self.entries.insert(kind, Arc::new(Collection::new(entries)));
    }

    /// Replace the direct-message link collection wholesale
    pub async fn set_links(&self, links: Vec<DirectMessageLink>) {
        tracing::debug!(links = links.len(), "Seeding direct-message links");
        *self.links.write().await = Some(Arc::new(Collection::new(links)));
    }

    /// Existing direct-message link for a user, if any
    pub async fn find_link(&self, user_id: &str) -> Result<Option<DirectMessageLink>> {
        let links = self.get_links().await?;
        let link = links.for_user(user_id).cloned();

        if link.is_some() {
            self.stats.write().await.dm_reuses += 1;
        }
        Ok(link)
    }

    /// Record a freshly opened direct-message channel
    ///
    /// The stored link replaces any previous link for the same user, so
    /// concurrent opens for one user converge on the last one recorded.
    pub async fn record_link(&self, link: DirectMessageLink) {
        tracing::info!(
            user_id = %link.user_id,
            channel_id = %link.channel_id,
            "Recorded direct-message link"
        );

        let mut guard = self.links.write().await;
        let updated = match guard.as_ref() {
            Some(existing) => existing.with_link(link),
            None => Collection::new(vec![link]),
        };
        *guard = Some(Arc::new(updated));
        drop(guard);

        self.stats.write().await.dm_opens += 1;
    }

    pub async fn is_populated(&self, kind: CollectionKind) -> bool {
        match kind {
            CollectionKind::Channels => self.entries.contains_key(&EntryKind::Channel),
            CollectionKind::Groups => self.entries.contains_key(&EntryKind::Group),
            CollectionKind::Users => self.entries.contains_key(&EntryKind::User),
            CollectionKind::DirectMessages => self.links.read().await.is_some(),
        }
    }

    /// Get cache statistics
    pub async fn get_stats(&self) -> CacheStats {
        self.stats.read().await.clone()
    }

    /// Number of cached items per collection (unpopulated collections count as zero)
    pub async fn cache_sizes(&self) -> (usize, usize, usize, usize) {
        let size = |kind: EntryKind| self.entries.get(&kind).map(|c| c.len()).unwrap_or(0);
        let links = self.links.read().await.as_ref().map(|c| c.len()).unwrap_or(0);

        (
            size(EntryKind::Channel),
            size(EntryKind::Group),
            size(EntryKind::User),
            links,
        )
    }

    /// Log cache statistics (for periodic monitoring)
    pub async fn log_stats(&self) {
        let stats = self.get_stats().await;
        let (channels, groups, users, links) = self.cache_sizes().await;

        let hit_rate = if stats.hits + stats.misses > 0 {
            (stats.hits as f32 / (stats.hits + stats.misses) as f32 * 100.0) as u32
        } else {
            0
        };

        tracing::info!(
            channels_cached = channels,
            groups_cached = groups,
            users_cached = users,
            links_cached = links,
            hit_rate = hit_rate,
            fetches = stats.fetches,
            fetch_errors = stats.fetch_errors,
            dm_opens = stats.dm_opens,
            dm_reuses = stats.dm_reuses,
            "Directory cache statistics"
        );
    }

    fn cached_entries(&self, kind: EntryKind) -> Option<Arc<Collection<DirectoryEntry>>> {
        self.entries.get(&kind).map(|c| Arc::clone(c.value()))
    }

    /// List one collection and return the array under its payload key
    async fn fetch(&self, kind: CollectionKind) -> Result<Value> {
        self.stats.write().await.fetches += 1;
        let method = kind.list_method();

        match self.api.call(method, ApiParams::new()).await {
            Ok(mut response) => response
                .get_mut(kind.list_key())
                .map(Value::take)
                .ok_or_else(|| {
                    SlackBotError::malformed(method, format!("missing `{}`", kind.list_key()))
                }),
            Err(e) => {
                self.stats.write().await.fetch_errors += 1;
                tracing::warn!(method = %method, error = %e, "Failed to fetch collection");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockControlApi;
    use futures::future::join_all;
    use serde_json::json;
    use std::time::Duration;

    fn channels_api() -> Arc<MockControlApi> {
        Arc::new(MockControlApi::new().with_response(
            "channels.list",
            json!({ "ok": true, "channels": [{ "id": "C1", "name": "general" }] }),
        ))
    }

    #[tokio::test]
    async fn test_get_collection_fetches_once() {
        let api = channels_api();
        let cache = DirectoryCache::new(api.clone());

        let first = cache.get_collection(EntryKind::Channel).await.unwrap();
        let second = cache.get_collection(EntryKind::Channel).await.unwrap();

        assert_eq!(api.call_count("channels.list"), 1);
        assert_eq!(first, second);
        assert_eq!(first.find_by_name("general").unwrap().id, "C1");

        let stats = cache.get_stats().await;
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
    }

    #[tokio::test]
    async fn test_concurrent_first_reads_are_coalesced() {
        let api = Arc::new(
            MockControlApi::new()
                .with_response(
                    "users.list",
                    json!({ "ok": true, "members": [{ "id": "U1", "name": "alice" }] }),
                )
                .with_delay(Duration::from_millis(20)),
        );
        let cache = Arc::new(DirectoryCache::new(api.clone()));

        let reads = (0..8).map(|_| {
            let cache = cache.clone();
            async move { cache.get_collection(EntryKind::User).await }
        });
        let results = join_all(reads).await;

        assert_eq!(api.call_count("users.list"), 1);
        for result in results {
            assert_eq!(result.unwrap().len(), 1);
        }
    }

    #[tokio::test]
    async fn test_set_collection_skips_fetch() {
        let api = channels_api();
        let cache = DirectoryCache::new(api.clone());

        cache.set_collection(
            EntryKind::Channel,
            vec![DirectoryEntry::new(EntryKind::Channel, "C9", "seeded")],
        );
        let collection = cache.get_collection(EntryKind::Channel).await.unwrap();

        assert_eq!(api.call_count("channels.list"), 0);
        assert_eq!(collection.find_by_name("seeded").unwrap().id, "C9");
        assert!(cache.is_populated(CollectionKind::Channels).await);
        assert!(!cache.is_populated(CollectionKind::Groups).await);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_retried() {
        let api = Arc::new(MockControlApi::new().with_failure("groups.list", "ratelimited"));
        let cache = DirectoryCache::new(api.clone());

        let err = cache.get_collection(EntryKind::Group).await.unwrap_err();
        assert!(err.is_transport());
        assert!(!cache.is_populated(CollectionKind::Groups).await);

        api.set_response(
            "groups.list",
            json!({ "ok": true, "groups": [{ "id": "G1", "name": "ops" }] }),
        );
        let groups = cache.get_collection(EntryKind::Group).await.unwrap();

        assert_eq!(groups.find_by_name("ops").unwrap().id, "G1");
        assert_eq!(api.call_count("groups.list"), 2);
        assert_eq!(cache.get_stats().await.fetch_errors, 1);
    }

    #[tokio::test]
    async fn test_missing_payload_key_is_malformed() {
        let api = Arc::new(MockControlApi::new().with_response("users.list", json!({ "ok": true })));
        let cache = DirectoryCache::new(api);

        let err = cache.get_collection(EntryKind::User).await.unwrap_err();

        assert!(matches!(err, SlackBotError::MalformedResponse { .. }));
        assert!(!cache.is_populated(CollectionKind::Users).await);
    }

    #[tokio::test]
    async fn test_record_link_upserts() {
        let api = Arc::new(MockControlApi::new());
        let cache = DirectoryCache::new(api.clone());
        cache.set_links(vec![DirectMessageLink::new("U1", "D1")]).await;

        cache.record_link(DirectMessageLink::new("U2", "D2")).await;
        cache.record_link(DirectMessageLink::new("U2", "D3")).await;

        let links = cache.get_links().await.unwrap();
        assert_eq!(links.len(), 2);
        assert_eq!(links.for_user("U2").unwrap().channel_id, "D3");
        assert_eq!(api.call_count("im.list"), 0);
        assert_eq!(cache.cache_sizes().await, (0, 0, 0, 2));
    }
}
