//! The bot: name-addressed messaging over a cached team directory

use crate::config::Settings;
use crate::directory::{
    CacheStats, Collection, DirectMessageLink, DirectoryCache, DirectoryEntry, EntryKind,
    NameResolver, Resolved,
};
use crate::error::Result;
use crate::session::{SelfIdentity, SessionBootstrap, SessionState, Snapshot, TeamInfo};
use crate::slack::{
    ControlApi, Delivery, DirectMessageOpener, HttpControlApi, MessageRouter, MessageSender,
    PostOptions, SlackClient, StreamEvent, StreamTransport, WsStreamTransport,
};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

/// A bot identity connected to one team
///
/// Building a bot does no I/O. Call [`SlackBot::start`] to authenticate and
/// open the event stream; name lookups and sends work before that too, they
/// simply fetch the collections they need on first use.
pub struct SlackBot {
    cache: Arc<DirectoryCache>,
    resolver: NameResolver,
    opener: Arc<DirectMessageOpener>,
    router: MessageRouter,
    session: SessionBootstrap,
}

impl SlackBot {
    pub fn new(
        api: Arc<dyn ControlApi>,
        sender: Arc<dyn MessageSender>,
        stream: Arc<dyn StreamTransport>,
        name: Option<String>,
    ) -> Self {
        let cache = Arc::new(DirectoryCache::new(api.clone()));
        let opener = Arc::new(DirectMessageOpener::new(api.clone(), cache.clone()));
        let router = MessageRouter::new(cache.clone(), opener.clone(), sender, name);
        let session = SessionBootstrap::new(api, cache.clone(), stream);

        Self {
            resolver: NameResolver::new(cache.clone()),
            cache,
            opener,
            router,
            session,
        }
    }

    /// Build a bot talking to the real platform
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let api = Arc::new(HttpControlApi::new(
            settings.slack.bot_token.clone(),
            &settings.slack.api_base_url,
        )?);
        let sender = Arc::new(SlackClient::new(&settings.slack)?);
        let stream = Arc::new(WsStreamTransport::new(settings.stream.ping_interval()));

        Ok(Self::new(api, sender, stream, settings.slack.bot_name.clone()))
    }

    pub async fn start(&self) -> Result<Snapshot> {
        self.session.start().await
    }

    pub async fn resolve(&self, name: &str) -> Result<Resolved> {
        self.resolver.resolve(name).await
    }

    pub async fn resolve_kind(&self, name: &str, kind: EntryKind) -> Result<Resolved> {
        self.resolver.resolve_kind(name, kind).await
    }

    pub async fn resolve_by_id(&self, id: &str) -> Result<DirectoryEntry> {
        self.resolver.resolve_by_id(id).await
    }

    pub async fn find_entry(&self, name: &str, kind: Option<EntryKind>) -> Result<DirectoryEntry> {
        self.resolver.find_entry(name, kind).await
    }

    pub async fn user_by_email(&self, email: &str) -> Result<DirectoryEntry> {
        self.resolver.user_by_email(email).await
    }

    pub async fn get_collection(&self, kind: EntryKind) -> Result<Arc<Collection<DirectoryEntry>>> {
        self.cache.get_collection(kind).await
    }

    pub async fn get_links(&self) -> Result<Arc<Collection<DirectMessageLink>>> {
        self.cache.get_links().await
    }

    pub async fn open_direct_message(&self, user_id: &str) -> Result<String> {
        self.opener.open_for(user_id).await
    }

    /// Send to a channel, group or user by name (channel wins over group, group over user)
    pub async fn send_to(&self, name: &str, text: &str, options: &PostOptions) -> Result<Delivery> {
        self.router.send_to(name, text, options).await
    }

    pub async fn post_to_channel(
        &self,
        name: &str,
        text: &str,
        options: &PostOptions,
    ) -> Result<Delivery> {
        self.router.post_to_channel(name, text, options).await
    }

    pub async fn post_to_group(
        &self,
        name: &str,
        text: &str,
        options: &PostOptions,
    ) -> Result<Delivery> {
        self.router.post_to_group(name, text, options).await
    }

    pub async fn post_to_user(
        &self,
        name: &str,
        text: &str,
        options: &PostOptions,
    ) -> Result<Delivery> {
        self.router.post_to_user(name, text, options).await
    }

    pub async fn post_message(&self, id: &str, text: &str, options: &PostOptions) -> Result<Delivery> {
        self.router.post_message(id, text, options).await
    }

    pub async fn post_ephemeral(
        &self,
        channel_id: &str,
        user_id: &str,
        text: &str,
        options: &PostOptions,
    ) -> Result<Delivery> {
        self.router
            .post_ephemeral(channel_id, user_id, text, options)
            .await
    }

    pub async fn update_message(
        &self,
        channel_id: &str,
        ts: &str,
        text: &str,
        options: &PostOptions,
    ) -> Result<Delivery> {
        self.router
            .update_message(channel_id, ts, text, options)
            .await
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.session.watch_state()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.session.subscribe()
    }

    pub fn self_identity(&self) -> Option<&SelfIdentity> {
        self.session
            .identity()
            .and_then(|identity| identity.self_identity.as_ref())
    }

    pub fn team(&self) -> Option<&TeamInfo> {
        self.session.identity().and_then(|identity| identity.team.as_ref())
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.get_stats().await
    }

    pub async fn log_cache_stats(&self) {
        self.cache.log_stats().await
    }
}
