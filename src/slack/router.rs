//! Name-addressed message dispatch

use crate::directory::{DirectoryCache, DirectoryEntry, EntryKind, NameResolver, clean_name};
use crate::error::{Result, SlackBotError};
use crate::slack::{Delivery, DirectMessageOpener, MessageSender, PostOptions};
use std::sync::Arc;

/// Sends messages to channels, groups and users by name
///
/// Channels and groups are posted to by id. Users go through their
/// direct-message channel, which is opened on first use.
pub struct MessageRouter {
    cache: Arc<DirectoryCache>,
    resolver: NameResolver,
    opener: Arc<DirectMessageOpener>,
    sender: Arc<dyn MessageSender>,
    default_username: Option<String>,
}

impl MessageRouter {
    pub fn new(
        cache: Arc<DirectoryCache>,
        opener: Arc<DirectMessageOpener>,
        sender: Arc<dyn MessageSender>,
        default_username: Option<String>,
    ) -> Self {
        Self {
            resolver: NameResolver::new(cache.clone()),
            cache,
            opener,
            sender,
            default_username,
        }
    }

    /// Send to whatever `name` refers to
    ///
    /// All three entry collections are loaded together. When the name exists in
    /// more than one of them the channel wins over the group, and the group over
    /// the user.
    pub async fn send_to(&self, name: &str, text: &str, options: &PostOptions) -> Result<Delivery> {
        let name = clean_name(name);

        let (channels, groups, users) = tokio::try_join!(
            self.cache.get_collection(EntryKind::Channel),
            self.cache.get_collection(EntryKind::Group),
            self.cache.get_collection(EntryKind::User),
        )?;

        let target = [&channels, &groups, &users]
            .into_iter()
            .find_map(|collection| collection.find_by_name(name))
            .cloned()
            .ok_or_else(|| SlackBotError::not_found(None, name))?;

        tracing::debug!(name = %name, id = %target.id, kind = %target.kind(), "Routing message");

        self.deliver(&target, text, options).await
    }

    pub async fn post_to_channel(
        &self,
        name: &str,
        text: &str,
        options: &PostOptions,
    ) -> Result<Delivery> {
        self.post_to_kind(EntryKind::Channel, name, text, options)
            .await
    }

    pub async fn post_to_group(
        &self,
        name: &str,
        text: &str,
        options: &PostOptions,
    ) -> Result<Delivery> {
        self.post_to_kind(EntryKind::Group, name, text, options).await
    }

    pub async fn post_to_user(
        &self,
        name: &str,
        text: &str,
        options: &PostOptions,
    ) -> Result<Delivery> {
        self.post_to_kind(EntryKind::User, name, text, options).await
    }

    /// Post straight to a known channel, group or direct-message id
    pub async fn post_message(&self, id: &str, text: &str, options: &PostOptions) -> Result<Delivery> {
        self.sender.post(id, text, &self.with_defaults(options)).await
    }

    pub async fn post_ephemeral(
        &self,
        channel_id: &str,
        user_id: &str,
        text: &str,
        options: &PostOptions,
    ) -> Result<Delivery> {
        self.sender
            .post_ephemeral(channel_id, user_id, text, &self.with_defaults(options))
            .await
    }

    pub async fn update_message(
        &self,
        channel_id: &str,
        ts: &str,
        text: &str,
        options: &PostOptions,
    ) -> Result<Delivery> {
        self.sender
            .update(channel_id, ts, text, &self.with_defaults(options))
            .await
    }

    async fn post_to_kind(
        &self,
        kind: EntryKind,
        name: &str,
        text: &str,
        options: &PostOptions,
    ) -> Result<Delivery> {
        let target = self.resolver.find_entry(name, Some(kind)).await?;
        self.deliver(&target, text, options).await
    }

    async fn deliver(
        &self,
        target: &DirectoryEntry,
        text: &str,
        options: &PostOptions,
    ) -> Result<Delivery> {
        let options = self.with_defaults(options);

        let target_id = match target.kind() {
            EntryKind::Channel | EntryKind::Group => target.id.clone(),
            EntryKind::User if options.slackbot => target.id.clone(),
            EntryKind::User => self.opener.open_for(&target.id).await?,
        };

        self.sender.post(&target_id, text, &options).await
    }

    fn with_defaults(&self, options: &PostOptions) -> PostOptions {
        options.clone().or_username(self.default_username.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::DirectMessageLink;
    use crate::testing::{MockControlApi, RecordingSender};
    use serde_json::json;

    struct Fixture {
        api: Arc<MockControlApi>,
        cache: Arc<DirectoryCache>,
        sender: Arc<RecordingSender>,
        router: MessageRouter,
    }

    fn fixture(api: MockControlApi) -> Fixture {
        let api = Arc::new(api);
        let cache = Arc::new(DirectoryCache::new(api.clone()));
        let opener = Arc::new(DirectMessageOpener::new(api.clone(), cache.clone()));
        let sender = Arc::new(RecordingSender::new());
        let router = MessageRouter::new(
            cache.clone(),
            opener,
            sender.clone(),
            Some("bot".to_string()),
        );

        Fixture {
            api,
            cache,
            sender,
            router,
        }
    }

    fn shadowed_directory() -> MockControlApi {
        MockControlApi::new()
            .with_response(
                "channels.list",
                json!({ "ok": true, "channels": [{ "id": "C1", "name": "ops" }] }),
            )
            .with_response(
                "groups.list",
                json!({ "ok": true, "groups": [
                    { "id": "G1", "name": "ops" },
                    { "id": "G2", "name": "private" }
                ]}),
            )
            .with_response(
                "users.list",
                json!({ "ok": true, "members": [
                    { "id": "U1", "name": "ops" },
                    { "id": "U2", "name": "alice" }
                ]}),
            )
            .with_response("im.list", json!({ "ok": true, "ims": [] }))
            .with_response("im.open", json!({ "ok": true, "channel": { "id": "D2" } }))
    }

    #[tokio::test]
    async fn test_channel_shadows_group_and_user() {
        let f = fixture(shadowed_directory());

        let delivery = f.router.send_to("ops", "deploying", &PostOptions::new()).await.unwrap();

        assert_eq!(delivery.channel, "C1");
        assert_eq!(f.sender.targets(), vec!["C1".to_string()]);
        assert_eq!(f.api.call_count("im.open"), 0);
    }

    #[tokio::test]
    async fn test_group_posts_by_id() {
        let f = fixture(shadowed_directory());

        f.router.send_to("#private", "psst", &PostOptions::new()).await.unwrap();

        assert_eq!(f.sender.targets(), vec!["G2".to_string()]);
    }

    #[tokio::test]
    async fn test_user_goes_through_direct_message() {
        let f = fixture(shadowed_directory());

        f.router.send_to("@alice", "hi", &PostOptions::new()).await.unwrap();
        f.router.send_to("alice", "hi2", &PostOptions::new()).await.unwrap();

        assert_eq!(f.api.call_count("im.open"), 1);
        assert_eq!(f.sender.targets(), vec!["D2".to_string(), "D2".to_string()]);
        assert_eq!(f.sender.sent()[1].text, "hi2");
    }

    #[tokio::test]
    async fn test_slackbot_option_posts_to_user_id() {
        let f = fixture(shadowed_directory());

        f.router
            .post_to_user("alice", "psst", &PostOptions::new().via_slackbot())
            .await
            .unwrap();

        assert_eq!(f.sender.targets(), vec!["U2".to_string()]);
        assert_eq!(f.api.call_count("im.open"), 0);
    }

    #[tokio::test]
    async fn test_unknown_name_is_not_found() {
        let f = fixture(shadowed_directory());

        let err = f
            .router
            .send_to("nobody", "hello?", &PostOptions::new())
            .await
            .unwrap_err();

        assert!(matches!(err, SlackBotError::NotFound { kind: None, .. }));
        assert!(f.sender.sent().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_surfaces_as_transport() {
        let f = fixture(
            MockControlApi::new()
                .with_response("channels.list", json!({ "ok": true, "channels": [] }))
                .with_failure("groups.list", "invalid_auth")
                .with_response("users.list", json!({ "ok": true, "members": [] })),
        );

        let err = f
            .router
            .send_to("anything", "hi", &PostOptions::new())
            .await
            .unwrap_err();

        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_kind_specific_post_ignores_other_kinds() {
        let f = fixture(shadowed_directory());

        f.router.post_to_group("ops", "team", &PostOptions::new()).await.unwrap();
        f.router.post_to_user("ops", "you", &PostOptions::new()).await.unwrap();

        assert_eq!(f.sender.targets(), vec!["G1".to_string(), "D2".to_string()]);
        let err = f
            .router
            .post_to_channel("private", "nope", &PostOptions::new())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_default_username_is_applied() {
        let f = fixture(shadowed_directory());
        f.cache.set_links(vec![DirectMessageLink::new("U2", "D9")]).await;

        f.router.send_to("alice", "hi", &PostOptions::new()).await.unwrap();
        f.router
            .post_message("C1", "explicit", &PostOptions::new().with_username("deployer"))
            .await
            .unwrap();

        let sent = f.sender.sent();
        assert_eq!(sent[0].target, "D9");
        assert_eq!(sent[0].options.username.as_deref(), Some("bot"));
        assert_eq!(sent[1].options.username.as_deref(), Some("deployer"));
    }

    #[tokio::test]
    async fn test_ephemeral_and_update_pass_through() {
        let f = fixture(MockControlApi::new());

        let ephemeral = f
            .router
            .post_ephemeral("C1", "U1", "only you", &PostOptions::new())
            .await
            .unwrap();
        assert_eq!(ephemeral.ts, None);
        let delivery = f
            .router
            .update_message("C1", "1700000000.000100", "edited", &PostOptions::new())
            .await
            .unwrap();

        assert_eq!(delivery.ts.as_deref(), Some("1700000000.000100"));
        let sent = f.sender.sent();
        assert_eq!(sent[0].user.as_deref(), Some("U1"));
        assert_eq!(sent[1].text, "edited");
        assert_eq!(f.api.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_channel_name_sends_to_last_entry() {
        let f = fixture(
            MockControlApi::new()
                .with_response(
                    "channels.list",
                    json!({ "ok": true, "channels": [
                        { "id": "C1", "name": "dup" },
                        { "id": "C7", "name": "dup" }
                    ]}),
                )
                .with_response("groups.list", json!({ "ok": true, "groups": [] }))
                .with_response("users.list", json!({ "ok": true, "members": [] })),
        );

        let delivery = f.router.send_to("#dup", "hi", &PostOptions::new()).await.unwrap();

        assert_eq!(delivery.channel, "C7");
        assert_eq!(f.sender.targets(), vec!["C7".to_string()]);
    }
}
