//! Session bootstrap and lifecycle
//!
//! A session moves through `Unauthenticated -> Connected -> Streaming -> Closed`
//! and never goes back. [`SessionBootstrap::start`] performs the first step and
//! seeds the directory from the snapshot; the stream transport drives the rest.

use crate::directory::{
    CollectionKind, DirectMessageLink, DirectoryCache, DirectoryEntry, EntryKind, parse_entries,
    parse_links,
};
use crate::error::{Result, SlackBotError};
use crate::logging::log_error;
use crate::slack::{ApiParams, ControlApi, StreamEvent, StreamTransport};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::{broadcast, mpsc, watch};

const START_METHOD: &str = "rtm.start";
const EVENT_BUFFER: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Unauthenticated,
    Connected,
    Streaming,
    Closed,
}

/// Holds the session state and applies the allowed transitions
pub struct SessionStateMachine {
    state: watch::Sender<SessionState>,
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStateMachine {
    pub fn new() -> Self {
        let (state, _) = watch::channel(SessionState::Unauthenticated);
        Self { state }
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Unauthenticated -> Connected, after a successful bootstrap
    pub fn mark_connected(&self) -> Result<()> {
        let mut previous = SessionState::Unauthenticated;
        let changed = self.state.send_if_modified(|state| {
            previous = *state;
            if *state == SessionState::Unauthenticated {
                *state = SessionState::Connected;
                true
            } else {
                false
            }
        });

        if changed {
            tracing::info!("Session connected");
            Ok(())
        } else {
            Err(SlackBotError::Session(format!(
                "cannot connect a session that is {previous:?}"
            )))
        }
    }

    /// Apply a stream event and return the resulting state
    ///
    /// `Open` moves Connected to Streaming, `Close` moves any live session to
    /// Closed. Messages and out-of-order events leave the state untouched.
    pub fn apply(&self, event: &StreamEvent) -> SessionState {
        self.state.send_if_modified(|state| {
            let current = *state;
            let next = match (current, event) {
                (SessionState::Connected, StreamEvent::Open) => SessionState::Streaming,
                (SessionState::Connected | SessionState::Streaming, StreamEvent::Close { .. }) => {
                    SessionState::Closed
                }
                (_, StreamEvent::Message(_)) => return false,
                _ => {
                    tracing::warn!(state = ?current, event = ?event, "Ignoring stream event");
                    return false;
                }
            };

            tracing::info!(from = ?current, to = ?next, "Session state changed");
            *state = next;
            true
        });

        self.state()
    }
}

/// The bot's own identity as reported at bootstrap
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelfIdentity {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamInfo {
    pub id: String,
    pub name: String,
    pub domain: Option<String>,
}

/// Directory state and stream endpoint returned by the bootstrap call
///
/// Collections the platform left out stay `None`; the cache fetches them
/// lazily on first use.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub url: String,
    pub self_identity: Option<SelfIdentity>,
    pub team: Option<TeamInfo>,
    pub channels: Option<Vec<DirectoryEntry>>,
    pub groups: Option<Vec<DirectoryEntry>>,
    pub users: Option<Vec<DirectoryEntry>>,
    pub links: Option<Vec<DirectMessageLink>>,
}

impl Snapshot {
    pub fn from_response(response: &Value) -> Result<Self> {
        let url = response
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| SlackBotError::malformed(START_METHOD, "missing stream `url`"))?
            .to_string();

        let entries = |kind: EntryKind| -> Result<Option<Vec<DirectoryEntry>>> {
            match present(response, kind.collection()) {
                Some(value) => parse_entries(kind, value, START_METHOD).map(Some),
                None => Ok(None),
            }
        };

        let links = match present(response, CollectionKind::DirectMessages) {
            Some(value) => Some(parse_links(value, START_METHOD)?),
            None => None,
        };

        Ok(Self {
            url,
            self_identity: response.get("self").and_then(|s| {
                Some(SelfIdentity {
                    id: s.get("id")?.as_str()?.to_string(),
                    name: s.get("name")?.as_str()?.to_string(),
                })
            }),
            team: response.get("team").and_then(|t| {
                Some(TeamInfo {
                    id: t.get("id")?.as_str()?.to_string(),
                    name: t.get("name")?.as_str()?.to_string(),
                    domain: t.get("domain").and_then(Value::as_str).map(str::to_string),
                })
            }),
            channels: entries(EntryKind::Channel)?,
            groups: entries(EntryKind::Group)?,
            users: entries(EntryKind::User)?,
            links,
        })
    }

    /// Collections this snapshot carries
    pub fn included(&self) -> Vec<CollectionKind> {
        CollectionKind::ALL
            .into_iter()
            .filter(|kind| match kind {
                CollectionKind::Channels => self.channels.is_some(),
                CollectionKind::Groups => self.groups.is_some(),
                CollectionKind::Users => self.users.is_some(),
                CollectionKind::DirectMessages => self.links.is_some(),
            })
            .collect()
    }
}

fn present(response: &Value, kind: CollectionKind) -> Option<&Value> {
    response.get(kind.snapshot_key()).filter(|v| !v.is_null())
}

/// Bootstrap identity captured on a successful start
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    pub self_identity: Option<SelfIdentity>,
    pub team: Option<TeamInfo>,
}

/// Runs the one-time bootstrap and wires the stream into the session state
pub struct SessionBootstrap {
    api: Arc<dyn ControlApi>,
    cache: Arc<DirectoryCache>,
    stream: Arc<dyn StreamTransport>,
    state: Arc<SessionStateMachine>,
    events: broadcast::Sender<StreamEvent>,
    starting: AtomicBool,
    identity: OnceLock<SessionIdentity>,
}

impl SessionBootstrap {
    pub fn new(
        api: Arc<dyn ControlApi>,
        cache: Arc<DirectoryCache>,
        stream: Arc<dyn StreamTransport>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);

        Self {
            api,
            cache,
            stream,
            state: Arc::new(SessionStateMachine::new()),
            events,
            starting: AtomicBool::new(false),
            identity: OnceLock::new(),
        }
    }

    /// Authenticate, seed the directory and connect the stream
    ///
    /// On failure the session stays unauthenticated and `start` may be called
    /// again. A session that started once cannot be started a second time.
    pub async fn start(&self) -> Result<Snapshot> {
        if self
            .starting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SlackBotError::Session(format!(
                "session already started ({:?})",
                self.state.state()
            )));
        }

        match self.bootstrap().await {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => {
                if self.state.state() == SessionState::Unauthenticated {
                    self.starting.store(false, Ordering::Release);
                }
                log_error("session.start", &e);
                Err(e)
            }
        }
    }

    async fn bootstrap(&self) -> Result<Snapshot> {
        tracing::info!("Starting session");

        let response = self.api.call(START_METHOD, ApiParams::new()).await?;
        let snapshot = Snapshot::from_response(&response)?;

        // Events queue in the channel until the session is marked connected,
        // so a rejected endpoint leaves the session unauthenticated.
        let (tx, rx) = mpsc::unbounded_channel();
        self.stream.connect(&snapshot.url, tx).await?;

        self.seed(&snapshot).await;
        let _ = self.identity.set(SessionIdentity {
            self_identity: snapshot.self_identity.clone(),
            team: snapshot.team.clone(),
        });

        self.state.mark_connected()?;
        tokio::spawn(pump_events(rx, self.state.clone(), self.events.clone()));

        Ok(snapshot)
    }

    async fn seed(&self, snapshot: &Snapshot) {
        if let Some(channels) = &snapshot.channels {
            self.cache.set_collection(EntryKind::Channel, channels.clone());
        }
        if let Some(groups) = &snapshot.groups {
            self.cache.set_collection(EntryKind::Group, groups.clone());
        }
        if let Some(users) = &snapshot.users {
            self.cache.set_collection(EntryKind::User, users.clone());
        }
        if let Some(links) = &snapshot.links {
            self.cache.set_links(links.clone()).await;
        }

        tracing::info!(
            included = ?snapshot.included(),
            "Seeded directory from session snapshot"
        );
    }

    pub fn state(&self) -> SessionState {
        self.state.state()
    }

    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Stream events as they arrive; subscribe before `start` to see `Open`
    pub fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.events.subscribe()
    }

    pub fn identity(&self) -> Option<&SessionIdentity> {
        self.identity.get()
    }
}

async fn pump_events(
    mut rx: mpsc::UnboundedReceiver<StreamEvent>,
    state: Arc<SessionStateMachine>,
    events: broadcast::Sender<StreamEvent>,
) {
    while let Some(event) = rx.recv().await {
        let current = state.apply(&event);
        // No subscribers is fine
        let _ = events.send(event);

        if current == SessionState::Closed {
            break;
        }
    }
}
