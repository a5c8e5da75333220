//! Real-time event stream over WebSocket

use crate::error::{Result, SlackBotError};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, interval_at};
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Lifecycle and payload events reported by a stream transport
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Open,
    Message(Value),
    Close { reason: Option<String> },
}

/// Connects to a stream endpoint and reports its events
///
/// `connect` returns once the connection attempt is under way. Everything
/// after that, including a failed handshake, is reported through `events`,
/// ending with exactly one [`StreamEvent::Close`].
#[async_trait]
pub trait StreamTransport: Send + Sync {
    async fn connect(&self, url: &str, events: mpsc::UnboundedSender<StreamEvent>) -> Result<()>;
}

pub struct WsStreamTransport {
    ping_interval: Option<Duration>,
}

impl WsStreamTransport {
    /// `ping_interval` of `None` disables the heartbeat
    pub fn new(ping_interval: Option<Duration>) -> Self {
        Self { ping_interval }
    }
}

#[async_trait]
impl StreamTransport for WsStreamTransport {
    async fn connect(&self, url: &str, events: mpsc::UnboundedSender<StreamEvent>) -> Result<()> {
        let parsed = url::Url::parse(url)
            .map_err(|e| SlackBotError::transport("stream.connect", format!("{url}: {e}")))?;
        if !matches!(parsed.scheme(), "ws" | "wss") {
            return Err(SlackBotError::transport(
                "stream.connect",
                format!("unsupported scheme {}", parsed.scheme()),
            ));
        }

        tokio::spawn(run_stream(url.to_string(), self.ping_interval, events));
        Ok(())
    }
}

async fn run_stream(
    url: String,
    ping_interval: Option<Duration>,
    events: mpsc::UnboundedSender<StreamEvent>,
) {
    let reason = match stream_frames(&url, ping_interval, &events).await {
        Ok(()) => {
            tracing::info!("Stream closed by server");
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, "Stream ended with error");
            Some(e.to_string())
        }
    };

    let _ = events.send(StreamEvent::Close { reason });
}

async fn stream_frames(
    url: &str,
    ping_interval: Option<Duration>,
    events: &mpsc::UnboundedSender<StreamEvent>,
) -> Result<()> {
    tracing::info!("Connecting to real-time stream");

    let (ws_stream, _response) = connect_async(url)
        .await
        .map_err(|e| SlackBotError::transport("stream.connect", e))?;
    let (mut ws_sink, mut ws_reader) = ws_stream.split();

    tracing::info!("Stream connected");
    let _ = events.send(StreamEvent::Open);

    let mut heartbeat = ping_interval.map(|every| interval_at(Instant::now() + every, every));
    let mut ping_id: u64 = 0;

    loop {
        tokio::select! {
            frame = ws_reader.next() => match frame {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<Value>(&text) {
                    Ok(payload) => {
                        let _ = events.send(StreamEvent::Message(payload));
                    }
                    Err(e) => tracing::warn!(error = %e, "Dropping unparseable stream frame"),
                },
                Some(Ok(Message::Ping(data))) => {
                    ws_sink
                        .send(Message::Pong(data))
                        .await
                        .map_err(|e| SlackBotError::transport("stream.pong", e))?;
                }
                Some(Ok(Message::Close(_))) | None => return Ok(()),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(SlackBotError::transport("stream.read", e)),
            },
            _ = next_tick(&mut heartbeat) => {
                ping_id += 1;
                let ping = heartbeat_frame(ping_id);
                tracing::trace!(id = ping_id, "Sending stream heartbeat");
                ws_sink
                    .send(Message::Text(ping.into()))
                    .await
                    .map_err(|e| SlackBotError::transport("stream.ping", e))?;
            }
        }
    }
}

async fn next_tick(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

fn heartbeat_frame(id: u64) -> String {
    json!({ "type": "ping", "id": id }).to_string()
}
