//! Test doubles for the control API, the send primitive and the stream

use crate::error::{Result, SlackBotError};
use crate::slack::{
    ApiParams, ControlApi, Delivery, MessageSender, PostOptions, StreamEvent, StreamTransport,
};
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

/// Control API answering each method with a scripted payload
#[derive(Default)]
pub(crate) struct MockControlApi {
    responses: DashMap<String, std::result::Result<Value, String>>,
    calls: Mutex<Vec<(String, ApiParams)>>,
    delay: Option<Duration>,
}

impl MockControlApi {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_response(self, method: &str, response: Value) -> Self {
        self.set_response(method, response);
        self
    }

    pub(crate) fn with_failure(self, method: &str, error: &str) -> Self {
        self.responses
            .insert(method.to_string(), Err(error.to_string()));
        self
    }

    /// Sleep this long inside every call, to let concurrent callers overlap
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn set_response(&self, method: &str, response: Value) {
        self.responses.insert(method.to_string(), Ok(response));
    }

    pub(crate) fn call_count(&self, method: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m == method)
            .count()
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub(crate) fn calls(&self, method: &str) -> Vec<ApiParams> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, params)| params.clone())
            .collect()
    }
}

#[async_trait]
impl ControlApi for MockControlApi {
    async fn call(&self, method: &str, params: ApiParams) -> Result<Value> {
        self.calls
            .lock()
            .unwrap()
            .push((method.to_string(), params));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let response = self.responses.get(method).map(|r| r.value().clone());
        match response {
            Some(Ok(value)) => Ok(value),
            Some(Err(error)) => Err(SlackBotError::transport(method, error)),
            None => Err(SlackBotError::transport(method, "unknown_method")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SentMessage {
    pub target: String,
    /// Recipient of an ephemeral message
    pub user: Option<String>,
    pub text: String,
    pub options: PostOptions,
}

/// Send primitive that records every message
#[derive(Default)]
pub(crate) struct RecordingSender {
    sent: Mutex<Vec<SentMessage>>,
    next_ts: AtomicU64,
}

impl RecordingSender {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub(crate) fn targets(&self) -> Vec<String> {
        self.sent().into_iter().map(|m| m.target).collect()
    }

    fn record(&self, target: &str, user: Option<&str>, text: &str, options: &PostOptions) -> String {
        self.sent.lock().unwrap().push(SentMessage {
            target: target.to_string(),
            user: user.map(str::to_string),
            text: text.to_string(),
            options: options.clone(),
        });
        let n = self.next_ts.fetch_add(1, Ordering::SeqCst) + 1;
        format!("1700000000.{n:06}")
    }
}

#[async_trait]
impl MessageSender for RecordingSender {
    async fn post(&self, target: &str, text: &str, options: &PostOptions) -> Result<Delivery> {
        let ts = self.record(target, None, text, options);
        Ok(Delivery {
            channel: target.to_string(),
            ts: Some(ts),
        })
    }

    async fn post_ephemeral(
        &self,
        channel: &str,
        user: &str,
        text: &str,
        options: &PostOptions,
    ) -> Result<Delivery> {
        self.record(channel, Some(user), text, options);
        Ok(Delivery {
            channel: channel.to_string(),
            ts: None,
        })
    }

    async fn update(
        &self,
        channel: &str,
        ts: &str,
        text: &str,
        options: &PostOptions,
    ) -> Result<Delivery> {
        self.record(channel, None, text, options);
        Ok(Delivery {
            channel: channel.to_string(),
            ts: Some(ts.to_string()),
        })
    }
}

/// Stream transport replaying a fixed list of events on connect
pub(crate) struct ScriptedStream {
    script: Vec<StreamEvent>,
    connected: Mutex<Vec<String>>,
}

impl ScriptedStream {
    pub(crate) fn new(script: Vec<StreamEvent>) -> Self {
        Self {
            script,
            connected: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn connected_urls(&self) -> Vec<String> {
        self.connected.lock().unwrap().clone()
    }
}

#[async_trait]
impl StreamTransport for ScriptedStream {
    async fn connect(&self, url: &str, events: mpsc::UnboundedSender<StreamEvent>) -> Result<()> {
        self.connected.lock().unwrap().push(url.to_string());
        for event in &self.script {
            let _ = events.send(event.clone());
        }
        Ok(())
    }
}
