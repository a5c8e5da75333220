//! Control API transport: method-name RPC over HTTPS

use crate::error::{Result, SlackBotError};
use crate::logging::Timer;
use async_trait::async_trait;
use serde_json::{Map, Value};
use url::Url;

/// Parameters of a control API call
pub type ApiParams = Map<String, Value>;

pub const DEFAULT_API_BASE_URL: &str = "https://slack.com/api/";

/// Request/response primitive for the control API
///
/// Implementations return the decoded payload of a successful call. A call the
/// platform rejected (`ok: false`) or that never got an answer is a
/// [`SlackBotError::Transport`].
#[async_trait]
pub trait ControlApi: Send + Sync {
    async fn call(&self, method: &str, params: ApiParams) -> Result<Value>;
}

pub struct HttpControlApi {
    http: reqwest::Client,
    base_url: Url,
    token: String,
}

impl HttpControlApi {
    pub fn new(token: impl Into<String>, base_url: &str) -> Result<Self> {
        let mut base = base_url.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|e| SlackBotError::Config(format!("Invalid API base URL {base}: {e}")))?;

        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
            token: token.into(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

#[async_trait]
impl ControlApi for HttpControlApi {
    async fn call(&self, method: &str, params: ApiParams) -> Result<Value> {
        let _timer = Timer::new(format!("slack_api.{method}"));

        let url = self
            .base_url
            .join(method)
            .map_err(|e| SlackBotError::transport(method, e))?;
        let form = encode_params(params, &self.token);

        tracing::debug!(method = %method, params = form.len() - 1, "Calling Slack API");

        let response = self
            .http
            .post(url)
            .form(&form)
            .send()
            .await
            .map_err(|e| SlackBotError::transport(method, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SlackBotError::transport(method, format!("HTTP {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SlackBotError::transport(method, e))?;

        parse_response(method, &body)
    }
}

/// Flatten parameters into form fields and append the token
///
/// Strings, numbers and booleans are sent in their plain form, objects and
/// arrays as JSON text. Nulls are dropped.
pub fn encode_params(params: ApiParams, token: &str) -> Vec<(String, String)> {
    let mut form: Vec<(String, String)> = params
        .into_iter()
        .filter_map(|(key, value)| {
            let encoded = match value {
                Value::Null => return None,
                Value::String(s) => s,
                Value::Bool(b) => b.to_string(),
                Value::Number(n) => n.to_string(),
                other => other.to_string(),
            };
            Some((key, encoded))
        })
        .collect();

    form.retain(|(key, _)| key != "token");
    form.push(("token".to_string(), token.to_string()));
    form
}

/// Decode a control API body and check its `ok` flag
pub fn parse_response(method: &str, body: &str) -> Result<Value> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| SlackBotError::malformed(method, format!("body is not JSON: {e}")))?;

    match value.get("ok").and_then(Value::as_bool) {
        Some(true) => Ok(value),
        Some(false) => {
            let error = value
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown_error");
            tracing::warn!(method = %method, error = %error, "Slack API rejected call");
            Err(SlackBotError::transport(method, error))
        }
        None => Err(SlackBotError::malformed(method, "missing `ok` flag")),
    }
}
