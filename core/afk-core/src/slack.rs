//! Slack Web API client.
//!
//! Only the three calls the agent needs are wrapped. Every call is a blocking
//! JSON POST with the user token; Slack reports failures in-band with
//! `"ok": false`, which is surfaced as [`SlackError::Api`].

use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

const DEFAULT_API_BASE_URL: &str = "https://slack.com/api";
const CONNECT_TIMEOUT_SECS: u64 = 10;
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum SlackError {
    #[error("Slack transport error: {0}")]
    Transport(String),

    #[error("Slack API error: {method}: {code}")]
    Api { method: String, code: String },

    #[error("Slack response malformed: {method}: {details}")]
    Malformed { method: String, details: String },
}

/// The remote messaging operations consumed by the transition engine.
pub trait SlackApi: Send + Sync {
    /// Sets the profile status. An expiration of 0 never expires.
    fn set_profile_status(&self, text: &str, emoji: &str, expiration: i64)
        -> Result<(), SlackError>;

    /// Posts a message and returns its timestamp, which Slack uses as message id.
    fn post_message(&self, channel: &str, text: &str) -> Result<String, SlackError>;

    fn add_reaction(&self, channel: &str, emoji: &str, message_id: &str)
        -> Result<(), SlackError>;
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    ts: Option<String>,
}

pub struct SlackClient {
    token: String,
    api_base_url: String,
    http_client: Client,
}

impl SlackClient {
    pub fn new(token: impl Into<String>) -> Result<Self, SlackError> {
        Self::with_base_url(token, DEFAULT_API_BASE_URL)
    }

    pub fn with_base_url(
        token: impl Into<String>,
        api_base_url: impl Into<String>,
    ) -> Result<Self, SlackError> {
        let http_client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|err| SlackError::Transport(err.to_string()))?;

        Ok(Self {
            token: token.into(),
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
            http_client,
        })
    }

    fn call(&self, method: &str, body: Value) -> Result<ApiResponse, SlackError> {
        let url = format!("{}/{}", self.api_base_url, method);
        tracing::debug!(method, "Calling Slack API");

        let response = self
            .http_client
            .post(url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .map_err(|err| SlackError::Transport(err.to_string()))?;

        let status = response.status();
        let payload = response
            .text()
            .map_err(|err| SlackError::Transport(err.to_string()))?;
        if !status.is_success() {
            return Err(SlackError::Transport(format!(
                "{} returned HTTP {}",
                method, status
            )));
        }

        parse_response(method, &payload)
    }
}

impl std::fmt::Debug for SlackClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackClient")
            .field("api_base_url", &self.api_base_url)
            .finish_non_exhaustive()
    }
}

impl SlackApi for SlackClient {
    fn set_profile_status(
        &self,
        text: &str,
        emoji: &str,
        expiration: i64,
    ) -> Result<(), SlackError> {
        self.call(
            "users.profile.set",
            json!({
                "profile": {
                    "status_text": text,
                    "status_emoji": emoji,
                    "status_expiration": expiration,
                }
            }),
        )
        .map(|_| ())
    }

    fn post_message(&self, channel: &str, text: &str) -> Result<String, SlackError> {
        let response = self.call(
            "chat.postMessage",
            json!({ "channel": channel, "text": text }),
        )?;
        response.ts.ok_or_else(|| SlackError::Malformed {
            method: "chat.postMessage".to_string(),
            details: "response has no ts".to_string(),
        })
    }

    fn add_reaction(
        &self,
        channel: &str,
        emoji: &str,
        message_id: &str,
    ) -> Result<(), SlackError> {
        self.call(
            "reactions.add",
            json!({
                "channel": channel,
                "name": emoji.trim_matches(':'),
                "timestamp": message_id,
            }),
        )
        .map(|_| ())
    }
}

fn parse_response(method: &str, payload: &str) -> Result<ApiResponse, SlackError> {
    let response: ApiResponse =
        serde_json::from_str(payload).map_err(|err| SlackError::Malformed {
            method: method.to_string(),
            details: err.to_string(),
        })?;

    if response.ok {
        Ok(response)
    } else {
        Err(SlackError::Api {
            method: method.to_string(),
            code: response
                .error
                .clone()
                .unwrap_or_else(|| "unknown_error".to_string()),
        })
    }
}
