//! Chat notification integration.
//!
//! Wraps the chat service's Web API (Slack-compatible) behind the
//! [`ChatNotifier`] trait. Whether notifications are live is decided once
//! at startup from configuration presence: [`chat_notifier`] hands back
//! either the real client or a no-op implementation, so workflow code never
//! re-checks the configuration.
//!
//! Chat failures are best-effort everywhere; callers log a warning and
//! carry on.

use serde::Deserialize;

use crate::core::config::ChatConfig;

/// Result type for chat operations.
pub type ChatResult<T> = Result<T, ChatError>;

/// Error types for chat operations. Never fatal to a workflow command.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("chat request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("chat API error: {0}")]
    Api(String),
}

/// Release announcement operations.
#[async_trait::async_trait]
pub trait ChatNotifier: Send + Sync {
    /// Whether this notifier actually talks to a service.
    fn enabled(&self) -> bool;

    /// Create (or reuse) a channel; returns the channel id.
    async fn create_channel(&self, name: &str) -> ChatResult<String>;

    /// Invite the members of a user group to a channel; returns the number
    /// of members invited.
    async fn invite(&self, channel: &str, group_id: &str) -> ChatResult<usize>;

    /// Set the channel topic and post the announcement text.
    async fn post_topic(&self, channel: &str, topic: &str, text: &str) -> ChatResult<()>;
}

/// Select the notifier implementation from configuration presence.
pub fn chat_notifier(config: Option<&ChatConfig>) -> Box<dyn ChatNotifier> {
    match config {
        Some(chat) => Box::new(SlackNotifier::new(chat.token.clone())),
        None => Box::new(NoopNotifier),
    }
}

/// Notifier used when the chat section is absent: every operation quietly
/// succeeds without side effects.
pub struct NoopNotifier;

#[async_trait::async_trait]
impl ChatNotifier for NoopNotifier {
    fn enabled(&self) -> bool {
        false
    }

    async fn create_channel(&self, _name: &str) -> ChatResult<String> {
        Ok(String::new())
    }

    async fn invite(&self, _channel: &str, _group_id: &str) -> ChatResult<usize> {
        Ok(0)
    }

    async fn post_topic(&self, _channel: &str, _topic: &str, _text: &str) -> ChatResult<()> {
        Ok(())
    }
}

/// Chat API client.
pub struct SlackNotifier {
    /// API token
    token: String,
    /// API root, overridable for tests
    api_root: String,
    /// HTTP client
    client: reqwest::Client,
}

/// Envelope every chat API response carries.
#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    rest: serde_json::Value,
}

impl SlackNotifier {
    /// Default API root of the chat service.
    pub const DEFAULT_API_ROOT: &'static str = "https://slack.com/api";

    /// Create a new notifier.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            api_root: Self::DEFAULT_API_ROOT.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Point the notifier at a different API root.
    #[must_use]
    pub fn with_api_root(mut self, root: impl Into<String>) -> Self {
        self.api_root = root.into().trim_end_matches('/').to_string();
        self
    }

    async fn call(
        &self,
        method: &str,
        payload: &serde_json::Value,
    ) -> ChatResult<serde_json::Value> {
        let url = format!("{}/{}", self.api_root, method);
        tracing::debug!(%url, "chat POST");

        let envelope: ApiEnvelope = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(payload)
            .send()
            .await?
            .json()
            .await?;

        if !envelope.ok {
            return Err(ChatError::Api(
                envelope.error.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }

        Ok(envelope.rest)
    }

    /// Resolve an existing channel id by name.
    async fn find_channel(&self, name: &str) -> ChatResult<Option<String>> {
        #[derive(Deserialize)]
        struct Channel {
            id: String,
            name: String,
        }

        let result = self
            .call("conversations.list", &serde_json::json!({ "limit": 1000 }))
            .await?;

        let channels: Vec<Channel> =
            serde_json::from_value(result.get("channels").cloned().unwrap_or_default())
                .unwrap_or_default();

        Ok(channels.into_iter().find(|c| c.name == name).map(|c| c.id))
    }
}

#[async_trait::async_trait]
impl ChatNotifier for SlackNotifier {
    fn enabled(&self) -> bool {
        true
    }

    async fn create_channel(&self, name: &str) -> ChatResult<String> {
        let result = self.call("conversations.create", &serde_json::json!({ "name": name })).await;

        match result {
            Ok(value) => Ok(value
                .pointer("/channel/id")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()),
            // A channel from a previous run is reused, not an error.
            Err(ChatError::Api(ref reason)) if reason == "name_taken" => self
                .find_channel(name)
                .await?
                .ok_or_else(|| ChatError::Api("name_taken".to_string())),
            Err(err) => Err(err),
        }
    }

    async fn invite(&self, channel: &str, group_id: &str) -> ChatResult<usize> {
        #[derive(Deserialize)]
        struct GroupUsers {
            users: Vec<String>,
        }

        let result = self
            .call("usergroups.users.list", &serde_json::json!({ "usergroup": group_id }))
            .await?;
        let group: GroupUsers = serde_json::from_value(result)
            .map_err(|e| ChatError::Api(format!("unexpected usergroup response: {e}")))?;

        if group.users.is_empty() {
            return Ok(0);
        }

        self.call(
            "conversations.invite",
            &serde_json::json!({ "channel": channel, "users": group.users.join(",") }),
        )
        .await?;

        Ok(group.users.len())
    }

    async fn post_topic(&self, channel: &str, topic: &str, text: &str) -> ChatResult<()> {
        self.call(
            "conversations.setTopic",
            &serde_json::json!({ "channel": channel, "topic": topic }),
        )
        .await?;

        self.call(
            "chat.postMessage",
            &serde_json::json!({ "channel": channel, "text": text }),
        )
        .await?;

        Ok(())
    }
}
