//! Channel-subscription gate.
//!
//! When a channel is configured, paying requires membership. Any failure to
//! check counts as "not a member".

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use starshop_core::UserId;

/// Result of resolving the configured channel, for admins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateDiagnosis {
    /// Configured channel (`@name`).
    pub channel: String,
    /// Channel title, if the bot can see the channel.
    pub title: Option<String>,
    /// Why the channel could not be resolved.
    pub error: Option<String>,
}

/// Membership check.
#[async_trait]
pub trait SubscriptionGate: Send + Sync {
    /// The channel users must join.
    fn channel(&self) -> &str;

    /// Whether the user is a member. Errors count as `false`.
    async fn is_member(&self, user_id: UserId) -> bool;

    /// Resolve the channel to tell an admin whether the gate works.
    async fn diagnose(&self) -> GateDiagnosis;
}

#[derive(Debug, Deserialize)]
struct BotApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMember {
    status: String,
    #[serde(default)]
    is_member: bool,
}

#[derive(Debug, Deserialize)]
struct Chat {
    #[serde(default)]
    title: Option<String>,
}

/// Gate backed by the Telegram Bot API.
#[derive(Debug, Clone)]
pub struct TelegramGate {
    client: Client,
    api_url: String,
    bot_token: String,
    channel: String,
}

impl TelegramGate {
    const TIMEOUT: Duration = Duration::from_secs(10);

    /// Create a gate for `channel` (`@name`).
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        api_url: &str,
        bot_token: impl Into<String>,
        channel: impl Into<String>,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: Client::builder().timeout(Self::TIMEOUT).build()?,
            api_url: api_url.trim_end_matches('/').to_string(),
            bot_token: bot_token.into(),
            channel: channel.into(),
        })
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        query: &[(&str, String)],
    ) -> Result<T, String> {
        let response = self
            .client
            .get(format!("{}/bot{}/{method}", self.api_url, self.bot_token))
            .query(query)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let body: BotApiResponse<T> = response.json().await.map_err(|e| e.to_string())?;
        match body {
            BotApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            other => Err(other
                .description
                .unwrap_or_else(|| "no result".to_string())),
        }
    }
}

#[async_trait]
impl SubscriptionGate for TelegramGate {
    fn channel(&self) -> &str {
        &self.channel
    }

    async fn is_member(&self, user_id: UserId) -> bool {
        let query = [
            ("chat_id", self.channel.clone()),
            ("user_id", user_id.to_string()),
        ];
        match self.call::<ChatMember>("getChatMember", &query).await {
            Ok(member) => is_member_status(&member),
            Err(e) => {
                tracing::warn!(user_id = %user_id, channel = %self.channel, error = %e, "Membership check failed");
                false
            }
        }
    }

    async fn diagnose(&self) -> GateDiagnosis {
        let query = [("chat_id", self.channel.clone())];
        match self.call::<Chat>("getChat", &query).await {
            Ok(chat) => GateDiagnosis {
                channel: self.channel.clone(),
                title: chat.title,
                error: None,
            },
            Err(e) => GateDiagnosis {
                channel: self.channel.clone(),
                title: None,
                error: Some(e),
            },
        }
    }
}

fn is_member_status(member: &ChatMember) -> bool {
    match member.status.as_str() {
        "creator" | "administrator" | "member" => true,
        "restricted" => member.is_member,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn gate_with(member: serde_json::Value) -> (MockServer, TelegramGate) {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/botTOKEN/getChatMember"))
            .and(query_param("chat_id", "@news"))
            .respond_with(ResponseTemplate::new(200).set_body_json(member))
            .mount(&server)
            .await;
        let gate = TelegramGate::new(&server.uri(), "TOKEN", "@news").unwrap();
        (server, gate)
    }

    #[tokio::test]
    async fn members_pass() {
        let (_server, gate) = gate_with(json!({"ok": true, "result": {"status": "member"}})).await;
        assert!(gate.is_member(UserId::new(1)).await);
    }

    #[tokio::test]
    async fn restricted_needs_is_member() {
        let (_server, gate) =
            gate_with(json!({"ok": true, "result": {"status": "restricted", "is_member": false}}))
                .await;
        assert!(!gate.is_member(UserId::new(1)).await);
    }

    #[tokio::test]
    async fn errors_fail_closed() {
        let (_server, gate) =
            gate_with(json!({"ok": false, "description": "Bad Request: chat not found"})).await;
        assert!(!gate.is_member(UserId::new(1)).await);

        let unreachable = TelegramGate::new("http://127.0.0.1:9", "TOKEN", "@news").unwrap();
        assert!(!unreachable.is_member(UserId::new(1)).await);
    }

    #[tokio::test]
    async fn diagnose_reports_title_or_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/botTOKEN/getChat"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"ok": true, "result": {"id": -100, "title": "News"}})),
            )
            .mount(&server)
            .await;

        let gate = TelegramGate::new(&server.uri(), "TOKEN", "@news").unwrap();
        let diagnosis = gate.diagnose().await;
        assert_eq!(diagnosis.title.as_deref(), Some("News"));
        assert!(diagnosis.error.is_none());
    }
}
