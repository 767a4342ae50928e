// SPDX-FileCopyrightText: 2026 ConnectX Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed client for the chat REST read surface.

use std::time::Duration;

use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use tracing::debug;

use connectx_core::{Conversation, ConnectxError, EnrichedMessage, UserId};

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MarkReadBody<'a> {
    token: &'a str,
    sender_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct MarkReadReply {
    count: u64,
}

#[derive(Debug, Deserialize)]
struct StatusReply {
    status: String,
}

/// REST client bound to one session token.
#[derive(Debug, Clone)]
pub struct ChatApi {
    client: reqwest::Client,
    base: Url,
    token: String,
}

impl ChatApi {
    pub fn new(api_url: &str, token: impl Into<String>) -> Result<Self, ConnectxError> {
        let mut base = Url::parse(api_url)
            .map_err(|e| ConnectxError::Config(format!("invalid api_url {api_url}: {e}")))?;
        // Endpoints are joined relative to the base, which needs a trailing slash.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ConnectxError::Transport {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self {
            client,
            base,
            token: token.into(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ConnectxError> {
        self.base
            .join(path)
            .map_err(|e| ConnectxError::Config(format!("invalid endpoint {path}: {e}")))
    }

    /// Full history with `peer`, oldest first. Marks `peer`'s messages read.
    pub async fn history(&self, peer: &UserId) -> Result<Vec<EnrichedMessage>, ConnectxError> {
        let mut url = self.endpoint("chat/history")?;
        url.query_pairs_mut()
            .append_pair("token", &self.token)
            .append_pair("receiverId", peer.as_str());
        let response = self.client.get(url).send().await.map_err(request_failed)?;
        decode(response).await
    }

    pub async fn conversations(&self) -> Result<Vec<Conversation>, ConnectxError> {
        let mut url = self.endpoint("chat/conversations")?;
        url.query_pairs_mut().append_pair("token", &self.token);
        let response = self.client.get(url).send().await.map_err(request_failed)?;
        decode(response).await
    }

    /// Mark every unread message from `sender` as read. Returns how many changed.
    pub async fn mark_read(&self, sender: &UserId) -> Result<u64, ConnectxError> {
        let url = self.endpoint("chat/mark-read")?;
        let body = MarkReadBody {
            token: &self.token,
            sender_id: sender.as_str(),
        };
        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(request_failed)?;
        let reply: MarkReadReply = decode(response).await?;
        Ok(reply.count)
    }

    pub async fn status(&self) -> Result<String, ConnectxError> {
        let url = self.endpoint("chat/status")?;
        let response = self.client.get(url).send().await.map_err(request_failed)?;
        let reply: StatusReply = decode(response).await?;
        Ok(reply.status)
    }
}

fn request_failed(e: reqwest::Error) -> ConnectxError {
    ConnectxError::Transport {
        message: format!("HTTP request failed: {e}"),
        source: Some(Box::new(e)),
    }
}

async fn decode<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
) -> Result<T, ConnectxError> {
    let status = response.status();
    debug!(status = %status, url = %response.url().path(), "chat api response");
    if status.is_success() {
        return response.json::<T>().await.map_err(|e| ConnectxError::Transport {
            message: format!("malformed response body: {e}"),
            source: Some(Box::new(e)),
        });
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|e| e.message)
        .unwrap_or_else(|_| format!("server returned {status}"));
    Err(match status {
        StatusCode::UNAUTHORIZED => ConnectxError::Auth(message),
        StatusCode::FORBIDDEN => ConnectxError::Forbidden(message),
        StatusCode::BAD_REQUEST => ConnectxError::InvalidMessage(message),
        _ => ConnectxError::transport(format!("server returned {status}: {message}")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use connectx_core::{ChatMessage, UserSummary};
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn enriched(from: &str, to: &str, body: &str) -> EnrichedMessage {
        EnrichedMessage::new(
            ChatMessage::new(from.into(), to.into(), body),
            UserSummary::placeholder(from.into()),
            UserSummary::placeholder(to.into()),
        )
    }

    #[tokio::test]
    async fn history_sends_token_and_peer() {
        let server = MockServer::start().await;
        let messages = vec![enriched("bob", "alice", "hi")];
        Mock::given(method("GET"))
            .and(path("/chat/history"))
            .and(query_param("token", "tok-alice-0001"))
            .and(query_param("receiverId", "bob"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&messages))
            .expect(1)
            .mount(&server)
            .await;

        let api = ChatApi::new(&server.uri(), "tok-alice-0001").unwrap();
        let history = api.history(&"bob".into()).await.unwrap();
        assert_eq!(history, messages);
    }

    #[tokio::test]
    async fn forbidden_history_maps_to_forbidden() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/chat/history"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "message": "you can only chat with accepted connections"
            })))
            .mount(&server)
            .await;

        let api = ChatApi::new(&server.uri(), "tok-alice-0001").unwrap();
        let err = api.history(&"mallory".into()).await.unwrap_err();
        match err {
            ConnectxError::Forbidden(msg) => assert!(msg.contains("accepted connections")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unauthorized_conversations_map_to_auth() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/chat/conversations"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(serde_json::json!({"message": "invalid session token"})),
            )
            .mount(&server)
            .await;

        let api = ChatApi::new(&server.uri(), "tok-unknown-01").unwrap();
        assert!(matches!(
            api.conversations().await,
            Err(ConnectxError::Auth(_))
        ));
    }

    #[tokio::test]
    async fn mark_read_posts_camel_case_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/mark-read"))
            .and(body_json(serde_json::json!({
                "token": "tok-alice-0001",
                "senderId": "bob"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "message": "Messages marked as read",
                "count": 3
            })))
            .expect(1)
            .mount(&server)
            .await;

        let api = ChatApi::new(&server.uri(), "tok-alice-0001").unwrap();
        assert_eq!(api.mark_read(&"bob".into()).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn server_error_without_json_body_is_transport() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/chat/status"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let api = ChatApi::new(&server.uri(), "tok-alice-0001").unwrap();
        assert!(matches!(
            api.status().await,
            Err(ConnectxError::Transport { .. })
        ));
    }

    #[test]
    fn invalid_base_url_is_config_error() {
        assert!(matches!(
            ChatApi::new("not a url", "tok"),
            Err(ConnectxError::Config(_))
        ));
    }
}
