// SPDX-FileCopyrightText: 2026 ConnectX Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! REST handlers for the chat read surface.
//!
//! Every request carries the session token. Errors are returned as
//! `{"message": "..."}` with a status derived from the error kind.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use connectx_core::{Conversation, ConnectxError, EnrichedMessage, HealthStatus, UserId};

use crate::server::GatewayState;

/// Tokens shorter than this are rejected before any lookup.
pub const MIN_TOKEN_LEN: usize = 10;

/// Query string of GET /chat/history.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub token: Option<String>,
    pub receiver_id: Option<String>,
}

/// Query string of GET /chat/conversations.
#[derive(Debug, Deserialize)]
pub struct ConversationsQuery {
    pub token: Option<String>,
}

/// Body of POST /chat/mark-read.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkReadRequest {
    pub token: Option<String>,
    pub sender_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MarkReadResponse {
    pub message: String,
    pub count: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub online_users: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
}

/// Error half of every handler: a status code and a client-safe message.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<ConnectxError> for ApiError {
    fn from(err: ConnectxError) -> Self {
        let status = match &err {
            ConnectxError::Auth(_) => StatusCode::UNAUTHORIZED,
            ConnectxError::Forbidden(_) => StatusCode::FORBIDDEN,
            ConnectxError::InvalidMessage(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %err, "request failed");
        }
        let message = match &err {
            ConnectxError::Storage { .. } => "storage unavailable".to_string(),
            other => other.client_message(),
        };
        Self { status, message }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                message: self.message,
            }),
        )
            .into_response()
    }
}

fn require_token(token: Option<&str>) -> Result<&str, ApiError> {
    match token.map(str::trim) {
        None | Some("") => Err(ApiError::bad_request("no token provided")),
        Some(t) if t.len() < MIN_TOKEN_LEN => Err(ApiError::bad_request("invalid token format")),
        Some(t) => Ok(t),
    }
}

async fn authenticate(state: &GatewayState, token: Option<&str>) -> Result<UserId, ApiError> {
    let token = require_token(token)?;
    Ok(state.identity.authenticate(token).await?.id)
}

/// GET /chat/history?token=&receiverId=
pub async fn get_history(
    State(state): State<GatewayState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<EnrichedMessage>>, ApiError> {
    let viewer = authenticate(&state, query.token.as_deref()).await?;
    let peer = match query.receiver_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => UserId::from(id),
        _ => return Err(ApiError::bad_request("receiverId is required")),
    };
    let history = state.aggregator.history(&viewer, &peer).await?;
    Ok(Json(history))
}

/// GET /chat/conversations?token=
pub async fn get_conversations(
    State(state): State<GatewayState>,
    Query(query): Query<ConversationsQuery>,
) -> Result<Json<Vec<Conversation>>, ApiError> {
    let viewer = authenticate(&state, query.token.as_deref()).await?;
    let conversations = state.aggregator.conversations(&viewer).await?;
    Ok(Json(conversations))
}

/// POST /chat/mark-read
pub async fn post_mark_read(
    State(state): State<GatewayState>,
    Json(body): Json<MarkReadRequest>,
) -> Result<Json<MarkReadResponse>, ApiError> {
    let viewer = authenticate(&state, body.token.as_deref()).await?;
    let sender = match body.sender_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => UserId::from(id),
        _ => return Err(ApiError::bad_request("senderId is required")),
    };
    let count = state.aggregator.mark_read(&viewer, &sender).await?;
    Ok(Json(MarkReadResponse {
        message: "Messages marked as read".to_string(),
        count,
    }))
}

/// GET /chat/status
pub async fn get_status() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "Chat service operational".to_string(),
    })
}

/// GET /health
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    let status = match &state.health.probe {
        None => "ok",
        Some(probe) => match probe.health_check().await {
            Ok(HealthStatus::Healthy) => "ok",
            Ok(HealthStatus::Degraded(_)) => "degraded",
            Ok(HealthStatus::Unhealthy(_)) | Err(_) => "unhealthy",
        },
    };
    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.health.start_time.elapsed().as_secs(),
        online_users: state.presence.online_users(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_checks_match_rest_contract() {
        assert!(require_token(None).is_err());
        assert!(require_token(Some("  ")).is_err());
        let short = require_token(Some("abc")).unwrap_err();
        assert_eq!(short.status, StatusCode::BAD_REQUEST);
        assert_eq!(short.message, "invalid token format");
        assert_eq!(require_token(Some("0123456789")).unwrap(), "0123456789");
    }

    #[test]
    fn error_kinds_map_to_status_codes() {
        let cases = [
            (ConnectxError::Auth("x".into()), StatusCode::UNAUTHORIZED),
            (ConnectxError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (ConnectxError::InvalidMessage("x".into()), StatusCode::BAD_REQUEST),
            (ConnectxError::storage("disk"), StatusCode::INTERNAL_SERVER_ERROR),
            (ConnectxError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status, expected);
        }
    }

    #[test]
    fn storage_details_are_not_exposed() {
        let err = ApiError::from(ConnectxError::storage("/var/lib/connectx.db is locked"));
        assert!(!err.message.contains("/var/lib"));
    }

    #[test]
    fn history_query_uses_camel_case() {
        let query: HistoryQuery =
            serde_json::from_str(r#"{"token":"t","receiverId":"bob"}"#).unwrap();
        assert_eq!(query.receiver_id.as_deref(), Some("bob"));
    }

    #[test]
    fn health_response_serializes_camel_case() {
        let json = serde_json::to_value(HealthResponse {
            status: "ok".into(),
            version: "0.1.0".into(),
            uptime_secs: 42,
            online_users: 3,
        })
        .unwrap();
        assert_eq!(json["uptimeSecs"], 42);
        assert_eq!(json["onlineUsers"], 3);
    }
}
