use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tessera_identity::{CredentialPair, ErrorKind, IssuerError};
use tracing::{error, info};

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct IssueRequest {
    pub user_id: String,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Caller-visible failure: a status code and a message safe to return.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "internal error".to_string(),
        }
    }
}

impl From<IssuerError> for ApiError {
    fn from(err: IssuerError) -> Self {
        let status = match err.kind() {
            ErrorKind::InvalidCredential
            | ErrorKind::CredentialExpired
            | ErrorKind::CredentialReplayed => StatusCode::UNAUTHORIZED,
            ErrorKind::AddressMismatch => StatusCode::FORBIDDEN,
            ErrorKind::InvalidSubject => StatusCode::BAD_REQUEST,
            ErrorKind::InternalFailure => return ApiError::internal(),
        };

        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(_: JsonRejection) -> Self {
        ApiError::bad_request("Invalid request body")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

/// First `X-Forwarded-For` hop when trusted, otherwise the peer IP.
pub fn client_address(headers: &HeaderMap, peer: SocketAddr, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());

        if let Some(address) = forwarded {
            return address.to_string();
        }
    }

    peer.ip().to_string()
}

/// Runs a CPU-bound issuer call off the async executor.
async fn run_issuer<F>(state: &AppState, op: F) -> Result<CredentialPair, ApiError>
where
    F: FnOnce(&tessera_identity::CredentialIssuer) -> Result<CredentialPair, IssuerError>
        + Send
        + 'static,
{
    let issuer = Arc::clone(&state.issuer);
    let result = tokio::task::spawn_blocking(move || op(issuer.as_ref()))
        .await
        .map_err(|e| {
            error!("Issuer task failed: {}", e);
            ApiError::internal()
        })?;

    Ok(result?)
}

pub async fn issue_tokens(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    payload: Result<Json<IssueRequest>, JsonRejection>,
) -> Result<Json<CredentialPair>, ApiError> {
    let Json(request) = payload?;
    let address = client_address(&headers, peer, state.trust_forwarded_for);

    let pair = run_issuer(&state, move |issuer| {
        issuer.issue_pair(&request.user_id, &address)
    })
    .await?;

    Ok(Json(pair))
}

pub async fn refresh_tokens(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<CredentialPair>, ApiError> {
    let Json(request) = payload?;
    let address = client_address(&headers, peer, state.trust_forwarded_for);

    let pair = run_issuer(&state, move |issuer| {
        issuer.rotate(&request.refresh_token, &address)
    })
    .await
    .map_err(|e| {
        info!(status = %e.status, "Refresh rejected");
        e
    })?;

    Ok(Json(pair))
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!(state.issuer.metrics()))
}
