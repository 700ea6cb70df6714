// ABOUTME: REST handlers for agent status, call lookup, token issuance, and log submission
// ABOUTME: Each handler validates shape, delegates, and maps the outcome to a status code

use agentline_core::{metrics, AgentStatus, LogSubmission};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::server::AppState;
use crate::token::{CallToken, DEFAULT_IDENTITY};

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: AgentStatus,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: Option<String>,
}

/// Envelope for write and lookup endpoints
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ApiResponse {
    fn ok() -> Self {
        Self {
            success: true,
            message: None,
            data: None,
        }
    }

    fn ok_with(message: Option<&str>, data: Value) -> Self {
        Self {
            success: true,
            message: message.map(str::to_string),
            data: Some(data),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            data: None,
        }
    }
}

type ApiResult = (StatusCode, Json<ApiResponse>);

fn bad_request(route: &'static str, message: impl Into<String>) -> ApiResult {
    metrics::record_http_request(route, "bad_request");
    (StatusCode::BAD_REQUEST, Json(ApiResponse::error(message)))
}

fn store_failure(route: &'static str, kind: &'static str, message: &str) -> ApiResult {
    metrics::record_http_request(route, "error");
    metrics::record_error(kind);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiResponse::error(message)),
    )
}

/// GET /agent/status
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    metrics::record_http_request("agent_status_get", "ok");
    Json(StatusResponse {
        status: state.status.get(),
    })
}

/// POST /agent/status
pub async fn set_status(
    State(state): State<AppState>,
    payload: Result<Json<StatusUpdate>, JsonRejection>,
) -> ApiResult {
    const ROUTE: &str = "agent_status_set";

    let update = match payload {
        Ok(Json(update)) => update,
        Err(rejection) => {
            tracing::warn!(error = %rejection, "Malformed status update body");
            return bad_request(ROUTE, format!("Invalid request body: {}", rejection.body_text()));
        }
    };

    let Some(candidate) = update.status else {
        return bad_request(ROUTE, "Missing 'status' field");
    };

    match state.status.set(&candidate) {
        Ok(_) => {
            metrics::record_http_request(ROUTE, "ok");
            (StatusCode::OK, Json(ApiResponse::ok()))
        }
        Err(e) => {
            tracing::warn!(candidate = %candidate, "Rejected status update");
            bad_request(ROUTE, e.to_string())
        }
    }
}

/// GET /call/incoming
pub async fn incoming_call(State(state): State<AppState>) -> ApiResult {
    const ROUTE: &str = "call_incoming";

    let Some(store) = state.call_store.as_ref() else {
        tracing::error!("Incoming call lookup requested but no call store is configured");
        return store_failure(ROUTE, "call_store_unconfigured", "Call store is not configured");
    };

    match store.latest_call().await {
        Ok(Some(call)) => {
            metrics::record_http_request(ROUTE, "ok");
            (StatusCode::OK, Json(ApiResponse::ok_with(None, call)))
        }
        Ok(None) => {
            metrics::record_http_request(ROUTE, "not_found");
            (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::error("No incoming call")),
            )
        }
        Err(e) => {
            tracing::error!(error = %e, "Call store lookup failed");
            store_failure(ROUTE, "call_store", "Failed to fetch incoming call")
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub identity: Option<String>,
}

/// GET /webrtc/token. Never fails: an unreadable query falls back to the default identity.
pub async fn webrtc_token(
    State(state): State<AppState>,
    query: Result<Query<TokenQuery>, QueryRejection>,
) -> Json<CallToken> {
    metrics::record_http_request("webrtc_token", "ok");
    let identity = match query {
        Ok(Query(query)) => query.identity,
        Err(rejection) => {
            tracing::debug!(error = %rejection.body_text(), "Unreadable token query, using default identity");
            None
        }
    };
    Json(state.tokens.issue(identity.as_deref().unwrap_or(DEFAULT_IDENTITY)))
}

/// POST /api/logs/save
pub async fn save_log(
    State(state): State<AppState>,
    payload: Result<Json<LogSubmission>, JsonRejection>,
) -> ApiResult {
    const ROUTE: &str = "logs_save";

    let submission = match payload {
        Ok(Json(submission)) => submission,
        Err(rejection) => {
            tracing::warn!(error = %rejection, "Malformed log submission body");
            return bad_request(ROUTE, format!("Invalid request body: {}", rejection.body_text()));
        }
    };

    let entry = match submission.into_entry() {
        Ok(entry) => entry,
        Err(e) => {
            tracing::warn!(
                missing_phone = e.phone,
                missing_notes = e.notes,
                "Rejected log submission"
            );
            return bad_request(ROUTE, e.to_string());
        }
    };

    let Some(store) = state.log_store.as_ref() else {
        tracing::error!("Log submission received but no log store is configured");
        return store_failure(ROUTE, "log_store_unconfigured", "Log store is not configured");
    };

    match store.insert_log(&entry).await {
        Ok(row) => {
            tracing::info!(
                agent_name = %entry.agent_name,
                category = ?entry.category,
                "Request log saved"
            );
            metrics::record_http_request(ROUTE, "ok");
            (
                StatusCode::OK,
                Json(ApiResponse::ok_with(Some("Log saved successfully"), row)),
            )
        }
        Err(e) => {
            tracing::error!(error = %e, "Log store insert failed");
            store_failure(ROUTE, "log_store", "Failed to save log")
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub agent_status: AgentStatus,
    pub active_connections: usize,
    pub started_at: String,
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        agent_status: state.status.get(),
        active_connections: state.relay.active_subscriptions(),
        started_at: state.started_at.to_rfc3339(),
    })
}

/// GET /metrics - Prometheus text format
pub async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state.metrics.as_ref() {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not installed").into_response(),
    }
}
