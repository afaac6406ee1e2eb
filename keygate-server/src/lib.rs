//! HTTP API for the Keygate activation service.
//!
//! Thin glue over [`keygate_activation`]: request parsing, status-code
//! mapping, and the admin authentication boundary. The client-facing result
//! is always computed from store state first; operator notification is
//! dispatched afterwards, outside the store's critical section, and its
//! outcome is reported in the response as `sent_to_admin`.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Request, State, rejection::JsonRejection},
    http::{StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Duration;
use keygate_activation::{
    ActivationError, ActivationNotice, ActivationStore, DEFAULT_CODE_LENGTH, Notifier,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

/// Runtime configuration for the activation service.
///
/// All secrets (notification credentials, admin token) arrive here from the
/// environment at startup; nothing is ever hard-coded.
#[derive(Clone)]
pub struct ServerConfig {
    /// Length of generated activation codes.
    pub code_length: usize,
    /// How long a pending code stays redeemable.
    pub ttl: Duration,
    /// Bearer token required on `/admin` routes; `None` leaves them open.
    pub admin_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            code_length: DEFAULT_CODE_LENGTH,
            ttl: Duration::hours(24),
            admin_token: None,
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    store: Arc<ActivationStore>,
    notifier: Arc<Notifier>,
    config: Arc<ServerConfig>,
}

impl AppState {
    /// Builds the state from its parts.
    #[must_use]
    pub fn new(store: Arc<ActivationStore>, notifier: Arc<Notifier>, config: ServerConfig) -> Self {
        Self {
            store,
            notifier,
            config: Arc::new(config),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RequestActivationBody {
    #[serde(default)]
    hwid: Option<String>,
    #[serde(default)]
    device_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VerifyActivationBody {
    #[serde(default)]
    hwid: Option<String>,
    #[serde(default)]
    activation_code: Option<String>,
    #[serde(default)]
    device_name: Option<String>,
}

#[derive(Debug, Serialize)]
struct PendingRow {
    hwid: String,
    code_sample: String,
    device_name: String,
    created_at: i64,
}

#[derive(Debug, Serialize)]
struct ActivationRow {
    hwid: String,
    activated_at: i64,
    device_name: String,
}

fn error_response(status: StatusCode, code: &str) -> Response {
    (status, Json(json!({"ok": false, "error": code}))).into_response()
}

fn map_activation_error(e: ActivationError) -> Response {
    match e {
        ActivationError::Validation(_) => error_response(StatusCode::BAD_REQUEST, "missing_fields"),
        ActivationError::AlreadyActivated => {
            error_response(StatusCode::CONFLICT, "already_activated")
        }
        ActivationError::NoPendingRequest => {
            error_response(StatusCode::NOT_FOUND, "no_pending_request")
        }
        ActivationError::CodeExpired => error_response(StatusCode::GONE, "code_expired"),
        ActivationError::InvalidCode => error_response(StatusCode::FORBIDDEN, "invalid_code"),
        ActivationError::Storage(msg) => {
            error!("storage failure: {msg}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "storage_error")
        }
    }
}

async fn request_activation(
    State(state): State<AppState>,
    body: Result<Json<RequestActivationBody>, JsonRejection>,
) -> Response {
    let Ok(Json(body)) = body else {
        return error_response(StatusCode::BAD_REQUEST, "invalid_json");
    };
    let hwid = body.hwid.unwrap_or_default().trim().to_string();
    let device_name = body.device_name.unwrap_or_default().trim().to_string();
    if hwid.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "missing_hwid");
    }

    let issued = match state
        .store
        .request_activation(&hwid, &device_name, state.config.code_length)
    {
        Ok(issued) => issued,
        Err(e) => return map_activation_error(e),
    };

    // Store state is settled; delivery happens outside the critical section
    // and cannot invalidate the issued code.
    let notice = ActivationNotice {
        hwid,
        device_name,
        code: issued.code,
        created_at: issued.created_at,
    };
    let sent_to_admin = state.notifier.send(&notice).await;

    (
        StatusCode::OK,
        Json(json!({
            "ok": true,
            "sent_to_admin": sent_to_admin,
            "note": "Admin received the code via the notification channel (if configured).",
        })),
    )
        .into_response()
}

async fn verify_activation(
    State(state): State<AppState>,
    body: Result<Json<VerifyActivationBody>, JsonRejection>,
) -> Response {
    let Ok(Json(body)) = body else {
        return error_response(StatusCode::BAD_REQUEST, "invalid_json");
    };
    let hwid = body.hwid.unwrap_or_default().trim().to_string();
    let code = body.activation_code.unwrap_or_default().trim().to_string();
    let device_name = body.device_name.unwrap_or_default().trim().to_string();
    if hwid.is_empty() || code.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "missing_fields");
    }

    match state
        .store
        .verify_activation(&hwid, &code, &device_name, state.config.ttl)
    {
        Ok(activated_at) => (
            StatusCode::OK,
            Json(json!({"ok": true, "activated_at": activated_at.timestamp()})),
        )
            .into_response(),
        Err(e) => map_activation_error(e),
    }
}

async fn list_pending(State(state): State<AppState>) -> Response {
    match state.store.list_pending() {
        Ok(rows) => {
            let rows: Vec<PendingRow> = rows
                .into_iter()
                .map(|r| PendingRow {
                    hwid: r.hwid,
                    code_sample: r.code_sample,
                    device_name: r.device_name,
                    created_at: r.created_at.timestamp(),
                })
                .collect();
            Json(rows).into_response()
        }
        Err(e) => map_activation_error(e),
    }
}

async fn list_activations(State(state): State<AppState>) -> Response {
    match state.store.list_activations() {
        Ok(rows) => {
            let rows: Vec<ActivationRow> = rows
                .into_iter()
                .map(|r| ActivationRow {
                    hwid: r.hwid,
                    activated_at: r.activated_at.timestamp(),
                    device_name: r.device_name,
                })
                .collect();
            Json(rows).into_response()
        }
        Err(e) => map_activation_error(e),
    }
}

async fn healthz() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

/// Requires `Authorization: Bearer <admin_token>` on admin routes when a
/// token is configured.
async fn require_admin(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if let Some(expected) = &state.config.admin_token {
        let presented = req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        if presented != Some(expected.as_str()) {
            return error_response(StatusCode::UNAUTHORIZED, "unauthorized");
        }
    }
    next.run(req).await
}

/// Builds the HTTP API router with the given state.
pub fn build_router(state: AppState) -> Router {
    let admin = Router::new()
        .route("/list_pending", get(list_pending))
        .route("/list_activations", get(list_activations))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .route("/healthz", get(healthz))
        .route("/request_activation", post(request_activation))
        .route("/verify_activation", post(verify_activation))
        .nest("/admin", admin)
        .with_state(state)
}
