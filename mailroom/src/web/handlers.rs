//! Ingress endpoint handlers.
//!
//! These handlers only:
//! 1. Authenticate the request
//! 2. Build the inbound email from the raw source
//! 3. Enqueue it for routing and return
//!
//! Routing and mailbox processing happen in the router worker.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Form, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::inbound::InboundEmail;
use crate::queue::Publisher;
use crate::web::auth::{verify_mailgun_signature, verify_relay_basic_auth};
use crate::Config;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub publisher: Publisher,
}

impl AppState {
    pub fn new(config: Config, publisher: Publisher) -> Self {
        Self {
            config: Arc::new(config),
            publisher,
        }
    }
}

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Ingress response.
#[derive(Debug, Serialize)]
pub struct IngressResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

fn reply(
    code: StatusCode,
    status: &'static str,
    message_id: Option<String>,
) -> (StatusCode, Json<IngressResponse>) {
    (code, Json(IngressResponse { status, message_id }))
}

// =============================================================================
// Relay
// =============================================================================

/// Relay ingress endpoint.
///
/// Accepts a raw RFC 5322 message as the request body with content type
/// `message/rfc822`, authenticated with HTTP Basic auth.
pub async fn relay_inbound_email(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    info!(body_length = body.len(), "relay_inbound_email_received");

    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    if let Err(e) = verify_relay_basic_auth(state.config.ingress_password.as_deref(), authorization) {
        warn!(reason = e.as_str(), "relay_auth_failed");
        return reply(StatusCode::UNAUTHORIZED, "unauthorized", None);
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if !is_rfc822(content_type) {
        warn!(content_type = %content_type, "relay_unsupported_content_type");
        return reply(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "unsupported_media_type",
            None,
        );
    }

    enqueue(&state, "relay", body.to_vec()).await
}

fn is_rfc822(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(|mime| mime.trim().eq_ignore_ascii_case("message/rfc822"))
        .unwrap_or(false)
}

// =============================================================================
// Mailgun
// =============================================================================

/// Mailgun "store and notify" form payload carrying the full MIME message.
#[derive(Debug, Deserialize)]
pub struct MailgunForm {
    #[serde(default, rename = "body-mime")]
    pub body_mime: Option<String>,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub signature: String,
}

/// Mailgun ingress endpoint.
pub async fn mailgun_inbound_email(
    State(state): State<AppState>,
    Form(form): Form<MailgunForm>,
) -> impl IntoResponse {
    info!(
        has_body_mime = form.body_mime.is_some(),
        has_signature = !form.signature.is_empty(),
        "mailgun_inbound_email_received"
    );

    if let Err(e) = verify_mailgun_signature(
        state.config.mailgun_signing_key.as_deref(),
        &form.timestamp,
        &form.token,
        &form.signature,
        state.config.mailgun_signature_max_age,
    ) {
        warn!(reason = e.as_str(), "mailgun_signature_invalid");
        return reply(StatusCode::UNAUTHORIZED, "unauthorized", None);
    }

    match form.body_mime.filter(|s| !s.trim().is_empty()) {
        Some(source) => enqueue(&state, "mailgun", source.into_bytes()).await,
        None => {
            warn!("mailgun_body_mime_missing");
            reply(StatusCode::UNPROCESSABLE_ENTITY, "missing_body_mime", None)
        }
    }
}

// =============================================================================
// Shared
// =============================================================================

/// Build the inbound email and publish it for routing.
///
/// The source is passed through as received, whatever its charset.
async fn enqueue(
    state: &AppState,
    ingress: &'static str,
    source: Vec<u8>,
) -> (StatusCode, Json<IngressResponse>) {
    let email = match InboundEmail::from_source(source) {
        Ok(email) => email,
        Err(e) => {
            warn!(ingress = ingress, error = %e, "inbound_email_unparseable");
            return reply(StatusCode::UNPROCESSABLE_ENTITY, "unparseable", None);
        }
    };

    if let Err(e) = email.route_later(&state.publisher).await {
        error!(
            ingress = ingress,
            message_id = %email.message_id(),
            error = %e,
            "inbound_email_publish_failed"
        );
        return reply(StatusCode::INTERNAL_SERVER_ERROR, "error", None);
    }

    info!(
        ingress = ingress,
        message_id = %email.message_id(),
        "inbound_email_enqueued"
    );

    reply(
        StatusCode::OK,
        "enqueued",
        Some(email.message_id().to_string()),
    )
}
