//! Ingress web server for inbound email.
//!
//! This module provides a thin web server that:
//! - Receives raw messages from a relay (Postfix, Exim) or Mailgun
//! - Verifies authentication
//! - Enqueues each message for routing
//!
//! Routing happens in the router worker, never inline.

pub mod auth;
pub mod handlers;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use auth::{verify_mailgun_signature, verify_relay_basic_auth, AuthError, RELAY_USERNAME};
pub use handlers::{
    health, mailgun_inbound_email, relay_inbound_email, AppState, HealthResponse,
    IngressResponse, MailgunForm,
};

/// Build the ingress router.
///
/// Request bodies are capped at `max_body_bytes` from the config rather than
/// axum's 2 MB default, since raw messages carry their attachments.
pub fn app(state: AppState) -> Router {
    let body_limit = DefaultBodyLimit::max(state.config.max_body_bytes);

    Router::new()
        .route("/health", get(health))
        .route("/ingress/relay/inbound_emails", post(relay_inbound_email))
        .route("/ingress/mailgun/inbound_emails", post(mailgun_inbound_email))
        .layer(body_limit)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
