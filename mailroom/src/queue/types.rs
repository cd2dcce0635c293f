//! Queue message types for deferred routing.
//!
//! Ingress publishes one [`RouteJob`] per received message to the
//! `mailbox_routing` queue; the router worker consumes them.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::inbound::InboundEmail;

/// Queue name for inbound emails awaiting routing.
pub const ROUTING_QUEUE: &str = "mailbox_routing";

/// A request to route and dispatch one inbound email.
///
/// Carries the full raw source, so the worker rebuilds the email exactly as
/// ingress received it and routes it the same way it would have inline.
/// The source travels base64-encoded, since raw mail need not be UTF-8.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteJob {
    /// Message-Id of the email (or its checksum fallback)
    pub message_id: String,
    /// Raw RFC 5322 source
    #[serde(with = "base64_bytes")]
    pub source: Vec<u8>,
    /// Unix seconds when the job was enqueued
    #[serde(default)]
    pub enqueued_at: u64,
}

impl RouteJob {
    /// Create a job from raw source received by ingress.
    pub fn new(message_id: String, source: Vec<u8>) -> Self {
        Self {
            message_id,
            source,
            enqueued_at: unix_now(),
        }
    }

    pub fn for_email(email: &InboundEmail) -> Self {
        Self::new(email.message_id().to_string(), email.source().to_vec())
    }
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded.as_bytes()).map_err(D::Error::custom)
    }
}
