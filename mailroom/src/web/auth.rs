//! Ingress authentication.
//!
//! - Relay: HTTP Basic auth, user `mailroom`, password from `INGRESS_PASSWORD`
//! - Mailgun: HMAC-SHA256 of `timestamp + token` with the webhook signing key
//!
//! Reference: https://documentation.mailgun.com/docs/mailgun/user-manual/events/webhooks/#securing-webhooks

use std::time::{SystemTime, UNIX_EPOCH};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Username relay clients authenticate as.
pub const RELAY_USERNAME: &str = "mailroom";

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("ingress credentials are not configured")]
    NotConfigured,
    #[error("credentials missing from request")]
    Missing,
    #[error("malformed credentials")]
    Malformed,
    #[error("webhook timestamp outside the allowed window")]
    Stale,
    #[error("credentials do not match")]
    Mismatch,
}

impl AuthError {
    /// Stable snake_case label for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthError::NotConfigured => "not_configured",
            AuthError::Missing => "missing",
            AuthError::Malformed => "malformed",
            AuthError::Stale => "stale",
            AuthError::Mismatch => "mismatch",
        }
    }
}

/// Check an `Authorization` header value against the relay password.
///
/// The relay endpoint is closed when no password is configured.
pub fn verify_relay_basic_auth(
    password: Option<&str>,
    authorization: Option<&str>,
) -> Result<(), AuthError> {
    let expected = password.ok_or(AuthError::NotConfigured)?;
    let header = authorization.ok_or(AuthError::Missing)?;

    // Auth schemes are case-insensitive (RFC 7235)
    let (scheme, encoded) = header.trim().split_once(' ').ok_or(AuthError::Malformed)?;
    if !scheme.eq_ignore_ascii_case("Basic") {
        return Err(AuthError::Malformed);
    }
    let encoded = encoded.trim();
    let decoded = STANDARD.decode(encoded).map_err(|_| AuthError::Malformed)?;
    let credentials = String::from_utf8(decoded).map_err(|_| AuthError::Malformed)?;
    let (user, provided) = credentials.split_once(':').ok_or(AuthError::Malformed)?;

    // Evaluate both comparisons so timing does not reveal which one failed
    let user_ok = constant_time_eq(user.as_bytes(), RELAY_USERNAME.as_bytes());
    let password_ok = constant_time_eq(provided.as_bytes(), expected.as_bytes());

    if user_ok & password_ok {
        Ok(())
    } else {
        Err(AuthError::Mismatch)
    }
}

/// Verify a Mailgun webhook signature and its freshness.
pub fn verify_mailgun_signature(
    signing_key: Option<&str>,
    timestamp: &str,
    token: &str,
    signature: &str,
    max_age_seconds: u64,
) -> Result<(), AuthError> {
    let signing_key = signing_key.ok_or(AuthError::NotConfigured)?;

    if timestamp.is_empty() || token.is_empty() || signature.is_empty() {
        return Err(AuthError::Missing);
    }

    let webhook_time: u64 = timestamp.parse().map_err(|_| AuthError::Malformed)?;
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    if now.abs_diff(webhook_time) > max_age_seconds {
        return Err(AuthError::Stale);
    }

    let expected = mailgun_signature(signing_key, timestamp, token)?;

    if constant_time_eq(expected.as_bytes(), signature.as_bytes()) {
        Ok(())
    } else {
        Err(AuthError::Mismatch)
    }
}

/// Hex HMAC-SHA256 of `timestamp + token`.
pub fn mailgun_signature(signing_key: &str, timestamp: &str, token: &str) -> Result<String, AuthError> {
    let mut mac =
        HmacSha256::new_from_slice(signing_key.as_bytes()).map_err(|_| AuthError::NotConfigured)?;
    mac.update(timestamp.as_bytes());
    mac.update(token.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic(user: &str, password: &str) -> String {
        format!("Basic {}", STANDARD.encode(format!("{}:{}", user, password)))
    }

    fn now() -> String {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
            .to_string()
    }

    #[test]
    fn test_relay_auth_valid() {
        let header = basic("mailroom", "s3cret");
        assert_eq!(verify_relay_basic_auth(Some("s3cret"), Some(header.as_str())), Ok(()));
    }

    #[test]
    fn test_relay_auth_scheme_case_insensitive() {
        let credentials = STANDARD.encode("mailroom:s3cret");

        for scheme in ["basic", "BASIC", "bAsIc"] {
            let header = format!("{} {}", scheme, credentials);
            assert_eq!(verify_relay_basic_auth(Some("s3cret"), Some(header.as_str())), Ok(()));
        }
        assert_eq!(
            verify_relay_basic_auth(Some("s3cret"), Some("Basic")),
            Err(AuthError::Malformed)
        );
    }

    #[test]
    fn test_relay_auth_rejections() {
        let wrong_password = basic("mailroom", "nope");
        let wrong_user = basic("admin", "s3cret");

        assert_eq!(
            verify_relay_basic_auth(None, Some(wrong_password.as_str())),
            Err(AuthError::NotConfigured)
        );
        assert_eq!(verify_relay_basic_auth(Some("s3cret"), None), Err(AuthError::Missing));
        assert_eq!(
            verify_relay_basic_auth(Some("s3cret"), Some("Bearer abc")),
            Err(AuthError::Malformed)
        );
        assert_eq!(
            verify_relay_basic_auth(Some("s3cret"), Some("Basic !!!")),
            Err(AuthError::Malformed)
        );
        assert_eq!(
            verify_relay_basic_auth(Some("s3cret"), Some(wrong_password.as_str())),
            Err(AuthError::Mismatch)
        );
        assert_eq!(
            verify_relay_basic_auth(Some("s3cret"), Some(wrong_user.as_str())),
            Err(AuthError::Mismatch)
        );
    }

    #[test]
    fn test_mailgun_signature_valid() {
        let timestamp = now();
        let signature = mailgun_signature("key-123", &timestamp, "random-token").unwrap();

        assert_eq!(
            verify_mailgun_signature(Some("key-123"), &timestamp, "random-token", &signature, 300),
            Ok(())
        );
    }

    #[test]
    fn test_mailgun_signature_rejections() {
        let timestamp = now();
        let signature = mailgun_signature("key-123", &timestamp, "token").unwrap();

        assert_eq!(
            verify_mailgun_signature(None, &timestamp, "token", &signature, 300),
            Err(AuthError::NotConfigured)
        );
        assert_eq!(
            verify_mailgun_signature(Some("key-123"), "", "token", &signature, 300),
            Err(AuthError::Missing)
        );
        assert_eq!(
            verify_mailgun_signature(Some("key-123"), "yesterday", "token", &signature, 300),
            Err(AuthError::Malformed)
        );
        assert_eq!(
            verify_mailgun_signature(Some("key-123"), "946684800", "token", &signature, 300),
            Err(AuthError::Stale)
        );
        assert_eq!(
            verify_mailgun_signature(Some("other-key"), &timestamp, "token", &signature, 300),
            Err(AuthError::Mismatch)
        );
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
    }
}
