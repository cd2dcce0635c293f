//! Error types for routing configuration and mailbox dispatch.
//!
//! Configuration defects (a malformed routing table, a destination with no
//! mailbox) are reported once at startup through [`ConfigError`]. Failures
//! that happen while handling a particular message use [`DispatchError`] or,
//! for deferred jobs, [`RouteJobError`].

use crate::routing::Destination;

/// Defects in the routing table or mailbox registry, detected at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("routing table is empty; declare at least a catch-all rule")]
    EmptyRoutingTable,

    #[error("routing table must end with a catch-all rule (last rule routes to `{last}`)")]
    MissingCatchAll { last: Destination },

    #[error("catch-all rule at position {position} makes the {unreachable} rule(s) after it unreachable")]
    UnreachableRules { position: usize, unreachable: usize },

    #[error("invalid pattern `{pattern}` for routing rule to `{destination}`: {source}")]
    InvalidPattern {
        pattern: String,
        destination: Destination,
        #[source]
        source: regex::Error,
    },

    #[error("mailbox `{0}` is registered more than once")]
    DuplicateMailbox(Destination),

    #[error("routing table sends mail to `{0}` but no mailbox is registered for it")]
    UnboundDestination(Destination),
}

/// Failures while dispatching a message to its mailbox.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("no mailbox registered for destination `{0}`")]
    UnknownDestination(Destination),

    #[error("mailbox `{destination}` failed to process inbound email: {source}")]
    Handler {
        destination: Destination,
        #[source]
        source: anyhow::Error,
    },
}

/// Failures while performing a deferred routing job.
#[derive(Debug, thiserror::Error)]
pub enum RouteJobError {
    #[error("failed to parse queued inbound email: {0}")]
    Parse(#[source] anyhow::Error),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl RouteJobError {
    /// Whether redelivering the same job could succeed.
    ///
    /// Unparseable sources and unknown destinations fail identically on every
    /// attempt; handler errors may be transient.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RouteJobError::Dispatch(DispatchError::Handler { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_job_error_retryable() {
        let parse = RouteJobError::Parse(anyhow::anyhow!("bad"));
        assert!(!parse.is_retryable());

        let unknown = RouteJobError::from(DispatchError::UnknownDestination(Destination::new(
            "missing",
        )));
        assert!(!unknown.is_retryable());

        let handler = RouteJobError::from(DispatchError::Handler {
            destination: Destination::new("defaults"),
            source: anyhow::anyhow!("smtp down"),
        });
        assert!(handler.is_retryable());
    }

    #[test]
    fn test_config_error_messages() {
        let err = ConfigError::MissingCatchAll {
            last: Destination::new("first_case"),
        };
        assert!(err.to_string().contains("first_case"));
        assert!(err.to_string().contains("catch-all"));
    }
}
