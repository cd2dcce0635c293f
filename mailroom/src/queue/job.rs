//! Performing deferred route jobs.

use tracing::{info, warn};

use super::publisher::Publisher;
use super::types::{unix_now, RouteJob};
use crate::error::RouteJobError;
use crate::inbound::InboundEmail;
use crate::mailroom::Mailroom;

/// Rebuild the email from the job, route it and dispatch it.
///
/// Returns the email with whatever status its mailbox left it in. Routing
/// is deterministic, so this selects the same mailbox as routing the email
/// inline at receipt would have.
pub fn perform_route_job(mailroom: &Mailroom, job: RouteJob) -> Result<InboundEmail, RouteJobError> {
    let mut email = InboundEmail::from_source(job.source).map_err(RouteJobError::Parse)?;

    if email.message_id() != job.message_id {
        warn!(
            job_message_id = %job.message_id,
            message_id = %email.message_id(),
            "route_job_message_id_mismatch"
        );
    }

    let destination = mailroom.route_and_dispatch(&mut email)?;

    info!(
        message_id = %email.message_id(),
        destination = %destination,
        status = %email.status(),
        queued_for_secs = queued_for(job.enqueued_at),
        "route_job_performed"
    );

    Ok(email)
}

/// What the worker does with a delivery once its job has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    Ack,
    Requeue,
    Drop,
}

impl Settlement {
    /// Retry once: requeue a first delivery, drop one the broker has
    /// already redelivered.
    pub fn retry_once(redelivered: bool) -> Self {
        if redelivered {
            Settlement::Drop
        } else {
            Settlement::Requeue
        }
    }
}

/// Decide how to settle a delivery from the outcome of its job.
///
/// Only mailbox errors are retried, and only once; anything that failed on
/// redelivery would fail forever.
pub fn settle<T>(outcome: &Result<T, RouteJobError>, redelivered: bool) -> Settlement {
    match outcome {
        Ok(_) => Settlement::Ack,
        Err(e) if e.is_retryable() => Settlement::retry_once(redelivered),
        Err(_) => Settlement::Drop,
    }
}

impl InboundEmail {
    /// Enqueue this email for routing by the worker instead of routing it now.
    pub async fn route_later(&self, publisher: &Publisher) -> anyhow::Result<()> {
        publisher.publish_route_job(&RouteJob::for_email(self)).await
    }
}

fn queued_for(enqueued_at: u64) -> u64 {
    if enqueued_at == 0 {
        return 0;
    }
    unix_now().saturating_sub(enqueued_at)
}
