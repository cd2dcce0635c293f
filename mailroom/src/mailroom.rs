//! Routing plus dispatch: the validated pairing of a [`Router`] with a
//! [`MailboxRegistry`].
//!
//! ```text
//! InboundEmail → route() → Destination → dispatch() → Mailbox::process()
//! ```

use std::sync::Arc;

use regex::Regex;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{ConfigError, DispatchError};
use crate::inbound::InboundEmail;
use crate::mailbox::{BouncingMailbox, DeliveringMailbox, Mailbox, MailboxRegistry, NoopMailbox};
use crate::routing::{Destination, Matcher, Router, RoutingTableConfig};

/// Routes inbound email and dispatches it to exactly one mailbox.
///
/// Immutable after construction; share it across tasks with `Arc`.
#[derive(Debug, Clone)]
pub struct Mailroom {
    router: Router,
    mailboxes: MailboxRegistry,
}

impl Mailroom {
    /// Pair a router with its mailboxes.
    ///
    /// Fails when the router names a destination that has no mailbox.
    pub fn new(router: Router, mailboxes: MailboxRegistry) -> Result<Self, ConfigError> {
        for destination in router.destinations() {
            if !mailboxes.contains(destination) {
                return Err(ConfigError::UnboundDestination(destination.clone()));
            }
        }

        if mailboxes.len() > router.destinations().len() {
            warn!(
                registered = mailboxes.len(),
                routed = router.destinations().len(),
                "mailroom_unrouted_mailboxes"
            );
        }

        info!(
            rule_count = router.rules().len(),
            mailbox_count = mailboxes.len(),
            "mailroom_ready"
        );

        Ok(Self { router, mailboxes })
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Select the destination for an email. Pure and deterministic.
    pub fn route(&self, email: &InboundEmail) -> &Destination {
        self.router.route(email)
    }

    /// Run the mailbox bound to `destination` against the email.
    pub fn dispatch(
        &self,
        destination: &Destination,
        email: &mut InboundEmail,
    ) -> Result<(), DispatchError> {
        let mailbox: &Arc<dyn Mailbox> = self
            .mailboxes
            .get(destination)
            .ok_or_else(|| DispatchError::UnknownDestination(destination.clone()))?;

        mailbox.process(email).map_err(|source| {
            error!(
                message_id = %email.message_id(),
                destination = %destination,
                error = %source,
                "mailbox_process_failed"
            );
            DispatchError::Handler {
                destination: destination.clone(),
                source,
            }
        })
    }

    /// Route the email and dispatch it to the selected mailbox.
    pub fn route_and_dispatch(&self, email: &mut InboundEmail) -> Result<Destination, DispatchError> {
        let destination = self.route(email).clone();

        info!(
            message_id = %email.message_id(),
            subject = %email.subject(),
            destination = %destination,
            "inbound_email_routed"
        );

        self.dispatch(&destination, email)?;

        info!(
            message_id = %email.message_id(),
            destination = %destination,
            status = %email.status(),
            "inbound_email_processed"
        );

        Ok(destination)
    }
}

/// The application routing table.
///
/// Subjects containing `test` go to the `first_case` mailbox, which accepts
/// mail without changing its status; everything else goes to `defaults`,
/// which bounces it.
pub fn application_mailroom() -> Result<Mailroom, ConfigError> {
    let router = Router::builder()
        .rule(Matcher::Subject(subject_pattern("test")?), "first_case")
        .all("defaults")
        .build()?;

    Mailroom::new(router, application_mailboxes()?)
}

/// Mailboxes the application provides; routing tables loaded from JSON may
/// send mail to any of these.
pub fn application_mailboxes() -> Result<MailboxRegistry, ConfigError> {
    MailboxRegistry::new()
        .with("first_case", NoopMailbox)?
        .with("defaults", BouncingMailbox)?
        .with("delivered", DeliveringMailbox)
}

/// Build the mailroom the worker runs: the JSON routing table at
/// `MAILROOM_ROUTES_PATH` when configured, the application table otherwise.
pub fn load_mailroom(config: &Config) -> anyhow::Result<Mailroom> {
    let mailroom = match &config.routes_path {
        Some(path) => {
            let router = RoutingTableConfig::from_json_file(path)?.into_router()?;
            Mailroom::new(router, application_mailboxes()?)?
        }
        None => application_mailroom()?,
    };
    Ok(mailroom)
}

fn subject_pattern(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(&regex::escape(pattern)).map_err(|source| ConfigError::InvalidPattern {
        pattern: pattern.to_string(),
        destination: Destination::new("first_case"),
        source,
    })
}
