//! Mailboxes: the handlers inbound email is dispatched to.

pub mod registry;

use anyhow::Result;
use tracing::info;

use crate::inbound::InboundEmail;

pub use registry::MailboxRegistry;

/// Processes inbound email routed to it.
///
/// Implementations may change the email's status; a mailbox that sets
/// nothing leaves the email `pending`. Errors propagate to the caller, which
/// decides whether the job is retried.
pub trait Mailbox: Send + Sync {
    fn process(&self, email: &mut InboundEmail) -> Result<()>;
}

impl<F> Mailbox for F
where
    F: Fn(&mut InboundEmail) -> Result<()> + Send + Sync,
{
    fn process(&self, email: &mut InboundEmail) -> Result<()> {
        self(email)
    }
}

/// Accepts the email and leaves its status untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMailbox;

impl Mailbox for NoopMailbox {
    fn process(&self, _email: &mut InboundEmail) -> Result<()> {
        Ok(())
    }
}

/// Marks every email it receives as bounced.
#[derive(Debug, Clone, Copy, Default)]
pub struct BouncingMailbox;

impl Mailbox for BouncingMailbox {
    fn process(&self, email: &mut InboundEmail) -> Result<()> {
        info!(message_id = %email.message_id(), "mailbox_bouncing_email");
        email.bounced();
        Ok(())
    }
}

/// Marks every email it receives as delivered.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeliveringMailbox;

impl Mailbox for DeliveringMailbox {
    fn process(&self, email: &mut InboundEmail) -> Result<()> {
        email.delivered();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inbound::InboundEmailStatus;

    fn email() -> InboundEmail {
        InboundEmail::from_source("To: test@example.com\nSubject: hi\n\nBody").unwrap()
    }

    #[test]
    fn test_noop_leaves_pending() {
        let mut email = email();
        NoopMailbox.process(&mut email).unwrap();
        assert_eq!(email.status(), InboundEmailStatus::Pending);
    }

    #[test]
    fn test_bouncing_marks_bounced() {
        let mut email = email();
        BouncingMailbox.process(&mut email).unwrap();
        assert_eq!(email.status(), InboundEmailStatus::Bounced);
    }

    #[test]
    fn test_delivering_marks_delivered() {
        let mut email = email();
        DeliveringMailbox.process(&mut email).unwrap();
        assert_eq!(email.status(), InboundEmailStatus::Delivered);
    }

    #[test]
    fn test_closure_mailbox() {
        let mailbox = |email: &mut InboundEmail| -> Result<()> {
            email.failed();
            Ok(())
        };

        let mut email = email();
        mailbox.process(&mut email).unwrap();
        assert_eq!(email.status(), InboundEmailStatus::Failed);
    }
}
