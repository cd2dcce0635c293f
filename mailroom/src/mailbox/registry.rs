//! Explicit destination → mailbox bindings, supplied at startup.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::info;

use super::Mailbox;
use crate::error::ConfigError;
use crate::routing::Destination;

#[derive(Default, Clone)]
pub struct MailboxRegistry {
    mailboxes: HashMap<Destination, Arc<dyn Mailbox>>,
}

impl MailboxRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a mailbox to a destination. Each destination may be bound once.
    pub fn register<M>(&mut self, destination: impl Into<Destination>, mailbox: M) -> Result<(), ConfigError>
    where
        M: Mailbox + 'static,
    {
        let destination = destination.into();
        if self.mailboxes.contains_key(&destination) {
            return Err(ConfigError::DuplicateMailbox(destination));
        }

        info!(destination = %destination, "mailbox_registered");
        self.mailboxes.insert(destination, Arc::new(mailbox));
        Ok(())
    }

    /// Builder-style [`register`](Self::register).
    pub fn with<M>(mut self, destination: impl Into<Destination>, mailbox: M) -> Result<Self, ConfigError>
    where
        M: Mailbox + 'static,
    {
        self.register(destination, mailbox)?;
        Ok(self)
    }

    pub fn get(&self, destination: &Destination) -> Option<&Arc<dyn Mailbox>> {
        self.mailboxes.get(destination)
    }

    pub fn contains(&self, destination: &Destination) -> bool {
        self.mailboxes.contains_key(destination)
    }

    pub fn len(&self) -> usize {
        self.mailboxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mailboxes.is_empty()
    }
}

impl fmt::Debug for MailboxRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.mailboxes.keys().map(Destination::as_str).collect();
        names.sort_unstable();
        f.debug_struct("MailboxRegistry").field("mailboxes", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailbox::{BouncingMailbox, NoopMailbox};

    #[test]
    fn test_register_and_lookup() {
        let registry = MailboxRegistry::new()
            .with("first_case", NoopMailbox)
            .unwrap()
            .with("defaults", BouncingMailbox)
            .unwrap();

        assert_eq!(registry.len(), 2);
        assert!(registry.contains(&Destination::new("defaults")));
        assert!(registry.get(&Destination::new("missing")).is_none());
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = MailboxRegistry::new();
        registry.register("defaults", NoopMailbox).unwrap();

        let err = registry.register("defaults", BouncingMailbox).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateMailbox(d) if d.as_str() == "defaults"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_debug_lists_sorted_names() {
        let registry = MailboxRegistry::new()
            .with("b", NoopMailbox)
            .unwrap()
            .with("a", NoopMailbox)
            .unwrap();

        assert_eq!(
            format!("{:?}", registry),
            r#"MailboxRegistry { mailboxes: ["a", "b"] }"#
        );
    }
}
