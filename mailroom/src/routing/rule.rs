//! Routing rules: a matcher paired with the destination it selects.

use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::inbound::InboundEmail;

/// Name of a mailbox an inbound email can be routed to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Destination(String);

impl Destination {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Destination {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Arbitrary predicate over an inbound email.
pub type PredicateFn = dyn Fn(&InboundEmail) -> bool + Send + Sync;

/// Decides whether a rule applies to an inbound email.
#[derive(Clone)]
pub enum Matcher {
    /// Matches every email.
    All,
    /// Case-insensitive exact match against any recipient address.
    Address(String),
    /// Regex match against any recipient address.
    AddressPattern(Regex),
    /// Regex match against the subject.
    Subject(Regex),
    Predicate(Arc<PredicateFn>),
}

impl Matcher {
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&InboundEmail) -> bool + Send + Sync + 'static,
    {
        Matcher::Predicate(Arc::new(f))
    }

    pub fn is_catch_all(&self) -> bool {
        matches!(self, Matcher::All)
    }

    pub fn matches(&self, email: &InboundEmail) -> bool {
        match self {
            Matcher::All => true,
            Matcher::Address(address) => email
                .recipients()
                .any(|recipient| recipient.eq_ignore_ascii_case(address)),
            Matcher::AddressPattern(pattern) => {
                email.recipients().any(|recipient| pattern.is_match(recipient))
            }
            Matcher::Subject(pattern) => pattern.is_match(email.subject()),
            Matcher::Predicate(f) => f(email),
        }
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::All => f.write_str("All"),
            Matcher::Address(address) => f.debug_tuple("Address").field(address).finish(),
            Matcher::AddressPattern(re) => f.debug_tuple("AddressPattern").field(&re.as_str()).finish(),
            Matcher::Subject(re) => f.debug_tuple("Subject").field(&re.as_str()).finish(),
            Matcher::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// One entry of a routing table.
#[derive(Debug, Clone)]
pub struct RoutingRule {
    pub matcher: Matcher,
    pub destination: Destination,
}

impl RoutingRule {
    pub fn new(matcher: Matcher, destination: impl Into<Destination>) -> Self {
        Self {
            matcher,
            destination: destination.into(),
        }
    }
}
