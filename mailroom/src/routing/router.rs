//! First-match router over an ordered, validated routing table.

use tracing::debug;

use super::rule::{Destination, Matcher, RoutingRule};
use crate::error::ConfigError;
use crate::inbound::InboundEmail;

/// Collects routing rules in declaration order and validates them on
/// [`build`](RouterBuilder::build).
#[derive(Debug, Default)]
pub struct RouterBuilder {
    rules: Vec<RoutingRule>,
}

impl RouterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rule(mut self, matcher: Matcher, destination: impl Into<Destination>) -> Self {
        self.rules.push(RoutingRule::new(matcher, destination));
        self
    }

    /// Shorthand for the final catch-all rule.
    pub fn all(self, destination: impl Into<Destination>) -> Self {
        self.rule(Matcher::All, destination)
    }

    pub fn push(&mut self, rule: RoutingRule) {
        self.rules.push(rule);
    }

    /// Validate the table and produce a router.
    ///
    /// The table must be non-empty, end with a catch-all, and contain no
    /// catch-all before the end.
    pub fn build(self) -> Result<Router, ConfigError> {
        let last = self.rules.last().ok_or(ConfigError::EmptyRoutingTable)?;

        if !last.matcher.is_catch_all() {
            return Err(ConfigError::MissingCatchAll {
                last: last.destination.clone(),
            });
        }

        if let Some(position) = self.rules.iter().position(|r| r.matcher.is_catch_all()) {
            let unreachable = self.rules.len() - position - 1;
            if unreachable > 0 {
                return Err(ConfigError::UnreachableRules {
                    position,
                    unreachable,
                });
            }
        }

        Ok(Router { rules: self.rules })
    }
}

/// A routing table that is guaranteed to select a destination for every
/// inbound email.
#[derive(Debug, Clone)]
pub struct Router {
    rules: Vec<RoutingRule>,
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    /// Select the destination of the first matching rule.
    ///
    /// Never consults rules after the first match and holds no state, so the
    /// same email always routes the same way.
    pub fn route(&self, email: &InboundEmail) -> &Destination {
        match self.mailbox_for(email) {
            Some(destination) => destination,
            // build() guarantees the final rule is a catch-all
            None => &self.catch_all().destination,
        }
    }

    /// First matching destination, if any.
    pub fn mailbox_for(&self, email: &InboundEmail) -> Option<&Destination> {
        self.rules
            .iter()
            .enumerate()
            .find(|(_, rule)| rule.matcher.matches(email))
            .map(|(index, rule)| {
                debug!(
                    message_id = %email.message_id(),
                    rule_index = index,
                    destination = %rule.destination,
                    "routing_rule_matched"
                );
                &rule.destination
            })
    }

    pub fn rules(&self) -> &[RoutingRule] {
        &self.rules
    }

    /// Every destination named by the table, in declaration order, without
    /// duplicates.
    pub fn destinations(&self) -> Vec<&Destination> {
        let mut seen: Vec<&Destination> = Vec::new();
        for rule in &self.rules {
            if !seen.contains(&&rule.destination) {
                seen.push(&rule.destination);
            }
        }
        seen
    }

    fn catch_all(&self) -> &RoutingRule {
        &self.rules[self.rules.len() - 1]
    }
}
