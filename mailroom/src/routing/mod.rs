//! Inbound email routing.
//!
//! A [`Router`] holds an ordered list of [`RoutingRule`]s. Rules are
//! evaluated in declaration order and the first match selects the
//! destination; the table must end with a catch-all so every email lands
//! somewhere.

pub mod router;
pub mod rule;
pub mod table;

pub use router::{Router, RouterBuilder};
pub use rule::{Destination, Matcher, PredicateFn, RoutingRule};
pub use table::{MatchConfig, RoutingRuleConfig, RoutingTableConfig};
