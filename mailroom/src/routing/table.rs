//! Declarative routing tables loaded from JSON.
//!
//! ```json
//! {
//!   "rules": [
//!     { "when": { "subject": "test" }, "to": "first_case" },
//!     { "when": "all", "to": "defaults" }
//!   ]
//! }
//! ```
//!
//! Predicate rules cannot be expressed here; build those in code with
//! [`RouterBuilder`](super::RouterBuilder).

use std::path::Path;

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::router::{Router, RouterBuilder};
use super::rule::{Destination, Matcher, RoutingRule};
use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchConfig {
    All,
    Address(String),
    AddressPattern(String),
    Subject(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingRuleConfig {
    pub when: MatchConfig,
    pub to: Destination,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingTableConfig {
    pub rules: Vec<RoutingRuleConfig>,
}

impl RoutingTableConfig {
    /// Read a routing table from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read routing table {}", path.display()))?;
        let table: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse routing table {}", path.display()))?;

        info!(
            path = %path.display(),
            rule_count = table.rules.len(),
            "routing_table_loaded"
        );

        Ok(table)
    }

    /// Compile patterns and validate the table.
    pub fn into_router(self) -> Result<Router, ConfigError> {
        let mut builder = RouterBuilder::new();
        for rule in self.rules {
            builder.push(rule.compile()?);
        }
        builder.build()
    }
}

impl RoutingRuleConfig {
    fn compile(self) -> Result<RoutingRule, ConfigError> {
        let matcher = match self.when {
            MatchConfig::All => Matcher::All,
            MatchConfig::Address(address) => Matcher::Address(address),
            MatchConfig::AddressPattern(pattern) => {
                Matcher::AddressPattern(compile_pattern(pattern, &self.to)?)
            }
            MatchConfig::Subject(pattern) => Matcher::Subject(compile_pattern(pattern, &self.to)?),
        };
        Ok(RoutingRule::new(matcher, self.to))
    }
}

fn compile_pattern(pattern: String, destination: &Destination) -> Result<Regex, ConfigError> {
    Regex::new(&pattern).map_err(|source| ConfigError::InvalidPattern {
        pattern,
        destination: destination.clone(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inbound::InboundEmail;

    const TABLE: &str = r#"{
        "rules": [
            { "when": { "address": "support@example.com" }, "to": "support" },
            { "when": { "subject": "test" }, "to": "first_case" },
            { "when": "all", "to": "defaults" }
        ]
    }"#;

    #[test]
    fn test_table_deserialization() {
        let table: RoutingTableConfig = serde_json::from_str(TABLE).unwrap();

        assert_eq!(table.rules.len(), 3);
        assert_eq!(
            table.rules[0].when,
            MatchConfig::Address("support@example.com".to_string())
        );
        assert_eq!(table.rules[2].when, MatchConfig::All);
        assert_eq!(table.rules[2].to.as_str(), "defaults");
    }

    #[test]
    fn test_table_into_router() {
        let table: RoutingTableConfig = serde_json::from_str(TABLE).unwrap();
        let router = table.into_router().unwrap();

        let email =
            InboundEmail::from_source("To: someone@example.com\nSubject: test run\n\nBody").unwrap();
        assert_eq!(router.route(&email).as_str(), "first_case");
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let table = RoutingTableConfig {
            rules: vec![
                RoutingRuleConfig {
                    when: MatchConfig::Subject("(unclosed".to_string()),
                    to: Destination::new("broken"),
                },
                RoutingRuleConfig {
                    when: MatchConfig::All,
                    to: Destination::new("defaults"),
                },
            ],
        };

        match table.into_router().unwrap_err() {
            ConfigError::InvalidPattern {
                pattern,
                destination,
                ..
            } => {
                assert_eq!(pattern, "(unclosed");
                assert_eq!(destination.as_str(), "broken");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_table_without_catch_all_rejected() {
        let table: RoutingTableConfig =
            serde_json::from_str(r#"{ "rules": [ { "when": { "subject": "x" }, "to": "x" } ] }"#)
                .unwrap();

        assert!(matches!(
            table.into_router(),
            Err(ConfigError::MissingCatchAll { .. })
        ));
    }

    #[test]
    fn test_from_json_file_missing() {
        let result = RoutingTableConfig::from_json_file(Path::new("/nonexistent/routes.json"));
        assert!(result.is_err());
    }
}
