//! Rule types and configuration structures.

use serde::{Deserialize, Serialize};

/// Admission verdict for a connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Keep the connection open and hand it downstream
    Allow,
    /// Close the connection immediately
    #[default]
    Deny,
}

impl Verdict {
    /// Check whether this verdict admits the connection.
    pub fn is_allow(&self) -> bool {
        matches!(self, Verdict::Allow)
    }
}

/// Firewall configuration from YAML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FirewallConfig {
    /// Admission rules, evaluated in order; the first match wins
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

/// A single rule entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Peer address to match (textual IPv4/IPv6 literal, compared exactly)
    pub address: String,

    /// Peer source port to match
    pub port: u16,

    /// Verdict when both address and port match
    pub verdict: Verdict,
}

/// Firewall error types.
#[derive(Debug, thiserror::Error)]
pub enum FirewallError {
    #[error("rule {index}: address must not be empty")]
    EmptyAddress { index: usize },
}
