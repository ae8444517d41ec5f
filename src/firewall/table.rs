//! Rule table evaluation.
//!
//! Ordered first-match-wins scan over exact (address, port) rules.
//! No rule matching a query resolves to deny; that is the fail-closed
//! policy outcome, not an error.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use super::types::{FirewallConfig, FirewallError, Verdict};

/// A compiled admission rule.
#[derive(Debug)]
struct Rule {
    address: String,
    port: u16,
    verdict: Verdict,
    /// Hit counter (observability only)
    counter: AtomicU64,
}

impl Rule {
    /// Exact match on both address and port.
    fn matches(&self, address: &str, port: u16) -> bool {
        self.port == port && self.address == address
    }
}

/// Ordered table of admission rules.
///
/// Populated before the gate starts accepting and immutable afterwards;
/// shared across connection tasks via `Arc` without locking.
#[derive(Debug)]
pub struct RuleTable {
    rules: Vec<Rule>,
    /// Queries that matched no rule and fell through to deny
    default_denials: AtomicU64,
}

impl RuleTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            default_denials: AtomicU64::new(0),
        }
    }

    /// Build a table from configuration, preserving rule order.
    pub fn from_config(config: &FirewallConfig) -> Result<Self, FirewallError> {
        let mut table = Self::new();
        for (index, rule) in config.rules.iter().enumerate() {
            if rule.address.is_empty() {
                return Err(FirewallError::EmptyAddress { index });
            }
            table.add(&rule.address, rule.port, rule.verdict);
        }
        Ok(table)
    }

    /// Append a rule to the end of the table.
    ///
    /// Earlier rules shadow later ones with the same (address, port).
    pub fn add(&mut self, address: &str, port: u16, verdict: Verdict) {
        self.rules.push(Rule {
            address: address.to_string(),
            port,
            verdict,
            counter: AtomicU64::new(0),
        });
    }

    /// Evaluate a peer against the table.
    ///
    /// Scans from the front and returns the verdict of the first rule
    /// whose address and port both match exactly. No match is a deny.
    pub fn evaluate(&self, address: &str, port: u16) -> Verdict {
        for rule in &self.rules {
            if rule.matches(address, port) {
                rule.counter.fetch_add(1, Ordering::Relaxed);
                debug!(
                    address = %address,
                    port = port,
                    verdict = ?rule.verdict,
                    "rule matched"
                );
                return rule.verdict;
            }
        }

        self.default_denials.fetch_add(1, Ordering::Relaxed);
        Verdict::Deny
    }

    /// Evaluate an accepted peer address.
    pub fn verdict_for(&self, peer: SocketAddr) -> Verdict {
        self.evaluate(&peer.ip().to_string(), peer.port())
    }

    /// Number of rules in the table.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Check if the table has no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Get statistics about table operation.
    pub fn stats(&self) -> TableStats {
        let mut rule_hits = HashMap::new();
        for rule in &self.rules {
            let key = format!("{}:{}", rule.address, rule.port);
            let hits = rule.counter.load(Ordering::Relaxed);
            *rule_hits.entry(key).or_insert(0) += hits;
        }

        TableStats {
            rules: self.rules.len(),
            rule_hits,
            default_denials: self.default_denials.load(Ordering::Relaxed),
        }
    }
}

impl Default for RuleTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Rule table statistics.
#[derive(Debug, Clone)]
pub struct TableStats {
    pub rules: usize,
    pub rule_hits: HashMap<String, u64>,
    pub default_denials: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firewall::types::RuleConfig;

    #[test]
    fn test_empty_table_denies() {
        let table = RuleTable::new();
        assert_eq!(table.evaluate("10.0.0.1", 80), Verdict::Deny);
        assert_eq!(table.evaluate("::1", 443), Verdict::Deny);
    }

    #[test]
    fn test_exact_match_only() {
        let mut table = RuleTable::new();
        table.add("10.0.0.1", 80, Verdict::Allow);

        assert_eq!(table.evaluate("10.0.0.1", 80), Verdict::Allow);
        // Same address, different port
        assert_eq!(table.evaluate("10.0.0.1", 81), Verdict::Deny);
        // Different address, same port
        assert_eq!(table.evaluate("10.0.0.2", 80), Verdict::Deny);
    }

    #[test]
    fn test_first_match_wins() {
        let mut table = RuleTable::new();
        table.add("10.0.0.1", 80, Verdict::Deny);
        table.add("10.0.0.1", 80, Verdict::Allow);

        // The later conflicting allow is shadowed
        assert_eq!(table.evaluate("10.0.0.1", 80), Verdict::Deny);
    }

    #[test]
    fn test_add_has_no_retroactive_effect() {
        let mut table = RuleTable::new();
        table.add("10.0.0.1", 80, Verdict::Allow);

        assert_eq!(table.evaluate("10.0.0.1", 80), Verdict::Allow);
        assert_eq!(table.evaluate("10.0.0.2", 22), Verdict::Deny);

        table.add("10.0.0.2", 22, Verdict::Allow);

        // Non-overlapping earlier query is unaffected
        assert_eq!(table.evaluate("10.0.0.1", 80), Verdict::Allow);
        assert_eq!(table.evaluate("10.0.0.2", 22), Verdict::Allow);
    }

    #[test]
    fn test_textual_address_comparison() {
        let mut table = RuleTable::new();
        table.add("192.168.001.1", 80, Verdict::Allow);

        // No normalization of literals; comparison is textual
        assert_eq!(table.evaluate("192.168.1.1", 80), Verdict::Deny);
        assert_eq!(table.evaluate("192.168.001.1", 80), Verdict::Allow);
    }

    #[test]
    fn test_verdict_for_socket_addr() {
        let mut table = RuleTable::new();
        table.add("127.0.0.1", 4000, Verdict::Allow);

        let peer: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        assert_eq!(table.verdict_for(peer), Verdict::Allow);

        let other: SocketAddr = "127.0.0.1:4001".parse().unwrap();
        assert_eq!(table.verdict_for(other), Verdict::Deny);
    }

    #[test]
    fn test_from_config_preserves_order() {
        let config = FirewallConfig {
            rules: vec![
                RuleConfig {
                    address: "10.0.0.1".to_string(),
                    port: 80,
                    verdict: Verdict::Deny,
                },
                RuleConfig {
                    address: "10.0.0.1".to_string(),
                    port: 80,
                    verdict: Verdict::Allow,
                },
            ],
        };

        let table = RuleTable::from_config(&config).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.evaluate("10.0.0.1", 80), Verdict::Deny);
    }

    #[test]
    fn test_from_config_rejects_empty_address() {
        let config = FirewallConfig {
            rules: vec![RuleConfig {
                address: String::new(),
                port: 80,
                verdict: Verdict::Allow,
            }],
        };

        let err = RuleTable::from_config(&config).unwrap_err();
        assert!(matches!(err, FirewallError::EmptyAddress { index: 0 }));
    }

    #[test]
    fn test_stats_counts_hits_and_default_denials() {
        let mut table = RuleTable::new();
        table.add("10.0.0.1", 80, Verdict::Allow);

        table.evaluate("10.0.0.1", 80);
        table.evaluate("10.0.0.1", 80);
        table.evaluate("10.9.9.9", 9);

        let stats = table.stats();
        assert_eq!(stats.rules, 1);
        assert_eq!(stats.rule_hits.get("10.0.0.1:80"), Some(&2));
        assert_eq!(stats.default_denials, 1);
    }
}
