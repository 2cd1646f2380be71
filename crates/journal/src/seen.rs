//! Append-only set of reported violations

use ahash::AHashSet;
use dom::{NodeResult, RuleResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Identity of a reported violation: which element, which rule
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ViolationKey {
    /// Serialized target selector of the element
    pub selector: String,
    /// Rule identifier
    pub rule_id: String,
}

impl ViolationKey {
    /// Create a key from its parts
    pub fn new(selector: impl Into<String>, rule_id: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            rule_id: rule_id.into(),
        }
    }

    /// Key for one node of a rule result
    pub fn for_node(rule: &RuleResult, node: &NodeResult) -> Self {
        Self::new(node.selector(), rule.id.as_str())
    }
}

impl fmt::Display for ViolationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.selector, self.rule_id)
    }
}

/// Every violation reported so far
///
/// Keys are only ever added. Share one instance between engines (behind an
/// `Arc`) to deduplicate across them.
#[derive(Default)]
pub struct SeenViolations {
    keys: RwLock<AHashSet<ViolationKey>>,
}

impl SeenViolations {
    /// Create an empty journal
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop already-reported nodes from `violations`
    ///
    /// Every surviving node's key is recorded, so a key that appears twice
    /// in the same batch survives only the first time. Rules left without
    /// nodes are dropped; ordering is otherwise preserved.
    pub fn filter(&self, violations: Vec<RuleResult>) -> Vec<RuleResult> {
        let mut keys = self.keys.write();
        let mut dropped = 0usize;

        let kept: Vec<RuleResult> = violations
            .into_iter()
            .filter_map(|mut rule| {
                let before = rule.nodes.len();
                let nodes = std::mem::take(&mut rule.nodes);
                let rule_id = rule.id.as_str();
                let kept_nodes: Vec<NodeResult> = nodes
                    .into_iter()
                    .filter(|node| keys.insert(ViolationKey::new(node.selector(), rule_id)))
                    .collect();
                rule.nodes = kept_nodes;
                dropped += before - rule.nodes.len();
                (!rule.nodes.is_empty()).then_some(rule)
            })
            .collect();

        debug!(
            kept = kept.len(),
            dropped_nodes = dropped,
            journal_size = keys.len(),
            "filtered violations against journal"
        );
        kept
    }

    /// Record a key, returning `true` if it was new
    pub fn record(&self, key: ViolationKey) -> bool {
        self.keys.write().insert(key)
    }

    /// Check whether a key has been reported
    pub fn contains(&self, key: &ViolationKey) -> bool {
        self.keys.read().contains(key)
    }

    /// Number of recorded keys
    pub fn len(&self) -> usize {
        self.keys.read().len()
    }

    /// Whether nothing has been reported yet
    pub fn is_empty(&self) -> bool {
        self.keys.read().is_empty()
    }
}

impl fmt::Debug for SeenViolations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeenViolations")
            .field("len", &self.len())
            .finish()
    }
}
