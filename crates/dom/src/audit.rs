//! Audit result data model
//!
//! Mirrors the v2 reporter shape returned by the accessibility rule
//! engine, so results can be loaded straight from JSON.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    /// Minor
    Minor,
    /// Moderate
    Moderate,
    /// Serious
    Serious,
    /// Critical
    Critical,
}

impl Impact {
    /// Lowercase name as the rule engine spells it
    pub fn as_str(self) -> &'static str {
        match self {
            Impact::Minor => "minor",
            Impact::Moderate => "moderate",
            Impact::Serious => "serious",
            Impact::Critical => "critical",
        }
    }
}

impl fmt::Display for Impact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which check list of a node result to read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckKind {
    /// Passing any one of these checks satisfies the rule
    Any,
    /// Every one of these checks must pass
    All,
    /// None of these checks may match
    None,
}

/// Full output of one audit pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditResults {
    /// Rules that failed, with the nodes they failed on
    #[serde(default)]
    pub violations: Vec<RuleResult>,
}

/// One rule and the nodes it failed on
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleResult {
    /// Rule identifier, e.g. `color-contrast`
    pub id: String,
    #[serde(default)]
    pub impact: Option<Impact>,
    #[serde(default)]
    pub help: String,
    #[serde(default)]
    pub help_url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub nodes: Vec<NodeResult>,
}

/// A rule failure against one element
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeResult {
    /// Selector parts locating the element (one per frame / shadow root)
    pub target: Vec<String>,
    #[serde(default)]
    pub html: String,
    #[serde(default)]
    pub impact: Option<Impact>,
    #[serde(default)]
    pub any: Vec<CheckResult>,
    #[serde(default)]
    pub all: Vec<CheckResult>,
    #[serde(default)]
    pub none: Vec<CheckResult>,
}

impl NodeResult {
    /// Node result for a single selector, with no checks attached
    pub fn at(selector: impl Into<String>) -> Self {
        Self {
            target: vec![selector.into()],
            ..Self::default()
        }
    }

    /// Serialized target: selector parts joined with `,`
    pub fn selector(&self) -> String {
        self.target.join(",")
    }

    /// Checks of the given kind
    pub fn checks(&self, kind: CheckKind) -> &[CheckResult] {
        match kind {
            CheckKind::Any => &self.any,
            CheckKind::All => &self.all,
            CheckKind::None => &self.none,
        }
    }

    /// Related nodes across every check of the given kind
    pub fn related_nodes(&self, kind: CheckKind) -> impl Iterator<Item = &RelatedNode> {
        self.checks(kind).iter().flat_map(|c| c.related_nodes.iter())
    }
}

/// Outcome of one check against an element
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    pub id: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub related_nodes: Vec<RelatedNode>,
}

/// Another element involved in a check failure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelatedNode {
    pub target: Vec<String>,
    #[serde(default)]
    pub html: String,
}

impl RelatedNode {
    /// Serialized target, as for [`NodeResult::selector`]
    pub fn selector(&self) -> String {
        self.target.join(",")
    }
}
