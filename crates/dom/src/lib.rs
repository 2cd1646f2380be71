//! Document model for Axewatch
//!
//! This crate provides:
//! - Arena-backed document tree with stable node handles
//! - Markup specs for building trees and HTML snippets for reports
//! - Root-to-node paths and common ancestor resolution
//! - Audit result data model (violations, node results, checks)

pub mod ancestor;
pub mod audit;
pub mod error;
pub mod markup;
pub mod tree;

// Re-export main types for convenience
pub use ancestor::{common_ancestor, path_to, resolve_scope, ScanScope};
pub use audit::{AuditResults, CheckKind, CheckResult, Impact, NodeResult, RelatedNode, RuleResult};
pub use error::DomError;
pub use markup::ElementSpec;
pub use tree::{Document, NodeId, NodeKind, SharedDocument};

/// Result type for document operations
pub type Result<T> = std::result::Result<T, DomError>;
