//! Violation journal
//!
//! This crate provides:
//! - Violation keys (target selector + rule id)
//! - The append-only seen-violations set
//! - Report filtering so each (element, rule) pair surfaces once

pub mod seen;

// Re-exports
pub use seen::{SeenViolations, ViolationKey};
