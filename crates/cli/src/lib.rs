//! Axewatch command-line support
//!
//! This crate provides:
//! - `axewatch.toml` loading and validation
//! - The console color theme and grouped violation reporter
//! - Session files and their replay against the engine

pub mod config;
pub mod report;
pub mod session;
pub mod theme;

pub use config::{AxewatchConfig, ConsoleConfig};
pub use report::{ConsoleReporter, ReportTotals};
pub use session::{replay, ReplaySummary, Session, SessionError, Step};
pub use theme::{Appearance, ConsoleTheme};
