//! Environment audit engine
//!
//! Runs a fixed battery of read-only checks against the container host and
//! folds the outcomes into a single report.

pub mod engine;
pub mod report;

pub use engine::run;
pub use report::{AuditReport, Outcome, Severity};
