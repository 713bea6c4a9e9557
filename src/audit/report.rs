//! Audit outcome and report types

use serde::Serialize;
use std::fmt;
use std::io::{self, Write};

/// Severity class of a single check outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Pass,
    Warn,
    Fail,
}

impl Severity {
    /// Fixed-width tag used as the line prefix in human output
    pub fn tag(&self) -> &'static str {
        match self {
            Severity::Pass => "PASS",
            Severity::Warn => "WARN",
            Severity::Fail => "FAIL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// Outcome of one check: severity plus a human-readable message
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    pub severity: Severity,
    pub message: String,
}

impl Outcome {
    pub fn pass(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Pass,
            message: message.into(),
        }
    }

    pub fn warn(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warn,
            message: message.into(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Fail,
            message: message.into(),
        }
    }

    pub fn is_fail(&self) -> bool {
        self.severity == Severity::Fail
    }
}

/// A check label paired with its outcome
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub name: String,
    #[serde(flatten)]
    pub outcome: Outcome,
}

/// Ordered outcomes of one audit run
///
/// Counters are derived from the outcome sequence, so they can never drift
/// from the recorded results.
#[derive(Debug, Default)]
pub struct AuditReport {
    results: Vec<CheckResult>,
}

impl AuditReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one check's outcome
    pub fn record(&mut self, name: &str, outcome: Outcome) {
        self.results.push(CheckResult {
            name: name.to_string(),
            outcome,
        });
    }

    pub fn results(&self) -> &[CheckResult] {
        &self.results
    }

    pub fn passed(&self) -> usize {
        self.count(Severity::Pass)
    }

    pub fn warned(&self) -> usize {
        self.count(Severity::Warn)
    }

    pub fn failed(&self) -> usize {
        self.count(Severity::Fail)
    }

    fn count(&self, severity: Severity) -> usize {
        self.results
            .iter()
            .filter(|r| r.outcome.severity == severity)
            .count()
    }

    /// Overall health: no failed checks
    pub fn is_healthy(&self) -> bool {
        self.failed() == 0
    }

    /// Process exit code: zero iff healthy, warnings notwithstanding
    pub fn exit_code(&self) -> i32 {
        if self.is_healthy() { 0 } else { 1 }
    }

    /// Render one line per check, the count summary, and the verdict
    pub fn render(&self, out: &mut impl Write) -> io::Result<()> {
        for result in &self.results {
            writeln!(
                out,
                "[{}] {}: {}",
                result.outcome.severity.tag(),
                result.name,
                result.outcome.message
            )?;
        }

        writeln!(
            out,
            "\n{} checks: {} passed, {} warnings, {} failures",
            self.results.len(),
            self.passed(),
            self.warned(),
            self.failed()
        )?;

        if self.is_healthy() {
            writeln!(out, "Host is ready to run containers")
        } else {
            writeln!(out, "Host is not ready: {} check(s) failed", self.failed())
        }
    }

    /// Serialize the full report for `--json` output
    pub fn to_json(&self) -> crate::error::Result<String> {
        let value = serde_json::json!({
            "checks": self.results,
            "passed": self.passed(),
            "warned": self.warned(),
            "failed": self.failed(),
            "healthy": self.is_healthy(),
        });
        Ok(serde_json::to_string_pretty(&value)?)
    }
}
