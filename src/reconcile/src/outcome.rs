//! Per-unit outcome accounting
//!
//! Reconcilers keep going past individual failures and return a
//! [`RunReport`]; the caller decides the exit status from it.

use serde::Serialize;
use std::fmt;

/// What happened to one unit of work
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum OutcomeStatus {
    Created,
    Updated,
    AlreadyPresent,
    Deleted,
    Restored,
    Verified,
    /// Intentionally not acted on; counts as success
    Skipped(String),
    /// Informational; never affects the exit status on its own
    Warning(String),
    Failed(String),
}

impl OutcomeStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, OutcomeStatus::Failed(_))
    }

    pub fn is_warning(&self) -> bool {
        matches!(self, OutcomeStatus::Warning(_))
    }
}

/// Outcome of one named unit of work (a scope, a role, a lock)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitOutcome {
    pub unit: String,
    #[serde(flatten)]
    pub status: OutcomeStatus,
}

/// Ordered accumulator of unit outcomes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    outcomes: Vec<UnitOutcome>,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, unit: impl Into<String>, status: OutcomeStatus) {
        self.outcomes.push(UnitOutcome {
            unit: unit.into(),
            status,
        });
    }

    pub fn skipped(&mut self, unit: impl Into<String>, reason: impl Into<String>) {
        self.record(unit, OutcomeStatus::Skipped(reason.into()));
    }

    pub fn warn(&mut self, unit: impl Into<String>, message: impl Into<String>) {
        self.record(unit, OutcomeStatus::Warning(message.into()));
    }

    pub fn fail(&mut self, unit: impl Into<String>, reason: impl Into<String>) {
        self.record(unit, OutcomeStatus::Failed(reason.into()));
    }

    /// Append another report's outcomes after this one's
    pub fn merge(&mut self, other: RunReport) {
        self.outcomes.extend(other.outcomes);
    }

    pub fn outcomes(&self) -> &[UnitOutcome] {
        &self.outcomes
    }

    pub fn failures(&self) -> impl Iterator<Item = &UnitOutcome> {
        self.outcomes.iter().filter(|o| o.status.is_failure())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &UnitOutcome> {
        self.outcomes.iter().filter(|o| o.status.is_warning())
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    /// Outcome recorded for a unit, the last one if there are several
    pub fn status_of(&self, unit: &str) -> Option<&OutcomeStatus> {
        self.outcomes
            .iter()
            .rev()
            .find(|o| o.unit == unit)
            .map(|o| &o.status)
    }

    pub fn summary(&self) -> ReportSummary {
        let mut summary = ReportSummary::default();
        for outcome in &self.outcomes {
            match outcome.status {
                OutcomeStatus::Skipped(_) => summary.skipped += 1,
                OutcomeStatus::Warning(_) => summary.warnings += 1,
                OutcomeStatus::Failed(_) => summary.failed += 1,
                _ => summary.succeeded += 1,
            }
        }
        summary
    }
}

/// Counts per outcome class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub succeeded: usize,
    pub skipped: usize,
    pub warnings: usize,
    pub failed: usize,
}

impl fmt::Display for ReportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} succeeded, {} skipped, {} warnings, {} failed",
            self.succeeded, self.skipped, self.warnings, self.failed
        )
    }
}
