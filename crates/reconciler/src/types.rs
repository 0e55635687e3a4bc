//! Outcomes of reconciling records.

use std::fmt;

/// What one reconciliation of a record did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The external resource was created.
    Created,
    /// The external resource was updated.
    Updated,
    /// The external resource already matched; nothing was done.
    UpToDate,
    /// The external resource is gone and the record was removed.
    Deleted,
    /// The record no longer exists.
    Missing,
}

impl ReconcileOutcome {
    /// Whether the external system was changed.
    pub const fn changed(self) -> bool {
        matches!(self, Self::Created | Self::Updated | Self::Deleted)
    }
}

impl fmt::Display for ReconcileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::UpToDate => "up to date",
            Self::Deleted => "deleted",
            Self::Missing => "missing",
        };
        f.write_str(name)
    }
}

/// Summary of one pass over every record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub created: usize,
    pub updated: usize,
    pub up_to_date: usize,
    pub deleted: usize,
    pub missing: usize,
    /// `(record name, error message)` for each failed reconciliation.
    pub failed: Vec<(String, String)>,
}

impl CycleReport {
    /// Count one outcome.
    pub fn record(&mut self, outcome: ReconcileOutcome) {
        let counter = match outcome {
            ReconcileOutcome::Created => &mut self.created,
            ReconcileOutcome::Updated => &mut self.updated,
            ReconcileOutcome::UpToDate => &mut self.up_to_date,
            ReconcileOutcome::Deleted => &mut self.deleted,
            ReconcileOutcome::Missing => &mut self.missing,
        };
        *counter = counter.saturating_add(1);
    }

    /// Note a failed reconciliation.
    pub fn fail(&mut self, name: impl Into<String>, error: impl fmt::Display) {
        self.failed.push((name.into(), error.to_string()));
    }

    /// Records reconciled, successfully or not.
    pub fn total(&self) -> usize {
        [
            self.created,
            self.updated,
            self.up_to_date,
            self.deleted,
            self.missing,
            self.failed.len(),
        ]
        .iter()
        .fold(0usize, |acc, n| acc.saturating_add(*n))
    }

    /// Every reconciliation succeeded.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} created, {} updated, {} up to date, {} deleted, {} failed",
            self.created,
            self.updated,
            self.up_to_date,
            self.deleted,
            self.failed.len()
        )
    }
}
