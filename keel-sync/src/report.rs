//! Outcome of a push run.

use std::fmt;

use serde::Serialize;

use crate::category::Category;
use crate::detect::ChangeKind;

/// A remote rejection of one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityFailure {
    pub category: Category,
    pub key: String,
    pub message: String,
}

impl fmt::Display for EntityFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.category, self.key, self.message)
    }
}

/// Accepted changes (and rejections) in one category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CategoryReport {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub failed: usize,
}

impl CategoryReport {
    pub(crate) fn record(&mut self, kind: ChangeKind) {
        match kind {
            ChangeKind::Created => self.created += 1,
            ChangeKind::Updated => self.updated += 1,
            ChangeKind::Deleted => self.deleted += 1,
        }
    }

    /// Number of accepted changes.
    pub fn applied(&self) -> usize {
        self.created + self.updated + self.deleted
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PushReport {
    /// Whether a non-empty configuration patch was accepted.
    pub config_applied: bool,
    pub migrations: CategoryReport,
    /// Function-level creations and deletions.
    pub functions: CategoryReport,
    pub function_files: CategoryReport,
    pub workflows: CategoryReport,
}

impl PushReport {
    /// True when the run issued no accepted remote operation at all.
    pub fn is_noop(&self) -> bool {
        !self.config_applied
            && self.migrations.applied() == 0
            && self.functions.applied() == 0
            && self.function_files.applied() == 0
            && self.workflows.applied() == 0
    }
}
