//! Dry-run view of what a push would do. Never calls the remote side and
//! never writes to the cache.

use serde::Serialize;

use keel_patch::ConfigPatch;

use crate::cache::{FingerprintTable, StateCache};
use crate::category::{Category, CategorySet};
use crate::detect::{self, Change, ChangeKind};
use crate::entity::Entity;
use crate::error::SyncError;
use crate::local::LocalState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingChange {
    pub category: Category,
    pub kind: ChangeKind,
    pub key: String,
}

impl PendingChange {
    fn from_change<E: Entity>(category: Category, change: &Change<E>) -> Self {
        Self {
            category,
            kind: change.kind(),
            key: change.key().to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushPlan {
    /// `None` when configuration is excluded or unchanged.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_patch: Option<ConfigPatch>,
    pub changes: Vec<PendingChange>,
}

impl PushPlan {
    pub fn is_empty(&self) -> bool {
        self.config_patch.is_none() && self.changes.is_empty()
    }
}

/// Compute the pending changes of the included categories.
pub fn plan(
    local: &LocalState,
    cache: &StateCache,
    include: &CategorySet,
) -> Result<PushPlan, SyncError> {
    let mut plan = PushPlan::default();

    for category in include.ordered() {
        match category {
            Category::Configuration => {
                let document = local.config()?;
                let baseline = cache.config_document()?.ok_or(SyncError::MissingBaseline)?;
                let patch = keel_patch::compile(&baseline, &document)?;
                if !patch.is_empty() {
                    plan.config_patch = Some(patch);
                }
            }
            Category::Migrations => {
                let changes = detect::detect(
                    local.migrations()?,
                    cache.fingerprints(FingerprintTable::Migrations)?,
                );
                plan.changes
                    .extend(changes.map(|c| PendingChange::from_change(category, &c)));
            }
            Category::Functions => {
                let functions =
                    detect::detect_functions(local.functions()?, cache.function_names()?);
                for change in functions {
                    if change.kind() != ChangeKind::Updated {
                        plan.changes.push(PendingChange::from_change(category, &change));
                    }
                    let Some(function) = change.entity() else {
                        continue;
                    };
                    let files = detect::detect(
                        local.function_files(&function.name)?,
                        cache.fingerprints_with_prefix(
                            FingerprintTable::FunctionFiles,
                            &format!("{}/", function.name),
                        )?,
                    );
                    plan.changes
                        .extend(files.map(|c| PendingChange::from_change(category, &c)));
                }
            }
            Category::Workflows => {
                let changes = detect::detect(
                    local.workflows()?,
                    cache.fingerprints(FingerprintTable::Workflows)?,
                );
                plan.changes
                    .extend(changes.map(|c| PendingChange::from_change(category, &c)));
            }
        }
    }
    Ok(plan)
}
