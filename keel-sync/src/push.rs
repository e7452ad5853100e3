//! Push orchestration: diff, dispatch, commit.
//!
//! ## Per run
//!
//! 1. Categories are reconciled in fixed order (configuration, migrations,
//!    functions, workflows), never interleaved.
//! 2. Each category's change stream is cut into batches of at most
//!    `concurrency` changes. The calls of one batch run concurrently; the
//!    next batch starts only once the whole batch has been joined.
//! 3. Every accepted call commits exactly its own cache row. A rejected call
//!    commits nothing and does not stop its siblings.
//! 4. Rejections are collected and surfaced once, as
//!    [`SyncError::Rejected`], after all dispatchable work is done. A fatal
//!    error after some rejections arrives as [`SyncError::Aborted`] and
//!    still carries them.
//! 5. A batch is always joined in full, even when a cache commit fails, so
//!    no remote call outlives the run.

use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

use keel_core::layout::CONFIG_FILE;
use keel_core::ProjectId;

use crate::cache::{FingerprintTable, StateCache};
use crate::category::{Category, CategorySet};
use crate::detect::{self, Change, ChangeKind};
use crate::entity::{Entity, FunctionDir, FunctionFile, Fingerprinted, MigrationFile, WorkflowFile};
use crate::error::SyncError;
use crate::gateway::{RemoteError, RemoteGateway};
use crate::local::LocalState;
use crate::report::{CategoryReport, EntityFailure, PushReport};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PushOptions {
    /// Maximum number of remote calls in flight at once.
    pub concurrency: NonZeroUsize,
    pub include: CategorySet,
}

impl Default for PushOptions {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            include: CategorySet::all(),
        }
    }
}

/// Available hardware parallelism, or 1 when it cannot be determined.
pub fn default_concurrency() -> NonZeroUsize {
    std::thread::available_parallelism().unwrap_or(NonZeroUsize::MIN)
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// How one kind of entity is sent to the remote side and committed locally.
#[async_trait]
trait Dispatch: Entity + Sized + Send + Sync + 'static {
    const CATEGORY: Category;

    async fn send(
        change: &Change<Self>,
        gateway: &dyn RemoteGateway,
        project: &ProjectId,
    ) -> Result<(), RemoteError>;

    /// Record an accepted change in the cache.
    fn commit(change: &Change<Self>, cache: &mut StateCache) -> Result<(), SyncError>;
}

/// Shared commit rule for fingerprint-tracked entities.
fn commit_fingerprint<E: Fingerprinted>(
    table: FingerprintTable,
    change: &Change<E>,
    cache: &StateCache,
) -> Result<(), SyncError> {
    match change {
        Change::Created(entity) | Change::Updated(entity) => {
            cache.put_fingerprint(table, entity.key(), entity.fingerprint())
        }
        Change::Deleted(key) => cache.delete_fingerprint(table, key),
    }
}

#[async_trait]
impl Dispatch for MigrationFile {
    const CATEGORY: Category = Category::Migrations;

    async fn send(
        change: &Change<Self>,
        gateway: &dyn RemoteGateway,
        project: &ProjectId,
    ) -> Result<(), RemoteError> {
        match change {
            Change::Created(m) => gateway.create_migration(project, &m.file_name, &m.content).await,
            Change::Updated(m) => gateway.update_migration(project, &m.file_name, &m.content).await,
            Change::Deleted(key) => gateway.delete_migration(project, key).await,
        }
    }

    fn commit(change: &Change<Self>, cache: &mut StateCache) -> Result<(), SyncError> {
        commit_fingerprint(FingerprintTable::Migrations, change, cache)
    }
}

#[async_trait]
impl Dispatch for FunctionDir {
    const CATEGORY: Category = Category::Functions;

    async fn send(
        change: &Change<Self>,
        gateway: &dyn RemoteGateway,
        project: &ProjectId,
    ) -> Result<(), RemoteError> {
        match change {
            Change::Created(f) => gateway.create_function(project, &f.name).await,
            // Nothing to send for the function itself; its files follow.
            Change::Updated(_) => Ok(()),
            Change::Deleted(name) => gateway.delete_function(project, name).await,
        }
    }

    fn commit(change: &Change<Self>, cache: &mut StateCache) -> Result<(), SyncError> {
        match change {
            Change::Created(f) => cache.put_function(&f.name),
            Change::Updated(_) => Ok(()),
            Change::Deleted(name) => cache.delete_function(name),
        }
    }
}

#[async_trait]
impl Dispatch for FunctionFile {
    const CATEGORY: Category = Category::Functions;

    async fn send(
        change: &Change<Self>,
        gateway: &dyn RemoteGateway,
        project: &ProjectId,
    ) -> Result<(), RemoteError> {
        match change {
            Change::Created(f) => {
                gateway
                    .create_function_file(project, &f.function, &f.server_path, &f.content)
                    .await
            }
            Change::Updated(f) => {
                gateway
                    .update_function_file(project, &f.function, &f.server_path, &f.content)
                    .await
            }
            Change::Deleted(key) => {
                let Some((function, server_path)) = key.split_once('/') else {
                    return Err(RemoteError::new(format!("malformed function file key '{key}'")));
                };
                gateway
                    .delete_function_file(project, function, server_path)
                    .await
            }
        }
    }

    fn commit(change: &Change<Self>, cache: &mut StateCache) -> Result<(), SyncError> {
        commit_fingerprint(FingerprintTable::FunctionFiles, change, cache)
    }
}

#[async_trait]
impl Dispatch for WorkflowFile {
    const CATEGORY: Category = Category::Workflows;

    async fn send(
        change: &Change<Self>,
        gateway: &dyn RemoteGateway,
        project: &ProjectId,
    ) -> Result<(), RemoteError> {
        match change {
            Change::Created(w) => gateway.create_workflow(project, &w.definition).await,
            Change::Updated(w) => gateway.update_workflow(project, &w.definition).await,
            Change::Deleted(name) => gateway.delete_workflow(project, name).await,
        }
    }

    fn commit(change: &Change<Self>, cache: &mut StateCache) -> Result<(), SyncError> {
        commit_fingerprint(FingerprintTable::Workflows, change, cache)
    }
}

// ---------------------------------------------------------------------------
// Batching
// ---------------------------------------------------------------------------

/// Everything a run needs besides the cache.
struct Run<'a> {
    project: &'a ProjectId,
    gateway: Arc<dyn RemoteGateway>,
    concurrency: usize,
    failures: Vec<EntityFailure>,
}

impl Run<'_> {
    fn reject(&mut self, category: Category, key: String, message: String) {
        warn!(%category, %key, %message, "remote rejected change");
        self.failures.push(EntityFailure {
            category,
            key,
            message,
        });
    }

    /// Dispatch `changes` in batches and commit each accepted one.
    ///
    /// Returns the accepted changes, in dispatch order. A failed commit is
    /// reported as [`SyncError::Uncommitted`] once its batch has been joined.
    async fn dispatch<E: Dispatch>(
        &mut self,
        changes: impl IntoIterator<Item = Change<E>>,
        cache: &mut StateCache,
        report: &mut CategoryReport,
    ) -> Result<Vec<Change<E>>, SyncError> {
        let mut changes = changes.into_iter();
        let mut accepted = Vec::new();
        loop {
            let batch: Vec<Change<E>> = changes.by_ref().take(self.concurrency).collect();
            if batch.is_empty() {
                break;
            }
            debug!(category = %E::CATEGORY, size = batch.len(), "dispatching batch");

            let mut in_flight = Vec::with_capacity(batch.len());
            for change in batch {
                let key = change.key().to_string();
                let gateway = Arc::clone(&self.gateway);
                let project = self.project.clone();
                let handle = tokio::spawn(async move {
                    let result = E::send(&change, gateway.as_ref(), &project).await;
                    (change, result)
                });
                in_flight.push((key, handle));
            }

            // Join the whole batch before touching the cache so no call
            // outlives this run.
            let mut joined = Vec::with_capacity(in_flight.len());
            for (key, handle) in in_flight {
                joined.push((key, handle.await));
            }

            let mut commit_error = None;
            let mut uncommitted = Vec::new();
            for (key, outcome) in joined {
                match outcome {
                    Ok((change, Ok(()))) => {
                        if commit_error.is_some() {
                            uncommitted.push(key);
                            continue;
                        }
                        match E::commit(&change, cache) {
                            Ok(()) => {
                                report.record(change.kind());
                                info!(category = %E::CATEGORY, %key, kind = %change.kind(), "committed");
                                accepted.push(change);
                            }
                            Err(err) => {
                                warn!(category = %E::CATEGORY, %key, error = %err, "commit failed");
                                commit_error = Some(err);
                                uncommitted.push(key);
                            }
                        }
                    }
                    Ok((_, Err(err))) => {
                        report.failed += 1;
                        self.reject(E::CATEGORY, key, err.message);
                    }
                    Err(join) => {
                        report.failed += 1;
                        self.reject(E::CATEGORY, key, format!("remote call aborted: {join}"));
                    }
                }
            }
            if let Some(err) = commit_error {
                return Err(SyncError::Uncommitted {
                    category: E::CATEGORY,
                    keys: uncommitted,
                    source: Box::new(err),
                });
            }
        }
        Ok(accepted)
    }
}

// ---------------------------------------------------------------------------
// push
// ---------------------------------------------------------------------------

/// Reconcile the included categories of `local` with the remote project.
///
/// On partial failure, everything that was accepted stays committed in
/// `cache` and the error carries both the report and the rejections.
pub async fn push(
    project: &ProjectId,
    local: &LocalState,
    cache: &mut StateCache,
    gateway: Arc<dyn RemoteGateway>,
    options: &PushOptions,
) -> Result<PushReport, SyncError> {
    let mut run = Run {
        project,
        gateway,
        concurrency: options.concurrency.get(),
        failures: Vec::new(),
    };
    let mut report = PushReport::default();

    if let Err(err) = reconcile(&mut run, local, cache, options, &mut report).await {
        if run.failures.is_empty() {
            return Err(err);
        }
        return Err(SyncError::Aborted {
            failures: run.failures,
            source: Box::new(err),
        });
    }

    if run.failures.is_empty() {
        cache.touch_pushed_at(Utc::now())?;
        Ok(report)
    } else {
        Err(SyncError::Rejected {
            report: Box::new(report),
            failures: run.failures,
        })
    }
}

/// Every included category, in order. Stops at the first fatal error.
async fn reconcile(
    run: &mut Run<'_>,
    local: &LocalState,
    cache: &mut StateCache,
    options: &PushOptions,
    report: &mut PushReport,
) -> Result<(), SyncError> {
    for category in options.include.ordered() {
        info!(%category, "reconciling");
        match category {
            Category::Configuration => {
                report.config_applied = push_config(run, local, cache).await?;
            }
            Category::Migrations => {
                let changes = detect::detect(
                    local.migrations()?,
                    cache.fingerprints(FingerprintTable::Migrations)?,
                );
                run.dispatch(changes, cache, &mut report.migrations).await?;
            }
            Category::Functions => {
                push_functions(run, local, cache, report).await?;
            }
            Category::Workflows => {
                let changes = detect::detect(
                    local.workflows()?,
                    cache.fingerprints(FingerprintTable::Workflows)?,
                );
                run.dispatch(changes, cache, &mut report.workflows).await?;
            }
        }
    }
    Ok(())
}

async fn push_config(
    run: &mut Run<'_>,
    local: &LocalState,
    cache: &mut StateCache,
) -> Result<bool, SyncError> {
    let document = local.config()?;
    let baseline = cache.config_document()?.ok_or(SyncError::MissingBaseline)?;
    let patch = keel_patch::compile(&baseline, &document)?;
    if patch.is_empty() {
        debug!("configuration unchanged");
        return Ok(false);
    }

    match run.gateway.apply_config_patch(run.project, &patch).await {
        Ok(()) => {
            cache.set_config_document(&document)?;
            info!(
                capabilities = patch.capabilities.len(),
                instances = patch.instances.len(),
                "configuration patch applied"
            );
            Ok(true)
        }
        Err(err) => {
            run.reject(Category::Configuration, CONFIG_FILE.to_string(), err.message);
            Ok(false)
        }
    }
}

/// Functions go in two passes: the functions themselves, then the files of
/// every function that still exists remotely.
async fn push_functions(
    run: &mut Run<'_>,
    local: &LocalState,
    cache: &mut StateCache,
    report: &mut PushReport,
) -> Result<(), SyncError> {
    let changes = detect::detect_functions(local.functions()?, cache.function_names()?);

    let (updated, remote_ops): (Vec<_>, Vec<_>) = changes
        .into_iter()
        .partition(|c| c.kind() == ChangeKind::Updated);
    let accepted = run.dispatch(remote_ops, cache, &mut report.functions).await?;

    // Deleted or rejected functions never get their files diffed.
    let live = updated
        .iter()
        .chain(accepted.iter())
        .filter_map(Change::entity)
        .map(|f| f.name.clone());

    for function in live {
        let prefix = format!("{function}/");
        let files = detect::detect(
            local.function_files(&function)?,
            cache.fingerprints_with_prefix(FingerprintTable::FunctionFiles, &prefix)?,
        );
        run.dispatch(files, cache, &mut report.function_files).await?;
    }
    Ok(())
}
