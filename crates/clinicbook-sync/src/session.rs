// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use clinicbook_app::{
    ColumnSpec, GridValue, Partition, RecordId, RecordPatch, RecordStore, SheetKind, StoreError,
    upsert,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

use crate::changes::ChangeOutcome;
use crate::debounce::{DEFAULT_DEBOUNCE, Debouncer};
use crate::error::SyncError;
use crate::grid::{CellChange, ChangeSource};
use crate::identity::RowIdentity;
use crate::model::{DEFAULT_TARGET_ROWS, SheetModel, SheetStatus};
use crate::partition::FetchOutcome;
use crate::persist::{CommitOutcome, SaveOp, SaveReport};
use crate::reorder::{ReorderOutcome, UndoAction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Rows the displayed list is padded to.
    pub target_rows: usize,
    /// Quiet period after the last edit before a save pass runs.
    pub debounce: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            target_rows: DEFAULT_TARGET_ROWS,
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

/// Async driver for one sheet view.
///
/// Grid callbacks mutate the model synchronously; store calls run with the
/// model unlocked and report back through model methods. Saves are debounced
/// and serialized: at most one save pass talks to the store at a time.
#[derive(Clone)]
pub struct SheetSession {
    inner: Arc<Inner>,
}

struct Inner {
    model: Mutex<SheetModel>,
    store: Arc<dyn RecordStore>,
    debouncer: Mutex<Debouncer>,
    save_gate: tokio::sync::Mutex<()>,
    status: watch::Sender<SheetStatus>,
    runtime: Handle,
    closed: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SheetSession {
    /// Opens a session on `partition` and loads it.
    pub async fn open(
        store: Arc<dyn RecordStore>,
        sheet: SheetKind,
        partition: Partition,
        options: SessionOptions,
    ) -> Result<Self, SyncError> {
        let runtime = Handle::try_current().map_err(|_| SyncError::NoRuntime)?;
        let model = SheetModel::new(sheet, partition, options.target_rows);
        let (status, _) = watch::channel(model.status());
        let session = Self {
            inner: Arc::new(Inner {
                model: Mutex::new(model),
                store,
                debouncer: Mutex::new(Debouncer::new(options.debounce)),
                save_gate: tokio::sync::Mutex::new(()),
                status,
                runtime,
                closed: AtomicBool::new(false),
            }),
        };
        info!(sheet = sheet.as_str(), %partition, "sheet session opened");
        session.refresh().await?;
        Ok(session)
    }

    pub fn sheet(&self) -> SheetKind {
        lock(&self.inner.model).sheet()
    }

    pub fn partition(&self) -> Partition {
        lock(&self.inner.model).partition()
    }

    pub fn columns(&self) -> &'static [ColumnSpec] {
        self.sheet().columns()
    }

    pub fn grid(&self) -> Vec<Vec<GridValue>> {
        lock(&self.inner.model).grid()
    }

    pub fn displayed(&self) -> Vec<RowIdentity> {
        lock(&self.inner.model).displayed().to_vec()
    }

    pub fn is_read_only(&self, row: usize, col: usize) -> bool {
        lock(&self.inner.model).is_read_only(row, col)
    }

    pub fn status(&self) -> SheetStatus {
        self.inner.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SheetStatus> {
        self.inner.status.subscribe()
    }

    /// Runs `read` against the model while holding its lock.
    pub fn with_model<R>(&self, read: impl FnOnce(&SheetModel) -> R) -> R {
        read(&lock(&self.inner.model))
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), SyncError> {
        if self.is_closed() {
            Err(SyncError::Closed)
        } else {
            Ok(())
        }
    }

    /// Refetches the active partition. Results that lose the race against a
    /// newer fetch or a partition move are dropped.
    pub async fn refresh(&self) -> Result<FetchOutcome, SyncError> {
        self.ensure_open()?;
        let ticket = lock(&self.inner.model).begin_fetch();
        debug!(partition = %ticket.partition, generation = ticket.generation, "fetch started");
        let records = match self
            .inner
            .store
            .select_by_partition(ticket.sheet, ticket.partition)
            .await
        {
            Ok(records) => records,
            Err(error) => {
                warn!(partition = %ticket.partition, %error, "fetch failed");
                self.inner.record_error(&error);
                return Err(error.into());
            }
        };
        let outcome = lock(&self.inner.model).apply_fetch(ticket, records);
        self.inner.publish();
        Ok(outcome)
    }

    pub async fn move_partition(&self, partition: Partition) -> Result<FetchOutcome, SyncError> {
        self.ensure_open()?;
        if lock(&self.inner.model).move_partition(partition) {
            info!(%partition, "partition changed");
        }
        self.inner.publish();
        self.refresh().await
    }

    pub fn on_cells_changed(
        &self,
        changes: &[CellChange],
        source: ChangeSource,
    ) -> Result<ChangeOutcome, SyncError> {
        self.ensure_open()?;
        let outcome = lock(&self.inner.model).apply_changes(changes, source)?;
        if outcome.needs_save() {
            self.inner.schedule_save();
        }
        self.inner.publish();
        Ok(outcome)
    }

    /// Applies a drag-reorder and persists the new order keys. Failed order
    /// writes are logged and counted; the visual order stays.
    pub async fn on_rows_reordered(
        &self,
        sources: &[usize],
        destination: usize,
    ) -> Result<ReorderOutcome, SyncError> {
        self.ensure_open()?;
        let mut outcome = lock(&self.inner.model).apply_move(sources, destination)?;
        if lock(&self.inner.model).has_unsaved() {
            self.inner.schedule_save();
        }
        self.inner.publish();

        let mut last_error = None;
        for write in &outcome.writes {
            let patch = RecordPatch::order_only(write.sort_key);
            if let Err(error) = self.inner.store.update_by_id(write.id, &patch).await {
                warn!(id = %write.id, %error, "order write failed, keeping visual order");
                outcome.failed += 1;
                last_error = Some(error);
            }
        }
        if let Some(error) = last_error {
            self.inner.record_error(&error);
        }
        Ok(outcome)
    }

    pub fn add_row(&self, at: Option<usize>) -> Result<usize, SyncError> {
        self.ensure_open()?;
        let index = lock(&self.inner.model).add_row(at)?;
        self.inner.publish();
        Ok(index)
    }

    /// Deletes data rows locally, then remotely. Returns the remote ids.
    ///
    /// Rows the store refused to delete stay flagged in the undo slot so an
    /// undo restores them without creating a second record.
    pub async fn delete_rows(&self, indices: &[usize]) -> Result<Vec<RecordId>, SyncError> {
        self.ensure_open()?;
        let ids = lock(&self.inner.model).delete_rows(indices)?;
        self.inner.publish();

        let mut kept = Vec::new();
        let mut first_error = None;
        for &id in &ids {
            match self.inner.store.delete_by_id(id).await {
                Ok(()) | Err(StoreError::NotFound(_)) => {}
                Err(error) => {
                    warn!(%id, %error, "delete failed, record still stored");
                    kept.push(id);
                    first_error.get_or_insert(error);
                }
            }
        }
        match first_error {
            Some(error) => {
                lock(&self.inner.model).keep_stored(&kept);
                self.inner.record_error(&error);
                Err(error.into())
            }
            None => Ok(ids),
        }
    }

    /// Reverses the last delete. Persisted rows are re-inserted remotely and
    /// come back under new ids; rows the store refuses stay in the undo slot.
    /// Rows whose remote delete failed come back under their own id.
    pub async fn undo(&self) -> Result<usize, SyncError> {
        self.ensure_open()?;
        let Some(UndoAction::RestoreRows(rows)) = lock(&self.inner.model).take_undo() else {
            return Ok(0);
        };

        let mut restored = Vec::with_capacity(rows.len());
        let mut failed = Vec::new();
        let mut first_error = None;
        for mut entry in rows {
            if entry.row.identity.is_real() && !entry.still_stored {
                match self.inner.store.insert(&entry.row.save_draft()).await {
                    Ok(record) => {
                        let revision = entry.row.revision;
                        let commit = lock(&self.inner.model).next_commit();
                        entry.row.settle(record.id, revision, commit);
                    }
                    Err(error) => {
                        warn!(row = %entry.row.identity, %error, "undo re-insert failed");
                        first_error.get_or_insert(error);
                        failed.push(entry);
                        continue;
                    }
                }
            }
            restored.push(entry);
        }

        let count = restored.len();
        let failures = failed.len();
        let needs_save = {
            let mut model = lock(&self.inner.model);
            model.restore_rows(restored);
            if !failed.is_empty() {
                model.register_undo(UndoAction::RestoreRows(failed));
            }
            model.has_unsaved()
        };
        if needs_save {
            self.inner.schedule_save();
        }
        info!(restored = count, failed = failures, "undo applied");

        match first_error {
            Some(source) => {
                self.inner.record_error(&source);
                Err(SyncError::UndoIncomplete {
                    restored: count,
                    failed: failures,
                    source,
                })
            }
            None => {
                self.inner.publish();
                Ok(count)
            }
        }
    }

    pub fn set_locked(&self, rows: &[usize], locked: bool) -> Result<usize, SyncError> {
        self.annotate(|model| model.set_locked(rows, locked))
    }

    pub fn set_highlight(&self, rows: &[usize], color: Option<String>) -> Result<usize, SyncError> {
        self.annotate(|model| model.set_highlight(rows, color))
    }

    pub fn set_comment(&self, row: usize, comment: &str) -> Result<usize, SyncError> {
        self.annotate(|model| model.set_comment(row, comment))
    }

    fn annotate(
        &self,
        apply: impl FnOnce(&mut SheetModel) -> Result<usize, SyncError>,
    ) -> Result<usize, SyncError> {
        self.ensure_open()?;
        let changed = apply(&mut lock(&self.inner.model))?;
        if changed > 0 {
            self.inner.schedule_save();
        }
        self.inner.publish();
        Ok(changed)
    }

    /// Cancels the debounce timer and saves until nothing is left.
    pub async fn flush(&self) -> Result<(), SyncError> {
        lock(&self.inner.debouncer).cancel();
        loop {
            let report = self.inner.save_pass().await;
            if let Some(error) = report.error {
                return Err(error.into());
            }
            if !report.follow_up {
                return Ok(());
            }
        }
    }

    /// Flushes pending saves and closes the session. Later calls are no-ops.
    pub async fn unmount(&self) -> Result<(), SyncError> {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let result = self.flush().await;
        let status = self.status();
        info!(dirty = status.dirty, "sheet session closed");
        result
    }
}

impl Inner {
    fn publish(&self) {
        let status = lock(&self.model).status();
        self.status.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }

    fn record_error(&self, error: &StoreError) {
        lock(&self.model).set_last_error(Some(error.to_string()));
        self.publish();
    }

    fn schedule_save(self: &Arc<Self>) {
        let (ticket, deadline) = lock(&self.debouncer).schedule(Instant::now());
        let inner = Arc::clone(self);
        self.runtime.spawn(async move {
            sleep_until(deadline).await;
            if !lock(&inner.debouncer).fire(ticket) {
                return;
            }
            let report = inner.save_pass().await;
            if report.follow_up {
                inner.schedule_save();
            }
        });
    }

    async fn save_pass(&self) -> SaveReport {
        let _gate = self.save_gate.lock().await;
        let ops = lock(&self.model).take_save_batch();
        let mut report = SaveReport {
            attempted: ops.len(),
            ..SaveReport::default()
        };
        if ops.is_empty() {
            return report;
        }
        self.publish();

        for op in ops {
            let identity = op.identity();
            let result = match op {
                SaveOp::Insert {
                    token,
                    draft,
                    revision,
                } => match self.store.insert(&draft).await {
                    Ok(record) => {
                        report.inserted += 1;
                        let outcome = lock(&self.model).commit_insert(&token, record, revision);
                        Ok(outcome)
                    }
                    Err(error) => Err(error),
                },
                SaveOp::Update {
                    id,
                    draft,
                    revision,
                } => match upsert(self.store.as_ref(), Some(id), &draft).await {
                    Ok(record) => {
                        report.updated += 1;
                        let outcome = lock(&self.model).commit_update(id, record, revision);
                        Ok(outcome)
                    }
                    Err(error) => Err(error),
                },
            };
            match result {
                Ok(CommitOutcome::Orphaned(id)) => self.delete_orphan(id).await,
                Ok(CommitOutcome::Committed(_) | CommitOutcome::Discarded) => {}
                Err(error) => {
                    warn!(row = %identity, %error, "save failed, keeping local edits");
                    lock(&self.model).fail_save(&identity, &error);
                    report.error.get_or_insert(error);
                }
            }
        }

        report.follow_up = {
            let mut model = lock(&self.model);
            if report.error.is_none() {
                model.set_last_error(None);
            }
            report.error.is_none() && model.has_unsaved()
        };
        self.publish();
        debug!(
            attempted = report.attempted,
            inserted = report.inserted,
            updated = report.updated,
            follow_up = report.follow_up,
            "save pass finished"
        );
        report
    }

    async fn delete_orphan(&self, id: RecordId) {
        debug!(%id, "deleting record whose row was removed during its save");
        match self.store.delete_by_id(id).await {
            Ok(()) | Err(StoreError::NotFound(_)) => {}
            Err(error) => warn!(%id, %error, "could not delete orphaned record"),
        }
    }
}
