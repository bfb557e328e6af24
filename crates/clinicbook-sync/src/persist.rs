// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use clinicbook_app::{Record, RecordDraft, RecordId, StoreError};
use tracing::debug;

use crate::identity::{PendingToken, RowIdentity};
use crate::model::SheetModel;

/// One write picked up by a save pass.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOp {
    Insert {
        token: PendingToken,
        draft: RecordDraft,
        revision: u64,
    },
    Update {
        id: RecordId,
        draft: RecordDraft,
        revision: u64,
    },
}

impl SaveOp {
    pub fn identity(&self) -> RowIdentity {
        match self {
            Self::Insert { token, .. } => RowIdentity::Pending(token.clone()),
            Self::Update { id, .. } => RowIdentity::Real(*id),
        }
    }
}

/// What happened to a store result once it reached the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed(RecordId),
    /// The row was deleted locally while its insert was in flight; the new
    /// record must be deleted remotely.
    Orphaned(RecordId),
    /// The row is gone locally and nothing was created remotely.
    Discarded,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SaveReport {
    pub attempted: usize,
    pub inserted: usize,
    pub updated: usize,
    pub error: Option<StoreError>,
    /// Rows were edited during the pass and need another one.
    pub follow_up: bool,
}

impl SheetModel {
    /// Collects every row worth persisting and marks it in flight.
    ///
    /// Placeholders never live in the full list; empty pending rows and rows
    /// already in flight are left for a later pass.
    pub fn take_save_batch(&mut self) -> Vec<SaveOp> {
        let mut ops = Vec::new();
        for row in self.rows.iter_mut().filter(|row| row.wants_save()) {
            row.in_flight = true;
            let draft = row.save_draft();
            let revision = row.revision;
            ops.push(match &row.identity {
                RowIdentity::Real(id) => SaveOp::Update {
                    id: *id,
                    draft,
                    revision,
                },
                RowIdentity::Pending(token) => SaveOp::Insert {
                    token: token.clone(),
                    draft,
                    revision,
                },
                RowIdentity::Placeholder(_) => continue,
            });
        }
        if !ops.is_empty() {
            debug!(rows = ops.len(), "save batch taken");
        }
        ops
    }

    /// Rewrites a pending row to its server identity in place.
    pub fn commit_insert(
        &mut self,
        token: &PendingToken,
        record: Record,
        revision: u64,
    ) -> CommitOutcome {
        self.pending.retire(token);
        let pending = RowIdentity::Pending(token.clone());
        let Some(index) = self.find(&pending) else {
            return CommitOutcome::Orphaned(record.id);
        };
        self.rebind(index, &pending, record.id, revision);
        CommitOutcome::Committed(record.id)
    }

    /// Settles an update. `record.id` differs from `id` when the store had
    /// lost the row and the upsert fell back to an insert.
    pub fn commit_update(&mut self, id: RecordId, record: Record, revision: u64) -> CommitOutcome {
        let current = RowIdentity::Real(id);
        match self.find(&current) {
            Some(index) => {
                self.rebind(index, &current, record.id, revision);
                CommitOutcome::Committed(record.id)
            }
            None if record.id != id => CommitOutcome::Orphaned(record.id),
            None => CommitOutcome::Discarded,
        }
    }

    fn rebind(&mut self, index: usize, previous: &RowIdentity, id: RecordId, revision: u64) {
        let real = RowIdentity::Real(id);
        if previous != &real {
            // A fetch may have raced the insert and brought the same record in.
            if let Some(duplicate) = self.find(&real).filter(|&other| other != index) {
                self.rows.remove(duplicate);
                self.display.retain(|identity| identity != &real);
            }
        }
        let commit = self.next_commit();
        if let Some(row) = self.find(previous).map(|index| &mut self.rows[index]) {
            row.settle(id, revision, commit);
        }
        for identity in self.display.iter_mut().filter(|identity| *identity == previous) {
            *identity = real.clone();
        }
        self.normalize();
    }

    /// Clears the in-flight mark after a failed write. The row keeps its
    /// pending identity and stays dirty.
    pub fn fail_save(&mut self, identity: &RowIdentity, error: &StoreError) {
        if let Some(index) = self.find(identity) {
            self.rows[index].in_flight = false;
        }
        self.last_error = Some(error.to_string());
    }

    /// Rows that a new save pass would pick up.
    pub fn has_unsaved(&self) -> bool {
        self.rows.iter().any(|row| row.wants_save())
    }
}
