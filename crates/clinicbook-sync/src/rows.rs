// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use clinicbook_app::{
    FieldValue, GridValue, Partition, Record, RecordDraft, RecordId, SheetKind,
};

use crate::identity::{PendingToken, RowIdentity};

/// One row of the full list: a record body plus its local identity and save
/// bookkeeping. Placeholders never live in the full list.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalRow {
    pub identity: RowIdentity,
    pub draft: RecordDraft,
    /// Partition an undated row belongs to.
    pub home: Partition,
    /// Bumped on every local mutation.
    pub revision: u64,
    /// Highest revision known to be durable remotely.
    pub saved_revision: u64,
    /// A save carrying this row is awaiting the store.
    pub in_flight: bool,
    /// Commit sequence of the save that last settled this row; 0 if none.
    pub settled_at: u64,
}

impl LocalRow {
    pub fn from_record(record: Record) -> Self {
        let home = record.partition;
        Self {
            identity: RowIdentity::Real(record.id),
            draft: record.to_draft(),
            home,
            revision: 0,
            saved_revision: 0,
            in_flight: false,
            settled_at: 0,
        }
    }

    pub fn pending(token: PendingToken, draft: RecordDraft) -> Self {
        let home = draft.partition;
        Self {
            identity: RowIdentity::Pending(token),
            draft,
            home,
            revision: 0,
            saved_revision: 0,
            in_flight: false,
            settled_at: 0,
        }
    }

    pub fn sheet(&self) -> SheetKind {
        self.draft.sheet
    }

    pub fn id(&self) -> Option<RecordId> {
        self.identity.real_id()
    }

    /// Partition of the row's date column, or `home` while the date is unset
    /// or unparseable.
    pub fn partition(&self) -> Partition {
        self.draft
            .fields
            .get(self.sheet().partition_column())
            .and_then(FieldValue::as_date)
            .map_or(self.home, Partition::from_date)
    }

    pub fn is_locked(&self) -> bool {
        self.draft.annotations.locked
    }

    pub fn is_dirty(&self) -> bool {
        self.revision > self.saved_revision
    }

    /// True when at least one editable column holds a value. Derived columns
    /// and annotations do not count.
    pub fn has_business_data(&self) -> bool {
        self.sheet()
            .columns()
            .iter()
            .zip(&self.draft.fields)
            .any(|(column, value)| !column.derived && !value.is_empty())
    }

    /// Whether the next save pass should pick this row up.
    pub fn wants_save(&self) -> bool {
        !self.in_flight
            && self.is_dirty()
            && (self.identity.is_real() || self.has_business_data())
    }

    pub fn touch(&mut self) {
        self.revision += 1;
    }

    /// Draft as it should be written: partition recomputed from the date column.
    pub fn save_draft(&self) -> RecordDraft {
        let mut draft = self.draft.clone();
        draft.partition = self.partition();
        draft
    }

    /// Marks the row durable at `revision` under `id`, as of save `commit`.
    pub fn settle(&mut self, id: RecordId, revision: u64, commit: u64) {
        self.identity = RowIdentity::Real(id);
        self.in_flight = false;
        self.saved_revision = self.saved_revision.max(revision);
        self.settled_at = commit;
    }

    /// Whether this row changed remotely after a fetch issued at `commits`
    /// took its snapshot, or has local changes the snapshot cannot know.
    pub fn newer_than(&self, commits: u64) -> bool {
        self.is_dirty() || self.in_flight || self.settled_at > commits
    }

    pub fn cells(&self) -> Vec<GridValue> {
        self.draft.fields.iter().map(FieldValue::to_grid).collect()
    }
}
