// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use clinicbook_app::RecordId;
use tracing::debug;

use crate::error::SyncError;
use crate::identity::RowIdentity;
use crate::model::SheetModel;
use crate::rows::LocalRow;

/// Gap between consecutive ordering keys written by a reorder.
pub const ORDER_KEY_STEP: i64 = 1024;

/// Ordering key for a row slotted between `above` and `below`. Keys sort
/// descending, so `above` holds the larger key.
pub fn key_between(above: Option<i64>, below: Option<i64>, fallback: i64) -> i64 {
    match (above, below) {
        (Some(above), Some(below)) if above > below && above - below > 1 => {
            below + (above - below) / 2
        }
        (Some(above), Some(_)) => above.saturating_sub(1),
        (Some(above), None) => above.saturating_sub(ORDER_KEY_STEP),
        (None, Some(below)) => below.saturating_add(ORDER_KEY_STEP),
        (None, None) => fallback,
    }
}

/// Ordering key to persist for one real row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderWrite {
    pub id: RecordId,
    pub sort_key: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReorderOutcome {
    pub moved: usize,
    pub writes: Vec<OrderWrite>,
    /// Order writes the store refused. Filled in by the session.
    pub failed: usize,
}

/// A deleted row with enough context to put it back where it was.
#[derive(Debug, Clone, PartialEq)]
pub struct DeletedRow {
    pub row: LocalRow,
    pub display_index: Option<usize>,
    pub full_index: usize,
    /// The remote delete failed, so the record still exists under its id.
    pub still_stored: bool,
}

/// The one reversible destructive operation kept for undo.
#[derive(Debug, Clone, PartialEq)]
pub enum UndoAction {
    RestoreRows(Vec<DeletedRow>),
}

impl SheetModel {
    /// Moves displayed rows to `destination` and rewrites ordering keys.
    ///
    /// Sources are removed highest first and reinserted, in their original
    /// relative order, at `min(destination, remaining)`. Real rows get a fresh
    /// strictly decreasing key each; pending rows take the same positional key
    /// locally and carry it with their insert.
    pub fn apply_move(
        &mut self,
        sources: &[usize],
        destination: usize,
    ) -> Result<ReorderOutcome, SyncError> {
        for &source in sources {
            self.check_row(source)?;
        }
        let mut sources = sources.to_vec();
        sources.sort_unstable();
        sources.dedup();

        let mut moved = sources
            .iter()
            .rev()
            .map(|&index| self.display.remove(index))
            .collect::<Vec<_>>();
        moved.reverse();
        let at = destination.min(self.display.len());
        let count = moved.len();
        self.display.splice(at..at, moved);

        self.bump_structure();
        let writes = self.assign_order_keys();
        debug!(moved = count, writes = writes.len(), "rows reordered");
        Ok(ReorderOutcome {
            moved: count,
            writes,
            failed: 0,
        })
    }

    fn assign_order_keys(&mut self) -> Vec<OrderWrite> {
        let ordered = self
            .display
            .iter()
            .filter_map(|identity| self.find(identity))
            .collect::<Vec<_>>();
        let total = ordered.len() as i64;
        let mut writes = Vec::new();
        for (position, index) in ordered.into_iter().enumerate() {
            let sort_key = (total - position as i64) * ORDER_KEY_STEP;
            let row = &mut self.rows[index];
            if row.draft.sort_key == sort_key {
                continue;
            }
            row.draft.sort_key = sort_key;
            match row.id() {
                Some(id) => {
                    // An in-flight update still carries the old key.
                    if row.in_flight {
                        row.touch();
                    }
                    writes.push(OrderWrite { id, sort_key });
                }
                None => row.touch(),
            }
        }
        writes
    }

    /// Removes the data rows at `indices` and records them for undo.
    /// Placeholders are skipped. Returns the ids to delete remotely.
    pub fn delete_rows(&mut self, indices: &[usize]) -> Result<Vec<RecordId>, SyncError> {
        for &index in indices {
            self.check_row(index)?;
        }
        let mut indices = indices.to_vec();
        indices.sort_unstable();
        indices.dedup();

        let mut deleted = indices
            .iter()
            .filter_map(|&display_index| {
                let identity = &self.display[display_index];
                let full_index = self.find(identity)?;
                Some(DeletedRow {
                    row: self.rows[full_index].clone(),
                    display_index: Some(display_index),
                    full_index,
                    still_stored: false,
                })
            })
            .collect::<Vec<_>>();
        if deleted.is_empty() {
            return Ok(Vec::new());
        }

        for index in indices.iter().rev() {
            if !self.display[*index].is_placeholder() {
                self.display.remove(*index);
            }
        }
        deleted.sort_by_key(|deleted| deleted.full_index);
        for entry in deleted.iter().rev() {
            self.rows.remove(entry.full_index);
            if let RowIdentity::Pending(token) = &entry.row.identity {
                self.pending.retire(token);
            }
        }

        let ids = deleted
            .iter()
            .filter_map(|entry| entry.row.id())
            .collect::<Vec<_>>();
        debug!(rows = deleted.len(), remote = ids.len(), "rows deleted");
        self.register_undo(UndoAction::RestoreRows(deleted));
        self.bump_structure();
        Ok(ids)
    }

    /// Keeps `action` as the single undoable operation, replacing any older one.
    pub fn register_undo(&mut self, action: UndoAction) {
        self.undo = Some(action);
    }

    pub fn take_undo(&mut self) -> Option<UndoAction> {
        self.undo.take()
    }

    /// Flags deleted rows whose remote delete failed. Undo puts them back
    /// under their own id instead of inserting a copy.
    pub fn keep_stored(&mut self, ids: &[RecordId]) {
        let Some(UndoAction::RestoreRows(rows)) = &mut self.undo else {
            return;
        };
        for entry in rows.iter_mut() {
            if entry.row.id().is_some_and(|id| ids.contains(&id)) {
                entry.still_stored = true;
            }
        }
    }

    /// Puts deleted rows back at their recorded full-list and displayed
    /// positions. Real rows must already carry the identity of their
    /// re-inserted record, or their own id when still stored. A copy a fetch
    /// brought back in the meantime is replaced.
    pub fn restore_rows(&mut self, mut rows: Vec<DeletedRow>) {
        for entry in &rows {
            if let Some(index) = self.find(&entry.row.identity) {
                self.rows.remove(index);
                self.display.retain(|identity| identity != &entry.row.identity);
            }
        }
        rows.sort_by_key(|entry| entry.full_index);
        for entry in &rows {
            let at = entry.full_index.min(self.rows.len());
            let mut row = entry.row.clone();
            row.in_flight = false;
            self.rows.insert(at, row);
            if let RowIdentity::Pending(token) = &entry.row.identity {
                self.pending.adopt(token);
            }
        }

        let mut shown = rows
            .into_iter()
            .filter(|entry| entry.row.partition() == self.partition)
            .collect::<Vec<_>>();
        shown.sort_by_key(|entry| entry.display_index.unwrap_or(usize::MAX));
        for entry in shown {
            let at = entry
                .display_index
                .unwrap_or(usize::MAX)
                .min(self.display.len());
            self.display.insert(at, entry.row.identity);
        }
        self.bump_structure();
    }
}
