// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use clinicbook_app::{ColumnSpec, GridValue, Partition, RecordDraft, SheetKind};
use std::collections::HashSet;
use time::OffsetDateTime;

use crate::error::SyncError;
use crate::identity::{PendingIds, RowIdentity};
use crate::reorder::{UndoAction, key_between};
use crate::rows::LocalRow;
use crate::view::{build_display, normalize_display};

pub const DEFAULT_TARGET_ROWS: usize = 200;

/// What the host shows next to the grid.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SheetStatus {
    pub row_count: usize,
    pub dirty: bool,
    pub saving: bool,
    pub last_error: Option<String>,
}

/// Single-writer model of one sheet view.
///
/// Every mutation is a synchronous method call; async drivers take a
/// snapshot of the work (save batch, fetch ticket, undo action), release the
/// model, await the store, and hand the result back through another call.
#[derive(Debug, Clone)]
pub struct SheetModel {
    pub(crate) sheet: SheetKind,
    pub(crate) partition: Partition,
    pub(crate) target_rows: usize,
    pub(crate) rows: Vec<LocalRow>,
    pub(crate) display: Vec<RowIdentity>,
    pub(crate) pending: PendingIds,
    pub(crate) generation: u64,
    /// Saves settled so far; fetch tickets remember the value they saw.
    pub(crate) commits: u64,
    pub(crate) structure_version: u64,
    pub(crate) undo: Option<UndoAction>,
    pub(crate) last_error: Option<String>,
}

impl SheetModel {
    pub fn new(sheet: SheetKind, partition: Partition, target_rows: usize) -> Self {
        let mut model = Self {
            sheet,
            partition,
            target_rows,
            rows: Vec::new(),
            display: Vec::new(),
            pending: PendingIds::new(),
            generation: 0,
            commits: 0,
            structure_version: 0,
            undo: None,
            last_error: None,
        };
        model.rebuild_display();
        model
    }

    pub fn sheet(&self) -> SheetKind {
        self.sheet
    }

    pub fn partition(&self) -> Partition {
        self.partition
    }

    pub fn target_rows(&self) -> usize {
        self.target_rows
    }

    pub fn columns(&self) -> &'static [ColumnSpec] {
        self.sheet.columns()
    }

    /// The full list, across partitions.
    pub fn rows(&self) -> &[LocalRow] {
        &self.rows
    }

    pub fn displayed(&self) -> &[RowIdentity] {
        &self.display
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn commits(&self) -> u64 {
        self.commits
    }

    /// Numbers one settled save. Rows stamped with it survive fetches whose
    /// snapshot predates it.
    pub fn next_commit(&mut self) -> u64 {
        self.commits += 1;
        self.commits
    }

    pub fn structure_version(&self) -> u64 {
        self.structure_version
    }

    pub fn pending_ids(&self) -> &PendingIds {
        &self.pending
    }

    pub fn has_undo(&self) -> bool {
        self.undo.is_some()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn set_last_error(&mut self, error: Option<String>) {
        self.last_error = error;
    }

    /// Data rows in the displayed list.
    pub fn row_count(&self) -> usize {
        self.display
            .iter()
            .filter(|identity| !identity.is_placeholder())
            .count()
    }

    pub fn status(&self) -> SheetStatus {
        SheetStatus {
            row_count: self.row_count(),
            dirty: self.rows.iter().any(LocalRow::is_dirty),
            saving: self.rows.iter().any(|row| row.in_flight),
            last_error: self.last_error.clone(),
        }
    }

    pub fn find(&self, identity: &RowIdentity) -> Option<usize> {
        self.rows.iter().position(|row| &row.identity == identity)
    }

    pub fn row(&self, identity: &RowIdentity) -> Option<&LocalRow> {
        self.find(identity).map(|index| &self.rows[index])
    }

    /// Row shown at a displayed index; `None` for placeholders.
    pub fn row_at(&self, display_index: usize) -> Option<&LocalRow> {
        self.display
            .get(display_index)
            .and_then(|identity| self.row(identity))
    }

    /// Row-major cell matrix for the grid widget.
    pub fn grid(&self) -> Vec<Vec<GridValue>> {
        let width = self.columns().len();
        self.display
            .iter()
            .map(|identity| {
                self.row(identity)
                    .map_or_else(|| vec![GridValue::Null; width], LocalRow::cells)
            })
            .collect()
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<GridValue> {
        if col >= self.columns().len() || row >= self.display.len() {
            return None;
        }
        Some(
            self.row_at(row)
                .and_then(|local| local.draft.fields.get(col))
                .map_or(GridValue::Null, |value| value.to_grid()),
        )
    }

    pub fn is_read_only(&self, row: usize, col: usize) -> bool {
        self.columns().get(col).is_none_or(|column| column.derived)
            || self.row_at(row).is_some_and(LocalRow::is_locked)
    }

    /// Records a structural change (row add, delete, reorder) and rebuilds the
    /// displayed list from the full list in its current display order.
    pub fn bump_structure(&mut self) {
        self.structure_version += 1;
        self.merge_display_order();
        self.rebuild_display();
    }

    pub(crate) fn rebuild_display(&mut self) {
        self.display = build_display(&self.rows, self.partition, self.target_rows);
        self.pending.forget_placeholders();
    }

    pub(crate) fn normalize(&mut self) {
        normalize_display(&mut self.display, self.target_rows);
        self.pending.forget_placeholders();
    }

    /// Rewrites the full-list slots held by displayed rows so they follow the
    /// displayed order. Rows of other partitions keep their slots.
    pub(crate) fn merge_display_order(&mut self) {
        let shown = self
            .display
            .iter()
            .filter(|identity| !identity.is_placeholder())
            .collect::<HashSet<_>>();
        let slots = self
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| shown.contains(&row.identity))
            .map(|(index, _)| index)
            .collect::<Vec<_>>();
        let ordered = self
            .display
            .iter()
            .filter_map(|identity| self.find(identity))
            .collect::<Vec<_>>();
        if slots.len() != ordered.len() {
            return;
        }

        let snapshot = ordered
            .iter()
            .map(|&index| self.rows[index].clone())
            .collect::<Vec<_>>();
        for (slot, row) in slots.into_iter().zip(snapshot) {
            self.rows[slot] = row;
        }
    }

    /// Nearest data rows above and below a displayed index.
    pub(crate) fn neighbours(&self, display_index: usize) -> (Option<&LocalRow>, Option<&LocalRow>) {
        let above = self.display[..display_index.min(self.display.len())]
            .iter()
            .rev()
            .find_map(|identity| self.row(identity));
        let below = self
            .display
            .iter()
            .skip(display_index + 1)
            .find_map(|identity| self.row(identity));
        (above, below)
    }

    /// Creates the pending row a displayed slot resolves to, placed in the
    /// full list next to its displayed neighbours.
    pub(crate) fn materialize(&mut self, identity: RowIdentity, display_index: usize) {
        let RowIdentity::Pending(token) = &identity else {
            return;
        };
        let (above, below) = self.neighbours(display_index);
        let sort_key = key_between(
            above.map(|row| row.draft.sort_key),
            below.map(|row| row.draft.sort_key),
            OffsetDateTime::now_utc().unix_timestamp_nanos() as i64 / 1_000_000,
        );
        let full_index = match (above, below) {
            (Some(above), _) => self.find(&above.identity).map(|index| index + 1),
            (None, Some(below)) => self.find(&below.identity),
            (None, None) => None,
        }
        .unwrap_or(self.rows.len());

        let draft = RecordDraft::blank(self.sheet, self.partition).with_sort_key(sort_key);
        self.rows
            .insert(full_index, LocalRow::pending(token.clone(), draft));
    }

    /// Resolves a displayed slot to an editable row, promoting a placeholder
    /// to a pending row. Returns the row's full-list index.
    pub(crate) fn editable(&mut self, display_index: usize) -> usize {
        let current = self.display[display_index].clone();
        let (identity, _) = self
            .pending
            .ensure_editable_identity(&current, display_index);
        if let Some(index) = self.find(&identity) {
            return index;
        }
        self.materialize(identity.clone(), display_index);
        self.display[display_index] = identity.clone();
        self.find(&identity).unwrap_or(self.rows.len().saturating_sub(1))
    }

    pub(crate) fn check_row(&self, row: usize) -> Result<(), SyncError> {
        if row < self.display.len() {
            Ok(())
        } else {
            Err(SyncError::RowOutOfRange {
                row,
                rows: self.display.len(),
            })
        }
    }

    pub(crate) fn check_col(&self, col: usize) -> Result<(), SyncError> {
        let columns = self.columns().len();
        if col < columns {
            Ok(())
        } else {
            Err(SyncError::ColumnOutOfRange {
                sheet: self.sheet,
                col,
                columns,
            })
        }
    }
}
