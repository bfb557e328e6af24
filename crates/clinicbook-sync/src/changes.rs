// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use clinicbook_app::{Annotations, coerce_cell, recompute_derived};
use tracing::debug;

use crate::error::SyncError;
use crate::grid::{CellChange, ChangeSource};
use crate::identity::RowIdentity;
use crate::model::SheetModel;
use crate::view::reach;

/// Result of applying one batch of grid changes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeOutcome {
    /// Cells written to a row.
    pub applied: usize,
    /// Placeholders promoted to pending rows.
    pub created: usize,
    /// Cells dropped: derived columns, locked rows, blanks on placeholders.
    pub ignored: usize,
    /// Rows whose new date moved them out of the active partition.
    pub moved_out: usize,
}

impl ChangeOutcome {
    pub fn needs_save(&self) -> bool {
        self.applied > 0
    }
}

impl SheetModel {
    /// Applies grid cell changes to the full list.
    ///
    /// Indices are validated up front so a bad batch changes nothing. Row
    /// indices past the end extend the displayed list with placeholders, by
    /// at most one more page of `target_rows`.
    pub fn apply_changes(
        &mut self,
        changes: &[CellChange],
        source: ChangeSource,
    ) -> Result<ChangeOutcome, SyncError> {
        let mut outcome = ChangeOutcome::default();
        if !source.is_user_edit() {
            return Ok(outcome);
        }
        let reachable = self.display.len().saturating_add(self.target_rows);
        for change in changes {
            self.check_col(change.col)?;
            if change.row >= reachable {
                return Err(SyncError::RowOutOfRange {
                    row: change.row,
                    rows: self.display.len(),
                });
            }
        }

        let partition_column = self.sheet.partition_column();
        let mut moved_out = Vec::new();
        for change in changes {
            let column = &self.columns()[change.col];
            if column.derived {
                outcome.ignored += 1;
                continue;
            }
            reach(&mut self.display, change.row);

            let current = self.display[change.row].clone();
            let value = coerce_cell(column, &change.new_value);
            let locked = self.row(&current).is_some_and(|row| row.is_locked());
            if locked || (current.is_placeholder() && value.is_empty()) {
                outcome.ignored += 1;
                continue;
            }

            let index = self.editable(change.row);
            if current.is_placeholder() {
                outcome.created += 1;
            }
            let sheet = self.sheet;
            let row = &mut self.rows[index];
            if let Some(slot) = row.draft.fields.get_mut(change.col) {
                *slot = value;
            }
            recompute_derived(sheet, &mut row.draft.fields);
            row.touch();
            outcome.applied += 1;

            if change.col == partition_column && row.partition() != self.partition {
                moved_out.push(row.identity.clone());
            }
        }

        let gone = moved_out
            .into_iter()
            .filter(|identity| {
                self.row(identity)
                    .is_some_and(|row| row.partition() != self.partition)
            })
            .collect::<Vec<_>>();
        if !gone.is_empty() {
            self.display.retain(|identity| !gone.contains(identity));
            outcome.moved_out = gone.len();
            debug!(rows = gone.len(), "rows left the active partition");
        }
        self.normalize();
        Ok(outcome)
    }

    /// Locks or unlocks rows. Locked rows reject cell edits.
    pub fn set_locked(&mut self, rows: &[usize], locked: bool) -> Result<usize, SyncError> {
        self.annotate(rows, |annotations| {
            let changed = annotations.locked != locked;
            annotations.locked = locked;
            changed
        })
    }

    pub fn set_highlight(
        &mut self,
        rows: &[usize],
        color: Option<String>,
    ) -> Result<usize, SyncError> {
        self.annotate(rows, |annotations| {
            let changed = annotations.highlight != color;
            annotations.highlight.clone_from(&color);
            changed
        })
    }

    pub fn set_comment(&mut self, row: usize, comment: &str) -> Result<usize, SyncError> {
        self.annotate(&[row], |annotations| {
            let changed = annotations.comment != comment;
            comment.clone_into(&mut annotations.comment);
            changed
        })
    }

    fn annotate(
        &mut self,
        rows: &[usize],
        mut apply: impl FnMut(&mut Annotations) -> bool,
    ) -> Result<usize, SyncError> {
        for &row in rows {
            self.check_row(row)?;
        }
        let mut changed = 0;
        for &row in rows {
            let index = self.editable(row);
            let local = &mut self.rows[index];
            if apply(&mut local.draft.annotations) {
                local.touch();
                changed += 1;
            }
        }
        self.normalize();
        Ok(changed)
    }

    /// Inserts an empty pending row at a displayed index, by default right
    /// after the last data row. Returns the index it landed on.
    pub fn add_row(&mut self, at: Option<usize>) -> Result<usize, SyncError> {
        let last_data = self
            .display
            .iter()
            .rposition(|identity| !identity.is_placeholder())
            .map_or(0, |index| index + 1);
        let at = at.unwrap_or(last_data);
        if at > self.display.len() {
            return Err(SyncError::RowOutOfRange {
                row: at,
                rows: self.display.len(),
            });
        }

        let identity = self.pending.mint(at);
        self.display.insert(at, RowIdentity::Placeholder(usize::MAX));
        self.materialize(identity.clone(), at);
        self.display[at] = identity;
        self.bump_structure();
        Ok(at)
    }
}
