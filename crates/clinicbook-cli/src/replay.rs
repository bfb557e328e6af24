// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Scripted grid events read from a JSON file and driven through a session,
//! the way a spreadsheet widget would fire them.

use anyhow::{Context, Result, anyhow};
use clinicbook_app::{GridValue, Partition};
use clinicbook_sync::{CellChange, ChangeSource, SheetSession};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum CellInput {
    Number(f64),
    Text(String),
}

impl CellInput {
    fn into_grid(input: Option<Self>) -> GridValue {
        match input {
            None => GridValue::Null,
            Some(Self::Number(value)) => GridValue::Number(value),
            Some(Self::Text(value)) => GridValue::Text(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ReplayStep {
    /// One cell typed by hand. A missing or null value clears the cell.
    Edit {
        row: usize,
        col: usize,
        #[serde(default)]
        value: Option<CellInput>,
    },
    /// A rectangular block pasted with its top-left corner at `row`, `col`.
    Paste {
        row: usize,
        col: usize,
        values: Vec<Vec<Option<CellInput>>>,
    },
    Move {
        sources: Vec<usize>,
        destination: usize,
    },
    Delete {
        rows: Vec<usize>,
    },
    Undo,
    AddRow {
        #[serde(default)]
        at: Option<usize>,
    },
    Lock {
        rows: Vec<usize>,
        #[serde(default = "default_true")]
        locked: bool,
    },
    Highlight {
        rows: Vec<usize>,
        #[serde(default)]
        color: Option<String>,
    },
    Comment {
        row: usize,
        text: String,
    },
    /// Switches to another month, `YYYY-MM`.
    Partition {
        month: String,
    },
    Refresh,
    /// Saves pending edits now instead of waiting for the debounce.
    Flush,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub steps: usize,
    pub cells_applied: usize,
    pub cells_ignored: usize,
    pub rows_moved: usize,
    pub rows_deleted: usize,
    pub rows_restored: usize,
    pub order_writes_failed: usize,
}

pub fn load_steps(path: &Path) -> Result<Vec<ReplayStep>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("read replay file {}", path.display()))?;
    parse_steps(&raw).with_context(|| format!("parse replay file {}", path.display()))
}

pub fn parse_steps(raw: &str) -> Result<Vec<ReplayStep>> {
    serde_json::from_str(raw).context("replay must be a JSON array of steps")
}

pub async fn run(session: &SheetSession, steps: Vec<ReplayStep>) -> Result<ReplaySummary> {
    let mut summary = ReplaySummary::default();
    for (index, step) in steps.into_iter().enumerate() {
        debug!(step = index + 1, ?step, "replaying");
        apply(session, step, &mut summary)
            .await
            .with_context(|| format!("replay step {}", index + 1))?;
        summary.steps += 1;
    }
    Ok(summary)
}

async fn apply(
    session: &SheetSession,
    step: ReplayStep,
    summary: &mut ReplaySummary,
) -> Result<()> {
    match step {
        ReplayStep::Edit { row, col, value } => {
            let change = CellChange::edit(row, col, CellInput::into_grid(value));
            let outcome = session.on_cells_changed(&[change], ChangeSource::Edit)?;
            summary.cells_applied += outcome.applied;
            summary.cells_ignored += outcome.ignored;
        }
        ReplayStep::Paste { row, col, values } => {
            let changes = values
                .into_iter()
                .enumerate()
                .flat_map(|(row_offset, cells)| {
                    cells.into_iter().enumerate().map(move |(col_offset, cell)| {
                        CellChange::edit(
                            row.saturating_add(row_offset),
                            col.saturating_add(col_offset),
                            CellInput::into_grid(cell),
                        )
                    })
                })
                .collect::<Vec<_>>();
            let outcome = session.on_cells_changed(&changes, ChangeSource::Paste)?;
            summary.cells_applied += outcome.applied;
            summary.cells_ignored += outcome.ignored;
        }
        ReplayStep::Move {
            sources,
            destination,
        } => {
            let outcome = session.on_rows_reordered(&sources, destination).await?;
            summary.rows_moved += outcome.moved;
            summary.order_writes_failed += outcome.failed;
        }
        ReplayStep::Delete { rows } => {
            let before = session.status().row_count;
            session.delete_rows(&rows).await?;
            summary.rows_deleted += before.saturating_sub(session.status().row_count);
        }
        ReplayStep::Undo => {
            summary.rows_restored += session.undo().await?;
        }
        ReplayStep::AddRow { at } => {
            session.add_row(at)?;
        }
        ReplayStep::Lock { rows, locked } => {
            session.set_locked(&rows, locked)?;
        }
        ReplayStep::Highlight { rows, color } => {
            session.set_highlight(&rows, color)?;
        }
        ReplayStep::Comment { row, text } => {
            session.set_comment(row, &text)?;
        }
        ReplayStep::Partition { month } => {
            let partition = Partition::parse(&month)
                .ok_or_else(|| anyhow!("invalid month {month:?}; use YYYY-MM"))?;
            session.move_partition(partition).await?;
        }
        ReplayStep::Refresh => {
            session.refresh().await?;
        }
        ReplayStep::Flush => {
            session.flush().await?;
        }
    }
    Ok(())
}
