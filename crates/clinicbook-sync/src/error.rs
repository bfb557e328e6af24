// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use clinicbook_app::{SheetKind, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("column {col} is out of range for the {sheet} sheet ({columns} columns)")]
    ColumnOutOfRange {
        sheet: SheetKind,
        col: usize,
        columns: usize,
    },
    #[error("row {row} is out of range ({rows} rows displayed)")]
    RowOutOfRange { row: usize, rows: usize },
    #[error("sheet sessions must be created inside a tokio runtime")]
    NoRuntime,
    #[error("sheet session is closed")]
    Closed,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("undo restored {restored} row(s) but {failed} could not be re-inserted: {source}")]
    UndoIncomplete {
        restored: usize,
        failed: usize,
        #[source]
        source: StoreError,
    },
}
