// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use clinicbook_app::GridValue;

/// Where a batch of cell changes came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeSource {
    /// The engine pushing fetched data into the grid. Never saved back.
    ProgrammaticLoad,
    Edit,
    Paste,
    Autofill,
    Undo,
}

impl ChangeSource {
    pub const fn is_user_edit(self) -> bool {
        !matches!(self, Self::ProgrammaticLoad)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CellChange {
    pub row: usize,
    pub col: usize,
    pub old_value: GridValue,
    pub new_value: GridValue,
}

impl CellChange {
    pub fn edit(row: usize, col: usize, new_value: impl Into<GridValue>) -> Self {
        Self {
            row,
            col,
            old_value: GridValue::Null,
            new_value: new_value.into(),
        }
    }

    pub fn clear(row: usize, col: usize) -> Self {
        Self {
            row,
            col,
            old_value: GridValue::Null,
            new_value: GridValue::Null,
        }
    }
}
