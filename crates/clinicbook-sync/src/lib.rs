// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod changes;
pub mod debounce;
pub mod error;
pub mod grid;
pub mod identity;
pub mod model;
pub mod partition;
pub mod persist;
pub mod reorder;
pub mod rows;
pub mod session;
pub mod view;

pub use changes::ChangeOutcome;
pub use debounce::{DebounceState, DebounceTicket, Debouncer};
pub use error::SyncError;
pub use grid::{CellChange, ChangeSource};
pub use identity::{PendingIds, PendingToken, RowIdentity};
pub use model::{DEFAULT_TARGET_ROWS, SheetModel, SheetStatus};
pub use partition::{FetchOutcome, FetchTicket};
pub use persist::{CommitOutcome, SaveOp, SaveReport};
pub use reorder::{DeletedRow, OrderWrite, ReorderOutcome, UndoAction};
pub use rows::LocalRow;
pub use session::{SessionOptions, SheetSession};
pub use view::{build_display, normalize_display};
