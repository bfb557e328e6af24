// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use clinicbook_app::Partition;

use crate::identity::RowIdentity;
use crate::rows::LocalRow;

/// Displayed list for `partition`: matching rows in full-list order, padded
/// with placeholders up to `target`. Data rows are never truncated.
pub fn build_display(rows: &[LocalRow], partition: Partition, target: usize) -> Vec<RowIdentity> {
    let mut display = rows
        .iter()
        .filter(|row| row.partition() == partition)
        .map(|row| row.identity.clone())
        .collect::<Vec<_>>();
    pad(&mut display, target);
    display
}

/// Restores the padding invariant after rows were added, removed or moved:
/// placeholders are renumbered to their index, surplus trailing placeholders
/// are dropped and the list is padded back to `target`.
pub fn normalize_display(display: &mut Vec<RowIdentity>, target: usize) {
    while display.len() > target && display.last().is_some_and(RowIdentity::is_placeholder) {
        display.pop();
    }
    for (index, identity) in display.iter_mut().enumerate() {
        if identity.is_placeholder() {
            *identity = RowIdentity::Placeholder(index);
        }
    }
    pad(display, target);
}

fn pad(display: &mut Vec<RowIdentity>, target: usize) {
    let start = display.len();
    display.extend((start..target).map(RowIdentity::Placeholder));
}

/// Extends the list with placeholders so `index` is addressable.
pub(crate) fn reach(display: &mut Vec<RowIdentity>, index: usize) {
    let start = display.len();
    display.extend((start..=index).map(RowIdentity::Placeholder));
}
