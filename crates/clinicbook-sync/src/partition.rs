// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use clinicbook_app::{Partition, Record, RecordId, SheetKind};
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::model::SheetModel;
use crate::rows::LocalRow;

/// Handed out when a fetch starts; the result is applied only if the ticket
/// is still the latest one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    pub generation: u64,
    pub sheet: SheetKind,
    pub partition: Partition,
    /// Commit sequence when the fetch started. Rows settled later are not in
    /// the snapshot, or are in it with older values.
    pub commits: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied { rows: usize },
    Stale,
}

impl SheetModel {
    pub fn begin_fetch(&mut self) -> FetchTicket {
        self.generation += 1;
        FetchTicket {
            generation: self.generation,
            sheet: self.sheet,
            partition: self.partition,
            commits: self.commits,
        }
    }

    /// Replaces the ticket's partition with fetched records.
    ///
    /// Clean real rows are replaced by their fetched copy, or dropped when the
    /// store no longer has them. Rows with unsaved edits, a save in flight or
    /// a save settled after the fetch started keep their local copy. Pending
    /// rows are kept after the fetched rows.
    pub fn apply_fetch(&mut self, ticket: FetchTicket, mut records: Vec<Record>) -> FetchOutcome {
        if ticket.generation != self.generation || ticket.sheet != self.sheet {
            debug!(
                ticket = ticket.generation,
                current = self.generation,
                "discarding stale fetch"
            );
            return FetchOutcome::Stale;
        }
        records.sort_by(|a, b| b.sort_key.cmp(&a.sort_key).then(a.id.cmp(&b.id)));

        let fetched = records
            .iter()
            .map(|record| record.id)
            .collect::<HashSet<RecordId>>();
        let mut kept = HashMap::new();
        let mut pending = Vec::new();
        let mut dirty_unfetched = Vec::new();
        let mut others = Vec::new();
        for row in std::mem::take(&mut self.rows) {
            let in_ticket = row.partition() == ticket.partition;
            let local_wins = row.newer_than(ticket.commits);
            match row.id() {
                Some(id) if fetched.contains(&id) && local_wins => {
                    if in_ticket {
                        kept.insert(id, row);
                    } else {
                        others.push(row);
                    }
                }
                Some(id) if fetched.contains(&id) => {}
                Some(_) if in_ticket && local_wins => dirty_unfetched.push(row),
                Some(_) if in_ticket => {}
                None if in_ticket => pending.push(row),
                _ => others.push(row),
            }
        }

        let local_elsewhere = others
            .iter()
            .filter_map(LocalRow::id)
            .collect::<HashSet<_>>();
        let mut partition_rows = records
            .into_iter()
            .filter(|record| !local_elsewhere.contains(&record.id))
            .map(|record| {
                kept.remove(&record.id)
                    .unwrap_or_else(|| LocalRow::from_record(record))
            })
            .collect::<Vec<_>>();
        partition_rows.extend(dirty_unfetched);
        partition_rows.extend(pending);

        let count = partition_rows.len();
        others.extend(partition_rows);
        self.rows = others;
        self.rebuild_display();
        debug!(
            partition = %ticket.partition,
            rows = count,
            generation = ticket.generation,
            "fetch applied"
        );
        FetchOutcome::Applied { rows: count }
    }

    /// Switches the active partition. Returns false when already there.
    ///
    /// The displayed order is folded back into the full list first, and any
    /// fetch still running for the old partition is invalidated.
    pub fn move_partition(&mut self, partition: Partition) -> bool {
        if partition == self.partition {
            return false;
        }
        self.merge_display_order();
        self.partition = partition;
        self.generation += 1;
        self.rebuild_display();
        true
    }
}
