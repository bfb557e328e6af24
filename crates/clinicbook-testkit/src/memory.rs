// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use async_trait::async_trait;
use clinicbook_app::{
    Partition, Record, RecordDraft, RecordId, RecordPatch, RecordStore, SheetKind, StoreError,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use time::OffsetDateTime;
use tokio::sync::Semaphore;

/// How many times each store call was made.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub fetches: usize,
    pub inserts: usize,
    pub updates: usize,
    pub deletes: usize,
}

#[derive(Debug, Default)]
struct MemoryState {
    records: BTreeMap<RecordId, Record>,
    last_id: i64,
    calls: CallCounts,
    fail_fetches: bool,
    fail_inserts: bool,
    fail_updates: bool,
    fail_deletes: bool,
}

/// In-memory `RecordStore` for engine tests.
///
/// Counts calls, can be told to fail any operation, and can hold fetches and
/// inserts at a gate so tests decide when (and in which order) they
/// complete. Held calls are released first in, first out. A held fetch reads
/// the records when called and returns that snapshot once released, like a
/// response still on the wire.
#[derive(Debug)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    fetch_gate: Semaphore,
    fetches_held: AtomicBool,
    insert_gate: Semaphore,
    inserts_held: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            fetch_gate: Semaphore::new(0),
            fetches_held: AtomicBool::new(false),
            insert_gate: Semaphore::new(0),
            inserts_held: AtomicBool::new(false),
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores a record directly, bypassing call counting and failures.
    pub fn seed(&self, draft: RecordDraft) -> Record {
        let mut state = self.state();
        create(&mut state, &draft)
    }

    pub fn get(&self, id: RecordId) -> Option<Record> {
        self.state().records.get(&id).cloned()
    }

    /// Records of one sheet and partition in display order.
    pub fn records(&self, sheet: SheetKind, partition: Partition) -> Vec<Record> {
        let mut records = self
            .state()
            .records
            .values()
            .filter(|record| record.sheet == sheet && record.partition == partition)
            .cloned()
            .collect::<Vec<_>>();
        records.sort_by(|a, b| b.sort_key.cmp(&a.sort_key).then(a.id.cmp(&b.id)));
        records
    }

    pub fn len(&self) -> usize {
        self.state().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn calls(&self) -> CallCounts {
        self.state().calls
    }

    pub fn fail_fetches(&self, fail: bool) {
        self.state().fail_fetches = fail;
    }

    pub fn fail_inserts(&self, fail: bool) {
        self.state().fail_inserts = fail;
    }

    pub fn fail_updates(&self, fail: bool) {
        self.state().fail_updates = fail;
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.state().fail_deletes = fail;
    }

    /// Makes every later fetch wait until released.
    pub fn hold_fetches(&self) {
        self.fetches_held.store(true, Ordering::SeqCst);
    }

    /// Lets `count` held fetches through, oldest first.
    pub fn release_fetches(&self, count: usize) {
        self.fetch_gate.add_permits(count);
    }

    /// Makes every later insert wait until released. The record is created
    /// when the insert is let through.
    pub fn hold_inserts(&self) {
        self.inserts_held.store(true, Ordering::SeqCst);
    }

    pub fn release_inserts(&self, count: usize) {
        self.insert_gate.add_permits(count);
    }
}

async fn pass(gate: &Semaphore, held: &AtomicBool) -> Result<(), StoreError> {
    if held.load(Ordering::SeqCst) {
        let permit = gate
            .acquire()
            .await
            .map_err(|_| StoreError::Unavailable("store gate closed".to_owned()))?;
        permit.forget();
    }
    Ok(())
}

fn create(state: &mut MemoryState, draft: &RecordDraft) -> Record {
    state.last_id += 1;
    let now = OffsetDateTime::now_utc();
    let record = Record {
        id: RecordId::new(state.last_id),
        sheet: draft.sheet,
        partition: draft.partition,
        sort_key: draft.sort_key,
        fields: draft.fields.clone(),
        annotations: draft.annotations.clone(),
        created_at: now,
        updated_at: now,
    };
    state.records.insert(record.id, record.clone());
    record
}

fn injected(operation: &str) -> StoreError {
    StoreError::Unavailable(format!("injected {operation} failure"))
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn select_by_partition(
        &self,
        sheet: SheetKind,
        partition: Partition,
    ) -> Result<Vec<Record>, StoreError> {
        self.state().calls.fetches += 1;
        let snapshot = self.records(sheet, partition);
        pass(&self.fetch_gate, &self.fetches_held).await?;
        if self.state().fail_fetches {
            return Err(injected("fetch"));
        }
        Ok(snapshot)
    }

    async fn insert(&self, draft: &RecordDraft) -> Result<Record, StoreError> {
        self.state().calls.inserts += 1;
        pass(&self.insert_gate, &self.inserts_held).await?;
        let mut state = self.state();
        if state.fail_inserts {
            return Err(injected("insert"));
        }
        Ok(create(&mut state, draft))
    }

    async fn update_by_id(
        &self,
        id: RecordId,
        patch: &RecordPatch,
    ) -> Result<Record, StoreError> {
        let mut state = self.state();
        state.calls.updates += 1;
        if state.fail_updates {
            return Err(injected("update"));
        }
        let record = state.records.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        patch.apply_to(record);
        record.updated_at = OffsetDateTime::now_utc();
        Ok(record.clone())
    }

    async fn delete_by_id(&self, id: RecordId) -> Result<(), StoreError> {
        let mut state = self.state();
        state.calls.deletes += 1;
        if state.fail_deletes {
            return Err(injected("delete"));
        }
        state
            .records
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound(id))
    }
}
