// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use async_trait::async_trait;
use clinicbook_app::{
    Partition, Record, RecordDraft, RecordId, RecordPatch, RecordStore, SheetKind, StoreError,
};
use clinicbook_db::Store;
use std::sync::{Arc, Mutex, PoisonError};

/// `RecordStore` over the local SQLite database. Each call runs on the
/// blocking pool so the session's timer and fetch tasks keep moving.
#[derive(Clone)]
pub struct SqliteRecordStore {
    store: Arc<Mutex<Store>>,
}

impl SqliteRecordStore {
    pub fn new(store: Store) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
        }
    }

    async fn call<T, F>(&self, operation: &'static str, work: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Store) -> anyhow::Result<T> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || {
            let store = store.lock().unwrap_or_else(PoisonError::into_inner);
            work(&store)
        })
        .await
        .map_err(|error| StoreError::Unavailable(format!("{operation} task failed: {error}")))?
        .map_err(|error| StoreError::Unavailable(format!("{operation}: {error:#}")))
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn select_by_partition(
        &self,
        sheet: SheetKind,
        partition: Partition,
    ) -> Result<Vec<Record>, StoreError> {
        self.call("select", move |store| store.list_partition(sheet, partition))
            .await
    }

    async fn insert(&self, draft: &RecordDraft) -> Result<Record, StoreError> {
        let draft = draft.clone();
        self.call("insert", move |store| store.insert_record(&draft))
            .await
    }

    async fn update_by_id(
        &self,
        id: RecordId,
        patch: &RecordPatch,
    ) -> Result<Record, StoreError> {
        let patch = patch.clone();
        self.call("update", move |store| store.update_record(id, &patch))
            .await?
            .ok_or(StoreError::NotFound(id))
    }

    async fn delete_by_id(&self, id: RecordId) -> Result<(), StoreError> {
        let removed = self
            .call("delete", move |store| store.delete_record(id))
            .await?;
        if removed {
            Ok(())
        } else {
            Err(StoreError::NotFound(id))
        }
    }
}
