// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use async_trait::async_trait;
use thiserror::Error;

use crate::ids::RecordId;
use crate::model::{Partition, Record, RecordDraft, RecordPatch, SheetKind};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("record {0} not found")]
    NotFound(RecordId),
    #[error("store rejected the request: {0}")]
    Rejected(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Remote persistence contract consumed by the sheet engine.
///
/// Implementations hold no sheet state. Every call is independent; callers
/// never hold engine locks across one.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Records of one sheet in one partition, ordered by `sort_key` descending.
    async fn select_by_partition(
        &self,
        sheet: SheetKind,
        partition: Partition,
    ) -> Result<Vec<Record>, StoreError>;

    async fn insert(&self, draft: &RecordDraft) -> Result<Record, StoreError>;

    async fn update_by_id(&self, id: RecordId, patch: &RecordPatch)
    -> Result<Record, StoreError>;

    async fn delete_by_id(&self, id: RecordId) -> Result<(), StoreError>;
}

/// Client-side upsert: update by id when one is known, insert otherwise or
/// when the id no longer exists remotely.
pub async fn upsert(
    store: &dyn RecordStore,
    id: Option<RecordId>,
    draft: &RecordDraft,
) -> Result<Record, StoreError> {
    if let Some(id) = id {
        match store.update_by_id(id, &RecordPatch::from_draft(draft)).await {
            Err(StoreError::NotFound(_)) => {}
            other => return other,
        }
    }
    store.insert(draft).await
}
