// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use clinicbook_app::{FieldValue, Partition, Record, RecordId, SheetKind};
use clinicbook_sync::{
    CellChange, ChangeSource, FetchOutcome, RowIdentity, SessionOptions, SheetSession, SyncError,
};
use clinicbook_testkit::{ClinicFaker, MemoryStore};
use std::sync::Arc;
use std::time::Duration;
use time::Month;

const SHEET: SheetKind = SheetKind::AccountsReceivable;

fn january() -> Partition {
    Partition::new(2026, Month::January)
}

fn february() -> Partition {
    Partition::new(2026, Month::February)
}

fn options() -> SessionOptions {
    SessionOptions {
        target_rows: 8,
        debounce: Duration::from_millis(250),
    }
}

fn col(key: &str) -> usize {
    SHEET.column_index(key).expect("known column")
}

fn seed(store: &MemoryStore, partition: Partition, count: usize, seed: u64) -> Vec<Record> {
    ClinicFaker::new(seed)
        .drafts(SHEET, partition, count)
        .into_iter()
        .map(|draft| store.seed(draft))
        .collect()
}

async fn open(store: &Arc<MemoryStore>, partition: Partition) -> SheetSession {
    SheetSession::open(store.clone(), SHEET, partition, options())
        .await
        .expect("session opens")
}

async fn settled(session: &SheetSession) {
    session
        .subscribe()
        .wait_for(|status| !status.dirty && !status.saving)
        .await
        .expect("session alive");
}

async fn fetch_calls_reach(store: &MemoryStore, count: usize) {
    while store.calls().fetches < count {
        tokio::task::yield_now().await;
    }
}

async fn eventually(mut done: impl FnMut() -> bool) {
    while !done() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn shown(session: &SheetSession) -> Vec<RowIdentity> {
    session
        .displayed()
        .into_iter()
        .filter(|identity| !identity.is_placeholder())
        .collect()
}

fn real_ids(records: &[Record]) -> Vec<RowIdentity> {
    records
        .iter()
        .map(|record| RowIdentity::Real(record.id))
        .collect()
}

fn text(value: &str) -> Option<FieldValue> {
    Some(FieldValue::Text(value.to_owned()))
}

#[tokio::test(start_paused = true)]
async fn displayed_list_is_always_padded_to_target() {
    let store = Arc::new(MemoryStore::new());
    let session = SheetSession::open(store.clone(), SHEET, january(), SessionOptions::default())
        .await
        .expect("session opens");
    assert_eq!(session.displayed().len(), 200);
    assert_eq!(session.status().row_count, 0);

    seed(&store, january(), 3, 1);
    session.refresh().await.expect("refresh succeeds");
    assert_eq!(session.displayed().len(), 200);
    assert_eq!(session.status().row_count, 3);

    session.delete_rows(&[0]).await.expect("delete succeeds");
    assert_eq!(session.displayed().len(), 200);
    assert_eq!(session.grid().len(), 200);
}

#[tokio::test(start_paused = true)]
async fn five_quick_edits_on_a_placeholder_make_one_insert() {
    let store = Arc::new(MemoryStore::new());
    let session = open(&store, january()).await;

    let edits = [
        ("patient", "Elliot Reed"),
        ("payer", "Medicaid"),
        ("cpt_code", "97110"),
        ("charge", "95"),
        ("notes", "verify eligibility"),
    ];
    for (key, value) in edits {
        session
            .on_cells_changed(&[CellChange::edit(3, col(key), value)], ChangeSource::Edit)
            .expect("edit applies");
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    settled(&session).await;

    let calls = store.calls();
    assert_eq!(calls.inserts, 1);
    assert_eq!(calls.updates, 0);

    let stored = store.records(SHEET, january());
    assert_eq!(stored.len(), 1);
    let record = &stored[0];
    assert_eq!(record.field("patient").cloned(), text("Elliot Reed"));
    assert_eq!(record.field("payer").cloned(), text("Medicaid"));
    assert_eq!(record.field("cpt_code").cloned(), text("97110"));
    assert_eq!(record.field("charge"), Some(&FieldValue::Number(95.0)));
    assert_eq!(record.field("notes").cloned(), text("verify eligibility"));
    assert_eq!(record.field("balance"), Some(&FieldValue::Number(95.0)));
}

#[tokio::test(start_paused = true)]
async fn identities_only_move_forward_and_keep_their_slot() {
    let store = Arc::new(MemoryStore::new());
    let session = open(&store, january()).await;
    assert!(session.displayed()[2].is_placeholder());

    session
        .on_cells_changed(&[CellChange::edit(2, col("patient"), "Kai Young")], ChangeSource::Edit)
        .expect("edit applies");
    let pending = session.displayed()[2].clone();
    assert!(pending.is_pending());

    settled(&session).await;
    let committed = session.displayed()[2].clone();
    let id = committed.real_id().expect("committed row is real");
    assert_eq!(store.get(id).map(|record| record.id), Some(id));

    session
        .on_cells_changed(&[CellChange::edit(2, col("charge"), "140")], ChangeSource::Edit)
        .expect("edit applies");
    assert_eq!(session.displayed()[2], committed);
    settled(&session).await;

    assert_eq!(session.displayed()[2], committed);
    let calls = store.calls();
    assert_eq!((calls.inserts, calls.updates), (1, 1));
    assert_eq!(
        store.get(id).and_then(|record| record.field("charge").cloned()),
        Some(FieldValue::Number(140.0))
    );
}

#[tokio::test(start_paused = true)]
async fn switching_partitions_and_back_restores_the_view() {
    let store = Arc::new(MemoryStore::new());
    let january_rows = seed(&store, january(), 3, 1);
    let february_rows = seed(&store, february(), 2, 2);
    let session = open(&store, january()).await;
    let before = session.displayed();
    assert_eq!(shown(&session), real_ids(&january_rows));

    session
        .move_partition(february())
        .await
        .expect("move succeeds");
    assert_eq!(shown(&session), real_ids(&february_rows));

    session
        .move_partition(january())
        .await
        .expect("move succeeds");
    assert_eq!(session.displayed(), before);
}

#[tokio::test(start_paused = true)]
async fn reorder_survives_a_refetch() {
    let store = Arc::new(MemoryStore::new());
    let rows = seed(&store, january(), 3, 5);
    let (a, b, c) = (rows[0].id, rows[1].id, rows[2].id);
    let session = open(&store, january()).await;

    let outcome = session
        .on_rows_reordered(&[2], 0)
        .await
        .expect("reorder succeeds");
    assert_eq!(outcome.failed, 0);
    let expected = vec![
        RowIdentity::Real(c),
        RowIdentity::Real(a),
        RowIdentity::Real(b),
    ];
    assert_eq!(shown(&session), expected);

    session.refresh().await.expect("refresh succeeds");
    assert_eq!(shown(&session), expected);

    let reopened = open(&store, january()).await;
    assert_eq!(shown(&reopened), expected);
}

#[tokio::test(start_paused = true)]
async fn failed_order_writes_keep_the_visual_order() {
    let store = Arc::new(MemoryStore::new());
    let rows = seed(&store, january(), 3, 5);
    let session = open(&store, january()).await;
    store.fail_updates(true);

    let outcome = session
        .on_rows_reordered(&[2], 0)
        .await
        .expect("reorder is applied locally");
    assert_eq!(outcome.failed, 3);
    assert_eq!(shown(&session)[0], RowIdentity::Real(rows[2].id));
    assert!(session.status().last_error.is_some());
}

#[tokio::test(start_paused = true)]
async fn stale_fetch_results_are_discarded() {
    let store = Arc::new(MemoryStore::new());
    seed(&store, january(), 3, 1);
    let february_rows = seed(&store, february(), 2, 2);
    let session = open(&store, january()).await;
    store.hold_fetches();

    let slow_refresh = tokio::spawn({
        let session = session.clone();
        async move { session.refresh().await }
    });
    fetch_calls_reach(&store, 2).await;

    let navigation = tokio::spawn({
        let session = session.clone();
        async move { session.move_partition(february()).await }
    });
    fetch_calls_reach(&store, 3).await;

    store.release_fetches(1);
    let stale = slow_refresh
        .await
        .expect("task joins")
        .expect("refresh succeeds");
    assert_eq!(stale, FetchOutcome::Stale);

    store.release_fetches(1);
    let fresh = navigation
        .await
        .expect("task joins")
        .expect("move succeeds");
    assert_eq!(fresh, FetchOutcome::Applied { rows: 2 });
    assert_eq!(shown(&session), real_ids(&february_rows));
    assert_eq!(session.partition(), february());
}

#[tokio::test(start_paused = true)]
async fn refetch_overlapping_a_save_keeps_the_saved_row() {
    let store = Arc::new(MemoryStore::new());
    let session = open(&store, january()).await;
    store.hold_fetches();

    session
        .on_cells_changed(&[CellChange::edit(0, col("patient"), "Jamie Cole")], ChangeSource::Edit)
        .expect("edit applies");
    let slow_refresh = tokio::spawn({
        let session = session.clone();
        async move { session.refresh().await }
    });
    fetch_calls_reach(&store, 2).await;

    settled(&session).await;
    let saved = session.displayed()[0].clone();
    assert!(saved.is_real());

    store.release_fetches(1);
    let outcome = slow_refresh
        .await
        .expect("task joins")
        .expect("refresh succeeds");
    assert_eq!(outcome, FetchOutcome::Applied { rows: 1 });
    assert_eq!(session.displayed()[0], saved);
    assert_eq!(session.status().row_count, 1);

    session
        .on_cells_changed(&[CellChange::edit(0, col("payer"), "Aetna")], ChangeSource::Edit)
        .expect("edit applies");
    settled(&session).await;
    let calls = store.calls();
    assert_eq!((calls.inserts, calls.updates), (1, 1));
    assert_eq!(store.len(), 1);
    let id = saved.real_id().expect("saved row is real");
    assert_eq!(
        store.get(id).and_then(|record| record.field("payer").cloned()),
        text("Aetna")
    );
}

#[tokio::test(start_paused = true)]
async fn deleting_a_row_while_its_insert_is_in_flight_removes_the_record() {
    let store = Arc::new(MemoryStore::new());
    let session = open(&store, january()).await;
    store.hold_inserts();

    session
        .on_cells_changed(&[CellChange::edit(0, col("patient"), "Noor Shah")], ChangeSource::Edit)
        .expect("edit applies");
    eventually(|| store.calls().inserts == 1).await;
    assert!(session.status().saving);

    let removed = session.delete_rows(&[0]).await.expect("delete succeeds");
    assert!(removed.is_empty());
    assert_eq!(session.status().row_count, 0);

    store.release_inserts(1);
    eventually(|| store.calls().deletes == 1).await;
    assert!(store.is_empty());

    session.refresh().await.expect("refresh succeeds");
    assert_eq!(session.status().row_count, 0);
}

#[tokio::test(start_paused = true)]
async fn unmount_flushes_pending_edits() {
    let store = Arc::new(MemoryStore::new());
    let session = open(&store, january()).await;

    session
        .on_cells_changed(
            &[
                CellChange::edit(0, col("patient"), "Hayden Brooks"),
                CellChange::edit(0, col("charge"), "$185.00"),
            ],
            ChangeSource::Paste,
        )
        .expect("paste applies");
    assert_eq!(store.calls().inserts, 0);

    session.unmount().await.expect("unmount flushes");
    assert_eq!(store.calls().inserts, 1);
    assert_eq!(store.len(), 1);
    assert!(!session.status().dirty);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(store.calls().inserts, 1);
    assert!(matches!(
        session.on_cells_changed(&[CellChange::edit(1, 1, "late")], ChangeSource::Edit),
        Err(SyncError::Closed)
    ));
}

#[tokio::test(start_paused = true)]
async fn undo_brings_a_deleted_row_back_locally_and_remotely() {
    let store = Arc::new(MemoryStore::new());
    let rows = seed(&store, january(), 3, 9);
    let session = open(&store, january()).await;

    let removed = session.delete_rows(&[1]).await.expect("delete succeeds");
    assert_eq!(removed, vec![rows[1].id]);
    assert!(store.get(rows[1].id).is_none());
    assert_eq!(session.status().row_count, 2);

    let restored = session.undo().await.expect("undo succeeds");
    assert_eq!(restored, 1);
    let back = session.displayed()[1]
        .real_id()
        .expect("restored row is persisted");
    assert_ne!(back, rows[1].id);
    let record = store.get(back).expect("record re-inserted");
    assert_eq!(record.field("patient"), rows[1].field("patient"));
    assert_eq!(store.len(), 3);

    assert_eq!(session.undo().await.expect("nothing left"), 0);
}

#[tokio::test(start_paused = true)]
async fn undo_keeps_rows_the_store_refused() {
    let store = Arc::new(MemoryStore::new());
    seed(&store, january(), 2, 4);
    let session = open(&store, january()).await;
    session.delete_rows(&[0]).await.expect("delete succeeds");

    store.fail_inserts(true);
    let error = session.undo().await.expect_err("re-insert fails");
    assert!(matches!(
        error,
        SyncError::UndoIncomplete {
            restored: 0,
            failed: 1,
            ..
        }
    ));
    assert!(session.with_model(|model| model.has_undo()));

    store.fail_inserts(false);
    assert_eq!(session.undo().await.expect("retry succeeds"), 1);
    assert_eq!(store.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn undo_after_a_failed_delete_keeps_one_record() {
    let store = Arc::new(MemoryStore::new());
    let rows = seed(&store, january(), 3, 12);
    let session = open(&store, january()).await;

    store.fail_deletes(true);
    session
        .delete_rows(&[1])
        .await
        .expect_err("remote delete fails");
    assert_eq!(session.status().row_count, 2);
    assert!(store.get(rows[1].id).is_some());

    store.fail_deletes(false);
    assert_eq!(session.undo().await.expect("undo succeeds"), 1);
    assert_eq!(session.displayed()[1], RowIdentity::Real(rows[1].id));
    assert_eq!(store.calls().inserts, 0);

    session.refresh().await.expect("refresh succeeds");
    assert_eq!(store.len(), 3);
    assert_eq!(shown(&session), real_ids(&rows));
}

#[tokio::test(start_paused = true)]
async fn failed_saves_keep_edits_until_the_next_burst() {
    let store = Arc::new(MemoryStore::new());
    let session = open(&store, january()).await;
    store.fail_inserts(true);

    session
        .on_cells_changed(&[CellChange::edit(0, col("patient"), "Robin Ward")], ChangeSource::Edit)
        .expect("edit applies");
    let mut status = session.subscribe();
    status
        .wait_for(|status| status.last_error.is_some())
        .await
        .expect("session alive");
    assert!(session.displayed()[0].is_pending());
    assert!(session.status().dirty);
    assert!(store.is_empty());

    store.fail_inserts(false);
    session
        .on_cells_changed(&[CellChange::edit(0, col("payer"), "Self Pay")], ChangeSource::Edit)
        .expect("edit applies");
    settled(&session).await;

    assert_eq!(store.len(), 1);
    assert!(session.status().last_error.is_none());
    assert!(session.displayed()[0].is_real());
}

#[tokio::test(start_paused = true)]
async fn locked_rows_reject_edits_but_save_the_lock() {
    let store = Arc::new(MemoryStore::new());
    let rows = seed(&store, january(), 1, 6);
    let session = open(&store, january()).await;

    assert_eq!(session.set_locked(&[0], true).expect("lock applies"), 1);
    let outcome = session
        .on_cells_changed(&[CellChange::edit(0, col("patient"), "Changed")], ChangeSource::Edit)
        .expect("edit is ignored");
    assert_eq!(outcome.applied, 0);
    assert!(session.is_read_only(0, col("patient")));
    settled(&session).await;

    let record = store.get(rows[0].id).expect("record kept");
    assert!(record.annotations.locked);
    assert_eq!(record.field("patient"), rows[0].field("patient"));
}

#[tokio::test(start_paused = true)]
async fn remote_ids_never_appear_twice() {
    let store = Arc::new(MemoryStore::new());
    let session = open(&store, january()).await;
    session
        .on_cells_changed(&[CellChange::edit(0, col("patient"), "Alex Hill")], ChangeSource::Edit)
        .expect("edit applies");
    settled(&session).await;
    session.refresh().await.expect("refresh succeeds");

    let ids = shown(&session)
        .iter()
        .filter_map(RowIdentity::real_id)
        .collect::<Vec<RecordId>>();
    assert_eq!(ids.len(), 1);
    assert_eq!(session.with_model(|model| model.rows().len()), 1);
}
