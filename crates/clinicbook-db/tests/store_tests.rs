// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use clinicbook_app::{FieldValue, Partition, RecordDraft, RecordId, RecordPatch, SheetKind};
use clinicbook_db::{Store, validate_db_path};
use clinicbook_testkit::{ClinicFaker, temp_db_path};
use time::Month;

fn march() -> Partition {
    Partition::new(2026, Month::March)
}

fn bootstrapped() -> Result<Store> {
    let store = Store::open_memory()?;
    store.bootstrap()?;
    Ok(store)
}

#[test]
fn validate_db_path_rejects_uri_forms() {
    assert!(validate_db_path("").is_err());
    assert!(validate_db_path("file:clinic.db").is_err());
    assert!(validate_db_path("https://example.com/clinic.sqlite").is_err());
    assert!(validate_db_path("clinic.db?mode=ro").is_err());
    assert!(validate_db_path(":memory:").is_ok());
    assert!(validate_db_path("/tmp/clinicbook.db").is_ok());
}

#[test]
fn bootstrap_is_idempotent() -> Result<()> {
    let store = bootstrapped()?;
    store.bootstrap()?;
    assert_eq!(store.count_records(SheetKind::AccountsReceivable)?, 0);
    Ok(())
}

#[test]
fn bootstrap_rejects_schema_missing_required_column() -> Result<()> {
    let store = bootstrapped()?;
    store.raw_connection().execute_batch(
        "
        DROP TABLE sheet_records;
        CREATE TABLE sheet_records (
          id INTEGER PRIMARY KEY,
          sheet TEXT NOT NULL,
          partition_key TEXT NOT NULL,
          fields TEXT NOT NULL,
          created_at TEXT NOT NULL,
          updated_at TEXT NOT NULL
        );
        ",
    )?;

    let err = store
        .bootstrap()
        .expect_err("schema validation should fail");
    let message = err.to_string();
    assert!(message.contains("table `sheet_records` is missing required columns"));
    assert!(message.contains("sort_key"));
    Ok(())
}

#[test]
fn bootstrap_rejects_foreign_database() -> Result<()> {
    let store = Store::open_memory()?;
    store
        .raw_connection()
        .execute_batch("CREATE TABLE invoices (id INTEGER PRIMARY KEY);")?;
    let err = store.bootstrap().expect_err("foreign schema");
    assert!(err.to_string().contains("missing required table `sheet_records`"));
    Ok(())
}

#[test]
fn list_partition_orders_by_sort_key_then_id() -> Result<()> {
    let store = bootstrapped()?;
    let sheet = SheetKind::AccountsReceivable;
    let mut faker = ClinicFaker::new(5);

    let low = store.insert_record(&faker.claim(march()).with_sort_key(10))?;
    let tie_first = store.insert_record(&faker.claim(march()).with_sort_key(20))?;
    let tie_second = store.insert_record(&faker.claim(march()).with_sort_key(20))?;
    store.insert_record(&faker.claim(march().next()).with_sort_key(99))?;
    store.insert_record(&faker.visit(march()).with_sort_key(99))?;

    let ids = store
        .list_partition(sheet, march())?
        .into_iter()
        .map(|record| record.id)
        .collect::<Vec<_>>();
    assert_eq!(ids, vec![tie_first.id, tie_second.id, low.id]);
    Ok(())
}

#[test]
fn records_round_trip_through_sqlite() -> Result<()> {
    let store = bootstrapped()?;
    let mut faker = ClinicFaker::new(21);
    for sheet in SheetKind::ALL {
        let mut draft = faker.draft(sheet, march()).with_sort_key(7);
        draft.annotations.locked = true;
        draft.annotations.highlight = Some("#ffe08a".to_owned());
        draft.annotations.comment = "check eligibility".to_owned();

        let inserted = store.insert_record(&draft)?;
        let loaded = store
            .get_record(inserted.id)?
            .expect("inserted record is readable");
        assert_eq!(loaded.to_draft(), draft, "{sheet}");
        assert_eq!(loaded.created_at, inserted.created_at);
    }
    Ok(())
}

#[test]
fn update_applies_only_patched_parts() -> Result<()> {
    let store = bootstrapped()?;
    let draft = RecordDraft::blank(SheetKind::ProviderPay, march())
        .with_field("provider", FieldValue::Text("Dr. Patel".to_owned()))
        .with_sort_key(3);
    let record = store.insert_record(&draft)?;

    let updated = store
        .update_record(record.id, &RecordPatch::order_only(4096))?
        .expect("record exists");
    assert_eq!(updated.sort_key, 4096);

    let loaded = store.get_record(record.id)?.expect("record exists");
    assert_eq!(loaded.sort_key, 4096);
    assert_eq!(
        loaded.field("provider"),
        Some(&FieldValue::Text("Dr. Patel".to_owned()))
    );
    Ok(())
}

#[test]
fn update_can_move_a_record_to_another_month() -> Result<()> {
    let store = bootstrapped()?;
    let sheet = SheetKind::ProviderSheet;
    let record = store.insert_record(&RecordDraft::blank(sheet, march()))?;

    let patch = RecordPatch {
        partition: Some(march().next()),
        ..RecordPatch::default()
    };
    store.update_record(record.id, &patch)?;

    assert!(store.list_partition(sheet, march())?.is_empty());
    assert_eq!(store.list_partition(sheet, march().next())?.len(), 1);
    assert_eq!(store.partitions(sheet)?, vec![march().next()]);
    Ok(())
}

#[test]
fn missing_rows_are_reported_not_errors() -> Result<()> {
    let store = bootstrapped()?;
    let missing = RecordId::new(404);
    assert!(store.get_record(missing)?.is_none());
    assert!(
        store
            .update_record(missing, &RecordPatch::order_only(1))?
            .is_none()
    );
    assert!(!store.delete_record(missing)?);
    Ok(())
}

#[test]
fn deleted_ids_are_never_reused() -> Result<()> {
    let store = bootstrapped()?;
    let draft = RecordDraft::blank(SheetKind::AccountsReceivable, march());
    let first = store.insert_record(&draft)?;
    assert!(store.delete_record(first.id)?);

    let second = store.insert_record(&draft)?;
    assert!(second.id > first.id);
    Ok(())
}

#[test]
fn on_disk_store_survives_reopen() -> Result<()> {
    let (_dir, path) = temp_db_path()?;
    let sheet = SheetKind::AccountsReceivable;
    let record = {
        let store = Store::open(&path)?;
        store.bootstrap()?;
        store.insert_record(&ClinicFaker::new(9).claim(march()))?
    };

    let store = Store::open(&path)?;
    store.bootstrap()?;
    let records = store.list_partition(sheet, march())?;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, record.id);
    assert_eq!(records[0].fields, record.fields);
    Ok(())
}
