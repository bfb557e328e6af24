// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod fields;

pub use fields::{decode_fields, encode_fields};

use anyhow::{Context, Result, anyhow, bail};
use clinicbook_app::{
    Annotations, Partition, Record, RecordDraft, RecordId, RecordPatch, SheetKind,
};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use time::PrimitiveDateTime;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;

pub const APP_NAME: &str = "clinicbook";

const RECORD_COLUMNS: &str = "
  id, sheet, partition_key, sort_key, fields,
  locked, highlight, comment, created_at, updated_at
";

const REQUIRED_SCHEMA: &[(&str, &[&str])] = &[(
    "sheet_records",
    &[
        "id",
        "sheet",
        "partition_key",
        "sort_key",
        "fields",
        "locked",
        "highlight",
        "comment",
        "created_at",
        "updated_at",
    ],
)];

struct RequiredIndex {
    name: &'static str,
    create_sql: &'static str,
}

const REQUIRED_INDEXES: &[RequiredIndex] = &[RequiredIndex {
    name: "idx_sheet_records_partition",
    create_sql: "CREATE INDEX IF NOT EXISTS idx_sheet_records_partition ON sheet_records (sheet, partition_key, sort_key);",
}];

/// SQLite-backed record storage. One table holds the rows of every sheet;
/// each row's fields are a JSON object keyed by column.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let printable = path.to_string_lossy().to_string();
        validate_db_path(&printable)?;
        let conn = Connection::open(path)
            .with_context(|| format!("open database at {}", path.display()))?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory database")?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn raw_connection(&self) -> &Connection {
        &self.conn
    }

    pub fn bootstrap(&self) -> Result<()> {
        if has_user_tables(&self.conn)? {
            validate_schema(&self.conn)?;
        } else {
            self.conn
                .execute_batch(include_str!("sql/schema.sql"))
                .context("create schema")?;
        }

        ensure_required_indexes(&self.conn)
    }

    /// Rows of one sheet and month, highest `sort_key` first. Ties keep
    /// insertion order.
    pub fn list_partition(&self, sheet: SheetKind, partition: Partition) -> Result<Vec<Record>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "
                SELECT {RECORD_COLUMNS}
                FROM sheet_records
                WHERE sheet = ? AND partition_key = ?
                ORDER BY sort_key DESC, id ASC
                "
            ))
            .context("prepare partition query")?;
        let rows = stmt
            .query_map(params![sheet.as_str(), partition.key()], StoredRow::read)
            .with_context(|| format!("query {sheet} rows for {partition}"))?;

        let mut records = Vec::new();
        for row in rows {
            let row = row.with_context(|| format!("read {sheet} row for {partition}"))?;
            records.push(row.into_record()?);
        }
        Ok(records)
    }

    pub fn get_record(&self, id: RecordId) -> Result<Option<Record>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {RECORD_COLUMNS} FROM sheet_records WHERE id = ?"),
                params![id.get()],
                StoredRow::read,
            )
            .optional()
            .with_context(|| format!("load record {id}"))?;
        row.map(StoredRow::into_record).transpose()
    }

    pub fn insert_record(&self, draft: &RecordDraft) -> Result<Record> {
        let fields = encode_fields(draft.sheet, &draft.fields)?;
        let now = OffsetDateTime::now_utc();
        let stamp = format_timestamp(now)?;
        self.conn
            .execute(
                "
                INSERT INTO sheet_records (
                  sheet, partition_key, sort_key, fields,
                  locked, highlight, comment, created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ",
                params![
                    draft.sheet.as_str(),
                    draft.partition.key(),
                    draft.sort_key,
                    fields,
                    draft.annotations.locked,
                    draft.annotations.highlight,
                    draft.annotations.comment,
                    stamp,
                    stamp,
                ],
            )
            .with_context(|| format!("insert {} record", draft.sheet))?;

        Ok(Record {
            id: RecordId::new(self.conn.last_insert_rowid()),
            sheet: draft.sheet,
            partition: draft.partition,
            sort_key: draft.sort_key,
            fields: draft.fields.clone(),
            annotations: draft.annotations.clone(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Applies a patch and returns the stored result, or `None` when no row
    /// has that id.
    pub fn update_record(&self, id: RecordId, patch: &RecordPatch) -> Result<Option<Record>> {
        let Some(mut record) = self.get_record(id)? else {
            return Ok(None);
        };
        patch.apply_to(&mut record);
        record.updated_at = OffsetDateTime::now_utc();

        let fields = encode_fields(record.sheet, &record.fields)?;
        self.conn
            .execute(
                "
                UPDATE sheet_records
                SET
                  partition_key = ?,
                  sort_key = ?,
                  fields = ?,
                  locked = ?,
                  highlight = ?,
                  comment = ?,
                  updated_at = ?
                WHERE id = ?
                ",
                params![
                    record.partition.key(),
                    record.sort_key,
                    fields,
                    record.annotations.locked,
                    record.annotations.highlight,
                    record.annotations.comment,
                    format_timestamp(record.updated_at)?,
                    id.get(),
                ],
            )
            .with_context(|| format!("update record {id}"))?;
        Ok(Some(record))
    }

    /// Returns false when no row had that id.
    pub fn delete_record(&self, id: RecordId) -> Result<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM sheet_records WHERE id = ?", params![id.get()])
            .with_context(|| format!("delete record {id}"))?;
        Ok(removed > 0)
    }

    pub fn count_records(&self, sheet: SheetKind) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sheet_records WHERE sheet = ?",
                params![sheet.as_str()],
                |row| row.get(0),
            )
            .with_context(|| format!("count {sheet} records"))?;
        usize::try_from(count).with_context(|| format!("record count {count} is negative"))
    }

    /// Months holding at least one row of `sheet`, newest first.
    pub fn partitions(&self, sheet: SheetKind) -> Result<Vec<Partition>> {
        let mut stmt = self
            .conn
            .prepare(
                "
                SELECT DISTINCT partition_key
                FROM sheet_records
                WHERE sheet = ?
                ORDER BY partition_key DESC
                ",
            )
            .context("prepare partition list query")?;
        let keys = stmt
            .query_map(params![sheet.as_str()], |row| row.get::<_, String>(0))
            .with_context(|| format!("list {sheet} partitions"))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .with_context(|| format!("collect {sheet} partitions"))?;

        keys.iter()
            .map(|key| {
                Partition::parse(key).ok_or_else(|| anyhow!("invalid partition key {key:?}"))
            })
            .collect()
    }
}

/// Raw column values of one `sheet_records` row.
struct StoredRow {
    id: i64,
    sheet: String,
    partition_key: String,
    sort_key: i64,
    fields: String,
    locked: bool,
    highlight: Option<String>,
    comment: String,
    created_at: String,
    updated_at: String,
}

impl StoredRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            sheet: row.get(1)?,
            partition_key: row.get(2)?,
            sort_key: row.get(3)?,
            fields: row.get(4)?,
            locked: row.get(5)?,
            highlight: row.get(6)?,
            comment: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    fn into_record(self) -> Result<Record> {
        let sheet = SheetKind::parse(&self.sheet)
            .ok_or_else(|| anyhow!("record {} has unknown sheet {:?}", self.id, self.sheet))?;
        let partition = Partition::parse(&self.partition_key).ok_or_else(|| {
            anyhow!(
                "record {} has invalid partition key {:?}",
                self.id,
                self.partition_key
            )
        })?;
        let fields = decode_fields(sheet, &self.fields)
            .with_context(|| format!("decode fields of record {}", self.id))?;

        Ok(Record {
            id: RecordId::new(self.id),
            sheet,
            partition,
            sort_key: self.sort_key,
            fields,
            annotations: Annotations {
                locked: self.locked,
                highlight: self.highlight,
                comment: self.comment,
            },
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

pub fn default_db_path() -> Result<PathBuf> {
    if let Some(override_path) = env::var_os("CLINICBOOK_DB_PATH") {
        return Ok(PathBuf::from(override_path));
    }

    let data_root = dirs::data_local_dir().ok_or_else(|| {
        anyhow!("cannot resolve data directory; set CLINICBOOK_DB_PATH to a writable database path")
    })?;

    let app_dir = data_root.join(APP_NAME);
    fs::create_dir_all(&app_dir)
        .with_context(|| format!("create data directory {}", app_dir.display()))?;
    Ok(app_dir.join("clinicbook.db"))
}

pub fn validate_db_path(path: &str) -> Result<()> {
    if path.is_empty() {
        bail!("database path must not be empty");
    }
    if path == ":memory:" {
        return Ok(());
    }

    if let Some(index) = path.find("://")
        && index > 0
    {
        let scheme = &path[..index];
        if scheme.chars().all(char::is_alphabetic) {
            bail!(
                "database path {path:?} looks like a URI ({scheme}://); pass a filesystem path instead"
            );
        }
    }

    if path.starts_with("file:") {
        bail!("database path {path:?} uses file: URI syntax; pass a plain filesystem path");
    }

    if path.contains('?') {
        bail!(
            "database path {path:?} contains '?'; remove query parameters and use a plain file path"
        );
    }

    Ok(())
}

fn has_user_tables(conn: &Connection) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "
            SELECT COUNT(*)
            FROM sqlite_master
            WHERE type = 'table'
              AND name NOT LIKE 'sqlite_%'
            ",
            [],
            |row| row.get(0),
        )
        .context("count user tables")?;
    Ok(count > 0)
}

fn validate_schema(conn: &Connection) -> Result<()> {
    for (table, required_columns) in REQUIRED_SCHEMA {
        if !table_exists(conn, table)? {
            bail!(
                "database is missing required table `{table}`; point [storage].db_path at a clinicbook database"
            );
        }

        let columns = table_columns(conn, table)?;
        let missing: Vec<&str> = required_columns
            .iter()
            .copied()
            .filter(|column| !columns.contains(*column))
            .collect();

        if !missing.is_empty() {
            bail!(
                "table `{table}` is missing required columns: {}; the database was not created by clinicbook",
                missing.join(", ")
            );
        }
    }

    Ok(())
}

fn ensure_required_indexes(conn: &Connection) -> Result<()> {
    for index in REQUIRED_INDEXES {
        conn.execute_batch(index.create_sql)
            .with_context(|| format!("ensure required index `{}`", index.name))?;
    }

    let existing = index_names(conn)?;
    let missing = REQUIRED_INDEXES
        .iter()
        .filter(|index| !existing.contains(index.name))
        .map(|index| index.name)
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        bail!("database is missing required indexes: {}", missing.join(", "));
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let exists = conn
        .query_row(
            "
            SELECT EXISTS(
              SELECT 1
              FROM sqlite_master
              WHERE type = 'table' AND name = ?
            )
            ",
            params![table],
            |row| row.get::<_, i64>(0),
        )
        .with_context(|| format!("check table existence for {table}"))?;
    Ok(exists == 1)
}

fn table_columns(conn: &Connection, table: &str) -> Result<BTreeSet<String>> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table})"))
        .with_context(|| format!("inspect columns for {table}"))?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .with_context(|| format!("query column info for {table}"))?;

    rows.collect::<rusqlite::Result<BTreeSet<_>>>()
        .with_context(|| format!("collect columns for {table}"))
}

fn index_names(conn: &Connection) -> Result<BTreeSet<String>> {
    let mut stmt = conn
        .prepare(
            "
            SELECT name
            FROM sqlite_master
            WHERE type = 'index'
              AND name NOT LIKE 'sqlite_%'
            ",
        )
        .context("prepare index names query")?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .context("query index names")?;
    rows.collect::<rusqlite::Result<BTreeSet<_>>>()
        .context("collect index names")
}

fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        ",
    )
    .context("configure sqlite pragmas")
}

fn format_timestamp(value: OffsetDateTime) -> Result<String> {
    value.format(&Rfc3339).context("format timestamp")
}

fn parse_datetime(raw: &str) -> Result<OffsetDateTime> {
    if let Ok(value) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Ok(value);
    }

    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        &format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    ) {
        return Ok(value.assume_utc());
    }

    bail!("unsupported datetime format {raw:?}")
}
