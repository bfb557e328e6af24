// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, bail};
use clinicbook_app::{ColumnKind, FieldValue, SheetKind, format_date, format_time};
use serde_json::{Map, Number, Value};

/// Encodes a row's fields as a JSON object keyed by column key. Empty cells
/// are left out.
pub fn encode_fields(sheet: SheetKind, fields: &[FieldValue]) -> Result<String> {
    let mut object = Map::new();
    for (column, value) in sheet.columns().iter().zip(fields) {
        let encoded = match value {
            FieldValue::Null => continue,
            FieldValue::Text(text) => Value::String(text.clone()),
            FieldValue::Number(number) => match Number::from_f64(*number) {
                Some(number) => Value::Number(number),
                None => continue,
            },
            FieldValue::Date(date) => Value::String(format_date(*date)),
            FieldValue::Time(time) => Value::String(format_time(*time)),
        };
        object.insert(column.key.to_owned(), encoded);
    }
    serde_json::to_string(&Value::Object(object))
        .with_context(|| format!("encode {sheet} fields"))
}

/// Decodes a stored JSON object back into one value per column. Keys the
/// sheet does not define are ignored.
pub fn decode_fields(sheet: SheetKind, raw: &str) -> Result<Vec<FieldValue>> {
    let value: Value =
        serde_json::from_str(raw).with_context(|| format!("parse {sheet} fields {raw:?}"))?;
    let Value::Object(object) = value else {
        bail!("{sheet} fields must be a JSON object, got {raw:?}");
    };

    sheet
        .columns()
        .iter()
        .map(|column| {
            let Some(value) = object.get(column.key) else {
                return Ok(FieldValue::Null);
            };
            decode_value(column.kind, value)
                .with_context(|| format!("decode column `{}` of {sheet}", column.key))
        })
        .collect()
}

fn decode_value(kind: ColumnKind, value: &Value) -> Result<FieldValue> {
    let decoded = match (kind, value) {
        (_, Value::Null) => FieldValue::Null,
        (ColumnKind::Number, Value::Number(number)) => match number.as_f64() {
            Some(number) => FieldValue::Number(number),
            None => bail!("number {number} is out of range"),
        },
        (ColumnKind::Date, Value::String(raw)) => match clinicbook_app::parse_date(raw) {
            Some(date) => FieldValue::Date(date),
            None => bail!("invalid date {raw:?}"),
        },
        (ColumnKind::Time, Value::String(raw)) => match clinicbook_app::parse_time(raw) {
            Some(time) => FieldValue::Time(time),
            None => bail!("invalid time {raw:?}"),
        },
        (ColumnKind::Text | ColumnKind::Enum, Value::String(raw)) => FieldValue::Text(raw.clone()),
        (kind, other) => bail!("{other} does not fit a {kind:?} column"),
    };
    Ok(decoded)
}
