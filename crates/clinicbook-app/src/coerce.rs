// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use time::macros::format_description;
use time::{Date, Time};

use crate::model::{FieldValue, GridValue};
use crate::schema::{ColumnKind, ColumnSpec};

/// Literal some store round trips leave behind in place of a real null.
pub const NULL_SENTINEL: &str = "null";

pub fn coerce_cell(column: &ColumnSpec, value: &GridValue) -> FieldValue {
    match column.kind {
        ColumnKind::Number => coerce_number(value),
        ColumnKind::Date => coerce_date(value),
        ColumnKind::Time => coerce_time(value),
        ColumnKind::Text | ColumnKind::Enum => coerce_text(value),
    }
}

pub fn coerce_number(value: &GridValue) -> FieldValue {
    match value {
        GridValue::Null => FieldValue::Null,
        GridValue::Number(number) if number.is_finite() => FieldValue::Number(*number),
        GridValue::Number(_) => FieldValue::Null,
        GridValue::Text(raw) => parse_amount(raw).map_or(FieldValue::Null, FieldValue::Number),
    }
}

pub fn coerce_date(value: &GridValue) -> FieldValue {
    match value {
        GridValue::Null => FieldValue::Null,
        GridValue::Number(number) => FieldValue::Text(FieldValue::Number(*number).display()),
        GridValue::Text(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed == NULL_SENTINEL {
                return FieldValue::Null;
            }
            parse_date(trimmed).map_or_else(|| FieldValue::Text(raw.clone()), FieldValue::Date)
        }
    }
}

pub fn coerce_time(value: &GridValue) -> FieldValue {
    match value {
        GridValue::Null => FieldValue::Null,
        GridValue::Number(number) => FieldValue::Text(FieldValue::Number(*number).display()),
        GridValue::Text(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed == NULL_SENTINEL {
                return FieldValue::Null;
            }
            parse_time(trimmed).map_or_else(|| FieldValue::Text(raw.clone()), FieldValue::Time)
        }
    }
}

pub fn coerce_text(value: &GridValue) -> FieldValue {
    match value {
        GridValue::Null => FieldValue::Null,
        GridValue::Number(number) => FieldValue::Text(FieldValue::Number(*number).display()),
        GridValue::Text(raw) if raw.trim() == NULL_SENTINEL => FieldValue::Null,
        GridValue::Text(raw) => FieldValue::Text(raw.clone()),
    }
}

/// Parses money-ish input: `1,250.00`, `$80`, `(15.50)` for negatives.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == NULL_SENTINEL {
        return None;
    }
    let (negative, body) = match trimmed
        .strip_prefix('(')
        .and_then(|inner| inner.strip_suffix(')'))
    {
        Some(inner) => (true, inner),
        None => (false, trimmed),
    };
    let cleaned = body
        .chars()
        .filter(|ch| *ch != '$' && *ch != ',')
        .collect::<String>();
    let value = cleaned
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())?;
    Some(if negative { -value } else { value })
}

pub fn parse_date(raw: &str) -> Option<Date> {
    let raw = raw.trim();
    if let Ok(value) = Date::parse(raw, &format_description!("[year]-[month]-[day]")) {
        return Some(value);
    }
    if let Ok(value) = Date::parse(raw, &format_description!("[month]/[day]/[year]")) {
        return Some(value);
    }
    Date::parse(
        raw,
        &format_description!("[month padding:none]/[day padding:none]/[year]"),
    )
    .ok()
}

pub fn parse_time(raw: &str) -> Option<Time> {
    let raw = raw.trim();
    if let Ok(value) = Time::parse(raw, &format_description!("[hour]:[minute]")) {
        return Some(value);
    }
    if let Ok(value) = Time::parse(raw, &format_description!("[hour]:[minute]:[second]")) {
        return Some(value);
    }
    if let Ok(value) = Time::parse(raw, &format_description!("[hour padding:none]:[minute]")) {
        return Some(value);
    }
    Time::parse(
        raw,
        &format_description!(
            "[hour repr:12 padding:none]:[minute] [period case_sensitive:false]"
        ),
    )
    .ok()
}

pub fn format_date(value: Date) -> String {
    value
        .format(&format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| "1970-01-01".to_owned())
}

pub fn format_time(value: Time) -> String {
    value
        .format(&format_description!("[hour]:[minute]"))
        .unwrap_or_else(|_| "00:00".to_owned())
}
