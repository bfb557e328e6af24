// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use std::fmt;
use time::{Date, Month, OffsetDateTime, Time};

use crate::coerce::{format_date, format_time};
use crate::ids::RecordId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SheetKind {
    AccountsReceivable,
    ProviderSheet,
    ProviderPay,
}

impl SheetKind {
    pub const ALL: [Self; 3] = [
        Self::AccountsReceivable,
        Self::ProviderSheet,
        Self::ProviderPay,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AccountsReceivable => "ar",
            Self::ProviderSheet => "provider",
            Self::ProviderPay => "pay",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ar" => Some(Self::AccountsReceivable),
            "provider" => Some(Self::ProviderSheet),
            "pay" => Some(Self::ProviderPay),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::AccountsReceivable => "accounts receivable",
            Self::ProviderSheet => "provider sheet",
            Self::ProviderPay => "provider pay",
        }
    }
}

impl fmt::Display for SheetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A calendar month. Every sheet is partitioned by the month of its date column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Partition {
    year: i32,
    month: u8,
}

impl Partition {
    pub fn new(year: i32, month: Month) -> Self {
        Self {
            year,
            month: u8::from(month),
        }
    }

    pub fn from_date(date: Date) -> Self {
        Self::new(date.year(), date.month())
    }

    pub fn current() -> Self {
        Self::from_date(OffsetDateTime::now_utc().date())
    }

    pub const fn year(self) -> i32 {
        self.year
    }

    pub fn month(self) -> Month {
        Month::try_from(self.month).unwrap_or(Month::January)
    }

    pub fn contains(self, date: Date) -> bool {
        Self::from_date(date) == self
    }

    pub fn first_day(self) -> Option<Date> {
        Date::from_calendar_date(self.year, self.month(), 1).ok()
    }

    pub fn next(self) -> Self {
        if self.month >= 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn previous(self) -> Self {
        if self.month <= 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    /// Stable `YYYY-MM` key used by the store's partition column.
    pub fn key(self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let (year, month) = raw.trim().split_once('-')?;
        let year = year.parse::<i32>().ok()?;
        let month = month.parse::<u8>().ok()?;
        let month = Month::try_from(month).ok()?;
        Some(Self::new(year, month))
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// A primitive cell value as exchanged with the grid widget.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum GridValue {
    #[default]
    Null,
    Text(String),
    Number(f64),
}

impl From<&str> for GridValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for GridValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for GridValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

/// A typed field value held on a record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum FieldValue {
    #[default]
    Null,
    Text(String),
    Number(f64),
    Date(Date),
    Time(Time),
}

impl FieldValue {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(value) => value.trim().is_empty(),
            Self::Number(_) | Self::Date(_) | Self::Time(_) => false,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<Date> {
        match self {
            Self::Date(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<Time> {
        match self {
            Self::Time(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn display(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Text(value) => value.clone(),
            Self::Number(value) => {
                if value.fract().abs() < f64::EPSILON {
                    format!("{value:.0}")
                } else {
                    format!("{value}")
                }
            }
            Self::Date(value) => format_date(*value),
            Self::Time(value) => format_time(*value),
        }
    }

    pub fn to_grid(&self) -> GridValue {
        match self {
            Self::Null => GridValue::Null,
            Self::Number(value) => GridValue::Number(*value),
            Self::Text(_) | Self::Date(_) | Self::Time(_) => GridValue::Text(self.display()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Annotations {
    pub locked: bool,
    pub highlight: Option<String>,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub sheet: SheetKind,
    pub partition: Partition,
    pub sort_key: i64,
    pub fields: Vec<FieldValue>,
    pub annotations: Annotations,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Record {
    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.sheet
            .column_index(key)
            .and_then(|index| self.fields.get(index))
    }

    pub fn to_draft(&self) -> RecordDraft {
        RecordDraft {
            sheet: self.sheet,
            partition: self.partition,
            sort_key: self.sort_key,
            fields: self.fields.clone(),
            annotations: self.annotations.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordDraft {
    pub sheet: SheetKind,
    pub partition: Partition,
    pub sort_key: i64,
    pub fields: Vec<FieldValue>,
    pub annotations: Annotations,
}

impl RecordDraft {
    pub fn blank(sheet: SheetKind, partition: Partition) -> Self {
        Self {
            sheet,
            partition,
            sort_key: 0,
            fields: vec![FieldValue::Null; sheet.columns().len()],
            annotations: Annotations::default(),
        }
    }

    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.sheet
            .column_index(key)
            .and_then(|index| self.fields.get(index))
    }

    /// Sets a field by column key. Returns false for keys the sheet does not define.
    pub fn set_field(&mut self, key: &str, value: FieldValue) -> bool {
        let Some(index) = self.sheet.column_index(key) else {
            return false;
        };
        if self.fields.len() <= index {
            self.fields.resize(index + 1, FieldValue::Null);
        }
        self.fields[index] = value;
        true
    }

    pub fn with_field(mut self, key: &str, value: FieldValue) -> Self {
        self.set_field(key, value);
        self
    }

    pub fn with_sort_key(mut self, sort_key: i64) -> Self {
        self.sort_key = sort_key;
        self
    }
}

/// Partial update sent to `update_by_id`. `None` leaves the stored value alone.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RecordPatch {
    pub partition: Option<Partition>,
    pub sort_key: Option<i64>,
    pub fields: Option<Vec<FieldValue>>,
    pub annotations: Option<Annotations>,
}

impl RecordPatch {
    pub fn order_only(sort_key: i64) -> Self {
        Self {
            sort_key: Some(sort_key),
            ..Self::default()
        }
    }

    pub fn from_draft(draft: &RecordDraft) -> Self {
        Self {
            partition: Some(draft.partition),
            sort_key: Some(draft.sort_key),
            fields: Some(draft.fields.clone()),
            annotations: Some(draft.annotations.clone()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.partition.is_none()
            && self.sort_key.is_none()
            && self.fields.is_none()
            && self.annotations.is_none()
    }

    pub fn apply_to(&self, record: &mut Record) {
        if let Some(partition) = self.partition {
            record.partition = partition;
        }
        if let Some(sort_key) = self.sort_key {
            record.sort_key = sort_key;
        }
        if let Some(fields) = &self.fields {
            record.fields = fields.clone();
        }
        if let Some(annotations) = &self.annotations {
            record.annotations = annotations.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{FieldValue, Partition, RecordDraft, RecordPatch, SheetKind};
    use time::{Date, Month};

    #[test]
    fn partition_navigation_wraps_years() {
        let december = Partition::new(2025, Month::December);
        assert_eq!(december.next(), Partition::new(2026, Month::January));
        assert_eq!(
            Partition::new(2026, Month::January).previous(),
            Partition::new(2025, Month::December)
        );
    }

    #[test]
    fn partition_key_parses_back() {
        let partition = Partition::new(2026, Month::March);
        assert_eq!(partition.key(), "2026-03");
        assert_eq!(Partition::parse("2026-03"), Some(partition));
        assert_eq!(Partition::parse("2026-13"), None);
        assert_eq!(Partition::parse("march"), None);
    }

    #[test]
    fn partition_contains_dates_in_its_month() {
        let partition = Partition::new(2026, Month::February);
        let inside = Date::from_calendar_date(2026, Month::February, 28).expect("valid date");
        let outside = Date::from_calendar_date(2026, Month::March, 1).expect("valid date");
        assert!(partition.contains(inside));
        assert!(!partition.contains(outside));
    }

    #[test]
    fn sheet_kind_round_trips_through_storage_tag() {
        for sheet in SheetKind::ALL {
            assert_eq!(SheetKind::parse(sheet.as_str()), Some(sheet));
        }
        assert_eq!(SheetKind::parse("invoices"), None);
    }

    #[test]
    fn draft_ignores_unknown_columns() {
        let mut draft = RecordDraft::blank(
            SheetKind::AccountsReceivable,
            Partition::new(2026, Month::January),
        );
        assert!(draft.set_field("patient", FieldValue::Text("Avery Walker".to_owned())));
        assert!(!draft.set_field("shoe_size", FieldValue::Number(9.0)));
        assert_eq!(
            draft.field("patient"),
            Some(&FieldValue::Text("Avery Walker".to_owned()))
        );
    }

    #[test]
    fn order_only_patch_touches_just_the_sort_key() {
        let patch = RecordPatch::order_only(42);
        assert_eq!(patch.sort_key, Some(42));
        assert!(patch.fields.is_none());
        assert!(!patch.is_empty());
        assert!(RecordPatch::default().is_empty());
    }

    #[test]
    fn whitespace_text_counts_as_empty() {
        assert!(FieldValue::Text("  ".to_owned()).is_empty());
        assert!(FieldValue::Null.is_empty());
        assert!(!FieldValue::Number(0.0).is_empty());
    }
}
