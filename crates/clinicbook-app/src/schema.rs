// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::Serialize;

use crate::model::SheetKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColumnKind {
    Text,
    Date,
    Time,
    Number,
    Enum,
}

/// Column descriptor handed to the grid widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ColumnSpec {
    pub key: &'static str,
    pub label: &'static str,
    pub kind: ColumnKind,
    /// Derived columns are recomputed from their inputs and never edited directly.
    pub derived: bool,
    pub options: &'static [&'static str],
}

impl ColumnSpec {
    const fn input(key: &'static str, label: &'static str, kind: ColumnKind) -> Self {
        Self {
            key,
            label,
            kind,
            derived: false,
            options: &[],
        }
    }

    const fn derived(key: &'static str, label: &'static str) -> Self {
        Self {
            key,
            label,
            kind: ColumnKind::Number,
            derived: true,
            options: &[],
        }
    }

    const fn choice(
        key: &'static str,
        label: &'static str,
        options: &'static [&'static str],
    ) -> Self {
        Self {
            key,
            label,
            kind: ColumnKind::Enum,
            derived: false,
            options,
        }
    }
}

pub const PAYERS: [&str; 4] = ["Medicare", "Medicaid", "Commercial", "Self Pay"];
pub const CLAIM_STATUSES: [&str; 5] = ["Billed", "Pending", "Paid", "Denied", "Appeal"];
pub const VISIT_TYPES: [&str; 4] = ["Evaluation", "Treatment", "Re-evaluation", "Discharge"];

static ACCOUNTS_RECEIVABLE_COLUMNS: [ColumnSpec; 10] = [
    ColumnSpec::input("date_of_service", "Date of Service", ColumnKind::Date),
    ColumnSpec::input("patient", "Patient", ColumnKind::Text),
    ColumnSpec::choice("payer", "Payer", &PAYERS),
    ColumnSpec::input("cpt_code", "CPT", ColumnKind::Text),
    ColumnSpec::input("charge", "Charge", ColumnKind::Number),
    ColumnSpec::input("payment", "Payment", ColumnKind::Number),
    ColumnSpec::input("adjustment", "Adjustment", ColumnKind::Number),
    ColumnSpec::derived("balance", "Balance"),
    ColumnSpec::choice("status", "Status", &CLAIM_STATUSES),
    ColumnSpec::input("notes", "Notes", ColumnKind::Text),
];

static PROVIDER_SHEET_COLUMNS: [ColumnSpec; 8] = [
    ColumnSpec::input("date_of_service", "Date of Service", ColumnKind::Date),
    ColumnSpec::input("provider", "Provider", ColumnKind::Text),
    ColumnSpec::input("patient", "Patient", ColumnKind::Text),
    ColumnSpec::input("time_in", "Time In", ColumnKind::Time),
    ColumnSpec::input("time_out", "Time Out", ColumnKind::Time),
    ColumnSpec::derived("hours", "Hours"),
    ColumnSpec::choice("visit_type", "Visit Type", &VISIT_TYPES),
    ColumnSpec::input("notes", "Notes", ColumnKind::Text),
];

static PROVIDER_PAY_COLUMNS: [ColumnSpec; 8] = [
    ColumnSpec::input("pay_date", "Pay Date", ColumnKind::Date),
    ColumnSpec::input("provider", "Provider", ColumnKind::Text),
    ColumnSpec::input("time_in", "Time In", ColumnKind::Time),
    ColumnSpec::input("time_out", "Time Out", ColumnKind::Time),
    ColumnSpec::derived("hours", "Hours"),
    ColumnSpec::input("rate", "Rate", ColumnKind::Number),
    ColumnSpec::derived("amount", "Amount"),
    ColumnSpec::input("notes", "Notes", ColumnKind::Text),
];

impl SheetKind {
    pub fn columns(self) -> &'static [ColumnSpec] {
        match self {
            Self::AccountsReceivable => &ACCOUNTS_RECEIVABLE_COLUMNS,
            Self::ProviderSheet => &PROVIDER_SHEET_COLUMNS,
            Self::ProviderPay => &PROVIDER_PAY_COLUMNS,
        }
    }

    /// Index of the date column that decides a row's partition.
    pub const fn partition_column(self) -> usize {
        0
    }

    pub fn column_index(self, key: &str) -> Option<usize> {
        self.columns().iter().position(|column| column.key == key)
    }

    pub fn column(self, index: usize) -> Option<&'static ColumnSpec> {
        self.columns().get(index)
    }
}
