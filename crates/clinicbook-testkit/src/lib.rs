// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod memory;

pub use memory::{CallCounts, MemoryStore};

use anyhow::{Context, Result};
use clinicbook_app::{
    CLAIM_STATUSES, FieldValue, PAYERS, Partition, RecordDraft, SheetKind, VISIT_TYPES,
    recompute_derived,
};
use std::path::PathBuf;
use time::{Date, Time};

const FIRST_NAMES: [&str; 16] = [
    "Avery", "Jordan", "Taylor", "Riley", "Morgan", "Casey", "Alex", "Quinn", "Parker", "Drew",
    "Kai", "Elliot", "Robin", "Cameron", "Hayden", "Rowan",
];
const LAST_NAMES: [&str; 18] = [
    "Walker", "Martin", "Hill", "Evans", "Lopez", "Gray", "Ward", "Young", "Diaz", "Reed",
    "Campbell", "Turner", "Flores", "Bennett", "Price", "Morris", "Foster", "Brooks",
];
const PROVIDERS: [&str; 6] = [
    "Dr. Okafor",
    "Dr. Lindqvist",
    "Dr. Patel",
    "Dr. Moreau",
    "Dr. Nakamura",
    "Dr. Salazar",
];
const CPT_CODES: [(&str, i64); 8] = [
    ("97110", 95),
    ("97112", 105),
    ("97140", 90),
    ("97161", 185),
    ("97162", 210),
    ("97164", 140),
    ("97530", 110),
    ("97535", 100),
];
const NOTE_WORDS: [&str; 16] = [
    "resubmit",
    "call",
    "payer",
    "denial",
    "appeal",
    "copay",
    "eligibility",
    "verify",
    "authorization",
    "follow",
    "up",
    "statement",
    "sent",
    "patient",
    "balance",
    "review",
];

/// Ordering-key spacing used for seeded rows.
pub const SEED_KEY_STEP: i64 = 1024;

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }

    fn chance(&mut self, percent: usize) -> bool {
        self.int_n(100) < percent
    }
}

/// Seeded generator of plausible billing rows. The same seed always yields
/// the same rows.
#[derive(Debug, Clone)]
pub struct ClinicFaker {
    rng: DeterministicRng,
}

impl ClinicFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
        }
    }

    pub fn patient_name(&mut self) -> String {
        format!("{} {}", self.pick(&FIRST_NAMES), self.pick(&LAST_NAMES))
    }

    pub fn provider_name(&mut self) -> String {
        self.pick(&PROVIDERS).to_owned()
    }

    /// `count` drafts for one sheet and month, with descending ordering keys.
    pub fn drafts(&mut self, sheet: SheetKind, partition: Partition, count: usize) -> Vec<RecordDraft> {
        (0..count)
            .map(|position| {
                let sort_key = (count - position) as i64 * SEED_KEY_STEP;
                self.draft(sheet, partition).with_sort_key(sort_key)
            })
            .collect()
    }

    pub fn draft(&mut self, sheet: SheetKind, partition: Partition) -> RecordDraft {
        match sheet {
            SheetKind::AccountsReceivable => self.claim(partition),
            SheetKind::ProviderSheet => self.visit(partition),
            SheetKind::ProviderPay => self.pay_entry(partition),
        }
    }

    pub fn claim(&mut self, partition: Partition) -> RecordDraft {
        let sheet = SheetKind::AccountsReceivable;
        let (code, fee) = CPT_CODES[self.rng.int_n(CPT_CODES.len())];
        let charge = fee as f64;
        let status = self.pick(&CLAIM_STATUSES);
        let payment = match status {
            "Paid" => Some((charge * 0.8).round()),
            "Pending" | "Billed" if self.rng.chance(30) => Some((charge * 0.2).round()),
            _ => None,
        };
        let adjustment = payment
            .filter(|_| status == "Paid")
            .map(|paid| charge - paid);

        let mut draft = RecordDraft::blank(sheet, partition)
            .with_field("date_of_service", self.day_in(partition))
            .with_field("patient", FieldValue::Text(self.patient_name()))
            .with_field("payer", FieldValue::Text(self.pick(&PAYERS).to_owned()))
            .with_field("cpt_code", FieldValue::Text(code.to_owned()))
            .with_field("charge", FieldValue::Number(charge))
            .with_field("payment", payment.map_or(FieldValue::Null, FieldValue::Number))
            .with_field(
                "adjustment",
                adjustment.map_or(FieldValue::Null, FieldValue::Number),
            )
            .with_field("status", FieldValue::Text(status.to_owned()))
            .with_field("notes", self.maybe_note());
        recompute_derived(sheet, &mut draft.fields);
        draft
    }

    pub fn visit(&mut self, partition: Partition) -> RecordDraft {
        let sheet = SheetKind::ProviderSheet;
        let (start, end) = self.shift(45, 90);
        let mut draft = RecordDraft::blank(sheet, partition)
            .with_field("date_of_service", self.day_in(partition))
            .with_field("provider", FieldValue::Text(self.provider_name()))
            .with_field("patient", FieldValue::Text(self.patient_name()))
            .with_field("time_in", FieldValue::Time(start))
            .with_field("time_out", FieldValue::Time(end))
            .with_field(
                "visit_type",
                FieldValue::Text(self.pick(&VISIT_TYPES).to_owned()),
            )
            .with_field("notes", self.maybe_note());
        recompute_derived(sheet, &mut draft.fields);
        draft
    }

    pub fn pay_entry(&mut self, partition: Partition) -> RecordDraft {
        let sheet = SheetKind::ProviderPay;
        let (start, end) = self.shift(240, 540);
        let rate = [55.0, 60.0, 65.0, 72.5][self.rng.int_n(4)];
        let mut draft = RecordDraft::blank(sheet, partition)
            .with_field("pay_date", self.day_in(partition))
            .with_field("provider", FieldValue::Text(self.provider_name()))
            .with_field("time_in", FieldValue::Time(start))
            .with_field("time_out", FieldValue::Time(end))
            .with_field("rate", FieldValue::Number(rate))
            .with_field("notes", self.maybe_note());
        recompute_derived(sheet, &mut draft.fields);
        draft
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.rng.int_n(items.len())]
    }

    fn day_in(&mut self, partition: Partition) -> FieldValue {
        let day = 1 + self.rng.int_n(28) as u8;
        Date::from_calendar_date(partition.year(), partition.month(), day)
            .map_or(FieldValue::Null, FieldValue::Date)
    }

    /// A start time on a quarter hour between 07:00 and 12:45 and an end
    /// `min_minutes..=max_minutes` later, rounded to 15 minutes.
    fn shift(&mut self, min_minutes: usize, max_minutes: usize) -> (Time, Time) {
        let start_minutes = 7 * 60 + self.rng.int_n(24) * 15;
        let length = min_minutes + self.rng.int_n((max_minutes - min_minutes) / 15 + 1) * 15;
        let end_minutes = (start_minutes + length) % (24 * 60);
        (clock(start_minutes), clock(end_minutes))
    }

    fn maybe_note(&mut self) -> FieldValue {
        if !self.rng.chance(35) {
            return FieldValue::Null;
        }
        let words = 2 + self.rng.int_n(4);
        let mut note = (0..words)
            .map(|_| self.pick(&NOTE_WORDS))
            .collect::<Vec<_>>()
            .join(" ");
        if let Some(first) = note.get_mut(0..1) {
            first.make_ascii_uppercase();
        }
        FieldValue::Text(note)
    }
}

fn clock(minutes: usize) -> Time {
    Time::from_hms((minutes / 60) as u8, (minutes % 60) as u8, 0).unwrap_or(Time::MIDNIGHT)
}

pub fn temp_db_path() -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let db_path = dir.path().join("clinicbook.db");
    Ok((dir, db_path))
}

#[cfg(test)]
mod tests {
    use super::{ClinicFaker, SEED_KEY_STEP};
    use clinicbook_app::{CLAIM_STATUSES, FieldValue, PAYERS, Partition, SheetKind};
    use time::Month;

    fn partition() -> Partition {
        Partition::new(2026, Month::February)
    }

    #[test]
    fn same_seed_same_rows() {
        let mut left = ClinicFaker::new(42);
        let mut right = ClinicFaker::new(42);
        for sheet in SheetKind::ALL {
            assert_eq!(left.draft(sheet, partition()), right.draft(sheet, partition()));
        }
    }

    #[test]
    fn claims_fall_in_their_month_with_known_enums() {
        let mut faker = ClinicFaker::new(7);
        for _ in 0..50 {
            let claim = faker.claim(partition());
            let date = claim
                .field("date_of_service")
                .and_then(FieldValue::as_date)
                .expect("dated claim");
            assert!(partition().contains(date));

            let payer = claim.field("payer").and_then(FieldValue::as_text).expect("payer");
            assert!(PAYERS.contains(&payer));
            let status = claim.field("status").and_then(FieldValue::as_text).expect("status");
            assert!(CLAIM_STATUSES.contains(&status));
            assert!(claim.field("balance").and_then(FieldValue::as_number).is_some());
        }
    }

    #[test]
    fn pay_entries_carry_derived_amounts() {
        let mut faker = ClinicFaker::new(3);
        let entry = faker.pay_entry(partition());
        let hours = entry.field("hours").and_then(FieldValue::as_number).expect("hours");
        let rate = entry.field("rate").and_then(FieldValue::as_number).expect("rate");
        let amount = entry.field("amount").and_then(FieldValue::as_number).expect("amount");
        assert!((4.0..=9.0).contains(&hours));
        assert!((amount - hours * rate).abs() < 0.01);
    }

    #[test]
    fn drafts_have_descending_keys() {
        let mut faker = ClinicFaker::new(11);
        let drafts = faker.drafts(SheetKind::ProviderSheet, partition(), 3);
        let keys = drafts.iter().map(|draft| draft.sort_key).collect::<Vec<_>>();
        assert_eq!(keys, vec![3 * SEED_KEY_STEP, 2 * SEED_KEY_STEP, SEED_KEY_STEP]);
    }

    #[test]
    fn temp_db_path_lives_in_its_dir() {
        let (dir, path) = super::temp_db_path().expect("temp dir");
        assert!(path.starts_with(dir.path()));
    }
}
