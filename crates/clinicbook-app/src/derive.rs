// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use time::Time;

use crate::model::{FieldValue, SheetKind};

const MINUTES_PER_DAY: i64 = 24 * 60;

/// Recomputes every derived column of `fields` from its inputs.
pub fn recompute_derived(sheet: SheetKind, fields: &mut [FieldValue]) {
    match sheet {
        SheetKind::AccountsReceivable => {
            let balance = balance(
                number(sheet, fields, "charge"),
                number(sheet, fields, "payment"),
                number(sheet, fields, "adjustment"),
            );
            set(sheet, fields, "balance", balance);
        }
        SheetKind::ProviderSheet => {
            let hours = hours_between(time(sheet, fields, "time_in"), time(sheet, fields, "time_out"));
            set(sheet, fields, "hours", hours);
        }
        SheetKind::ProviderPay => {
            let hours = hours_between(time(sheet, fields, "time_in"), time(sheet, fields, "time_out"));
            let amount = hours
                .zip(number(sheet, fields, "rate"))
                .map(|(hours, rate)| round_cents(hours * rate));
            set(sheet, fields, "hours", hours);
            set(sheet, fields, "amount", amount);
        }
    }
}

/// Hours from `start` to `end`, rounded to two decimals. An end before the
/// start is read as an overnight shift.
pub fn hours_between(start: Option<Time>, end: Option<Time>) -> Option<f64> {
    let (start, end) = (start?, end?);
    let mut minutes = (end - start).whole_minutes();
    if minutes < 0 {
        minutes += MINUTES_PER_DAY;
    }
    Some(round_cents(minutes as f64 / 60.0))
}

pub fn balance(charge: Option<f64>, payment: Option<f64>, adjustment: Option<f64>) -> Option<f64> {
    let charge = charge?;
    Some(round_cents(
        charge - payment.unwrap_or(0.0) - adjustment.unwrap_or(0.0),
    ))
}

pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn number(sheet: SheetKind, fields: &[FieldValue], key: &str) -> Option<f64> {
    sheet
        .column_index(key)
        .and_then(|index| fields.get(index))
        .and_then(FieldValue::as_number)
}

fn time(sheet: SheetKind, fields: &[FieldValue], key: &str) -> Option<Time> {
    sheet
        .column_index(key)
        .and_then(|index| fields.get(index))
        .and_then(FieldValue::as_time)
}

fn set(sheet: SheetKind, fields: &mut [FieldValue], key: &str, value: Option<f64>) {
    if let Some(slot) = sheet
        .column_index(key)
        .and_then(|index| fields.get_mut(index))
    {
        *slot = value.map_or(FieldValue::Null, FieldValue::Number);
    }
}

#[cfg(test)]
mod tests {
    use super::{balance, hours_between, recompute_derived};
    use crate::{FieldValue, Partition, RecordDraft, SheetKind};
    use time::{Month, Time};

    fn at(hour: u8, minute: u8) -> Option<Time> {
        Some(Time::from_hms(hour, minute, 0).expect("valid time"))
    }

    #[test]
    fn hours_round_to_two_decimals() {
        assert_eq!(hours_between(at(9, 0), at(10, 20)), Some(1.33));
        assert_eq!(hours_between(at(9, 0), None), None);
    }

    #[test]
    fn overnight_shift_wraps_past_midnight() {
        assert_eq!(hours_between(at(22, 0), at(2, 30)), Some(4.5));
    }

    #[test]
    fn balance_needs_a_charge() {
        assert_eq!(balance(Some(120.0), Some(80.0), None), Some(40.0));
        assert_eq!(balance(None, Some(80.0), None), None);
    }

    #[test]
    fn provider_pay_amount_follows_hours_and_rate() {
        let mut draft = RecordDraft::blank(SheetKind::ProviderPay, Partition::new(2026, Month::May))
            .with_field("time_in", FieldValue::Time(at(8, 0).expect("time")))
            .with_field("time_out", FieldValue::Time(at(11, 45).expect("time")))
            .with_field("rate", FieldValue::Number(60.0));

        recompute_derived(SheetKind::ProviderPay, &mut draft.fields);

        assert_eq!(draft.field("hours"), Some(&FieldValue::Number(3.75)));
        assert_eq!(draft.field("amount"), Some(&FieldValue::Number(225.0)));
    }

    #[test]
    fn clearing_an_input_clears_the_derived_value() {
        let mut draft =
            RecordDraft::blank(SheetKind::AccountsReceivable, Partition::new(2026, Month::May))
                .with_field("charge", FieldValue::Number(100.0));
        recompute_derived(SheetKind::AccountsReceivable, &mut draft.fields);
        assert_eq!(draft.field("balance"), Some(&FieldValue::Number(100.0)));

        draft.set_field("charge", FieldValue::Null);
        recompute_derived(SheetKind::AccountsReceivable, &mut draft.fields);
        assert_eq!(draft.field("balance"), Some(&FieldValue::Null));
    }
}
