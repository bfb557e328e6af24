// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use clinicbook_app::{Partition, SheetKind};
use clinicbook_db::Store;
use clinicbook_testkit::ClinicFaker;

const DEMO_SEED: u64 = 2026;
const DEMO_ROWS_PER_MONTH: usize = 12;

/// Fills every sheet with rows for `around` and the month before it.
pub fn seed_demo_data(store: &Store, around: Partition) -> Result<usize> {
    let mut faker = ClinicFaker::new(DEMO_SEED);
    let mut seeded = 0;
    for sheet in SheetKind::ALL {
        for partition in [around.previous(), around] {
            for draft in faker.drafts(sheet, partition, DEMO_ROWS_PER_MONTH) {
                store.insert_record(&draft)?;
                seeded += 1;
            }
        }
    }
    Ok(seeded)
}
