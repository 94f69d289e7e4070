//! Proptest-driven edge cases for spool scanning.

use std::collections::BTreeSet;
use std::fs;

use atd_spool::{JobStore, due_horizon, parse_name};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_digit_names_parse(due in "[0-9]{1,19}", pid in "[0-9]{1,9}") {
        let name = format!("{due}.{pid}");
        let parsed = parse_name(&name);
        let expected_due: Option<u64> = due.parse().ok();
        prop_assert_eq!(parsed.map(|id| id.due), expected_due);
    }

    #[test]
    fn prop_arbitrary_names_never_panic(name in ".{0,40}") {
        if let Some(id) = parse_name(&name) {
            prop_assert!(name.bytes().all(|b| b.is_ascii_digit() || b == b'.'));
            prop_assert_eq!(name.matches('.').count(), 1);
            prop_assert!(id.to_string().len() <= name.len());
        }
    }

    #[test]
    fn prop_scan_partitions_the_spool(
        offsets in prop::collection::btree_set(-5_000i64..5_000, 0..12),
        now in 1_000_000u64..2_000_000_000,
    ) {
        let dir = tempfile::tempdir().map_err(|e| TestCaseError::fail(e.to_string()))?;
        let mut dues = BTreeSet::new();
        for (pid, offset) in offsets.iter().enumerate() {
            let due = now.saturating_add_signed(*offset);
            dues.insert(due);
            fs::write(dir.path().join(format!("{due}.{pid}")), b"")
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
        }
        let store = JobStore::open(dir.path()).map_err(|e| TestCaseError::fail(e.to_string()))?;

        let due_now: BTreeSet<u64> = store
            .scan_due(now)
            .map_err(|e| TestCaseError::fail(e.to_string()))?
            .into_iter()
            .map(|job| job.id.due)
            .collect();
        let next = store.find_next(now).map_err(|e| TestCaseError::fail(e.to_string()))?;

        let horizon = due_horizon(now);
        let expected_due: BTreeSet<u64> = dues.iter().copied().filter(|&d| d <= horizon).collect();
        let expected_next = dues.iter().copied().find(|&d| d > horizon);

        prop_assert_eq!(due_now, expected_due);
        prop_assert_eq!(next, expected_next);
        if let Some(next) = next {
            prop_assert!(next > horizon);
        }
    }
}
