//! Property tests for output dataset naming.
//!
//! Output names are the value text with space, hyphen and period replaced
//! by underscore; everything else passes through untouched.

use geoselect::naming::{find_collisions, select_all_output_name, value_output_name};
use geoselect::{sanitize_name, FilterValue};
use proptest::prelude::*;

#[test]
fn test_float_and_date_names() {
    assert_eq!(value_output_name(&FilterValue::from(3.0), None), "3_0");
    assert_eq!(value_output_name(&FilterValue::from(37183), None), "37183");
    assert_eq!(
        value_output_name(&FilterValue::from(1e16), None),
        "10000000000000000_0"
    );
    assert_eq!(value_output_name(&FilterValue::from(1e-7), None), "0_0000001");

    let date = chrono::NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
    assert_eq!(
        value_output_name(&FilterValue::from(date), None),
        "2024_03_09_00:00:00"
    );
}

#[test]
fn test_null_value_name() {
    assert_eq!(value_output_name(&FilterValue::Null, None), "NULL");
    assert_eq!(
        value_output_name(&FilterValue::Null, Some("Buildings")),
        "NULL_Buildings"
    );
}

#[test]
fn test_select_all_name_keeps_target_name() {
    assert_eq!(select_all_output_name("NC_BUILDING_FP"), "Selection_NC_BUILDING_FP");
}

#[test]
fn test_collisions_listed_in_processing_order() {
    let values = vec![
        FilterValue::from("A-B"),
        FilterValue::from("Wake"),
        FilterValue::from("A B"),
        FilterValue::from("A.B"),
    ];
    let collisions = find_collisions(&values, None);
    assert_eq!(collisions.len(), 1);
    assert_eq!(collisions[0].0, "A_B");
    assert_eq!(
        collisions[0].1,
        vec![
            FilterValue::from("A-B"),
            FilterValue::from("A B"),
            FilterValue::from("A.B")
        ]
    );
}

proptest! {
    /// Sanitizing never changes the character count and removes all three
    /// replaced characters.
    #[test]
    fn prop_sanitize_replaces_exactly_three_chars(raw in "\\PC{0,40}") {
        let name = sanitize_name(&raw);
        prop_assert_eq!(name.chars().count(), raw.chars().count());
        prop_assert!(!name.contains(' '));
        prop_assert!(!name.contains('-'));
        prop_assert!(!name.contains('.'));

        for (before, after) in raw.chars().zip(name.chars()) {
            if matches!(before, ' ' | '-' | '.') {
                prop_assert_eq!(after, '_');
            } else {
                prop_assert_eq!(after, before);
            }
        }
    }

    /// Sanitizing an already-sanitized name is a no-op.
    #[test]
    fn prop_sanitize_is_idempotent(raw in "\\PC{0,40}") {
        let once = sanitize_name(&raw);
        prop_assert_eq!(sanitize_name(&once), once);
    }

    /// Appending the target name is a plain `_<target>` suffix.
    #[test]
    fn prop_append_is_suffix(raw in "[A-Za-z0-9 .-]{1,20}", target in "[A-Za-z_]{1,12}") {
        let value = FilterValue::from(raw.as_str());
        let plain = value_output_name(&value, None);
        let appended = value_output_name(&value, Some(&target));
        prop_assert_eq!(appended, format!("{}_{}", plain, target));
    }
}
