use cozero_sync_core::dataset::Dataset;
use cozero_sync_core::validation::{
    check_duplicates, check_required, check_types, validate, ADDRESS, BUSINESS_UNIT_ID, DESCRIPTION,
    LOCATION_RULES, NAME, REQUIRED_FIELDS, TAG, USER_ID,
};
use polars::prelude::*;

type Row<'a> = (Option<&'a str>, Option<&'a str>, Option<i64>);

fn dataset(frame: PolarsResult<DataFrame>) -> Dataset {
    Dataset::from_frame(frame.expect("construct frame")).expect("wrap frame")
}

fn locations(rows: &[Row<'_>]) -> Dataset {
    dataset(df![
        NAME => rows.iter().map(|row| row.0).collect::<Vec<_>>(),
        ADDRESS => rows.iter().map(|row| row.1).collect::<Vec<_>>(),
        DESCRIPTION => vec!["desc"; rows.len()],
        TAG => vec!["tag"; rows.len()],
        USER_ID => vec![1i64; rows.len()],
        BUSINESS_UNIT_ID => rows.iter().map(|row| row.2).collect::<Vec<_>>(),
    ])
}

#[test]
fn missing_name_is_reported_under_name_only() {
    let data = locations(&[
        (Some("Location A"), Some("Address A"), Some(1)),
        (None, Some("Address B"), Some(2)),
        (Some("Location C"), Some("Address C"), Some(3)),
    ]);

    let findings = validate(&data).expect("validate");

    assert_eq!(findings.missing.len(), 1);
    assert_eq!(findings.missing_for(NAME), Some(&[1][..]));
    assert_eq!(findings.invalid_for(USER_ID), None);
    assert!(findings.duplicates.is_empty());
}

#[test]
fn empty_strings_count_as_missing() {
    let data = locations(&[(Some("A"), Some(""), Some(1)), (Some("B"), Some("Y"), None)]);

    let missing = check_required(&data, REQUIRED_FIELDS).expect("check required");

    let fields: Vec<&str> = missing.iter().map(|finding| finding.field.as_str()).collect();
    assert_eq!(fields, vec![BUSINESS_UNIT_ID, ADDRESS]);
    assert_eq!(missing[0].rows, vec![1]);
    assert_eq!(missing[1].rows, vec![0]);
}

#[test]
fn absent_required_column_flags_every_row() {
    let data = dataset(df![
        NAME => ["A", "B"],
        BUSINESS_UNIT_ID => [1i64, 1],
    ]);

    let missing = check_required(&data, REQUIRED_FIELDS).expect("check required");

    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].field, ADDRESS);
    assert_eq!(missing[0].rows, vec![0, 1]);
}

#[test]
fn wrong_column_types_flag_non_null_rows() {
    let data = dataset(df![
        NAME => [Some(5i64), None, Some(6)],
        ADDRESS => [Some("X"), None, Some("Z")],
        BUSINESS_UNIT_ID => [Some(1.5f64), None, Some(2.0)],
    ]);

    let findings = validate(&data).expect("validate");

    assert_eq!(findings.invalid_for(NAME), Some(&[0, 2][..]));
    assert_eq!(findings.invalid_for(BUSINESS_UNIT_ID), Some(&[0, 2][..]));
    assert_eq!(findings.invalid_for(ADDRESS), None);
    assert_eq!(findings.missing_for(ADDRESS), Some(&[1][..]));
}

#[test]
fn csv_text_in_integer_field_is_invalid() {
    let csv = "Name,Address,Business Unit ID\nA,X,1\nB,Y,one\n";
    let data = Dataset::from_reader(csv.as_bytes()).expect("parse csv");

    let invalid = check_types(&data, LOCATION_RULES).expect("check types");

    assert_eq!(invalid.len(), 1);
    assert_eq!(invalid[0].field, BUSINESS_UNIT_ID);
    assert_eq!(invalid[0].rows, vec![0, 1]);
}

#[test]
fn optional_fields_are_never_type_checked() {
    let data = dataset(df![
        NAME => ["A"],
        ADDRESS => ["X"],
        TAG => [12i64],
        USER_ID => ["not-a-number"],
        BUSINESS_UNIT_ID => [1i64],
    ]);

    assert!(check_types(&data, LOCATION_RULES)
        .expect("check types")
        .is_empty());
}

#[test]
fn duplicates_include_every_occurrence() {
    let data = dataset(df![NAME => ["A", "B", "A", "C", "A"]]);

    assert_eq!(check_duplicates(&data).expect("duplicates"), vec![0, 2, 4]);
}

#[test]
fn unique_names_yield_no_duplicates() {
    let data = dataset(df![NAME => [Some("A"), Some("B"), None]]);

    assert!(check_duplicates(&data).expect("duplicates").is_empty());
}

#[test]
fn null_names_are_duplicates_of_each_other() {
    let data = dataset(df![NAME => [None, Some("A"), None::<&str>]]);

    assert_eq!(check_duplicates(&data).expect("duplicates"), vec![0, 2]);
}

#[test]
fn names_are_compared_exactly() {
    let data = dataset(df![NAME => ["Depot", "Depot ", "depot"]]);

    assert!(check_duplicates(&data).expect("duplicates").is_empty());
}

#[test]
fn a_row_can_appear_in_several_findings() {
    let data = dataset(df![
        NAME => ["A", "A"],
        ADDRESS => [None, Some("Y")],
        BUSINESS_UNIT_ID => [Some("one"), None],
    ]);

    let findings = validate(&data).expect("validate");

    assert_eq!(findings.missing_for(ADDRESS), Some(&[0][..]));
    assert_eq!(findings.missing_for(BUSINESS_UNIT_ID), Some(&[1][..]));
    assert_eq!(findings.invalid_for(BUSINESS_UNIT_ID), Some(&[0][..]));
    assert_eq!(findings.duplicates, vec![0, 1]);
    assert_eq!(
        findings.rejected_rows().into_iter().collect::<Vec<_>>(),
        vec![0, 1]
    );
}

#[test]
fn validation_does_not_mutate_and_is_deterministic() {
    let data = locations(&[(Some("A"), Some("X"), Some(1)), (None, Some(""), None)]);
    let before = data.clone();

    let first = validate(&data).expect("first validation");
    let second = validate(&data).expect("second validation");

    assert_eq!(first, second);
    assert_eq!(data, before);
}
