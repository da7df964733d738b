use cozero_sync_core::dataset::Dataset;
use cozero_sync_core::report::{find_remote, render_report, write_report, ReportInput};
use cozero_sync_core::validation::{FieldFinding, ValidationFindings};
use cozero_sync_core::RemoteLocation;
use polars::prelude::*;

fn uploaded(names: &[&str]) -> Dataset {
    let addresses: Vec<String> = names.iter().map(|name| format!("{name} Street")).collect();
    let frame = df![
        "Name" => names,
        "Address" => addresses,
    ]
    .expect("construct uploaded frame");
    Dataset::from_frame(frame).expect("wrap uploaded frame")
}

fn remote(id: i64, name: &str, address: &str) -> RemoteLocation {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "name": name,
        "address": address,
    }))
    .expect("remote location")
}

#[test]
fn clean_run_reports_no_issues_and_matches_every_row() {
    let data = uploaded(&["Berlin Office", "Hamburg Depot"]);
    let api = vec![
        remote(10, "Berlin Office", "Alexanderplatz 1"),
        remote(11, "  Hamburg Depot ", "Hafenstrasse 5"),
    ];
    let findings = ValidationFindings::default();

    let report = render_report(&ReportInput {
        validated: &data,
        uploaded: &data,
        remote: &api,
        findings: &findings,
    });

    assert!(report.starts_with("=== Customer Data Report ===\n\nUploaded Data:\n"));
    assert!(report.contains(
        r#" - Record 1: {"Name": "Berlin Office", "Address": "Berlin Office Street"}"#
    ));
    assert!(report.contains("No missing required values found."));
    assert!(report.contains("No invalid data types found."));
    assert!(report.contains("No duplicate names found."));
    assert!(report.contains(" - Berlin Office found in API data (ID: 10, Address: Alexanderplatz 1)"));
    assert!(report.contains(" - Hamburg Depot found in API data (ID: 11, Address: Hafenstrasse 5)"));
    assert_eq!(report.matches("found in API data").count(), 2);
    assert!(report.ends_with("=== End of Report ===\n"));
}

#[test]
fn findings_are_listed_in_section_order() {
    let frame = df![
        "Name" => [Some("A"), None, Some("A")],
        "Address" => ["X", "Y", "Z"],
    ]
    .expect("construct validated frame");
    let validated = Dataset::from_frame(frame).expect("wrap validated frame");
    let findings = ValidationFindings {
        missing: vec![FieldFinding { field: "Name".into(), rows: vec![1] }],
        invalid_types: vec![FieldFinding { field: "Address".into(), rows: vec![2] }],
        duplicates: vec![0, 2],
    };
    let uploaded = validated.retain(|index| index == 0).expect("retain first row");

    let report = render_report(&ReportInput {
        validated: &validated,
        uploaded: &uploaded,
        remote: &[],
        findings: &findings,
    });

    let missing = report.find("Missing Required Values:\n - Row 1: Missing value in column 'Name'");
    let invalid = report.find("Invalid Data Types:\n - Row 2: Invalid value in column 'Address'");
    let duplicates = report.find(concat!(
        "Duplicate Names Found:\n",
        " - Row 0: {\"Name\": \"A\", \"Address\": \"X\"}\n",
        " - Row 2: {\"Name\": \"A\", \"Address\": \"Z\"}\n",
    ));
    let matching = report.find("API Matching Report:\nNo data to compare with API.");

    assert!(missing.is_some() && invalid.is_some() && duplicates.is_some() && matching.is_some());
    assert!(missing < invalid && invalid < duplicates && duplicates < matching);
}

#[test]
fn unmatched_rows_are_reported_as_not_found() {
    let data = uploaded(&["Munich Lab"]);
    let api = vec![remote(12, "Munich Labs", "Leopoldstrasse 9")];
    let findings = ValidationFindings::default();

    let report = render_report(&ReportInput {
        validated: &data,
        uploaded: &data,
        remote: &api,
        findings: &findings,
    });

    assert!(report.contains(" - Munich Lab not found in API data."));
}

#[test]
fn empty_upload_is_called_out() {
    let data = uploaded(&[]);
    let findings = ValidationFindings::default();

    let report = render_report(&ReportInput {
        validated: &data,
        uploaded: &data,
        remote: &[remote(1, "A", "X")],
        findings: &findings,
    });

    assert!(report.contains("Uploaded Data:\nNo uploaded data provided.\n\n"));
    assert!(report.contains("No data to compare with API."));
}

#[test]
fn find_remote_takes_first_trimmed_match() {
    let api = vec![
        remote(1, "Other", "Q"),
        remote(2, " Depot", "First"),
        remote(3, "Depot ", "Second"),
    ];

    assert_eq!(find_remote(&api, "Depot  ").map(|location| location.id), Some(2));
    assert!(find_remote(&api, "Missing").is_none());
}

#[test]
fn write_report_creates_directories_and_truncates() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("nested/output/customer_report.log");

    write_report(&path, "first run with a long body\n").expect("first write");
    write_report(&path, "second\n").expect("second write");

    assert_eq!(std::fs::read_to_string(&path).expect("read report"), "second\n");
}
