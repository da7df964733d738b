use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{error, info, warn};

use crate::client::{CozeroClient, LocationPayload, RemoteLocation};
use crate::dataset::{Cell, Dataset};
use crate::error::Result;
use crate::report::{self, ReportInput, DEFAULT_REPORT_PATH};
use crate::validation::{self, ValidationFindings, BUSINESS_UNIT_ID, NAME, USER_ID};

pub const DEFAULT_INPUT_PATH: &str = "data/locations.csv";

#[derive(Debug, Clone)]
pub struct MigrationOptions {
    pub input: PathBuf,
    pub report: PathBuf,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            input: PathBuf::from(DEFAULT_INPUT_PATH),
            report: PathBuf::from(DEFAULT_REPORT_PATH),
        }
    }
}

#[derive(Debug, Clone, Serialize, Default, PartialEq, Eq)]
pub struct MigrationSummary {
    pub deleted: usize,
    pub loaded: usize,
    pub rejected: usize,
    pub duplicates: usize,
    pub uploaded: usize,
    pub matched: usize,
    pub report_path: String,
}

/// Replaces the remote locations of the active business unit with the
/// valid rows of the input file, then writes the reconciliation report.
///
/// Remote deletion happens before the file is even read. A failure in any
/// later step leaves the remote side partially populated.
pub async fn run(client: &mut CozeroClient, options: &MigrationOptions) -> Result<MigrationSummary> {
    client.authenticate().await?;
    info!("Authentication successful");

    let user_id = client.get_user_id().await?;
    let business_unit_id = client.get_business_units().await?;
    info!(user_id, business_unit_id, "Session resolved");

    let deleted = client.delete_all_locations().await?;

    let mut dataset = load_dataset(&options.input)?;
    inject_session_ids(&mut dataset, Some(user_id), business_unit_id)?;

    let findings = validate_logged(&dataset)?;
    let prepared = prepare_upload(&dataset, &findings)?;

    for record in prepared.records() {
        let payload = LocationPayload::from_record(&prepared, record)?;
        info!(name = %payload.name, "Uploading location");
        client.upload_location(&payload).await?;
    }

    let remote = client.fetch_locations().await?;
    let summary = finish(options, &dataset, &prepared, &remote, &findings, deleted)?;
    info!(summary = ?summary, "Migration complete");
    Ok(summary)
}

/// Validates the input offline and writes the report without touching the
/// API. The report lists the rows that a real run would upload.
pub fn check(
    options: &MigrationOptions,
    user_id: Option<i64>,
    business_unit_id: i64,
) -> Result<MigrationSummary> {
    let mut dataset = load_dataset(&options.input)?;
    inject_session_ids(&mut dataset, user_id, business_unit_id)?;

    let findings = validate_logged(&dataset)?;
    let prepared = prepare_upload(&dataset, &findings)?;
    for record in prepared.records() {
        LocationPayload::from_record(&prepared, record)?;
    }

    let summary = finish(options, &dataset, &prepared, &[], &findings, 0)?;
    info!(summary = ?summary, "Check complete");
    Ok(summary)
}

fn load_dataset(path: &Path) -> Result<Dataset> {
    match Dataset::from_path(path) {
        Ok(dataset) => {
            info!(path = %path.display(), rows = dataset.len(), "Data loaded successfully");
            Ok(dataset)
        }
        Err(err) => {
            error!(path = %path.display(), error = %err, "Error loading data");
            Err(err)
        }
    }
}

/// Stamps every row with the resolved user and business unit.
pub fn inject_session_ids(
    dataset: &mut Dataset,
    user_id: Option<i64>,
    business_unit_id: i64,
) -> Result<()> {
    dataset.set_integer_column(USER_ID, user_id)?;
    dataset.set_integer_column(BUSINESS_UNIT_ID, Some(business_unit_id))
}

fn validate_logged(dataset: &Dataset) -> Result<ValidationFindings> {
    let findings = validation::validate(dataset)?;
    if !findings.is_clean() {
        warn!(
            missing_fields = findings.missing.len(),
            invalid_fields = findings.invalid_types.len(),
            duplicate_rows = findings.duplicates.len(),
            "Validation found issues"
        );
    }
    Ok(findings)
}

/// Selects the rows to upload: rows with missing or invalid values are
/// dropped, then only the first row for each name is kept, then nulls are
/// blanked out.
pub fn prepare_upload(dataset: &Dataset, findings: &ValidationFindings) -> Result<Dataset> {
    let rejected = findings.rejected_rows();
    dataset
        .retain(|index| !rejected.contains(&index))?
        .first_per(NAME)?
        .fill_blanks()
}

fn finish(
    options: &MigrationOptions,
    validated: &Dataset,
    uploaded: &Dataset,
    remote: &[RemoteLocation],
    findings: &ValidationFindings,
    deleted: usize,
) -> Result<MigrationSummary> {
    let text = report::render_report(&ReportInput {
        validated,
        uploaded,
        remote,
        findings,
    });
    report::write_report(&options.report, &text)?;

    let matched = uploaded
        .records()
        .iter()
        .filter_map(|record| uploaded.cell(record, NAME).and_then(Cell::as_text))
        .filter(|name| report::find_remote(remote, name).is_some())
        .count();

    Ok(MigrationSummary {
        deleted,
        loaded: validated.len(),
        rejected: findings.rejected_rows().len(),
        duplicates: findings.duplicates.len(),
        uploaded: uploaded.len(),
        matched,
        report_path: options.report.display().to_string(),
    })
}
