use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use tracing::info;

use crate::client::RemoteLocation;
use crate::dataset::Dataset;
use crate::error::Result;
use crate::validation::{FieldFinding, ValidationFindings, NAME};

pub const DEFAULT_REPORT_PATH: &str = "output/customer_report.log";

/// Everything the reconciliation report is built from.
#[derive(Debug, Clone, Copy)]
pub struct ReportInput<'a> {
    /// The dataset the findings were computed on.
    pub validated: &'a Dataset,
    /// The records that were sent to the API.
    pub uploaded: &'a Dataset,
    /// Remote state fetched after the upload.
    pub remote: &'a [RemoteLocation],
    pub findings: &'a ValidationFindings,
}

pub fn render_report(input: &ReportInput<'_>) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_sections(&mut out, input);
    out
}

fn write_sections(out: &mut String, input: &ReportInput<'_>) -> std::fmt::Result {
    writeln!(out, "=== Customer Data Report ===")?;
    writeln!(out)?;

    writeln!(out, "Uploaded Data:")?;
    if input.uploaded.is_empty() {
        writeln!(out, "No uploaded data provided.")?;
    } else {
        for (idx, record) in input.uploaded.records().iter().enumerate() {
            writeln!(out, " - Record {}: {}", idx + 1, input.uploaded.display(record))?;
        }
    }
    writeln!(out)?;

    writeln!(out, "Validation Issues:")?;
    writeln!(out)?;

    write_field_findings(
        out,
        &input.findings.missing,
        "Missing Required Values:",
        "Missing value",
        "No missing required values found.",
    )?;
    write_field_findings(
        out,
        &input.findings.invalid_types,
        "Invalid Data Types:",
        "Invalid value",
        "No invalid data types found.",
    )?;

    if input.findings.duplicates.is_empty() {
        writeln!(out, "No duplicate names found.")?;
    } else {
        writeln!(out, "Duplicate Names Found:")?;
        for &index in &input.findings.duplicates {
            match input.validated.record(index) {
                Some(record) => {
                    writeln!(out, " - Row {index}: {}", input.validated.display(record))?
                }
                None => writeln!(out, " - Row {index}")?,
            }
        }
    }
    writeln!(out)?;

    writeln!(out, "API Matching Report:")?;
    if input.uploaded.is_empty() || input.remote.is_empty() {
        writeln!(out, "No data to compare with API.")?;
    } else {
        for record in input.uploaded.records() {
            let name = input
                .uploaded
                .cell(record, NAME)
                .map(ToString::to_string)
                .unwrap_or_default();
            match find_remote(input.remote, &name) {
                Some(remote) => writeln!(
                    out,
                    " - {name} found in API data (ID: {}, Address: {})",
                    remote.id,
                    remote.address.as_deref().unwrap_or("")
                )?,
                None => writeln!(out, " - {name} not found in API data.")?,
            }
        }
    }
    writeln!(out)?;

    writeln!(out, "=== End of Report ===")
}

fn write_field_findings(
    out: &mut String,
    findings: &[FieldFinding],
    heading: &str,
    label: &str,
    empty: &str,
) -> std::fmt::Result {
    if findings.is_empty() {
        writeln!(out, "{empty}")?;
    } else {
        writeln!(out, "{heading}")?;
        for finding in findings {
            for index in &finding.rows {
                writeln!(out, " - Row {index}: {label} in column '{}'", finding.field)?;
            }
        }
    }
    writeln!(out)
}

/// First remote location whose trimmed name equals `name` trimmed.
pub fn find_remote<'a>(remote: &'a [RemoteLocation], name: &str) -> Option<&'a RemoteLocation> {
    let wanted = name.trim();
    remote
        .iter()
        .find(|location| location.name.as_deref().map(str::trim) == Some(wanted))
}

/// Writes the report, replacing any previous file and creating parent
/// directories as needed.
pub fn write_report(path: impl AsRef<Path>, contents: &str) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)?;
    info!(path = %path.display(), "Customer report saved");
    Ok(())
}
