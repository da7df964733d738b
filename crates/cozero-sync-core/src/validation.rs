// crates/cozero-sync-core/src/validation.rs

use std::collections::BTreeSet;

use polars::prelude::{col, lit, DataType};

use crate::dataset::Dataset;
use crate::error::Result;

pub const NAME: &str = "Name";
pub const ADDRESS: &str = "Address";
pub const DESCRIPTION: &str = "Description";
pub const TAG: &str = "Tag";
pub const BUSINESS_UNIT_ID: &str = "Business Unit ID";
pub const USER_ID: &str = "User ID";

pub const REQUIRED_FIELDS: &[&str] = &[NAME, BUSINESS_UNIT_ID, ADDRESS];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
}

impl FieldKind {
    fn accepts(self, dtype: &DataType) -> bool {
        match self {
            FieldKind::Text => matches!(dtype, DataType::String),
            FieldKind::Integer => dtype.is_integer(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub field: &'static str,
    pub kind: FieldKind,
    pub optional: bool,
}

impl FieldRule {
    const fn new(field: &'static str, kind: FieldKind, optional: bool) -> Self {
        Self {
            field,
            kind,
            optional,
        }
    }
}

/// Location schema. Optional fields are never type-checked.
pub const LOCATION_RULES: &[FieldRule] = &[
    FieldRule::new(NAME, FieldKind::Text, false),
    FieldRule::new(DESCRIPTION, FieldKind::Text, true),
    FieldRule::new(BUSINESS_UNIT_ID, FieldKind::Integer, false),
    FieldRule::new(USER_ID, FieldKind::Integer, true),
    FieldRule::new(ADDRESS, FieldKind::Text, false),
    FieldRule::new(TAG, FieldKind::Text, true),
];

/// Rows that failed a check on one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldFinding {
    pub field: String,
    pub rows: Vec<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationFindings {
    /// Missing required values, in schema field order.
    pub missing: Vec<FieldFinding>,
    /// Type violations, in schema field order.
    pub invalid_types: Vec<FieldFinding>,
    /// Every row whose name occurs more than once.
    pub duplicates: Vec<usize>,
}

impl ValidationFindings {
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.invalid_types.is_empty() && self.duplicates.is_empty()
    }

    pub fn missing_for(&self, field: &str) -> Option<&[usize]> {
        find_field(&self.missing, field)
    }

    pub fn invalid_for(&self, field: &str) -> Option<&[usize]> {
        find_field(&self.invalid_types, field)
    }

    /// Rows excluded from upload: anything with a missing or invalid value.
    pub fn rejected_rows(&self) -> BTreeSet<usize> {
        self.missing
            .iter()
            .chain(&self.invalid_types)
            .flat_map(|finding| finding.rows.iter().copied())
            .collect()
    }
}

fn find_field<'a>(findings: &'a [FieldFinding], field: &str) -> Option<&'a [usize]> {
    findings
        .iter()
        .find(|finding| finding.field == field)
        .map(|finding| finding.rows.as_slice())
}

/// Reports, per field, the rows holding null or empty values. A column
/// absent from the dataset counts as null in every row.
pub fn check_required(dataset: &Dataset, fields: &[&str]) -> Result<Vec<FieldFinding>> {
    let mut findings = Vec::new();

    for &field in fields {
        let rows = match dataset.dtype(field) {
            None => dataset.records().iter().map(|record| record.index).collect(),
            Some(dtype) => {
                let mut missing = col(field).is_null();
                if matches!(dtype, DataType::String) {
                    missing = missing.or(col(field).eq(lit("")));
                }
                dataset.rows_where(missing)?
            }
        };

        if !rows.is_empty() {
            findings.push(FieldFinding {
                field: field.to_string(),
                rows,
            });
        }
    }

    Ok(findings)
}

/// Column types are checked as a whole: when a required column does not
/// hold the expected type, every non-null row in it is reported.
pub fn check_types(dataset: &Dataset, rules: &[FieldRule]) -> Result<Vec<FieldFinding>> {
    let mut findings = Vec::new();

    for rule in rules.iter().filter(|rule| !rule.optional) {
        let Some(dtype) = dataset.dtype(rule.field) else {
            continue;
        };
        if rule.kind.accepts(dtype) {
            continue;
        }

        let rows = dataset.rows_where(col(rule.field).is_not_null())?;
        if !rows.is_empty() {
            findings.push(FieldFinding {
                field: rule.field.to_string(),
                rows,
            });
        }
    }

    Ok(findings)
}

/// Returns every occurrence of a repeated name, first one included.
pub fn check_duplicates(dataset: &Dataset) -> Result<Vec<usize>> {
    if dataset.column_index(NAME).is_none() {
        return Ok(Vec::new());
    }
    dataset.rows_where(col(NAME).is_duplicated())
}

pub fn validate(dataset: &Dataset) -> Result<ValidationFindings> {
    Ok(ValidationFindings {
        missing: check_required(dataset, REQUIRED_FIELDS)?,
        invalid_types: check_types(dataset, LOCATION_RULES)?,
        duplicates: check_duplicates(dataset)?,
    })
}
