// crates/cozero-sync-core/src/dataset.rs

use std::fmt;
use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;

use polars::prelude::*;
use serde::{Serialize, Serializer};
use tracing::debug;

use crate::error::Result;

/// Raw values that spreadsheet exports use to mean "no value".
const NA_VALUES: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Source row number, carried through every filter.
const ROW_INDEX: &str = "__row_index";

/// A single tabular value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Text(String),
    Integer(i64),
    Float(f64),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Cell::Integer(value) => Some(*value),
            _ => None,
        }
    }

    fn from_any(value: AnyValue<'_>) -> Self {
        match value {
            AnyValue::Null => Cell::Null,
            AnyValue::String(value) => Cell::text(value),
            AnyValue::StringOwned(value) => Cell::text(value.as_str()),
            AnyValue::Float32(value) => Cell::Float(f64::from(value)),
            AnyValue::Float64(value) => Cell::Float(value),
            other if other.dtype().is_integer() => {
                other.extract::<i64>().map_or(Cell::Null, Cell::Integer)
            }
            other => Cell::Text(other.to_string()),
        }
    }
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Cell::Null => serializer.serialize_none(),
            Cell::Text(value) => serializer.serialize_str(value),
            Cell::Integer(value) => serializer.serialize_i64(*value),
            Cell::Float(value) => serializer.serialize_f64(*value),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => f.write_str("null"),
            Cell::Text(value) => f.write_str(value),
            Cell::Integer(value) => write!(f, "{value}"),
            Cell::Float(value) => write!(f, "{value:?}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// 0-based position of the row in the source file.
    pub index: usize,
    pub cells: Vec<Cell>,
}

/// A data frame read from a CSV file, plus its rows materialised as
/// [`Record`]s for payload building and reporting.
#[derive(Debug, Clone)]
pub struct Dataset {
    frame: DataFrame,
    columns: Vec<String>,
    records: Vec<Record>,
}

impl PartialEq for Dataset {
    fn eq(&self, other: &Self) -> bool {
        self.columns == other.columns && self.records == other.records
    }
}

impl Dataset {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let dataset = Self::from_bytes(fs::read(path)?)?;
        debug!(
            path = %path.display(),
            rows = dataset.len(),
            columns = dataset.columns.len(),
            "Parsed CSV"
        );
        Ok(dataset)
    }

    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::from_bytes(bytes)
    }

    fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let null_values = NA_VALUES.iter().map(|value| (*value).into()).collect();
        let parse_options = CsvParseOptions::default()
            .with_null_values(Some(NullValues::AllColumns(null_values)))
            .with_truncate_ragged_lines(true);

        let frame = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(None)
            .with_parse_options(parse_options)
            .into_reader_with_file_handle(Cursor::new(bytes))
            .finish()?;

        Self::from_frame(frame)
    }

    /// Wraps an existing frame. Row numbers start at 0 and NaN floats are
    /// treated as nulls.
    pub fn from_frame(frame: DataFrame) -> Result<Self> {
        let nan_to_null: Vec<Expr> = frame
            .get_columns()
            .iter()
            .filter(|column| column.dtype().is_float())
            .map(|column| col(column.name().clone()).fill_nan(lit(NULL)))
            .collect();

        let frame = if nan_to_null.is_empty() {
            frame
        } else {
            frame.lazy().with_columns(nan_to_null).collect()?
        };

        Self::from_indexed(frame.with_row_index(ROW_INDEX.into(), None)?)
    }

    fn from_indexed(frame: DataFrame) -> Result<Self> {
        let columns: Vec<String> = frame
            .get_column_names()
            .into_iter()
            .filter(|name| name.as_str() != ROW_INDEX)
            .map(|name| name.to_string())
            .collect();

        let positions = row_positions(&frame)?;
        let data = columns
            .iter()
            .map(|name| frame.column(name.as_str()))
            .collect::<PolarsResult<Vec<_>>>()?;

        let mut records = Vec::with_capacity(positions.len());
        for (row, index) in positions.into_iter().enumerate() {
            let cells = data
                .iter()
                .map(|column| column.get(row).map(Cell::from_any))
                .collect::<PolarsResult<Vec<_>>>()?;
            records.push(Record { index, cells });
        }

        Ok(Self {
            frame,
            columns,
            records,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|name| name == column)
    }

    /// Column type, or `None` when the column does not exist.
    pub fn dtype(&self, column: &str) -> Option<&DataType> {
        if column == ROW_INDEX {
            return None;
        }
        self.frame.column(column).ok().map(Column::dtype)
    }

    /// Looks up a cell by column name. `None` when the column does not exist.
    pub fn cell<'a>(&self, record: &'a Record, column: &str) -> Option<&'a Cell> {
        self.column_index(column)
            .and_then(|idx| record.cells.get(idx))
    }

    pub fn record(&self, index: usize) -> Option<&Record> {
        self.records.iter().find(|record| record.index == index)
    }

    /// Sets `column` to `value` in every row, appending the column if needed.
    pub fn set_integer_column(&mut self, column: &str, value: Option<i64>) -> Result<()> {
        let mut frame = self.frame.clone();
        frame.with_column(Series::new(column.into(), vec![value; frame.height()]))?;
        *self = Self::from_indexed(frame)?;
        Ok(())
    }

    /// Source row numbers of the rows matching `predicate`, in file order.
    pub fn rows_where(&self, predicate: Expr) -> Result<Vec<usize>> {
        let matched = self
            .frame
            .clone()
            .lazy()
            .filter(predicate)
            .select([col(ROW_INDEX)])
            .collect()?;
        row_positions(&matched)
    }

    /// Keeps the rows whose source row number satisfies `keep`.
    pub fn retain(&self, mut keep: impl FnMut(usize) -> bool) -> Result<Dataset> {
        let mask: BooleanChunked = self.records.iter().map(|record| keep(record.index)).collect();
        Self::from_indexed(self.frame.filter(&mask)?)
    }

    /// Keeps the first row for each distinct value of `column`. A dataset
    /// without that column is returned unchanged.
    pub fn first_per(&self, column: &str) -> Result<Dataset> {
        if self.column_index(column).is_none() {
            return Ok(self.clone());
        }
        let frame = self
            .frame
            .clone()
            .lazy()
            .filter(col(column).is_first_distinct())
            .collect()?;
        Self::from_indexed(frame)
    }

    /// Replaces every null with an empty string. Columns holding nulls
    /// become text columns; columns without nulls keep their type.
    pub fn fill_blanks(&self) -> Result<Dataset> {
        let fills: Vec<Expr> = self
            .frame
            .get_columns()
            .iter()
            .filter(|column| column.name().as_str() != ROW_INDEX && column.null_count() > 0)
            .map(|column| {
                let values = col(column.name().clone());
                let values = match column.dtype() {
                    DataType::String => values,
                    _ => values.cast(DataType::String),
                };
                values.fill_null(lit(""))
            })
            .collect();

        if fills.is_empty() {
            return Ok(self.clone());
        }
        let frame = self.frame.clone().lazy().with_columns(fills).collect()?;
        Self::from_indexed(frame)
    }

    pub fn display<'a>(&'a self, record: &'a Record) -> RecordDisplay<'a> {
        RecordDisplay {
            columns: &self.columns,
            record,
        }
    }
}

fn row_positions(frame: &DataFrame) -> Result<Vec<usize>> {
    let index = frame.column(ROW_INDEX)?.cast(&DataType::Int64)?;
    Ok(index
        .i64()?
        .into_iter()
        .flatten()
        .map(|position| position as usize)
        .collect())
}

/// Renders a record as an object literal in column order.
pub struct RecordDisplay<'a> {
    columns: &'a [String],
    record: &'a Record,
}

impl fmt::Display for RecordDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (idx, (column, cell)) in self.columns.iter().zip(&self.record.cells).enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            let key = serde_json::to_string(column).map_err(|_| fmt::Error)?;
            let value = serde_json::to_string(cell).map_err(|_| fmt::Error)?;
            write!(f, "{key}: {value}")?;
        }
        f.write_str("}")
    }
}
