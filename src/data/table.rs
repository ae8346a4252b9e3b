//! Columnar in-memory table of acquired samples.
//!
//! A [`Table`] holds one ordered value sequence per column. The optional time
//! signature column comes first, named [`TIME_COLUMN`], followed by the sensor
//! columns in schema order. Whether a table has a time column is a flag of its
//! own, so a table without one may carry a sensor of that name. Every mutation
//! keeps all columns at the same length.

use crate::acquisition::schema::Schema;
use crate::data::storage::DelimitedCodec;
use crate::error::{AppResult, DaqError};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Name of the time signature column.
pub const TIME_COLUMN: &str = "time";

/// Values of one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ColumnValues {
    /// Raw device time signatures
    Text(Vec<String>),
    /// Parsed sensor readings
    Integer(Vec<i64>),
}

impl ColumnValues {
    /// Number of values in the column.
    pub fn len(&self) -> usize {
        match self {
            ColumnValues::Text(values) => values.len(),
            ColumnValues::Integer(values) => values.len(),
        }
    }

    /// Whether the column holds no values.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn render(&self, index: usize) -> Option<String> {
        match self {
            ColumnValues::Text(values) => values.get(index).cloned(),
            ColumnValues::Integer(values) => values.get(index).map(i64::to_string),
        }
    }
}

/// A named column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Column name
    pub name: String,
    /// Column values
    pub values: ColumnValues,
}

/// Columnar table with an equal-length invariant.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Table {
    columns: Vec<Column>,
    rows: usize,
    time_column: bool,
}

impl Table {
    /// Empty table with one column per sensor, plus the time column if requested.
    pub fn with_schema(schema: &Schema, has_time_column: bool) -> Self {
        let mut columns = Vec::with_capacity(schema.len() + usize::from(has_time_column));
        if has_time_column {
            columns.push(Column {
                name: TIME_COLUMN.to_string(),
                values: ColumnValues::Text(Vec::new()),
            });
        }
        columns.extend(schema.names().iter().map(|name| Column {
            name: name.clone(),
            values: ColumnValues::Integer(Vec::new()),
        }));
        Self {
            columns,
            rows: 0,
            time_column: has_time_column,
        }
    }

    /// Build a table from whole columns, checking names, types and lengths.
    ///
    /// A leading text column named [`TIME_COLUMN`] is the time signature column;
    /// every other column must hold integers.
    pub fn from_columns(columns: Vec<Column>) -> AppResult<Self> {
        let rows = columns.first().map_or(0, |c| c.values.len());
        let time_column = columns
            .first()
            .is_some_and(|c| matches!(c.values, ColumnValues::Text(_)));
        for (i, column) in columns.iter().enumerate() {
            if column.name.is_empty() {
                return Err(DaqError::Format(format!("Column {} has no name", i + 1)));
            }
            if column.values.len() != rows {
                return Err(DaqError::Format(format!(
                    "Column '{}' has {} values, expected {}",
                    column.name,
                    column.values.len(),
                    rows
                )));
            }
            if columns[..i].iter().any(|c| c.name == column.name) {
                return Err(DaqError::Format(format!(
                    "Duplicate column '{}'",
                    column.name
                )));
            }
            let is_time = time_column && i == 0;
            match (&column.values, is_time) {
                (ColumnValues::Text(_), true) if column.name != TIME_COLUMN => {
                    return Err(DaqError::Format(format!(
                        "Time signature column must be named '{TIME_COLUMN}', found '{}'",
                        column.name
                    )));
                }
                (ColumnValues::Text(_), true) | (ColumnValues::Integer(_), false) => {}
                (ColumnValues::Text(_), false) | (ColumnValues::Integer(_), true) => {
                    return Err(DaqError::Format(format!(
                        "Sensor column '{}' must hold integers",
                        column.name
                    )));
                }
            }
        }
        Ok(Self {
            columns,
            rows,
            time_column,
        })
    }

    /// Append one row. `values` must line up with the sensor columns and
    /// `time_signature` must be present exactly when the table has a time column.
    ///
    /// Nothing is mutated when the row does not fit.
    pub fn push_row(&mut self, time_signature: Option<&str>, values: &[i64]) -> AppResult<()> {
        if time_signature.is_some() != self.has_time_column()
            || values.len() != self.sensor_count()
        {
            return Err(DaqError::SinkWrite(format!(
                "Row with {} values{} does not fit table with {} sensor columns{}",
                values.len(),
                if time_signature.is_some() { " and a time signature" } else { "" },
                self.sensor_count(),
                if self.has_time_column() { " and a time column" } else { "" },
            )));
        }

        let mut sensors = values.iter();
        for column in &mut self.columns {
            match &mut column.values {
                ColumnValues::Text(seq) => {
                    if let Some(time) = time_signature {
                        seq.push(time.to_string());
                    }
                }
                ColumnValues::Integer(seq) => {
                    if let Some(value) = sensors.next() {
                        seq.push(*value);
                    }
                }
            }
        }
        self.rows += 1;
        debug_assert!(self.is_consistent());
        Ok(())
    }

    /// Columns in storage order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column names in storage order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Readings of one sensor.
    pub fn sensor(&self, name: &str) -> Option<&[i64]> {
        match &self.column(name)?.values {
            ColumnValues::Integer(values) => Some(values),
            ColumnValues::Text(_) => None,
        }
    }

    /// Time signatures, if the table carries them.
    pub fn time_signatures(&self) -> Option<&[String]> {
        if !self.time_column {
            return None;
        }
        match &self.columns.first()?.values {
            ColumnValues::Text(values) => Some(values),
            ColumnValues::Integer(_) => None,
        }
    }

    /// Whether the first column is the time signature column.
    pub fn has_time_column(&self) -> bool {
        self.time_column
    }

    /// Number of sensor columns.
    pub fn sensor_count(&self) -> usize {
        self.columns.len() - usize::from(self.has_time_column())
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows
    }

    /// Whether the table holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Whether every column has exactly `len()` values.
    pub fn is_consistent(&self) -> bool {
        self.columns.iter().all(|c| c.values.len() == self.rows)
    }

    /// Fields of row `index` rendered as text, in column order.
    pub fn row_fields(&self, index: usize) -> Option<Vec<String>> {
        if index >= self.rows {
            return None;
        }
        self.columns.iter().map(|c| c.values.render(index)).collect()
    }

    /// Append every row to a delimited text file, without a header. Fields holding
    /// the delimiter are quoted.
    ///
    /// Streaming through a [`FileSink`](crate::acquisition::sink::FileSink) during
    /// acquisition avoids holding the rows in memory first.
    pub fn log_to_file(&self, path: impl AsRef<Path>, delimiter: char) -> AppResult<()> {
        tracing::warn!(
            rows = self.rows,
            "Replaying an in-memory table to file; stream with FileSink during acquisition instead"
        );
        let codec = DelimitedCodec::new(delimiter)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        let mut out = BufWriter::new(file);
        codec.write_rows(self, &mut out)?;
        out.flush()?;
        Ok(())
    }
}
