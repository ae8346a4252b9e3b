//! Destinations for accepted rows.
//!
//! [`TableSink`] keeps rows in a columnar [`Table`]; [`FileSink`] streams each row
//! straight to a writer and keeps nothing.

use super::row::Row;
use super::schema::Schema;
use crate::data::table::{Table, TIME_COLUMN};
use crate::error::{AppResult, DaqError};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Receives the rows of one acquisition session.
pub trait Sink {
    /// Called once, as soon as the session schema is known and before any row.
    fn begin(&mut self, schema: &Schema, has_time_column: bool) -> AppResult<()>;

    /// Store one accepted row.
    fn accept(&mut self, row: &Row<'_>) -> AppResult<()>;

    /// Called once when the session ends, whatever the outcome.
    fn finish(&mut self) -> AppResult<()> {
        Ok(())
    }
}

/// Accumulates rows into an in-memory [`Table`].
#[derive(Debug, Default)]
pub struct TableSink {
    table: Table,
}

impl TableSink {
    /// Empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Table collected so far.
    pub fn table(&self) -> &Table {
        &self.table
    }

    /// Hand over the collected table.
    pub fn into_table(self) -> Table {
        self.table
    }
}

impl Sink for TableSink {
    fn begin(&mut self, schema: &Schema, has_time_column: bool) -> AppResult<()> {
        self.table = Table::with_schema(schema, has_time_column);
        Ok(())
    }

    fn accept(&mut self, row: &Row<'_>) -> AppResult<()> {
        self.table.push_row(row.time_signature(), row.values())?;
        if !self.table.is_consistent() {
            return Err(DaqError::SinkWrite(
                "table columns diverged in length".into(),
            ));
        }
        Ok(())
    }
}

/// Streams rows to a writer, re-joining the raw fields with an output delimiter.
#[derive(Debug)]
pub struct FileSink<W: Write> {
    out: BufWriter<W>,
    delimiter: String,
    write_header: bool,
    rows_written: usize,
}

impl FileSink<File> {
    /// Open `path` for appending, creating it if needed.
    pub fn append(path: impl AsRef<Path>, delimiter: char) -> AppResult<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        tracing::debug!(path = %path.display(), "File sink opened");
        Ok(Self::new(file, delimiter))
    }
}

impl<W: Write> FileSink<W> {
    /// Sink writing to `writer`, with a header line.
    pub fn new(writer: W, delimiter: char) -> Self {
        Self {
            out: BufWriter::new(writer),
            delimiter: delimiter.to_string(),
            write_header: true,
            rows_written: 0,
        }
    }

    /// Whether to write the column names when the schema is known. The time column
    /// takes the device's own heading when the schema came from a header line.
    pub fn with_header(mut self, write_header: bool) -> Self {
        self.write_header = write_header;
        self
    }

    /// Rows written so far, header excluded.
    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    /// Flush and return the underlying writer.
    pub fn into_inner(self) -> AppResult<W> {
        self.out
            .into_inner()
            .map_err(|e| DaqError::SinkWrite(e.error().to_string()))
    }

    fn write_line<'a>(&mut self, fields: impl IntoIterator<Item = &'a str>) -> AppResult<()> {
        let mut first = true;
        for field in fields {
            if !first {
                self.out.write_all(self.delimiter.as_bytes()).map_err(sink_error)?;
            }
            self.out.write_all(field.as_bytes()).map_err(sink_error)?;
            first = false;
        }
        self.out.write_all(b"\n").map_err(sink_error)
    }
}

impl<W: Write> Sink for FileSink<W> {
    fn begin(&mut self, schema: &Schema, has_time_column: bool) -> AppResult<()> {
        if !self.write_header {
            return Ok(());
        }
        let time = has_time_column.then(|| schema.time_heading().unwrap_or(TIME_COLUMN));
        let names = schema.names().iter().map(String::as_str);
        self.write_line(time.into_iter().chain(names))
    }

    fn accept(&mut self, row: &Row<'_>) -> AppResult<()> {
        self.write_line(row.fields().iter().copied())?;
        self.rows_written += 1;
        Ok(())
    }

    fn finish(&mut self) -> AppResult<()> {
        self.out.flush().map_err(sink_error)
    }
}

fn sink_error(err: std::io::Error) -> DaqError {
    DaqError::SinkWrite(err.to_string())
}
