//! Table persistence.
//!
//! Two interchange formats are supported:
//!
//! - **Delimited** (`storage_csv` feature): header row with the column names, then
//!   one record per row.
//! - **Structured**: one JSON object mapping each column name to its value array,
//!   keys in column order.
//!
//! In both, the time signature column, when present, comes first under an empty
//! heading ([`TIME_HEADING`]). No sensor can have an empty name, so a sensor named
//! [`TIME_COLUMN`] in a table without time signatures loads back as a sensor.
//! On load the time signature column is read as text and every other column must
//! hold integers; anything else is a [`DaqError::Format`].
use crate::data::table::{Column, ColumnValues, Table, TIME_COLUMN};
use crate::error::{AppResult, DaqError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Persisted heading of the time signature column.
pub const TIME_HEADING: &str = "";

/// Persisted heading of column `index` of `table`.
fn heading(table: &Table, index: usize, name: &str) -> String {
    if index == 0 && table.has_time_column() {
        TIME_HEADING.to_string()
    } else {
        name.to_string()
    }
}

/// Empty column for a persisted heading.
fn column_for_heading(index: usize, heading: &str) -> AppResult<Column> {
    match (index, heading) {
        (0, TIME_HEADING) => Ok(Column {
            name: TIME_COLUMN.to_string(),
            values: ColumnValues::Text(Vec::new()),
        }),
        (_, TIME_HEADING) => Err(DaqError::Format(format!(
            "Column {} has an empty heading; only the leading time signature column may",
            index + 1
        ))),
        (_, name) => Ok(Column {
            name: name.to_string(),
            values: ColumnValues::Integer(Vec::new()),
        }),
    }
}

/// Interchange format of a persisted table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Row-oriented delimited text
    #[default]
    Delimited,
    /// JSON object of column arrays
    Structured,
}

impl OutputFormat {
    /// Conventional file extension.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Delimited => "csv",
            OutputFormat::Structured => "json",
        }
    }
}

/// Encodes and decodes whole tables.
pub trait TableCodec {
    /// Write `table` to `writer`.
    fn save(&self, table: &Table, writer: &mut dyn Write) -> AppResult<()>;

    /// Read a table back from `reader`.
    fn load(&self, reader: &mut dyn Read) -> AppResult<Table>;
}

/// Delimited text codec.
#[derive(Debug, Clone, Copy)]
pub struct DelimitedCodec {
    delimiter: u8,
}

impl Default for DelimitedCodec {
    fn default() -> Self {
        Self { delimiter: b',' }
    }
}

impl DelimitedCodec {
    /// Codec using `delimiter` between fields. Only ASCII delimiters are accepted.
    pub fn new(delimiter: char) -> AppResult<Self> {
        u8::try_from(delimiter)
            .ok()
            .filter(u8::is_ascii)
            .map(|delimiter| Self { delimiter })
            .ok_or_else(|| {
                DaqError::Format(format!("Delimiter {delimiter:?} is not a single ASCII byte"))
            })
    }
}

#[cfg(feature = "storage_csv")]
impl DelimitedCodec {
    /// Write the rows of `table` as records, without a header row.
    pub fn write_rows(&self, table: &Table, writer: &mut dyn Write) -> AppResult<()> {
        let mut out = self.writer(writer);
        Self::write_records(table, &mut out)
    }

    fn writer<'w>(&self, writer: &'w mut dyn Write) -> csv::Writer<&'w mut dyn Write> {
        csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .from_writer(writer)
    }

    fn write_records(table: &Table, out: &mut csv::Writer<&mut dyn Write>) -> AppResult<()> {
        for index in 0..table.len() {
            if let Some(fields) = table.row_fields(index) {
                out.write_record(&fields)?;
            }
        }
        out.flush()?;
        Ok(())
    }
}

#[cfg(not(feature = "storage_csv"))]
impl DelimitedCodec {
    /// Write the rows of `table` as records, without a header row.
    pub fn write_rows(&self, _table: &Table, _writer: &mut dyn Write) -> AppResult<()> {
        Err(DaqError::FeatureNotEnabled("storage_csv".to_string()))
    }
}

#[cfg(feature = "storage_csv")]
impl TableCodec for DelimitedCodec {
    fn save(&self, table: &Table, writer: &mut dyn Write) -> AppResult<()> {
        let mut out = self.writer(writer);
        let headings: Vec<String> = table
            .column_names()
            .into_iter()
            .enumerate()
            .map(|(index, name)| heading(table, index, name))
            .collect();
        out.write_record(&headings)?;
        Self::write_records(table, &mut out)
    }

    fn load(&self, reader: &mut dyn Read) -> AppResult<Table> {
        let mut input = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .from_reader(reader);

        let mut columns: Vec<Column> = input
            .headers()?
            .iter()
            .enumerate()
            .map(|(index, heading)| column_for_heading(index, heading))
            .collect::<AppResult<_>>()?;

        for record in input.records() {
            let record = record?;
            for (column, field) in columns.iter_mut().zip(record.iter()) {
                match &mut column.values {
                    ColumnValues::Text(values) => values.push(field.to_string()),
                    ColumnValues::Integer(values) => {
                        values.push(field.trim().parse().map_err(|_| {
                            DaqError::Format(format!(
                                "Column '{}' holds non-integer value '{}'",
                                column.name, field
                            ))
                        })?);
                    }
                }
            }
        }

        Table::from_columns(columns)
    }
}

#[cfg(not(feature = "storage_csv"))]
impl TableCodec for DelimitedCodec {
    fn save(&self, _table: &Table, _writer: &mut dyn Write) -> AppResult<()> {
        Err(DaqError::FeatureNotEnabled("storage_csv".to_string()))
    }

    fn load(&self, _reader: &mut dyn Read) -> AppResult<Table> {
        Err(DaqError::FeatureNotEnabled("storage_csv".to_string()))
    }
}

/// JSON codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuredCodec {
    /// Pretty-print the document
    pub pretty: bool,
}

impl TableCodec for StructuredCodec {
    fn save(&self, table: &Table, writer: &mut dyn Write) -> AppResult<()> {
        let document = table
            .columns()
            .iter()
            .enumerate()
            .map(|(index, c)| {
                Ok((
                    heading(table, index, &c.name),
                    serde_json::to_value(&c.values)?,
                ))
            })
            .collect::<Result<Map<String, Value>, serde_json::Error>>()?;
        if self.pretty {
            serde_json::to_writer_pretty(&mut *writer, &document)?;
        } else {
            serde_json::to_writer(&mut *writer, &document)?;
        }
        writer.flush()?;
        Ok(())
    }

    fn load(&self, reader: &mut dyn Read) -> AppResult<Table> {
        let document: Map<String, Value> = serde_json::from_reader(reader)?;
        let columns = document
            .into_iter()
            .enumerate()
            .map(|(index, (heading, value))| {
                let Column { name, values } = column_for_heading(index, &heading)?;
                let Value::Array(items) = value else {
                    return Err(DaqError::Format(format!(
                        "Column '{name}' is not an array"
                    )));
                };
                let values = if let ColumnValues::Text(_) = values {
                    ColumnValues::Text(
                        items
                            .into_iter()
                            .map(|item| match item {
                                Value::String(s) => Ok(s),
                                other => Err(DaqError::Format(format!(
                                    "Column '{name}' holds non-text value {other}"
                                ))),
                            })
                            .collect::<AppResult<_>>()?,
                    )
                } else {
                    ColumnValues::Integer(
                        items
                            .iter()
                            .map(|item| {
                                item.as_i64().ok_or_else(|| {
                                    DaqError::Format(format!(
                                        "Column '{name}' holds non-integer value {item}"
                                    ))
                                })
                            })
                            .collect::<AppResult<_>>()?,
                    )
                };
                Ok(Column { name, values })
            })
            .collect::<AppResult<Vec<_>>>()?;

        Table::from_columns(columns)
    }
}

/// Codec for `format` with the given delimiter (ignored for structured output).
pub fn codec_for(format: OutputFormat, delimiter: char) -> AppResult<Box<dyn TableCodec>> {
    Ok(match format {
        OutputFormat::Delimited => Box::new(DelimitedCodec::new(delimiter)?),
        OutputFormat::Structured => Box::new(StructuredCodec { pretty: true }),
    })
}

/// Serialize `table` to `writer` in `format`, comma-delimited for text output.
pub fn save(table: &Table, writer: &mut dyn Write, format: OutputFormat) -> AppResult<()> {
    codec_for(format, ',')?.save(table, writer)
}

/// Parse a table from `reader` in `format`, comma-delimited for text input.
pub fn load(reader: &mut dyn Read, format: OutputFormat) -> AppResult<Table> {
    codec_for(format, ',')?.load(reader)
}

/// Save `table` to a new or truncated file at `path`.
pub fn save_to_path(
    table: &Table,
    path: impl AsRef<Path>,
    format: OutputFormat,
    delimiter: char,
) -> AppResult<()> {
    let path = path.as_ref();
    let mut out = BufWriter::new(File::create(path)?);
    codec_for(format, delimiter)?.save(table, &mut out)?;
    tracing::info!(
        path = %path.display(),
        rows = table.len(),
        ?format,
        "Table saved"
    );
    Ok(())
}

/// Load a table from the file at `path`.
pub fn load_from_path(
    path: impl AsRef<Path>,
    format: OutputFormat,
    delimiter: char,
) -> AppResult<Table> {
    let mut input = BufReader::new(File::open(path.as_ref())?);
    codec_for(format, delimiter)?.load(&mut input)
}
