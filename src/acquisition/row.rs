//! Row parsing against a resolved schema.

use super::schema::Schema;
use crate::error::{AppResult, DaqError};

/// One accepted row, borrowing the raw fields of its line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row<'a> {
    fields: Vec<&'a str>,
    time_signature: Option<&'a str>,
    values: Vec<i64>,
}

impl<'a> Row<'a> {
    /// Raw fields exactly as split from the line.
    pub fn fields(&self) -> &[&'a str] {
        &self.fields
    }

    /// Leading time signature field, kept as text.
    pub fn time_signature(&self) -> Option<&'a str> {
        self.time_signature
    }

    /// Parsed sensor readings in schema order.
    pub fn values(&self) -> &[i64] {
        &self.values
    }

    /// Total number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Never true for a parsed row.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Splits lines and validates them against a schema.
#[derive(Debug, Clone, Copy)]
pub struct RowParser {
    delimiter: char,
    has_time_column: bool,
}

impl RowParser {
    /// Parser for `delimiter`-separated lines.
    pub fn new(delimiter: char, has_time_column: bool) -> Self {
        Self {
            delimiter,
            has_time_column,
        }
    }

    /// Parse `line`. Arity must equal the schema length plus the time column; every
    /// sensor field must be an integer (surrounding whitespace is ignored).
    pub fn parse<'a>(&self, line: &'a str, schema: &Schema) -> AppResult<Row<'a>> {
        let fields: Vec<&str> = line.split(self.delimiter).collect();
        let expected = schema.row_arity(self.has_time_column);
        if fields.len() != expected {
            return Err(DaqError::SchemaMismatch {
                expected,
                found: fields.len(),
                line: line.to_string(),
            });
        }

        let offset = usize::from(self.has_time_column);
        let values = fields[offset..]
            .iter()
            .zip(schema.names())
            .map(|(field, column)| {
                field.trim().parse::<i64>().map_err(|_| DaqError::FieldParse {
                    column: column.clone(),
                    value: field.to_string(),
                    line: line.to_string(),
                })
            })
            .collect::<AppResult<Vec<_>>>()?;

        Ok(Row {
            time_signature: self.has_time_column.then(|| fields[0]),
            fields,
            values,
        })
    }
}
