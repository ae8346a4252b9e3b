//! Custom error types for the crate.
//!
//! This module defines the primary error type, `DaqError`. Using the `thiserror`
//! crate, it provides a centralized and consistent way to handle every fault an
//! acquisition session, a sink or the persistence layer can run into.
//!
//! ## Error Hierarchy
//!
//! - **`TransportUnavailable`**: the source never produced a first line before the
//!   startup deadline. This is the only variant that is *not* fatal to a session; the
//!   engine reports it as a timeout with zero samples.
//! - **`SchemaMismatch`** / **`FieldParse`** / **`Encoding`** / **`InvalidSchema`**:
//!   the stream disagreed with the resolved schema. These stop the session at once,
//!   since a framing desync does not self-correct.
//! - **`SinkWrite`** / **`Io`**: the destination could not accept a row.
//! - **`Format`**: persistence met data incompatible with the requested format.
//! - **`Config`** / **`Configuration`**: layered configuration failed to load or to
//!   validate.
//! - **`Serial*`** / **`FeatureNotEnabled`**: transport problems and functionality
//!   compiled out via feature flags.

use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type AppResult<T> = std::result::Result<T, DaqError>;

#[derive(Error, Debug)]
pub enum DaqError {
    #[error("No data received within the {waited_ms} ms startup window")]
    TransportUnavailable { waited_ms: u64 },

    #[error("Schema mismatch on line {line:?}: expected {expected} fields, found {found}")]
    SchemaMismatch {
        expected: usize,
        found: usize,
        line: String,
    },

    #[error("Could not parse '{value}' as an integer for column '{column}' (line {line:?})")]
    FieldParse {
        column: String,
        value: String,
        line: String,
    },

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Line is not valid text: {0}")]
    Encoding(String),

    #[error("Sink rejected row: {0}")]
    SinkWrite(String),

    #[error("Format error: {0}")]
    Format(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] figment::Error),

    #[error("Configuration validation error: {0}")]
    Configuration(String),

    #[error("Serial port not connected")]
    SerialPortNotConnected,

    #[error("Serial error: {0}")]
    Serial(String),

    #[error("Feature '{0}' is not enabled. Please build with --features {0}")]
    FeatureNotEnabled(String),
}

impl DaqError {
    /// Whether this error ends the acquisition session that met it.
    ///
    /// A startup timeout is reported as a terminal state, not a fault; everything else
    /// the loop can run into stops the session without retry.
    pub fn is_fatal_to_session(&self) -> bool {
        !matches!(self, DaqError::TransportUnavailable { .. })
    }
}

#[cfg(feature = "storage_csv")]
impl From<csv::Error> for DaqError {
    fn from(value: csv::Error) -> Self {
        if !value.is_io_error() {
            return DaqError::Format(value.to_string());
        }
        match value.into_kind() {
            csv::ErrorKind::Io(err) => DaqError::Io(err),
            other => DaqError::Format(format!("{other:?}")),
        }
    }
}

impl From<serde_json::Error> for DaqError {
    fn from(value: serde_json::Error) -> Self {
        if value.is_io() {
            DaqError::Io(value.into())
        } else {
            DaqError::Format(value.to_string())
        }
    }
}

#[cfg(feature = "instrument_serial")]
impl From<serialport::Error> for DaqError {
    fn from(value: serialport::Error) -> Self {
        DaqError::Serial(value.to_string())
    }
}
