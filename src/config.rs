//! Configuration system using Figment
//!
//! Configuration is loaded from:
//! 1. `config/stream_daq.toml` (base configuration)
//! 2. Environment variables (prefixed with `STREAM_DAQ_`, sections split on `__`)
//!
//! Every field has a default, so an absent file yields the defaults of the original
//! acquisition tool: 9600 baud, `,` delimiter, time column present, one second
//! startup and inactivity windows and a cap of 1000 samples.
//!
//! # Example
//! ```no_run
//! use stream_daq::config::DaqConfig;
//!
//! let config = DaqConfig::load()?;
//! println!("Port: {}", config.serial.port);
//! # Ok::<(), stream_daq::error::DaqError>(())
//! ```

use crate::acquisition::{AcquisitionBudget, Schema, StreamOptions};
use crate::data::log_file::create_log_file;
use crate::data::storage::{codec_for, TableCodec};
use crate::data::OutputFormat;
use crate::error::{AppResult, DaqError};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaqConfig {
    /// Application settings
    pub application: ApplicationConfig,
    /// Transport settings
    pub serial: SerialConfig,
    /// Line framing and schema
    pub stream: StreamConfig,
    /// Session limits
    pub budget: BudgetConfig,
    /// Output settings
    pub output: OutputConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Application name
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log output format (pretty, compact, json)
    pub log_format: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "stream_daq".to_string(),
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

/// Serial transport configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Port path (e.g., "/dev/ttyUSB0", "COM7")
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Line read timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 9600,
            timeout_ms: 1000,
        }
    }
}

/// Stream framing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Field delimiter of incoming lines
    pub delimiter: char,
    /// Field delimiter of streamed output files
    pub output_delimiter: char,
    /// Sensor names; inferred from the first line when absent
    pub schema: Option<Vec<String>>,
    /// Whether each line starts with a time signature
    pub has_time_column: bool,
    /// Whether streamed output files start with a header line
    pub write_header: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            delimiter: ',',
            output_delimiter: ',',
            schema: None,
            has_time_column: true,
            write_header: true,
        }
    }
}

/// Session limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    /// Deadline for the first line
    pub startup_timeout_ms: u64,
    /// Quiet period ending a burst
    pub inactivity_window_ms: u64,
    /// Sample cap
    pub max_samples: u64,
    /// Optional total time budget
    pub max_duration_ms: Option<u64>,
    /// Sleep between unsuccessful polls (0 = yield only)
    pub poll_interval_ms: u64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            startup_timeout_ms: 1000,
            inactivity_window_ms: 1000,
            max_samples: 1000,
            max_duration_ms: None,
            poll_interval_ms: 1,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Table persistence format
    pub format: OutputFormat,
    /// Directory for log files and saved tables
    pub directory: PathBuf,
    /// Extension of generated log files
    pub file_extension: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Delimited,
            directory: PathBuf::from("data"),
            file_extension: "csv".to_string(),
        }
    }
}

impl DaqConfig {
    /// Load configuration from `config/stream_daq.toml` and environment variables
    ///
    /// Environment variables override the file with prefix `STREAM_DAQ_`
    /// Example: `STREAM_DAQ_BUDGET__MAX_SAMPLES=500`
    pub fn load() -> AppResult<Self> {
        Self::load_from("config/stream_daq.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let config: Self = Self::figment(path.as_ref()).extract()?;
        config.validate()?;
        Ok(config)
    }

    fn figment(path: &Path) -> Figment {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("STREAM_DAQ_").split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> AppResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.to_lowercase().as_str()) {
            return Err(DaqError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        let valid_formats = ["pretty", "compact", "json"];
        if !valid_formats.contains(&self.application.log_format.as_str()) {
            return Err(DaqError::Configuration(format!(
                "Invalid log_format '{}'. Must be one of: {}",
                self.application.log_format,
                valid_formats.join(", ")
            )));
        }

        for (key, delimiter) in [
            ("delimiter", self.stream.delimiter),
            ("output_delimiter", self.stream.output_delimiter),
        ] {
            if delimiter == '\n' || delimiter == '\r' {
                return Err(DaqError::Configuration(format!(
                    "Invalid {key}: line breaks frame records and cannot separate fields"
                )));
            }
        }

        if self.budget.startup_timeout_ms == 0 {
            return Err(DaqError::Configuration(
                "startup_timeout_ms must be greater than 0".into(),
            ));
        }
        if self.budget.inactivity_window_ms == 0 {
            return Err(DaqError::Configuration(
                "inactivity_window_ms must be greater than 0".into(),
            ));
        }

        if let Some(names) = &self.stream.schema {
            Schema::new(names.clone())
                .and_then(|schema| schema.check_time_column(self.stream.has_time_column))
                .map_err(|e| DaqError::Configuration(e.to_string()))?;
        }

        Ok(())
    }

    /// Session limits for the acquisition engine
    pub fn budget(&self) -> AcquisitionBudget {
        AcquisitionBudget {
            startup_timeout: Duration::from_millis(self.budget.startup_timeout_ms),
            inactivity_window: Duration::from_millis(self.budget.inactivity_window_ms),
            max_samples: self.budget.max_samples,
            max_duration: self.budget.max_duration_ms.map(Duration::from_millis),
            poll_interval: Duration::from_millis(self.budget.poll_interval_ms),
        }
    }

    /// Line framing for the acquisition engine
    pub fn stream_options(&self) -> AppResult<StreamOptions> {
        Ok(StreamOptions {
            delimiter: self.stream.delimiter,
            schema: self.stream.schema.clone().map(Schema::new).transpose()?,
            has_time_column: self.stream.has_time_column,
        })
    }

    /// Create a fresh timestamped log file in the output directory
    pub fn new_log_file(&self) -> AppResult<(String, PathBuf)> {
        create_log_file(&self.output.directory, &self.output.file_extension, None)
    }

    /// Table codec for the configured output format and delimiter
    pub fn table_codec(&self) -> AppResult<Box<dyn TableCodec>> {
        codec_for(self.output.format, self.stream.output_delimiter)
    }
}
