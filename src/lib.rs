//! # Stream DAQ
//!
//! Acquires delimiter-separated measurement lines from a microcontroller streaming one
//! sample per line (typically over a serial port) and assembles them into a typed,
//! columnar table, or streams them straight to a log file.
//!
//! ## Crate Structure
//!
//! - **`adapters`**: the [`LineSource`](adapters::LineSource) trait the engine polls,
//!   with a serial implementation and a scripted mock.
//! - **`acquisition`**: schema resolution, row parsing, sinks and the windowed
//!   acquisition loop ([`AcquisitionEngine`](acquisition::AcquisitionEngine)).
//! - **`data`**: the columnar [`Table`](data::Table), its persistence in delimited and
//!   JSON form, and log file creation.
//! - **`config`**: layered configuration from TOML and environment variables.
//! - **`error`**: the crate-wide [`DaqError`](error::DaqError).
//! - **`tracing_setup`**: structured logging initialisation.
//!
//! ## Example
//!
//! ```
//! use stream_daq::acquisition::{AcquisitionBudget, AcquisitionEngine, SessionState, StreamOptions};
//! use stream_daq::adapters::MockLineSource;
//!
//! # tokio_test::block_on(async {
//! let options = StreamOptions { has_time_column: false, ..Default::default() };
//! let engine = AcquisitionEngine::new(options, AcquisitionBudget::default());
//! let mut source = MockLineSource::from_lines(["A,B", "1,2", "3,4"]);
//!
//! let (table, report) = engine.acquire_table(&mut source).await;
//! assert_eq!(report.state, SessionState::StoppedNormally);
//! assert_eq!(table.sensor("A"), Some(&[1, 3][..]));
//! # })
//! ```

pub mod acquisition;
pub mod adapters;
pub mod config;
pub mod data;
pub mod error;
pub mod tracing_setup;
