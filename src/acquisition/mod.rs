//! Time-windowed acquisition and schema inference.
//!
//! - [`schema`]: sensor column schema, supplied or inferred from a header line
//! - [`row`]: splits and validates lines against the schema
//! - [`sink`]: where accepted rows go (in-memory table or streamed file)
//! - [`engine`]: the polling loop with startup, inactivity and sample budgets
//! - [`report`]: terminal state and reason of a session

pub mod engine;
pub mod report;
pub mod row;
pub mod schema;
pub mod sink;

pub use engine::{AcquisitionBudget, AcquisitionEngine, CancelHandle, StreamOptions};
pub use report::{AcquisitionReport, SessionState, StopReason};
pub use row::{Row, RowParser};
pub use schema::{Schema, SchemaResolver};
pub use sink::{FileSink, Sink, TableSink};
