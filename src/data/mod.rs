//! Tables of acquired samples and their storage.
pub mod log_file;
pub mod storage;
pub mod table;

pub use storage::OutputFormat;
pub use table::{Column, ColumnValues, Table, TIME_COLUMN};
