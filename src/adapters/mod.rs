//! Line-oriented stream sources.
//!
//! The acquisition engine only needs three things from a transport: a non-blocking
//! "is anything waiting" check, a way to pull one terminated line, and a way to drop
//! stale bytes before a session starts. Everything about opening the port and its
//! framing lives behind [`LineSource`].

use crate::error::AppResult;
use async_trait::async_trait;

pub mod mock_adapter;
pub use mock_adapter::{MockLineSource, ScriptedLine};

pub mod serial_adapter;
pub use serial_adapter::SerialLineSource;

/// A source of raw, already-framed text lines.
#[async_trait]
pub trait LineSource: Send {
    /// Non-blocking check for pending input.
    async fn has_data(&mut self) -> AppResult<bool>;

    /// Read one line with its terminator (and one trailing control byte) stripped.
    async fn read_line(&mut self) -> AppResult<Vec<u8>>;

    /// Discard anything buffered before a new session starts.
    async fn reset_buffers(&mut self) -> AppResult<()>;

    /// Short description for logs.
    fn info(&self) -> String;
}

/// Strip the line terminator and one trailing control byte from a raw line.
///
/// Devices emitting `\r\n` leave the `\r` behind once the `\n` is consumed; a bare
/// `\n` framing leaves nothing extra.
pub fn strip_terminator(mut line: Vec<u8>) -> Vec<u8> {
    if line.last() == Some(&b'\n') {
        line.pop();
    }
    if line.last().is_some_and(|b| b.is_ascii_control()) {
        line.pop();
    }
    line
}
