//! Mock line source for testing
//!
//! Replays a scripted sequence of lines without requiring a physical device. It provides:
//! - Lines released at fixed offsets from the last buffer reset
//! - An optional endless emitter for sample-cap scenarios
//! - Stale pre-session lines that a reset must discard
//! - One-shot failure injection on the next read

use super::{strip_terminator, LineSource};
use crate::error::{AppResult, DaqError};
use async_trait::async_trait;
use std::time::{Duration, Instant};

/// A line released once `at` has elapsed since the last reset.
#[derive(Debug, Clone)]
pub struct ScriptedLine {
    /// Release offset from the session start
    pub at: Duration,
    /// Line body without terminator
    pub text: String,
}

impl ScriptedLine {
    /// Line released at `at_ms` milliseconds after the reset.
    pub fn new(at_ms: u64, text: impl Into<String>) -> Self {
        Self {
            at: Duration::from_millis(at_ms),
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone)]
struct Repeat {
    text: String,
    every: Duration,
    emitted: u64,
}

/// Scripted [`LineSource`]
///
/// # Example
///
/// ```
/// use stream_daq::adapters::{LineSource, MockLineSource};
///
/// # tokio_test::block_on(async {
/// let mut source = MockLineSource::from_lines(["A,B", "1,2"]);
/// source.reset_buffers().await.unwrap();
/// assert!(source.has_data().await.unwrap());
/// assert_eq!(source.read_line().await.unwrap(), b"A,B");
/// # })
/// ```
#[derive(Debug, Default)]
pub struct MockLineSource {
    script: Vec<ScriptedLine>,
    next: usize,
    repeat: Option<Repeat>,
    stale: Vec<String>,
    started: Option<Instant>,
    line_ending: &'static str,
    fail_next_read: bool,
    resets: usize,
    lines_read: usize,
}

impl MockLineSource {
    /// Create a source that never emits anything.
    pub fn silent() -> Self {
        Self {
            line_ending: "\r\n",
            ..Default::default()
        }
    }

    /// Create a source from timed lines. Offsets are sorted on construction.
    pub fn new(mut script: Vec<ScriptedLine>) -> Self {
        script.sort_by_key(|line| line.at);
        Self {
            script,
            ..Self::silent()
        }
    }

    /// All lines available immediately after reset.
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            lines
                .into_iter()
                .map(|text| ScriptedLine::new(0, text))
                .collect(),
        )
    }

    /// After the script, emit `text` every `every` without end.
    pub fn repeating(mut self, text: impl Into<String>, every: Duration) -> Self {
        self.repeat = Some(Repeat {
            text: text.into(),
            every,
            emitted: 0,
        });
        self
    }

    /// Line sitting in the buffer before the session starts.
    pub fn with_stale_line(mut self, text: impl Into<String>) -> Self {
        self.stale.push(text.into());
        self
    }

    /// Use `\n` instead of `\r\n` framing.
    pub fn with_bare_newlines(mut self) -> Self {
        self.line_ending = "\n";
        self
    }

    /// Make the next `read_line` fail once.
    pub fn trigger_failure(&mut self) {
        self.fail_next_read = true;
    }

    /// Number of `reset_buffers` calls seen.
    pub fn reset_count(&self) -> usize {
        self.resets
    }

    /// Number of lines handed out so far.
    pub fn lines_read(&self) -> usize {
        self.lines_read
    }

    fn elapsed(&self) -> Option<Duration> {
        self.started.map(|start| start.elapsed())
    }

    fn repeat_base(&self) -> Duration {
        self.script.last().map(|line| line.at).unwrap_or_default()
    }

    fn next_ready(&self) -> Option<String> {
        if let Some(text) = self.stale.first() {
            return Some(text.clone());
        }
        let elapsed = self.elapsed()?;
        if let Some(line) = self.script.get(self.next) {
            return (line.at <= elapsed).then(|| line.text.clone());
        }
        let repeat = self.repeat.as_ref()?;
        let due = self.repeat_base() + repeat.every * (repeat.emitted as u32 + 1);
        (due <= elapsed).then(|| repeat.text.clone())
    }

    fn advance(&mut self) {
        if !self.stale.is_empty() {
            self.stale.remove(0);
        } else if self.next < self.script.len() {
            self.next += 1;
        } else if let Some(repeat) = self.repeat.as_mut() {
            repeat.emitted += 1;
        }
    }
}

#[async_trait]
impl LineSource for MockLineSource {
    async fn has_data(&mut self) -> AppResult<bool> {
        Ok(self.next_ready().is_some())
    }

    async fn read_line(&mut self) -> AppResult<Vec<u8>> {
        if std::mem::take(&mut self.fail_next_read) {
            return Err(DaqError::Serial("Mock read failure".into()));
        }
        let text = self
            .next_ready()
            .ok_or_else(|| DaqError::Serial("No line available".into()))?;
        self.advance();
        self.lines_read += 1;
        let framed = format!("{}{}", text, self.line_ending);
        Ok(strip_terminator(framed.into_bytes()))
    }

    async fn reset_buffers(&mut self) -> AppResult<()> {
        self.stale.clear();
        self.next = 0;
        if let Some(repeat) = self.repeat.as_mut() {
            repeat.emitted = 0;
        }
        self.started = Some(Instant::now());
        self.resets += 1;
        tracing::debug!("MockLineSource buffers reset");
        Ok(())
    }

    fn info(&self) -> String {
        format!("MockLineSource ({} scripted lines)", self.script.len())
    }
}
