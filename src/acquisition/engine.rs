//! Windowed acquisition loop.
//!
//! One session resets the source, then polls it until a stop condition fires:
//!
//! - before the first line, the absolute startup deadline applies;
//! - after it, the rolling inactivity window applies, refreshed by every
//!   accepted line;
//! - the sample cap and the optional total time budget apply throughout;
//! - any malformed row, sink fault or transport fault stops the session at once.
//!
//! With an inferred schema the first contentful line is the header: it resolves the
//! schema and is not counted as a sample.

use super::report::{AcquisitionReport, SessionState, StopReason};
use super::row::RowParser;
use super::schema::{Schema, SchemaResolver};
use super::sink::{FileSink, Sink, TableSink};
use crate::adapters::LineSource;
use crate::config::DaqConfig;
use crate::data::table::Table;
use crate::error::{AppResult, DaqError};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, info_span, trace, warn, Instrument};

/// Immutable limits of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquisitionBudget {
    /// Deadline for the first line
    pub startup_timeout: Duration,
    /// Quiet period that ends a burst once collecting
    pub inactivity_window: Duration,
    /// Sample cap
    pub max_samples: u64,
    /// Total time budget, if any
    pub max_duration: Option<Duration>,
    /// Sleep between unsuccessful polls; zero yields instead
    pub poll_interval: Duration,
}

impl Default for AcquisitionBudget {
    fn default() -> Self {
        Self {
            startup_timeout: Duration::from_millis(1000),
            inactivity_window: Duration::from_millis(1000),
            max_samples: 1000,
            max_duration: None,
            poll_interval: Duration::from_millis(1),
        }
    }
}

/// How lines are framed into fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamOptions {
    /// Field delimiter
    pub delimiter: char,
    /// Caller-supplied schema; `None` infers it from the first line
    pub schema: Option<Schema>,
    /// Whether each line starts with a time signature field
    pub has_time_column: bool,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            delimiter: ',',
            schema: None,
            has_time_column: true,
        }
    }
}

/// Shared cancellation flag, checked once per loop iteration.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    /// Fresh, un-cancelled handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the running session to stop. Data collected so far is kept.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Runs acquisition sessions against a [`LineSource`].
#[derive(Debug, Clone)]
pub struct AcquisitionEngine {
    options: StreamOptions,
    budget: AcquisitionBudget,
    cancel: CancelHandle,
}

impl AcquisitionEngine {
    /// Engine with the given framing and limits.
    pub fn new(options: StreamOptions, budget: AcquisitionBudget) -> Self {
        Self {
            options,
            budget,
            cancel: CancelHandle::new(),
        }
    }

    /// Engine from validated configuration.
    pub fn from_config(config: &DaqConfig) -> AppResult<Self> {
        config.validate()?;
        Ok(Self::new(config.stream_options()?, config.budget()))
    }

    /// Use `cancel` instead of the engine's own handle. A cancelled handle stays
    /// cancelled, so later sessions need a fresh one.
    pub fn with_cancel_handle(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    /// Handle that cancels sessions run by this engine.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Session limits.
    pub fn budget(&self) -> &AcquisitionBudget {
        &self.budget
    }

    /// Line framing.
    pub fn options(&self) -> &StreamOptions {
        &self.options
    }

    /// Run one session, routing accepted rows to `sink`.
    ///
    /// Always returns a report; faults are carried in [`StopReason::Failed`].
    pub async fn run<S, K>(&self, source: &mut S, sink: &mut K) -> AcquisitionReport
    where
        S: LineSource + ?Sized,
        K: Sink + ?Sized,
    {
        let span = info_span!(
            "acquisition",
            source = %source.info(),
            startup_timeout_ms = self.budget.startup_timeout.as_millis() as u64,
            inactivity_window_ms = self.budget.inactivity_window.as_millis() as u64,
            max_samples = self.budget.max_samples,
        );
        self.run_session(source, sink).instrument(span).await
    }

    async fn run_session<S, K>(&self, source: &mut S, sink: &mut K) -> AcquisitionReport
    where
        S: LineSource + ?Sized,
        K: Sink + ?Sized,
    {
        let has_time_column = self.options.has_time_column;
        let delimiter = self.options.delimiter;
        let parser = RowParser::new(delimiter, has_time_column);
        let mut resolver = SchemaResolver::inferred(delimiter, has_time_column);

        let session_start = Instant::now();
        let mut last_activity = session_start;
        let mut samples: u64 = 0;
        let mut state = SessionState::WaitingForFirstSample;

        let reason = 'session: {
            if let Err(err) = source.reset_buffers().await {
                break 'session StopReason::Failed(err);
            }
            if let Some(schema) = &self.options.schema {
                let explicit =
                    SchemaResolver::explicit(schema.clone(), delimiter, has_time_column);
                resolver = match explicit {
                    Ok(resolver) => resolver,
                    Err(err) => break 'session StopReason::Failed(err),
                };
            }
            if let Some(schema) = resolver.schema() {
                if let Err(err) = sink.begin(schema, has_time_column) {
                    break 'session StopReason::Failed(err);
                }
            }

            loop {
                if self.cancel.is_cancelled() {
                    break 'session StopReason::Cancelled;
                }
                if samples >= self.budget.max_samples {
                    break 'session StopReason::SampleLimit;
                }

                let now = Instant::now();
                if let Some(max) = self.budget.max_duration {
                    if now.duration_since(session_start) >= max {
                        break 'session StopReason::DurationLimit;
                    }
                }
                match state {
                    SessionState::WaitingForFirstSample => {
                        last_activity = now;
                        if now.duration_since(session_start) >= self.budget.startup_timeout {
                            break 'session StopReason::NoResponse {
                                waited_ms: self.budget.startup_timeout.as_millis() as u64,
                            };
                        }
                    }
                    _ => {
                        if now.duration_since(last_activity) >= self.budget.inactivity_window {
                            break 'session StopReason::InactivityWindow;
                        }
                    }
                }

                match source.has_data().await {
                    Ok(true) => {}
                    Ok(false) => {
                        self.idle().await;
                        continue;
                    }
                    Err(err) => break 'session StopReason::Failed(err),
                }

                let raw = match source.read_line().await {
                    Ok(raw) => raw,
                    Err(err) => break 'session StopReason::Failed(err),
                };
                let line = match String::from_utf8(raw) {
                    Ok(line) => line,
                    Err(err) => break 'session StopReason::Failed(DaqError::Encoding(err.to_string())),
                };
                if line.trim().is_empty() {
                    trace!("Skipping blank line");
                    continue;
                }
                let received_at = Instant::now();

                if resolver.schema().is_none() {
                    match resolver.resolve(&line) {
                        Ok(schema) => {
                            if let Err(err) = sink.begin(schema, has_time_column) {
                                break 'session StopReason::Failed(err);
                            }
                        }
                        Err(err) => break 'session StopReason::Failed(err),
                    }
                    state = SessionState::Collecting;
                    last_activity = received_at;
                    continue;
                }
                let Some(schema) = resolver.schema() else {
                    continue;
                };

                let row = match parser.parse(&line, schema) {
                    Ok(row) => row,
                    Err(err) => break 'session StopReason::Failed(err),
                };
                if let Err(err) = sink.accept(&row) {
                    break 'session StopReason::Failed(err);
                }
                samples += 1;
                state = SessionState::Collecting;
                last_activity = received_at;
                trace!(samples, "Sample accepted");
            }
        };

        let reason = match (sink.finish(), reason) {
            (Err(err), reason) if !matches!(reason, StopReason::Failed(_)) => {
                StopReason::Failed(err)
            }
            (_, reason) => reason,
        };

        let report = AcquisitionReport::new(
            reason,
            samples,
            session_start.elapsed(),
            resolver.schema().cloned(),
        );
        match report.state {
            SessionState::StoppedNormally => info!(
                samples = report.samples,
                elapsed_ms = report.elapsed.as_millis() as u64,
                reason = %report.reason,
                "Acquisition finished"
            ),
            SessionState::StoppedOnError => error!(
                samples = report.samples,
                error = %report.reason,
                "Acquisition stopped on error"
            ),
            _ => warn!(
                samples = report.samples,
                reason = %report.reason,
                "Acquisition stopped early"
            ),
        }
        report
    }

    async fn idle(&self) {
        if self.budget.poll_interval.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.budget.poll_interval).await;
        }
    }

    /// Run a session into a fresh [`TableSink`] and return the collected table.
    pub async fn acquire_table<S>(&self, source: &mut S) -> (Table, AcquisitionReport)
    where
        S: LineSource + ?Sized,
    {
        let mut sink = TableSink::new();
        let report = self.run(source, &mut sink).await;
        debug!(rows = sink.table().len(), "Table acquisition done");
        (sink.into_table(), report)
    }

    /// Run a session streaming rows to `path`, appending to it.
    pub async fn acquire_to_file<S>(
        &self,
        source: &mut S,
        path: impl AsRef<Path>,
        output_delimiter: char,
        write_header: bool,
    ) -> AppResult<AcquisitionReport>
    where
        S: LineSource + ?Sized,
    {
        let mut sink = FileSink::append(path, output_delimiter)?.with_header(write_header);
        let report = self.run(source, &mut sink).await;
        debug!(rows = sink.rows_written(), "File acquisition done");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{MockLineSource, ScriptedLine};
    use tracing_test::traced_test;

    fn budget(startup_ms: u64, inactivity_ms: u64, max_samples: u64) -> AcquisitionBudget {
        AcquisitionBudget {
            startup_timeout: Duration::from_millis(startup_ms),
            inactivity_window: Duration::from_millis(inactivity_ms),
            max_samples,
            max_duration: None,
            poll_interval: Duration::from_millis(1),
        }
    }

    fn inferred(has_time_column: bool) -> StreamOptions {
        StreamOptions {
            has_time_column,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_silent_source_times_out() {
        let engine = AcquisitionEngine::new(inferred(false), budget(50, 50, 10));
        let mut source = MockLineSource::silent();
        let start = Instant::now();
        let (table, report) = engine.acquire_table(&mut source).await;

        assert_eq!(report.state, SessionState::StoppedTimeout);
        assert_eq!(report.samples, 0);
        assert!(table.is_empty());
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert!(start.elapsed() < Duration::from_millis(500));
        assert_eq!(source.reset_count(), 1);
    }

    #[tokio::test]
    async fn test_header_is_not_a_sample() {
        let engine = AcquisitionEngine::new(inferred(false), budget(200, 30, 10));
        let mut source = MockLineSource::from_lines(["A,B", "1,2", "3,4"]);
        let (table, report) = engine.acquire_table(&mut source).await;

        assert_eq!(report.state, SessionState::StoppedNormally);
        assert!(matches!(report.reason, StopReason::InactivityWindow));
        assert_eq!(report.samples, 2);
        assert_eq!(table.sensor("A"), Some(&[1, 3][..]));
        assert_eq!(table.sensor("B"), Some(&[2, 4][..]));
    }

    #[tokio::test]
    async fn test_explicit_schema_counts_first_line() {
        let options = StreamOptions {
            schema: Some(Schema::new(vec!["A".into(), "B".into()]).unwrap()),
            has_time_column: false,
            ..Default::default()
        };
        let engine = AcquisitionEngine::new(options, budget(200, 30, 10));
        let mut source = MockLineSource::from_lines(["1,2", "3,4"]);
        let (table, report) = engine.acquire_table(&mut source).await;

        assert_eq!(report.samples, 2);
        assert_eq!(table.sensor("A"), Some(&[1, 3][..]));
    }

    #[tokio::test]
    async fn test_blank_lines_are_skipped() {
        let engine = AcquisitionEngine::new(inferred(false), budget(200, 30, 10));
        let mut source = MockLineSource::from_lines(["", "A", "  ", "5"]);
        let (table, report) = engine.acquire_table(&mut source).await;

        assert_eq!(report.samples, 1);
        assert_eq!(table.sensor("A"), Some(&[5][..]));
    }

    #[tokio::test]
    async fn test_sample_cap_zero_stops_immediately() {
        let engine = AcquisitionEngine::new(inferred(false), budget(200, 30, 0));
        let mut source = MockLineSource::from_lines(["A", "1"]);
        let (_, report) = engine.acquire_table(&mut source).await;

        assert!(matches!(report.reason, StopReason::SampleLimit));
        assert_eq!(report.samples, 0);
        assert_eq!(source.lines_read(), 0);
    }

    #[tokio::test]
    async fn test_duration_budget() {
        let mut b = budget(200, 200, u64::MAX);
        b.max_duration = Some(Duration::from_millis(40));
        let engine = AcquisitionEngine::new(inferred(false), b);
        let mut source =
            MockLineSource::new(vec![ScriptedLine::new(0, "A")]).repeating("1", Duration::from_millis(5));
        let (_, report) = engine.acquire_table(&mut source).await;

        assert!(matches!(report.reason, StopReason::DurationLimit));
        assert_eq!(report.state, SessionState::StoppedNormally);
        assert!(report.samples > 0);
    }

    #[tokio::test]
    async fn test_invalid_header_is_fatal() {
        let engine = AcquisitionEngine::new(inferred(false), budget(200, 30, 10));
        let mut source = MockLineSource::from_lines(["A,A", "1,2"]);
        let (_, report) = engine.acquire_table(&mut source).await;

        assert_eq!(report.state, SessionState::StoppedOnError);
        assert!(matches!(report.error(), Some(DaqError::InvalidSchema(_))));
    }

    #[tokio::test]
    async fn test_time_names_a_sensor_without_time_column() {
        let engine = AcquisitionEngine::new(inferred(false), budget(200, 30, 10));
        let mut source = MockLineSource::from_lines(["time,A", "100,1", "110,2"]);
        let (table, report) = engine.acquire_table(&mut source).await;

        assert_eq!(report.state, SessionState::StoppedNormally);
        assert_eq!(report.samples, 2);
        assert!(!table.has_time_column());
        assert_eq!(table.sensor("time"), Some(&[100, 110][..]));
        assert_eq!(table.sensor("A"), Some(&[1, 2][..]));
    }

    #[tokio::test]
    async fn test_explicit_time_sensor_clashes_with_time_column() {
        let options = StreamOptions {
            schema: Some(Schema::new(vec!["time".into()]).unwrap()),
            ..Default::default()
        };
        let engine = AcquisitionEngine::new(options, budget(200, 30, 10));
        let mut source = MockLineSource::from_lines(["0,1"]);
        let (_, report) = engine.acquire_table(&mut source).await;

        assert_eq!(report.state, SessionState::StoppedOnError);
        assert!(matches!(report.error(), Some(DaqError::InvalidSchema(_))));
        assert!(report.schema.is_none());
    }

    #[tokio::test]
    async fn test_transport_failure_is_fatal() {
        let engine = AcquisitionEngine::new(inferred(false), budget(200, 30, 10));
        let mut source = MockLineSource::from_lines(["A", "1"]);
        source.trigger_failure();
        let (_, report) = engine.acquire_table(&mut source).await;

        assert_eq!(report.state, SessionState::StoppedOnError);
        assert!(matches!(report.error(), Some(DaqError::Serial(_))));
    }

    #[tokio::test]
    async fn test_cancel_before_run() {
        let engine = AcquisitionEngine::new(inferred(false), budget(200, 30, 10));
        engine.cancel_handle().cancel();
        let mut source = MockLineSource::from_lines(["A", "1"]);
        let (_, report) = engine.acquire_table(&mut source).await;

        assert_eq!(report.state, SessionState::StoppedCancelled);
        assert_eq!(report.samples, 0);
    }

    #[tokio::test]
    async fn test_zero_poll_interval_yields() {
        let mut b = budget(20, 20, 10);
        b.poll_interval = Duration::ZERO;
        let engine = AcquisitionEngine::new(inferred(false), b);
        let mut source = MockLineSource::silent();
        let (_, report) = engine.acquire_table(&mut source).await;
        assert_eq!(report.state, SessionState::StoppedTimeout);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_outcomes_are_logged() {
        let engine = AcquisitionEngine::new(inferred(false), budget(20, 20, 10));
        let mut source = MockLineSource::silent();
        engine.acquire_table(&mut source).await;
        assert!(logs_contain("Acquisition stopped early"));

        let mut source = MockLineSource::from_lines(["A", "x"]);
        engine.acquire_table(&mut source).await;
        assert!(logs_contain("Acquisition stopped on error"));
    }
}
