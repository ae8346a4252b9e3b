//! Terminal result of an acquisition session.

use super::schema::Schema;
use crate::error::DaqError;
use std::fmt;
use std::time::Duration;

/// Session state machine.
///
/// `WaitingForFirstSample -> Collecting -> Stopped*`; a session may also stop
/// straight from `WaitingForFirstSample`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing received yet; the startup deadline applies
    WaitingForFirstSample,
    /// At least one line received; the inactivity window applies
    Collecting,
    /// Sample cap, duration budget or inactivity window reached
    StoppedNormally,
    /// No line arrived before the startup deadline
    StoppedTimeout,
    /// A row, the sink or the transport failed
    StoppedOnError,
    /// Cancelled from outside
    StoppedCancelled,
}

impl SessionState {
    /// Whether this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            SessionState::WaitingForFirstSample | SessionState::Collecting
        )
    }
}

/// Why a session stopped.
#[derive(Debug)]
pub enum StopReason {
    /// `max_samples` rows accepted
    SampleLimit,
    /// Total time budget used up
    DurationLimit,
    /// Source went quiet for the inactivity window
    InactivityWindow,
    /// Source never produced a line before the startup deadline
    NoResponse {
        /// Startup deadline in milliseconds
        waited_ms: u64,
    },
    /// Cancellation flag raised
    Cancelled,
    /// Fatal fault; the session stopped at once
    Failed(DaqError),
}

impl StopReason {
    /// Terminal state this reason leads to.
    pub fn state(&self) -> SessionState {
        match self {
            StopReason::SampleLimit
            | StopReason::DurationLimit
            | StopReason::InactivityWindow => SessionState::StoppedNormally,
            StopReason::NoResponse { .. } => SessionState::StoppedTimeout,
            StopReason::Cancelled => SessionState::StoppedCancelled,
            StopReason::Failed(_) => SessionState::StoppedOnError,
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::SampleLimit => write!(f, "sample limit reached"),
            StopReason::DurationLimit => write!(f, "time budget used up"),
            StopReason::InactivityWindow => write!(f, "source went quiet"),
            StopReason::NoResponse { waited_ms } => {
                write!(f, "{}", DaqError::TransportUnavailable { waited_ms: *waited_ms })
            }
            StopReason::Cancelled => write!(f, "cancelled"),
            StopReason::Failed(err) => write!(f, "{err}"),
        }
    }
}

/// Outcome of one session. Whatever the sink received before the stop stays there.
#[derive(Debug)]
pub struct AcquisitionReport {
    /// Terminal state
    pub state: SessionState,
    /// Why the session stopped
    pub reason: StopReason,
    /// Rows accepted by the sink
    pub samples: u64,
    /// Wall-clock duration of the session
    pub elapsed: Duration,
    /// Schema in force, if one was resolved
    pub schema: Option<Schema>,
}

impl AcquisitionReport {
    pub(crate) fn new(
        reason: StopReason,
        samples: u64,
        elapsed: Duration,
        schema: Option<Schema>,
    ) -> Self {
        Self {
            state: reason.state(),
            reason,
            samples,
            elapsed,
            schema,
        }
    }

    /// The fatal error, for `StoppedOnError` sessions.
    pub fn error(&self) -> Option<&DaqError> {
        match &self.reason {
            StopReason::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// The stop as an error, if it was one. A startup timeout converts to
    /// [`DaqError::TransportUnavailable`].
    pub fn into_error(self) -> Option<DaqError> {
        match self.reason {
            StopReason::Failed(err) => Some(err),
            StopReason::NoResponse { waited_ms } => {
                Some(DaqError::TransportUnavailable { waited_ms })
            }
            _ => None,
        }
    }

    /// Human-readable reason.
    pub fn summary(&self) -> String {
        format!(
            "{:?} after {} samples in {:?}: {}",
            self.state, self.samples, self.elapsed, self.reason
        )
    }
}
