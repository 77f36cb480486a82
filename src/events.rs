//! Event reporting
//!
//! Validation findings and retry attempts are reported through an
//! [`EventSink`]. The default sink forwards to `tracing`; [`MemorySink`]
//! keeps everything in memory so callers can inspect or serialize it.

use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;

/// Something worth telling the pipeline log about
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    /// A primary attempt is starting
    AttemptStarted {
        /// Operation name.
        operation: String,
        /// 1-based attempt number.
        attempt: usize,
        /// Attempt budget.
        max_attempts: usize,
    },
    /// A primary attempt succeeded
    AttemptSucceeded {
        /// Operation name.
        operation: String,
        /// 1-based attempt number.
        attempt: usize,
    },
    /// A primary attempt failed
    AttemptFailed {
        /// Operation name.
        operation: String,
        /// 1-based attempt number.
        attempt: usize,
        /// Error message of the attempt.
        error: String,
    },
    /// The fallback action is starting
    FallbackStarted {
        /// Operation name.
        operation: String,
    },
    /// The fallback action succeeded
    FallbackSucceeded {
        /// Operation name.
        operation: String,
    },
    /// The fallback action failed
    FallbackFailed {
        /// Operation name.
        operation: String,
        /// Error message of the fallback.
        error: String,
    },
    /// A blocking validation problem
    ValidationError {
        /// Message.
        message: String,
    },
    /// A non-blocking validation problem
    ValidationWarning {
        /// Message.
        message: String,
    },
    /// Advisory hint
    Suggestion {
        /// Message.
        message: String,
    },
    /// Free-form diagnostic line
    Diagnostic {
        /// Message.
        message: String,
    },
}

impl Event {
    /// Returns true for events that describe a failed attempt or fallback
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::AttemptFailed { .. } | Self::FallbackFailed { .. })
    }

    /// Returns true for events that describe a successful attempt or fallback
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            Self::AttemptSucceeded { .. } | Self::FallbackSucceeded { .. }
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AttemptStarted {
                operation,
                attempt,
                max_attempts,
            } => write!(f, "{operation}: attempt {attempt}/{max_attempts}"),
            Self::AttemptSucceeded { operation, attempt } => {
                write!(f, "{operation}: succeeded on attempt {attempt}")
            }
            Self::AttemptFailed {
                operation,
                attempt,
                error,
            } => write!(f, "{operation}: attempt {attempt} failed: {error}"),
            Self::FallbackStarted { operation } => write!(f, "{operation}: running fallback"),
            Self::FallbackSucceeded { operation } => write!(f, "{operation}: fallback succeeded"),
            Self::FallbackFailed { operation, error } => {
                write!(f, "{operation}: fallback failed: {error}")
            }
            Self::ValidationError { message } => write!(f, "ERROR: {message}"),
            Self::ValidationWarning { message } => write!(f, "WARNING: {message}"),
            Self::Suggestion { message } => write!(f, "SUGGESTION: {message}"),
            Self::Diagnostic { message } => write!(f, "{message}"),
        }
    }
}

/// Receiver for [`Event`]s
pub trait EventSink: Send + Sync {
    /// Records an event
    fn emit(&self, event: Event);
}

/// Forwards events to `tracing` at a level matching their severity
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: Event) {
        match &event {
            Event::AttemptFailed { .. }
            | Event::FallbackFailed { .. }
            | Event::ValidationError { .. } => tracing::error!("{event}"),
            Event::ValidationWarning { .. } => tracing::warn!("{event}"),
            Event::AttemptStarted { .. } | Event::Diagnostic { .. } => tracing::debug!("{event}"),
            _ => tracing::info!("{event}"),
        }
    }
}

/// Keeps events in memory, and optionally forwards them to another sink
#[derive(Default)]
pub struct MemorySink {
    events: Mutex<Vec<Event>>,
    forward: Option<Box<dyn EventSink>>,
}

impl MemorySink {
    /// Creates an empty sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Forwards every recorded event to `sink` as well
    #[must_use]
    pub fn forwarding_to(sink: impl EventSink + 'static) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            forward: Some(Box::new(sink)),
        }
    }

    /// Returns a copy of every recorded event
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    /// Counts events matching `predicate`
    pub fn count(&self, predicate: impl Fn(&Event) -> bool) -> usize {
        self.events.lock().iter().filter(|e| predicate(e)).count()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: Event) {
        if let Some(forward) = &self.forward {
            forward.emit(event.clone());
        }
        self.events.lock().push(event);
    }
}

impl fmt::Debug for MemorySink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemorySink")
            .field("events", &self.events.lock().len())
            .finish_non_exhaustive()
    }
}
