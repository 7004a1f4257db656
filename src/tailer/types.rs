//! Tailer state, continuations and counters.

use crate::types::Position;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// The single next step a step schedules.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Continuation {
    /// Run again right away (draining a backlog).
    Immediate,
    /// Run again after a delay (idle or retrying).
    After(Duration),
}

/// Where the tailer is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TailerPhase {
    /// Not started yet.
    #[default]
    Init,
    /// Holding a live cursor.
    Tailing,
    /// Cursor found dead; reopening from the last position.
    Recovering,
    /// Stopped; no cursor, nothing pending.
    Stopped,
}

/// What the tailer owns between steps.
pub struct TailerState<C> {
    /// Position of the last record handed to the sink, or of the most recent
    /// record at startup. None until the first lookup.
    pub last_position: Option<Position>,

    /// The one open cursor.
    pub cursor: Option<C>,
}

impl<C> Default for TailerState<C> {
    fn default() -> Self {
        Self {
            last_position: None,
            cursor: None,
        }
    }
}

/// Counters shared with observers on other threads.
#[derive(Debug, Default)]
pub struct TailerMetrics {
    delivered: AtomicU64,
    sink_failures: AtomicU64,
    idle_polls: AtomicU64,
    transient_errors: AtomicU64,
    fatal_errors: AtomicU64,
    cursor_opens: AtomicU64,
    last_position: RwLock<Option<Position>>,
    phase: RwLock<TailerPhase>,
}

impl TailerMetrics {
    pub(crate) fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_sink_failure(&self) {
        self.sink_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_idle_poll(&self) {
        self.idle_polls.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transient_error(&self) {
        self.transient_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_fatal_error(&self) {
        self.fatal_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cursor_open(&self) {
        self.cursor_opens.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn set_last_position(&self, position: Position) {
        *self.last_position.write() = Some(position);
    }

    pub(crate) fn set_phase(&self, phase: TailerPhase) {
        *self.phase.write() = phase;
    }

    pub fn last_position(&self) -> Option<Position> {
        *self.last_position.read()
    }

    pub fn phase(&self) -> TailerPhase {
        *self.phase.read()
    }

    /// Point-in-time copy of every counter.
    pub fn snapshot(&self) -> TailerStats {
        TailerStats {
            delivered: self.delivered.load(Ordering::Relaxed),
            sink_failures: self.sink_failures.load(Ordering::Relaxed),
            idle_polls: self.idle_polls.load(Ordering::Relaxed),
            transient_errors: self.transient_errors.load(Ordering::Relaxed),
            fatal_errors: self.fatal_errors.load(Ordering::Relaxed),
            cursor_opens: self.cursor_opens.load(Ordering::Relaxed),
            last_position: self.last_position(),
            phase: self.phase(),
        }
    }
}

/// Tailer statistics.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TailerStats {
    /// Records handed to the sink, including ones it failed on.
    pub delivered: u64,
    pub sink_failures: u64,
    /// Fetches that found nothing new.
    pub idle_polls: u64,
    /// Transient fetch or reopen failures.
    pub transient_errors: u64,
    pub fatal_errors: u64,
    /// Cursors opened, the initial one included.
    pub cursor_opens: u64,
    pub last_position: Option<Position>,
    pub phase: TailerPhase,
}
