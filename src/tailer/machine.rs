//! The tailing, resume and retry state machine.

use super::handle::TailerHandle;
use super::types::{Continuation, TailerMetrics, TailerPhase, TailerState, TailerStats};
use crate::config::TailerConfig;
use crate::error::{Result, TailerError};
use crate::scheduler::{CancellationToken, Scheduler, ThreadScheduler, Wake};
use crate::sink::Sink;
use crate::source::{ChangeFeedSource, CursorHandle};
use crate::types::{Fetch, Position, Record};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use tracing::{debug, error, info, warn};

/// Follows a change feed and hands each new record to a sink, in position
/// order, surviving exhaustion, transient failures and dead cursors.
pub struct Tailer<S: ChangeFeedSource, K> {
    source: S,
    sink: K,
    config: TailerConfig,
    state: TailerState<S::Cursor>,
    /// Set by a successful `start`, cleared by `stop`.
    started: bool,
    /// The continuation registered by `start` or the last `step`.
    pending: Option<Continuation>,
    metrics: Arc<TailerMetrics>,
}

impl<S: ChangeFeedSource, K: Sink> Tailer<S, K> {
    /// Create a tailer with the default delays.
    pub fn new(source: S, sink: K) -> Self {
        Self::with_config(source, sink, TailerConfig::default())
    }

    pub fn with_config(source: S, sink: K, config: TailerConfig) -> Self {
        Self {
            source,
            sink,
            config,
            state: TailerState::default(),
            started: false,
            pending: None,
            metrics: Arc::new(TailerMetrics::default()),
        }
    }

    pub fn config(&self) -> &TailerConfig {
        &self.config
    }

    pub fn last_position(&self) -> Option<Position> {
        self.state.last_position
    }

    /// Whether a cursor is currently held.
    pub fn has_cursor(&self) -> bool {
        self.state.cursor.is_some()
    }

    /// The scheduled continuation, if the tailer is running.
    pub fn pending(&self) -> Option<Continuation> {
        self.pending
    }

    /// True between a successful `start` and the next `stop`.
    pub fn is_running(&self) -> bool {
        self.started
    }

    pub fn phase(&self) -> TailerPhase {
        self.metrics.phase()
    }

    pub fn stats(&self) -> TailerStats {
        self.metrics.snapshot()
    }

    /// Counters that stay readable while the tailer runs elsewhere.
    pub fn metrics(&self) -> Arc<TailerMetrics> {
        self.metrics.clone()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut K {
        &mut self.sink
    }

    pub fn into_parts(self) -> (S, K) {
        (self.source, self.sink)
    }

    /// Open the initial cursor and register the first step.
    ///
    /// Idempotent: once started this does nothing until `stop`, so at most
    /// one loop ever exists. Fails only if the starting position cannot be
    /// determined or the cursor cannot be opened.
    pub fn start(&mut self) -> Result<()> {
        if self.started {
            debug!("Tailer already running");
            return Ok(());
        }

        self.establish_cursor()?;
        self.started = true;
        self.metrics.set_phase(TailerPhase::Tailing);
        self.pending = Some(Continuation::Immediate);
        Ok(())
    }

    /// Replace the held cursor with a fresh one strictly after the last
    /// position, looking that position up first if it is unknown.
    ///
    /// The old cursor is dropped only once its replacement is open; on
    /// failure the tailer keeps whatever cursor it held.
    pub fn establish_cursor(&mut self) -> Result<()> {
        let after = match self.state.last_position {
            Some(position) => position,
            None => {
                let position = self.find_start_position()?;
                self.set_last_position(position);
                position
            }
        };

        let cursor = self
            .source
            .open_tailable(after)
            .map_err(|source| TailerError::OpenCursor { after, source })?;
        self.state.cursor = Some(cursor);
        self.metrics.record_cursor_open();

        info!(%after, "Cursor reset");
        Ok(())
    }

    /// Run one unit of work and return the continuation it schedules.
    ///
    /// Every path yields exactly one continuation, which also becomes
    /// [`pending`](Self::pending). Returns `None` without touching the feed
    /// when the tailer has not been started or has been stopped.
    pub fn step(&mut self) -> Option<Continuation> {
        if !self.started {
            debug!(phase = ?self.phase(), "Step ignored; tailer not running");
            return None;
        }

        let next = self.advance();
        self.pending = Some(next);
        Some(next)
    }

    /// Drop the pending continuation and close the cursor.
    ///
    /// The last position is kept, so a later `start` resumes after it.
    pub fn stop(&mut self) {
        self.started = false;
        self.pending = None;
        if self.state.cursor.take().is_some() {
            info!(last_position = ?self.state.last_position, "Cursor closed");
        }
        self.metrics.set_phase(TailerPhase::Stopped);
    }

    /// Start, then step until `cancel` fires, sleeping through `scheduler`
    /// whenever a step asks for a delay. The tailer is stopped on return.
    pub fn run<Sch: Scheduler>(&mut self, scheduler: &Sch, cancel: &CancellationToken) -> Result<()> {
        self.start()?;
        self.drive(scheduler, cancel);
        Ok(())
    }

    pub(crate) fn drive<Sch: Scheduler>(&mut self, scheduler: &Sch, cancel: &CancellationToken) {
        while !cancel.is_cancelled() {
            match self.step() {
                Some(Continuation::Immediate) => {}
                Some(Continuation::After(delay)) => {
                    if scheduler.sleep(delay, cancel) == Wake::Cancelled {
                        break;
                    }
                }
                None => break,
            }
        }

        self.stop();
    }

    fn advance(&mut self) -> Continuation {
        let stale = match self.state.cursor {
            Some(ref cursor) => !cursor.is_alive(),
            None => true,
        };

        if stale {
            info!("Cursor not alive; trying to re-establish");
            self.metrics.set_phase(TailerPhase::Recovering);

            if let Err(err) = self.establish_cursor() {
                warn!(
                    error = %err,
                    retry_in = ?self.config.retry_delay,
                    "Could not re-establish cursor"
                );
                self.metrics.record_transient_error();
                return Continuation::After(self.config.retry_delay);
            }
            self.metrics.set_phase(TailerPhase::Tailing);
        }

        let Some(cursor) = self.state.cursor.as_mut() else {
            return Continuation::After(self.config.retry_delay);
        };

        match cursor.fetch_next() {
            Ok(Fetch::Record(record)) => {
                self.deliver(record);
                Continuation::Immediate
            }
            Ok(Fetch::Exhausted) => {
                self.metrics.record_idle_poll();
                Continuation::After(self.config.idle_delay)
            }
            Err(err) if err.is_transient() => {
                warn!(
                    error = %err,
                    retry_in = ?self.config.retry_delay,
                    "Fetch failed; will retry"
                );
                self.metrics.record_transient_error();
                Continuation::After(self.config.retry_delay)
            }
            Err(err) => {
                error!(
                    error = %err,
                    retry_in = ?self.config.retry_delay,
                    "Fetch failed; discarding cursor"
                );
                self.metrics.record_fatal_error();
                self.state.cursor = None;
                Continuation::After(self.config.retry_delay)
            }
        }
    }

    fn find_start_position(&self) -> Result<Position> {
        match self.source.find_most_recent().map_err(TailerError::Lookup)? {
            Some(record) => {
                debug!(position = %record.position, "Most recent record");
                Ok(record.position)
            }
            None => {
                info!("Feed is empty; tailing from the origin");
                Ok(Position::ORIGIN)
            }
        }
    }

    fn deliver(&mut self, record: Record) {
        let position = record.position;
        debug!(%position, namespace = %record.namespace, op = ?record.op, "Received record");

        // Advance before delivery; a failing sink does not get a second try
        self.set_last_position(position);
        self.metrics.record_delivered();

        let sink = &mut self.sink;
        match panic::catch_unwind(AssertUnwindSafe(|| sink.deliver(record))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                self.metrics.record_sink_failure();
                warn!(%position, error = %err, "Sink failed to handle record");
            }
            Err(payload) => {
                self.metrics.record_sink_failure();
                error!(
                    %position,
                    panic = %panic_message(payload.as_ref()),
                    "Sink panicked while handling record"
                );
            }
        }
    }

    fn set_last_position(&mut self, position: Position) {
        self.state.last_position = Some(position);
        self.metrics.set_last_position(position);
    }
}

impl<S, K> Tailer<S, K>
where
    S: ChangeFeedSource + Send + 'static,
    S::Cursor: Send + 'static,
    K: Sink + Send + 'static,
{
    /// Start on the calling thread, then keep tailing on a dedicated thread
    /// that parks between polls.
    pub fn spawn(self) -> Result<TailerHandle<S, K>> {
        self.spawn_with(ThreadScheduler)
    }

    /// Like [`spawn`](Self::spawn), sleeping through `scheduler`.
    pub fn spawn_with<Sch>(mut self, scheduler: Sch) -> Result<TailerHandle<S, K>>
    where
        Sch: Scheduler + Send + 'static,
    {
        self.start()?;

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let metrics = self.metrics.clone();

        let thread = thread::Builder::new()
            .name(self.config.thread_name.clone())
            .spawn(move || {
                let mut tailer = self;
                tailer.drive(&scheduler, &token);
                tailer
            })?;

        Ok(TailerHandle::new(cancel, metrics, thread))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
