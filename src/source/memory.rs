//! In-process oplog with a tailable cursor.

use super::{ChangeFeedSource, CursorHandle};
use crate::error::{ErrorKind, SourceError};
use crate::types::{Fetch, OpKind, Position, Record, RecordInput, Timestamp};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Injected failures, consumed as operations hit them.
#[derive(Debug)]
struct Faults {
    fail_lookups: bool,
    open_failures: u32,
    fetch_failures: u32,
    fetch_failure_kind: ErrorKind,
}

impl Default for Faults {
    fn default() -> Self {
        Self {
            fail_lookups: false,
            open_failures: 0,
            fetch_failures: 0,
            fetch_failure_kind: ErrorKind::Transient,
        }
    }
}

struct OplogInner {
    /// Retained records, ascending by position.
    records: Vec<Record>,

    /// Next position to assign.
    next_position: u64,

    /// Cursors opened under an older generation are dead.
    generation: u64,

    faults: Faults,
}

struct Shared {
    log: RwLock<OplogInner>,
    open_cursors: AtomicUsize,
}

/// Append-only in-memory oplog.
///
/// Cloning is cheap and every clone sees the same log, so a test or an
/// embedding application can keep appending while a tailer follows it.
#[derive(Clone)]
pub struct MemoryOplog {
    shared: Arc<Shared>,
}

impl MemoryOplog {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                log: RwLock::new(OplogInner {
                    records: Vec::new(),
                    next_position: 1,
                    generation: 0,
                    faults: Faults::default(),
                }),
                open_cursors: AtomicUsize::new(0),
            }),
        }
    }

    /// Commit a change and return the stored record.
    pub fn append(&self, input: RecordInput) -> Record {
        let mut log = self.shared.log.write();

        let record = Record {
            position: Position(log.next_position),
            timestamp: Timestamp::now(),
            namespace: input.namespace,
            op: input.op,
            document_id: input.document_id,
            payload: input.payload,
        };
        log.next_position += 1;
        log.records.push(record.clone());

        record
    }

    /// Number of retained records.
    pub fn len(&self) -> usize {
        self.shared.log.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Position of the newest record, if any.
    pub fn head(&self) -> Option<Position> {
        self.shared.log.read().records.last().map(|r| r.position)
    }

    /// Copy of every retained record.
    pub fn records(&self) -> Vec<Record> {
        self.shared.log.read().records.clone()
    }

    /// Discard records before `position`, like a capped log rolling over.
    /// Returns how many records were removed.
    pub fn truncate_before(&self, position: Position) -> usize {
        let mut log = self.shared.log.write();
        let cut = log.records.partition_point(|r| r.position < position);
        log.records.drain(..cut);
        cut
    }

    /// Kill every open cursor. Cursors opened afterwards are unaffected.
    pub fn invalidate_cursors(&self) {
        self.shared.log.write().generation += 1;
    }

    /// Make `find_most_recent` fail until switched off.
    pub fn fail_lookups(&self, fail: bool) {
        self.shared.log.write().faults.fail_lookups = fail;
    }

    /// Make the next `count` cursor opens fail with a transient error.
    pub fn fail_next_opens(&self, count: u32) {
        self.shared.log.write().faults.open_failures = count;
    }

    /// Make the next `count` fetches, on any cursor, fail with `kind`.
    pub fn fail_next_fetches(&self, count: u32, kind: ErrorKind) {
        let mut log = self.shared.log.write();
        log.faults.fetch_failures = count;
        log.faults.fetch_failure_kind = kind;
    }

    /// Number of cursors currently open (not yet dropped).
    pub fn open_cursor_count(&self) -> usize {
        self.shared.open_cursors.load(Ordering::SeqCst)
    }

    /// Feed over records that carry a document id.
    pub fn feed(&self) -> MemoryFeed {
        self.feed_with_filter(FeedFilter::default())
    }

    /// Feed over records matching `filter`.
    pub fn feed_with_filter(&self, filter: FeedFilter) -> MemoryFeed {
        MemoryFeed {
            oplog: self.clone(),
            filter,
        }
    }
}

impl Default for MemoryOplog {
    fn default() -> Self {
        Self::new()
    }
}

/// Which records a feed yields.
#[derive(Clone, Debug)]
pub struct FeedFilter {
    /// Only these namespaces (None = all).
    pub namespaces: Option<Vec<String>>,

    /// Only these operation kinds (None = all).
    pub ops: Option<Vec<OpKind>>,

    /// Skip entries without a document id (commands, no-ops).
    /// Default: true
    pub require_document_id: bool,
}

impl Default for FeedFilter {
    fn default() -> Self {
        Self {
            namespaces: None,
            ops: None,
            require_document_id: true,
        }
    }
}

impl FeedFilter {
    /// Every entry, including commands and no-ops.
    pub fn all() -> Self {
        Self {
            require_document_id: false,
            ..Default::default()
        }
    }

    /// Document changes in the given namespaces.
    pub fn namespaces(namespaces: Vec<String>) -> Self {
        Self {
            namespaces: Some(namespaces),
            ..Default::default()
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        if self.require_document_id && record.document_id.is_none() {
            return false;
        }

        if let Some(ref namespaces) = self.namespaces {
            if !namespaces.contains(&record.namespace) {
                return false;
            }
        }

        if let Some(ref ops) = self.ops {
            if !ops.contains(&record.op) {
                return false;
            }
        }

        true
    }
}

/// A [`MemoryOplog`] viewed through a [`FeedFilter`].
#[derive(Clone)]
pub struct MemoryFeed {
    oplog: MemoryOplog,
    filter: FeedFilter,
}

impl ChangeFeedSource for MemoryFeed {
    type Cursor = MemoryCursor;

    fn find_most_recent(&self) -> Result<Option<Record>, SourceError> {
        let log = self.oplog.shared.log.read();
        if log.faults.fail_lookups {
            return Err(SourceError::transient("most recent record lookup refused"));
        }

        Ok(log
            .records
            .iter()
            .rev()
            .find(|r| self.filter.matches(r))
            .cloned())
    }

    fn open_tailable(&self, after: Position) -> Result<MemoryCursor, SourceError> {
        let generation = {
            let mut log = self.oplog.shared.log.write();
            if log.faults.open_failures > 0 {
                log.faults.open_failures -= 1;
                return Err(SourceError::transient("no reachable primary"));
            }
            log.generation
        };

        self.oplog.shared.open_cursors.fetch_add(1, Ordering::SeqCst);

        Ok(MemoryCursor {
            oplog: self.oplog.clone(),
            filter: self.filter.clone(),
            after,
            generation,
        })
    }
}

/// Tailable cursor over a [`MemoryOplog`].
pub struct MemoryCursor {
    oplog: MemoryOplog,
    filter: FeedFilter,
    /// Last position scanned; the next record must be strictly after it.
    after: Position,
    generation: u64,
}

impl CursorHandle for MemoryCursor {
    fn is_alive(&self) -> bool {
        self.oplog.shared.log.read().generation == self.generation
    }

    fn fetch_next(&mut self) -> Result<Fetch, SourceError> {
        let mut log = self.oplog.shared.log.write();

        if log.faults.fetch_failures > 0 {
            log.faults.fetch_failures -= 1;
            let message = match log.faults.fetch_failure_kind {
                ErrorKind::Transient => "connection reset during getMore",
                ErrorKind::Fatal => "getMore rejected",
            };
            return Err(SourceError {
                kind: log.faults.fetch_failure_kind,
                message: message.to_string(),
            });
        }

        if log.generation != self.generation {
            return Err(SourceError::fatal("cursor not found"));
        }

        let start = log.records.partition_point(|r| r.position <= self.after);
        for record in &log.records[start..] {
            self.after = record.position;
            if self.filter.matches(record) {
                return Ok(Fetch::Record(record.clone()));
            }
        }

        Ok(Fetch::Exhausted)
    }
}

impl Drop for MemoryCursor {
    fn drop(&mut self) {
        self.oplog.shared.open_cursors.fetch_sub(1, Ordering::SeqCst);
    }
}
