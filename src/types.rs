//! Core types for the change feed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Place of a record in the feed (commit order).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Position(pub u64);

impl Position {
    /// Precedes every record. Sources assign positions starting at 1.
    pub const ORIGIN: Position = Position(0);
}

impl fmt::Debug for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pos({})", self.0)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Microseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current time. Clamps to the epoch if the system clock is set before it.
    pub fn now() -> Self {
        let micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as i64)
            .unwrap_or(0);
        Timestamp(micros)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// Kind of mutation a record describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    Insert,
    Update,
    Delete,
    /// Database command (create collection, drop, ...).
    Command,
    /// Heartbeat entry with no data change.
    Noop,
}

/// A single committed change entry. Immutable once read.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Position in the feed (assigned by the source).
    pub position: Position,

    /// Commit time (assigned by the source).
    pub timestamp: Timestamp,

    /// Target namespace, e.g. `"app.users"`.
    pub namespace: String,

    pub op: OpKind,

    /// Id of the mutated document, if the entry targets one.
    pub document_id: Option<String>,

    /// Mutation description.
    pub payload: serde_json::Value,
}

/// A change entry before the source assigns position and timestamp.
#[derive(Clone, Debug)]
pub struct RecordInput {
    pub namespace: String,
    pub op: OpKind,
    pub document_id: Option<String>,
    pub payload: serde_json::Value,
}

impl RecordInput {
    pub fn new(
        namespace: impl Into<String>,
        op: OpKind,
        document_id: Option<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            op,
            document_id,
            payload,
        }
    }

    /// Insert of a new document.
    pub fn insert(
        namespace: impl Into<String>,
        document_id: impl Into<String>,
        document: serde_json::Value,
    ) -> Self {
        Self::new(namespace, OpKind::Insert, Some(document_id.into()), document)
    }

    /// Update of an existing document.
    pub fn update(
        namespace: impl Into<String>,
        document_id: impl Into<String>,
        change: serde_json::Value,
    ) -> Self {
        Self::new(namespace, OpKind::Update, Some(document_id.into()), change)
    }

    /// Delete of a document.
    pub fn delete(namespace: impl Into<String>, document_id: impl Into<String>) -> Self {
        Self::new(
            namespace,
            OpKind::Delete,
            Some(document_id.into()),
            serde_json::Value::Null,
        )
    }

    /// Database command. Commands carry no document id.
    pub fn command(namespace: impl Into<String>, command: serde_json::Value) -> Self {
        Self::new(namespace, OpKind::Command, None, command)
    }
}

/// Result of asking a cursor for its next record.
#[derive(Clone, Debug, PartialEq)]
pub enum Fetch {
    Record(Record),
    /// Nothing available right now; the cursor remains valid.
    Exhausted,
}
