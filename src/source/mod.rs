//! Change feed sources.
//!
//! A source wraps a store's tailable query:
//! - a one-shot lookup of the most recent record, to define "now"
//! - a cursor strictly after a position, ascending, that stays open for
//!   future inserts instead of closing at the end of the current result set
//!
//! Connection handling, query syntax and timeouts belong to the source. The
//! tailer only distinguishes records, exhaustion, transient failures and
//! dead cursors.
//!
//! # Example
//!
//! ```ignore
//! let oplog = MemoryOplog::new();
//! let feed = oplog.feed();
//!
//! let mut cursor = feed.open_tailable(Position::ORIGIN)?;
//! oplog.append(RecordInput::insert("app.users", "u1", json!({"name": "ada"})));
//!
//! match cursor.fetch_next()? {
//!     Fetch::Record(record) => println!("{:?}", record),
//!     Fetch::Exhausted => println!("nothing yet"),
//! }
//! ```

mod memory;

pub use memory::{FeedFilter, MemoryCursor, MemoryFeed, MemoryOplog};

use crate::error::SourceError;
use crate::types::{Fetch, Position, Record};

/// The store's tailable change feed.
pub trait ChangeFeedSource {
    type Cursor: CursorHandle;

    /// The single most recent record, in the feed's natural order.
    /// `None` when the feed is empty.
    fn find_most_recent(&self) -> Result<Option<Record>, SourceError>;

    /// Open a tailable cursor over records with position strictly greater
    /// than `after`, in ascending order.
    fn open_tailable(&self, after: Position) -> Result<Self::Cursor, SourceError>;
}

/// An open tailable cursor. Dropping it releases its resources.
pub trait CursorHandle {
    /// False once the store has closed or invalidated the cursor.
    fn is_alive(&self) -> bool;

    /// Next record, or `Fetch::Exhausted` if none is available yet.
    fn fetch_next(&mut self) -> Result<Fetch, SourceError>;
}
