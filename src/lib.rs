//! # Oplog Tailer
//!
//! Follows the append-only change log of a replicated store and hands each
//! newly committed record, in commit order, to a single consumer.
//!
//! ## Core Concepts
//!
//! - **Sources**: a store's tailable cursor behind [`ChangeFeedSource`]
//! - **Sinks**: the consumer callback, invoked once per record
//! - **Tailer**: the resume/retry state machine between the two
//! - **Schedulers**: injected sleep primitive plus a cancellation token
//!
//! Position is kept in memory only. After a dead cursor or a transient
//! failure the tailer resumes strictly after the last delivered record, so
//! nothing is skipped or repeated as long as the feed still holds that
//! history.
//!
//! ## Example
//!
//! ```ignore
//! use oplog_tailer::{MemoryOplog, RecordInput, SinkError, Tailer, Record};
//!
//! let oplog = MemoryOplog::new();
//! let sink = |record: Record| -> Result<(), SinkError> {
//!     println!("{} {:?} {}", record.position, record.op, record.namespace);
//!     Ok(())
//! };
//!
//! // Starts from the current end of the feed, not from the beginning
//! let handle = Tailer::new(oplog.feed(), sink).spawn()?;
//!
//! oplog.append(RecordInput::insert("app.users", "u1", json!({"name": "ada"})));
//!
//! // Cancel, close the cursor and get the tailer back
//! let tailer = handle.stop()?;
//! ```

pub mod config;
pub mod error;
pub mod scheduler;
pub mod sink;
pub mod source;
pub mod tailer;
pub mod types;

// Re-exports
pub use config::{TailerConfig, DEFAULT_IDLE_DELAY, DEFAULT_RETRY_DELAY};
pub use error::{ErrorKind, Result, SinkError, SourceError, TailerError};
pub use scheduler::{CancellationToken, Scheduler, ThreadScheduler, VirtualScheduler, Wake};
pub use sink::{ChannelSink, Sink};
pub use source::{ChangeFeedSource, CursorHandle, FeedFilter, MemoryCursor, MemoryFeed, MemoryOplog};
pub use tailer::{
    Continuation, Tailer, TailerHandle, TailerMetrics, TailerPhase, TailerState, TailerStats,
};
pub use types::*;
