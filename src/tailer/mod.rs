//! Tailing a change feed.
//!
//! A [`Tailer`] owns one cursor into a [`ChangeFeedSource`] and moves through
//! `Init -> Tailing <-> Recovering`:
//! - draining: a record was delivered, step again immediately
//! - idling: the cursor is exhausted, step again after the idle delay
//! - retrying: a fetch failed, step again after the retry delay
//! - recovering: the cursor died, reopen it after the last delivered position
//!
//! Each step returns exactly one [`Continuation`]. [`Tailer::run`] turns that
//! into a loop on an injected [`Scheduler`], checking a
//! [`CancellationToken`] before every step.
//!
//! # Example
//!
//! ```ignore
//! let oplog = MemoryOplog::new();
//! let (sink, records) = ChannelSink::unbounded();
//!
//! let handle = Tailer::new(oplog.feed(), sink).spawn()?;
//! oplog.append(RecordInput::insert("app.users", "u1", json!({"name": "ada"})));
//!
//! let record = records.recv()?;
//! let tailer = handle.stop()?;
//! ```
//!
//! [`ChangeFeedSource`]: crate::ChangeFeedSource
//! [`Scheduler`]: crate::Scheduler
//! [`CancellationToken`]: crate::CancellationToken

mod handle;
mod machine;
mod types;

pub use handle::TailerHandle;
pub use machine::Tailer;
pub use types::{Continuation, TailerMetrics, TailerPhase, TailerState, TailerStats};
