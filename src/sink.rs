//! Record consumers.

use crate::error::SinkError;
use crate::types::Record;
use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};

/// Consumer invoked once per delivered record, in position order.
///
/// A returned error (or a panic) is logged by the tailer. The record is not
/// redelivered and tailing continues.
pub trait Sink {
    fn deliver(&mut self, record: Record) -> Result<(), SinkError>;
}

impl<F> Sink for F
where
    F: FnMut(Record) -> Result<(), SinkError>,
{
    fn deliver(&mut self, record: Record) -> Result<(), SinkError> {
        self(record)
    }
}

/// Sink that forwards records into a channel.
///
/// Never blocks: with a bounded channel, a record that does not fit is
/// reported as a delivery failure and dropped.
pub struct ChannelSink {
    sender: Sender<Record>,
}

impl ChannelSink {
    /// Channel holding at most `capacity` undelivered records.
    pub fn bounded(capacity: usize) -> (Self, Receiver<Record>) {
        let (sender, receiver) = bounded(capacity);
        (Self { sender }, receiver)
    }

    pub fn unbounded() -> (Self, Receiver<Record>) {
        let (sender, receiver) = unbounded();
        (Self { sender }, receiver)
    }
}

impl Sink for ChannelSink {
    fn deliver(&mut self, record: Record) -> Result<(), SinkError> {
        match self.sender.try_send(record) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(record)) => {
                Err(format!("receiver is full, dropped record {}", record.position).into())
            }
            Err(TrySendError::Disconnected(record)) => {
                Err(format!("receiver is gone, dropped record {}", record.position).into())
            }
        }
    }
}
