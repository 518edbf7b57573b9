//! Append-only log storage sink
//!
//! The durable store behind the logging channels is a platform collaborator:
//! it accepts fixed-size records per channel and may fail transiently. The
//! crate defines the [`LogSink`] surface it is driven through plus an
//! in-memory implementation used by tests and the host-side simulator.
//!
//! Appends are not assumed synchronous relative to the sink's durable write:
//! the sink may report [`SinkError::Busy`] while a previous append settles.

use std::collections::HashMap;

use crate::channels::ChannelId;
use crate::error::SinkError;

/// Opaque reference to an open logging session, issued by the sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionRef(pub u64);

/// Storage service for append-only telemetry channels
pub trait LogSink {
    /// Open a logging session for `channel`, accepting records of exactly
    /// `record_size` bytes.
    fn open(&mut self, channel: ChannelId, record_size: usize) -> Result<SessionRef, SinkError>;

    /// Append one record of exactly the session's record size.
    fn append(&mut self, session: SessionRef, record: &[u8]) -> Result<(), SinkError>;

    /// Flush and release the session. Best-effort; closing an already closed
    /// session is a no-op.
    fn close(&mut self, session: SessionRef);
}

#[derive(Debug)]
struct OpenSession {
    channel: ChannelId,
    record_size: usize,
}

/// In-memory sink keeping every appended record, for tests and simulation.
///
/// Supports injecting the transient failures a real store produces: a byte
/// capacity (appends beyond it report `Full`) and one-shot failure modes for
/// the next append or for opening a specific channel.
#[derive(Debug, Default)]
pub struct MemorySink {
    next_ref: u64,
    sessions: HashMap<u64, OpenSession>,
    records: HashMap<ChannelId, Vec<Vec<u8>>>,
    capacity_bytes: Option<usize>,
    stored_bytes: usize,
    fail_next_append: Option<SinkError>,
    reject_open: Option<(ChannelId, SinkError)>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap total stored bytes; appends past the cap report `Full`
    pub fn with_capacity(capacity_bytes: usize) -> Self {
        Self {
            capacity_bytes: Some(capacity_bytes),
            ..Self::default()
        }
    }

    /// Make the next append fail with `error`, once
    pub fn fail_next_append(&mut self, error: SinkError) {
        self.fail_next_append = Some(error);
    }

    /// Make any open of `channel` fail with `error`
    pub fn reject_open(&mut self, channel: ChannelId, error: SinkError) {
        self.reject_open = Some((channel, error));
    }

    /// Records appended to `channel`, in append order
    pub fn records(&self, channel: ChannelId) -> &[Vec<u8>] {
        self.records.get(&channel).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn record_count(&self, channel: ChannelId) -> usize {
        self.records(channel).len()
    }

    pub fn stored_bytes(&self) -> usize {
        self.stored_bytes
    }

    pub fn open_session_count(&self) -> usize {
        self.sessions.len()
    }
}

impl LogSink for MemorySink {
    fn open(&mut self, channel: ChannelId, record_size: usize) -> Result<SessionRef, SinkError> {
        if let Some((rejected, error)) = self.reject_open {
            if rejected == channel {
                return Err(error);
            }
        }
        if record_size == 0 {
            return Err(SinkError::InvalidParams);
        }
        self.next_ref += 1;
        self.sessions.insert(
            self.next_ref,
            OpenSession {
                channel,
                record_size,
            },
        );
        Ok(SessionRef(self.next_ref))
    }

    fn append(&mut self, session: SessionRef, record: &[u8]) -> Result<(), SinkError> {
        if let Some(error) = self.fail_next_append.take() {
            return Err(error);
        }
        let open = self.sessions.get(&session.0).ok_or(SinkError::NotFound)?;
        if record.len() != open.record_size {
            return Err(SinkError::InvalidParams);
        }
        if let Some(capacity) = self.capacity_bytes {
            if self.stored_bytes + record.len() > capacity {
                return Err(SinkError::Full);
            }
        }
        self.stored_bytes += record.len();
        self.records
            .entry(open.channel)
            .or_default()
            .push(record.to_vec());
        Ok(())
    }

    fn close(&mut self, session: SessionRef) {
        self.sessions.remove(&session.0);
    }
}
