//! Transaction id bookkeeping.
//!
//! Every request carries a 16 bit transaction id that the server echoes.
//! Only one request per connection is outstanding at a time, responses
//! for any other id are stale and get dropped.

use crate::{
    error::ModbusError,
    frame::{Header, TransactionId, UnitId},
};

/// Outcome of matching a response header against the outstanding request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Correlation {
    /// The response answers the outstanding request.
    Matched,
    /// The response belongs to another (e.g. timed out) request and must
    /// be dropped while waiting goes on.
    Discard,
}

#[derive(Debug, Clone)]
pub struct TransactionTracker {
    next_id: TransactionId,
    outstanding: Option<Header>,
}

impl TransactionTracker {
    /// The first request is sent with transaction id `1`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next_id: 1,
            outstanding: None,
        }
    }

    /// Allocate the next transaction id.
    ///
    /// Ids increase monotonically and wrap around at `u16::MAX`.
    /// The id of the outstanding request is never handed out twice.
    pub fn next_id(&mut self) -> TransactionId {
        let mut id = self.next_id;
        if self.outstanding.is_some_and(|hdr| hdr.transaction_id == id) {
            id = id.wrapping_add(1);
        }
        self.next_id = id.wrapping_add(1);
        id
    }

    /// Register a new outstanding request for `unit_id`.
    pub fn begin(&mut self, unit_id: UnitId) -> Header {
        let hdr = Header {
            transaction_id: self.next_id(),
            unit_id,
        };
        if let Some(prev) = self.outstanding.replace(hdr) {
            log::warn!(
                "Abandoning transaction {} without response",
                prev.transaction_id
            );
        }
        hdr
    }

    /// Match a received header against the outstanding request.
    ///
    /// A foreign transaction id is [`Correlation::Discard`]. A matching
    /// transaction id from another unit fails with
    /// [`ModbusError::BadSlaveId`].
    pub fn correlate(&self, rsp: Header) -> Result<Correlation, ModbusError> {
        let Some(req) = self.outstanding else {
            return Ok(Correlation::Discard);
        };
        if req.transaction_id != rsp.transaction_id {
            return Ok(Correlation::Discard);
        }
        if req.unit_id != rsp.unit_id {
            return Err(ModbusError::BadSlaveId);
        }
        Ok(Correlation::Matched)
    }

    /// Close the outstanding request, whatever its outcome.
    pub fn finish(&mut self) -> Option<Header> {
        self.outstanding.take()
    }

    #[must_use]
    pub const fn outstanding(&self) -> Option<Header> {
        self.outstanding
    }
}

impl Default for TransactionTracker {
    fn default() -> Self {
        Self::new()
    }
}
