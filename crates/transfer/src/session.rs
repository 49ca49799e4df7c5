//! Per-connection transfer state.

use crate::error::TransferError;

/// Protocol phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingHeader,
    AwaitingAck,
    Streaming,
    AwaitingCompletion,
    Complete,
    Failed,
}

/// State of one transfer, owned by the driver running its connection.
#[derive(Debug)]
pub struct TransferSession {
    bytes_transferred: u64,
    expected_size: u64,
    phase: Phase,
}

impl TransferSession {
    /// Creates a session that has not yet seen a header.
    pub fn new() -> Self {
        Self {
            bytes_transferred: 0,
            expected_size: 0,
            phase: Phase::AwaitingHeader,
        }
    }

    /// Creates a session whose size is already known (sender side).
    pub fn with_expected(expected_size: u64) -> Self {
        Self {
            bytes_transferred: 0,
            expected_size,
            phase: Phase::AwaitingAck,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn bytes_transferred(&self) -> u64 {
        self.bytes_transferred
    }

    pub fn expected_size(&self) -> u64 {
        self.expected_size
    }

    /// Records the parsed header size and moves on to acknowledgment.
    pub fn header_received(&mut self, expected_size: u64) {
        self.expected_size = expected_size;
        self.phase = Phase::AwaitingAck;
    }

    pub fn advance(&mut self, phase: Phase) {
        self.phase = phase;
    }

    pub fn fail(&mut self) {
        self.phase = Phase::Failed;
    }

    /// Payload bytes still owed.
    pub fn remaining(&self) -> u64 {
        self.expected_size - self.bytes_transferred
    }

    /// Size of the next read: never more than what is still owed.
    pub fn next_read_len(&self, chunk_size: usize) -> usize {
        self.remaining().min(chunk_size as u64) as usize
    }

    pub fn is_complete(&self) -> bool {
        self.bytes_transferred == self.expected_size
    }

    /// Accounts for `n` payload bytes.
    ///
    /// Fails (and leaves the count untouched) if `n` would move past the
    /// declared size.
    pub fn record(&mut self, n: usize) -> Result<(), TransferError> {
        match self.bytes_transferred.checked_add(n as u64) {
            Some(total) if total <= self.expected_size => {
                self.bytes_transferred = total;
                Ok(())
            }
            _ => Err(TransferError::Protocol(format!(
                "{n} more bytes would exceed declared size {} ({} already moved)",
                self.expected_size, self.bytes_transferred
            ))),
        }
    }
}

impl Default for TransferSession {
    fn default() -> Self {
        Self::new()
    }
}
