//! Per-agency receive loop.
//!
//! ```text
//! AwaitingBatch --control=2--> Done
//!      |  ^
//!  other  |
//!      v  |
//!   Storing --ok/err--> Ack(stored) --> AwaitingBatch
//! ```

use crate::barrier::CompletionBarrier;
use lotto_core::protocol::{
    decode_batch, read_batch_size, receive_byte, receive_exact, send_all, Control, ACK_REJECTED,
    ACK_STORED,
};
use lotto_core::{AgencyId, BetStore, LotteryError, Result};
use std::io::{Read, Write};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    AwaitingBatch,
    Storing,
    Ack { stored: bool },
    Done,
}

/// Counters for one agency session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub batches_stored: usize,
    pub batches_rejected: usize,
    pub bets_stored: usize,
}

/// Drives agency sessions against the shared bet store and barrier.
#[derive(Clone)]
pub struct SessionHandler {
    store: Arc<dyn BetStore>,
    barrier: Arc<CompletionBarrier>,
    max_batch_bytes: u64,
}

impl SessionHandler {
    pub fn new(
        store: Arc<dyn BetStore>,
        barrier: Arc<CompletionBarrier>,
        max_batch_bytes: u64,
    ) -> Self {
        Self {
            store,
            barrier,
            max_batch_bytes,
        }
    }

    /// Run the batch loop until the agency signals end-of-session.
    ///
    /// On a clean end the barrier is notified and the connection is left
    /// open. Any error returned here ends the session without counting it
    /// as finished.
    pub fn run<C: Read + Write + ?Sized>(
        &self,
        agency: AgencyId,
        conn: &mut C,
    ) -> Result<SessionStats> {
        let mut stats = SessionStats::default();
        let mut state = SessionState::AwaitingBatch;

        loop {
            state = match state {
                SessionState::AwaitingBatch => match Control::from_byte(receive_byte(conn)?) {
                    Control::End => SessionState::Done,
                    Control::Batch => SessionState::Storing,
                },

                SessionState::Storing => {
                    // header errors are never recoverable, even malformed ones
                    let size = self.read_batch_header(agency, conn)?;
                    let stored = match self.ingest_batch(agency, conn, size) {
                        Ok(count) => {
                            stats.batches_stored += 1;
                            stats.bets_stored += count;
                            true
                        }
                        Err(e) if e.is_recoverable() => {
                            stats.batches_rejected += 1;
                            tracing::warn!("Agency {} batch rejected: {}", agency, e);
                            false
                        }
                        Err(e) => return Err(e),
                    };
                    SessionState::Ack { stored }
                }

                SessionState::Ack { stored } => {
                    let ack = if stored { ACK_STORED } else { ACK_REJECTED };
                    send_all(conn, &[ack])?;
                    SessionState::AwaitingBatch
                }

                SessionState::Done => {
                    let finished = self.barrier.arrive(agency);
                    tracing::info!(
                        "Agency {} finished: {} bets in {} batches ({} rejected), {}/{} agencies done",
                        agency,
                        stats.bets_stored,
                        stats.batches_stored,
                        stats.batches_rejected,
                        finished,
                        self.barrier.expected()
                    );
                    return Ok(stats);
                }
            };
        }
    }

    /// Read the ten-byte batch sub-header. A header that cannot be trusted
    /// is rejected and its error returned as is; the caller ends the session
    /// since the payload boundary is lost.
    fn read_batch_header<C: Read + Write + ?Sized>(
        &self,
        agency: AgencyId,
        conn: &mut C,
    ) -> Result<u64> {
        let err = match read_batch_size(conn) {
            Ok(size) if size <= self.max_batch_bytes => return Ok(size),
            Ok(size) => LotteryError::FrameTooLarge {
                size,
                limit: self.max_batch_bytes,
            },
            Err(e @ LotteryError::MalformedFrame(_)) => e,
            Err(e) => return Err(e),
        };

        tracing::warn!(
            "Agency {} sent an unusable batch header, ending session: {}",
            agency,
            err
        );
        if let Err(e) = send_all(conn, &[ACK_REJECTED]) {
            tracing::debug!("Agency {} reject ack not delivered: {}", agency, e);
        }
        Err(err)
    }

    /// Read, decode and persist one batch payload. Returns the number of
    /// stored bets.
    fn ingest_batch<C: Read + ?Sized>(
        &self,
        agency: AgencyId,
        conn: &mut C,
        size: u64,
    ) -> Result<usize> {
        let payload = receive_exact(conn, size as usize)?;
        let bets = decode_batch(&payload)?;

        self.barrier.record_batch(|| {
            self.store
                .store_bets(&bets)
                .map(|()| bets.len())
                .map_err(|e| LotteryError::persistence(e.to_string()))
        })?;

        tracing::info!("Agency {} stored batch of {} bets", agency, bets.len());
        Ok(bets.len())
    }
}
