//! Agency side of the protocol.

use crate::error::{LotteryError, Result};
use crate::protocol::{
    self, encode_batch, read_winner_package, receive_byte, send_all, ACK_REJECTED, ACK_STORED,
    CONTROL_END,
};
use crate::types::{AgencyId, Bet};
use std::net::{TcpStream, ToSocketAddrs};

/// Largest winner package payload a client accepts unless configured
/// otherwise.
pub const DEFAULT_MAX_PACKAGE_BYTES: u64 = 64 * 1024 * 1024; // 64 MiB

/// Outcome of submitting a whole bet list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitSummary {
    pub batches_sent: usize,
    pub batches_rejected: usize,
    pub bets_stored: usize,
}

pub struct AgencyClient {
    agency: AgencyId,
    stream: TcpStream,
    max_package_bytes: u64,
}

impl AgencyClient {
    /// Connect and identify as `agency`.
    pub fn connect<A: ToSocketAddrs>(addr: A, agency: AgencyId) -> Result<Self> {
        let mut stream = TcpStream::connect(addr)?;
        protocol::write_handshake(&mut stream, agency)?;

        tracing::debug!("Agency {} connected to {:?}", agency, stream.peer_addr());
        Ok(Self {
            agency,
            stream,
            max_package_bytes: DEFAULT_MAX_PACKAGE_BYTES,
        })
    }

    /// Refuse winner packages whose payload is larger than `limit` bytes.
    pub fn with_max_package_bytes(mut self, limit: u64) -> Self {
        self.max_package_bytes = limit;
        self
    }

    pub fn agency(&self) -> AgencyId {
        self.agency
    }

    /// Send one batch and wait for its ack. Returns `true` when the server
    /// stored it.
    pub fn send_batch(&mut self, bets: &[Bet]) -> Result<bool> {
        let records = encode_batch(bets)?;
        self.send_raw_batch(&records)
    }

    /// Send an already encoded record payload as one batch.
    pub fn send_raw_batch(&mut self, records: &[u8]) -> Result<bool> {
        send_all(&mut self.stream, &protocol::encode_batch_message(records))?;

        match receive_byte(&mut self.stream)? {
            ACK_STORED => Ok(true),
            ACK_REJECTED => Ok(false),
            other => Err(LotteryError::malformed(format!("unexpected ack {}", other))),
        }
    }

    /// Send `bets` in batches of at most `batch_size` bets.
    pub fn submit_all(&mut self, bets: &[Bet], batch_size: usize) -> Result<SubmitSummary> {
        let mut summary = SubmitSummary::default();

        for chunk in bets.chunks(batch_size.max(1)) {
            summary.batches_sent += 1;
            if self.send_batch(chunk)? {
                summary.bets_stored += chunk.len();
            } else {
                summary.batches_rejected += 1;
                tracing::warn!(
                    "Agency {} batch {} of {} bets was rejected",
                    self.agency,
                    summary.batches_sent,
                    chunk.len()
                );
            }
        }

        Ok(summary)
    }

    /// Signal that no more batches follow.
    pub fn finish(&mut self) -> Result<()> {
        send_all(&mut self.stream, &[CONTROL_END])
    }

    /// Block until the winner package for this round arrives.
    pub fn receive_winners(&mut self) -> Result<Vec<Bet>> {
        read_winner_package(&mut self.stream, self.max_package_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{read_handshake, wire};
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn test_oversized_winner_package_is_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let agency = read_handshake(&mut stream).unwrap();

            let mut head = vec![0u8];
            head.extend_from_slice(&wire::encode_u64(1 << 40));
            send_all(&mut stream, &head).unwrap();
            agency
        });

        let mut client = AgencyClient::connect(addr, AgencyId(6))
            .unwrap()
            .with_max_package_bytes(4096);
        assert!(matches!(
            client.receive_winners(),
            Err(LotteryError::FrameTooLarge {
                size: 1099511627776,
                limit: 4096
            })
        ));
        assert_eq!(server.join().unwrap(), AgencyId(6));
    }
}
