//! Exact-length reads and writes over stream sockets.
//!
//! A single `read`/`write` call on a socket may move fewer bytes than asked
//! for; these helpers keep going until the whole frame has been transferred.

use crate::error::{LotteryError, Result};
use std::io::{ErrorKind, Read, Write};

/// Read exactly `n` bytes. A zero-byte read before completion means the peer
/// closed the connection.
pub fn receive_exact<R: Read + ?Sized>(conn: &mut R, n: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; n];
    let mut filled = 0;

    while filled < n {
        match conn.read(&mut buf[filled..]) {
            Ok(0) => {
                return Err(LotteryError::closed(format!(
                    "peer closed after {} of {} bytes",
                    filled, n
                )))
            }
            Ok(read) => filled += read,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(LotteryError::closed(format!("read failed: {}", e))),
        }
    }

    Ok(buf)
}

/// Read a single byte.
pub fn receive_byte<R: Read + ?Sized>(conn: &mut R) -> Result<u8> {
    let buf = receive_exact(conn, 1)?;
    Ok(buf[0])
}

/// Write every byte of `bytes`, then flush.
pub fn send_all<W: Write + ?Sized>(conn: &mut W, bytes: &[u8]) -> Result<()> {
    let mut sent = 0;

    while sent < bytes.len() {
        match conn.write(&bytes[sent..]) {
            Ok(0) => {
                return Err(LotteryError::closed(format!(
                    "peer stopped accepting after {} of {} bytes",
                    sent,
                    bytes.len()
                )))
            }
            Ok(written) => sent += written,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(LotteryError::closed(format!("write failed: {}", e))),
        }
    }

    conn.flush()
        .map_err(|e| LotteryError::closed(format!("flush failed: {}", e)))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io;

    /// Source that hands out at most `chunk` bytes per read.
    pub(crate) struct Trickle {
        data: Vec<u8>,
        pos: usize,
        chunk: usize,
    }

    impl Trickle {
        pub(crate) fn new(data: Vec<u8>, chunk: usize) -> Self {
            Self { data, pos: 0, chunk }
        }
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let end = (self.pos + self.chunk.min(buf.len())).min(self.data.len());
            let n = end - self.pos;
            buf[..n].copy_from_slice(&self.data[self.pos..end]);
            self.pos = end;
            Ok(n)
        }
    }

    /// Sink that accepts at most `chunk` bytes per write.
    struct SlowSink {
        written: Vec<u8>,
        chunk: usize,
        interrupted_once: bool,
    }

    impl Write for SlowSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if !self.interrupted_once {
                self.interrupted_once = true;
                return Err(io::Error::from(ErrorKind::Interrupted));
            }
            let n = self.chunk.min(buf.len());
            self.written.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_receive_exact_assembles_chunks() {
        let data: Vec<u8> = (0u8..=40).collect();
        for chunk in 1..=3 {
            let mut src = Trickle::new(data.clone(), chunk);
            let first = receive_exact(&mut src, 17).unwrap();
            let second = receive_exact(&mut src, 24).unwrap();
            assert_eq!(first, data[..17]);
            assert_eq!(second, data[17..]);
        }
    }

    #[test]
    fn test_receive_exact_reports_early_close() {
        let mut src = Trickle::new(vec![1, 2, 3], 2);
        assert!(matches!(
            receive_exact(&mut src, 4),
            Err(LotteryError::ConnectionClosed(_))
        ));
    }

    #[test]
    fn test_receive_zero_bytes() {
        let mut src = Trickle::new(Vec::new(), 1);
        assert!(receive_exact(&mut src, 0).unwrap().is_empty());
    }

    #[test]
    fn test_send_all_handles_short_writes() {
        let mut sink = SlowSink {
            written: Vec::new(),
            chunk: 3,
            interrupted_once: false,
        };
        let payload: Vec<u8> = (0u8..20).collect();
        send_all(&mut sink, &payload).unwrap();
        assert_eq!(sink.written, payload);
    }

    #[test]
    fn test_send_all_zero_write_is_closed() {
        let mut full: &mut [u8] = &mut [];
        assert!(matches!(
            send_all(&mut full, &[1, 2]),
            Err(LotteryError::ConnectionClosed(_))
        ));
    }
}
