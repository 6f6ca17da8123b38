//! Agency <-> server wire protocol.
//!
//! All integers are big-endian. A session looks like:
//!
//! ```text
//! client: [handshake: string frame with the agency id digits]
//! client: [CONTROL_BATCH][u64 frame: payload size][records]   server: [ACK_*]
//! ...
//! client: [CONTROL_END]
//! server: [winner package]                                    (once per round)
//! ```

pub mod bet_codec;
pub mod transport;
pub mod wire;

pub use bet_codec::{
    decode_batch, decode_bet, decode_package_head, decode_winner_package, encode_batch,
    encode_bet, encode_winner_package, PACKAGE_HEAD_SIZE,
};
pub use transport::{receive_byte, receive_exact, send_all};

use crate::error::{LotteryError, Result};
use crate::types::{AgencyId, Bet};
use std::io::{Read, Write};

pub const CONTROL_BATCH: u8 = 1;
pub const CONTROL_END: u8 = 2;

pub const ACK_STORED: u8 = 1;
pub const ACK_REJECTED: u8 = 2;

/// Control byte sent ahead of each batch or at end of session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Batch,
    End,
}

impl Control {
    /// Anything other than the end marker announces a batch.
    pub fn from_byte(byte: u8) -> Self {
        if byte == CONTROL_END {
            Control::End
        } else {
            Control::Batch
        }
    }
}

/// Read the agency handshake: one string frame holding ASCII digits.
pub fn read_handshake<R: Read + ?Sized>(conn: &mut R) -> Result<AgencyId> {
    let head = receive_exact(conn, 2)?;
    if head[0] != wire::TAG_STRING {
        return Err(LotteryError::handshake(format!(
            "expected string tag, found {}",
            head[0]
        )));
    }

    let body = receive_exact(conn, head[1] as usize)?;
    let raw = std::str::from_utf8(&body)
        .map_err(|e| LotteryError::handshake(format!("agency id is not UTF-8: {}", e)))?;
    AgencyId::parse(raw)
}

pub fn write_handshake<W: Write + ?Sized>(conn: &mut W, agency: AgencyId) -> Result<()> {
    let frame = wire::encode_string(&agency.to_string())?;
    send_all(conn, &frame)
}

/// Read the fixed ten-byte batch sub-header and return the payload size.
pub fn read_batch_size<R: Read + ?Sized>(conn: &mut R) -> Result<u64> {
    let header = receive_exact(conn, wire::FRAMED_U64_SIZE)?;
    let (size, _) = wire::decode_u64(&header)?;
    Ok(size)
}

/// Read one winner package from `conn`. A declared payload larger than
/// `limit` is refused before anything is allocated for it.
pub fn read_winner_package<R: Read + ?Sized>(conn: &mut R, limit: u64) -> Result<Vec<Bet>> {
    let head = receive_exact(conn, PACKAGE_HEAD_SIZE)?;
    let size = decode_package_head(&head)?;
    if size > limit {
        return Err(LotteryError::FrameTooLarge { size, limit });
    }

    let size = usize::try_from(size)
        .map_err(|_| LotteryError::malformed(format!("package size {} too large", size)))?;
    let payload = receive_exact(conn, size)?;
    decode_batch(&payload)
}

/// Build a complete batch message: control byte, framed size, records.
pub fn encode_batch_message(records: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + wire::FRAMED_U64_SIZE + records.len());
    out.push(CONTROL_BATCH);
    out.extend_from_slice(&wire::encode_u64(records.len() as u64));
    out.extend_from_slice(records);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_handshake_round_trip() {
        let mut buf = Vec::new();
        write_handshake(&mut buf, AgencyId(3)).unwrap();
        assert_eq!(buf, vec![wire::TAG_STRING, 1, b'3']);

        let agency = read_handshake(&mut Cursor::new(buf)).unwrap();
        assert_eq!(agency, AgencyId(3));
    }

    #[test]
    fn test_handshake_rejects_non_digits() {
        let frame = wire::encode_string("ab").unwrap();
        assert!(matches!(
            read_handshake(&mut Cursor::new(frame)),
            Err(LotteryError::InvalidHandshake(_))
        ));
    }

    #[test]
    fn test_control_byte() {
        assert_eq!(Control::from_byte(CONTROL_END), Control::End);
        assert_eq!(Control::from_byte(CONTROL_BATCH), Control::Batch);
        assert_eq!(Control::from_byte(7), Control::Batch);
    }

    #[test]
    fn test_winner_package_over_limit_is_refused() {
        let winners = vec![Bet::new("3", "Ana", "Gomez", "30904465", "1999-03-17", 7574)];
        let package = encode_winner_package(&winners).unwrap();

        let read = read_winner_package(&mut Cursor::new(package.clone()), 1024).unwrap();
        assert_eq!(read, winners);

        let mut huge = vec![0u8];
        huge.extend_from_slice(&wire::encode_u64(u64::MAX));
        assert!(matches!(
            read_winner_package(&mut Cursor::new(huge), 1024),
            Err(LotteryError::FrameTooLarge {
                size: u64::MAX,
                limit: 1024
            })
        ));

        let limit = (package.len() - PACKAGE_HEAD_SIZE - 1) as u64;
        assert!(read_winner_package(&mut Cursor::new(package), limit).is_err());
    }

    #[test]
    fn test_batch_message_header() {
        let message = encode_batch_message(&[9, 9, 9]);
        let mut cursor = Cursor::new(&message[1..]);
        assert_eq!(message[0], CONTROL_BATCH);
        assert_eq!(read_batch_size(&mut cursor).unwrap(), 3);
    }
}
