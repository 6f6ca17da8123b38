//! Whole-record and whole-batch encoding of [`Bet`]s.
//!
//! ```text
//! record  = [indicator = 0][len: u8][agency][first][last][document][birthdate][number]
//! batch   = record*                    (decoded until the buffer is exhausted)
//! package = [header = 0][u64 frame: total size][record*]
//! ```
//!
//! `len` counts the bytes after the two record header bytes.

use crate::error::{LotteryError, Result};
use crate::protocol::wire::{self, FRAMED_U64_SIZE};
use crate::types::Bet;

pub const RECORD_INDICATOR: u8 = 0;
pub const PACKAGE_HEADER: u8 = 0;

/// Size of the package head: header byte plus framed size.
pub const PACKAGE_HEAD_SIZE: usize = 1 + FRAMED_U64_SIZE;

/// Largest field payload a record length byte can describe.
pub const MAX_RECORD_LEN: usize = u8::MAX as usize;

pub fn encode_bet_into(out: &mut Vec<u8>, bet: &Bet) -> Result<()> {
    let mut body = Vec::with_capacity(64);
    wire::put_string(&mut body, &bet.agency)?;
    wire::put_string(&mut body, &bet.first_name)?;
    wire::put_string(&mut body, &bet.last_name)?;
    wire::put_string(&mut body, &bet.document)?;
    wire::put_string(&mut body, &bet.birthdate)?;
    wire::put_u64(&mut body, bet.number);

    if body.len() > MAX_RECORD_LEN {
        return Err(LotteryError::malformed(format!(
            "bet record of {} bytes exceeds {} byte limit",
            body.len(),
            MAX_RECORD_LEN
        )));
    }

    out.push(RECORD_INDICATOR);
    out.push(body.len() as u8);
    out.extend_from_slice(&body);
    Ok(())
}

pub fn encode_bet(bet: &Bet) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    encode_bet_into(&mut out, bet)?;
    Ok(out)
}

/// Decode one record from the front of `buf`.
pub fn decode_bet(buf: &[u8]) -> Result<(Bet, &[u8])> {
    let [indicator, len, rest @ ..] = buf else {
        return Err(LotteryError::malformed(format!(
            "bet record header needs 2 bytes, have {}",
            buf.len()
        )));
    };

    if *indicator != RECORD_INDICATOR {
        return Err(LotteryError::malformed(format!(
            "unexpected record indicator {}",
            indicator
        )));
    }

    let len = *len as usize;
    if rest.len() < len {
        return Err(LotteryError::malformed(format!(
            "record declares {} bytes but only {} remain",
            len,
            rest.len()
        )));
    }
    let (record, remaining) = rest.split_at(len);

    let (agency, r) = wire::decode_string(record)?;
    let (first_name, r) = wire::decode_string(r)?;
    let (last_name, r) = wire::decode_string(r)?;
    let (document, r) = wire::decode_string(r)?;
    let (birthdate, r) = wire::decode_string(r)?;
    let (number, r) = wire::decode_u64(r)?;

    if !r.is_empty() {
        return Err(LotteryError::malformed(format!(
            "{} trailing bytes inside bet record",
            r.len()
        )));
    }

    let bet = Bet {
        agency,
        first_name,
        last_name,
        document,
        birthdate,
        number,
    };
    Ok((bet, remaining))
}

pub fn encode_batch(bets: &[Bet]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(bets.len() * 64);
    for bet in bets {
        encode_bet_into(&mut out, bet)?;
    }
    Ok(out)
}

/// Decode records until `buf` is exhausted. Any bad record fails the batch.
pub fn decode_batch(mut buf: &[u8]) -> Result<Vec<Bet>> {
    let mut bets = Vec::new();
    while !buf.is_empty() {
        let (bet, rest) = decode_bet(buf)?;
        bets.push(bet);
        buf = rest;
    }
    Ok(bets)
}

/// Build the winner package pushed to one agency at the end of a round.
pub fn encode_winner_package(winners: &[Bet]) -> Result<Vec<u8>> {
    let records = encode_batch(winners)?;

    let mut out = Vec::with_capacity(1 + FRAMED_U64_SIZE + records.len());
    out.push(PACKAGE_HEADER);
    out.extend_from_slice(&wire::encode_u64(records.len() as u64));
    out.extend_from_slice(&records);
    Ok(out)
}

/// Parse the fixed-size head of a winner package and return the size of the
/// record payload that follows it.
pub fn decode_package_head(head: &[u8]) -> Result<u64> {
    let [header, frame @ ..] = head else {
        return Err(LotteryError::malformed("empty winner package"));
    };
    if *header != PACKAGE_HEADER {
        return Err(LotteryError::malformed(format!(
            "unexpected package header {}",
            header
        )));
    }

    let (size, rest) = wire::decode_u64(frame)?;
    if !rest.is_empty() {
        return Err(LotteryError::malformed("trailing bytes in package head"));
    }
    Ok(size)
}

/// Decode a complete winner package held in memory.
pub fn decode_winner_package(package: &[u8]) -> Result<Vec<Bet>> {
    if package.len() < PACKAGE_HEAD_SIZE {
        return Err(LotteryError::malformed(format!(
            "winner package needs {} head bytes, have {}",
            PACKAGE_HEAD_SIZE,
            package.len()
        )));
    }

    let (head, records) = package.split_at(PACKAGE_HEAD_SIZE);
    let size = decode_package_head(head)?;
    if size != records.len() as u64 {
        return Err(LotteryError::malformed(format!(
            "package declares {} record bytes, carries {}",
            size,
            records.len()
        )));
    }

    decode_batch(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::wire::TAG_U64;

    fn sample(agency: &str, number: u64) -> Bet {
        Bet::new(agency, "Santiago Lionel", "Lorca", "30904465", "1999-03-17", number)
    }

    #[test]
    fn test_bet_round_trip_is_byte_identical() {
        let bet = sample("3", 7574);
        let encoded = encode_bet(&bet).unwrap();
        assert_eq!(encoded[0], RECORD_INDICATOR);
        assert_eq!(encoded[1] as usize, encoded.len() - 2);

        let (decoded, rest) = decode_bet(&encoded).unwrap();
        assert!(rest.is_empty());
        assert_eq!(decoded, bet);
        assert_eq!(encode_bet(&decoded).unwrap(), encoded);
    }

    #[test]
    fn test_round_trip_edge_values() {
        let bet = Bet::new("", "ñandú", "", "", "", (1u64 << 63) - 1);
        let (decoded, _) = decode_bet(&encode_bet(&bet).unwrap()).unwrap();
        assert_eq!(decoded, bet);

        let bet = sample("12", 0);
        let (decoded, _) = decode_bet(&encode_bet(&bet).unwrap()).unwrap();
        assert_eq!(decoded, bet);
    }

    #[test]
    fn test_batch_preserves_order() {
        let bets: Vec<Bet> = (0..25).map(|i| sample(&(i % 4).to_string(), i)).collect();
        let encoded = encode_batch(&bets).unwrap();
        assert_eq!(decode_batch(&encoded).unwrap(), bets);
    }

    #[test]
    fn test_empty_batch() {
        assert!(decode_batch(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_string_field_with_integer_tag_fails() {
        let mut encoded = encode_bet(&sample("3", 1)).unwrap();
        // first field tag sits right after the record header
        encoded[2] = TAG_U64;
        assert!(matches!(
            decode_bet(&encoded),
            Err(LotteryError::MalformedFrame(_))
        ));
    }

    #[test]
    fn test_record_length_must_match_fields() {
        let mut encoded = encode_bet(&sample("3", 1)).unwrap();
        encoded[1] -= 1;
        assert!(decode_bet(&encoded).is_err());

        let mut padded = encode_bet(&sample("3", 1)).unwrap();
        padded[1] += 1;
        padded.push(0);
        assert!(decode_bet(&padded).is_err());
    }

    #[test]
    fn test_truncated_batch_fails() {
        let encoded = encode_batch(&[sample("1", 1), sample("1", 2)]).unwrap();
        assert!(decode_batch(&encoded[..encoded.len() - 3]).is_err());
    }

    #[test]
    fn test_oversized_record_rejected() {
        let mut bet = sample("3", 1);
        bet.first_name = "x".repeat(200);
        bet.last_name = "y".repeat(60);
        assert!(encode_bet(&bet).is_err());
    }

    #[test]
    fn test_winner_package_layout() {
        let winners = vec![sample("3", 7574)];
        let package = encode_winner_package(&winners).unwrap();
        let record = encode_bet(&winners[0]).unwrap();

        assert_eq!(package[0], PACKAGE_HEADER);
        let size = decode_package_head(&package[..PACKAGE_HEAD_SIZE]).unwrap();
        assert_eq!(size as usize, record.len());
        assert_eq!(&package[PACKAGE_HEAD_SIZE..], record.as_slice());
    }

    #[test]
    fn test_empty_winner_package() {
        let package = encode_winner_package(&[]).unwrap();
        assert_eq!(package.len(), PACKAGE_HEAD_SIZE);
        assert_eq!(decode_package_head(&package).unwrap(), 0);
        assert!(decode_winner_package(&package).unwrap().is_empty());
    }

    #[test]
    fn test_winner_package_size_mismatch() {
        let winners = vec![sample("3", 7574), sample("3", 7574)];
        let package = encode_winner_package(&winners).unwrap();
        assert_eq!(decode_winner_package(&package).unwrap(), winners);

        assert!(decode_winner_package(&package[..package.len() - 1]).is_err());
        assert!(decode_winner_package(&package[..4]).is_err());
    }
}
