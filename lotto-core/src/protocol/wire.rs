//! Tagged, length-prefixed primitive values.
//!
//! Every value on the wire is `[tag: u8][len: u8][len bytes]`. Strings carry
//! UTF-8 bytes, unsigned integers always carry exactly eight big-endian bytes.

use crate::error::{LotteryError, Result};

pub const TAG_STRING: u8 = 0;
pub const TAG_U64: u8 = 1;

/// Length byte of an encoded `u64`.
pub const U64_LEN: u8 = 8;

/// Size of a framed `u64` on the wire: tag, length and eight payload bytes.
pub const FRAMED_U64_SIZE: usize = 2 + U64_LEN as usize;

/// Longest string payload expressible with a one-byte length.
pub const MAX_STRING_LEN: usize = u8::MAX as usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireValue {
    Str(String),
    U64(u64),
}

impl WireValue {
    pub fn encode_into(&self, out: &mut Vec<u8>) -> Result<()> {
        match self {
            WireValue::Str(s) => put_string(out, s),
            WireValue::U64(v) => {
                put_u64(out, *v);
                Ok(())
            }
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.encode_into(&mut out)?;
        Ok(out)
    }

    /// Decode whichever kind the leading tag announces.
    pub fn decode(buf: &[u8]) -> Result<(WireValue, &[u8])> {
        match buf.first() {
            Some(&TAG_STRING) => decode_string(buf).map(|(s, rest)| (WireValue::Str(s), rest)),
            Some(&TAG_U64) => decode_u64(buf).map(|(v, rest)| (WireValue::U64(v), rest)),
            Some(tag) => Err(LotteryError::malformed(format!("unknown tag {}", tag))),
            None => Err(LotteryError::malformed("empty buffer")),
        }
    }
}

pub fn put_string(out: &mut Vec<u8>, s: &str) -> Result<()> {
    let bytes = s.as_bytes();
    if bytes.len() > MAX_STRING_LEN {
        return Err(LotteryError::malformed(format!(
            "string of {} bytes exceeds {} byte limit",
            bytes.len(),
            MAX_STRING_LEN
        )));
    }

    out.push(TAG_STRING);
    out.push(bytes.len() as u8);
    out.extend_from_slice(bytes);
    Ok(())
}

pub fn put_u64(out: &mut Vec<u8>, value: u64) {
    out.push(TAG_U64);
    out.push(U64_LEN);
    out.extend_from_slice(&value.to_be_bytes());
}

pub fn encode_string(s: &str) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(2 + s.len());
    put_string(&mut out, s)?;
    Ok(out)
}

pub fn encode_u64(value: u64) -> [u8; FRAMED_U64_SIZE] {
    let mut out = [0u8; FRAMED_U64_SIZE];
    out[0] = TAG_U64;
    out[1] = U64_LEN;
    out[2..].copy_from_slice(&value.to_be_bytes());
    out
}

fn split_header(buf: &[u8], expected_tag: u8) -> Result<(usize, &[u8])> {
    let [tag, len, rest @ ..] = buf else {
        return Err(LotteryError::malformed(format!(
            "need 2 header bytes, have {}",
            buf.len()
        )));
    };

    if *tag != expected_tag {
        return Err(LotteryError::malformed(format!(
            "expected tag {}, found {}",
            expected_tag, tag
        )));
    }

    let len = *len as usize;
    if rest.len() < len {
        return Err(LotteryError::malformed(format!(
            "declared length {} but only {} bytes remain",
            len,
            rest.len()
        )));
    }

    Ok((len, rest))
}

pub fn decode_string(buf: &[u8]) -> Result<(String, &[u8])> {
    let (len, rest) = split_header(buf, TAG_STRING)?;
    let (payload, rest) = rest.split_at(len);
    let s = std::str::from_utf8(payload)
        .map_err(|e| LotteryError::malformed(format!("invalid UTF-8 string: {}", e)))?;
    Ok((s.to_owned(), rest))
}

pub fn decode_u64(buf: &[u8]) -> Result<(u64, &[u8])> {
    let (len, rest) = split_header(buf, TAG_U64)?;
    if len != U64_LEN as usize {
        return Err(LotteryError::malformed(format!(
            "u64 length must be {}, found {}",
            U64_LEN, len
        )));
    }

    let (payload, rest) = rest.split_at(len);
    let mut raw = [0u8; 8];
    raw.copy_from_slice(payload);
    Ok((u64::from_be_bytes(raw), rest))
}
