//! Variable-length integer encodings.
//!
//! Two families live here:
//!
//! - Standard unsigned LEB128 (`var_u32`/`var_u64`): 7 data bits per byte,
//!   continuation in the high bit. Used for length prefixes and for signed
//!   values in passthrough mode.
//! - Compact signed (`var_i32`/`var_i64`): negative values are folded with
//!   `!v` and the sign travels in bit 6 of the terminal byte, so small
//!   negative numbers cost as little as small positive ones.
//!
//! Compact signed byte counts for `i32`, by folded magnitude `m`:
//!
//! ```text
//! m < 2^6   -> 1 byte      m < 2^20 -> 3 bytes
//! m < 2^13  -> 2 bytes     m < 2^27 -> 4 bytes
//!                          otherwise -> 5 bytes
//! ```

use crate::buf::NetBuf;
use crate::error::{BufError, Result};

const CONTINUE: u8 = 0x80;
const SIGN: u8 = 0x40;

/// Maximum encoded width of a 32-bit varint.
pub const MAX_VAR_INT_BYTES: usize = 5;

/// Maximum encoded width of a 64-bit varint.
pub const MAX_VAR_LONG_BYTES: usize = 10;

/// Number of bytes [`NetBuf::write_var_i32`] emits for `value` outside
/// passthrough mode.
pub fn var_i32_len(value: i32) -> usize {
    let mut magnitude = fold(value as i64) as u64;
    let mut len = 1;
    while magnitude & !0x3f != 0 {
        magnitude >>= 7;
        len += 1;
    }
    len
}

fn fold(value: i64) -> i64 {
    if value < 0 {
        !value
    } else {
        value
    }
}

impl NetBuf {
    /// Write a standard unsigned LEB128 varint.
    pub fn write_var_u32(&mut self, value: u32) {
        self.write_var_u64(value as u64);
    }

    /// Read a standard unsigned LEB128 varint.
    pub fn read_var_u32(&mut self) -> Result<u32> {
        let mut value: u32 = 0;
        for i in 0..MAX_VAR_INT_BYTES {
            let byte = self.read_u8()?;
            let bits = (byte & 0x7f) as u32;
            if i == MAX_VAR_INT_BYTES - 1 && bits > 0x0f {
                return Err(BufError::VarIntOverflow);
            }
            value |= bits << (7 * i);
            if byte & CONTINUE == 0 {
                return Ok(value);
            }
        }
        Err(BufError::VarIntTooLong {
            max_bytes: MAX_VAR_INT_BYTES,
        })
    }

    /// Write a standard unsigned LEB128 varint.
    pub fn write_var_u64(&mut self, mut value: u64) {
        while value & !0x7f != 0 {
            self.write_u8(CONTINUE | (value & 0x7f) as u8);
            value >>= 7;
        }
        self.write_u8(value as u8);
    }

    /// Read a standard unsigned LEB128 varint.
    pub fn read_var_u64(&mut self) -> Result<u64> {
        let mut value: u64 = 0;
        for i in 0..MAX_VAR_LONG_BYTES {
            let byte = self.read_u8()?;
            let bits = (byte & 0x7f) as u64;
            if i == MAX_VAR_LONG_BYTES - 1 && bits > 0x01 {
                return Err(BufError::VarIntOverflow);
            }
            value |= bits << (7 * i);
            if byte & CONTINUE == 0 {
                return Ok(value);
            }
        }
        Err(BufError::VarIntTooLong {
            max_bytes: MAX_VAR_LONG_BYTES,
        })
    }

    /// Write a signed 32-bit varint.
    ///
    /// Produces 1-5 bytes. In passthrough mode this is a plain LEB128 of the
    /// two's-complement bits, which is always 5 bytes for negatives.
    pub fn write_var_i32(&mut self, value: i32) {
        if self.config.passthrough {
            self.write_var_u32(value as u32);
            return;
        }
        self.write_compact(value as i64);
    }

    /// Read a signed 32-bit varint.
    pub fn read_var_i32(&mut self) -> Result<i32> {
        if self.config.passthrough {
            return self.read_var_u32().map(|v| v as i32);
        }
        let (magnitude, negative) = self.read_compact(MAX_VAR_INT_BYTES)?;
        if magnitude > i32::MAX as u128 {
            return Err(BufError::VarIntOverflow);
        }
        let magnitude = magnitude as i32;
        Ok(if negative { !magnitude } else { magnitude })
    }

    /// Write a signed 64-bit varint. Produces 1-10 bytes.
    pub fn write_var_i64(&mut self, value: i64) {
        if self.config.passthrough {
            self.write_var_u64(value as u64);
            return;
        }
        self.write_compact(value);
    }

    /// Read a signed 64-bit varint.
    pub fn read_var_i64(&mut self) -> Result<i64> {
        if self.config.passthrough {
            return self.read_var_u64().map(|v| v as i64);
        }
        let (magnitude, negative) = self.read_compact(MAX_VAR_LONG_BYTES)?;
        if magnitude > i64::MAX as u128 {
            return Err(BufError::VarIntOverflow);
        }
        let magnitude = magnitude as i64;
        Ok(if negative { !magnitude } else { magnitude })
    }

    fn write_compact(&mut self, value: i64) {
        let sign = if value < 0 { SIGN } else { 0 };
        let mut magnitude = fold(value) as u64;
        while magnitude & !0x3f != 0 {
            self.write_u8(CONTINUE | (magnitude & 0x7f) as u8);
            magnitude >>= 7;
        }
        self.write_u8(sign | magnitude as u8);
    }

    /// Returns the folded magnitude and whether the sign bit was set.
    fn read_compact(&mut self, max_bytes: usize) -> Result<(u128, bool)> {
        let mut magnitude: u128 = 0;
        for i in 0..max_bytes {
            let byte = self.read_u8()?;
            let shift = 7 * i as u32;
            if byte & CONTINUE == 0 {
                magnitude |= ((byte & 0x3f) as u128) << shift;
                return Ok((magnitude, byte & SIGN != 0));
            }
            magnitude |= ((byte & 0x7f) as u128) << shift;
        }
        Err(BufError::VarIntTooLong { max_bytes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(value: i32) -> Vec<u8> {
        let mut buf = NetBuf::new();
        buf.write_var_i32(value);
        buf.as_slice().to_vec()
    }

    #[test]
    fn compact_roundtrip_edges() {
        for value in [
            0,
            1,
            -1,
            63,
            64,
            -64,
            -65,
            8191,
            8192,
            1 << 20,
            -(1 << 27),
            i32::MAX,
            i32::MIN,
        ] {
            let mut buf = NetBuf::new();
            buf.write_var_i32(value);
            assert_eq!(buf.len(), var_i32_len(value), "length of {value}");
            assert_eq!(buf.read_var_i32().unwrap(), value);
            assert_eq!(buf.readable_bytes(), 0);
        }
    }

    #[test]
    fn byte_count_table() {
        assert_eq!(encoded(0).len(), 1);
        assert_eq!(encoded(63).len(), 1);
        assert_eq!(encoded(-64).len(), 1);
        assert_eq!(encoded(64).len(), 2);
        assert_eq!(encoded(-65).len(), 2);
        assert_eq!(encoded((1 << 13) - 1).len(), 2);
        assert_eq!(encoded(1 << 13).len(), 3);
        assert_eq!(encoded((1 << 20) - 1).len(), 3);
        assert_eq!(encoded(1 << 20).len(), 4);
        assert_eq!(encoded((1 << 27) - 1).len(), 4);
        assert_eq!(encoded(1 << 27).len(), 5);
        assert_eq!(encoded(i32::MIN).len(), 5);
    }

    #[test]
    fn sign_lives_in_bit_six_of_terminal_byte() {
        assert_eq!(encoded(-1), vec![0x40]);
        assert_eq!(encoded(5), vec![0x05]);
        assert_eq!(encoded(64), vec![0xC0, 0x00]);
        assert_eq!(encoded(-65), vec![0xC0, 0x40]);
    }

    #[test]
    fn passthrough_uses_plain_leb128() {
        let mut buf = NetBuf::passthrough();
        buf.write_var_i32(-1);
        assert_eq!(buf.as_slice(), &[0xFF, 0xFF, 0xFF, 0xFF, 0x0F]);
        assert_eq!(buf.read_var_i32().unwrap(), -1);

        let mut buf = NetBuf::passthrough();
        buf.write_var_i32(300);
        assert_eq!(buf.as_slice(), &[0xAC, 0x02]);
    }

    #[test]
    fn compact_i64_roundtrip_edges() {
        for value in [0i64, -1, 1 << 40, -(1 << 40), i64::MAX, i64::MIN] {
            let mut buf = NetBuf::new();
            buf.write_var_i64(value);
            assert!(buf.len() <= MAX_VAR_LONG_BYTES);
            assert_eq!(buf.read_var_i64().unwrap(), value);
        }
    }

    #[test]
    fn unsigned_roundtrip() {
        let mut buf = NetBuf::new();
        buf.write_var_u32(u32::MAX);
        buf.write_var_u64(u64::MAX);
        assert_eq!(buf.read_var_u32().unwrap(), u32::MAX);
        assert_eq!(buf.read_var_u64().unwrap(), u64::MAX);
    }

    #[test]
    fn endless_continuation_rejected() {
        let mut buf = NetBuf::from_bytes([0xFF; 6]);
        assert_eq!(
            buf.read_var_i32().unwrap_err(),
            BufError::VarIntTooLong { max_bytes: 5 }
        );
    }

    #[test]
    fn oversized_magnitude_rejected() {
        // four continuation bytes then a terminal carrying bits 28..34
        let mut buf = NetBuf::from_bytes([0xFF, 0xFF, 0xFF, 0xFF, 0x3F]);
        assert_eq!(buf.read_var_i32().unwrap_err(), BufError::VarIntOverflow);
    }

    #[test]
    fn truncated_varint_is_eof() {
        let mut buf = NetBuf::from_bytes([0x80]);
        assert!(matches!(
            buf.read_var_i32(),
            Err(BufError::UnexpectedEof { .. })
        ));
    }
}
