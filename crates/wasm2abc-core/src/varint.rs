//! Variable-length integer and raw value codec for the ABC format.
//!
//! Every count, pool index and most immediates in an ABC file use a 7-bit group
//! encoding: little-endian groups, high bit set on every group except the last.
//! Branch displacements are raw signed 24-bit fields and doubles are raw
//! IEEE-754 little-endian.

use crate::error::EncodeError;

/// Largest value representable as a `u30` (exclusive bound).
pub const U30_LIMIT: u32 = 1 << 30;

/// Smallest signed 24-bit displacement.
pub const S24_MIN: i64 = -(1 << 23);

/// Largest signed 24-bit displacement.
pub const S24_MAX: i64 = (1 << 23) - 1;

/// Append a raw byte.
#[inline]
pub fn write_u8(out: &mut Vec<u8>, value: u8) {
    out.push(value);
}

/// Append a raw little-endian 16-bit value.
#[inline]
pub fn write_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Append a `u32` in 7-bit groups, sized to its significant bits.
pub fn write_u32(out: &mut Vec<u8>, mut value: u32) {
    loop {
        let group = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(group);
            return;
        }
        out.push(group | 0x80);
    }
}

/// Append a `u30`. Values `>= 2^30` are a range error.
pub fn write_u30(out: &mut Vec<u8>, value: u32) -> Result<(), EncodeError> {
    if value >= U30_LIMIT {
        return Err(EncodeError::U30OutOfRange {
            value: u64::from(value),
        });
    }
    write_u32(out, value);
    Ok(())
}

/// Append a `u30` given as a table length or index.
pub fn write_u30_usize(out: &mut Vec<u8>, value: usize) -> Result<(), EncodeError> {
    match u32::try_from(value) {
        Ok(v) => write_u30(out, v),
        Err(_) => Err(EncodeError::U30OutOfRange {
            value: value as u64,
        }),
    }
}

/// Append an `s32`.
///
/// Non-negative values use their significant bits plus one sign bit.
///
/// Negative values are not sized by magnitude: they always use all five
/// groups. The VM reads an `s32` as a `u32` and reinterprets the bits, so a
/// short negative form such as `0x7f` for `-1` would load as `127`. Five
/// groups carry the full two's-complement pattern for any reader.
pub fn write_s32(out: &mut Vec<u8>, value: i32) {
    let groups = if value < 0 {
        5
    } else {
        (32 - value.leading_zeros() + 1).div_ceil(7)
    };
    let mut rest = value;
    for i in 0..groups {
        let group = (rest & 0x7f) as u8;
        rest >>= 7;
        if i + 1 < groups {
            out.push(group | 0x80);
        } else {
            out.push(group);
        }
    }
}

/// Append a signed 24-bit little-endian displacement.
pub fn write_s24(out: &mut Vec<u8>, value: i64) -> Result<(), EncodeError> {
    let bytes = s24_bytes(value)?;
    out.extend_from_slice(&bytes);
    Ok(())
}

/// Overwrite three bytes at `at` with a signed 24-bit displacement.
///
/// # Panics
///
/// Panics if `at + 3` exceeds the buffer length.
pub fn patch_s24(buf: &mut [u8], at: usize, value: i64) -> Result<(), EncodeError> {
    let bytes = s24_bytes(value)?;
    buf[at..at + 3].copy_from_slice(&bytes);
    Ok(())
}

fn s24_bytes(value: i64) -> Result<[u8; 3], EncodeError> {
    if !(S24_MIN..=S24_MAX).contains(&value) {
        return Err(EncodeError::BranchOutOfRange {
            displacement: value,
        });
    }
    let raw = value as i32;
    Ok([raw as u8, (raw >> 8) as u8, (raw >> 16) as u8])
}

/// Append an IEEE-754 double, little-endian.
#[inline]
pub fn write_d64(out: &mut Vec<u8>, value: f64) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Append a length-prefixed UTF-8 string.
pub fn write_string(out: &mut Vec<u8>, value: &str) -> Result<(), EncodeError> {
    write_u30_usize(out, value.len())?;
    out.extend_from_slice(value.as_bytes());
    Ok(())
}

// ============================================================================
// Decoding
// ============================================================================

/// Cursor over encoded bytes.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    /// Create a reader positioned at the start of `bytes`.
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    /// Current read offset.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Whether every byte has been consumed.
    pub fn is_at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    pub fn read_u8(&mut self) -> Result<u8, EncodeError> {
        let byte = *self
            .bytes
            .get(self.pos)
            .ok_or(EncodeError::UnexpectedEof { offset: self.pos })?;
        self.pos += 1;
        Ok(byte)
    }

    pub fn read_u16(&mut self) -> Result<u16, EncodeError> {
        let lo = self.read_u8()?;
        let hi = self.read_u8()?;
        Ok(u16::from_le_bytes([lo, hi]))
    }

    /// Read up to five 7-bit groups, returning the raw value and group count.
    fn read_groups(&mut self) -> Result<(u64, u32), EncodeError> {
        let start = self.pos;
        let mut value = 0u64;
        for group in 0..5u32 {
            let byte = self.read_u8()?;
            value |= u64::from(byte & 0x7f) << (7 * group);
            if byte & 0x80 == 0 {
                return Ok((value, group + 1));
            }
        }
        Err(EncodeError::MalformedVarint { offset: start })
    }

    pub fn read_u32(&mut self) -> Result<u32, EncodeError> {
        let (value, _) = self.read_groups()?;
        Ok(value as u32)
    }

    pub fn read_u30(&mut self) -> Result<u32, EncodeError> {
        let value = self.read_u32()?;
        if value >= U30_LIMIT {
            return Err(EncodeError::U30OutOfRange {
                value: u64::from(value),
            });
        }
        Ok(value)
    }

    pub fn read_s32(&mut self) -> Result<i32, EncodeError> {
        let (value, groups) = self.read_groups()?;
        if groups >= 5 {
            return Ok(value as u32 as i32);
        }
        let width = 7 * groups;
        let shift = 64 - width;
        Ok((((value << shift) as i64) >> shift) as i32)
    }

    pub fn read_s24(&mut self) -> Result<i32, EncodeError> {
        let b0 = self.read_u8()?;
        let b1 = self.read_u8()?;
        let b2 = self.read_u8()?;
        let raw = i32::from(b0) | (i32::from(b1) << 8) | (i32::from(b2) << 16);
        Ok((raw << 8) >> 8)
    }

    pub fn read_d64(&mut self) -> Result<f64, EncodeError> {
        let end = self.pos + 8;
        let slice = self
            .bytes
            .get(self.pos..end)
            .ok_or(EncodeError::UnexpectedEof { offset: self.pos })?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(slice);
        self.pos = end;
        Ok(f64::from_le_bytes(raw))
    }

    pub fn read_string(&mut self) -> Result<String, EncodeError> {
        let len = self.read_u30()? as usize;
        let end = self.pos + len;
        let slice = self
            .bytes
            .get(self.pos..end)
            .ok_or(EncodeError::UnexpectedEof { offset: self.pos })?;
        let text = std::str::from_utf8(slice)
            .map_err(|_| EncodeError::InvalidUtf8 { offset: self.pos })?;
        self.pos = end;
        Ok(text.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn u32_bytes(value: u32) -> Vec<u8> {
        let mut out = Vec::new();
        write_u32(&mut out, value);
        out
    }

    fn s32_bytes(value: i32) -> Vec<u8> {
        let mut out = Vec::new();
        write_s32(&mut out, value);
        out
    }

    #[test]
    fn u32_group_sizes() {
        assert_eq!(u32_bytes(0), vec![0x00]);
        assert_eq!(u32_bytes(127), vec![0x7f]);
        assert_eq!(u32_bytes(128), vec![0x80, 0x01]);
        assert_eq!(u32_bytes(300), vec![0xac, 0x02]);
        assert_eq!(u32_bytes(u32::MAX), vec![0xff, 0xff, 0xff, 0xff, 0x0f]);
    }

    #[test]
    fn u30_rejects_out_of_range() {
        let mut out = Vec::new();
        assert!(write_u30(&mut out, U30_LIMIT - 1).is_ok());
        assert_eq!(
            write_u30(&mut out, U30_LIMIT),
            Err(EncodeError::U30OutOfRange {
                value: u64::from(U30_LIMIT)
            })
        );
    }

    #[test]
    fn s32_keeps_a_sign_bit() {
        assert_eq!(s32_bytes(0), vec![0x00]);
        assert_eq!(s32_bytes(63), vec![0x3f]);
        // 64 needs 7 magnitude bits plus a sign bit.
        assert_eq!(s32_bytes(64), vec![0xc0, 0x00]);
        assert_eq!(s32_bytes(-1), vec![0xff, 0xff, 0xff, 0xff, 0x7f]);
        assert_eq!(s32_bytes(i32::MIN).len(), 5);
    }

    #[test]
    fn negative_s32_always_uses_five_groups() {
        for value in [-1, -2, -64, -65, -8192, i32::MIN] {
            let bytes = s32_bytes(value);
            assert_eq!(bytes.len(), 5, "{value}");
            // Read back as an unsigned pattern, the bits are intact.
            let mut reader = ByteReader::new(&bytes);
            assert_eq!(reader.read_u32().unwrap(), value as u32);
        }
    }

    #[test]
    fn s24_range_and_patch() {
        let mut out = vec![0u8; 4];
        patch_s24(&mut out, 1, -4).unwrap();
        assert_eq!(out, vec![0, 0xfc, 0xff, 0xff]);
        assert!(write_s24(&mut out, S24_MAX + 1).is_err());
        assert!(write_s24(&mut out, S24_MIN - 1).is_err());

        let mut reader = ByteReader::new(&out[1..]);
        assert_eq!(reader.read_s24().unwrap(), -4);
    }

    #[test]
    fn d64_is_little_endian() {
        let mut out = Vec::new();
        write_d64(&mut out, 1.0);
        assert_eq!(out, vec![0, 0, 0, 0, 0, 0, 0xf0, 0x3f]);
    }

    #[test]
    fn string_is_length_prefixed() {
        let mut out = Vec::new();
        write_string(&mut out, "abc").unwrap();
        assert_eq!(out, vec![3, b'a', b'b', b'c']);
        assert_eq!(ByteReader::new(&out).read_string().unwrap(), "abc");
    }

    #[test]
    fn invalid_utf8_string_is_an_error() {
        let bytes = [2, 0xc3, 0x28];
        assert_eq!(
            ByteReader::new(&bytes).read_string(),
            Err(EncodeError::InvalidUtf8 { offset: 1 })
        );
    }

    #[test]
    fn truncated_input_is_an_error() {
        let mut reader = ByteReader::new(&[0x80]);
        assert_eq!(
            reader.read_u32(),
            Err(EncodeError::UnexpectedEof { offset: 1 })
        );
    }

    proptest! {
        #[test]
        fn u30_round_trip(value in 0u32..U30_LIMIT) {
            let mut out = Vec::new();
            write_u30(&mut out, value).unwrap();
            let mut reader = ByteReader::new(&out);
            prop_assert_eq!(reader.read_u30().unwrap(), value);
            prop_assert!(reader.is_at_end());
        }

        #[test]
        fn u32_round_trip(value in any::<u32>()) {
            let out = u32_bytes(value);
            prop_assert_eq!(ByteReader::new(&out).read_u32().unwrap(), value);
        }

        #[test]
        fn s32_round_trip(value in any::<i32>()) {
            let out = s32_bytes(value);
            let mut reader = ByteReader::new(&out);
            prop_assert_eq!(reader.read_s32().unwrap(), value);
            prop_assert!(reader.is_at_end());
        }

        #[test]
        fn s32_short_forms_agree_without_sign_extension(value in 0i32..=i32::MAX) {
            // A reader that never sign-extends must see the same value.
            let out = s32_bytes(value);
            prop_assert_eq!(ByteReader::new(&out).read_u32().unwrap() as i32, value);
        }

        #[test]
        fn d64_round_trip(value in any::<f64>().prop_filter("finite", |v| v.is_finite())) {
            let mut out = Vec::new();
            write_d64(&mut out, value);
            let decoded = ByteReader::new(&out).read_d64().unwrap();
            prop_assert_eq!(decoded.to_bits(), value.to_bits());
        }
    }
}
