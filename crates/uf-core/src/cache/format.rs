//! Filter Cache Format Constants
//!
//! All integers are little-endian. A file is `HEADER count:u32 record* HEADER`.

/// Filter and modify cache header: "YZBABPFI" + version bytes
pub const FILTER_CACHE_HEADER: &[u8; 11] = b"YZBABPFI\0\x01\x01";

/// Element cache header: "YZBABPEF" + version bytes
pub const ELEMENT_CACHE_HEADER: &[u8; 11] = b"YZBABPEF\0\x01\x01";

/// Varint sentinel: the value follows as a u32.
pub const VARINT_ESCAPE: u16 = 0xFFFF;

/// Third-party byte for "no preference".
pub const NO_PARTY_PREFERENCE: u8 = 0xFF;

/// Suffix of the staging directory a cache is written to before the swap.
pub const TEMP_SUFFIX: &str = ".tmp";

/// Suffix the previous cache directory is parked under during the swap.
pub const BACKUP_SUFFIX: &str = ".old";

// =============================================================================
// Writing
// =============================================================================

#[inline]
pub fn write_u8(out: &mut Vec<u8>, value: u8) {
    out.push(value);
}

#[inline]
pub fn write_bool(out: &mut Vec<u8>, value: bool) {
    out.push(value as u8);
}

#[inline]
pub fn write_u16_le(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

#[inline]
pub fn write_u32_le(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Two bytes below `0xFFFF`, otherwise the escape followed by a u32.
pub fn write_varint(out: &mut Vec<u8>, value: usize) {
    match u16::try_from(value) {
        Ok(short) if short != VARINT_ESCAPE => write_u16_le(out, short),
        _ => {
            write_u16_le(out, VARINT_ESCAPE);
            write_u32_le(out, value as u32);
        }
    }
}

pub fn write_str(out: &mut Vec<u8>, s: &str) {
    write_varint(out, s.len());
    out.extend_from_slice(s.as_bytes());
}

// =============================================================================
// Reading
// =============================================================================

/// Bounds-checked cursor. Every read returns `None` past the end.
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn bytes(&mut self, len: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(len)?;
        let slice = self.data.get(self.pos..end)?;
        self.pos = end;
        Some(slice)
    }

    #[inline]
    pub fn u8(&mut self) -> Option<u8> {
        self.bytes(1).map(|b| b[0])
    }

    /// Strict boolean: only 0 and 1 are accepted.
    pub fn bool(&mut self) -> Option<bool> {
        match self.u8()? {
            0 => Some(false),
            1 => Some(true),
            _ => None,
        }
    }

    pub fn u16_le(&mut self) -> Option<u16> {
        self.bytes(2).map(|b| u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn u32_le(&mut self) -> Option<u32> {
        self.bytes(4).map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn varint(&mut self) -> Option<usize> {
        match self.u16_le()? {
            VARINT_ESCAPE => self.u32_le().map(|v| v as usize),
            short => Some(short as usize),
        }
    }

    pub fn str(&mut self) -> Option<&'a str> {
        let len = self.varint()?;
        std::str::from_utf8(self.bytes(len)?).ok()
    }

    /// Consume `expected` or fail.
    pub fn expect(&mut self, expected: &[u8]) -> Option<()> {
        (self.bytes(expected.len())? == expected).then_some(())
    }
}
