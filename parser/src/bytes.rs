//! Bounds-checked, endianness-aware reading of primitive values
//! over a contiguous byte buffer.
//!
//! The reader holds a moving cursor into a borrowed slice.
//! Every read checks the remaining length first;
//! a read that would run past the end fails with [`Error::Underflow`]
//! and leaves the cursor untouched.

use byteordered::byteorder::{BigEndian, ByteOrder, LittleEndian};
use byteordered::Endianness;
use snafu::{ensure, Backtrace, Snafu};

/// Error type for byte-level reads.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// A read would exceed the end of the buffer.
    #[snafu(display(
        "Buffer underflow: needed {} bytes at position {}, {} remaining",
        needed,
        position,
        remaining
    ))]
    Underflow {
        needed: usize,
        position: usize,
        remaining: usize,
        backtrace: Backtrace,
    },

    /// A seek targeted a position beyond the end of the buffer.
    #[snafu(display("Seek to position {} is out of bounds (buffer size {})", offset, size))]
    OutOfBounds {
        offset: usize,
        size: usize,
        backtrace: Backtrace,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A cursor over a borrowed byte buffer
/// with explicit endianness on each multi-byte read.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> ByteReader<'a> {
    /// Create a reader over the whole buffer, cursor at the start.
    pub fn new(data: &'a [u8]) -> Self {
        ByteReader { data, position: 0 }
    }

    /// The current cursor position.
    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    /// The number of bytes between the cursor and the end of the buffer.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    /// The full buffer the reader walks over.
    #[inline]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    fn check(&self, needed: usize) -> Result<()> {
        ensure!(
            needed <= self.remaining(),
            UnderflowSnafu {
                needed,
                position: self.position,
                remaining: self.remaining(),
            }
        );
        Ok(())
    }

    /// Read an unsigned 16-bit integer with the given endianness.
    pub fn read_u16(&mut self, endianness: Endianness) -> Result<u16> {
        self.check(2)?;
        let bytes = &self.data[self.position..self.position + 2];
        let v = match endianness {
            Endianness::Little => LittleEndian::read_u16(bytes),
            Endianness::Big => BigEndian::read_u16(bytes),
        };
        self.position += 2;
        Ok(v)
    }

    /// Read a signed 16-bit integer with the given endianness.
    pub fn read_i16(&mut self, endianness: Endianness) -> Result<i16> {
        self.read_u16(endianness).map(|v| v as i16)
    }

    /// Read an unsigned 32-bit integer with the given endianness.
    pub fn read_u32(&mut self, endianness: Endianness) -> Result<u32> {
        self.check(4)?;
        let bytes = &self.data[self.position..self.position + 4];
        let v = match endianness {
            Endianness::Little => LittleEndian::read_u32(bytes),
            Endianness::Big => BigEndian::read_u32(bytes),
        };
        self.position += 4;
        Ok(v)
    }

    /// Read an unsigned 64-bit integer with the given endianness.
    pub fn read_u64(&mut self, endianness: Endianness) -> Result<u64> {
        self.check(8)?;
        let bytes = &self.data[self.position..self.position + 8];
        let v = match endianness {
            Endianness::Little => LittleEndian::read_u64(bytes),
            Endianness::Big => BigEndian::read_u64(bytes),
        };
        self.position += 8;
        Ok(v)
    }

    /// Read `n` bytes, advancing the cursor.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.check(n)?;
        let out = &self.data[self.position..self.position + n];
        self.position += n;
        Ok(out)
    }

    /// Look at the next `n` bytes without advancing the cursor.
    pub fn peek_bytes(&self, n: usize) -> Result<&'a [u8]> {
        self.check(n)?;
        Ok(&self.data[self.position..self.position + n])
    }

    /// Move the cursor to an absolute position.
    ///
    /// Seeking to the one-past-the-end position is permitted;
    /// any further is out of bounds.
    pub fn seek(&mut self, offset: usize) -> Result<()> {
        ensure!(
            offset <= self.data.len(),
            OutOfBoundsSnafu {
                offset,
                size: self.data.len(),
            }
        );
        self.position = offset;
        Ok(())
    }

    /// Advance the cursor by `n` bytes.
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.check(n)?;
        self.position += n;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_both_endiannesses() {
        let data = [0x01, 0x02, 0x03, 0x04];
        let mut reader = ByteReader::new(&data);
        assert_eq!(reader.read_u16(Endianness::Little).unwrap(), 0x0201);
        assert_eq!(reader.read_u16(Endianness::Big).unwrap(), 0x0304);
        assert_eq!(reader.remaining(), 0);

        reader.seek(0).unwrap();
        assert_eq!(reader.read_u32(Endianness::Little).unwrap(), 0x0403_0201);
    }

    #[test]
    fn underflow_leaves_cursor_in_place() {
        let data = [0xFF, 0xEE];
        let mut reader = ByteReader::new(&data);
        reader.skip(1).unwrap();
        assert!(matches!(
            reader.read_u32(Endianness::Little),
            Err(Error::Underflow { .. })
        ));
        assert_eq!(reader.position(), 1);
        assert_eq!(reader.read_bytes(1).unwrap(), &[0xEE]);
    }

    #[test]
    fn peek_does_not_advance() {
        let data = [1, 2, 3];
        let reader = ByteReader::new(&data);
        assert_eq!(reader.peek_bytes(2).unwrap(), &[1, 2]);
        assert_eq!(reader.position(), 0);
    }

    #[test]
    fn seek_bounds() {
        let data = [0u8; 4];
        let mut reader = ByteReader::new(&data);
        reader.seek(4).unwrap();
        assert_eq!(reader.remaining(), 0);
        assert!(matches!(reader.seek(5), Err(Error::OutOfBounds { .. })));
    }
}
