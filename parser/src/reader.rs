//! Endian-aware primitive reads over a byte slice at an explicit cursor.

use byteordered::byteorder::{BigEndian, ByteOrder, LittleEndian};
use byteordered::Endianness;
use dicomite_core::Tag;
use snafu::{ensure, Backtrace, Snafu};

/// An error from reading past the end of the input.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// A read would pass the end of the byte source.
    #[snafu(display(
        "Unexpected end of input: needed {} bytes at position {}, {} available",
        wanted,
        position,
        available
    ))]
    UnexpectedEndOfInput {
        position: usize,
        wanted: usize,
        available: usize,
        backtrace: Backtrace,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A cursor over a byte slice which reads primitive values
/// in a switchable byte order.
///
/// Every read is bounds checked and advances the cursor
/// by the size of the value read.
#[derive(Debug)]
pub struct BinaryReader<'a> {
    data: &'a [u8],
    position: usize,
    endianness: Endianness,
}

impl<'a> BinaryReader<'a> {
    /// Create a reader over the given bytes, starting at offset zero.
    pub fn new(data: &'a [u8], endianness: Endianness) -> Self {
        BinaryReader {
            data,
            position: 0,
            endianness,
        }
    }

    /// The current byte order.
    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// Switch the byte order for subsequent reads.
    /// Used once the transfer syntax of the main data set is known.
    pub fn set_endianness(&mut self, endianness: Endianness) {
        self.endianness = endianness;
    }

    /// The current cursor position, in bytes from the start of the source.
    pub fn position(&self) -> usize {
        self.position
    }

    /// The number of bytes left to read.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    /// Whether the cursor is at the end of the source.
    pub fn is_at_end(&self) -> bool {
        self.remaining() == 0
    }

    /// Borrow `count` bytes at the cursor and advance past them.
    pub fn take(&mut self, count: usize) -> Result<&'a [u8]> {
        ensure!(
            count <= self.remaining(),
            UnexpectedEndOfInputSnafu {
                position: self.position,
                wanted: count,
                available: self.remaining(),
            }
        );
        let bytes = &self.data[self.position..self.position + count];
        self.position += count;
        Ok(bytes)
    }

    /// Advance the cursor by `count` bytes without reading them.
    pub fn skip(&mut self, count: usize) -> Result<()> {
        self.take(count).map(|_| ())
    }

    /// Move the cursor to the given absolute position.
    pub fn seek_to(&mut self, position: usize) -> Result<()> {
        ensure!(
            position <= self.data.len(),
            UnexpectedEndOfInputSnafu {
                position: self.data.len(),
                wanted: position - self.data.len(),
                available: 0usize,
            }
        );
        self.position = position;
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let bytes = self.take(2)?;
        Ok(match self.endianness {
            Endianness::Little => LittleEndian::read_u16(bytes),
            Endianness::Big => BigEndian::read_u16(bytes),
        })
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(match self.endianness {
            Endianness::Little => LittleEndian::read_u32(bytes),
            Endianness::Big => BigEndian::read_u32(bytes),
        })
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(self.read_u16()? as i16)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(self.read_u32()? as i32)
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        let bytes = self.take(8)?;
        Ok(match self.endianness {
            Endianness::Little => LittleEndian::read_f64(bytes),
            Endianness::Big => BigEndian::read_f64(bytes),
        })
    }

    /// Read an attribute tag: two 16-bit numbers in the current byte order.
    pub fn read_tag(&mut self) -> Result<Tag> {
        let group = self.read_u16()?;
        let element = self.read_u16()?;
        Ok(Tag(group, element))
    }
}
