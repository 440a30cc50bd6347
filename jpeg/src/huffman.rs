//! Canonical Huffman tables for the lossless process.
//!
//! Tables are built from the `BITS` and `HUFFVAL` lists of a DHT
//! segment, following the canonical code assignment of ITU-T T.81
//! Annex C. Decoding is accelerated by an 8-bit prefix lookup;
//! longer codes fall back to a search by code length.

use crate::bitread::BitReader;
use crate::error::{HuffmanTableOverflowSnafu, Result, UndecodableCodeSnafu};
use snafu::ensure;

const LUT_BITS: u8 = 8;

/// One entry of the prefix lookup: decoded symbol and code length.
/// A length of zero marks a miss (the code is longer than the prefix).
#[derive(Debug, Clone, Copy, Default)]
struct LutEntry {
    symbol: u8,
    length: u8,
}

/// A canonical Huffman decoding table.
#[derive(Debug, Clone)]
pub struct HuffmanTable {
    lut: [LutEntry; 1 << LUT_BITS],
    /// smallest code of each length (1-indexed by code length)
    min_code: [i32; 17],
    /// largest code of each length, or -1 when the length is unused
    max_code: [i32; 17],
    /// index into `values` of the first symbol of each length
    val_ptr: [usize; 17],
    values: Vec<u8>,
}

impl HuffmanTable {
    /// Build a table from the DHT lists:
    /// `bits[i]` is the number of codes of length `i + 1`
    /// and `values` holds the symbols in canonical order.
    ///
    /// `offset` is the position of the segment in the datastream,
    /// used for error reporting.
    pub fn from_dht(bits: &[u8; 16], values: &[u8], offset: usize) -> Result<Self> {
        let total: usize = bits.iter().map(|&n| n as usize).sum();
        ensure!(
            total <= 256 && total == values.len(),
            HuffmanTableOverflowSnafu { offset }
        );

        let mut table = HuffmanTable {
            lut: [LutEntry::default(); 1 << LUT_BITS],
            min_code: [0; 17],
            max_code: [-1; 17],
            val_ptr: [0; 17],
            values: values.to_vec(),
        };

        let mut code: u32 = 0;
        let mut index = 0;
        for length in 1..=16u8 {
            let count = bits[length as usize - 1] as usize;
            if count > 0 {
                table.min_code[length as usize] = code as i32;
                table.val_ptr[length as usize] = index;
                for _ in 0..count {
                    if length <= LUT_BITS {
                        // fill every suffix of this code in the prefix lookup
                        let shift = LUT_BITS - length;
                        let base = (code << shift) as usize;
                        for slot in base..base + (1 << shift) {
                            table.lut[slot] = LutEntry {
                                symbol: values[index],
                                length,
                            };
                        }
                    }
                    code += 1;
                    index += 1;
                }
                table.max_code[length as usize] = code as i32 - 1;
            }
            code <<= 1;
        }
        Ok(table)
    }

    /// Decode a single symbol from the bit reader.
    pub fn decode(&self, reader: &mut BitReader<'_>) -> Result<u8> {
        // fast path: codes up to 8 bits via the prefix lookup
        let (prefix, valid) = reader.peek8();
        let entry = self.lut[prefix as usize];
        if entry.length > 0 && entry.length <= valid {
            reader.consume(entry.length);
            return Ok(entry.symbol);
        }

        // slow path: extend the code one bit at a time
        let mut code: i32 = 0;
        for length in 1..=16usize {
            code = (code << 1) | reader.read_bit()? as i32;
            if self.max_code[length] >= 0 && code <= self.max_code[length] {
                let index = self.val_ptr[length] + (code - self.min_code[length]) as usize;
                return Ok(self.values[index]);
            }
        }
        UndecodableCodeSnafu {
            offset: reader.segment_end(),
        }
        .fail()
    }
}
