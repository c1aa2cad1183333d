//! Huffman table construction and symbol decoding
//! per ITU-T T.81 Annex F.

use crate::{InvalidJpegLosslessSnafu, Result};

use super::bitstream::BitReader;

/// A decoding table derived from a DHT segment's
/// `BITS` (code counts per length) and `HUFFVAL` (symbol values).
#[derive(Debug, Clone)]
pub struct HuffmanTable {
    /// smallest code of each length 1..=16
    min_code: [u16; 17],
    /// largest code of each length 1..=16, -1 where the length is unused
    max_code: [i32; 17],
    /// index into `values` of the first symbol of each length
    val_ptr: [u16; 17],
    /// symbol values in order of increasing code length
    values: Vec<u8>,
}

impl HuffmanTable {
    /// Build the decode tables from the segment data
    /// (the `BITS` array of 16 counts and the symbol values).
    pub fn build(counts: &[u8; 16], values: Vec<u8>) -> Result<HuffmanTable> {
        let total: usize = counts.iter().map(|&c| c as usize).sum();
        if total == 0 || total != values.len() {
            return InvalidJpegLosslessSnafu {
                reason: format!(
                    "Huffman table declares {} codes but carries {} values",
                    total,
                    values.len()
                ),
            }
            .fail();
        }

        let mut min_code = [0u16; 17];
        let mut max_code = [-1i32; 17];
        let mut val_ptr = [0u16; 17];

        let mut code = 0u32;
        let mut index = 0u16;
        for length in 1..=16usize {
            let count = u32::from(counts[length - 1]);
            val_ptr[length] = index;
            if count != 0 {
                if code + count - 1 >= (1 << length) {
                    return InvalidJpegLosslessSnafu {
                        reason: format!("Huffman code overflow at length {}", length),
                    }
                    .fail();
                }
                min_code[length] = code as u16;
                code += count;
                max_code[length] = code as i32 - 1;
            }
            index += count as u16;
            code <<= 1;
        }

        Ok(HuffmanTable {
            min_code,
            max_code,
            val_ptr,
            values,
        })
    }

    /// Decode one symbol from the bit stream,
    /// accumulating one bit per candidate code length.
    pub fn decode(&self, reader: &mut BitReader<'_>) -> Result<u8> {
        let mut code = 0u32;
        for length in 1..=16usize {
            code = (code << 1) | reader.read_bit()?;
            if self.max_code[length] >= 0 && code as i32 <= self.max_code[length] {
                let index =
                    self.val_ptr[length] as usize + (code - u32::from(self.min_code[length])) as usize;
                return self.values.get(index).copied().ok_or_else(|| {
                    InvalidJpegLosslessSnafu {
                        reason: "Huffman value index out of table".to_string(),
                    }
                    .build()
                });
            }
        }
        InvalidJpegLosslessSnafu {
            reason: "invalid Huffman code".to_string(),
        }
        .fail()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_symbol_table_decodes_with_one_bit() {
        // one code of length 1: "0" -> symbol 0
        let mut counts = [0u8; 16];
        counts[0] = 1;
        let table = HuffmanTable::build(&counts, vec![0]).unwrap();

        let data = [0b0000_0000];
        let mut reader = BitReader::new(&data);
        for _ in 0..8 {
            assert_eq!(table.decode(&mut reader).unwrap(), 0);
        }
    }

    #[test]
    fn canonical_two_level_table() {
        // codes: 0 -> 5, 10 -> 6, 11 -> 7
        let mut counts = [0u8; 16];
        counts[0] = 1;
        counts[1] = 2;
        let table = HuffmanTable::build(&counts, vec![5, 6, 7]).unwrap();

        let data = [0b0_10_11_0_00];
        let mut reader = BitReader::new(&data);
        assert_eq!(table.decode(&mut reader).unwrap(), 5);
        assert_eq!(table.decode(&mut reader).unwrap(), 6);
        assert_eq!(table.decode(&mut reader).unwrap(), 7);
        assert_eq!(table.decode(&mut reader).unwrap(), 5);
    }

    #[test]
    fn mismatched_counts_are_rejected() {
        let mut counts = [0u8; 16];
        counts[0] = 1;
        assert!(HuffmanTable::build(&counts, vec![1, 2]).is_err());
    }

    #[test]
    fn code_not_in_table_is_an_error() {
        // only code "0" defined; all-ones input never matches
        let mut counts = [0u8; 16];
        counts[0] = 1;
        let table = HuffmanTable::build(&counts, vec![0]).unwrap();
        let data = [0xFF, 0x00, 0xFF, 0x00, 0xFF, 0x00];
        let mut reader = BitReader::new(&data);
        assert!(table.decode(&mut reader).is_err());
    }
}
