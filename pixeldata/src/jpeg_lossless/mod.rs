//! Decoder for JPEG Lossless, Non-Hierarchical (ITU-T T.81 Process 14)
//! codestreams with first-order prediction.
//!
//! The decoder parses the marker segments,
//! builds the Huffman tables from the DHT segments,
//! and reconstructs samples by adding Huffman-coded differences
//! to the left-neighbor predictor,
//! with the default predictor `2^(P-1)` opening every row.
//! Only selection value 1 is supported;
//! the remaining predictors of the standard are reported as unsupported.

mod bitstream;
mod huffman;
mod marker;

pub use huffman::HuffmanTable;
pub use marker::{is_lossless, FrameHeader, ScanHeader};

use dcmview_core::CancelFlag;

use crate::{
    CancelledSnafu, InvalidJpegLosslessSnafu, Result, UnsupportedSnafu,
};
use bitstream::BitReader;

/// How many pixels are reconstructed between cancellation polls.
const CANCEL_POLL_INTERVAL: usize = 4096;

/// The output of a lossless decode.
#[derive(Debug)]
pub struct DecodedLossless {
    /// reconstructed samples, row-major
    pub pixels: Vec<u16>,
    /// samples per line
    pub width: u32,
    /// number of lines
    pub height: u32,
    /// sample precision in bits
    pub precision: u8,
}

/// Decode a complete JPEG Lossless codestream.
///
/// With `first_order_only`, a selection value other than 1
/// is a structural error
/// (the `…4.70` transfer syntax promises first-order prediction);
/// otherwise selection values 2 through 7 are merely unsupported.
pub fn decode(
    stream: &[u8],
    first_order_only: bool,
    cancel: &CancelFlag,
) -> Result<DecodedLossless> {
    let parsed = marker::parse_stream(stream)?;
    let frame = parsed.frame;

    if frame.components != 1 {
        return UnsupportedSnafu {
            what: format!("lossless stream with {} components", frame.components),
        }
        .fail();
    }
    if !matches!(frame.precision, 8 | 12 | 16) {
        return InvalidJpegLosslessSnafu {
            reason: format!("sample precision {} (expected 8, 12 or 16)", frame.precision),
        }
        .fail();
    }
    if frame.width < 1 || frame.height < 1 {
        return InvalidJpegLosslessSnafu {
            reason: format!("degenerate frame {}x{}", frame.width, frame.height),
        }
        .fail();
    }

    let scan = parsed.scan;
    if scan.end_spectral != 0 || scan.approx_high != 0 || scan.approx_low != 0 {
        return InvalidJpegLosslessSnafu {
            reason: format!(
                "scan parameters Se={} Ah={} Al={} invalid for a lossless scan",
                scan.end_spectral, scan.approx_high, scan.approx_low
            ),
        }
        .fail();
    }
    match scan.selection_value {
        1 => {}
        2..=7 if !first_order_only => {
            return UnsupportedSnafu {
                what: format!("predictor selection value {}", scan.selection_value),
            }
            .fail();
        }
        other => {
            return InvalidJpegLosslessSnafu {
                reason: format!("predictor selection value {}", other),
            }
            .fail();
        }
    }

    let table = parsed.tables.get(&scan.table_id).ok_or_else(|| {
        InvalidJpegLosslessSnafu {
            reason: format!("scan references undefined Huffman table {}", scan.table_id),
        }
        .build()
    })?;

    let width = frame.width as usize;
    let height = frame.height as usize;
    let total = width * height;

    let mut bits = BitReader::new(parsed.entropy);
    let mut pixels = vec![0u16; total];

    let default_predictor = 1i32 << (frame.precision - 1);
    let mask = (1i64 << frame.precision) - 1;

    for y in 0..height {
        let row = y * width;
        for x in 0..width {
            let index = row + x;
            if index % CANCEL_POLL_INTERVAL == 0 && cancel.is_cancelled() {
                return CancelledSnafu.fail();
            }

            let magnitude = table.decode(&mut bits)?;
            let diff = decode_difference(&mut bits, magnitude)?;

            // the first column of every row restarts from the
            // default predictor; other columns predict from Ra
            let predictor = if x == 0 {
                default_predictor
            } else {
                i32::from(pixels[index - 1])
            };
            let value = (i64::from(predictor) + i64::from(diff)) & mask;
            pixels[index] = value as u16;
        }
    }

    Ok(DecodedLossless {
        pixels,
        width: frame.width,
        height: frame.height,
        precision: frame.precision,
    })
}

/// Decode a signed difference of the given magnitude category
/// per the JPEG magnitude rules.
fn decode_difference(bits: &mut BitReader<'_>, magnitude: u8) -> Result<i32> {
    match magnitude {
        0 => Ok(0),
        // SSSS of 16 encodes a difference of 32768 with no extra bits
        16 => Ok(32_768),
        ssss @ 1..=15 => {
            let ssss = u32::from(ssss);
            let raw = bits.read_bits(ssss)?;
            let half = 1i32 << (ssss - 1);
            if raw < half {
                Ok(raw - ((1i32 << ssss) - 1))
            } else {
                Ok(raw)
            }
        }
        other => InvalidJpegLosslessSnafu {
            reason: format!("difference magnitude {} out of range", other),
        }
        .fail(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    /// A minimal encoder for synthetic test streams:
    /// single component, one Huffman table
    /// holding magnitude symbols 0..=7 as codes `0`, `10`, `110`, ...
    pub(crate) struct StreamBuilder {
        precision: u8,
        width: u16,
        height: u16,
        selection: u8,
        bits: Vec<bool>,
    }

    impl StreamBuilder {
        pub fn new(precision: u8, width: u16, height: u16, selection: u8) -> Self {
            StreamBuilder {
                precision,
                width,
                height,
                selection,
                bits: Vec::new(),
            }
        }

        /// Append one difference using the unary-prefix table.
        pub fn push_diff(&mut self, diff: i32) {
            let magnitude = if diff == 0 {
                0
            } else {
                (32 - diff.unsigned_abs().leading_zeros()) as u8
            };
            assert!(magnitude <= 7, "builder only encodes small magnitudes");
            // the magnitude symbol: `magnitude` ones then a zero,
            // except symbol 0 which is the single bit 0
            for _ in 0..magnitude {
                self.bits.push(true);
            }
            self.bits.push(false);
            if magnitude > 0 {
                let value = if diff < 0 {
                    diff + (1 << magnitude) - 1
                } else {
                    diff
                };
                for shift in (0..magnitude).rev() {
                    self.bits.push((value >> shift) & 1 == 1);
                }
            }
        }

        pub fn build(&self) -> Vec<u8> {
            let mut out = vec![0xFF, 0xD8];

            // SOF3
            out.extend_from_slice(&[0xFF, 0xC3]);
            out.extend_from_slice(&11u16.to_be_bytes());
            out.push(self.precision);
            out.extend_from_slice(&self.height.to_be_bytes());
            out.extend_from_slice(&self.width.to_be_bytes());
            out.push(1); // one component
            out.extend_from_slice(&[1, 0x11, 0]);

            // DHT: class 0, id 0; symbol k has code of k ones then a zero
            let mut counts = [0u8; 16];
            for length in 1..=7 {
                counts[length - 1] = 1;
            }
            counts[7] = 1; // symbol 7 at length 8
            out.extend_from_slice(&[0xFF, 0xC4]);
            out.extend_from_slice(&(2u16 + 1 + 16 + 8).to_be_bytes());
            out.push(0x00);
            out.extend_from_slice(&counts);
            out.extend_from_slice(&[0, 1, 2, 3, 4, 5, 6, 7]);

            // SOS
            out.extend_from_slice(&[0xFF, 0xDA]);
            out.extend_from_slice(&8u16.to_be_bytes());
            out.push(1);
            out.extend_from_slice(&[1, 0x00]);
            out.push(self.selection);
            out.push(0); // Se
            out.push(0); // Ah/Al

            // entropy-coded data, padded with ones
            let mut byte = 0u8;
            let mut used = 0;
            for &bit in &self.bits {
                byte = (byte << 1) | u8::from(bit);
                used += 1;
                if used == 8 {
                    out.push(byte);
                    if byte == 0xFF {
                        out.push(0x00);
                    }
                    byte = 0;
                    used = 0;
                }
            }
            if used > 0 {
                byte = (byte << (8 - used)) | ((1 << (8 - used)) - 1);
                out.push(byte);
                if byte == 0xFF {
                    out.push(0x00);
                }
            }

            out.extend_from_slice(&[0xFF, 0xD9]);
            out
        }
    }

    #[test]
    fn zero_differences_reproduce_the_default_predictor() {
        let mut builder = StreamBuilder::new(8, 2, 2, 1);
        for _ in 0..4 {
            builder.push_diff(0);
        }
        let decoded = decode(&builder.build(), true, &CancelFlag::new()).unwrap();
        assert_eq!(decoded.pixels, vec![128, 128, 128, 128]);
        assert_eq!((decoded.width, decoded.height), (2, 2));
        assert_eq!(decoded.precision, 8);
    }

    #[test]
    fn sixteen_bit_zero_differences_yield_midrange() {
        let mut builder = StreamBuilder::new(16, 3, 1, 1);
        for _ in 0..3 {
            builder.push_diff(0);
        }
        let decoded = decode(&builder.build(), true, &CancelFlag::new()).unwrap();
        assert_eq!(decoded.pixels, vec![32768, 32768, 32768]);
    }

    #[test]
    fn differences_accumulate_along_the_row() {
        let mut builder = StreamBuilder::new(8, 4, 1, 1);
        builder.push_diff(-28); // 128 - 28 = 100
        builder.push_diff(5); // 105
        builder.push_diff(0); // 105
        builder.push_diff(-5); // 100
        let decoded = decode(&builder.build(), true, &CancelFlag::new()).unwrap();
        assert_eq!(decoded.pixels, vec![100, 105, 105, 100]);
    }

    #[test]
    fn each_row_restarts_from_the_default_predictor() {
        let mut builder = StreamBuilder::new(8, 2, 2, 1);
        builder.push_diff(10); // row 0: 138
        builder.push_diff(1); // 139
        builder.push_diff(-10); // row 1: 118
        builder.push_diff(2); // 120
        let decoded = decode(&builder.build(), true, &CancelFlag::new()).unwrap();
        assert_eq!(decoded.pixels, vec![138, 139, 118, 120]);
    }

    #[test]
    fn values_wrap_modulo_the_precision() {
        let mut builder = StreamBuilder::new(8, 2, 1, 1);
        builder.push_diff(127); // 128 + 127 = 255
        builder.push_diff(1); // 256 wraps to 0
        let decoded = decode(&builder.build(), true, &CancelFlag::new()).unwrap();
        assert_eq!(decoded.pixels, vec![255, 0]);
    }

    #[test]
    fn unsupported_selection_values_are_reported() {
        let mut builder = StreamBuilder::new(8, 1, 1, 4);
        builder.push_diff(0);
        let stream = builder.build();
        assert!(matches!(
            decode(&stream, false, &CancelFlag::new()),
            Err(Error::Unsupported { .. })
        ));
        assert!(matches!(
            decode(&stream, true, &CancelFlag::new()),
            Err(Error::InvalidJpegLossless { .. })
        ));
    }

    #[test]
    fn truncated_entropy_data_is_an_error() {
        let mut builder = StreamBuilder::new(8, 4, 4, 1);
        builder.push_diff(0); // far fewer symbols than pixels
        let mut stream = builder.build();
        // drop the EOI so the reader hits the raw end
        stream.truncate(stream.len() - 2);
        assert!(matches!(
            decode(&stream, true, &CancelFlag::new()),
            Err(Error::InvalidJpegLossless { .. })
        ));
    }

    #[test]
    fn cancellation_aborts_the_decode() {
        let mut builder = StreamBuilder::new(8, 2, 2, 1);
        for _ in 0..4 {
            builder.push_diff(0);
        }
        let flag = CancelFlag::new();
        flag.cancel();
        assert!(matches!(
            decode(&builder.build(), true, &flag),
            Err(Error::Cancelled { .. })
        ));
    }

    #[test]
    fn baseline_stream_is_rejected() {
        // SOI + SOF0 header start
        let stream = [0xFF, 0xD8, 0xFF, 0xC0, 0x00, 0x0B, 8, 0, 1, 0, 1, 1, 1, 0x11, 0];
        assert!(matches!(
            decode(&stream, true, &CancelFlag::new()),
            Err(Error::InvalidJpegLossless { .. })
        ));
        assert!(!is_lossless(&stream));
    }
}
