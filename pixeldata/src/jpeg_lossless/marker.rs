//! JPEG marker-segment scanning for lossless (Process 14) codestreams.

use std::collections::HashMap;

use crate::{InvalidJpegLosslessSnafu, Result};

use super::huffman::HuffmanTable;

const SOI: u8 = 0xD8;
const EOI: u8 = 0xD9;
const SOF3: u8 = 0xC3;
const DHT: u8 = 0xC4;
const SOS: u8 = 0xDA;

/// Frame parameters from the SOF3 segment.
#[derive(Debug, Clone, Copy)]
pub struct FrameHeader {
    /// sample precision in bits
    pub precision: u8,
    /// number of lines
    pub height: u32,
    /// samples per line
    pub width: u32,
    /// number of image components
    pub components: u8,
}

/// Scan parameters from the SOS segment.
#[derive(Debug, Clone, Copy)]
pub struct ScanHeader {
    /// predictor selection value (Ss)
    pub selection_value: u8,
    /// end of spectral selection (Se); must be 0 for lossless
    pub end_spectral: u8,
    /// successive approximation high nibble (Ah); must be 0
    pub approx_high: u8,
    /// successive approximation low nibble (Al, point transform); must be 0
    pub approx_low: u8,
    /// DC entropy table selector of the first component
    pub table_id: u8,
}

/// A lossless codestream split into its decoding ingredients.
#[derive(Debug)]
pub struct ParsedStream<'a> {
    /// the SOF3 frame parameters
    pub frame: FrameHeader,
    /// DC-class Huffman tables by table id
    pub tables: HashMap<u8, HuffmanTable>,
    /// the SOS scan parameters
    pub scan: ScanHeader,
    /// the entropy-coded data following the SOS segment
    pub entropy: &'a [u8],
}

/// Whether a stream is a JPEG Lossless codestream:
/// markers are scanned until SOF3 proves it is,
/// or SOS is reached without one.
pub fn is_lossless(stream: &[u8]) -> bool {
    let mut scanner = Scanner::new(stream);
    if scanner.expect_soi().is_err() {
        return false;
    }
    loop {
        match scanner.next_marker() {
            Ok(SOF3) => return true,
            Ok(SOS) | Ok(EOI) | Err(_) => return false,
            Ok(marker) => {
                if scanner.skip_segment(marker).is_err() {
                    return false;
                }
            }
        }
    }
}

/// Parse the marker segments of a lossless codestream
/// up to the start of the entropy-coded data.
pub fn parse_stream(stream: &[u8]) -> Result<ParsedStream<'_>> {
    let mut scanner = Scanner::new(stream);
    scanner.expect_soi()?;

    let mut frame: Option<FrameHeader> = None;
    let mut tables: HashMap<u8, HuffmanTable> = HashMap::new();

    loop {
        let marker = scanner.next_marker()?;
        match marker {
            SOF3 => {
                if frame.is_some() {
                    return InvalidJpegLosslessSnafu {
                        reason: "repeated SOF3 segment".to_string(),
                    }
                    .fail();
                }
                frame = Some(scanner.read_frame_header()?);
            }
            // any other frame class is not Process 14
            0xC0 | 0xC1 | 0xC2 | 0xC5 | 0xC6 | 0xC7 | 0xC9 | 0xCA | 0xCB | 0xCD | 0xCE | 0xCF => {
                return InvalidJpegLosslessSnafu {
                    reason: format!("frame marker FF{:02X} is not lossless (SOF3)", marker),
                }
                .fail();
            }
            DHT => scanner.read_huffman_tables(&mut tables)?,
            SOS => {
                let frame = frame.ok_or_else(|| {
                    InvalidJpegLosslessSnafu {
                        reason: "SOS before SOF3".to_string(),
                    }
                    .build()
                })?;
                if tables.is_empty() {
                    return InvalidJpegLosslessSnafu {
                        reason: "no Huffman table before SOS".to_string(),
                    }
                    .fail();
                }
                let scan = scanner.read_scan_header()?;
                return Ok(ParsedStream {
                    frame,
                    tables,
                    scan,
                    entropy: scanner.rest(),
                });
            }
            EOI => {
                return InvalidJpegLosslessSnafu {
                    reason: "EOI before any scan".to_string(),
                }
                .fail();
            }
            other => scanner.skip_segment(other)?,
        }
    }
}

struct Scanner<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(data: &'a [u8]) -> Self {
        Scanner { data, pos: 0 }
    }

    fn byte(&mut self) -> Result<u8> {
        let b = *self.data.get(self.pos).ok_or_else(|| {
            InvalidJpegLosslessSnafu {
                reason: "codestream ended inside a marker segment".to_string(),
            }
            .build()
        })?;
        self.pos += 1;
        Ok(b)
    }

    fn u16_be(&mut self) -> Result<u16> {
        let hi = self.byte()?;
        let lo = self.byte()?;
        Ok(u16::from(hi) << 8 | u16::from(lo))
    }

    fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    fn expect_soi(&mut self) -> Result<()> {
        if self.byte()? != 0xFF || self.byte()? != SOI {
            return InvalidJpegLosslessSnafu {
                reason: "missing SOI marker".to_string(),
            }
            .fail();
        }
        Ok(())
    }

    /// Advance to the next marker code, tolerating fill bytes.
    fn next_marker(&mut self) -> Result<u8> {
        loop {
            let b = self.byte()?;
            if b != 0xFF {
                continue;
            }
            let mut code = self.byte()?;
            // 0xFF fill bytes may pad before the code
            while code == 0xFF {
                code = self.byte()?;
            }
            if code != 0x00 {
                return Ok(code);
            }
        }
    }

    /// Skip a segment with a standard big-endian length field.
    fn skip_segment(&mut self, marker: u8) -> Result<()> {
        // standalone markers carry no segment body
        if (0xD0..=0xD7).contains(&marker) || marker == 0x01 {
            return Ok(());
        }
        let length = self.u16_be()?;
        if length < 2 {
            return InvalidJpegLosslessSnafu {
                reason: format!("marker FF{:02X} declares impossible length {}", marker, length),
            }
            .fail();
        }
        let body = usize::from(length) - 2;
        if self.pos + body > self.data.len() {
            return InvalidJpegLosslessSnafu {
                reason: format!("marker FF{:02X} segment exceeds the stream", marker),
            }
            .fail();
        }
        self.pos += body;
        Ok(())
    }

    fn read_frame_header(&mut self) -> Result<FrameHeader> {
        let length = self.u16_be()?;
        if length < 8 {
            return InvalidJpegLosslessSnafu {
                reason: "SOF3 segment too short".to_string(),
            }
            .fail();
        }
        let precision = self.byte()?;
        let height = u32::from(self.u16_be()?);
        let width = u32::from(self.u16_be()?);
        let components = self.byte()?;
        // skip per-component id, sampling, and quantization selectors
        for _ in 0..components {
            self.byte()?;
            self.byte()?;
            self.byte()?;
        }
        Ok(FrameHeader {
            precision,
            height,
            width,
            components,
        })
    }

    fn read_huffman_tables(&mut self, tables: &mut HashMap<u8, HuffmanTable>) -> Result<()> {
        let length = self.u16_be()?;
        if length < 2 {
            return InvalidJpegLosslessSnafu {
                reason: "DHT segment too short".to_string(),
            }
            .fail();
        }
        let end = self.pos + usize::from(length) - 2;
        while self.pos < end {
            let tc_th = self.byte()?;
            let class = tc_th >> 4;
            let id = tc_th & 0x0F;
            let mut counts = [0u8; 16];
            for slot in counts.iter_mut() {
                *slot = self.byte()?;
            }
            let total: usize = counts.iter().map(|&c| c as usize).sum();
            let mut values = Vec::with_capacity(total);
            for _ in 0..total {
                values.push(self.byte()?);
            }
            if class == 0 {
                // the DC class carries the lossless decode table
                tables.insert(id, HuffmanTable::build(&counts, values)?);
            } else {
                tracing::debug!("ignoring AC-class Huffman table {} in lossless stream", id);
            }
        }
        Ok(())
    }

    fn read_scan_header(&mut self) -> Result<ScanHeader> {
        let length = self.u16_be()?;
        if length < 6 {
            return InvalidJpegLosslessSnafu {
                reason: "SOS segment too short".to_string(),
            }
            .fail();
        }
        let components = self.byte()?;
        let mut table_id = 0;
        for i in 0..components {
            let _id = self.byte()?;
            let selectors = self.byte()?;
            if i == 0 {
                table_id = selectors >> 4;
            }
        }
        let selection_value = self.byte()?;
        let end_spectral = self.byte()?;
        let approx = self.byte()?;
        Ok(ScanHeader {
            selection_value,
            end_spectral,
            approx_high: approx >> 4,
            approx_low: approx & 0x0F,
            table_id,
        })
    }
}
