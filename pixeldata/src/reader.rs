//! Extraction of native (uncompressed) pixel buffers.
//!
//! All functions here are pure over `(bytes, parameters)`:
//! they validate the requested metrics with overflow-safe arithmetic,
//! assemble the output buffer with the requested endianness,
//! normalize signed samples into the unsigned range,
//! and apply MONOCHROME1 inversion where asked.
//! No function returns a partially filled buffer.

use byteordered::Endianness;
use dcmview_core::PhotometricInterpretation;

use crate::pool;
use crate::{InvalidPixelDataSnafu, Result};

/// Largest accepted image dimension, in pixels.
const MAX_DIMENSION: i64 = 65_536;

/// Largest accepted pixel buffer, in bytes.
const MAX_BYTES: u64 = 2 << 30;

/// Pixel counts up to this bound draw scratch space from the buffer pool.
const POOL_LIMIT: usize = 4_194_304;

/// Validated pixel metrics for one read.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Metrics {
    pub pixel_count: usize,
    pub byte_count: usize,
}

/// Validate dimensions and compute byte counts without overflow.
///
/// `available` is the number of value bytes present in the buffer
/// from the read's start offset.
pub(crate) fn validate_metrics(
    width: i64,
    height: i64,
    bytes_per_pixel: u64,
    available: usize,
) -> Result<Metrics> {
    if width < 1 || height < 1 {
        return InvalidPixelDataSnafu {
            reason: format!("non-positive dimensions {}x{}", width, height),
        }
        .fail();
    }
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return InvalidPixelDataSnafu {
            reason: format!(
                "dimensions {}x{} exceed the {} pixel cap",
                width, height, MAX_DIMENSION
            ),
        }
        .fail();
    }
    let pixel_count = (width as u64)
        .checked_mul(height as u64)
        .filter(|&count| count <= i64::MAX as u64)
        .ok_or_else(|| {
            InvalidPixelDataSnafu {
                reason: "pixel count overflows".to_string(),
            }
            .build()
        })?;
    let byte_count = pixel_count.checked_mul(bytes_per_pixel).ok_or_else(|| {
        InvalidPixelDataSnafu {
            reason: "byte count overflows".to_string(),
        }
        .build()
    })?;
    if byte_count > MAX_BYTES {
        return InvalidPixelDataSnafu {
            reason: format!("pixel buffer of {} bytes exceeds the 2 GiB cap", byte_count),
        }
        .fail();
    }
    if byte_count > available as u64 {
        return InvalidPixelDataSnafu {
            reason: format!(
                "pixel data requires {} bytes, {} available",
                byte_count, available
            ),
        }
        .fail();
    }
    Ok(Metrics {
        pixel_count: pixel_count as usize,
        byte_count: byte_count as usize,
    })
}

fn value_bytes(data: &[u8], offset: usize) -> Result<&[u8]> {
    data.get(offset..).ok_or_else(|| {
        InvalidPixelDataSnafu {
            reason: format!("pixel data offset {} outside the buffer", offset),
        }
        .build()
    })
}

/// Read a full 8-bit grayscale image.
pub fn read_gray8(
    data: &[u8],
    offset: usize,
    width: i64,
    height: i64,
    photometric: &PhotometricInterpretation,
) -> Result<Vec<u8>> {
    let src = value_bytes(data, offset)?;
    let metrics = validate_metrics(width, height, 1, src.len())?;
    read_gray8_slice(&src[..metrics.byte_count], metrics.pixel_count, photometric)
}

/// Read an 8-bit grayscale pixel range `[lo, hi)`, in pixel units.
pub fn read_gray8_range(
    data: &[u8],
    offset: usize,
    width: i64,
    height: i64,
    range: std::ops::Range<usize>,
    photometric: &PhotometricInterpretation,
) -> Result<Vec<u8>> {
    let src = value_bytes(data, offset)?;
    let count = validate_range(width, height, &range, 1, src.len())?;
    let lo = range.start;
    read_gray8_slice(&src[lo..lo + count], count, photometric)
}

fn read_gray8_slice(
    src: &[u8],
    pixel_count: usize,
    photometric: &PhotometricInterpretation,
) -> Result<Vec<u8>> {
    let invert = photometric.is_inverted();
    if pixel_count <= POOL_LIMIT {
        let mut scratch = pool::acquire::<u8>(pixel_count);
        scratch.copy_from_slice(src);
        if invert {
            for v in scratch.iter_mut() {
                *v = 255 - *v;
            }
        }
        Ok(scratch.into_exact_vec())
    } else {
        let mut out = src.to_vec();
        if invert {
            for v in out.iter_mut() {
                *v = 255 - *v;
            }
        }
        Ok(out)
    }
}

/// Read a full 16-bit grayscale image.
///
/// Unsigned samples are copied with the requested byte order;
/// signed samples (Pixel Representation = 1) are shifted by +32768
/// and clamped into `0..=65535`.
/// MONOCHROME1 inversion applies to the unsigned (shifted) values.
pub fn read_gray16(
    data: &[u8],
    offset: usize,
    width: i64,
    height: i64,
    endianness: Endianness,
    signed: bool,
    photometric: &PhotometricInterpretation,
) -> Result<Vec<u16>> {
    let src = value_bytes(data, offset)?;
    let metrics = validate_metrics(width, height, 2, src.len())?;
    read_gray16_slice(
        &src[..metrics.byte_count],
        metrics.pixel_count,
        endianness,
        signed,
        photometric,
    )
}

/// Read a 16-bit grayscale pixel range `[lo, hi)`, in pixel units.
pub fn read_gray16_range(
    data: &[u8],
    offset: usize,
    width: i64,
    height: i64,
    range: std::ops::Range<usize>,
    endianness: Endianness,
    signed: bool,
    photometric: &PhotometricInterpretation,
) -> Result<Vec<u16>> {
    let src = value_bytes(data, offset)?;
    let count = validate_range(width, height, &range, 2, src.len())?;
    let lo_byte = range.start * 2;
    read_gray16_slice(
        &src[lo_byte..lo_byte + count * 2],
        count,
        endianness,
        signed,
        photometric,
    )
}

fn read_gray16_slice(
    src: &[u8],
    pixel_count: usize,
    endianness: Endianness,
    signed: bool,
    photometric: &PhotometricInterpretation,
) -> Result<Vec<u16>> {
    let invert = photometric.is_inverted();

    let fill = |out: &mut [u16]| {
        match (signed, endianness) {
            (false, Endianness::Little) => {
                for (dst, chunk) in out.iter_mut().zip(src.chunks_exact(2)) {
                    *dst = u16::from_le_bytes([chunk[0], chunk[1]]);
                }
            }
            (false, Endianness::Big) => {
                for (dst, chunk) in out.iter_mut().zip(src.chunks_exact(2)) {
                    *dst = u16::from_be_bytes([chunk[0], chunk[1]]);
                }
            }
            (true, _) => {
                for (dst, chunk) in out.iter_mut().zip(src.chunks_exact(2)) {
                    let raw = match endianness {
                        Endianness::Little => i16::from_le_bytes([chunk[0], chunk[1]]),
                        Endianness::Big => i16::from_be_bytes([chunk[0], chunk[1]]),
                    };
                    // integer shift into the unsigned range; exact for all i16
                    *dst = (i32::from(raw) + 32_768).clamp(0, 65_535) as u16;
                }
            }
        }
        if invert {
            for v in out.iter_mut() {
                *v = 65_535 - *v;
            }
        }
    };

    if pixel_count <= POOL_LIMIT {
        let mut scratch = pool::acquire::<u16>(pixel_count);
        fill(&mut scratch);
        Ok(scratch.into_exact_vec())
    } else {
        let mut out = vec![0u16; pixel_count];
        fill(&mut out);
        Ok(out)
    }
}

/// Read a full 24-bit RGB image as interleaved `R, G, B` bytes.
pub fn read_rgb24(data: &[u8], offset: usize, width: i64, height: i64) -> Result<Vec<u8>> {
    let src = value_bytes(data, offset)?;
    let metrics = validate_metrics(width, height, 3, src.len())?;
    Ok(src[..metrics.byte_count].to_vec())
}

/// Read a 24-bit RGB pixel range `[lo, hi)`, in pixel units.
pub fn read_rgb24_range(
    data: &[u8],
    offset: usize,
    width: i64,
    height: i64,
    range: std::ops::Range<usize>,
) -> Result<Vec<u8>> {
    let src = value_bytes(data, offset)?;
    let count = validate_range(width, height, &range, 3, src.len())?;
    let lo_byte = range.start * 3;
    Ok(src[lo_byte..lo_byte + count * 3].to_vec())
}

/// Validate a pixel range against the image metrics.
///
/// Mirrors the full-read checks with the range's pixel count
/// in place of `width * height`;
/// only the bytes the range touches must be present.
/// Returns the number of pixels in the range.
fn validate_range(
    width: i64,
    height: i64,
    range: &std::ops::Range<usize>,
    bytes_per_pixel: u64,
    available: usize,
) -> Result<usize> {
    if width < 1 || height < 1 || width > MAX_DIMENSION || height > MAX_DIMENSION {
        return InvalidPixelDataSnafu {
            reason: format!("dimensions {}x{} out of range", width, height),
        }
        .fail();
    }
    let pixel_count = (width as u64)
        .checked_mul(height as u64)
        .filter(|&count| count <= i64::MAX as u64)
        .ok_or_else(|| {
            InvalidPixelDataSnafu {
                reason: "pixel count overflows".to_string(),
            }
            .build()
        })?;
    if range.start >= range.end || range.end as u64 > pixel_count {
        return InvalidPixelDataSnafu {
            reason: format!(
                "pixel range {}..{} outside image of {} pixels",
                range.start, range.end, pixel_count
            ),
        }
        .fail();
    }
    let count = range.end - range.start;
    let end_byte = (range.end as u64).checked_mul(bytes_per_pixel).ok_or_else(|| {
        InvalidPixelDataSnafu {
            reason: "byte count overflows".to_string(),
        }
        .build()
    })?;
    if count as u64 * bytes_per_pixel > MAX_BYTES {
        return InvalidPixelDataSnafu {
            reason: "ranged buffer exceeds the 2 GiB cap".to_string(),
        }
        .fail();
    }
    if end_byte > available as u64 {
        return InvalidPixelDataSnafu {
            reason: format!(
                "pixel range requires {} bytes, {} available",
                end_byte, available
            ),
        }
        .fail();
    }
    Ok(count)
}

/// Nearest-neighbor downsampling of a grayscale buffer
/// so that the longer edge fits `max_dim`, preserving aspect ratio.
///
/// Images already within bounds are returned unchanged.
pub fn downsample<T: Copy>(
    pixels: &[T],
    width: u32,
    height: u32,
    max_dim: u32,
) -> Result<(Vec<T>, u32, u32)> {
    if width == 0 || height == 0 || pixels.len() != (width as usize) * (height as usize) {
        return InvalidPixelDataSnafu {
            reason: format!(
                "buffer of {} pixels does not match {}x{}",
                pixels.len(),
                width,
                height
            ),
        }
        .fail();
    }
    if max_dim == 0 {
        return InvalidPixelDataSnafu {
            reason: "target dimension must be positive".to_string(),
        }
        .fail();
    }
    let longest = width.max(height);
    if longest <= max_dim {
        return Ok((pixels.to_vec(), width, height));
    }

    let scale = f64::from(max_dim) / f64::from(longest);
    let out_w = ((f64::from(width) * scale) as u32).max(1);
    let out_h = ((f64::from(height) * scale) as u32).max(1);

    let mut out = Vec::with_capacity(out_w as usize * out_h as usize);
    for y in 0..out_h {
        let src_y = ((f64::from(y) / scale) as u32).min(height - 1);
        let row = src_y as usize * width as usize;
        for x in 0..out_w {
            let src_x = ((f64::from(x) / scale) as u32).min(width - 1);
            out.push(pixels[row + src_x as usize]);
        }
    }
    Ok((out, out_w, out_h))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use dcmview_core::PhotometricInterpretation as PI;

    fn le_bytes(samples: &[u16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    fn be_bytes(samples: &[u16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_be_bytes()).collect()
    }

    #[test]
    fn reads_unsigned_little_endian() {
        let data = le_bytes(&[0, 255, 256, 0xFFFE, 1, 2, 3, 4]);
        let out = read_gray16(&data, 0, 4, 2, Endianness::Little, false, &PI::Monochrome2).unwrap();
        assert_eq!(out, vec![0, 255, 256, 0xFFFE, 1, 2, 3, 4]);
    }

    #[test]
    fn reads_unsigned_big_endian() {
        let data = be_bytes(&[0x0102, 0xFFEE]);
        let out = read_gray16(&data, 0, 2, 1, Endianness::Big, false, &PI::Monochrome2).unwrap();
        assert_eq!(out, vec![0x0102, 0xFFEE]);
    }

    #[test]
    fn monochrome1_inverts() {
        let data = le_bytes(&[0, 255, 256, 0xFFFE, 1, 2, 3, 4]);
        let out = read_gray16(&data, 0, 4, 2, Endianness::Little, false, &PI::Monochrome1).unwrap();
        assert_eq!(out, vec![65535, 65280, 65279, 1, 65534, 65533, 65532, 65531]);
    }

    #[test]
    fn monochrome1_inversion_is_involutive() {
        let data = le_bytes(&[7, 1000, 65535]);
        let once = read_gray16(&data, 0, 3, 1, Endianness::Little, false, &PI::Monochrome1).unwrap();
        let twice: Vec<u16> = once.iter().map(|&v| 65535 - v).collect();
        assert_eq!(twice, vec![7, 1000, 65535]);
    }

    #[test]
    fn signed_samples_shift_into_unsigned_range() {
        let samples: Vec<u8> = [-32768i16, -1, 0, 32767]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();
        let out =
            read_gray16(&samples, 0, 4, 1, Endianness::Little, true, &PI::Monochrome2).unwrap();
        assert_eq!(out, vec![0, 32767, 32768, 65535]);
    }

    #[test]
    fn signed_shift_matches_clamp_formula_everywhere() {
        // every i16 value maps exactly to clamp(s + 32768, 0, 65535)
        let all: Vec<i16> = (i16::MIN..=i16::MAX).step_by(257).collect();
        let bytes: Vec<u8> = all.iter().flat_map(|s| s.to_le_bytes()).collect();
        let out = read_gray16(
            &bytes,
            0,
            all.len() as i64,
            1,
            Endianness::Little,
            true,
            &PI::Monochrome2,
        )
        .unwrap();
        for (s, v) in all.iter().zip(&out) {
            assert_eq!(i64::from(*v), (i64::from(*s) + 32768).clamp(0, 65535));
        }
    }

    #[test]
    fn range_read_matches_full_read() {
        let samples: Vec<u16> = (0..64).map(|i| i * 100).collect();
        let data = le_bytes(&samples);
        let full = read_gray16(&data, 0, 8, 8, Endianness::Little, false, &PI::Monochrome2).unwrap();
        let range = read_gray16_range(
            &data,
            0,
            8,
            8,
            10..30,
            Endianness::Little,
            false,
            &PI::Monochrome2,
        )
        .unwrap();
        assert_eq!(&full[10..30], &range[..]);
    }

    #[test]
    fn single_pixel_image() {
        let data = le_bytes(&[42]);
        let out = read_gray16(&data, 0, 1, 1, Endianness::Little, false, &PI::Monochrome2).unwrap();
        assert_eq!(out, vec![42]);
    }

    #[test]
    fn oversized_dimensions_are_rejected() {
        let data = [0u8; 16];
        let err = read_gray16(
            &data,
            0,
            65_537,
            1,
            Endianness::Little,
            false,
            &PI::Monochrome2,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidPixelData { .. }));
    }

    #[test]
    fn truncated_pixel_data_is_rejected() {
        let data = [0u8; 6];
        let err = read_gray16(&data, 0, 2, 2, Endianness::Little, false, &PI::Monochrome2)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPixelData { .. }));
    }

    #[test]
    fn rgb_preserves_channel_order() {
        let data = [1, 2, 3, 4, 5, 6];
        let out = read_rgb24(&data, 0, 2, 1).unwrap();
        assert_eq!(out, vec![1, 2, 3, 4, 5, 6]);
        let sub = read_rgb24_range(&data, 0, 2, 1, 1..2).unwrap();
        assert_eq!(sub, vec![4, 5, 6]);
    }

    #[test]
    fn gray8_inversion() {
        let data = [0u8, 10, 255];
        let out = read_gray8(&data, 0, 3, 1, &PI::Monochrome1).unwrap();
        assert_eq!(out, vec![255, 245, 0]);
    }

    #[test]
    fn downsampling_preserves_aspect() {
        let pixels: Vec<u16> = (0..32).collect();
        let (out, w, h) = downsample(&pixels, 8, 4, 4).unwrap();
        assert_eq!((w, h), (4, 2));
        assert_eq!(out.len(), 8);
        // top-left pixel always survives nearest-neighbor
        assert_eq!(out[0], pixels[0]);
    }

    #[test]
    fn downsampling_within_bounds_is_identity() {
        let pixels: Vec<u16> = (0..12).collect();
        let (out, w, h) = downsample(&pixels, 4, 3, 8).unwrap();
        assert_eq!((w, h), (4, 3));
        assert_eq!(out, pixels);
    }
}
