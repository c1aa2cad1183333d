#![deny(trivial_numeric_casts, unsafe_code, unstable_features)]
#![warn(missing_debug_implementations, unused_qualifications, unused_import_braces)]

//! Pixel extraction and display mapping for dcmview.
//!
//! This crate turns a decoded DICOM object into pixel buffers:
//! native 8/16-bit grayscale and 24-bit RGB reads (full or ranged),
//! a native JPEG Lossless (Process 14) decoder for encapsulated data,
//! the window/level transform with CPU and GPU backends,
//! medical windowing presets,
//! and composition of slice directories into volumes.
//!
//! Pixel access is an extension of [`dcmview_object::Decoder`]:
//!
//! ```no_run
//! use dcmview_object::Decoder;
//! use dcmview_pixeldata::{windowing, PixelDecoder};
//!
//! let obj = Decoder::load_from_path("slice.dcm")?;
//! let samples = obj.pixels_u16()?;
//! let display = windowing::apply(
//!     &samples,
//!     obj.window_settings(),
//!     dcmview_pixeldata::windowing::Mode::Auto,
//! )?;
//! # Result::<(), Box<dyn std::error::Error>>::Ok(())
//! ```

use std::ops::Range;
use std::path::PathBuf;

use snafu::{Backtrace, Snafu};

use dcmview_core::CancelFlag;
use dcmview_object::Decoder;
use dcmview_parser::Compression;

pub mod jpeg_lossless;
pub mod pool;
pub mod presets;
pub mod reader;
pub mod series;
pub mod windowing;

pub use presets::{preset_for, suggest, MedicalPreset};
pub use series::{load_series, NoProgress, ProgressSink, SeriesVolume};
pub use windowing::{calculate_optimal, set_compute_device, ComputeDevice, Mode};

/// Error type for pixel, windowing, and series operations.
#[derive(Debug, Snafu)]
#[non_exhaustive]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    /// Bounds, alignment, or layout problems while reading pixels.
    #[snafu(display("Invalid pixel data: {}", reason))]
    InvalidPixelData {
        reason: String,
        backtrace: Backtrace,
    },

    /// The pixel encoding requires a capability this build lacks.
    #[snafu(display("Unsupported: {}", what))]
    Unsupported { what: String, backtrace: Backtrace },

    /// The compressed codestream is not a valid Process 14 stream.
    #[snafu(display("Invalid JPEG Lossless stream: {}", reason))]
    InvalidJpegLossless {
        reason: String,
        backtrace: Backtrace,
    },

    /// Window settings with a non-positive width.
    #[snafu(display("Invalid window level (center {}, width {})", center, width))]
    InvalidWindowLevel {
        center: f64,
        width: f64,
        backtrace: Backtrace,
    },

    /// A specific backend was demanded but cannot run.
    #[snafu(display("Windowing backend `{}` unavailable", backend))]
    BackendUnavailable { backend: String, backtrace: Backtrace },

    /// A slice disagrees with the geometry of the series.
    #[snafu(display("Inconsistent slice geometry in {}", path.display()))]
    InconsistentGeometry { path: PathBuf, backtrace: Backtrace },

    /// The operation was aborted through its cancellation flag.
    #[snafu(display("Operation cancelled"))]
    Cancelled { backtrace: Backtrace },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A decoded pixel buffer and its descriptive parameters.
///
/// Exactly one of the three buffer variants is populated.
#[derive(Debug, Default)]
pub struct PixelReadResult {
    /// 8-bit grayscale samples
    pub pixels8: Option<Vec<u8>>,
    /// 16-bit grayscale samples
    /// (signed input already normalized to unsigned)
    pub pixels16: Option<Vec<u16>>,
    /// interleaved 8-bit RGB samples
    pub pixels24: Option<Vec<u8>>,
    /// whether the stored samples were signed
    pub signed_image: bool,
    /// image width in pixels
    pub width: u32,
    /// image height in pixels
    pub height: u32,
    /// meaningful bits per sample
    pub bit_depth: u16,
    /// samples per pixel (1 or 3)
    pub samples_per_pixel: u16,
}

/// Pixel access over a decoded DICOM object.
///
/// Implemented for [`Decoder`]; uncompressed images read directly
/// from the file buffer, encapsulated images run through
/// the JPEG Lossless decoder or the registered platform decoder.
pub trait PixelDecoder {
    /// Read the image into whichever buffer variant fits its encoding.
    fn read_pixels(&self) -> Result<PixelReadResult> {
        self.read_pixels_with(&CancelFlag::new())
    }

    /// Like [`read_pixels`](PixelDecoder::read_pixels),
    /// polling the given flag so long decodes can be aborted.
    fn read_pixels_with(&self, cancel: &CancelFlag) -> Result<PixelReadResult>;

    /// The full image as 8-bit grayscale.
    fn pixels_u8(&self) -> Result<Vec<u8>>;

    /// The full image as 16-bit grayscale.
    fn pixels_u16(&self) -> Result<Vec<u16>>;

    /// The full image as interleaved RGB bytes.
    fn pixels_rgb(&self) -> Result<Vec<u8>>;

    /// A pixel range `[lo, hi)` of an 8-bit grayscale image.
    fn pixels_range_u8(&self, range: Range<usize>) -> Result<Vec<u8>>;

    /// A pixel range `[lo, hi)` of a 16-bit grayscale image.
    fn pixels_range_u16(&self, range: Range<usize>) -> Result<Vec<u16>>;

    /// A pixel range `[lo, hi)` of an RGB image.
    fn pixels_range_rgb(&self, range: Range<usize>) -> Result<Vec<u8>>;

    /// The image downsampled so its longer edge fits `max_dim`,
    /// as 16-bit grayscale with the output dimensions.
    fn downsampled_u16(&self, max_dim: u32) -> Result<(Vec<u16>, u32, u32)>;

    /// The image downsampled so its longer edge fits `max_dim`,
    /// as 8-bit grayscale with the output dimensions.
    fn downsampled_u8(&self, max_dim: u32) -> Result<(Vec<u8>, u32, u32)>;
}

/// The pixel data offset and byte length of a native (uncompressed) image.
fn native_location(decoder: &Decoder) -> Result<(usize, usize)> {
    let info = decoder.pixel_data_info().ok_or_else(|| {
        InvalidPixelDataSnafu {
            reason: "no pixel data element".to_string(),
        }
        .build()
    })?;
    if info.encapsulated {
        return InvalidPixelDataSnafu {
            reason: "pixel data is encapsulated".to_string(),
        }
        .fail();
    }
    let length = info.length.unwrap_or(0);
    Ok((info.offset, length))
}

fn assemble_codestream(decoder: &Decoder) -> Result<Vec<u8>> {
    decoder.compressed_stream().map_err(|e| match e {
        dcmview_object::Error::Unsupported { what, .. } => UnsupportedSnafu { what }.build(),
        other => InvalidPixelDataSnafu {
            reason: other.to_string(),
        }
        .build(),
    })
}

/// Decode an encapsulated image through the decoder
/// matching its compression family.
fn read_compressed(decoder: &Decoder, cancel: &CancelFlag) -> Result<PixelReadResult> {
    match decoder.compression() {
        Compression::JpegLossless => {
            let stream = assemble_codestream(decoder)?;
            let first_order_only = decoder.transfer_syntax().requires_first_order_prediction();
            let decoded = jpeg_lossless::decode(&stream, first_order_only, cancel)?;

            let mut pixels = decoded.pixels;
            if decoder.photometric_interpretation().is_inverted() {
                let max = ((1u32 << decoded.precision) - 1) as u16;
                for v in pixels.iter_mut() {
                    *v = max - *v;
                }
            }
            Ok(PixelReadResult {
                pixels16: Some(pixels),
                signed_image: false,
                width: decoded.width,
                height: decoded.height,
                bit_depth: u16::from(decoded.precision),
                samples_per_pixel: 1,
                ..Default::default()
            })
        }
        Compression::JpegOther => {
            let platform = decoder.platform_decoder().ok_or_else(|| {
                UnsupportedSnafu {
                    what: format!(
                        "transfer syntax {} needs a platform image decoder",
                        decoder.transfer_syntax_uid()
                    ),
                }
                .build()
            })?;
            let stream = assemble_codestream(decoder)?;
            let image = platform.decode(&stream).map_err(|e| {
                InvalidPixelDataSnafu {
                    reason: format!("platform image decoder failed: {}", e),
                }
                .build()
            })?;
            platform_image_to_result(image)
        }
        Compression::None => UnsupportedSnafu {
            what: format!(
                "encapsulated pixel data under transfer syntax {}",
                decoder.transfer_syntax_uid()
            ),
        }
        .fail(),
    }
}

fn platform_image_to_result(image: dcmview_object::DecodedImage) -> Result<PixelReadResult> {
    let pixel_count = image.width as usize * image.height as usize;
    let mut result = PixelReadResult {
        width: image.width,
        height: image.height,
        bit_depth: u16::from(image.bits_per_component),
        samples_per_pixel: u16::from(image.channels),
        ..Default::default()
    };
    match (image.channels, image.bits_per_component) {
        (3, 8) if image.pixels.len() >= pixel_count * 3 => {
            let mut pixels = image.pixels;
            pixels.truncate(pixel_count * 3);
            result.pixels24 = Some(pixels);
        }
        (1, 8) if image.pixels.len() >= pixel_count => {
            let mut pixels = image.pixels;
            pixels.truncate(pixel_count);
            result.pixels8 = Some(pixels);
        }
        (1, 16) if image.pixels.len() >= pixel_count * 2 => {
            let samples: Vec<u16> = image.pixels[..pixel_count * 2]
                .chunks_exact(2)
                .map(|c| u16::from_ne_bytes([c[0], c[1]]))
                .collect();
            result.pixels16 = Some(samples);
        }
        (channels, bits) => {
            return UnsupportedSnafu {
                what: format!(
                    "platform-decoded image with {} channels at {} bits",
                    channels, bits
                ),
            }
            .fail();
        }
    }
    Ok(result)
}

impl PixelDecoder for Decoder {
    fn read_pixels_with(&self, cancel: &CancelFlag) -> Result<PixelReadResult> {
        if self.compressed() {
            return read_compressed(self, cancel);
        }

        let width = i64::from(self.width());
        let height = i64::from(self.height());
        let photometric = self.photometric_interpretation();
        let (offset, length) = native_location(self)?;
        let end = offset + length;
        let data = &self.data()[..end.min(self.data().len())];

        match (self.samples_per_pixel(), self.bit_depth()) {
            (1, 8) => {
                let pixels = reader::read_gray8(data, offset, width, height, &photometric)?;
                Ok(PixelReadResult {
                    pixels8: Some(pixels),
                    width: self.width(),
                    height: self.height(),
                    bit_depth: 8,
                    samples_per_pixel: 1,
                    ..Default::default()
                })
            }
            (1, 16) => {
                let signed = self.signed_image();
                let pixels = reader::read_gray16(
                    data,
                    offset,
                    width,
                    height,
                    self.transfer_syntax().endianness,
                    signed,
                    &photometric,
                )?;
                Ok(PixelReadResult {
                    pixels16: Some(pixels),
                    signed_image: signed,
                    width: self.width(),
                    height: self.height(),
                    bit_depth: 16,
                    samples_per_pixel: 1,
                    ..Default::default()
                })
            }
            (3, 8) => {
                let pixels = reader::read_rgb24(data, offset, width, height)?;
                Ok(PixelReadResult {
                    pixels24: Some(pixels),
                    width: self.width(),
                    height: self.height(),
                    bit_depth: 8,
                    samples_per_pixel: 3,
                    ..Default::default()
                })
            }
            (samples, bits) => UnsupportedSnafu {
                what: format!("{} samples per pixel at {} bits", samples, bits),
            }
            .fail(),
        }
    }

    fn pixels_u8(&self) -> Result<Vec<u8>> {
        let result = self.read_pixels()?;
        result.pixels8.ok_or_else(|| {
            InvalidPixelDataSnafu {
                reason: "image is not 8-bit grayscale".to_string(),
            }
            .build()
        })
    }

    fn pixels_u16(&self) -> Result<Vec<u16>> {
        let result = self.read_pixels()?;
        result.pixels16.ok_or_else(|| {
            InvalidPixelDataSnafu {
                reason: "image is not 16-bit grayscale".to_string(),
            }
            .build()
        })
    }

    fn pixels_rgb(&self) -> Result<Vec<u8>> {
        let result = self.read_pixels()?;
        result.pixels24.ok_or_else(|| {
            InvalidPixelDataSnafu {
                reason: "image is not RGB".to_string(),
            }
            .build()
        })
    }

    fn pixels_range_u8(&self, range: Range<usize>) -> Result<Vec<u8>> {
        if self.compressed() {
            let full = self.pixels_u8()?;
            return slice_range(full, range);
        }
        let (offset, length) = native_location(self)?;
        let data = &self.data()[..(offset + length).min(self.data().len())];
        reader::read_gray8_range(
            data,
            offset,
            i64::from(self.width()),
            i64::from(self.height()),
            range,
            &self.photometric_interpretation(),
        )
    }

    fn pixels_range_u16(&self, range: Range<usize>) -> Result<Vec<u16>> {
        if self.compressed() {
            let full = self.pixels_u16()?;
            return slice_range(full, range);
        }
        let (offset, length) = native_location(self)?;
        let data = &self.data()[..(offset + length).min(self.data().len())];
        reader::read_gray16_range(
            data,
            offset,
            i64::from(self.width()),
            i64::from(self.height()),
            range,
            self.transfer_syntax().endianness,
            self.signed_image(),
            &self.photometric_interpretation(),
        )
    }

    fn pixels_range_rgb(&self, range: Range<usize>) -> Result<Vec<u8>> {
        if self.compressed() {
            let full = self.pixels_rgb()?;
            let scaled = range.start * 3..range.end * 3;
            return slice_range(full, scaled);
        }
        let (offset, length) = native_location(self)?;
        let data = &self.data()[..(offset + length).min(self.data().len())];
        reader::read_rgb24_range(
            data,
            offset,
            i64::from(self.width()),
            i64::from(self.height()),
            range,
        )
    }

    fn downsampled_u16(&self, max_dim: u32) -> Result<(Vec<u16>, u32, u32)> {
        let result = self.read_pixels()?;
        let pixels = result.pixels16.ok_or_else(|| {
            InvalidPixelDataSnafu {
                reason: "image is not 16-bit grayscale".to_string(),
            }
            .build()
        })?;
        reader::downsample(&pixels, result.width, result.height, max_dim)
    }

    fn downsampled_u8(&self, max_dim: u32) -> Result<(Vec<u8>, u32, u32)> {
        let result = self.read_pixels()?;
        let pixels = result.pixels8.ok_or_else(|| {
            InvalidPixelDataSnafu {
                reason: "image is not 8-bit grayscale".to_string(),
            }
            .build()
        })?;
        reader::downsample(&pixels, result.width, result.height, max_dim)
    }
}

fn slice_range<T: Copy>(full: Vec<T>, range: Range<usize>) -> Result<Vec<T>> {
    full.get(range.clone())
        .map(|s| s.to_vec())
        .ok_or_else(|| {
            InvalidPixelDataSnafu {
                reason: format!(
                    "pixel range {}..{} outside image of {} samples",
                    range.start,
                    range.end,
                    full.len()
                ),
            }
            .build()
        })
}
