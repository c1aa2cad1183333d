//! A library for decoding single-image DICOM files:
//! parsing the binary container, extracting metadata,
//! reading pixel buffers,
//! and mapping 16-bit samples to 8-bit display values
//! through a window/level transform.
//!
//! This crate re-exports the member crates of the workspace
//! under one name:
//!
//! - [`core`]: tags, value representations, dictionaries, value types
//! - [`parser`]: the byte-stream parser and lazy tag store
//! - [`object`]: the high-level [`Decoder`](object::Decoder)
//! - [`pixeldata`]: pixel extraction, JPEG Lossless, windowing, series
//!
//! ```no_run
//! use dcmview::object::Decoder;
//! use dcmview::pixeldata::{windowing, Mode, PixelDecoder};
//!
//! let obj = Decoder::load_from_path("slice.dcm")?;
//! let samples = obj.pixels_u16()?;
//! let display = windowing::apply(&samples, obj.window_settings(), Mode::Auto)?;
//! # Result::<(), Box<dyn std::error::Error>>::Ok(())
//! ```

pub use dcmview_core as core;
pub use dcmview_object as object;
pub use dcmview_parser as parser;
pub use dcmview_pixeldata as pixeldata;
