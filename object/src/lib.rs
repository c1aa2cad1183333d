#![deny(trivial_numeric_casts, unsafe_code, unstable_features)]
#![warn(missing_docs, unused_qualifications, unused_import_braces)]

//! High-level decoding of single-image DICOM files.
//!
//! The central type is the [`Decoder`]:
//! construct one with [`Decoder::load_from_path`]
//! or [`Decoder::load_from_bytes`],
//! then read typed metadata through its accessors.
//! Pixel extraction is provided by the pixel data crate,
//! which extends the decoder with its reader trait.
//!
//! ```no_run
//! use dcmview_object::Decoder;
//!
//! let obj = Decoder::load_from_path("image.dcm")?;
//! println!("{}x{} {}", obj.width(), obj.height(), obj.modality());
//! # Result::<(), dcmview_object::Error>::Ok(())
//! ```

mod decoder;
pub mod platform;

pub use decoder::{Decoder, Error, Result, ValidationReport, MAX_DIMENSION};
pub use platform::{DecodedImage, PlatformImageDecoder};
