#![deny(trivial_numeric_casts, unsafe_code, unstable_features)]
#![warn(missing_debug_implementations, unused_qualifications, unused_import_braces)]

//! DICOM byte-stream parsing for the dcmview library.
//!
//! This crate walks a DICOM file buffer header-first
//! across the four serialization variants
//! (implicit/explicit VR, little/big endian),
//! producing element metadata records,
//! the resolved transfer syntax,
//! and the location of the pixel data value.
//! Values are materialized lazily by the [`LazyTagStore`].

pub mod bytes;
pub mod lazy;
pub mod read;
pub mod testing;
pub mod transfer_syntax;

pub use bytes::ByteReader;
pub use lazy::LazyTagStore;
pub use read::{encapsulated_fragments, is_dicom, parse, ParsedFile, PixelDataInfo};
pub use transfer_syntax::{Compression, TransferSyntax, VrMode};

pub use byteordered::Endianness;
