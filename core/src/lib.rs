#![crate_type = "lib"]
#![deny(trivial_casts, trivial_numeric_casts, unsafe_code, unstable_features)]
#![warn(
    missing_debug_implementations,
    missing_docs,
    unused_qualifications,
    unused_import_braces
)]

//! Core types for the dcmview DICOM decoding library:
//! attribute tags, value representations,
//! element metadata records,
//! the standard tag dictionary,
//! and the value types shared by the decoding and display layers.

pub mod dictionary;
pub mod header;
pub mod tags;
pub mod types;
pub mod uids;

pub use dictionary::{dictionary, vr_of, TagDictionary};
pub use header::{Tag, TagMetadata, VR};
pub use types::{
    CancelFlag, PhotometricInterpretation, PixelSpacing, RescaleParameters, WindowSettings,
};
