//! Interface for delegating non-lossless JPEG-family codestreams
//! to an image decoder provided by the host platform.
//!
//! The library decodes Process 14 (JPEG Lossless) natively;
//! baseline JPEG, JPEG-LS and JPEG 2000 payloads are handed
//! to whatever implementation of [`PlatformImageDecoder`]
//! the application registers on the decoder.
//! Without one, such payloads are reported as unsupported.

/// A decoded image as produced by a platform image decoder.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    /// image width in pixels
    pub width: u32,
    /// image height in pixels
    pub height: u32,
    /// bits per color component (8 or 16)
    pub bits_per_component: u8,
    /// number of color components per pixel (1 or 3)
    pub channels: u8,
    /// component data, row-major, interleaved, native endian
    pub pixels: Vec<u8>,
}

/// An opaque image decoder supplied by the host platform.
pub trait PlatformImageDecoder: Send + Sync {
    /// Decode a complete compressed codestream.
    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, Box<dyn std::error::Error + Send + Sync>>;
}
