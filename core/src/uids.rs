//! Transfer syntax UID constants.

/// Implicit VR Little Endian: Default Transfer Syntax for DICOM
pub const IMPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2";

/// Explicit VR Little Endian
pub const EXPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2.1";

/// Explicit VR Big Endian (retired)
pub const EXPLICIT_VR_BIG_ENDIAN: &str = "1.2.840.10008.1.2.2";

/// JPEG Baseline (Process 1)
pub const JPEG_BASELINE: &str = "1.2.840.10008.1.2.4.50";

/// JPEG Extended (Process 2 & 4)
pub const JPEG_EXTENDED: &str = "1.2.840.10008.1.2.4.51";

/// JPEG Lossless, Non-Hierarchical (Process 14)
pub const JPEG_LOSSLESS: &str = "1.2.840.10008.1.2.4.57";

/// JPEG Lossless, Non-Hierarchical, First-Order Prediction
/// (Process 14 [Selection Value 1])
pub const JPEG_LOSSLESS_SV1: &str = "1.2.840.10008.1.2.4.70";

/// JPEG-LS Lossless Image Compression
pub const JPEG_LS_LOSSLESS: &str = "1.2.840.10008.1.2.4.80";

/// JPEG-LS Lossy (Near-Lossless) Image Compression
pub const JPEG_LS_LOSSY: &str = "1.2.840.10008.1.2.4.81";

/// JPEG 2000 Image Compression (Lossless Only)
pub const JPEG_2000_LOSSLESS: &str = "1.2.840.10008.1.2.4.90";

/// JPEG 2000 Image Compression
pub const JPEG_2000: &str = "1.2.840.10008.1.2.4.91";
