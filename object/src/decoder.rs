//! The decoder façade: owns a file buffer,
//! parses it on construction,
//! and exposes typed accessors over the parsed metadata.

use std::fmt;
use std::path::{Path, PathBuf};

use snafu::{Backtrace, ResultExt, Snafu};

use dcmview_core::{
    tags, PhotometricInterpretation, PixelSpacing, RescaleParameters, Tag, TagMetadata,
    WindowSettings,
};
use dcmview_parser::read;
use dcmview_parser::{Compression, LazyTagStore, PixelDataInfo, TransferSyntax};

use crate::platform::PlatformImageDecoder;

/// Largest input accepted by the decoder, in bytes.
const MAX_FILE_SIZE: u64 = 2 << 30;

/// Largest accepted image dimension, in pixels.
pub const MAX_DIMENSION: i64 = 65_536;

/// Error type for loading and interrogating a DICOM object.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// The file does not exist.
    #[snafu(display("File {} not found", path.display()))]
    FileNotFound { path: PathBuf, backtrace: Backtrace },

    /// The file could not be read.
    #[snafu(display("Could not read {}", path.display()))]
    Io {
        path: PathBuf,
        source: std::io::Error,
        backtrace: Backtrace,
    },

    /// The input is larger than the supported maximum.
    #[snafu(display("Input of {} bytes exceeds the 2 GiB limit", size))]
    FileTooLarge { size: u64, backtrace: Backtrace },

    /// The input is not recognizable as DICOM data.
    #[snafu(display("Not a DICOM file"))]
    NotDicom { backtrace: Backtrace },

    /// The stream structure violates the serialization rules.
    #[snafu(display("Invalid DICOM data: {}", reason))]
    InvalidFormat {
        reason: String,
        backtrace: Backtrace,
    },

    /// The requested operation needs a capability
    /// this build does not provide.
    #[snafu(display("Unsupported: {}", what))]
    Unsupported { what: String, backtrace: Backtrace },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Outcome of a shallow structural check of a decoded object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    /// whether the object looks structurally usable
    pub valid: bool,
    /// human-readable findings, fatal and benign alike
    pub issues: Vec<String>,
}

/// A decoded single-image DICOM object.
///
/// The decoder owns the raw file buffer for its whole lifetime;
/// all metadata records point into that buffer
/// and string values materialize lazily on first access.
/// Pixel access lives in the pixel data crate,
/// which extends this type through its reader trait.
pub struct Decoder {
    data: Vec<u8>,
    store: LazyTagStore,
    transfer_syntax: TransferSyntax,
    pixel_data: Option<PixelDataInfo>,
    warnings: Vec<String>,
    platform_decoder: Option<Box<dyn PlatformImageDecoder>>,
}

impl fmt::Debug for Decoder {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Decoder")
            .field("size", &self.data.len())
            .field("transfer_syntax", &self.transfer_syntax.uid)
            .field("elements", &self.store.len())
            .field("pixel_data", &self.pixel_data)
            .finish()
    }
}

impl Decoder {
    /// Load and parse a DICOM file from the filesystem.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Decoder> {
        let path = path.as_ref();
        if !path.exists() {
            return FileNotFoundSnafu { path }.fail();
        }
        let size = std::fs::metadata(path).context(IoSnafu { path })?.len();
        if size > MAX_FILE_SIZE {
            return FileTooLargeSnafu { size }.fail();
        }
        let data = std::fs::read(path).context(IoSnafu { path })?;
        Decoder::load_from_bytes(data)
    }

    /// Parse a DICOM file already held in memory.
    pub fn load_from_bytes(data: impl Into<Vec<u8>>) -> Result<Decoder> {
        let data = data.into();
        if data.len() as u64 > MAX_FILE_SIZE {
            return FileTooLargeSnafu {
                size: data.len() as u64,
            }
            .fail();
        }
        let parsed = read::parse(&data).map_err(|e| match e {
            read::Error::NotDicom { .. } => NotDicomSnafu.build(),
            read::Error::InvalidFormat { reason, .. } => InvalidFormatSnafu { reason }.build(),
            other => InvalidFormatSnafu {
                reason: other.to_string(),
            }
            .build(),
        })?;

        tracing::debug!(
            "parsed {} elements, transfer syntax {}, {} warning(s)",
            parsed.store.len(),
            parsed.transfer_syntax.uid,
            parsed.warnings.len()
        );

        Ok(Decoder {
            data,
            store: parsed.store,
            transfer_syntax: parsed.transfer_syntax,
            pixel_data: parsed.pixel_data,
            warnings: parsed.warnings,
            platform_decoder: None,
        })
    }

    /// Register a platform image decoder
    /// for non-lossless JPEG-family pixel data.
    pub fn set_platform_decoder(&mut self, decoder: Box<dyn PlatformImageDecoder>) {
        self.platform_decoder = Some(decoder);
    }

    /// The registered platform image decoder, if any.
    pub fn platform_decoder(&self) -> Option<&dyn PlatformImageDecoder> {
        self.platform_decoder.as_deref()
    }

    /// The raw file buffer.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The transfer syntax the data set was serialized with.
    #[inline]
    pub fn transfer_syntax(&self) -> &TransferSyntax {
        &self.transfer_syntax
    }

    /// Location of the pixel data value, when the parser reached it.
    #[inline]
    pub fn pixel_data_info(&self) -> Option<&PixelDataInfo> {
        self.pixel_data.as_ref()
    }

    /// Whether the pixel data is an encapsulated compressed codestream.
    #[inline]
    pub fn compressed(&self) -> bool {
        self.transfer_syntax.encapsulated
    }

    /// The compression family of the pixel data.
    #[inline]
    pub fn compression(&self) -> Compression {
        self.transfer_syntax.compression
    }

    /// Warnings produced while parsing.
    #[inline]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// The metadata record of an element, if present.
    pub fn metadata(&self, tag: Tag) -> Option<&TagMetadata> {
        self.store.metadata(tag)
    }

    // --- generic accessors ---

    /// The value of an element as a string
    /// (empty when absent or undecodable).
    pub fn tag_string(&self, tag: Tag) -> String {
        self.store.value_string(&self.data, tag)
    }

    /// The value of an element as a signed integer.
    pub fn tag_int(&self, tag: Tag) -> Option<i64> {
        self.store.value_int(&self.data, tag)
    }

    /// The value of an element as a floating-point number.
    pub fn tag_f64(&self, tag: Tag) -> Option<f64> {
        self.store.value_f64(&self.data, tag)
    }

    /// The value of a multi-valued numeric element.
    pub fn tag_f64_list(&self, tag: Tag) -> Option<Vec<f64>> {
        self.store.value_f64_list(&self.data, tag)
    }

    // --- image attributes ---

    /// Image width in pixels (Columns), 0 when absent.
    pub fn width(&self) -> u32 {
        self.tag_int(tags::COLUMNS).unwrap_or(0).max(0) as u32
    }

    /// Image height in pixels (Rows), 0 when absent.
    pub fn height(&self) -> u32 {
        self.tag_int(tags::ROWS).unwrap_or(0).max(0) as u32
    }

    /// Bits allocated per sample; 16 when absent.
    pub fn bit_depth(&self) -> u16 {
        self.tag_int(tags::BITS_ALLOCATED).unwrap_or(16) as u16
    }

    /// Samples per pixel; 1 when absent.
    pub fn samples_per_pixel(&self) -> u16 {
        self.tag_int(tags::SAMPLES_PER_PIXEL).unwrap_or(1) as u16
    }

    /// The photometric interpretation; `MONOCHROME2` when absent.
    pub fn photometric_interpretation(&self) -> PhotometricInterpretation {
        let value = self.tag_string(tags::PHOTOMETRIC_INTERPRETATION);
        if value.is_empty() {
            PhotometricInterpretation::Monochrome2
        } else {
            PhotometricInterpretation::from_attribute(&value)
        }
    }

    /// Whether stored samples are two's-complement signed
    /// (Pixel Representation = 1).
    pub fn signed_image(&self) -> bool {
        self.tag_int(tags::PIXEL_REPRESENTATION) == Some(1)
    }

    // --- spatial attributes ---

    /// Physical pixel spacing in millimeters.
    ///
    /// The Pixel Spacing attribute carries row spacing first,
    /// column spacing second; the slice component comes from
    /// Spacing Between Slices, falling back to Slice Thickness.
    /// Missing components default to 1 mm.
    pub fn pixel_spacing(&self) -> PixelSpacing {
        let (x, y) = match self.tag_f64_list(tags::PIXEL_SPACING).as_deref() {
            Some([row, col, ..]) => (*col, *row),
            Some([single]) => (*single, *single),
            _ => (1., 1.),
        };
        let z = self
            .tag_f64(tags::SPACING_BETWEEN_SLICES)
            .or_else(|| self.tag_f64(tags::SLICE_THICKNESS))
            .filter(|&v| v > 0.)
            .unwrap_or(1.);
        PixelSpacing::new(x, y, z)
    }

    /// Image Orientation (Patient) as row and column direction cosines.
    pub fn image_orientation(&self) -> Option<([f64; 3], [f64; 3])> {
        let values = self.tag_f64_list(tags::IMAGE_ORIENTATION_PATIENT)?;
        if values.len() < 6 {
            return None;
        }
        Some((
            [values[0], values[1], values[2]],
            [values[3], values[4], values[5]],
        ))
    }

    /// Image Position (Patient): the world coordinates
    /// of the first transmitted pixel.
    pub fn image_position(&self) -> Option<[f64; 3]> {
        let values = self.tag_f64_list(tags::IMAGE_POSITION_PATIENT)?;
        if values.len() < 3 {
            return None;
        }
        Some([values[0], values[1], values[2]])
    }

    // --- display attributes ---

    /// The window settings stored in the object.
    ///
    /// Multi-valued window attributes contribute their first value.
    /// When the attributes are absent or invalid,
    /// the full sample range of the allocated bit depth is used.
    pub fn window_settings(&self) -> WindowSettings {
        let center = self.tag_f64(tags::WINDOW_CENTER);
        let width = self.tag_f64(tags::WINDOW_WIDTH);
        match (center, width) {
            (Some(center), Some(width)) if width > 0. => WindowSettings::new(center, width),
            _ => {
                let full = f64::from(1u32 << self.bit_depth().min(16));
                WindowSettings::new(full / 2., full)
            }
        }
    }

    /// The modality rescale parameters; identity when absent.
    pub fn rescale(&self) -> RescaleParameters {
        RescaleParameters {
            slope: self.tag_f64(tags::RESCALE_SLOPE).unwrap_or(1.),
            intercept: self.tag_f64(tags::RESCALE_INTERCEPT).unwrap_or(0.),
        }
    }

    // --- identity attributes ---

    /// The transfer syntax UID from the file meta group.
    pub fn transfer_syntax_uid(&self) -> &str {
        &self.transfer_syntax.uid
    }

    /// SOP Class UID.
    pub fn sop_class_uid(&self) -> String {
        self.tag_string(tags::SOP_CLASS_UID)
    }

    /// SOP Instance UID.
    pub fn sop_instance_uid(&self) -> String {
        self.tag_string(tags::SOP_INSTANCE_UID)
    }

    /// The modality code (CT, MR, ...).
    pub fn modality(&self) -> String {
        self.tag_string(tags::MODALITY)
    }

    /// Patient Name.
    pub fn patient_name(&self) -> String {
        self.tag_string(tags::PATIENT_NAME)
    }

    /// Patient ID.
    pub fn patient_id(&self) -> String {
        self.tag_string(tags::PATIENT_ID)
    }

    /// Study Description.
    pub fn study_description(&self) -> String {
        self.tag_string(tags::STUDY_DESCRIPTION)
    }

    /// Series Description.
    pub fn series_description(&self) -> String {
        self.tag_string(tags::SERIES_DESCRIPTION)
    }

    /// Instance Number, used as a slice ordering fallback.
    pub fn instance_number(&self) -> Option<i64> {
        self.tag_int(tags::INSTANCE_NUMBER)
    }

    // --- compressed payload assembly ---

    /// Assemble the complete compressed codestream
    /// of an encapsulated pixel data element,
    /// concatenating all fragments after the Basic Offset Table.
    pub fn compressed_stream(&self) -> Result<Vec<u8>> {
        let info = self.pixel_data.as_ref().filter(|i| i.encapsulated).ok_or_else(|| {
            UnsupportedSnafu {
                what: "pixel data is not encapsulated".to_string(),
            }
            .build()
        })?;
        let fragments =
            dcmview_parser::encapsulated_fragments(&self.data, info.offset).map_err(|e| {
                InvalidFormatSnafu {
                    reason: e.to_string(),
                }
                .build()
            })?;
        if fragments.is_empty() {
            return InvalidFormatSnafu {
                reason: "encapsulated pixel data holds no fragments".to_string(),
            }
            .fail();
        }
        let total: usize = fragments.iter().map(|r| r.len()).sum();
        let mut stream = Vec::with_capacity(total);
        for range in fragments {
            stream.extend_from_slice(&self.data[range]);
        }
        Ok(stream)
    }

    // --- validation ---

    /// Shallow structural check of the decoded object.
    ///
    /// Inspects metadata consistency without allocating pixel buffers.
    /// Parser warnings are carried into the report as issues;
    /// they do not make the object invalid on their own.
    pub fn validate(&self) -> ValidationReport {
        let mut issues: Vec<String> = self.warnings.clone();
        let mut valid = true;
        let mut fail = |issues: &mut Vec<String>, msg: String| {
            issues.push(msg);
            valid = false;
        };

        let w = i64::from(self.width());
        let h = i64::from(self.height());
        if w < 1 || w > MAX_DIMENSION {
            fail(&mut issues, format!("Columns {} outside 1..={}", w, MAX_DIMENSION));
        }
        if h < 1 || h > MAX_DIMENSION {
            fail(&mut issues, format!("Rows {} outside 1..={}", h, MAX_DIMENSION));
        }

        let bits = self.bit_depth();
        let samples = self.samples_per_pixel();
        match samples {
            1 => {
                if bits != 8 && bits != 16 {
                    fail(
                        &mut issues,
                        format!("Bits Allocated {} unsupported for grayscale", bits),
                    );
                }
            }
            3 => {
                if bits != 8 {
                    fail(
                        &mut issues,
                        format!("Bits Allocated {} unsupported for RGB", bits),
                    );
                }
            }
            other => fail(&mut issues, format!("Samples per Pixel {} unsupported", other)),
        }

        match &self.pixel_data {
            None => fail(&mut issues, "No pixel data element".to_string()),
            Some(info) if !info.encapsulated => {
                let needed = (w.max(0) as u64)
                    * (h.max(0) as u64)
                    * u64::from(samples)
                    * (u64::from(bits) / 8);
                if let Some(len) = info.length {
                    if (len as u64) < needed {
                        fail(
                            &mut issues,
                            format!(
                                "Pixel data holds {} bytes, {} required",
                                len, needed
                            ),
                        );
                    }
                }
            }
            Some(_) => {
                if self.transfer_syntax.compression == Compression::None {
                    fail(
                        &mut issues,
                        "Encapsulated pixel data under an uncompressed transfer syntax"
                            .to_string(),
                    );
                }
            }
        }

        ValidationReport { valid, issues }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcmview_core::VR;
    use dcmview_parser::testing::FileBuilder;

    fn basic_file() -> Vec<u8> {
        FileBuilder::explicit_le()
            .text_element(tags::MODALITY, VR::CS, "CT")
            .text_element(tags::PATIENT_NAME, VR::PN, "Doe^Jane")
            .u16_element(tags::ROWS, 2)
            .u16_element(tags::COLUMNS, 4)
            .u16_element(tags::BITS_ALLOCATED, 16)
            .u16_element(tags::SAMPLES_PER_PIXEL, 1)
            .u16_element(tags::PIXEL_REPRESENTATION, 0)
            .text_element(tags::PHOTOMETRIC_INTERPRETATION, VR::CS, "MONOCHROME2")
            .text_element(tags::PIXEL_SPACING, VR::DS, "0.5\\0.25")
            .text_element(tags::WINDOW_CENTER, VR::DS, "40")
            .text_element(tags::WINDOW_WIDTH, VR::DS, "400")
            .text_element(tags::RESCALE_INTERCEPT, VR::DS, "-1024")
            .text_element(tags::RESCALE_SLOPE, VR::DS, "1")
            .pixel_data_u16_le(&[0, 1, 2, 3, 4, 5, 6, 7])
            .build()
    }

    #[test]
    fn loads_and_reads_typed_metadata() {
        let dec = Decoder::load_from_bytes(basic_file()).unwrap();
        assert_eq!(dec.width(), 4);
        assert_eq!(dec.height(), 2);
        assert_eq!(dec.bit_depth(), 16);
        assert_eq!(dec.samples_per_pixel(), 1);
        assert!(!dec.signed_image());
        assert!(!dec.compressed());
        assert_eq!(dec.modality(), "CT");
        assert_eq!(dec.patient_name(), "Doe^Jane");
        assert_eq!(
            dec.photometric_interpretation(),
            PhotometricInterpretation::Monochrome2
        );

        let spacing = dec.pixel_spacing();
        assert_eq!(spacing.y, 0.5);
        assert_eq!(spacing.x, 0.25);

        let window = dec.window_settings();
        assert_eq!(window.center, 40.);
        assert_eq!(window.width, 400.);

        let rescale = dec.rescale();
        assert_eq!(rescale.slope, 1.);
        assert_eq!(rescale.intercept, -1024.);
    }

    #[test]
    fn load_is_deterministic() {
        let file = basic_file();
        let a = Decoder::load_from_bytes(file.clone()).unwrap();
        let b = Decoder::load_from_bytes(file).unwrap();
        assert_eq!(a.width(), b.width());
        assert_eq!(a.tag_string(tags::PATIENT_NAME), b.tag_string(tags::PATIENT_NAME));
        assert_eq!(
            a.pixel_data_info().map(|i| i.offset),
            b.pixel_data_info().map(|i| i.offset)
        );
    }

    #[test]
    fn missing_window_defaults_to_full_range() {
        let file = FileBuilder::explicit_le()
            .u16_element(tags::ROWS, 1)
            .u16_element(tags::COLUMNS, 1)
            .u16_element(tags::BITS_ALLOCATED, 8)
            .pixel_data_ow(&[0x7F, 0x00])
            .build();
        let dec = Decoder::load_from_bytes(file).unwrap();
        let window = dec.window_settings();
        assert!(window.is_valid());
        assert_eq!(window.width, 256.);
        assert_eq!(window.center, 128.);
    }

    #[test]
    fn not_dicom_input_is_rejected() {
        assert!(matches!(
            Decoder::load_from_bytes(vec![0u8; 64]),
            Err(Error::NotDicom { .. })
        ));
    }

    #[test]
    fn missing_file_is_reported() {
        let err = Decoder::load_from_path("/definitely/not/here.dcm").unwrap_err();
        assert!(matches!(err, Error::FileNotFound { .. }));
    }

    #[test]
    fn validation_flags_oversized_dimensions() {
        // Columns of 65537 cannot be expressed in US; use 0 rows instead
        let file = FileBuilder::explicit_le()
            .u16_element(tags::ROWS, 0)
            .u16_element(tags::COLUMNS, 4)
            .u16_element(tags::BITS_ALLOCATED, 16)
            .pixel_data_u16_le(&[0, 0, 0, 0])
            .build();
        let dec = Decoder::load_from_bytes(file).unwrap();
        let report = dec.validate();
        assert!(!report.valid);
        assert!(report.issues.iter().any(|i| i.contains("Rows")));
    }

    #[test]
    fn validation_flags_short_pixel_data() {
        let file = FileBuilder::explicit_le()
            .u16_element(tags::ROWS, 4)
            .u16_element(tags::COLUMNS, 4)
            .u16_element(tags::BITS_ALLOCATED, 16)
            .pixel_data_u16_le(&[0, 0])
            .build();
        let dec = Decoder::load_from_bytes(file).unwrap();
        let report = dec.validate();
        assert!(!report.valid);
    }

    #[test]
    fn compressed_stream_concatenates_fragments() {
        let file = FileBuilder::encapsulated(dcmview_core::uids::JPEG_LOSSLESS_SV1)
            .u16_element(tags::ROWS, 1)
            .u16_element(tags::COLUMNS, 1)
            .encapsulated_pixel_data(&[&[0xFF, 0xD8], &[0xFF, 0xD9]])
            .build();
        let dec = Decoder::load_from_bytes(file).unwrap();
        assert!(dec.compressed());
        assert_eq!(dec.compressed_stream().unwrap(), vec![0xFF, 0xD8, 0xFF, 0xD9]);
    }
}
