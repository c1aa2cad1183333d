//! Named constants for the DICOM attribute tags used across this library.
//!
//! The list covers the file meta group, patient/study/series identity,
//! the image pixel module, geometry, and display attributes.
//! It is not the full standard registry;
//! the tag dictionary in [`crate::dictionary`] resolves the rest.

use crate::header::Tag;

/// File Meta Information Group Length
pub const FILE_META_INFORMATION_GROUP_LENGTH: Tag = Tag(0x0002, 0x0000);
/// File Meta Information Version
pub const FILE_META_INFORMATION_VERSION: Tag = Tag(0x0002, 0x0001);
/// Media Storage SOP Class UID
pub const MEDIA_STORAGE_SOP_CLASS_UID: Tag = Tag(0x0002, 0x0002);
/// Media Storage SOP Instance UID
pub const MEDIA_STORAGE_SOP_INSTANCE_UID: Tag = Tag(0x0002, 0x0003);
/// Transfer Syntax UID
pub const TRANSFER_SYNTAX_UID: Tag = Tag(0x0002, 0x0010);
/// Implementation Class UID
pub const IMPLEMENTATION_CLASS_UID: Tag = Tag(0x0002, 0x0012);
/// Implementation Version Name
pub const IMPLEMENTATION_VERSION_NAME: Tag = Tag(0x0002, 0x0013);

/// Specific Character Set
pub const SPECIFIC_CHARACTER_SET: Tag = Tag(0x0008, 0x0005);
/// Image Type
pub const IMAGE_TYPE: Tag = Tag(0x0008, 0x0008);
/// SOP Class UID
pub const SOP_CLASS_UID: Tag = Tag(0x0008, 0x0016);
/// SOP Instance UID
pub const SOP_INSTANCE_UID: Tag = Tag(0x0008, 0x0018);
/// Study Date
pub const STUDY_DATE: Tag = Tag(0x0008, 0x0020);
/// Series Date
pub const SERIES_DATE: Tag = Tag(0x0008, 0x0021);
/// Acquisition Date
pub const ACQUISITION_DATE: Tag = Tag(0x0008, 0x0022);
/// Study Time
pub const STUDY_TIME: Tag = Tag(0x0008, 0x0030);
/// Series Time
pub const SERIES_TIME: Tag = Tag(0x0008, 0x0031);
/// Accession Number
pub const ACCESSION_NUMBER: Tag = Tag(0x0008, 0x0050);
/// Modality
pub const MODALITY: Tag = Tag(0x0008, 0x0060);
/// Manufacturer
pub const MANUFACTURER: Tag = Tag(0x0008, 0x0070);
/// Institution Name
pub const INSTITUTION_NAME: Tag = Tag(0x0008, 0x0080);
/// Referring Physician Name
pub const REFERRING_PHYSICIAN_NAME: Tag = Tag(0x0008, 0x0090);
/// Study Description
pub const STUDY_DESCRIPTION: Tag = Tag(0x0008, 0x1030);
/// Series Description
pub const SERIES_DESCRIPTION: Tag = Tag(0x0008, 0x103E);
/// Manufacturer Model Name
pub const MANUFACTURER_MODEL_NAME: Tag = Tag(0x0008, 0x1090);

/// Patient Name
pub const PATIENT_NAME: Tag = Tag(0x0010, 0x0010);
/// Patient ID
pub const PATIENT_ID: Tag = Tag(0x0010, 0x0020);
/// Patient Birth Date
pub const PATIENT_BIRTH_DATE: Tag = Tag(0x0010, 0x0030);
/// Patient Sex
pub const PATIENT_SEX: Tag = Tag(0x0010, 0x0040);
/// Patient Age
pub const PATIENT_AGE: Tag = Tag(0x0010, 0x1010);
/// Patient Weight
pub const PATIENT_WEIGHT: Tag = Tag(0x0010, 0x1030);

/// Scanning Sequence
pub const SCANNING_SEQUENCE: Tag = Tag(0x0018, 0x0020);
/// Slice Thickness
pub const SLICE_THICKNESS: Tag = Tag(0x0018, 0x0050);
/// KVP
pub const KVP: Tag = Tag(0x0018, 0x0060);
/// Spacing Between Slices
pub const SPACING_BETWEEN_SLICES: Tag = Tag(0x0018, 0x0088);
/// Protocol Name
pub const PROTOCOL_NAME: Tag = Tag(0x0018, 0x1030);
/// Exposure Time
pub const EXPOSURE_TIME: Tag = Tag(0x0018, 0x1150);
/// X-Ray Tube Current
pub const XRAY_TUBE_CURRENT: Tag = Tag(0x0018, 0x1151);
/// Body Part Examined
pub const BODY_PART_EXAMINED: Tag = Tag(0x0018, 0x0015);

/// Study Instance UID
pub const STUDY_INSTANCE_UID: Tag = Tag(0x0020, 0x000D);
/// Series Instance UID
pub const SERIES_INSTANCE_UID: Tag = Tag(0x0020, 0x000E);
/// Study ID
pub const STUDY_ID: Tag = Tag(0x0020, 0x0010);
/// Series Number
pub const SERIES_NUMBER: Tag = Tag(0x0020, 0x0011);
/// Acquisition Number
pub const ACQUISITION_NUMBER: Tag = Tag(0x0020, 0x0012);
/// Instance Number
pub const INSTANCE_NUMBER: Tag = Tag(0x0020, 0x0013);
/// Image Position (Patient)
pub const IMAGE_POSITION_PATIENT: Tag = Tag(0x0020, 0x0032);
/// Image Orientation (Patient)
pub const IMAGE_ORIENTATION_PATIENT: Tag = Tag(0x0020, 0x0037);
/// Frame of Reference UID
pub const FRAME_OF_REFERENCE_UID: Tag = Tag(0x0020, 0x0052);
/// Slice Location
pub const SLICE_LOCATION: Tag = Tag(0x0020, 0x1041);

/// Samples per Pixel
pub const SAMPLES_PER_PIXEL: Tag = Tag(0x0028, 0x0002);
/// Photometric Interpretation
pub const PHOTOMETRIC_INTERPRETATION: Tag = Tag(0x0028, 0x0004);
/// Planar Configuration
pub const PLANAR_CONFIGURATION: Tag = Tag(0x0028, 0x0006);
/// Number of Frames
pub const NUMBER_OF_FRAMES: Tag = Tag(0x0028, 0x0008);
/// Rows
pub const ROWS: Tag = Tag(0x0028, 0x0010);
/// Columns
pub const COLUMNS: Tag = Tag(0x0028, 0x0011);
/// Pixel Spacing
pub const PIXEL_SPACING: Tag = Tag(0x0028, 0x0030);
/// Bits Allocated
pub const BITS_ALLOCATED: Tag = Tag(0x0028, 0x0100);
/// Bits Stored
pub const BITS_STORED: Tag = Tag(0x0028, 0x0101);
/// High Bit
pub const HIGH_BIT: Tag = Tag(0x0028, 0x0102);
/// Pixel Representation
pub const PIXEL_REPRESENTATION: Tag = Tag(0x0028, 0x0103);
/// Smallest Image Pixel Value
pub const SMALLEST_IMAGE_PIXEL_VALUE: Tag = Tag(0x0028, 0x0106);
/// Largest Image Pixel Value
pub const LARGEST_IMAGE_PIXEL_VALUE: Tag = Tag(0x0028, 0x0107);
/// Window Center
pub const WINDOW_CENTER: Tag = Tag(0x0028, 0x1050);
/// Window Width
pub const WINDOW_WIDTH: Tag = Tag(0x0028, 0x1051);
/// Rescale Intercept
pub const RESCALE_INTERCEPT: Tag = Tag(0x0028, 0x1052);
/// Rescale Slope
pub const RESCALE_SLOPE: Tag = Tag(0x0028, 0x1053);
/// Rescale Type
pub const RESCALE_TYPE: Tag = Tag(0x0028, 0x1054);
/// Window Center & Width Explanation
pub const WINDOW_CENTER_WIDTH_EXPLANATION: Tag = Tag(0x0028, 0x1055);
/// Lossy Image Compression
pub const LOSSY_IMAGE_COMPRESSION: Tag = Tag(0x0028, 0x2110);

/// Pixel Data
pub const PIXEL_DATA: Tag = Tag(0x7FE0, 0x0010);

/// Item
pub const ITEM: Tag = Tag(0xFFFE, 0xE000);
/// Item Delimitation Item
pub const ITEM_DELIMITATION_ITEM: Tag = Tag(0xFFFE, 0xE00D);
/// Sequence Delimitation Item
pub const SEQUENCE_DELIMITATION_ITEM: Tag = Tag(0xFFFE, 0xE0DD);
