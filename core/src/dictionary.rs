//! Attribute dictionary mapping tags to their canonical value representation.
//!
//! The dictionary serves the implicit-VR branch of the parser:
//! when an element carries no VR on the wire,
//! the tag is looked up here.
//! Lookups which miss the table fall through to the structural rules
//! of the standard (group length elements are `UL`,
//! private creator elements are `LO`) and finally to `UN`.

use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::header::{Tag, VR};
use crate::tags;

static DICT: Lazy<TagDictionary> = Lazy::new(TagDictionary::init);

/// Retrieve a singleton instance of the standard tag dictionary.
#[inline]
pub fn dictionary() -> &'static TagDictionary {
    &DICT
}

/// Resolve the value representation for the given tag.
///
/// Convenience free function over the singleton dictionary;
/// never misses, returning [`VR::UN`] for unregistered tags.
#[inline]
pub fn vr_of(tag: Tag) -> VR {
    dictionary().get(tag)
}

/// An immutable dictionary from attribute tag
/// to the attribute's canonical VR.
///
/// Constructed once on first use and never mutated afterwards,
/// so lookups are lock-free.
#[derive(Debug)]
pub struct TagDictionary {
    by_tag: HashMap<Tag, VR>,
}

impl TagDictionary {
    fn init() -> TagDictionary {
        let mut by_tag = HashMap::with_capacity(ENTRIES.len() * 2);
        for &(tag, vr) in ENTRIES {
            by_tag.insert(tag, vr);
        }
        TagDictionary { by_tag }
    }

    /// Look up the canonical VR for a tag.
    ///
    /// Falls back to the structural rules of the standard
    /// and ultimately to `UN`.
    pub fn get(&self, tag: Tag) -> VR {
        if let Some(&vr) = self.by_tag.get(&tag) {
            return vr;
        }
        // group length elements
        if tag.element() == 0x0000 {
            return VR::UL;
        }
        // private creator elements
        if tag.group() & 1 == 1 && (0x0010..=0x00FF).contains(&tag.element()) {
            return VR::LO;
        }
        VR::UN
    }

    /// The number of registered entries.
    pub fn len(&self) -> usize {
        self.by_tag.len()
    }

    /// Whether the dictionary holds no entries.
    pub fn is_empty(&self) -> bool {
        self.by_tag.is_empty()
    }
}

/// The registered standard attributes.
///
/// The selection covers the attributes of the modules this library reads
/// (file meta, general study/series/image, image pixel, image plane,
/// VOI LUT, CT/MR acquisition) plus the common identity attributes.
static ENTRIES: &[(Tag, VR)] = &[
    // group 0002: file meta
    (tags::FILE_META_INFORMATION_GROUP_LENGTH, VR::UL),
    (tags::FILE_META_INFORMATION_VERSION, VR::OB),
    (tags::MEDIA_STORAGE_SOP_CLASS_UID, VR::UI),
    (tags::MEDIA_STORAGE_SOP_INSTANCE_UID, VR::UI),
    (tags::TRANSFER_SYNTAX_UID, VR::UI),
    (tags::IMPLEMENTATION_CLASS_UID, VR::UI),
    (tags::IMPLEMENTATION_VERSION_NAME, VR::SH),
    // group 0008: identification
    (tags::SPECIFIC_CHARACTER_SET, VR::CS),
    (tags::IMAGE_TYPE, VR::CS),
    (Tag(0x0008, 0x0012), VR::DA), // Instance Creation Date
    (Tag(0x0008, 0x0013), VR::TM), // Instance Creation Time
    (tags::SOP_CLASS_UID, VR::UI),
    (tags::SOP_INSTANCE_UID, VR::UI),
    (tags::STUDY_DATE, VR::DA),
    (tags::SERIES_DATE, VR::DA),
    (tags::ACQUISITION_DATE, VR::DA),
    (Tag(0x0008, 0x0023), VR::DA), // Content Date
    (tags::STUDY_TIME, VR::TM),
    (tags::SERIES_TIME, VR::TM),
    (Tag(0x0008, 0x0032), VR::TM), // Acquisition Time
    (Tag(0x0008, 0x0033), VR::TM), // Content Time
    (tags::ACCESSION_NUMBER, VR::SH),
    (tags::MODALITY, VR::CS),
    (Tag(0x0008, 0x0064), VR::CS), // Conversion Type
    (tags::MANUFACTURER, VR::LO),
    (tags::INSTITUTION_NAME, VR::LO),
    (Tag(0x0008, 0x0081), VR::ST), // Institution Address
    (tags::REFERRING_PHYSICIAN_NAME, VR::PN),
    (Tag(0x0008, 0x1010), VR::SH), // Station Name
    (tags::STUDY_DESCRIPTION, VR::LO),
    (tags::SERIES_DESCRIPTION, VR::LO),
    (Tag(0x0008, 0x1040), VR::LO), // Institutional Department Name
    (Tag(0x0008, 0x1050), VR::PN), // Performing Physician Name
    (Tag(0x0008, 0x1060), VR::PN), // Name of Physician(s) Reading Study
    (Tag(0x0008, 0x1070), VR::PN), // Operators' Name
    (tags::MANUFACTURER_MODEL_NAME, VR::LO),
    (Tag(0x0008, 0x1140), VR::SQ), // Referenced Image Sequence
    (Tag(0x0008, 0x2111), VR::ST), // Derivation Description
    // group 0010: patient
    (tags::PATIENT_NAME, VR::PN),
    (tags::PATIENT_ID, VR::LO),
    (tags::PATIENT_BIRTH_DATE, VR::DA),
    (tags::PATIENT_SEX, VR::CS),
    (tags::PATIENT_AGE, VR::AS),
    (tags::PATIENT_WEIGHT, VR::DS),
    (Tag(0x0010, 0x1000), VR::LO), // Other Patient IDs
    (Tag(0x0010, 0x4000), VR::LT), // Patient Comments
    // group 0018: acquisition
    (Tag(0x0018, 0x0010), VR::LO), // Contrast/Bolus Agent
    (tags::BODY_PART_EXAMINED, VR::CS),
    (tags::SCANNING_SEQUENCE, VR::CS),
    (Tag(0x0018, 0x0021), VR::CS), // Sequence Variant
    (Tag(0x0018, 0x0022), VR::CS), // Scan Options
    (Tag(0x0018, 0x0023), VR::CS), // MR Acquisition Type
    (tags::SLICE_THICKNESS, VR::DS),
    (tags::KVP, VR::DS),
    (Tag(0x0018, 0x0080), VR::DS), // Repetition Time
    (Tag(0x0018, 0x0081), VR::DS), // Echo Time
    (Tag(0x0018, 0x0087), VR::DS), // Magnetic Field Strength
    (tags::SPACING_BETWEEN_SLICES, VR::DS),
    (Tag(0x0018, 0x0090), VR::DS), // Data Collection Diameter
    (Tag(0x0018, 0x1000), VR::LO), // Device Serial Number
    (Tag(0x0018, 0x1020), VR::LO), // Software Versions
    (tags::PROTOCOL_NAME, VR::LO),
    (Tag(0x0018, 0x1100), VR::DS), // Reconstruction Diameter
    (Tag(0x0018, 0x1110), VR::DS), // Distance Source to Detector
    (Tag(0x0018, 0x1111), VR::DS), // Distance Source to Patient
    (Tag(0x0018, 0x1120), VR::DS), // Gantry/Detector Tilt
    (Tag(0x0018, 0x1130), VR::DS), // Table Height
    (Tag(0x0018, 0x1140), VR::CS), // Rotation Direction
    (tags::EXPOSURE_TIME, VR::IS),
    (tags::XRAY_TUBE_CURRENT, VR::IS),
    (Tag(0x0018, 0x1152), VR::IS), // Exposure
    (Tag(0x0018, 0x1160), VR::SH), // Filter Type
    (Tag(0x0018, 0x1210), VR::SH), // Convolution Kernel
    (Tag(0x0018, 0x5100), VR::CS), // Patient Position
    // group 0020: image plane and relationship
    (tags::STUDY_INSTANCE_UID, VR::UI),
    (tags::SERIES_INSTANCE_UID, VR::UI),
    (tags::STUDY_ID, VR::SH),
    (tags::SERIES_NUMBER, VR::IS),
    (tags::ACQUISITION_NUMBER, VR::IS),
    (tags::INSTANCE_NUMBER, VR::IS),
    (Tag(0x0020, 0x0020), VR::CS), // Patient Orientation
    (tags::IMAGE_POSITION_PATIENT, VR::DS),
    (tags::IMAGE_ORIENTATION_PATIENT, VR::DS),
    (tags::FRAME_OF_REFERENCE_UID, VR::UI),
    (Tag(0x0020, 0x1040), VR::LO), // Position Reference Indicator
    (tags::SLICE_LOCATION, VR::DS),
    (Tag(0x0020, 0x4000), VR::LT), // Image Comments
    // group 0028: image pixel and VOI LUT
    (tags::SAMPLES_PER_PIXEL, VR::US),
    (tags::PHOTOMETRIC_INTERPRETATION, VR::CS),
    (tags::PLANAR_CONFIGURATION, VR::US),
    (tags::NUMBER_OF_FRAMES, VR::IS),
    (tags::ROWS, VR::US),
    (tags::COLUMNS, VR::US),
    (tags::PIXEL_SPACING, VR::DS),
    (Tag(0x0028, 0x0034), VR::IS), // Pixel Aspect Ratio
    (tags::BITS_ALLOCATED, VR::US),
    (tags::BITS_STORED, VR::US),
    (tags::HIGH_BIT, VR::US),
    (tags::PIXEL_REPRESENTATION, VR::US),
    (tags::SMALLEST_IMAGE_PIXEL_VALUE, VR::US),
    (tags::LARGEST_IMAGE_PIXEL_VALUE, VR::US),
    (Tag(0x0028, 0x0120), VR::US), // Pixel Padding Value
    (Tag(0x0028, 0x0301), VR::CS), // Burned In Annotation
    (tags::WINDOW_CENTER, VR::DS),
    (tags::WINDOW_WIDTH, VR::DS),
    (tags::RESCALE_INTERCEPT, VR::DS),
    (tags::RESCALE_SLOPE, VR::DS),
    (tags::RESCALE_TYPE, VR::LO),
    (tags::WINDOW_CENTER_WIDTH_EXPLANATION, VR::LO),
    (Tag(0x0028, 0x1101), VR::US), // Red Palette Color LUT Descriptor
    (Tag(0x0028, 0x1102), VR::US), // Green Palette Color LUT Descriptor
    (Tag(0x0028, 0x1103), VR::US), // Blue Palette Color LUT Descriptor
    (tags::LOSSY_IMAGE_COMPRESSION, VR::CS),
    (Tag(0x0028, 0x2112), VR::DS), // Lossy Image Compression Ratio
    (Tag(0x0028, 0x3010), VR::SQ), // VOI LUT Sequence
    // group 0032/0040: study and procedure
    (Tag(0x0032, 0x1060), VR::LO), // Requested Procedure Description
    (Tag(0x0040, 0x0244), VR::DA), // Performed Procedure Step Start Date
    (Tag(0x0040, 0x0245), VR::TM), // Performed Procedure Step Start Time
    (Tag(0x0040, 0x0254), VR::LO), // Performed Procedure Step Description
    // pixel data
    (tags::PIXEL_DATA, VR::OW),
];
