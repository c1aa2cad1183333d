//! Transfer syntax descriptors and resolution from the transfer syntax UID.

use byteordered::Endianness;
use dcmview_core::uids;

/// How value representations appear in the serialized stream.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum VrMode {
    /// VRs are not serialized; they are resolved from the tag dictionary.
    Implicit,
    /// VRs are serialized as two ASCII characters after the tag.
    Explicit,
}

/// The compression family of the pixel data payload.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Compression {
    /// Native (uncompressed) pixel data.
    None,
    /// JPEG Lossless, Non-Hierarchical (Process 14), decoded natively.
    JpegLossless,
    /// Another JPEG-family codestream (baseline, extended, LS, 2000),
    /// delegated to a platform image decoder.
    JpegOther,
}

/// The serialization rules of a DICOM data set,
/// derived from the Transfer Syntax UID in the file meta group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSyntax {
    /// the UID this descriptor was resolved from, trimmed
    pub uid: String,
    /// the byte order of multi-byte values
    pub endianness: Endianness,
    /// whether VRs are serialized or looked up
    pub vr_mode: VrMode,
    /// whether pixel data is encapsulated in fragment items
    pub encapsulated: bool,
    /// the compression family of the pixel data
    pub compression: Compression,
}

impl TransferSyntax {
    /// The default transfer syntax: implicit VR, little endian.
    pub fn implicit_vr_little_endian() -> Self {
        TransferSyntax {
            uid: uids::IMPLICIT_VR_LITTLE_ENDIAN.to_string(),
            endianness: Endianness::Little,
            vr_mode: VrMode::Implicit,
            encapsulated: false,
            compression: Compression::None,
        }
    }

    /// Explicit VR, little endian.
    pub fn explicit_vr_little_endian() -> Self {
        TransferSyntax {
            uid: uids::EXPLICIT_VR_LITTLE_ENDIAN.to_string(),
            endianness: Endianness::Little,
            vr_mode: VrMode::Explicit,
            encapsulated: false,
            compression: Compression::None,
        }
    }

    /// Explicit VR, big endian (retired, still found in archives).
    pub fn explicit_vr_big_endian() -> Self {
        TransferSyntax {
            uid: uids::EXPLICIT_VR_BIG_ENDIAN.to_string(),
            endianness: Endianness::Big,
            vr_mode: VrMode::Explicit,
            encapsulated: false,
            compression: Compression::None,
        }
    }

    fn encapsulated(uid: &str, compression: Compression) -> Self {
        TransferSyntax {
            uid: uid.to_string(),
            endianness: Endianness::Little,
            vr_mode: VrMode::Explicit,
            encapsulated: true,
            compression,
        }
    }

    /// Resolve a transfer syntax from its UID.
    ///
    /// Trailing whitespace and NUL padding in the UID are ignored.
    /// Unknown UIDs resolve to explicit VR little endian
    /// without encapsulation, with a diagnostic.
    pub fn from_uid(uid: &str) -> Self {
        let uid = uid.trim_end_matches(|c: char| c.is_whitespace() || c == '\0');
        match uid {
            uids::IMPLICIT_VR_LITTLE_ENDIAN => Self::implicit_vr_little_endian(),
            uids::EXPLICIT_VR_LITTLE_ENDIAN => Self::explicit_vr_little_endian(),
            uids::EXPLICIT_VR_BIG_ENDIAN => Self::explicit_vr_big_endian(),
            uids::JPEG_LOSSLESS | uids::JPEG_LOSSLESS_SV1 => {
                Self::encapsulated(uid, Compression::JpegLossless)
            }
            uids::JPEG_BASELINE
            | uids::JPEG_EXTENDED
            | uids::JPEG_LS_LOSSLESS
            | uids::JPEG_LS_LOSSY
            | uids::JPEG_2000_LOSSLESS
            | uids::JPEG_2000 => Self::encapsulated(uid, Compression::JpegOther),
            other => {
                tracing::warn!(
                    "Unknown transfer syntax UID `{}`, assuming explicit VR little endian",
                    other
                );
                let mut ts = Self::explicit_vr_little_endian();
                ts.uid = other.to_string();
                ts
            }
        }
    }

    /// Whether the selection-value restriction of the
    /// first-order-prediction syntax applies
    /// (`1.2.840.10008.1.2.4.70` requires selection value 1).
    #[inline]
    pub fn requires_first_order_prediction(&self) -> bool {
        self.uid == uids::JPEG_LOSSLESS_SV1
    }
}

impl Default for TransferSyntax {
    fn default() -> Self {
        TransferSyntax::explicit_vr_little_endian()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_the_uncompressed_syntaxes() {
        let ts = TransferSyntax::from_uid("1.2.840.10008.1.2");
        assert_eq!(ts.vr_mode, VrMode::Implicit);
        assert_eq!(ts.endianness, Endianness::Little);
        assert!(!ts.encapsulated);

        let ts = TransferSyntax::from_uid("1.2.840.10008.1.2.2\0");
        assert_eq!(ts.vr_mode, VrMode::Explicit);
        assert_eq!(ts.endianness, Endianness::Big);
    }

    #[test]
    fn resolves_jpeg_lossless() {
        let ts = TransferSyntax::from_uid("1.2.840.10008.1.2.4.70 ");
        assert!(ts.encapsulated);
        assert_eq!(ts.compression, Compression::JpegLossless);
        assert!(ts.requires_first_order_prediction());

        let ts = TransferSyntax::from_uid("1.2.840.10008.1.2.4.57");
        assert_eq!(ts.compression, Compression::JpegLossless);
        assert!(!ts.requires_first_order_prediction());
    }

    #[test]
    fn unknown_uid_falls_back_to_explicit_le() {
        let ts = TransferSyntax::from_uid("1.2.3.4.5");
        assert_eq!(ts.vr_mode, VrMode::Explicit);
        assert_eq!(ts.endianness, Endianness::Little);
        assert!(!ts.encapsulated);
        assert_eq!(ts.uid, "1.2.3.4.5");
    }
}
