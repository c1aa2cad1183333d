//! Builders for synthetic DICOM streams.
//!
//! These are used by the test suites of this workspace
//! to assemble well-formed (and deliberately malformed) files in memory,
//! without shipping binary fixtures.

use byteordered::byteorder::{BigEndian, ByteOrder, LittleEndian};
use byteordered::Endianness;
use dcmview_core::{tags, uids, Tag, VR};

const UNDEFINED_LENGTH: u32 = 0xFFFF_FFFF;

/// Incremental builder of a single DICOM file buffer.
///
/// The builder always emits the 128-byte preamble, the `DICM` magic,
/// and a minimal file meta group naming the chosen transfer syntax;
/// dataset elements follow in the order they are appended.
#[derive(Debug)]
pub struct FileBuilder {
    endianness: Endianness,
    explicit: bool,
    transfer_syntax_uid: String,
    dataset: Vec<u8>,
}

impl FileBuilder {
    /// A file in explicit VR little endian.
    pub fn explicit_le() -> Self {
        FileBuilder {
            endianness: Endianness::Little,
            explicit: true,
            transfer_syntax_uid: uids::EXPLICIT_VR_LITTLE_ENDIAN.to_string(),
            dataset: Vec::new(),
        }
    }

    /// A file in explicit VR big endian.
    pub fn explicit_be() -> Self {
        FileBuilder {
            endianness: Endianness::Big,
            explicit: true,
            transfer_syntax_uid: uids::EXPLICIT_VR_BIG_ENDIAN.to_string(),
            dataset: Vec::new(),
        }
    }

    /// A file in implicit VR little endian.
    pub fn implicit_le() -> Self {
        FileBuilder {
            endianness: Endianness::Little,
            explicit: false,
            transfer_syntax_uid: uids::IMPLICIT_VR_LITTLE_ENDIAN.to_string(),
            dataset: Vec::new(),
        }
    }

    /// A file in explicit VR little endian
    /// with an encapsulated transfer syntax UID.
    pub fn encapsulated(uid: &str) -> Self {
        FileBuilder {
            endianness: Endianness::Little,
            explicit: true,
            transfer_syntax_uid: uid.to_string(),
            dataset: Vec::new(),
        }
    }

    fn write_u16(&mut self, value: u16) {
        let mut buf = [0u8; 2];
        match self.endianness {
            Endianness::Little => LittleEndian::write_u16(&mut buf, value),
            Endianness::Big => BigEndian::write_u16(&mut buf, value),
        }
        self.dataset.extend_from_slice(&buf);
    }

    fn write_u32(&mut self, value: u32) {
        let mut buf = [0u8; 4];
        match self.endianness {
            Endianness::Little => LittleEndian::write_u32(&mut buf, value),
            Endianness::Big => BigEndian::write_u32(&mut buf, value),
        }
        self.dataset.extend_from_slice(&buf);
    }

    fn write_tag(&mut self, tag: Tag) {
        self.write_u16(tag.group());
        self.write_u16(tag.element());
    }

    fn write_header(&mut self, tag: Tag, vr: VR, length: u32) {
        self.write_tag(tag);
        if self.explicit {
            self.dataset.extend_from_slice(vr.to_str().as_bytes());
            if vr.has_long_length() {
                self.dataset.extend_from_slice(&[0, 0]);
                self.write_u32(length);
            } else {
                self.write_u16(length as u16);
            }
        } else {
            self.write_u32(length);
        }
    }

    /// Append a textual element, padded to even length.
    pub fn text_element(mut self, tag: Tag, vr: VR, value: &str) -> Self {
        let mut bytes = value.as_bytes().to_vec();
        if bytes.len() % 2 != 0 {
            // UIDs pad with NUL, other text with space
            bytes.push(if vr == VR::UI { 0 } else { b' ' });
        }
        self.write_header(tag, vr, bytes.len() as u32);
        self.dataset.extend_from_slice(&bytes);
        self
    }

    /// Append an unsigned 16-bit element (`US`).
    pub fn u16_element(mut self, tag: Tag, value: u16) -> Self {
        self.write_header(tag, VR::US, 2);
        self.write_u16(value);
        self
    }

    /// Append a native pixel data element with VR `OW`.
    pub fn pixel_data_ow(mut self, bytes: &[u8]) -> Self {
        self.write_header(tags::PIXEL_DATA, VR::OW, bytes.len() as u32);
        self.dataset.extend_from_slice(bytes);
        self
    }

    /// Append pixel data holding the given little-endian 16-bit samples.
    pub fn pixel_data_u16_le(self, samples: &[u16]) -> Self {
        let mut bytes = Vec::with_capacity(samples.len() * 2);
        for &s in samples {
            bytes.extend_from_slice(&s.to_le_bytes());
        }
        self.pixel_data_ow(&bytes)
    }

    /// Append pixel data holding the given big-endian 16-bit samples.
    pub fn pixel_data_u16_be(self, samples: &[u16]) -> Self {
        let mut bytes = Vec::with_capacity(samples.len() * 2);
        for &s in samples {
            bytes.extend_from_slice(&s.to_be_bytes());
        }
        self.pixel_data_ow(&bytes)
    }

    /// Append an encapsulated pixel data element:
    /// an empty Basic Offset Table followed by the given fragments.
    pub fn encapsulated_pixel_data(mut self, fragments: &[&[u8]]) -> Self {
        self.write_header(tags::PIXEL_DATA, VR::OB, UNDEFINED_LENGTH);
        // empty Basic Offset Table
        self.write_tag(tags::ITEM);
        self.write_u32(0);
        for fragment in fragments {
            let mut payload = fragment.to_vec();
            if payload.len() % 2 != 0 {
                payload.push(0);
            }
            self.write_tag(tags::ITEM);
            self.write_u32(payload.len() as u32);
            self.dataset.extend_from_slice(&payload);
        }
        self.write_tag(tags::SEQUENCE_DELIMITATION_ITEM);
        self.write_u32(0);
        self
    }

    /// Append an undefined-length sequence whose items
    /// are described through the given closure.
    pub fn undefined_sequence(
        mut self,
        tag: Tag,
        describe: impl FnOnce(&mut SequenceItems<'_>),
    ) -> Self {
        self.write_header(tag, VR::SQ, UNDEFINED_LENGTH);
        {
            let mut items = SequenceItems { builder: &mut self };
            describe(&mut items);
        }
        self.write_tag(tags::SEQUENCE_DELIMITATION_ITEM);
        self.write_u32(0);
        self
    }

    /// Assemble the file: preamble, magic, file meta group, dataset.
    pub fn build(self) -> Vec<u8> {
        let mut out = vec![0u8; 128];
        out.extend_from_slice(b"DICM");

        // the file meta group is always explicit VR little endian
        let mut meta = Vec::new();
        let mut uid_bytes = self.transfer_syntax_uid.as_bytes().to_vec();
        if uid_bytes.len() % 2 != 0 {
            uid_bytes.push(0);
        }
        meta.extend_from_slice(&[0x02, 0x00, 0x10, 0x00]);
        meta.extend_from_slice(b"UI");
        meta.extend_from_slice(&(uid_bytes.len() as u16).to_le_bytes());
        meta.extend_from_slice(&uid_bytes);

        // (0002,0000) group length covers the elements after it
        out.extend_from_slice(&[0x02, 0x00, 0x00, 0x00]);
        out.extend_from_slice(b"UL");
        out.extend_from_slice(&4u16.to_le_bytes());
        out.extend_from_slice(&(meta.len() as u32).to_le_bytes());

        out.extend_from_slice(&meta);
        out.extend_from_slice(&self.dataset);
        out
    }
}

/// Item-level builder used by [`FileBuilder::undefined_sequence`].
#[derive(Debug)]
pub struct SequenceItems<'a> {
    builder: &'a mut FileBuilder,
}

impl SequenceItems<'_> {
    /// Append one item with a defined length and the given raw content.
    pub fn defined_item(&mut self, content: &[u8]) {
        self.builder.write_tag(tags::ITEM);
        self.builder.write_u32(content.len() as u32);
        self.builder.dataset.extend_from_slice(content);
    }

    /// Append one undefined-length item with the given raw element bytes,
    /// closed by an item delimitation item.
    pub fn undefined_item(&mut self, content: &[u8]) {
        self.builder.write_tag(tags::ITEM);
        self.builder.write_u32(UNDEFINED_LENGTH);
        self.builder.dataset.extend_from_slice(content);
        self.builder.write_tag(tags::ITEM_DELIMITATION_ITEM);
        self.builder.write_u32(0);
    }
}
