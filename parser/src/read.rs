//! The dataset parser: walks a DICOM file buffer header-first,
//! producing a [`LazyTagStore`], the transfer syntax,
//! and the location of the pixel data value.
//!
//! Parsing is tolerant by design:
//! a malformed element stops the walk
//! but the elements parsed until then are retained,
//! with the problem reported in the output's warning list.
//! Only the absence of any recognizable DICOM structure is an error.

use byteordered::byteorder::{ByteOrder, LittleEndian};
use byteordered::Endianness;
use snafu::{Backtrace, Snafu};

use dcmview_core::{tags, vr_of, Tag, TagMetadata, VR};

use crate::bytes::ByteReader;
use crate::lazy::LazyTagStore;
use crate::transfer_syntax::{TransferSyntax, VrMode};

const DICM_MAGIC: &[u8; 4] = b"DICM";
const PREAMBLE_LEN: usize = 128;
const UNDEFINED_LENGTH: u32 = 0xFFFF_FFFF;

/// Nesting bound for undefined-length sequences;
/// deeper input is treated as malformed.
const MAX_SEQUENCE_DEPTH: u32 = 64;

/// Error type for dataset parsing.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// The buffer carries neither the `DICM` magic code
    /// nor a plausible legacy implicit-VR data set.
    #[snafu(display("Not a DICOM stream (no magic code, no plausible legacy data set)"))]
    NotDicom { backtrace: Backtrace },

    /// The stream structure violates the serialization rules.
    #[snafu(display("Invalid DICOM stream: {}", reason))]
    InvalidFormat {
        reason: String,
        backtrace: Backtrace,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Location of the pixel data value inside the file buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelDataInfo {
    /// byte offset of the value
    /// (for encapsulated streams, of the first fragment item header)
    pub offset: usize,
    /// value length in bytes; `None` for encapsulated (undefined) lengths
    pub length: Option<usize>,
    /// whether the value is a fragment-encapsulated codestream
    pub encapsulated: bool,
    /// the value representation the element was serialized with
    pub vr: VR,
}

/// Everything the parser extracts from one file buffer.
#[derive(Debug)]
pub struct ParsedFile {
    /// metadata records of all walked elements
    pub store: LazyTagStore,
    /// the resolved transfer syntax of the main data set
    pub transfer_syntax: TransferSyntax,
    /// location of the pixel data, when the walk reached it
    pub pixel_data: Option<PixelDataInfo>,
    /// non-fatal problems encountered during the walk
    pub warnings: Vec<String>,
}

/// Check whether a buffer looks like a DICOM file:
/// either the `DICM` magic at offset 128,
/// or a plausible legacy implicit-VR element at offset 0.
pub fn is_dicom(data: &[u8]) -> bool {
    has_magic(data) || plausible_legacy(data)
}

fn has_magic(data: &[u8]) -> bool {
    data.len() >= PREAMBLE_LEN + 4 && &data[PREAMBLE_LEN..PREAMBLE_LEN + 4] == DICM_MAGIC
}

/// Legacy fallback heuristic: an implicit-VR element of group `0008`
/// with a small defined length right at the start of the buffer.
fn plausible_legacy(data: &[u8]) -> bool {
    if data.len() < 8 {
        return false;
    }
    let group = LittleEndian::read_u16(&data[0..2]);
    let length = LittleEndian::read_u32(&data[4..8]);
    group == 0x0008 && length < 1024 && 8 + length as usize <= data.len()
}

/// Parse a DICOM file buffer.
///
/// On success the returned [`ParsedFile`] holds the element store,
/// the transfer syntax, the pixel data location (if the walk reached it),
/// and any warnings produced by tolerated malformations.
pub fn parse(data: &[u8]) -> Result<ParsedFile> {
    let mut warnings = Vec::new();

    let (transfer_syntax, dataset_start, meta) = if has_magic(data) {
        let mut reader = ByteReader::new(data);
        // the file meta group is always explicit VR little endian
        reader
            .seek(PREAMBLE_LEN + 4)
            .expect("magic check guarantees the offset");
        let meta = read_file_meta(&mut reader, &mut warnings);
        let ts = match meta.transfer_syntax_uid {
            Some(ref uid) => TransferSyntax::from_uid(uid),
            None => {
                let ts = sniff_dataset_mode(data, reader.position());
                warnings.push(format!(
                    "File meta group carries no transfer syntax UID; assuming {}",
                    ts.uid
                ));
                ts
            }
        };
        (ts, reader.position(), Some(meta))
    } else if plausible_legacy(data) {
        (TransferSyntax::implicit_vr_little_endian(), 0, None)
    } else {
        return NotDicomSnafu.fail();
    };

    let mut store = LazyTagStore::new(transfer_syntax.endianness);
    if let Some(meta) = meta {
        for record in meta.records {
            store.put(record);
        }
    }

    let mut walker = DatasetWalker {
        reader: ByteReader::new(data),
        transfer_syntax: transfer_syntax.clone(),
        warnings,
    };
    walker
        .reader
        .seek(dataset_start)
        .expect("dataset start lies within the buffer");
    let pixel_data = walker.walk(&mut store);

    Ok(ParsedFile {
        store,
        transfer_syntax,
        pixel_data,
        warnings: walker.warnings,
    })
}

/// Parse the item table of an encapsulated pixel data value:
/// the Basic Offset Table item followed by one or more fragment items,
/// terminated by the sequence delimitation item.
///
/// Returns the byte ranges of the fragment payloads, in stream order,
/// with the Basic Offset Table excluded.
pub fn encapsulated_fragments(data: &[u8], start: usize) -> Result<Vec<std::ops::Range<usize>>> {
    let mut reader = ByteReader::new(data);
    reader.seek(start).map_err(|_| {
        InvalidFormatSnafu {
            reason: format!("encapsulated pixel data offset {} out of bounds", start),
        }
        .build()
    })?;

    // encapsulated transfer syntaxes are all little endian
    let endianness = Endianness::Little;
    let mut fragments = Vec::new();
    let mut first = true;

    loop {
        if reader.remaining() == 0 {
            // delimiter missing; tolerate the common truncation
            tracing::warn!("Encapsulated pixel data ends without a sequence delimitation item");
            break;
        }
        let tag = match read_tag(&mut reader, endianness) {
            Ok(tag) => tag,
            Err(_) => {
                return InvalidFormatSnafu {
                    reason: "truncated item header in encapsulated pixel data".to_string(),
                }
                .fail()
            }
        };
        let length = reader.read_u32(endianness).map_err(|_| {
            InvalidFormatSnafu {
                reason: "truncated item header in encapsulated pixel data".to_string(),
            }
            .build()
        })?;

        if tag.is_sequence_delimiter() {
            break;
        }
        if !tag.is_item() {
            return InvalidFormatSnafu {
                reason: format!("unexpected tag {} in encapsulated pixel data", tag),
            }
            .fail();
        }
        if length == UNDEFINED_LENGTH {
            return InvalidFormatSnafu {
                reason: "fragment item with undefined length".to_string(),
            }
            .fail();
        }

        let length = length as usize;
        let payload_start = reader.position();
        reader.skip(length).map_err(|_| {
            InvalidFormatSnafu {
                reason: format!(
                    "fragment at offset {} exceeds the buffer by {} bytes",
                    payload_start,
                    payload_start + length - data.len()
                ),
            }
            .build()
        })?;

        if first {
            // the Basic Offset Table item carries frame offsets, not pixels
            first = false;
        } else {
            fragments.push(payload_start..payload_start + length);
        }
    }

    Ok(fragments)
}

struct FileMeta {
    records: Vec<TagMetadata>,
    transfer_syntax_uid: Option<String>,
}

/// Walk the `(0002,*)` group, recording its elements.
/// Problems are reported as warnings and end the group early.
fn read_file_meta(reader: &mut ByteReader<'_>, warnings: &mut Vec<String>) -> FileMeta {
    let endianness = Endianness::Little;
    let mut records = Vec::new();
    let mut transfer_syntax_uid = None;

    while reader.remaining() >= 8 {
        let peeked = reader.peek_bytes(2).expect("remaining checked above");
        if LittleEndian::read_u16(peeked) != 0x0002 {
            break;
        }
        let tag = read_tag(reader, endianness).expect("remaining checked above");
        let (vr, length) = match read_explicit_vr_and_length(reader, endianness) {
            Ok(head) => head,
            Err(e) => {
                warnings.push(format!("Malformed file meta element {}: {}", tag, e));
                return FileMeta {
                    records,
                    transfer_syntax_uid,
                };
            }
        };
        let Some(length) = length else {
            warnings.push(format!(
                "File meta element {} has undefined length; stopping meta group",
                tag
            ));
            return FileMeta {
                records,
                transfer_syntax_uid,
            };
        };
        let offset = reader.position();
        if reader.skip(length).is_err() {
            warnings.push(format!(
                "File meta element {} exceeds the buffer; stopping meta group",
                tag
            ));
            return FileMeta {
                records,
                transfer_syntax_uid,
            };
        }
        if tag == tags::TRANSFER_SYNTAX_UID {
            let raw = &reader.data()[offset..offset + length];
            transfer_syntax_uid = Some(
                raw.iter()
                    .map(|&b| char::from(b))
                    .collect::<String>()
                    .trim_end_matches(|c: char| c.is_whitespace() || c == '\0')
                    .to_string(),
            );
        }
        records.push(TagMetadata::new(tag, offset, vr, length));
    }

    FileMeta {
        records,
        transfer_syntax_uid,
    }
}

/// Guess the data set serialization when the meta group names no
/// transfer syntax: if the first element after the meta group
/// carries a readable VR code, assume explicit VR little endian,
/// otherwise implicit.
fn sniff_dataset_mode(data: &[u8], dataset_start: usize) -> TransferSyntax {
    match data.get(dataset_start + 4..dataset_start + 6) {
        Some([a, b]) if a.is_ascii_uppercase() && b.is_ascii_uppercase() => {
            TransferSyntax::explicit_vr_little_endian()
        }
        _ => TransferSyntax::implicit_vr_little_endian(),
    }
}

fn read_tag(reader: &mut ByteReader<'_>, endianness: Endianness) -> crate::bytes::Result<Tag> {
    let group = reader.read_u16(endianness)?;
    let element = reader.read_u16(endianness)?;
    Ok(Tag(group, element))
}

/// Read the VR code and length of an explicit-VR element,
/// after its tag. Returns `None` length for undefined lengths.
fn read_explicit_vr_and_length(
    reader: &mut ByteReader<'_>,
    endianness: Endianness,
) -> crate::bytes::Result<(VR, Option<usize>)> {
    let code = reader.read_bytes(2)?;
    let vr = VR::from_binary([code[0], code[1]]).unwrap_or(VR::UN);
    let length = if vr.has_long_length() || VR::from_binary([code[0], code[1]]).is_none() {
        reader.skip(2)?;
        reader.read_u32(endianness)?
    } else {
        u32::from(reader.read_u16(endianness)?)
    };
    if length == UNDEFINED_LENGTH {
        Ok((vr, None))
    } else {
        Ok((vr, Some(length as usize)))
    }
}

struct DatasetWalker<'a> {
    reader: ByteReader<'a>,
    transfer_syntax: TransferSyntax,
    warnings: Vec<String>,
}

/// One decoded element header:
/// the tag, resolved VR, and value length (`None` when undefined).
struct ElementHead {
    tag: Tag,
    vr: VR,
    length: Option<usize>,
}

impl<'a> DatasetWalker<'a> {
    /// Walk elements until the end of the buffer or the pixel data tag.
    ///
    /// Elements are recorded in `store` as they are located;
    /// a malformed or truncated element ends the walk
    /// with the store retaining everything parsed before it.
    fn walk(&mut self, store: &mut LazyTagStore) -> Option<PixelDataInfo> {
        loop {
            if self.reader.remaining() == 0 {
                return None;
            }
            if self.reader.remaining() < 8 {
                self.warn(format!(
                    "{} trailing bytes are too short for an element header",
                    self.reader.remaining()
                ));
                return None;
            }

            let head = match self.read_element_head() {
                Ok(head) => head,
                Err(reason) => {
                    self.warn(reason);
                    return None;
                }
            };

            if head.tag == tags::PIXEL_DATA {
                return self.locate_pixel_data(store, head);
            }

            match head.length {
                Some(length) => {
                    let offset = self.reader.position();
                    if self.reader.skip(length).is_err() {
                        self.warn(format!(
                            "Element {} claims {} value bytes with only {} remaining",
                            head.tag,
                            length,
                            self.reader.remaining()
                        ));
                        return None;
                    }
                    store.put(TagMetadata::new(head.tag, offset, head.vr, length));
                }
                None => {
                    // undefined length: a sequence (or sequence-like
                    // element); record its presence and skip its items
                    let offset = self.reader.position();
                    store.put(TagMetadata::new(head.tag, offset, head.vr, 0));
                    if let Err(reason) = self.skip_undefined_length(1) {
                        self.warn(reason);
                        return None;
                    }
                }
            }
        }
    }

    fn warn(&mut self, message: String) {
        tracing::warn!("{}", message);
        self.warnings.push(message);
    }

    /// Decode the next element header according to the transfer syntax.
    ///
    /// In explicit mode, an element whose VR bytes are not ASCII letters
    /// is reinterpreted as implicit VR (resolved from the dictionary),
    /// with a warning.
    fn read_element_head(&mut self) -> std::result::Result<ElementHead, String> {
        let endianness = self.transfer_syntax.endianness;
        let tag = read_tag(&mut self.reader, endianness)
            .map_err(|e| format!("Truncated element header: {}", e))?;

        // item and delimiter pseudo-elements never carry a VR
        if tag.group() == 0xFFFE {
            let length = self
                .reader
                .read_u32(endianness)
                .map_err(|e| format!("Truncated item header {}: {}", tag, e))?;
            let length = (length != UNDEFINED_LENGTH).then_some(length as usize);
            return Ok(ElementHead {
                tag,
                vr: VR::UN,
                length,
            });
        }

        match self.transfer_syntax.vr_mode {
            VrMode::Implicit => {
                let length = self
                    .reader
                    .read_u32(endianness)
                    .map_err(|e| format!("Truncated element header {}: {}", tag, e))?;
                let vr = vr_of(tag);
                let length = (length != UNDEFINED_LENGTH).then_some(length as usize);
                Ok(ElementHead { tag, vr, length })
            }
            VrMode::Explicit => {
                let code = self
                    .reader
                    .peek_bytes(2)
                    .map_err(|e| format!("Truncated element header {}: {}", tag, e))?;
                if !(code[0].is_ascii_uppercase() && code[1].is_ascii_uppercase()) {
                    // not a VR code: reinterpret this element as implicit
                    let warning = format!(
                        "Element {} carries malformed VR bytes {:02X} {:02X}; \
                         reading it as implicit VR",
                        tag, code[0], code[1]
                    );
                    tracing::warn!("{}", warning);
                    self.warnings.push(warning);
                    let length = self
                        .reader
                        .read_u32(endianness)
                        .map_err(|e| format!("Truncated element header {}: {}", tag, e))?;
                    let vr = vr_of(tag);
                    let length = (length != UNDEFINED_LENGTH).then_some(length as usize);
                    return Ok(ElementHead { tag, vr, length });
                }
                let (vr, length) = read_explicit_vr_and_length(&mut self.reader, endianness)
                    .map_err(|e| format!("Truncated element header {}: {}", tag, e))?;
                Ok(ElementHead { tag, vr, length })
            }
        }
    }

    /// Record the pixel data location and terminate the walk.
    fn locate_pixel_data(
        &mut self,
        store: &mut LazyTagStore,
        head: ElementHead,
    ) -> Option<PixelDataInfo> {
        let offset = self.reader.position();
        match head.length {
            Some(length) => {
                if offset + length > self.reader.data().len() {
                    self.warn(format!(
                        "Pixel data claims {} bytes with only {} remaining",
                        length,
                        self.reader.remaining()
                    ));
                    return None;
                }
                store.put(TagMetadata::new(head.tag, offset, head.vr, length));
                Some(PixelDataInfo {
                    offset,
                    length: Some(length),
                    encapsulated: false,
                    vr: head.vr,
                })
            }
            None => Some(PixelDataInfo {
                offset,
                length: None,
                encapsulated: true,
                vr: head.vr,
            }),
        }
    }

    /// Skip the items of an undefined-length element
    /// up to its sequence delimitation item.
    fn skip_undefined_length(&mut self, depth: u32) -> std::result::Result<(), String> {
        if depth > MAX_SEQUENCE_DEPTH {
            return Err(format!(
                "Sequence nesting exceeds {} levels",
                MAX_SEQUENCE_DEPTH
            ));
        }
        let endianness = self.transfer_syntax.endianness;
        loop {
            let tag = read_tag(&mut self.reader, endianness)
                .map_err(|e| format!("Truncated sequence item header: {}", e))?;
            let length = self
                .reader
                .read_u32(endianness)
                .map_err(|e| format!("Truncated sequence item header {}: {}", tag, e))?;

            if tag.is_sequence_delimiter() {
                return Ok(());
            }
            if !tag.is_item() {
                return Err(format!("Unexpected tag {} inside a sequence", tag));
            }
            if length != UNDEFINED_LENGTH {
                self.reader.skip(length as usize).map_err(|_| {
                    format!(
                        "Sequence item claims {} bytes with only {} remaining",
                        length,
                        self.reader.remaining()
                    )
                })?;
                continue;
            }
            self.skip_undefined_item(depth)?;
        }
    }

    /// Skip the elements of an undefined-length item
    /// up to its item delimitation item.
    fn skip_undefined_item(&mut self, depth: u32) -> std::result::Result<(), String> {
        loop {
            let peeked = self
                .reader
                .peek_bytes(8)
                .map_err(|e| format!("Truncated sequence item: {}", e))?;
            let endianness = self.transfer_syntax.endianness;
            let group = match endianness {
                Endianness::Little => LittleEndian::read_u16(&peeked[0..2]),
                Endianness::Big => byteordered::byteorder::BigEndian::read_u16(&peeked[0..2]),
            };
            let element = match endianness {
                Endianness::Little => LittleEndian::read_u16(&peeked[2..4]),
                Endianness::Big => byteordered::byteorder::BigEndian::read_u16(&peeked[2..4]),
            };
            if Tag(group, element).is_item_delimiter() {
                self.reader.skip(8).expect("peek checked 8 bytes");
                return Ok(());
            }

            let head = self.read_element_head()?;
            match head.length {
                Some(length) => {
                    self.reader.skip(length).map_err(|_| {
                        format!(
                            "Element {} inside a sequence item claims {} bytes \
                             with only {} remaining",
                            head.tag,
                            length,
                            self.reader.remaining()
                        )
                    })?;
                }
                None => self.skip_undefined_length(depth + 1)?,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn empty_and_tiny_buffers_are_not_dicom() {
        assert!(matches!(parse(&[]), Err(Error::NotDicom { .. })));
        assert!(matches!(parse(&[0x42]), Err(Error::NotDicom { .. })));
        assert!(matches!(parse(&[0u8; 131]), Err(Error::NotDicom { .. })));
    }

    #[test]
    fn parses_explicit_le_with_magic() {
        let file = testing::FileBuilder::explicit_le()
            .text_element(Tag(0x0008, 0x0060), VR::CS, "CT")
            .u16_element(tags::ROWS, 2)
            .u16_element(tags::COLUMNS, 4)
            .build();
        let parsed = parse(&file).unwrap();

        assert!(parsed.warnings.is_empty());
        assert_eq!(parsed.transfer_syntax.vr_mode, VrMode::Explicit);
        assert_eq!(
            parsed.store.value_string(&file, Tag(0x0008, 0x0060)),
            "CT"
        );
        assert_eq!(parsed.store.value_int(&file, tags::ROWS), Some(2));
        assert_eq!(parsed.store.value_int(&file, tags::COLUMNS), Some(4));
    }

    #[test]
    fn locates_native_pixel_data_and_stops() {
        let file = testing::FileBuilder::explicit_le()
            .u16_element(tags::ROWS, 1)
            .pixel_data_ow(&[0xAB, 0xCD])
            .build();
        let parsed = parse(&file).unwrap();

        let info = parsed.pixel_data.expect("pixel data located");
        assert!(!info.encapsulated);
        assert_eq!(info.length, Some(2));
        assert_eq!(&file[info.offset..info.offset + 2], &[0xAB, 0xCD]);
    }

    #[test]
    fn parses_implicit_vr_via_dictionary() {
        let file = testing::FileBuilder::implicit_le()
            .u16_element(tags::BITS_ALLOCATED, 16)
            .build();
        let parsed = parse(&file).unwrap();

        let meta = parsed.store.metadata(tags::BITS_ALLOCATED).unwrap();
        assert_eq!(meta.vr, VR::US);
        assert_eq!(parsed.store.value_int(&file, tags::BITS_ALLOCATED), Some(16));
    }

    #[test]
    fn legacy_file_without_magic_parses_from_offset_zero() {
        // implicit VR element (0008,0060), length 2, value "CT"
        let mut raw = Vec::new();
        raw.extend_from_slice(&[0x08, 0x00, 0x60, 0x00]);
        raw.extend_from_slice(&2u32.to_le_bytes());
        raw.extend_from_slice(b"CT");
        let parsed = parse(&raw).unwrap();
        assert_eq!(parsed.transfer_syntax.vr_mode, VrMode::Implicit);
        assert_eq!(parsed.store.value_string(&raw, Tag(0x0008, 0x0060)), "CT");
    }

    #[test]
    fn truncated_element_keeps_earlier_elements() {
        let mut file = testing::FileBuilder::explicit_le()
            .text_element(Tag(0x0008, 0x0060), VR::CS, "MR")
            .build();
        // a header claiming more value bytes than the buffer holds
        file.extend_from_slice(&[0x28, 0x00, 0x10, 0x00]); // (0028,0010)
        file.extend_from_slice(b"US");
        file.extend_from_slice(&100u16.to_le_bytes());
        file.extend_from_slice(&[0x01]);

        let parsed = parse(&file).unwrap();
        assert!(!parsed.warnings.is_empty());
        assert_eq!(parsed.store.value_string(&file, Tag(0x0008, 0x0060)), "MR");
        assert!(!parsed.store.contains(tags::ROWS));
    }

    #[test]
    fn skips_undefined_length_sequence() {
        let file = testing::FileBuilder::explicit_le()
            .undefined_sequence(Tag(0x0008, 0x1140), |items| {
                items.defined_item(&[0u8; 6]);
            })
            .u16_element(tags::ROWS, 7)
            .build();
        let parsed = parse(&file).unwrap();
        assert!(parsed.warnings.is_empty(), "{:?}", parsed.warnings);
        assert_eq!(parsed.store.value_int(&file, tags::ROWS), Some(7));
        assert!(parsed.store.contains(Tag(0x0008, 0x1140)));
    }

    #[test]
    fn encapsulated_pixel_data_terminates_walk() {
        let file = testing::FileBuilder::encapsulated(dcmview_core::uids::JPEG_LOSSLESS_SV1)
            .u16_element(tags::ROWS, 2)
            .encapsulated_pixel_data(&[&[0xFF, 0xD8, 0xFF, 0xD9]])
            .build();
        let parsed = parse(&file).unwrap();

        let info = parsed.pixel_data.expect("pixel data located");
        assert!(info.encapsulated);
        assert_eq!(info.length, None);

        let frags = encapsulated_fragments(&file, info.offset).unwrap();
        assert_eq!(frags.len(), 1);
        assert_eq!(&file[frags[0].clone()], &[0xFF, 0xD8, 0xFF, 0xD9]);
    }

    #[test]
    fn malformed_vr_falls_back_to_implicit() {
        let mut file = testing::FileBuilder::explicit_le().build();
        // (0028,0010) with binary garbage where the VR code belongs,
        // laid out as an implicit element: tag + u32 length + value
        file.extend_from_slice(&[0x28, 0x00, 0x10, 0x00]);
        file.extend_from_slice(&2u32.to_le_bytes());
        file.extend_from_slice(&512u16.to_le_bytes());

        let parsed = parse(&file).unwrap();
        assert!(!parsed.warnings.is_empty());
        assert_eq!(parsed.store.value_int(&file, tags::ROWS), Some(512));
        assert_eq!(parsed.store.metadata(tags::ROWS).unwrap().vr, VR::US);
    }
}
