//! The lazy tag store: metadata records by tag,
//! with value materialization deferred until first access.
//!
//! The store does not own the file buffer.
//! Callers pass the buffer the records point into;
//! the decoder which owns both guarantees they belong together.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Mutex;

use byteordered::byteorder::{BigEndian, ByteOrder, LittleEndian};
use byteordered::Endianness;
use dcmview_core::{Tag, TagMetadata, VR};

/// Store of parsed element metadata with a lazy string-value cache.
///
/// String values are decoded on first request and memoized;
/// subsequent requests for the same tag are a map lookup.
#[derive(Debug)]
pub struct LazyTagStore {
    entries: HashMap<u32, TagMetadata>,
    cache: Mutex<HashMap<u32, String>>,
    endianness: Endianness,
}

impl LazyTagStore {
    /// Create an empty store for a stream of the given endianness.
    pub fn new(endianness: Endianness) -> Self {
        LazyTagStore {
            entries: HashMap::new(),
            cache: Mutex::new(HashMap::new()),
            endianness,
        }
    }

    /// Record the metadata of one parsed element.
    ///
    /// A repeated tag replaces the previous record
    /// and invalidates its cached value.
    pub fn put(&mut self, meta: TagMetadata) {
        let key = meta.tag.packed();
        if self.entries.insert(key, meta).is_some() {
            self.cache.lock().unwrap().remove(&key);
        }
    }

    /// Retrieve the metadata record for a tag.
    pub fn metadata(&self, tag: Tag) -> Option<&TagMetadata> {
        self.entries.get(&tag.packed())
    }

    /// Whether an element with this tag was parsed.
    pub fn contains(&self, tag: Tag) -> bool {
        self.entries.contains_key(&tag.packed())
    }

    /// The number of recorded elements.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over the recorded metadata, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &TagMetadata> {
        self.entries.values()
    }

    /// The endianness used to decode binary values.
    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// Materialize the value of a tag as a string.
    ///
    /// `data` must be the file buffer the store's records point into.
    /// Returns an empty string when the tag is absent
    /// or the value cannot be decoded.
    /// The result is cached; repeated calls do not decode again.
    pub fn value_string(&self, data: &[u8], tag: Tag) -> String {
        let key = tag.packed();
        if let Some(cached) = self.cache.lock().unwrap().get(&key) {
            return cached.clone();
        }
        let decoded = self
            .entries
            .get(&key)
            .and_then(|meta| self.decode_string(data, meta))
            .unwrap_or_default();
        self.cache
            .lock()
            .unwrap()
            .entry(key)
            .or_insert(decoded)
            .clone()
    }

    /// Materialize the value of a tag as a signed integer.
    ///
    /// Binary integer VRs decode directly;
    /// textual numbers (`IS`, `DS`) parse their first component.
    pub fn value_int(&self, data: &[u8], tag: Tag) -> Option<i64> {
        let meta = self.entries.get(&tag.packed())?;
        let bytes = self.value_bytes(data, meta)?;
        match meta.vr {
            VR::US => (bytes.len() >= 2).then(|| i64::from(self.read_u16(bytes))),
            VR::UL => (bytes.len() >= 4).then(|| i64::from(self.read_u32(bytes))),
            VR::SS => (bytes.len() >= 2).then(|| i64::from(self.read_u16(bytes) as i16)),
            VR::SL => (bytes.len() >= 4).then(|| i64::from(self.read_u32(bytes) as i32)),
            _ => first_component(bytes).trim().parse::<i64>().ok(),
        }
    }

    /// Materialize the value of a tag as a floating-point number.
    pub fn value_f64(&self, data: &[u8], tag: Tag) -> Option<f64> {
        let meta = self.entries.get(&tag.packed())?;
        let bytes = self.value_bytes(data, meta)?;
        match meta.vr {
            VR::FL => (bytes.len() >= 4).then(|| f64::from(self.read_f32(bytes))),
            VR::FD => (bytes.len() >= 8).then(|| self.read_f64(bytes)),
            VR::US => (bytes.len() >= 2).then(|| f64::from(self.read_u16(bytes))),
            VR::UL => (bytes.len() >= 4).then(|| f64::from(self.read_u32(bytes))),
            VR::SS => (bytes.len() >= 2).then(|| f64::from(self.read_u16(bytes) as i16)),
            VR::SL => (bytes.len() >= 4).then(|| f64::from(self.read_u32(bytes) as i32)),
            _ => first_component(bytes).trim().parse::<f64>().ok(),
        }
    }

    /// Materialize a multi-valued numeric attribute
    /// (e.g. Pixel Spacing, Image Orientation)
    /// by splitting the textual value on `\`.
    pub fn value_f64_list(&self, data: &[u8], tag: Tag) -> Option<Vec<f64>> {
        let meta = self.entries.get(&tag.packed())?;
        let bytes = self.value_bytes(data, meta)?;
        let text = latin1(bytes);
        let values: Vec<f64> = text
            .split('\\')
            .filter_map(|part| part.trim_matches(|c: char| c.is_whitespace() || c == '\0').parse().ok())
            .collect();
        (!values.is_empty()).then_some(values)
    }

    fn value_bytes<'b>(&self, data: &'b [u8], meta: &TagMetadata) -> Option<&'b [u8]> {
        data.get(meta.offset..meta.end())
    }

    fn read_u16(&self, bytes: &[u8]) -> u16 {
        match self.endianness {
            Endianness::Little => LittleEndian::read_u16(bytes),
            Endianness::Big => BigEndian::read_u16(bytes),
        }
    }

    fn read_u32(&self, bytes: &[u8]) -> u32 {
        match self.endianness {
            Endianness::Little => LittleEndian::read_u32(bytes),
            Endianness::Big => BigEndian::read_u32(bytes),
        }
    }

    fn read_f32(&self, bytes: &[u8]) -> f32 {
        match self.endianness {
            Endianness::Little => LittleEndian::read_f32(bytes),
            Endianness::Big => BigEndian::read_f32(bytes),
        }
    }

    fn read_f64(&self, bytes: &[u8]) -> f64 {
        match self.endianness {
            Endianness::Little => LittleEndian::read_f64(bytes),
            Endianness::Big => BigEndian::read_f64(bytes),
        }
    }

    fn decode_string(&self, data: &[u8], meta: &TagMetadata) -> Option<String> {
        let bytes = self.value_bytes(data, meta)?;
        let out = match meta.vr {
            vr if vr.is_textual() => latin1(bytes)
                .trim_end_matches(|c: char| c.is_whitespace() || c == '\0')
                .to_string(),
            VR::US => join_numbers(bytes.chunks_exact(2), |c| self.read_u16(c).to_string()),
            VR::UL => join_numbers(bytes.chunks_exact(4), |c| self.read_u32(c).to_string()),
            VR::SS => join_numbers(bytes.chunks_exact(2), |c| {
                (self.read_u16(c) as i16).to_string()
            }),
            VR::SL => join_numbers(bytes.chunks_exact(4), |c| {
                (self.read_u32(c) as i32).to_string()
            }),
            VR::FL => join_numbers(bytes.chunks_exact(4), |c| self.read_f32(c).to_string()),
            VR::FD => join_numbers(bytes.chunks_exact(8), |c| self.read_f64(c).to_string()),
            VR::AT => {
                // attribute tags are pairs of 16-bit group/element numbers
                join_numbers(bytes.chunks_exact(4), |c| {
                    format!(
                        "({:04X},{:04X})",
                        self.read_u16(&c[..2]),
                        self.read_u16(&c[2..])
                    )
                })
            }
            _ => hex_dump(bytes),
        };
        Some(out)
    }
}

/// Decode bytes as ISO-8859-1, mapping each byte to the same code point.
fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// The first `\`-separated component of a textual multi-value.
fn first_component(bytes: &[u8]) -> String {
    latin1(bytes)
        .split('\\')
        .next()
        .unwrap_or_default()
        .trim_matches(|c: char| c.is_whitespace() || c == '\0')
        .to_string()
}

fn join_numbers<'b, I>(chunks: I, mut render: impl FnMut(&'b [u8]) -> String) -> String
where
    I: Iterator<Item = &'b [u8]>,
{
    let mut out = String::new();
    for (i, chunk) in chunks.enumerate() {
        if i > 0 {
            out.push('\\');
        }
        out.push_str(&render(chunk));
    }
    out
}

fn hex_dump(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{:02X}", b);
    }
    out
}
