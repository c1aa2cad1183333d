//! End-to-end pixel scenarios over synthetic files:
//! native 16-bit reads in both photometric interpretations,
//! signed normalization, an encapsulated JPEG Lossless stream,
//! windowing, and preset matching.

use dcmview_core::{tags, uids, CancelFlag, VR};
use dcmview_object::Decoder;
use dcmview_pixeldata::{
    preset_for, windowing, MedicalPreset, Mode, PixelDecoder,
};

fn gray16_file(photometric: &str, pixel_representation: u16, samples: &[u16]) -> Vec<u8> {
    dcmview_parser::testing::FileBuilder::explicit_le()
        .u16_element(tags::ROWS, 2)
        .u16_element(tags::COLUMNS, 4)
        .u16_element(tags::BITS_ALLOCATED, 16)
        .u16_element(tags::SAMPLES_PER_PIXEL, 1)
        .u16_element(tags::PIXEL_REPRESENTATION, pixel_representation)
        .text_element(tags::PHOTOMETRIC_INTERPRETATION, VR::CS, photometric)
        .pixel_data_u16_le(samples)
        .build()
}

const SAMPLES: [u16; 8] = [0x0000, 0x00FF, 0x0100, 0xFFFE, 0x0001, 0x0002, 0x0003, 0x0004];

#[test]
fn monochrome2_little_endian_roundtrip() {
    let obj = Decoder::load_from_bytes(gray16_file("MONOCHROME2", 0, &SAMPLES)).unwrap();
    let pixels = obj.pixels_u16().unwrap();
    assert_eq!(pixels, vec![0, 255, 256, 65534, 1, 2, 3, 4]);

    let result = obj.read_pixels().unwrap();
    assert!(!result.signed_image);
    assert_eq!((result.width, result.height), (4, 2));

    // the linear window maps each sample through
    // (p - (center - width/2)) * 255/width, truncated
    let display = windowing::apply(
        &pixels,
        dcmview_core::WindowSettings::new(128., 256.),
        Mode::Cpu,
    )
    .unwrap();
    assert_eq!(display, vec![0, 254, 255, 255, 0, 1, 2, 3]);
}

#[test]
fn monochrome1_inverts_samples() {
    let obj = Decoder::load_from_bytes(gray16_file("MONOCHROME1", 0, &SAMPLES)).unwrap();
    let pixels = obj.pixels_u16().unwrap();
    assert_eq!(
        pixels,
        vec![65535, 65280, 65279, 1, 65534, 65533, 65532, 65531]
    );
}

#[test]
fn signed_samples_normalize_into_unsigned_range() {
    let raw: [u16; 8] = [
        0x8000, // -32768
        0xFFFF, // -1
        0x0000, // 0
        0x7FFF, // 32767
        0x8001, // -32767
        0xFFFE, // -2
        0x0001, // 1
        0x0002, // 2
    ];
    let obj = Decoder::load_from_bytes(gray16_file("MONOCHROME2", 1, &raw)).unwrap();
    let result = obj.read_pixels().unwrap();
    assert!(result.signed_image);
    let pixels = result.pixels16.unwrap();
    assert_eq!(
        pixels,
        vec![0, 32767, 32768, 65535, 1, 32766, 32769, 32770]
    );
}

#[test]
fn big_endian_pixels_match_little_endian() {
    let le = Decoder::load_from_bytes(gray16_file("MONOCHROME2", 0, &SAMPLES)).unwrap();
    let be = Decoder::load_from_bytes(
        dcmview_parser::testing::FileBuilder::explicit_be()
            .u16_element(tags::ROWS, 2)
            .u16_element(tags::COLUMNS, 4)
            .u16_element(tags::BITS_ALLOCATED, 16)
            .u16_element(tags::SAMPLES_PER_PIXEL, 1)
            .u16_element(tags::PIXEL_REPRESENTATION, 0)
            .text_element(tags::PHOTOMETRIC_INTERPRETATION, VR::CS, "MONOCHROME2")
            .pixel_data_u16_be(&SAMPLES)
            .build(),
    )
    .unwrap();
    assert_eq!(le.pixels_u16().unwrap(), be.pixels_u16().unwrap());
}

#[test]
fn range_reads_agree_with_full_reads() {
    let obj = Decoder::load_from_bytes(gray16_file("MONOCHROME1", 0, &SAMPLES)).unwrap();
    let full = obj.pixels_u16().unwrap();
    for (lo, hi) in [(0, 8), (0, 1), (3, 6), (7, 8)] {
        let range = obj.pixels_range_u16(lo..hi).unwrap();
        assert_eq!(&full[lo..hi], &range[..], "range {}..{}", lo, hi);
    }
}

#[test]
fn truncated_pixel_data_is_rejected() {
    // rows*columns asks for 16 bytes, only 8 present:
    // the parser keeps the element, the pixel read rejects it
    let file = dcmview_parser::testing::FileBuilder::explicit_le()
        .u16_element(tags::ROWS, 4)
        .u16_element(tags::COLUMNS, 2)
        .u16_element(tags::BITS_ALLOCATED, 16)
        .pixel_data_u16_le(&[1, 2, 3, 4])
        .build();
    let obj = Decoder::load_from_bytes(file).unwrap();
    assert!(matches!(
        obj.pixels_u16(),
        Err(dcmview_pixeldata::Error::InvalidPixelData { .. })
    ));
}

#[test]
fn single_pixel_image_reads() {
    let file = dcmview_parser::testing::FileBuilder::explicit_le()
        .u16_element(tags::ROWS, 1)
        .u16_element(tags::COLUMNS, 1)
        .u16_element(tags::BITS_ALLOCATED, 16)
        .pixel_data_u16_le(&[4242])
        .build();
    let obj = Decoder::load_from_bytes(file).unwrap();
    assert_eq!(obj.pixels_u16().unwrap(), vec![4242]);
}

#[test]
fn rgb_file_reads_interleaved() {
    let file = dcmview_parser::testing::FileBuilder::explicit_le()
        .u16_element(tags::ROWS, 1)
        .u16_element(tags::COLUMNS, 2)
        .u16_element(tags::BITS_ALLOCATED, 8)
        .u16_element(tags::SAMPLES_PER_PIXEL, 3)
        .text_element(tags::PHOTOMETRIC_INTERPRETATION, VR::CS, "RGB")
        .pixel_data_ow(&[255, 0, 0, 0, 0, 255])
        .build();
    let obj = Decoder::load_from_bytes(file).unwrap();
    assert_eq!(obj.pixels_rgb().unwrap(), vec![255, 0, 0, 0, 0, 255]);
    assert_eq!(obj.pixels_range_rgb(1..2).unwrap(), vec![0, 0, 255]);
}

/// A minimal Process 14 codestream:
/// 8-bit 2x2 frame, one Huffman table whose single symbol 0
/// is the one-bit code `0`, selection value 1,
/// and four zero differences.
fn minimal_lossless_stream() -> Vec<u8> {
    let mut s = vec![0xFF, 0xD8];
    // SOF3: precision 8, 2 lines, 2 samples/line, 1 component
    s.extend_from_slice(&[0xFF, 0xC3, 0x00, 0x0B, 8, 0, 2, 0, 2, 1, 1, 0x11, 0]);
    // DHT: class 0 id 0, one code of length 1, symbol 0
    s.extend_from_slice(&[0xFF, 0xC4, 0x00, 0x14, 0x00]);
    s.push(1);
    s.extend_from_slice(&[0u8; 15]);
    s.push(0);
    // SOS: one component, DC table 0, Ss=1, Se=0, AhAl=0
    s.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x08, 1, 1, 0x00, 1, 0, 0]);
    // four zero symbols (one bit each), padded with ones
    s.push(0x0F);
    s.extend_from_slice(&[0xFF, 0xD9]);
    s
}

#[test]
fn jpeg_lossless_file_decodes_to_default_predictor() {
    let file = dcmview_parser::testing::FileBuilder::encapsulated(uids::JPEG_LOSSLESS_SV1)
        .u16_element(tags::ROWS, 2)
        .u16_element(tags::COLUMNS, 2)
        .u16_element(tags::BITS_ALLOCATED, 16)
        .u16_element(tags::SAMPLES_PER_PIXEL, 1)
        .text_element(tags::PHOTOMETRIC_INTERPRETATION, VR::CS, "MONOCHROME2")
        .encapsulated_pixel_data(&[&minimal_lossless_stream()])
        .build();
    let obj = Decoder::load_from_bytes(file).unwrap();
    assert!(obj.compressed());

    let result = obj.read_pixels().unwrap();
    assert_eq!(result.pixels16.unwrap(), vec![128, 128, 128, 128]);
    assert_eq!(result.bit_depth, 8);
    assert!(!result.signed_image);
}

#[test]
fn jpeg_lossless_decode_can_be_cancelled() {
    let file = dcmview_parser::testing::FileBuilder::encapsulated(uids::JPEG_LOSSLESS_SV1)
        .u16_element(tags::ROWS, 2)
        .u16_element(tags::COLUMNS, 2)
        .encapsulated_pixel_data(&[&minimal_lossless_stream()])
        .build();
    let obj = Decoder::load_from_bytes(file).unwrap();

    let flag = CancelFlag::new();
    flag.cancel();
    assert!(matches!(
        obj.read_pixels_with(&flag),
        Err(dcmview_pixeldata::Error::Cancelled { .. })
    ));
}

#[test]
fn other_jpeg_without_platform_decoder_is_unsupported() {
    let file = dcmview_parser::testing::FileBuilder::encapsulated(uids::JPEG_BASELINE)
        .u16_element(tags::ROWS, 2)
        .u16_element(tags::COLUMNS, 2)
        .encapsulated_pixel_data(&[&[0xFF, 0xD8, 0xFF, 0xD9]])
        .build();
    let obj = Decoder::load_from_bytes(file).unwrap();
    assert!(matches!(
        obj.pixels_u16(),
        Err(dcmview_pixeldata::Error::Unsupported { .. })
    ));
}

#[test]
fn windowing_presets_match_stored_settings() {
    assert_eq!(
        preset_for(dcmview_core::WindowSettings::new(-600., 1500.)),
        Some(MedicalPreset::Lung)
    );
    assert_eq!(
        preset_for(dcmview_core::WindowSettings::new(-600., 1400.)),
        None
    );
}

#[test]
fn downsampled_thumbnail_fits_bounds() {
    let samples: Vec<u16> = (0..64).collect();
    let file = dcmview_parser::testing::FileBuilder::explicit_le()
        .u16_element(tags::ROWS, 8)
        .u16_element(tags::COLUMNS, 8)
        .u16_element(tags::BITS_ALLOCATED, 16)
        .pixel_data_u16_le(&samples)
        .build();
    let obj = Decoder::load_from_bytes(file).unwrap();
    let (thumb, w, h) = obj.downsampled_u16(4).unwrap();
    assert_eq!((w, h), (4, 4));
    assert_eq!(thumb.len(), 16);
    assert_eq!(thumb[0], samples[0]);
}
