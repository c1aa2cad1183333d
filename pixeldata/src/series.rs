//! Assembly of ordered volumes from a directory of single-frame files.
//!
//! Slices are ordered by projecting their Image Position (Patient)
//! onto the normal of the shared image plane;
//! files whose geometry disagrees with the first loaded slice
//! abort the composition.

use std::path::{Path, PathBuf};

use dcmview_core::{CancelFlag, PixelSpacing, RescaleParameters};
use dcmview_object::Decoder;

use crate::{
    CancelledSnafu, Error, InconsistentGeometrySnafu, InvalidPixelDataSnafu, PixelDecoder, Result,
};

/// Relative tolerance for orientation cosines.
const COSINE_EPSILON: f64 = 1e-4;

/// Relative tolerance for in-plane spacing (0.1%).
const SPACING_TOLERANCE: f64 = 1e-3;

/// A composed multi-slice volume.
#[derive(Debug)]
pub struct SeriesVolume {
    /// voxel samples, slice-major then row-major
    pub voxels: Vec<u16>,
    /// whether the source samples were signed
    /// (already normalized into the unsigned range)
    pub signed: bool,
    /// slice width in pixels
    pub width: u32,
    /// slice height in pixels
    pub height: u32,
    /// number of slices
    pub slice_count: usize,
    /// voxel spacing; `z` is derived from the slice positions
    pub spacing: PixelSpacing,
    /// row direction cosine of the image plane
    pub row_cosine: [f64; 3],
    /// column direction cosine of the image plane
    pub column_cosine: [f64; 3],
    /// world position of the first slice's first pixel
    pub origin: [f64; 3],
    /// modality rescale shared by the slices
    pub rescale: RescaleParameters,
    /// series description of the source files
    pub description: String,
}

/// Receiver of composition progress,
/// called after each slice with `(current, total)`.
pub trait ProgressSink {
    /// Report that `current` of `total` slices are composed.
    fn progress(&mut self, current: usize, total: usize);
}

impl<F: FnMut(usize, usize)> ProgressSink for F {
    fn progress(&mut self, current: usize, total: usize) {
        self(current, total)
    }
}

/// A no-op progress sink.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn progress(&mut self, _: usize, _: usize) {}
}

struct ReferenceGeometry {
    width: u32,
    height: u32,
    orientation: Option<([f64; 3], [f64; 3])>,
    spacing: PixelSpacing,
    signed: bool,
}

struct Slice {
    path: PathBuf,
    decoder: Decoder,
    sort_key: f64,
    position: Option<[f64; 3]>,
}

/// Load every single-frame file of a directory into one ordered volume.
///
/// Files without a `.dcm`/`.dicom` extension are ignored;
/// files that fail to decode, or are not 16-bit single-sample images,
/// are skipped with a diagnostic.
/// Geometry inconsistency with the first loaded slice aborts the load;
/// there is no partial success.
pub fn load_series(
    dir: impl AsRef<Path>,
    progress: &mut dyn ProgressSink,
    cancel: &CancelFlag,
) -> Result<SeriesVolume> {
    let dir = dir.as_ref();
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| {
            InvalidPixelDataSnafu {
                reason: format!("cannot read directory {}: {}", dir.display(), e),
            }
            .build()
        })?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| {
                    let ext = ext.to_ascii_lowercase();
                    ext == "dcm" || ext == "dicom"
                })
                .unwrap_or(false)
        })
        .collect();
    paths.sort();

    let mut reference: Option<ReferenceGeometry> = None;
    let mut slices: Vec<Slice> = Vec::new();

    for path in paths {
        if cancel.is_cancelled() {
            return CancelledSnafu.fail();
        }
        let decoder = match Decoder::load_from_path(&path) {
            Ok(decoder) => decoder,
            Err(e) => {
                tracing::warn!("Skipping {}: {}", path.display(), e);
                continue;
            }
        };
        if decoder.samples_per_pixel() != 1 || decoder.bit_depth() != 16 {
            tracing::warn!(
                "Skipping {}: not a 16-bit single-sample image",
                path.display()
            );
            continue;
        }

        match &reference {
            None => {
                reference = Some(ReferenceGeometry {
                    width: decoder.width(),
                    height: decoder.height(),
                    orientation: decoder.image_orientation(),
                    spacing: decoder.pixel_spacing(),
                    signed: decoder.signed_image(),
                });
            }
            Some(reference) => {
                check_geometry(reference, &decoder, &path)?;
            }
        }

        let slice = make_slice(path, decoder, reference.as_ref().expect("set above"));
        slices.push(slice);
    }

    let Some(reference) = reference else {
        return InvalidPixelDataSnafu {
            reason: format!("no loadable DICOM slices in {}", dir.display()),
        }
        .fail();
    };

    // order along the slice normal; the key is the normal projection
    // when positions are present and the instance number otherwise
    slices.sort_by(|a, b| a.sort_key.total_cmp(&b.sort_key));

    let spacing_z = slice_spacing(&slices).unwrap_or(reference.spacing.z);

    let width = reference.width as usize;
    let height = reference.height as usize;
    let total = slices.len();
    let mut voxels: Vec<u16> = Vec::with_capacity(width * height * total);

    for (index, slice) in slices.iter().enumerate() {
        if cancel.is_cancelled() {
            return CancelledSnafu.fail();
        }
        let pixels = slice.decoder.pixels_u16().map_err(|e| match e {
            Error::InvalidPixelData { reason, .. } => InvalidPixelDataSnafu {
                reason: format!("{}: {}", slice.path.display(), reason),
            }
            .build(),
            other => other,
        })?;
        voxels.extend_from_slice(&pixels);
        progress.progress(index + 1, total);
    }

    let first = &slices[0];
    let (row_cosine, column_cosine) = reference
        .orientation
        .unwrap_or(([1., 0., 0.], [0., 1., 0.]));

    Ok(SeriesVolume {
        voxels,
        signed: reference.signed,
        width: reference.width,
        height: reference.height,
        slice_count: total,
        spacing: PixelSpacing::new(reference.spacing.x, reference.spacing.y, spacing_z),
        row_cosine,
        column_cosine,
        origin: first.position.unwrap_or([0., 0., 0.]),
        rescale: first.decoder.rescale(),
        description: first.decoder.series_description(),
    })
}

fn make_slice(path: PathBuf, decoder: Decoder, reference: &ReferenceGeometry) -> Slice {
    let position = decoder.image_position();
    let sort_key = match (position, reference.orientation) {
        (Some(position), Some((row, col))) => dot(position, cross(row, col)),
        _ => decoder.instance_number().unwrap_or(i64::MAX) as f64,
    };
    Slice {
        path,
        decoder,
        sort_key,
        position,
    }
}

fn check_geometry(reference: &ReferenceGeometry, decoder: &Decoder, path: &Path) -> Result<()> {
    if decoder.width() != reference.width || decoder.height() != reference.height {
        return InconsistentGeometrySnafu { path }.fail();
    }
    if decoder.signed_image() != reference.signed {
        return InconsistentGeometrySnafu { path }.fail();
    }

    match (reference.orientation, decoder.image_orientation()) {
        (None, None) => {}
        (Some((ref_row, ref_col)), Some((row, col))) => {
            for i in 0..3 {
                if (ref_row[i] - row[i]).abs() > COSINE_EPSILON
                    || (ref_col[i] - col[i]).abs() > COSINE_EPSILON
                {
                    return InconsistentGeometrySnafu { path }.fail();
                }
            }
        }
        _ => return InconsistentGeometrySnafu { path }.fail(),
    }

    let spacing = decoder.pixel_spacing();
    for (a, b) in [
        (spacing.x, reference.spacing.x),
        (spacing.y, reference.spacing.y),
    ] {
        if (a - b).abs() > b.abs() * SPACING_TOLERANCE {
            return InconsistentGeometrySnafu { path }.fail();
        }
    }
    Ok(())
}

/// The median of adjacent projection differences.
/// `None` with fewer than two positioned slices.
fn slice_spacing(slices: &[Slice]) -> Option<f64> {
    if slices.len() < 2 || slices.iter().any(|s| s.position.is_none()) {
        return None;
    }
    let mut gaps: Vec<f64> = slices
        .windows(2)
        .map(|pair| (pair[1].sort_key - pair[0].sort_key).abs())
        .collect();
    gaps.sort_by(f64::total_cmp);
    Some(gaps[gaps.len() / 2])
}

fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}
