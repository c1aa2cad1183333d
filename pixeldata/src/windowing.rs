//! The linear window/level transform from 16-bit samples
//! to 8-bit display values, with selectable execution backends.
//!
//! The CPU backend is the reference implementation;
//! a GPU compute backend can be registered at runtime
//! through [`set_compute_device`] and must match the CPU output exactly.
//! Backend selection under [`Mode::Auto`] prefers the GPU
//! only for images large enough to amortize the dispatch.

use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;
use rayon::iter::{IndexedParallelIterator, IntoParallelRefIterator, ParallelIterator};
use rayon::slice::{ParallelSlice, ParallelSliceMut};

use dcmview_core::WindowSettings;

use crate::{BackendUnavailableSnafu, InvalidWindowLevelSnafu, Result};

/// Pixel count from which [`Mode::Auto`] prefers the GPU backend.
pub const GPU_PIXEL_THRESHOLD: usize = 640_000;

/// Pixel count from which the CPU backend parallelizes.
const PARALLEL_THRESHOLD: usize = 1 << 16;

/// Which backend executes the transform.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Mode {
    /// Always run on the CPU.
    Cpu,
    /// Always run on the GPU; fail when no device is usable.
    Gpu,
    /// Pick automatically: the GPU for large images when available,
    /// the CPU otherwise.
    #[default]
    Auto,
}

/// A GPU compute device able to run the windowing kernel.
///
/// Implementations compile their pipeline on first dispatch and
/// cache it; their output must agree with the CPU backend bitwise.
pub trait ComputeDevice: Send + Sync {
    /// A short name for diagnostics.
    fn name(&self) -> &str;

    /// Run the windowing kernel over all samples.
    fn window_to_u8(
        &self,
        pixels: &[u16],
        settings: WindowSettings,
    ) -> std::result::Result<Vec<u8>, Box<dyn std::error::Error + Send + Sync>>;
}

/// The registered compute device, if any.
///
/// Read-mostly: written once by [`set_compute_device`],
/// read by every windowing call.
static COMPUTE_DEVICE: Lazy<RwLock<Option<Arc<dyn ComputeDevice>>>> =
    Lazy::new(|| RwLock::new(None));

/// Register a GPU compute device for the windowing engine.
///
/// Passing `None` clears the registration.
pub fn set_compute_device(device: Option<Arc<dyn ComputeDevice>>) {
    *COMPUTE_DEVICE.write().unwrap() = device;
}

fn compute_device() -> Option<Arc<dyn ComputeDevice>> {
    COMPUTE_DEVICE.read().unwrap().clone()
}

/// Apply the linear window/level transform.
///
/// Each sample maps through
/// `clamp((p - (center - width/2)) * 255/width, 0, 255)`,
/// truncated to an 8-bit display value.
///
/// Fails with [`Error::InvalidWindowLevel`] when `settings.width <= 0`,
/// and with [`Error::BackendUnavailable`] when the GPU is demanded
/// but no usable device is registered.
/// Under [`Mode::Auto`] a missing or failing GPU falls back to the CPU.
pub fn apply(pixels: &[u16], settings: WindowSettings, mode: Mode) -> Result<Vec<u8>> {
    if !settings.is_valid() {
        return InvalidWindowLevelSnafu {
            center: settings.center,
            width: settings.width,
        }
        .fail();
    }

    match mode {
        Mode::Cpu => Ok(apply_cpu(pixels, settings)),
        Mode::Gpu => {
            let device = compute_device().ok_or_else(|| {
                BackendUnavailableSnafu {
                    backend: "gpu".to_string(),
                }
                .build()
            })?;
            device.window_to_u8(pixels, settings).map_err(|e| {
                tracing::warn!("GPU windowing failed on {}: {}", device.name(), e);
                BackendUnavailableSnafu {
                    backend: device.name().to_string(),
                }
                .build()
            })
        }
        Mode::Auto => {
            if pixels.len() >= GPU_PIXEL_THRESHOLD {
                if let Some(device) = compute_device() {
                    match device.window_to_u8(pixels, settings) {
                        Ok(out) => return Ok(out),
                        Err(e) => {
                            tracing::warn!(
                                "GPU windowing failed on {}, falling back to CPU: {}",
                                device.name(),
                                e
                            );
                        }
                    }
                }
            }
            Ok(apply_cpu(pixels, settings))
        }
    }
}

/// The scalar transform of one sample; both backends must match it.
#[inline]
fn window_one(p: u16, min_level: f64, scale: f64) -> u8 {
    let v = (f64::from(p) - min_level) * scale;
    v.clamp(0., 255.) as u8
}

fn apply_cpu(pixels: &[u16], settings: WindowSettings) -> Vec<u8> {
    let min_level = settings.center - settings.width / 2.;
    let scale = 255. / settings.width;

    if pixels.len() >= PARALLEL_THRESHOLD {
        let mut out = vec![0u8; pixels.len()];
        out.par_chunks_mut(PARALLEL_THRESHOLD)
            .zip(pixels.par_chunks(PARALLEL_THRESHOLD))
            .for_each(|(dst, src)| {
                for (d, &p) in dst.iter_mut().zip(src) {
                    *d = window_one(p, min_level, scale);
                }
            });
        out
    } else {
        pixels
            .iter()
            .map(|&p| window_one(p, min_level, scale))
            .collect()
    }
}

/// Derive window settings from the sample statistics:
/// the window centers on the mean and spans four standard deviations,
/// clamped into the observed value range.
/// The result is always valid (`width >= 1`).
pub fn calculate_optimal(pixels: &[u16]) -> WindowSettings {
    if pixels.is_empty() {
        return WindowSettings::new(0., 1.);
    }

    let n = pixels.len() as f64;
    let (sum, sum_sq, min, max) = pixels
        .par_iter()
        .fold(
            || (0.0f64, 0.0f64, u16::MAX, u16::MIN),
            |(sum, sum_sq, min, max), &p| {
                let v = f64::from(p);
                (sum + v, sum_sq + v * v, min.min(p), max.max(p))
            },
        )
        .reduce(
            || (0., 0., u16::MAX, u16::MIN),
            |a, b| (a.0 + b.0, a.1 + b.1, a.2.min(b.2), a.3.max(b.3)),
        );

    let mean = sum / n;
    let variance = (sum_sq / n - mean * mean).max(0.);
    let stddev = variance.sqrt();
    let span = f64::from(max) - f64::from(min);

    let width = (4. * stddev).clamp(1., span.max(1.));
    WindowSettings::new(mean, width)
}
