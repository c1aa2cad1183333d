//! Shared value types for display mapping and spatial metadata.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The parameters of a linear window/level display mapping,
/// comprising the window center and the window width.
///
/// A window is valid if and only if its width is greater than zero.
/// APIs which apply a window reject invalid settings;
/// this type itself does not.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct WindowSettings {
    /// the window center (level)
    pub center: f64,
    /// the window width; must be greater than 0 to be applicable
    pub width: f64,
}

impl WindowSettings {
    /// Create new window settings.
    #[inline]
    pub fn new(center: f64, width: f64) -> Self {
        WindowSettings { center, width }
    }

    /// Whether these settings can be applied (`width > 0`).
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.width > 0.
    }
}

impl fmt::Display for WindowSettings {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "C{} W{}", self.center, self.width)
    }
}

/// Physical distance between pixel centers, in millimeters,
/// along the column (`x`), row (`y`), and slice (`z`) directions.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PixelSpacing {
    /// column spacing in mm
    pub x: f64,
    /// row spacing in mm
    pub y: f64,
    /// slice spacing in mm
    pub z: f64,
}

impl PixelSpacing {
    /// Create a new pixel spacing value.
    #[inline]
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        PixelSpacing { x, y, z }
    }

    /// Whether all components are strictly positive.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.x > 0. && self.y > 0. && self.z > 0.
    }
}

impl Default for PixelSpacing {
    fn default() -> Self {
        PixelSpacing {
            x: 1.,
            y: 1.,
            z: 1.,
        }
    }
}

/// Description of a modality rescale function,
/// defined by a rescale slope and rescale intercept.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RescaleParameters {
    /// the rescale slope
    pub slope: f64,
    /// the rescale intercept
    pub intercept: f64,
}

impl RescaleParameters {
    /// Create a new rescale function.
    #[inline]
    pub fn new(slope: f64, intercept: f64) -> Self {
        RescaleParameters { slope, intercept }
    }

    /// Whether this is the identity transform
    /// (`slope == 1 && intercept == 0`).
    #[inline]
    pub fn is_identity(&self) -> bool {
        self.slope == 1. && self.intercept == 0.
    }

    /// Apply the rescale function to a stored value.
    #[inline]
    pub fn apply(&self, value: f64) -> f64 {
        self.slope * value + self.intercept
    }
}

impl Default for RescaleParameters {
    fn default() -> Self {
        RescaleParameters {
            slope: 1.,
            intercept: 0.,
        }
    }
}

/// How stored sample values map to displayed intensity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhotometricInterpretation {
    /// `MONOCHROME1`: minimum sample value is white
    Monochrome1,
    /// `MONOCHROME2`: minimum sample value is black
    Monochrome2,
    /// `RGB`: interleaved red, green, blue samples
    Rgb,
    /// any other value, kept verbatim
    Other(String),
}

impl PhotometricInterpretation {
    /// Interpret the trimmed value of the Photometric Interpretation
    /// attribute.
    pub fn from_attribute(value: &str) -> Self {
        match value.trim_end_matches(|c: char| c.is_whitespace() || c == '\0') {
            "MONOCHROME1" => PhotometricInterpretation::Monochrome1,
            "MONOCHROME2" => PhotometricInterpretation::Monochrome2,
            "RGB" => PhotometricInterpretation::Rgb,
            other => PhotometricInterpretation::Other(other.to_string()),
        }
    }

    /// Whether samples are single-channel grayscale.
    #[inline]
    pub fn is_monochrome(&self) -> bool {
        matches!(
            self,
            PhotometricInterpretation::Monochrome1 | PhotometricInterpretation::Monochrome2
        )
    }

    /// Whether displayed intensity is inverted
    /// relative to the stored sample values (`MONOCHROME1`).
    #[inline]
    pub fn is_inverted(&self) -> bool {
        matches!(self, PhotometricInterpretation::Monochrome1)
    }
}

impl fmt::Display for PhotometricInterpretation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PhotometricInterpretation::Monochrome1 => f.write_str("MONOCHROME1"),
            PhotometricInterpretation::Monochrome2 => f.write_str("MONOCHROME2"),
            PhotometricInterpretation::Rgb => f.write_str("RGB"),
            PhotometricInterpretation::Other(s) => f.write_str(s),
        }
    }
}

/// A shared cooperative cancellation flag.
///
/// Long-running operations (JPEG Lossless decode, series composition)
/// poll the flag at bounded intervals and abort promptly once raised.
/// Cloning the flag shares the underlying state.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    inner: Arc<AtomicBool>,
}

impl CancelFlag {
    /// Create a new flag in the not-cancelled state.
    pub fn new() -> Self {
        CancelFlag::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.inner.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.inner.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_validity() {
        assert!(WindowSettings::new(40., 80.).is_valid());
        assert!(!WindowSettings::new(40., 0.).is_valid());
        assert!(!WindowSettings::new(40., -1.).is_valid());
    }

    #[test]
    fn rescale_identity() {
        assert!(RescaleParameters::default().is_identity());
        assert!(!RescaleParameters::new(1., -1024.).is_identity());
        assert_eq!(RescaleParameters::new(1., -1024.).apply(1024.), 0.);
    }

    #[test]
    fn photometric_parsing() {
        assert_eq!(
            PhotometricInterpretation::from_attribute("MONOCHROME2 "),
            PhotometricInterpretation::Monochrome2
        );
        assert!(PhotometricInterpretation::from_attribute("MONOCHROME1\0").is_inverted());
        assert_eq!(
            PhotometricInterpretation::from_attribute("PALETTE COLOR"),
            PhotometricInterpretation::Other("PALETTE COLOR".to_string())
        );
    }

    #[test]
    fn cancel_flag_shares_state() {
        let flag = CancelFlag::new();
        let clone = flag.clone();
        assert!(!clone.is_cancelled());
        flag.cancel();
        assert!(clone.is_cancelled());
    }
}
