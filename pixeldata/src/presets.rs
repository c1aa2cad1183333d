//! Medical window/level presets and preset matching.

use dcmview_core::WindowSettings;

/// Tolerance for matching stored settings back to a preset.
const MATCH_EPSILON: f64 = 0.5;

/// The closed set of window/level presets.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum MedicalPreset {
    /// Lung parenchyma
    Lung,
    /// Bone detail
    Bone,
    /// Brain tissue
    Brain,
    /// Liver parenchyma
    Liver,
    /// Mediastinal structures
    Mediastinum,
    /// Abdominal soft tissue
    Abdomen,
    /// Spine
    Spine,
    /// Pelvis
    Pelvis,
    /// General soft tissue
    SoftTissue,
    /// Contrast angiography
    Angiography,
    /// Pulmonary embolism protocol
    PulmonaryEmbolism,
    /// Mammography
    Mammography,
    /// PET uptake
    PetScan,
    /// A manually adjusted window
    Custom,
}

impl MedicalPreset {
    /// All presets carrying fixed settings (everything except `Custom`).
    pub const FIXED: [MedicalPreset; 13] = [
        MedicalPreset::Lung,
        MedicalPreset::Bone,
        MedicalPreset::Brain,
        MedicalPreset::Liver,
        MedicalPreset::Mediastinum,
        MedicalPreset::Abdomen,
        MedicalPreset::Spine,
        MedicalPreset::Pelvis,
        MedicalPreset::SoftTissue,
        MedicalPreset::Angiography,
        MedicalPreset::PulmonaryEmbolism,
        MedicalPreset::Mammography,
        MedicalPreset::PetScan,
    ];

    /// The fixed window settings of this preset;
    /// `None` for [`MedicalPreset::Custom`].
    pub fn settings(self) -> Option<WindowSettings> {
        let (center, width) = match self {
            MedicalPreset::Lung => (-600., 1500.),
            MedicalPreset::Bone => (400., 1800.),
            MedicalPreset::Brain => (40., 80.),
            MedicalPreset::Liver => (60., 160.),
            MedicalPreset::Mediastinum => (50., 400.),
            MedicalPreset::Abdomen => (60., 400.),
            MedicalPreset::Spine => (50., 250.),
            MedicalPreset::Pelvis => (50., 400.),
            MedicalPreset::SoftTissue => (50., 350.),
            MedicalPreset::Angiography => (300., 600.),
            MedicalPreset::PulmonaryEmbolism => (100., 700.),
            MedicalPreset::Mammography => (2000., 4000.),
            MedicalPreset::PetScan => (5., 10.),
            MedicalPreset::Custom => return None,
        };
        Some(WindowSettings::new(center, width))
    }
}

/// Find the preset whose stored settings equal the given ones,
/// within half a unit on both center and width.
pub fn preset_for(settings: WindowSettings) -> Option<MedicalPreset> {
    MedicalPreset::FIXED.into_iter().find(|preset| {
        let stored = preset.settings().expect("fixed presets carry settings");
        (stored.center - settings.center).abs() <= MATCH_EPSILON
            && (stored.width - settings.width).abs() <= MATCH_EPSILON
    })
}

/// Suggest presets for a modality code, most relevant first.
///
/// Unknown modalities yield an empty list.
pub fn suggest(modality: &str) -> Vec<MedicalPreset> {
    use MedicalPreset::*;
    match modality.trim() {
        "CT" => vec![
            SoftTissue,
            Lung,
            Bone,
            Brain,
            Liver,
            Mediastinum,
            Abdomen,
            Spine,
            Pelvis,
            Angiography,
            PulmonaryEmbolism,
        ],
        "MR" => vec![Brain, Spine, SoftTissue],
        "CR" | "DX" => vec![Bone, SoftTissue, Lung],
        "MG" => vec![Mammography],
        "PT" => vec![PetScan],
        "US" => vec![SoftTissue],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lung_settings_round_trip() {
        let settings = WindowSettings::new(-600., 1500.);
        assert_eq!(preset_for(settings), Some(MedicalPreset::Lung));
    }

    #[test]
    fn near_match_within_tolerance() {
        assert_eq!(
            preset_for(WindowSettings::new(40.4, 79.6)),
            Some(MedicalPreset::Brain)
        );
        assert_eq!(preset_for(WindowSettings::new(40., 82.)), None);
    }

    #[test]
    fn custom_has_no_settings() {
        assert_eq!(MedicalPreset::Custom.settings(), None);
        for preset in MedicalPreset::FIXED {
            assert!(preset.settings().unwrap().is_valid());
        }
    }

    #[test]
    fn ct_suggestions_lead_with_soft_tissue() {
        let suggestions = suggest("CT");
        assert_eq!(suggestions.first(), Some(&MedicalPreset::SoftTissue));
        assert!(suggestions.contains(&MedicalPreset::Lung));
        assert!(suggest("XX").is_empty());
        assert_eq!(suggest("MG"), vec![MedicalPreset::Mammography]);
    }
}
