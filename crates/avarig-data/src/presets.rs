//! Static presets: pinned slider tables for "reset to rest pose" and the
//! hand postures understood by the viewer.

use serde::{Deserialize, Serialize};

use crate::appearance::Driver;

/// Rest-pose slider presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RestPosePreset {
    /// Every slider at the position whose internal value is zero, so no
    /// bone receives a scale or offset delta.
    #[default]
    Neutral,
    /// The classic viewer rest shape.
    Legacy,
}

/// UI positions of the classic rest shape; unlisted sliders use the neutral
/// position.
const LEGACY: &[(&str, f64)] = &[
    ("height_33", 50.0),
    ("thickness_34", 45.0),
    ("shoulders_36", 56.0),
    ("torso_muscles_678", 50.0),
    ("leg_length_692", 50.0),
    ("arm_length_693", 50.0),
    ("head_size_682", 43.0),
    ("head_length_773", 50.0),
    ("face_shear_662", 50.0),
    ("big_brow_1", 13.0),
    ("nose_big_out_2", 24.0),
    ("body_fat_649", 0.0),
    ("breast_size_105", 0.0),
    ("leg_muscles_652", 50.0),
];

impl RestPosePreset {
    /// Returns the string identifier for this preset.
    pub fn as_str(&self) -> &'static str {
        match self {
            RestPosePreset::Neutral => "neutral",
            RestPosePreset::Legacy => "legacy",
        }
    }

    /// Pinned UI position for a slider.
    pub fn pinned_ui(&self, driver: &Driver) -> f64 {
        let pinned = match self {
            RestPosePreset::Neutral => None,
            RestPosePreset::Legacy => LEGACY
                .iter()
                .find(|(id, _)| *id == driver.id)
                .map(|(_, ui)| *ui),
        };
        pinned.unwrap_or_else(|| neutral_ui(driver))
    }
}

/// Hand posture carried by animation clips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HandPosture {
    Spread,
    #[default]
    Relaxed,
    Point,
    Fist,
    RelaxedLeft,
    PointLeft,
    FistLeft,
    RelaxedRight,
    PointRight,
    FistRight,
    SaluteRight,
    Typing,
    PeaceRight,
    PalmRight,
}

impl HandPosture {
    const ALL: [HandPosture; 14] = [
        HandPosture::Spread,
        HandPosture::Relaxed,
        HandPosture::Point,
        HandPosture::Fist,
        HandPosture::RelaxedLeft,
        HandPosture::PointLeft,
        HandPosture::FistLeft,
        HandPosture::RelaxedRight,
        HandPosture::PointRight,
        HandPosture::FistRight,
        HandPosture::SaluteRight,
        HandPosture::Typing,
        HandPosture::PeaceRight,
        HandPosture::PalmRight,
    ];

    /// Integer code written into animation clips.
    pub fn code(&self) -> i32 {
        Self::ALL.iter().position(|p| p == self).unwrap_or(1) as i32
    }

    /// Posture for an integer code.
    pub fn from_code(code: i32) -> Option<Self> {
        usize::try_from(code).ok().and_then(|i| Self::ALL.get(i)).copied()
    }
}

/// UI position whose internal value is zero, clamped into the slider range.
pub fn neutral_ui(driver: &Driver) -> f64 {
    driver.ui_for(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appearance::load_appearance_str;
    use crate::bundled::APPEARANCE_XML;

    #[test]
    fn test_neutral_maps_to_zero_value() {
        let graph = load_appearance_str(APPEARANCE_XML).unwrap();
        for driver in graph.root_drivers() {
            let ui = RestPosePreset::Neutral.pinned_ui(driver);
            let value = driver.value_at(ui);
            if driver.min <= 0.0 && driver.max >= 0.0 {
                assert!(value.abs() < 1e-9, "{} -> {}", driver.id, value);
            }
        }
    }

    #[test]
    fn test_legacy_uses_table() {
        let graph = load_appearance_str(APPEARANCE_XML).unwrap();
        let brow = graph.get("big_brow_1").unwrap();
        assert_eq!(RestPosePreset::Legacy.pinned_ui(brow), 13.0);
        assert_eq!(RestPosePreset::Neutral.as_str(), "neutral");
    }

    #[test]
    fn test_hand_posture_codes() {
        assert_eq!(HandPosture::Spread.code(), 0);
        assert_eq!(HandPosture::Relaxed.code(), 1);
        assert_eq!(HandPosture::PalmRight.code(), 13);
        assert_eq!(HandPosture::from_code(3), Some(HandPosture::Fist));
        assert_eq!(HandPosture::from_code(14), None);
        assert_eq!(HandPosture::from_code(-1), None);
    }
}
