//! Per-armature slider state.
//!
//! Slider values are stored as UI positions in `[0, 100]`; the driver maps
//! them into its declared range at evaluation time. The state also carries
//! the gender flag, the freeze count that batches edits, the joint-edit
//! dirty flag, and the per-bone accumulators of the last evaluation.

pub mod io;

use std::collections::BTreeMap;

use avarig_data::{DriverGraph, Gender, RestPosePreset};
use glam::DVec3;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Accumulated slider deltas of one bone.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoneAccum {
    /// Relative scale delta (`0` means unscaled).
    pub scale: DVec3,
    /// Head offset, scaled by the parent chain.
    pub offset: DVec3,
    /// Head offset applied after parent scaling.
    pub raw_offset: DVec3,
}

impl BoneAccum {
    /// True when the bone receives no delta.
    pub fn is_zero(&self) -> bool {
        self.scale == DVec3::ZERO && self.offset == DVec3::ZERO && self.raw_offset == DVec3::ZERO
    }
}

/// Serializable snapshot of the slider values.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ShapeDictionary {
    /// UI positions keyed by slider id.
    pub values: BTreeMap<String, f64>,
    pub gender: Gender,
}

/// Slider values and evaluation flags of one armature.
#[derive(Debug, Clone, Default)]
pub struct ShapeState {
    values: BTreeMap<String, f64>,
    gender: Gender,
    freeze: u32,
    dirty: bool,
    accumulators: BTreeMap<String, BoneAccum>,
}

impl ShapeState {
    /// Creates a state with every root slider at its declared default.
    pub fn from_graph(graph: &DriverGraph) -> Self {
        let mut state = Self::default();
        state.reset_to_default(graph, false);
        state
    }

    /// UI position of a slider.
    pub fn value(&self, id: &str) -> Option<f64> {
        self.values.get(id).copied()
    }

    /// Integer UI position of a slider.
    pub fn ui_value(&self, id: &str) -> Option<i32> {
        self.value(id).map(|v| v.round() as i32)
    }

    /// All slider positions in id order.
    pub fn values(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Sets a root slider, clamping into `[0, 100]`. Returns the stored value.
    pub fn set(&mut self, graph: &DriverGraph, id: &str, ui: f64) -> EngineResult<f64> {
        let driver = graph
            .get(id)
            .filter(|d| d.is_root())
            .ok_or_else(|| EngineError::unknown_slider(id))?;
        let ui = if ui.is_finite() { ui.clamp(0.0, 100.0) } else { driver.default_ui() };
        self.values.insert(driver.id.clone(), ui);
        Ok(ui)
    }

    pub fn gender(&self) -> Gender {
        self.gender
    }

    pub fn set_gender(&mut self, gender: Gender) {
        self.gender = gender;
    }

    /// True while a batch of edits is in progress.
    pub fn is_frozen(&self) -> bool {
        self.freeze > 0
    }

    /// Current freeze count.
    pub fn freeze_count(&self) -> u32 {
        self.freeze
    }

    /// Enters a batch of edits.
    pub fn freeze(&mut self) {
        self.freeze += 1;
    }

    /// Leaves a batch of edits. Returns true when the last batch closed.
    pub fn thaw(&mut self) -> bool {
        self.freeze = self.freeze.saturating_sub(1);
        self.freeze == 0
    }

    /// Records that edit bones were moved by hand.
    pub fn mark_joints_dirty(&mut self) {
        self.dirty = true;
    }

    /// True when hand edits have not been stored as joint offsets yet.
    pub fn joints_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn clear_joints_dirty(&mut self) {
        self.dirty = false;
    }

    /// Accumulated deltas of the last evaluation.
    pub fn accumulators(&self) -> &BTreeMap<String, BoneAccum> {
        &self.accumulators
    }

    /// Accumulated delta of one bone; zero when the bone was not touched.
    pub fn accumulator(&self, bone: &str) -> BoneAccum {
        self.accumulators.get(bone).copied().unwrap_or_default()
    }

    pub(crate) fn set_accumulators(&mut self, accumulators: BTreeMap<String, BoneAccum>) {
        self.accumulators = accumulators;
    }

    /// Restores every root slider to its declared default.
    pub fn reset_to_default(&mut self, graph: &DriverGraph, keep_gender: bool) {
        self.values = graph
            .root_drivers()
            .map(|d| (d.id.clone(), d.default_ui()))
            .collect();
        if !keep_gender {
            self.gender = Gender::default();
        }
    }

    /// Pins every root slider to a rest-pose preset.
    pub fn reset_to_rest_pose(&mut self, graph: &DriverGraph, preset: RestPosePreset, keep_gender: bool) {
        self.values = graph
            .root_drivers()
            .map(|d| (d.id.clone(), preset.pinned_ui(d)))
            .collect();
        if !keep_gender {
            self.gender = Gender::default();
        }
    }

    /// Snapshot of the slider values and gender.
    pub fn as_dictionary(&self) -> ShapeDictionary {
        ShapeDictionary {
            values: self.values.clone(),
            gender: self.gender,
        }
    }

    /// Builds a state from a snapshot. Unknown ids are dropped; sliders
    /// missing from the snapshot keep their default.
    pub fn from_dictionary(graph: &DriverGraph, dict: &ShapeDictionary) -> Self {
        let mut state = Self::from_graph(graph);
        state.gender = dict.gender;
        for (id, ui) in &dict.values {
            if state.set(graph, id, *ui).is_err() {
                warn!("Ignoring unknown slider '{}' in shape dictionary", id);
            }
        }
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use avarig_data::bundled::APPEARANCE_XML;
    use avarig_data::appearance::loader::load_appearance_str;

    fn graph() -> DriverGraph {
        load_appearance_str(APPEARANCE_XML).unwrap()
    }

    #[test]
    fn test_defaults_and_clamp() {
        let graph = graph();
        let mut shape = ShapeState::from_graph(&graph);
        let height = graph.get("height_33").unwrap();
        assert_eq!(shape.value("height_33"), Some(height.default_ui()));

        assert_eq!(shape.set(&graph, "height_33", 140.0).unwrap(), 100.0);
        assert_eq!(shape.ui_value("height_33"), Some(100));
        assert_eq!(shape.set(&graph, "height_33", -3.0).unwrap(), 0.0);
    }

    #[test]
    fn test_driven_sliders_are_not_editable() {
        let graph = graph();
        let mut shape = ShapeState::from_graph(&graph);
        assert!(matches!(
            shape.set(&graph, "butt_size_795", 50.0),
            Err(EngineError::UnknownSlider { .. })
        ));
        assert!(shape.set(&graph, "nope_1", 50.0).is_err());
        assert_eq!(shape.value("butt_size_795"), None);
    }

    #[test]
    fn test_freeze_counts() {
        let mut shape = ShapeState::default();
        shape.freeze();
        shape.freeze();
        assert!(!shape.thaw());
        assert!(shape.is_frozen());
        assert!(shape.thaw());
        assert!(!shape.is_frozen());
        assert!(shape.thaw());
    }

    #[test]
    fn test_reset_keeps_gender_on_request() {
        let graph = graph();
        let mut shape = ShapeState::from_graph(&graph);
        shape.set_gender(Gender::Male);
        shape.set(&graph, "height_33", 90.0).unwrap();
        shape.reset_to_default(&graph, true);
        assert_eq!(shape.gender(), Gender::Male);
        assert_eq!(shape.value("height_33"), Some(graph.get("height_33").unwrap().default_ui()));
        shape.reset_to_default(&graph, false);
        assert_eq!(shape.gender(), Gender::Female);
    }

    #[test]
    fn test_rest_pose_presets() {
        let graph = graph();
        let mut shape = ShapeState::from_graph(&graph);
        shape.reset_to_rest_pose(&graph, RestPosePreset::Legacy, false);
        assert_eq!(shape.value("shoulders_36"), Some(56.0));
        shape.reset_to_rest_pose(&graph, RestPosePreset::Neutral, false);
        let shoulders = graph.get("shoulders_36").unwrap();
        assert!((shoulders.value_at(shape.value("shoulders_36").unwrap())).abs() < 1e-9);
    }

    #[test]
    fn test_dictionary_round_trip() {
        let graph = graph();
        let mut shape = ShapeState::from_graph(&graph);
        shape.set(&graph, "height_33", 75.0).unwrap();
        shape.set_gender(Gender::Male);
        let dict = shape.as_dictionary();
        let json = serde_json::to_string(&dict).unwrap();
        let back: ShapeDictionary = serde_json::from_str(&json).unwrap();
        let restored = ShapeState::from_dictionary(&graph, &back);
        assert_eq!(restored.as_dictionary(), dict);
    }
}
