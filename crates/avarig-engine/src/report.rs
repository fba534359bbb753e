//! Evaluation reports.
//!
//! Recoverable conditions never fail an evaluation. They are logged and
//! collected here so hosts can surface them.

use serde::{Deserialize, Serialize};

/// Why an evaluation returned without doing anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The shape state is frozen by a batch of edits.
    Frozen,
    /// The evaluator was entered while already running.
    Reentry,
}

/// How the stored bind arrays related to the live mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindStatus {
    /// Stored arrays match the mesh.
    Matched,
    /// Stored arrays were shorter and were padded from the mesh.
    Padded { stored: usize, current: usize },
    /// Stored arrays are longer; the mesh was left untouched.
    Refused { stored: usize, current: usize },
}

/// Reconstruction result of one custom mesh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshReport {
    pub mesh: String,
    pub status: BindStatus,
    /// Corrective passes run.
    pub iterations: usize,
    /// Vertices still out of tolerance after the last pass.
    pub unconverged: usize,
    /// Vertices without a deforming group.
    pub unweighted: usize,
    /// Largest per-axis error after the last pass.
    pub max_error: f64,
    /// Error threshold used by the corrective loop.
    pub threshold: f64,
}

impl MeshReport {
    pub(crate) fn new(mesh: impl Into<String>) -> Self {
        Self {
            mesh: mesh.into(),
            status: BindStatus::Matched,
            iterations: 0,
            unconverged: 0,
            unweighted: 0,
            max_error: 0.0,
            threshold: 0.0,
        }
    }

    /// True when every weighted vertex ended within tolerance.
    pub fn converged(&self) -> bool {
        self.unconverged == 0 && !matches!(self.status, BindStatus::Refused { .. })
    }
}

/// Summary of one evaluation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub armature: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<SkipReason>,
    /// Slider values expanded.
    pub sliders: usize,
    /// Entries in the mesh-morph change list.
    pub mesh_changes: usize,
    /// Entries in the bone change list.
    pub bone_changes: usize,
    /// Bones that received an accumulated delta.
    pub bones_touched: usize,
    /// Edit bones written.
    pub bones_placed: usize,
    /// Shape-key values set.
    pub morphs_set: usize,
    /// Vertical toe movement absorbed by the armature origin.
    pub toe_delta: f64,
    /// Joint offsets stored before evaluating, when edits were pending.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub joints_stored: Option<usize>,
    /// Slider and bone references that could not be resolved.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<String>,
    /// Custom meshes reconstructed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub meshes: Vec<MeshReport>,
}

impl EvaluationReport {
    pub(crate) fn new(armature: impl Into<String>) -> Self {
        Self {
            armature: armature.into(),
            ..Default::default()
        }
    }

    pub(crate) fn skipped(armature: impl Into<String>, reason: SkipReason) -> Self {
        Self {
            skipped: Some(reason),
            ..Self::new(armature)
        }
    }

    /// True when the evaluation ran.
    pub fn ran(&self) -> bool {
        self.skipped.is_none()
    }

    /// Report of one mesh.
    pub fn mesh(&self, name: &str) -> Option<&MeshReport> {
        self.meshes.iter().find(|m| m.mesh == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_serialization_skips_empty() {
        let report = EvaluationReport::skipped("Avatar", SkipReason::Frozen);
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"skipped\":\"frozen\""));
        assert!(!json.contains("meshes"));
        assert!(!report.ran());
    }

    #[test]
    fn test_refused_mesh_is_not_converged() {
        let mut mesh = MeshReport::new("Shirt");
        assert!(mesh.converged());
        mesh.status = BindStatus::Refused { stored: 4, current: 3 };
        assert!(!mesh.converged());
    }
}
