//! Slider evaluator.
//!
//! One evaluation runs these phases in order:
//!
//! 1. expand slider values through driven chains into change lists
//! 2. set shape keys on system and custom meshes
//! 3. accumulate bone deltas and place the bones hierarchically
//! 4. keep the toes on the ground and re-align structural and IK bones
//! 5. reconstruct bound custom meshes
//!
//! Evaluation is skipped while the shape state is frozen and when the
//! evaluator is entered from one of its own progress callbacks.

pub mod bones;
pub mod expand;
pub mod hover;
pub mod ik;
pub mod morph;

use std::cell::Cell;
use std::collections::BTreeMap;

use avarig_data::{DriverGraph, Skeleton};
use log::{debug, warn};

use self::bones::Frames;
use crate::bind;
use crate::config::EngineConfig;
use crate::joints::{store_joints, JointStore};
use crate::progress::{Phase, ProgressHook};
use crate::report::{EvaluationReport, SkipReason};
use crate::scene::{Armature, MeshObject, SliderSelector};
use crate::shape::BoneAccum;

thread_local! {
    static RECURSE_CALL: Cell<bool> = const { Cell::new(false) };
}

/// Holds the re-entry flag for the lifetime of one evaluation.
struct ReentryGuard;

impl ReentryGuard {
    fn acquire() -> Option<Self> {
        RECURSE_CALL.with(|flag| {
            if flag.get() {
                None
            } else {
                flag.set(true);
                Some(ReentryGuard)
            }
        })
    }
}

impl Drop for ReentryGuard {
    fn drop(&mut self) {
        RECURSE_CALL.with(|flag| flag.set(false));
    }
}

/// True while an evaluation runs on this thread.
pub fn is_evaluating() -> bool {
    RECURSE_CALL.with(|flag| flag.get())
}

/// Evaluates armatures against one reference skeleton and driver graph.
pub struct Evaluator<'a> {
    skeleton: &'a Skeleton,
    graph: &'a DriverGraph,
    config: &'a EngineConfig,
}

impl<'a> Evaluator<'a> {
    pub fn new(skeleton: &'a Skeleton, graph: &'a DriverGraph, config: &'a EngineConfig) -> Self {
        Self {
            skeleton,
            graph,
            config,
        }
    }

    /// Evaluates the armature's shape state and updates its bones and the
    /// given child meshes.
    pub fn evaluate(
        &self,
        armature: &mut Armature,
        meshes: &mut [&mut MeshObject],
        progress: &mut dyn ProgressHook,
    ) -> EvaluationReport {
        if armature.shape.is_frozen() {
            debug!("Armature '{}' is frozen, evaluation skipped", armature.name);
            return EvaluationReport::skipped(armature.name.clone(), SkipReason::Frozen);
        }
        let Some(_guard) = ReentryGuard::acquire() else {
            debug!("Evaluator re-entered for '{}', skipped", armature.name);
            return EvaluationReport::skipped(armature.name.clone(), SkipReason::Reentry);
        };

        armature.shape.freeze();
        let report = self.run(armature, meshes, progress);
        armature.shape.thaw();
        report
    }

    /// Frames the armature would have under `accumulators`, including rule
    /// bones, without modifying it.
    pub fn frames_for(&self, armature: &Armature, accumulators: &BTreeMap<String, BoneAccum>) -> Frames {
        let joints = armature.rig.apply_joint_offsets.then_some(&armature.joints);
        let mut frames = bones::place(self.skeleton, accumulators, joints);
        ik::place_rule_bones(self.skeleton, &mut frames, joints);
        frames
    }

    fn run(
        &self,
        armature: &mut Armature,
        meshes: &mut [&mut MeshObject],
        progress: &mut dyn ProgressHook,
    ) -> EvaluationReport {
        let name = armature.name.clone();
        let mut report = EvaluationReport::new(name.clone());

        if armature.shape.joints_dirty() {
            report.joints_stored = Some(store_joints(
                armature,
                self.skeleton,
                self.config.joint_store,
                self.config.min_joint_offset,
            ));
        }

        progress.on_phase(&name, Phase::Expand);
        let expansion = expand::expand(self.graph, &armature.shape);
        report.sliders = expansion.sliders;
        report.mesh_changes = expansion.mesh_changes.len();
        report.bone_changes = expansion.bone_changes.len();
        report.missing = expansion.missing.clone();

        progress.on_phase(&name, Phase::Morph);
        report.morphs_set = morph::dispatch(self.graph, &expansion.mesh_changes, meshes);

        progress.on_phase(&name, Phase::Bones);
        let accumulators = bones::accumulate(self.graph, self.skeleton, &expansion.bone_changes, &mut report.missing);
        report.bones_touched = accumulators.values().filter(|a| !a.is_zero()).count();
        let joints: Option<JointStore> = armature.rig.apply_joint_offsets.then(|| armature.joints.clone());
        let mut frames = bones::place(self.skeleton, &accumulators, joints.as_ref());

        progress.on_phase(&name, Phase::Hover);
        let rest_toe_z = hover::toe_location(|n| Some((self.skeleton.rest_head(n)?, self.skeleton.rest_tail(n)?)))
            .map_or(0.0, |t| t.z);
        report.toe_delta = hover::correct(armature, meshes, &mut frames, rest_toe_z);
        ik::place_rule_bones(self.skeleton, &mut frames, joints.as_ref());

        for (bone, frame) in &frames {
            if let Some(edit) = armature.bone_mut(bone) {
                edit.head = frame.head;
                edit.tail = frame.tail;
                report.bones_placed += 1;
            }
        }
        armature.shape.set_accumulators(accumulators);

        progress.on_phase(&name, Phase::Reconstruct);
        for mesh in meshes.iter_mut() {
            if mesh.selector != SliderSelector::Sl || mesh.bind.is_none() {
                continue;
            }
            match bind::reconstruct(mesh, &frames, &self.config.correction, progress) {
                Ok(mesh_report) => report.meshes.push(mesh_report),
                Err(e) => warn!("Reconstruction of '{}' failed: {}", mesh.name, e),
            }
        }

        debug!(
            "Evaluated '{}': {} sliders, {} bone changes, {} bones placed, toe delta {:.6}",
            name, report.sliders, report.bone_changes, report.bones_placed, report.toe_delta
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_is_exclusive() {
        assert!(!is_evaluating());
        let guard = ReentryGuard::acquire();
        assert!(guard.is_some());
        assert!(is_evaluating());
        assert!(ReentryGuard::acquire().is_none());
        drop(guard);
        assert!(!is_evaluating());
    }
}
