//! Bone accumulation and placement.
//!
//! Every deform, volume, and attachment bone is placed from its parent:
//!
//! ```text
//! head = parent.head + parent.scale * (relhead + offset) + raw_offset
//! tail = head + parent.scale * reltail
//! ```
//!
//! where `parent.scale` is the product of `1 + scale` along the parent
//! chain. Collision volumes scale their rotated tail by their own scale
//! relative to the default. Control bones copy their deform master.

use std::collections::BTreeMap;

use avarig_data::axis::euler_matrix;
use avarig_data::skeleton::{deform_name, ORIGIN_BONE};
use avarig_data::{Bone, BoneKind, DriverGraph, Skeleton};
use glam::{DMat3, DVec3};
use log::warn;

use super::expand::Change;
use crate::joints::JointStore;
use crate::shape::BoneAccum;

/// Sliders whose offsets bypass the parent-scale normalization.
pub const NORMALIZE_EXCEPTIONS: [&str; 2] = ["head_length_773", "face_shear_662"];

/// Evaluated placement of one bone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoneFrame {
    pub head: DVec3,
    pub tail: DVec3,
    /// Effective scale inherited from the parent chain.
    pub parent_scale: DVec3,
    /// Effective scale handed to children.
    pub scale: DVec3,
    /// Scale of a collision volume relative to its default scale.
    pub own: DVec3,
    /// Default rotation of a collision volume.
    pub rot: DMat3,
    pub volume: bool,
}

impl BoneFrame {
    /// Frame of an unscaled bone.
    pub fn at(head: DVec3, tail: DVec3) -> Self {
        Self {
            head,
            tail,
            parent_scale: DVec3::ONE,
            scale: DVec3::ONE,
            own: DVec3::ONE,
            rot: DMat3::IDENTITY,
            volume: false,
        }
    }

    /// Linear part of the bone's deformation of the space it skins.
    pub fn deform_matrix(&self) -> DMat3 {
        if self.volume {
            DMat3::from_diagonal(self.parent_scale)
                * self.rot
                * DMat3::from_diagonal(self.own)
                * self.rot.transpose()
        } else {
            DMat3::from_diagonal(self.scale)
        }
    }

    /// Affine map carrying points skinned to this bone from `self` to `to`.
    pub fn transfer_to(&self, to: &BoneFrame) -> (DMat3, DVec3) {
        let linear = to.deform_matrix() * self.deform_matrix().inverse();
        (linear, to.head - linear * self.head)
    }
}

/// Frames keyed by bone name.
pub type Frames = BTreeMap<String, BoneFrame>;

/// Sums the bone deltas of every change. Deltas naming bones absent from
/// the skeleton are reported in `missing`.
pub fn accumulate(
    graph: &DriverGraph,
    skeleton: &Skeleton,
    changes: &[Change],
    missing: &mut Vec<String>,
) -> BTreeMap<String, BoneAccum> {
    let mut acc: BTreeMap<String, BoneAccum> = BTreeMap::new();
    for change in changes {
        let Some(driver) = graph.get(&change.driver) else {
            continue;
        };
        let raw = NORMALIZE_EXCEPTIONS.contains(&driver.id.as_str());
        for delta in &driver.bones {
            if !skeleton.contains(&delta.bone) {
                warn!("Driver '{}' references unknown bone '{}'", driver.id, delta.bone);
                missing.push(format!("{}:{}", driver.id, delta.bone));
                continue;
            }
            let entry = acc.entry(delta.bone.clone()).or_default();
            entry.scale += delta.scale * change.value;
            if raw {
                entry.raw_offset += delta.offset * change.value;
            } else {
                entry.offset += delta.offset * change.value;
            }
        }
    }
    acc
}

/// Own scale of a collision volume against its default scale.
fn volume_ratio(bone: &Bone, acc: &BoneAccum) -> DVec3 {
    let ratio = |base: f64, delta: f64| {
        if base.abs() < 1e-9 {
            1.0 + delta
        } else {
            (base + delta) / base
        }
    };
    DVec3::new(
        ratio(bone.scale0.x, acc.scale.x),
        ratio(bone.scale0.y, acc.scale.y),
        ratio(bone.scale0.z, acc.scale.z),
    )
}

/// Places every deform, volume, and attachment bone, then fixes connected
/// tails and snaps control bones onto their masters. Structural and IK bones
/// are left to the placement rules.
pub fn place(
    skeleton: &Skeleton,
    accumulators: &BTreeMap<String, BoneAccum>,
    joints: Option<&JointStore>,
) -> Frames {
    let mut frames: Frames = BTreeMap::new();
    let rest = skeleton.rest_positions();

    for bone in skeleton.bones() {
        if bone.name == ORIGIN_BONE {
            let (head, tail) = rest.get(&bone.name).copied().unwrap_or((DVec3::ZERO, bone.reltail));
            frames.insert(bone.name.clone(), BoneFrame::at(head, tail));
            continue;
        }
        if !matches!(bone.kind, BoneKind::Deform | BoneKind::Volume | BoneKind::Attachment) {
            continue;
        }
        let (parent_head, parent_scale) = bone
            .parent
            .as_ref()
            .and_then(|p| frames.get(p))
            .map(|f| (f.head, f.scale))
            .unwrap_or((DVec3::ZERO, DVec3::ONE));
        let acc = accumulators.get(&bone.name).copied().unwrap_or_default();
        let joint = joints.and_then(|j| j.get(&bone.name));
        let joint_head = joint.filter(|j| j.has_head).map_or(DVec3::ZERO, |j| j.head);
        let joint_tail = joint.filter(|j| j.has_tail).map_or(DVec3::ZERO, |j| j.tail);

        let head = parent_head + parent_scale * (bone.relhead + acc.offset) + acc.raw_offset + joint_head;
        let frame = match bone.kind {
            BoneKind::Volume => {
                let own = volume_ratio(bone, &acc);
                let rot = euler_matrix(bone.rot0);
                BoneFrame {
                    head,
                    tail: head + parent_scale * (rot * (bone.reltail * own)) + joint_tail,
                    parent_scale,
                    scale: parent_scale,
                    own,
                    rot,
                    volume: true,
                }
            }
            _ => BoneFrame {
                head,
                tail: head + parent_scale * bone.reltail + joint_tail,
                parent_scale,
                scale: parent_scale * (DVec3::ONE + acc.scale),
                own: DVec3::ONE,
                rot: DMat3::IDENTITY,
                volume: false,
            },
        };
        frames.insert(bone.name.clone(), frame);
    }

    fix_connected(skeleton, &mut frames);
    snap_controls(skeleton, &mut frames);
    frames
}

/// Moves each parent tail onto the head of its connected child.
fn fix_connected(skeleton: &Skeleton, frames: &mut Frames) {
    for bone in skeleton.bones().filter(|b| b.connected) {
        let Some(parent) = bone.parent.as_ref() else {
            continue;
        };
        let Some(head) = frames.get(&bone.name).map(|f| f.head) else {
            continue;
        };
        if let Some(p) = frames.get_mut(parent) {
            if p.tail != head {
                p.tail = head;
            }
        }
    }
}

fn snap_controls(skeleton: &Skeleton, frames: &mut Frames) {
    for control in skeleton.bones_of_kind(BoneKind::Control) {
        if let Some(master) = frames.get(&deform_name(&control.name)).copied() {
            frames.insert(control.name.clone(), master);
        }
    }
}

/// Head and tail lookup over frames.
pub fn lookup(frames: &Frames) -> impl Fn(&str) -> Option<(DVec3, DVec3)> + '_ {
    move |name| frames.get(name).map(|f| (f.head, f.tail))
}

#[cfg(test)]
mod tests {
    use super::*;
    use avarig_data::{DataSource, JointType, RigType};

    fn setup() -> (Skeleton, DriverGraph) {
        let source = DataSource::Bundled;
        (
            source.load_skeleton(RigType::Basic, JointType::Pivot).unwrap(),
            source.load_appearance().unwrap(),
        )
    }

    fn change(id: &str, value: f64) -> Change {
        Change {
            driver: id.to_string(),
            value,
            normalized: 0.0,
        }
    }

    #[test]
    fn test_zero_accumulators_reproduce_rest() {
        let (skeleton, _) = setup();
        let frames = place(&skeleton, &BTreeMap::new(), None);
        let rest = skeleton.rest_positions();
        for name in ["mPelvis", "mChest", "mHead", "mToeLeft", "CHEST"] {
            let (head, _) = rest[name];
            assert!((frames[name].head - head).length() < 1e-12, "{}", name);
        }
        assert_eq!(frames["Chest"].head, frames["mChest"].head);
    }

    #[test]
    fn test_accumulate_scales_by_value() {
        let (skeleton, graph) = setup();
        let mut missing = Vec::new();
        let acc = accumulate(&graph, &skeleton, &[change("torso_muscles_678", 1.5)], &mut missing);
        let chest = acc["mChest"];
        assert!((chest.scale - DVec3::new(0.12, 0.09, 0.03)).length() < 1e-12);
        assert!(missing.is_empty());
    }

    #[test]
    fn test_normalize_exceptions_are_raw() {
        let (skeleton, graph) = setup();
        let mut missing = Vec::new();
        let acc = accumulate(&graph, &skeleton, &[change("head_length_773", 0.5)], &mut missing);
        assert_eq!(acc["mSkull"].offset, DVec3::ZERO);
        assert!(acc["mSkull"].raw_offset.length() > 0.0);
    }

    #[test]
    fn test_child_inherits_parent_scale() {
        let (skeleton, graph) = setup();
        let mut missing = Vec::new();
        let acc = accumulate(&graph, &skeleton, &[change("torso_muscles_678", 1.5)], &mut missing);
        let frames = place(&skeleton, &acc, None);
        let neck = skeleton.get("mNeck").unwrap();
        let expected = frames["mChest"].head + frames["mChest"].scale * neck.relhead;
        assert!((frames["mNeck"].head - expected).length() < 1e-12);
    }

    #[test]
    fn test_connected_parent_tail_follows_child() {
        let (skeleton, graph) = setup();
        let mut missing = Vec::new();
        let acc = accumulate(&graph, &skeleton, &[change("shoulders_36", 1.4)], &mut missing);
        let frames = place(&skeleton, &acc, None);
        let rest = skeleton.rest_positions();
        assert_eq!(frames["mCollarLeft"].tail, frames["mShoulderLeft"].head);
        assert!((frames["mShoulderLeft"].head - rest["mShoulderLeft"].0).length() > 1e-4);
    }

    #[test]
    fn test_transfer_is_exact_for_single_bone() {
        let from = BoneFrame::at(DVec3::new(0.0, 0.0, 1.0), DVec3::new(0.0, 0.0, 1.2));
        let mut to = from;
        to.head = DVec3::new(0.0, 0.0, 1.1);
        to.scale = DVec3::new(1.1, 1.0, 1.0);
        let (linear, offset) = from.transfer_to(&to);
        let p = DVec3::new(0.5, 0.0, 1.0);
        let q = linear * p + offset;
        assert!((q - DVec3::new(0.55, 0.0, 1.1)).length() < 1e-12);
    }
}
