//! Reference skeleton model.
//!
//! A [`Skeleton`] is an ordered bone table in which every parent precedes
//! its children. It is built once per ([`RigType`], [`JointType`]) by the
//! [`loader`] and never mutated afterwards; the engine reads it through the
//! process-wide [`cache`](crate::cache).

pub mod limits;
pub mod loader;
pub mod rules;
mod synth;

use std::collections::HashMap;

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::axis::euler_matrix;

pub use loader::{load_skeleton, load_skeleton_file, load_skeleton_str};
pub use synth::connected_mismatches;
pub use rules::{Anchor, PlacementRule};

/// Name of the armature root bone.
pub const ORIGIN_BONE: &str = "Origin";

/// Name of the mandatory root deform bone.
pub const ROOT_DEFORM_BONE: &str = "mPelvis";

/// Toe bones whose heads define the ground contact.
pub const TOE_BONES: [&str; 2] = ["mToeLeft", "mToeRight"];

/// Which bone families a skeleton contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RigType {
    /// The 26-bone legacy skeleton plus volumes and attachments.
    #[default]
    Basic,
    /// Basic plus face, hand, wing, tail, hind limb, and spine bones.
    Extended,
}

impl RigType {
    /// Returns the string identifier for this rig type.
    pub fn as_str(&self) -> &'static str {
        match self {
            RigType::Basic => "basic",
            RigType::Extended => "extended",
        }
    }
}

/// Which joint locations populate `relhead`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JointType {
    /// `pos` attributes, matching system-avatar skinning.
    Pos,
    /// `pivot` attributes, matching mesh-character skinning.
    #[default]
    Pivot,
}

impl JointType {
    /// Returns the string identifier for this joint type.
    pub fn as_str(&self) -> &'static str {
        match self {
            JointType::Pos => "pos",
            JointType::Pivot => "pivot",
        }
    }
}

/// Skeleton generation a bone belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Support {
    #[default]
    Basic,
    Extended,
}

/// IK bone families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IkFamily {
    Arms,
    Legs,
    Hind,
    Fingers,
    Face,
}

/// Group tag used for layer assignment and user-facing grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoneGroup {
    Arms,
    Legs,
    Torso,
    Collision,
    Attachment,
    Ik(IkFamily),
    Structure,
    Extra,
    Custom,
}

/// What role a bone plays in the rig.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoneKind {
    /// `mX` skinning bone from the skeleton definition.
    Deform,
    /// User-facing `X` mirror of a deform bone.
    Control,
    /// Collision volume used for fitted mesh.
    Volume,
    /// Attachment point.
    Attachment,
    /// IK solver or target bone.
    Ik,
    /// Synthetic helper (`Origin`, `COG`, `PelvisInv`, links).
    Structure,
}

/// Layer bits. A bone can sit on several layers.
pub mod layer {
    pub const DEFORM: u32 = 1 << 0;
    pub const CONTROL: u32 = 1 << 1;
    pub const VOLUME: u32 = 1 << 2;
    pub const ATTACHMENT: u32 = 1 << 3;
    pub const IK: u32 = 1 << 4;
    pub const STRUCTURE: u32 = 1 << 5;
    pub const TORSO: u32 = 1 << 8;
    pub const ARMS: u32 = 1 << 9;
    pub const LEGS: u32 = 1 << 10;
    pub const EYES: u32 = 1 << 11;
    pub const SPINE: u32 = 1 << 12;
    pub const FACE: u32 = 1 << 13;
    pub const HAND: u32 = 1 << 14;
    pub const WING: u32 = 1 << 15;
    pub const TAIL: u32 = 1 << 16;
    pub const HIND: u32 = 1 << 17;
}

/// Per-axis rotation limits in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RotationLimits {
    pub x: Option<[f64; 2]>,
    pub y: Option<[f64; 2]>,
    pub z: Option<[f64; 2]>,
}

/// A reference bone.
#[derive(Debug, Clone, PartialEq)]
pub struct Bone {
    pub name: String,
    pub parent: Option<String>,
    /// Head offset from the parent head, rig frame.
    pub relhead: DVec3,
    /// Tail offset from the head, rig frame.
    pub reltail: DVec3,
    pub roll: f64,
    /// Default rotation (XYZ Euler, radians, rig frame).
    pub rot0: DVec3,
    /// Default local scale.
    pub scale0: DVec3,
    pub layers: u32,
    pub group: BoneGroup,
    pub kind: BoneKind,
    pub support: Support,
    pub deform: bool,
    pub connected: bool,
    /// `connected` as declared in the source file. Only compared against the
    /// derived flag, never applied.
    pub connected_hint: Option<bool>,
    pub is_structure: bool,
    pub is_ik_root: bool,
    pub leaf: bool,
    pub mandatory: bool,
    pub stiffness: DVec3,
    pub limits: Option<RotationLimits>,
    pub custom_shape: Option<String>,
    pub bvh_name: Option<String>,
    /// Child bone names in insertion order.
    pub children: Vec<String>,
}

impl Bone {
    /// Creates a bone with neutral defaults.
    pub fn new(name: impl Into<String>, kind: BoneKind, group: BoneGroup) -> Self {
        let deform = matches!(kind, BoneKind::Deform | BoneKind::Volume);
        Self {
            name: name.into(),
            parent: None,
            relhead: DVec3::ZERO,
            reltail: DVec3::new(0.0, 0.0, 0.1),
            roll: 0.0,
            rot0: DVec3::ZERO,
            scale0: DVec3::ONE,
            layers: kind_layer(kind),
            group,
            kind,
            support: Support::Basic,
            deform,
            connected: false,
            connected_hint: None,
            is_structure: kind == BoneKind::Structure,
            is_ik_root: false,
            leaf: true,
            mandatory: false,
            stiffness: DVec3::ZERO,
            limits: None,
            custom_shape: None,
            bvh_name: None,
            children: Vec::new(),
        }
    }

    /// Sets the parent bone name.
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Sets the head and tail offsets.
    pub fn with_offsets(mut self, relhead: DVec3, reltail: DVec3) -> Self {
        self.relhead = relhead;
        self.reltail = reltail;
        self
    }

    /// Tail offset with the default rotation applied (collision volumes only).
    pub fn rotated_reltail(&self) -> DVec3 {
        if self.kind == BoneKind::Volume {
            euler_matrix(self.rot0) * self.reltail
        } else {
            self.reltail
        }
    }

    /// True for `mX` skinning bones.
    pub fn is_deform_master(&self) -> bool {
        self.kind == BoneKind::Deform
    }
}

pub(crate) fn kind_layer(kind: BoneKind) -> u32 {
    match kind {
        BoneKind::Deform => layer::DEFORM,
        BoneKind::Control => layer::CONTROL,
        BoneKind::Volume => layer::VOLUME,
        BoneKind::Attachment => layer::ATTACHMENT,
        BoneKind::Ik => layer::IK,
        BoneKind::Structure => layer::STRUCTURE,
    }
}

/// Name of the control bone mirroring a deform bone (`mChest` -> `Chest`).
pub fn control_name(deform: &str) -> Option<&str> {
    deform
        .strip_prefix('m')
        .filter(|rest| rest.starts_with(|c: char| c.is_ascii_uppercase()))
}

/// Name of the deform bone mirrored by a control bone (`Chest` -> `mChest`).
pub fn deform_name(control: &str) -> String {
    format!("m{}", control)
}

/// Bone counts per role, for reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkeletonSummary {
    pub rig_type: String,
    pub joint_type: String,
    pub total: usize,
    pub deform: usize,
    pub basic_deform: usize,
    pub extended_deform: usize,
    pub volumes: usize,
    pub attachments: usize,
    pub controls: usize,
    pub ik: usize,
    pub structure: usize,
}

/// An immutable reference skeleton.
#[derive(Debug, Clone)]
pub struct Skeleton {
    pub rig_type: RigType,
    pub joint_type: JointType,
    bones: Vec<Bone>,
    index: HashMap<String, usize>,
    rules: Vec<PlacementRule>,
}

impl Skeleton {
    pub(crate) fn new(rig_type: RigType, joint_type: JointType) -> Self {
        Self {
            rig_type,
            joint_type,
            bones: Vec::new(),
            index: HashMap::new(),
            rules: Vec::new(),
        }
    }

    /// Appends a bone and links it into its parent's child list.
    pub(crate) fn insert(&mut self, bone: Bone) {
        if let Some(parent) = bone.parent.as_ref().and_then(|p| self.index.get(p)).copied() {
            self.bones[parent].children.push(bone.name.clone());
            self.bones[parent].leaf = false;
        }
        self.index.insert(bone.name.clone(), self.bones.len());
        self.bones.push(bone);
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut Bone> {
        let idx = *self.index.get(name)?;
        Some(&mut self.bones[idx])
    }

    pub(crate) fn set_rules(&mut self, rules: Vec<PlacementRule>) {
        self.rules = rules;
    }

    /// Re-sorts the table into depth-first order from the roots, keeping
    /// sibling insertion order.
    pub(crate) fn reorder_hierarchically(&mut self) {
        self.relink();
        let mut order = Vec::with_capacity(self.bones.len());
        let mut stack: Vec<usize> = self
            .bones
            .iter()
            .enumerate()
            .filter(|(_, b)| b.parent.as_ref().map_or(true, |p| !self.index.contains_key(p)))
            .map(|(i, _)| i)
            .rev()
            .collect();
        while let Some(i) = stack.pop() {
            order.push(i);
            for child in self.bones[i].children.iter().rev() {
                if let Some(&c) = self.index.get(child) {
                    stack.push(c);
                }
            }
        }
        let mut slots: Vec<Option<Bone>> = self.bones.drain(..).map(Some).collect();
        self.bones = order.into_iter().filter_map(|i| slots[i].take()).collect();
        self.index = self
            .bones
            .iter()
            .enumerate()
            .map(|(i, b)| (b.name.clone(), i))
            .collect();
    }

    /// Rebuilds child lists from parent links, in insertion order.
    fn relink(&mut self) {
        for bone in &mut self.bones {
            bone.children.clear();
        }
        for i in 0..self.bones.len() {
            let parent = self.bones[i]
                .parent
                .as_ref()
                .and_then(|p| self.index.get(p))
                .copied();
            if let Some(p) = parent {
                let name = self.bones[i].name.clone();
                self.bones[p].children.push(name);
            }
        }
        for bone in &mut self.bones {
            bone.leaf = bone.children.is_empty();
        }
    }

    /// Looks up a bone by name.
    pub fn get(&self, name: &str) -> Option<&Bone> {
        self.index.get(name).map(|&i| &self.bones[i])
    }

    /// True when the bone exists.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// All bones, parents before children.
    pub fn bones(&self) -> impl Iterator<Item = &Bone> {
        self.bones.iter()
    }

    /// Number of bones.
    pub fn len(&self) -> usize {
        self.bones.len()
    }

    /// True when the skeleton holds no bones.
    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    /// Position of a bone in hierarchical order.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Bones of the given kind, in hierarchical order.
    pub fn bones_of_kind(&self, kind: BoneKind) -> impl Iterator<Item = &Bone> {
        self.bones.iter().filter(move |b| b.kind == kind)
    }

    /// Bones carrying vertex weights (deform and volume bones).
    pub fn deforming_bones(&self) -> impl Iterator<Item = &Bone> {
        self.bones.iter().filter(|b| b.deform)
    }

    /// Control bone paired with a deform bone.
    pub fn control_for(&self, deform: &str) -> Option<&Bone> {
        control_name(deform)
            .and_then(|name| self.get(name))
            .filter(|b| b.kind == BoneKind::Control)
    }

    /// Deform bone paired with a control bone.
    pub fn deform_for(&self, control: &str) -> Option<&Bone> {
        self.get(&deform_name(control))
            .filter(|b| b.kind == BoneKind::Deform)
    }

    /// Placement rules for synthesized bones, in evaluation order.
    pub fn rules(&self) -> &[PlacementRule] {
        &self.rules
    }

    /// Rest head location in armature space.
    pub fn rest_head(&self, name: &str) -> Option<DVec3> {
        let mut bone = self.get(name)?;
        let mut head = bone.relhead;
        while let Some(parent) = bone.parent.as_ref().and_then(|p| self.get(p)) {
            head += parent.relhead;
            bone = parent;
        }
        Some(head)
    }

    /// Rest tail location in armature space.
    pub fn rest_tail(&self, name: &str) -> Option<DVec3> {
        let bone = self.get(name)?;
        Some(self.rest_head(name)? + bone.rotated_reltail())
    }

    /// Rest head and tail of every bone, in hierarchical order.
    pub fn rest_positions(&self) -> HashMap<String, (DVec3, DVec3)> {
        let mut heads: HashMap<String, DVec3> = HashMap::with_capacity(self.bones.len());
        let mut out = HashMap::with_capacity(self.bones.len());
        for bone in &self.bones {
            let parent_head = bone
                .parent
                .as_ref()
                .and_then(|p| heads.get(p))
                .copied()
                .unwrap_or(DVec3::ZERO);
            let head = parent_head + bone.relhead;
            heads.insert(bone.name.clone(), head);
            out.insert(bone.name.clone(), (head, head + bone.rotated_reltail()));
        }
        out
    }

    /// Bone counts per role.
    pub fn summary(&self) -> SkeletonSummary {
        let count = |kind| self.bones_of_kind(kind).count();
        let deform: Vec<&Bone> = self.bones_of_kind(BoneKind::Deform).collect();
        SkeletonSummary {
            rig_type: self.rig_type.as_str().to_string(),
            joint_type: self.joint_type.as_str().to_string(),
            total: self.bones.len(),
            deform: deform.len(),
            basic_deform: deform.iter().filter(|b| b.support == Support::Basic).count(),
            extended_deform: deform
                .iter()
                .filter(|b| b.support == Support::Extended)
                .count(),
            volumes: count(BoneKind::Volume),
            attachments: count(BoneKind::Attachment),
            controls: count(BoneKind::Control),
            ik: count(BoneKind::Ik),
            structure: count(BoneKind::Structure),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_names() {
        assert_eq!(control_name("mChest"), Some("Chest"));
        assert_eq!(control_name("mFaceRoot"), Some("FaceRoot"));
        assert_eq!(control_name("PELVIS"), None);
        assert_eq!(control_name("mixamorig:Hips"), None);
        assert_eq!(deform_name("Chest"), "mChest");
    }

    #[test]
    fn test_reorder_keeps_parents_first() {
        let mut skel = Skeleton::new(RigType::Basic, JointType::Pivot);
        skel.insert(Bone::new("root", BoneKind::Structure, BoneGroup::Structure));
        skel.insert(Bone::new("b", BoneKind::Deform, BoneGroup::Torso).with_parent("root"));
        skel.insert(Bone::new("c", BoneKind::Deform, BoneGroup::Torso).with_parent("root"));
        skel.insert(Bone::new("b1", BoneKind::Deform, BoneGroup::Torso).with_parent("b"));
        skel.reorder_hierarchically();
        let names: Vec<&str> = skel.bones().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["root", "b", "b1", "c"]);
        assert_eq!(skel.position("c"), Some(3));
    }

    #[test]
    fn test_rest_head_accumulates_parents() {
        let mut skel = Skeleton::new(RigType::Basic, JointType::Pivot);
        skel.insert(
            Bone::new("a", BoneKind::Deform, BoneGroup::Torso)
                .with_offsets(DVec3::new(0.0, 0.0, 1.0), DVec3::Z),
        );
        skel.insert(
            Bone::new("b", BoneKind::Deform, BoneGroup::Torso)
                .with_parent("a")
                .with_offsets(DVec3::new(0.0, 0.5, 0.0), DVec3::Z),
        );
        assert_eq!(skel.rest_head("b"), Some(DVec3::new(0.0, 0.5, 1.0)));
        assert_eq!(skel.rest_tail("b"), Some(DVec3::new(0.0, 0.5, 2.0)));
        let positions = skel.rest_positions();
        assert_eq!(positions["b"].0, DVec3::new(0.0, 0.5, 1.0));
        assert!(!skel.get("a").unwrap().leaf);
        assert!(skel.get("b").unwrap().leaf);
    }
}
