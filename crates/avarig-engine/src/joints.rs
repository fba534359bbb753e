//! Joint offset store.
//!
//! Hand edits to edit bones are kept as per-bone deltas against the
//! position the sliders alone would produce. The evaluator adds them back on
//! every run, so edited joints survive slider changes.

use std::collections::BTreeMap;

use avarig_data::skeleton::ORIGIN_BONE;
use avarig_data::{BoneKind, Skeleton};
use glam::DVec3;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::config::JointStoreOptions;
use crate::evaluator::bones::place;
use crate::scene::Armature;

/// Offset of one bone against its slider-driven position.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct JointOffset {
    /// Head delta in armature space.
    pub head: DVec3,
    /// Tail delta relative to the head.
    pub tail: DVec3,
    pub roll: f64,
    pub has_head: bool,
    pub has_tail: bool,
}

impl JointOffset {
    /// True when some component exceeds `min_offset`.
    pub fn is_dirty(&self, min_offset: f64) -> bool {
        (self.has_head && self.head.length() > min_offset)
            || (self.has_tail && self.tail.length() > min_offset)
    }
}

/// Joint offsets of one armature, keyed by bone name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JointStore {
    entries: BTreeMap<String, JointOffset>,
}

impl JointStore {
    /// Offset of a bone.
    pub fn get(&self, bone: &str) -> Option<&JointOffset> {
        self.entries.get(bone)
    }

    /// Sets the offset of a bone.
    pub fn insert(&mut self, bone: impl Into<String>, offset: JointOffset) {
        self.entries.insert(bone.into(), offset);
    }

    /// Removes the offset of a bone.
    pub fn remove(&mut self, bone: &str) -> Option<JointOffset> {
        self.entries.remove(bone)
    }

    /// Removes every offset.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of stored offsets.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no offsets are stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All offsets in bone-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &JointOffset)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Records the difference between every edit bone and its slider-driven
/// position. The new table replaces the old one as a whole. Clears the
/// joint-edit dirty flag and returns the number of entries.
pub fn store_joints(
    armature: &mut Armature,
    skeleton: &Skeleton,
    options: JointStoreOptions,
    min_offset: f64,
) -> usize {
    let frames = place(skeleton, armature.shape.accumulators(), None);
    let actual = |name: &str| armature.head_tail(name);
    let mut table = JointStore::default();

    for bone in skeleton.bones() {
        let Some(edit) = armature.bone(&bone.name) else {
            continue;
        };
        let expected = match bone.kind {
            BoneKind::Deform | BoneKind::Volume => {
                let (Some(frame), Some(parent)) = (
                    frames.get(&bone.name),
                    bone.parent.as_ref().and_then(|p| frames.get(p).map(|f| (p, f))),
                ) else {
                    continue;
                };
                let (parent_name, parent_frame) = parent;
                let parent_head = if parent_name == ORIGIN_BONE {
                    parent_frame.head
                } else {
                    actual(parent_name.as_str()).map_or(parent_frame.head, |(h, _)| h)
                };
                let head = parent_head + (frame.head - parent_frame.head);
                let connected_child = bone
                    .children
                    .iter()
                    .filter_map(|c| skeleton.get(c))
                    .find(|c| c.connected && c.kind == BoneKind::Deform)
                    .and_then(|c| actual(c.name.as_str()));
                let tail_offset = match connected_child {
                    Some((child_head, _)) => child_head - edit.head,
                    None => frame.tail - frame.head,
                };
                (head, tail_offset)
            }
            BoneKind::Ik if options.include_ik => {
                let Some(rule) = skeleton.rules().iter().find(|r| r.bone == bone.name) else {
                    continue;
                };
                let (Some(head), Some(tail)) = (rule.head.resolve(actual), rule.tail.resolve(actual)) else {
                    continue;
                };
                (head, tail - head)
            }
            _ => continue,
        };

        let head_delta = edit.head - expected.0;
        let tail_delta = (edit.tail - edit.head) - expected.1;
        let has_head = head_delta.length() > min_offset;
        let has_tail = options.include_tails && tail_delta.length() > min_offset;
        if !(has_head || has_tail) {
            continue;
        }
        debug!("Joint offset on '{}': head {:?} tail {:?}", bone.name, head_delta, tail_delta);
        table.insert(
            bone.name.clone(),
            JointOffset {
                head: if has_head { head_delta } else { DVec3::ZERO },
                tail: if has_tail { tail_delta } else { DVec3::ZERO },
                roll: edit.roll - bone.roll,
                has_head,
                has_tail,
            },
        );
    }

    let count = table.len();
    armature.joints = table;
    armature.shape.clear_joints_dirty();
    info!("Stored {} joint offsets on '{}'", count, armature.name);
    count
}

/// Removes the offset of one bone, or of every bone when `bone` is `None`.
/// Returns the number of entries removed. Geometry is restored by the next
/// evaluation unless the caller keeps the edited joints.
pub fn remove_joints(armature: &mut Armature, bone: Option<&str>) -> usize {
    match bone {
        Some(name) => usize::from(armature.joints.remove(name).is_some()),
        None => {
            let count = armature.joints.len();
            armature.joints.clear();
            count
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::EditBone;

    #[test]
    fn test_store_accessors() {
        let mut store = JointStore::default();
        assert!(store.is_empty());
        store.insert(
            "mChest",
            JointOffset {
                head: DVec3::new(0.0, 0.0, 0.01),
                has_head: true,
                ..Default::default()
            },
        );
        assert_eq!(store.len(), 1);
        assert!(store.get("mChest").unwrap().is_dirty(0.001));
        assert!(!store.get("mChest").unwrap().is_dirty(0.1));
    }

    #[test]
    fn test_remove_single_and_all() {
        let mut arm = Armature::new("Avatar");
        arm.add_bone(EditBone::new("mChest", DVec3::ZERO, DVec3::Z));
        arm.joints.insert("mChest", JointOffset::default());
        arm.joints.insert("mNeck", JointOffset::default());
        assert_eq!(remove_joints(&mut arm, Some("mChest")), 1);
        assert_eq!(remove_joints(&mut arm, Some("mChest")), 0);
        assert_eq!(remove_joints(&mut arm, None), 1);
        assert!(arm.joints.is_empty());
    }

    #[test]
    fn test_store_serializes() {
        let mut store = JointStore::default();
        store.insert("mHead", JointOffset { roll: 0.5, ..Default::default() });
        let json = serde_json::to_string(&store).unwrap();
        let back: JointStore = serde_json::from_str(&json).unwrap();
        assert_eq!(back, store);
    }
}
