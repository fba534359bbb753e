//! Re-alignment of structural and IK bones to the evaluated deform rig.

use avarig_data::Skeleton;
use log::debug;

use super::bones::{BoneFrame, Frames};
use crate::joints::JointStore;

/// Places every rule bone of the skeleton from the frames, in rule order.
/// Rules may read bones placed by earlier rules. Returns the number placed.
pub fn place_rule_bones(skeleton: &Skeleton, frames: &mut Frames, joints: Option<&JointStore>) -> usize {
    let mut placed = 0;
    for rule in skeleton.rules() {
        let lookup = |n: &str| frames.get(n).map(|f| (f.head, f.tail));
        let (Some(mut head), Some(mut tail)) = (rule.head.resolve(lookup), rule.tail.resolve(lookup)) else {
            debug!("Rule bone '{}' lost its anchors", rule.bone);
            continue;
        };
        if let Some(joint) = joints.and_then(|j| j.get(&rule.bone)) {
            if joint.has_head {
                head += joint.head;
                tail += joint.head;
            }
            if joint.has_tail {
                tail += joint.tail;
            }
        }
        frames.insert(rule.bone.clone(), BoneFrame::at(head, tail));
        placed += 1;
    }
    placed
}
