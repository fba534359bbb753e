//! Hover correction: keeps the toes on the ground across slider changes.

use avarig_data::skeleton::{ORIGIN_BONE, TOE_BONES};
use glam::DVec3;
use log::debug;

use super::bones::Frames;
use crate::scene::{Armature, MeshObject};

/// Average head of the toe bones present in a lookup.
pub fn toe_location<F>(lookup: F) -> Option<DVec3>
where
    F: Fn(&str) -> Option<(DVec3, DVec3)>,
{
    let heads: Vec<DVec3> = TOE_BONES.iter().filter_map(|t| lookup(t)).map(|(h, _)| h).collect();
    if heads.is_empty() {
        return None;
    }
    Some(heads.iter().copied().sum::<DVec3>() / heads.len() as f64)
}

/// Moves the armature origin against the vertical toe movement between the
/// armature's current bones and the new frames. Unskinned child meshes move
/// the opposite way so they stay put in world space. The `Origin` bone is
/// placed at `rest_toe_z` below the new toe height.
///
/// Returns the toe movement in armature space.
pub fn correct(
    armature: &mut Armature,
    meshes: &mut [&mut MeshObject],
    frames: &mut Frames,
    rest_toe_z: f64,
) -> f64 {
    let before = toe_location(|n| armature.head_tail(n));
    let after = toe_location(|n| frames.get(n).map(|f| (f.head, f.tail)));
    let (Some(before), Some(after)) = (before, after) else {
        debug!("Armature '{}' has no toe bones, hover correction skipped", armature.name);
        return 0.0;
    };

    let dz = after.z - before.z;
    if dz != 0.0 {
        armature.location.z -= armature.scale.z * dz;
        for mesh in meshes.iter_mut() {
            if mesh.weights.iter().all(|w| w.is_empty()) {
                mesh.transform.translation.z += dz;
            }
        }
    }

    if let Some(origin) = frames.get_mut(ORIGIN_BONE) {
        let lift = after.z - rest_toe_z - origin.head.z;
        origin.head.z += lift;
        origin.tail.z += lift;
    }
    dz
}
