//! Static per-bone tables: IK stiffness, rotation limits, and BVH names.
//!
//! Lookups strip the `m` prefix and the `Left`/`Right` suffix, so one row
//! covers the deform bone, its control, and both sides.

use glam::DVec3;

use super::RotationLimits;

struct LimitRow {
    base: &'static str,
    stiffness: [f64; 3],
    x: Option<[f64; 2]>,
    y: Option<[f64; 2]>,
    z: Option<[f64; 2]>,
}

const LIMIT_TABLE: &[LimitRow] = &[
    LimitRow { base: "Torso", stiffness: [0.5, 0.5, 0.5], x: Some([-60.0, 60.0]), y: Some([-30.0, 30.0]), z: Some([-45.0, 45.0]) },
    LimitRow { base: "Chest", stiffness: [0.5, 0.5, 0.5], x: Some([-45.0, 45.0]), y: Some([-30.0, 30.0]), z: Some([-45.0, 45.0]) },
    LimitRow { base: "Neck", stiffness: [0.3, 0.3, 0.3], x: Some([-45.0, 60.0]), y: Some([-30.0, 30.0]), z: Some([-60.0, 60.0]) },
    LimitRow { base: "Head", stiffness: [0.3, 0.3, 0.3], x: Some([-45.0, 45.0]), y: Some([-30.0, 30.0]), z: Some([-60.0, 60.0]) },
    LimitRow { base: "Collar", stiffness: [0.8, 0.8, 0.8], x: Some([-20.0, 20.0]), y: Some([-30.0, 30.0]), z: Some([-20.0, 20.0]) },
    LimitRow { base: "Shoulder", stiffness: [0.0, 0.0, 0.0], x: Some([-90.0, 90.0]), y: Some([-90.0, 90.0]), z: Some([-135.0, 90.0]) },
    LimitRow { base: "Elbow", stiffness: [0.0, 0.9, 0.9], x: Some([0.0, 150.0]), y: None, z: None },
    LimitRow { base: "Wrist", stiffness: [0.2, 0.2, 0.2], x: Some([-80.0, 80.0]), y: Some([-30.0, 30.0]), z: Some([-80.0, 80.0]) },
    LimitRow { base: "Hip", stiffness: [0.0, 0.0, 0.0], x: Some([-120.0, 45.0]), y: Some([-45.0, 45.0]), z: Some([-45.0, 90.0]) },
    LimitRow { base: "Knee", stiffness: [0.0, 0.9, 0.9], x: Some([0.0, 150.0]), y: None, z: None },
    LimitRow { base: "Ankle", stiffness: [0.3, 0.3, 0.3], x: Some([-45.0, 60.0]), y: Some([-20.0, 20.0]), z: Some([-30.0, 30.0]) },
    LimitRow { base: "Foot", stiffness: [0.6, 0.6, 0.6], x: Some([-30.0, 30.0]), y: None, z: None },
];

const BVH_TABLE: &[(&str, &str)] = &[
    ("mPelvis", "hip"),
    ("mTorso", "abdomen"),
    ("mChest", "chest"),
    ("mNeck", "neck"),
    ("mHead", "head"),
    ("mSkull", "figureHair"),
    ("mCollarLeft", "lCollar"),
    ("mShoulderLeft", "lShldr"),
    ("mElbowLeft", "lForeArm"),
    ("mWristLeft", "lHand"),
    ("mCollarRight", "rCollar"),
    ("mShoulderRight", "rShldr"),
    ("mElbowRight", "rForeArm"),
    ("mWristRight", "rHand"),
    ("mHipLeft", "lThigh"),
    ("mKneeLeft", "lShin"),
    ("mAnkleLeft", "lFoot"),
    ("mHipRight", "rThigh"),
    ("mKneeRight", "rShin"),
    ("mAnkleRight", "rFoot"),
];

fn base_name(name: &str) -> &str {
    let name = name.strip_prefix('m').unwrap_or(name);
    name.strip_suffix("Left")
        .or_else(|| name.strip_suffix("Right"))
        .unwrap_or(name)
}

/// IK stiffness and rotation limits for a deform or control bone.
pub fn lookup_limits(name: &str) -> Option<(DVec3, RotationLimits)> {
    let base = base_name(name);
    LIMIT_TABLE.iter().find(|row| row.base == base).map(|row| {
        (
            DVec3::from_array(row.stiffness),
            RotationLimits {
                x: row.x,
                y: row.y,
                z: row.z,
            },
        )
    })
}

/// BVH joint name for a deform bone.
///
/// Bones without a classic mocap name use their control name.
pub fn bvh_name(deform: &str) -> String {
    BVH_TABLE
        .iter()
        .find(|(bone, _)| *bone == deform)
        .map(|(_, bvh)| bvh.to_string())
        .unwrap_or_else(|| deform.strip_prefix('m').unwrap_or(deform).to_string())
}
