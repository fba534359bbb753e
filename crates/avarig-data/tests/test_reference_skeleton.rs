//! Tests for the bundled reference skeleton.
//!
//! These tests load the bundled skeleton definition in every rig/joint
//! combination and check the synthesized bone families and hierarchy
//! invariants.

use avarig_data::skeleton::{layer, BoneGroup, IkFamily, Support};
use avarig_data::{BoneKind, DataSource, JointType, RigType, Skeleton};
use glam::DVec3;
use pretty_assertions::assert_eq;

// =============================================================================
// Helper Functions
// =============================================================================

fn load(rig: RigType, joint: JointType) -> Skeleton {
    DataSource::Bundled.load_skeleton(rig, joint).unwrap()
}

fn close(a: DVec3, b: DVec3) -> bool {
    (a - b).length() < 1e-9
}

// =============================================================================
// Basic Rig Tests
// =============================================================================

#[test]
fn test_basic_pivot_counts() {
    let skel = load(RigType::Basic, JointType::Pivot);
    let summary = skel.summary();
    assert_eq!(summary.deform, 26);
    assert_eq!(summary.basic_deform, 26);
    assert_eq!(summary.extended_deform, 0);
    assert_eq!(summary.volumes, 26);
    assert_eq!(summary.attachments, 12);
    assert_eq!(summary.controls, 26);
    assert!(!skel.contains("mSpine1"));
    assert!(!skel.contains("mFaceRoot"));
    assert!(!skel.contains("mHandIndex1Left"));
}

#[test]
fn test_basic_pivot_pelvis_and_cog() {
    let skel = load(RigType::Basic, JointType::Pivot);
    let pelvis = skel.get("mPelvis").unwrap();
    assert_eq!(pelvis.parent.as_deref(), Some("Origin"));
    assert!(close(pelvis.relhead, DVec3::new(0.0, 0.0, 1.067)));

    let positions = skel.rest_positions();
    let expected = positions["mPelvis"].0 + pelvis.reltail;
    assert!(close(positions["COG"].0, expected));
    assert_eq!(skel.get("COG").unwrap().parent.as_deref(), Some("Origin"));
}

#[test]
fn test_collapsed_spine_keeps_torso_location() {
    let basic = load(RigType::Basic, JointType::Pos);
    let extended = load(RigType::Extended, JointType::Pos);
    for name in ["mTorso", "mChest", "mNeck", "mHead", "mCollarLeft", "mWristRight"] {
        let a = basic.rest_head(name).unwrap();
        let b = extended.rest_head(name).unwrap();
        assert!(close(a, b), "{name}: {a:?} vs {b:?}");
    }
    assert_eq!(basic.get("mTorso").unwrap().parent.as_deref(), Some("mPelvis"));
    assert_eq!(extended.get("mTorso").unwrap().parent.as_deref(), Some("mSpine2"));
}

// =============================================================================
// Extended Rig Tests
// =============================================================================

#[test]
fn test_extended_counts() {
    let skel = load(RigType::Extended, JointType::Pivot);
    let summary = skel.summary();
    assert_eq!(summary.basic_deform, 26);
    assert_eq!(summary.extended_deform, 31);
    assert_eq!(summary.volumes, 26);
    assert_eq!(skel.get("mWing1Left").unwrap().support, Support::Extended);
    assert!(skel.get("mWing1Left").unwrap().layers & layer::WING != 0);
}

#[test]
fn test_extended_ik_families() {
    let skel = load(RigType::Extended, JointType::Pivot);
    for (name, family) in [
        ("ikWristLeft", IkFamily::Arms),
        ("ikAnkleRight", IkFamily::Legs),
        ("ikHindLimb3Left", IkFamily::Hind),
        ("ikIndexTargetRight", IkFamily::Fingers),
        ("ikFaceLipCornerLeft", IkFamily::Face),
        ("FaceEyeAltTarget", IkFamily::Face),
    ] {
        let bone = skel.get(name).unwrap_or_else(|| panic!("missing {name}"));
        assert_eq!(bone.group, BoneGroup::Ik(family), "{name}");
        assert_eq!(bone.kind, BoneKind::Ik);
    }

    let basic = load(RigType::Basic, JointType::Pivot);
    assert!(basic.contains("ikWristLeft"));
    assert!(!basic.contains("ikHindLimb3Left"));
    assert!(!basic.contains("ikIndexTargetLeft"));
}

// =============================================================================
// Invariant Tests
// =============================================================================

#[test]
fn test_parents_exist_and_precede_children() {
    for (rig, joint) in [
        (RigType::Basic, JointType::Pos),
        (RigType::Basic, JointType::Pivot),
        (RigType::Extended, JointType::Pos),
        (RigType::Extended, JointType::Pivot),
    ] {
        let skel = load(rig, joint);
        for bone in skel.bones() {
            if let Some(parent) = &bone.parent {
                let p = skel.position(parent).expect("parent exists");
                assert!(p < skel.position(&bone.name).unwrap(), "{}", bone.name);
            }
        }
    }
}

#[test]
fn test_controls_coincide_with_deform_bones() {
    let skel = load(RigType::Extended, JointType::Pivot);
    let positions = skel.rest_positions();
    for deform in skel.bones_of_kind(BoneKind::Deform) {
        let control = skel.control_for(&deform.name).expect("control exists");
        let (dh, dt) = positions[&deform.name];
        let (ch, ct) = positions[&control.name];
        assert!(close(dh, ch) && close(dt, ct), "{}", deform.name);
    }
}

#[test]
fn test_connected_bones_touch_parent_tail() {
    let skel = load(RigType::Basic, JointType::Pos);
    let positions = skel.rest_positions();
    let mut connected = 0;
    for bone in skel.bones_of_kind(BoneKind::Deform) {
        if bone.connected {
            connected += 1;
            let parent = bone.parent.as_ref().unwrap();
            assert!(close(positions[parent].1, positions[&bone.name].0), "{}", bone.name);
        }
    }
    assert!(connected > 0);
    assert!(skel.get("mShoulderLeft").unwrap().connected);
    assert!(!skel.get("mHipLeft").unwrap().connected);
    assert!(skel.get("mCollarLeft").unwrap().is_ik_root);
}

#[test]
fn test_volume_tail_is_rotated() {
    let skel = load(RigType::Basic, JointType::Pos);
    let chest = skel.get("CHEST").unwrap();
    assert_eq!(chest.kind, BoneKind::Volume);
    assert!(chest.deform);
    assert!(chest.rot0.length() > 0.0);
    let tail = skel.rest_tail("CHEST").unwrap() - skel.rest_head("CHEST").unwrap();
    assert!((tail.length() - chest.scale0.z).abs() < 1e-12);
    assert!(!close(tail, chest.reltail));
}

#[test]
fn test_attachment_points() {
    let skel = load(RigType::Basic, JointType::Pivot);
    let skull = skel.get("aSkull").unwrap();
    assert_eq!(skull.kind, BoneKind::Attachment);
    assert_eq!(skull.parent.as_deref(), Some("mHead"));
    assert!(!skull.deform);
    assert!(skel.contains("aLeft Shoulder"));
}

#[test]
fn test_ik_targets_follow_rules() {
    let skel = load(RigType::Basic, JointType::Pos);
    let positions = skel.rest_positions();
    assert!(close(positions["ikWristLeft"].0, positions["mWristLeft"].0));
    let knee = positions["mKneeLeft"].0;
    assert!(close(positions["ikKneeTargetLeft"].0, knee + DVec3::new(0.0, -0.3, 0.0)));
    let eyes = (positions["mEyeLeft"].0 + positions["mEyeRight"].0) * 0.5;
    assert!(close(positions["EyeTarget"].0, eyes + DVec3::new(0.0, -2.0, 0.0)));
    assert_eq!(positions["ikHeelLeft"].0.z, 0.0);
}

#[test]
fn test_limits_and_bvh_names() {
    let skel = load(RigType::Basic, JointType::Pos);
    let knee = skel.get("mKneeLeft").unwrap();
    assert!(knee.limits.is_some());
    assert_eq!(skel.get("KneeLeft").unwrap().limits, knee.limits);
    assert_eq!(skel.get("mSkull").unwrap().stiffness, DVec3::ZERO);
    assert_eq!(skel.get("mPelvis").unwrap().bvh_name.as_deref(), Some("hip"));
    assert_eq!(skel.get("mHipLeft").unwrap().bvh_name.as_deref(), Some("lThigh"));
}
