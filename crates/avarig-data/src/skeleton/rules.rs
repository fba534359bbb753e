//! Placement rules for synthesized bones.
//!
//! Structural and IK bones have no entry in the skeleton definition. Their
//! heads and tails are expressed as [`Anchor`]s over deform bones so the same
//! rule places them at load time (rest pose) and after every shape
//! evaluation.

use glam::DVec3;

use super::{BoneGroup, BoneKind, IkFamily, ORIGIN_BONE, ROOT_DEFORM_BONE};

/// A location derived from other bones.
#[derive(Debug, Clone, PartialEq)]
pub enum Anchor {
    /// Head of the named bone plus an offset.
    Head(String, DVec3),
    /// Tail of the named bone plus an offset.
    Tail(String, DVec3),
    /// Midpoint of two bone heads plus an offset.
    Midpoint(String, String, DVec3),
    /// Head of the named bone projected onto the ground plane of `Origin`.
    Ground(String),
    /// Tail of the named bone projected onto the ground plane of `Origin`.
    GroundTail(String),
}

impl Anchor {
    fn head(bone: &str) -> Self {
        Anchor::Head(bone.to_string(), DVec3::ZERO)
    }

    fn tail(bone: &str) -> Self {
        Anchor::Tail(bone.to_string(), DVec3::ZERO)
    }

    /// Bones this anchor reads.
    pub fn sources(&self) -> Vec<&str> {
        match self {
            Anchor::Head(b, _) | Anchor::Tail(b, _) | Anchor::GroundTail(b) => vec![b.as_str()],
            Anchor::Ground(b) => vec![b.as_str(), ORIGIN_BONE],
            Anchor::Midpoint(a, b, _) => vec![a.as_str(), b.as_str()],
        }
    }

    /// Resolves the anchor against a head/tail lookup.
    pub fn resolve<F>(&self, lookup: F) -> Option<DVec3>
    where
        F: Fn(&str) -> Option<(DVec3, DVec3)>,
    {
        let ground = |p: DVec3| -> Option<DVec3> {
            let origin = lookup(ORIGIN_BONE).map(|(h, _)| h.z).unwrap_or(0.0);
            Some(DVec3::new(p.x, p.y, origin))
        };
        match self {
            Anchor::Head(b, off) => lookup(b).map(|(h, _)| h + *off),
            Anchor::Tail(b, off) => lookup(b).map(|(_, t)| t + *off),
            Anchor::Midpoint(a, b, off) => {
                let (ha, _) = lookup(a)?;
                let (hb, _) = lookup(b)?;
                Some((ha + hb) * 0.5 + *off)
            }
            Anchor::Ground(b) => ground(lookup(b)?.0),
            Anchor::GroundTail(b) => ground(lookup(b)?.1),
        }
    }
}

/// How one synthesized bone is placed.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementRule {
    pub bone: String,
    pub parent: String,
    pub kind: BoneKind,
    pub group: BoneGroup,
    pub head: Anchor,
    pub tail: Anchor,
}

impl PlacementRule {
    fn new(bone: String, parent: &str, kind: BoneKind, group: BoneGroup, head: Anchor, tail: Anchor) -> Self {
        Self {
            bone,
            parent: parent.to_string(),
            kind,
            group,
            head,
            tail,
        }
    }

    /// All bones the rule reads.
    pub fn sources(&self) -> Vec<&str> {
        let mut out = self.head.sources();
        out.extend(self.tail.sources());
        out
    }
}

const SIDES: [&str; 2] = ["Left", "Right"];
const FINGERS: [&str; 5] = ["Thumb", "Index", "Middle", "Ring", "Pinky"];

/// Offset of knee and hind-limb pole targets, in front of the joint.
pub const KNEE_TARGET_OFFSET: DVec3 = DVec3::new(0.0, -0.3, 0.0);
/// Offset of elbow pole targets, behind the joint.
pub const ELBOW_TARGET_OFFSET: DVec3 = DVec3::new(0.0, 0.3, 0.0);
/// Offset of the eye target in front of the eyes.
pub const EYE_TARGET_OFFSET: DVec3 = DVec3::new(0.0, -2.0, 0.0);

const SHORT_TAIL: DVec3 = DVec3::new(0.0, 0.0, 0.05);

/// Builds the rules whose source bones all exist.
///
/// Structural rules come first, then IK families. A rule may read bones
/// placed by an earlier rule (`Pelvis` is a control bone and exists before
/// any rule runs).
pub fn placement_rules<F>(exists: F) -> Vec<PlacementRule>
where
    F: Fn(&str) -> bool,
{
    let mut rules = Vec::new();
    let s = BoneKind::Structure;
    let g = BoneGroup::Structure;

    rules.push(PlacementRule::new(
        "COG".into(),
        ORIGIN_BONE,
        s,
        g,
        Anchor::tail(ROOT_DEFORM_BONE),
        Anchor::Tail(ROOT_DEFORM_BONE.into(), DVec3::new(0.0, 0.1, 0.0)),
    ));
    rules.push(PlacementRule::new(
        "PelvisInv".into(),
        "Pelvis",
        s,
        g,
        Anchor::tail(ROOT_DEFORM_BONE),
        Anchor::head(ROOT_DEFORM_BONE),
    ));
    for side in SIDES {
        let hip = format!("mHip{side}");
        if exists(&hip) {
            rules.push(PlacementRule::new(
                format!("HipLink{side}"),
                "Pelvis",
                s,
                g,
                Anchor::head(ROOT_DEFORM_BONE),
                Anchor::head(&hip),
            ));
        }
        let collar = format!("mCollar{side}");
        if exists(&collar) && exists("mChest") {
            rules.push(PlacementRule::new(
                format!("CollarLink{side}"),
                "Chest",
                s,
                g,
                Anchor::head("mChest"),
                Anchor::head(&collar),
            ));
        }
    }

    let ik = BoneKind::Ik;
    if exists("mEyeLeft") && exists("mEyeRight") && exists("mHead") {
        rules.push(PlacementRule::new(
            "EyeTarget".into(),
            "Head",
            ik,
            BoneGroup::Ik(IkFamily::Face),
            Anchor::Midpoint("mEyeLeft".into(), "mEyeRight".into(), EYE_TARGET_OFFSET),
            Anchor::Midpoint(
                "mEyeLeft".into(),
                "mEyeRight".into(),
                EYE_TARGET_OFFSET + SHORT_TAIL,
            ),
        ));
    }
    if exists("mFaceEyeAltLeft") && exists("mFaceEyeAltRight") && exists("mHead") {
        rules.push(PlacementRule::new(
            "FaceEyeAltTarget".into(),
            "Head",
            ik,
            BoneGroup::Ik(IkFamily::Face),
            Anchor::Midpoint(
                "mFaceEyeAltLeft".into(),
                "mFaceEyeAltRight".into(),
                EYE_TARGET_OFFSET,
            ),
            Anchor::Midpoint(
                "mFaceEyeAltLeft".into(),
                "mFaceEyeAltRight".into(),
                EYE_TARGET_OFFSET + SHORT_TAIL,
            ),
        ));
    }

    for side in SIDES {
        let (shoulder, elbow, wrist) = (
            format!("mShoulder{side}"),
            format!("mElbow{side}"),
            format!("mWrist{side}"),
        );
        if exists(&shoulder) && exists(&elbow) && exists(&wrist) {
            let group = BoneGroup::Ik(IkFamily::Arms);
            rules.push(PlacementRule::new(
                format!("ikWrist{side}"),
                ORIGIN_BONE,
                ik,
                group,
                Anchor::head(&wrist),
                Anchor::tail(&wrist),
            ));
            rules.push(PlacementRule::new(
                format!("ikElbowTarget{side}"),
                ORIGIN_BONE,
                ik,
                group,
                Anchor::Head(elbow.clone(), ELBOW_TARGET_OFFSET),
                Anchor::Head(elbow, ELBOW_TARGET_OFFSET + SHORT_TAIL),
            ));
        }

        let (hip, knee, ankle, toe) = (
            format!("mHip{side}"),
            format!("mKnee{side}"),
            format!("mAnkle{side}"),
            format!("mToe{side}"),
        );
        if exists(&hip) && exists(&knee) && exists(&ankle) && exists(&toe) {
            let group = BoneGroup::Ik(IkFamily::Legs);
            rules.push(PlacementRule::new(
                format!("ikAnkle{side}"),
                ORIGIN_BONE,
                ik,
                group,
                Anchor::head(&ankle),
                Anchor::tail(&ankle),
            ));
            rules.push(PlacementRule::new(
                format!("ikKneeTarget{side}"),
                ORIGIN_BONE,
                ik,
                group,
                Anchor::Head(knee.clone(), KNEE_TARGET_OFFSET),
                Anchor::Head(knee, KNEE_TARGET_OFFSET + SHORT_TAIL),
            ));
            rules.push(PlacementRule::new(
                format!("ikHeel{side}"),
                ORIGIN_BONE,
                ik,
                group,
                Anchor::Ground(ankle),
                Anchor::Ground(toe.clone()),
            ));
            rules.push(PlacementRule::new(
                format!("ikFootPivot{side}"),
                ORIGIN_BONE,
                ik,
                group,
                Anchor::Ground(toe.clone()),
                Anchor::GroundTail(toe),
            ));
        }

        let limbs: Vec<String> = (1..=4).map(|i| format!("mHindLimb{i}{side}")).collect();
        if limbs.iter().all(|b| exists(b)) {
            let group = BoneGroup::Ik(IkFamily::Hind);
            rules.push(PlacementRule::new(
                format!("ikHindLimb3{side}"),
                ORIGIN_BONE,
                ik,
                group,
                Anchor::head(&limbs[2]),
                Anchor::tail(&limbs[2]),
            ));
            rules.push(PlacementRule::new(
                format!("ikHindLimb2Target{side}"),
                ORIGIN_BONE,
                ik,
                group,
                Anchor::Head(limbs[1].clone(), KNEE_TARGET_OFFSET),
                Anchor::Head(limbs[1].clone(), KNEE_TARGET_OFFSET + SHORT_TAIL),
            ));
        }

        for finger in FINGERS {
            let tip = format!("mHand{finger}3{side}");
            let root = format!("mHand{finger}1{side}");
            if exists(&tip) && exists(&root) && exists(&wrist) {
                rules.push(PlacementRule::new(
                    format!("ik{finger}Target{side}"),
                    &format!("Wrist{side}"),
                    ik,
                    BoneGroup::Ik(IkFamily::Fingers),
                    Anchor::tail(&tip),
                    Anchor::Tail(tip.clone(), SHORT_TAIL),
                ));
            }
        }

        for face in ["LipCorner", "EyebrowOuter"] {
            let source = format!("mFace{face}{side}");
            if exists(&source) && exists("mHead") {
                rules.push(PlacementRule::new(
                    format!("ikFace{face}{side}"),
                    "Head",
                    ik,
                    BoneGroup::Ik(IkFamily::Face),
                    Anchor::head(&source),
                    Anchor::Head(source.clone(), DVec3::new(0.0, -0.02, 0.0)),
                ));
            }
        }
    }
    rules
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rules_depend_on_sources() {
        let only_torso = |name: &str| matches!(name, "mPelvis" | "mTorso" | "mChest");
        let rules = placement_rules(only_torso);
        let names: Vec<&str> = rules.iter().map(|r| r.bone.as_str()).collect();
        assert_eq!(names, vec!["COG", "PelvisInv"]);
    }

    #[test]
    fn test_ground_anchor_uses_origin_height() {
        let lookup = |name: &str| match name {
            "Origin" => Some((DVec3::new(0.0, 0.0, -0.2), DVec3::ZERO)),
            "mToeLeft" => Some((DVec3::new(0.1, -0.1, 0.05), DVec3::new(0.1, -0.2, 0.05))),
            _ => None,
        };
        let p = Anchor::Ground("mToeLeft".into()).resolve(lookup).unwrap();
        assert_eq!(p, DVec3::new(0.1, -0.1, -0.2));
        let t = Anchor::GroundTail("mToeLeft".into()).resolve(lookup).unwrap();
        assert_eq!(t, DVec3::new(0.1, -0.2, -0.2));
        assert!(Anchor::head("mMissing").resolve(lookup).is_none());
    }

    #[test]
    fn test_midpoint_anchor() {
        let lookup = |name: &str| match name {
            "a" => Some((DVec3::new(-1.0, 0.0, 1.0), DVec3::ZERO)),
            "b" => Some((DVec3::new(1.0, 0.0, 1.0), DVec3::ZERO)),
            _ => None,
        };
        let p = Anchor::Midpoint("a".into(), "b".into(), EYE_TARGET_OFFSET)
            .resolve(lookup)
            .unwrap();
        assert_eq!(p, DVec3::new(0.0, -2.0, 1.0));
    }
}
