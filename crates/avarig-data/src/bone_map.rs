//! Bone-name maps from foreign rig families onto the avatar deform bones.

use serde::{Deserialize, Serialize};

/// Naming family of a skeleton.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RigFamily {
    /// Avatar naming (`mPelvis`, `Pelvis`, collision volumes).
    Avatar,
    /// Lowercase generic game-rig naming (`hips`, `spine`, `upperarm_l`).
    Humanoid,
    /// Mixamo naming (`mixamorig:Hips`).
    Mixamo,
}

const HUMANOID: &[(&str, &str)] = &[
    ("hips", "mPelvis"),
    ("spine", "mTorso"),
    ("chest", "mChest"),
    ("neck", "mNeck"),
    ("head", "mHead"),
    ("head_end", "mSkull"),
    ("eye_l", "mEyeLeft"),
    ("eye_r", "mEyeRight"),
    ("shoulder_l", "mCollarLeft"),
    ("upperarm_l", "mShoulderLeft"),
    ("lowerarm_l", "mElbowLeft"),
    ("hand_l", "mWristLeft"),
    ("shoulder_r", "mCollarRight"),
    ("upperarm_r", "mShoulderRight"),
    ("lowerarm_r", "mElbowRight"),
    ("hand_r", "mWristRight"),
    ("upperleg_l", "mHipLeft"),
    ("lowerleg_l", "mKneeLeft"),
    ("foot_l", "mAnkleLeft"),
    ("toes_l", "mFootLeft"),
    ("toes_end_l", "mToeLeft"),
    ("upperleg_r", "mHipRight"),
    ("lowerleg_r", "mKneeRight"),
    ("foot_r", "mAnkleRight"),
    ("toes_r", "mFootRight"),
    ("toes_end_r", "mToeRight"),
];

const MIXAMO: &[(&str, &str)] = &[
    ("Hips", "mPelvis"),
    ("Spine", "mTorso"),
    ("Spine2", "mChest"),
    ("Neck", "mNeck"),
    ("Head", "mHead"),
    ("HeadTop_End", "mSkull"),
    ("LeftEye", "mEyeLeft"),
    ("RightEye", "mEyeRight"),
    ("LeftShoulder", "mCollarLeft"),
    ("LeftArm", "mShoulderLeft"),
    ("LeftForeArm", "mElbowLeft"),
    ("LeftHand", "mWristLeft"),
    ("RightShoulder", "mCollarRight"),
    ("RightArm", "mShoulderRight"),
    ("RightForeArm", "mElbowRight"),
    ("RightHand", "mWristRight"),
    ("LeftUpLeg", "mHipLeft"),
    ("LeftLeg", "mKneeLeft"),
    ("LeftFoot", "mAnkleLeft"),
    ("LeftToeBase", "mFootLeft"),
    ("LeftToe_End", "mToeLeft"),
    ("RightUpLeg", "mHipRight"),
    ("RightLeg", "mKneeRight"),
    ("RightFoot", "mAnkleRight"),
    ("RightToeBase", "mFootRight"),
    ("RightToe_End", "mToeRight"),
];

const MIXAMO_PREFIX: &str = "mixamorig:";

impl RigFamily {
    /// Returns the string identifier for this family.
    pub fn as_str(&self) -> &'static str {
        match self {
            RigFamily::Avatar => "avatar",
            RigFamily::Humanoid => "humanoid",
            RigFamily::Mixamo => "mixamo",
        }
    }

    /// Maps a foreign bone name onto an avatar deform bone.
    pub fn map_bone(&self, name: &str) -> Option<&'static str> {
        let table = match self {
            RigFamily::Avatar => return None,
            RigFamily::Humanoid => HUMANOID,
            RigFamily::Mixamo => MIXAMO,
        };
        let key = match self {
            RigFamily::Mixamo => name.strip_prefix(MIXAMO_PREFIX).unwrap_or(name),
            _ => name,
        };
        table
            .iter()
            .find(|(foreign, _)| *foreign == key)
            .map(|(_, avatar)| *avatar)
    }

    /// Guesses the family of a set of bone names.
    ///
    /// Returns `None` when fewer than half of the bones map.
    pub fn detect<'a, I>(names: I) -> Option<RigFamily>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let names: Vec<&str> = names.into_iter().collect();
        if names.is_empty() {
            return None;
        }
        if names.iter().any(|n| *n == "mPelvis") {
            return Some(RigFamily::Avatar);
        }
        [RigFamily::Mixamo, RigFamily::Humanoid]
            .into_iter()
            .map(|family| {
                let hits = names.iter().filter(|n| family.map_bone(n).is_some()).count();
                (family, hits)
            })
            .filter(|(_, hits)| hits * 2 >= names.len())
            .max_by_key(|(_, hits)| *hits)
            .map(|(family, _)| family)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mixamo_prefix_is_optional() {
        assert_eq!(RigFamily::Mixamo.map_bone("mixamorig:Hips"), Some("mPelvis"));
        assert_eq!(RigFamily::Mixamo.map_bone("LeftForeArm"), Some("mElbowLeft"));
        assert_eq!(RigFamily::Mixamo.map_bone("mixamorig:Tail"), None);
    }

    #[test]
    fn test_detect_family() {
        let mixamo = ["mixamorig:Hips", "mixamorig:Spine", "mixamorig:Head"];
        assert_eq!(RigFamily::detect(mixamo), Some(RigFamily::Mixamo));
        let humanoid = ["hips", "spine", "chest", "prop"];
        assert_eq!(RigFamily::detect(humanoid), Some(RigFamily::Humanoid));
        assert_eq!(RigFamily::detect(["mPelvis", "mTorso"]), Some(RigFamily::Avatar));
        assert_eq!(RigFamily::detect(["a", "b", "c"]), None);
    }
}
