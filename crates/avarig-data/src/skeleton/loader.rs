//! Skeleton definition loader.
//!
//! Reads a `<linden_skeleton>` document, converts every triple into the rig
//! frame, and hands the bone table to the synthesis pass which adds control,
//! structural, and IK bones.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use glam::DVec3;
use log::{debug, warn};

use super::{layer, Bone, BoneGroup, BoneKind, JointType, RigType, Skeleton, Support, ORIGIN_BONE, ROOT_DEFORM_BONE};
use crate::axis::{parse_bool, s2b, s2b_euler_degrees, s2b_scale};
use crate::error::{DataError, DataResult};
use crate::xml_tree::{self, Element};

/// Root tags accepted for skeleton documents.
const ROOT_TAGS: [&str; 2] = ["linden_skeleton", "skeleton"];

/// Custom shape assigned to collision volumes.
pub const VOLUME_SHAPE: &str = "CustomShape_Volume";

/// Loads a skeleton from a file on disk.
pub fn load_skeleton_file(path: &Path, rig: RigType, joint: JointType) -> DataResult<Skeleton> {
    let text = fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => DataError::SkeletonFileMissing {
            path: path.to_path_buf(),
        },
        _ => DataError::Io(e),
    })?;
    load_skeleton_str(&text, rig, joint)
}

/// Loads a skeleton from an in-memory document.
pub fn load_skeleton_str(text: &str, rig: RigType, joint: JointType) -> DataResult<Skeleton> {
    let root = xml_tree::parse_str(text).map_err(|e| match e {
        DataError::Xml(inner) => DataError::skeleton_parse(inner.to_string()),
        other => other,
    })?;
    load_skeleton(&root, rig, joint)
}

/// Builds a skeleton from a parsed document.
pub fn load_skeleton(root: &Element, rig: RigType, joint: JointType) -> DataResult<Skeleton> {
    if !ROOT_TAGS.contains(&root.name.as_str()) {
        return Err(DataError::skeleton_parse(format!(
            "unexpected root element <{}>",
            root.name
        )));
    }
    let has_root = root
        .children_named("bone")
        .any(|b| b.attr("name") == Some(ROOT_DEFORM_BONE));
    if !has_root {
        return Err(DataError::MissingRootBone {
            name: ROOT_DEFORM_BONE.to_string(),
        });
    }

    let mut skeleton = Skeleton::new(rig, joint);
    let mut origin = Bone::new(ORIGIN_BONE, BoneKind::Structure, BoneGroup::Structure)
        .with_offsets(DVec3::ZERO, DVec3::new(0.0, 0.1, 0.0));
    origin.mandatory = true;
    skeleton.insert(origin);

    let mut loader = Loader {
        rig,
        joint,
        skeleton,
    };
    for bone in root.children_named("bone") {
        loader.walk_bone(bone, ORIGIN_BONE, DVec3::ZERO)?;
    }
    let mut skeleton = loader.skeleton;

    super::synth::finish_tails(&mut skeleton);
    for point in root.children_named("attachment_point") {
        add_attachment(&mut skeleton, point)?;
    }
    super::synth::synthesize(&mut skeleton);

    debug!(
        "Loaded {} skeleton ({}) with {} bones",
        rig.as_str(),
        joint.as_str(),
        skeleton.len()
    );
    Ok(skeleton)
}

struct Loader {
    rig: RigType,
    joint: JointType,
    skeleton: Skeleton,
}

impl Loader {
    fn joint_location(&self, el: &Element) -> DataResult<DVec3> {
        let (first, second) = match self.joint {
            JointType::Pos => ("pos", "pivot"),
            JointType::Pivot => ("pivot", "pos"),
        };
        let value = match el.vec3(first)? {
            Some(v) => Some(v),
            None => el.vec3(second)?,
        };
        Ok(s2b(value.unwrap_or(DVec3::ZERO)))
    }

    /// Walks a `<bone>` element. `carry` accumulates the offsets of skipped
    /// extended ancestors so their children keep their world location.
    fn walk_bone(&mut self, el: &Element, parent: &str, carry: DVec3) -> DataResult<()> {
        let name = el
            .attr("name")
            .ok_or_else(|| DataError::skeleton_parse("bone without a name"))?;
        let support = parse_support(el.attr("support"));
        let relhead = carry + self.joint_location(el)?;

        if self.rig == RigType::Basic && support == Support::Extended {
            for volume in el.children_named("collision_volume") {
                self.add_volume(volume, parent, relhead)?;
            }
            for child in el.children_named("bone") {
                self.walk_bone(child, parent, relhead)?;
            }
            return Ok(());
        }

        let hint = el.attr("group").unwrap_or("");
        let end = s2b(el.vec3("end")?.unwrap_or(DVec3::new(0.0, 0.0, 0.1)));
        let mut bone = Bone::new(name, BoneKind::Deform, group_from_hint(hint))
            .with_parent(parent)
            .with_offsets(relhead, end);
        bone.support = support;
        bone.connected_hint = el.attr("connected").map(parse_bool);
        bone.layers |= family_layer(hint);
        bone.rot0 = s2b_euler_degrees(el.vec3("rot")?.unwrap_or(DVec3::ZERO));
        bone.scale0 = s2b_scale(el.vec3("scale")?.unwrap_or(DVec3::ONE));
        bone.mandatory = support == Support::Basic;
        self.skeleton.insert(bone);

        for volume in el.children_named("collision_volume") {
            self.add_volume(volume, name, DVec3::ZERO)?;
        }
        for child in el.children_named("bone") {
            self.walk_bone(child, name, DVec3::ZERO)?;
        }
        Ok(())
    }

    fn add_volume(&mut self, el: &Element, parent: &str, carry: DVec3) -> DataResult<()> {
        let name = el
            .attr("name")
            .ok_or_else(|| DataError::skeleton_parse("collision volume without a name"))?;
        let pos = s2b(el.vec3("pos")?.unwrap_or(DVec3::ZERO));
        let scale = s2b_scale(el.vec3("scale")?.unwrap_or(DVec3::ONE));
        let mut bone = Bone::new(name, BoneKind::Volume, BoneGroup::Collision)
            .with_parent(parent)
            .with_offsets(carry + pos, DVec3::new(0.0, 0.0, scale.z));
        bone.rot0 = s2b_euler_degrees(el.vec3("rot")?.unwrap_or(DVec3::ZERO));
        bone.scale0 = scale;
        bone.support = parse_support(el.attr("support"));
        bone.custom_shape = Some(VOLUME_SHAPE.to_string());
        self.skeleton.insert(bone);
        Ok(())
    }
}

fn add_attachment(skeleton: &mut Skeleton, el: &Element) -> DataResult<()> {
    let label = el
        .attr("name")
        .ok_or_else(|| DataError::skeleton_parse("attachment point without a name"))?;
    let joint = el.attr("joint").unwrap_or(ROOT_DEFORM_BONE);
    if !skeleton.contains(joint) {
        warn!(
            "Attachment point '{}' refers to missing joint '{}', skipped",
            label, joint
        );
        return Ok(());
    }
    let pos = s2b(el.vec3("position")?.unwrap_or(DVec3::ZERO));
    let mut bone = Bone::new(format!("a{}", label), BoneKind::Attachment, BoneGroup::Attachment)
        .with_parent(joint)
        .with_offsets(pos, DVec3::new(0.0, 0.0, 0.03));
    bone.rot0 = s2b_euler_degrees(el.vec3("rotation")?.unwrap_or(DVec3::ZERO));
    skeleton.insert(bone);
    Ok(())
}

fn parse_support(value: Option<&str>) -> Support {
    match value {
        Some("extended") => Support::Extended,
        _ => Support::Basic,
    }
}

pub(crate) fn group_from_hint(hint: &str) -> BoneGroup {
    match hint {
        "Torso" => BoneGroup::Torso,
        "Arms" => BoneGroup::Arms,
        "Legs" => BoneGroup::Legs,
        "Collision" => BoneGroup::Collision,
        _ => BoneGroup::Extra,
    }
}

fn family_layer(hint: &str) -> u32 {
    match hint {
        "Torso" => layer::TORSO,
        "Arms" => layer::ARMS,
        "Legs" => layer::LEGS,
        "Eyes" => layer::EYES,
        "Spine" => layer::SPINE,
        "Face" => layer::FACE,
        "Hand" => layer::HAND,
        "Wing" => layer::WING,
        "Tail" => layer::TAIL,
        "Hind" => layer::HIND,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINI: &str = r#"<linden_skeleton>
        <bone name="mPelvis" support="base" pos="0 0 1" pivot="0 0 1.1" end="0 0 0.1">
          <collision_volume name="PELVIS" pos="0 0 0" rot="0 0 0" scale="0.1 0.2 0.3"/>
          <bone name="mSpine1" support="extended" pos="0 0 0.1" end="0 0 -0.1">
            <bone name="mSpine2" support="extended" pos="0 0 -0.1" end="0 0 0.1">
              <bone name="mTorso" group="Torso" support="base" pos="0 0 0.1" end="0 0 0.2"/>
            </bone>
          </bone>
        </bone>
        <attachment_point id="1" name="Pelvis" joint="mPelvis" position="0 0 -0.1" rotation="0 0 0"/>
        <attachment_point id="2" name="Wing" joint="mWing1Left" position="0 0 0" rotation="0 0 0"/>
    </linden_skeleton>"#;

    #[test]
    fn test_basic_load_collapses_extended_chain() {
        let skel = load_skeleton_str(MINI, RigType::Basic, JointType::Pos).unwrap();
        assert!(!skel.contains("mSpine1"));
        let torso = skel.get("mTorso").unwrap();
        assert_eq!(torso.parent.as_deref(), Some("mPelvis"));
        assert!((torso.relhead - DVec3::new(0.0, 0.0, 0.1)).length() < 1e-12);
    }

    #[test]
    fn test_extended_load_keeps_chain() {
        let skel = load_skeleton_str(MINI, RigType::Extended, JointType::Pos).unwrap();
        assert_eq!(skel.get("mTorso").unwrap().parent.as_deref(), Some("mSpine2"));
        assert_eq!(skel.get("mSpine1").unwrap().support, Support::Extended);
    }

    #[test]
    fn test_joint_type_selects_attribute() {
        let pos = load_skeleton_str(MINI, RigType::Basic, JointType::Pos).unwrap();
        let pivot = load_skeleton_str(MINI, RigType::Basic, JointType::Pivot).unwrap();
        assert_eq!(pos.get("mPelvis").unwrap().relhead.z, 1.0);
        assert_eq!(pivot.get("mPelvis").unwrap().relhead.z, 1.1);
        // mTorso has no pivot attribute and falls back to pos.
        assert!((pivot.get("mTorso").unwrap().relhead.z - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_volume_tail_uses_scale() {
        let skel = load_skeleton_str(MINI, RigType::Basic, JointType::Pos).unwrap();
        let volume = skel.get("PELVIS").unwrap();
        assert_eq!(volume.kind, BoneKind::Volume);
        assert_eq!(volume.reltail, DVec3::new(0.0, 0.0, 0.3));
        assert_eq!(volume.scale0, DVec3::new(0.2, 0.1, 0.3));
        assert_eq!(volume.custom_shape.as_deref(), Some(VOLUME_SHAPE));
    }

    #[test]
    fn test_attachment_on_missing_joint_is_skipped() {
        let skel = load_skeleton_str(MINI, RigType::Basic, JointType::Pos).unwrap();
        assert!(skel.contains("aPelvis"));
        assert!(!skel.contains("aWing"));
    }

    #[test]
    fn test_missing_root_bone() {
        let doc = r#"<linden_skeleton><bone name="mTorso" pos="0 0 0"/></linden_skeleton>"#;
        let err = load_skeleton_str(doc, RigType::Basic, JointType::Pos).unwrap_err();
        assert!(matches!(err, DataError::MissingRootBone { .. }));
    }

    #[test]
    fn test_wrong_root_tag() {
        let err = load_skeleton_str("<genepool/>", RigType::Basic, JointType::Pos).unwrap_err();
        assert!(matches!(err, DataError::SkeletonParseError { .. }));
    }

    #[test]
    fn test_missing_file() {
        let err = load_skeleton_file(
            Path::new("/nonexistent/avatar_skeleton.xml"),
            RigType::Basic,
            JointType::Pos,
        )
        .unwrap_err();
        assert!(matches!(err, DataError::SkeletonFileMissing { .. }));
    }
}
