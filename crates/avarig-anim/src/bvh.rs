//! BVH motion export.
//!
//! The hierarchy is written Y up facing +Z with offsets in inches, the
//! convention motion files for the avatar are read in.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use avarig_data::{BoneKind, Skeleton};
use glam::{DVec3, EulerRot, Quat, Vec3};
use log::debug;

use crate::clip::AnimClip;
use crate::error::{AnimError, AnimResult};

/// Metres to inches.
pub const METRES_TO_INCHES: f64 = 39.3701;

/// Default sampling rate.
pub const DEFAULT_FPS: f32 = 30.0;

/// Converts a rig-frame vector (Z up, facing -Y) into BVH axes.
pub fn to_bvh_axes(v: DVec3) -> DVec3 {
    DVec3::new(v.x, v.z, -v.y)
}

/// Converts a rig-frame rotation into BVH axes.
pub fn rotation_to_bvh_axes(q: Quat) -> Quat {
    Quat::from_xyzw(q.x, q.z, -q.y, q.w)
}

/// One joint of the exported hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub struct BvhJoint {
    /// Name written into the file.
    pub name: String,
    /// Bone the joint was built from; clip tracks are matched on it.
    pub source: String,
    pub parent: Option<usize>,
    /// Offset from the parent joint in BVH axes and inches.
    pub offset: DVec3,
    /// End site offset for joints without children.
    pub end_site: Option<DVec3>,
}

/// A BVH hierarchy, parents before children.
#[derive(Debug, Clone, PartialEq)]
pub struct BvhSkeleton {
    pub joints: Vec<BvhJoint>,
}

impl BvhSkeleton {
    /// Builds the hierarchy from the deform bones of a reference skeleton.
    ///
    /// A bone whose parent is not exported hangs from its nearest exported
    /// ancestor.
    pub fn from_skeleton(skeleton: &Skeleton) -> AnimResult<Self> {
        let rest = skeleton.rest_positions();
        let mut bones = Vec::new();
        for bone in skeleton.bones().filter(|b| b.kind == BoneKind::Deform) {
            let mut parent = bone.parent.as_deref();
            while let Some(p) = parent {
                match skeleton.get(p) {
                    Some(b) if b.kind == BoneKind::Deform => break,
                    Some(b) => parent = b.parent.as_deref(),
                    None => parent = None,
                }
            }
            let Some(&(head, tail)) = rest.get(&bone.name) else {
                continue;
            };
            let name = bone
                .bvh_name
                .clone()
                .unwrap_or_else(|| bone.name.trim_start_matches('m').to_string());
            bones.push(BoneInput {
                name,
                source: bone.name.clone(),
                parent: parent.map(str::to_string),
                head,
                tail,
            });
        }
        Self::from_bones(&bones)
    }

    /// Builds the hierarchy from explicit armature-space heads and tails,
    /// listed parents first. Extra roots are attached to the first one.
    pub fn from_bones(bones: &[BoneInput]) -> AnimResult<Self> {
        if bones.is_empty() {
            return Err(AnimError::EmptySkeleton);
        }
        let mut joints: Vec<BvhJoint> = Vec::with_capacity(bones.len());
        for (i, bone) in bones.iter().enumerate() {
            let parent = match bone.parent.as_deref() {
                _ if i == 0 => None,
                Some(p) => bones[..i].iter().position(|b| b.source == p).or(Some(0)),
                None => Some(0),
            };
            let origin = parent.map_or(DVec3::ZERO, |p| bones[p].head);
            joints.push(BvhJoint {
                name: bone.name.clone(),
                source: bone.source.clone(),
                parent,
                offset: to_bvh_axes(bone.head - origin) * METRES_TO_INCHES,
                end_site: None,
            });
        }
        for i in 0..joints.len() {
            if !joints.iter().any(|j| j.parent == Some(i)) {
                joints[i].end_site = Some(to_bvh_axes(bones[i].tail - bones[i].head) * METRES_TO_INCHES);
            }
        }
        Ok(Self { joints })
    }

    /// Children of a joint, in file order.
    pub fn children(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        self.joints
            .iter()
            .enumerate()
            .filter(move |(_, j)| j.parent == Some(index))
            .map(|(i, _)| i)
    }

    /// Joint indices in the order the hierarchy is written.
    pub fn write_order(&self) -> Vec<usize> {
        let mut out = Vec::with_capacity(self.joints.len());
        if self.joints.is_empty() {
            return out;
        }
        let mut stack = vec![0];
        while let Some(i) = stack.pop() {
            out.push(i);
            let children: Vec<usize> = self.children(i).collect();
            stack.extend(children.into_iter().rev());
        }
        out
    }
}

/// Input bone for [`BvhSkeleton::from_bones`].
#[derive(Debug, Clone, PartialEq)]
pub struct BoneInput {
    pub name: String,
    pub source: String,
    pub parent: Option<String>,
    pub head: DVec3,
    pub tail: DVec3,
}

/// Sampled motion, one row per frame in [`BvhSkeleton::write_order`].
#[derive(Debug, Clone, PartialEq)]
pub struct BvhMotion {
    pub frame_time: f32,
    pub frames: Vec<Vec<f64>>,
}

impl BvhMotion {
    /// Samples a clip. With `translations` the root carries the clip's
    /// location keys, otherwise it stays at its rest offset.
    pub fn from_clip(skeleton: &BvhSkeleton, clip: &AnimClip, fps: f32, translations: bool) -> Self {
        let fps = if fps > 0.0 { fps } else { DEFAULT_FPS };
        let count = (clip.duration.max(0.0) * fps).floor() as usize + 1;
        let order = skeleton.write_order();
        let mut frames = Vec::with_capacity(count);

        for frame in 0..count {
            let time = frame as f32 / fps;
            let mut row = Vec::with_capacity(3 + order.len() * 3);
            for &i in &order {
                let joint = &skeleton.joints[i];
                let track = clip.joint(&joint.source);
                if joint.parent.is_none() {
                    let moved = match track {
                        Some(t) if translations => t.position_at(time),
                        _ => Vec3::ZERO,
                    };
                    let position = joint.offset + to_bvh_axes(moved.as_dvec3()) * METRES_TO_INCHES;
                    row.extend(position.to_array());
                }
                let rotation = track.map_or(Quat::IDENTITY, |t| t.rotation_at(time));
                let (x, y, z) = rotation_to_bvh_axes(rotation).to_euler(EulerRot::XYZ);
                row.extend([x, y, z].map(|a| f64::from(a).to_degrees()));
            }
            frames.push(row);
        }
        Self {
            frame_time: 1.0 / fps,
            frames,
        }
    }
}

/// Renders a BVH document.
pub fn to_bvh_string(skeleton: &BvhSkeleton, motion: &BvhMotion) -> String {
    let mut out = String::from("HIERARCHY\n");
    if !skeleton.joints.is_empty() {
        write_joint(&mut out, skeleton, 0, 0);
    }
    let _ = writeln!(out, "MOTION");
    let _ = writeln!(out, "Frames: {}", motion.frames.len());
    let _ = writeln!(out, "Frame Time: {:.6}", motion.frame_time);
    for row in &motion.frames {
        let line: Vec<String> = row.iter().map(|v| format!("{:.6}", v)).collect();
        let _ = writeln!(out, "{}", line.join(" "));
    }
    out
}

fn write_joint(out: &mut String, skeleton: &BvhSkeleton, index: usize, depth: usize) {
    let joint = &skeleton.joints[index];
    let pad = "\t".repeat(depth);
    let keyword = if joint.parent.is_none() { "ROOT" } else { "JOINT" };
    let _ = writeln!(out, "{pad}{keyword} {}", joint.name);
    let _ = writeln!(out, "{pad}{{");
    let _ = writeln!(out, "{pad}\tOFFSET {}", format_vec(joint.offset));
    if joint.parent.is_none() {
        let _ = writeln!(
            out,
            "{pad}\tCHANNELS 6 Xposition Yposition Zposition Xrotation Yrotation Zrotation"
        );
    } else {
        let _ = writeln!(out, "{pad}\tCHANNELS 3 Xrotation Yrotation Zrotation");
    }
    let children: Vec<usize> = skeleton.children(index).collect();
    for child in children {
        write_joint(out, skeleton, child, depth + 1);
    }
    if let Some(end) = joint.end_site {
        let _ = writeln!(out, "{pad}\tEnd Site");
        let _ = writeln!(out, "{pad}\t{{");
        let _ = writeln!(out, "{pad}\t\tOFFSET {}", format_vec(end));
        let _ = writeln!(out, "{pad}\t}}");
    }
    let _ = writeln!(out, "{pad}}}");
}

fn format_vec(v: DVec3) -> String {
    format!("{:.6} {:.6} {:.6}", v.x, v.y, v.z)
}

/// Samples `clip` and writes a BVH file.
pub fn write_bvh(
    path: &Path,
    skeleton: &BvhSkeleton,
    clip: &AnimClip,
    fps: f32,
    translations: bool,
) -> AnimResult<()> {
    let motion = BvhMotion::from_clip(skeleton, clip, fps, translations);
    fs::write(path, to_bvh_string(skeleton, &motion))?;
    debug!(
        "Wrote {} joints and {} frames to {}",
        skeleton.joints.len(),
        motion.frames.len(),
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::JointTrack;
    use pretty_assertions::assert_eq;

    fn chain() -> BvhSkeleton {
        let bone = |name: &str, parent: Option<&str>, head: DVec3, tail: DVec3| BoneInput {
            name: name.trim_start_matches('m').to_string(),
            source: name.to_string(),
            parent: parent.map(str::to_string),
            head,
            tail,
        };
        BvhSkeleton::from_bones(&[
            bone("mPelvis", None, DVec3::new(0.0, 0.0, 1.0), DVec3::new(0.0, 0.0, 1.1)),
            bone("mTorso", Some("mPelvis"), DVec3::new(0.0, 0.0, 1.1), DVec3::new(0.0, 0.0, 1.3)),
            bone("mHipLeft", Some("mPelvis"), DVec3::new(0.1, 0.0, 1.0), DVec3::new(0.1, 0.0, 0.5)),
        ])
        .unwrap()
    }

    #[test]
    fn test_axes_conversion() {
        assert_eq!(to_bvh_axes(DVec3::new(1.0, 2.0, 3.0)), DVec3::new(1.0, 3.0, -2.0));
        let q = Quat::from_rotation_z(0.5);
        let converted = rotation_to_bvh_axes(q);
        assert!(converted.angle_between(Quat::from_rotation_y(0.5)) < 1e-6);
    }

    #[test]
    fn test_offsets_in_inches() {
        let skel = chain();
        assert_eq!(skel.joints[0].parent, None);
        assert!((skel.joints[0].offset.y - METRES_TO_INCHES).abs() < 1e-9);
        assert!((skel.joints[1].offset.y - 0.1 * METRES_TO_INCHES).abs() < 1e-9);
        assert!(skel.joints[0].end_site.is_none());
        let end = skel.joints[2].end_site.unwrap();
        assert!((end.y + 0.5 * METRES_TO_INCHES).abs() < 1e-9);
    }

    #[test]
    fn test_motion_rows() {
        let skel = chain();
        let clip = AnimClip::new(1.0).with_joint(
            JointTrack::new("mTorso")
                .with_rotation(0.0, Quat::IDENTITY)
                .with_rotation(1.0, Quat::from_rotation_x(0.5)),
        );
        let motion = BvhMotion::from_clip(&skel, &clip, 10.0, false);
        assert_eq!(motion.frames.len(), 11);
        assert_eq!(motion.frames[0].len(), 6 + 3 + 3);
        let last = &motion.frames[10];
        assert!((last[6] - 0.5f64.to_degrees()).abs() < 1e-3);
        assert_eq!(last[0..3].to_vec(), skel.joints[0].offset.to_array().to_vec());
    }

    #[test]
    fn test_empty_skeleton() {
        assert!(matches!(BvhSkeleton::from_bones(&[]), Err(AnimError::EmptySkeleton)));
    }
}
