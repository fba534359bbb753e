//! Rig transfer: converting foreign rigs, updating rigs to a newer
//! reference skeleton, and copying rigs.
//!
//! Every mode finishes with an evaluation of the target so its geometry
//! reflects the transferred shape.

use std::collections::{BTreeMap, HashMap};

use avarig_data::skeleton::ORIGIN_BONE;
use avarig_data::RigFamily;
use glam::DVec3;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::joints::JointStore;
use crate::report::EvaluationReport;
use crate::rig::{edit_bones, RigSystem};
use crate::scene::{Armature, MeshObject, RigProps, Scene};
use crate::shape::ShapeState;

/// Relative spread of per-axis scale tolerated as uniform.
const SCALE_TOLERANCE: f64 = 1e-4;

/// Ground-plane distance below which origin and root count as aligned.
const SNAP_TOLERANCE: f64 = 1e-5;

/// How a misplaced origin is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OriginSnap {
    /// Move the object origin onto the root bone; world geometry stays.
    #[default]
    OriginToRoot,
    /// Move the skeleton and its meshes so the root lands on the origin.
    RootToOrigin,
}

/// What a transfer does.
#[derive(Debug, Clone, PartialEq)]
pub enum TransferMode {
    /// Builds an avatar rig named `target` from a foreign rig.
    ConvertForeign { target: String, bake_pose: bool },
    /// Rebuilds a rig on the configured reference skeleton. `None` updates
    /// in place.
    UpdateSameFamily { target: Option<String> },
    /// Creates independent copies of the source.
    Copy { targets: Vec<String> },
}

/// Options of a transfer.
#[derive(Debug, Clone)]
pub struct TransferOptions {
    pub mode: TransferMode,
    /// Rig configuration of newly built targets.
    pub rig: RigProps,
    pub origin_snap: OriginSnap,
    /// Proceed despite sanity issues.
    pub confirmed: bool,
}

impl TransferOptions {
    pub fn new(mode: TransferMode) -> Self {
        Self {
            mode,
            rig: RigProps::default(),
            origin_snap: OriginSnap::default(),
            confirmed: false,
        }
    }

    pub fn with_rig(mut self, rig: RigProps) -> Self {
        self.rig = rig;
        self
    }

    pub fn with_origin_snap(mut self, snap: OriginSnap) -> Self {
        self.origin_snap = snap;
        self
    }

    pub fn confirmed(mut self) -> Self {
        self.confirmed = true;
        self
    }
}

/// Outcome of a transfer.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TransferReport {
    pub targets: Vec<String>,
    pub meshes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family: Option<RigFamily>,
    /// Source bones carried onto avatar bones.
    pub mapped: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unmapped: Vec<String>,
    pub baked_vertices: usize,
    /// Ground-plane offset removed by origin snapping.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapped: Option<DVec3>,
    /// Joint offsets and pose entries of bones the target lacks.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dropped: Vec<String>,
    /// Sanity issues the caller confirmed.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<String>,
    pub evaluations: Vec<EvaluationReport>,
}

impl RigSystem {
    /// Runs a transfer from `source`.
    ///
    /// Meshes with non-uniform or negative scale make the transfer fail with
    /// [`EngineError::ConfirmationRequired`] unless `options.confirmed` is set.
    pub fn transfer(
        &self,
        scene: &mut Scene,
        source: &str,
        options: &TransferOptions,
    ) -> EngineResult<TransferReport> {
        scene.armature(source)?;
        let issues = sanity_issues(scene, source);
        if !issues.is_empty() {
            if !options.confirmed {
                return Err(EngineError::ConfirmationRequired { issues });
            }
            for issue in &issues {
                warn!("Transfer of '{}': {}", source, issue);
            }
        }

        let mut report = match &options.mode {
            TransferMode::ConvertForeign { target, bake_pose } => {
                self.convert_foreign(scene, source, target, *bake_pose, options)?
            }
            TransferMode::UpdateSameFamily { target } => {
                let target = target.as_deref().unwrap_or(source);
                self.update_same_family(scene, source, target, options)?
            }
            TransferMode::Copy { targets } => self.copy_rig(scene, source, targets, options)?,
        };
        report.issues = issues;
        info!(
            "Transferred '{}' to {:?} ({} meshes)",
            source,
            report.targets,
            report.meshes.len()
        );
        Ok(report)
    }

    fn convert_foreign(
        &self,
        scene: &mut Scene,
        source: &str,
        target: &str,
        bake_pose: bool,
        options: &TransferOptions,
    ) -> EngineResult<TransferReport> {
        let src = scene.armature(source)?;
        let family = match RigFamily::detect(src.bones().map(|b| b.name.as_str())) {
            Some(family) if !src.managed && family != RigFamily::Avatar => family,
            _ => {
                return Err(EngineError::UnsupportedFamily {
                    armature: source.to_string(),
                })
            }
        };
        let mut report = TransferReport {
            family: Some(family),
            ..TransferReport::default()
        };

        // Source side: snap, bake, collect heads, rename groups.
        let (arm, mut meshes) = scene.armature_with_children(source)?;
        report.snapped = snap_origin(arm, &mut meshes, options.origin_snap);
        if bake_pose {
            for mesh in meshes.iter_mut() {
                report.baked_vertices += bake_pose_into(arm, mesh);
            }
            arm.pose.clear();
        }
        let mut heads: HashMap<&'static str, DVec3> = HashMap::new();
        for bone in arm.bones() {
            match family.map_bone(&bone.name) {
                Some(avatar) => {
                    heads.insert(avatar, arm.to_world(bone.head));
                }
                None => report.unmapped.push(bone.name.clone()),
            }
        }
        let (location, scale) = (arm.location, arm.scale);
        for mesh in meshes.iter_mut() {
            let unmapped = rename_groups(mesh, family);
            if !unmapped.is_empty() {
                warn!(
                    "Mesh '{}': groups {:?} have no avatar counterpart",
                    mesh.name, unmapped
                );
            }
            report.meshes.push(mesh.name.clone());
        }

        // Target side.
        self.create_armature(scene, target, options.rig.clone())?;
        let arm = scene.armature_mut(target)?;
        arm.location = location;
        arm.scale = scale;
        report.mapped = adopt_heads(arm, &heads);
        arm.shape.mark_joints_dirty();
        for name in &report.meshes {
            scene.mesh_mut(name)?.parent = Some(target.to_string());
        }

        report.targets.push(target.to_string());
        report.evaluations.push(self.evaluate(scene, target)?);
        Ok(report)
    }

    fn update_same_family(
        &self,
        scene: &mut Scene,
        source: &str,
        target: &str,
        options: &TransferOptions,
    ) -> EngineResult<TransferReport> {
        let mut report = TransferReport::default();
        if !scene.armature(source)?.managed {
            return Err(EngineError::UnsupportedFamily {
                armature: source.to_string(),
            });
        }
        {
            let (arm, mut meshes) = scene.armature_with_children(source)?;
            report.snapped = snap_origin(arm, &mut meshes, options.origin_snap);
            if report.snapped.is_some() {
                arm.shape.mark_joints_dirty();
            }
        }
        if scene.armature(source)?.shape.joints_dirty() {
            self.store_joints(scene, source)?;
        }

        let skeleton = self.skeleton(&options.rig)?;
        let src = scene.armature(source)?;
        let mut arm = Armature::new(target);
        arm.set_bones(edit_bones(&skeleton));
        arm.rig = options.rig.clone();
        arm.managed = true;
        arm.location = src.location;
        arm.scale = src.scale;
        arm.action = src.action.clone();
        arm.shape = ShapeState::from_dictionary(self.graph(), &src.shape.as_dictionary());

        let mut joints = JointStore::default();
        for (bone, offset) in src.joints.iter() {
            if skeleton.contains(bone) {
                joints.insert(bone, *offset);
            } else {
                report.dropped.push(bone.to_string());
            }
        }
        arm.joints = joints;
        for (bone, pose) in &src.pose {
            if skeleton.contains(bone) {
                arm.pose.insert(bone.clone(), *pose);
            } else if !report.dropped.contains(bone) {
                report.dropped.push(bone.clone());
            }
        }
        if !report.dropped.is_empty() {
            warn!(
                "Update of '{}': {} bones are not part of the {} skeleton",
                source,
                report.dropped.len(),
                skeleton.rig_type.as_str()
            );
        }

        let children = scene.children(source);
        if target != source {
            for name in &children {
                scene.mesh_mut(name)?.parent = Some(target.to_string());
            }
        }
        scene.add_armature(arm);
        report.meshes = children;
        report.targets.push(target.to_string());
        report.evaluations.push(self.evaluate(scene, target)?);
        Ok(report)
    }

    fn copy_rig(
        &self,
        scene: &mut Scene,
        source: &str,
        targets: &[String],
        options: &TransferOptions,
    ) -> EngineResult<TransferReport> {
        let mut report = TransferReport::default();
        let original = scene.armature(source)?.clone();
        let children: Vec<MeshObject> = scene
            .children(source)
            .iter()
            .filter_map(|name| scene.mesh(name).ok().cloned())
            .collect();

        for target in targets {
            if target == source || scene.has_armature(target) {
                warn!("Copy target '{}' already exists; skipped", target);
                continue;
            }
            let mut copy = original.clone();
            copy.name = target.clone();
            scene.add_armature(copy);
            for mesh in &children {
                let mut mesh = mesh.clone();
                mesh.name = copy_name(&mesh.name, source, target);
                mesh.parent = Some(target.clone());
                report.meshes.push(mesh.name.clone());
                scene.add_mesh(mesh);
            }

            let (arm, mut meshes) = scene.armature_with_children(target)?;
            let snapped = snap_origin(arm, &mut meshes, options.origin_snap);
            if snapped.is_some() && arm.managed {
                arm.shape.mark_joints_dirty();
            }
            report.snapped = report.snapped.or(snapped);
            report.targets.push(target.clone());
            report.evaluations.push(self.evaluate(scene, target)?);
        }
        Ok(report)
    }
}

/// Sanity issues of the meshes parented to an armature.
pub fn sanity_issues(scene: &Scene, armature: &str) -> Vec<String> {
    let mut issues = Vec::new();
    for name in scene.children(armature) {
        let Ok(mesh) = scene.mesh(&name) else { continue };
        let scale = mesh.object_scale();
        if scale.min_element() < 0.0 {
            issues.push(format!("Mesh '{}' has a negative scale {:?}", name, scale.to_array()));
        } else if scale.max_element() - scale.min_element() > SCALE_TOLERANCE * scale.max_element() {
            issues.push(format!("Mesh '{}' is scaled non-uniformly {:?}", name, scale.to_array()));
        }
    }
    issues
}

/// Root bone used for origin checks.
fn root_bone(armature: &Armature) -> Option<DVec3> {
    armature
        .bone(ORIGIN_BONE)
        .or_else(|| armature.roots().next())
        .map(|b| b.head)
}

/// Aligns the root bone with the object origin on the ground plane.
/// Returns the removed offset in armature space.
pub fn snap_origin(
    armature: &mut Armature,
    meshes: &mut [&mut MeshObject],
    snap: OriginSnap,
) -> Option<DVec3> {
    let head = root_bone(armature)?;
    let offset = DVec3::new(head.x, head.y, 0.0);
    if offset.length() <= SNAP_TOLERANCE {
        return None;
    }
    for bone in armature.bones_mut() {
        bone.head -= offset;
        bone.tail -= offset;
    }
    for mesh in meshes.iter_mut() {
        mesh.transform.translation -= offset;
    }
    if snap == OriginSnap::OriginToRoot {
        armature.location += armature.scale * offset;
    }
    info!(
        "Snapped '{}' by {:?} ({:?})",
        armature.name,
        offset.to_array(),
        snap
    );
    Some(offset)
}

/// Applies the armature pose to the mesh vertices by linear blend skinning.
/// Returns the number of moved vertices.
pub fn bake_pose_into(armature: &Armature, mesh: &mut MeshObject) -> usize {
    if armature.pose.values().all(|p| p.is_rest()) {
        return 0;
    }
    let matrices = armature.pose_matrices();
    let mut moved = 0;
    let baked: Vec<DVec3> = mesh
        .vertices
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            let entries: Vec<(f64, _)> = mesh
                .weights
                .get(i)
                .into_iter()
                .flatten()
                .filter_map(|&(g, w)| {
                    let m = matrices.get(mesh.groups.get(g)?)?;
                    (w > 0.0).then_some((w, *m))
                })
                .collect();
            let total: f64 = entries.iter().map(|(w, _)| w).sum();
            if total <= f64::EPSILON {
                return v;
            }
            let p = mesh.to_armature(v);
            let posed = entries
                .iter()
                .fold(DVec3::ZERO, |acc, (w, m)| acc + m.transform_point3(p) * (*w / total));
            moved += 1;
            mesh.from_armature(posed)
        })
        .collect();
    mesh.vertices = baked;
    moved
}

/// Renames vertex groups onto avatar bones, merging groups that map to the
/// same bone. Returns the groups left unmapped.
pub fn rename_groups(mesh: &mut MeshObject, family: RigFamily) -> Vec<String> {
    let mut groups: Vec<String> = Vec::with_capacity(mesh.groups.len());
    let mut unmapped = Vec::new();
    let remap: Vec<usize> = mesh
        .groups
        .iter()
        .map(|group| {
            let name = match family.map_bone(group) {
                Some(avatar) => avatar.to_string(),
                None => {
                    unmapped.push(group.clone());
                    group.clone()
                }
            };
            match groups.iter().position(|g| *g == name) {
                Some(i) => i,
                None => {
                    groups.push(name);
                    groups.len() - 1
                }
            }
        })
        .collect();

    for weights in mesh.weights.iter_mut() {
        let mut merged: BTreeMap<usize, f64> = BTreeMap::new();
        for &(g, w) in weights.iter() {
            if let Some(&to) = remap.get(g) {
                *merged.entry(to).or_default() += w;
            }
        }
        *weights = merged.into_iter().collect();
    }
    mesh.groups = groups;
    unmapped
}

/// Moves avatar bones onto foreign world heads. Unmapped bones follow
/// their parent. Returns the number of adopted heads.
fn adopt_heads(armature: &mut Armature, heads: &HashMap<&'static str, DVec3>) -> usize {
    let (location, scale) = (armature.location, armature.scale);
    let mut shifts: HashMap<String, DVec3> = HashMap::new();
    let mut adopted = 0;
    for bone in armature.bones_mut() {
        let shift = match heads.get(bone.name.as_str()) {
            Some(world) => {
                adopted += 1;
                (*world - location) / scale - bone.head
            }
            None => bone
                .parent
                .as_ref()
                .and_then(|p| shifts.get(p))
                .copied()
                .unwrap_or(DVec3::ZERO),
        };
        bone.head += shift;
        bone.tail += shift;
        shifts.insert(bone.name.clone(), shift);
    }
    adopted
}

fn copy_name(mesh: &str, source: &str, target: &str) -> String {
    match mesh.strip_prefix(source).and_then(|rest| rest.strip_prefix('.')) {
        Some(rest) => format!("{}.{}", target, rest),
        None => format!("{}.{}", mesh, target),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{EditBone, PoseBone};
    use glam::{DAffine3, DQuat};
    use pretty_assertions::assert_eq;

    fn close(a: DVec3, b: DVec3) -> bool {
        (a - b).length() < 1e-9
    }

    fn foreign() -> Armature {
        let mut arm = Armature::new("Foreign");
        arm.add_bone(EditBone::new("hips", DVec3::new(0.0, 0.0, 1.0), DVec3::new(0.0, 0.0, 1.1)));
        arm.add_bone(
            EditBone::new("spine", DVec3::new(0.0, 0.0, 1.1), DVec3::new(0.0, 0.0, 1.3)).with_parent("hips"),
        );
        arm
    }

    // ========================================================================
    // Sanity checks
    // ========================================================================

    #[test]
    fn test_sanity_flags_scale() {
        let mut scene = Scene::new();
        scene.add_armature(foreign());
        let mut mirrored = MeshObject::new("Mirrored", vec![DVec3::ZERO]).with_parent("Foreign");
        mirrored.transform = DAffine3::from_scale(DVec3::new(-1.0, 1.0, 1.0));
        let mut squashed = MeshObject::new("Squashed", vec![DVec3::ZERO]).with_parent("Foreign");
        squashed.transform = DAffine3::from_scale(DVec3::new(1.0, 1.0, 0.5));
        let mut fine = MeshObject::new("Fine", vec![DVec3::ZERO]).with_parent("Foreign");
        fine.transform = DAffine3::from_scale(DVec3::splat(2.0));
        scene.add_mesh(mirrored);
        scene.add_mesh(squashed);
        scene.add_mesh(fine);

        let issues = sanity_issues(&scene, "Foreign");
        assert_eq!(issues.len(), 2);
        assert!(issues[0].contains("Mirrored") && issues[0].contains("negative"));
        assert!(issues[1].contains("Squashed") && issues[1].contains("non-uniformly"));
    }

    // ========================================================================
    // Origin snapping
    // ========================================================================

    #[test]
    fn test_snap_origin_to_root_keeps_world_geometry() {
        let mut arm = foreign();
        for bone in arm.bones_mut() {
            bone.head += DVec3::new(0.5, 0.0, 0.0);
            bone.tail += DVec3::new(0.5, 0.0, 0.0);
        }
        let mut mesh = MeshObject::new("Body", vec![DVec3::new(0.5, 0.0, 1.0)]);
        let world_before = arm.to_world(mesh.to_armature(mesh.vertices[0]));

        let offset = snap_origin(&mut arm, &mut [&mut mesh], OriginSnap::OriginToRoot).unwrap();
        assert!(close(offset, DVec3::new(0.5, 0.0, 0.0)));
        assert!(close(arm.bone("hips").unwrap().head, DVec3::new(0.0, 0.0, 1.0)));
        let world_after = arm.to_world(mesh.to_armature(mesh.vertices[0]));
        assert!(close(world_before, world_after));
    }

    #[test]
    fn test_snap_root_to_origin_moves_geometry() {
        let mut arm = foreign();
        for bone in arm.bones_mut() {
            bone.head.y += 0.25;
            bone.tail.y += 0.25;
        }
        let mut mesh = MeshObject::new("Body", vec![DVec3::new(0.0, 0.25, 1.0)]);
        snap_origin(&mut arm, &mut [&mut mesh], OriginSnap::RootToOrigin).unwrap();
        assert_eq!(arm.location, DVec3::ZERO);
        assert!(close(mesh.to_armature(mesh.vertices[0]), DVec3::new(0.0, 0.0, 1.0)));
    }

    #[test]
    fn test_snap_ignores_height() {
        let mut arm = foreign();
        assert_eq!(snap_origin(&mut arm, &mut [], OriginSnap::OriginToRoot), None);
    }

    // ========================================================================
    // Groups and pose baking
    // ========================================================================

    #[test]
    fn test_rename_groups_merges_duplicates() {
        let mut mesh = MeshObject::new("Body", vec![DVec3::ZERO, DVec3::X]);
        mesh.assign(0, "mixamorig:Hips", 0.5);
        mesh.assign(0, "Hips", 0.25);
        mesh.assign(1, "Prop", 1.0);

        let unmapped = rename_groups(&mut mesh, RigFamily::Mixamo);
        assert_eq!(unmapped, vec!["Prop".to_string()]);
        assert_eq!(mesh.groups, vec!["mPelvis".to_string(), "Prop".to_string()]);
        assert_eq!(mesh.weights[0], vec![(0, 0.75)]);
        assert_eq!(mesh.weights[1], vec![(1, 1.0)]);
    }

    #[test]
    fn test_bake_pose_rotates_weighted_vertices() {
        let mut arm = foreign();
        arm.pose.insert(
            "spine".into(),
            PoseBone {
                rotation: DQuat::from_rotation_x(std::f64::consts::FRAC_PI_2),
                ..PoseBone::default()
            },
        );
        let mut mesh = MeshObject::new("Body", vec![DVec3::new(0.0, 0.0, 1.3), DVec3::new(0.0, 0.0, 2.0)]);
        mesh.assign(0, "spine", 1.0);

        assert_eq!(bake_pose_into(&arm, &mut mesh), 1);
        // Rotated a quarter turn about X around the spine head.
        assert!(close(mesh.vertices[0], DVec3::new(0.0, -0.2, 1.1)));
        assert_eq!(mesh.vertices[1], DVec3::new(0.0, 0.0, 2.0));
    }

    #[test]
    fn test_bake_rest_pose_is_noop() {
        let arm = foreign();
        let mut mesh = MeshObject::new("Body", vec![DVec3::Z]);
        mesh.assign_all("hips", 1.0);
        assert_eq!(bake_pose_into(&arm, &mut mesh), 0);
    }

    #[test]
    fn test_adopt_heads_carries_children() {
        let mut arm = Armature::new("Avatar");
        arm.add_bone(EditBone::new("mPelvis", DVec3::new(0.0, 0.0, 1.0), DVec3::new(0.0, 0.0, 1.1)));
        arm.add_bone(
            EditBone::new("mTorso", DVec3::new(0.0, 0.0, 1.1), DVec3::new(0.0, 0.0, 1.3)).with_parent("mPelvis"),
        );
        let heads: HashMap<&'static str, DVec3> = [("mPelvis", DVec3::new(0.0, 0.0, 0.9))].into_iter().collect();
        assert_eq!(adopt_heads(&mut arm, &heads), 1);
        assert!(close(arm.bone("mTorso").unwrap().head, DVec3::new(0.0, 0.0, 1.0)));
    }

    #[test]
    fn test_copy_name() {
        assert_eq!(copy_name("Avatar.headMesh", "Avatar", "Twin"), "Twin.headMesh");
        assert_eq!(copy_name("Shirt", "Avatar", "Twin"), "Shirt.Twin");
    }
}
