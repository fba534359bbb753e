//! Host scene model.
//!
//! The engine does not own the host application's objects. It works on a
//! small in-memory scene holding armatures (edit bones plus the persisted
//! rig, shape, and joint properties) and meshes (vertices, vertex groups,
//! shape keys, and bind arrays). Hosts mirror their objects into a
//! [`Scene`] and read the results back.

use std::collections::{BTreeMap, HashMap};

use avarig_data::{BoneKind, HandPosture, JointType, RigType};
use glam::{DAffine3, DMat3, DQuat, DVec3};
use serde::{Deserialize, Serialize};

use crate::bind::BindData;
use crate::error::{EngineError, EngineResult};
use crate::joints::JointStore;
use crate::shape::ShapeState;

/// Rig-level settings persisted on the armature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RigProps {
    pub rig_type: RigType,
    pub joint_type: JointType,
    /// Bind custom meshes at the current slider shape. When unset, attached
    /// geometry is taken to be modelled on the neutral shape.
    pub use_bind_pose: bool,
    pub hand_posture: HandPosture,
    /// Apply stored joint offsets during evaluation.
    pub apply_joint_offsets: bool,
}

impl Default for RigProps {
    fn default() -> Self {
        Self {
            rig_type: RigType::Basic,
            joint_type: JointType::Pivot,
            use_bind_pose: true,
            hand_posture: HandPosture::default(),
            apply_joint_offsets: true,
        }
    }
}

/// An edit-mode bone: rest head and tail in armature space.
#[derive(Debug, Clone, PartialEq)]
pub struct EditBone {
    pub name: String,
    pub parent: Option<String>,
    pub head: DVec3,
    pub tail: DVec3,
    pub roll: f64,
    pub kind: BoneKind,
    pub deform: bool,
    pub connected: bool,
}

impl EditBone {
    /// Creates a deforming bone.
    pub fn new(name: impl Into<String>, head: DVec3, tail: DVec3) -> Self {
        Self {
            name: name.into(),
            parent: None,
            head,
            tail,
            roll: 0.0,
            kind: BoneKind::Deform,
            deform: true,
            connected: false,
        }
    }

    /// Sets the parent bone.
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }
}

/// Pose-mode transform of a bone, in armature axes about the bone head.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseBone {
    pub location: DVec3,
    pub rotation: DQuat,
    pub scale: DVec3,
}

impl Default for PoseBone {
    fn default() -> Self {
        Self {
            location: DVec3::ZERO,
            rotation: DQuat::IDENTITY,
            scale: DVec3::ONE,
        }
    }
}

impl PoseBone {
    /// True when the pose leaves the bone at rest.
    pub fn is_rest(&self) -> bool {
        self.location.length() < 1e-12
            && self.rotation.angle_between(DQuat::IDENTITY) < 1e-12
            && (self.scale - DVec3::ONE).length() < 1e-12
    }

    fn local_matrix(&self, head: DVec3) -> DAffine3 {
        DAffine3::from_translation(head + self.location)
            * DAffine3::from_mat3(DMat3::from_quat(self.rotation) * DMat3::from_diagonal(self.scale))
            * DAffine3::from_translation(-head)
    }
}

/// An armature object.
#[derive(Debug, Clone)]
pub struct Armature {
    pub name: String,
    /// Object location in world space.
    pub location: DVec3,
    /// Object scale.
    pub scale: DVec3,
    pub rig: RigProps,
    pub shape: ShapeState,
    pub joints: JointStore,
    pub pose: BTreeMap<String, PoseBone>,
    pub action: Option<String>,
    /// False for rigs imported from other tools.
    pub managed: bool,
    bones: Vec<EditBone>,
    index: HashMap<String, usize>,
}

impl Armature {
    /// Creates an empty armature.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: DVec3::ZERO,
            scale: DVec3::ONE,
            rig: RigProps::default(),
            shape: ShapeState::default(),
            joints: JointStore::default(),
            pose: BTreeMap::new(),
            action: None,
            managed: false,
            bones: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Appends a bone, replacing any bone with the same name.
    pub fn add_bone(&mut self, bone: EditBone) {
        match self.index.get(&bone.name) {
            Some(&i) => self.bones[i] = bone,
            None => {
                self.index.insert(bone.name.clone(), self.bones.len());
                self.bones.push(bone);
            }
        }
    }

    /// Replaces every bone.
    pub fn set_bones(&mut self, bones: Vec<EditBone>) {
        self.index = bones
            .iter()
            .enumerate()
            .map(|(i, b)| (b.name.clone(), i))
            .collect();
        self.bones = bones;
    }

    /// Looks up a bone.
    pub fn bone(&self, name: &str) -> Option<&EditBone> {
        self.index.get(name).map(|&i| &self.bones[i])
    }

    /// Looks up a bone for modification.
    pub fn bone_mut(&mut self, name: &str) -> Option<&mut EditBone> {
        let i = *self.index.get(name)?;
        Some(&mut self.bones[i])
    }

    /// Looks up a bone or fails with [`EngineError::UnknownBone`].
    pub fn require_bone(&self, name: &str) -> EngineResult<&EditBone> {
        self.bone(name)
            .ok_or_else(|| EngineError::unknown_bone(&self.name, name))
    }

    /// All bones in insertion order.
    pub fn bones(&self) -> impl Iterator<Item = &EditBone> {
        self.bones.iter()
    }

    /// All bones for modification.
    pub fn bones_mut(&mut self) -> impl Iterator<Item = &mut EditBone> {
        self.bones.iter_mut()
    }

    /// Number of bones.
    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    /// Head and tail of a bone.
    pub fn head_tail(&self, name: &str) -> Option<(DVec3, DVec3)> {
        self.bone(name).map(|b| (b.head, b.tail))
    }

    /// World-space location of an armature-space point.
    pub fn to_world(&self, p: DVec3) -> DVec3 {
        self.location + self.scale * p
    }

    /// Root bones (without a parent on this armature).
    pub fn roots(&self) -> impl Iterator<Item = &EditBone> {
        self.bones
            .iter()
            .filter(|b| b.parent.as_ref().map_or(true, |p| !self.index.contains_key(p)))
    }

    /// Armature-space pose matrix of every bone, parents first.
    pub fn pose_matrices(&self) -> HashMap<String, DAffine3> {
        let mut out: HashMap<String, DAffine3> = HashMap::with_capacity(self.bones.len());
        let mut pending: Vec<&EditBone> = self.bones.iter().collect();
        // Bones may be stored out of hierarchical order.
        while !pending.is_empty() {
            let before = pending.len();
            pending.retain(|bone| {
                let parent = match &bone.parent {
                    Some(p) if self.index.contains_key(p) => match out.get(p) {
                        Some(m) => *m,
                        None => return true,
                    },
                    _ => DAffine3::IDENTITY,
                };
                let local = self
                    .pose
                    .get(&bone.name)
                    .map(|pose| pose.local_matrix(bone.head))
                    .unwrap_or(DAffine3::IDENTITY);
                out.insert(bone.name.clone(), parent * local);
                false
            });
            if pending.len() == before {
                break;
            }
        }
        out
    }
}

/// Which slider effects a custom mesh receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SliderSelector {
    /// Not driven by sliders.
    #[default]
    #[serde(rename = "NONE")]
    None,
    /// Shape-key dispatch and bone-driven reconstruction.
    #[serde(rename = "SL")]
    Sl,
    /// Shape-key dispatch only.
    #[serde(rename = "SHAPE")]
    Shape,
}

/// A named shape key with its declared slider range.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeKey {
    pub name: String,
    pub value: f64,
    pub slider_min: f64,
    pub slider_max: f64,
}

impl ShapeKey {
    /// Creates a shape key with range `[0, 1]`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: 0.0,
            slider_min: 0.0,
            slider_max: 1.0,
        }
    }
}

/// A mesh object.
#[derive(Debug, Clone)]
pub struct MeshObject {
    pub name: String,
    /// Parent armature.
    pub parent: Option<String>,
    /// Mesh-local to armature-space transform.
    pub transform: DAffine3,
    pub vertices: Vec<DVec3>,
    /// Vertex group names.
    pub groups: Vec<String>,
    /// Per-vertex `(group index, weight)` pairs.
    pub weights: Vec<Vec<(usize, f64)>>,
    pub shape_keys: Vec<ShapeKey>,
    pub selector: SliderSelector,
    /// System mesh type (`headMesh`, ...); `None` for custom meshes.
    pub mesh_type: Option<String>,
    pub bind: Option<BindData>,
}

impl MeshObject {
    /// Creates a custom mesh.
    pub fn new(name: impl Into<String>, vertices: Vec<DVec3>) -> Self {
        let weights = vec![Vec::new(); vertices.len()];
        Self {
            name: name.into(),
            parent: None,
            transform: DAffine3::IDENTITY,
            vertices,
            groups: Vec::new(),
            weights,
            shape_keys: Vec::new(),
            selector: SliderSelector::None,
            mesh_type: None,
            bind: None,
        }
    }

    /// Sets the parent armature.
    pub fn with_parent(mut self, armature: impl Into<String>) -> Self {
        self.parent = Some(armature.into());
        self
    }

    /// True for meshes created from the appearance definition.
    pub fn is_system(&self) -> bool {
        self.mesh_type.is_some()
    }

    /// Index of a vertex group, creating it when missing.
    pub fn group_index(&mut self, name: &str) -> usize {
        match self.groups.iter().position(|g| g == name) {
            Some(i) => i,
            None => {
                self.groups.push(name.to_string());
                self.groups.len() - 1
            }
        }
    }

    /// Assigns a vertex to a group with a weight.
    pub fn assign(&mut self, vertex: usize, group: &str, weight: f64) {
        let g = self.group_index(group);
        if self.weights.len() < self.vertices.len() {
            self.weights.resize(self.vertices.len(), Vec::new());
        }
        if let Some(slot) = self.weights.get_mut(vertex) {
            match slot.iter_mut().find(|(i, _)| *i == g) {
                Some(entry) => entry.1 = weight,
                None => slot.push((g, weight)),
            }
        }
    }

    /// Assigns every vertex to a group.
    pub fn assign_all(&mut self, group: &str, weight: f64) {
        for v in 0..self.vertices.len() {
            self.assign(v, group, weight);
        }
    }

    /// Looks up a shape key.
    pub fn shape_key(&self, name: &str) -> Option<&ShapeKey> {
        self.shape_keys.iter().find(|k| k.name == name)
    }

    /// Looks up a shape key for modification.
    pub fn shape_key_mut(&mut self, name: &str) -> Option<&mut ShapeKey> {
        self.shape_keys.iter_mut().find(|k| k.name == name)
    }

    /// Mesh-local point to armature space.
    pub fn to_armature(&self, p: DVec3) -> DVec3 {
        self.transform.transform_point3(p)
    }

    /// Armature-space point to mesh-local space.
    pub fn from_armature(&self, p: DVec3) -> DVec3 {
        self.transform.inverse().transform_point3(p)
    }

    /// Per-axis object scale of the mesh transform.
    pub fn object_scale(&self) -> DVec3 {
        let m = self.transform.matrix3;
        let sign = if m.determinant() < 0.0 { -1.0 } else { 1.0 };
        DVec3::new(
            m.x_axis.length() * sign,
            m.y_axis.length(),
            m.z_axis.length(),
        )
    }
}

/// All armatures and meshes known to the engine.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    armatures: BTreeMap<String, Armature>,
    meshes: BTreeMap<String, MeshObject>,
}

impl Scene {
    /// Creates an empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an armature.
    pub fn add_armature(&mut self, armature: Armature) {
        self.armatures.insert(armature.name.clone(), armature);
    }

    /// Adds or replaces a mesh.
    pub fn add_mesh(&mut self, mesh: MeshObject) {
        self.meshes.insert(mesh.name.clone(), mesh);
    }

    /// Looks up an armature.
    pub fn armature(&self, name: &str) -> EngineResult<&Armature> {
        self.armatures
            .get(name)
            .ok_or_else(|| EngineError::unknown_armature(name))
    }

    /// Looks up an armature for modification.
    pub fn armature_mut(&mut self, name: &str) -> EngineResult<&mut Armature> {
        self.armatures
            .get_mut(name)
            .ok_or_else(|| EngineError::unknown_armature(name))
    }

    /// Looks up a mesh.
    pub fn mesh(&self, name: &str) -> EngineResult<&MeshObject> {
        self.meshes
            .get(name)
            .ok_or_else(|| EngineError::unknown_mesh(name))
    }

    /// Looks up a mesh for modification.
    pub fn mesh_mut(&mut self, name: &str) -> EngineResult<&mut MeshObject> {
        self.meshes
            .get_mut(name)
            .ok_or_else(|| EngineError::unknown_mesh(name))
    }

    /// True when an armature with this name exists.
    pub fn has_armature(&self, name: &str) -> bool {
        self.armatures.contains_key(name)
    }

    /// True when a mesh with this name exists.
    pub fn has_mesh(&self, name: &str) -> bool {
        self.meshes.contains_key(name)
    }

    /// Removes an armature.
    pub fn remove_armature(&mut self, name: &str) -> Option<Armature> {
        self.armatures.remove(name)
    }

    /// Removes a mesh.
    pub fn remove_mesh(&mut self, name: &str) -> Option<MeshObject> {
        self.meshes.remove(name)
    }

    /// Names of all armatures.
    pub fn armature_names(&self) -> Vec<String> {
        self.armatures.keys().cloned().collect()
    }

    /// Names of the meshes parented to an armature.
    pub fn children(&self, armature: &str) -> Vec<String> {
        self.meshes
            .values()
            .filter(|m| m.parent.as_deref() == Some(armature))
            .map(|m| m.name.clone())
            .collect()
    }

    /// Borrows an armature and its child meshes at the same time.
    pub fn armature_with_children(
        &mut self,
        name: &str,
    ) -> EngineResult<(&mut Armature, Vec<&mut MeshObject>)> {
        let armature = self
            .armatures
            .get_mut(name)
            .ok_or_else(|| EngineError::unknown_armature(name))?;
        let meshes = self
            .meshes
            .values_mut()
            .filter(|m| m.parent.as_deref() == Some(name))
            .collect();
        Ok((armature, meshes))
    }
}
