//! The rig system: entry points hosts call on a [`Scene`].

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use avarig_data::{cache, DataSource, DriverGraph, Gender, RestPosePreset, Skeleton};
use log::info;

use crate::bind::{self, weights::WeightTable};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::evaluator::Evaluator;
use crate::joints;
use crate::progress::{NoProgress, ProgressHook};
use crate::report::{EvaluationReport, MeshReport, SkipReason};
use crate::scene::{Armature, EditBone, MeshObject, RigProps, Scene, ShapeKey, SliderSelector};
use crate::shape::io::{self as shape_io, ShapeLoadReport};
use crate::shape::ShapeState;

/// Shared reference data plus configuration.
#[derive(Debug, Clone)]
pub struct RigSystem {
    config: EngineConfig,
    source: DataSource,
    graph: Arc<DriverGraph>,
}

impl RigSystem {
    /// Loads the driver graph for the configured data source.
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        let source = config.data_source();
        let graph = cache::driver_graph(&source)?;
        Ok(Self {
            config,
            source,
            graph,
        })
    }

    /// Rig system over the bundled reference data.
    pub fn bundled() -> EngineResult<Self> {
        Self::new(EngineConfig::default())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn graph(&self) -> &DriverGraph {
        &self.graph
    }

    /// Reference skeleton for a rig configuration.
    pub fn skeleton(&self, rig: &RigProps) -> EngineResult<Arc<Skeleton>> {
        Ok(cache::skeleton(&self.source, rig.rig_type, rig.joint_type)?)
    }

    /// Creates an armature at the reference rest pose with default sliders
    /// and evaluates it once.
    pub fn create_armature(&self, scene: &mut Scene, name: &str, rig: RigProps) -> EngineResult<EvaluationReport> {
        let skeleton = self.skeleton(&rig)?;
        let mut armature = Armature::new(name);
        armature.set_bones(edit_bones(&skeleton));
        armature.rig = rig;
        armature.managed = true;
        armature.shape = ShapeState::from_graph(&self.graph);
        scene.add_armature(armature);
        info!("Created armature '{}' with {} bones", name, skeleton.len());
        self.evaluate(scene, name)
    }

    /// Creates one system mesh per mesh type of the appearance definition,
    /// each with a shape key per morph. Returns the mesh names.
    pub fn create_system_meshes(&self, scene: &mut Scene, armature: &str) -> EngineResult<Vec<String>> {
        scene.armature(armature)?;
        let mut morphs: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for driver in self.graph.drivers() {
            for target in &driver.meshes {
                morphs.entry(target.mesh.as_str()).or_default().insert(target.morph.as_str());
            }
        }
        let mut names = Vec::with_capacity(morphs.len());
        for (mesh_type, keys) in morphs {
            let name = format!("{}.{}", armature, mesh_type);
            let mut mesh = MeshObject::new(name.clone(), Vec::new()).with_parent(armature);
            mesh.mesh_type = Some(mesh_type.to_string());
            mesh.selector = SliderSelector::Sl;
            mesh.shape_keys = keys.into_iter().map(ShapeKey::new).collect();
            scene.add_mesh(mesh);
            names.push(name);
        }
        self.evaluate(scene, armature)?;
        Ok(names)
    }

    /// Evaluates an armature and its child meshes.
    pub fn evaluate(&self, scene: &mut Scene, armature: &str) -> EngineResult<EvaluationReport> {
        self.evaluate_with(scene, armature, &mut NoProgress)
    }

    /// Evaluates with a progress hook.
    pub fn evaluate_with(
        &self,
        scene: &mut Scene,
        armature: &str,
        progress: &mut dyn ProgressHook,
    ) -> EngineResult<EvaluationReport> {
        let rig = scene.armature(armature)?.rig.clone();
        let skeleton = self.skeleton(&rig)?;
        let (arm, mut meshes) = scene.armature_with_children(armature)?;
        let evaluator = Evaluator::new(&skeleton, &self.graph, &self.config);
        Ok(evaluator.evaluate(arm, &mut meshes, progress))
    }

    /// Sets one slider and evaluates.
    pub fn set_slider(&self, scene: &mut Scene, armature: &str, id: &str, ui: f64) -> EngineResult<EvaluationReport> {
        scene.armature_mut(armature)?.shape.set(&self.graph, id, ui)?;
        self.evaluate(scene, armature)
    }

    /// Sets the gender and evaluates.
    pub fn set_gender(&self, scene: &mut Scene, armature: &str, gender: Gender) -> EngineResult<EvaluationReport> {
        scene.armature_mut(armature)?.shape.set_gender(gender);
        self.evaluate(scene, armature)
    }

    /// Applies several edits with evaluation suppressed, then evaluates once
    /// when the outermost batch closes.
    pub fn batch<F>(&self, scene: &mut Scene, armature: &str, edit: F) -> EngineResult<EvaluationReport>
    where
        F: FnOnce(&mut ShapeState, &DriverGraph) -> EngineResult<()>,
    {
        let arm = scene.armature_mut(armature)?;
        arm.shape.freeze();
        let result = edit(&mut arm.shape, &self.graph);
        let last = arm.shape.thaw();
        result?;
        if last {
            self.evaluate(scene, armature)
        } else {
            Ok(EvaluationReport::skipped(armature, SkipReason::Frozen))
        }
    }

    /// Restores every slider to its declared default.
    pub fn reset_to_default(&self, scene: &mut Scene, armature: &str, keep_gender: bool) -> EngineResult<EvaluationReport> {
        self.batch(scene, armature, |shape, graph| {
            shape.reset_to_default(graph, keep_gender);
            Ok(())
        })
    }

    /// Pins every slider to a rest-pose preset.
    pub fn reset_to_rest_pose(
        &self,
        scene: &mut Scene,
        armature: &str,
        preset: RestPosePreset,
        keep_gender: bool,
    ) -> EngineResult<EvaluationReport> {
        self.batch(scene, armature, |shape, graph| {
            shape.reset_to_rest_pose(graph, preset, keep_gender);
            Ok(())
        })
    }

    /// Loads a shape file into an armature and evaluates once.
    pub fn load_shape(
        &self,
        scene: &mut Scene,
        armature: &str,
        path: &Path,
    ) -> EngineResult<(ShapeLoadReport, EvaluationReport)> {
        let mut loaded = ShapeLoadReport::default();
        let report = self.batch(scene, armature, |shape, graph| {
            loaded = shape_io::load_shape(graph, shape, path)?;
            Ok(())
        })?;
        Ok((loaded, report))
    }

    /// Saves an armature's sliders to a shape file.
    pub fn save_shape(&self, scene: &Scene, armature: &str, path: &Path) -> EngineResult<()> {
        let arm = scene.armature(armature)?;
        shape_io::save_shape(&self.graph, &arm.shape, armature, path)
    }

    /// Binds a custom mesh to an armature's sliders. The mesh is parented to
    /// the armature and its selector defaults to [`SliderSelector::Sl`].
    pub fn attach(&self, scene: &mut Scene, armature: &str, mesh: &str) -> EngineResult<MeshReport> {
        let arm = scene.armature(armature)?;
        let skeleton = self.skeleton(&arm.rig)?;
        let evaluator = Evaluator::new(&skeleton, &self.graph, &self.config);
        let neutral = evaluator.frames_for(arm, &BTreeMap::new());
        let bind_frames = if arm.rig.use_bind_pose {
            evaluator.frames_for(arm, arm.shape.accumulators())
        } else {
            neutral.clone()
        };

        let target = scene.mesh_mut(mesh)?;
        if target.is_system() {
            return Err(EngineError::SystemMesh { mesh: mesh.to_string() });
        }
        target.parent = Some(armature.to_string());
        if target.selector == SliderSelector::None {
            target.selector = SliderSelector::Sl;
        }
        let table = WeightTable::compile(target, |g| skeleton.get(g).map_or(false, |b| b.deform));
        Ok(bind::attach(
            target,
            table,
            bind_frames,
            neutral,
            &self.config.correction,
            &mut NoProgress,
        ))
    }

    /// Unbinds a custom mesh, optionally restoring its attach-time shape.
    pub fn detach(&self, scene: &mut Scene, mesh: &str, reset: bool) -> EngineResult<()> {
        bind::detach(scene.mesh_mut(mesh)?, reset)
    }

    /// Stores the armature's hand edits as joint offsets.
    pub fn store_joints(&self, scene: &mut Scene, armature: &str) -> EngineResult<usize> {
        let rig = scene.armature(armature)?.rig.clone();
        let skeleton = self.skeleton(&rig)?;
        let arm = scene.armature_mut(armature)?;
        Ok(joints::store_joints(
            arm,
            &skeleton,
            self.config.joint_store,
            self.config.min_joint_offset,
        ))
    }

    /// Removes joint offsets of one bone or all bones. Unless
    /// `keep_edit_joints` is set, the bones snap back to their slider-driven
    /// positions.
    pub fn remove_joints(
        &self,
        scene: &mut Scene,
        armature: &str,
        bone: Option<&str>,
        keep_edit_joints: bool,
    ) -> EngineResult<usize> {
        let arm = scene.armature_mut(armature)?;
        if let Some(name) = bone {
            arm.require_bone(name)?;
        }
        let removed = joints::remove_joints(arm, bone);
        if !keep_edit_joints {
            self.evaluate(scene, armature)?;
        }
        Ok(removed)
    }
}

/// Edit bones of a reference skeleton at rest.
pub(crate) fn edit_bones(skeleton: &Skeleton) -> Vec<EditBone> {
    let rest = skeleton.rest_positions();
    skeleton
        .bones()
        .map(|bone| {
            let (head, tail) = rest.get(&bone.name).copied().unwrap_or_default();
            EditBone {
                name: bone.name.clone(),
                parent: bone.parent.clone(),
                head,
                tail,
                roll: bone.roll,
                kind: bone.kind,
                deform: bone.deform,
                connected: bone.connected,
            }
        })
        .collect()
}
