//! Custom mesh binding.
//!
//! Attaching a mesh snapshots its vertices (`original`), maps them back to
//! the neutral shape (`neutral_shape`), and records the bone frames of both
//! states. Every evaluation then carries `neutral_shape` forward to the
//! current frames (`bone_morph`) and writes the result into the mesh.

pub mod reconstruct;
pub mod weights;

use glam::DVec3;
use log::{error, info, warn};

use self::reconstruct::{correct, Blend, Correction};
use self::weights::WeightTable;
use crate::config::CorrectionSettings;
use crate::error::{EngineError, EngineResult};
use crate::evaluator::bones::Frames;
use crate::progress::ProgressHook;
use crate::report::{BindStatus, MeshReport};
use crate::scene::MeshObject;

/// Bind state of one custom mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct BindData {
    /// Vertices when the mesh was attached.
    pub original: Vec<DVec3>,
    /// Vertices mapped to the neutral shape.
    pub neutral_shape: Vec<DVec3>,
    /// Vertices under the current sliders.
    pub bone_morph: Vec<DVec3>,
    pub weights: WeightTable,
    /// Bone frames when the mesh was attached.
    pub bind_frames: Frames,
    /// Bone frames of the neutral shape when the mesh was attached.
    pub neutral_frames: Frames,
}

impl BindData {
    /// Vertex count of the stored arrays.
    pub fn len(&self) -> usize {
        self.original.len()
    }

    /// True when no vertices are stored.
    pub fn is_empty(&self) -> bool {
        self.original.is_empty()
    }
}

/// Flattens vertices into `x y z` triples.
pub fn to_flat(points: &[DVec3]) -> Vec<f64> {
    points.iter().flat_map(|p| p.to_array()).collect()
}

/// Rebuilds vertices from `x y z` triples. A trailing partial triple is
/// dropped.
pub fn from_flat(values: &[f64]) -> Vec<DVec3> {
    values
        .chunks_exact(3)
        .map(|c| DVec3::new(c[0], c[1], c[2]))
        .collect()
}

/// Attaches a mesh. `bind_frames` describe the current shape and
/// `neutral_frames` the shape with every accumulator at zero.
pub fn attach(
    mesh: &mut MeshObject,
    table: WeightTable,
    bind_frames: Frames,
    neutral_frames: Frames,
    settings: &CorrectionSettings,
    progress: &mut dyn ProgressHook,
) -> MeshReport {
    let original = mesh.vertices.clone();
    let count = original.len();
    let inverse = Blend::new(&table, count, mesh.transform, &bind_frames, &neutral_frames);
    let mut neutral_shape = inverse.apply(&original);

    let forward = Blend::new(&table, count, mesh.transform, &neutral_frames, &bind_frames);
    let (bone_morph, result) = correct(&mesh.name, &mut neutral_shape, &original, &forward, settings, progress);

    let mut report = MeshReport::new(mesh.name.clone());
    fill(&mut report, &result, table.unweighted.len());
    info!(
        "Attached '{}' ({} vertices, {} bones, {} corrective passes)",
        mesh.name,
        count,
        table.bones.len(),
        result.iterations
    );
    mesh.bind = Some(BindData {
        original,
        neutral_shape,
        bone_morph,
        weights: table,
        bind_frames,
        neutral_frames,
    });
    report
}

/// Carries a bound mesh to the frames `now` and writes the result into the
/// live vertices.
pub fn reconstruct(
    mesh: &mut MeshObject,
    now: &Frames,
    settings: &CorrectionSettings,
    progress: &mut dyn ProgressHook,
) -> EngineResult<MeshReport> {
    let name = mesh.name.clone();
    let current_len = mesh.vertices.len();
    let transform = mesh.transform;
    let mut report = MeshReport::new(name.clone());
    let live = mesh.vertices.clone();
    let bind = mesh
        .bind
        .as_mut()
        .ok_or_else(|| EngineError::NotBound { mesh: name.clone() })?;

    let stored = bind.len();
    if stored > current_len {
        error!(
            "Mesh '{}' lost vertices since it was bound ({} stored, {} now); reset its shape",
            name, stored, current_len
        );
        report.status = BindStatus::Refused {
            stored,
            current: current_len,
        };
        return Ok(report);
    }
    if stored < current_len {
        warn!(
            "Mesh '{}' gained vertices since it was bound ({} stored, {} now); padding",
            name, stored, current_len
        );
        let extra = &live[stored..];
        bind.original.extend_from_slice(extra);
        bind.neutral_shape.extend_from_slice(extra);
        bind.bone_morph.extend_from_slice(extra);
        report.status = BindStatus::Padded {
            stored,
            current: current_len,
        };
    }

    let target = Blend::new(&bind.weights, current_len, transform, &bind.bind_frames, now).apply(&bind.original);
    let forward = Blend::new(&bind.weights, current_len, transform, &bind.neutral_frames, now);
    let mut scratch = bind.neutral_shape.clone();
    let (morphed, result) = correct(&name, &mut scratch, &target, &forward, settings, progress);
    fill(&mut report, &result, bind.weights.unweighted.len());

    bind.bone_morph = morphed;
    mesh.vertices = bind.bone_morph.clone();
    Ok(report)
}

/// Detaches a mesh. With `reset`, the vertices of the attach snapshot are
/// restored; otherwise the current shape is kept.
pub fn detach(mesh: &mut MeshObject, reset: bool) -> EngineResult<()> {
    let bind = mesh
        .bind
        .take()
        .ok_or_else(|| EngineError::NotBound { mesh: mesh.name.clone() })?;
    if reset {
        if bind.original.len() == mesh.vertices.len() {
            mesh.vertices = bind.original;
        } else {
            warn!(
                "Mesh '{}' changed vertex count since binding; restoring the first {} vertices",
                mesh.name,
                bind.original.len().min(mesh.vertices.len())
            );
            for (live, orig) in mesh.vertices.iter_mut().zip(bind.original) {
                *live = orig;
            }
        }
    }
    Ok(())
}

fn fill(report: &mut MeshReport, result: &Correction, unweighted: usize) {
    report.iterations = result.iterations;
    report.unconverged = result.unconverged;
    report.max_error = result.max_error;
    report.threshold = result.threshold;
    report.unweighted = unweighted;
}
