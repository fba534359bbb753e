//! Linear-blend reconstruction between shape states and the corrective
//! loop that converges bound geometry onto its target.

use glam::{DAffine3, DMat3, DVec3};

use super::weights::WeightTable;
use crate::config::CorrectionSettings;
use crate::evaluator::bones::Frames;
use crate::progress::ProgressHook;

/// Per-bone affine maps between two frame sets, applied with the weights of
/// one mesh.
pub struct Blend {
    transform: DAffine3,
    inverse: DAffine3,
    by_vertex: Vec<Vec<(usize, f64)>>,
    maps: Vec<Option<(DMat3, DVec3)>>,
}

impl Blend {
    /// Prepares the blend of a mesh from frames `from` to frames `to`.
    /// `transform` maps mesh-local points into armature space.
    pub fn new(
        table: &WeightTable,
        vertex_count: usize,
        transform: DAffine3,
        from: &Frames,
        to: &Frames,
    ) -> Self {
        let maps = table
            .bone_names()
            .map(|bone| {
                let (a, b) = (from.get(bone)?, to.get(bone)?);
                Some(a.transfer_to(b))
            })
            .collect();
        Self {
            transform,
            inverse: transform.inverse(),
            by_vertex: table.by_vertex(vertex_count),
            maps,
        }
    }

    /// Blends every point. Points without weights are returned unchanged.
    pub fn apply(&self, points: &[DVec3]) -> Vec<DVec3> {
        points
            .iter()
            .enumerate()
            .map(|(i, &p)| self.apply_one(i, p))
            .collect()
    }

    fn apply_one(&self, vertex: usize, p: DVec3) -> DVec3 {
        let weights = match self.by_vertex.get(vertex) {
            Some(w) if !w.is_empty() => w,
            _ => return p,
        };
        let local = self.transform.transform_point3(p);
        let mut out = DVec3::ZERO;
        for &(bone, weight) in weights {
            let moved = match self.maps.get(bone).copied().flatten() {
                Some((linear, offset)) => linear * local + offset,
                None => local,
            };
            out += moved * weight;
        }
        self.inverse.transform_point3(out)
    }

    /// True when the vertex takes part in the blend.
    pub fn is_weighted(&self, vertex: usize) -> bool {
        self.by_vertex.get(vertex).map_or(false, |w| !w.is_empty())
    }
}

/// Result of a corrective loop.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Correction {
    pub iterations: usize,
    pub unconverged: usize,
    pub max_error: f64,
    pub threshold: f64,
}

/// Largest extent of the axis-aligned bounding box.
pub fn max_extent(points: &[DVec3]) -> f64 {
    let Some(first) = points.first() else {
        return 0.0;
    };
    let (lo, hi) = points
        .iter()
        .fold((*first, *first), |(lo, hi), p| (lo.min(*p), hi.max(*p)));
    (hi - lo).max_element()
}

/// Shifts `neutral` until `forward(neutral)` matches `target` within
/// tolerance on every weighted vertex, or the iteration budget runs out.
/// Returns the final forward result.
pub fn correct(
    mesh: &str,
    neutral: &mut [DVec3],
    target: &[DVec3],
    forward: &Blend,
    settings: &CorrectionSettings,
    progress: &mut dyn ProgressHook,
) -> (Vec<DVec3>, Correction) {
    let threshold = (settings.tolerance_percent / 100.0 * max_extent(target)).max(1e-9);
    let step = settings.stepsize_percent / 100.0;
    let mut current = forward.apply(neutral);
    let mut result = Correction {
        threshold,
        ..Default::default()
    };

    loop {
        let mut out_of_tolerance = Vec::new();
        let mut max_error: f64 = 0.0;
        for (i, (c, t)) in current.iter().zip(target).enumerate() {
            if !forward.is_weighted(i) {
                continue;
            }
            let error = (*c - *t).abs().max_element();
            max_error = max_error.max(error);
            if error > threshold {
                out_of_tolerance.push(i);
            }
        }
        result.max_error = max_error;
        result.unconverged = out_of_tolerance.len();
        if out_of_tolerance.is_empty() || result.iterations >= settings.iterations {
            break;
        }
        for i in out_of_tolerance {
            neutral[i] -= (current[i] - target[i]) * step;
        }
        current = forward.apply(neutral);
        result.iterations += 1;
        progress.on_iteration(mesh, result.iterations, result.unconverged);
    }
    (current, result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::bones::BoneFrame;
    use crate::progress::NoProgress;
    use crate::scene::MeshObject;

    fn frames(head: DVec3, scale: DVec3) -> Frames {
        let mut f = Frames::new();
        let mut frame = BoneFrame::at(head, head + DVec3::Z);
        frame.scale = scale;
        f.insert("mChest".into(), frame);
        f.insert("mTorso".into(), BoneFrame::at(DVec3::ZERO, DVec3::Z));
        f
    }

    #[test]
    fn test_max_extent() {
        let pts = [DVec3::ZERO, DVec3::new(2.0, 1.0, -1.0)];
        assert_eq!(max_extent(&pts), 2.0);
        assert_eq!(max_extent(&[]), 0.0);
    }

    #[test]
    fn test_blend_single_bone_is_affine() {
        let mut mesh = MeshObject::new("Plane", vec![DVec3::new(1.0, 0.0, 1.0), DVec3::ZERO]);
        mesh.assign(0, "mChest", 1.0);
        let table = WeightTable::compile(&mesh, |_| true);
        let a = frames(DVec3::new(0.0, 0.0, 1.0), DVec3::ONE);
        let b = frames(DVec3::new(0.0, 0.0, 1.5), DVec3::new(2.0, 1.0, 1.0));
        let blend = Blend::new(&table, 2, DAffine3::IDENTITY, &a, &b);
        let out = blend.apply(&mesh.vertices);
        assert!((out[0] - DVec3::new(2.0, 0.0, 1.5)).length() < 1e-12);
        assert_eq!(out[1], DVec3::ZERO);
    }

    #[test]
    fn test_correct_converges_on_mixed_weights() {
        let verts: Vec<DVec3> = (0..10).map(|i| DVec3::new(i as f64 * 0.1, 0.0, 1.0)).collect();
        let mut mesh = MeshObject::new("Strip", verts.clone());
        for i in 0..10 {
            mesh.assign(i, "mChest", i as f64 / 9.0);
            mesh.assign(i, "mTorso", 1.0 - i as f64 / 9.0);
        }
        let table = WeightTable::compile(&mesh, |_| true);
        let a = frames(DVec3::new(0.0, 0.0, 1.0), DVec3::ONE);
        let b = frames(DVec3::new(0.0, 0.0, 1.0), DVec3::new(1.2, 1.0, 1.0));
        let forward = Blend::new(&table, verts.len(), DAffine3::IDENTITY, &a, &b);
        let target: Vec<DVec3> = verts.iter().map(|v| *v * DVec3::new(1.05, 1.0, 1.0)).collect();

        let mut neutral = verts.clone();
        let settings = CorrectionSettings::default();
        let (current, result) = correct("Strip", &mut neutral, &target, &forward, &settings, &mut NoProgress);
        assert_eq!(result.unconverged, 0);
        for (c, t) in current.iter().zip(&target) {
            assert!((*c - *t).abs().max_element() <= result.threshold);
        }
    }
}
