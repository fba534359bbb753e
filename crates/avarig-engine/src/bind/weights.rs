//! Compiled weight tables.

use log::warn;

use crate::scene::MeshObject;

/// Weights of bound vertices against deforming bones, normalized per vertex.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeightTable {
    /// `(bone, [(vertex, weight)])`, in group order.
    pub bones: Vec<(String, Vec<(usize, f64)>)>,
    /// Vertices without any deforming group.
    pub unweighted: Vec<usize>,
}

impl WeightTable {
    /// Compiles the table of a mesh. Groups that do not name a deforming
    /// bone are skipped but stay on the mesh.
    pub fn compile<F>(mesh: &MeshObject, is_deforming: F) -> Self
    where
        F: Fn(&str) -> bool,
    {
        let valid: Vec<bool> = mesh.groups.iter().map(|g| is_deforming(g)).collect();
        let mut bones: Vec<(String, Vec<(usize, f64)>)> = mesh
            .groups
            .iter()
            .map(|g| (g.clone(), Vec::new()))
            .collect();
        let mut unweighted = Vec::new();

        for vertex in 0..mesh.vertices.len() {
            let entries: Vec<(usize, f64)> = mesh
                .weights
                .get(vertex)
                .map(|w| {
                    w.iter()
                        .copied()
                        .filter(|(g, w)| *w > 0.0 && valid.get(*g).copied().unwrap_or(false))
                        .collect()
                })
                .unwrap_or_default();
            let total: f64 = entries.iter().map(|(_, w)| w).sum();
            if total <= f64::EPSILON {
                unweighted.push(vertex);
                continue;
            }
            for (group, weight) in entries {
                bones[group].1.push((vertex, weight / total));
            }
        }
        bones.retain(|(_, list)| !list.is_empty());

        if !unweighted.is_empty() {
            warn!(
                "Mesh '{}': {} of {} vertices have no deforming weight and keep their shape",
                mesh.name,
                unweighted.len(),
                mesh.vertices.len()
            );
        }
        Self { bones, unweighted }
    }

    /// Per-vertex view: `(bone index, weight)` for each of `vertex_count`
    /// vertices.
    pub fn by_vertex(&self, vertex_count: usize) -> Vec<Vec<(usize, f64)>> {
        let mut out = vec![Vec::new(); vertex_count];
        for (bone, (_, list)) in self.bones.iter().enumerate() {
            for &(vertex, weight) in list {
                if let Some(slot) = out.get_mut(vertex) {
                    slot.push((bone, weight));
                }
            }
        }
        out
    }

    /// Bone names in table order.
    pub fn bone_names(&self) -> impl Iterator<Item = &str> {
        self.bones.iter().map(|(b, _)| b.as_str())
    }
}
