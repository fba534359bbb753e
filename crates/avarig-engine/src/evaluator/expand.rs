//! Driver expansion: slider values to mesh and bone change lists.

use avarig_data::{Driver, DriverGraph, Gender};
use log::warn;

use crate::shape::ShapeState;

/// One driver's resolved contribution.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    /// Driver id.
    pub driver: String,
    /// Value in the driver's declared range.
    pub value: f64,
    /// Position in `[0, 1]` along the declared range.
    pub normalized: f64,
}

/// Change lists produced from a shape state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Expansion {
    pub mesh_changes: Vec<Change>,
    pub bone_changes: Vec<Change>,
    /// Slider ids with no driver.
    pub missing: Vec<String>,
    /// Root sliders expanded.
    pub sliders: usize,
}

/// Expands every slider of the state through its driven chains.
pub fn expand(graph: &DriverGraph, shape: &ShapeState) -> Expansion {
    let mut out = Expansion::default();
    let gender = shape.gender();
    for (id, ui) in shape.values() {
        let Some(driver) = graph.get(id) else {
            warn!("Slider '{}' has no driver, skipped", id);
            out.missing.push(id.to_string());
            continue;
        };
        out.sliders += 1;
        let normalized = ui / 100.0;
        visit(graph, driver, driver.value_at(ui), normalized, false, gender, &mut out);
    }
    out.mesh_changes = combine(out.mesh_changes);
    out
}

/// Merges changes of the same driver, in first-seen order. A child driven by
/// several parents gets the sum of their contributions, matching the bone
/// accumulation; the normalized position is clamped to `[0, 1]`.
pub fn combine(changes: Vec<Change>) -> Vec<Change> {
    let mut out: Vec<Change> = Vec::with_capacity(changes.len());
    for change in changes {
        match out.iter_mut().find(|c| c.driver == change.driver) {
            Some(existing) => {
                existing.value += change.value;
                existing.normalized = (existing.normalized + change.normalized).clamp(0.0, 1.0);
            }
            None => out.push(change),
        }
    }
    out
}

fn visit(
    graph: &DriverGraph,
    driver: &Driver,
    value: f64,
    normalized: f64,
    parent_gated: bool,
    gender: Gender,
    out: &mut Expansion,
) {
    // Gated drivers stay in the lists with zero so flipping gender zeroes them.
    let gated = parent_gated || !driver.applies_to(gender);
    let (value, normalized) = if gated { (0.0, 0.0) } else { (value, normalized) };

    let change = Change {
        driver: driver.id.clone(),
        value,
        normalized,
    };
    if !driver.meshes.is_empty() {
        out.mesh_changes.push(change.clone());
    }
    if !driver.bones.is_empty() {
        out.bone_changes.push(change);
    }

    for link in &driver.driven {
        let Some(child) = graph.get(&link.child) else {
            warn!("Driver '{}' drives unknown '{}', skipped", driver.id, link.child);
            out.missing.push(link.child.clone());
            continue;
        };
        let weight = if gated {
            0.0
        } else {
            link.weight(value, driver.min, driver.max)
        };
        let child_value = child.min + (child.max - child.min) * weight;
        visit(graph, child, child_value, weight, gated, gender, out);
    }
}
