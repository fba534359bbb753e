//! Conversion between slider state and shape documents.

use std::path::Path;

use avarig_data::shape_file::{load_shape_file, save_shape_file, ShapeDocument, ShapeEntry};
use avarig_data::DriverGraph;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::ShapeState;
use crate::error::EngineResult;

/// Outcome of applying a shape document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShapeLoadReport {
    /// Sliders that received a value.
    pub applied: usize,
    /// Parameter ids with no driver.
    pub unknown: Vec<i64>,
    /// Parameter ids of driven sliders, which take their value from parents.
    pub driven: Vec<i64>,
}

/// Builds a document holding every root slider in its declared range.
pub fn to_document(graph: &DriverGraph, shape: &ShapeState, name: &str) -> ShapeDocument {
    let mut doc = ShapeDocument::new(name);
    doc.gender = Some(shape.gender());
    doc.entries = graph
        .root_drivers()
        .filter_map(|driver| {
            let ui = shape.value(&driver.id)?;
            Some(ShapeEntry {
                id: driver.param_id,
                name: driver.name.clone(),
                value: driver.value_at(ui),
            })
        })
        .collect();
    doc
}

/// Applies a document to the state. Sliders the document does not name keep
/// their current value.
pub fn apply_document(graph: &DriverGraph, shape: &mut ShapeState, doc: &ShapeDocument) -> ShapeLoadReport {
    let mut report = ShapeLoadReport::default();
    if let Some(gender) = doc.gender {
        shape.set_gender(gender);
    }
    for entry in &doc.entries {
        let Some(driver) = graph.by_param_id(entry.id) else {
            warn!("Shape '{}': ignoring unknown parameter {} ({})", doc.name, entry.id, entry.name);
            report.unknown.push(entry.id);
            continue;
        };
        if !driver.is_root() {
            debug!("Shape '{}': parameter {} is driven, skipped", doc.name, entry.id);
            report.driven.push(entry.id);
            continue;
        }
        let ui = driver.ui_for(entry.value);
        if shape.set(graph, &driver.id, ui).is_ok() {
            report.applied += 1;
        }
    }
    report
}

/// Writes the state to a shape file.
pub fn save_shape(graph: &DriverGraph, shape: &ShapeState, name: &str, path: &Path) -> EngineResult<()> {
    save_shape_file(&to_document(graph, shape, name), path)?;
    Ok(())
}

/// Reads a shape file into the state.
pub fn load_shape(graph: &DriverGraph, shape: &mut ShapeState, path: &Path) -> EngineResult<ShapeLoadReport> {
    let doc = load_shape_file(path)?;
    Ok(apply_document(graph, shape, &doc))
}
