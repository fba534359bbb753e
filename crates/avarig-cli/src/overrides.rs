//! `--set id=value` slider overrides.

use avarig_data::{DriverGraph, Gender};
use avarig_engine::{EngineResult, ShapeState};

/// One slider assignment in UI units (0..100).
#[derive(Debug, Clone, PartialEq)]
pub struct SliderOverride {
    pub id: String,
    pub value: f64,
}

/// Parses `id=value`. Used as a clap value parser.
pub fn parse_override(text: &str) -> Result<SliderOverride, String> {
    let (id, value) = text
        .split_once('=')
        .ok_or_else(|| format!("expected ID=VALUE, got '{}'", text))?;
    let id = id.trim();
    if id.is_empty() {
        return Err(format!("missing slider id in '{}'", text));
    }
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not a number", value.trim()))?;
    Ok(SliderOverride {
        id: id.to_string(),
        value,
    })
}

/// Parses a `--gender` argument.
pub fn parse_gender(text: &str) -> Result<Gender, String> {
    Gender::parse(text).ok_or_else(|| format!("expected 'female' or 'male', got '{}'", text))
}

/// Applies every override to `shape`.
pub fn apply(shape: &mut ShapeState, graph: &DriverGraph, overrides: &[SliderOverride]) -> EngineResult<()> {
    for o in overrides {
        shape.set(graph, &o.id, o.value)?;
    }
    Ok(())
}
