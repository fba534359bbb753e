//! Export-shape command implementation
//!
//! Writes a shape XML holding the default slider values plus overrides.

use anyhow::{Context, Result};
use avarig_data::Gender;
use avarig_engine::{RigProps, RigSystem, Scene};
use colored::Colorize;
use std::path::Path;
use std::process::ExitCode;

use crate::overrides::{self, SliderOverride};

/// Builds the shape under `name` and writes it to `output`.
pub fn export(
    system: &RigSystem,
    output: &Path,
    name: &str,
    sliders: &[SliderOverride],
    gender: Option<Gender>,
) -> Result<()> {
    let mut scene = Scene::new();
    system.create_armature(&mut scene, name, RigProps::default())?;
    system.batch(&mut scene, name, |shape, graph| {
        if let Some(gender) = gender {
            shape.set_gender(gender);
        }
        overrides::apply(shape, graph, sliders)
    })?;
    system
        .save_shape(&scene, name, output)
        .with_context(|| format!("Failed to write {}", output.display()))
}

/// Run the export-shape command
pub fn run(
    system: &RigSystem,
    output: &Path,
    name: &str,
    sliders: &[SliderOverride],
    gender: Option<Gender>,
) -> Result<ExitCode> {
    export(system, output, name, sliders, gender)?;
    println!(
        "{} {} ({} overrides)",
        "Wrote".green().bold(),
        output.display(),
        sliders.len()
    );
    Ok(ExitCode::SUCCESS)
}
