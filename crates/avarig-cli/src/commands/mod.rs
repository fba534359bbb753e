//! CLI command implementations

pub mod anim;
pub mod export_shape;
pub mod inspect;
pub mod shape;
pub mod sliders;

use std::path::Path;

use anyhow::{Context, Result};
use avarig_engine::{EngineConfig, RigSystem};
use log::debug;

/// Name of the armature the shape commands build.
pub const DEFAULT_ARMATURE: &str = "Avatar";

/// Builds the rig system from an optional configuration file plus the
/// environment.
pub fn rig_system(config: Option<&Path>) -> Result<RigSystem> {
    let config = match config {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    }
    .with_env();
    debug!("Engine data source: {:?}", config.data_source());
    RigSystem::new(config).context("Failed to load the appearance data")
}

fn format_vec(v: glam::DVec3) -> String {
    format!("({:>8.4}, {:>8.4}, {:>8.4})", v.x, v.y, v.z)
}
