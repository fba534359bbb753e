//! Anim command implementation
//!
//! Encodes a JSON clip description into a binary `.anim` clip or a BVH file.

use anyhow::{bail, Context, Result};
use avarig_anim::bvh::{self, BvhSkeleton};
use avarig_anim::{anim, AnimClip};
use avarig_engine::{RigProps, RigSystem};
use colored::Colorize;
use log::warn;
use std::fs;
use std::path::Path;
use std::process::ExitCode;

/// Output encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimFormat {
    Anim,
    Bvh,
}

impl AnimFormat {
    /// Picks the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "anim" => Some(AnimFormat::Anim),
            "bvh" => Some(AnimFormat::Bvh),
            _ => None,
        }
    }
}

/// BVH sampling settings.
#[derive(Debug, Clone)]
pub struct BvhSettings {
    pub rig: RigProps,
    pub fps: f32,
    pub translations: bool,
}

/// Encodes the clip at `input` into `output`.
pub fn encode(
    system: &RigSystem,
    input: &Path,
    output: &Path,
    format: Option<AnimFormat>,
    settings: &BvhSettings,
) -> Result<AnimFormat> {
    let text = fs::read_to_string(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let clip = AnimClip::from_json(&text).with_context(|| format!("Failed to parse {}", input.display()))?;

    let Some(format) = format.or_else(|| AnimFormat::from_path(output)) else {
        bail!("Cannot tell the format of {}; use --format", output.display());
    };
    match format {
        AnimFormat::Anim => anim::write_file(&clip, output)?,
        AnimFormat::Bvh => {
            let skeleton = system.skeleton(&settings.rig)?;
            let hierarchy = BvhSkeleton::from_skeleton(&skeleton)?;
            for track in &clip.joints {
                if !hierarchy.joints.iter().any(|j| j.source == track.name) {
                    warn!("Joint '{}' is not part of the exported hierarchy", track.name);
                }
            }
            bvh::write_bvh(output, &hierarchy, &clip, settings.fps, settings.translations)?;
        }
    }
    Ok(format)
}

/// Run the anim command
pub fn run(
    system: &RigSystem,
    input: &Path,
    output: &Path,
    format: Option<AnimFormat>,
    settings: &BvhSettings,
) -> Result<ExitCode> {
    let format = encode(system, input, output, format, settings)?;
    let kind = match format {
        AnimFormat::Anim => "clip",
        AnimFormat::Bvh => "motion",
    };
    println!("{} {} {}", "Wrote".green().bold(), kind, output.display());
    Ok(ExitCode::SUCCESS)
}
