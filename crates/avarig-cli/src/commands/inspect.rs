//! Inspect command implementation
//!
//! Loads a reference skeleton and prints bone counts per role.

use anyhow::Result;
use avarig_data::SkeletonSummary;
use avarig_engine::{RigProps, RigSystem};
use colored::Colorize;
use glam::DVec3;
use serde::Serialize;
use std::process::ExitCode;

use super::format_vec;

/// One bone of the listing.
#[derive(Debug, Serialize)]
pub struct BoneListing {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    pub kind: String,
    pub head: DVec3,
    pub tail: DVec3,
}

/// JSON output of the inspect command.
#[derive(Debug, Serialize)]
pub struct InspectOutput {
    pub summary: SkeletonSummary,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bones: Vec<BoneListing>,
}

/// Collects the summary and, with `bones`, the rest geometry of every bone.
pub fn collect(system: &RigSystem, rig: &RigProps, bones: bool) -> Result<InspectOutput> {
    let skeleton = system.skeleton(rig)?;
    let mut listing = Vec::new();
    if bones {
        let rest = skeleton.rest_positions();
        for bone in skeleton.bones() {
            let (head, tail) = rest.get(&bone.name).copied().unwrap_or_default();
            listing.push(BoneListing {
                name: bone.name.clone(),
                parent: bone.parent.clone(),
                kind: format!("{:?}", bone.kind).to_lowercase(),
                head,
                tail,
            });
        }
    }
    Ok(InspectOutput {
        summary: skeleton.summary(),
        bones: listing,
    })
}

/// Run the inspect command
pub fn run(system: &RigSystem, rig: &RigProps, bones: bool, json: bool) -> Result<ExitCode> {
    let output = collect(system, rig, bones)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(ExitCode::SUCCESS);
    }

    let s = &output.summary;
    println!(
        "{} {} rig, {} joints",
        "Skeleton:".cyan().bold(),
        s.rig_type,
        s.joint_type
    );
    println!("  {:<16} {}", "total", s.total);
    println!("  {:<16} {} ({} basic, {} extended)", "deform", s.deform, s.basic_deform, s.extended_deform);
    println!("  {:<16} {}", "volumes", s.volumes);
    println!("  {:<16} {}", "attachments", s.attachments);
    println!("  {:<16} {}", "controls", s.controls);
    println!("  {:<16} {}", "ik", s.ik);
    println!("  {:<16} {}", "structure", s.structure);

    if !output.bones.is_empty() {
        println!();
        println!("{}", "Bones:".bold());
        for bone in &output.bones {
            println!(
                "  {:<24} {:<11} {} {}",
                bone.name,
                bone.kind.dimmed(),
                format_vec(bone.head),
                bone.parent.as_deref().unwrap_or("-").dimmed()
            );
        }
    }
    Ok(ExitCode::SUCCESS)
}
