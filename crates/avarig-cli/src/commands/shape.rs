//! Shape command implementation
//!
//! Builds an avatar, applies a shape file and slider overrides, evaluates,
//! and prints the resulting deform bone heads and joint offsets.

use anyhow::{Context, Result};
use avarig_data::{BoneKind, Gender};
use avarig_engine::{EvaluationReport, RigProps, RigSystem, Scene};
use colored::Colorize;
use glam::DVec3;
use log::warn;
use serde::Serialize;
use std::path::Path;
use std::process::ExitCode;

use super::{format_vec, DEFAULT_ARMATURE};
use crate::overrides::{self, SliderOverride};

/// Inputs of one shape run.
#[derive(Debug, Clone, Default)]
pub struct ShapeRequest<'a> {
    pub rig: RigProps,
    pub file: Option<&'a Path>,
    pub overrides: &'a [SliderOverride],
    pub gender: Option<Gender>,
}

/// A deform bone after evaluation.
#[derive(Debug, Serialize)]
pub struct PlacedBone {
    pub name: String,
    pub head: DVec3,
    pub tail: DVec3,
}

/// A stored joint offset.
#[derive(Debug, Serialize)]
pub struct JointListing {
    pub bone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head: Option<DVec3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tail: Option<DVec3>,
}

/// JSON output of the shape command.
#[derive(Debug, Serialize)]
pub struct ShapeOutput {
    pub evaluation: EvaluationReport,
    /// Parameter ids in the shape file that no slider matched.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unknown: Vec<i64>,
    pub bones: Vec<PlacedBone>,
    pub joints: Vec<JointListing>,
}

/// Evaluates the request into a fresh scene.
pub fn evaluate(system: &RigSystem, request: &ShapeRequest<'_>) -> Result<(Scene, ShapeOutput)> {
    let mut scene = Scene::new();
    system.create_armature(&mut scene, DEFAULT_ARMATURE, request.rig.clone())?;

    let mut unknown = Vec::new();
    if let Some(path) = request.file {
        let (loaded, _) = system
            .load_shape(&mut scene, DEFAULT_ARMATURE, path)
            .with_context(|| format!("Failed to load shape {}", path.display()))?;
        if !loaded.unknown.is_empty() {
            warn!("{} shape entries matched no slider", loaded.unknown.len());
        }
        if !loaded.driven.is_empty() {
            warn!("{} shape entries address driven sliders and were ignored", loaded.driven.len());
        }
        unknown = loaded.unknown;
    }

    let evaluation = system.batch(&mut scene, DEFAULT_ARMATURE, |shape, graph| {
        if let Some(gender) = request.gender {
            shape.set_gender(gender);
        }
        overrides::apply(shape, graph, request.overrides)
    })?;

    let arm = scene.armature(DEFAULT_ARMATURE)?;
    let bones = arm
        .bones()
        .filter(|b| b.kind == BoneKind::Deform)
        .map(|b| PlacedBone {
            name: b.name.clone(),
            head: b.head,
            tail: b.tail,
        })
        .collect();
    let joints = arm
        .joints
        .iter()
        .map(|(bone, offset)| JointListing {
            bone: bone.to_string(),
            head: offset.has_head.then_some(offset.head),
            tail: offset.has_tail.then_some(offset.tail),
        })
        .collect();

    let output = ShapeOutput {
        evaluation,
        unknown,
        bones,
        joints,
    };
    Ok((scene, output))
}

/// Run the shape command
pub fn run(system: &RigSystem, request: &ShapeRequest<'_>, json: bool) -> Result<ExitCode> {
    let (_, output) = evaluate(system, request)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(ExitCode::SUCCESS);
    }

    let e = &output.evaluation;
    println!(
        "{} {} sliders, {} bones placed, toe delta {:.4}",
        "Evaluated:".green().bold(),
        e.sliders,
        e.bones_placed,
        e.toe_delta
    );
    println!();
    println!("{}", "Deform bones:".bold());
    for bone in &output.bones {
        println!("  {:<24} {}", bone.name, format_vec(bone.head));
    }
    if !output.joints.is_empty() {
        println!();
        println!("{}", "Joint offsets:".bold());
        for joint in &output.joints {
            let head = joint.head.map(format_vec).unwrap_or_else(|| "-".into());
            println!("  {:<24} {}", joint.bone, head);
        }
    }
    Ok(ExitCode::SUCCESS)
}
