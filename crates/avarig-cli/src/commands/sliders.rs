//! Sliders command implementation
//!
//! Lists the root sliders of the appearance data, grouped by edit group.

use anyhow::{bail, Result};
use avarig_engine::RigSystem;
use colored::Colorize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::process::ExitCode;

/// One listed slider.
#[derive(Debug, Clone, Serialize)]
pub struct SliderListing {
    pub id: String,
    pub param_id: i64,
    pub name: String,
    /// Default position on the 0..100 scale.
    pub default: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sex: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_min: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_max: Option<String>,
}

/// Root sliders per edit group, optionally restricted to one group.
pub fn collect(system: &RigSystem, group: Option<&str>) -> Result<BTreeMap<String, Vec<SliderListing>>> {
    let mut out = BTreeMap::new();
    for (name, drivers) in system.graph().edit_groups() {
        if group.is_some_and(|g| g != name) {
            continue;
        }
        let listed: Vec<SliderListing> = drivers
            .into_iter()
            .filter(|d| d.is_root())
            .map(|d| SliderListing {
                id: d.id.clone(),
                param_id: d.param_id,
                name: d.name.clone(),
                default: d.default_ui(),
                sex: d.sex.map(|s| s.as_str().to_string()),
                label_min: d.label_min.clone(),
                label_max: d.label_max.clone(),
            })
            .collect();
        if !listed.is_empty() {
            out.insert(name.to_string(), listed);
        }
    }
    if let Some(g) = group {
        if out.is_empty() {
            bail!("Unknown edit group '{}'", g);
        }
    }
    Ok(out)
}

/// Run the sliders command
pub fn run(system: &RigSystem, group: Option<&str>, json: bool) -> Result<ExitCode> {
    let groups = collect(system, group)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&groups)?);
        return Ok(ExitCode::SUCCESS);
    }

    for (name, sliders) in &groups {
        println!("{} ({})", name.cyan().bold(), sliders.len());
        for s in sliders {
            let range = match (&s.label_min, &s.label_max) {
                (Some(lo), Some(hi)) => format!("{} .. {}", lo, hi),
                _ => String::new(),
            };
            let sex = s.sex.as_deref().map(|x| format!(" [{}]", x)).unwrap_or_default();
            println!(
                "  {:<32} {:>5.1}  {}{}",
                s.id,
                s.default,
                range.dimmed(),
                sex.yellow()
            );
        }
    }
    Ok(ExitCode::SUCCESS)
}
