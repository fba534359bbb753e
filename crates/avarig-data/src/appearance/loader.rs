//! Appearance document loader (`<linden_genepool>`).

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use glam::DVec3;
use log::{debug, warn};

use super::{BoneDelta, Driver, DriverCategory, DriverGraph, DrivenRef, Gender, MeshTarget};
use crate::axis::{s2b, s2b_scale};
use crate::error::{DataError, DataResult};
use crate::xml_tree::{self, Element};

const ROOT_TAG: &str = "linden_genepool";

/// Loads the appearance document from disk.
pub fn load_appearance_file(path: &Path) -> DataResult<DriverGraph> {
    let text = fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => DataError::AppearanceFileMissing {
            path: path.to_path_buf(),
        },
        _ => DataError::Io(e),
    })?;
    load_appearance_str(&text)
}

/// Loads the appearance document from memory.
pub fn load_appearance_str(text: &str) -> DataResult<DriverGraph> {
    let root = xml_tree::parse_str(text).map_err(|e| match e {
        DataError::Xml(inner) => DataError::appearance_parse(inner.to_string()),
        DataError::SkeletonParseError { message } => DataError::appearance_parse(message),
        other => other,
    })?;
    load_appearance(&root)
}

/// Builds the driver graph from a parsed document.
pub fn load_appearance(root: &Element) -> DataResult<DriverGraph> {
    if root.name != ROOT_TAG {
        return Err(DataError::appearance_parse(format!(
            "unexpected root element <{}>",
            root.name
        )));
    }

    let mut drivers: BTreeMap<String, Driver> = BTreeMap::new();

    if let Some(skeleton) = root.child("skeleton") {
        for param in skeleton.children_named("param") {
            let driver = entry(&mut drivers, param, DriverCategory::Bone)?;
            if let Some(section) = param.child("param_skeleton") {
                for bone in section.children_named("bone") {
                    driver.bones.push(bone_delta(bone, "offset")?);
                }
            }
        }
    }

    for mesh in root.children_named("mesh") {
        let lod = mesh.attr("lod").unwrap_or("0").trim();
        if lod != "0" {
            continue;
        }
        let mesh_type = mesh
            .attr("type")
            .ok_or_else(|| DataError::appearance_parse("mesh without a type"))?;
        for param in mesh.children_named("param") {
            let driver = entry(&mut drivers, param, DriverCategory::MeshMorph)?;
            let target = MeshTarget {
                mesh: mesh_type.to_string(),
                morph: driver.name.clone(),
            };
            if !driver.meshes.contains(&target) {
                driver.meshes.push(target);
            }
            if let Some(morph) = param.child("param_morph") {
                for volume in morph.children_named("volume_morph") {
                    let delta = bone_delta(volume, "pos")?;
                    if !driver.bones.iter().any(|b| b.bone == delta.bone) {
                        driver.bones.push(delta);
                    }
                }
            }
        }
    }

    // Driven links reference children by integer id; children may be
    // declared anywhere in the document.
    let mut links: Vec<(String, Vec<(i64, Element)>)> = Vec::new();
    if let Some(section) = root.child("driver_parameters") {
        for param in section.children_named("param") {
            let driver = entry(&mut drivers, param, DriverCategory::Driven)?;
            let id = driver.id.clone();
            let mut children = Vec::new();
            if let Some(pd) = param.child("param_driver") {
                for driven in pd.children_named("driven") {
                    let child = driven
                        .attr("id")
                        .ok_or_else(|| DataError::appearance_parse("driven entry without an id"))?;
                    let child_id = parse_int("id", child)?;
                    children.push((child_id, driven.clone()));
                }
            }
            links.push((id, children));
        }
    }

    let id_by_param: BTreeMap<i64, String> = drivers
        .values()
        .map(|d| (d.param_id, d.id.clone()))
        .collect();
    for (parent_id, children) in links {
        let Some((pmin, pmax)) = drivers.get(&parent_id).map(|d| (d.min, d.max)) else {
            continue;
        };
        let mut refs = Vec::new();
        for (child_param, el) in children {
            let Some(child) = id_by_param.get(&child_param) else {
                warn!(
                    "Driver '{}' references unknown driven id {}, dropped",
                    parent_id, child_param
                );
                continue;
            };
            refs.push(DrivenRef {
                child: child.clone(),
                min1: el.f64("min1")?.unwrap_or(pmin),
                max1: el.f64("max1")?.unwrap_or(pmax),
                max2: el.f64("max2")?.unwrap_or(pmax),
                min2: el.f64("min2")?.unwrap_or(pmax),
            });
            if let Some(c) = drivers.get_mut(child) {
                if !c.parents.contains(&parent_id) {
                    c.parents.push(parent_id.clone());
                }
            }
        }
        if let Some(parent) = drivers.get_mut(&parent_id) {
            parent.driven = refs;
        }
    }

    let graph = DriverGraph::from_drivers(drivers);
    graph.check_cycles()?;
    debug!("Loaded {} appearance drivers", graph.len());
    Ok(graph)
}

/// Returns the driver for a `<param>`, creating it on first sight.
fn entry<'a>(
    drivers: &'a mut BTreeMap<String, Driver>,
    param: &Element,
    category: DriverCategory,
) -> DataResult<&'a mut Driver> {
    let param_id = parse_int(
        "id",
        param
            .attr("id")
            .ok_or_else(|| DataError::appearance_parse("param without an id"))?,
    )?;
    let name = param
        .attr("name")
        .ok_or_else(|| DataError::appearance_parse(format!("param {} without a name", param_id)))?;
    let id = Driver::make_id(name, param_id);

    let min = param.f64("value_min")?.unwrap_or(0.0);
    let max = param.f64("value_max")?.unwrap_or(1.0);
    let default = param.f64("value_default")?.unwrap_or(min).clamp(min.min(max), max.max(min));
    let driver = drivers.entry(id.clone()).or_insert_with(|| Driver {
        id,
        param_id,
        name: name.to_string(),
        category,
        min,
        max,
        default,
        sex: param.attr("sex").and_then(Gender::parse),
        edit_group: param.attr("edit_group").unwrap_or("").to_string(),
        label_min: param.attr("label_min").map(str::to_string),
        label_max: param.attr("label_max").map(str::to_string),
        meshes: Vec::new(),
        bones: Vec::new(),
        driven: Vec::new(),
        parents: Vec::new(),
    });
    if category == DriverCategory::Driven {
        driver.category = DriverCategory::Driven;
    } else if category == DriverCategory::MeshMorph && driver.category == DriverCategory::Bone {
        driver.category = DriverCategory::MeshMorph;
    }
    Ok(driver)
}

fn bone_delta(el: &Element, offset_attr: &str) -> DataResult<BoneDelta> {
    let bone = el
        .attr("name")
        .ok_or_else(|| DataError::appearance_parse("bone entry without a name"))?;
    Ok(BoneDelta {
        bone: bone.to_string(),
        scale: s2b_scale(el.vec3("scale")?.unwrap_or(DVec3::ZERO)),
        offset: s2b(el.vec3(offset_attr)?.unwrap_or(DVec3::ZERO)),
    })
}

fn parse_int(attribute: &str, value: &str) -> DataResult<i64> {
    value
        .trim()
        .parse()
        .map_err(|_| DataError::invalid_number(attribute, value))
}
