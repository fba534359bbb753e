//! Appearance driver graph.
//!
//! Every `<param>` of the appearance document becomes a [`Driver`] keyed by
//! `lowercase(name)_id`. Drivers carry morph-target references, per-bone
//! scale/offset deltas, and driven links to other drivers.

pub mod loader;

use std::collections::{BTreeMap, HashMap};

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::error::{DataError, DataResult};

pub use loader::{load_appearance, load_appearance_file, load_appearance_str};

/// Avatar gender used for slider gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    #[default]
    Female,
    Male,
}

impl Gender {
    /// Parses a `sex` attribute.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "female" => Some(Gender::Female),
            "male" => Some(Gender::Male),
            _ => None,
        }
    }

    /// Returns the attribute spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Female => "female",
            Gender::Male => "male",
        }
    }

    /// Numeric encoding used in shape files (`0` female, `1` male).
    pub fn as_value(&self) -> f64 {
        match self {
            Gender::Female => 0.0,
            Gender::Male => 1.0,
        }
    }
}

/// Primary effect of a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverCategory {
    MeshMorph,
    Bone,
    Driven,
}

/// Per-bone delta applied as `value * delta`.
#[derive(Debug, Clone, PartialEq)]
pub struct BoneDelta {
    pub bone: String,
    pub scale: DVec3,
    pub offset: DVec3,
}

/// A morph target on a system mesh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshTarget {
    /// System mesh type (`headMesh`, `upperBodyMesh`, ...).
    pub mesh: String,
    /// Shape key name.
    pub morph: String,
}

/// Trapezoid breakpoints of a driven link.
#[derive(Debug, Clone, PartialEq)]
pub struct DrivenRef {
    /// Child driver id.
    pub child: String,
    pub min1: f64,
    pub max1: f64,
    pub max2: f64,
    pub min2: f64,
}

impl DrivenRef {
    /// Response weight in `[0, 1]` for a parent value `v`.
    ///
    /// `parent_min`/`parent_max` are the parent's declared range; degenerate
    /// edges that touch them saturate to 1.
    pub fn weight(&self, v: f64, parent_min: f64, parent_max: f64) -> f64 {
        if v <= self.min1 {
            if self.min1 == self.max1 && self.min1 <= parent_min {
                1.0
            } else {
                0.0
            }
        } else if v < self.max1 {
            (v - self.min1) / (self.max1 - self.min1)
        } else if v <= self.max2 {
            1.0
        } else if v < self.min2 {
            (self.min2 - v) / (self.min2 - self.max2)
        } else if self.max2 >= parent_max {
            1.0
        } else {
            0.0
        }
    }
}

/// A slider definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Driver {
    pub id: String,
    pub param_id: i64,
    pub name: String,
    pub category: DriverCategory,
    pub min: f64,
    pub max: f64,
    pub default: f64,
    pub sex: Option<Gender>,
    pub edit_group: String,
    pub label_min: Option<String>,
    pub label_max: Option<String>,
    pub meshes: Vec<MeshTarget>,
    pub bones: Vec<BoneDelta>,
    pub driven: Vec<DrivenRef>,
    /// Ids of the drivers that drive this one.
    pub parents: Vec<String>,
}

impl Driver {
    /// Stable id for a parameter name and integer id.
    pub fn make_id(name: &str, param_id: i64) -> String {
        format!("{}_{}", name.to_lowercase(), param_id)
    }

    /// True for user-editable sliders.
    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    /// True when the driver applies to the given gender.
    pub fn applies_to(&self, gender: Gender) -> bool {
        self.sex.map_or(true, |sex| sex == gender)
    }

    /// Internal value for a UI position in `[0, 100]`.
    pub fn value_at(&self, ui: f64) -> f64 {
        self.min + (self.max - self.min) * ui / 100.0
    }

    /// UI position in `[0, 100]` for an internal value.
    pub fn ui_for(&self, value: f64) -> f64 {
        let range = self.max - self.min;
        if range.abs() < f64::EPSILON {
            0.0
        } else {
            ((value - self.min) / range * 100.0).clamp(0.0, 100.0)
        }
    }

    /// UI position of the declared default.
    pub fn default_ui(&self) -> f64 {
        self.ui_for(self.default)
    }
}

/// All drivers keyed by id.
#[derive(Debug, Clone, Default)]
pub struct DriverGraph {
    drivers: BTreeMap<String, Driver>,
    by_param: HashMap<i64, String>,
}

impl DriverGraph {
    pub(crate) fn from_drivers(drivers: BTreeMap<String, Driver>) -> Self {
        let by_param = drivers
            .values()
            .map(|d| (d.param_id, d.id.clone()))
            .collect();
        Self { drivers, by_param }
    }

    /// Looks up a driver by id.
    pub fn get(&self, id: &str) -> Option<&Driver> {
        self.drivers.get(id)
    }

    /// Looks up a driver by its integer parameter id.
    pub fn by_param_id(&self, param_id: i64) -> Option<&Driver> {
        self.by_param.get(&param_id).and_then(|id| self.drivers.get(id))
    }

    /// All drivers in id order.
    pub fn drivers(&self) -> impl Iterator<Item = &Driver> {
        self.drivers.values()
    }

    /// User-editable drivers in id order.
    pub fn root_drivers(&self) -> impl Iterator<Item = &Driver> {
        self.drivers.values().filter(|d| d.is_root())
    }

    /// Number of drivers.
    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    /// True when no drivers are defined.
    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }

    /// Root drivers grouped by edit group.
    pub fn edit_groups(&self) -> BTreeMap<&str, Vec<&Driver>> {
        let mut groups: BTreeMap<&str, Vec<&Driver>> = BTreeMap::new();
        for driver in self.root_drivers() {
            groups.entry(driver.edit_group.as_str()).or_default().push(driver);
        }
        groups
    }

    /// Rejects driven chains that loop back onto themselves.
    pub fn check_cycles(&self) -> DataResult<()> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }
        let mut marks: HashMap<&str, Mark> = HashMap::new();

        for start in self.drivers.keys() {
            if marks.contains_key(start.as_str()) {
                continue;
            }
            // Explicit stack of (driver, next child index).
            let mut stack: Vec<(&str, usize)> = vec![(start.as_str(), 0)];
            marks.insert(start.as_str(), Mark::Visiting);
            while let Some((id, next)) = stack.pop() {
                let driven = self.drivers.get(id).map(|d| d.driven.as_slice()).unwrap_or(&[]);
                let Some(link) = driven.get(next) else {
                    marks.insert(id, Mark::Done);
                    continue;
                };
                stack.push((id, next + 1));
                let child = link.child.as_str();
                match marks.get(child) {
                    Some(Mark::Visiting) => {
                        let mut chain: Vec<String> = stack
                            .iter()
                            .map(|(s, _)| s.to_string())
                            .skip_while(|s| s != child)
                            .collect();
                        chain.push(child.to_string());
                        return Err(DataError::DrivenCycle { chain });
                    }
                    Some(Mark::Done) => {}
                    None => {
                        marks.insert(child, Mark::Visiting);
                        stack.push((child, 0));
                    }
                }
            }
        }
        Ok(())
    }
}
