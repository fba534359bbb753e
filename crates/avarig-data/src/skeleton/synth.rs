//! Post-load synthesis: tail fixups, connectivity, control mirrors,
//! structural and IK bones.

use std::collections::HashMap;

use glam::DVec3;
use log::debug;

use super::limits::{bvh_name, lookup_limits};
use super::rules::placement_rules;
use super::{control_name, layer, Bone, BoneKind, Skeleton, Support, ORIGIN_BONE};

/// Chained bones whose `end` is this close to the child head snap onto it.
const TAIL_SNAP_DISTANCE: f64 = 0.005;
/// Tolerance for treating a parent tail and a child head as coincident.
const CONNECT_EPSILON: f64 = 1e-4;

const CONTROL_SHAPE: &str = "CustomShape_Circle";

fn deform_children(skeleton: &Skeleton, name: &str) -> Vec<String> {
    skeleton
        .bones()
        .filter(|b| b.kind == BoneKind::Deform && b.parent.as_deref() == Some(name))
        .map(|b| b.name.clone())
        .collect()
}

/// Snaps tails onto single children and derives `connected`.
pub(crate) fn finish_tails(skeleton: &mut Skeleton) {
    let deform: Vec<String> = skeleton
        .bones_of_kind(BoneKind::Deform)
        .map(|b| b.name.clone())
        .collect();

    for name in &deform {
        let children = deform_children(skeleton, name);
        if let [only] = children.as_slice() {
            let child_head = skeleton.get(only).map(|b| b.relhead);
            if let (Some(child_head), Some(bone)) = (child_head, skeleton.get_mut(name)) {
                if (bone.reltail - child_head).length() < TAIL_SNAP_DISTANCE {
                    bone.reltail = child_head;
                }
            }
        }
    }

    let mut disagreements = 0usize;
    for name in &deform {
        let Some(parent) = skeleton.get(name).and_then(|b| b.parent.clone()) else {
            continue;
        };
        let connected = match skeleton.get(&parent) {
            Some(p) if p.kind == BoneKind::Deform => {
                let single = deform_children(skeleton, &parent).len() == 1;
                let head = skeleton.get(name).map(|b| b.relhead).unwrap_or(DVec3::ZERO);
                single && (p.reltail - head).length() < CONNECT_EPSILON
            }
            _ => false,
        };
        if let Some(bone) = skeleton.get_mut(name) {
            bone.connected = connected;
            if bone.connected_hint.is_some_and(|hint| hint != connected) {
                disagreements += 1;
            }
        }
    }
    if disagreements > 0 {
        debug!(
            "{} bones declare a connected flag that differs from their geometry; using geometry",
            disagreements
        );
    }
}

/// Names of deform bones whose declared `connected` differs from the derived one.
pub fn connected_mismatches(skeleton: &Skeleton) -> Vec<&str> {
    skeleton
        .bones_of_kind(BoneKind::Deform)
        .filter(|b| b.connected_hint.is_some_and(|hint| hint != b.connected))
        .map(|b| b.name.as_str())
        .collect()
}

/// Adds control, structural, and IK bones and finalizes flags.
pub(crate) fn synthesize(skeleton: &mut Skeleton) {
    let mut abs: HashMap<String, (DVec3, DVec3)> = skeleton.rest_positions();
    let deform: Vec<Bone> = skeleton.bones_of_kind(BoneKind::Deform).cloned().collect();

    let mut placed: Vec<(String, String)> = Vec::new();
    for master in &deform {
        let Some(name) = control_name(&master.name) else {
            continue;
        };
        let parent = master
            .parent
            .as_deref()
            .filter(|p| deform.iter().any(|d| d.name == *p))
            .and_then(control_name)
            .unwrap_or("COG")
            .to_string();
        let mut control = Bone::new(name, BoneKind::Control, master.group).with_parent(parent.clone());
        control.layers |= master.layers & !layer::DEFORM;
        control.roll = master.roll;
        control.connected = master.connected;
        control.support = master.support;
        control.mandatory = master.support == Support::Basic;
        control.custom_shape = Some(CONTROL_SHAPE.to_string());
        if let Some(&pos) = abs.get(&master.name) {
            abs.insert(name.to_string(), pos);
        }
        placed.push((name.to_string(), parent));
        skeleton.insert(control);
    }

    let rules = placement_rules(|n| skeleton.contains(n));
    let mut kept = Vec::with_capacity(rules.len());
    for rule in rules {
        let lookup = |n: &str| abs.get(n).copied();
        let (Some(head), Some(tail)) = (rule.head.resolve(lookup), rule.tail.resolve(lookup)) else {
            debug!("Skipping '{}': anchor bones missing", rule.bone);
            continue;
        };
        abs.insert(rule.bone.clone(), (head, tail));
        let mut bone = Bone::new(rule.bone.clone(), rule.kind, rule.group).with_parent(rule.parent.clone());
        bone.mandatory = rule.bone == "COG";
        placed.push((rule.bone.clone(), rule.parent.clone()));
        skeleton.insert(bone);
        kept.push(rule);
    }

    // Synthesized bones are stored relative to their parents like every
    // other bone.
    for (name, parent) in &placed {
        let Some(&(head, tail)) = abs.get(name) else {
            continue;
        };
        let parent_head = if parent == ORIGIN_BONE {
            DVec3::ZERO
        } else {
            abs.get(parent).map(|p| p.0).unwrap_or(DVec3::ZERO)
        };
        if let Some(bone) = skeleton.get_mut(name) {
            bone.relhead = head - parent_head;
            bone.reltail = tail - head;
        }
    }

    let names: Vec<String> = skeleton.bones().map(|b| b.name.clone()).collect();
    for name in &names {
        let Some(bone) = skeleton.get_mut(name) else {
            continue;
        };
        if matches!(bone.kind, BoneKind::Deform | BoneKind::Control) {
            if let Some((stiffness, limits)) = lookup_limits(&bone.name) {
                bone.stiffness = stiffness;
                bone.limits = Some(limits);
            }
        }
        if bone.kind == BoneKind::Deform {
            bone.bvh_name = Some(bvh_name(&bone.name));
        }
    }

    skeleton.reorder_hierarchically();

    for name in &names {
        let is_root = skeleton.get(name).map_or(false, |bone| {
            !bone.connected
                && bone
                    .children
                    .iter()
                    .filter_map(|c| skeleton.get(c))
                    .any(|c| c.connected)
        });
        if let Some(bone) = skeleton.get_mut(name) {
            bone.is_ik_root = is_root;
        }
    }
    skeleton.set_rules(kept);
}
