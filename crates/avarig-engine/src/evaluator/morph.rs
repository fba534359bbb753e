//! Shape-key dispatch for mesh-morph changes.

use avarig_data::DriverGraph;
use log::debug;

use super::expand::Change;
use crate::scene::{MeshObject, SliderSelector};

/// Sets shape keys from the mesh change list. System meshes whose type
/// matches the target take the driver value; custom meshes with a key of the
/// same name take the normalized position along the key's own range.
/// Returns the number of keys set.
pub fn dispatch(graph: &DriverGraph, changes: &[Change], meshes: &mut [&mut MeshObject]) -> usize {
    let mut set = 0;
    for change in changes {
        let Some(driver) = graph.get(&change.driver) else {
            continue;
        };
        let mut morphs: Vec<&str> = Vec::new();
        for target in &driver.meshes {
            if !morphs.contains(&target.morph.as_str()) {
                morphs.push(&target.morph);
            }
            for mesh in meshes.iter_mut() {
                if mesh.mesh_type.as_deref() != Some(target.mesh.as_str()) {
                    continue;
                }
                match mesh.shape_key_mut(&target.morph) {
                    Some(key) => {
                        key.value = change.value;
                        set += 1;
                    }
                    None => debug!("Mesh '{}' has no key '{}'", mesh.name, target.morph),
                }
            }
        }

        for mesh in meshes.iter_mut() {
            if mesh.is_system() || mesh.selector == SliderSelector::None {
                continue;
            }
            for morph in &morphs {
                if let Some(key) = mesh.shape_key_mut(morph) {
                    key.value = key.slider_min + (key.slider_max - key.slider_min) * change.normalized;
                    set += 1;
                }
            }
        }
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::ShapeKey;
    use avarig_data::DataSource;

    #[test]
    fn test_dispatch_system_and_custom() {
        let graph = DataSource::Bundled.load_appearance().unwrap();
        let mut head = MeshObject::new("headMesh", Vec::new());
        head.mesh_type = Some("headMesh".into());
        head.shape_keys.push(ShapeKey::new("Big_Brow"));

        let mut hat = MeshObject::new("Hat", Vec::new());
        hat.selector = SliderSelector::Shape;
        hat.shape_keys.push(ShapeKey {
            name: "Big_Brow".into(),
            value: 0.0,
            slider_min: -1.0,
            slider_max: 1.0,
        });

        let mut loose = MeshObject::new("Loose", Vec::new());
        loose.shape_keys.push(ShapeKey::new("Big_Brow"));

        let changes = vec![Change {
            driver: "big_brow_1".into(),
            value: 2.0,
            normalized: 1.0,
        }];
        let mut meshes = vec![&mut head, &mut hat, &mut loose];
        assert_eq!(dispatch(&graph, &changes, &mut meshes), 2);
        assert_eq!(head.shape_key("Big_Brow").unwrap().value, 2.0);
        assert_eq!(hat.shape_key("Big_Brow").unwrap().value, 1.0);
        assert_eq!(loose.shape_key("Big_Brow").unwrap().value, 0.0);
    }

    #[test]
    fn test_custom_key_set_once_for_shared_morph() {
        let graph = DataSource::Bundled.load_appearance().unwrap();
        let targets: Vec<&str> = graph.get("big_brow_1").unwrap().meshes.iter().map(|m| m.mesh.as_str()).collect();
        assert!(targets.contains(&"headMesh") && targets.contains(&"eyelashMesh"));

        let mut head = MeshObject::new("headMesh", Vec::new());
        head.mesh_type = Some("headMesh".into());
        head.shape_keys.push(ShapeKey::new("Big_Brow"));
        let mut lashes = MeshObject::new("eyelashMesh", Vec::new());
        lashes.mesh_type = Some("eyelashMesh".into());
        lashes.shape_keys.push(ShapeKey::new("Big_Brow"));
        let mut hat = MeshObject::new("Hat", Vec::new());
        hat.selector = SliderSelector::Sl;
        hat.shape_keys.push(ShapeKey {
            name: "Big_Brow".into(),
            value: 0.0,
            slider_min: 0.0,
            slider_max: 2.0,
        });

        let changes = vec![Change {
            driver: "big_brow_1".into(),
            value: 1.0,
            normalized: 0.25,
        }];
        let mut meshes = vec![&mut head, &mut lashes, &mut hat];
        assert_eq!(dispatch(&graph, &changes, &mut meshes), 3);
        assert_eq!(lashes.shape_key("Big_Brow").unwrap().value, 1.0);
        assert_eq!(hat.shape_key("Big_Brow").unwrap().value, 0.5);
    }
}
