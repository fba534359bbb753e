//! Tests for binding custom meshes to the sliders.

use avarig_engine::{BindStatus, EngineError, MeshObject, RigProps, RigSystem, Scene, SliderSelector};
use glam::DVec3;
use pretty_assertions::assert_eq;

// =============================================================================
// Helper Functions
// =============================================================================

fn avatar(props: RigProps) -> (RigSystem, Scene) {
    let rig = RigSystem::bundled().unwrap();
    let mut scene = Scene::new();
    rig.create_armature(&mut scene, "Avatar", props).unwrap();
    (rig, scene)
}

/// A 40 x 25 vertex plane in front of the chest.
fn chest_plane(scene: &Scene) -> MeshObject {
    let chest = scene.armature("Avatar").unwrap().bone("mChest").unwrap().head;
    let mut vertices = Vec::with_capacity(1000);
    for i in 0..40 {
        for j in 0..25 {
            let x = -0.2 + 0.4 * i as f64 / 39.0;
            let z = chest.z - 0.1 + 0.25 * j as f64 / 24.0;
            vertices.push(DVec3::new(x, -0.12, z));
        }
    }
    MeshObject::new("Plane", vertices).with_parent("Avatar")
}

fn max_distance(a: &[DVec3], b: &[DVec3]) -> f64 {
    a.iter().zip(b).map(|(p, q)| (*p - *q).length()).fold(0.0, f64::max)
}

// =============================================================================
// Reconstruction Tests
// =============================================================================

#[test]
fn test_chest_plane_follows_torso_muscles() {
    let (rig, mut scene) = avatar(RigProps::default());
    let mut plane = chest_plane(&scene);
    plane.assign_all("mChest", 1.0);
    let original = plane.vertices.clone();
    scene.add_mesh(plane);

    let attach = rig.attach(&mut scene, "Avatar", "Plane").unwrap();
    assert!(attach.converged());
    let bind_head = scene.armature("Avatar").unwrap().bone("mChest").unwrap().head;

    let report = rig.set_slider(&mut scene, "Avatar", "torso_muscles_678", 100.0).unwrap();
    let mesh_report = report.mesh("Plane").unwrap();
    assert_eq!(mesh_report.status, BindStatus::Matched);
    assert!(mesh_report.iterations <= 2);
    assert!(mesh_report.converged());

    let arm = scene.armature("Avatar").unwrap();
    let now_head = arm.bone("mChest").unwrap().head;
    let scale = DVec3::ONE + arm.shape.accumulator("mChest").scale;
    assert!(scale.x > 1.0 && scale.y > 1.0);
    let plane = scene.mesh("Plane").unwrap();
    for (v, moved) in original.iter().zip(&plane.vertices) {
        let expected = scale * (*v - bind_head) + now_head;
        assert!((*moved - expected).length() < 1e-9, "{moved:?} != {expected:?}");
    }
}

#[test]
fn test_blended_weights_converge() {
    let (rig, mut scene) = avatar(RigProps::default());
    let mut plane = chest_plane(&scene);
    let count = plane.vertices.len();
    for v in 0..count {
        let t = v as f64 / count as f64;
        plane.assign(v, "mChest", 1.0 - t);
        plane.assign(v, "mNeck", t);
    }
    scene.add_mesh(plane);
    rig.attach(&mut scene, "Avatar", "Plane").unwrap();

    let report = rig
        .batch(&mut scene, "Avatar", |shape, graph| {
            shape.set(graph, "torso_muscles_678", 100.0)?;
            shape.set(graph, "height_33", 90.0)?;
            Ok(())
        })
        .unwrap();
    let mesh = report.mesh("Plane").unwrap();
    assert!(mesh.converged(), "{} vertices out of tolerance", mesh.unconverged);
    assert!(mesh.max_error <= mesh.threshold);
}

#[test]
fn test_mesh_bound_on_a_shape_returns_to_it() {
    let (rig, mut scene) = avatar(RigProps::default());
    rig.set_slider(&mut scene, "Avatar", "torso_muscles_678", 90.0).unwrap();
    let mut plane = chest_plane(&scene);
    plane.assign_all("mChest", 1.0);
    let original = plane.vertices.clone();
    scene.add_mesh(plane);
    rig.attach(&mut scene, "Avatar", "Plane").unwrap();

    rig.set_slider(&mut scene, "Avatar", "torso_muscles_678", 50.0).unwrap();
    assert!(max_distance(&scene.mesh("Plane").unwrap().vertices, &original) > 1e-4);

    rig.set_slider(&mut scene, "Avatar", "torso_muscles_678", 90.0).unwrap();
    assert!(max_distance(&scene.mesh("Plane").unwrap().vertices, &original) < 1e-6);
}

#[test]
fn test_neutral_bind_pose_moves_mesh_on_current_shape() {
    let props = RigProps {
        use_bind_pose: false,
        ..RigProps::default()
    };
    let (rig, mut scene) = avatar(props);
    rig.set_slider(&mut scene, "Avatar", "torso_muscles_678", 100.0).unwrap();
    let mut plane = chest_plane(&scene);
    plane.assign_all("mChest", 1.0);
    let original = plane.vertices.clone();
    scene.add_mesh(plane);
    rig.attach(&mut scene, "Avatar", "Plane").unwrap();

    rig.evaluate(&mut scene, "Avatar").unwrap();
    assert!(max_distance(&scene.mesh("Plane").unwrap().vertices, &original) > 1e-4);
}

#[test]
fn test_unweighted_vertices_keep_their_shape() {
    let (rig, mut scene) = avatar(RigProps::default());
    let mut plane = chest_plane(&scene);
    plane.assign(0, "mChest", 1.0);
    plane.assign(1, "NotABone", 1.0);
    let original = plane.vertices.clone();
    scene.add_mesh(plane);

    let attach = rig.attach(&mut scene, "Avatar", "Plane").unwrap();
    assert_eq!(attach.unweighted, original.len() - 1);
    rig.set_slider(&mut scene, "Avatar", "torso_muscles_678", 100.0).unwrap();
    let plane = scene.mesh("Plane").unwrap();
    assert_eq!(&plane.vertices[1..], &original[1..]);
    assert!(plane.groups.contains(&"NotABone".to_string()));
}

// =============================================================================
// Selector Tests
// =============================================================================

#[test]
fn test_shape_selector_skips_reconstruction() {
    let (rig, mut scene) = avatar(RigProps::default());
    let mut plane = chest_plane(&scene);
    plane.assign_all("mChest", 1.0);
    let original = plane.vertices.clone();
    scene.add_mesh(plane);
    rig.attach(&mut scene, "Avatar", "Plane").unwrap();
    assert_eq!(scene.mesh("Plane").unwrap().selector, SliderSelector::Sl);

    scene.mesh_mut("Plane").unwrap().selector = SliderSelector::Shape;
    let report = rig.set_slider(&mut scene, "Avatar", "torso_muscles_678", 100.0).unwrap();
    assert!(report.mesh("Plane").is_none());
    assert_eq!(scene.mesh("Plane").unwrap().vertices, original);
}

#[test]
fn test_system_mesh_cannot_be_bound() {
    let (rig, mut scene) = avatar(RigProps::default());
    rig.create_system_meshes(&mut scene, "Avatar").unwrap();
    let err = rig.attach(&mut scene, "Avatar", "Avatar.headMesh").unwrap_err();
    assert!(matches!(err, EngineError::SystemMesh { .. }));
}

// =============================================================================
// Detach and Mismatch Tests
// =============================================================================

#[test]
fn test_detach_with_reset_restores_original() {
    let (rig, mut scene) = avatar(RigProps::default());
    let mut plane = chest_plane(&scene);
    plane.assign_all("mChest", 1.0);
    let original = plane.vertices.clone();
    scene.add_mesh(plane);
    rig.attach(&mut scene, "Avatar", "Plane").unwrap();
    rig.set_slider(&mut scene, "Avatar", "torso_muscles_678", 100.0).unwrap();
    rig.set_slider(&mut scene, "Avatar", "torso_muscles_678", 0.0).unwrap();

    rig.detach(&mut scene, "Plane", true).unwrap();
    let plane = scene.mesh("Plane").unwrap();
    assert!(plane.bind.is_none());
    assert!(max_distance(&plane.vertices, &original) < 1e-6);
    assert!(matches!(
        rig.detach(&mut scene, "Plane", true),
        Err(EngineError::NotBound { .. })
    ));
}

#[test]
fn test_detach_without_reset_keeps_current_shape() {
    let (rig, mut scene) = avatar(RigProps::default());
    let mut plane = chest_plane(&scene);
    plane.assign_all("mChest", 1.0);
    scene.add_mesh(plane);
    rig.attach(&mut scene, "Avatar", "Plane").unwrap();
    rig.set_slider(&mut scene, "Avatar", "torso_muscles_678", 100.0).unwrap();
    let shaped = scene.mesh("Plane").unwrap().vertices.clone();

    rig.detach(&mut scene, "Plane", false).unwrap();
    assert_eq!(scene.mesh("Plane").unwrap().vertices, shaped);
}

#[test]
fn test_vertex_count_mismatch() {
    let (rig, mut scene) = avatar(RigProps::default());
    let mut plane = chest_plane(&scene);
    plane.assign_all("mChest", 1.0);
    scene.add_mesh(plane);
    rig.attach(&mut scene, "Avatar", "Plane").unwrap();

    let mesh = scene.mesh_mut("Plane").unwrap();
    mesh.vertices.push(DVec3::new(0.0, 0.0, 3.0));
    mesh.weights.push(Vec::new());
    let report = rig.set_slider(&mut scene, "Avatar", "torso_muscles_678", 60.0).unwrap();
    assert_eq!(
        report.mesh("Plane").unwrap().status,
        BindStatus::Padded {
            stored: 1000,
            current: 1001
        }
    );
    assert_eq!(scene.mesh("Plane").unwrap().vertices[1000], DVec3::new(0.0, 0.0, 3.0));

    let mesh = scene.mesh_mut("Plane").unwrap();
    mesh.vertices.truncate(10);
    mesh.weights.truncate(10);
    let before = mesh.vertices.clone();
    let report = rig.set_slider(&mut scene, "Avatar", "torso_muscles_678", 20.0).unwrap();
    assert!(report.ran());
    assert_eq!(
        report.mesh("Plane").unwrap().status,
        BindStatus::Refused {
            stored: 1001,
            current: 10
        }
    );
    assert_eq!(scene.mesh("Plane").unwrap().vertices, before);
}
