//! CPU scene assembly over in-memory meshes.

use std::collections::BTreeMap;

use glam::{Mat4, Vec3};
use shader_graph::NodeGraph;
use wavetrace::codegen::ImageFileLoader;
use wavetrace::scene::{
    light_kind, ray_flags, DeviceFace, DeviceVertex, EntityRecord, LightKind, LightRecord, MemoryMeshSource,
    SceneLoader, SceneRecords, ShapeRecord, NO_LIGHT,
};
use wavetrace::Error;

const DIFFUSE: &str = r#"{
    "BSDF": { "type": "BSDF_DIFFUSE", "inputs": {
        "Color": { "type": "RGBA", "value": [0.8, 0.8, 0.8, 1.0] }
    } },
    "Out": { "type": "OUTPUT_MATERIAL", "inputs": {
        "Surface": { "type": "SHADER", "links": [["BSDF", "BSDF"]] }
    } }
}"#;

const LAMP: &str = r#"{
    "Emission": { "type": "EMISSION", "inputs": {
        "Strength": { "type": "VALUE", "value": 10.0 }
    } },
    "Out": { "type": "OUTPUT_MATERIAL", "inputs": {
        "Surface": { "type": "SHADER", "links": [["Emission", "Emission"]] }
    } }
}"#;

const WORLD: &str = r#"{
    "Background": { "type": "BACKGROUND", "inputs": {
        "Strength": { "type": "VALUE", "value": 1.0 }
    } },
    "Out": { "type": "OUTPUT_WORLD", "inputs": {
        "Surface": { "type": "SHADER", "links": [["Background", "Background"]] }
    } }
}"#;

fn vertex(x: f32, y: f32) -> DeviceVertex {
    DeviceVertex {
        position: [x, y, 0.0],
        normal: [0.0, 0.0, 1.0],
        ..Default::default()
    }
}

/// Unit quad in the XY plane, two triangles with palette entries 0 and 1.
fn quad_mesh() -> (Vec<DeviceVertex>, Vec<DeviceFace>) {
    (
        vec![vertex(0.0, 0.0), vertex(1.0, 0.0), vertex(1.0, 1.0), vertex(0.0, 1.0)],
        vec![
            DeviceFace { indices: [0, 1, 2], material: 0 },
            DeviceFace { indices: [0, 2, 3], material: 1 },
        ],
    )
}

fn world_light() -> LightRecord {
    LightRecord {
        name: "World".into(),
        material: "World".into(),
        cast_shadows: true,
        use_mis: true,
        kind: LightKind::World,
    }
}

fn records(entity_count: usize) -> SceneRecords {
    let mut materials = BTreeMap::new();
    materials.insert("Diffuse".to_string(), NodeGraph::from_json(DIFFUSE).unwrap());
    materials.insert("Lamp".to_string(), NodeGraph::from_json(LAMP).unwrap());
    materials.insert("World".to_string(), NodeGraph::from_json(WORLD).unwrap());

    let entities = (0..entity_count)
        .map(|i| EntityRecord {
            name: format!("Quad.{i:03}"),
            shape: if i % 2 == 0 { "Plain" } else { "Glowing" }.into(),
            visibility: ray_flags::ALL,
            transform: Mat4::from_translation(Vec3::new(i as f32 * 3.0, 0.0, 0.0)),
        })
        .collect();

    SceneRecords {
        materials,
        shapes: vec![
            ShapeRecord {
                name: "Plain".into(),
                path: "plain.ply".into(),
                materials: vec!["Diffuse".into(), "Diffuse".into()],
            },
            ShapeRecord {
                name: "Glowing".into(),
                path: "glowing.ply".into(),
                materials: vec!["Diffuse".into(), "Lamp".into()],
            },
        ],
        entities,
        lights: vec![world_light()],
        camera: None,
    }
}

fn loader() -> SceneLoader {
    let mut meshes = MemoryMeshSource::new();
    let (v, f) = quad_mesh();
    meshes.insert("plain.ply", v.clone(), f.clone());
    meshes.insert("glowing.ply", v, f);
    SceneLoader::with_sources(Box::new(meshes), Box::new(ImageFileLoader::new(".")))
}

#[test]
fn test_instances_round_trip_through_the_tlas() {
    let records = records(6);
    let assembly = loader().assemble(&records).unwrap();
    let shapes = &assembly.shapes;
    let entities = &assembly.entities;
    assert_eq!(entities.instances.len(), 6);
    assert_eq!(assembly.lights.uniforms.instance_count, 6);

    for (k, record) in records.entities.iter().enumerate() {
        let origin = Vec3::new(k as f32 * 3.0 + 0.7, 0.2, 5.0);
        let hit = entities
            .accel
            .intersect(origin, Vec3::NEG_Z, f32::MAX, &entities.tlas_instances, |blas, prim| {
                shapes.triangle(shapes.shapes[blas as usize].faces.offset + prim as usize)
            })
            .expect("ray should hit its quad");
        assert_eq!(hit.instance, k as u32);
        assert!((hit.distance - 5.0).abs() < 1e-4);

        let instance = &entities.instances[hit.instance as usize];
        assert_eq!(instance.object_to_world, record.transform.to_cols_array_2d());
        assert_eq!(instance.visibility, record.visibility);
    }
}

#[test]
fn test_emissive_instances_become_shape_lights() {
    let assembly = loader().assemble(&records(4)).unwrap();
    let tables = &assembly.lights;

    // world first, then one shape light per glowing instance
    assert_eq!(tables.lights.len(), 3);
    assert_eq!(tables.lights[0].kind, light_kind::WORLD);
    assert_eq!(tables.uniforms.shape_count, 2);
    assert_eq!(tables.uniforms.light_count, 3);

    let instances = &assembly.entities.instances;
    assert_eq!(instances[0].light, NO_LIGHT);
    assert_eq!(instances[2].light, NO_LIGHT);
    assert_eq!(instances[1].light, 1);
    assert_eq!(instances[3].light, 2);

    for instance in [&instances[1], &instances[3]] {
        let light = &tables.lights[instance.light as usize];
        assert_eq!(light.kind, light_kind::SHAPE);
        // only the second triangle (area 0.5) uses the emissive material
        assert!((light.area - 0.5).abs() < 1e-5);
        let range = instance.light_face_offset as usize..(instance.light_face_offset + instance.light_face_count) as usize;
        assert_eq!(&tables.light_faces[range], &[0.0, 1.0]);
    }
}

#[test]
fn test_face_materials_are_global() {
    let assembly = loader().assemble(&records(2)).unwrap();
    let faces = &assembly.shapes.faces;
    let plain = &assembly.shapes.shapes[0];
    let glowing = &assembly.shapes.shapes[1];
    assert_eq!(plain.name, "Plain");
    assert_eq!(glowing.faces.offset, 2);
    // both shapes share the diffuse material; the lamp is the second surface
    assert_eq!(faces[0].material, faces[2].material);
    assert_ne!(faces[2].material, faces[3].material);
    // vertex indices rebased past the first shape's vertices
    assert_eq!(faces[2].indices, [4, 5, 6]);
}

#[test]
fn test_world_light_is_required() {
    let mut records = records(1);
    records.lights.clear();
    let err = loader().assemble(&records).map(|_| ()).unwrap_err();
    assert!(matches!(err, Error::MissingWorldLight));

    records.lights = vec![world_light(), world_light()];
    let err = loader().assemble(&records).map(|_| ()).unwrap_err();
    assert!(matches!(err, Error::MultipleWorldLights(2)));
}

#[test]
fn test_missing_references_fail() {
    let mut records = records(1);
    records.entities[0].shape = "Nowhere".into();
    let err = loader().assemble(&records).map(|_| ()).unwrap_err();
    assert!(matches!(err, Error::MissingShape(ref name) if name == "Nowhere"));

    let mut records = self::records(1);
    records.shapes[0].materials = vec!["Chrome".into()];
    let err = loader().assemble(&records).map(|_| ()).unwrap_err();
    assert!(matches!(err, Error::MissingMaterial(ref name) if name == "Chrome"));
}
