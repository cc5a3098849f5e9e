//! Scene description files with PLY meshes on disk.

use std::fs;
use std::path::Path;

use wavetrace::scene::{ray_flags, LightKind, SceneDescription, SceneLoader};
use wavetrace::RenderSettings;

const QUAD_PLY: &str = "ply
format ascii 1.0
element vertex 4
property float x
property float y
property float z
property float nx
property float ny
property float nz
property float s
property float t
element face 2
property list uchar uint vertex_indices
property uchar material_index
end_header
-1 -1 0 0 0 1 0 0
1 -1 0 0 0 1 1 0
1 1 0 0 0 1 1 1
-1 1 0 0 0 1 0 1
3 0 1 2 0
3 0 2 3 0
";

const SCENE: &str = r#"{
    "materials": {
        "Grey": {
            "BSDF": { "type": "BSDF_DIFFUSE" },
            "Out": { "type": "OUTPUT_MATERIAL", "inputs": {
                "Surface": { "type": "SHADER", "links": [["BSDF", "BSDF"]] }
            } }
        },
        "Bulb": {
            "Emission": { "type": "EMISSION", "inputs": { "Strength": { "type": "VALUE", "value": 100.0 } } },
            "Out": { "type": "OUTPUT_LIGHT", "inputs": {
                "Surface": { "type": "SHADER", "links": [["Emission", "Emission"]] }
            } }
        }
    },
    "world": {
        "Background": { "type": "BACKGROUND" },
        "Out": { "type": "OUTPUT_WORLD", "inputs": {
            "Surface": { "type": "SHADER", "links": [["Background", "Background"]] }
        } }
    },
    "lights": {
        "Bulb": {
            "type": "POINT",
            "material": "Bulb",
            "parameters": { "location": [0, 0, 3], "power": 50, "color": [1, 1, 1], "radius": 0.1 }
        }
    },
    "shapes": {
        "Floor": { "type": "ply", "filepath": "meshes/quad.ply", "materials": ["Grey"] }
    },
    "entities": {
        "Floor": {
            "shape": "Floor",
            "visibility": { "camera": false },
            "matrix": [4, 0, 0, 0, 0, 4, 0, 0, 0, 0, 1, -1, 0, 0, 0, 1]
        }
    },
    "camera": {
        "near_clip": 0.5,
        "far_clip": 50,
        "film": { "width": 36, "height": 24 },
        "focal_length": 18,
        "transform": [1, 0, 0, 0, 0, 1, 0, 0, 0, 0, 1, 5, 0, 0, 0, 1]
    }
}"#;

fn write_scene(dir: &Path) -> std::path::PathBuf {
    fs::create_dir_all(dir.join("meshes")).unwrap();
    fs::write(dir.join("meshes/quad.ply"), QUAD_PLY).unwrap();
    let path = dir.join("scene.json");
    fs::write(&path, SCENE).unwrap();
    path
}

#[test]
fn test_scene_file_assembles() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_scene(dir.path());

    let records = SceneDescription::from_path(&path).unwrap();
    assert_eq!(records.shapes[0].path, dir.path().join("meshes/quad.ply"));
    assert!(records.lights.iter().any(|l| l.kind == LightKind::World));
    assert_eq!(records.entities[0].visibility & ray_flags::CAMERA, 0);

    let assembly = SceneLoader::new(dir.path()).assemble(&records).unwrap();
    assert_eq!(assembly.shapes.faces.len(), 2);
    assert_eq!(assembly.lights.uniforms.point_count, 1);
    assert_eq!(assembly.lights.uniforms.light_count, 2);

    // floor scaled by 4 and lowered by 1
    let bounds = &assembly.entities.tlas_instances[0].bounds;
    assert!((bounds.max[0] - 4.0).abs() < 1e-5);
    assert!((bounds.min[2] + 1.0).abs() < 1e-5);

    let camera = assembly.camera;
    assert_eq!(camera.near, 0.5);
    assert!((camera.focal - 1.0).abs() < 1e-6);
    assert_eq!(camera.transform.w_axis.z, 5.0);

    assert!(assembly.materials.codegen().body().contains("fn s_bulb("));
}

#[test]
fn test_missing_mesh_fails_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_scene(dir.path());
    fs::remove_file(dir.path().join("meshes/quad.ply")).unwrap();

    let records = SceneDescription::from_path(&path).unwrap();
    assert!(SceneLoader::new(dir.path()).assemble(&records).is_err());
}

#[test]
fn test_settings_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wavetrace").join("settings.json");
    let settings = RenderSettings {
        max_depth: 4,
        collect_statistics: true,
        ..Default::default()
    };
    settings.save_to(&path).unwrap();
    let text = fs::read_to_string(&path).unwrap();
    assert!(text.contains("\"max_depth\": 4"));
    assert_eq!(RenderSettings::load_from(&path), settings);
}
