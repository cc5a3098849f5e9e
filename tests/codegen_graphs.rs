//! Shader graph compilation scenarios, checked on the emitted WGSL text.

use shader_graph::NodeGraph;
use wavetrace::codegen::{Codegen, MaterialType, TextureSource};
use wavetrace::Error;

fn graph(json: &str) -> NodeGraph {
    NodeGraph::from_json(json).expect("graph JSON")
}

/// Positions of `needle` in `haystack`, in order.
fn positions(haystack: &str, needle: &str) -> Vec<usize> {
    haystack.match_indices(needle).map(|(i, _)| i).collect()
}

#[test]
fn test_value_mix_output_scenario() {
    let g = graph(
        r#"{
        "A": { "type": "VALUE", "parameters": { "value": 0.5 } },
        "B": { "type": "MIX", "inputs": {
            "A_Float": { "type": "VALUE", "links": [["A", "Value"]] },
            "B_Float": { "type": "VALUE", "value": 1.0 }
        } },
        "C": { "type": "OUTPUT_MATERIAL", "inputs": {
            "Surface": { "type": "SHADER", "links": [["B", "Result_Float"]] }
        } }
    }"#,
    );

    let mut codegen = Codegen::new();
    let index = codegen.add_material("Material", &g, MaterialType::Surface).unwrap();
    assert_eq!(index, 0);

    let body = codegen.body();
    let value = positions(body, "Value_compute(");
    let mix = positions(body, "Mix_compute(");
    assert_eq!(value.len(), 1);
    assert_eq!(mix.len(), 1);
    assert!(value[0] < mix[0], "A must be emitted before B");
    assert_eq!(positions(body, "OutputMaterial_compute(").len(), 1);
    assert_eq!(positions(body, "_compute(").len(), 3);
    assert!(body.contains("n_b.a_float = n_a.value;"));
    assert!(body.contains("n_b.b_float = vec4f(1.0, 1.0, 1.0, 1.0);"));

    assert_eq!(codegen.surfaces(), &["s_material"]);
    let source = codegen.source(&[]);
    assert_eq!(positions(&source, "case 0u: { s_material(shading); }").len(), 1);
}

#[test]
fn test_cycle_fails_without_output() {
    let g = graph(
        r#"{
        "M1": { "type": "MATH", "inputs": { "Value": { "type": "VALUE", "links": [["M2", "Value"]] } } },
        "M2": { "type": "MATH", "inputs": { "Value": { "type": "VALUE", "links": [["M1", "Value"]] } } },
        "Out": { "type": "OUTPUT_MATERIAL", "inputs": {
            "Displacement": { "type": "VECTOR", "links": [["M1", "Value"]] }
        } }
    }"#,
    );

    let mut codegen = Codegen::new();
    let err = codegen.add_material("Loop", &g, MaterialType::Surface).unwrap_err();
    assert!(matches!(err, Error::CycleDetected { .. }), "{err}");
    assert!(codegen.body().is_empty());
    assert!(codegen.surfaces().is_empty());
}

#[test]
fn test_self_link_is_a_cycle() {
    let g = graph(
        r#"{
        "M": { "type": "MATH", "inputs": { "Value": { "type": "VALUE", "links": [["M", "Value"]] } } },
        "Out": { "type": "OUTPUT_MATERIAL", "inputs": {
            "Displacement": { "type": "VECTOR", "links": [["M", "Value"]] }
        } }
    }"#,
    );
    let err = Codegen::new()
        .add_material("Self", &g, MaterialType::Surface)
        .unwrap_err();
    assert!(matches!(err, Error::CycleDetected { node } if node == "M"));
}

#[test]
fn test_fan_in_fails() {
    let g = graph(
        r#"{
        "V1": { "type": "VALUE" },
        "V2": { "type": "VALUE" },
        "Math": { "type": "MATH", "inputs": {
            "Value": { "type": "VALUE", "links": [["V1", "Value"], ["V2", "Value"]] }
        } },
        "Out": { "type": "OUTPUT_MATERIAL", "inputs": {
            "Displacement": { "type": "VECTOR", "links": [["Math", "Value"]] }
        } }
    }"#,
    );
    let err = Codegen::new()
        .add_material("Fan", &g, MaterialType::Surface)
        .unwrap_err();
    match err {
        Error::MultiInputDetected { node, input } => {
            assert_eq!(node, "Math");
            assert_eq!(input, "Value");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_shared_node_emitted_once() {
    let g = graph(
        r#"{
        "V": { "type": "VALUE", "parameters": { "value": 2.0 } },
        "Math": { "type": "MATH", "inputs": {
            "Value": { "type": "VALUE", "links": [["V", "Value"]] },
            "Value_001": { "type": "VALUE", "links": [["V", "Value"]] }
        } },
        "Out": { "type": "OUTPUT_MATERIAL", "inputs": {
            "Displacement": { "type": "VECTOR", "links": [["Math", "Value"]] }
        } }
    }"#,
    );
    let mut codegen = Codegen::new();
    codegen.add_material("Diamond", &g, MaterialType::Surface).unwrap();
    let body = codegen.body();
    assert_eq!(positions(body, "Value_compute(").len(), 1);
    assert!(positions(body, "Value_compute(")[0] < positions(body, "Math_compute(")[0]);
}

#[test]
fn test_unreachable_nodes_are_skipped() {
    let g = graph(
        r#"{
        "Orphan": { "type": "TEX_NOISE" },
        "Out": { "type": "OUTPUT_MATERIAL" }
    }"#,
    );
    let mut codegen = Codegen::new();
    codegen.add_material("Plain", &g, MaterialType::Surface).unwrap();
    assert!(!codegen.body().contains("TexNoise_compute("));
}

#[test]
fn test_unknown_kernel_is_fatal() {
    let g = graph(
        r#"{
        "Script": { "type": "SCRIPT" },
        "Out": { "type": "OUTPUT_MATERIAL", "inputs": {
            "Surface": { "type": "SHADER", "links": [["Script", "BSDF"]] }
        } }
    }"#,
    );
    let err = Codegen::new()
        .add_material("Scripted", &g, MaterialType::Surface)
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedKernel(ref tag) if tag == "SCRIPT"));
}

#[test]
fn test_texture_paths_are_deduplicated() {
    let wood = r#"{
        "Tex": { "type": "TEX_IMAGE", "parameters": { "filepath": "wood.png" } },
        "Out": { "type": "OUTPUT_MATERIAL", "inputs": {
            "Surface": { "type": "SHADER", "links": [["Tex", "Color"]] }
        } }
    }"#;
    let mixed = r#"{
        "A": { "type": "TEX_IMAGE", "parameters": { "filepath": "wood.png" } },
        "B": { "type": "TEX_IMAGE", "parameters": { "filepath": "stone.png" } },
        "Mix": { "type": "MIX_RGB", "inputs": {
            "Color1": { "type": "RGBA", "links": [["A", "Color"]] },
            "Color2": { "type": "RGBA", "links": [["B", "Color"]] }
        } },
        "Out": { "type": "OUTPUT_MATERIAL", "inputs": {
            "Surface": { "type": "SHADER", "links": [["Mix", "Color"]] }
        } }
    }"#;

    let mut codegen = Codegen::new();
    codegen.add_material("Wood", &graph(wood), MaterialType::Surface).unwrap();
    codegen.add_material("Wood", &graph(wood), MaterialType::Surface).unwrap();
    assert_eq!(codegen.textures().len(), 1);

    codegen.add_material("Mixed", &graph(mixed), MaterialType::Surface).unwrap();
    let sources = codegen.textures().sources();
    assert_eq!(sources.len(), 2);
    assert!(matches!(&sources[0], TextureSource::File(p) if p.ends_with("wood.png")));
    assert!(matches!(&sources[1], TextureSource::File(p) if p.ends_with("stone.png")));
    assert_eq!(codegen.surfaces(), &["s_wood", "s_wood2", "s_mixed"]);
}

#[test]
fn test_world_graph_goes_to_light_table() {
    let g = graph(
        r#"{
        "Background": { "type": "BACKGROUND", "inputs": {
            "Color": { "type": "RGBA", "value": [0.2, 0.3, 0.4, 1.0] },
            "Strength": { "type": "VALUE", "value": 1.0 }
        } },
        "World Output": { "type": "OUTPUT_WORLD", "inputs": {
            "Surface": { "type": "SHADER", "links": [["Background", "Background"]] }
        } }
    }"#,
    );
    let mut codegen = Codegen::new();
    assert_eq!(codegen.add_material("World", &g, MaterialType::Light).unwrap(), 0);
    assert!(codegen.surfaces().is_empty());
    assert_eq!(codegen.lights(), &["s_world"]);
    let source = codegen.source(&[]);
    assert!(source.contains("fn shade_light(shader: u32"));
    assert!(source.contains("case 0u: { s_world(shading); }"));
}
