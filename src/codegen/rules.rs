//! Translation rules from graph kernels to WGSL kernel invocations.
//!
//! [`kernel_name`] is the capability table: every [`Kernel`] variant maps to
//! one WGSL kernel or to `None` (unsupported). Whether the WGSL kernel is
//! native or a stub comes from its signature.

use shader_graph::{ColorRampParams, Kernel, TexSkyParams};

use super::invocation::{KernelInvocation, Parameter, float_literal, vec4_literal};
use super::signature::{KernelSignature, signature};
use super::sky::{HOSEK_SCALE, SkyModel};
use super::textures::{TextureRegistry, TextureSource};
use crate::util::{Error, Result};

/// Longest color ramp the `ColorRamp` kernel stores.
pub const MAX_RAMP_ELEMENTS: usize = 32;

/// How a kernel is compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Native,
    /// Compiles with a generated fallback; a warning is logged.
    Stub,
    /// Fails compilation with [`Error::UnsupportedKernel`].
    Unsupported,
}

/// WGSL kernel implementing `kernel`, or `None` when there is none.
pub fn kernel_name(kernel: &Kernel) -> Option<&'static str> {
    use Kernel::*;
    let name = match kernel {
        OutputMaterial => "OutputMaterial",
        OutputWorld => "OutputWorld",
        OutputLight => "OutputLight",
        BsdfPrincipled(_) => "BsdfPrincipled",
        BsdfDiffuse => "BsdfDiffuse",
        BsdfGlossy(_) => "BsdfGlossy",
        BsdfGlass(_) => "BsdfGlass",
        BsdfTransparent => "BsdfTransparent",
        BsdfTranslucent => "BsdfTranslucent",
        BsdfRefraction(_) => "BsdfRefraction",
        BsdfAnisotropic(_) => "BsdfAnisotropic",
        BsdfVelvet => "BsdfVelvet",
        BsdfHair => "BsdfHair",
        Emission => "Emission",
        Background => "Background",
        AddShader => "AddShader",
        MixShader => "MixShader",
        VolumeScatter => "VolumeScatter",
        TexImage(_) => "TexImage",
        TexEnvironment(_) => "TexEnvironment",
        TexSky(params) => match params.sky_type.as_str() {
            "NISHITA" | "HOSEK_WILKIE" => "TexNishita",
            _ => return None,
        },
        TexChecker => "TexChecker",
        TexNoise(_) => "TexNoise",
        TexGradient(_) => "TexGradient",
        TexWave(_) => "TexWave",
        TexIes => "TexIes",
        TexMagic => "TexMagic",
        TexVoronoi => "TexVoronoi",
        TexMusgrave => "TexMusgrave",
        TexBrick => "TexBrick",
        ColorRamp(_) => "ColorRamp",
        MixRgb(_) => "MixRgb",
        Mix(_) => "Mix",
        Invert => "Invert",
        RgbToBw => "RgbToBw",
        SeparateColor(_) => "SeparateColor",
        CombineColor(_) => "CombineColor",
        HueSaturation => "HueSaturation",
        BrightnessContrast => "BrightnessContrast",
        Gamma => "Gamma",
        ColorCurves => "ColorCurves",
        Blackbody => "Blackbody",
        Mapping(_) => "Mapping",
        NormalMap(_) => "NormalMap",
        Bump => "Bump",
        Displacement => "Displacement",
        SeparateXyz => "SeparateXyz",
        CombineXyz => "CombineXyz",
        VectorMath(_) => "VectorMath",
        MapRange(_) => "MapRange",
        Math(_) => "Math",
        Value(_) => "Value",
        Rgb(_) => "Rgb",
        TextureCoordinate => "TextureCoordinate",
        NewGeometry => "NewGeometry",
        LightPath => "LightPath",
        Fresnel => "Fresnel",
        LayerWeight => "LayerWeight",
        UvMap(_) => "UvMap",
        Attribute => "Attribute",
        ObjectInfo => "ObjectInfo",
        ParticleInfo => "ParticleInfo",
        LightFalloff => "LightFalloff",
        VertexColor => "VertexColor",
        Normal => "NormalProduct",
        AmbientOcclusion => "AmbientOcclusion",
        Unknown(_) => return None,
    };
    Some(name)
}

pub fn kernel_signature(kernel: &Kernel) -> Option<&'static KernelSignature> {
    kernel_name(kernel).and_then(signature)
}

pub fn capability(kernel: &Kernel) -> Capability {
    match kernel_signature(kernel) {
        None => Capability::Unsupported,
        Some(sig) if sig.is_stub() => Capability::Stub,
        Some(_) => Capability::Native,
    }
}

/// Inputs whose literal default is replaced by a shading-context value.
pub fn context_defaults(kernel: &str) -> &'static [(&'static str, &'static str)] {
    const MAPPED_UV: &[(&str, &str)] = &[("vector", "vec4f((*shading).uv, 0.0)")];
    const GENERATED_UV: &[(&str, &str)] = &[("vector", "vec4f((*shading).generated, 0.0)")];
    const SHADING_NORMAL: &[(&str, &str)] = &[("normal", "vec4f((*shading).normal, 0.0)")];
    match kernel {
        "TexImage" => MAPPED_UV,
        "TexChecker" | "TexNoise" | "TexEnvironment" | "TexNishita" | "TexGradient" | "TexWave" => {
            GENERATED_UV
        }
        "Fresnel" | "LayerWeight" | "BsdfGlass" | "BsdfGlossy" | "BsdfDiffuse"
        | "BsdfPrincipled" | "BsdfTranslucent" | "BsdfRefraction" | "BsdfAnisotropic"
        | "BsdfVelvet" | "Bump" | "AmbientOcclusion" | "Displacement" => SHADING_NORMAL,
        _ => &[],
    }
}

/// Builds the invocation for one node, registering any textures it uses.
pub fn translate(kernel: &Kernel, textures: &mut TextureRegistry) -> Result<KernelInvocation> {
    let sig = kernel_signature(kernel).ok_or_else(|| match kernel {
        Kernel::TexSky(p) => Error::UnsupportedKernel(format!("TEX_SKY ({})", p.sky_type)),
        other => Error::UnsupportedKernel(other.tag().to_string()),
    })?;
    if sig.is_stub() {
        tracing::warn!(kernel = kernel.tag(), "kernel not implemented, using stub");
    }

    let inv = KernelInvocation::new(sig);
    let inv = match kernel {
        Kernel::TexImage(p) => {
            if !p.source.is_empty() && p.source != "FILE" {
                tracing::warn!(source = %p.source, "only single-file image sources are supported");
            }
            let slot = textures.register(TextureSource::File(p.filepath.clone().into()))?;
            inv.comment(p.filepath.clone())
                .param(Parameter::Slot(slot))
                .enum_param("INTERPOLATION", &p.interpolation)
                .enum_param("PROJECTION", &p.projection)
                .enum_param("EXTENSION", &p.extension)
                .enum_param("ALPHA", &p.alpha)
                .enum_param("COLOR_SPACE", color_space(&p.colorspace))
                .param(pixel_format_constant(slot))
        }
        Kernel::TexEnvironment(p) => {
            let slot = textures.register(TextureSource::File(p.filepath.clone().into()))?;
            inv.comment(p.filepath.clone())
                .param(Parameter::Slot(slot))
                .enum_param("INTERPOLATION", &p.interpolation)
                .enum_param("PROJECTION", &p.projection)
                .enum_param("COLOR_SPACE", color_space(&p.colorspace))
                .param(pixel_format_constant(slot))
        }
        Kernel::TexSky(p) => sky(inv, p, textures)?,
        Kernel::ColorRamp(p) => color_ramp(inv, p),
        Kernel::MixRgb(p) => inv
            .enum_param("BLEND_TYPE", &p.blend_type)
            .param(Parameter::Bool(p.use_clamp)),
        Kernel::Mix(p) => inv
            .enum_param("FACTOR_MODE", &p.factor_mode)
            .enum_param("BLEND_TYPE", &p.blend_type)
            .param(Parameter::Bool(p.clamp_factor))
            .param(Parameter::Bool(p.clamp_result)),
        Kernel::BsdfPrincipled(p) => inv
            .enum_param("DISTRIBUTION", &p.distribution)
            .enum_param("SUBSURFACE_METHOD", &p.subsurface_method),
        Kernel::BsdfGlossy(p) | Kernel::BsdfGlass(p) => {
            inv.enum_param("DISTRIBUTION", &p.distribution)
        }
        Kernel::Mapping(p) => inv.enum_param("TYPE", &p.vector_type),
        Kernel::NormalMap(p) => {
            if !p.uv_map.is_empty() {
                tracing::warn!(uv_map = %p.uv_map, "NormalMap: named UV maps not supported");
            }
            inv.enum_param("SPACE", &p.space)
        }
        Kernel::SeparateColor(p) | Kernel::CombineColor(p) => inv.enum_param("MODE", &p.mode),
        Kernel::Math(p) => inv
            .enum_param("OPERATION", &p.operation)
            .param(Parameter::Bool(p.use_clamp)),
        Kernel::VectorMath(p) => inv.enum_param("OPERATION", &p.operation),
        Kernel::MapRange(p) => inv
            .param(Parameter::Bool(p.clamp))
            .enum_param("DATA_TYPE", &p.data_type)
            .enum_param("INTERPOLATION_TYPE", &p.interpolation_type),
        Kernel::TexNoise(p) => inv.enum_param("DIMENSION", &p.noise_dimensions),
        Kernel::TexGradient(p) => inv.enum_param("TYPE", &p.gradient_type),
        Kernel::TexWave(p) => {
            let direction = if p.wave_type.eq_ignore_ascii_case("RINGS") {
                &p.rings_direction
            } else {
                &p.bands_direction
            };
            inv.enum_param("TYPE", &p.wave_type)
                .enum_param("DIRECTION", direction)
                .enum_param("PROFILE", &p.wave_profile)
        }
        Kernel::UvMap(p) => {
            if !p.uv_map.is_empty() || p.from_instancer {
                tracing::warn!(uv_map = %p.uv_map, "UvMap: only the default UV map is supported");
            }
            inv
        }
        Kernel::LightPath => {
            tracing::warn!("LightPath: only ray type and depth outputs are meaningful");
            inv
        }
        Kernel::Value(p) => {
            let mut inv = inv;
            inv.assign("value", vec4_literal([p.value; 4]));
            inv
        }
        Kernel::Rgb(p) => {
            let mut inv = inv;
            inv.assign("color", vec4_literal(p.value));
            inv
        }
        _ => inv,
    };
    Ok(inv)
}

fn pixel_format_constant(slot: u32) -> Parameter {
    Parameter::Constant(format!("TEX{slot}_PIXEL_FORMAT"))
}

/// Maps an exporter color space name onto the `COLOR_SPACE` enum.
fn color_space(name: &str) -> &'static str {
    match name {
        "sRGB" => "SRGB",
        "Linear" | "Linear Rec.709" | "Linear CIE-XYZ D65" | "Raw" | "Non-Color" => "LINEAR",
        "" => "SRGB",
        other => {
            tracing::warn!(color_space = other, "unknown color space, treating as linear");
            "LINEAR"
        }
    }
}

fn sky(
    mut inv: KernelInvocation,
    params: &TexSkyParams,
    textures: &mut TextureRegistry,
) -> Result<KernelInvocation> {
    let (model, scale) = if params.sky_type == "HOSEK_WILKIE" {
        tracing::warn!("TexSky: HOSEK_WILKIE rendered with the Nishita model");
        (SkyModel::from_hosek(params), HOSEK_SCALE)
    } else {
        (SkyModel::from_nishita(params), 1.0)
    };
    let data = model
        .sun_data()
        .iter()
        .map(|v| float_literal(*v))
        .collect::<Vec<_>>()
        .join(", ");
    let slot = textures.register(TextureSource::Sky(model))?;
    inv.assign("data", format!("array<f32, 10>({data})"));
    inv.assign("scale", float_literal(scale));
    Ok(inv.comment(format!("sky: {}", params.sky_type)).param(Parameter::Slot(slot)))
}

fn color_ramp(mut inv: KernelInvocation, params: &ColorRampParams) -> KernelInvocation {
    if params.color_mode != "RGB" && !params.color_mode.is_empty() {
        tracing::warn!(mode = %params.color_mode, "ColorRamp: only RGB interpolation supported");
    }
    let mut elements = params.elements.clone();
    elements.sort_by(|a, b| a.position.total_cmp(&b.position));
    if elements.len() > MAX_RAMP_ELEMENTS {
        tracing::warn!(count = elements.len(), "ColorRamp: extra elements dropped");
        elements.truncate(MAX_RAMP_ELEMENTS);
    }

    let mut items: Vec<String> = elements
        .iter()
        .map(|e| format!("RampElement({}, {})", float_literal(e.position), vec4_literal(e.color)))
        .collect();
    let count = items.len() as i32;
    items.resize(MAX_RAMP_ELEMENTS, "RampElement()".to_string());
    inv.assign(
        "elements",
        format!("array<RampElement, {MAX_RAMP_ELEMENTS}>(\n        {}\n    )", items.join(",\n        ")),
    );
    inv.param(Parameter::Int(count))
        .enum_param("INTERPOLATION", &params.interpolation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shader_graph::{MathParams, RampElement, TexImageParams};

    #[test]
    fn test_capability_table() {
        assert_eq!(capability(&Kernel::BsdfDiffuse), Capability::Native);
        assert_eq!(capability(&Kernel::Bump), Capability::Stub);
        assert_eq!(capability(&Kernel::Unknown("SCRIPT".into())), Capability::Unsupported);

        let preetham = Kernel::TexSky(TexSkyParams {
            sky_type: "PREETHAM".into(),
            ..Default::default()
        });
        assert_eq!(capability(&preetham), Capability::Unsupported);
    }

    #[test]
    fn test_every_named_kernel_has_signature() {
        let kernels = [
            Kernel::OutputMaterial,
            Kernel::Emission,
            Kernel::Normal,
            Kernel::TexIes,
            Kernel::LightFalloff,
            Kernel::ColorCurves,
            Kernel::TexSky(TexSkyParams::default()),
        ];
        for kernel in kernels {
            let name = kernel_name(&kernel).unwrap();
            assert!(signature(name).is_some(), "no signature for {name}");
        }
    }

    #[test]
    fn test_unsupported_names_tag() {
        let mut textures = TextureRegistry::new();
        let err = translate(&Kernel::Unknown("SCRIPT".into()), &mut textures).unwrap_err();
        assert!(matches!(err, Error::UnsupportedKernel(ref tag) if tag == "SCRIPT"));
    }

    #[test]
    fn test_tex_image_parameters() {
        let mut textures = TextureRegistry::new();
        let kernel = Kernel::TexImage(TexImageParams {
            filepath: "//wood.png".into(),
            ..Default::default()
        });
        let inv = translate(&kernel, &mut textures).unwrap();
        assert_eq!(inv.parameters[0], Parameter::Slot(0));
        assert_eq!(
            inv.parameters.last(),
            Some(&Parameter::Constant("TEX0_PIXEL_FORMAT".into()))
        );
        assert!(inv.parameters.contains(&Parameter::Enum {
            namespace: "COLOR_SPACE",
            value: "SRGB"
        }));
        // Same file registers once.
        translate(&kernel, &mut textures).unwrap();
        assert_eq!(textures.len(), 1);
    }

    #[test]
    fn test_math_parameters() {
        let mut textures = TextureRegistry::new();
        let kernel = Kernel::Math(MathParams {
            operation: "POWER".into(),
            use_clamp: true,
        });
        let inv = translate(&kernel, &mut textures).unwrap();
        assert_eq!(
            inv.parameters,
            vec![
                Parameter::Enum {
                    namespace: "OPERATION",
                    value: "POWER"
                },
                Parameter::Bool(true)
            ]
        );
    }

    #[test]
    fn test_color_ramp_padding() {
        let params = ColorRampParams {
            elements: vec![
                RampElement {
                    position: 1.0,
                    color: [1.0; 4],
                },
                RampElement {
                    position: 0.0,
                    color: [0.0, 0.0, 0.0, 1.0],
                },
            ],
            ..Default::default()
        };
        let inv = color_ramp(KernelInvocation::new(signature("ColorRamp").unwrap()), &params);
        assert_eq!(inv.parameters[0], Parameter::Int(2));
        let elements = &inv.inputs["elements"];
        assert_eq!(elements.matches("RampElement()").count(), MAX_RAMP_ELEMENTS - 2);
        let first = elements.find("RampElement(0.0").unwrap();
        let second = elements.find("RampElement(1.0").unwrap();
        assert!(first < second, "elements sorted by position");
    }

    #[test]
    fn test_sky_registers_texture() {
        let mut textures = TextureRegistry::new();
        let inv = translate(&Kernel::TexSky(TexSkyParams::default()), &mut textures).unwrap();
        assert_eq!(inv.kernel(), "TexNishita");
        assert_eq!(textures.len(), 1);
        assert!(inv.inputs["data"].starts_with("array<f32, 10>("));
        assert_eq!(inv.inputs["scale"], "1.0");
    }

    #[test]
    fn test_context_defaults() {
        assert_eq!(context_defaults("TexImage")[0].1, "vec4f((*shading).uv, 0.0)");
        assert_eq!(context_defaults("BsdfPrincipled")[0].0, "normal");
        assert!(context_defaults("Math").is_empty());
    }
}
