//! Node kernel types and their typed parameters.

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::graph::GraphError;

/// Image texture parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TexImageParams {
    pub filepath: String,
    pub interpolation: String,
    pub projection: String,
    pub extension: String,
    pub source: String,
    pub colorspace: String,
    #[serde(alias = "alpha_mode")]
    pub alpha: String,
}

impl Default for TexImageParams {
    fn default() -> Self {
        Self {
            filepath: String::new(),
            interpolation: "Linear".into(),
            projection: "FLAT".into(),
            extension: "REPEAT".into(),
            source: "FILE".into(),
            colorspace: "sRGB".into(),
            alpha: "STRAIGHT".into(),
        }
    }
}

/// Environment texture parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TexEnvironmentParams {
    pub filepath: String,
    pub interpolation: String,
    pub projection: String,
    pub colorspace: String,
    #[serde(alias = "alpha_mode")]
    pub alpha: String,
}

impl Default for TexEnvironmentParams {
    fn default() -> Self {
        Self {
            filepath: String::new(),
            interpolation: "Linear".into(),
            projection: "EQUIRECTANGULAR".into(),
            colorspace: "Linear".into(),
            alpha: "STRAIGHT".into(),
        }
    }
}

/// Procedural sky parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TexSkyParams {
    pub sky_type: String,
    pub sun_direction: [f32; 3],
    pub sun_disc: bool,
    pub sun_size: f32,
    pub sun_intensity: f32,
    pub sun_elevation: f32,
    pub sun_rotation: f32,
    pub altitude: f32,
    pub air_density: f32,
    pub dust_density: f32,
    pub ozone_density: f32,
    pub turbidity: f32,
    pub ground_albedo: f32,
}

impl Default for TexSkyParams {
    fn default() -> Self {
        Self {
            sky_type: "NISHITA".into(),
            sun_direction: [0.0, 0.0, 1.0],
            sun_disc: true,
            sun_size: 0.009_512,
            sun_intensity: 1.0,
            sun_elevation: 15f32.to_radians(),
            sun_rotation: 0.0,
            altitude: 0.0,
            air_density: 1.0,
            dust_density: 1.0,
            ozone_density: 1.0,
            turbidity: 2.2,
            ground_albedo: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TexNoiseParams {
    pub noise_dimensions: String,
}

impl Default for TexNoiseParams {
    fn default() -> Self {
        Self {
            noise_dimensions: "3D".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TexGradientParams {
    pub gradient_type: String,
}

impl Default for TexGradientParams {
    fn default() -> Self {
        Self {
            gradient_type: "LINEAR".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TexWaveParams {
    pub wave_type: String,
    pub bands_direction: String,
    pub rings_direction: String,
    pub wave_profile: String,
}

impl Default for TexWaveParams {
    fn default() -> Self {
        Self {
            wave_type: "BANDS".into(),
            bands_direction: "X".into(),
            rings_direction: "X".into(),
            wave_profile: "SIN".into(),
        }
    }
}

/// One stop of a color ramp.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct RampElement {
    pub position: f32,
    pub color: [f32; 4],
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ColorRampParams {
    pub color_mode: String,
    pub interpolation: String,
    pub hue_interpolation: String,
    pub elements: Vec<RampElement>,
}

impl Default for ColorRampParams {
    fn default() -> Self {
        Self {
            color_mode: "RGB".into(),
            interpolation: "LINEAR".into(),
            hue_interpolation: "NEAR".into(),
            elements: vec![
                RampElement {
                    position: 0.0,
                    color: [0.0, 0.0, 0.0, 1.0],
                },
                RampElement {
                    position: 1.0,
                    color: [1.0, 1.0, 1.0, 1.0],
                },
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MixRgbParams {
    pub blend_type: String,
    pub use_clamp: bool,
}

impl Default for MixRgbParams {
    fn default() -> Self {
        Self {
            blend_type: "MIX".into(),
            use_clamp: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MixParams {
    pub data_type: String,
    pub blend_type: String,
    pub clamp_factor: bool,
    pub clamp_result: bool,
    pub factor_mode: String,
}

impl Default for MixParams {
    fn default() -> Self {
        Self {
            data_type: "FLOAT".into(),
            blend_type: "MIX".into(),
            clamp_factor: true,
            clamp_result: false,
            factor_mode: "UNIFORM".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PrincipledParams {
    pub distribution: String,
    pub subsurface_method: String,
}

impl Default for PrincipledParams {
    fn default() -> Self {
        Self {
            distribution: "GGX".into(),
            subsurface_method: "BURLEY".into(),
        }
    }
}

/// Microfacet distribution selector shared by glossy-like BSDFs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DistributionParams {
    pub distribution: String,
}

impl Default for DistributionParams {
    fn default() -> Self {
        Self {
            distribution: "GGX".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MappingParams {
    #[serde(alias = "type")]
    pub vector_type: String,
}

impl Default for MappingParams {
    fn default() -> Self {
        Self {
            vector_type: "POINT".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MapRangeParams {
    pub clamp: bool,
    pub data_type: String,
    pub interpolation_type: String,
}

impl Default for MapRangeParams {
    fn default() -> Self {
        Self {
            clamp: true,
            data_type: "FLOAT".into(),
            interpolation_type: "LINEAR".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct NormalMapParams {
    pub space: String,
    pub uv_map: String,
}

impl Default for NormalMapParams {
    fn default() -> Self {
        Self {
            space: "TANGENT".into(),
            uv_map: String::new(),
        }
    }
}

/// Color model used by the separate/combine color nodes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ColorModeParams {
    pub mode: String,
}

impl Default for ColorModeParams {
    fn default() -> Self {
        Self { mode: "RGB".into() }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MathParams {
    pub operation: String,
    pub use_clamp: bool,
}

impl Default for MathParams {
    fn default() -> Self {
        Self {
            operation: "ADD".into(),
            use_clamp: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct VectorMathParams {
    pub operation: String,
}

impl Default for VectorMathParams {
    fn default() -> Self {
        Self {
            operation: "ADD".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct ValueParams {
    pub value: f32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RgbParams {
    pub value: [f32; 4],
}

impl Default for RgbParams {
    fn default() -> Self {
        Self {
            value: [0.5, 0.5, 0.5, 1.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct UvMapParams {
    pub uv_map: String,
    pub from_instancer: bool,
}

/// Node type together with its typed parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum Kernel {
    // Outputs
    OutputMaterial,
    OutputWorld,
    OutputLight,

    // Shaders
    BsdfPrincipled(PrincipledParams),
    BsdfDiffuse,
    BsdfGlossy(DistributionParams),
    BsdfGlass(DistributionParams),
    BsdfTransparent,
    BsdfTranslucent,
    BsdfRefraction(DistributionParams),
    BsdfAnisotropic(DistributionParams),
    BsdfVelvet,
    BsdfHair,
    Emission,
    Background,
    AddShader,
    MixShader,
    VolumeScatter,

    // Textures
    TexImage(TexImageParams),
    TexEnvironment(TexEnvironmentParams),
    TexSky(TexSkyParams),
    TexChecker,
    TexNoise(TexNoiseParams),
    TexGradient(TexGradientParams),
    TexWave(TexWaveParams),
    TexIes,
    TexMagic,
    TexVoronoi,
    TexMusgrave,
    TexBrick,

    // Color
    ColorRamp(ColorRampParams),
    MixRgb(MixRgbParams),
    Mix(MixParams),
    Invert,
    RgbToBw,
    SeparateColor(ColorModeParams),
    CombineColor(ColorModeParams),
    HueSaturation,
    BrightnessContrast,
    Gamma,
    ColorCurves,
    Blackbody,

    // Vector
    Mapping(MappingParams),
    NormalMap(NormalMapParams),
    Bump,
    Displacement,
    SeparateXyz,
    CombineXyz,
    VectorMath(VectorMathParams),
    MapRange(MapRangeParams),

    // Converter
    Math(MathParams),
    Value(ValueParams),
    Rgb(RgbParams),

    // Input
    TextureCoordinate,
    NewGeometry,
    LightPath,
    Fresnel,
    LayerWeight,
    UvMap(UvMapParams),
    Attribute,
    ObjectInfo,
    ParticleInfo,
    LightFalloff,
    VertexColor,
    Normal,
    AmbientOcclusion,

    /// Any node type this model does not know.
    Unknown(String),
}

fn parameters<T: DeserializeOwned + Default>(
    tag: &str,
    value: serde_json::Value,
) -> Result<T, GraphError> {
    if value.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(value).map_err(|source| GraphError::Parameters {
        kernel: tag.to_string(),
        source,
    })
}

impl Kernel {
    /// Builds a kernel from the exporter's `type` tag and `parameters` object.
    pub fn from_parts(tag: &str, params: serde_json::Value) -> Result<Self, GraphError> {
        use Kernel::*;
        let kernel = match tag {
            "OUTPUT_MATERIAL" => OutputMaterial,
            "OUTPUT_WORLD" => OutputWorld,
            "OUTPUT_LIGHT" => OutputLight,
            "BSDF_PRINCIPLED" => BsdfPrincipled(parameters(tag, params)?),
            "BSDF_DIFFUSE" => BsdfDiffuse,
            "BSDF_GLOSSY" => BsdfGlossy(parameters(tag, params)?),
            "BSDF_GLASS" => BsdfGlass(parameters(tag, params)?),
            "BSDF_TRANSPARENT" => BsdfTransparent,
            "BSDF_TRANSLUCENT" => BsdfTranslucent,
            "BSDF_REFRACTION" => BsdfRefraction(parameters(tag, params)?),
            "BSDF_ANISOTROPIC" => BsdfAnisotropic(parameters(tag, params)?),
            "BSDF_VELVET" => BsdfVelvet,
            "BSDF_HAIR" => BsdfHair,
            "EMISSION" => Emission,
            "BACKGROUND" => Background,
            "ADD_SHADER" => AddShader,
            "MIX_SHADER" => MixShader,
            "VOLUME_SCATTER" => VolumeScatter,
            "TEX_IMAGE" => TexImage(parameters(tag, params)?),
            "TEX_ENVIRONMENT" => TexEnvironment(parameters(tag, params)?),
            "TEX_SKY" => TexSky(parameters(tag, params)?),
            "TEX_CHECKER" => TexChecker,
            "TEX_NOISE" => TexNoise(parameters(tag, params)?),
            "TEX_GRADIENT" => TexGradient(parameters(tag, params)?),
            "TEX_WAVE" => TexWave(parameters(tag, params)?),
            "TEX_IES" => TexIes,
            "TEX_MAGIC" => TexMagic,
            "TEX_VORONOI" => TexVoronoi,
            "TEX_MUSGRAVE" => TexMusgrave,
            "TEX_BRICK" => TexBrick,
            "VALTORGB" => ColorRamp(parameters(tag, params)?),
            "MIX_RGB" => MixRgb(parameters(tag, params)?),
            "MIX" => Mix(parameters(tag, params)?),
            "INVERT" => Invert,
            "RGBTOBW" => RgbToBw,
            "SEPARATE_COLOR" => SeparateColor(parameters(tag, params)?),
            "COMBINE_COLOR" => CombineColor(parameters(tag, params)?),
            "HUE_SAT" => HueSaturation,
            "BRIGHTCONTRAST" => BrightnessContrast,
            "GAMMA" => Gamma,
            "CURVE_RGB" => ColorCurves,
            "BLACKBODY" => Blackbody,
            "MAPPING" => Mapping(parameters(tag, params)?),
            "NORMAL_MAP" => NormalMap(parameters(tag, params)?),
            "BUMP" => Bump,
            "DISPLACEMENT" => Displacement,
            "SEPXYZ" => SeparateXyz,
            "COMBXYZ" => CombineXyz,
            "VECT_MATH" => VectorMath(parameters(tag, params)?),
            "MAP_RANGE" => MapRange(parameters(tag, params)?),
            "MATH" => Math(parameters(tag, params)?),
            "VALUE" => Value(parameters(tag, params)?),
            "RGB" => Rgb(parameters(tag, params)?),
            "TEX_COORD" => TextureCoordinate,
            "NEW_GEOMETRY" => NewGeometry,
            "LIGHT_PATH" => LightPath,
            "FRESNEL" => Fresnel,
            "LAYER_WEIGHT" => LayerWeight,
            "UVMAP" => UvMap(parameters(tag, params)?),
            "ATTRIBUTE" => Attribute,
            "OBJECT_INFO" => ObjectInfo,
            "PARTICLE_INFO" => ParticleInfo,
            "LIGHT_FALLOFF" => LightFalloff,
            "VERTEX_COLOR" => VertexColor,
            "NORMAL" => Normal,
            "AMBIENT_OCCLUSION" => AmbientOcclusion,
            other => Unknown(other.to_string()),
        };
        Ok(kernel)
    }

    /// Exporter tag of this kernel.
    pub fn tag(&self) -> &str {
        use Kernel::*;
        match self {
            OutputMaterial => "OUTPUT_MATERIAL",
            OutputWorld => "OUTPUT_WORLD",
            OutputLight => "OUTPUT_LIGHT",
            BsdfPrincipled(_) => "BSDF_PRINCIPLED",
            BsdfDiffuse => "BSDF_DIFFUSE",
            BsdfGlossy(_) => "BSDF_GLOSSY",
            BsdfGlass(_) => "BSDF_GLASS",
            BsdfTransparent => "BSDF_TRANSPARENT",
            BsdfTranslucent => "BSDF_TRANSLUCENT",
            BsdfRefraction(_) => "BSDF_REFRACTION",
            BsdfAnisotropic(_) => "BSDF_ANISOTROPIC",
            BsdfVelvet => "BSDF_VELVET",
            BsdfHair => "BSDF_HAIR",
            Emission => "EMISSION",
            Background => "BACKGROUND",
            AddShader => "ADD_SHADER",
            MixShader => "MIX_SHADER",
            VolumeScatter => "VOLUME_SCATTER",
            TexImage(_) => "TEX_IMAGE",
            TexEnvironment(_) => "TEX_ENVIRONMENT",
            TexSky(_) => "TEX_SKY",
            TexChecker => "TEX_CHECKER",
            TexNoise(_) => "TEX_NOISE",
            TexGradient(_) => "TEX_GRADIENT",
            TexWave(_) => "TEX_WAVE",
            TexIes => "TEX_IES",
            TexMagic => "TEX_MAGIC",
            TexVoronoi => "TEX_VORONOI",
            TexMusgrave => "TEX_MUSGRAVE",
            TexBrick => "TEX_BRICK",
            ColorRamp(_) => "VALTORGB",
            MixRgb(_) => "MIX_RGB",
            Mix(_) => "MIX",
            Invert => "INVERT",
            RgbToBw => "RGBTOBW",
            SeparateColor(_) => "SEPARATE_COLOR",
            CombineColor(_) => "COMBINE_COLOR",
            HueSaturation => "HUE_SAT",
            BrightnessContrast => "BRIGHTCONTRAST",
            Gamma => "GAMMA",
            ColorCurves => "CURVE_RGB",
            Blackbody => "BLACKBODY",
            Mapping(_) => "MAPPING",
            NormalMap(_) => "NORMAL_MAP",
            Bump => "BUMP",
            Displacement => "DISPLACEMENT",
            SeparateXyz => "SEPXYZ",
            CombineXyz => "COMBXYZ",
            VectorMath(_) => "VECT_MATH",
            MapRange(_) => "MAP_RANGE",
            Math(_) => "MATH",
            Value(_) => "VALUE",
            Rgb(_) => "RGB",
            TextureCoordinate => "TEX_COORD",
            NewGeometry => "NEW_GEOMETRY",
            LightPath => "LIGHT_PATH",
            Fresnel => "FRESNEL",
            LayerWeight => "LAYER_WEIGHT",
            UvMap(_) => "UVMAP",
            Attribute => "ATTRIBUTE",
            ObjectInfo => "OBJECT_INFO",
            ParticleInfo => "PARTICLE_INFO",
            LightFalloff => "LIGHT_FALLOFF",
            VertexColor => "VERTEX_COLOR",
            Normal => "NORMAL",
            AmbientOcclusion => "AMBIENT_OCCLUSION",
            Unknown(tag) => tag,
        }
    }

    /// Material, world and light output nodes.
    pub fn is_output(&self) -> bool {
        matches!(
            self,
            Kernel::OutputMaterial | Kernel::OutputWorld | Kernel::OutputLight
        )
    }

    /// Closures that radiate light.
    pub fn is_emitter(&self) -> bool {
        matches!(self, Kernel::Emission | Kernel::Background)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parameters_default_when_missing() {
        let kernel = Kernel::from_parts("MATH", serde_json::Value::Null).unwrap();
        assert_eq!(kernel, Kernel::Math(MathParams::default()));

        let kernel = Kernel::from_parts("MIX_RGB", json!({"blend_type": "MULTIPLY"})).unwrap();
        match kernel {
            Kernel::MixRgb(p) => {
                assert_eq!(p.blend_type, "MULTIPLY");
                assert!(!p.use_clamp);
            }
            other => panic!("unexpected kernel {other:?}"),
        }
    }

    #[test]
    fn test_unknown_tag_is_kept() {
        let kernel = Kernel::from_parts("SCRIPT", json!({})).unwrap();
        assert_eq!(kernel, Kernel::Unknown("SCRIPT".into()));
        assert_eq!(kernel.tag(), "SCRIPT");
    }

    #[test]
    fn test_bad_parameters_rejected() {
        let err = Kernel::from_parts("MATH", json!({"use_clamp": "yes"})).unwrap_err();
        assert!(err.to_string().contains("MATH"));
    }

    #[test]
    fn test_ramp_elements() {
        let kernel = Kernel::from_parts(
            "VALTORGB",
            json!({"elements": [
                {"position": 0.25, "color": [1.0, 0.0, 0.0, 1.0]},
                {"position": 0.75, "color": [0.0, 0.0, 1.0, 1.0]}
            ]}),
        )
        .unwrap();
        let Kernel::ColorRamp(params) = kernel else {
            panic!("expected color ramp");
        };
        assert_eq!(params.elements.len(), 2);
        assert_eq!(params.elements[1].position, 0.75);
        assert_eq!(params.interpolation, "LINEAR");
    }
}
