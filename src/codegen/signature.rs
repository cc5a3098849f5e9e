//! WGSL kernel signatures.
//!
//! Every kernel the generated code can call is described here: its input
//! and output sockets (mapped to fields of one WGSL struct), the enumerated
//! compile-time parameters it accepts, and whether its compute function is
//! hand-written in `nodes.wgsl` or generated as a stub.
//!
//! Inputs and outputs share one struct. A socket name used on both sides
//! maps to one field, which the compute function reads and then overwrites.

/// WGSL storage of a struct field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Float,
    Vector,
    Color,
    Shader,
    /// Field assigned only by a translation rule, with an explicit WGSL type.
    Raw(&'static str),
}

impl FieldKind {
    pub fn wgsl_type(self) -> &'static str {
        match self {
            FieldKind::Float | FieldKind::Vector | FieldKind::Color => "vec4f",
            FieldKind::Shader => "Closure",
            FieldKind::Raw(ty) => ty,
        }
    }
}

/// One socket: exporter name, struct field and kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Socket {
    pub name: &'static str,
    pub field: &'static str,
    pub kind: FieldKind,
}

const fn f(name: &'static str, field: &'static str) -> Socket {
    Socket { name, field, kind: FieldKind::Float }
}

const fn v(name: &'static str, field: &'static str) -> Socket {
    Socket { name, field, kind: FieldKind::Vector }
}

const fn c(name: &'static str, field: &'static str) -> Socket {
    Socket { name, field, kind: FieldKind::Color }
}

const fn s(name: &'static str, field: &'static str) -> Socket {
    Socket { name, field, kind: FieldKind::Shader }
}

const fn raw(field: &'static str, ty: &'static str) -> Socket {
    Socket { name: "", field, kind: FieldKind::Raw(ty) }
}

/// Enumerated compile-time parameter: namespace plus accepted values.
///
/// The first value is the fallback for unrecognized input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumParam {
    pub namespace: &'static str,
    pub values: &'static [&'static str],
}

const fn e(namespace: &'static str, values: &'static [&'static str]) -> EnumParam {
    EnumParam { namespace, values }
}

/// How a kernel's compute function is provided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Implementation {
    /// Hand-written in `nodes.wgsl`.
    Native,
    /// Generated: outputs get the listed fallback expressions, others zero.
    Stub(&'static [(&'static str, &'static str)]),
}

#[derive(Debug, Clone, Copy)]
pub struct KernelSignature {
    pub name: &'static str,
    pub inputs: &'static [Socket],
    pub outputs: &'static [Socket],
    pub enums: &'static [EnumParam],
    pub implementation: Implementation,
}

impl KernelSignature {
    pub fn input(&self, name: &str) -> Option<&'static Socket> {
        self.inputs.iter().find(|s| !s.name.is_empty() && s.name == name)
    }

    pub fn output(&self, name: &str) -> Option<&'static Socket> {
        self.outputs.iter().find(|s| s.name == name)
    }

    pub fn enum_param(&self, namespace: &str) -> Option<&'static EnumParam> {
        self.enums.iter().find(|e| e.namespace == namespace)
    }

    pub fn is_stub(&self) -> bool {
        matches!(self.implementation, Implementation::Stub(_))
    }

    /// Struct fields in declaration order, one per distinct field name.
    pub fn fields(&self) -> Vec<&'static Socket> {
        let mut fields: Vec<&'static Socket> = Vec::new();
        for socket in self.inputs.iter().chain(self.outputs.iter()) {
            if !fields.iter().any(|f| f.field == socket.field) {
                fields.push(socket);
            }
        }
        fields
    }
}

pub const BLEND_TYPES: &[&str] = &[
    "MIX", "DARKEN", "MULTIPLY", "BURN", "LIGHTEN", "SCREEN", "DODGE", "ADD", "OVERLAY",
    "SOFT_LIGHT", "LINEAR_LIGHT", "DIFFERENCE", "EXCLUSION", "SUBTRACT", "DIVIDE", "HUE",
    "SATURATION", "COLOR", "VALUE",
];

pub const MATH_OPERATIONS: &[&str] = &[
    "ADD", "SUBTRACT", "MULTIPLY", "DIVIDE", "MULTIPLY_ADD", "POWER", "LOGARITHM", "SQRT",
    "INVERSE_SQRT", "ABSOLUTE", "EXPONENT", "MINIMUM", "MAXIMUM", "LESS_THAN", "GREATER_THAN",
    "SIGN", "COMPARE", "SMOOTH_MIN", "SMOOTH_MAX", "ROUND", "FLOOR", "CEIL", "TRUNC", "FRACT",
    "MODULO", "FLOORED_MODULO", "WRAP", "SNAP", "PINGPONG", "SINE", "COSINE", "TANGENT",
    "ARCSINE", "ARCCOSINE", "ARCTANGENT", "ARCTAN2", "SINH", "COSH", "TANH", "RADIANS",
    "DEGREES",
];

pub const VECTOR_MATH_OPERATIONS: &[&str] = &[
    "ADD", "SUBTRACT", "MULTIPLY", "DIVIDE", "MULTIPLY_ADD", "CROSS_PRODUCT", "PROJECT",
    "REFLECT", "REFRACT", "FACEFORWARD", "DOT_PRODUCT", "DISTANCE", "LENGTH", "SCALE",
    "NORMALIZE", "ABSOLUTE", "MINIMUM", "MAXIMUM", "FLOOR", "CEIL", "FRACTION", "MODULO",
    "WRAP", "SNAP", "SINE", "COSINE", "TANGENT",
];

const INTERPOLATION: EnumParam = e("INTERPOLATION", &["LINEAR", "CLOSEST", "CUBIC", "SMART"]);
const COLOR_SPACE: EnumParam = e("COLOR_SPACE", &["LINEAR", "SRGB"]);
const PIXEL_FORMAT: EnumParam = e("PIXEL_FORMAT", &["RGBA", "R"]);
const DISTRIBUTION: EnumParam = e("DISTRIBUTION", &["GGX", "MULTI_GGX"]);
const COLOR_MODE: EnumParam = e("MODE", &["RGB", "HSV", "HSL"]);

const BSDF_FALLBACK: &[(&str, &str)] = &[("bsdf", "closure_diffuse((*n).color)")];

pub static SIGNATURES: &[KernelSignature] = &[
    // Outputs
    KernelSignature {
        name: "OutputMaterial",
        inputs: &[s("Surface", "surface"), s("Volume", "volume"), v("Displacement", "displacement")],
        outputs: &[],
        enums: &[],
        implementation: Implementation::Native,
    },
    KernelSignature {
        name: "OutputWorld",
        inputs: &[s("Surface", "surface"), s("Volume", "volume")],
        outputs: &[],
        enums: &[],
        implementation: Implementation::Native,
    },
    KernelSignature {
        name: "OutputLight",
        inputs: &[s("Surface", "surface")],
        outputs: &[],
        enums: &[],
        implementation: Implementation::Native,
    },
    // Converters
    KernelSignature {
        name: "Value",
        inputs: &[],
        outputs: &[f("Value", "value")],
        enums: &[],
        implementation: Implementation::Native,
    },
    KernelSignature {
        name: "Rgb",
        inputs: &[],
        outputs: &[c("Color", "color")],
        enums: &[],
        implementation: Implementation::Native,
    },
    KernelSignature {
        name: "Math",
        inputs: &[f("Value", "value"), f("Value_001", "value_001"), f("Value_002", "value_002")],
        outputs: &[f("Value", "value")],
        enums: &[e("OPERATION", MATH_OPERATIONS)],
        implementation: Implementation::Native,
    },
    KernelSignature {
        name: "VectorMath",
        inputs: &[
            v("Vector", "vector"),
            v("Vector_001", "vector_001"),
            v("Vector_002", "vector_002"),
            f("Scale", "scale"),
        ],
        outputs: &[v("Vector", "vector"), f("Value", "value")],
        enums: &[e("OPERATION", VECTOR_MATH_OPERATIONS)],
        implementation: Implementation::Native,
    },
    KernelSignature {
        name: "MapRange",
        inputs: &[
            f("Value", "value"),
            f("From Min", "from_min"),
            f("From Max", "from_max"),
            f("To Min", "to_min"),
            f("To Max", "to_max"),
            f("Steps", "steps"),
        ],
        outputs: &[f("Result", "result")],
        enums: &[
            e("DATA_TYPE", &["FLOAT"]),
            e("INTERPOLATION_TYPE", &["LINEAR", "STEPPED", "SMOOTHSTEP", "SMOOTHERSTEP"]),
        ],
        implementation: Implementation::Native,
    },
    KernelSignature {
        name: "SeparateXyz",
        inputs: &[v("Vector", "vector")],
        outputs: &[f("X", "x"), f("Y", "y"), f("Z", "z")],
        enums: &[],
        implementation: Implementation::Native,
    },
    KernelSignature {
        name: "CombineXyz",
        inputs: &[f("X", "x"), f("Y", "y"), f("Z", "z")],
        outputs: &[v("Vector", "vector")],
        enums: &[],
        implementation: Implementation::Native,
    },
    KernelSignature {
        name: "Blackbody",
        inputs: &[f("Temperature", "temperature")],
        outputs: &[c("Color", "color")],
        enums: &[],
        implementation: Implementation::Native,
    },
    // Color
    KernelSignature {
        name: "Mix",
        inputs: &[
            f("Factor_Float", "factor_float"),
            v("Factor_Vector", "factor_vector"),
            f("A_Float", "a_float"),
            f("B_Float", "b_float"),
            v("A_Vector", "a_vector"),
            v("B_Vector", "b_vector"),
            c("A_Color", "a_color"),
            c("B_Color", "b_color"),
        ],
        outputs: &[
            f("Result_Float", "result_float"),
            v("Result_Vector", "result_vector"),
            c("Result_Color", "result_color"),
        ],
        enums: &[
            e("FACTOR_MODE", &["UNIFORM", "NON_UNIFORM"]),
            e("BLEND_TYPE", BLEND_TYPES),
        ],
        implementation: Implementation::Native,
    },
    KernelSignature {
        name: "MixRgb",
        inputs: &[f("Fac", "fac"), c("Color1", "color1"), c("Color2", "color2")],
        outputs: &[c("Color", "color")],
        enums: &[e("BLEND_TYPE", BLEND_TYPES)],
        implementation: Implementation::Native,
    },
    KernelSignature {
        name: "ColorRamp",
        inputs: &[f("Fac", "fac"), raw("elements", "array<RampElement, 32>")],
        outputs: &[c("Color", "color"), f("Alpha", "alpha")],
        enums: &[e("INTERPOLATION", &["LINEAR", "CONSTANT", "EASE"])],
        implementation: Implementation::Native,
    },
    KernelSignature {
        name: "Invert",
        inputs: &[f("Fac", "fac"), c("Color", "color")],
        outputs: &[c("Color", "color")],
        enums: &[],
        implementation: Implementation::Native,
    },
    KernelSignature {
        name: "RgbToBw",
        inputs: &[c("Color", "color")],
        outputs: &[f("Val", "val")],
        enums: &[],
        implementation: Implementation::Native,
    },
    KernelSignature {
        name: "SeparateColor",
        inputs: &[c("Color", "color")],
        outputs: &[f("Red", "red"), f("Green", "green"), f("Blue", "blue")],
        enums: &[COLOR_MODE],
        implementation: Implementation::Native,
    },
    KernelSignature {
        name: "CombineColor",
        inputs: &[f("Red", "red"), f("Green", "green"), f("Blue", "blue")],
        outputs: &[c("Color", "color")],
        enums: &[COLOR_MODE],
        implementation: Implementation::Native,
    },
    KernelSignature {
        name: "HueSaturation",
        inputs: &[
            f("Hue", "hue"),
            f("Saturation", "saturation"),
            f("Value", "value"),
            f("Fac", "fac"),
            c("Color", "color"),
        ],
        outputs: &[c("Color", "color")],
        enums: &[],
        implementation: Implementation::Native,
    },
    KernelSignature {
        name: "BrightnessContrast",
        inputs: &[c("Color", "color"), f("Bright", "bright"), f("Contrast", "contrast")],
        outputs: &[c("Color", "color")],
        enums: &[],
        implementation: Implementation::Native,
    },
    KernelSignature {
        name: "Gamma",
        inputs: &[c("Color", "color"), f("Gamma", "gamma")],
        outputs: &[c("Color", "color")],
        enums: &[],
        implementation: Implementation::Native,
    },
    // Textures
    KernelSignature {
        name: "TexImage",
        inputs: &[v("Vector", "vector")],
        outputs: &[c("Color", "color"), f("Alpha", "alpha")],
        enums: &[
            INTERPOLATION,
            e("PROJECTION", &["FLAT", "BOX", "SPHERE", "TUBE"]),
            e("EXTENSION", &["REPEAT", "EXTEND", "CLIP", "MIRROR"]),
            e("ALPHA", &["STRAIGHT", "PREMULTIPLIED", "CHANNEL_PACKED", "NONE"]),
            COLOR_SPACE,
            PIXEL_FORMAT,
        ],
        implementation: Implementation::Native,
    },
    KernelSignature {
        name: "TexEnvironment",
        inputs: &[v("Vector", "vector")],
        outputs: &[c("Color", "color"), f("Alpha", "alpha")],
        enums: &[
            INTERPOLATION,
            e("PROJECTION", &["EQUIRECTANGULAR", "MIRROR_BALL"]),
            COLOR_SPACE,
            PIXEL_FORMAT,
        ],
        implementation: Implementation::Native,
    },
    KernelSignature {
        name: "TexNishita",
        inputs: &[v("Vector", "vector"), raw("data", "array<f32, 10>"), raw("scale", "f32")],
        outputs: &[c("Color", "color")],
        enums: &[],
        implementation: Implementation::Native,
    },
    KernelSignature {
        name: "TexChecker",
        inputs: &[
            v("Vector", "vector"),
            c("Color1", "color1"),
            c("Color2", "color2"),
            f("Scale", "scale"),
        ],
        outputs: &[c("Color", "color"), f("Fac", "fac")],
        enums: &[],
        implementation: Implementation::Native,
    },
    KernelSignature {
        name: "TexNoise",
        inputs: &[
            v("Vector", "vector"),
            f("W", "w"),
            f("Scale", "scale"),
            f("Detail", "detail"),
            f("Roughness", "roughness"),
            f("Distortion", "distortion"),
        ],
        outputs: &[f("Fac", "fac"), c("Color", "color")],
        enums: &[e("DIMENSION", &["3D", "1D", "2D", "4D"])],
        implementation: Implementation::Native,
    },
    KernelSignature {
        name: "TexGradient",
        inputs: &[v("Vector", "vector")],
        outputs: &[c("Color", "color"), f("Fac", "fac")],
        enums: &[e(
            "TYPE",
            &["LINEAR", "QUADRATIC", "EASING", "DIAGONAL", "SPHERICAL", "QUADRATIC_SPHERE", "RADIAL"],
        )],
        implementation: Implementation::Native,
    },
    KernelSignature {
        name: "TexWave",
        inputs: &[
            v("Vector", "vector"),
            f("Scale", "scale"),
            f("Distortion", "distortion"),
            f("Detail", "detail"),
            f("Detail Scale", "detail_scale"),
            f("Detail Roughness", "detail_roughness"),
            f("Phase Offset", "phase_offset"),
        ],
        outputs: &[c("Color", "color"), f("Fac", "fac")],
        enums: &[
            e("TYPE", &["BANDS", "RINGS"]),
            e("DIRECTION", &["X", "Y", "Z", "DIAGONAL", "SPHERICAL"]),
            e("PROFILE", &["SIN", "SAW", "TRI"]),
        ],
        implementation: Implementation::Native,
    },
    // Vector
    KernelSignature {
        name: "Mapping",
        inputs: &[
            v("Vector", "vector"),
            v("Location", "location"),
            v("Rotation", "rotation"),
            v("Scale", "scale"),
        ],
        outputs: &[v("Vector", "vector")],
        enums: &[e("TYPE", &["POINT", "TEXTURE", "VECTOR", "NORMAL"])],
        implementation: Implementation::Native,
    },
    KernelSignature {
        name: "NormalMap",
        inputs: &[f("Strength", "strength"), c("Color", "color")],
        outputs: &[v("Normal", "normal")],
        enums: &[e("SPACE", &["TANGENT", "OBJECT", "WORLD", "BLENDER_OBJECT", "BLENDER_WORLD"])],
        implementation: Implementation::Native,
    },
    // Inputs
    KernelSignature {
        name: "TextureCoordinate",
        inputs: &[],
        outputs: &[
            v("Generated", "generated"),
            v("Normal", "normal"),
            v("UV", "uv"),
            v("Object", "object"),
            v("Camera", "camera"),
            v("Window", "window"),
            v("Reflection", "reflection"),
        ],
        enums: &[],
        implementation: Implementation::Native,
    },
    KernelSignature {
        name: "NewGeometry",
        inputs: &[],
        outputs: &[
            v("Position", "position"),
            v("Normal", "normal"),
            v("Tangent", "tangent"),
            v("True Normal", "true_normal"),
            v("Incoming", "incoming"),
            v("Parametric", "parametric"),
            f("Backfacing", "backfacing"),
            f("Pointiness", "pointiness"),
            f("Random Per Island", "random_per_island"),
        ],
        enums: &[],
        implementation: Implementation::Native,
    },
    KernelSignature {
        name: "LightPath",
        inputs: &[],
        outputs: &[
            f("Is Camera Ray", "is_camera_ray"),
            f("Is Shadow Ray", "is_shadow_ray"),
            f("Is Diffuse Ray", "is_diffuse_ray"),
            f("Is Glossy Ray", "is_glossy_ray"),
            f("Is Singular Ray", "is_singular_ray"),
            f("Is Reflection Ray", "is_reflection_ray"),
            f("Is Transmission Ray", "is_transmission_ray"),
            f("Ray Length", "ray_length"),
            f("Ray Depth", "ray_depth"),
            f("Diffuse Depth", "diffuse_depth"),
            f("Glossy Depth", "glossy_depth"),
            f("Transparent Depth", "transparent_depth"),
            f("Transmission Depth", "transmission_depth"),
        ],
        enums: &[],
        implementation: Implementation::Native,
    },
    KernelSignature {
        name: "Fresnel",
        inputs: &[f("IOR", "ior"), v("Normal", "normal")],
        outputs: &[f("Fac", "fac")],
        enums: &[],
        implementation: Implementation::Native,
    },
    KernelSignature {
        name: "LayerWeight",
        inputs: &[f("Blend", "blend"), v("Normal", "normal")],
        outputs: &[f("Fresnel", "fresnel"), f("Facing", "facing")],
        enums: &[],
        implementation: Implementation::Native,
    },
    KernelSignature {
        name: "UvMap",
        inputs: &[],
        outputs: &[v("UV", "uv")],
        enums: &[],
        implementation: Implementation::Native,
    },
    KernelSignature {
        name: "NormalProduct",
        inputs: &[v("Normal", "normal")],
        outputs: &[v("Normal", "normal"), f("Dot", "dot")],
        enums: &[],
        implementation: Implementation::Native,
    },
    // Shaders
    KernelSignature {
        name: "Emission",
        inputs: &[c("Color", "color"), f("Strength", "strength")],
        outputs: &[s("Emission", "emission")],
        enums: &[],
        implementation: Implementation::Native,
    },
    KernelSignature {
        name: "Background",
        inputs: &[c("Color", "color"), f("Strength", "strength")],
        outputs: &[s("Background", "background")],
        enums: &[],
        implementation: Implementation::Native,
    },
    KernelSignature {
        name: "BsdfPrincipled",
        inputs: &[
            c("Base Color", "base_color"),
            f("Metallic", "metallic"),
            f("Specular", "specular"),
            f("Specular IOR Level", "specular"),
            c("Specular Tint", "specular_tint"),
            f("Roughness", "roughness"),
            f("IOR", "ior"),
            f("Transmission", "transmission"),
            f("Transmission Weight", "transmission"),
            c("Emission", "emission"),
            c("Emission Color", "emission"),
            f("Emission Strength", "emission_strength"),
            f("Alpha", "alpha"),
            v("Normal", "normal"),
            f("Clearcoat", "clearcoat"),
            f("Coat Weight", "clearcoat"),
            f("Clearcoat Roughness", "clearcoat_roughness"),
            f("Coat Roughness", "clearcoat_roughness"),
            f("Sheen", "sheen"),
            f("Sheen Weight", "sheen"),
        ],
        outputs: &[s("BSDF", "bsdf")],
        enums: &[
            DISTRIBUTION,
            e(
                "SUBSURFACE_METHOD",
                &["BURLEY", "RANDOM_WALK", "RANDOM_WALK_SKIN", "RANDOM_WALK_FIXED_RADIUS"],
            ),
        ],
        implementation: Implementation::Native,
    },
    KernelSignature {
        name: "BsdfDiffuse",
        inputs: &[c("Color", "color"), f("Roughness", "roughness"), v("Normal", "normal")],
        outputs: &[s("BSDF", "bsdf")],
        enums: &[],
        implementation: Implementation::Native,
    },
    KernelSignature {
        name: "BsdfGlossy",
        inputs: &[c("Color", "color"), f("Roughness", "roughness"), v("Normal", "normal")],
        outputs: &[s("BSDF", "bsdf")],
        enums: &[DISTRIBUTION],
        implementation: Implementation::Native,
    },
    KernelSignature {
        name: "BsdfGlass",
        inputs: &[
            c("Color", "color"),
            f("Roughness", "roughness"),
            f("IOR", "ior"),
            v("Normal", "normal"),
        ],
        outputs: &[s("BSDF", "bsdf")],
        enums: &[DISTRIBUTION],
        implementation: Implementation::Native,
    },
    KernelSignature {
        name: "BsdfTransparent",
        inputs: &[c("Color", "color")],
        outputs: &[s("BSDF", "bsdf")],
        enums: &[],
        implementation: Implementation::Native,
    },
    KernelSignature {
        name: "AddShader",
        inputs: &[s("Shader", "shader"), s("Shader_001", "shader_001")],
        outputs: &[s("Shader", "shader")],
        enums: &[],
        implementation: Implementation::Native,
    },
    KernelSignature {
        name: "MixShader",
        inputs: &[f("Fac", "fac"), s("Shader", "shader"), s("Shader_001", "shader_001")],
        outputs: &[s("Shader", "shader")],
        enums: &[],
        implementation: Implementation::Native,
    },
    // Stubs
    KernelSignature {
        name: "TexIes",
        inputs: &[v("Vector", "vector"), f("Strength", "strength")],
        outputs: &[f("Fac", "fac")],
        enums: &[],
        implementation: Implementation::Stub(&[("fac", "(*n).strength")]),
    },
    KernelSignature {
        name: "TexMagic",
        inputs: &[v("Vector", "vector"), f("Scale", "scale"), f("Distortion", "distortion")],
        outputs: &[c("Color", "color"), f("Fac", "fac")],
        enums: &[],
        implementation: Implementation::Stub(&[]),
    },
    KernelSignature {
        name: "TexVoronoi",
        inputs: &[v("Vector", "vector"), f("Scale", "scale"), f("Randomness", "randomness")],
        outputs: &[
            f("Distance", "distance"),
            c("Color", "color"),
            v("Position", "position"),
            f("W", "w"),
            f("Radius", "radius"),
        ],
        enums: &[],
        implementation: Implementation::Stub(&[]),
    },
    KernelSignature {
        name: "TexMusgrave",
        inputs: &[v("Vector", "vector"), f("Scale", "scale"), f("Detail", "detail")],
        outputs: &[f("Fac", "fac"), f("Height", "height")],
        enums: &[],
        implementation: Implementation::Stub(&[]),
    },
    KernelSignature {
        name: "TexBrick",
        inputs: &[
            v("Vector", "vector"),
            c("Color1", "color1"),
            c("Color2", "color2"),
            c("Mortar", "mortar"),
            f("Scale", "scale"),
        ],
        outputs: &[c("Color", "color"), f("Fac", "fac")],
        enums: &[],
        implementation: Implementation::Stub(&[("color", "(*n).color1")]),
    },
    KernelSignature {
        name: "AmbientOcclusion",
        inputs: &[c("Color", "color"), f("Distance", "distance"), v("Normal", "normal")],
        outputs: &[c("Color", "color"), f("AO", "ao")],
        enums: &[],
        implementation: Implementation::Stub(&[("ao", "vec4f(1.0)")]),
    },
    KernelSignature {
        name: "VolumeScatter",
        inputs: &[c("Color", "color"), f("Density", "density")],
        outputs: &[s("Volume", "volume")],
        enums: &[],
        implementation: Implementation::Stub(&[]),
    },
    KernelSignature {
        name: "Displacement",
        inputs: &[
            f("Height", "height"),
            f("Midlevel", "midlevel"),
            f("Scale", "scale"),
            v("Normal", "normal"),
        ],
        outputs: &[v("Displacement", "displacement")],
        enums: &[],
        implementation: Implementation::Stub(&[]),
    },
    KernelSignature {
        name: "BsdfVelvet",
        inputs: &[c("Color", "color"), f("Sigma", "sigma"), v("Normal", "normal")],
        outputs: &[s("BSDF", "bsdf")],
        enums: &[],
        implementation: Implementation::Stub(BSDF_FALLBACK),
    },
    KernelSignature {
        name: "BsdfHair",
        inputs: &[c("Color", "color"), f("Offset", "offset"), f("RoughnessU", "roughness_u")],
        outputs: &[s("BSDF", "bsdf")],
        enums: &[],
        implementation: Implementation::Stub(BSDF_FALLBACK),
    },
    KernelSignature {
        name: "BsdfTranslucent",
        inputs: &[c("Color", "color"), v("Normal", "normal")],
        outputs: &[s("BSDF", "bsdf")],
        enums: &[],
        implementation: Implementation::Stub(BSDF_FALLBACK),
    },
    KernelSignature {
        name: "BsdfRefraction",
        inputs: &[
            c("Color", "color"),
            f("Roughness", "roughness"),
            f("IOR", "ior"),
            v("Normal", "normal"),
        ],
        outputs: &[s("BSDF", "bsdf")],
        enums: &[],
        implementation: Implementation::Stub(BSDF_FALLBACK),
    },
    KernelSignature {
        name: "BsdfAnisotropic",
        inputs: &[
            c("Color", "color"),
            f("Roughness", "roughness"),
            f("Anisotropy", "anisotropy"),
            f("Rotation", "rotation"),
            v("Normal", "normal"),
        ],
        outputs: &[s("BSDF", "bsdf")],
        enums: &[],
        implementation: Implementation::Stub(BSDF_FALLBACK),
    },
    KernelSignature {
        name: "Bump",
        inputs: &[
            f("Strength", "strength"),
            f("Distance", "distance"),
            f("Height", "height"),
            v("Normal", "normal"),
        ],
        outputs: &[v("Normal", "normal")],
        enums: &[],
        implementation: Implementation::Stub(&[]),
    },
    KernelSignature {
        name: "Attribute",
        inputs: &[],
        outputs: &[
            c("Color", "color"),
            v("Vector", "vector"),
            f("Fac", "fac"),
            f("Alpha", "alpha"),
        ],
        enums: &[],
        implementation: Implementation::Stub(&[
            ("color", "vec4f(1.0)"),
            ("fac", "vec4f(1.0)"),
            ("alpha", "vec4f(1.0)"),
        ]),
    },
    KernelSignature {
        name: "ObjectInfo",
        inputs: &[],
        outputs: &[
            v("Location", "location"),
            c("Color", "color"),
            f("Alpha", "alpha"),
            f("Object Index", "object_index"),
            f("Material Index", "material_index"),
            f("Random", "random"),
        ],
        enums: &[],
        implementation: Implementation::Stub(&[
            ("color", "vec4f(1.0)"),
            ("alpha", "vec4f(1.0)"),
            ("random", "vec4f(0.5)"),
        ]),
    },
    KernelSignature {
        name: "ParticleInfo",
        inputs: &[],
        outputs: &[
            f("Index", "index"),
            f("Random", "random"),
            f("Age", "age"),
            f("Lifetime", "lifetime"),
            v("Location", "location"),
            f("Size", "size"),
            v("Velocity", "velocity"),
            v("Angular Velocity", "angular_velocity"),
        ],
        enums: &[],
        implementation: Implementation::Stub(&[]),
    },
    KernelSignature {
        name: "LightFalloff",
        inputs: &[f("Strength", "strength"), f("Smooth", "smooth_factor")],
        outputs: &[
            f("Quadratic", "quadratic_falloff"),
            f("Linear", "linear_falloff"),
            f("Constant", "constant_falloff"),
        ],
        enums: &[],
        implementation: Implementation::Stub(&[
            ("quadratic_falloff", "(*n).strength"),
            ("linear_falloff", "(*n).strength"),
            ("constant_falloff", "(*n).strength"),
        ]),
    },
    KernelSignature {
        name: "VertexColor",
        inputs: &[],
        outputs: &[c("Color", "color"), f("Alpha", "alpha")],
        enums: &[],
        implementation: Implementation::Stub(&[("color", "vec4f(1.0)"), ("alpha", "vec4f(1.0)")]),
    },
    KernelSignature {
        name: "ColorCurves",
        inputs: &[f("Fac", "fac"), c("Color", "color")],
        outputs: &[c("Color", "color")],
        enums: &[],
        implementation: Implementation::Stub(&[]),
    },
];

/// Looks up a signature by WGSL kernel name.
pub fn signature(name: &str) -> Option<&'static KernelSignature> {
    SIGNATURES.iter().find(|sig| sig.name == name)
}
