use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::foundation::core::{Color, ColorSpace, Rect};
use crate::foundation::error::{FilterError, FilterResult};
use crate::ops::{
    Channel, ColorMatrixKind, ColorProfile, CompositeRule, EdgeMode, FilterResolution, Light,
    MorphologyOp, NoiseKind, PadMode, TransferFunction,
};

/// Declarative filter graph: named nodes wired by id, plus the node to render.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GraphDesc {
    /// Every node of the graph, in any order.
    pub nodes: Vec<NodeDesc>,
    /// Id of the node to render.
    pub output: String,
}

impl GraphDesc {
    /// Parse a JSON description.
    pub fn from_json(s: &str) -> FilterResult<Self> {
        serde_json::from_str(s).map_err(|e| FilterError::serde(format!("graph description: {e}")))
    }

    /// Read and parse a JSON description from disk.
    pub fn load(path: &Path) -> FilterResult<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read graph description {}", path.display()))?;
        Self::from_json(&text)
    }

    /// Serialize back to pretty JSON.
    pub fn to_json(&self) -> FilterResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| FilterError::serde(e.to_string()))
    }
}

/// One node of a [`GraphDesc`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeDesc {
    /// Unique id, referenced by `inputs` and `output`.
    pub id: String,
    /// Source node ids, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<String>,
    /// Operator and its parameters.
    #[serde(flatten)]
    pub op: OpDesc,
    /// Properties set on the built node.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, serde_json::Value>,
}

/// Color as `"#rrggbb[aa]"` or `{ "r": .., "g": .., "b": .., "a": .. }`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColorDesc {
    /// Hex notation.
    Hex(String),
    /// Components in `[0, 1]`.
    Value(Color),
}

impl ColorDesc {
    /// Resolve to a [`Color`].
    pub fn resolve(&self) -> FilterResult<Color> {
        match self {
            ColorDesc::Hex(s) => Color::from_hex(s),
            ColorDesc::Value(c) => Ok(*c),
        }
    }
}

impl Default for ColorDesc {
    fn default() -> Self {
        ColorDesc::Value(Color::WHITE)
    }
}

/// Profile by preset name or explicit matrix and curve.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProfileDesc {
    /// `"srgb"`, `"adobe_rgb"` or `"display_p3"`.
    Preset(String),
    /// Explicit profile.
    Custom(ColorProfile),
}

fn one() -> f64 {
    1.0
}

fn one_f32() -> f32 {
    1.0
}

fn one_octave() -> u32 {
    1
}

fn linear() -> ColorSpace {
    ColorSpace::LinearRgb
}

/// Operator parameters, tagged by `"op"`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum OpDesc {
    /// PNG/JPEG file, relative to the builder's root directory.
    Image {
        /// File path.
        path: String,
        /// User-space placement; one unit per pixel at the origin otherwise.
        #[serde(default)]
        placement: Option<Rect>,
    },
    /// Filter supplied by the caller through [`crate::builder::GraphBuilder::bind`].
    Named {
        /// Binding name.
        name: String,
    },
    /// Anti-aliased solid rectangle painter.
    Rect {
        /// User-space rectangle.
        rect: Rect,
        /// Fill.
        #[serde(default)]
        color: ColorDesc,
    },
    /// Solid fill.
    Flood {
        /// Filled region.
        region: Rect,
        /// Fill.
        #[serde(default)]
        color: ColorDesc,
        /// Extra opacity in `[0, 1]`.
        #[serde(default = "one_f32")]
        opacity: f32,
    },
    /// Perlin noise.
    Turbulence {
        /// Generated region.
        region: Rect,
        /// Base frequency per axis.
        base_frequency: (f64, f64),
        /// Octave count.
        #[serde(default = "one_octave")]
        octaves: u32,
        /// Seed.
        #[serde(default)]
        seed: i32,
        /// Stitch across the region edges.
        #[serde(default)]
        stitch_tiles: bool,
        /// Summation flavour.
        #[serde(default)]
        kind: NoiseKind,
        /// Output space.
        #[serde(default = "linear")]
        color_space: ColorSpace,
    },
    /// Extra affine transform `[a, b, c, d, e, f]`.
    Affine {
        /// Coefficients.
        transform: [f64; 6],
    },
    /// Translation.
    Offset {
        /// X shift.
        dx: f64,
        /// Y shift.
        dy: f64,
    },
    /// Crop or pad.
    Pad {
        /// Output region.
        region: Rect,
        /// Edge policy.
        #[serde(default)]
        mode: PadMode,
    },
    /// N-ary composite.
    Composite {
        /// Combination rule.
        #[serde(default)]
        rule: CompositeRule,
        /// Working space.
        #[serde(default)]
        color_space: ColorSpace,
    },
    /// Pattern repetition.
    Tile {
        /// Cell of the source repeated.
        tile_region: Rect,
        /// Region filled with copies.
        tiled_region: Rect,
        /// Let the source spill into neighbouring cells.
        #[serde(default)]
        overflow: bool,
    },
    /// Region crop with optional resolution clamp.
    Chain {
        /// Output region.
        region: Rect,
        /// Resolution clamp.
        #[serde(default)]
        resolution: Option<FilterResolution>,
    },
    /// Color matrix family.
    ColorMatrix {
        /// Matrix or shorthand.
        kind: ColorMatrixKind,
        /// Working space.
        #[serde(default)]
        color_space: ColorSpace,
    },
    /// Per-channel transfer functions.
    ComponentTransfer {
        /// Red.
        #[serde(default)]
        r: TransferFunction,
        /// Green.
        #[serde(default)]
        g: TransferFunction,
        /// Blue.
        #[serde(default)]
        b: TransferFunction,
        /// Alpha.
        #[serde(default)]
        a: TransferFunction,
        /// Working space.
        #[serde(default)]
        color_space: ColorSpace,
    },
    /// Conversion from a color profile into sRGB.
    Profile {
        /// Source profile.
        profile: ProfileDesc,
    },
    /// sRGB/linear conversion.
    ColorSpace {
        /// Target space.
        target: ColorSpace,
    },
    /// Gaussian blur.
    GaussianBlur {
        /// Standard deviation per axis.
        std_dev: (f64, f64),
        /// Working space.
        #[serde(default)]
        color_space: ColorSpace,
    },
    /// Kernel convolution.
    ConvolveMatrix {
        /// Columns and rows.
        order: (u32, u32),
        /// Row-major weights.
        kernel: Vec<f32>,
        /// Divisor; kernel sum otherwise.
        #[serde(default)]
        divisor: Option<f32>,
        /// Target cell; kernel center otherwise.
        #[serde(default)]
        target: Option<(u32, u32)>,
        /// Bias; only zero renders.
        #[serde(default)]
        bias: f32,
        /// Edge policy.
        #[serde(default)]
        edge_mode: EdgeMode,
        /// Kernel cell size in user units.
        #[serde(default)]
        kernel_unit_length: Option<(f64, f64)>,
        /// Keep source alpha.
        #[serde(default)]
        preserve_alpha: bool,
        /// Working space.
        #[serde(default)]
        color_space: ColorSpace,
    },
    /// Dilate or erode.
    Morphology {
        /// Dilate or erode.
        #[serde(default)]
        operator: MorphologyOp,
        /// Radii per axis.
        radius: (f64, f64),
    },
    /// Diffuse lighting.
    DiffuseLighting {
        /// Light source.
        light: Light,
        /// Bump height of full alpha.
        #[serde(default = "one")]
        surface_scale: f64,
        /// `kd`.
        #[serde(default = "one")]
        diffuse_constant: f64,
        /// Light color.
        #[serde(default)]
        color: ColorDesc,
        /// Bump-map cell size.
        #[serde(default)]
        kernel_unit_length: Option<(f64, f64)>,
        /// Working space.
        #[serde(default)]
        color_space: ColorSpace,
    },
    /// Specular lighting.
    SpecularLighting {
        /// Light source.
        light: Light,
        /// Bump height of full alpha.
        #[serde(default = "one")]
        surface_scale: f64,
        /// `ks`.
        #[serde(default = "one")]
        specular_constant: f64,
        /// Shininess in `[1, 128]`.
        #[serde(default = "one")]
        specular_exponent: f64,
        /// Light color.
        #[serde(default)]
        color: ColorDesc,
        /// Bump-map cell size.
        #[serde(default)]
        kernel_unit_length: Option<(f64, f64)>,
        /// Working space.
        #[serde(default)]
        color_space: ColorSpace,
    },
    /// Displacement by a second input.
    DisplacementMap {
        /// Displacement for a full channel swing.
        scale: f64,
        /// Channel for x.
        #[serde(default)]
        x_channel: Channel,
        /// Channel for y.
        #[serde(default)]
        y_channel: Channel,
        /// Space the map is read in.
        #[serde(default)]
        color_space: ColorSpace,
    },
}
