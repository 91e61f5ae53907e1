use std::sync::Arc;

use rayon::prelude::*;

use crate::foundation::core::{ColorSpace, Rect};
use crate::foundation::error::{FilterError, FilterResult};
use crate::foundation::math::unit_to_u8;
use crate::graph::context::RenderContext;
use crate::graph::node::{Filter, NodeView};
use crate::ops::{Arity, OpImpl, primary_bounds, source_in_space};
use crate::raster::buffer::Raster;
use crate::raster::color::{linear_to_srgb, srgb_to_linear, unpremultiply_px};

/// Linear-light XYZ (D65) to linear sRGB.
const XYZ_TO_SRGB: [f64; 9] = [
    3.240_454_2,
    -1.537_138_5,
    -0.498_531_4,
    -0.969_266_0,
    1.876_010_8,
    0.041_556_0,
    0.055_643_4,
    -0.204_025_9,
    1.057_225_2,
];

const SRGB_TO_XYZ: [f64; 9] = [
    0.412_456_4,
    0.357_576_1,
    0.180_437_5,
    0.212_672_9,
    0.715_152_2,
    0.072_175_0,
    0.019_333_9,
    0.119_192_0,
    0.950_304_1,
];

const ADOBE_RGB_TO_XYZ: [f64; 9] = [
    0.576_730_9,
    0.185_554_0,
    0.188_185_2,
    0.297_376_9,
    0.627_349_1,
    0.075_274_1,
    0.027_034_3,
    0.070_687_2,
    0.991_108_5,
];

const DISPLAY_P3_TO_XYZ: [f64; 9] = [
    0.486_570_9,
    0.265_667_7,
    0.198_217_3,
    0.228_974_6,
    0.691_738_5,
    0.079_286_9,
    0.0,
    0.045_113_4,
    1.043_944_4,
];

/// Encoding curve of a profile's channels.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToneCurve {
    /// Values are already linear.
    Linear,
    /// The piecewise sRGB curve.
    Srgb,
    /// Pure power law.
    Gamma(f32),
}

impl ToneCurve {
    /// Encoded unit value to linear light.
    pub fn decode(self, v: f32) -> f32 {
        match self {
            ToneCurve::Linear => v,
            ToneCurve::Srgb => srgb_to_linear(v),
            ToneCurve::Gamma(g) => v.max(0.0).powf(g),
        }
    }
}

/// Matrix/curve color profile: per-channel curve followed by a 3x3 matrix into XYZ.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ColorProfile {
    /// Display name.
    pub name: String,
    /// Row-major linear RGB to XYZ (D65).
    pub to_xyz: [f64; 9],
    /// Channel encoding.
    pub curve: ToneCurve,
}

impl ColorProfile {
    /// The sRGB profile; converting from it is the identity.
    pub fn srgb() -> Self {
        Self {
            name: "sRGB".to_owned(),
            to_xyz: SRGB_TO_XYZ,
            curve: ToneCurve::Srgb,
        }
    }

    /// Adobe RGB (1998).
    pub fn adobe_rgb() -> Self {
        Self {
            name: "Adobe RGB (1998)".to_owned(),
            to_xyz: ADOBE_RGB_TO_XYZ,
            curve: ToneCurve::Gamma(2.199_218_75),
        }
    }

    /// Display P3.
    pub fn display_p3() -> Self {
        Self {
            name: "Display P3".to_owned(),
            to_xyz: DISPLAY_P3_TO_XYZ,
            curve: ToneCurve::Srgb,
        }
    }

    /// Profile from an explicit matrix and curve.
    pub fn custom(name: impl Into<String>, to_xyz: [f64; 9], curve: ToneCurve) -> Self {
        Self {
            name: name.into(),
            to_xyz,
            curve,
        }
    }

    /// Look up a preset by name.
    pub fn preset(name: &str) -> FilterResult<Self> {
        match name {
            "srgb" | "sRGB" => Ok(Self::srgb()),
            "adobe_rgb" => Ok(Self::adobe_rgb()),
            "display_p3" => Ok(Self::display_p3()),
            other => Err(FilterError::validation(format!(
                "unknown color profile '{other}'"
            ))),
        }
    }

    /// Row-major matrix taking this profile's linear RGB to linear sRGB.
    fn to_linear_srgb(&self) -> [f32; 9] {
        let mut out = [0.0f32; 9];
        for row in 0..3 {
            for col in 0..3 {
                let v: f64 = (0..3)
                    .map(|k| XYZ_TO_SRGB[row * 3 + k] * self.to_xyz[k * 3 + col])
                    .sum();
                out[row * 3 + col] = v as f32;
            }
        }
        out
    }
}

/// Reinterprets source pixels as encoded in a profile and converts them to sRGB.
#[derive(Clone, Debug, PartialEq)]
pub struct ProfileOp {
    /// Profile the source pixels are encoded in.
    pub profile: ColorProfile,
}

impl ProfileOp {
    /// Convert from `profile` to sRGB.
    pub fn new(profile: ColorProfile) -> FilterResult<Self> {
        let op = Self { profile };
        op.check()?;
        Ok(op)
    }
}

impl OpImpl for ProfileOp {
    fn name(&self) -> &'static str {
        "profile"
    }

    fn arity(&self) -> Arity {
        Arity::Exact(1)
    }

    fn check(&self) -> FilterResult<()> {
        let curve_ok = match self.profile.curve {
            ToneCurve::Gamma(g) => g.is_finite() && g > 0.0,
            _ => true,
        };
        if !curve_ok || !self.profile.to_xyz.iter().all(|v| v.is_finite()) {
            return Err(FilterError::validation(format!(
                "color profile '{}' has invalid parameters",
                self.profile.name
            )));
        }
        Ok(())
    }

    fn bounds(&self, sources: &[Filter]) -> Rect {
        primary_bounds(sources)
    }

    fn render(&self, node: &NodeView<'_>, ctx: &RenderContext) -> FilterResult<Option<Arc<Raster>>> {
        let Some(mut raster) = source_in_space(node, ctx, ColorSpace::Srgb)? else {
            return Ok(None);
        };
        let curve = self.profile.curve;
        let mut decode = [0.0f32; 256];
        for (i, slot) in decode.iter_mut().enumerate() {
            *slot = curve.decode(i as f32 / 255.0);
        }
        let m = self.profile.to_linear_srgb();
        raster
            .data_mut()
            .par_chunks_mut(4 * 256)
            .for_each(|chunk| {
                for px in chunk.chunks_exact_mut(4) {
                    let s = unpremultiply_px([px[0], px[1], px[2], px[3]]);
                    let lin = [
                        decode[usize::from(s[0])],
                        decode[usize::from(s[1])],
                        decode[usize::from(s[2])],
                    ];
                    let a = f32::from(s[3]) / 255.0;
                    for row in 0..3 {
                        let v = m[row * 3] * lin[0] + m[row * 3 + 1] * lin[1] + m[row * 3 + 2] * lin[2];
                        px[row] = unit_to_u8(linear_to_srgb(v.clamp(0.0, 1.0)) * a);
                    }
                }
            });
        Ok(Some(Arc::new(raster)))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/ops/profile.rs"]
mod tests;
