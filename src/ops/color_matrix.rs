use std::sync::Arc;

use rayon::prelude::*;

use crate::foundation::core::{ColorSpace, Rect};
use crate::foundation::error::{FilterError, FilterResult};
use crate::graph::context::RenderContext;
use crate::graph::node::{Filter, NodeView};
use crate::ops::{Arity, Capabilities, OpImpl, primary_bounds, source_in_space};
use crate::raster::buffer::Raster;

/// Preset families of [`ColorMatrix`].
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorMatrixKind {
    /// Row-major 4x5 matrix; the fifth column is an offset in unit range.
    Matrix([f32; 20]),
    /// Saturation; 0 is grayscale, 1 is unchanged.
    Saturate(f32),
    /// Hue rotation in degrees.
    HueRotate(f32),
    /// Alpha from luminance, color cleared.
    LuminanceToAlpha,
}

impl ColorMatrixKind {
    /// The equivalent 4x5 matrix.
    pub fn to_matrix(self) -> [f32; 20] {
        match self {
            ColorMatrixKind::Matrix(m) => m,
            ColorMatrixKind::Saturate(s) => [
                0.213 + 0.787 * s,
                0.715 - 0.715 * s,
                0.072 - 0.072 * s,
                0.0,
                0.0,
                0.213 - 0.213 * s,
                0.715 + 0.285 * s,
                0.072 - 0.072 * s,
                0.0,
                0.0,
                0.213 - 0.213 * s,
                0.715 - 0.715 * s,
                0.072 + 0.928 * s,
                0.0,
                0.0,
                0.0,
                0.0,
                0.0,
                1.0,
                0.0,
            ],
            ColorMatrixKind::HueRotate(deg) => {
                let (sin, cos) = deg.to_radians().sin_cos();
                [
                    0.213 + cos * 0.787 - sin * 0.213,
                    0.715 - cos * 0.715 - sin * 0.715,
                    0.072 - cos * 0.072 + sin * 0.928,
                    0.0,
                    0.0,
                    0.213 - cos * 0.213 + sin * 0.143,
                    0.715 + cos * 0.285 + sin * 0.140,
                    0.072 - cos * 0.072 - sin * 0.283,
                    0.0,
                    0.0,
                    0.213 - cos * 0.213 - sin * 0.787,
                    0.715 - cos * 0.715 + sin * 0.715,
                    0.072 + cos * 0.928 + sin * 0.072,
                    0.0,
                    0.0,
                    0.0,
                    0.0,
                    0.0,
                    1.0,
                    0.0,
                ]
            }
            ColorMatrixKind::LuminanceToAlpha => {
                let mut m = [0.0; 20];
                m[15] = 0.2125;
                m[16] = 0.7154;
                m[17] = 0.0721;
                m
            }
        }
    }
}

/// 4x5 color matrix applied to straight-alpha pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColorMatrix {
    /// Matrix family and parameters.
    pub kind: ColorMatrixKind,
    /// Space the matrix is applied in.
    pub color_space: ColorSpace,
}

impl ColorMatrix {
    /// Matrix operator working in sRGB.
    pub fn new(kind: ColorMatrixKind) -> FilterResult<Self> {
        let op = Self {
            kind,
            color_space: ColorSpace::Srgb,
        };
        op.check()?;
        Ok(op)
    }

    /// Same matrix, applied in `space`.
    pub fn in_space(mut self, space: ColorSpace) -> Self {
        self.color_space = space;
        self
    }
}

/// Apply `m` to premultiplied RGBA8 pixels in place.
pub(crate) fn color_matrix_rgba8_premul(data: &mut [u8], m: &[f32; 20]) {
    data.par_chunks_mut(4 * 256).for_each(|chunk| {
        for px in chunk.chunks_exact_mut(4) {
            let pa = f32::from(px[3]) / 255.0;
            let inv_a = if pa > 0.0 { 1.0 / pa } else { 0.0 };
            let r = f32::from(px[0]) / 255.0 * inv_a;
            let g = f32::from(px[1]) / 255.0 * inv_a;
            let b = f32::from(px[2]) / 255.0 * inv_a;

            let row = |i: usize| {
                (m[i] * r + m[i + 1] * g + m[i + 2] * b + m[i + 3] * pa + m[i + 4]).clamp(0.0, 1.0)
            };
            let (out_r, out_g, out_b, out_a) = (row(0), row(5), row(10), row(15));

            px[0] = (out_r * out_a * 255.0).round().clamp(0.0, 255.0) as u8;
            px[1] = (out_g * out_a * 255.0).round().clamp(0.0, 255.0) as u8;
            px[2] = (out_b * out_a * 255.0).round().clamp(0.0, 255.0) as u8;
            px[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
        }
    });
}

impl OpImpl for ColorMatrix {
    fn name(&self) -> &'static str {
        "color_matrix"
    }

    fn arity(&self) -> Arity {
        Arity::Exact(1)
    }

    fn check(&self) -> FilterResult<()> {
        let ok = match self.kind {
            ColorMatrixKind::Matrix(m) => m.iter().all(|v| v.is_finite()),
            ColorMatrixKind::Saturate(s) => s.is_finite() && s >= 0.0,
            ColorMatrixKind::HueRotate(d) => d.is_finite(),
            ColorMatrixKind::LuminanceToAlpha => true,
        };
        if !ok {
            return Err(FilterError::validation(format!(
                "invalid color matrix parameters: {:?}",
                self.kind
            )));
        }
        Ok(())
    }

    fn bounds(&self, sources: &[Filter]) -> Rect {
        primary_bounds(sources)
    }

    fn capabilities(&self, _sources: &[Filter]) -> Capabilities {
        Capabilities::COLOR_SPACE_AWARE
    }

    fn render(&self, node: &NodeView<'_>, ctx: &RenderContext) -> FilterResult<Option<Arc<Raster>>> {
        let space = ctx.op_space(self.color_space);
        let Some(mut raster) = source_in_space(node, ctx, space)? else {
            return Ok(None);
        };
        let m = self.kind.to_matrix();
        color_matrix_rgba8_premul(raster.data_mut(), &m);
        Ok(Some(Arc::new(raster)))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/ops/color_matrix.rs"]
mod tests;
