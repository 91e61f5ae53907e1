use std::sync::Arc;

use rayon::prelude::*;

use crate::foundation::core::{ColorSpace, Rect};
use crate::foundation::error::{FilterError, FilterResult};
use crate::foundation::math::{mul_div255_u8, unit_to_u8};
use crate::graph::context::RenderContext;
use crate::graph::node::{Filter, NodeView};
use crate::ops::{Arity, Capabilities, OpImpl, primary_bounds, source_in_space};
use crate::raster::buffer::Raster;
use crate::raster::color::unpremultiply_px;

/// Transfer function applied to one channel of straight-alpha pixels.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransferFunction {
    /// Leave the channel unchanged.
    #[default]
    Identity,
    /// Piecewise-linear interpolation between evenly spaced values.
    Table {
        /// Samples at `k / (n - 1)`.
        values: Vec<f32>,
    },
    /// Step function over evenly spaced intervals.
    Discrete {
        /// One value per interval.
        values: Vec<f32>,
    },
    /// `slope * C + intercept`.
    Linear {
        /// Multiplier.
        slope: f32,
        /// Offset.
        intercept: f32,
    },
    /// `amplitude * C^exponent + offset`.
    Gamma {
        /// Multiplier.
        amplitude: f32,
        /// Power.
        exponent: f32,
        /// Offset.
        offset: f32,
    },
}

impl TransferFunction {
    /// Evaluate for a unit-range input, clamping the result to `[0, 1]`.
    pub fn apply(&self, c: f32) -> f32 {
        let v = match self {
            TransferFunction::Identity => c,
            TransferFunction::Table { values } => match values.len() {
                0 => c,
                1 => values[0],
                len => {
                    let n = (len - 1) as f32;
                    let k = ((c * n).floor() as usize).min(len - 2);
                    let (v0, v1) = (values[k], values[k + 1]);
                    v0 + (c - k as f32 / n) * n * (v1 - v0)
                }
            },
            TransferFunction::Discrete { values } => match values.len() {
                0 => c,
                len => values[((c * len as f32).floor() as usize).min(len - 1)],
            },
            TransferFunction::Linear { slope, intercept } => slope * c + intercept,
            TransferFunction::Gamma {
                amplitude,
                exponent,
                offset,
            } => amplitude * c.powf(*exponent) + offset,
        };
        v.clamp(0.0, 1.0)
    }

    fn is_identity(&self) -> bool {
        match self {
            TransferFunction::Identity => true,
            TransferFunction::Table { values } | TransferFunction::Discrete { values } => {
                values.is_empty()
            }
            _ => false,
        }
    }

    fn check(&self, channel: &str) -> FilterResult<()> {
        let finite = match self {
            TransferFunction::Identity => true,
            TransferFunction::Table { values } | TransferFunction::Discrete { values } => {
                values.iter().all(|v| v.is_finite())
            }
            TransferFunction::Linear { slope, intercept } => {
                slope.is_finite() && intercept.is_finite()
            }
            TransferFunction::Gamma {
                amplitude,
                exponent,
                offset,
            } => amplitude.is_finite() && exponent.is_finite() && offset.is_finite(),
        };
        if finite {
            Ok(())
        } else {
            Err(FilterError::validation(format!(
                "{channel} transfer function has non-finite parameters"
            )))
        }
    }

    fn lut(&self) -> [u8; 256] {
        let mut lut = [0u8; 256];
        for (i, slot) in lut.iter_mut().enumerate() {
            *slot = unit_to_u8(self.apply(i as f32 / 255.0));
        }
        lut
    }
}

/// Independent transfer functions for R, G, B and A.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ComponentTransfer {
    /// Red channel.
    pub r: TransferFunction,
    /// Green channel.
    pub g: TransferFunction,
    /// Blue channel.
    pub b: TransferFunction,
    /// Alpha channel.
    pub a: TransferFunction,
    /// Space the functions are evaluated in.
    pub color_space: ColorSpace,
}

impl ComponentTransfer {
    /// Transfer with the given per-channel functions, in sRGB.
    pub fn new(
        r: TransferFunction,
        g: TransferFunction,
        b: TransferFunction,
        a: TransferFunction,
    ) -> FilterResult<Self> {
        let op = Self {
            r,
            g,
            b,
            a,
            color_space: ColorSpace::Srgb,
        };
        op.check()?;
        Ok(op)
    }

    /// Same functions, evaluated in `space`.
    pub fn in_space(mut self, space: ColorSpace) -> Self {
        self.color_space = space;
        self
    }
}

impl OpImpl for ComponentTransfer {
    fn name(&self) -> &'static str {
        "component_transfer"
    }

    fn arity(&self) -> Arity {
        Arity::Exact(1)
    }

    fn check(&self) -> FilterResult<()> {
        self.r.check("red")?;
        self.g.check("green")?;
        self.b.check("blue")?;
        self.a.check("alpha")
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
        let funcs = [&self.r, &self.g, &self.b, &self.a];
        if funcs.iter().all(|f| f.is_identity()) {
            return Ok(Some(Arc::new(raster)));
        }
        let luts = funcs.map(TransferFunction::lut);
        raster
            .data_mut()
            .par_chunks_mut(4 * 256)
            .for_each(|chunk| {
                for px in chunk.chunks_exact_mut(4) {
                    let s = unpremultiply_px([px[0], px[1], px[2], px[3]]);
                    let a = luts[3][usize::from(s[3])];
                    for i in 0..3 {
                        let c = luts[i][usize::from(s[i])];
                        px[i] = mul_div255_u8(u16::from(c), u16::from(a));
                    }
                    px[3] = a;
                }
            });
        Ok(Some(Arc::new(raster)))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/ops/component_transfer.rs"]
mod tests;
