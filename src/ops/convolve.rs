use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::foundation::core::{ColorSpace, PixelRect, Rect};
use crate::foundation::error::{FilterError, FilterResult};
use crate::geom::decompose::decompose;
use crate::geom::region;
use crate::graph::context::RenderContext;
use crate::graph::node::{Filter, NodeView};
use crate::ops::{
    Arity, Capabilities, OpImpl, device_clip, finish_staged, primary_bounds, render_area,
};
use crate::raster::buffer::Raster;

/// How a convolution kernel samples past the edge of its input.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeMode {
    /// Repeat the nearest edge pixel.
    #[default]
    Duplicate,
    /// Wrap around to the opposite edge. Rejected at render time.
    Wrap,
    /// Treat outside pixels as transparent black.
    None,
}

/// General `w × h` kernel convolution.
///
/// Output pixel `(x, y)` is
/// `Σ src(x - tx + j, y - ty + i) * kernel[(w - 1 - j) + (h - 1 - i) * w] / divisor`, evaluated
/// in kernel-unit space. Only a zero bias and the duplicate/none edge modes are rendered.
#[derive(Clone, Debug, PartialEq)]
pub struct ConvolveMatrix {
    /// Kernel columns and rows.
    pub order: (u32, u32),
    /// Row-major weights, `order.0 * order.1` of them.
    pub kernel: Vec<f32>,
    /// Explicit divisor; the kernel sum (or 1 when that is zero) otherwise.
    pub divisor: Option<f32>,
    /// Kernel cell aligned with the output pixel.
    pub target: (u32, u32),
    /// Constant added after division.
    pub bias: f32,
    /// Edge sampling policy.
    pub edge_mode: EdgeMode,
    /// User-space size of one kernel cell; device pixels when unset.
    pub kernel_unit_length: Option<(f64, f64)>,
    /// Convolve color only and keep the source alpha.
    pub preserve_alpha: bool,
    /// Space the convolution runs in.
    pub color_space: ColorSpace,
}

impl ConvolveMatrix {
    /// Centered kernel of `order` with default divisor and duplicate edges.
    pub fn new(order: (u32, u32), kernel: Vec<f32>) -> FilterResult<Self> {
        let op = Self {
            order,
            kernel,
            divisor: None,
            target: (order.0 / 2, order.1 / 2),
            bias: 0.0,
            edge_mode: EdgeMode::Duplicate,
            kernel_unit_length: None,
            preserve_alpha: false,
            color_space: ColorSpace::Srgb,
        };
        op.check()?;
        Ok(op)
    }

    /// Move the target cell.
    pub fn with_target(mut self, tx: u32, ty: u32) -> FilterResult<Self> {
        self.target = (tx, ty);
        self.check()?;
        Ok(self)
    }

    /// Set an explicit divisor.
    pub fn with_divisor(mut self, divisor: f32) -> FilterResult<Self> {
        self.divisor = Some(divisor);
        self.check()?;
        Ok(self)
    }

    /// Set the bias. Anything but zero fails at render time.
    pub fn with_bias(mut self, bias: f32) -> FilterResult<Self> {
        self.bias = bias;
        self.check()?;
        Ok(self)
    }

    /// Set the edge mode.
    pub fn with_edge_mode(mut self, mode: EdgeMode) -> Self {
        self.edge_mode = mode;
        self
    }

    /// Evaluate the kernel on a fixed user-space grid.
    pub fn with_kernel_unit_length(mut self, dx: f64, dy: f64) -> FilterResult<Self> {
        self.kernel_unit_length = Some((dx, dy));
        self.check()?;
        Ok(self)
    }

    /// Keep source alpha.
    pub fn preserving_alpha(mut self, preserve: bool) -> Self {
        self.preserve_alpha = preserve;
        self
    }

    /// Same convolution, in `space`.
    pub fn in_space(mut self, space: ColorSpace) -> Self {
        self.color_space = space;
        self
    }

    fn effective_divisor(&self) -> f32 {
        match self.divisor {
            Some(d) => d,
            None => {
                let sum: f32 = self.kernel.iter().sum();
                if sum == 0.0 { 1.0 } else { sum }
            }
        }
    }

    /// Kernel cells reached left, up, right and down of the target.
    fn reach(&self) -> (i32, i32, i32, i32) {
        let (w, h) = (self.order.0 as i32, self.order.1 as i32);
        let (tx, ty) = (self.target.0 as i32, self.target.1 as i32);
        (tx, ty, w - 1 - tx, h - 1 - ty)
    }

    /// Kernel flipped and divided, indexed by sample offset `(j, i)` from the top-left reach.
    fn weights(&self) -> Vec<f32> {
        let div = self.effective_divisor();
        let n = self.kernel.len();
        (0..n).map(|k| self.kernel[n - 1 - k] / div).collect()
    }

    fn convolve(&self, src: &Raster, out_rect: PixelRect) -> Raster {
        let (left, up, _, _) = self.reach();
        let (w, h) = (self.order.0 as usize, self.order.1 as usize);
        let weights = self.weights();
        let negative = self.kernel.iter().any(|&k| k < 0.0);
        let edge = self.edge_mode;
        let data = src.rect();
        let model = src.model();
        let preserve = self.preserve_alpha;

        let sample = |x: i32, y: i32| -> [u8; 4] {
            match edge {
                EdgeMode::None => src.pixel(x, y),
                _ => src.pixel(
                    x.clamp(data.x, data.x1() - 1),
                    y.clamp(data.y, data.y1() - 1),
                ),
            }
        };

        let mut out = Raster::transparent(out_rect, model);
        let stride = out_rect.width as usize * 4;
        out.data_mut()
            .par_chunks_mut(stride)
            .enumerate()
            .for_each(|(ly, row)| {
                let y = out_rect.y + ly as i32;
                for lx in 0..out_rect.width as usize {
                    let x = out_rect.x + lx as i32;
                    let mut acc = [0.0f32; 4];
                    for i in 0..h {
                        for j in 0..w {
                            let wt = weights[i * w + j];
                            if wt == 0.0 {
                                continue;
                            }
                            let px = sample(x - left + j as i32, y - up + i as i32);
                            for c in 0..4 {
                                acc[c] += wt * f32::from(px[c]);
                            }
                        }
                    }
                    let mut px = acc.map(|v| v.round().clamp(0.0, 255.0) as u8);
                    if preserve {
                        px[3] = src.pixel(x, y)[3];
                    } else if negative {
                        px[3] = px[3].max(px[0]).max(px[1]).max(px[2]);
                    }
                    row[lx * 4..lx * 4 + 4].copy_from_slice(&px);
                }
            });
        out
    }
}

impl OpImpl for ConvolveMatrix {
    fn name(&self) -> &'static str {
        "convolve_matrix"
    }

    fn arity(&self) -> Arity {
        Arity::Exact(1)
    }

    fn check(&self) -> FilterResult<()> {
        let (w, h) = self.order;
        if w == 0 || h == 0 {
            return Err(FilterError::validation("convolve order must be at least 1x1"));
        }
        if self.kernel.len() != (w * h) as usize {
            return Err(FilterError::validation(format!(
                "convolve kernel needs {} weights, got {}",
                w * h,
                self.kernel.len()
            )));
        }
        if self.kernel.iter().any(|k| !k.is_finite()) {
            return Err(FilterError::validation("convolve kernel must be finite"));
        }
        if self.target.0 >= w || self.target.1 >= h {
            return Err(FilterError::validation("convolve target must lie inside the kernel"));
        }
        if let Some(d) = self.divisor
            && (!d.is_finite() || d == 0.0)
        {
            return Err(FilterError::validation("convolve divisor must be finite and non-zero"));
        }
        if !self.bias.is_finite() {
            return Err(FilterError::validation("convolve bias must be finite"));
        }
        if let Some((dx, dy)) = self.kernel_unit_length
            && !(dx.is_finite() && dy.is_finite() && dx > 0.0 && dy > 0.0)
        {
            return Err(FilterError::validation(
                "kernel unit length must be finite and > 0",
            ));
        }
        Ok(())
    }

    fn bounds(&self, sources: &[Filter]) -> Rect {
        primary_bounds(sources)
    }

    fn spread(&self, _index: usize) -> (f64, f64) {
        let (l, u, r, d) = self.reach();
        let (ux, uy) = self.kernel_unit_length.unwrap_or((1.0, 1.0));
        (f64::from(l.max(r)) * ux, f64::from(u.max(d)) * uy)
    }

    fn capabilities(&self, _sources: &[Filter]) -> Capabilities {
        Capabilities::COLOR_SPACE_AWARE
    }

    fn cacheable(&self) -> bool {
        true
    }

    fn render(&self, node: &NodeView<'_>, ctx: &RenderContext) -> FilterResult<Option<Arc<Raster>>> {
        let src = &node.sources[0];
        let Some(area) = render_area(ctx, self.bounds(node.sources)) else {
            return Ok(None);
        };
        let Some(clip) = device_clip(ctx, area) else {
            return Ok(None);
        };
        let Some(mut split) = decompose(ctx.transform()) else {
            return Ok(None);
        };
        if let Some((ux, uy)) = self.kernel_unit_length {
            split = split.with_stage_scale(1.0 / ux, 1.0 / uy);
        }

        let (l, u, r, d) = self.reach();
        let out_rect = region::device_rect(split.stage, area);
        let work_rect = PixelRect::from_edges(
            out_rect.x - l,
            out_rect.y - u,
            out_rect.x1() + r,
            out_rect.y1() + d,
        );
        let Some(src_area) = region::user_rect(split.stage, work_rect)
            .and_then(|w| region::intersect(w, src.bounds()))
        else {
            return Ok(None);
        };
        let stage_ctx = ctx
            .with_transform(split.stage)
            .with_area_of_interest(src_area);
        let Some(rendered) = src.render_in(&stage_ctx)? else {
            return Ok(None);
        };
        if self.edge_mode == EdgeMode::Wrap && !rendered.rect().contains_rect(work_rect) {
            return Err(FilterError::unsupported(
                "edge mode wrap is not supported by convolve_matrix",
            ));
        }
        if self.bias != 0.0 {
            return Err(FilterError::unsupported(
                "only a zero bias is supported by convolve_matrix",
            ));
        }

        let space = ctx.op_space(self.color_space);
        let mut input = rendered.to_color_space(space);
        if self.preserve_alpha {
            input = input.to_unpremultiplied();
        }
        let mut staged = self.convolve(&input, out_rect);
        if self.preserve_alpha {
            staged = staged.to_premultiplied();
        }
        tracing::trace!(
            order = ?self.order,
            rect = ?out_rect,
            "convolve_matrix evaluated"
        );
        Ok(finish_staged(staged, &split, clip, ctx))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/ops/convolve.rs"]
mod tests;
