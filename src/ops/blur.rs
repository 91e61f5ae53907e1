use std::sync::Arc;

use rayon::prelude::*;
use smallvec::{SmallVec, smallvec};

use crate::foundation::core::{ColorSpace, Rect};
use crate::foundation::error::{FilterError, FilterResult};
use crate::geom::decompose::decompose;
use crate::geom::region;
use crate::graph::context::RenderContext;
use crate::graph::node::{Filter, NodeView};
use crate::ops::{
    Arity, Capabilities, OpImpl, device_clip, finish_staged, pass_through, primary_bounds,
    render_area,
};
use crate::raster::buffer::Raster;

/// Largest standard deviation, in stage pixels, evaluated directly. Larger blurs run at a
/// reduced stage scale and are resampled up.
pub const MAX_DEVICE_STD_DEV: f64 = 10.0;

/// Below this device deviation the exact kernel is used.
const EXACT_BELOW: f64 = 2.0;

/// Fraction of one kernel half the exact kernel must cover.
const PRECISION: f64 = 0.499;

const SQRT_2PI: f64 = 2.506_628_274_631_000_2;

/// Gaussian blur with independent horizontal and vertical deviations.
///
/// Pixels outside the source are transparent; the output extends three deviations past the
/// source bounds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GaussianBlur {
    /// Standard deviation `(x, y)` in user units.
    pub std_dev: (f64, f64),
    /// Space the blur runs in.
    pub color_space: ColorSpace,
}

impl GaussianBlur {
    /// Blur with deviations `(sx, sy)`, in sRGB.
    pub fn new(sx: f64, sy: f64) -> FilterResult<Self> {
        let op = Self {
            std_dev: (sx, sy),
            color_space: ColorSpace::Srgb,
        };
        op.check()?;
        Ok(op)
    }

    /// Same blur, in `space`.
    pub fn in_space(mut self, space: ColorSpace) -> Self {
        self.color_space = space;
        self
    }

    fn is_noop(&self) -> bool {
        self.std_dev == (0.0, 0.0)
    }
}

/// One separable pass: `out[x] = Σ weights[i] * src[x + i - center]`, weights in 16.16.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Kernel1d {
    pub(crate) weights: Vec<u32>,
    pub(crate) center: usize,
}

impl Kernel1d {
    fn identity() -> Self {
        Self {
            weights: vec![1 << 16],
            center: 0,
        }
    }

    fn boxed(width: usize, center: usize) -> Self {
        let w = width.max(1);
        let each = (1u32 << 16) / w as u32;
        let mut weights = vec![each; w];
        weights[w / 2] += (1u32 << 16) - each * w as u32;
        Self {
            weights,
            center: center.min(w - 1),
        }
    }

    /// Pixels reached on the left and right of the output pixel.
    fn reach(&self) -> (usize, usize) {
        (self.center, self.weights.len() - 1 - self.center)
    }
}

/// Normalized 16.16 Gaussian weights for `-radius..=radius`.
pub(crate) fn gaussian_kernel_q16(radius: u32, sigma: f64) -> FilterResult<Vec<u32>> {
    if radius == 0 {
        return Ok(vec![1 << 16]);
    }
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(FilterError::validation("blur sigma must be finite and > 0"));
    }

    let r = radius as i32;
    let mut weights_f = Vec::<f64>::with_capacity((2 * r + 1) as usize);
    let mut sum = 0.0f64;
    let denom = 2.0 * sigma * sigma;
    for i in -r..=r {
        let x = f64::from(i);
        let w = (-x * x / denom).exp();
        weights_f.push(w);
        sum += w;
    }
    if sum <= 0.0 {
        return Err(FilterError::evaluation("gaussian kernel sum is zero"));
    }

    let mut weights = Vec::<u32>::with_capacity(weights_f.len());
    let mut acc: i64 = 0;
    for &wf in &weights_f {
        let q = ((wf / sum) * 65536.0).round() as i64;
        let q = q.clamp(0, 65536);
        weights.push(q as u32);
        acc += q;
    }
    let delta = 65536 - acc;
    if delta != 0 {
        let mid = weights.len() / 2;
        weights[mid] = (i64::from(weights[mid]) + delta).clamp(0, 65536) as u32;
    }

    Ok(weights)
}

/// Radius of the exact kernel for `std_dev`: the center half-tap plus enough taps on one side
/// to cover [`PRECISION`] of the area.
pub(crate) fn exact_radius(std_dev: f64) -> u32 {
    let norm = std_dev * SQRT_2PI;
    let mut area = 0.5 / norm;
    let mut r = 0u32;
    while area < PRECISION && r < 1024 {
        r += 1;
        let x = f64::from(r);
        area += (-x * x / (2.0 * std_dev * std_dev)).exp() / norm;
    }
    r
}

/// Passes approximating a Gaussian of `std_dev` stage pixels along one axis.
fn axis_passes(std_dev: f64, exact: bool) -> FilterResult<SmallVec<[Kernel1d; 3]>> {
    if std_dev <= 0.0 {
        return Ok(smallvec![Kernel1d::identity()]);
    }
    if exact || std_dev < EXACT_BELOW {
        let radius = exact_radius(std_dev);
        return Ok(smallvec![Kernel1d {
            weights: gaussian_kernel_q16(radius, std_dev)?,
            center: radius as usize,
        }]);
    }
    let d = (SQRT_2PI * 3.0 / 4.0 * std_dev + 0.5).floor() as usize;
    if d % 2 == 0 {
        Ok(smallvec![
            Kernel1d::boxed(d, d / 2),
            Kernel1d::boxed(d, d / 2 - 1),
            Kernel1d::boxed(d + 1, d / 2),
        ])
    } else {
        Ok(smallvec![Kernel1d::boxed(d, d / 2); 3])
    }
}

/// Total left/right reach of a pass sequence.
fn total_reach(passes: &[Kernel1d]) -> u32 {
    let (l, r) = passes
        .iter()
        .map(Kernel1d::reach)
        .fold((0, 0), |(al, ar), (l, r)| (al + l, ar + r));
    l.max(r) as u32
}

fn q16_to_u8(v: u64) -> u8 {
    ((v + 32768) >> 16).min(255) as u8
}

/// Horizontal pass over premultiplied rows; samples outside the row are zero.
pub(crate) fn horizontal_pass_q16(src: &[u8], dst: &mut [u8], width: usize, k: &Kernel1d) {
    let stride = width * 4;
    dst.par_chunks_mut(stride)
        .zip(src.par_chunks(stride))
        .for_each(|(drow, srow)| {
            for x in 0..width {
                let mut acc = [0u64; 4];
                for (i, &kw) in k.weights.iter().enumerate() {
                    let Some(sx) = (x + i).checked_sub(k.center) else {
                        continue;
                    };
                    if sx >= width {
                        break;
                    }
                    let idx = sx * 4;
                    for c in 0..4 {
                        acc[c] += u64::from(kw) * u64::from(srow[idx + c]);
                    }
                }
                for c in 0..4 {
                    drow[x * 4 + c] = q16_to_u8(acc[c]);
                }
            }
        });
}

/// Vertical pass; samples outside the raster are zero.
pub(crate) fn vertical_pass_q16(
    src: &[u8],
    dst: &mut [u8],
    width: usize,
    height: usize,
    k: &Kernel1d,
) {
    let stride = width * 4;
    dst.par_chunks_mut(stride).enumerate().for_each(|(y, drow)| {
        for x in 0..width {
            let mut acc = [0u64; 4];
            for (i, &kw) in k.weights.iter().enumerate() {
                let Some(sy) = (y + i).checked_sub(k.center) else {
                    continue;
                };
                if sy >= height {
                    break;
                }
                let idx = sy * stride + x * 4;
                for c in 0..4 {
                    acc[c] += u64::from(kw) * u64::from(src[idx + c]);
                }
            }
            for c in 0..4 {
                drow[x * 4 + c] = q16_to_u8(acc[c]);
            }
        }
    });
}

/// Run `hx` passes along rows and then `vy` passes along columns, in place.
pub(crate) fn separable_blur(raster: &mut Raster, hx: &[Kernel1d], vy: &[Kernel1d]) {
    let width = raster.width() as usize;
    let height = raster.height() as usize;
    let mut tmp = vec![0u8; raster.data().len()];
    for k in hx.iter().filter(|k| k.weights.len() > 1) {
        horizontal_pass_q16(raster.data(), &mut tmp, width, k);
        raster.data_mut().copy_from_slice(&tmp);
    }
    for k in vy.iter().filter(|k| k.weights.len() > 1) {
        vertical_pass_q16(raster.data(), &mut tmp, width, height, k);
        raster.data_mut().copy_from_slice(&tmp);
    }
}

impl OpImpl for GaussianBlur {
    fn name(&self) -> &'static str {
        "gaussian_blur"
    }

    fn arity(&self) -> Arity {
        Arity::Exact(1)
    }

    fn check(&self) -> FilterResult<()> {
        let (sx, sy) = self.std_dev;
        if !(sx.is_finite() && sy.is_finite() && sx >= 0.0 && sy >= 0.0) {
            return Err(FilterError::validation(
                "blur standard deviation must be finite and >= 0",
            ));
        }
        Ok(())
    }

    fn bounds(&self, sources: &[Filter]) -> Rect {
        let src = primary_bounds(sources);
        if region::is_empty(src) {
            return Rect::ZERO;
        }
        let (dx, dy) = self.spread(0);
        region::outset(src, dx, dy)
    }

    fn spread(&self, _index: usize) -> (f64, f64) {
        (3.0 * self.std_dev.0, 3.0 * self.std_dev.1)
    }

    fn capabilities(&self, _sources: &[Filter]) -> Capabilities {
        Capabilities::COLOR_SPACE_AWARE
    }

    fn cacheable(&self) -> bool {
        true
    }

    fn render(&self, node: &NodeView<'_>, ctx: &RenderContext) -> FilterResult<Option<Arc<Raster>>> {
        if self.is_noop() {
            return pass_through(node, ctx);
        }
        let src = &node.sources[0];
        let Some(area) = render_area(ctx, self.bounds(node.sources)) else {
            return Ok(None);
        };
        let Some(clip) = device_clip(ctx, area) else {
            return Ok(None);
        };
        let Some(split) = decompose(ctx.transform()) else {
            return Ok(None);
        };
        let (sdx, sdy) = self.std_dev;
        let max_sx = if sdx > 0.0 { MAX_DEVICE_STD_DEV / sdx } else { f64::INFINITY };
        let max_sy = if sdy > 0.0 { MAX_DEVICE_STD_DEV / sdy } else { f64::INFINITY };
        let split = split.clamp_scale(max_sx, max_sy);

        let exact = ctx.prefers_quality();
        let hx = axis_passes(sdx * split.sx, exact)?;
        let vy = axis_passes(sdy * split.sy, exact)?;
        let (rx, ry) = (total_reach(&hx), total_reach(&vy));

        let out_rect = region::device_rect(split.stage, area);
        let work_rect = out_rect.outset(rx as i32, ry as i32);
        let Some(src_area) = region::user_rect(split.stage, work_rect)
            .and_then(|r| region::intersect(r, src.bounds()))
        else {
            return Ok(None);
        };
        let space = ctx.op_space(self.color_space);
        let stage_ctx = ctx
            .with_transform(split.stage)
            .with_area_of_interest(src_area);
        let Some(rendered) = src.render_in(&stage_ctx)? else {
            return Ok(None);
        };
        let Some(mut work) = rendered.to_color_space(space).resized_to(work_rect) else {
            return Ok(None);
        };
        separable_blur(&mut work, &hx, &vy);
        let Some(staged) = work.cropped(out_rect) else {
            return Ok(None);
        };
        Ok(finish_staged(staged, &split, clip, ctx))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/ops/blur.rs"]
mod tests;
