use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::foundation::core::Rect;
use crate::foundation::error::{FilterError, FilterResult};
use crate::geom::decompose::decompose;
use crate::geom::region;
use crate::graph::context::RenderContext;
use crate::graph::node::{Filter, NodeView};
use crate::ops::{
    Arity, OpImpl, device_clip, finish_staged, pass_through, primary_bounds, render_area,
};
use crate::raster::buffer::Raster;

/// Which extremum the morphology window keeps.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MorphologyOp {
    /// Per-channel minimum; thins shapes.
    #[default]
    Erode,
    /// Per-channel maximum; thickens shapes.
    Dilate,
}

/// Separable dilate/erode over a `(2rx + 1) × (2ry + 1)` window.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Morphology {
    /// Dilate or erode.
    pub op: MorphologyOp,
    /// Window radii in user units; both must be positive.
    pub radius: (f64, f64),
}

impl Morphology {
    /// Morphology with radii `(rx, ry)`.
    pub fn new(op: MorphologyOp, rx: f64, ry: f64) -> FilterResult<Self> {
        let m = Self {
            op,
            radius: (rx, ry),
        };
        m.check()?;
        Ok(m)
    }

    /// Dilate by `(rx, ry)`.
    pub fn dilate(rx: f64, ry: f64) -> FilterResult<Self> {
        Self::new(MorphologyOp::Dilate, rx, ry)
    }

    /// Erode by `(rx, ry)`.
    pub fn erode(rx: f64, ry: f64) -> FilterResult<Self> {
        Self::new(MorphologyOp::Erode, rx, ry)
    }

    fn pick(&self) -> fn(u8, u8) -> u8 {
        match self.op {
            MorphologyOp::Dilate => u8::max,
            MorphologyOp::Erode => u8::min,
        }
    }
}

fn horizontal_pass(src: &[u8], dst: &mut [u8], width: usize, r: usize, pick: fn(u8, u8) -> u8) {
    let stride = width * 4;
    dst.par_chunks_mut(stride)
        .zip(src.par_chunks(stride))
        .for_each(|(drow, srow)| {
            for x in 0..width {
                let lo = x.saturating_sub(r);
                let hi = (x + r).min(width - 1);
                for c in 0..4 {
                    let mut v = srow[lo * 4 + c];
                    for sx in lo + 1..=hi {
                        v = pick(v, srow[sx * 4 + c]);
                    }
                    drow[x * 4 + c] = v;
                }
            }
        });
}

fn vertical_pass(
    src: &[u8],
    dst: &mut [u8],
    width: usize,
    height: usize,
    r: usize,
    pick: fn(u8, u8) -> u8,
) {
    let stride = width * 4;
    dst.par_chunks_mut(stride).enumerate().for_each(|(y, drow)| {
        let lo = y.saturating_sub(r);
        let hi = (y + r).min(height - 1);
        for x in 0..width {
            for c in 0..4 {
                let mut v = src[lo * stride + x * 4 + c];
                for sy in lo + 1..=hi {
                    v = pick(v, src[sy * stride + x * 4 + c]);
                }
                drow[x * 4 + c] = v;
            }
        }
    });
}

impl OpImpl for Morphology {
    fn name(&self) -> &'static str {
        "morphology"
    }

    fn arity(&self) -> Arity {
        Arity::Exact(1)
    }

    fn check(&self) -> FilterResult<()> {
        let (rx, ry) = self.radius;
        if !(rx.is_finite() && ry.is_finite() && rx > 0.0 && ry > 0.0) {
            return Err(FilterError::validation(
                "morphology radius must be finite and > 0",
            ));
        }
        Ok(())
    }

    fn bounds(&self, sources: &[Filter]) -> Rect {
        primary_bounds(sources)
    }

    fn spread(&self, _index: usize) -> (f64, f64) {
        self.radius
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
        let Some(split) = decompose(ctx.transform()) else {
            return Ok(None);
        };
        let rx = (self.radius.0 * split.sx).round() as usize;
        let ry = (self.radius.1 * split.sy).round() as usize;
        if rx == 0 && ry == 0 {
            return pass_through(node, ctx);
        }

        let out_rect = region::device_rect(split.stage, area);
        let work_rect = out_rect.outset(rx as i32, ry as i32);
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
        let Some(mut work) = rendered.resized_to(work_rect) else {
            return Ok(None);
        };

        let (w, h) = (work.width() as usize, work.height() as usize);
        let pick = self.pick();
        let mut tmp = vec![0u8; work.data().len()];
        if rx > 0 {
            horizontal_pass(work.data(), &mut tmp, w, rx, pick);
            work.data_mut().copy_from_slice(&tmp);
        }
        if ry > 0 {
            vertical_pass(work.data(), &mut tmp, w, h, ry, pick);
            work.data_mut().copy_from_slice(&tmp);
        }
        let Some(staged) = work.cropped(out_rect) else {
            return Ok(None);
        };
        Ok(finish_staged(staged, &split, clip, ctx))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/ops/morphology.rs"]
mod tests;
