use std::sync::Arc;

use crate::foundation::core::{Affine, Point, Rect};
use crate::foundation::error::FilterResult;
use crate::geom::decompose::decompose;
use crate::geom::region;
use crate::graph::context::RenderContext;
use crate::graph::node::{Filter, NodeView};
use crate::ops::{Arity, Capabilities, OpImpl, device_clip, finish_staged, render_area, valid_rect};
use crate::raster::buffer::Raster;
use crate::raster::surface::{PaintSurface, SurfaceCompositeMode};

/// How a [`Pad`] fills the part of its region the source does not cover.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PadMode {
    /// Transparent black.
    #[default]
    Zero,
    /// Extend the nearest edge pixel.
    Replicate,
    /// Repeat the source periodically.
    Wrap,
}

/// Crops or extends its source to an explicit rectangle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pad {
    /// Output rectangle in user space.
    pub region: Rect,
    /// Fill policy outside the source.
    pub mode: PadMode,
}

impl Pad {
    /// Pad (or crop) to `region` using `mode`.
    pub fn new(region: Rect, mode: PadMode) -> FilterResult<Self> {
        let op = Self { region, mode };
        op.check()?;
        Ok(op)
    }

    /// Zero-fill crop to `region`.
    pub fn crop(region: Rect) -> FilterResult<Self> {
        Self::new(region, PadMode::Zero)
    }

    fn render_extended(
        &self,
        node: &NodeView<'_>,
        ctx: &RenderContext,
        area: Rect,
    ) -> FilterResult<Option<Arc<Raster>>> {
        let src = &node.sources[0];
        let Some(clip) = device_clip(ctx, area) else {
            return Ok(None);
        };
        let Some(split) = decompose(ctx.transform()) else {
            return Ok(None);
        };
        let Some(src_area) = region::intersect(self.region, src.bounds()) else {
            return Ok(None);
        };
        let stage_ctx = ctx
            .with_transform(split.stage)
            .with_area_of_interest(src_area);
        let Some(raster) = src.render_in(&stage_ctx)? else {
            return Ok(None);
        };
        let data = raster
            .rect()
            .intersect(region::device_rect(split.stage, src_area));
        let out_rect = region::device_rect(split.stage, area);
        if data.is_empty() || out_rect.is_empty() {
            return Ok(None);
        }
        let mut out = Raster::transparent(out_rect, raster.model());
        for y in out_rect.y..out_rect.y1() {
            let sy = self.fold(y, data.y, data.height);
            for x in out_rect.x..out_rect.x1() {
                let sx = self.fold(x, data.x, data.width);
                out.set_pixel(x, y, raster.pixel(sx, sy));
            }
        }
        Ok(finish_staged(out, &split, clip, ctx))
    }

    /// Map `v` into `[start, start + len)` per the pad mode.
    fn fold(&self, v: i32, start: i32, len: u32) -> i32 {
        let len = len as i32;
        match self.mode {
            PadMode::Wrap => start + (v - start).rem_euclid(len),
            _ => v.clamp(start, start + len - 1),
        }
    }
}

/// Render `src` over `area`, zero outside `keep`.
pub(crate) fn render_cropped(
    src: &Filter,
    ctx: &RenderContext,
    keep: Rect,
    area: Rect,
) -> FilterResult<Option<Arc<Raster>>> {
    let Some(clip) = device_clip(ctx, area) else {
        return Ok(None);
    };
    let Some(src_area) = region::intersect(area, src.bounds()) else {
        return Ok(None);
    };
    let Some(raster) = src.render_in(&ctx.with_area_of_interest(src_area))? else {
        return Ok(None);
    };
    if raster.rect() == clip && region::is_axis_aligned(ctx.transform()) {
        return Ok(Some(raster));
    }
    let Some(mut out) = raster.resized_to(clip) else {
        return Ok(None);
    };
    let at = ctx.transform();
    if !region::is_axis_aligned(at) {
        mask_outside(&mut out, at.inverse(), keep);
    }
    Ok(Some(Arc::new(out)))
}

fn covers(outer: Rect, inner: Rect) -> bool {
    outer.x0 <= inner.x0 && outer.y0 <= inner.y0 && outer.x1 >= inner.x1 && outer.y1 >= inner.y1
}

/// Zero device pixels whose centers fall outside `keep` (user space).
fn mask_outside(out: &mut Raster, device_to_user: Affine, keep: Rect) {
    let rect = out.rect();
    for y in rect.y..rect.y1() {
        for x in rect.x..rect.x1() {
            let u = device_to_user * Point::new(f64::from(x) + 0.5, f64::from(y) + 0.5);
            if u.x < keep.x0 || u.x >= keep.x1 || u.y < keep.y0 || u.y >= keep.y1 {
                out.set_pixel(x, y, [0; 4]);
            }
        }
    }
}

impl OpImpl for Pad {
    fn name(&self) -> &'static str {
        "pad"
    }

    fn arity(&self) -> Arity {
        Arity::Exact(1)
    }

    fn check(&self) -> FilterResult<()> {
        valid_rect("pad region", self.region)?;
        Ok(())
    }

    fn bounds(&self, _sources: &[Filter]) -> Rect {
        self.region
    }

    fn dependency_region(&self, sources: &[Filter], _index: usize, output: Rect) -> Option<Rect> {
        let out = region::intersect(output, self.region)?;
        let available = region::intersect(self.region, sources[0].bounds())?;
        match self.mode {
            PadMode::Zero => region::intersect(out, available),
            // Pixels outside the source are copies of pixels inside it.
            _ if covers(available, out) => Some(out),
            _ => Some(available),
        }
    }

    fn dirty_region(&self, sources: &[Filter], _index: usize, input: Rect) -> Option<Rect> {
        let available = region::intersect(self.region, sources[0].bounds())?;
        let changed = region::intersect(input, available)?;
        match self.mode {
            PadMode::Zero => Some(changed),
            _ => Some(self.region),
        }
    }

    fn capabilities(&self, sources: &[Filter]) -> Capabilities {
        Capabilities {
            direct_paint: self.mode == PadMode::Zero && sources[0].capabilities().direct_paint,
            color_space_aware: false,
        }
    }

    fn render(&self, node: &NodeView<'_>, ctx: &RenderContext) -> FilterResult<Option<Arc<Raster>>> {
        let Some(area) = render_area(ctx, self.region) else {
            return Ok(None);
        };
        match self.mode {
            PadMode::Zero => render_cropped(&node.sources[0], ctx, self.region, area),
            PadMode::Replicate | PadMode::Wrap => self.render_extended(node, ctx, area),
        }
    }

    fn paint_direct(
        &self,
        node: &NodeView<'_>,
        surface: &mut dyn PaintSurface,
    ) -> FilterResult<bool> {
        if self.mode != PadMode::Zero || surface.composite_mode() != SurfaceCompositeMode::SrcOver {
            return Ok(false);
        }
        let src = &node.sources[0];
        if !src.capabilities().direct_paint {
            return Ok(false);
        }
        surface.push_clip(self.region);
        let painted = src.paint_direct(surface);
        surface.pop_clip();
        painted
    }
}

#[cfg(test)]
#[path = "../../tests/unit/ops/pad.rs"]
mod tests;
