use std::sync::Arc;

use crate::foundation::core::{Color, PixelRect, Rect};
use crate::foundation::error::{FilterError, FilterResult};
use crate::geom::decompose::decompose;
use crate::geom::region;
use crate::graph::context::RenderContext;
use crate::graph::node::{Filter, NodeView};
use crate::ops::{Arity, OpImpl, device_clip, finish_staged, render_area, valid_rect};
use crate::raster::buffer::{ColorModel, Raster};

/// Solid color over a region.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Flood {
    /// User-space region to fill.
    pub region: Rect,
    /// Straight-alpha sRGB color.
    pub color: Color,
    /// Extra opacity multiplied into the color's alpha.
    pub opacity: f32,
}

impl Flood {
    /// Fill `region` with `color`.
    pub fn new(region: Rect, color: Color) -> FilterResult<Self> {
        let op = Self {
            region,
            color,
            opacity: 1.0,
        };
        op.check()?;
        Ok(op)
    }
}

impl OpImpl for Flood {
    fn name(&self) -> &'static str {
        "flood"
    }

    fn arity(&self) -> Arity {
        Arity::Exact(0)
    }

    fn check(&self) -> FilterResult<()> {
        valid_rect("flood region", self.region)?;
        if !(0.0..=1.0).contains(&self.opacity) {
            return Err(FilterError::validation("flood opacity must be in [0, 1]"));
        }
        Ok(())
    }

    fn bounds(&self, _sources: &[Filter]) -> Rect {
        self.region
    }

    fn render(
        &self,
        _node: &NodeView<'_>,
        ctx: &RenderContext,
    ) -> FilterResult<Option<Arc<Raster>>> {
        let Some(area) = render_area(ctx, self.region) else {
            return Ok(None);
        };
        let Some(clip) = device_clip(ctx, area) else {
            return Ok(None);
        };
        let Some(split) = decompose(ctx.transform()) else {
            return Ok(None);
        };
        let stage_rect: PixelRect = region::device_rect(split.stage, area);
        if stage_rect.is_empty() {
            return Ok(None);
        }
        let fill = Raster::filled(
            stage_rect,
            ColorModel::default(),
            self.color.to_premul(self.opacity),
        );
        Ok(finish_staged(fill, &split, clip, ctx))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/ops/flood.rs"]
mod tests;
