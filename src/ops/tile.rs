use std::sync::Arc;

use crate::foundation::core::{Affine, PixelRect, Rect};
use crate::foundation::error::{FilterError, FilterResult};
use crate::geom::decompose::decompose;
use crate::geom::region;
use crate::graph::context::RenderContext;
use crate::graph::node::{Filter, NodeView};
use crate::ops::{Arity, OpImpl, device_clip, render_area, valid_rect};
use crate::raster::blend;
use crate::raster::buffer::Raster;
use crate::raster::resample::resample_affine;

/// Repeats one cell of its source across a larger region.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tile {
    /// The cell that is repeated, in source user space.
    pub tile_region: Rect,
    /// Output region filled with copies of the cell.
    pub tiled_region: Rect,
    /// When set, source content outside the cell wraps into neighbouring cells instead of being
    /// clipped.
    pub overflow: bool,
}

impl Tile {
    /// Repeat `tile_region` across `tiled_region`, clipping the source to the cell.
    pub fn new(tile_region: Rect, tiled_region: Rect) -> FilterResult<Self> {
        let op = Self {
            tile_region,
            tiled_region,
            overflow: false,
        };
        op.check()?;
        Ok(op)
    }

    /// Enable or disable overflow into neighbouring cells.
    pub fn with_overflow(mut self, overflow: bool) -> Self {
        self.overflow = overflow;
        self
    }

    /// User-space region of the source that contributes to the pattern.
    fn source_region(&self, src: Rect) -> Option<Rect> {
        if self.overflow {
            (!region::is_empty(src)).then_some(src)
        } else {
            region::intersect(self.tile_region, src)
        }
    }
}

/// Device-snapped placement of the pattern cell.
#[derive(Clone, Copy, Debug, PartialEq)]
struct CellGrid {
    /// User space to pattern space; the cell lands on whole pixels.
    tile_at: Affine,
    /// Scale actually used, after snapping the cell size.
    scale: (f64, f64),
    cell: PixelRect,
}

impl CellGrid {
    fn new(cell: Rect, sx: f64, sy: f64) -> Option<Self> {
        let dw = (cell.width() * sx).ceil().max(1.0);
        let dh = (cell.height() * sy).ceil().max(1.0);
        let tsx = dw / cell.width();
        let tsy = dh / cell.height();
        let dx = (cell.x0 * tsx).floor();
        let dy = (cell.y0 * tsy).floor();
        let limit = f64::from(i32::MAX / 2);
        if [dw, dh, dx.abs(), dy.abs()].iter().any(|v| !v.is_finite() || *v > limit) {
            return None;
        }
        let ttx = dx - cell.x0 * tsx;
        let tty = dy - cell.y0 * tsy;
        Some(Self {
            tile_at: Affine::translate((ttx, tty)) * Affine::scale_non_uniform(tsx, tsy),
            scale: (tsx, tsy),
            cell: PixelRect::new(dx as i32, dy as i32, dw as u32, dh as u32),
        })
    }

    fn wrap(&self, x: i32, y: i32) -> (i32, i32) {
        let c = self.cell;
        (
            c.x + (x - c.x).rem_euclid(c.width as i32),
            c.y + (y - c.y).rem_euclid(c.height as i32),
        )
    }
}

impl Tile {
    fn pattern(
        &self,
        node: &NodeView<'_>,
        ctx: &RenderContext,
        grid: &CellGrid,
    ) -> FilterResult<Option<Arc<Raster>>> {
        let cache = ctx.tile_cache();
        if let Some(hit) = cache.get(node.id, grid.scale, node.timestamp) {
            return Ok(Some(hit));
        }
        let src = &node.sources[0];
        let Some(src_area) = self.source_region(src.bounds()) else {
            return Ok(None);
        };
        let src_ctx = ctx
            .with_transform(grid.tile_at)
            .with_area_of_interest(src_area);
        let Some(rendered) = src.render_in(&src_ctx)? else {
            return Ok(None);
        };
        let pattern = if self.overflow {
            let mut cell = Raster::transparent(grid.cell, rendered.model());
            let r = rendered.rect();
            for y in r.y..r.y1() {
                for x in r.x..r.x1() {
                    let px = rendered.pixel(x, y);
                    if px[3] == 0 {
                        continue;
                    }
                    let (cx, cy) = grid.wrap(x, y);
                    cell.set_pixel(cx, cy, blend::over(cell.pixel(cx, cy), px));
                }
            }
            cell
        } else {
            match rendered.resized_to(grid.cell) {
                Some(cell) => cell,
                None => return Ok(None),
            }
        };
        let pattern = Arc::new(pattern);
        cache.insert(node.id, grid.scale, node.timestamp, pattern.clone());
        Ok(Some(pattern))
    }
}

impl OpImpl for Tile {
    fn name(&self) -> &'static str {
        "tile"
    }

    fn arity(&self) -> Arity {
        Arity::Exact(1)
    }

    fn check(&self) -> FilterResult<()> {
        valid_rect("tile region", self.tile_region)?;
        valid_rect("tiled region", self.tiled_region)?;
        if region::is_empty(self.tile_region) {
            return Err(FilterError::validation("tile region must have a positive area"));
        }
        Ok(())
    }

    fn bounds(&self, _sources: &[Filter]) -> Rect {
        self.tiled_region
    }

    fn dependency_region(&self, sources: &[Filter], _index: usize, output: Rect) -> Option<Rect> {
        region::intersect(output, self.tiled_region)?;
        self.source_region(sources[0].bounds())
    }

    fn dirty_region(&self, sources: &[Filter], _index: usize, input: Rect) -> Option<Rect> {
        let used = self.source_region(sources[0].bounds())?;
        region::intersect(input, used)?;
        (!region::is_empty(self.tiled_region)).then_some(self.tiled_region)
    }

    fn render(&self, node: &NodeView<'_>, ctx: &RenderContext) -> FilterResult<Option<Arc<Raster>>> {
        let Some(area) = render_area(ctx, self.tiled_region) else {
            return Ok(None);
        };
        let Some(clip) = device_clip(ctx, area) else {
            return Ok(None);
        };
        let Some(split) = decompose(ctx.transform()) else {
            return Ok(None);
        };
        let Some(grid) = CellGrid::new(self.tile_region, split.sx, split.sy) else {
            return Ok(None);
        };
        let Some(pattern) = self.pattern(node, ctx, &grid)? else {
            return Ok(None);
        };
        let stage_rect = region::device_rect(grid.tile_at, area);
        if stage_rect.is_empty() {
            return Ok(None);
        }
        let mut tiled = Raster::transparent(stage_rect, pattern.model());
        for y in stage_rect.y..stage_rect.y1() {
            for x in stage_rect.x..stage_rect.x1() {
                let (cx, cy) = grid.wrap(x, y);
                tiled.set_pixel(x, y, pattern.pixel(cx, cy));
            }
        }
        let residual = ctx.transform() * grid.tile_at.inverse();
        Ok(resample_affine(&tiled, residual, clip, ctx.hints().interpolation).map(Arc::new))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/ops/tile.rs"]
mod tests;
