use std::sync::Arc;

use crate::foundation::core::{Affine, Color, PixelRect, Point, Rect, Rgba8Premul};
use crate::foundation::error::FilterResult;
use crate::geom::region;
use crate::graph::context::RenderContext;
use crate::graph::node::{Filter, NodeView};
use crate::ops::{Arity, Capabilities, OpImpl, device_clip, render_area, valid_rect};
use crate::raster::blend;
use crate::raster::buffer::{ColorModel, Raster};
use crate::raster::resample::{Interpolation, resample_affine};
use crate::raster::surface::{PaintSource, PaintSurface, SurfaceCompositeMode};

/// Leaf that places a raster in user space.
#[derive(Clone, Debug)]
pub struct ImageSource {
    /// Premultiplied pixels.
    pub raster: Arc<Raster>,
    /// User-space rectangle the raster is stretched over.
    pub placement: Rect,
}

impl ImageSource {
    /// Place `raster` over `placement`.
    pub fn new(raster: Raster, placement: Rect) -> FilterResult<Self> {
        let op = Self {
            raster: Arc::new(raster.to_premultiplied()),
            placement,
        };
        op.check()?;
        Ok(op)
    }

    /// Place `raster` one pixel per user unit at its own pixel origin.
    pub fn at_origin(raster: Raster) -> Self {
        let placement = raster.rect().to_rect();
        Self {
            raster: Arc::new(raster.to_premultiplied()),
            placement,
        }
    }

    /// Transform from raster pixel space to user space.
    fn image_to_user(&self) -> Option<Affine> {
        let rect = self.raster.rect();
        if rect.is_empty() {
            return None;
        }
        let sx = self.placement.width() / f64::from(rect.width);
        let sy = self.placement.height() / f64::from(rect.height);
        Some(
            Affine::translate((self.placement.x0, self.placement.y0))
                * Affine::scale_non_uniform(sx, sy)
                * Affine::translate((-f64::from(rect.x), -f64::from(rect.y))),
        )
    }

    fn draw(&self, transform: Affine, clip: PixelRect, interp: Interpolation) -> Option<Raster> {
        let m = self.image_to_user()?;
        resample_affine(&self.raster, transform * m, clip, interp)
    }
}

impl OpImpl for ImageSource {
    fn name(&self) -> &'static str {
        "image"
    }

    fn arity(&self) -> Arity {
        Arity::Exact(0)
    }

    fn check(&self) -> FilterResult<()> {
        valid_rect("image placement", self.placement)?;
        Ok(())
    }

    fn bounds(&self, _sources: &[Filter]) -> Rect {
        self.placement
    }

    fn capabilities(&self, _sources: &[Filter]) -> Capabilities {
        Capabilities::DIRECT_PAINT
    }

    fn render(
        &self,
        _node: &NodeView<'_>,
        ctx: &RenderContext,
    ) -> FilterResult<Option<Arc<Raster>>> {
        let Some(area) = render_area(ctx, self.placement) else {
            return Ok(None);
        };
        let Some(clip) = device_clip(ctx, area) else {
            return Ok(None);
        };
        Ok(self
            .draw(ctx.transform(), clip, ctx.hints().interpolation)
            .map(Arc::new))
    }

    fn paint_direct(
        &self,
        _node: &NodeView<'_>,
        surface: &mut dyn PaintSurface,
    ) -> FilterResult<bool> {
        if surface.composite_mode() != SurfaceCompositeMode::SrcOver {
            return Ok(false);
        }
        let clip = surface.clip_bounds();
        if let Some(r) = self.draw(surface.transform(), clip, Interpolation::Bilinear) {
            surface.draw_raster(&r)?;
        }
        Ok(true)
    }
}

/// Leaf backed by an external [`PaintSource`].
#[derive(Clone, Debug)]
pub struct PaintLeaf {
    /// The painter.
    pub painter: Arc<dyn PaintSource>,
}

impl PaintLeaf {
    /// Wrap a painter.
    pub fn new(painter: Arc<dyn PaintSource>) -> Self {
        Self { painter }
    }
}

impl OpImpl for PaintLeaf {
    fn name(&self) -> &'static str {
        "paint"
    }

    fn arity(&self) -> Arity {
        Arity::Exact(0)
    }

    fn bounds(&self, _sources: &[Filter]) -> Rect {
        self.painter.bounds()
    }

    fn capabilities(&self, _sources: &[Filter]) -> Capabilities {
        Capabilities::DIRECT_PAINT
    }

    fn render(
        &self,
        _node: &NodeView<'_>,
        ctx: &RenderContext,
    ) -> FilterResult<Option<Arc<Raster>>> {
        let Some(area) = render_area(ctx, self.painter.bounds()) else {
            return Ok(None);
        };
        let Some(clip) = device_clip(ctx, area) else {
            return Ok(None);
        };
        let mut layer = Raster::transparent(clip, ColorModel::default());
        self.painter.paint(&mut layer, ctx.transform())?;
        Ok(Some(Arc::new(layer)))
    }

    fn paint_direct(
        &self,
        _node: &NodeView<'_>,
        surface: &mut dyn PaintSurface,
    ) -> FilterResult<bool> {
        if surface.composite_mode() != SurfaceCompositeMode::SrcOver {
            return Ok(false);
        }
        surface.draw_paint(self.painter.as_ref())?;
        Ok(true)
    }
}

/// Anti-aliased solid rectangle painter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RectPaint {
    /// User-space rectangle.
    pub rect: Rect,
    /// Fill color.
    pub color: Color,
}

/// Samples per axis used to estimate pixel coverage.
const AA_GRID: u32 = 4;

impl PaintSource for RectPaint {
    fn bounds(&self) -> Rect {
        self.rect
    }

    fn paint(&self, target: &mut Raster, transform: Affine) -> FilterResult<()> {
        let det = transform.determinant();
        if region::is_empty(self.rect) || !det.is_finite() || det.abs() < 1e-12 {
            return Ok(());
        }
        let inv = transform.inverse();
        let area = region::device_rect(transform, self.rect).intersect(target.rect());
        let [r, g, b, a] = self.color.to_straight_u8();
        let step = 1.0 / f64::from(AA_GRID);
        let total = AA_GRID * AA_GRID;
        for y in area.y..area.y1() {
            for x in area.x..area.x1() {
                let mut hits = 0u32;
                for sy in 0..AA_GRID {
                    for sx in 0..AA_GRID {
                        let p = Point::new(
                            f64::from(x) + (f64::from(sx) + 0.5) * step,
                            f64::from(y) + (f64::from(sy) + 0.5) * step,
                        );
                        let u = inv * p;
                        if u.x >= self.rect.x0
                            && u.x < self.rect.x1
                            && u.y >= self.rect.y0
                            && u.y < self.rect.y1
                        {
                            hits += 1;
                        }
                    }
                }
                if hits == 0 {
                    continue;
                }
                let cov = (u32::from(a) * hits + total / 2) / total;
                let px = Rgba8Premul::from_straight_rgba(r, g, b, cov as u8);
                let dst = target.pixel(x, y);
                target.set_pixel(x, y, blend::over(dst, px.to_array()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/ops/source.rs"]
mod tests;
