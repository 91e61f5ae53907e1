use std::sync::Arc;

use crate::foundation::core::{Affine, Rect};
use crate::foundation::error::FilterResult;
use crate::geom::region;
use crate::graph::context::RenderContext;
use crate::graph::node::{Filter, NodeView};
use crate::ops::{Arity, Capabilities, OpImpl, finite, primary_bounds};
use crate::raster::buffer::Raster;
use crate::raster::surface::PaintSurface;

/// Applies an extra transform to its source.
///
/// Output user space is the source's user space mapped through `transform`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AffineOp {
    /// Source-to-output transform.
    pub transform: Affine,
}

impl AffineOp {
    /// Wrap a transform; its coefficients must be finite.
    ///
    /// A singular transform is accepted and renders nothing.
    pub fn new(transform: Affine) -> FilterResult<Self> {
        let op = Self { transform };
        op.check()?;
        Ok(op)
    }
}

/// Translates its source by `(dx, dy)` user units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Offset {
    /// Horizontal shift.
    pub dx: f64,
    /// Vertical shift.
    pub dy: f64,
}

impl Offset {
    /// Translation by `(dx, dy)`.
    pub fn new(dx: f64, dy: f64) -> FilterResult<Self> {
        let op = Self { dx, dy };
        op.check()?;
        Ok(op)
    }

    fn transform(&self) -> Affine {
        Affine::translate((self.dx, self.dy))
    }
}

fn check_finite(at: Affine) -> FilterResult<()> {
    for v in at.as_coeffs() {
        finite("transform coefficient", v)?;
    }
    Ok(())
}

fn mapped_bounds(at: Affine, sources: &[Filter]) -> Rect {
    let src = primary_bounds(sources);
    if region::is_empty(src) {
        return Rect::ZERO;
    }
    at.transform_rect_bbox(src)
}

fn dependency(at: Affine, sources: &[Filter], output: Rect) -> Option<Rect> {
    if !region::is_invertible(at) {
        return None;
    }
    let out = region::intersect(output, mapped_bounds(at, sources))?;
    region::intersect(at.inverse().transform_rect_bbox(out), sources[0].bounds())
}

fn dirty(at: Affine, sources: &[Filter], input: Rect) -> Option<Rect> {
    let changed = region::intersect(input, sources[0].bounds())?;
    region::intersect(at.transform_rect_bbox(changed), mapped_bounds(at, sources))
}

fn inherited(sources: &[Filter]) -> Capabilities {
    Capabilities {
        direct_paint: sources[0].capabilities().direct_paint,
        color_space_aware: false,
    }
}

fn render_through(
    at: Affine,
    node: &NodeView<'_>,
    ctx: &RenderContext,
) -> FilterResult<Option<Arc<Raster>>> {
    if !region::is_invertible(at) {
        return Ok(None);
    }
    let src = &node.sources[0];
    let mut inner = ctx.with_transform(ctx.transform() * at);
    if let Some(aoi) = ctx.area_of_interest() {
        let Some(src_aoi) = region::intersect(at.inverse().transform_rect_bbox(aoi), src.bounds())
        else {
            return Ok(None);
        };
        inner = inner.with_area_of_interest(src_aoi);
    }
    src.render_in(&inner)
}

fn paint_through(
    at: Affine,
    node: &NodeView<'_>,
    surface: &mut dyn PaintSurface,
) -> FilterResult<bool> {
    if !region::is_invertible(at) {
        return Ok(true);
    }
    let saved = surface.transform();
    surface.set_transform(saved * at);
    let painted = node.sources[0].paint_direct(surface);
    surface.set_transform(saved);
    painted
}

impl OpImpl for AffineOp {
    fn name(&self) -> &'static str {
        "affine"
    }

    fn arity(&self) -> Arity {
        Arity::Exact(1)
    }

    fn check(&self) -> FilterResult<()> {
        check_finite(self.transform)
    }

    fn bounds(&self, sources: &[Filter]) -> Rect {
        mapped_bounds(self.transform, sources)
    }

    fn dependency_region(&self, sources: &[Filter], _index: usize, output: Rect) -> Option<Rect> {
        dependency(self.transform, sources, output)
    }

    fn dirty_region(&self, sources: &[Filter], _index: usize, input: Rect) -> Option<Rect> {
        dirty(self.transform, sources, input)
    }

    fn capabilities(&self, sources: &[Filter]) -> Capabilities {
        inherited(sources)
    }

    fn render(&self, node: &NodeView<'_>, ctx: &RenderContext) -> FilterResult<Option<Arc<Raster>>> {
        render_through(self.transform, node, ctx)
    }

    fn paint_direct(
        &self,
        node: &NodeView<'_>,
        surface: &mut dyn PaintSurface,
    ) -> FilterResult<bool> {
        paint_through(self.transform, node, surface)
    }
}

impl OpImpl for Offset {
    fn name(&self) -> &'static str {
        "offset"
    }

    fn arity(&self) -> Arity {
        Arity::Exact(1)
    }

    fn check(&self) -> FilterResult<()> {
        finite("offset dx", self.dx)?;
        finite("offset dy", self.dy)?;
        Ok(())
    }

    fn bounds(&self, sources: &[Filter]) -> Rect {
        mapped_bounds(self.transform(), sources)
    }

    fn dependency_region(&self, sources: &[Filter], _index: usize, output: Rect) -> Option<Rect> {
        dependency(self.transform(), sources, output)
    }

    fn dirty_region(&self, sources: &[Filter], _index: usize, input: Rect) -> Option<Rect> {
        dirty(self.transform(), sources, input)
    }

    fn capabilities(&self, sources: &[Filter]) -> Capabilities {
        inherited(sources)
    }

    fn render(&self, node: &NodeView<'_>, ctx: &RenderContext) -> FilterResult<Option<Arc<Raster>>> {
        render_through(self.transform(), node, ctx)
    }

    fn paint_direct(
        &self,
        node: &NodeView<'_>,
        surface: &mut dyn PaintSurface,
    ) -> FilterResult<bool> {
        paint_through(self.transform(), node, surface)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/ops/affine.rs"]
mod tests;
