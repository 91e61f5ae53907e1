use crate::foundation::error::FilterResult;
use crate::geom::region;
use crate::graph::context::{RenderContext, RenderHints};
use crate::graph::node::Filter;
use crate::raster::surface::PaintSurface;

/// Draw `filter` onto `surface` through the surface's transform and clip.
///
/// Uses [`Filter::paint_direct`] when it applies and otherwise renders the clipped area and
/// blits the raster.
pub fn draw_filter(surface: &mut dyn PaintSurface, filter: &Filter) -> FilterResult<()> {
    draw_filter_with_hints(surface, filter, RenderHints::default())
}

/// [`draw_filter`] with explicit rendering hints for the fallback path.
pub fn draw_filter_with_hints(
    surface: &mut dyn PaintSurface,
    filter: &Filter,
    hints: RenderHints,
) -> FilterResult<()> {
    if filter.paint_direct(surface)? {
        return Ok(());
    }
    let at = surface.transform();
    let clip = surface.clip_bounds();
    if clip.is_empty() {
        return Ok(());
    }
    let Some(user_clip) = region::user_rect(at, clip) else {
        return Ok(());
    };
    let ctx = RenderContext::new(at)
        .with_area_of_interest(user_clip)
        .with_hints(hints);
    if let Some(raster) = filter.render(&ctx)? {
        surface.draw_raster(&raster)?;
    }
    Ok(())
}
