use std::sync::Arc;

use crate::foundation::core::{Affine, Rect};
use crate::foundation::error::FilterResult;
use crate::geom::region;
use crate::graph::context::RenderContext;
use crate::graph::node::{Filter, NodeView};
use crate::graph::paint::draw_filter;
use crate::ops::composite::{Composite, CompositeRule};
use crate::ops::pad::{PadMode, render_cropped};
use crate::ops::{Arity, Capabilities, OpImpl, Operator, device_clip, render_area, valid_rect};
use crate::raster::buffer::Raster;
use crate::raster::resample::resample_affine;
use crate::raster::surface::{PaintSurface, SurfaceCompositeMode};

/// Maximum pixel resolution of a filter chain's intermediate rendering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FilterResolution {
    /// Horizontal pixels across the chain region; zero renders nothing.
    pub x: u32,
    /// Vertical pixels; `None` keeps the aspect ratio implied by `x`.
    #[serde(default)]
    pub y: Option<u32>,
}

/// Crops its source to a region, optionally clamping the rendering resolution.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FilterChain {
    /// Output region in user space.
    pub region: Rect,
    /// Resolution clamp.
    pub resolution: Option<FilterResolution>,
}

impl FilterChain {
    /// Chain over `region` without a resolution clamp.
    pub fn new(region: Rect) -> FilterResult<Self> {
        let op = Self {
            region,
            resolution: None,
        };
        op.check()?;
        Ok(op)
    }

    /// Builder-style resolution clamp.
    pub fn with_resolution(mut self, resolution: FilterResolution) -> Self {
        self.resolution = Some(resolution);
        self
    }

    /// Uniform scale of the clamped rendering, or `None` when the device already has fewer
    /// pixels than the clamp allows.
    ///
    /// `Some(0.0)` means the clamp is zero and nothing is drawn.
    fn clamped_scale(&self, at: Affine) -> Option<f64> {
        let res = self.resolution?;
        if res.x == 0 || res.y == Some(0) {
            return Some(0.0);
        }
        let dev = region::device_rect(at, self.region);
        let rx = f64::from(res.x);
        let scale_x = if res.x < dev.width {
            rx / f64::from(dev.width)
        } else {
            1.0
        };
        let scale_y = match res.y {
            None => scale_x,
            Some(ry) if ry < dev.height => {
                f64::from(ry) / f64::from(dev.height)
            }
            Some(_) => 1.0,
        };
        if scale_x >= 1.0 && scale_y >= 1.0 {
            return None;
        }
        let by_x = rx / self.region.width();
        let by_y = res.y.map_or(by_x, |ry| f64::from(ry) / self.region.height());
        Some(by_x.min(by_y))
    }

    fn render_clamped(
        &self,
        node: &NodeView<'_>,
        ctx: &RenderContext,
        area: Rect,
        res_scale: f64,
    ) -> FilterResult<Option<Arc<Raster>>> {
        let Some(clip) = device_clip(ctx, area) else {
            return Ok(None);
        };
        let cache = ctx.tile_cache();
        let key = (res_scale, res_scale);
        let low = match cache.get(node.id, key, node.timestamp) {
            Some(hit) => hit,
            None => {
                let low_ctx = ctx
                    .with_transform(Affine::scale(res_scale))
                    .without_area_of_interest();
                let Some(region) = render_area(&low_ctx, self.region) else {
                    return Ok(None);
                };
                let Some(low) = render_cropped(&node.sources[0], &low_ctx, self.region, region)?
                else {
                    return Ok(None);
                };
                tracing::debug!(
                    node = node.id.0,
                    scale = res_scale,
                    "rendered at clamped resolution"
                );
                cache.insert(node.id, key, node.timestamp, low.clone());
                low
            }
        };
        let [a, b, c, d, e, f] = ctx.transform().as_coeffs();
        let residual = Affine::new([
            a / res_scale,
            b / res_scale,
            c / res_scale,
            d / res_scale,
            e,
            f,
        ]);
        Ok(resample_affine(&low, residual, clip, ctx.hints().interpolation).map(Arc::new))
    }

    /// Paint `src` at full resolution where possible, clamping only what cannot be painted
    /// directly. Returns `false` when nothing could be distributed.
    fn distribute(&self, src: &Filter, surface: &mut dyn PaintSurface) -> FilterResult<bool> {
        let op = src.operator();
        match op.as_ref() {
            Operator::Pad(pad) if pad.mode == PadMode::Zero => {
                surface.push_clip(pad.region);
                let sources = src.sources();
                let done = self.distribute(&sources[0], surface);
                surface.pop_clip();
                done
            }
            Operator::Composite(comp) if comp.rule == CompositeRule::Over => {
                let sources = src.sources();
                let first_paintable = sources
                    .iter()
                    .rposition(|s| !s.capabilities().direct_paint)
                    .map_or(0, |i| i + 1);
                if first_paintable == 0 {
                    draw_filter(surface, src)?;
                    return Ok(true);
                }
                if first_paintable == sources.len() {
                    return Ok(false);
                }
                let head = Filter::new(
                    Composite {
                        rule: comp.rule,
                        color_space: comp.color_space,
                    }
                    .into(),
                    sources[..first_paintable].to_vec(),
                )?;
                draw_filter(surface, &self.clamp(head)?)?;
                for tail in &sources[first_paintable..] {
                    if !tail.paint_direct(surface)? {
                        draw_filter(surface, &self.clamp(tail.clone())?)?;
                    }
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Wrap `src` in a chain with the same clamp over its own bounds.
    fn clamp(&self, src: Filter) -> FilterResult<Filter> {
        let chain = FilterChain {
            region: src.bounds(),
            resolution: self.resolution,
        };
        Filter::new(chain.into(), vec![src])
    }
}

impl OpImpl for FilterChain {
    fn name(&self) -> &'static str {
        "chain"
    }

    fn arity(&self) -> Arity {
        Arity::Exact(1)
    }

    fn check(&self) -> FilterResult<()> {
        valid_rect("chain region", self.region)?;
        Ok(())
    }

    fn bounds(&self, _sources: &[Filter]) -> Rect {
        self.region
    }

    fn capabilities(&self, sources: &[Filter]) -> Capabilities {
        Capabilities {
            direct_paint: sources[0].capabilities().direct_paint,
            color_space_aware: false,
        }
    }

    fn render(&self, node: &NodeView<'_>, ctx: &RenderContext) -> FilterResult<Option<Arc<Raster>>> {
        let Some(area) = render_area(ctx, self.region) else {
            return Ok(None);
        };
        match self.clamped_scale(ctx.transform()) {
            None => render_cropped(&node.sources[0], ctx, self.region, area),
            Some(s) if s <= 0.0 || !s.is_finite() => Ok(None),
            Some(s) => self.render_clamped(node, ctx, area, s),
        }
    }

    fn paint_direct(
        &self,
        node: &NodeView<'_>,
        surface: &mut dyn PaintSurface,
    ) -> FilterResult<bool> {
        if surface.composite_mode() != SurfaceCompositeMode::SrcOver {
            return Ok(false);
        }
        let src = &node.sources[0];
        if self.resolution.is_some_and(|r| r.x == 0 || r.y == Some(0)) {
            return Ok(true);
        }
        surface.push_clip(self.region);
        let painted = if src.capabilities().direct_paint {
            src.paint_direct(surface)
        } else if self.resolution.is_some() {
            self.distribute(src, surface)
        } else {
            Ok(false)
        };
        surface.pop_clip();
        painted
    }
}

#[cfg(test)]
#[path = "../../tests/unit/ops/chain.rs"]
mod tests;
