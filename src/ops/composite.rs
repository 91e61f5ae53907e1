use std::sync::Arc;

use rayon::prelude::*;

use crate::foundation::core::{ColorSpace, Rect};
use crate::foundation::error::FilterResult;
use crate::foundation::math::unit_to_u8;
use crate::geom::region;
use crate::graph::context::RenderContext;
use crate::graph::node::{Filter, NodeView};
use crate::graph::paint::draw_filter;
use crate::ops::{Arity, Capabilities, OpImpl, device_clip, finite, render_area};
use crate::raster::buffer::{ColorModel, Raster};
use crate::raster::surface::{PaintSurface, SurfaceCompositeMode};

/// Porter-Duff style rule combining a layer `s` with the accumulated result `d`.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositeRule {
    /// `s + d(1 - αs)`.
    #[default]
    Over,
    /// `s·αd`.
    In,
    /// `s(1 - αd)`.
    Out,
    /// `s·αd + d(1 - αs)`.
    Atop,
    /// `s(1 - αd) + d(1 - αs)`.
    Xor,
    /// `k1·s·d + k2·s + k3·d + k4`, per channel, clamped.
    Arithmetic {
        /// Product weight.
        k1: f32,
        /// Layer weight.
        k2: f32,
        /// Accumulated weight.
        k3: f32,
        /// Constant offset.
        k4: f32,
    },
    /// Multiply blend.
    Multiply,
    /// Screen blend.
    Screen,
    /// Darken blend.
    Darken,
    /// Lighten blend.
    Lighten,
}

impl CompositeRule {
    fn name(self) -> &'static str {
        match self {
            CompositeRule::Over => "over",
            CompositeRule::In => "in",
            CompositeRule::Out => "out",
            CompositeRule::Atop => "atop",
            CompositeRule::Xor => "xor",
            CompositeRule::Arithmetic { .. } => "arithmetic",
            CompositeRule::Multiply => "multiply",
            CompositeRule::Screen => "screen",
            CompositeRule::Darken => "darken",
            CompositeRule::Lighten => "lighten",
        }
    }

    /// Combine premultiplied unit-range pixels.
    fn blend(self, s: [f32; 4], d: [f32; 4]) -> [f32; 4] {
        let (sa, da) = (s[3], d[3]);
        let mut out = [0.0f32; 4];
        match self {
            CompositeRule::Arithmetic { k1, k2, k3, k4 } => {
                for i in 0..4 {
                    out[i] = (k1 * s[i] * d[i] + k2 * s[i] + k3 * d[i] + k4).clamp(0.0, 1.0);
                }
                for i in 0..3 {
                    out[i] = out[i].min(out[3]);
                }
                return out;
            }
            CompositeRule::Over => {
                for i in 0..4 {
                    out[i] = s[i] + d[i] * (1.0 - sa);
                }
            }
            CompositeRule::In => {
                for i in 0..4 {
                    out[i] = s[i] * da;
                }
            }
            CompositeRule::Out => {
                for i in 0..4 {
                    out[i] = s[i] * (1.0 - da);
                }
            }
            CompositeRule::Atop => {
                for i in 0..4 {
                    out[i] = s[i] * da + d[i] * (1.0 - sa);
                }
            }
            CompositeRule::Xor => {
                for i in 0..4 {
                    out[i] = s[i] * (1.0 - da) + d[i] * (1.0 - sa);
                }
            }
            CompositeRule::Multiply => {
                for i in 0..3 {
                    out[i] = s[i] * d[i] + s[i] * (1.0 - da) + d[i] * (1.0 - sa);
                }
                out[3] = sa + da - sa * da;
            }
            CompositeRule::Screen => {
                for i in 0..4 {
                    out[i] = s[i] + d[i] - s[i] * d[i];
                }
            }
            CompositeRule::Darken | CompositeRule::Lighten => {
                for i in 0..3 {
                    let (a, b) = (s[i] * da, d[i] * sa);
                    let pick = if self == CompositeRule::Darken { a.min(b) } else { a.max(b) };
                    out[i] = pick + s[i] * (1.0 - da) + d[i] * (1.0 - sa);
                }
                out[3] = sa + da - sa * da;
            }
        }
        out.map(|v| v.clamp(0.0, 1.0))
    }
}

/// Ordered N-ary compositing of its sources.
///
/// The first source that contributes pixels is the destination; each later source is combined
/// as `source RULE accumulated`. Sources that render nothing follow the rule's null policy: `in`
/// voids the whole result, `out` clears what has accumulated, `arithmetic` treats the layer as
/// transparent black and every other rule skips it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Composite {
    /// Combination rule.
    pub rule: CompositeRule,
    /// Space the blend arithmetic runs in.
    pub color_space: ColorSpace,
}

impl Composite {
    /// Composite with `rule` in sRGB.
    pub fn new(rule: CompositeRule) -> FilterResult<Self> {
        let op = Self {
            rule,
            color_space: ColorSpace::Srgb,
        };
        op.check()?;
        Ok(op)
    }

    /// Plain source-over stack.
    pub fn over() -> Self {
        Self {
            rule: CompositeRule::Over,
            color_space: ColorSpace::Srgb,
        }
    }

    /// Same rule, running in `space`.
    pub fn in_space(mut self, space: ColorSpace) -> Self {
        self.color_space = space;
        self
    }

    fn combine(&self, acc: &mut Raster, layer: &Raster) {
        let rule = self.rule;
        let stride = acc.width() as usize * 4;
        acc.data_mut()
            .par_chunks_mut(stride)
            .zip(layer.data().par_chunks(stride))
            .for_each(|(dst_row, src_row)| {
                for (d, s) in dst_row.chunks_exact_mut(4).zip(src_row.chunks_exact(4)) {
                    let unit = |p: &[u8]| {
                        [
                            f32::from(p[0]) / 255.0,
                            f32::from(p[1]) / 255.0,
                            f32::from(p[2]) / 255.0,
                            f32::from(p[3]) / 255.0,
                        ]
                    };
                    let out = rule.blend(unit(s), unit(d));
                    for i in 0..4 {
                        d[i] = unit_to_u8(out[i]);
                    }
                }
            });
    }
}

impl OpImpl for Composite {
    fn name(&self) -> &'static str {
        "composite"
    }

    fn arity(&self) -> Arity {
        Arity::AtLeast(1)
    }

    fn check(&self) -> FilterResult<()> {
        if let CompositeRule::Arithmetic { k1, k2, k3, k4 } = self.rule {
            for (name, k) in [("k1", k1), ("k2", k2), ("k3", k3), ("k4", k4)] {
                finite(&format!("arithmetic {name}"), f64::from(k))?;
            }
        }
        Ok(())
    }

    fn bounds(&self, sources: &[Filter]) -> Rect {
        let all = sources.iter().map(Filter::bounds);
        match self.rule {
            CompositeRule::In => region::intersect_all(all),
            _ => region::union_all(all),
        }
    }

    fn capabilities(&self, sources: &[Filter]) -> Capabilities {
        Capabilities {
            direct_paint: self.rule == CompositeRule::Over
                && self.color_space == ColorSpace::Srgb
                && sources.iter().all(|s| s.capabilities().direct_paint),
            color_space_aware: true,
        }
    }

    fn render(&self, node: &NodeView<'_>, ctx: &RenderContext) -> FilterResult<Option<Arc<Raster>>> {
        let bounds = self.bounds(node.sources);
        let Some(area) = render_area(ctx, bounds) else {
            return Ok(None);
        };
        let Some(clip) = device_clip(ctx, area) else {
            return Ok(None);
        };
        let space = ctx.op_space(self.color_space);
        let model = ColorModel::premul(space);
        let inner = ctx.with_area_of_interest(area);
        let mut acc: Option<Raster> = None;
        for src in node.sources.iter() {
            let rendered = match region::intersect(area, src.bounds()) {
                Some(_) => src.render_in(&inner)?,
                None => None,
            };
            let layer = match rendered {
                Some(r) => r.to_color_space(space).resized_to(clip),
                None => None,
            };
            let layer = match (layer, self.rule) {
                (Some(l), _) => l,
                (None, CompositeRule::In) => {
                    tracing::trace!(rule = self.rule.name(), "empty layer voids composite");
                    return Ok(None);
                }
                (None, CompositeRule::Out) => {
                    acc = None;
                    continue;
                }
                (None, CompositeRule::Arithmetic { .. }) => Raster::transparent(clip, model),
                (None, _) => continue,
            };
            match acc.as_mut() {
                None => acc = Some(layer),
                Some(dst) => self.combine(dst, &layer),
            }
        }
        Ok(acc.map(Arc::new))
    }

    fn paint_direct(
        &self,
        node: &NodeView<'_>,
        surface: &mut dyn PaintSurface,
    ) -> FilterResult<bool> {
        if self.rule != CompositeRule::Over
            || self.color_space != ColorSpace::Srgb
            || surface.composite_mode() != SurfaceCompositeMode::SrcOver
        {
            return Ok(false);
        }
        for src in node.sources.iter() {
            draw_filter(surface, src)?;
        }
        Ok(true)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/ops/composite.rs"]
mod tests;
