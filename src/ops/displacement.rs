use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

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
use crate::raster::resample::{Interpolation, sample_bilinear};

/// Map channel driving one displacement axis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Red.
    R,
    /// Green.
    G,
    /// Blue.
    B,
    /// Alpha.
    #[default]
    A,
}

impl Channel {
    fn index(self) -> usize {
        match self {
            Channel::R => 0,
            Channel::G => 1,
            Channel::B => 2,
            Channel::A => 3,
        }
    }
}

/// Moves source 0 by amounts read from source 1:
/// `P'(x, y) = P(x + scale * (X(x, y) - 0.5), y + scale * (Y(x, y) - 0.5))`.
///
/// The map is read unpremultiplied, in the operator's color space. A map with nothing to draw
/// reads as transparent black.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisplacementMap {
    /// Largest displacement, in user units, for a full channel swing.
    pub scale: f64,
    /// Channel read for horizontal displacement.
    pub x_channel: Channel,
    /// Channel read for vertical displacement.
    pub y_channel: Channel,
    /// Space the map is interpreted in.
    pub color_space: ColorSpace,
}

impl DisplacementMap {
    /// Displacement by `scale`, reading `(x_channel, y_channel)`.
    pub fn new(scale: f64, x_channel: Channel, y_channel: Channel) -> FilterResult<Self> {
        let op = Self {
            scale,
            x_channel,
            y_channel,
            color_space: ColorSpace::Srgb,
        };
        op.check()?;
        Ok(op)
    }

    /// Same displacement, reading the map in `space`.
    pub fn in_space(mut self, space: ColorSpace) -> Self {
        self.color_space = space;
        self
    }
}

impl OpImpl for DisplacementMap {
    fn name(&self) -> &'static str {
        "displacement_map"
    }

    fn arity(&self) -> Arity {
        Arity::Exact(2)
    }

    fn check(&self) -> FilterResult<()> {
        if !self.scale.is_finite() {
            return Err(FilterError::validation("displacement scale must be finite"));
        }
        Ok(())
    }

    fn bounds(&self, sources: &[Filter]) -> Rect {
        primary_bounds(sources)
    }

    fn spread(&self, index: usize) -> (f64, f64) {
        if index == 0 {
            let half = self.scale.abs() / 2.0;
            (half, half)
        } else {
            (0.0, 0.0)
        }
    }

    fn capabilities(&self, _sources: &[Filter]) -> Capabilities {
        Capabilities::COLOR_SPACE_AWARE
    }

    fn cacheable(&self) -> bool {
        true
    }

    fn render(&self, node: &NodeView<'_>, ctx: &RenderContext) -> FilterResult<Option<Arc<Raster>>> {
        if self.scale == 0.0 {
            return pass_through(node, ctx);
        }
        let (src, map) = (&node.sources[0], &node.sources[1]);
        let Some(area) = render_area(ctx, self.bounds(node.sources)) else {
            return Ok(None);
        };
        let Some(clip) = device_clip(ctx, area) else {
            return Ok(None);
        };
        let Some(split) = decompose(ctx.transform()) else {
            return Ok(None);
        };
        let (kx, ky) = (self.scale * split.sx, self.scale * split.sy);
        let out_rect = region::device_rect(split.stage, area);
        let reach_x = (kx.abs() / 2.0).ceil() as i32 + 1;
        let reach_y = (ky.abs() / 2.0).ceil() as i32 + 1;
        let stage_ctx = ctx.with_transform(split.stage);

        let Some(src_area) = region::user_rect(split.stage, out_rect.outset(reach_x, reach_y))
            .and_then(|r| region::intersect(r, src.bounds()))
        else {
            return Ok(None);
        };
        let Some(image) = src.render_in(&stage_ctx.with_area_of_interest(src_area))? else {
            return Ok(None);
        };
        let space = ctx.op_space(self.color_space);
        let displacement = match region::intersect(area, map.bounds()) {
            Some(map_area) => map
                .render_in(&stage_ctx.with_area_of_interest(map_area))?
                .map(|m| m.to_color_space(space).to_unpremultiplied()),
            None => None,
        };

        let (xc, yc) = (self.x_channel.index(), self.y_channel.index());
        let interp = ctx.hints().interpolation;
        let mut staged = Raster::transparent(out_rect, image.model());
        let stride = out_rect.width as usize * 4;
        staged
            .data_mut()
            .par_chunks_mut(stride)
            .enumerate()
            .for_each(|(ly, row)| {
                let y = out_rect.y + ly as i32;
                for lx in 0..out_rect.width as usize {
                    let x = out_rect.x + lx as i32;
                    let m = displacement
                        .as_ref()
                        .map(|d| d.pixel(x, y))
                        .unwrap_or([0; 4]);
                    let dx = kx * (f64::from(m[xc]) / 255.0 - 0.5);
                    let dy = ky * (f64::from(m[yc]) / 255.0 - 0.5);
                    let (u, v) = (f64::from(x) + dx, f64::from(y) + dy);
                    let px = match interp {
                        Interpolation::Nearest => {
                            image.pixel((u + 0.5).floor() as i32, (v + 0.5).floor() as i32)
                        }
                        Interpolation::Bilinear => sample_bilinear(&image, u, v),
                    };
                    row[lx * 4..lx * 4 + 4].copy_from_slice(&px);
                }
            });
        Ok(finish_staged(staged, &split, clip, ctx))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/ops/displacement.rs"]
mod tests;
