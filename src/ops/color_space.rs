use std::sync::Arc;

use crate::foundation::core::{ColorSpace, Rect};
use crate::foundation::error::FilterResult;
use crate::graph::context::RenderContext;
use crate::graph::node::{Filter, NodeView};
use crate::ops::{Arity, OpImpl, in_space, pass_through, primary_bounds};
use crate::raster::buffer::Raster;

/// Converts its source into an explicit color space.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColorSpaceConvert {
    /// Space of the output pixels.
    pub target: ColorSpace,
}

impl ColorSpaceConvert {
    /// Convert to `target`.
    pub fn new(target: ColorSpace) -> Self {
        Self { target }
    }
}

impl OpImpl for ColorSpaceConvert {
    fn name(&self) -> &'static str {
        "color_space"
    }

    fn arity(&self) -> Arity {
        Arity::Exact(1)
    }

    fn bounds(&self, sources: &[Filter]) -> Rect {
        primary_bounds(sources)
    }

    fn render(&self, node: &NodeView<'_>, ctx: &RenderContext) -> FilterResult<Option<Arc<Raster>>> {
        Ok(pass_through(node, ctx)?.map(|r| in_space(&r, self.target)))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/ops/color_space.rs"]
mod tests;
