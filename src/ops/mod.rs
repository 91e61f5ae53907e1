//! Filter operators.
//!
//! [`Operator`] is the closed set of operations a node can run. Each variant carries a
//! parameter struct; rendering, bounds and region math live next to that struct.

use std::sync::Arc;

use crate::foundation::core::{ColorSpace, PixelRect, Rect};
use crate::foundation::error::{FilterError, FilterResult};
use crate::geom::decompose::ScaleSplit;
use crate::geom::region;
use crate::graph::context::RenderContext;
use crate::graph::node::{Filter, NodeView};
use crate::raster::buffer::Raster;
use crate::raster::resample::resample_affine;
use crate::raster::surface::PaintSurface;

/// Affine and offset wrappers.
pub mod affine;
/// Gaussian blur.
pub mod blur;
/// Region crop with optional resolution clamp.
pub mod chain;
/// Matrix-based color transforms.
pub mod color_matrix;
/// Explicit color-space conversion.
pub mod color_space;
/// Per-channel transfer functions.
pub mod component_transfer;
/// N-ary compositing.
pub mod composite;
/// General kernel convolution.
pub mod convolve;
/// Channel-driven displacement.
pub mod displacement;
/// Solid color fill.
pub mod flood;
/// Bump-map lighting.
pub mod lighting;
/// Dilate and erode.
pub mod morphology;
/// Crop and pad.
pub mod pad;
/// ICC-like profile conversion.
pub mod profile;
/// Raster and painter leaves.
pub mod source;
/// Pattern tiling.
pub mod tile;
/// Perlin turbulence generator.
pub mod turbulence;

pub use affine::{AffineOp, Offset};
pub use blur::GaussianBlur;
pub use chain::{FilterChain, FilterResolution};
pub use color_matrix::{ColorMatrix, ColorMatrixKind};
pub use color_space::ColorSpaceConvert;
pub use component_transfer::{ComponentTransfer, TransferFunction};
pub use composite::{Composite, CompositeRule};
pub use convolve::{ConvolveMatrix, EdgeMode};
pub use displacement::{Channel, DisplacementMap};
pub use flood::Flood;
pub use lighting::{DiffuseLighting, Light, SpecularLighting};
pub use morphology::{Morphology, MorphologyOp};
pub use pad::{Pad, PadMode};
pub use profile::{ColorProfile, ProfileOp, ToneCurve};
pub use source::{ImageSource, PaintLeaf, RectPaint};
pub use tile::Tile;
pub use turbulence::{NoiseKind, Turbulence};

/// Orthogonal capability flags advertised by an operator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// [`Filter::paint_direct`] can draw this node without materializing a raster.
    pub direct_paint: bool,
    /// The operator converts its inputs into an explicitly selected color space.
    pub color_space_aware: bool,
}

impl Capabilities {
    pub(crate) const NONE: Self = Self {
        direct_paint: false,
        color_space_aware: false,
    };
    pub(crate) const DIRECT_PAINT: Self = Self {
        direct_paint: true,
        color_space_aware: false,
    };
    pub(crate) const COLOR_SPACE_AWARE: Self = Self {
        direct_paint: false,
        color_space_aware: true,
    };
}

/// Number of sources an operator accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Arity {
    /// Exactly this many.
    Exact(usize),
    /// At least this many.
    AtLeast(usize),
}

impl Arity {
    fn check(self, op: &str, n: usize) -> FilterResult<()> {
        match self {
            Arity::Exact(k) if n != k => Err(FilterError::validation(format!(
                "{op} requires exactly {k} source(s), got {n}"
            ))),
            Arity::AtLeast(k) if n < k => Err(FilterError::validation(format!(
                "{op} requires at least {k} source(s), got {n}"
            ))),
            _ => Ok(()),
        }
    }
}

/// Behaviour shared by every operator parameter struct.
pub(crate) trait OpImpl {
    fn name(&self) -> &'static str;

    fn arity(&self) -> Arity;

    /// Parameter validation, run on construction and on every mutation.
    fn check(&self) -> FilterResult<()> {
        Ok(())
    }

    fn bounds(&self, sources: &[Filter]) -> Rect;

    /// User-space distance by which output pixels depend on neighbouring input of `index`.
    fn spread(&self, _index: usize) -> (f64, f64) {
        (0.0, 0.0)
    }

    fn dependency_region(&self, sources: &[Filter], index: usize, output: Rect) -> Option<Rect> {
        let out = region::intersect(output, self.bounds(sources))?;
        let (dx, dy) = self.spread(index);
        region::intersect(region::outset(out, dx, dy), sources[index].bounds())
    }

    fn dirty_region(&self, sources: &[Filter], index: usize, input: Rect) -> Option<Rect> {
        let changed = region::intersect(input, sources[index].bounds())?;
        let (dx, dy) = self.spread(index);
        region::intersect(region::outset(changed, dx, dy), self.bounds(sources))
    }

    fn capabilities(&self, _sources: &[Filter]) -> Capabilities {
        Capabilities::NONE
    }

    fn render(&self, node: &NodeView<'_>, ctx: &RenderContext)
    -> FilterResult<Option<Arc<Raster>>>;

    /// Whether finished rasters are worth keeping in the tile cache across render calls.
    fn cacheable(&self) -> bool {
        false
    }

    fn paint_direct(
        &self,
        _node: &NodeView<'_>,
        _surface: &mut dyn PaintSurface,
    ) -> FilterResult<bool> {
        Ok(false)
    }
}

/// The operation a node runs.
#[derive(Clone, Debug)]
pub enum Operator {
    /// Raster leaf.
    Image(ImageSource),
    /// External painter leaf.
    Paint(PaintLeaf),
    /// Solid color over a region.
    Flood(Flood),
    /// Procedural noise over a region.
    Turbulence(Turbulence),
    /// Extra user transform.
    Affine(AffineOp),
    /// Translation.
    Offset(Offset),
    /// Crop or pad to a rectangle.
    Pad(Pad),
    /// Ordered N-ary compositing.
    Composite(Composite),
    /// Pattern repetition.
    Tile(Tile),
    /// Region crop with optional resolution clamp.
    Chain(FilterChain),
    /// 4x5 color matrix family.
    ColorMatrix(ColorMatrix),
    /// Per-channel transfer functions.
    ComponentTransfer(ComponentTransfer),
    /// Profile-to-sRGB conversion.
    Profile(ProfileOp),
    /// sRGB/linear conversion.
    ColorSpace(ColorSpaceConvert),
    /// Gaussian blur.
    GaussianBlur(GaussianBlur),
    /// Kernel convolution.
    ConvolveMatrix(ConvolveMatrix),
    /// Dilate/erode.
    Morphology(Morphology),
    /// Diffuse bump-map lighting.
    DiffuseLighting(DiffuseLighting),
    /// Specular bump-map lighting.
    SpecularLighting(SpecularLighting),
    /// Displacement by a map source.
    DisplacementMap(DisplacementMap),
    /// Placeholder bound later; see [`Filter::deferred`].
    Deferred,
}

#[derive(Debug)]
struct DeferredOp;

impl OpImpl for DeferredOp {
    fn name(&self) -> &'static str {
        "deferred"
    }

    fn arity(&self) -> Arity {
        Arity::Exact(0)
    }

    fn bounds(&self, _sources: &[Filter]) -> Rect {
        Rect::ZERO
    }

    fn render(
        &self,
        _node: &NodeView<'_>,
        _ctx: &RenderContext,
    ) -> FilterResult<Option<Arc<Raster>>> {
        Ok(None)
    }
}

impl Operator {
    fn imp(&self) -> &dyn OpImpl {
        match self {
            Operator::Image(op) => op,
            Operator::Paint(op) => op,
            Operator::Flood(op) => op,
            Operator::Turbulence(op) => op,
            Operator::Affine(op) => op,
            Operator::Offset(op) => op,
            Operator::Pad(op) => op,
            Operator::Composite(op) => op,
            Operator::Tile(op) => op,
            Operator::Chain(op) => op,
            Operator::ColorMatrix(op) => op,
            Operator::ComponentTransfer(op) => op,
            Operator::Profile(op) => op,
            Operator::ColorSpace(op) => op,
            Operator::GaussianBlur(op) => op,
            Operator::ConvolveMatrix(op) => op,
            Operator::Morphology(op) => op,
            Operator::DiffuseLighting(op) => op,
            Operator::SpecularLighting(op) => op,
            Operator::DisplacementMap(op) => op,
            Operator::Deferred => &DeferredOp,
        }
    }

    /// Short operator name, as used in graph descriptions.
    pub fn name(&self) -> &'static str {
        self.imp().name()
    }

    /// Accepted number of sources.
    pub fn arity(&self) -> Arity {
        self.imp().arity()
    }

    /// Validate parameters and the number of sources.
    pub fn validate(&self, sources: usize) -> FilterResult<()> {
        let imp = self.imp();
        imp.check()?;
        imp.arity().check(imp.name(), sources)
    }

    pub(crate) fn bounds(&self, sources: &[Filter]) -> Rect {
        self.imp().bounds(sources)
    }

    pub(crate) fn capabilities(&self, sources: &[Filter]) -> Capabilities {
        self.imp().capabilities(sources)
    }

    pub(crate) fn dependency_region(
        &self,
        sources: &[Filter],
        index: usize,
        output: Rect,
    ) -> Option<Rect> {
        self.imp().dependency_region(sources, index, output)
    }

    pub(crate) fn dirty_region(
        &self,
        sources: &[Filter],
        index: usize,
        input: Rect,
    ) -> Option<Rect> {
        self.imp().dirty_region(sources, index, input)
    }

    pub(crate) fn render(
        &self,
        node: &NodeView<'_>,
        ctx: &RenderContext,
    ) -> FilterResult<Option<Arc<Raster>>> {
        self.imp().render(node, ctx)
    }

    pub(crate) fn paint_direct(
        &self,
        node: &NodeView<'_>,
        surface: &mut dyn PaintSurface,
    ) -> FilterResult<bool> {
        self.imp().paint_direct(node, surface)
    }

    pub(crate) fn cacheable(&self) -> bool {
        self.imp().cacheable()
    }
}

macro_rules! operator_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Operator {
                fn from(op: $ty) -> Self {
                    Operator::$variant(op)
                }
            }
        )*
    };
}

operator_from!(
    ImageSource => Image,
    PaintLeaf => Paint,
    Flood => Flood,
    Turbulence => Turbulence,
    AffineOp => Affine,
    Offset => Offset,
    Pad => Pad,
    Composite => Composite,
    Tile => Tile,
    FilterChain => Chain,
    ColorMatrix => ColorMatrix,
    ComponentTransfer => ComponentTransfer,
    ProfileOp => Profile,
    ColorSpaceConvert => ColorSpace,
    GaussianBlur => GaussianBlur,
    ConvolveMatrix => ConvolveMatrix,
    Morphology => Morphology,
    DiffuseLighting => DiffuseLighting,
    SpecularLighting => SpecularLighting,
    DisplacementMap => DisplacementMap,
);

/// Requested user-space area clipped to `bounds`; `None` when nothing overlaps.
pub(crate) fn render_area(ctx: &RenderContext, bounds: Rect) -> Option<Rect> {
    let aoi = ctx.area_of_interest().unwrap_or(bounds);
    region::intersect(aoi, bounds)
}

/// Device pixels covering `area` under the context transform; `None` when empty.
pub(crate) fn device_clip(ctx: &RenderContext, area: Rect) -> Option<PixelRect> {
    let clip = region::device_rect(ctx.transform(), area);
    (!clip.is_empty()).then_some(clip)
}

/// Bring a raster computed in stage space into device space, clipped to `clip`.
pub(crate) fn finish_staged(
    staged: Raster,
    split: &ScaleSplit,
    clip: PixelRect,
    ctx: &RenderContext,
) -> Option<Arc<Raster>> {
    let out = if split.is_axis_aligned() {
        if clip.contains_rect(staged.rect()) {
            Some(staged)
        } else {
            staged.cropped(clip)
        }
    } else {
        resample_affine(&staged, split.residual, clip, ctx.hints().interpolation)
    };
    out.map(Arc::new)
}

/// `raster` expressed in `space`, sharing the allocation when no conversion is needed.
pub(crate) fn in_space(raster: &Arc<Raster>, space: ColorSpace) -> Arc<Raster> {
    if raster.color_space() == space {
        raster.clone()
    } else {
        Arc::new(raster.to_color_space(space))
    }
}

/// First source rendered for `ctx` and converted into `space`, as an owned raster ready for
/// in-place pixel work.
pub(crate) fn source_in_space(
    node: &NodeView<'_>,
    ctx: &RenderContext,
    space: ColorSpace,
) -> FilterResult<Option<Raster>> {
    let Some(src) = node.sources.first() else {
        return Ok(None);
    };
    let Some(area) = render_area(ctx, src.bounds()) else {
        return Ok(None);
    };
    let rendered = src.render_in(&ctx.with_area_of_interest(area))?;
    Ok(rendered.map(|r| r.to_color_space(space)))
}

/// Bounds of the first source, or empty for sourceless nodes.
pub(crate) fn primary_bounds(sources: &[Filter]) -> Rect {
    sources.first().map(Filter::bounds).unwrap_or(Rect::ZERO)
}

/// Pass the first source's rendering through unchanged.
pub(crate) fn pass_through(
    node: &NodeView<'_>,
    ctx: &RenderContext,
) -> FilterResult<Option<Arc<Raster>>> {
    match node.sources.first() {
        Some(src) => src.render_in(ctx),
        None => Ok(None),
    }
}

/// Validate that `v` is finite.
pub(crate) fn finite(name: &str, v: f64) -> FilterResult<f64> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(FilterError::validation(format!("{name} must be finite")))
    }
}

/// Validate that `r` is finite and not inverted.
pub(crate) fn valid_rect(name: &str, r: Rect) -> FilterResult<Rect> {
    for v in [r.x0, r.y0, r.x1, r.y1] {
        finite(name, v)?;
    }
    if r.x1 < r.x0 || r.y1 < r.y0 {
        return Err(FilterError::validation(format!("{name} must not be inverted")));
    }
    Ok(r)
}
