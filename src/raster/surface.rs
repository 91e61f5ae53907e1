use crate::foundation::core::{Affine, ColorSpace, PixelRect, Rect};
use crate::foundation::error::FilterResult;
use crate::raster::blend;
use crate::raster::buffer::{ColorModel, Raster};

/// External vector painter used as a leaf of the graph.
pub trait PaintSource: Send + Sync + std::fmt::Debug {
    /// User-space bounds of everything the painter may touch.
    fn bounds(&self) -> Rect;

    /// Paint into `target` (premultiplied sRGB, device space) through `transform` (user to
    /// device). Implementations composite over existing pixels.
    fn paint(&self, target: &mut Raster, transform: Affine) -> FilterResult<()>;
}

/// How a surface combines incoming pixels with what it already holds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SurfaceCompositeMode {
    /// Plain source-over.
    #[default]
    SrcOver,
    /// Replace destination pixels.
    Copy,
}

/// Drawing surface targeted by the direct-paint shortcut.
pub trait PaintSurface {
    /// Current user-to-device transform.
    fn transform(&self) -> Affine;

    /// Replace the user-to-device transform.
    fn set_transform(&mut self, at: Affine);

    /// Active composite mode.
    fn composite_mode(&self) -> SurfaceCompositeMode;

    /// Current device-space clip.
    fn clip_bounds(&self) -> PixelRect;

    /// Intersect the clip with `rect` (user space, under the current transform).
    fn push_clip(&mut self, rect: Rect);

    /// Restore the clip saved by the matching [`PaintSurface::push_clip`].
    fn pop_clip(&mut self);

    /// Composite a device-space raster with the active mode and clip.
    fn draw_raster(&mut self, raster: &Raster) -> FilterResult<()>;

    /// Let `paint` draw directly with the current transform and clip.
    fn draw_paint(&mut self, paint: &dyn PaintSource) -> FilterResult<()>;
}

/// [`PaintSurface`] backed by an in-memory premultiplied sRGB raster.
#[derive(Debug, Clone)]
pub struct RasterSurface {
    target: Raster,
    transform: Affine,
    mode: SurfaceCompositeMode,
    clips: Vec<PixelRect>,
}

impl RasterSurface {
    /// Transparent surface covering `rect` with an identity transform.
    pub fn new(rect: PixelRect) -> Self {
        Self {
            target: Raster::transparent(rect, ColorModel::premul(ColorSpace::Srgb)),
            transform: Affine::IDENTITY,
            mode: SurfaceCompositeMode::SrcOver,
            clips: vec![rect],
        }
    }

    /// Builder-style transform setter.
    pub fn with_transform(mut self, at: Affine) -> Self {
        self.transform = at;
        self
    }

    /// Change the composite mode.
    pub fn set_composite_mode(&mut self, mode: SurfaceCompositeMode) {
        self.mode = mode;
    }

    /// Pixels drawn so far.
    pub fn raster(&self) -> &Raster {
        &self.target
    }

    /// Consume the surface.
    pub fn into_raster(self) -> Raster {
        self.target
    }
}

impl PaintSurface for RasterSurface {
    fn transform(&self) -> Affine {
        self.transform
    }

    fn set_transform(&mut self, at: Affine) {
        self.transform = at;
    }

    fn composite_mode(&self) -> SurfaceCompositeMode {
        self.mode
    }

    fn clip_bounds(&self) -> PixelRect {
        self.clips.last().copied().unwrap_or(self.target.rect())
    }

    fn push_clip(&mut self, rect: Rect) {
        // Rotated clips are approximated by their device bounding box.
        let device = PixelRect::covering(self.transform.transform_rect_bbox(rect));
        let next = self.clip_bounds().intersect(device);
        self.clips.push(next);
    }

    fn pop_clip(&mut self) {
        if self.clips.len() > 1 {
            self.clips.pop();
        }
    }

    fn draw_raster(&mut self, raster: &Raster) -> FilterResult<()> {
        let clip = self.clip_bounds();
        let Some(src) = raster.cropped(clip) else {
            return Ok(());
        };
        let src = src.to_premultiplied().into_color_space(ColorSpace::Srgb);
        match self.mode {
            SurfaceCompositeMode::SrcOver => blend::over_in_place(&mut self.target, &src),
            SurfaceCompositeMode::Copy => self.target.copy_from(&src),
        }
        Ok(())
    }

    fn draw_paint(&mut self, paint: &dyn PaintSource) -> FilterResult<()> {
        let area = PixelRect::covering(self.transform.transform_rect_bbox(paint.bounds()))
            .intersect(self.clip_bounds());
        if area.is_empty() {
            return Ok(());
        }
        let mut layer = Raster::transparent(area, ColorModel::premul(ColorSpace::Srgb));
        paint.paint(&mut layer, self.transform)?;
        self.draw_raster(&layer)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/raster/surface.rs"]
mod tests;
