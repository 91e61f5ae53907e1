use crate::foundation::core::{ColorSpace, PixelRect, Rgba8Premul};
use crate::foundation::error::{FilterError, FilterResult};
use crate::raster::color;

/// Pixel layout of a [`Raster`]: four 8-bit channels in RGBA order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ColorModel {
    /// Color space the channel values are encoded in.
    pub color_space: ColorSpace,
    /// Whether color channels are multiplied by alpha.
    pub premultiplied: bool,
}

impl ColorModel {
    /// Channels per pixel.
    pub const CHANNELS: usize = 4;
    /// Bits per channel.
    pub const BITS_PER_CHANNEL: u32 = 8;

    /// Premultiplied model in `color_space`.
    pub const fn premul(color_space: ColorSpace) -> Self {
        Self {
            color_space,
            premultiplied: true,
        }
    }
}

impl Default for ColorModel {
    fn default() -> Self {
        Self::premul(ColorSpace::Srgb)
    }
}

/// Materialized render output: RGBA8 pixels placed at an integer device-space origin.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Raster {
    rect: PixelRect,
    model: ColorModel,
    data: Vec<u8>,
}

impl Raster {
    /// Transparent raster covering `rect`.
    pub fn transparent(rect: PixelRect, model: ColorModel) -> Self {
        Self {
            rect,
            model,
            data: vec![0u8; rect.area() * 4],
        }
    }

    /// Raster filled with one premultiplied color.
    pub fn filled(rect: PixelRect, model: ColorModel, px: Rgba8Premul) -> Self {
        Self {
            rect,
            model,
            data: px.to_array().repeat(rect.area()),
        }
    }

    /// Wrap existing bytes; `data` must hold exactly `rect.area() * 4` bytes.
    pub fn from_data(rect: PixelRect, model: ColorModel, data: Vec<u8>) -> FilterResult<Self> {
        if data.len() != rect.area() * 4 {
            return Err(FilterError::evaluation(format!(
                "raster data has {} bytes, expected {} for {}x{}",
                data.len(),
                rect.area() * 4,
                rect.width,
                rect.height
            )));
        }
        Ok(Self { rect, model, data })
    }

    /// Build a premultiplied sRGB raster from straight-alpha RGBA8 bytes.
    pub fn from_straight_rgba8(rect: PixelRect, mut data: Vec<u8>) -> FilterResult<Self> {
        color::premultiply_in_place(&mut data);
        Self::from_data(rect, ColorModel::premul(ColorSpace::Srgb), data)
    }

    /// Device-space placement.
    pub fn rect(&self) -> PixelRect {
        self.rect
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.rect.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.rect.height
    }

    /// Pixel layout.
    pub fn model(&self) -> ColorModel {
        self.model
    }

    /// Color space of the channel values.
    pub fn color_space(&self) -> ColorSpace {
        self.model.color_space
    }

    /// Raw RGBA bytes, row-major.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable raw RGBA bytes, row-major.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Consume into raw RGBA bytes.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Move the raster without touching pixels.
    pub fn with_origin(mut self, x: i32, y: i32) -> Self {
        self.rect.x = x;
        self.rect.y = y;
        self
    }

    /// Relabel the color model without converting pixels.
    pub(crate) fn with_model(mut self, model: ColorModel) -> Self {
        self.model = model;
        self
    }

    fn offset_of(&self, x: i32, y: i32) -> Option<usize> {
        if !self.rect.contains(x, y) {
            return None;
        }
        let lx = (x - self.rect.x) as usize;
        let ly = (y - self.rect.y) as usize;
        Some((ly * self.rect.width as usize + lx) * 4)
    }

    /// Pixel at device coordinate `(x, y)`; transparent outside the raster.
    pub fn pixel(&self, x: i32, y: i32) -> [u8; 4] {
        match self.offset_of(x, y) {
            Some(i) => [
                self.data[i],
                self.data[i + 1],
                self.data[i + 2],
                self.data[i + 3],
            ],
            None => [0; 4],
        }
    }

    /// Overwrite the pixel at device coordinate `(x, y)`; ignored outside the raster.
    pub fn set_pixel(&mut self, x: i32, y: i32, px: [u8; 4]) {
        if let Some(i) = self.offset_of(x, y) {
            self.data[i..i + 4].copy_from_slice(&px);
        }
    }

    /// One row of pixels in local coordinates.
    pub fn row(&self, local_y: u32) -> &[u8] {
        let stride = self.rect.width as usize * 4;
        let start = local_y as usize * stride;
        &self.data[start..start + stride]
    }

    /// Return `true` when every pixel has zero alpha.
    pub fn is_fully_transparent(&self) -> bool {
        self.data.chunks_exact(4).all(|px| px[3] == 0)
    }

    /// Copy of the pixels inside `rect`, zero-filled where `rect` extends past this raster.
    ///
    /// Returns `None` when `rect` is empty.
    pub fn resized_to(&self, rect: PixelRect) -> Option<Self> {
        if rect.is_empty() {
            return None;
        }
        if rect == self.rect {
            return Some(self.clone());
        }
        let mut out = Self::transparent(rect, self.model);
        out.copy_from(self);
        Some(out)
    }

    /// Copy of the pixels inside `rect ∩ self.rect()`; `None` when they do not overlap.
    pub fn cropped(&self, rect: PixelRect) -> Option<Self> {
        self.resized_to(self.rect.intersect(rect))
    }

    /// Replace the overlapping region of `self` with pixels from `src`.
    pub fn copy_from(&mut self, src: &Raster) {
        let overlap = self.rect.intersect(src.rect);
        if overlap.is_empty() {
            return;
        }
        let row_bytes = overlap.width as usize * 4;
        for y in overlap.y..overlap.y1() {
            let (Some(d), Some(s)) = (self.offset_of(overlap.x, y), src.offset_of(overlap.x, y))
            else {
                continue;
            };
            self.data[d..d + row_bytes].copy_from_slice(&src.data[s..s + row_bytes]);
        }
    }

    /// Zero every pixel outside `keep`.
    pub fn clear_outside(&mut self, keep: PixelRect) {
        let keep = keep.intersect(self.rect);
        let w = self.rect.width as usize;
        for ly in 0..self.rect.height as usize {
            let y = self.rect.y + ly as i32;
            let row = &mut self.data[ly * w * 4..(ly + 1) * w * 4];
            if y < keep.y || y >= keep.y1() || keep.is_empty() {
                row.fill(0);
                continue;
            }
            let left = (keep.x - self.rect.x) as usize;
            let right = (keep.x1() - self.rect.x) as usize;
            row[..left * 4].fill(0);
            row[right * 4..].fill(0);
        }
    }

    /// Premultiplied copy of this raster (no-op clone when already premultiplied).
    pub fn to_premultiplied(&self) -> Self {
        let mut out = self.clone();
        if !out.model.premultiplied {
            color::premultiply_in_place(&mut out.data);
            out.model.premultiplied = true;
        }
        out
    }

    /// Straight-alpha copy of this raster.
    pub fn to_unpremultiplied(&self) -> Self {
        let mut out = self.clone();
        if out.model.premultiplied {
            color::unpremultiply_in_place(&mut out.data);
            out.model.premultiplied = false;
        }
        out
    }

    /// Copy converted into `space`, keeping the premultiplied flag.
    pub fn to_color_space(&self, space: ColorSpace) -> Self {
        let mut out = self.clone();
        if out.model.color_space != space {
            color::convert_bytes(
                &mut out.data,
                out.model.color_space,
                space,
                out.model.premultiplied,
            );
            out.model.color_space = space;
        }
        out
    }

    /// Convert into `space`, reusing the buffer when no conversion is needed.
    pub fn into_color_space(self, space: ColorSpace) -> Self {
        if self.model.color_space == space {
            return self;
        }
        self.to_color_space(space)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/raster/buffer.rs"]
mod tests;
