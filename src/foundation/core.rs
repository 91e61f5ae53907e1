use crate::foundation::error::{FilterError, FilterResult};

pub use kurbo::{Affine, Point, Rect, Vec2};

/// Tolerance used when snapping user-space rectangles to the device pixel grid.
const SNAP_EPS: f64 = 1e-6;

/// Integer device-space rectangle `[x, x + width) x [y, y + height)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct PixelRect {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl PixelRect {
    /// Create a rectangle from origin and size.
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Create a rectangle from inclusive-exclusive edges; inverted edges give an empty rect.
    pub fn from_edges(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        let width = i64::from(x1) - i64::from(x0);
        let height = i64::from(y1) - i64::from(y0);
        if width <= 0 || height <= 0 {
            return Self::new(x0, y0, 0, 0);
        }
        Self::new(x0, y0, width as u32, height as u32)
    }

    /// Smallest pixel rectangle covering `rect`.
    ///
    /// Edges within a small tolerance of an integer snap to it, so transformed integer
    /// rectangles do not pick up a spurious extra row or column.
    pub fn covering(rect: Rect) -> Self {
        if !(rect.x0.is_finite() && rect.y0.is_finite() && rect.x1.is_finite() && rect.y1.is_finite())
        {
            return Self::default();
        }
        let lim = f64::from(i32::MAX / 2);
        let x0 = (rect.x0 + SNAP_EPS).floor().clamp(-lim, lim) as i32;
        let y0 = (rect.y0 + SNAP_EPS).floor().clamp(-lim, lim) as i32;
        let x1 = (rect.x1 - SNAP_EPS).ceil().clamp(-lim, lim) as i32;
        let y1 = (rect.y1 - SNAP_EPS).ceil().clamp(-lim, lim) as i32;
        Self::from_edges(x0, y0, x1, y1)
    }

    /// Exclusive right edge.
    pub fn x1(self) -> i32 {
        self.x.saturating_add(self.width as i32)
    }

    /// Exclusive bottom edge.
    pub fn y1(self) -> i32 {
        self.y.saturating_add(self.height as i32)
    }

    /// Return `true` when the rectangle covers no pixels.
    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Number of pixels covered.
    pub fn area(self) -> usize {
        (self.width as usize).saturating_mul(self.height as usize)
    }

    /// Overlap of two rectangles (empty when disjoint).
    pub fn intersect(self, other: Self) -> Self {
        Self::from_edges(
            self.x.max(other.x),
            self.y.max(other.y),
            self.x1().min(other.x1()),
            self.y1().min(other.y1()),
        )
    }

    /// Bounding rectangle of both; empty inputs are ignored.
    pub fn union(self, other: Self) -> Self {
        if self.is_empty() {
            return other;
        }
        if other.is_empty() {
            return self;
        }
        Self::from_edges(
            self.x.min(other.x),
            self.y.min(other.y),
            self.x1().max(other.x1()),
            self.y1().max(other.y1()),
        )
    }

    /// Grow every edge outward (negative values shrink).
    pub fn outset(self, dx: i32, dy: i32) -> Self {
        Self::from_edges(
            self.x.saturating_sub(dx),
            self.y.saturating_sub(dy),
            self.x1().saturating_add(dx),
            self.y1().saturating_add(dy),
        )
    }

    /// Shift by an integer offset.
    pub fn translate(self, dx: i32, dy: i32) -> Self {
        Self::new(
            self.x.saturating_add(dx),
            self.y.saturating_add(dy),
            self.width,
            self.height,
        )
    }

    /// Return `true` when pixel `(x, y)` lies inside.
    pub fn contains(self, x: i32, y: i32) -> bool {
        x >= self.x && y >= self.y && x < self.x1() && y < self.y1()
    }

    /// Return `true` when `other` lies entirely inside `self`.
    pub fn contains_rect(self, other: Self) -> bool {
        other.is_empty()
            || (other.x >= self.x
                && other.y >= self.y
                && other.x1() <= self.x1()
                && other.y1() <= self.y1())
    }

    /// Floating-point rectangle with the same edges.
    pub fn to_rect(self) -> Rect {
        Rect::new(
            f64::from(self.x),
            f64::from(self.y),
            f64::from(self.x1()),
            f64::from(self.y1()),
        )
    }
}

/// Premultiplied RGBA8 (r,g,b already multiplied by a).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Rgba8Premul {
    /// Red channel premultiplied by alpha.
    pub r: u8,
    /// Green channel premultiplied by alpha.
    pub g: u8,
    /// Blue channel premultiplied by alpha.
    pub b: u8,
    /// Alpha channel.
    pub a: u8,
}

impl Rgba8Premul {
    /// Fully transparent black.
    pub fn transparent() -> Self {
        Self::default()
    }

    /// Convert straight-alpha RGBA8 into premultiplied RGBA8.
    pub fn from_straight_rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        fn premul(c: u8, a: u8) -> u8 {
            let c = u16::from(c);
            let a = u16::from(a);
            (((c * a) + 127) / 255) as u8
        }

        Self {
            r: premul(r, a),
            g: premul(g, a),
            b: premul(b, a),
            a,
        }
    }

    /// Pixel bytes in `[r, g, b, a]` order.
    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// Straight-alpha color with components in `[0, 1]`, used for flood and light colors.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Color {
    /// Red.
    pub r: f32,
    /// Green.
    pub g: f32,
    /// Blue.
    pub b: f32,
    /// Alpha.
    #[serde(default = "one")]
    pub a: f32,
}

fn one() -> f32 {
    1.0
}

impl Color {
    /// Opaque white.
    pub const WHITE: Self = Self::rgb(1.0, 1.0, 1.0);
    /// Transparent black.
    pub const TRANSPARENT: Self = Self::rgba(0.0, 0.0, 0.0, 0.0);

    /// Opaque color.
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Color with explicit alpha.
    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Parse `#rrggbb` or `#rrggbbaa`.
    pub fn from_hex(s: &str) -> FilterResult<Self> {
        let hex = s.strip_prefix('#').unwrap_or(s);
        if !hex.is_ascii() || (hex.len() != 6 && hex.len() != 8) {
            return Err(FilterError::validation(format!(
                "color '{s}' must be #rrggbb or #rrggbbaa"
            )));
        }
        let channel = |i: usize| -> FilterResult<f32> {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map(|v| f32::from(v) / 255.0)
                .map_err(|_| FilterError::validation(format!("color '{s}' is not valid hex")))
        };
        let a = if hex.len() == 8 { channel(6)? } else { 1.0 };
        Ok(Self::rgba(channel(0)?, channel(2)?, channel(4)?, a))
    }

    /// Quantize to straight RGBA8.
    pub fn to_straight_u8(self) -> [u8; 4] {
        let q = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.r), q(self.g), q(self.b), q(self.a)]
    }

    /// Quantize to premultiplied RGBA8, with an extra opacity factor.
    pub fn to_premul(self, opacity: f32) -> Rgba8Premul {
        let [r, g, b, _] = self.to_straight_u8();
        let a = ((self.a * opacity).clamp(0.0, 1.0) * 255.0).round() as u8;
        Rgba8Premul::from_straight_rgba(r, g, b, a)
    }
}

/// Algebraic color space an operator works in.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub enum ColorSpace {
    /// Gamma-encoded sRGB.
    #[default]
    #[serde(rename = "sRGB", alias = "srgb")]
    Srgb,
    /// Linear-light RGB with sRGB primaries.
    #[serde(rename = "linearRGB", alias = "linear_rgb", alias = "linear")]
    LinearRgb,
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
