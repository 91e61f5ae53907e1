//! sRGB transfer curves and alpha (un)premultiplication on RGBA8 buffers.

use std::sync::OnceLock;

use crate::foundation::core::ColorSpace;
use crate::foundation::math::mul_div255_u8;

/// Decode one sRGB-encoded component in `[0, 1]` into linear light.
pub fn srgb_to_linear(v: f32) -> f32 {
    if v <= 0.04045 {
        v / 12.92
    } else {
        ((v + 0.055) / 1.055).powf(2.4)
    }
}

/// Encode one linear-light component in `[0, 1]` with the sRGB curve.
pub fn linear_to_srgb(v: f32) -> f32 {
    if v <= 0.003_130_8 {
        v * 12.92
    } else {
        1.055 * v.powf(1.0 / 2.4) - 0.055
    }
}

fn build_lut(f: fn(f32) -> f32) -> [u8; 256] {
    let mut lut = [0u8; 256];
    for (i, out) in lut.iter_mut().enumerate() {
        let v = f(i as f32 / 255.0);
        *out = (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    }
    lut
}

/// 8-bit sRGB to linear lookup table.
pub fn srgb_to_linear_lut() -> &'static [u8; 256] {
    static LUT: OnceLock<[u8; 256]> = OnceLock::new();
    LUT.get_or_init(|| build_lut(srgb_to_linear))
}

/// 8-bit linear to sRGB lookup table.
pub fn linear_to_srgb_lut() -> &'static [u8; 256] {
    static LUT: OnceLock<[u8; 256]> = OnceLock::new();
    LUT.get_or_init(|| build_lut(linear_to_srgb))
}

/// Multiply color channels by alpha.
pub fn premultiply_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = u16::from(px[3]);
        if a == 255 {
            continue;
        }
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        px[0] = mul_div255_u8(u16::from(px[0]), a);
        px[1] = mul_div255_u8(u16::from(px[1]), a);
        px[2] = mul_div255_u8(u16::from(px[2]), a);
    }
}

/// Divide color channels by alpha (rounded, clamped).
pub fn unpremultiply_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = u32::from(px[3]);
        if a == 255 || a == 0 {
            continue;
        }
        for c in &mut px[..3] {
            *c = ((u32::from(*c) * 255 + a / 2) / a).min(255) as u8;
        }
    }
}

/// Unpremultiply a single pixel.
pub(crate) fn unpremultiply_px(px: [u8; 4]) -> [u8; 4] {
    let mut out = px;
    unpremultiply_in_place(&mut out);
    out
}

/// Convert RGBA8 bytes between color spaces; alpha is untouched.
pub fn convert_bytes(rgba: &mut [u8], from: ColorSpace, to: ColorSpace, premultiplied: bool) {
    let lut = match (from, to) {
        (ColorSpace::Srgb, ColorSpace::LinearRgb) => srgb_to_linear_lut(),
        (ColorSpace::LinearRgb, ColorSpace::Srgb) => linear_to_srgb_lut(),
        _ => return,
    };
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3];
        if a == 0 {
            continue;
        }
        if premultiplied && a != 255 {
            let mut straight = unpremultiply_px([px[0], px[1], px[2], a]);
            for c in &mut straight[..3] {
                *c = lut[*c as usize];
            }
            premultiply_in_place(&mut straight);
            px.copy_from_slice(&straight);
        } else {
            for c in &mut px[..3] {
                *c = lut[*c as usize];
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/raster/color.rs"]
mod tests;
