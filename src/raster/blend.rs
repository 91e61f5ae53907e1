use crate::foundation::math::mul_div255_u8;
use crate::raster::buffer::Raster;

/// Premultiplied RGBA8 pixel.
pub type PremulRgba8 = [u8; 4];

/// Source-over of two premultiplied pixels.
pub fn over(dst: PremulRgba8, src: PremulRgba8) -> PremulRgba8 {
    if src[3] == 0 {
        return dst;
    }
    if src[3] == 255 {
        return src;
    }
    let inv = 255u16 - u16::from(src[3]);
    let mut out = [0u8; 4];
    for i in 0..4 {
        let dc = mul_div255_u8(u16::from(dst[i]), inv);
        out[i] = src[i].saturating_add(dc);
    }
    out
}

/// Composite `src` over `dst` where the two rasters overlap.
pub fn over_in_place(dst: &mut Raster, src: &Raster) {
    let overlap = dst.rect().intersect(src.rect());
    for y in overlap.y..overlap.y1() {
        for x in overlap.x..overlap.x1() {
            let s = src.pixel(x, y);
            if s[3] == 0 {
                continue;
            }
            let d = dst.pixel(x, y);
            dst.set_pixel(x, y, over(d, s));
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/raster/blend.rs"]
mod tests;
