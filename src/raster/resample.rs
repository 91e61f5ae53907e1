use rayon::prelude::*;

use crate::foundation::core::{Affine, PixelRect, Point};
use crate::raster::buffer::Raster;

/// Pixel reconstruction filter used when a raster is resampled through an affine transform.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    /// Nearest neighbour.
    Nearest,
    /// Bilinear filtering of premultiplied pixels.
    #[default]
    Bilinear,
}

const INT_EPS: f64 = 1e-9;

/// If `at` is a pure integer translation, return it.
pub(crate) fn integer_translation(at: Affine) -> Option<(i32, i32)> {
    let [a, b, c, d, e, f] = at.as_coeffs();
    let near = |v: f64, t: f64| (v - t).abs() <= INT_EPS;
    if !(near(a, 1.0) && near(b, 0.0) && near(c, 0.0) && near(d, 1.0)) {
        return None;
    }
    let (re, rf) = (e.round(), f.round());
    let lim = f64::from(i32::MAX / 2);
    if !near(e, re) || !near(f, rf) || re.abs() > lim || rf.abs() > lim {
        return None;
    }
    Some((re as i32, rf as i32))
}

/// Resample `src` (pixels in its own device grid) through `at` into a new raster clipped to
/// `clip`.
///
/// Integer translations move the raster without filtering. Returns `None` when the result is
/// empty or `at` is not invertible.
pub fn resample_affine(
    src: &Raster,
    at: Affine,
    clip: PixelRect,
    interp: Interpolation,
) -> Option<Raster> {
    if let Some((dx, dy)) = integer_translation(at) {
        let moved = src.rect().translate(dx, dy);
        let out_rect = moved.intersect(clip);
        if out_rect.is_empty() {
            return None;
        }
        let shifted = src.clone().with_origin(moved.x, moved.y);
        return shifted.resized_to(out_rect);
    }

    let det = at.determinant();
    if !det.is_finite() || det.abs() < 1e-12 {
        return None;
    }
    let out_rect =
        PixelRect::covering(at.transform_rect_bbox(src.rect().to_rect())).intersect(clip);
    if out_rect.is_empty() {
        return None;
    }
    let inv = at.inverse();
    let mut out = Raster::transparent(out_rect, src.model());
    let row_bytes = out_rect.width as usize * 4;
    out.data_mut()
        .par_chunks_mut(row_bytes)
        .enumerate()
        .for_each(|(ly, row)| {
            let y = f64::from(out_rect.y) + ly as f64 + 0.5;
            for (lx, px) in row.chunks_exact_mut(4).enumerate() {
                let x = f64::from(out_rect.x) + lx as f64 + 0.5;
                let p = inv * Point::new(x, y);
                let v = match interp {
                    Interpolation::Nearest => src.pixel(p.x.floor() as i32, p.y.floor() as i32),
                    Interpolation::Bilinear => sample_bilinear(src, p.x - 0.5, p.y - 0.5),
                };
                px.copy_from_slice(&v);
            }
        });
    Some(out)
}

/// Bilinear sample at continuous pixel coordinate `(u, v)` (pixel centers at integers).
pub(crate) fn sample_bilinear(src: &Raster, u: f64, v: f64) -> [u8; 4] {
    if !u.is_finite() || !v.is_finite() {
        return [0; 4];
    }
    let x0 = u.floor();
    let y0 = v.floor();
    let fx = (u - x0) as f32;
    let fy = (v - y0) as f32;
    let (x0, y0) = (x0 as i32, y0 as i32);
    let p00 = src.pixel(x0, y0);
    let p10 = src.pixel(x0 + 1, y0);
    let p01 = src.pixel(x0, y0 + 1);
    let p11 = src.pixel(x0 + 1, y0 + 1);
    let mut out = [0u8; 4];
    for c in 0..4 {
        let top = f32::from(p00[c]) * (1.0 - fx) + f32::from(p10[c]) * fx;
        let bot = f32::from(p01[c]) * (1.0 - fx) + f32::from(p11[c]) * fx;
        out[c] = (top * (1.0 - fy) + bot * fy).round().clamp(0.0, 255.0) as u8;
    }
    // Premultiplied invariant: color never exceeds alpha.
    for c in 0..3 {
        out[c] = out[c].min(out[3]);
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/raster/resample.rs"]
mod tests;
