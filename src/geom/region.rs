//! Rectangle algebra shared by bounds and region queries.

use crate::foundation::core::{Affine, PixelRect, Rect};

/// Return `true` when `r` covers no area (or is not finite).
pub fn is_empty(r: Rect) -> bool {
    !(r.width() > 0.0 && r.height() > 0.0)
}

/// Overlap of two rectangles; `None` when it has no area.
pub fn intersect(a: Rect, b: Rect) -> Option<Rect> {
    let r = a.intersect(b);
    if is_empty(r) { None } else { Some(r) }
}

/// Bounding rectangle of all non-empty inputs.
pub fn union_all(rects: impl IntoIterator<Item = Rect>) -> Rect {
    rects
        .into_iter()
        .filter(|r| !is_empty(*r))
        .reduce(|a, b| a.union(b))
        .unwrap_or(Rect::ZERO)
}

/// Intersection of all inputs; empty when any input is empty.
pub fn intersect_all(rects: impl IntoIterator<Item = Rect>) -> Rect {
    let mut it = rects.into_iter();
    let Some(first) = it.next() else {
        return Rect::ZERO;
    };
    it.try_fold(first, |acc, r| intersect(acc, r))
        .unwrap_or(Rect::ZERO)
}

/// Grow `r` by `dx`/`dy` on each side.
pub fn outset(r: Rect, dx: f64, dy: f64) -> Rect {
    Rect::new(r.x0 - dx, r.y0 - dy, r.x1 + dx, r.y1 + dy)
}

/// Return `true` when `at` maps axis-aligned rectangles to axis-aligned rectangles.
pub fn is_axis_aligned(at: Affine) -> bool {
    let [_, b, c, ..] = at.as_coeffs();
    b == 0.0 && c == 0.0
}

/// Device pixels covering `r` after `at`.
pub fn device_rect(at: Affine, r: Rect) -> PixelRect {
    PixelRect::covering(at.transform_rect_bbox(r))
}

/// Return `true` when `at` has finite coefficients and a usable inverse.
pub fn is_invertible(at: Affine) -> bool {
    let det = at.determinant();
    det.is_finite() && det.abs() >= 1e-12 && at.as_coeffs().iter().all(|v| v.is_finite())
}

/// User-space bounding box of the device rectangle `r` under the inverse of `at`.
///
/// Returns `None` for non-invertible transforms.
pub fn user_rect(at: Affine, r: PixelRect) -> Option<Rect> {
    if !is_invertible(at) {
        return None;
    }
    Some(at.inverse().transform_rect_bbox(r.to_rect()))
}

#[cfg(test)]
#[path = "../../tests/unit/geom/region.rs"]
mod tests;
