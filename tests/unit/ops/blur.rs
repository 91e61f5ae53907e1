use super::*;
use crate::foundation::core::{Affine, Color, PixelRect};
use crate::graph::context::{Quality, RenderHints};
use crate::ops::Flood;

fn square() -> Filter {
    Filter::leaf(
        Flood::new(Rect::new(0.0, 0.0, 10.0, 10.0), Color::WHITE)
            .unwrap()
            .into(),
    )
    .unwrap()
}

fn blurred(sx: f64, sy: f64) -> Filter {
    Filter::new(GaussianBlur::new(sx, sy).unwrap().into(), vec![square()]).unwrap()
}

fn alpha_sum(r: &Raster) -> u64 {
    r.data().chunks_exact(4).map(|p| u64::from(p[3])).sum()
}

#[test]
fn zero_deviation_returns_source() {
    let src = square();
    let plain = src.render(&RenderContext::identity()).unwrap().unwrap();
    let f = Filter::new(GaussianBlur::new(0.0, 0.0).unwrap().into(), vec![src]).unwrap();
    let out = f.render(&RenderContext::identity()).unwrap().unwrap();
    assert_eq!(out.rect(), plain.rect());
    assert_eq!(out.data(), plain.data());
    assert_eq!(f.bounds(), Rect::new(0.0, 0.0, 10.0, 10.0));
}

#[test]
fn bounds_grow_by_three_deviations() {
    assert_eq!(blurred(1.0, 2.0).bounds(), Rect::new(-3.0, -6.0, 13.0, 16.0));
}

#[test]
fn negative_deviation_is_rejected() {
    assert!(GaussianBlur::new(-1.0, 0.0).is_err());
    assert!(GaussianBlur::new(1.0, f64::NAN).is_err());
}

#[test]
fn small_blur_is_symmetric_and_conserves_coverage() {
    let f = blurred(1.0, 1.0);
    let out = f.render(&RenderContext::identity()).unwrap().unwrap();
    assert_eq!(out.rect(), PixelRect::new(-3, -3, 16, 16));
    assert_eq!(out.pixel(5, 5)[3], 255);
    assert_eq!(out.pixel(-1, 5), out.pixel(10, 5));
    assert_eq!(out.pixel(5, -1), out.pixel(5, 10));
    assert!(out.pixel(-1, 5)[3] > 0);
    let sum = alpha_sum(&out) as f64;
    let expected = 100.0 * 255.0;
    assert!((sum - expected).abs() / expected < 0.02, "{sum}");
}

#[test]
fn box_approximation_conserves_coverage() {
    let f = blurred(3.0, 3.0);
    let out = f.render(&RenderContext::identity()).unwrap().unwrap();
    let sum = alpha_sum(&out) as f64;
    let expected = 100.0 * 255.0;
    assert!((sum - expected).abs() / expected < 0.03, "{sum}");
    assert!(out.pixel(5, 5)[3] > 170);
}

#[test]
fn quality_hint_selects_exact_kernel() {
    let f = blurred(3.0, 3.0);
    let hints = RenderHints {
        quality: Quality::Quality,
        ..RenderHints::default()
    };
    let fast = f.render(&RenderContext::identity()).unwrap().unwrap();
    let exact = f
        .render(&RenderContext::identity().with_hints(hints))
        .unwrap()
        .unwrap();
    assert_eq!(fast.rect(), exact.rect());
    assert_ne!(fast.data(), exact.data());
}

#[test]
fn large_blur_is_clamped_and_resampled() {
    let f = blurred(30.0, 30.0);
    let out = f.render(&RenderContext::identity()).unwrap().unwrap();
    assert_eq!(out.rect(), PixelRect::new(-90, -90, 190, 190));
    assert!(out.pixel(5, 5)[3] > 0);
}

#[test]
fn rotated_blur_matches_bounds() {
    let f = blurred(1.0, 1.0);
    let ctx = RenderContext::new(Affine::rotate(0.5));
    let out = f.render(&ctx).unwrap().unwrap();
    let expected = region::device_rect(ctx.transform(), f.bounds());
    assert!(expected.contains_rect(out.rect()));
}

#[test]
fn kernel_shapes() {
    assert_eq!(exact_radius(1.0), 3);
    assert_eq!(exact_radius(0.1), 0);
    let passes = axis_passes(3.0, false).unwrap();
    assert_eq!(passes.len(), 3);
    assert_eq!(passes[0].weights.len(), 6);
    assert_eq!(passes[2].weights.len(), 7);
    assert_eq!(total_reach(&passes), 8);
    let odd = axis_passes(3.5, false).unwrap();
    assert!(odd.iter().all(|k| k.weights.len() == 7 && k.center == 3));
    assert_eq!(total_reach(&odd), 9);
    let k = gaussian_kernel_q16(3, 1.0).unwrap();
    assert_eq!(k.iter().map(|&w| u64::from(w)).sum::<u64>(), 65536);
}

#[test]
fn dependency_grows_by_spread() {
    let f = blurred(1.0, 1.0);
    let dep = f.dependency_region(0, Rect::new(12.0, 0.0, 13.0, 1.0)).unwrap();
    assert_eq!(dep, Some(Rect::new(9.0, 0.0, 10.0, 4.0)));
    let dirty = f.dirty_region(0, Rect::new(0.0, 0.0, 1.0, 1.0)).unwrap();
    assert_eq!(dirty, Some(Rect::new(-3.0, -3.0, 4.0, 4.0)));
}
