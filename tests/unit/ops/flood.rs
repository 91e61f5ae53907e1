use super::*;
use crate::foundation::core::Affine;

#[test]
fn flood_fills_region_only() {
    let op = Flood::new(Rect::new(2.0, 2.0, 6.0, 5.0), Color::rgb(0.0, 0.0, 1.0)).unwrap();
    let f = Filter::leaf(op.into()).unwrap();
    let out = f.render(&RenderContext::identity()).unwrap().unwrap();
    assert_eq!(out.rect(), PixelRect::new(2, 2, 4, 3));
    assert!(out.data().chunks_exact(4).all(|px| px == [0, 0, 255, 255]));
}

#[test]
fn opacity_scales_alpha() {
    let mut op = Flood::new(Rect::new(0.0, 0.0, 1.0, 1.0), Color::WHITE).unwrap();
    op.opacity = 0.5;
    let f = Filter::leaf(op.into()).unwrap();
    let out = f.render(&RenderContext::identity()).unwrap().unwrap();
    assert_eq!(out.pixel(0, 0), [128, 128, 128, 128]);
}

#[test]
fn invalid_opacity_is_rejected() {
    let mut op = Flood::new(Rect::new(0.0, 0.0, 1.0, 1.0), Color::WHITE).unwrap();
    op.opacity = 1.5;
    assert!(Filter::leaf(op.into()).is_err());
}

#[test]
fn rotated_flood_is_resampled() {
    let op = Flood::new(Rect::new(0.0, 0.0, 10.0, 10.0), Color::WHITE).unwrap();
    let f = Filter::leaf(op.into()).unwrap();
    let ctx = RenderContext::new(Affine::rotate(std::f64::consts::FRAC_PI_4));
    let out = f.render(&ctx).unwrap().unwrap();
    assert_eq!(out.pixel(0, 5)[3], 255);
    assert_eq!(out.pixel(6, 1)[3], 0);
}

#[test]
fn empty_area_of_interest_is_null() {
    let op = Flood::new(Rect::new(0.0, 0.0, 4.0, 4.0), Color::WHITE).unwrap();
    let f = Filter::leaf(op.into()).unwrap();
    let ctx = RenderContext::identity().with_area_of_interest(Rect::new(1.0, 1.0, 1.0, 3.0));
    assert!(f.render(&ctx).unwrap().is_none());
}
