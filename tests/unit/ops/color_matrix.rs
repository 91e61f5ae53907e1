use super::*;
use crate::foundation::core::{Color, PixelRect};
use crate::graph::context::RenderHints;
use crate::ops::Flood;

const IDENTITY: [f32; 20] = [
    1.0, 0.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 0.0, 1.0, 0.0,
];

fn apply(kind: ColorMatrixKind, color: Color) -> Arc<Raster> {
    let src = Filter::leaf(
        Flood::new(Rect::new(0.0, 0.0, 2.0, 2.0), color)
            .unwrap()
            .into(),
    )
    .unwrap();
    let f = Filter::new(ColorMatrix::new(kind).unwrap().into(), vec![src]).unwrap();
    f.render(&RenderContext::identity()).unwrap().unwrap()
}

#[test]
fn identity_matrix_keeps_pixels() {
    let out = apply(ColorMatrixKind::Matrix(IDENTITY), Color::rgba(0.2, 0.4, 0.6, 0.5));
    let expected = Color::rgba(0.2, 0.4, 0.6, 0.5).to_premul(1.0).to_array();
    for (a, b) in out.pixel(0, 0).iter().zip(expected) {
        assert!(a.abs_diff(b) <= 1, "{a} vs {b}");
    }
    assert_eq!(out.rect(), PixelRect::new(0, 0, 2, 2));
}

#[test]
fn zero_saturation_is_gray() {
    let out = apply(ColorMatrixKind::Saturate(0.0), Color::rgb(1.0, 0.0, 0.0));
    let [r, g, b, a] = out.pixel(1, 1);
    assert_eq!(a, 255);
    assert_eq!(r, g);
    assert_eq!(g, b);
    assert_eq!(r, 54);
}

#[test]
fn luminance_to_alpha_clears_color() {
    let out = apply(ColorMatrixKind::LuminanceToAlpha, Color::WHITE);
    assert_eq!(out.pixel(0, 0), [0, 0, 0, 255]);
}

#[test]
fn hue_rotate_zero_is_nearly_identity() {
    let m = ColorMatrixKind::HueRotate(0.0).to_matrix();
    for (a, b) in m.iter().zip(IDENTITY) {
        assert!((a - b).abs() < 1e-3);
    }
    let full = ColorMatrixKind::HueRotate(360.0).to_matrix();
    for (a, b) in full.iter().zip(IDENTITY) {
        assert!((a - b).abs() < 1e-3);
    }
}

#[test]
fn offsets_are_in_unit_range() {
    let mut m = IDENTITY;
    m[4] = 1.0;
    let out = apply(ColorMatrixKind::Matrix(m), Color::rgb(0.0, 0.0, 0.0));
    assert_eq!(out.pixel(0, 0), [255, 0, 0, 255]);
}

#[test]
fn invalid_parameters_are_rejected() {
    assert!(ColorMatrix::new(ColorMatrixKind::Saturate(-0.5)).is_err());
    assert!(ColorMatrix::new(ColorMatrixKind::HueRotate(f32::INFINITY)).is_err());
    let mut m = IDENTITY;
    m[3] = f32::NAN;
    assert!(ColorMatrix::new(ColorMatrixKind::Matrix(m)).is_err());
}

#[test]
fn output_is_tagged_with_working_space() {
    let src = Filter::leaf(
        Flood::new(Rect::new(0.0, 0.0, 1.0, 1.0), Color::WHITE)
            .unwrap()
            .into(),
    )
    .unwrap();
    let op = ColorMatrix::new(ColorMatrixKind::Matrix(IDENTITY))
        .unwrap()
        .in_space(ColorSpace::LinearRgb);
    let f = Filter::new(op.into(), vec![src]).unwrap();
    assert!(f.capabilities().color_space_aware);
    let out = f.render(&RenderContext::identity()).unwrap().unwrap();
    assert_eq!(out.color_space(), ColorSpace::LinearRgb);

    let hints = RenderHints {
        color_space_override: Some(ColorSpace::Srgb),
        ..RenderHints::default()
    };
    let forced = f
        .render(&RenderContext::identity().with_hints(hints))
        .unwrap()
        .unwrap();
    assert_eq!(forced.color_space(), ColorSpace::Srgb);
}
