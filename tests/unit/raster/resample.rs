use super::*;
use crate::foundation::core::Rgba8Premul;
use crate::raster::buffer::ColorModel;

fn solid(rect: PixelRect) -> Raster {
    Raster::filled(
        rect,
        ColorModel::default(),
        Rgba8Premul::from_straight_rgba(0, 0, 255, 255),
    )
}

#[test]
fn integer_translation_moves_without_filtering() {
    let src = solid(PixelRect::new(0, 0, 4, 4));
    let out = resample_affine(
        &src,
        Affine::translate((3.0, -2.0)),
        PixelRect::new(-100, -100, 200, 200),
        Interpolation::Bilinear,
    )
    .unwrap();
    assert_eq!(out.rect(), PixelRect::new(3, -2, 4, 4));
    assert_eq!(out.data(), src.data());
}

#[test]
fn translation_is_clipped() {
    let src = solid(PixelRect::new(0, 0, 4, 4));
    let out = resample_affine(
        &src,
        Affine::IDENTITY,
        PixelRect::new(2, 2, 10, 10),
        Interpolation::Nearest,
    )
    .unwrap();
    assert_eq!(out.rect(), PixelRect::new(2, 2, 2, 2));
    assert!(
        resample_affine(
            &src,
            Affine::IDENTITY,
            PixelRect::new(9, 9, 1, 1),
            Interpolation::Nearest
        )
        .is_none()
    );
}

#[test]
fn upscale_nearest_replicates_pixels() {
    let src = solid(PixelRect::new(0, 0, 2, 2));
    let out = resample_affine(
        &src,
        Affine::scale(2.0),
        PixelRect::new(0, 0, 100, 100),
        Interpolation::Nearest,
    )
    .unwrap();
    assert_eq!(out.rect(), PixelRect::new(0, 0, 4, 4));
    assert!(out.data().chunks_exact(4).all(|px| px == [0, 0, 255, 255]));
}

#[test]
fn rotation_keeps_interior_opaque() {
    let src = solid(PixelRect::new(0, 0, 8, 8));
    let at = Affine::translate((4.0, 4.0))
        * Affine::rotate(std::f64::consts::FRAC_PI_4)
        * Affine::translate((-4.0, -4.0));
    let out = resample_affine(
        &src,
        at,
        PixelRect::new(-20, -20, 40, 40),
        Interpolation::Bilinear,
    )
    .unwrap();
    assert_eq!(out.pixel(4, 4), [0, 0, 255, 255]);
    assert_eq!(out.pixel(-1, -1)[3], 0);
}

#[test]
fn singular_transform_yields_none() {
    let src = solid(PixelRect::new(0, 0, 2, 2));
    let out = resample_affine(
        &src,
        Affine::scale_non_uniform(1.0, 0.0),
        PixelRect::new(0, 0, 10, 10),
        Interpolation::Bilinear,
    );
    assert!(out.is_none());
}
