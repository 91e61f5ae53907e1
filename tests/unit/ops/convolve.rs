use super::*;
use crate::foundation::core::{Affine, Color};
use crate::ops::{Flood, ImageSource};
use crate::raster::buffer::ColorModel;

fn square() -> Filter {
    Filter::leaf(
        Flood::new(Rect::new(0.0, 0.0, 10.0, 10.0), Color::WHITE)
            .unwrap()
            .into(),
    )
    .unwrap()
}

fn ramp() -> Filter {
    let mut data = Vec::new();
    for _y in 0..3 {
        for x in 0..6u8 {
            data.extend_from_slice(&[x * 40, 0, 0, 255]);
        }
    }
    let raster = Raster::from_data(
        PixelRect::new(0, 0, 6, 3),
        ColorModel::premul(ColorSpace::Srgb),
        data,
    )
    .unwrap();
    Filter::leaf(ImageSource::at_origin(raster).into()).unwrap()
}

fn convolved(op: ConvolveMatrix, src: Filter) -> Filter {
    Filter::new(op.into(), vec![src]).unwrap()
}

fn box3() -> ConvolveMatrix {
    ConvolveMatrix::new((3, 3), vec![1.0; 9]).unwrap()
}

#[test]
fn identity_kernel_reproduces_source() {
    let mut k = vec![0.0; 9];
    k[4] = 1.0;
    let src = ramp();
    let plain = src.render(&RenderContext::identity()).unwrap().unwrap();
    let f = convolved(ConvolveMatrix::new((3, 3), k).unwrap(), src);
    let out = f.render(&RenderContext::identity()).unwrap().unwrap();
    assert_eq!(out.rect(), plain.rect());
    assert_eq!(out.data(), plain.data());
}

#[test]
fn duplicate_edges_keep_uniform_fill() {
    let f = convolved(box3(), square());
    let out = f.render(&RenderContext::identity()).unwrap().unwrap();
    assert_eq!(out.rect(), PixelRect::new(0, 0, 10, 10));
    assert!(out.data().iter().all(|&v| v == 255));
}

#[test]
fn zero_edges_darken_the_border() {
    let f = convolved(box3().with_edge_mode(EdgeMode::None), square());
    let out = f.render(&RenderContext::identity()).unwrap().unwrap();
    assert_eq!(out.pixel(0, 0), [113; 4]);
    assert_eq!(out.pixel(0, 5), [170; 4]);
    assert_eq!(out.pixel(5, 5), [255; 4]);
}

#[test]
fn target_shifts_the_sampling_window() {
    let op = ConvolveMatrix::new((3, 1), vec![1.0, 0.0, 0.0])
        .unwrap()
        .with_target(1, 0)
        .unwrap();
    let f = convolved(op, ramp());
    let out = f.render(&RenderContext::identity()).unwrap().unwrap();
    assert_eq!(out.pixel(0, 1)[0], 40);
    assert_eq!(out.pixel(4, 1)[0], 200);
    assert_eq!(out.pixel(5, 1)[0], 200);
}

#[test]
fn explicit_divisor_scales_the_result() {
    let mut k = vec![0.0; 9];
    k[4] = 1.0;
    let op = ConvolveMatrix::new((3, 3), k).unwrap().with_divisor(2.0).unwrap();
    let out = convolved(op, square())
        .render(&RenderContext::identity())
        .unwrap()
        .unwrap();
    assert_eq!(out.pixel(4, 4), [128; 4]);
}

#[test]
fn negative_weights_keep_alpha_above_color() {
    let op = ConvolveMatrix::new((3, 3), vec![0.0, -1.0, 0.0, -1.0, 4.0, -1.0, 0.0, -1.0, 0.0])
        .unwrap()
        .with_edge_mode(EdgeMode::None);
    let out = convolved(op, square())
        .render(&RenderContext::identity())
        .unwrap()
        .unwrap();
    assert_eq!(out.pixel(5, 5), [0; 4]);
    assert_eq!(out.pixel(0, 0), [255; 4]);
    for px in out.data().chunks_exact(4) {
        assert!(px[3] >= px[0] && px[3] >= px[1] && px[3] >= px[2]);
    }
}

#[test]
fn preserve_alpha_keeps_source_coverage() {
    let op = box3()
        .with_edge_mode(EdgeMode::None)
        .preserving_alpha(true);
    let out = convolved(op, square())
        .render(&RenderContext::identity())
        .unwrap()
        .unwrap();
    assert_eq!(out.pixel(0, 0)[3], 255);
    assert_eq!(out.pixel(5, 5), [255; 4]);
}

#[test]
fn nonzero_bias_fails_at_render() {
    let f = convolved(box3().with_bias(0.5).unwrap(), square());
    let err = f.render(&RenderContext::identity()).unwrap_err();
    assert!(matches!(err, FilterError::Unsupported(_)), "{err}");
}

#[test]
fn wrap_edges_fail_at_render() {
    let f = convolved(box3().with_edge_mode(EdgeMode::Wrap), square());
    let err = f.render(&RenderContext::identity()).unwrap_err();
    assert!(matches!(err, FilterError::Unsupported(_)), "{err}");
}

#[test]
fn construction_rejects_bad_parameters() {
    assert!(ConvolveMatrix::new((0, 3), vec![]).is_err());
    assert!(ConvolveMatrix::new((3, 3), vec![1.0; 8]).is_err());
    assert!(ConvolveMatrix::new((3, 3), vec![f32::NAN; 9]).is_err());
    assert!(box3().with_target(3, 0).is_err());
    assert!(box3().with_divisor(0.0).is_err());
    assert!(box3().with_kernel_unit_length(0.0, 1.0).is_err());
}

#[test]
fn kernel_unit_length_fixes_the_stage_scale() {
    let op = box3().with_kernel_unit_length(2.0, 2.0).unwrap();
    let f = convolved(op, square());
    let out = f
        .render(&RenderContext::new(Affine::scale(2.0)))
        .unwrap()
        .unwrap();
    assert_eq!(out.rect(), PixelRect::new(0, 0, 20, 20));
    assert_eq!(out.pixel(10, 10), [255; 4]);
}

#[test]
fn regions_grow_by_kernel_reach() {
    let op = ConvolveMatrix::new((5, 3), vec![1.0; 15]).unwrap();
    let f = convolved(op, square());
    assert_eq!(
        f.dependency_region(0, Rect::new(4.0, 4.0, 5.0, 5.0)).unwrap(),
        Some(Rect::new(2.0, 3.0, 7.0, 6.0))
    );
    assert_eq!(
        f.dirty_region(0, Rect::new(0.0, 0.0, 1.0, 1.0)).unwrap(),
        Some(Rect::new(0.0, 0.0, 3.0, 2.0))
    );
    assert!(f.dependency_region(1, Rect::new(0.0, 0.0, 1.0, 1.0)).is_err());
}
