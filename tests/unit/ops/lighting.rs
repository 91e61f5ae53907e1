use super::*;
use crate::ops::{Flood, ImageSource};

fn square() -> Filter {
    Filter::leaf(
        Flood::new(Rect::new(0.0, 0.0, 10.0, 10.0), Color::WHITE)
            .unwrap()
            .into(),
    )
    .unwrap()
}

/// Alpha rising by 30 per pixel along x.
fn slope() -> Filter {
    let mut data = Vec::new();
    for _y in 0..3 {
        for x in 0..8u8 {
            data.extend_from_slice(&[0, 0, 0, x * 30]);
        }
    }
    let raster = Raster::from_data(
        PixelRect::new(0, 0, 8, 3),
        ColorModel::premul(ColorSpace::Srgb),
        data,
    )
    .unwrap();
    Filter::leaf(ImageSource::at_origin(raster).into()).unwrap()
}

fn lit(op: impl Into<crate::ops::Operator>, src: Filter) -> Arc<Raster> {
    Filter::new(op.into(), vec![src])
        .unwrap()
        .render(&RenderContext::identity())
        .unwrap()
        .unwrap()
}

#[test]
fn overhead_light_on_flat_surface_is_full_color() {
    let out = lit(DiffuseLighting::new(Light::distant(0.0, 90.0)).unwrap(), square());
    assert_eq!(out.rect(), PixelRect::new(0, 0, 10, 10));
    assert!(out.data().iter().all(|&v| v == 255));
}

#[test]
fn grazing_light_on_flat_surface_is_opaque_black() {
    let out = lit(DiffuseLighting::new(Light::distant(0.0, 0.0)).unwrap(), square());
    assert_eq!(out.pixel(5, 5), [0, 0, 0, 255]);
    assert_eq!(out.pixel(0, 9), [0, 0, 0, 255]);
}

#[test]
fn diffuse_constant_scales_intensity() {
    let op = DiffuseLighting::new(Light::distant(0.0, 90.0))
        .unwrap()
        .with_diffuse_constant(0.5)
        .unwrap();
    assert_eq!(lit(op, square()).pixel(3, 3), [128, 128, 128, 255]);
}

#[test]
fn slope_faces_the_light_it_tilts_toward() {
    let from_left = lit(DiffuseLighting::new(Light::distant(180.0, 0.0)).unwrap(), slope());
    let from_right = lit(DiffuseLighting::new(Light::distant(0.0, 0.0)).unwrap(), slope());
    assert!(from_left.pixel(4, 1)[0] > 40, "{:?}", from_left.pixel(4, 1));
    assert_eq!(from_right.pixel(4, 1), [0, 0, 0, 255]);
}

#[test]
fn point_light_is_brightest_beneath_it() {
    let out = lit(DiffuseLighting::new(Light::point(5.0, 5.0, 10.0)).unwrap(), square());
    assert!(out.pixel(5, 5)[0] > out.pixel(0, 0)[0]);
    assert_eq!(out.pixel(0, 0)[3], 255);
}

#[test]
fn spot_cone_excludes_points_outside_it() {
    let away = Light::Spot {
        x: 5.0,
        y: 5.0,
        z: 10.0,
        points_at: (100.0, 100.0, 0.0),
        specular_exponent: 1.0,
        limiting_cone_angle: Some(5.0),
    };
    let out = lit(DiffuseLighting::new(away).unwrap(), square());
    assert_eq!(out.pixel(5, 5), [0, 0, 0, 255]);

    let down = Light::Spot {
        x: 5.0,
        y: 5.0,
        z: 10.0,
        points_at: (5.0, 5.0, 0.0),
        specular_exponent: 1.0,
        limiting_cone_angle: None,
    };
    let out = lit(DiffuseLighting::new(down).unwrap(), square());
    assert!(out.pixel(5, 5)[0] > 240);
}

#[test]
fn light_color_tints_the_result() {
    let op = DiffuseLighting::new(Light::distant(0.0, 90.0))
        .unwrap()
        .with_color(Color::rgb(1.0, 0.0, 0.0));
    assert_eq!(lit(op, square()).pixel(2, 2), [255, 0, 0, 255]);
}

#[test]
fn linear_space_converts_the_light_color() {
    let op = DiffuseLighting::new(Light::distant(0.0, 90.0))
        .unwrap()
        .with_color(Color::rgb(0.5, 0.5, 0.5))
        .in_space(ColorSpace::LinearRgb);
    let out = lit(op, square());
    assert_eq!(out.color_space(), ColorSpace::LinearRgb);
    assert_eq!(out.pixel(2, 2), [55, 55, 55, 255]);
}

#[test]
fn specular_alpha_is_brightest_channel() {
    let top = lit(SpecularLighting::new(Light::distant(0.0, 90.0)).unwrap(), square());
    assert_eq!(top.pixel(4, 4), [255; 4]);

    let side = lit(SpecularLighting::new(Light::distant(0.0, 0.0)).unwrap(), square());
    assert_eq!(side.pixel(4, 4), [127, 127, 127, 180]);
}

#[test]
fn kernel_unit_length_keeps_device_extent() {
    let op = DiffuseLighting::new(Light::distant(0.0, 90.0))
        .unwrap()
        .with_kernel_unit_length(2.0, 2.0)
        .unwrap();
    let out = lit(op, square());
    assert_eq!(out.rect(), PixelRect::new(0, 0, 10, 10));
    assert_eq!(out.pixel(5, 5), [255; 4]);
}

#[test]
fn invalid_parameters_are_rejected() {
    let light = Light::distant(0.0, 45.0);
    assert!(DiffuseLighting::new(Light::point(f64::NAN, 0.0, 1.0)).is_err());
    assert!(
        DiffuseLighting::new(light)
            .unwrap()
            .with_diffuse_constant(-1.0)
            .is_err()
    );
    assert!(
        DiffuseLighting::new(light)
            .unwrap()
            .with_surface_scale(f64::INFINITY)
            .is_err()
    );
    assert!(
        SpecularLighting::new(light)
            .unwrap()
            .with_specular(1.0, 0.5)
            .is_err()
    );
    assert!(
        SpecularLighting::new(light)
            .unwrap()
            .with_kernel_unit_length(0.0, 1.0)
            .is_err()
    );
}

#[test]
fn regions_grow_by_one_kernel_unit() {
    let f = Filter::new(
        DiffuseLighting::new(Light::distant(0.0, 45.0)).unwrap().into(),
        vec![square()],
    )
    .unwrap();
    assert_eq!(
        f.dependency_region(0, Rect::new(4.0, 4.0, 5.0, 5.0)).unwrap(),
        Some(Rect::new(3.0, 3.0, 6.0, 6.0))
    );
    assert_eq!(f.bounds(), Rect::new(0.0, 0.0, 10.0, 10.0));
}

#[test]
fn light_descriptions_deserialize() {
    let l: Light =
        serde_json::from_str(r#"{"type":"spot","x":1,"y":2,"z":3,"points_at":[0,0,0]}"#).unwrap();
    assert_eq!(
        l,
        Light::Spot {
            x: 1.0,
            y: 2.0,
            z: 3.0,
            points_at: (0.0, 0.0, 0.0),
            specular_exponent: 1.0,
            limiting_cone_angle: None,
        }
    );
}
