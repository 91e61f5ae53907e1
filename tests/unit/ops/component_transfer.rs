use super::*;
use crate::foundation::core::Color;
use crate::ops::Flood;

fn render(op: ComponentTransfer, color: Color) -> Arc<Raster> {
    let src = Filter::leaf(
        Flood::new(Rect::new(0.0, 0.0, 2.0, 2.0), color)
            .unwrap()
            .into(),
    )
    .unwrap();
    let f = Filter::new(op.into(), vec![src]).unwrap();
    f.render(&RenderContext::identity()).unwrap().unwrap()
}

#[test]
fn table_interpolates_between_values() {
    let f = TransferFunction::Table {
        values: vec![0.0, 1.0, 0.0],
    };
    assert_eq!(f.apply(0.0), 0.0);
    assert!((f.apply(0.25) - 0.5).abs() < 1e-6);
    assert_eq!(f.apply(0.5), 1.0);
    assert!((f.apply(1.0)).abs() < 1e-6);
}

#[test]
fn discrete_steps() {
    let f = TransferFunction::Discrete {
        values: vec![0.2, 0.8],
    };
    assert_eq!(f.apply(0.1), 0.2);
    assert_eq!(f.apply(0.49), 0.2);
    assert_eq!(f.apply(0.5), 0.8);
    assert_eq!(f.apply(1.0), 0.8);
}

#[test]
fn linear_and_gamma_clamp() {
    let lin = TransferFunction::Linear {
        slope: 2.0,
        intercept: 0.1,
    };
    assert!((lin.apply(0.2) - 0.5).abs() < 1e-6);
    assert_eq!(lin.apply(0.9), 1.0);
    let gamma = TransferFunction::Gamma {
        amplitude: 1.0,
        exponent: 2.0,
        offset: 0.0,
    };
    assert!((gamma.apply(0.5) - 0.25).abs() < 1e-6);
}

#[test]
fn empty_table_is_identity() {
    let f = TransferFunction::Table { values: vec![] };
    assert_eq!(f.apply(0.3), 0.3);
    assert!(f.is_identity());
}

#[test]
fn inverts_red_channel_only() {
    let invert = TransferFunction::Table {
        values: vec![1.0, 0.0],
    };
    let op = ComponentTransfer::new(
        invert,
        TransferFunction::Identity,
        TransferFunction::Identity,
        TransferFunction::Identity,
    )
    .unwrap();
    let out = render(op, Color::rgb(1.0, 0.0, 1.0));
    assert_eq!(out.pixel(0, 0), [0, 0, 255, 255]);
}

#[test]
fn alpha_function_scales_coverage() {
    let half = TransferFunction::Linear {
        slope: 0.5,
        intercept: 0.0,
    };
    let op = ComponentTransfer {
        a: half,
        ..ComponentTransfer::default()
    };
    let out = render(op, Color::WHITE);
    assert_eq!(out.pixel(1, 1), [128, 128, 128, 128]);
}

#[test]
fn non_finite_parameters_are_rejected() {
    let bad = TransferFunction::Gamma {
        amplitude: f32::NAN,
        exponent: 1.0,
        offset: 0.0,
    };
    assert!(
        ComponentTransfer::new(
            TransferFunction::Identity,
            bad,
            TransferFunction::Identity,
            TransferFunction::Identity
        )
        .is_err()
    );
}
