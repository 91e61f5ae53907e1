use super::*;
use kurbo::Point;

fn approx_affine(a: Affine, b: Affine) -> bool {
    a.as_coeffs()
        .iter()
        .zip(b.as_coeffs().iter())
        .all(|(x, y)| (x - y).abs() < 1e-9)
}

#[test]
fn scale_translate_stays_in_stage() {
    let at = Affine::translate((3.5, -2.0)) * Affine::scale_non_uniform(2.0, 3.0);
    let s = decompose(at).unwrap();
    assert_eq!(s.sx, 2.0);
    assert_eq!(s.sy, 3.0);
    assert!(s.is_axis_aligned());
    assert_eq!(s.stage, at);
}

#[test]
fn rotation_goes_to_residual() {
    let at = Affine::translate((10.0, 5.0))
        * Affine::rotate(0.7)
        * Affine::scale_non_uniform(2.0, 0.5);
    let s = decompose(at).unwrap();
    assert!((s.sx - 2.0).abs() < 1e-9);
    assert!((s.sy - 0.5).abs() < 1e-9);
    assert!(!s.is_axis_aligned());
    assert!(approx_affine(s.residual * s.stage, at));
}

#[test]
fn shear_round_trips() {
    let at = Affine::new([1.0, 0.3, 0.8, 1.2, 4.0, 7.0]);
    let s = decompose(at).unwrap();
    assert!(approx_affine(s.residual * s.stage, at));
    let p = Point::new(3.0, -4.0);
    let direct = at * p;
    let split = s.residual * (s.stage * p);
    assert!((direct - split).hypot() < 1e-9);
}

#[test]
fn degenerate_transforms_do_not_split() {
    assert!(decompose(Affine::scale_non_uniform(0.0, 1.0)).is_none());
    assert!(decompose(Affine::new([f64::NAN, 0.0, 0.0, 1.0, 0.0, 0.0])).is_none());
}

#[test]
fn clamp_folds_excess_into_residual() {
    let at = Affine::translate((1.0, 2.0)) * Affine::scale(8.0);
    let s = decompose(at).unwrap().clamp_scale(2.0, 2.0);
    assert_eq!(s.sx, 2.0);
    assert_eq!(s.sy, 2.0);
    assert!(approx_affine(s.residual * s.stage, at));
    assert!(approx_affine(s.residual, Affine::translate((1.0, 2.0)) * Affine::scale(4.0)));
}

#[test]
fn clamp_below_limit_is_identity() {
    let at = Affine::scale(1.5);
    let s = decompose(at).unwrap();
    assert_eq!(s.clamp_scale(10.0, 10.0), s);
}
