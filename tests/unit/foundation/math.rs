use super::*;

#[test]
fn mul_div255_rounds_to_nearest() {
    assert_eq!(mul_div255_u8(255, 255), 255);
    assert_eq!(mul_div255_u8(128, 255), 128);
    assert_eq!(mul_div255_u8(0, 200), 0);
    assert_eq!(mul_div255_u8(1, 128), 1);
}

#[test]
fn fnv_is_order_sensitive_and_normalizes_signed_zero() {
    let mut a = Fnv1a64::new_default();
    a.write_u8(1);
    a.write_u8(2);
    let mut b = Fnv1a64::new_default();
    b.write_u8(2);
    b.write_u8(1);
    assert_ne!(a.finish(), b.finish());

    let mut z0 = Fnv1a64::new_default();
    z0.write_f64(0.0);
    let mut z1 = Fnv1a64::new_default();
    z1.write_f64(-0.0);
    assert_eq!(z0.finish(), z1.finish());
}

#[test]
fn float_quantization_clamps() {
    assert_eq!(unit_to_u8(1.5), 255);
    assert_eq!(unit_to_u8(-0.2), 0);
    assert_eq!(unit_to_u8(0.5), 128);
    assert_eq!(unit255_to_u8(f32::NAN), 0);
}

#[test]
fn scale_eq_is_relative() {
    assert!(scale_eq(2.0, 2.0 + 1e-9));
    assert!(!scale_eq(2.0, 2.01));
    assert!(scale_eq(1000.0, 1000.0005));
}
