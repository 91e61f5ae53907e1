use super::*;

#[test]
fn luts_fix_endpoints_and_darken_midtones() {
    let to_lin = srgb_to_linear_lut();
    let to_srgb = linear_to_srgb_lut();
    assert_eq!(to_lin[0], 0);
    assert_eq!(to_lin[255], 255);
    assert_eq!(to_srgb[0], 0);
    assert_eq!(to_srgb[255], 255);
    assert!(to_lin[128] < 128);
    assert!(to_srgb[128] > 128);
}

#[test]
fn premultiply_then_unpremultiply_is_close() {
    let mut px = vec![200u8, 100, 50, 128];
    premultiply_in_place(&mut px);
    assert_eq!(px[3], 128);
    unpremultiply_in_place(&mut px);
    assert!((i32::from(px[0]) - 200).abs() <= 1);
    assert!((i32::from(px[1]) - 100).abs() <= 1);
    assert!((i32::from(px[2]) - 50).abs() <= 1);
}

#[test]
fn transparent_pixels_clear_color() {
    let mut px = vec![9u8, 9, 9, 0];
    premultiply_in_place(&mut px);
    assert_eq!(px, vec![0, 0, 0, 0]);
}

#[test]
fn convert_same_space_is_noop() {
    let mut px = vec![10u8, 20, 30, 255];
    convert_bytes(&mut px, ColorSpace::Srgb, ColorSpace::Srgb, true);
    assert_eq!(px, vec![10, 20, 30, 255]);
}
