use super::*;
use crate::foundation::core::Rgba8Premul;

#[derive(Debug)]
struct Dot;

impl PaintSource for Dot {
    fn bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, 1.0, 1.0)
    }

    fn paint(&self, target: &mut Raster, transform: Affine) -> FilterResult<()> {
        let p = transform * kurbo::Point::new(0.5, 0.5);
        target.set_pixel(p.x.floor() as i32, p.y.floor() as i32, [255, 255, 255, 255]);
        Ok(())
    }
}

fn red(rect: PixelRect) -> Raster {
    Raster::filled(
        rect,
        ColorModel::default(),
        Rgba8Premul::from_straight_rgba(255, 0, 0, 255),
    )
}

#[test]
fn draw_raster_respects_clip_stack() {
    let mut s = RasterSurface::new(PixelRect::new(0, 0, 8, 8));
    s.push_clip(Rect::new(2.0, 2.0, 4.0, 4.0));
    s.draw_raster(&red(PixelRect::new(0, 0, 8, 8))).unwrap();
    s.pop_clip();
    assert_eq!(s.raster().pixel(1, 1)[3], 0);
    assert_eq!(s.raster().pixel(2, 2), [255, 0, 0, 255]);
    assert_eq!(s.raster().pixel(4, 4)[3], 0);
    assert_eq!(s.clip_bounds(), PixelRect::new(0, 0, 8, 8));
}

#[test]
fn pop_never_drops_base_clip() {
    let mut s = RasterSurface::new(PixelRect::new(0, 0, 4, 4));
    s.pop_clip();
    s.pop_clip();
    assert_eq!(s.clip_bounds(), PixelRect::new(0, 0, 4, 4));
}

#[test]
fn copy_mode_replaces_pixels() {
    let mut s = RasterSurface::new(PixelRect::new(0, 0, 2, 2));
    s.draw_raster(&red(PixelRect::new(0, 0, 2, 2))).unwrap();
    s.set_composite_mode(SurfaceCompositeMode::Copy);
    s.draw_raster(&Raster::transparent(
        PixelRect::new(0, 0, 1, 1),
        ColorModel::default(),
    ))
    .unwrap();
    assert_eq!(s.raster().pixel(0, 0), [0, 0, 0, 0]);
    assert_eq!(s.raster().pixel(1, 1), [255, 0, 0, 255]);
}

#[test]
fn draw_paint_uses_current_transform() {
    let mut s = RasterSurface::new(PixelRect::new(0, 0, 8, 8)).with_transform(Affine::translate((5.0, 3.0)));
    s.draw_paint(&Dot).unwrap();
    assert_eq!(s.raster().pixel(5, 3), [255, 255, 255, 255]);
    assert_eq!(s.raster().pixel(0, 0)[3], 0);
}
