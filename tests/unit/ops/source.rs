use super::*;
use crate::foundation::core::ColorSpace;
use crate::raster::surface::RasterSurface;

fn gradient(w: u32, h: u32) -> Raster {
    let mut data = Vec::new();
    for y in 0..h {
        for x in 0..w {
            data.extend_from_slice(&[(x * 20) as u8, (y * 20) as u8, 0, 255]);
        }
    }
    Raster::from_data(
        PixelRect::new(0, 0, w, h),
        ColorModel::premul(ColorSpace::Srgb),
        data,
    )
    .unwrap()
}

#[test]
fn image_at_origin_renders_pixels_exactly() {
    let img = gradient(5, 4);
    let f = Filter::leaf(ImageSource::at_origin(img.clone()).into()).unwrap();
    let out = f.render(&RenderContext::identity()).unwrap().unwrap();
    assert_eq!(out.as_ref(), &img);
}

#[test]
fn image_translation_moves_origin() {
    let img = gradient(3, 3);
    let f = Filter::leaf(ImageSource::at_origin(img.clone()).into()).unwrap();
    let ctx = RenderContext::new(Affine::translate((10.0, 20.0)));
    let out = f.render(&ctx).unwrap().unwrap();
    assert_eq!(out.rect(), PixelRect::new(10, 20, 3, 3));
    assert_eq!(out.data(), img.data());
}

#[test]
fn image_placement_scales_raster() {
    let img = gradient(2, 2);
    let op = ImageSource::new(img, Rect::new(0.0, 0.0, 4.0, 4.0)).unwrap();
    let f = Filter::leaf(op.into()).unwrap();
    assert_eq!(f.bounds(), Rect::new(0.0, 0.0, 4.0, 4.0));
    let out = f.render(&RenderContext::identity()).unwrap().unwrap();
    assert_eq!(out.rect(), PixelRect::new(0, 0, 4, 4));
}

#[test]
fn disjoint_area_of_interest_renders_nothing() {
    let f = Filter::leaf(ImageSource::at_origin(gradient(2, 2)).into()).unwrap();
    let ctx = RenderContext::identity().with_area_of_interest(Rect::new(50.0, 50.0, 60.0, 60.0));
    assert!(f.render(&ctx).unwrap().is_none());
}

#[test]
fn rect_paint_coverage_is_anti_aliased() {
    let paint = RectPaint {
        rect: Rect::new(0.0, 0.0, 2.0, 1.5),
        color: Color::rgb(1.0, 0.0, 0.0),
    };
    let mut target = Raster::transparent(PixelRect::new(0, 0, 3, 3), ColorModel::default());
    paint.paint(&mut target, Affine::IDENTITY).unwrap();
    assert_eq!(target.pixel(0, 0), [255, 0, 0, 255]);
    assert_eq!(target.pixel(1, 1), [128, 0, 0, 128]);
    assert_eq!(target.pixel(2, 0)[3], 0);
}

#[test]
fn paint_leaf_renders_through_transform() {
    let painter = Arc::new(RectPaint {
        rect: Rect::new(0.0, 0.0, 2.0, 2.0),
        color: Color::rgb(0.0, 1.0, 0.0),
    });
    let f = Filter::leaf(PaintLeaf::new(painter).into()).unwrap();
    let out = f
        .render(&RenderContext::new(Affine::scale(2.0)))
        .unwrap()
        .unwrap();
    assert_eq!(out.rect(), PixelRect::new(0, 0, 4, 4));
    assert!(out.data().chunks_exact(4).all(|px| px == [0, 255, 0, 255]));
    assert!(f.capabilities().direct_paint);
}

#[test]
fn paint_leaf_direct_paint_needs_src_over() {
    let painter = Arc::new(RectPaint {
        rect: Rect::new(0.0, 0.0, 1.0, 1.0),
        color: Color::WHITE,
    });
    let f = Filter::leaf(PaintLeaf::new(painter).into()).unwrap();
    let mut surface = RasterSurface::new(PixelRect::new(0, 0, 2, 2));
    assert!(f.paint_direct(&mut surface).unwrap());
    assert_eq!(surface.raster().pixel(0, 0), [255, 255, 255, 255]);

    surface.set_composite_mode(SurfaceCompositeMode::Copy);
    assert!(!f.paint_direct(&mut surface).unwrap());
}
