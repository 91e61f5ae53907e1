use super::*;
use crate::graph::cache::{TileCache, TileCacheOpts};
use crate::ops::ImageSource;
use crate::raster::buffer::ColorModel;

fn gradient(w: u32, h: u32) -> Filter {
    let mut data = Vec::new();
    for y in 0..h {
        for x in 0..w {
            data.extend_from_slice(&[(x * 40) as u8, (y * 40) as u8, 7, 255]);
        }
    }
    let raster = Raster::from_data(PixelRect::new(0, 0, w, h), ColorModel::default(), data).unwrap();
    Filter::leaf(ImageSource::at_origin(raster).into()).unwrap()
}

fn tile(src: Filter, op: Tile) -> Filter {
    Filter::new(op.into(), vec![src]).unwrap()
}

#[test]
fn four_by_four_tile_repeats_exactly() {
    let src = gradient(4, 4);
    let cell = src.render(&RenderContext::identity()).unwrap().unwrap();
    let op = Tile::new(Rect::new(0.0, 0.0, 4.0, 4.0), Rect::new(0.0, 0.0, 16.0, 16.0)).unwrap();
    let f = tile(src, op);
    let out = f.render(&RenderContext::identity()).unwrap().unwrap();
    assert_eq!(out.rect(), PixelRect::new(0, 0, 16, 16));
    for y in 0..16 {
        for x in 0..16 {
            assert_eq!(out.pixel(x, y), cell.pixel(x % 4, y % 4), "pixel ({x}, {y})");
        }
    }
}

#[test]
fn cell_is_clipped_to_tile_region() {
    let src = gradient(8, 8);
    let op = Tile::new(Rect::new(2.0, 2.0, 4.0, 4.0), Rect::new(0.0, 0.0, 8.0, 8.0)).unwrap();
    let f = tile(src.clone(), op);
    let out = f.render(&RenderContext::identity()).unwrap().unwrap();
    let plain = src.render(&RenderContext::identity()).unwrap().unwrap();
    assert_eq!(out.pixel(2, 2), plain.pixel(2, 2));
    assert_eq!(out.pixel(0, 0), plain.pixel(2, 2));
    assert_eq!(out.pixel(1, 0), plain.pixel(3, 2));
    assert_eq!(out.pixel(5, 7), plain.pixel(3, 3));
}

#[test]
fn overflow_wraps_into_cell() {
    let src = gradient(6, 1);
    let plain = src.render(&RenderContext::identity()).unwrap().unwrap();
    let op = Tile::new(Rect::new(0.0, 0.0, 4.0, 1.0), Rect::new(0.0, 0.0, 8.0, 1.0))
        .unwrap()
        .with_overflow(true);
    let f = tile(src, op);
    let out = f.render(&RenderContext::identity()).unwrap().unwrap();
    assert_eq!(out.pixel(0, 0), plain.pixel(4, 0));
    assert_eq!(out.pixel(1, 0), plain.pixel(5, 0));
    assert_eq!(out.pixel(2, 0), plain.pixel(2, 0));
    assert_eq!(out.pixel(5, 0), plain.pixel(5, 0));
}

#[test]
fn pattern_is_cached_by_scale() {
    let cache = Arc::new(TileCache::new(TileCacheOpts::default()));
    let op = Tile::new(Rect::new(0.0, 0.0, 4.0, 4.0), Rect::new(0.0, 0.0, 16.0, 16.0)).unwrap();
    let f = tile(gradient(4, 4), op);
    let ctx = RenderContext::identity().with_tile_cache(cache.clone());
    f.render(&ctx).unwrap().unwrap();
    f.render(&ctx).unwrap().unwrap();
    assert_eq!(cache.stats().hits, 1);
    assert_eq!(cache.stats().insertions, 1);

    f.render(&ctx.with_transform(Affine::scale(2.0))).unwrap().unwrap();
    assert_eq!(cache.stats().insertions, 2);
}

#[test]
fn cell_snaps_to_whole_pixels() {
    let grid = CellGrid::new(Rect::new(0.5, 0.0, 3.5, 3.0), 1.5, 1.0).unwrap();
    assert_eq!(grid.cell, PixelRect::new(0, 0, 5, 3));
    let (tsx, _) = grid.scale;
    assert!((tsx - 5.0 / 3.0).abs() < 1e-12);
    let origin = grid.tile_at * crate::foundation::core::Point::new(0.5, 0.0);
    assert!(origin.x.abs() < 1e-12);
}

#[test]
fn regions_cover_whole_cell() {
    let op = Tile::new(Rect::new(0.0, 0.0, 4.0, 4.0), Rect::new(0.0, 0.0, 16.0, 16.0)).unwrap();
    let f = tile(gradient(8, 8), op);
    let dep = f.dependency_region(0, Rect::new(12.0, 12.0, 13.0, 13.0)).unwrap();
    assert_eq!(dep, Some(Rect::new(0.0, 0.0, 4.0, 4.0)));
    let dirty = f.dirty_region(0, Rect::new(1.0, 1.0, 2.0, 2.0)).unwrap();
    assert_eq!(dirty, Some(Rect::new(0.0, 0.0, 16.0, 16.0)));
    assert_eq!(f.dirty_region(0, Rect::new(6.0, 6.0, 7.0, 7.0)).unwrap(), None);
}

#[test]
fn empty_tile_region_is_rejected() {
    assert!(Tile::new(Rect::new(0.0, 0.0, 0.0, 4.0), Rect::new(0.0, 0.0, 4.0, 4.0)).is_err());
}
