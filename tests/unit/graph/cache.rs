use super::*;
use crate::foundation::core::PixelRect;
use crate::raster::buffer::ColorModel;

fn raster(w: u32, h: u32) -> Arc<Raster> {
    Arc::new(Raster::transparent(
        PixelRect::new(0, 0, w, h),
        ColorModel::default(),
    ))
}

#[test]
fn hit_requires_matching_scale_and_timestamp() {
    let cache = TileCache::new(TileCacheOpts::default());
    let id = NodeId(1);
    cache.insert(id, (2.0, 2.0), 7, raster(2, 2));

    assert!(cache.get(id, (2.0, 2.0), 7).is_some());
    assert!(cache.get(id, (2.0 + 1e-9, 2.0), 7).is_some());
    assert!(cache.get(id, (3.0, 2.0), 7).is_none());
    assert!(cache.get(id, (2.0, 2.0), 8).is_none());
    assert!(cache.get(NodeId(2), (2.0, 2.0), 7).is_none());

    let stats = cache.stats();
    assert_eq!(stats.hits, 2);
    assert_eq!(stats.misses, 3);
    assert_eq!(stats.stale, 2);
}

#[test]
fn later_writer_replaces_entry() {
    let cache = TileCache::new(TileCacheOpts::default());
    let id = NodeId(1);
    cache.insert(id, (1.0, 1.0), 1, raster(1, 1));
    cache.insert(id, (2.0, 2.0), 1, raster(2, 2));
    assert_eq!(cache.len(), 1);
    assert!(cache.get(id, (1.0, 1.0), 1).is_none());
    assert_eq!(cache.get(id, (2.0, 2.0), 1).unwrap().width(), 2);
    assert_eq!(cache.stats().retained_bytes, 16);
}

#[test]
fn evicts_least_recently_used_by_count() {
    let cache = TileCache::new(TileCacheOpts {
        max_bytes: usize::MAX,
        max_entries: 2,
    });
    cache.insert(NodeId(1), (1.0, 1.0), 1, raster(1, 1));
    cache.insert(NodeId(2), (1.0, 1.0), 1, raster(1, 1));
    assert!(cache.get(NodeId(1), (1.0, 1.0), 1).is_some());
    cache.insert(NodeId(3), (1.0, 1.0), 1, raster(1, 1));

    assert_eq!(cache.len(), 2);
    assert!(cache.get(NodeId(1), (1.0, 1.0), 1).is_some());
    assert!(cache.get(NodeId(2), (1.0, 1.0), 1).is_none());
    assert_eq!(cache.stats().evictions, 1);
}

#[test]
fn evicts_by_bytes_and_skips_oversized() {
    let cache = TileCache::new(TileCacheOpts {
        max_bytes: 20,
        max_entries: 16,
    });
    cache.insert(NodeId(1), (1.0, 1.0), 1, raster(2, 2));
    cache.insert(NodeId(2), (1.0, 1.0), 1, raster(2, 2));
    assert_eq!(cache.len(), 1);
    assert!(cache.get(NodeId(2), (1.0, 1.0), 1).is_some());

    cache.insert(NodeId(3), (1.0, 1.0), 1, raster(4, 4));
    assert!(cache.get(NodeId(3), (1.0, 1.0), 1).is_none());
    assert!(cache.stats().retained_bytes <= 20);
}

#[test]
fn clear_resets_everything() {
    let cache = TileCache::new(TileCacheOpts::default());
    cache.insert(NodeId(1), (1.0, 1.0), 1, raster(1, 1));
    cache.clear();
    assert!(cache.is_empty());
    assert_eq!(cache.stats(), TileCacheStats::default());
}

#[test]
fn context_fingerprint_must_match() {
    let cache = TileCache::new(TileCacheOpts::default());
    let id = NodeId(3);
    cache.insert_in(id, (1.0, 1.0), 4, 11, raster(2, 2));
    assert!(cache.get_in(id, (1.0, 1.0), 4, 11).is_some());
    assert!(cache.get_in(id, (1.0, 1.0), 4, 12).is_none());
    assert!(cache.get(id, (1.0, 1.0), 4).is_none());
    assert_eq!(cache.stats().stale, 2);
}
