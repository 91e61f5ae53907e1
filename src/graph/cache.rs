use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use crate::foundation::math::scale_eq;
use crate::graph::node::NodeId;
use crate::raster::buffer::Raster;

/// Limits for a [`TileCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileCacheOpts {
    /// Maximum pixel bytes retained across all entries.
    pub max_bytes: usize,
    /// Maximum number of retained entries.
    pub max_entries: usize,
}

impl Default for TileCacheOpts {
    fn default() -> Self {
        Self {
            max_bytes: 64 * 1024 * 1024,
            max_entries: 256,
        }
    }
}

/// Counters describing cache behaviour since creation (or the last [`TileCache::clear`]).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TileCacheStats {
    /// Lookups that returned a raster.
    pub hits: u64,
    /// Lookups with no usable entry.
    pub misses: u64,
    /// Misses caused by a scale or timestamp mismatch on an existing entry.
    pub stale: u64,
    /// Rasters stored.
    pub insertions: u64,
    /// Entries dropped to honour the limits.
    pub evictions: u64,
    /// Entries currently held.
    pub retained_entries: usize,
    /// Pixel bytes currently held.
    pub retained_bytes: usize,
}

#[derive(Debug)]
struct Entry {
    scale: (f64, f64),
    timestamp: u64,
    context: u64,
    raster: Arc<Raster>,
    bytes: usize,
    last_used: u64,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<NodeId, Entry>,
    bytes: usize,
    tick: u64,
    stats: TileCacheStats,
}

/// Memory-bounded store of rendered rasters, one entry per node.
///
/// A lookup hits only when the stored scale matches the requested one and the node has not
/// been touched since the raster was stored. Entries may be evicted at any time (least recently
/// used first), so callers always keep a way to re-render. Concurrent writers for the same node
/// simply overwrite each other.
#[derive(Debug)]
pub struct TileCache {
    opts: TileCacheOpts,
    inner: Mutex<Inner>,
}

impl TileCache {
    /// Empty cache with the given limits.
    pub fn new(opts: TileCacheOpts) -> Self {
        Self {
            opts,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Process-wide cache used by contexts without an explicit one.
    pub fn shared() -> &'static TileCache {
        static SHARED: OnceLock<TileCache> = OnceLock::new();
        SHARED.get_or_init(|| TileCache::new(TileCacheOpts::default()))
    }

    /// Configured limits.
    pub fn opts(&self) -> TileCacheOpts {
        self.opts
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cached raster for `node` at `scale`, valid only for `timestamp`.
    pub fn get(&self, node: NodeId, scale: (f64, f64), timestamp: u64) -> Option<Arc<Raster>> {
        self.get_in(node, scale, timestamp, 0)
    }

    /// Like [`TileCache::get`], additionally requiring the entry to have been stored for the
    /// same render-context fingerprint.
    pub(crate) fn get_in(
        &self,
        node: NodeId,
        scale: (f64, f64),
        timestamp: u64,
        context: u64,
    ) -> Option<Arc<Raster>> {
        let mut inner = self.lock();
        inner.tick += 1;
        let tick = inner.tick;
        let found = match inner.entries.get_mut(&node) {
            Some(e)
                if e.timestamp == timestamp
                    && e.context == context
                    && scale_eq(e.scale.0, scale.0)
                    && scale_eq(e.scale.1, scale.1) =>
            {
                e.last_used = tick;
                Some(Ok(e.raster.clone()))
            }
            Some(_) => Some(Err(())),
            None => None,
        };
        match found {
            Some(Ok(r)) => {
                inner.stats.hits += 1;
                tracing::trace!(node = node.0, "tile cache hit");
                Some(r)
            }
            Some(Err(())) => {
                inner.stats.misses += 1;
                inner.stats.stale += 1;
                tracing::trace!(node = node.0, "tile cache stale entry");
                None
            }
            None => {
                inner.stats.misses += 1;
                None
            }
        }
    }

    /// Store `raster` as the entry for `node`, replacing any previous one.
    pub fn insert(&self, node: NodeId, scale: (f64, f64), timestamp: u64, raster: Arc<Raster>) {
        self.insert_in(node, scale, timestamp, 0, raster);
    }

    pub(crate) fn insert_in(
        &self,
        node: NodeId,
        scale: (f64, f64),
        timestamp: u64,
        context: u64,
        raster: Arc<Raster>,
    ) {
        let bytes = raster.data().len();
        let mut inner = self.lock();
        if let Some(old) = inner.entries.remove(&node) {
            inner.bytes = inner.bytes.saturating_sub(old.bytes);
        }
        if bytes > self.opts.max_bytes || self.opts.max_entries == 0 {
            tracing::debug!(node = node.0, bytes, "raster too large for tile cache");
            return;
        }
        inner.tick += 1;
        let last_used = inner.tick;
        inner.entries.insert(
            node,
            Entry {
                scale,
                timestamp,
                context,
                raster,
                bytes,
                last_used,
            },
        );
        inner.bytes = inner.bytes.saturating_add(bytes);
        inner.stats.insertions += 1;
        self.evict(&mut inner);
    }

    fn evict(&self, inner: &mut Inner) {
        while inner.bytes > self.opts.max_bytes || inner.entries.len() > self.opts.max_entries {
            let Some(victim) = inner
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(id, _)| *id)
            else {
                break;
            };
            if let Some(e) = inner.entries.remove(&victim) {
                inner.bytes = inner.bytes.saturating_sub(e.bytes);
                inner.stats.evictions += 1;
                tracing::debug!(node = victim.0, bytes = e.bytes, "tile cache eviction");
            }
        }
    }

    /// Drop the entry for `node`, if any.
    pub fn remove(&self, node: NodeId) {
        let mut inner = self.lock();
        if let Some(e) = inner.entries.remove(&node) {
            inner.bytes = inner.bytes.saturating_sub(e.bytes);
        }
    }

    /// Drop every entry and reset statistics.
    pub fn clear(&self) {
        *self.lock() = Inner::default();
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Return `true` when nothing is retained.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> TileCacheStats {
        let inner = self.lock();
        TileCacheStats {
            retained_entries: inner.entries.len(),
            retained_bytes: inner.bytes,
            ..inner.stats
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/graph/cache.rs"]
mod tests;
