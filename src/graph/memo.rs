use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::graph::node::NodeId;
use crate::raster::buffer::Raster;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct MemoKey {
    pub(crate) node: NodeId,
    pub(crate) context: u64,
    pub(crate) timestamp: u64,
}

/// Results of one top-level render call, so a node shared by several branches renders once.
#[derive(Debug, Default)]
pub(crate) struct RenderMemo {
    entries: Mutex<HashMap<MemoKey, Option<Arc<Raster>>>>,
    hits: AtomicU64,
}

impl RenderMemo {
    pub(crate) fn get(&self, key: &MemoKey) -> Option<Option<Arc<Raster>>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let hit = entries.get(key).cloned();
        if hit.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        hit
    }

    pub(crate) fn insert(&self, key: MemoKey, value: Option<Arc<Raster>>) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, value);
    }

    pub(crate) fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }
}
