use std::sync::{Condvar, Mutex, PoisonError};

use crate::graph::node::Filter;

/// Single-assignment slot for a filter supplied after its placeholder was wired into a graph.
#[derive(Debug, Default)]
pub(crate) struct DeferredSlot {
    slot: Mutex<Option<Filter>>,
    bound: Condvar,
}

impl DeferredSlot {
    /// Store `source` if nothing is bound yet and wake every waiter. Returns `false` when a
    /// source was already bound.
    pub(crate) fn bind(&self, source: Filter) -> bool {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return false;
        }
        *slot = Some(source);
        self.bound.notify_all();
        true
    }

    /// Bound source, blocking until one is bound.
    pub(crate) fn wait(&self) -> Filter {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(f) = slot.as_ref() {
                return f.clone();
            }
            slot = self
                .bound
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Bound source without blocking.
    pub(crate) fn get(&self) -> Option<Filter> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
