use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::foundation::core::Rect;
use crate::foundation::error::{FilterError, FilterResult};
use crate::geom::decompose::decompose;
use crate::geom::region;
use crate::graph::context::RenderContext;
use crate::graph::deferred::DeferredSlot;
use crate::graph::memo::MemoKey;
use crate::ops::{Capabilities, Operator};
use crate::raster::buffer::Raster;
use crate::raster::surface::PaintSurface;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);
static CLOCK: AtomicU64 = AtomicU64::new(1);

/// Next value of the process-wide modification clock.
fn next_stamp() -> u64 {
    CLOCK.fetch_add(1, Ordering::SeqCst)
}

/// Unique identity of a node, stable for its lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl NodeId {
    fn next() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug)]
struct NodeState {
    op: Arc<Operator>,
    sources: Arc<[Filter]>,
    props: BTreeMap<String, serde_json::Value>,
    stamp: u64,
}

#[derive(Debug)]
struct FilterNode {
    id: NodeId,
    state: RwLock<NodeState>,
    deferred: Option<DeferredSlot>,
}

/// What a node's operator sees while rendering.
pub(crate) struct NodeView<'a> {
    pub(crate) id: NodeId,
    pub(crate) timestamp: u64,
    pub(crate) sources: &'a [Filter],
}

/// Shared handle to a node of the filter graph.
///
/// Cloning is cheap and clones refer to the same node. Nodes are `Send + Sync`: a graph may be
/// built on one thread and rendered or mutated from others.
#[derive(Clone)]
pub struct Filter(Arc<FilterNode>);

impl std::fmt::Debug for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.read();
        f.debug_struct("Filter")
            .field("id", &self.0.id.0)
            .field("op", &st.op.name())
            .field("sources", &st.sources.len())
            .finish()
    }
}

impl Filter {
    /// Create a node running `op` over `sources`.
    ///
    /// Fails when the operator parameters are invalid or the number of sources does not match
    /// the operator's arity.
    pub fn new(op: Operator, sources: Vec<Filter>) -> FilterResult<Self> {
        if matches!(op, Operator::Deferred) {
            return Err(FilterError::validation(
                "deferred nodes are created with Filter::deferred",
            ));
        }
        op.validate(sources.len())?;
        Ok(Self::from_parts(op, sources.into(), None))
    }

    /// Sourceless leaf node.
    pub fn leaf(op: Operator) -> FilterResult<Self> {
        Self::new(op, Vec::new())
    }

    /// Placeholder whose real source is bound later with [`Filter::bind_deferred`], possibly from
    /// another thread.
    ///
    /// Every accessor of an unbound placeholder (bounds, timestamp, properties, render, region
    /// queries, mutators) blocks the calling thread until a source is bound. There is no timeout:
    /// a placeholder that is never bound blocks its readers forever, and binding it is the
    /// caller's responsibility.
    pub fn deferred() -> Self {
        Self::from_parts(
            Operator::Deferred,
            Arc::from(Vec::new()),
            Some(DeferredSlot::default()),
        )
    }

    fn from_parts(op: Operator, sources: Arc<[Filter]>, deferred: Option<DeferredSlot>) -> Self {
        Self(Arc::new(FilterNode {
            id: NodeId::next(),
            state: RwLock::new(NodeState {
                op: Arc::new(op),
                sources,
                props: BTreeMap::new(),
                stamp: next_stamp(),
            }),
            deferred,
        }))
    }

    /// Bind the real source of a deferred placeholder and wake every waiting thread.
    ///
    /// Binding is single-assignment: returns `Ok(false)` (and changes nothing) when a source was
    /// already bound. Fails when `self` is not a placeholder or `source` would create a cycle.
    pub fn bind_deferred(&self, source: Filter) -> FilterResult<bool> {
        let Some(slot) = &self.0.deferred else {
            return Err(FilterError::validation(
                "bind_deferred called on a non-deferred node",
            ));
        };
        if source.reaches(self.id()) {
            return Err(FilterError::validation(
                "deferred source would create a cycle",
            ));
        }
        let bound = slot.bind(source);
        if bound {
            tracing::debug!(node = self.id().0, "deferred source bound");
        }
        Ok(bound)
    }

    /// Return `true` for placeholders created by [`Filter::deferred`].
    pub fn is_deferred(&self) -> bool {
        self.0.deferred.is_some()
    }

    /// Return `false` only for a placeholder that has no source yet. Never blocks.
    pub fn is_bound(&self) -> bool {
        self.0.deferred.as_ref().is_none_or(|d| d.get().is_some())
    }

    /// The node that does the work: `self`, or the bound source of a placeholder (waiting for
    /// it if needed).
    fn resolve(&self) -> Filter {
        let mut cur = self.clone();
        while let Some(slot) = &cur.0.deferred {
            let next = slot.wait();
            cur = next;
        }
        cur
    }

    /// Unique node identity.
    pub fn id(&self) -> NodeId {
        self.0.id
    }

    /// Return `true` when both handles refer to the same node.
    pub fn ptr_eq(&self, other: &Filter) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    fn read(&self) -> RwLockReadGuard<'_, NodeState> {
        self.0.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, NodeState> {
        self.0.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot(&self) -> (Arc<Operator>, Arc<[Filter]>) {
        let st = self.read();
        (st.op.clone(), st.sources.clone())
    }

    /// Return `true` when `target` is this node or upstream of it. Unbound placeholders are not
    /// followed.
    fn reaches(&self, target: NodeId) -> bool {
        if self.id() == target {
            return true;
        }
        if let Some(slot) = &self.0.deferred {
            return slot.get().is_some_and(|f| f.reaches(target));
        }
        let (_, sources) = self.snapshot();
        sources.iter().any(|s| s.reaches(target))
    }

    /// Operator currently configured on the node.
    pub fn operator(&self) -> Arc<Operator> {
        self.resolve().read().op.clone()
    }

    /// Replace the operator, validating it against the current sources.
    pub fn set_operator(&self, op: Operator) -> FilterResult<()> {
        let node = self.resolve();
        if matches!(op, Operator::Deferred) {
            return Err(FilterError::validation(
                "a node cannot become a deferred placeholder",
            ));
        }
        let mut st = node.write();
        op.validate(st.sources.len())?;
        st.op = Arc::new(op);
        st.stamp = next_stamp();
        Ok(())
    }

    /// Source list, in order.
    pub fn sources(&self) -> Arc<[Filter]> {
        self.resolve().read().sources.clone()
    }

    /// Replace the whole source list.
    pub fn set_sources(&self, sources: Vec<Filter>) -> FilterResult<()> {
        let node = self.resolve();
        if sources.iter().any(|s| s.reaches(node.id())) {
            return Err(FilterError::validation("source would create a cycle"));
        }
        let mut st = node.write();
        st.op.validate(sources.len())?;
        st.sources = sources.into();
        st.stamp = next_stamp();
        Ok(())
    }

    /// Replace the source at `index`.
    pub fn set_source(&self, index: usize, source: Filter) -> FilterResult<()> {
        let node = self.resolve();
        if source.reaches(node.id()) {
            return Err(FilterError::validation("source would create a cycle"));
        }
        let mut st = node.write();
        if index >= st.sources.len() {
            return Err(FilterError::out_of_range(index, st.sources.len()));
        }
        let mut next = st.sources.to_vec();
        next[index] = source;
        st.sources = next.into();
        st.stamp = next_stamp();
        Ok(())
    }

    /// Mark the node as modified.
    pub fn touch(&self) {
        self.resolve().write().stamp = next_stamp();
    }

    /// Revision of this node alone.
    pub fn local_timestamp(&self) -> u64 {
        self.resolve().read().stamp
    }

    /// Revision of this node and everything upstream of it. Any change that can affect the
    /// node's output advances this value.
    pub fn timestamp(&self) -> u64 {
        let node = self.resolve();
        let (local, sources) = {
            let st = node.read();
            (st.stamp, st.sources.clone())
        };
        sources
            .iter()
            .map(Filter::timestamp)
            .fold(local, u64::max)
    }

    /// Property `name`, looked up locally and then in each source in order.
    pub fn property(&self, name: &str) -> Option<serde_json::Value> {
        let node = self.resolve();
        let sources = {
            let st = node.read();
            if let Some(v) = st.props.get(name) {
                return Some(v.clone());
            }
            st.sources.clone()
        };
        sources.iter().find_map(|s| s.property(name))
    }

    /// Set a local property.
    pub fn set_property(&self, name: impl Into<String>, value: serde_json::Value) {
        let node = self.resolve();
        let mut st = node.write();
        st.props.insert(name.into(), value);
        st.stamp = next_stamp();
    }

    /// Remove a local property, returning its previous value.
    pub fn remove_property(&self, name: &str) -> Option<serde_json::Value> {
        let node = self.resolve();
        let mut st = node.write();
        let old = st.props.remove(name);
        if old.is_some() {
            st.stamp = next_stamp();
        }
        old
    }

    /// Names of the local properties.
    pub fn property_names(&self) -> Vec<String> {
        self.resolve().read().props.keys().cloned().collect()
    }

    /// User-space bounds, consistent with the current operator and sources.
    pub fn bounds(&self) -> Rect {
        let (op, sources) = self.resolve().snapshot();
        op.bounds(&sources)
    }

    /// Capability flags of the current operator.
    pub fn capabilities(&self) -> Capabilities {
        let (op, sources) = self.resolve().snapshot();
        op.capabilities(&sources)
    }

    /// Region of source `index` needed to produce `output` (both in user space).
    ///
    /// `Ok(None)` means no input is needed.
    pub fn dependency_region(&self, index: usize, output: Rect) -> FilterResult<Option<Rect>> {
        let (op, sources) = self.resolve().snapshot();
        if index >= sources.len() {
            return Err(FilterError::out_of_range(index, sources.len()));
        }
        Ok(op.dependency_region(&sources, index, output))
    }

    /// Region of the output invalidated by a change to `input` of source `index`.
    ///
    /// `Ok(None)` means the change cannot affect the output.
    pub fn dirty_region(&self, index: usize, input: Rect) -> FilterResult<Option<Rect>> {
        let (op, sources) = self.resolve().snapshot();
        if index >= sources.len() {
            return Err(FilterError::out_of_range(index, sources.len()));
        }
        Ok(op.dirty_region(&sources, index, input))
    }

    /// Render the node for `ctx`.
    ///
    /// `Ok(None)` means nothing to draw: an empty or degenerate area of interest, or a transform
    /// with no sensible output. Shared sub-graphs render once per call.
    #[tracing::instrument(level = "debug", skip_all, fields(node = self.id().0))]
    pub fn render(&self, ctx: &RenderContext) -> FilterResult<Option<Arc<Raster>>> {
        if ctx.memo().is_some() {
            return self.render_in(ctx);
        }
        self.render_in(&ctx.with_fresh_memo())
    }

    pub(crate) fn render_in(&self, ctx: &RenderContext) -> FilterResult<Option<Arc<Raster>>> {
        if !region::is_invertible(ctx.transform()) {
            tracing::trace!(node = self.id().0, "non-invertible transform");
            return Ok(None);
        }
        let node = self.resolve();
        let (op, sources) = node.snapshot();
        let timestamp = node.timestamp();
        let key = MemoKey {
            node: node.id(),
            context: ctx.key(),
            timestamp,
        };
        if let Some(hit) = ctx.memo().and_then(|m| m.get(&key)) {
            return Ok(hit);
        }
        let stage_scale = op
            .cacheable()
            .then(|| decompose(ctx.transform()))
            .flatten()
            .map(|split| (split.sx, split.sy));
        if let Some(scale) = stage_scale
            && let Some(hit) = ctx
                .tile_cache()
                .get_in(node.id(), scale, timestamp, key.context)
        {
            tracing::trace!(node = node.id().0, op = op.name(), "reused cached raster");
            let out = Some(hit);
            if let Some(memo) = ctx.memo() {
                memo.insert(key, out.clone());
            }
            return Ok(out);
        }
        let view = NodeView {
            id: node.id(),
            timestamp,
            sources: &sources,
        };
        let out = op.render(&view, ctx)?;
        match (&out, stage_scale) {
            (None, _) => {
                tracing::trace!(node = node.id().0, op = op.name(), "nothing to draw");
            }
            (Some(raster), Some(scale)) => {
                ctx.tile_cache()
                    .insert_in(node.id(), scale, timestamp, key.context, raster.clone());
            }
            (Some(_), None) => {}
        }
        if let Some(memo) = ctx.memo() {
            memo.insert(key, out.clone());
        }
        Ok(out)
    }

    /// Draw straight onto `surface`, skipping raster materialization.
    ///
    /// Returns `Ok(false)` when the shortcut does not apply (the surface is not in plain
    /// source-over mode, or the operator has no direct path); callers then fall back to
    /// [`Filter::render`] and a blit, as [`crate::draw_filter`] does.
    pub fn paint_direct(&self, surface: &mut dyn PaintSurface) -> FilterResult<bool> {
        let node = self.resolve();
        let (op, sources) = node.snapshot();
        let view = NodeView {
            id: node.id(),
            timestamp: node.timestamp(),
            sources: &sources,
        };
        op.paint_direct(&view, surface)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/graph/node.rs"]
mod tests;
