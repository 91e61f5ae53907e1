/// Tile cache for expensive intermediate rasters.
pub mod cache;
/// Render context and hints.
pub mod context;
pub(crate) mod deferred;
pub(crate) mod memo;
/// Filter nodes and their shared handle.
pub mod node;
/// Drawing filters onto surfaces.
pub mod paint;
