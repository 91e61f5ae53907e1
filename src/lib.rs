#![forbid(unsafe_code)]
#![warn(missing_docs)]
//! Lazy, resolution-independent image filter graphs.
//!
//! A [`Filter`] is a node in a directed acyclic graph: an [`Operator`] plus ordered sources.
//! Nothing is rendered when the graph is built. A caller asks for pixels through
//! [`Filter::render`] with a [`RenderContext`] that carries the user-to-device transform, an
//! optional area of interest and [`RenderHints`]. Every operator splits that transform into a
//! scale it renders at and a residual it resamples through, so a graph stays sharp under any
//! zoom and rotation.
//!
//! Graphs can be built in code or from JSON with [`builder::GraphBuilder`].

mod foundation;

/// JSON graph descriptions.
pub mod builder;
/// Transform decomposition and region helpers.
pub mod geom;
/// Filter nodes, render contexts and caching.
pub mod graph;
/// Filter operators.
pub mod ops;
/// Pixel storage, color conversion and resampling.
pub mod raster;

pub use builder::{BuiltGraph, GraphBuilder, GraphDesc};
pub use foundation::core::{
    Affine, Color, ColorSpace, PixelRect, Point, Rect, Rgba8Premul, Vec2,
};
pub use foundation::error::{FilterError, FilterResult};
pub use graph::cache::{TileCache, TileCacheOpts, TileCacheStats};
pub use graph::context::{Quality, RenderContext, RenderHints};
pub use graph::node::{Filter, NodeId};
pub use graph::paint::{draw_filter, draw_filter_with_hints};
pub use ops::{Arity, Capabilities, Operator};
pub use raster::buffer::{ColorModel, Raster};
pub use raster::resample::Interpolation;
pub use raster::surface::{PaintSource, PaintSurface, RasterSurface, SurfaceCompositeMode};
