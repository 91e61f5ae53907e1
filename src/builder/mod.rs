//! Filter graphs from JSON descriptions.
//!
//! A [`GraphDesc`] lists nodes by id; each node names an operator, its parameters and the ids
//! of its inputs. [`GraphBuilder`] resolves ids, loads image files and builds the [`Filter`]
//! handles. Nodes referenced more than once are built once and shared.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;

use crate::foundation::core::{Affine, PixelRect};
use crate::foundation::error::{FilterError, FilterResult};
use crate::graph::node::Filter;
use crate::ops::{
    AffineOp, ColorMatrix, ColorProfile, ColorSpaceConvert, ComponentTransfer, Composite,
    ConvolveMatrix, DiffuseLighting, DisplacementMap, FilterChain, Flood, GaussianBlur,
    ImageSource, Morphology, Offset, Operator, Pad, PaintLeaf, ProfileOp, RectPaint,
    SpecularLighting, Tile, Turbulence,
};
use crate::raster::buffer::Raster;

mod desc;

pub use desc::{ColorDesc, GraphDesc, NodeDesc, OpDesc, ProfileDesc};

/// Decode PNG/JPEG bytes into a premultiplied sRGB raster anchored at the origin.
pub fn decode_image(bytes: &[u8]) -> FilterResult<Raster> {
    let img = image::load_from_memory(bytes).context("decode image from memory")?;
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    Raster::from_straight_rgba8(PixelRect::new(0, 0, width, height), rgba.into_raw())
}

/// Read and decode an image file.
pub fn load_image(path: &Path) -> FilterResult<Raster> {
    let bytes = std::fs::read(path).with_context(|| format!("read image {}", path.display()))?;
    decode_image(&bytes).map_err(|e| match e {
        FilterError::Other(err) => FilterError::Other(err.context(path.display().to_string())),
        other => other,
    })
}

/// Result of [`GraphBuilder::build`].
#[derive(Clone, Debug)]
pub struct BuiltGraph {
    /// The node named by [`GraphDesc::output`].
    pub output: Filter,
    /// Every built node by id.
    pub nodes: BTreeMap<String, Filter>,
}

impl BuiltGraph {
    /// Node by id.
    pub fn node(&self, id: &str) -> Option<&Filter> {
        self.nodes.get(id)
    }
}

/// Turns [`GraphDesc`]s into live filter graphs.
#[derive(Clone, Debug, Default)]
pub struct GraphBuilder {
    root: PathBuf,
    named: HashMap<String, Filter>,
}

impl GraphBuilder {
    /// Builder resolving image paths against `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            named: HashMap::new(),
        }
    }

    /// Make `filter` available to `{"op": "named", "name": ...}` nodes.
    pub fn bind(mut self, name: impl Into<String>, filter: Filter) -> Self {
        self.named.insert(name.into(), filter);
        self
    }

    /// Parse and build a JSON description.
    pub fn build_json(&self, json: &str) -> FilterResult<BuiltGraph> {
        self.build(&GraphDesc::from_json(json)?)
    }

    /// Build every node of `desc`.
    #[tracing::instrument(level = "debug", skip_all, fields(nodes = desc.nodes.len()))]
    pub fn build(&self, desc: &GraphDesc) -> FilterResult<BuiltGraph> {
        let mut by_id: HashMap<&str, &NodeDesc> = HashMap::with_capacity(desc.nodes.len());
        for node in &desc.nodes {
            if node.id.trim().is_empty() {
                return Err(FilterError::validation("node id must be non-empty"));
            }
            if by_id.insert(node.id.as_str(), node).is_some() {
                return Err(FilterError::validation(format!(
                    "duplicate node id '{}'",
                    node.id
                )));
            }
        }
        for node in &desc.nodes {
            for input in &node.inputs {
                if !by_id.contains_key(input.as_str()) {
                    return Err(FilterError::validation(format!(
                        "node '{}' references missing input '{input}'",
                        node.id
                    )));
                }
            }
        }
        if !by_id.contains_key(desc.output.as_str()) {
            return Err(FilterError::validation(format!(
                "output references missing node '{}'",
                desc.output
            )));
        }

        let mut state = BuildState {
            by_id,
            built: HashMap::new(),
            visiting: Vec::new(),
        };
        for node in &desc.nodes {
            self.build_node(&node.id, &mut state)?;
        }
        let nodes: BTreeMap<String, Filter> = state
            .built
            .into_iter()
            .map(|(id, f)| (id.to_owned(), f))
            .collect();
        let output = nodes
            .get(&desc.output)
            .cloned()
            .ok_or_else(|| FilterError::evaluation("output node was not built"))?;
        tracing::debug!(output = %desc.output, "built filter graph");
        Ok(BuiltGraph { output, nodes })
    }

    fn build_node<'a>(&self, id: &'a str, state: &mut BuildState<'a>) -> FilterResult<Filter> {
        if let Some(f) = state.built.get(id) {
            return Ok(f.clone());
        }
        if state.visiting.contains(&id) {
            let mut path = state.visiting.join(" -> ");
            path.push_str(" -> ");
            path.push_str(id);
            return Err(FilterError::validation(format!("graph has a cycle: {path}")));
        }
        let node = *state
            .by_id
            .get(id)
            .ok_or_else(|| FilterError::validation(format!("unknown node '{id}'")))?;

        state.visiting.push(id);
        let mut sources = Vec::with_capacity(node.inputs.len());
        for input in &node.inputs {
            sources.push(self.build_node(input.as_str(), state)?);
        }
        state.visiting.pop();

        let filter = match &node.op {
            OpDesc::Named { name } => {
                if !sources.is_empty() {
                    return Err(FilterError::validation(format!(
                        "node '{id}': named nodes take no inputs"
                    )));
                }
                self.named.get(name).cloned().ok_or_else(|| {
                    FilterError::validation(format!("node '{id}': no filter bound as '{name}'"))
                })?
            }
            op => {
                let op = self
                    .operator(op)
                    .map_err(|e| prefix_validation(id, e))?;
                Filter::new(op, sources).map_err(|e| prefix_validation(id, e))?
            }
        };
        for (key, value) in &node.properties {
            filter.set_property(key.clone(), value.clone());
        }
        state.built.insert(id, filter.clone());
        Ok(filter)
    }

    fn operator(&self, op: &OpDesc) -> FilterResult<Operator> {
        let op: Operator = match op {
            OpDesc::Image { path, placement } => {
                let raster = load_image(&self.root.join(path))?;
                match placement {
                    Some(rect) => ImageSource::new(raster, *rect)?.into(),
                    None => ImageSource::at_origin(raster).into(),
                }
            }
            OpDesc::Named { name } => {
                return Err(FilterError::validation(format!(
                    "'{name}' is a binding, not an operator"
                )));
            }
            OpDesc::Rect { rect, color } => PaintLeaf::new(Arc::new(RectPaint {
                rect: *rect,
                color: color.resolve()?,
            }))
            .into(),
            OpDesc::Flood {
                region,
                color,
                opacity,
            } => Flood {
                opacity: *opacity,
                ..Flood::new(*region, color.resolve()?)?
            }
            .into(),
            OpDesc::Turbulence {
                region,
                base_frequency,
                octaves,
                seed,
                stitch_tiles,
                kind,
                color_space,
            } => Turbulence {
                region: *region,
                base_frequency: *base_frequency,
                octaves: *octaves,
                seed: *seed,
                stitch_tiles: *stitch_tiles,
                kind: *kind,
                color_space: *color_space,
            }
            .into(),
            OpDesc::Affine { transform } => AffineOp::new(Affine::new(*transform))?.into(),
            OpDesc::Offset { dx, dy } => Offset::new(*dx, *dy)?.into(),
            OpDesc::Pad { region, mode } => Pad::new(*region, *mode)?.into(),
            OpDesc::Composite { rule, color_space } => {
                Composite::new(*rule)?.in_space(*color_space).into()
            }
            OpDesc::Tile {
                tile_region,
                tiled_region,
                overflow,
            } => Tile::new(*tile_region, *tiled_region)?
                .with_overflow(*overflow)
                .into(),
            OpDesc::Chain { region, resolution } => {
                let chain = FilterChain::new(*region)?;
                match resolution {
                    Some(res) => chain.with_resolution(*res).into(),
                    None => chain.into(),
                }
            }
            OpDesc::ColorMatrix { kind, color_space } => {
                ColorMatrix::new(*kind)?.in_space(*color_space).into()
            }
            OpDesc::ComponentTransfer {
                r,
                g,
                b,
                a,
                color_space,
            } => ComponentTransfer::new(r.clone(), g.clone(), b.clone(), a.clone())?
                .in_space(*color_space)
                .into(),
            OpDesc::Profile { profile } => {
                let profile = match profile {
                    ProfileDesc::Preset(name) => ColorProfile::preset(name)?,
                    ProfileDesc::Custom(p) => p.clone(),
                };
                ProfileOp::new(profile)?.into()
            }
            OpDesc::ColorSpace { target } => ColorSpaceConvert::new(*target).into(),
            OpDesc::GaussianBlur {
                std_dev,
                color_space,
            } => GaussianBlur::new(std_dev.0, std_dev.1)?
                .in_space(*color_space)
                .into(),
            OpDesc::ConvolveMatrix {
                order,
                kernel,
                divisor,
                target,
                bias,
                edge_mode,
                kernel_unit_length,
                preserve_alpha,
                color_space,
            } => {
                let base = ConvolveMatrix::new(*order, kernel.clone())?;
                ConvolveMatrix {
                    divisor: *divisor,
                    target: target.unwrap_or(base.target),
                    bias: *bias,
                    edge_mode: *edge_mode,
                    kernel_unit_length: *kernel_unit_length,
                    preserve_alpha: *preserve_alpha,
                    color_space: *color_space,
                    ..base
                }
                .into()
            }
            OpDesc::Morphology { operator, radius } => {
                Morphology::new(*operator, radius.0, radius.1)?.into()
            }
            OpDesc::DiffuseLighting {
                light,
                surface_scale,
                diffuse_constant,
                color,
                kernel_unit_length,
                color_space,
            } => DiffuseLighting {
                light: *light,
                surface_scale: *surface_scale,
                diffuse_constant: *diffuse_constant,
                color: color.resolve()?,
                kernel_unit_length: *kernel_unit_length,
                color_space: *color_space,
            }
            .into(),
            OpDesc::SpecularLighting {
                light,
                surface_scale,
                specular_constant,
                specular_exponent,
                color,
                kernel_unit_length,
                color_space,
            } => SpecularLighting {
                light: *light,
                surface_scale: *surface_scale,
                specular_constant: *specular_constant,
                specular_exponent: *specular_exponent,
                color: color.resolve()?,
                kernel_unit_length: *kernel_unit_length,
                color_space: *color_space,
            }
            .into(),
            OpDesc::DisplacementMap {
                scale,
                x_channel,
                y_channel,
                color_space,
            } => DisplacementMap::new(*scale, *x_channel, *y_channel)?
                .in_space(*color_space)
                .into(),
        };
        Ok(op)
    }
}

struct BuildState<'a> {
    by_id: HashMap<&'a str, &'a NodeDesc>,
    built: HashMap<&'a str, Filter>,
    visiting: Vec<&'a str>,
}

fn prefix_validation(id: &str, err: FilterError) -> FilterError {
    match err {
        FilterError::Validation(msg) => FilterError::Validation(format!("node '{id}': {msg}")),
        other => other,
    }
}

#[cfg(test)]
#[path = "../../tests/unit/builder/mod.rs"]
mod tests;
