use std::sync::Arc;

use crate::foundation::core::{Affine, ColorSpace, Rect};
use crate::foundation::math::Fnv1a64;
use crate::graph::cache::TileCache;
use crate::graph::memo::RenderMemo;
use crate::raster::resample::Interpolation;

/// Requested speed/quality trade-off.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    /// Prefer speed (box-blur approximations, nearest sampling where allowed).
    Speed,
    /// Balanced defaults.
    #[default]
    Default,
    /// Prefer exact kernels and filtered sampling.
    Quality,
}

/// Rendering hints carried by a [`RenderContext`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RenderHints {
    /// Speed/quality preference.
    pub quality: Quality,
    /// Resampling filter for residual transforms.
    pub interpolation: Interpolation,
    /// Forces every color-space-aware operator to work in this space.
    pub color_space_override: Option<ColorSpace>,
}

/// Per-call rendering request: transform, optional area of interest, hints.
///
/// Contexts are never mutated; operators derive new ones for their sources.
#[derive(Clone, Debug)]
pub struct RenderContext {
    transform: Affine,
    area_of_interest: Option<Rect>,
    hints: RenderHints,
    cache: Option<Arc<TileCache>>,
    memo: Option<Arc<RenderMemo>>,
}

impl RenderContext {
    /// Context mapping user space through `transform`, with no area of interest.
    pub fn new(transform: Affine) -> Self {
        Self {
            transform,
            area_of_interest: None,
            hints: RenderHints::default(),
            cache: None,
            memo: None,
        }
    }

    /// Identity-transform context.
    pub fn identity() -> Self {
        Self::new(Affine::IDENTITY)
    }

    /// User-to-device transform.
    pub fn transform(&self) -> Affine {
        self.transform
    }

    /// Requested region in user space, if any.
    pub fn area_of_interest(&self) -> Option<Rect> {
        self.area_of_interest
    }

    /// Rendering hints.
    pub fn hints(&self) -> &RenderHints {
        &self.hints
    }

    /// Derive a context with a different transform.
    pub fn with_transform(&self, transform: Affine) -> Self {
        Self {
            transform,
            ..self.clone()
        }
    }

    /// Derive a context restricted to `aoi` (user space).
    pub fn with_area_of_interest(&self, aoi: Rect) -> Self {
        Self {
            area_of_interest: Some(aoi),
            ..self.clone()
        }
    }

    /// Derive a context with no area of interest (full bounds).
    pub fn without_area_of_interest(&self) -> Self {
        Self {
            area_of_interest: None,
            ..self.clone()
        }
    }

    /// Derive a context with different hints.
    pub fn with_hints(&self, hints: RenderHints) -> Self {
        Self {
            hints,
            ..self.clone()
        }
    }

    /// Derive a context that caches into `cache` instead of the process-wide cache.
    pub fn with_tile_cache(&self, cache: Arc<TileCache>) -> Self {
        Self {
            cache: Some(cache),
            ..self.clone()
        }
    }

    /// Raster cache used by caching operators.
    pub fn tile_cache(&self) -> &TileCache {
        match &self.cache {
            Some(c) => c,
            None => TileCache::shared(),
        }
    }

    pub(crate) fn memo(&self) -> Option<&RenderMemo> {
        self.memo.as_deref()
    }

    pub(crate) fn with_fresh_memo(&self) -> Self {
        Self {
            memo: Some(Arc::new(RenderMemo::default())),
            ..self.clone()
        }
    }

    /// Working color space for an operator that declares `declared`.
    pub(crate) fn op_space(&self, declared: ColorSpace) -> ColorSpace {
        self.hints.color_space_override.unwrap_or(declared)
    }

    pub(crate) fn prefers_quality(&self) -> bool {
        self.hints.quality == Quality::Quality
    }

    /// Hash of everything that affects a node's output for this context.
    pub(crate) fn key(&self) -> u64 {
        let mut h = Fnv1a64::new_default();
        for v in self.transform.as_coeffs() {
            h.write_f64(v);
        }
        match self.area_of_interest {
            Some(r) => {
                h.write_u8(1);
                for v in [r.x0, r.y0, r.x1, r.y1] {
                    h.write_f64(v);
                }
            }
            None => h.write_u8(0),
        }
        h.write_u8(self.hints.quality as u8);
        h.write_u8(self.hints.interpolation as u8);
        h.write_u8(match self.hints.color_space_override {
            None => 0,
            Some(ColorSpace::Srgb) => 1,
            Some(ColorSpace::LinearRgb) => 2,
        });
        h.finish()
    }
}

impl Default for RenderContext {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/graph/context.rs"]
mod tests;
