use crate::foundation::core::Affine;

const MIN_SCALE: f64 = 1e-12;
const AXIS_EPS: f64 = 1e-12;

/// A transform split into an axis-aligned stage and the residual applied after it.
///
/// `residual * stage == transform`. Scale-sensitive operators evaluate their kernels in stage
/// space (one unit is one stage pixel) and resample the result through `residual`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScaleSplit {
    /// Horizontal scale of the stage.
    pub sx: f64,
    /// Vertical scale of the stage.
    pub sy: f64,
    /// User-to-stage transform: `scale(sx, sy)`, or the whole transform when it has no
    /// rotation or shear.
    pub stage: Affine,
    /// Stage-to-device transform.
    pub residual: Affine,
    transform: Affine,
}

/// Split `at` into column-length scales and a residual rotation/shear/translation.
///
/// Returns `None` for transforms with a collapsed axis or non-finite coefficients.
pub fn decompose(at: Affine) -> Option<ScaleSplit> {
    let [a, b, c, d, e, f] = at.as_coeffs();
    if !at.as_coeffs().iter().all(|v| v.is_finite()) {
        return None;
    }
    let sx = a.hypot(b);
    let sy = c.hypot(d);
    if sx < MIN_SCALE || sy < MIN_SCALE {
        return None;
    }
    if b.abs() <= AXIS_EPS && c.abs() <= AXIS_EPS && a > 0.0 && d > 0.0 {
        return Some(ScaleSplit {
            sx,
            sy,
            stage: at,
            residual: Affine::IDENTITY,
            transform: at,
        });
    }
    Some(ScaleSplit {
        sx,
        sy,
        stage: Affine::scale_non_uniform(sx, sy),
        residual: Affine::new([a / sx, b / sx, c / sy, d / sy, e, f]),
        transform: at,
    })
}

impl ScaleSplit {
    /// The transform this split was computed from.
    pub fn transform(&self) -> Affine {
        self.transform
    }

    /// Return `true` when no resampling is needed after the stage.
    pub fn is_axis_aligned(&self) -> bool {
        self.residual == Affine::IDENTITY
    }

    /// Re-split with an explicit stage scale; whatever the stage no longer covers moves into
    /// the residual.
    pub fn with_stage_scale(&self, sx: f64, sy: f64) -> Self {
        if sx == self.sx && sy == self.sy {
            return *self;
        }
        let stage = Affine::scale_non_uniform(sx, sy);
        let residual = self.transform * Affine::scale_non_uniform(1.0 / sx, 1.0 / sy);
        Self {
            sx,
            sy,
            stage,
            residual,
            transform: self.transform,
        }
    }

    /// Cap the stage scale per axis, folding any excess into the residual.
    pub fn clamp_scale(&self, max_sx: f64, max_sy: f64) -> Self {
        let sx = self.sx.min(max_sx);
        let sy = self.sy.min(max_sy);
        self.with_stage_scale(sx, sy)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/geom/decompose.rs"]
mod tests;
