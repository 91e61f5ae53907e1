use std::sync::Arc;

use rayon::prelude::*;

use crate::foundation::core::{Affine, ColorSpace, Point, Rect};
use crate::foundation::error::{FilterError, FilterResult};
use crate::graph::context::RenderContext;
use crate::graph::node::{Filter, NodeView};
use crate::ops::{Arity, Capabilities, OpImpl, device_clip, finite, render_area, valid_rect};
use crate::raster::buffer::{ColorModel, Raster};
use crate::raster::color::premultiply_in_place;

const RAND_M: i32 = 2_147_483_647; // 2^31 - 1
const RAND_A: i32 = 16_807; // 7^5, primitive root of RAND_M
const RAND_Q: i32 = 127_773; // RAND_M / RAND_A
const RAND_R: i32 = 2_836; // RAND_M % RAND_A

const B_SIZE: usize = 0x100;
const B_MASK: i32 = 0xff;
const PERLIN_N: f64 = 4096.0;

/// Octaves past this contribute less than one code value.
const MAX_OCTAVES: u32 = 8;

/// Flavour of noise summation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseKind {
    /// Sum of absolute noise values.
    #[default]
    Turbulence,
    /// Signed sum, biased to mid-grey.
    FractalNoise,
}

/// Sourceless Perlin-noise generator over an explicit region.
#[derive(Clone, Debug, PartialEq)]
pub struct Turbulence {
    /// User-space region filled with noise.
    pub region: Rect,
    /// Base frequency per axis (user units).
    pub base_frequency: (f64, f64),
    /// Number of octaves.
    pub octaves: u32,
    /// Pseudo-random seed.
    pub seed: i32,
    /// Adjust frequencies so the noise tiles seamlessly across `region`.
    pub stitch_tiles: bool,
    /// Summation flavour.
    pub kind: NoiseKind,
    /// Color space the generated values are interpreted in.
    pub color_space: ColorSpace,
}

impl Turbulence {
    /// Turbulence noise over `region` with the given frequency, one octave, seed 0.
    pub fn new(region: Rect, base_frequency: (f64, f64)) -> FilterResult<Self> {
        let op = Self {
            region,
            base_frequency,
            octaves: 1,
            seed: 0,
            stitch_tiles: false,
            kind: NoiseKind::Turbulence,
            color_space: ColorSpace::LinearRgb,
        };
        op.check()?;
        Ok(op)
    }
}

impl OpImpl for Turbulence {
    fn name(&self) -> &'static str {
        "turbulence"
    }

    fn arity(&self) -> Arity {
        Arity::Exact(0)
    }

    fn check(&self) -> FilterResult<()> {
        valid_rect("turbulence region", self.region)?;
        let (fx, fy) = self.base_frequency;
        if finite("base frequency", fx)? < 0.0 || finite("base frequency", fy)? < 0.0 {
            return Err(FilterError::validation("base frequency must be >= 0"));
        }
        Ok(())
    }

    fn bounds(&self, _sources: &[Filter]) -> Rect {
        self.region
    }

    fn capabilities(&self, _sources: &[Filter]) -> Capabilities {
        Capabilities::COLOR_SPACE_AWARE
    }

    fn cacheable(&self) -> bool {
        true
    }

    fn render(
        &self,
        _node: &NodeView<'_>,
        ctx: &RenderContext,
    ) -> FilterResult<Option<Arc<Raster>>> {
        let Some(area) = render_area(ctx, self.region) else {
            return Ok(None);
        };
        let Some(clip) = device_clip(ctx, area) else {
            return Ok(None);
        };
        let at = ctx.transform();
        let det = at.determinant();
        if !det.is_finite() || det.abs() < 1e-12 {
            return Ok(None);
        }
        let inv = at.inverse();
        let noise = NoiseGen::new(self, inv);
        let space = ctx.op_space(self.color_space);

        let mut out = Raster::transparent(clip, ColorModel {
            color_space: space,
            premultiplied: false,
        });
        let row_bytes = clip.width as usize * 4;
        out.data_mut()
            .par_chunks_mut(row_bytes)
            .enumerate()
            .for_each(|(ly, row)| {
                let y = f64::from(clip.y) + ly as f64;
                for (lx, px) in row.chunks_exact_mut(4).enumerate() {
                    let x = f64::from(clip.x) + lx as f64;
                    let center = inv * Point::new(x + 0.5, y + 0.5);
                    if !self.region.contains(center) {
                        continue;
                    }
                    let p = inv * Point::new(x, y);
                    px.copy_from_slice(&noise.pixel(p.x, p.y));
                }
            });
        premultiply_in_place(out.data_mut());
        let out = out.with_model(ColorModel::premul(space));
        Ok(Some(Arc::new(out)))
    }
}

#[derive(Clone, Copy, Debug)]
struct StitchInfo {
    width: i32,
    height: i32,
    wrap_x: i32,
    wrap_y: i32,
}

impl StitchInfo {
    fn double_frequency(&mut self) {
        self.width *= 2;
        self.height *= 2;
        self.wrap_x = self.wrap_x * 2 - PERLIN_N as i32;
        self.wrap_y = self.wrap_y * 2 - PERLIN_N as i32;
    }
}

/// Park-Miller minimal standard generator.
pub(crate) fn setup_seed(seed: i32) -> i32 {
    let mut seed = seed;
    if seed <= 0 {
        seed = -(seed % (RAND_M - 1)) + 1;
    }
    if seed > RAND_M - 1 {
        seed = RAND_M - 1;
    }
    seed
}

pub(crate) fn random(seed: i32) -> i32 {
    let mut result = RAND_A * (seed % RAND_Q) - RAND_R * (seed / RAND_Q);
    if result <= 0 {
        result += RAND_M;
    }
    result
}

/// Gradient lattice shared by all pixels of one render.
struct Lattice {
    selector: Vec<i32>,
    gradient: Vec<f64>,
}

impl Lattice {
    fn new(seed: i32) -> Self {
        let mut selector = vec![0i32; B_SIZE + 1];
        let mut gradient = vec![0f64; (B_SIZE + 1) * 8];
        let mut seed = setup_seed(seed);
        let span = (B_SIZE + B_SIZE) as i32;

        for k in 0..4 {
            for i in 0..B_SIZE {
                seed = random(seed);
                let u = f64::from((seed % span) - B_SIZE as i32);
                seed = random(seed);
                let v = f64::from((seed % span) - B_SIZE as i32);
                let len = (u * u + v * v).sqrt();
                if len > 0.0 {
                    gradient[i * 8 + k * 2] = u / len;
                    gradient[i * 8 + k * 2 + 1] = v / len;
                }
            }
        }

        for (i, s) in selector.iter_mut().enumerate().take(B_SIZE) {
            *s = i as i32;
        }
        // Shuffle the selector and apply it to the gradients, so lookups skip one indirection.
        for i in (1..B_SIZE).rev() {
            seed = random(seed);
            let j = (seed % B_SIZE as i32) as usize;
            selector.swap(i, j);
            for c in 0..8 {
                gradient.swap(i * 8 + c, j * 8 + c);
            }
        }
        selector[B_SIZE] = selector[0];
        for c in 0..8 {
            gradient[B_SIZE * 8 + c] = gradient[c];
        }
        Self { selector, gradient }
    }

    fn sel(&self, i: i32) -> i32 {
        self.selector[(i & B_MASK) as usize]
    }

    /// Four-channel gradient noise at `(x, y)` in lattice units.
    fn noise2(&self, x: f64, y: f64, stitch: Option<&StitchInfo>) -> [f64; 4] {
        let t = x + PERLIN_N;
        let mut bx0 = t as i32;
        let mut bx1 = bx0 + 1;
        let rx0 = t - f64::from(t as i32);
        let rx1 = rx0 - 1.0;

        let t = y + PERLIN_N;
        let mut by0 = t as i32;
        let mut by1 = by0 + 1;
        let ry0 = t - f64::from(t as i32);
        let ry1 = ry0 - 1.0;

        if let Some(s) = stitch {
            if bx1 >= s.wrap_x {
                if bx0 >= s.wrap_x {
                    bx0 -= s.width;
                }
                bx1 -= s.width;
            }
            if by1 >= s.wrap_y {
                if by0 >= s.wrap_y {
                    by0 -= s.height;
                }
                by1 -= s.height;
            }
        }

        let i = self.sel(bx0);
        let j = self.sel(bx1);
        let b00 = (((i + by0) & B_MASK) as usize) << 3;
        let b10 = (((j + by0) & B_MASK) as usize) << 3;
        let b01 = (((i + by1) & B_MASK) as usize) << 3;
        let b11 = (((j + by1) & B_MASK) as usize) << 3;

        let sx = s_curve(rx0);
        let sy = s_curve(ry0);
        let g = &self.gradient;
        let mut out = [0.0; 4];
        for (c, o) in out.iter_mut().enumerate() {
            let k = c * 2;
            let a = lerp(
                sx,
                rx0 * g[b00 + k] + ry0 * g[b00 + k + 1],
                rx1 * g[b10 + k] + ry0 * g[b10 + k + 1],
            );
            let b = lerp(
                sx,
                rx0 * g[b01 + k] + ry1 * g[b01 + k + 1],
                rx1 * g[b11 + k] + ry1 * g[b11 + k + 1],
            );
            *o = lerp(sy, a, b);
        }
        out
    }
}

fn s_curve(t: f64) -> f64 {
    t * t * (3.0 - 2.0 * t)
}

fn lerp(t: f64, a: f64, b: f64) -> f64 {
    a + t * (b - a)
}

/// Per-render noise evaluator with resolution-limited octaves and stitching resolved.
struct NoiseGen {
    lattice: Lattice,
    freq: (f64, f64),
    octaves: u32,
    kind: NoiseKind,
    stitch: Option<StitchInfo>,
}

impl NoiseGen {
    fn new(op: &Turbulence, device_to_user: Affine) -> Self {
        let (mut fx, mut fy) = op.base_frequency;
        let octaves = limit_octaves(op.octaves, (fx, fy), device_to_user);

        let stitch = if op.stitch_tiles && fx > 0.0 && fy > 0.0 {
            let tile = op.region;
            fx = snap_frequency(fx, tile.width());
            fy = snap_frequency(fy, tile.height());
            let width = (tile.width() * fx) as i32;
            let height = (tile.height() * fy) as i32;
            Some(StitchInfo {
                width,
                height,
                wrap_x: (tile.x0 * fx + PERLIN_N + f64::from(width)) as i32,
                wrap_y: (tile.y0 * fy + PERLIN_N + f64::from(height)) as i32,
            })
        } else {
            None
        };

        Self {
            lattice: Lattice::new(op.seed),
            freq: (fx, fy),
            octaves,
            kind: op.kind,
            stitch,
        }
    }

    /// Straight RGBA value at user point `(x, y)`.
    fn pixel(&self, x: f64, y: f64) -> [u8; 4] {
        let mut px = x * self.freq.0;
        let mut py = y * self.freq.1;
        let mut stitch = self.stitch;
        let mut sum = [0.0f64; 4];
        let mut ratio = 1.0;
        for _ in 0..self.octaves {
            let n = self.lattice.noise2(px, py, stitch.as_ref());
            for c in 0..4 {
                sum[c] += match self.kind {
                    NoiseKind::Turbulence => n[c].abs() * ratio,
                    NoiseKind::FractalNoise => n[c] * ratio,
                };
            }
            ratio *= 0.5;
            px *= 2.0;
            py *= 2.0;
            if let Some(s) = stitch.as_mut() {
                s.double_frequency();
            }
        }
        let mut out = [0u8; 4];
        for c in 0..4 {
            let v = match self.kind {
                NoiseKind::Turbulence => sum[c] * 255.0,
                NoiseKind::FractalNoise => (sum[c] * 255.0 + 255.0) / 2.0,
            };
            // Truncate like an integer cast, then saturate.
            out[c] = (v.trunc()).clamp(0.0, 255.0) as u8;
        }
        out
    }
}

/// Snap `freq` so a whole number of lattice cells spans `extent`.
fn snap_frequency(freq: f64, extent: f64) -> f64 {
    if extent <= 0.0 {
        return freq;
    }
    let low = (extent * freq).floor() / extent;
    let high = (extent * freq).ceil() / extent;
    if low > 0.0 && freq / low < high / freq {
        low
    } else {
        high
    }
}

/// Drop octaves whose frequency would fall below half a device pixel.
fn limit_octaves(requested: u32, freq: (f64, f64), device_to_user: Affine) -> u32 {
    let origin = device_to_user * Point::ORIGIN;
    let half_x = device_to_user * Point::new(0.5, 0.0) - origin;
    let half_y = device_to_user * Point::new(0.0, 0.5) - origin;
    let mut octaves = i64::from(requested);
    let axes = [
        (half_x.x.abs().max(half_y.x.abs()), freq.0),
        (half_x.y.abs().max(half_y.y.abs()), freq.1),
    ];
    for (d, f) in axes {
        if d > 0.0 && f > 0.0 {
            let max = -((d.ln() + f.ln()) / std::f64::consts::LN_2).round() as i64;
            octaves = octaves.min(max);
        }
    }
    if octaves < 1 && requested > 1 {
        octaves = 1;
    }
    octaves.clamp(0, i64::from(MAX_OCTAVES)) as u32
}

#[cfg(test)]
#[path = "../../tests/unit/ops/turbulence.rs"]
mod tests;
