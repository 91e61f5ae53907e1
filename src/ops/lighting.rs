//! Bump-map lighting.
//!
//! The source alpha channel is read as a height field `Z = surface_scale * A`. Surface normals
//! come from Sobel gradients in stage space; rows or columns missing at the edge of the source
//! are replaced by the center line and the gradient factor renormalized. Light positions are in
//! user space, so the result does not depend on the render scale beyond sampling density.

use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::foundation::core::{Color, ColorSpace, PixelRect, Rect};
use crate::foundation::error::{FilterError, FilterResult};
use crate::geom::decompose::{ScaleSplit, decompose};
use crate::geom::region;
use crate::graph::context::RenderContext;
use crate::graph::node::{Filter, NodeView};
use crate::ops::{
    Arity, Capabilities, OpImpl, device_clip, finish_staged, finite, primary_bounds, render_area,
};
use crate::raster::buffer::{ColorModel, Raster};
use crate::raster::color::srgb_to_linear;

/// Light source illuminating the bump map.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Light {
    /// Infinitely distant light; angles in degrees.
    Distant {
        /// Direction in the XY plane, clockwise from the x axis.
        azimuth: f64,
        /// Angle above the XY plane.
        elevation: f64,
    },
    /// Positional light in user space.
    Point {
        /// X position.
        x: f64,
        /// Y position.
        y: f64,
        /// Height above the surface.
        z: f64,
    },
    /// Positional light aimed at a target, with optional cone.
    Spot {
        /// X position.
        x: f64,
        /// Y position.
        y: f64,
        /// Height above the surface.
        z: f64,
        /// Point the light is aimed at, `(x, y, z)`.
        points_at: (f64, f64, f64),
        /// Focus exponent of the spot.
        #[serde(default = "one")]
        specular_exponent: f64,
        /// Half-angle of the cone in degrees; unlimited when absent.
        #[serde(default)]
        limiting_cone_angle: Option<f64>,
    },
}

fn one() -> f64 {
    1.0
}

type Vec3 = [f64; 3];

fn normalize(v: Vec3) -> Vec3 {
    let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if len == 0.0 {
        v
    } else {
        [v[0] / len, v[1] / len, v[2] / len]
    }
}

fn dot(a: Vec3, b: Vec3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

impl Light {
    /// Distant light from `(azimuth, elevation)` degrees.
    pub fn distant(azimuth: f64, elevation: f64) -> Self {
        Light::Distant { azimuth, elevation }
    }

    /// Point light at `(x, y, z)`.
    pub fn point(x: f64, y: f64, z: f64) -> Self {
        Light::Point { x, y, z }
    }

    fn check(&self) -> FilterResult<()> {
        match *self {
            Light::Distant { azimuth, elevation } => {
                finite("light azimuth", azimuth)?;
                finite("light elevation", elevation)?;
            }
            Light::Point { x, y, z } => {
                for v in [x, y, z] {
                    finite("light position", v)?;
                }
            }
            Light::Spot {
                x,
                y,
                z,
                points_at,
                specular_exponent,
                limiting_cone_angle,
            } => {
                for v in [x, y, z, points_at.0, points_at.1, points_at.2] {
                    finite("spot light position", v)?;
                }
                finite("spot specular exponent", specular_exponent)?;
                if let Some(a) = limiting_cone_angle {
                    finite("spot cone angle", a)?;
                }
            }
        }
        Ok(())
    }

    /// Unit vector from surface point `p` toward the light.
    fn direction(&self, p: Vec3) -> Vec3 {
        match *self {
            Light::Distant { azimuth, elevation } => {
                let (az, el) = (azimuth.to_radians(), elevation.to_radians());
                [az.cos() * el.cos(), az.sin() * el.cos(), el.sin()]
            }
            Light::Point { x, y, z } | Light::Spot { x, y, z, .. } => {
                normalize([x - p[0], y - p[1], z - p[2]])
            }
        }
    }

    /// Light color reaching a surface point lit from direction `l`.
    fn color(&self, l: Vec3, base: Vec3) -> Vec3 {
        let Light::Spot {
            x,
            y,
            z,
            points_at,
            specular_exponent,
            limiting_cone_angle,
        } = *self
        else {
            return base;
        };
        let s = normalize([points_at.0 - x, points_at.1 - y, points_at.2 - z]);
        let minus_l_dot_s = -dot(l, s);
        if minus_l_dot_s <= 0.0 {
            return [0.0; 3];
        }
        if let Some(cone) = limiting_cone_angle
            && minus_l_dot_s < cone.abs().to_radians().cos()
        {
            return [0.0; 3];
        }
        let f = minus_l_dot_s.powf(specular_exponent);
        [base[0] * f, base[1] * f, base[2] * f]
    }
}

/// Diffuse (Lambertian) lighting; the result is opaque.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DiffuseLighting {
    /// Height of a fully opaque pixel.
    pub surface_scale: f64,
    /// `kd` in the Phong model; non-negative.
    pub diffuse_constant: f64,
    /// User-space size of one bump-map cell; caps the stage scale.
    pub kernel_unit_length: Option<(f64, f64)>,
    /// Light source.
    pub light: Light,
    /// Light color, sRGB.
    pub color: Color,
    /// Space the lighting runs in.
    pub color_space: ColorSpace,
}

impl DiffuseLighting {
    /// White diffuse light with surface scale 1 and `kd = 1`.
    pub fn new(light: Light) -> FilterResult<Self> {
        let op = Self {
            surface_scale: 1.0,
            diffuse_constant: 1.0,
            kernel_unit_length: None,
            light,
            color: Color::WHITE,
            color_space: ColorSpace::Srgb,
        };
        op.check()?;
        Ok(op)
    }

    /// Set the surface scale.
    pub fn with_surface_scale(mut self, scale: f64) -> FilterResult<Self> {
        self.surface_scale = scale;
        self.check()?;
        Ok(self)
    }

    /// Set `kd`.
    pub fn with_diffuse_constant(mut self, kd: f64) -> FilterResult<Self> {
        self.diffuse_constant = kd;
        self.check()?;
        Ok(self)
    }

    /// Set the light color.
    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    /// Cap the bump-map resolution.
    pub fn with_kernel_unit_length(mut self, dx: f64, dy: f64) -> FilterResult<Self> {
        self.kernel_unit_length = Some((dx, dy));
        self.check()?;
        Ok(self)
    }

    /// Same lighting, in `space`.
    pub fn in_space(mut self, space: ColorSpace) -> Self {
        self.color_space = space;
        self
    }

    fn shading(&self) -> Shading<'_> {
        Shading {
            surface_scale: self.surface_scale,
            kernel_unit_length: self.kernel_unit_length,
            light: &self.light,
            color: self.color,
            color_space: self.color_space,
            reflection: Reflection::Diffuse {
                kd: self.diffuse_constant,
            },
        }
    }
}

/// Specular (Blinn-Phong) lighting; alpha is the brightest channel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpecularLighting {
    /// Height of a fully opaque pixel.
    pub surface_scale: f64,
    /// `ks` in the Phong model; non-negative.
    pub specular_constant: f64,
    /// Shininess, in `[1, 128]`.
    pub specular_exponent: f64,
    /// User-space size of one bump-map cell; caps the stage scale.
    pub kernel_unit_length: Option<(f64, f64)>,
    /// Light source.
    pub light: Light,
    /// Light color, sRGB.
    pub color: Color,
    /// Space the lighting runs in.
    pub color_space: ColorSpace,
}

impl SpecularLighting {
    /// White specular light with surface scale 1, `ks = 1` and exponent 1.
    pub fn new(light: Light) -> FilterResult<Self> {
        let op = Self {
            surface_scale: 1.0,
            specular_constant: 1.0,
            specular_exponent: 1.0,
            kernel_unit_length: None,
            light,
            color: Color::WHITE,
            color_space: ColorSpace::Srgb,
        };
        op.check()?;
        Ok(op)
    }

    /// Set the surface scale.
    pub fn with_surface_scale(mut self, scale: f64) -> FilterResult<Self> {
        self.surface_scale = scale;
        self.check()?;
        Ok(self)
    }

    /// Set `ks` and the shininess exponent.
    pub fn with_specular(mut self, ks: f64, exponent: f64) -> FilterResult<Self> {
        self.specular_constant = ks;
        self.specular_exponent = exponent;
        self.check()?;
        Ok(self)
    }

    /// Set the light color.
    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    /// Cap the bump-map resolution.
    pub fn with_kernel_unit_length(mut self, dx: f64, dy: f64) -> FilterResult<Self> {
        self.kernel_unit_length = Some((dx, dy));
        self.check()?;
        Ok(self)
    }

    /// Same lighting, in `space`.
    pub fn in_space(mut self, space: ColorSpace) -> Self {
        self.color_space = space;
        self
    }

    fn shading(&self) -> Shading<'_> {
        Shading {
            surface_scale: self.surface_scale,
            kernel_unit_length: self.kernel_unit_length,
            light: &self.light,
            color: self.color,
            color_space: self.color_space,
            reflection: Reflection::Specular {
                ks: self.specular_constant,
                exponent: self.specular_exponent,
            },
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum Reflection {
    Diffuse { kd: f64 },
    Specular { ks: f64, exponent: f64 },
}

/// Parameters shared by both lighting operators.
struct Shading<'a> {
    surface_scale: f64,
    kernel_unit_length: Option<(f64, f64)>,
    light: &'a Light,
    color: Color,
    color_space: ColorSpace,
    reflection: Reflection,
}

/// Stage-space height field with the extent of the whole source.
struct HeightField<'a> {
    alpha: &'a Raster,
    data: PixelRect,
}

impl HeightField<'_> {
    fn at(&self, x: i32, y: i32) -> f64 {
        f64::from(self.alpha.pixel(x, y)[3]) / 255.0
    }

    /// Sobel gradient `(dx, dy)` of alpha at `(x, y)`, on the scale of the SVG normal factors
    /// (twice the per-pixel slope).
    fn gradient(&self, x: i32, y: i32) -> (f64, f64) {
        let d = self.data;
        let xl = if x > d.x { x - 1 } else { x };
        let xr = if x + 1 < d.x1() { x + 1 } else { x };
        let yt = if y > d.y { y - 1 } else { y };
        let yb = if y + 1 < d.y1() { y + 1 } else { y };

        // Row weights 1-2-1 collapse to 2-1 when a neighbour row is missing.
        let rows: [(i32, f64); 3] = [(yt, 1.0), (y, 2.0), (yb, 1.0)];
        let cols: [(i32, f64); 3] = [(xl, 1.0), (x, 2.0), (xr, 1.0)];
        let rows = rows.iter().filter(|(ry, w)| *ry != y || *w == 2.0);
        let cols = cols.iter().filter(|(cx, w)| *cx != x || *w == 2.0);

        let (mut gx, mut wx) = (0.0, 0.0);
        for &(ry, w) in rows {
            gx += w * (self.at(xr, ry) - self.at(xl, ry));
            wx += w;
        }
        let (mut gy, mut wy) = (0.0, 0.0);
        for &(cx, w) in cols {
            gy += w * (self.at(cx, yb) - self.at(cx, yt));
            wy += w;
        }
        let span_x = f64::from((xr - xl).max(1));
        let span_y = f64::from((yb - yt).max(1));
        let gx = if xr == xl { 0.0 } else { 2.0 * gx / (wx * span_x) };
        let gy = if yb == yt { 0.0 } else { 2.0 * gy / (wy * span_y) };
        (gx, gy)
    }
}

impl Shading<'_> {
    fn check(&self) -> FilterResult<()> {
        finite("surface scale", self.surface_scale)?;
        match self.reflection {
            Reflection::Diffuse { kd } => {
                if !(kd.is_finite() && kd >= 0.0) {
                    return Err(FilterError::validation(
                        "diffuse constant must be finite and >= 0",
                    ));
                }
            }
            Reflection::Specular { ks, exponent } => {
                if !(ks.is_finite() && ks >= 0.0) {
                    return Err(FilterError::validation(
                        "specular constant must be finite and >= 0",
                    ));
                }
                if !(1.0..=128.0).contains(&exponent) {
                    return Err(FilterError::validation(
                        "specular exponent must be in [1, 128]",
                    ));
                }
            }
        }
        if let Some((dx, dy)) = self.kernel_unit_length
            && !(dx.is_finite() && dy.is_finite() && dx > 0.0 && dy > 0.0)
        {
            return Err(FilterError::validation(
                "kernel unit length must be finite and > 0",
            ));
        }
        self.light.check()
    }

    fn spread(&self) -> (f64, f64) {
        self.kernel_unit_length.unwrap_or((1.0, 1.0))
    }

    fn base_color(&self, space: ColorSpace) -> Vec3 {
        let c = [self.color.r, self.color.g, self.color.b];
        let c = match space {
            ColorSpace::Srgb => c,
            ColorSpace::LinearRgb => c.map(srgb_to_linear),
        };
        c.map(|v| f64::from(v.clamp(0.0, 1.0)))
    }

    fn shade(&self, n: Vec3, l: Vec3, light: Vec3) -> [u8; 4] {
        let q = |v: f64| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        match self.reflection {
            Reflection::Diffuse { kd } => {
                let f = kd * dot(n, l);
                [q(f * light[0]), q(f * light[1]), q(f * light[2]), 255]
            }
            Reflection::Specular { ks, exponent } => {
                let h = normalize([l[0], l[1], l[2] + 1.0]);
                let n_dot_h = dot(n, h).max(0.0);
                let f = ks * n_dot_h.powf(exponent);
                let [r, g, b] = [q(f * light[0]), q(f * light[1]), q(f * light[2])];
                let a = r.max(g).max(b);
                let pm = |c: u8| ((u16::from(c) * u16::from(a) + 127) / 255) as u8;
                [pm(r), pm(g), pm(b), a]
            }
        }
    }

    fn stage(&self, split: ScaleSplit) -> ScaleSplit {
        match self.kernel_unit_length {
            Some((ux, uy)) => split.clamp_scale(1.0 / ux, 1.0 / uy),
            None => split,
        }
    }

    fn render(
        &self,
        node: &NodeView<'_>,
        ctx: &RenderContext,
    ) -> FilterResult<Option<Arc<Raster>>> {
        let src = &node.sources[0];
        let Some(area) = render_area(ctx, src.bounds()) else {
            return Ok(None);
        };
        let Some(clip) = device_clip(ctx, area) else {
            return Ok(None);
        };
        let Some(split) = decompose(ctx.transform()) else {
            return Ok(None);
        };
        let split = self.stage(split);

        let out_rect = region::device_rect(split.stage, area);
        let work_rect = out_rect.outset(1, 1);
        let Some(src_area) = region::user_rect(split.stage, work_rect)
            .and_then(|w| region::intersect(w, src.bounds()))
        else {
            return Ok(None);
        };
        let stage_ctx = ctx
            .with_transform(split.stage)
            .with_area_of_interest(src_area);
        let Some(rendered) = src.render_in(&stage_ctx)? else {
            return Ok(None);
        };
        let field = HeightField {
            alpha: &rendered,
            data: region::device_rect(split.stage, src.bounds()).intersect(work_rect),
        };

        let space = ctx.op_space(self.color_space);
        let base = self.base_color(space);
        let (sx, sy) = (split.sx, split.sy);
        let (ssx, ssy) = (self.surface_scale * sx, self.surface_scale * sy);
        let mut out = Raster::transparent(out_rect, ColorModel::premul(space));
        let stride = out_rect.width as usize * 4;
        out.data_mut()
            .par_chunks_mut(stride)
            .enumerate()
            .for_each(|(ly, row)| {
                let y = out_rect.y + ly as i32;
                for lx in 0..out_rect.width as usize {
                    let x = out_rect.x + lx as i32;
                    let (gx, gy) = field.gradient(x, y);
                    let n = normalize([-ssx * gx, -ssy * gy, 1.0]);
                    let surface = [
                        (f64::from(x) + 0.5) / sx,
                        (f64::from(y) + 0.5) / sy,
                        self.surface_scale * field.at(x, y),
                    ];
                    let l = self.light.direction(surface);
                    let light = self.light.color(l, base);
                    row[lx * 4..lx * 4 + 4].copy_from_slice(&self.shade(n, l, light));
                }
            });
        Ok(finish_staged(out, &split, clip, ctx))
    }
}

impl OpImpl for DiffuseLighting {
    fn name(&self) -> &'static str {
        "diffuse_lighting"
    }

    fn arity(&self) -> Arity {
        Arity::Exact(1)
    }

    fn check(&self) -> FilterResult<()> {
        self.shading().check()
    }

    fn bounds(&self, sources: &[Filter]) -> Rect {
        primary_bounds(sources)
    }

    fn spread(&self, _index: usize) -> (f64, f64) {
        self.shading().spread()
    }

    fn capabilities(&self, _sources: &[Filter]) -> Capabilities {
        Capabilities::COLOR_SPACE_AWARE
    }

    fn cacheable(&self) -> bool {
        true
    }

    fn render(&self, node: &NodeView<'_>, ctx: &RenderContext) -> FilterResult<Option<Arc<Raster>>> {
        self.shading().render(node, ctx)
    }
}

impl OpImpl for SpecularLighting {
    fn name(&self) -> &'static str {
        "specular_lighting"
    }

    fn arity(&self) -> Arity {
        Arity::Exact(1)
    }

    fn check(&self) -> FilterResult<()> {
        self.shading().check()
    }

    fn bounds(&self, sources: &[Filter]) -> Rect {
        primary_bounds(sources)
    }

    fn spread(&self, _index: usize) -> (f64, f64) {
        self.shading().spread()
    }

    fn capabilities(&self, _sources: &[Filter]) -> Capabilities {
        Capabilities::COLOR_SPACE_AWARE
    }

    fn cacheable(&self) -> bool {
        true
    }

    fn render(&self, node: &NodeView<'_>, ctx: &RenderContext) -> FilterResult<Option<Arc<Raster>>> {
        self.shading().render(node, ctx)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/ops/lighting.rs"]
mod tests;
