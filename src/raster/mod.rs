/// Premultiplied pixel compositing helpers.
pub mod blend;
/// Raster storage and color model.
pub mod buffer;
/// Color-space transfer curves and alpha premultiplication.
pub mod color;
/// Affine resampling of rasters.
pub mod resample;
/// Drawing surface and painter interfaces.
pub mod surface;
