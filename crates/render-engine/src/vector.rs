//! Second raster pass: the scene graph without its own background.

use image::imageops::FilterType;
use stage_design_model::ExportOptions;

use crate::error::ExportError;
use crate::scene::{SceneGraph, SceneRasterRequest};
use crate::surface::{check_allocation, resize_premultiplied, RasterSurface, DEFAULT_MAX_SURFACE_PIXELS};

#[derive(Debug, Clone)]
pub struct VectorLayerRasterizer {
    max_surface_pixels: u64,
}

impl Default for VectorLayerRasterizer {
    fn default() -> Self {
        Self::new()
    }
}

impl VectorLayerRasterizer {
    pub fn new() -> Self {
        Self {
            max_surface_pixels: DEFAULT_MAX_SURFACE_PIXELS,
        }
    }

    pub fn with_max_surface_pixels(mut self, max: u64) -> Self {
        self.max_surface_pixels = max;
        self
    }

    /// Device pixels per stage unit, chosen so the scene covers the target
    /// in both directions.
    pub fn pixel_ratio(native: (f64, f64), options: &ExportOptions) -> Result<f64, ExportError> {
        let (nw, nh) = native;
        if !(nw.is_finite() && nh.is_finite() && nw > 0.0 && nh > 0.0) {
            return Err(ExportError::scene(format!("scene has no area ({nw}x{nh})")));
        }
        let ratio = (options.export_width as f64 / nw).max(options.export_height as f64 / nh);
        Ok(options.scale * ratio)
    }

    /// Render every scene layer except the background at device size.
    pub fn rasterize(
        &self,
        scene: Option<&dyn SceneGraph>,
        options: &ExportOptions,
    ) -> Result<RasterSurface, ExportError> {
        let scene = scene.ok_or(ExportError::MissingRenderStage)?;
        let (width, height) = options.device_size();
        check_allocation(width as u64, height as u64, self.max_surface_pixels)?;

        let request = SceneRasterRequest {
            pixel_ratio: Self::pixel_ratio(scene.native_size(), options)?,
            exclude: scene.background_layer().into_iter().collect(),
        };
        let raw = scene.rasterize(&request)?;
        tracing::debug!(
            pixel_ratio = request.pixel_ratio,
            excluded = ?request.exclude,
            raw_width = raw.width(),
            raw_height = raw.height(),
            "Rasterized scene layers"
        );

        if raw.dimensions() == (width, height) {
            return Ok(RasterSurface::from_image(raw));
        }
        let resized = resize_premultiplied(&raw, width, height, FilterType::Lanczos3);
        Ok(RasterSurface::from_image(resized))
    }
}
