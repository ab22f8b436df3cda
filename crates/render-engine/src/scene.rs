//! Retained scene graph holding the user's image.
//!
//! A [`SceneGraph`] renders itself at any pixel ratio with some layers left
//! out for that one call. [`Stage`] is the in-crate implementation: ordered
//! layers of image, rectangle and frame nodes in stage units, where
//! `layers[0]` is the stage's own background.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use image::imageops::FilterType;
use image::RgbaImage;
use stage_design_model::{ColorValue, DeviceRgba, ImageFit, NodeBox, NodeDescription, SceneDescription};

use crate::assets::{load_bounded, ImageSource};
use crate::cancel::CancelToken;
use crate::error::ExportError;
use crate::normalize::StyleNormalizer;
use crate::surface::{
    apply_clip, check_allocation, draw_layer, fill_rounded_rect, resize_premultiplied,
    stroke_rounded_rect, RoundedRect, DEFAULT_MAX_SURFACE_PIXELS,
};

pub type LayerId = usize;

/// Per-call render options.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneRasterRequest {
    /// Device pixels per stage unit.
    pub pixel_ratio: f64,
    /// Layers left out of this render only.
    pub exclude: Vec<LayerId>,
}

/// A scene that can rasterize itself.
pub trait SceneGraph: Send + Sync + fmt::Debug {
    /// Native display size in stage units.
    fn native_size(&self) -> (f64, f64);

    /// The layer holding the scene's own background, if any.
    fn background_layer(&self) -> Option<LayerId>;

    /// Render every visible, non-excluded layer to
    /// `round(native * pixel_ratio)` pixels.
    fn rasterize(&self, request: &SceneRasterRequest) -> Result<RgbaImage, ExportError>;
}

#[derive(Debug, Clone)]
pub enum StageNode {
    Image {
        image: Arc<RgbaImage>,
        bounds: NodeBox,
        fit: ImageFit,
        corner_radius: f64,
        opacity: f64,
    },
    Rect {
        bounds: NodeBox,
        fill: ColorValue,
        corner_radius: f64,
        opacity: f64,
    },
    Frame {
        bounds: NodeBox,
        stroke: ColorValue,
        stroke_width: f64,
        corner_radius: f64,
        opacity: f64,
    },
}

#[derive(Debug, Clone)]
pub struct StageLayer {
    pub name: String,
    pub visible: bool,
    pub nodes: Vec<StageNode>,
}

#[derive(Debug, Clone)]
pub struct Stage {
    width: f64,
    height: f64,
    layers: Vec<StageLayer>,
    max_surface_pixels: u64,
}

impl Stage {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            layers: Vec::new(),
            max_surface_pixels: DEFAULT_MAX_SURFACE_PIXELS,
        }
    }

    pub fn with_max_surface_pixels(mut self, max: u64) -> Self {
        self.max_surface_pixels = max;
        self
    }

    pub fn add_layer(&mut self, name: impl Into<String>) -> LayerId {
        self.layers.push(StageLayer {
            name: name.into(),
            visible: true,
            nodes: Vec::new(),
        });
        self.layers.len() - 1
    }

    pub fn layer_mut(&mut self, id: LayerId) -> Option<&mut StageLayer> {
        self.layers.get_mut(id)
    }

    pub fn layers(&self) -> &[StageLayer] {
        &self.layers
    }

    /// Build a stage from its description, loading every image through
    /// `source`. Images that fail to load are left out.
    pub async fn from_description(
        description: &SceneDescription,
        source: Arc<dyn ImageSource>,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> Result<Self, ExportError> {
        let mut stage = Stage::new(description.width, description.height);
        for layer in &description.layers {
            let id = stage.add_layer(layer.name.clone());
            let mut nodes = Vec::with_capacity(layer.nodes.len());
            for node in &layer.nodes {
                let built = match node {
                    NodeDescription::Image {
                        source: reference,
                        bounds,
                        fit,
                        corner_radius,
                        opacity,
                    } => load_bounded(source.clone(), reference.clone(), timeout, cancel)
                        .await?
                        .map(|image| StageNode::Image {
                            image,
                            bounds: *bounds,
                            fit: *fit,
                            corner_radius: *corner_radius,
                            opacity: *opacity,
                        }),
                    NodeDescription::Rect {
                        bounds,
                        fill,
                        corner_radius,
                        opacity,
                    } => Some(StageNode::Rect {
                        bounds: *bounds,
                        fill: fill.clone(),
                        corner_radius: *corner_radius,
                        opacity: *opacity,
                    }),
                    NodeDescription::Frame {
                        bounds,
                        stroke,
                        stroke_width,
                        corner_radius,
                        opacity,
                    } => Some(StageNode::Frame {
                        bounds: *bounds,
                        stroke: stroke.clone(),
                        stroke_width: *stroke_width,
                        corner_radius: *corner_radius,
                        opacity: *opacity,
                    }),
                };
                nodes.extend(built);
            }
            if let Some(target) = stage.layer_mut(id) {
                target.visible = layer.visible;
                target.nodes = nodes;
            }
        }
        tracing::debug!(
            layers = stage.layers.len(),
            width = stage.width,
            height = stage.height,
            "Built stage from description"
        );
        Ok(stage)
    }

    fn draw_node(&self, canvas: &mut RgbaImage, node: &StageNode, ratio: f64) -> Result<(), ExportError> {
        match node {
            StageNode::Image {
                image,
                bounds,
                fit,
                corner_radius,
                opacity,
            } => self.draw_image(canvas, image, scaled(bounds, ratio), *fit, corner_radius * ratio, *opacity),
            StageNode::Rect {
                bounds,
                fill,
                corner_radius,
                opacity,
            } => {
                if let Some(color) = device_color(fill) {
                    let b = scaled(bounds, ratio);
                    let rect = RoundedRect::new(b.x, b.y, b.width, b.height, corner_radius * ratio);
                    fill_rounded_rect(canvas, rect, color, unit(*opacity));
                }
                Ok(())
            }
            StageNode::Frame {
                bounds,
                stroke,
                stroke_width,
                corner_radius,
                opacity,
            } => {
                if let Some(color) = device_color(stroke) {
                    let b = scaled(bounds, ratio);
                    let rect = RoundedRect::new(b.x, b.y, b.width, b.height, corner_radius * ratio);
                    stroke_rounded_rect(canvas, rect, stroke_width * ratio, color, unit(*opacity));
                }
                Ok(())
            }
        }
    }

    fn draw_image(
        &self,
        canvas: &mut RgbaImage,
        image: &RgbaImage,
        bounds: NodeBox,
        fit: ImageFit,
        radius: f64,
        opacity: f64,
    ) -> Result<(), ExportError> {
        let (iw, ih) = (image.width() as f64, image.height() as f64);
        if bounds.width < 0.5 || bounds.height < 0.5 || iw == 0.0 || ih == 0.0 {
            return Ok(());
        }
        let placed = match fit {
            ImageFit::Fill => bounds,
            ImageFit::Contain | ImageFit::Cover => {
                let s = if fit == ImageFit::Contain {
                    (bounds.width / iw).min(bounds.height / ih)
                } else {
                    (bounds.width / iw).max(bounds.height / ih)
                };
                let (w, h) = (iw * s, ih * s);
                NodeBox::new(
                    bounds.x + (bounds.width - w) / 2.0,
                    bounds.y + (bounds.height - h) / 2.0,
                    w,
                    h,
                )
            }
        };
        // Cover crops to the node box; the others clip to the drawn image.
        let clip = if fit == ImageFit::Cover { bounds } else { placed };

        let rw = placed.width.round().max(1.0) as u64;
        let rh = placed.height.round().max(1.0) as u64;
        check_allocation(rw, rh, self.max_surface_pixels)?;
        let resized = resize_premultiplied(image, rw as u32, rh as u32, FilterType::CatmullRom);

        let cx0 = clip.x.floor();
        let cy0 = clip.y.floor();
        let cw = ((clip.x + clip.width).ceil() - cx0).max(1.0) as u64;
        let ch = ((clip.y + clip.height).ceil() - cy0).max(1.0) as u64;
        check_allocation(cw, ch, self.max_surface_pixels)?;
        let (cw, ch) = (cw as u32, ch as u32);

        let mut layer = RgbaImage::new(cw, ch);
        draw_layer(
            &mut layer,
            &resized,
            (placed.x - cx0).round() as i64,
            (placed.y - cy0).round() as i64,
            1.0,
        );
        let mask = RoundedRect::new(clip.x - cx0, clip.y - cy0, clip.width, clip.height, radius).mask(cw, ch);
        apply_clip(&mut layer, &mask);
        draw_layer(canvas, &layer, cx0 as i64, cy0 as i64, unit(opacity));
        Ok(())
    }
}

impl SceneGraph for Stage {
    fn native_size(&self) -> (f64, f64) {
        (self.width, self.height)
    }

    fn background_layer(&self) -> Option<LayerId> {
        (!self.layers.is_empty()).then_some(0)
    }

    fn rasterize(&self, request: &SceneRasterRequest) -> Result<RgbaImage, ExportError> {
        let ratio = request.pixel_ratio;
        if !(ratio.is_finite() && ratio > 0.0) {
            return Err(ExportError::scene(format!("invalid pixel ratio {ratio}")));
        }
        let width = (self.width * ratio).round().max(1.0);
        let height = (self.height * ratio).round().max(1.0);
        check_allocation(width as u64, height as u64, self.max_surface_pixels)?;

        let mut canvas = RgbaImage::new(width as u32, height as u32);
        for (id, layer) in self.layers.iter().enumerate() {
            if !layer.visible || request.exclude.contains(&id) {
                continue;
            }
            for node in &layer.nodes {
                self.draw_node(&mut canvas, node, ratio)?;
            }
        }
        Ok(canvas)
    }
}

fn scaled(bounds: &NodeBox, ratio: f64) -> NodeBox {
    NodeBox::new(
        bounds.x * ratio,
        bounds.y * ratio,
        bounds.width * ratio,
        bounds.height * ratio,
    )
}

fn unit(opacity: f64) -> f32 {
    if opacity.is_finite() {
        opacity.clamp(0.0, 1.0) as f32
    } else {
        1.0
    }
}

fn device_color(color: &ColorValue) -> Option<DeviceRgba> {
    let device = StyleNormalizer::resolve_color(color).to_device();
    if device.is_none() {
        tracing::warn!(value = %color, "Unrecognized scene color, painting nothing");
    }
    device
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MemoryImageSource;
    use image::Rgba;
    use stage_design_model::ImageRef;

    fn request(ratio: f64, exclude: Vec<LayerId>) -> SceneRasterRequest {
        SceneRasterRequest {
            pixel_ratio: ratio,
            exclude,
        }
    }

    fn stage_with_background() -> Stage {
        let mut stage = Stage::new(40.0, 20.0);
        let bg = stage.add_layer("background");
        let content = stage.add_layer("content");
        stage.layer_mut(bg).unwrap().nodes.push(StageNode::Rect {
            bounds: NodeBox::new(0.0, 0.0, 40.0, 20.0),
            fill: ColorValue::parse("white"),
            corner_radius: 0.0,
            opacity: 1.0,
        });
        stage.layer_mut(content).unwrap().nodes.push(StageNode::Rect {
            bounds: NodeBox::new(10.0, 5.0, 20.0, 10.0),
            fill: ColorValue::parse("oklch(0.628 0.2577 29.23)"),
            corner_radius: 0.0,
            opacity: 1.0,
        });
        stage
    }

    #[test]
    fn test_rasterize_scales_by_pixel_ratio() {
        let stage = stage_with_background();
        let image = stage.rasterize(&request(2.0, vec![])).unwrap();
        assert_eq!(image.dimensions(), (80, 40));
        assert_eq!(image.get_pixel(0, 0).0, [255, 255, 255, 255]);
        let center = image.get_pixel(40, 20).0;
        assert!(center[0] >= 250 && center[1] <= 5, "center {center:?}");
    }

    #[test]
    fn test_excluded_layer_is_skipped_without_mutation() {
        let stage = stage_with_background();
        let image = stage.rasterize(&request(1.0, vec![0])).unwrap();
        assert_eq!(image.get_pixel(0, 0).0[3], 0);
        assert_eq!(image.get_pixel(20, 10).0[3], 255);
        // The next render still sees the background layer.
        let again = stage.rasterize(&request(1.0, vec![])).unwrap();
        assert_eq!(again.get_pixel(0, 0).0[3], 255);
        assert!(stage.layers()[0].visible);
    }

    #[test]
    fn test_hidden_layers_do_not_render() {
        let mut stage = stage_with_background();
        stage.layer_mut(1).unwrap().visible = false;
        let image = stage.rasterize(&request(1.0, vec![0])).unwrap();
        assert!(image.pixels().all(|p| p.0[3] == 0));
    }

    #[test]
    fn test_contain_fit_letterboxes() {
        let mut stage = Stage::new(40.0, 20.0);
        let layer = stage.add_layer("content");
        stage.layer_mut(layer).unwrap().nodes.push(StageNode::Image {
            image: Arc::new(RgbaImage::from_pixel(10, 10, Rgba([0, 0, 255, 255]))),
            bounds: NodeBox::new(0.0, 0.0, 40.0, 20.0),
            fit: ImageFit::Contain,
            corner_radius: 0.0,
            opacity: 1.0,
        });
        let image = stage.rasterize(&request(1.0, vec![])).unwrap();
        assert_eq!(image.get_pixel(20, 10).0, [0, 0, 255, 255]);
        assert_eq!(image.get_pixel(2, 10).0[3], 0);
        assert_eq!(image.get_pixel(37, 10).0[3], 0);
    }

    #[test]
    fn test_cover_fit_fills_box() {
        let mut stage = Stage::new(40.0, 20.0);
        let layer = stage.add_layer("content");
        stage.layer_mut(layer).unwrap().nodes.push(StageNode::Image {
            image: Arc::new(RgbaImage::from_pixel(10, 10, Rgba([0, 0, 255, 255]))),
            bounds: NodeBox::new(0.0, 0.0, 40.0, 20.0),
            fit: ImageFit::Cover,
            corner_radius: 0.0,
            opacity: 1.0,
        });
        let image = stage.rasterize(&request(1.0, vec![])).unwrap();
        assert!(image.pixels().all(|p| p.0 == [0, 0, 255, 255]));
    }

    #[test]
    fn test_invalid_ratio_and_oversized_render_fail() {
        let stage = stage_with_background();
        assert!(matches!(
            stage.rasterize(&request(0.0, vec![])),
            Err(ExportError::Scene { .. })
        ));
        let small = stage_with_background().with_max_surface_pixels(100);
        assert!(matches!(
            small.rasterize(&request(1.0, vec![])),
            Err(ExportError::CanvasContextUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_from_description_skips_unloadable_images() {
        let mut description = SceneDescription::with_centered_image(
            100.0,
            50.0,
            ImageRef::new("missing.png"),
            0.1,
            8.0,
        );
        description.layers[1].nodes.push(NodeDescription::Frame {
            bounds: NodeBox::new(0.0, 0.0, 100.0, 50.0),
            stroke: ColorValue::parse("black"),
            stroke_width: 2.0,
            corner_radius: 0.0,
            opacity: 1.0,
        });
        let source: Arc<dyn ImageSource> = Arc::new(MemoryImageSource::new());
        let stage = Stage::from_description(&description, source, Duration::from_secs(1), &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(stage.layers().len(), 2);
        assert_eq!(stage.layers()[1].nodes.len(), 1);
        assert!(matches!(stage.layers()[1].nodes[0], StageNode::Frame { .. }));
    }

    #[tokio::test]
    async fn test_from_description_loads_images() {
        let description = SceneDescription::with_centered_image(
            100.0,
            50.0,
            ImageRef::new("shot.png"),
            0.0,
            0.0,
        );
        let source: Arc<dyn ImageSource> = Arc::new(
            MemoryImageSource::new().with("shot.png", RgbaImage::from_pixel(4, 2, Rgba([9, 9, 9, 255]))),
        );
        let stage = Stage::from_description(&description, source, Duration::from_secs(1), &CancelToken::new())
            .await
            .unwrap();
        let image = stage.rasterize(&request(1.0, vec![0])).unwrap();
        assert_eq!(image.get_pixel(50, 25).0, [9, 9, 9, 255]);
    }
}
