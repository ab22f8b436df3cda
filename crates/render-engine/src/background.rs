//! First raster pass: card background and text overlays.
//!
//! The request is turned into a style scaffold (container, base fill,
//! optional blurred image layer, one node per overlay), normalized to
//! device colors, then painted bottom to top and clipped to the card's
//! rounded corners.

use std::sync::Arc;

use image::imageops::FilterType;
use image::{Rgba, RgbaImage};
use stage_design_model::{
    BackgroundConfig, BackgroundFill, ColorValue, DeviceRgba, ExportOptions, FontWeight,
    LinearGradient, Orientation, TextOverlay,
};

use crate::error::ExportError;
use crate::normalize::StyleNormalizer;
use crate::style::{
    NodeRole, ShadowValue, StyleMap, StyleNode, StyleProperty, StyleTree, StyleValue, Stylesheet,
};
use crate::surface::{
    apply_clip, blend_pixel, blur_premultiplied, card_clip, draw_layer, resize_premultiplied,
    RasterSurface, DEFAULT_MAX_SURFACE_PIXELS,
};
use crate::text::{draw_text_centered, FontBook, ShadowPaint, TextPaint};

const VERTICAL_RL: &str = "vertical-rl";
const HORIZONTAL_TB: &str = "horizontal-tb";

/// Everything the background pass reads, captured before it starts.
#[derive(Debug, Clone)]
pub struct BackgroundSnapshot {
    pub options: ExportOptions,
    pub background: BackgroundConfig,
    /// Card corner radius in logical pixels.
    pub border_radius: f64,
    pub overlays: Vec<TextOverlay>,
    /// Decoded background image, if the config references one and it loaded.
    pub image: Option<Arc<RgbaImage>>,
}

#[derive(Debug, Clone)]
pub struct BackgroundRasterizer {
    fonts: Arc<FontBook>,
    sheets: Vec<Stylesheet>,
    max_surface_pixels: u64,
}

impl BackgroundRasterizer {
    pub fn new(fonts: Arc<FontBook>) -> Self {
        Self {
            fonts,
            sheets: Vec::new(),
            max_surface_pixels: DEFAULT_MAX_SURFACE_PIXELS,
        }
    }

    /// Host stylesheets cascading into the scaffold.
    pub fn with_stylesheets(mut self, sheets: Vec<Stylesheet>) -> Self {
        self.sheets = sheets;
        self
    }

    pub fn with_max_surface_pixels(mut self, max: u64) -> Self {
        self.max_surface_pixels = max;
        self
    }

    /// Build the style scaffold in logical pixels.
    pub fn scaffold(&self, snapshot: &BackgroundSnapshot) -> StyleTree {
        let width = snapshot.options.export_width as f64;
        let height = snapshot.options.export_height as f64;
        let background = &snapshot.background;
        let opacity = StyleValue::Number(background.effective_opacity());

        let mut nodes = vec![StyleNode::new(
            NodeRole::Container,
            StyleMap::new()
                .with(StyleProperty::Width, StyleValue::Length(width))
                .with(StyleProperty::Height, StyleValue::Length(height))
                .with(
                    StyleProperty::BorderRadius,
                    StyleValue::Length(snapshot.border_radius.max(0.0)),
                ),
        )];

        let mut base = StyleMap::new().with(StyleProperty::Opacity, opacity.clone());
        let mut blurred = None;
        match background.resolve() {
            BackgroundFill::Color(color) => {
                base.set(StyleProperty::BackgroundColor, StyleValue::Color(color));
            }
            BackgroundFill::Gradient(gradient) => {
                base.set(StyleProperty::BackgroundImage, StyleValue::Gradient(gradient));
            }
            // With blur the image moves to its own layer and the base keeps
            // only color and opacity.
            BackgroundFill::Image(reference) if background.has_blur() => {
                blurred = Some(
                    StyleMap::new()
                        .with(StyleProperty::BackgroundImage, StyleValue::Image(reference))
                        .with(StyleProperty::Filter, StyleValue::Blur(background.effective_blur()))
                        .with(StyleProperty::Opacity, opacity),
                );
            }
            BackgroundFill::Image(reference) => {
                base.set(StyleProperty::BackgroundImage, StyleValue::Image(reference));
            }
            BackgroundFill::None => {}
        }
        nodes.push(StyleNode::new(NodeRole::BaseFill, base));
        if let Some(style) = blurred {
            nodes.push(StyleNode::new(NodeRole::BlurredImage, style));
        }

        for (index, overlay) in snapshot.overlays.iter().enumerate() {
            if !overlay.contributes() {
                continue;
            }
            let (left, top) = overlay.position.to_absolute(width, height);
            let mut style = StyleMap::new()
                .with(StyleProperty::Left, StyleValue::Length(left))
                .with(StyleProperty::Top, StyleValue::Length(top))
                .with(StyleProperty::FontSize, StyleValue::Length(overlay.font_size))
                .with(StyleProperty::FontWeight, StyleValue::Number(overlay.font_weight.0 as f64))
                .with(StyleProperty::FontFamily, StyleValue::Keyword(overlay.font_family.clone()))
                .with(StyleProperty::Color, StyleValue::Color(overlay.color.clone()))
                .with(StyleProperty::Opacity, StyleValue::Number(overlay.effective_opacity()))
                .with(
                    StyleProperty::WritingMode,
                    StyleValue::Keyword(
                        match overlay.orientation {
                            Orientation::Horizontal => HORIZONTAL_TB,
                            Orientation::Vertical => VERTICAL_RL,
                        }
                        .to_string(),
                    ),
                );
            if overlay.shadow.enabled {
                style.set(
                    StyleProperty::TextShadow,
                    StyleValue::Shadow(ShadowValue {
                        offset_x: overlay.shadow.offset_x,
                        offset_y: overlay.shadow.offset_y,
                        blur: overlay.shadow.blur,
                        color: overlay.shadow.color.clone(),
                    }),
                );
            }
            nodes.push(StyleNode {
                role: NodeRole::Text { overlay: index },
                style,
                text: Some(overlay.text.clone()),
            });
        }

        StyleTree {
            sheets: self.sheets.clone(),
            nodes,
        }
    }

    /// Paint the background pass at device resolution.
    pub fn rasterize(&self, snapshot: &BackgroundSnapshot) -> Result<RasterSurface, ExportError> {
        let (width, height) = snapshot.options.device_size();
        let scale = snapshot.options.scale;
        let mut surface = RasterSurface::allocate(width, height, self.max_surface_pixels)?;

        let computed = StyleNormalizer::snapshot(&self.scaffold(snapshot));
        tracing::debug!(
            nodes = computed.nodes.len(),
            width,
            height,
            "Painting background scaffold"
        );

        let mut radius = 0.0;
        for node in &computed.nodes {
            match node.role {
                NodeRole::Container => {
                    radius = node.style.f64_or(StyleProperty::BorderRadius, 0.0) * scale;
                }
                NodeRole::BaseFill => {
                    let layer = paint_fill(node, snapshot.image.as_deref(), width, height);
                    draw_layer(surface.image_mut(), &layer, 0, 0, opacity_of(node));
                }
                NodeRole::BlurredImage => {
                    let Some(image) = snapshot.image.as_deref() else {
                        continue;
                    };
                    let mut layer = RgbaImage::new(width, height);
                    draw_cover(&mut layer, image);
                    let sigma = (node.style.f64_or(StyleProperty::Filter, 0.0) * scale) as f32;
                    if sigma > 0.0 {
                        layer = blur_premultiplied(layer, sigma);
                    }
                    draw_layer(surface.image_mut(), &layer, 0, 0, opacity_of(node));
                }
                NodeRole::Text { .. } => self.paint_text(&mut surface, node, scale)?,
            }
        }

        if let Some(clip) = card_clip(width, height, radius) {
            apply_clip(surface.image_mut(), &clip);
        }
        Ok(surface)
    }

    fn paint_text(
        &self,
        surface: &mut RasterSurface,
        node: &StyleNode,
        scale: f64,
    ) -> Result<(), ExportError> {
        let Some(text) = node.text.as_deref() else {
            return Ok(());
        };
        let style = &node.style;
        let px = (style.f64_or(StyleProperty::FontSize, 16.0) * scale) as f32;
        let weight = FontWeight(style.f64_or(StyleProperty::FontWeight, 400.0).clamp(1.0, 1000.0) as u16);
        let family = style
            .get(StyleProperty::FontFamily)
            .and_then(StyleValue::as_keyword)
            .unwrap_or(self.fonts.default_family());
        let face = self.fonts.resolve(family, weight);

        let color = style
            .get(StyleProperty::Color)
            .and_then(StyleValue::as_color)
            .and_then(|c| device_or_warn(&c, StyleProperty::Color))
            .unwrap_or(DeviceRgba::TRANSPARENT);
        let shadow = match style.get(StyleProperty::TextShadow) {
            Some(StyleValue::Shadow(shadow)) => {
                device_or_warn(&shadow.color, StyleProperty::TextShadow).map(|color| ShadowPaint {
                    offset_x: shadow.offset_x * scale,
                    offset_y: shadow.offset_y * scale,
                    sigma: (shadow.blur.max(0.0) * scale / 2.0) as f32,
                    color,
                })
            }
            _ => None,
        };
        let vertical = style.get(StyleProperty::WritingMode).and_then(StyleValue::as_keyword)
            == Some(VERTICAL_RL);
        let center = (
            style.f64_or(StyleProperty::Left, 0.0) * scale,
            style.f64_or(StyleProperty::Top, 0.0) * scale,
        );

        draw_text_centered(
            surface.image_mut(),
            &face,
            text,
            px,
            center,
            &TextPaint {
                color,
                opacity: opacity_of(node),
                vertical,
                shadow,
            },
        )
    }
}

fn opacity_of(node: &StyleNode) -> f32 {
    node.style.f64_or(StyleProperty::Opacity, 1.0).clamp(0.0, 1.0) as f32
}

/// Unparsed colors paint nothing.
fn device_or_warn(color: &ColorValue, property: StyleProperty) -> Option<DeviceRgba> {
    let device = color.to_device();
    if device.is_none() {
        tracing::warn!(
            property = property.css_name(),
            value = %color,
            "Unrecognized color, painting nothing"
        );
    }
    device
}

fn paint_fill(node: &StyleNode, image: Option<&RgbaImage>, width: u32, height: u32) -> RgbaImage {
    let mut layer = RgbaImage::new(width, height);
    let fill = node
        .style
        .get(StyleProperty::BackgroundColor)
        .and_then(StyleValue::as_color)
        .and_then(|c| device_or_warn(&c, StyleProperty::BackgroundColor));
    if let Some(color) = fill.filter(|c| c.a > 0) {
        for px in layer.pixels_mut() {
            *px = Rgba(color.to_array());
        }
    }
    match node.style.get(StyleProperty::BackgroundImage) {
        Some(StyleValue::Gradient(gradient)) => paint_gradient(&mut layer, gradient),
        Some(StyleValue::Image(_)) => {
            if let Some(image) = image {
                draw_cover(&mut layer, image);
            }
        }
        _ => {}
    }
    layer
}

/// Scale to cover the layer, centered, cropping overflow.
fn draw_cover(layer: &mut RgbaImage, image: &RgbaImage) {
    let (w, h) = layer.dimensions();
    let (iw, ih) = image.dimensions();
    if iw == 0 || ih == 0 {
        return;
    }
    let factor = (w as f64 / iw as f64).max(h as f64 / ih as f64);
    let sw = ((iw as f64 * factor).ceil() as u32).max(w);
    let sh = ((ih as f64 * factor).ceil() as u32).max(h);
    let resized = resize_premultiplied(image, sw, sh, FilterType::CatmullRom);
    let left = ((w as f64 - sw as f64) / 2.0).round() as i64;
    let top = ((h as f64 - sh as f64) / 2.0).round() as i64;
    draw_layer(layer, &resized, left, top, 1.0);
}

/// CSS `linear-gradient(<angle>deg, ...)`: 0deg points up, 90deg right.
/// Stops interpolate in premultiplied space.
fn paint_gradient(layer: &mut RgbaImage, gradient: &LinearGradient) {
    let mut stops: Vec<(f64, [f32; 4])> = gradient
        .stops
        .iter()
        .map(|stop| {
            let color = device_or_warn(&stop.color, StyleProperty::BackgroundImage)
                .unwrap_or(DeviceRgba::TRANSPARENT);
            (stop.offset.clamp(0.0, 1.0), premultiplied(color))
        })
        .collect();
    if stops.is_empty() {
        return;
    }
    stops.sort_by(|a, b| a.0.total_cmp(&b.0));

    let (w, h) = (layer.width() as f64, layer.height() as f64);
    let (sin, cos) = gradient.angle_deg.to_radians().sin_cos();
    let length = (w * sin).abs() + (h * cos).abs();
    let length = if length > 0.0 { length } else { 1.0 };

    for (x, y, px) in layer.enumerate_pixels_mut() {
        let dx = x as f64 + 0.5 - w / 2.0;
        let dy = y as f64 + 0.5 - h / 2.0;
        let t = (dx * sin - dy * cos) / length + 0.5;
        let [r, g, b, a] = sample_stops(&stops, t);
        if a <= 0.0 {
            continue;
        }
        let straight = [
            (r / a * 255.0).round().clamp(0.0, 255.0) as u8,
            (g / a * 255.0).round().clamp(0.0, 255.0) as u8,
            (b / a * 255.0).round().clamp(0.0, 255.0) as u8,
            (a * 255.0).round().clamp(0.0, 255.0) as u8,
        ];
        blend_pixel(px, straight, 1.0);
    }
}

fn premultiplied(color: DeviceRgba) -> [f32; 4] {
    let a = color.a as f32 / 255.0;
    [
        color.r as f32 / 255.0 * a,
        color.g as f32 / 255.0 * a,
        color.b as f32 / 255.0 * a,
        a,
    ]
}

fn sample_stops(stops: &[(f64, [f32; 4])], t: f64) -> [f32; 4] {
    let first = stops[0];
    let last = stops[stops.len() - 1];
    if t <= first.0 {
        return first.1;
    }
    if t >= last.0 {
        return last.1;
    }
    for pair in stops.windows(2) {
        let (o0, c0) = pair[0];
        let (o1, c1) = pair[1];
        if t <= o1 {
            if o1 <= o0 {
                return c1;
            }
            let f = ((t - o0) / (o1 - o0)) as f32;
            return [
                c0[0] + (c1[0] - c0[0]) * f,
                c0[1] + (c1[1] - c0[1]) * f,
                c0[2] + (c1[2] - c0[2]) * f,
                c0[3] + (c1[3] - c0[3]) * f,
            ];
        }
    }
    last.1
}
