//! Raster surfaces and the pixel operations shared by every stage.
//!
//! Pixels are straight-alpha RGBA8. Blending is source-over; coverage
//! values in `[0, 1]` come from anti-aliased shape tests.

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, Rgba, RgbaImage};
use stage_design_model::DeviceRgba;

use crate::error::ExportError;

/// Hard ceiling when no configured limit is supplied (16384 x 16384).
pub const DEFAULT_MAX_SURFACE_PIXELS: u64 = 16_384 * 16_384;

/// An owned drawing surface for one pipeline invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterSurface {
    image: RgbaImage,
}

impl RasterSurface {
    /// Allocate a transparent surface, refusing sizes the host could not
    /// back with memory.
    pub fn allocate(width: u32, height: u32, max_pixels: u64) -> Result<Self, ExportError> {
        check_allocation(width as u64, height as u64, max_pixels)?;
        Ok(Self {
            image: RgbaImage::new(width, height),
        })
    }

    pub fn from_image(image: RgbaImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut RgbaImage {
        &mut self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.image.get_pixel(x, y).0
    }
}

/// Validate a surface size against the pixel ceiling and address space.
pub fn check_allocation(width: u64, height: u64, max_pixels: u64) -> Result<(), ExportError> {
    if width == 0 || height == 0 {
        return Err(ExportError::canvas(width, height, "surface has no area"));
    }
    let pixels = width
        .checked_mul(height)
        .ok_or_else(|| ExportError::canvas(width, height, "pixel count overflows"))?;
    if pixels > max_pixels {
        return Err(ExportError::canvas(
            width,
            height,
            format!("{pixels} pixels exceeds the limit of {max_pixels}"),
        ));
    }
    let bytes = pixels
        .checked_mul(4)
        .ok_or_else(|| ExportError::canvas(width, height, "byte size overflows"))?;
    if usize::try_from(bytes).is_err() || width > u32::MAX as u64 || height > u32::MAX as u64 {
        return Err(ExportError::canvas(width, height, "exceeds addressable memory"));
    }
    Ok(())
}

/// Source-over one straight-alpha color onto `dst`, with `coverage`
/// scaling the source alpha.
#[inline]
pub fn blend_pixel(dst: &mut Rgba<u8>, src: [u8; 4], coverage: f32) {
    let sa = src[3] as f32 / 255.0 * coverage.clamp(0.0, 1.0);
    if sa <= 0.0 {
        return;
    }
    let da = dst.0[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        dst.0 = [0, 0, 0, 0];
        return;
    }
    for c in 0..3 {
        let sc = src[c] as f32;
        let dc = dst.0[c] as f32;
        let value = (sc * sa + dc * da * (1.0 - sa)) / out_a;
        dst.0[c] = value.round().clamp(0.0, 255.0) as u8;
    }
    dst.0[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}

/// Draw `layer` onto `dst` at an integer offset with group opacity.
/// Pixels falling outside `dst` are dropped.
pub fn draw_layer(dst: &mut RgbaImage, layer: &RgbaImage, left: i64, top: i64, opacity: f32) {
    if opacity <= 0.0 {
        return;
    }
    let (dw, dh) = (dst.width() as i64, dst.height() as i64);
    for (lx, ly, px) in layer.enumerate_pixels() {
        if px.0[3] == 0 {
            continue;
        }
        let x = left + lx as i64;
        let y = top + ly as i64;
        if x < 0 || y < 0 || x >= dw || y >= dh {
            continue;
        }
        blend_pixel(dst.get_pixel_mut(x as u32, y as u32), px.0, opacity);
    }
}

/// Paint a coverage mask in a single color.
pub fn draw_mask(
    dst: &mut RgbaImage,
    mask: &GrayImage,
    left: i64,
    top: i64,
    color: DeviceRgba,
    opacity: f32,
) {
    if opacity <= 0.0 || color.a == 0 {
        return;
    }
    let src = color.to_array();
    let (dw, dh) = (dst.width() as i64, dst.height() as i64);
    for (mx, my, Luma([v])) in mask.enumerate_pixels() {
        if *v == 0 {
            continue;
        }
        let x = left + mx as i64;
        let y = top + my as i64;
        if x < 0 || y < 0 || x >= dw || y >= dh {
            continue;
        }
        blend_pixel(
            dst.get_pixel_mut(x as u32, y as u32),
            src,
            *v as f32 / 255.0 * opacity,
        );
    }
}

/// Multiply every pixel's alpha by the mask value at the same position.
pub fn apply_clip(layer: &mut RgbaImage, clip: &GrayImage) {
    debug_assert_eq!(layer.dimensions(), clip.dimensions());
    for (px, Luma([v])) in layer.pixels_mut().zip(clip.pixels()) {
        if *v == 255 {
            continue;
        }
        px.0[3] = ((px.0[3] as u32 * *v as u32 + 127) / 255) as u8;
    }
}

/// An axis-aligned rectangle with uniformly rounded corners, in device
/// pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoundedRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub radius: f64,
}

impl RoundedRect {
    /// Build a rectangle, clamping the radius to half the shorter side.
    pub fn new(x: f64, y: f64, width: f64, height: f64, radius: f64) -> Self {
        let width = width.max(0.0);
        let height = height.max(0.0);
        let radius = if radius.is_finite() { radius } else { 0.0 };
        Self {
            x,
            y,
            width,
            height,
            radius: radius.clamp(0.0, width.min(height) / 2.0),
        }
    }

    /// Shrink by `by` on every side; the corner radius shrinks with it.
    pub fn inset(&self, by: f64) -> Self {
        Self::new(
            self.x + by,
            self.y + by,
            self.width - 2.0 * by,
            self.height - 2.0 * by,
            self.radius - by,
        )
    }

    /// Anti-aliased coverage of the pixel whose center is `(px, py)`.
    pub fn coverage(&self, px: f64, py: f64) -> f32 {
        if self.width <= 0.0 || self.height <= 0.0 {
            return 0.0;
        }
        let half_w = self.width / 2.0;
        let half_h = self.height / 2.0;
        let qx = (px - (self.x + half_w)).abs() - (half_w - self.radius);
        let qy = (py - (self.y + half_h)).abs() - (half_h - self.radius);
        let outside = qx.max(0.0).hypot(qy.max(0.0));
        let inside = qx.max(qy).min(0.0);
        let distance = outside + inside - self.radius;
        (0.5 - distance).clamp(0.0, 1.0) as f32
    }

    /// Integer pixel bounds touched by the shape, clipped to `w` x `h`.
    pub fn pixel_bounds(&self, w: u32, h: u32) -> Option<(u32, u32, u32, u32)> {
        let x0 = self.x.floor().max(0.0);
        let y0 = self.y.floor().max(0.0);
        let x1 = (self.x + self.width).ceil().min(w as f64);
        let y1 = (self.y + self.height).ceil().min(h as f64);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some((x0 as u32, y0 as u32, x1 as u32, y1 as u32))
    }

    /// Rasterize to a `w` x `h` coverage mask.
    pub fn mask(&self, w: u32, h: u32) -> GrayImage {
        let mut mask = GrayImage::new(w, h);
        if let Some((x0, y0, x1, y1)) = self.pixel_bounds(w, h) {
            for y in y0..y1 {
                for x in x0..x1 {
                    let c = self.coverage(x as f64 + 0.5, y as f64 + 0.5);
                    mask.put_pixel(x, y, Luma([(c * 255.0).round() as u8]));
                }
            }
        }
        mask
    }
}

/// Clip mask for a full-bleed `w` x `h` card, or `None` when the corners
/// are square and nothing needs clipping.
pub fn card_clip(w: u32, h: u32, radius: f64) -> Option<GrayImage> {
    let rect = RoundedRect::new(0.0, 0.0, w as f64, h as f64, radius);
    (rect.radius > 0.0).then(|| rect.mask(w, h))
}

/// Fill a rounded rectangle with a color.
pub fn fill_rounded_rect(dst: &mut RgbaImage, rect: RoundedRect, color: DeviceRgba, opacity: f32) {
    let Some((x0, y0, x1, y1)) = rect.pixel_bounds(dst.width(), dst.height()) else {
        return;
    };
    let src = color.to_array();
    for y in y0..y1 {
        for x in x0..x1 {
            let c = rect.coverage(x as f64 + 0.5, y as f64 + 0.5);
            if c > 0.0 {
                blend_pixel(dst.get_pixel_mut(x, y), src, c * opacity);
            }
        }
    }
}

/// Stroke the inside edge of a rounded rectangle.
pub fn stroke_rounded_rect(
    dst: &mut RgbaImage,
    rect: RoundedRect,
    stroke_width: f64,
    color: DeviceRgba,
    opacity: f32,
) {
    if stroke_width <= 0.0 {
        return;
    }
    let inner = rect.inset(stroke_width);
    let Some((x0, y0, x1, y1)) = rect.pixel_bounds(dst.width(), dst.height()) else {
        return;
    };
    let src = color.to_array();
    for y in y0..y1 {
        for x in x0..x1 {
            let (cx, cy) = (x as f64 + 0.5, y as f64 + 0.5);
            let c = (rect.coverage(cx, cy) - inner.coverage(cx, cy)).max(0.0);
            if c > 0.0 {
                blend_pixel(dst.get_pixel_mut(x, y), src, c * opacity);
            }
        }
    }
}

/// Convert to premultiplied alpha in place (before resampling).
pub fn premultiply(image: &mut RgbaImage) {
    for px in image.pixels_mut() {
        let a = px.0[3] as u32;
        for c in 0..3 {
            px.0[c] = ((px.0[c] as u32 * a + 127) / 255) as u8;
        }
    }
}

/// Undo [`premultiply`], clamping channels that resampling pushed above
/// their alpha.
pub fn unpremultiply(image: &mut RgbaImage) {
    for px in image.pixels_mut() {
        let a = px.0[3] as u32;
        if a == 0 {
            px.0 = [0, 0, 0, 0];
            continue;
        }
        for c in 0..3 {
            let v = (px.0[c] as u32).min(a);
            px.0[c] = ((v * 255 + a / 2) / a) as u8;
        }
    }
}

/// Resample in premultiplied space so transparent pixels do not bleed
/// dark fringes into opaque edges.
pub fn resize_premultiplied(image: &RgbaImage, width: u32, height: u32, filter: FilterType) -> RgbaImage {
    let mut src = image.clone();
    premultiply(&mut src);
    let mut out = imageops::resize(&src, width, height, filter);
    unpremultiply(&mut out);
    out
}

/// Gaussian blur in premultiplied space, for the same reason.
pub fn blur_premultiplied(mut image: RgbaImage, sigma: f32) -> RgbaImage {
    premultiply(&mut image);
    let mut out = imageproc::filter::gaussian_blur_f32(&image, sigma);
    unpremultiply(&mut out);
    out
}
