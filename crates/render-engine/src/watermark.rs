//! Watermark stamped on every export.
//!
//! The mark is drawn last, in place, over the composited card. Its size
//! follows the shorter card side so it reads the same at every scale.

use serde::{Deserialize, Serialize};
use stage_design_model::{ColorValue, DeviceRgba, FontWeight};

use crate::error::ExportError;
use crate::normalize::StyleNormalizer;
use crate::surface::{fill_rounded_rect, RasterSurface, RoundedRect};
use crate::text::{draw_text_centered, line_box, FontBook, ShadowPaint, TextFace, TextPaint};

const MIN_FONT_PX: f64 = 12.0;
const MAX_FONT_PX: f64 = 64.0;
const FONT_PX_PER_SIDE: f64 = 0.03;
const SHADOW: DeviceRgba = DeviceRgba::new(0, 0, 0, 140);
const DEFAULT_TEXT_COLOR: DeviceRgba = DeviceRgba::new(255, 255, 255, 179);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    #[default]
    BottomRight,
}

/// What the watermark says and where it goes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatermarkPolicy {
    pub text: String,
    #[serde(default)]
    pub position: Corner,
    /// Box behind the text; transparent skips the box.
    #[serde(default)]
    pub background_color: ColorValue,
    pub text_color: ColorValue,
}

impl Default for WatermarkPolicy {
    fn default() -> Self {
        Self {
            text: "stage".to_string(),
            position: Corner::BottomRight,
            background_color: ColorValue::Device(DeviceRgba::TRANSPARENT),
            text_color: ColorValue::parse("rgba(255, 255, 255, 0.7)"),
        }
    }
}

/// Device-pixel rectangle covered by the mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl MarkRegion {
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && y >= self.y && x < self.x + self.width && y < self.y + self.height
    }
}

impl WatermarkPolicy {
    /// Resolve the text color, refusing any policy that would leave the
    /// export unmarked.
    pub fn validate(&self) -> Result<DeviceRgba, ExportError> {
        if self.text.trim().is_empty() {
            return Err(ExportError::watermark("text must not be empty"));
        }
        let color = StyleNormalizer::resolve_color(&self.text_color)
            .to_device()
            .ok_or_else(|| {
                ExportError::watermark(format!("unrecognized text color '{}'", self.text_color))
            })?;
        if color.is_transparent() {
            return Err(ExportError::watermark("text color must not be fully transparent"));
        }
        Ok(color)
    }
}

#[derive(Debug, Clone)]
pub struct Watermarker {
    policy: WatermarkPolicy,
    color: DeviceRgba,
    face: TextFace,
}

struct Layout {
    px: f32,
    pad: f64,
    /// Unclamped box origin and size.
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

impl Watermarker {
    pub fn new(policy: WatermarkPolicy, fonts: &FontBook) -> Result<Self, ExportError> {
        let color = policy.validate()?;
        Ok(Self {
            policy,
            color,
            face: Self::face(fonts),
        })
    }

    /// The default mark.
    pub fn standard(fonts: &FontBook) -> Self {
        let policy = WatermarkPolicy::default();
        let color = policy.validate().unwrap_or(DEFAULT_TEXT_COLOR);
        Self {
            policy,
            color,
            face: Self::face(fonts),
        }
    }

    fn face(fonts: &FontBook) -> TextFace {
        fonts.resolve(fonts.default_family(), FontWeight(600))
    }

    pub fn policy(&self) -> &WatermarkPolicy {
        &self.policy
    }

    /// Font size in device pixels for a `w` x `h` surface.
    pub fn font_px(w: u32, h: u32) -> f64 {
        (w.min(h) as f64 * FONT_PX_PER_SIDE).clamp(MIN_FONT_PX, MAX_FONT_PX)
    }

    fn layout(&self, w: u32, h: u32) -> Layout {
        let px = Self::font_px(w, h);
        let margin = 0.75 * px;
        let pad = (0.35 * px).round().max(2.0);
        let (tw, th) = line_box(&self.face, &self.policy.text, px as f32, false);
        let width = tw as f64 + 2.0 * pad;
        let height = th as f64 + 2.0 * pad;
        let x = match self.policy.position {
            Corner::TopLeft | Corner::BottomLeft => margin,
            Corner::TopRight | Corner::BottomRight => w as f64 - margin - width,
        };
        let y = match self.policy.position {
            Corner::TopLeft | Corner::TopRight => margin,
            Corner::BottomLeft | Corner::BottomRight => h as f64 - margin - height,
        };
        Layout {
            px: px as f32,
            pad,
            x,
            y,
            width,
            height,
        }
    }

    /// The rectangle [`apply`](Self::apply) may touch, clamped to the surface.
    pub fn region(&self, w: u32, h: u32) -> MarkRegion {
        let l = self.layout(w, h);
        let x0 = l.x.floor().clamp(0.0, w as f64);
        let y0 = l.y.floor().clamp(0.0, h as f64);
        let x1 = (l.x + l.width).ceil().clamp(0.0, w as f64);
        let y1 = (l.y + l.height).ceil().clamp(0.0, h as f64);
        MarkRegion {
            x: x0 as u32,
            y: y0 as u32,
            width: (x1 - x0) as u32,
            height: (y1 - y0) as u32,
        }
    }

    /// Stamp the mark onto `surface`.
    pub fn apply(&self, surface: &mut RasterSurface) -> Result<(), ExportError> {
        let (w, h) = surface.dimensions();
        let l = self.layout(w, h);

        match StyleNormalizer::resolve_color(&self.policy.background_color).to_device() {
            Some(bg) if !bg.is_transparent() => {
                let rect = RoundedRect::new(l.x, l.y, l.width, l.height, l.pad);
                fill_rounded_rect(surface.image_mut(), rect, bg, 1.0);
            }
            Some(_) => {}
            None => tracing::warn!(
                value = %self.policy.background_color,
                "Unrecognized watermark background color"
            ),
        }

        // One device pixel, kept inside the padded box.
        let offset = 1.0_f64.min(l.pad);
        let center = (l.x + l.width / 2.0, l.y + l.height / 2.0);
        draw_text_centered(
            surface.image_mut(),
            &self.face,
            &self.policy.text,
            l.px,
            center,
            &TextPaint {
                color: self.color,
                opacity: 1.0,
                vertical: false,
                shadow: Some(ShadowPaint {
                    offset_x: offset,
                    offset_y: offset,
                    sigma: 0.0,
                    color: SHADOW,
                }),
            },
        )?;
        tracing::debug!(
            text = %self.policy.text,
            corner = ?self.policy.position,
            font_px = l.px,
            "Applied watermark"
        );
        Ok(())
    }
}
