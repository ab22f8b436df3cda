//! Single-line text rendering.
//!
//! Families come from the configured font files. When a family has no
//! loadable face the built-in block face draws the text from a 5x7 dot
//! matrix, so exports never fail for lack of fonts.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use image::{imageops, GrayImage, Luma, RgbaImage};
use rusttype::{point, Font, Scale};
use stage_common::config::FontConfig;
use stage_common::error::{StageError, StageResult};
use stage_design_model::{DeviceRgba, FontWeight};

use crate::error::ExportError;
use crate::surface::{check_allocation, draw_layer, draw_mask};

#[derive(Clone)]
struct LoadedFace {
    weight: u16,
    font: Arc<Font<'static>>,
}

/// Family key to loaded faces.
#[derive(Clone)]
pub struct FontBook {
    families: HashMap<String, Vec<LoadedFace>>,
    default_family: String,
}

impl fmt::Debug for FontBook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut families: Vec<_> = self
            .families
            .iter()
            .map(|(name, faces)| (name.as_str(), faces.iter().map(|face| face.weight).collect::<Vec<_>>()))
            .collect();
        families.sort();
        f.debug_struct("FontBook")
            .field("default_family", &self.default_family)
            .field("families", &families)
            .finish()
    }
}

impl Default for FontBook {
    fn default() -> Self {
        Self::new("sans")
    }
}

impl FontBook {
    /// An empty book; every lookup falls back to the block face.
    pub fn new(default_family: impl Into<String>) -> Self {
        let default_family: String = default_family.into();
        Self {
            families: HashMap::new(),
            default_family: family_key(&default_family),
        }
    }

    /// Load every configured face. Unreadable files are logged and skipped.
    pub fn from_config(config: &FontConfig) -> Self {
        let mut book = Self::new(config.default_family.clone());
        for (family, faces) in &config.families {
            for entry in faces {
                let loaded = std::fs::read(&entry.path)
                    .map_err(StageError::from)
                    .and_then(|bytes| book.add_face(family, entry.weight, bytes));
                match loaded {
                    Ok(()) => tracing::debug!(
                        family = %family,
                        weight = entry.weight,
                        path = %entry.path.display(),
                        "Loaded font face"
                    ),
                    Err(e) => tracing::warn!(
                        family = %family,
                        path = %entry.path.display(),
                        error = %e,
                        "Failed to load font face"
                    ),
                }
            }
        }
        book
    }

    /// Register a TrueType/OpenType face under a family key.
    pub fn add_face(&mut self, family: &str, weight: u16, bytes: Vec<u8>) -> StageResult<()> {
        let font = Font::try_from_vec(bytes)
            .ok_or_else(|| StageError::font(format!("not a usable font file for '{family}'")))?;
        self.families
            .entry(family_key(family))
            .or_default()
            .push(LoadedFace {
                weight,
                font: Arc::new(font),
            });
        Ok(())
    }

    pub fn default_family(&self) -> &str {
        &self.default_family
    }

    /// Pick a face for a CSS `font-family` list and weight. The first
    /// listed family with faces wins, then the default family, then the
    /// block face. Within a family the nearest weight wins, heavier on ties.
    pub fn resolve(&self, families: &str, weight: FontWeight) -> TextFace {
        let faces = families
            .split(',')
            .map(family_key)
            .chain(std::iter::once(self.default_family.clone()))
            .find_map(|key| self.families.get(&key).filter(|faces| !faces.is_empty()));

        let Some(faces) = faces else {
            return TextFace::Block {
                bold: weight.is_bold(),
            };
        };
        let target = weight.0;
        let best = faces
            .iter()
            .min_by_key(|face| (face.weight.abs_diff(target), face.weight < target));
        match best {
            Some(face) => TextFace::Outline {
                font: face.font.clone(),
                embolden: weight.is_bold() && face.weight < 600,
            },
            None => TextFace::Block {
                bold: weight.is_bold(),
            },
        }
    }
}

fn family_key(name: &str) -> String {
    name.trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .to_ascii_lowercase()
}

/// A resolved face ready to rasterize.
#[derive(Clone)]
pub enum TextFace {
    Outline {
        font: Arc<Font<'static>>,
        /// Synthesize bold by widening strokes.
        embolden: bool,
    },
    Block {
        bold: bool,
    },
}

impl fmt::Debug for TextFace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextFace::Outline { embolden, .. } => {
                f.debug_struct("Outline").field("embolden", embolden).finish()
            }
            TextFace::Block { bold } => f.debug_struct("Block").field("bold", bold).finish(),
        }
    }
}

impl TextFace {
    /// Unrotated line box of `text`: advance width by line height, in
    /// device pixels. Nothing is rasterized.
    pub fn measure_line(&self, text: &str, px: f32) -> (u64, u64) {
        if !(px.is_finite() && px > 0.0) || text.is_empty() {
            return (1, 1);
        }
        match self {
            TextFace::Outline { font, embolden } => {
                let (w, h) = outline_box(font, text, px);
                let extra = if *embolden { embolden_width(px) as u64 } else { 0 };
                ((w as u64).saturating_add(extra), h as u64)
            }
            TextFace::Block { .. } => {
                let (w, h) = block_box(text, px);
                (w as u64, h as u64)
            }
        }
    }

    /// Rasterize the part of the line box inside `window` (line-box
    /// coordinates, already clipped to the box) into a coverage mask the
    /// size of the window.
    fn render_window(&self, text: &str, px: f32, window: PixelRect) -> Result<GrayImage, ExportError> {
        match self {
            TextFace::Outline {
                font,
                embolden: false,
            } => render_outline(font, text, px, window),
            TextFace::Outline {
                font,
                embolden: true,
            } => {
                let by = embolden_width(px) as i64;
                let raw_width = outline_box(font, text, px).0 as i64;
                let raw = PixelRect {
                    x0: window.x0.saturating_sub(by).max(0),
                    x1: window.x1.min(raw_width),
                    ..window
                };
                if raw.is_empty() {
                    return Ok(GrayImage::new(window.width() as u32, window.height() as u32));
                }
                let mask = render_outline(font, text, px, raw)?;
                Ok(embolden_window(&mask, raw.x0, window, by))
            }
            TextFace::Block { bold } => Ok(render_block(text, px, *bold, window)),
        }
    }
}

/// Half-open pixel rectangle. May lie partly or wholly off any surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PixelRect {
    x0: i64,
    y0: i64,
    x1: i64,
    y1: i64,
}

impl PixelRect {
    fn new(x: i64, y: i64, width: u64, height: u64) -> Self {
        let width = i64::try_from(width).unwrap_or(i64::MAX);
        let height = i64::try_from(height).unwrap_or(i64::MAX);
        Self {
            x0: x,
            y0: y,
            x1: x.saturating_add(width),
            y1: y.saturating_add(height),
        }
    }

    fn is_empty(&self) -> bool {
        self.x1 <= self.x0 || self.y1 <= self.y0
    }

    fn width(&self) -> u64 {
        self.x1.saturating_sub(self.x0).max(0) as u64
    }

    fn height(&self) -> u64 {
        self.y1.saturating_sub(self.y0).max(0) as u64
    }

    fn intersect(&self, other: &Self) -> Self {
        Self {
            x0: self.x0.max(other.x0),
            y0: self.y0.max(other.y0),
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
        }
    }

    fn union(&self, other: &Self) -> Self {
        Self {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    fn translate(&self, dx: i64, dy: i64) -> Self {
        Self {
            x0: self.x0.saturating_add(dx),
            y0: self.y0.saturating_add(dy),
            x1: self.x1.saturating_add(dx),
            y1: self.y1.saturating_add(dy),
        }
    }

    fn expand(&self, by: i64) -> Self {
        Self {
            x0: self.x0.saturating_sub(by),
            y0: self.y0.saturating_sub(by),
            x1: self.x1.saturating_add(by),
            y1: self.y1.saturating_add(by),
        }
    }
}

const MAX_SHADOW_REACH: i64 = 1024;

// rusttype rasterizes a whole glyph into one buffer before we can clip it.
const MAX_GLYPH_PIXELS: u64 = 1 << 24;

fn outline_box(font: &Font<'static>, text: &str, px: f32) -> (f64, f64) {
    let scale = Scale::uniform(px);
    let v_metrics = font.v_metrics(scale);
    let baseline = v_metrics.ascent + v_metrics.line_gap / 2.0;
    let width = font
        .layout(text, scale, point(0.0, baseline))
        .last()
        .map(|g| g.position().x + g.unpositioned().h_metrics().advance_width)
        .unwrap_or(0.0);
    let height = v_metrics.ascent - v_metrics.descent + v_metrics.line_gap;
    (
        (width as f64).ceil().max(1.0),
        (height as f64).ceil().max(1.0),
    )
}

fn render_outline(
    font: &Font<'static>,
    text: &str,
    px: f32,
    window: PixelRect,
) -> Result<GrayImage, ExportError> {
    let scale = Scale::uniform(px);
    let v_metrics = font.v_metrics(scale);
    let baseline = v_metrics.ascent + v_metrics.line_gap / 2.0;

    let mut mask = GrayImage::new(window.width() as u32, window.height() as u32);
    let (w, h) = (window.width() as i64, window.height() as i64);
    for glyph in font.layout(text, scale, point(0.0, baseline)) {
        let Some(bb) = glyph.pixel_bounding_box() else {
            continue;
        };
        let bounds = PixelRect {
            x0: bb.min.x as i64,
            y0: bb.min.y as i64,
            x1: bb.max.x as i64,
            y1: bb.max.y as i64,
        };
        if bounds.intersect(&window).is_empty() {
            continue;
        }
        check_allocation(bounds.width(), bounds.height(), MAX_GLYPH_PIXELS)?;
        glyph.draw(|gx, gy, v| {
            let x = gx as i64 + bounds.x0 - window.x0;
            let y = gy as i64 + bounds.y0 - window.y0;
            if x < 0 || y < 0 || x >= w || y >= h {
                return;
            }
            let value = (v * 255.0).round().clamp(0.0, 255.0) as u8;
            let dst = mask.get_pixel_mut(x as u32, y as u32);
            dst.0[0] = dst.0[0].max(value);
        });
    }
    Ok(mask)
}

fn embolden_width(px: f32) -> u32 {
    ((px / 24.0).round() as u32).max(1)
}

/// Widen strokes by taking the running max over `by` pixels to the left.
/// `mask` starts at line-box column `mask_x0` and shares the window's rows.
fn embolden_window(mask: &GrayImage, mask_x0: i64, window: PixelRect, by: i64) -> GrayImage {
    let last = mask_x0 + mask.width() as i64 - 1;
    GrayImage::from_fn(window.width() as u32, window.height() as u32, |x, y| {
        let column = window.x0 + x as i64;
        let from = column.saturating_sub(by).max(mask_x0);
        let to = column.min(last);
        let value = (from..=to)
            .map(|sx| mask.get_pixel((sx - mask_x0) as u32, y).0[0])
            .max()
            .unwrap_or(0);
        Luma([value])
    })
}

// Block face geometry, in dots: 5x7 glyphs on a 6-dot advance, 10-dot
// line box with the glyph vertically centered.
const DOTS_PER_EM: f64 = 8.0;
const ADVANCE_DOTS: f64 = 6.0;
const LINE_DOTS: f64 = 10.0;
const GLYPH_TOP_DOTS: f64 = 1.5;

fn block_box(text: &str, px: f32) -> (f64, f64) {
    let dot = px as f64 / DOTS_PER_EM;
    let count = text.chars().count() as f64;
    let width = (count * ADVANCE_DOTS - 1.0) * dot;
    let height = LINE_DOTS * dot;
    (width.ceil().max(1.0), height.ceil().max(1.0))
}

fn render_block(text: &str, px: f32, bold: bool, window: PixelRect) -> GrayImage {
    let dot = px as f64 / DOTS_PER_EM;
    let (w, h) = (window.width() as u32, window.height() as u32);
    let (ox, oy) = (window.x0 as f64, window.y0 as f64);

    let mut coverage = vec![0.0f32; w as usize * h as usize];
    let dot_width = if bold { dot * 1.5 } else { dot };
    for (index, ch) in text.chars().enumerate() {
        let origin_x = index as f64 * ADVANCE_DOTS * dot;
        if origin_x + 4.0 * dot + dot_width <= ox || origin_x >= ox + w as f64 {
            continue;
        }
        for (row, bits) in block_glyph(ch).iter().enumerate() {
            for col in 0..5 {
                if bits & (0x10 >> col) == 0 {
                    continue;
                }
                let x0 = origin_x + col as f64 * dot - ox;
                let y0 = (GLYPH_TOP_DOTS + row as f64) * dot - oy;
                accumulate_rect(&mut coverage, w, h, x0, y0, x0 + dot_width, y0 + dot);
            }
        }
    }

    GrayImage::from_fn(w, h, |x, y| {
        let c = coverage[y as usize * w as usize + x as usize].min(1.0);
        Luma([(c * 255.0).round() as u8])
    })
}

/// Add the exact area overlap of a rectangle to each pixel it touches.
fn accumulate_rect(buf: &mut [f32], w: u32, h: u32, x0: f64, y0: f64, x1: f64, y1: f64) {
    let px0 = x0.floor().clamp(0.0, w as f64) as u32;
    let py0 = y0.floor().clamp(0.0, h as f64) as u32;
    let px1 = x1.ceil().clamp(0.0, w as f64) as u32;
    let py1 = y1.ceil().clamp(0.0, h as f64) as u32;
    for py in py0..py1 {
        let oy = (y1.min(py as f64 + 1.0) - y0.max(py as f64)).max(0.0);
        for px in px0..px1 {
            let ox = (x1.min(px as f64 + 1.0) - x0.max(px as f64)).max(0.0);
            buf[py as usize * w as usize + px as usize] += (ox * oy) as f32;
        }
    }
}

/// Rows top to bottom, bit 4 is the leftmost column.
fn block_glyph(ch: char) -> [u8; 7] {
    match ch.to_ascii_uppercase() {
        ' ' => [0, 0, 0, 0, 0, 0, 0],
        'A' => [0x0E, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'B' => [0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E],
        'C' => [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E],
        'D' => [0x1E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x1E],
        'E' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F],
        'F' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10],
        'G' => [0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0F],
        'H' => [0x11, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'I' => [0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E],
        'J' => [0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0C],
        'K' => [0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11],
        'L' => [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F],
        'M' => [0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11],
        'N' => [0x11, 0x11, 0x19, 0x15, 0x13, 0x11, 0x11],
        'O' => [0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'P' => [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10],
        'Q' => [0x0E, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0D],
        'R' => [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11],
        'S' => [0x0F, 0x10, 0x10, 0x0E, 0x01, 0x01, 0x1E],
        'T' => [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
        'U' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'V' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x0A, 0x04],
        'W' => [0x11, 0x11, 0x11, 0x15, 0x15, 0x15, 0x0A],
        'X' => [0x11, 0x11, 0x0A, 0x04, 0x0A, 0x11, 0x11],
        'Y' => [0x11, 0x11, 0x11, 0x0A, 0x04, 0x04, 0x04],
        'Z' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1F],
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        '.' => [0, 0, 0, 0, 0, 0x0C, 0x0C],
        ',' => [0, 0, 0, 0, 0x0C, 0x04, 0x08],
        '!' => [0x04, 0x04, 0x04, 0x04, 0x04, 0, 0x04],
        '?' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0, 0x04],
        '-' => [0, 0, 0, 0x1F, 0, 0, 0],
        '+' => [0, 0x04, 0x04, 0x1F, 0x04, 0x04, 0],
        '=' => [0, 0, 0x1F, 0, 0x1F, 0, 0],
        '_' => [0, 0, 0, 0, 0, 0, 0x1F],
        ':' => [0, 0x0C, 0x0C, 0, 0x0C, 0x0C, 0],
        ';' => [0, 0x0C, 0x0C, 0, 0x0C, 0x04, 0x08],
        '\'' => [0x04, 0x04, 0x08, 0, 0, 0, 0],
        '"' => [0x0A, 0x0A, 0, 0, 0, 0, 0],
        '/' => [0, 0x01, 0x02, 0x04, 0x08, 0x10, 0],
        '(' => [0x02, 0x04, 0x08, 0x08, 0x08, 0x04, 0x02],
        ')' => [0x08, 0x04, 0x02, 0x02, 0x02, 0x04, 0x08],
        '&' => [0x0C, 0x12, 0x14, 0x08, 0x15, 0x12, 0x0D],
        '@' => [0x0E, 0x11, 0x17, 0x15, 0x17, 0x10, 0x0E],
        '#' => [0x0A, 0x0A, 0x1F, 0x0A, 0x1F, 0x0A, 0x0A],
        '%' => [0x18, 0x19, 0x02, 0x04, 0x08, 0x13, 0x03],
        '*' => [0, 0x04, 0x15, 0x0E, 0x15, 0x04, 0],
        // Unknown characters draw a hollow box.
        _ => [0x1F, 0x11, 0x11, 0x11, 0x11, 0x11, 0x1F],
    }
}

/// Drop shadow in device pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowPaint {
    pub offset_x: f64,
    pub offset_y: f64,
    /// Gaussian sigma; zero draws a hard shadow.
    pub sigma: f32,
    pub color: DeviceRgba,
}

/// How to paint a rasterized line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextPaint {
    pub color: DeviceRgba,
    pub opacity: f32,
    /// `vertical-rl`: the line runs top to bottom, glyphs turned clockwise.
    pub vertical: bool,
    pub shadow: Option<ShadowPaint>,
}

/// Line box of `text` after orientation, in device pixels.
pub fn line_box(face: &TextFace, text: &str, px: f32, vertical: bool) -> (u64, u64) {
    let (w, h) = face.measure_line(text, px);
    if vertical {
        (h, w)
    } else {
        (w, h)
    }
}

/// Rasterize the part of the oriented line box inside `window`, given in
/// oriented line-box coordinates.
fn render_oriented(
    face: &TextFace,
    text: &str,
    px: f32,
    vertical: bool,
    line: (u64, u64),
    window: PixelRect,
) -> Result<GrayImage, ExportError> {
    if !vertical {
        return face.render_window(text, px, window);
    }
    // rotate90 sends source (x, y) to (height - 1 - y, x).
    let height = i64::try_from(line.1).unwrap_or(i64::MAX);
    let source = PixelRect {
        x0: window.y0,
        y0: height - window.x1,
        x1: window.y1,
        y1: height - window.x0,
    };
    Ok(imageops::rotate90(&face.render_window(text, px, source)?))
}

/// Draw a line of text with its box centered on `(cx, cy)`. Text and shadow
/// are composed into one group before the group opacity is applied.
///
/// Only the part of the line that can reach `dst` is rasterized, so the
/// work is bounded by the surface rather than by the font size.
pub fn draw_text_centered(
    dst: &mut RgbaImage,
    face: &TextFace,
    text: &str,
    px: f32,
    center: (f64, f64),
    paint: &TextPaint,
) -> Result<(), ExportError> {
    if paint.opacity <= 0.0 || text.is_empty() || !(px.is_finite() && px > 0.0) {
        return Ok(());
    }
    let line = face.measure_line(text, px);
    let (mw, mh) = if paint.vertical { (line.1, line.0) } else { line };
    let left = (center.0 - mw as f64 / 2.0).round() as i64;
    let top = (center.1 - mh as f64 / 2.0).round() as i64;
    let text_rect = PixelRect::new(left, top, mw, mh);
    let (dw, dh) = dst.dimensions();
    let bounds = PixelRect::new(0, 0, dw as u64, dh as u64);

    let shadow = paint.shadow.map(|shadow| {
        let offset = (shadow.offset_x.round() as i64, shadow.offset_y.round() as i64);
        let reach = if shadow.sigma > 0.0 {
            ((shadow.sigma as f64 * 3.0).ceil() as i64).min(MAX_SHADOW_REACH)
        } else {
            0
        };
        (shadow, offset, reach)
    });

    let mut group = text_rect;
    if let Some((_, (ox, oy), reach)) = shadow {
        group = group.union(&text_rect.translate(ox, oy).expand(reach));
    }
    let group = group.intersect(&bounds);
    if group.is_empty() {
        return Ok(());
    }
    let mut layer = RgbaImage::new(group.width() as u32, group.height() as u32);

    if let Some((shadow, (ox, oy), reach)) = shadow {
        // Every mask pixel that lands in the group after offset and blur.
        let canvas = group.translate(-ox, -oy).expand(reach);
        let source = canvas.intersect(&text_rect);
        if !source.is_empty() {
            check_allocation(canvas.width(), canvas.height(), u64::MAX)?;
            let mut shadow_mask = GrayImage::new(canvas.width() as u32, canvas.height() as u32);
            let mask = render_oriented(
                face,
                text,
                px,
                paint.vertical,
                line,
                source.translate(-left, -top),
            )?;
            imageops::replace(
                &mut shadow_mask,
                &mask,
                source.x0 - canvas.x0,
                source.y0 - canvas.y0,
            );
            if shadow.sigma > 0.0 {
                shadow_mask = imageproc::filter::gaussian_blur_f32(&shadow_mask, shadow.sigma);
            }
            draw_mask(
                &mut layer,
                &shadow_mask,
                canvas.x0 + ox - group.x0,
                canvas.y0 + oy - group.y0,
                shadow.color,
                1.0,
            );
        }
    }

    let visible = group.intersect(&text_rect);
    if !visible.is_empty() {
        let mask = render_oriented(
            face,
            text,
            px,
            paint.vertical,
            line,
            visible.translate(-left, -top),
        )?;
        draw_mask(
            &mut layer,
            &mask,
            visible.x0 - group.x0,
            visible.y0 - group.y0,
            paint.color,
            1.0,
        );
    }
    draw_layer(dst, &layer, group.x0, group.y0, paint.opacity);
    Ok(())
}
