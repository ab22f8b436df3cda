//! Text overlays drawn above the card background.

use serde::{Deserialize, Serialize};

use crate::color::ColorValue;

/// One positioned, styled text element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextOverlay {
    /// Text content, rendered on a single line.
    pub text: String,

    /// Center of the text as percentages of the card size. Values outside
    /// `[0, 100]` are allowed and place the text (partly) off-canvas.
    pub position: OverlayPosition,

    /// Font size in logical pixels.
    pub font_size: f64,

    /// CSS font weight.
    #[serde(default)]
    pub font_weight: FontWeight,

    /// Font family key, resolved by the font book.
    #[serde(default = "default_font_family")]
    pub font_family: String,

    /// Fill color.
    pub color: ColorValue,

    /// Opacity `[0.0, 1.0]`.
    #[serde(default = "default_opacity")]
    pub opacity: f64,

    /// Writing direction.
    #[serde(default)]
    pub orientation: Orientation,

    /// Optional drop shadow.
    #[serde(default, alias = "textShadow")]
    pub shadow: TextShadow,

    /// Hidden overlays contribute nothing to the export.
    #[serde(default = "default_visible", alias = "isVisible")]
    pub visible: bool,
}

fn default_font_family() -> String {
    "sans".to_string()
}

fn default_opacity() -> f64 {
    1.0
}

fn default_visible() -> bool {
    true
}

/// Overlay center in percent of the card's width and height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlayPosition {
    pub x: f64,
    pub y: f64,
}

impl OverlayPosition {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Absolute center in the coordinate space of a `width` x `height` surface.
    pub fn to_absolute(&self, width: f64, height: f64) -> (f64, f64) {
        (self.x / 100.0 * width, self.y / 100.0 * height)
    }
}

/// Text writing direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Horizontal,
    /// Top-to-bottom lines, glyphs turned clockwise (`vertical-rl`).
    Vertical,
}

/// Text drop shadow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TextShadow {
    pub enabled: bool,
    pub offset_x: f64,
    pub offset_y: f64,
    /// Blur radius in logical pixels.
    pub blur: f64,
    pub color: ColorValue,
}

impl Default for TextShadow {
    fn default() -> Self {
        Self {
            enabled: false,
            offset_x: 2.0,
            offset_y: 2.0,
            blur: 4.0,
            color: ColorValue::device(0, 0, 0, 128),
        }
    }
}

/// CSS font weight (100-900). Accepts numbers, numeric strings, and the
/// `normal`/`bold` keywords when deserializing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "FontWeightRepr", into = "u16")]
pub struct FontWeight(pub u16);

impl FontWeight {
    pub const NORMAL: FontWeight = FontWeight(400);
    pub const BOLD: FontWeight = FontWeight(700);

    pub fn is_bold(&self) -> bool {
        self.0 >= 600
    }
}

impl Default for FontWeight {
    fn default() -> Self {
        Self::NORMAL
    }
}

impl From<FontWeight> for u16 {
    fn from(value: FontWeight) -> Self {
        value.0
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FontWeightRepr {
    Number(f64),
    Text(String),
}

impl TryFrom<FontWeightRepr> for FontWeight {
    type Error = String;

    fn try_from(value: FontWeightRepr) -> Result<Self, Self::Error> {
        let numeric = match value {
            FontWeightRepr::Number(n) => n,
            FontWeightRepr::Text(text) => match text.trim() {
                "normal" => 400.0,
                "bold" => 700.0,
                "lighter" => 300.0,
                "bolder" => 800.0,
                other => other
                    .parse::<f64>()
                    .map_err(|_| format!("invalid font weight: {other}"))?,
            },
        };
        if !numeric.is_finite() {
            return Err("font weight must be finite".to_string());
        }
        Ok(FontWeight(numeric.clamp(1.0, 1000.0).round() as u16))
    }
}

impl TextOverlay {
    /// A visible horizontal overlay with default styling.
    pub fn new(text: impl Into<String>, x: f64, y: f64, font_size: f64, color: ColorValue) -> Self {
        Self {
            text: text.into(),
            position: OverlayPosition::new(x, y),
            font_size,
            font_weight: FontWeight::NORMAL,
            font_family: default_font_family(),
            color,
            opacity: 1.0,
            orientation: Orientation::Horizontal,
            shadow: TextShadow::default(),
            visible: true,
        }
    }

    /// Whether this overlay would put any pixel on a surface.
    pub fn contributes(&self) -> bool {
        self.visible
            && !self.text.trim().is_empty()
            && self.font_size.is_finite()
            && self.font_size > 0.0
            && self.effective_opacity() > 0.0
    }

    /// Clamped opacity.
    pub fn effective_opacity(&self) -> f64 {
        if self.opacity.is_finite() {
            self.opacity.clamp(0.0, 1.0)
        } else {
            1.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_store_snapshot_shape() {
        let json = r#"{
            "text": "Hello",
            "position": { "x": 50, "y": 20 },
            "fontSize": 48,
            "fontWeight": "bold",
            "fontFamily": "inter",
            "color": "oklch(0.985 0 0)",
            "opacity": 0.9,
            "orientation": "vertical",
            "textShadow": { "enabled": true, "offsetX": 1, "offsetY": 3, "blur": 6, "color": "rgba(0,0,0,0.5)" },
            "isVisible": true
        }"#;
        let overlay: TextOverlay = serde_json::from_str(json).unwrap();
        assert_eq!(overlay.font_weight, FontWeight::BOLD);
        assert_eq!(overlay.orientation, Orientation::Vertical);
        assert!(overlay.color.is_perceptual());
        assert!(overlay.shadow.enabled);
        assert_eq!(overlay.shadow.offset_y, 3.0);
        assert!(overlay.visible);
    }

    #[test]
    fn test_font_weight_forms() {
        let w: FontWeight = serde_json::from_str("600").unwrap();
        assert_eq!(w, FontWeight(600));
        let w: FontWeight = serde_json::from_str("\"300\"").unwrap();
        assert_eq!(w, FontWeight(300));
        assert!(serde_json::from_str::<FontWeight>("\"heavy-ish\"").is_err());
        assert_eq!(serde_json::to_string(&FontWeight::BOLD).unwrap(), "700");
    }

    #[test]
    fn test_position_is_not_clamped() {
        let pos = OverlayPosition::new(-10.0, 150.0);
        let (x, y) = pos.to_absolute(200.0, 100.0);
        assert_eq!(x, -20.0);
        assert_eq!(y, 150.0);
    }

    #[test]
    fn test_hidden_or_empty_overlays_do_not_contribute() {
        let mut overlay = TextOverlay::new("Hi", 50.0, 50.0, 20.0, ColorValue::parse("black"));
        assert!(overlay.contributes());
        overlay.visible = false;
        assert!(!overlay.contributes());
        overlay.visible = true;
        overlay.text = "   ".to_string();
        assert!(!overlay.contributes());
        overlay.text = "Hi".to_string();
        overlay.opacity = 0.0;
        assert!(!overlay.contributes());
    }
}
