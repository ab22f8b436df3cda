//! Card background configuration.

use serde::{Deserialize, Serialize};

use crate::color::ColorValue;
use crate::palette;

/// Declarative description of the card's background.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundConfig {
    /// Fill kind.
    #[serde(rename = "type")]
    pub kind: BackgroundKind,

    /// Palette key, literal CSS color, or image reference depending on `kind`.
    pub value: String,

    /// Opacity of the whole background `[0.0, 1.0]`.
    #[serde(default = "default_opacity")]
    pub opacity: f64,

    /// Blur radius in logical pixels. Only used for image backgrounds.
    #[serde(default)]
    pub blur: f64,
}

fn default_opacity() -> f64 {
    1.0
}

/// Background fill kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundKind {
    Gradient,
    Solid,
    Image,
}

/// A CSS-style linear gradient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearGradient {
    /// Angle in degrees (0 = towards top, 90 = towards right).
    pub angle_deg: f64,

    /// Color stops ordered by offset.
    pub stops: Vec<GradientStop>,
}

/// One gradient color stop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientStop {
    pub color: ColorValue,
    /// Position along the gradient line `[0.0, 1.0]`.
    pub offset: f64,
}

/// Reference to an image asset: a filesystem path, `file://` URL, or `data:` URI.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageRef(pub String);

impl ImageRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_data_uri(&self) -> bool {
        self.0.starts_with("data:")
    }
}

/// A background resolved against the palette.
#[derive(Debug, Clone, PartialEq)]
pub enum BackgroundFill {
    Color(ColorValue),
    Gradient(LinearGradient),
    Image(ImageRef),
    /// Nothing to paint (for example an empty image reference).
    None,
}

impl BackgroundConfig {
    /// A solid background using a palette key or literal CSS color.
    pub fn solid(value: impl Into<String>) -> Self {
        Self {
            kind: BackgroundKind::Solid,
            value: value.into(),
            opacity: 1.0,
            blur: 0.0,
        }
    }

    /// A gradient background using a palette key.
    pub fn gradient(key: impl Into<String>) -> Self {
        Self {
            kind: BackgroundKind::Gradient,
            value: key.into(),
            opacity: 1.0,
            blur: 0.0,
        }
    }

    /// An image background.
    pub fn image(reference: impl Into<String>, blur: f64) -> Self {
        Self {
            kind: BackgroundKind::Image,
            value: reference.into(),
            opacity: 1.0,
            blur,
        }
    }

    /// Clamped opacity.
    pub fn effective_opacity(&self) -> f64 {
        if self.opacity.is_finite() {
            self.opacity.clamp(0.0, 1.0)
        } else {
            1.0
        }
    }

    /// Blur in logical pixels; zero unless this is an image background.
    pub fn effective_blur(&self) -> f64 {
        match self.kind {
            BackgroundKind::Image if self.blur.is_finite() => self.blur.max(0.0),
            _ => 0.0,
        }
    }

    /// Whether the image must be split onto its own blurred layer.
    pub fn has_blur(&self) -> bool {
        self.kind == BackgroundKind::Image && !self.value.is_empty() && self.effective_blur() > 0.0
    }

    /// Resolve palette keys. Unknown solid keys are read as literal CSS
    /// colors; unknown gradient keys fall back to a solid color parse so a
    /// plain color still renders.
    pub fn resolve(&self) -> BackgroundFill {
        match self.kind {
            BackgroundKind::Solid => BackgroundFill::Color(
                palette::solid_color(&self.value).unwrap_or_else(|| ColorValue::parse(&self.value)),
            ),
            BackgroundKind::Gradient => match palette::gradient(&self.value) {
                Some(gradient) => BackgroundFill::Gradient(gradient),
                None => BackgroundFill::Color(ColorValue::parse(&self.value)),
            },
            BackgroundKind::Image if self.value.trim().is_empty() => BackgroundFill::None,
            BackgroundKind::Image => BackgroundFill::Image(ImageRef::new(self.value.trim())),
        }
    }
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self::gradient("sunset")
    }
}
