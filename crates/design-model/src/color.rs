//! Tagged color values.
//!
//! Colors are classified once, when a value is authored or deserialized:
//! device sRGB values are stored as 8-bit RGBA, values written in a
//! perceptual space (OKLCH, OKLab, CIE Lab/LCH) keep their authored
//! components until the export pipeline resolves them, and anything that
//! does not parse is kept verbatim.

use std::fmt;

use peniko::color;
use serde::{Deserialize, Serialize};

/// An 8-bit straight-alpha sRGB color, the only form the rasterizer draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DeviceRgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl DeviceRgba {
    pub const TRANSPARENT: DeviceRgba = DeviceRgba::new(0, 0, 0, 0);
    pub const BLACK: DeviceRgba = DeviceRgba::new(0, 0, 0, 255);
    pub const WHITE: DeviceRgba = DeviceRgba::new(255, 255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Scale alpha by `opacity` (clamped to `[0, 1]`).
    pub fn with_opacity(self, opacity: f64) -> Self {
        let a = (self.a as f64 * opacity.clamp(0.0, 1.0)).round() as u8;
        Self { a, ..self }
    }

    /// Channels as an array in RGBA order.
    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    pub fn is_transparent(&self) -> bool {
        self.a == 0
    }
}

/// Perceptual color spaces the rasterizer cannot consume directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerceptualSpace {
    Oklch,
    Oklab,
    Lab,
    Lch,
}

impl PerceptualSpace {
    /// The CSS function name for this space.
    pub fn function_name(&self) -> &'static str {
        match self {
            PerceptualSpace::Oklch => "oklch",
            PerceptualSpace::Oklab => "oklab",
            PerceptualSpace::Lab => "lab",
            PerceptualSpace::Lch => "lch",
        }
    }

    fn from_tag(tag: color::ColorSpaceTag) -> Option<Self> {
        match tag {
            color::ColorSpaceTag::Oklch => Some(PerceptualSpace::Oklch),
            color::ColorSpaceTag::Oklab => Some(PerceptualSpace::Oklab),
            color::ColorSpaceTag::Lab => Some(PerceptualSpace::Lab),
            color::ColorSpaceTag::Lch => Some(PerceptualSpace::Lch),
            _ => None,
        }
    }
}

/// A color as authored in a design.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ColorValue {
    /// Already in device sRGB.
    Device(DeviceRgba),

    /// Authored in a perceptual space; `components` are the CSS channel
    /// values followed by alpha.
    Perceptual {
        space: PerceptualSpace,
        components: [f32; 4],
    },

    /// Not a recognizable CSS color. Kept verbatim so nothing is lost.
    Unparsed(String),
}

impl ColorValue {
    /// Fully transparent black.
    pub const TRANSPARENT: ColorValue = ColorValue::Device(DeviceRgba::TRANSPARENT);

    /// Classify a CSS color string.
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        match color::parse_color(trimmed) {
            Ok(parsed) => match PerceptualSpace::from_tag(parsed.cs) {
                Some(space) => ColorValue::Perceptual {
                    space,
                    components: parsed.components,
                },
                None => {
                    let rgba = parsed.to_alpha_color::<color::Srgb>().to_rgba8();
                    ColorValue::Device(DeviceRgba::new(rgba.r, rgba.g, rgba.b, rgba.a))
                }
            },
            Err(_) => ColorValue::Unparsed(input.to_string()),
        }
    }

    pub const fn device(r: u8, g: u8, b: u8, a: u8) -> Self {
        ColorValue::Device(DeviceRgba::new(r, g, b, a))
    }

    /// Whether this value still needs perceptual-to-device resolution.
    pub fn is_perceptual(&self) -> bool {
        matches!(self, ColorValue::Perceptual { .. })
    }

    /// Resolve to device sRGB. Out-of-gamut values are clipped per channel.
    /// Returns `None` for unparsed input.
    pub fn to_device(&self) -> Option<DeviceRgba> {
        match self {
            ColorValue::Device(rgba) => Some(*rgba),
            ColorValue::Perceptual { space, components } => {
                Some(perceptual_to_device(*space, *components))
            }
            ColorValue::Unparsed(_) => None,
        }
    }

    /// Whether the color is known to paint nothing.
    pub fn is_transparent(&self) -> bool {
        match self {
            ColorValue::Device(rgba) => rgba.is_transparent(),
            ColorValue::Perceptual { components, .. } => components[3] <= 0.0,
            ColorValue::Unparsed(_) => false,
        }
    }
}

fn perceptual_to_device(space: PerceptualSpace, components: [f32; 4]) -> DeviceRgba {
    let rgba = match space {
        PerceptualSpace::Oklch => color::AlphaColor::<color::Oklch>::new(components).to_rgba8(),
        PerceptualSpace::Oklab => color::AlphaColor::<color::Oklab>::new(components).to_rgba8(),
        PerceptualSpace::Lab => color::AlphaColor::<color::Lab>::new(components).to_rgba8(),
        PerceptualSpace::Lch => color::AlphaColor::<color::Lch>::new(components).to_rgba8(),
    };
    DeviceRgba::new(rgba.r, rgba.g, rgba.b, rgba.a)
}

impl Default for ColorValue {
    fn default() -> Self {
        ColorValue::TRANSPARENT
    }
}

impl From<String> for ColorValue {
    fn from(value: String) -> Self {
        ColorValue::parse(&value)
    }
}

impl From<&str> for ColorValue {
    fn from(value: &str) -> Self {
        ColorValue::parse(value)
    }
}

impl From<ColorValue> for String {
    fn from(value: ColorValue) -> Self {
        value.to_string()
    }
}

impl From<DeviceRgba> for ColorValue {
    fn from(value: DeviceRgba) -> Self {
        ColorValue::Device(value)
    }
}

impl fmt::Display for DeviceRgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a == 255 {
            write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            write!(
                f,
                "rgba({}, {}, {}, {})",
                self.r,
                self.g,
                self.b,
                format_number(self.a as f32 / 255.0)
            )
        }
    }
}

impl fmt::Display for ColorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColorValue::Device(rgba) => rgba.fmt(f),
            ColorValue::Perceptual { space, components } => {
                let [a, b, c, alpha] = *components;
                write!(
                    f,
                    "{}({} {} {}",
                    space.function_name(),
                    format_number(a),
                    format_number(b),
                    format_number(c)
                )?;
                if alpha < 1.0 {
                    write!(f, " / {}", format_number(alpha))?;
                }
                write!(f, ")")
            }
            ColorValue::Unparsed(raw) => f.write_str(raw),
        }
    }
}

/// Format a channel value with at most four decimals and no trailing zeros.
pub fn format_number(value: f32) -> String {
    let text = format!("{value:.4}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text.is_empty() || text == "-" {
        "0".to_string()
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: DeviceRgba, b: DeviceRgba, tolerance: i16) -> bool {
        a.to_array()
            .iter()
            .zip(b.to_array().iter())
            .all(|(x, y)| (*x as i16 - *y as i16).abs() <= tolerance)
    }

    #[test]
    fn test_named_and_hex_colors_are_device() {
        assert_eq!(
            ColorValue::parse("white"),
            ColorValue::Device(DeviceRgba::WHITE)
        );
        assert_eq!(
            ColorValue::parse("#ff000080"),
            ColorValue::device(255, 0, 0, 128)
        );
        let translucent = ColorValue::parse("rgba(255, 255, 255, 0.7)")
            .to_device()
            .unwrap();
        assert_eq!((translucent.r, translucent.g, translucent.b), (255, 255, 255));
        assert!((178..=179).contains(&translucent.a));
    }

    #[test]
    fn test_oklch_is_tagged_perceptual() {
        let value = ColorValue::parse("oklch(0.628 0.2577 29.23)");
        assert!(value.is_perceptual());
        match value {
            ColorValue::Perceptual { space, .. } => assert_eq!(space, PerceptualSpace::Oklch),
            other => panic!("expected perceptual, got {other:?}"),
        }
    }

    #[test]
    fn test_oklch_resolves_to_srgb() {
        let red = ColorValue::parse("oklch(0.628 0.2577 29.23)").to_device().unwrap();
        assert!(close(red, DeviceRgba::new(255, 0, 0, 255), 2), "{red:?}");

        let white = ColorValue::parse("oklch(1 0 0)").to_device().unwrap();
        assert!(close(white, DeviceRgba::WHITE, 1), "{white:?}");

        let black = ColorValue::parse("oklch(0 0 0)").to_device().unwrap();
        assert!(close(black, DeviceRgba::BLACK, 1), "{black:?}");
    }

    #[test]
    fn test_oklch_alpha_is_kept() {
        let c = ColorValue::parse("oklch(1 0 0 / 0.5)").to_device().unwrap();
        assert!((c.a as i16 - 128).abs() <= 1);
    }

    #[test]
    fn test_malformed_is_unparsed_and_kept_verbatim() {
        let value = ColorValue::parse("oklch(banana)");
        assert_eq!(value, ColorValue::Unparsed("oklch(banana)".to_string()));
        assert_eq!(value.to_device(), None);
        assert_eq!(value.to_string(), "oklch(banana)");
    }

    #[test]
    fn test_serde_uses_css_strings() {
        let value: ColorValue = serde_json::from_str("\"oklch(0.5 0.1 200)\"").unwrap();
        assert!(value.is_perceptual());
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, "\"oklch(0.5 0.1 200)\"");

        let device: ColorValue = serde_json::from_str("\"#102030\"").unwrap();
        assert_eq!(serde_json::to_string(&device).unwrap(), "\"#102030\"");
    }

    #[test]
    fn test_with_opacity_scales_alpha() {
        let c = DeviceRgba::WHITE.with_opacity(0.5);
        assert_eq!(c.a, 128);
        assert_eq!(DeviceRgba::WHITE.with_opacity(4.0).a, 255);
    }

    #[test]
    fn test_format_number_trims() {
        assert_eq!(format_number(1.0), "1");
        assert_eq!(format_number(0.25), "0.25");
        assert_eq!(format_number(0.0), "0");
    }
}
