//! Named solid colors and gradients offered by the background picker.
//!
//! Several entries are authored in OKLCH, the same way the editor theme
//! declares them, so exports must resolve them before rasterizing.

use crate::background::{GradientStop, LinearGradient};
use crate::color::ColorValue;

/// Solid palette: key and CSS color.
pub const SOLID_COLORS: &[(&str, &str)] = &[
    ("white", "#ffffff"),
    ("black", "#000000"),
    ("gray", "oklch(0.556 0 0)"),
    ("slate", "oklch(0.279 0.041 260.031)"),
    ("zinc", "oklch(0.21 0.006 285.885)"),
    ("red", "oklch(0.637 0.237 25.331)"),
    ("orange", "oklch(0.705 0.213 47.604)"),
    ("amber", "oklch(0.769 0.188 70.08)"),
    ("emerald", "oklch(0.696 0.17 162.48)"),
    ("sky", "oklch(0.685 0.169 237.323)"),
    ("indigo", "oklch(0.585 0.233 277.117)"),
    ("rose", "oklch(0.645 0.246 16.439)"),
    ("cream", "#fdf6e3"),
    ("navy", "#0b1f3a"),
];

/// A named linear gradient.
#[derive(Debug, Clone, Copy)]
pub struct GradientPreset {
    pub key: &'static str,
    /// CSS gradient angle in degrees (0 = towards top, 90 = towards right).
    pub angle_deg: f64,
    /// Stop colors with offsets in `[0, 1]`.
    pub stops: &'static [(&'static str, f64)],
}

/// Gradient palette.
pub const GRADIENTS: &[GradientPreset] = &[
    GradientPreset {
        key: "sunset",
        angle_deg: 135.0,
        stops: &[("#ff7e5f", 0.0), ("#feb47b", 1.0)],
    },
    GradientPreset {
        key: "ocean",
        angle_deg: 135.0,
        stops: &[
            ("oklch(0.62 0.19 260)", 0.0),
            ("oklch(0.78 0.12 200)", 1.0),
        ],
    },
    GradientPreset {
        key: "aurora",
        angle_deg: 120.0,
        stops: &[
            ("oklch(0.7 0.17 162)", 0.0),
            ("oklch(0.6 0.2 277)", 0.5),
            ("oklch(0.65 0.25 330)", 1.0),
        ],
    },
    GradientPreset {
        key: "midnight",
        angle_deg: 180.0,
        stops: &[("#0f2027", 0.0), ("#203a43", 0.5), ("#2c5364", 1.0)],
    },
    GradientPreset {
        key: "peach",
        angle_deg: 90.0,
        stops: &[("#ffecd2", 0.0), ("#fcb69f", 1.0)],
    },
    GradientPreset {
        key: "mint",
        angle_deg: 45.0,
        stops: &[
            ("oklch(0.9 0.08 170)", 0.0),
            ("oklch(0.75 0.14 190)", 1.0),
        ],
    },
];

/// Look up a solid palette entry.
pub fn solid_color(key: &str) -> Option<ColorValue> {
    SOLID_COLORS
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, css)| ColorValue::parse(css))
}

/// Look up a gradient palette entry.
pub fn gradient(key: &str) -> Option<LinearGradient> {
    GRADIENTS
        .iter()
        .find(|preset| preset.key == key)
        .map(|preset| LinearGradient {
            angle_deg: preset.angle_deg,
            stops: preset
                .stops
                .iter()
                .map(|(css, offset)| GradientStop {
                    color: ColorValue::parse(css),
                    offset: *offset,
                })
                .collect(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_palette_entry_parses() {
        for (key, _) in SOLID_COLORS {
            let color = solid_color(key).unwrap();
            assert!(color.to_device().is_some(), "solid {key} should resolve");
        }
        for preset in GRADIENTS {
            let gradient = gradient(preset.key).unwrap();
            assert!(gradient.stops.len() >= 2);
            for stop in &gradient.stops {
                assert!(stop.color.to_device().is_some(), "{} stop", preset.key);
            }
        }
    }

    #[test]
    fn test_palette_contains_perceptual_entries() {
        assert!(solid_color("slate").unwrap().is_perceptual());
        assert!(gradient("ocean").unwrap().stops[0].color.is_perceptual());
        assert!(!solid_color("white").unwrap().is_perceptual());
    }

    #[test]
    fn test_unknown_keys() {
        assert!(solid_color("plaid").is_none());
        assert!(gradient("plaid").is_none());
    }
}
