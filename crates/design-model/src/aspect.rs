//! Aspect-ratio presets and fit math.

use serde::Serialize;

/// A named canvas size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AspectRatioPreset {
    pub id: &'static str,
    pub name: &'static str,
    pub width: u32,
    pub height: u32,
}

impl AspectRatioPreset {
    /// Width divided by height.
    pub fn ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }

    /// Reduced `w/h` string, e.g. `16/9`.
    pub fn css_ratio(&self) -> String {
        let divisor = gcd(self.width, self.height).max(1);
        format!("{}/{}", self.width / divisor, self.height / divisor)
    }
}

/// Presets offered by the aspect-ratio picker.
pub const ASPECT_RATIOS: &[AspectRatioPreset] = &[
    AspectRatioPreset { id: "1_1", name: "Square", width: 1080, height: 1080 },
    AspectRatioPreset { id: "4_5", name: "Portrait", width: 1080, height: 1350 },
    AspectRatioPreset { id: "9_16", name: "Story", width: 1080, height: 1920 },
    AspectRatioPreset { id: "16_9", name: "Landscape", width: 1920, height: 1080 },
    AspectRatioPreset { id: "4_3", name: "Standard", width: 1600, height: 1200 },
    AspectRatioPreset { id: "3_2", name: "Photo", width: 1800, height: 1200 },
    AspectRatioPreset { id: "21_9", name: "Ultrawide", width: 2560, height: 1080 },
    AspectRatioPreset { id: "og", name: "Open Graph", width: 1200, height: 630 },
    AspectRatioPreset { id: "twitter", name: "Twitter Post", width: 1600, height: 900 },
];

/// Look up a preset by id.
pub fn aspect_ratio_preset(id: &str) -> Option<&'static AspectRatioPreset> {
    ASPECT_RATIOS.iter().find(|preset| preset.id == id)
}

/// Scale `width` x `height` down (never up) so it fits the optional bounds
/// while keeping its aspect ratio.
pub fn fit_dimensions(
    width: f64,
    height: f64,
    max_width: Option<f64>,
    max_height: Option<f64>,
) -> (f64, f64) {
    if width <= 0.0 || height <= 0.0 {
        return (width.max(0.0), height.max(0.0));
    }
    let mut factor: f64 = 1.0;
    if let Some(max_w) = max_width.filter(|m| *m > 0.0) {
        factor = factor.min(max_w / width);
    }
    if let Some(max_h) = max_height.filter(|m| *m > 0.0) {
        factor = factor.min(max_h / height);
    }
    ((width * factor).round(), (height * factor).round())
}

fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let preset = aspect_ratio_preset("16_9").unwrap();
        assert_eq!((preset.width, preset.height), (1920, 1080));
        assert_eq!(preset.css_ratio(), "16/9");
        assert!(aspect_ratio_preset("5_7").is_none());
    }

    #[test]
    fn test_preset_ids_are_unique() {
        for (i, a) in ASPECT_RATIOS.iter().enumerate() {
            for b in &ASPECT_RATIOS[i + 1..] {
                assert_ne!(a.id, b.id);
            }
        }
    }

    #[test]
    fn test_fit_dimensions_shrinks_preserving_ratio() {
        let (w, h) = fit_dimensions(1920.0, 1080.0, Some(960.0), None);
        assert_eq!((w, h), (960.0, 540.0));

        let (w, h) = fit_dimensions(1080.0, 1920.0, Some(1000.0), Some(960.0));
        assert_eq!((w, h), (540.0, 960.0));
    }

    #[test]
    fn test_fit_dimensions_never_upscales() {
        assert_eq!(
            fit_dimensions(800.0, 600.0, Some(1600.0), Some(1200.0)),
            (800.0, 600.0)
        );
        assert_eq!(fit_dimensions(800.0, 600.0, None, None), (800.0, 600.0));
    }
}
