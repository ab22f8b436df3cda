//! Export options.

use serde::{Deserialize, Serialize};

use crate::design::DesignError;

/// Output encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Lossless PNG.
    #[default]
    Png,
    /// Lossy JPEG.
    #[serde(alias = "jpeg")]
    Jpg,
}

impl ExportFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Png => "image/png",
            ExportFormat::Jpg => "image/jpeg",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Jpg => "jpg",
        }
    }

    pub fn is_lossy(&self) -> bool {
        matches!(self, ExportFormat::Jpg)
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = DesignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(ExportFormat::Png),
            "jpg" | "jpeg" => Ok(ExportFormat::Jpg),
            other => Err(DesignError::invalid_options(format!(
                "unknown format '{other}' (expected png or jpg)"
            ))),
        }
    }
}

/// How the card is rasterized and encoded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportOptions {
    pub format: ExportFormat,

    /// Lossy quality in `(0, 1]`. Ignored for PNG.
    #[serde(default = "default_quality")]
    pub quality: f64,

    /// Device pixel multiplier.
    #[serde(default = "default_scale")]
    pub scale: f64,

    /// Logical width before scale.
    pub export_width: u32,

    /// Logical height before scale.
    pub export_height: u32,
}

fn default_quality() -> f64 {
    1.0
}

fn default_scale() -> f64 {
    1.0
}

impl ExportOptions {
    pub fn new(format: ExportFormat, export_width: u32, export_height: u32, scale: f64) -> Self {
        Self {
            format,
            quality: 1.0,
            scale,
            export_width,
            export_height,
        }
    }

    /// Check the invariants the rasterizer relies on.
    pub fn validate(&self) -> Result<(), DesignError> {
        if self.export_width == 0 || self.export_height == 0 {
            return Err(DesignError::invalid_options(format!(
                "export size must be positive, got {}x{}",
                self.export_width, self.export_height
            )));
        }
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(DesignError::invalid_options(format!(
                "scale must be a positive number, got {}",
                self.scale
            )));
        }
        if self.format.is_lossy() && !(self.quality > 0.0 && self.quality <= 1.0) {
            return Err(DesignError::invalid_options(format!(
                "quality must be in (0, 1], got {}",
                self.quality
            )));
        }
        let (w, h) = self.device_size_f64();
        if w < 1.0 || h < 1.0 || w > u32::MAX as f64 || h > u32::MAX as f64 {
            return Err(DesignError::invalid_options(format!(
                "scaled size {w}x{h} is not representable"
            )));
        }
        Ok(())
    }

    fn device_size_f64(&self) -> (f64, f64) {
        (
            (self.export_width as f64 * self.scale).round(),
            (self.export_height as f64 * self.scale).round(),
        )
    }

    /// Output size in device pixels. Call `validate` first.
    pub fn device_size(&self) -> (u32, u32) {
        let (w, h) = self.device_size_f64();
        (w as u32, h as u32)
    }

    /// JPEG quality on the encoder's 1-100 scale.
    pub fn encoder_quality(&self) -> u8 {
        let q = if self.quality.is_finite() { self.quality } else { 1.0 };
        (q * 100.0).round().clamp(1.0, 100.0) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_deserialize_camel_case() {
        let json = r#"{ "format": "jpeg", "quality": 0.8, "scale": 2, "exportWidth": 800, "exportHeight": 600 }"#;
        let options: ExportOptions = serde_json::from_str(json).unwrap();
        assert_eq!(options.format, ExportFormat::Jpg);
        assert_eq!(options.device_size(), (1600, 1200));
        assert_eq!(options.encoder_quality(), 80);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let ok = ExportOptions::new(ExportFormat::Png, 10, 10, 1.0);
        assert!(ok.validate().is_ok());

        assert!(ExportOptions { export_width: 0, ..ok }.validate().is_err());
        assert!(ExportOptions { scale: 0.0, ..ok }.validate().is_err());
        assert!(ExportOptions { scale: f64::NAN, ..ok }.validate().is_err());
        assert!(ExportOptions { scale: 0.01, ..ok }.validate().is_err());

        let lossy = ExportOptions {
            format: ExportFormat::Jpg,
            quality: 0.0,
            ..ok
        };
        assert!(lossy.validate().is_err());
        // Quality does not matter for lossless output.
        assert!(ExportOptions { quality: 0.0, ..ok }.validate().is_ok());
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("PNG".parse::<ExportFormat>().unwrap(), ExportFormat::Png);
        assert_eq!("jpeg".parse::<ExportFormat>().unwrap(), ExportFormat::Jpg);
        assert!("gif".parse::<ExportFormat>().is_err());
    }

    proptest! {
        #[test]
        fn prop_integral_scale_multiplies_exactly(w in 1u32..4000, h in 1u32..4000, s in 1u32..4) {
            let options = ExportOptions::new(ExportFormat::Png, w, h, s as f64);
            prop_assert!(options.validate().is_ok());
            prop_assert_eq!(options.device_size(), (w * s, h * s));
        }
    }
}
