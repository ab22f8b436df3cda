//! Application configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::StageError;

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Default export/render settings.
    pub render: RenderDefaults,

    /// Font families available to text overlays and the watermark.
    pub fonts: FontConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Default export parameters and rasterizer limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderDefaults {
    /// Device pixel multiplier used when the caller does not pick one.
    pub scale: f64,

    /// Default output format (`png` or `jpg`).
    pub format: String,

    /// Default lossy quality in `(0, 1]`.
    pub quality: f64,

    /// Upper bound on waiting for a background image to load.
    pub image_load_timeout_ms: u64,

    /// Largest surface (in pixels) the rasterizer will allocate.
    pub max_surface_pixels: u64,
}

/// Font family registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FontConfig {
    /// Family key used when an overlay names an unknown family.
    pub default_family: String,

    /// Family key (as stored on overlays) to the faces available for it.
    pub families: BTreeMap<String, Vec<FontFaceEntry>>,
}

/// One font file registered under a family key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontFaceEntry {
    /// Path to a TrueType/OpenType file.
    pub path: PathBuf,

    /// CSS weight of this face (100-900).
    #[serde(default = "default_font_weight")]
    pub weight: u16,
}

fn default_font_weight() -> u16 {
    400
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "stage_render_engine=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for RenderDefaults {
    fn default() -> Self {
        Self {
            scale: 2.0,
            format: "png".to_string(),
            quality: 0.92,
            image_load_timeout_ms: 5_000,
            // Matches the area limit browsers impose on a single canvas.
            max_surface_pixels: 268_435_456,
        }
    }
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            default_family: "sans".to_string(),
            families: BTreeMap::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl RenderDefaults {
    /// Image-load timeout as a `Duration`.
    pub fn image_load_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.image_load_timeout_ms)
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match Self::load_from(&config_path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Failed to load config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Load config from an explicit path.
    pub fn load_from(path: &std::path::Path) -> crate::StageResult<Self> {
        if !path.exists() {
            return Err(StageError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| StageError::config(format!("{}: {e}", path.display())))
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("stage").join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let config = AppConfig::default();
        assert!(config.render.scale > 0.0);
        assert_eq!(config.render.format, "png");
        assert!(config.render.quality > 0.0 && config.render.quality <= 1.0);
        assert_eq!(config.fonts.default_family, "sans");
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let json = r#"{ "render": { "scale": 3.0 }, "fonts": { "families": {
            "serif": [{ "path": "/fonts/serif.ttf" }]
        } } }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert!((config.render.scale - 3.0).abs() < 1e-9);
        assert_eq!(config.render.image_load_timeout_ms, 5_000);
        assert_eq!(config.fonts.default_family, "sans");
        assert_eq!(config.fonts.families["serif"][0].weight, 400);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_from_missing_file_errors() {
        let path = std::env::temp_dir().join("stage_missing_config_for_test.json");
        let _ = std::fs::remove_file(&path);
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(StageError::FileNotFound { .. })
        ));
    }

    #[test]
    fn test_malformed_config_is_config_error() {
        let path = std::env::temp_dir().join("stage_malformed_config_for_test.json");
        std::fs::write(&path, r#"{ "render": { "scale": "big" } }"#).unwrap();
        let err = AppConfig::load_from(&path).unwrap_err();
        let _ = std::fs::remove_file(&path);
        assert!(matches!(err, StageError::Config { .. }), "{err}");
    }

    #[test]
    fn test_partial_logging_block_keeps_defaults() {
        let config: AppConfig = serde_json::from_str(r#"{ "logging": { "json": true } }"#).unwrap();
        assert!(config.logging.json);
        assert_eq!(config.logging.level, "info");
        assert!(config.logging.file.is_none());
    }
}
