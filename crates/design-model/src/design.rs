//! A complete card design as snapshotted from the editor store.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::aspect::{aspect_ratio_preset, AspectRatioPreset};
use crate::background::BackgroundConfig;
use crate::overlay::TextOverlay;
use crate::scene::SceneDescription;

/// Read-only snapshot of everything the export pipeline needs from the
/// editor: background, border radius, overlays, aspect selection and the
/// scene layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardDesign {
    /// Aspect-ratio preset id.
    #[serde(default = "default_aspect_ratio", alias = "selectedAspectRatio")]
    pub aspect_ratio: String,

    #[serde(default, alias = "backgroundConfig")]
    pub background: BackgroundConfig,

    /// Corner radius of the card in logical pixels.
    #[serde(default, alias = "backgroundBorderRadius")]
    pub border_radius: f64,

    #[serde(default, alias = "textOverlays")]
    pub overlays: Vec<TextOverlay>,

    /// Scene layout; absent when the design has no user image yet.
    #[serde(default)]
    pub scene: Option<SceneDescription>,
}

fn default_aspect_ratio() -> String {
    "16_9".to_string()
}

impl Default for CardDesign {
    fn default() -> Self {
        Self {
            aspect_ratio: default_aspect_ratio(),
            background: BackgroundConfig::default(),
            border_radius: 0.0,
            overlays: vec![],
            scene: None,
        }
    }
}

impl CardDesign {
    /// Load a design from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DesignError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| DesignError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&json).map_err(|e| DesignError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Save the design as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), DesignError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).map_err(|e| DesignError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        std::fs::write(path, json).map_err(|e| DesignError::IoError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// The selected aspect preset.
    pub fn preset(&self) -> Result<&'static AspectRatioPreset, DesignError> {
        aspect_ratio_preset(&self.aspect_ratio).ok_or_else(|| DesignError::UnknownPreset {
            id: self.aspect_ratio.clone(),
        })
    }
}

/// Errors from loading or validating design data.
#[derive(Debug, thiserror::Error)]
pub enum DesignError {
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Unknown aspect ratio preset: {id}")]
    UnknownPreset { id: String },

    #[error("Invalid export options: {message}")]
    InvalidOptions { message: String },
}

impl DesignError {
    pub fn invalid_options(msg: impl Into<String>) -> Self {
        Self::InvalidOptions {
            message: msg.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::background::BackgroundKind;
    use crate::color::ColorValue;

    #[test]
    fn test_store_snapshot_aliases() {
        let json = r#"{
            "selectedAspectRatio": "1_1",
            "backgroundConfig": { "type": "solid", "value": "slate", "opacity": 1 },
            "backgroundBorderRadius": 24,
            "textOverlays": [
                { "text": "Launch", "position": { "x": 50, "y": 10 }, "fontSize": 32, "color": "white" }
            ]
        }"#;
        let design: CardDesign = serde_json::from_str(json).unwrap();
        assert_eq!(design.aspect_ratio, "1_1");
        assert_eq!(design.background.kind, BackgroundKind::Solid);
        assert_eq!(design.border_radius, 24.0);
        assert_eq!(design.overlays.len(), 1);
        assert!(design.overlays[0].visible);
        assert_eq!(design.preset().unwrap().width, 1080);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = std::env::temp_dir().join("stage_test_design");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("design.json");

        let mut design = CardDesign::default();
        design.overlays.push(TextOverlay::new(
            "Hello",
            25.0,
            75.0,
            18.0,
            ColorValue::parse("oklch(0.7 0.1 30)"),
        ));
        design.save(&path).unwrap();

        let loaded = CardDesign::load(&path).unwrap();
        assert_eq!(loaded.overlays[0].text, "Hello");
        assert!(loaded.overlays[0].color.is_perceptual());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unknown_preset_errors() {
        let design = CardDesign {
            aspect_ratio: "7_3".to_string(),
            ..CardDesign::default()
        };
        assert!(matches!(
            design.preset(),
            Err(DesignError::UnknownPreset { .. })
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let err = CardDesign::load("/definitely/not/here/design.json").unwrap_err();
        assert!(matches!(err, DesignError::IoError { .. }));
    }
}
