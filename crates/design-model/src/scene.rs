//! Serializable description of the retained scene holding the user's image.
//!
//! Coordinates are in stage units (the scene's native display size). By
//! convention `layers[0]` is the stage background layer, which exports skip
//! because the background renderer already paints the card background.

use serde::{Deserialize, Serialize};

use crate::background::ImageRef;
use crate::color::ColorValue;

/// A whole scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDescription {
    /// Native stage width.
    pub width: f64,
    /// Native stage height.
    pub height: f64,
    /// Layers bottom to top.
    #[serde(default)]
    pub layers: Vec<LayerDescription>,
}

/// One scene layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerDescription {
    pub name: String,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default)]
    pub nodes: Vec<NodeDescription>,
}

fn default_true() -> bool {
    true
}

fn default_opacity() -> f64 {
    1.0
}

/// Axis-aligned box in stage units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl NodeBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// How an image fills its node box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImageFit {
    /// Scale to cover the box, cropping overflow.
    Cover,
    /// Scale to fit inside the box, centered.
    #[default]
    Contain,
    /// Stretch to the box ignoring aspect ratio.
    Fill,
}

/// A drawable scene node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeDescription {
    /// The user's image.
    Image {
        source: ImageRef,
        #[serde(flatten)]
        bounds: NodeBox,
        #[serde(default)]
        fit: ImageFit,
        #[serde(default)]
        corner_radius: f64,
        #[serde(default = "default_opacity")]
        opacity: f64,
    },
    /// A filled rectangle.
    Rect {
        #[serde(flatten)]
        bounds: NodeBox,
        fill: ColorValue,
        #[serde(default)]
        corner_radius: f64,
        #[serde(default = "default_opacity")]
        opacity: f64,
    },
    /// A stroked outline, e.g. a device frame.
    Frame {
        #[serde(flatten)]
        bounds: NodeBox,
        stroke: ColorValue,
        stroke_width: f64,
        #[serde(default)]
        corner_radius: f64,
        #[serde(default = "default_opacity")]
        opacity: f64,
    },
}

impl SceneDescription {
    /// An empty stage with a background layer and a content layer.
    pub fn empty(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            layers: vec![
                LayerDescription {
                    name: "background".to_string(),
                    visible: true,
                    nodes: vec![],
                },
                LayerDescription {
                    name: "content".to_string(),
                    visible: true,
                    nodes: vec![],
                },
            ],
        }
    }

    /// A stage holding one image centered with `padding_ratio` margin on
    /// each side (relative to the shorter stage side).
    pub fn with_centered_image(
        width: f64,
        height: f64,
        source: ImageRef,
        padding_ratio: f64,
        corner_radius: f64,
    ) -> Self {
        let mut scene = Self::empty(width, height);
        let pad = width.min(height) * padding_ratio.clamp(0.0, 0.45);
        scene.layers[1].nodes.push(NodeDescription::Image {
            source,
            bounds: NodeBox::new(pad, pad, width - 2.0 * pad, height - 2.0 * pad),
            fit: ImageFit::Contain,
            corner_radius,
            opacity: 1.0,
        });
        scene
    }

    /// All image references in draw order.
    pub fn image_sources(&self) -> Vec<&ImageRef> {
        self.layers
            .iter()
            .flat_map(|layer| layer.nodes.iter())
            .filter_map(|node| match node {
                NodeDescription::Image { source, .. } => Some(source),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_json_shape() {
        let json = r##"{
            "width": 800, "height": 600,
            "layers": [
                { "name": "background" },
                { "name": "content", "nodes": [
                    { "kind": "image", "source": "shot.png", "x": 40, "y": 40, "width": 720, "height": 520, "fit": "cover", "corner_radius": 12 },
                    { "kind": "frame", "x": 40, "y": 40, "width": 720, "height": 520, "stroke": "#222222", "stroke_width": 4 }
                ] }
            ]
        }"##;
        let scene: SceneDescription = serde_json::from_str(json).unwrap();
        assert_eq!(scene.layers.len(), 2);
        assert!(scene.layers[0].visible);
        match &scene.layers[1].nodes[0] {
            NodeDescription::Image { fit, bounds, opacity, .. } => {
                assert_eq!(*fit, ImageFit::Cover);
                assert_eq!(bounds.width, 720.0);
                assert_eq!(*opacity, 1.0);
            }
            other => panic!("expected image node, got {other:?}"),
        }
        assert_eq!(scene.image_sources(), vec![&ImageRef::new("shot.png")]);
    }

    #[test]
    fn test_centered_image_padding() {
        let scene = SceneDescription::with_centered_image(1000.0, 500.0, ImageRef::new("a.png"), 0.1, 0.0);
        match &scene.layers[1].nodes[0] {
            NodeDescription::Image { bounds, .. } => {
                assert_eq!(*bounds, NodeBox::new(50.0, 50.0, 900.0, 400.0));
            }
            other => panic!("expected image node, got {other:?}"),
        }
    }
}
