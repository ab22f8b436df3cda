//! A minimal retained style tree for the background scaffold.
//!
//! The scaffold is a container node with flat children (base fill, blurred
//! image, one node per text overlay). Host stylesheets attach declarations
//! to the container; inherited properties flow to the children during
//! [`StyleTree::compute`].

use std::collections::BTreeMap;

use stage_design_model::{ColorValue, ImageRef, LinearGradient};

/// The properties the background painter understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StyleProperty {
    Width,
    Height,
    Left,
    Top,
    BorderRadius,
    BackgroundColor,
    BackgroundImage,
    Opacity,
    Filter,
    Color,
    FontSize,
    FontWeight,
    FontFamily,
    WritingMode,
    TextShadow,
}

impl StyleProperty {
    pub fn css_name(&self) -> &'static str {
        match self {
            StyleProperty::Width => "width",
            StyleProperty::Height => "height",
            StyleProperty::Left => "left",
            StyleProperty::Top => "top",
            StyleProperty::BorderRadius => "border-radius",
            StyleProperty::BackgroundColor => "background-color",
            StyleProperty::BackgroundImage => "background-image",
            StyleProperty::Opacity => "opacity",
            StyleProperty::Filter => "filter",
            StyleProperty::Color => "color",
            StyleProperty::FontSize => "font-size",
            StyleProperty::FontWeight => "font-weight",
            StyleProperty::FontFamily => "font-family",
            StyleProperty::WritingMode => "writing-mode",
            StyleProperty::TextShadow => "text-shadow",
        }
    }

    /// CSS-inherited properties.
    pub fn is_inherited(&self) -> bool {
        matches!(
            self,
            StyleProperty::Color
                | StyleProperty::FontSize
                | StyleProperty::FontWeight
                | StyleProperty::FontFamily
                | StyleProperty::WritingMode
        )
    }
}

/// `text-shadow` components in logical pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct ShadowValue {
    pub offset_x: f64,
    pub offset_y: f64,
    pub blur: f64,
    pub color: ColorValue,
}

/// A declared or computed property value.
#[derive(Debug, Clone, PartialEq)]
pub enum StyleValue {
    Color(ColorValue),
    Gradient(LinearGradient),
    Image(ImageRef),
    Shadow(ShadowValue),
    /// Length in logical pixels.
    Length(f64),
    Number(f64),
    Keyword(String),
    /// `filter: blur(<px>)` in logical pixels.
    Blur(f64),
    /// CSS text the scaffold does not model structurally.
    Raw(String),
}

impl StyleValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            StyleValue::Length(v) | StyleValue::Number(v) | StyleValue::Blur(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_keyword(&self) -> Option<&str> {
        match self {
            StyleValue::Keyword(k) => Some(k.as_str()),
            _ => None,
        }
    }

    /// Color-valued view. Raw text is parsed on demand.
    pub fn as_color(&self) -> Option<ColorValue> {
        match self {
            StyleValue::Color(c) => Some(c.clone()),
            StyleValue::Raw(text) => Some(ColorValue::parse(text)),
            _ => None,
        }
    }
}

/// Property declarations for one node or one stylesheet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleMap(BTreeMap<StyleProperty, StyleValue>);

impl StyleMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, property: StyleProperty, value: StyleValue) -> Self {
        self.0.insert(property, value);
        self
    }

    pub fn set(&mut self, property: StyleProperty, value: StyleValue) {
        self.0.insert(property, value);
    }

    pub fn get(&self, property: StyleProperty) -> Option<&StyleValue> {
        self.0.get(&property)
    }

    pub fn remove(&mut self, property: StyleProperty) -> Option<StyleValue> {
        self.0.remove(&property)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StyleProperty, &StyleValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn f64_or(&self, property: StyleProperty, fallback: f64) -> f64 {
        self.get(property)
            .and_then(StyleValue::as_f64)
            .filter(|v| v.is_finite())
            .unwrap_or(fallback)
    }
}

impl FromIterator<(StyleProperty, StyleValue)> for StyleMap {
    fn from_iter<I: IntoIterator<Item = (StyleProperty, StyleValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// What a scaffold node paints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    /// Card box; owns size and clip radius.
    Container,
    /// Sharp background color or gradient and, without blur, the image.
    BaseFill,
    /// Full-bleed blurred copy of the background image.
    BlurredImage,
    /// One text overlay, by index into the request's overlay list.
    Text { overlay: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct StyleNode {
    pub role: NodeRole,
    pub style: StyleMap,
    pub text: Option<String>,
}

impl StyleNode {
    pub fn new(role: NodeRole, style: StyleMap) -> Self {
        Self {
            role,
            style,
            text: None,
        }
    }
}

/// A host stylesheet whose declarations apply to the container.
#[derive(Debug, Clone, PartialEq)]
pub struct Stylesheet {
    pub name: String,
    pub declarations: StyleMap,
    pub disabled: bool,
}

impl Stylesheet {
    pub fn new(name: impl Into<String>, declarations: StyleMap) -> Self {
        Self {
            name: name.into(),
            declarations,
            disabled: false,
        }
    }
}

/// The scaffold: stylesheets plus nodes. `nodes[0]` is the container.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleTree {
    pub sheets: Vec<Stylesheet>,
    pub nodes: Vec<StyleNode>,
}

/// Cascaded per-node styles, ready to paint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComputedTree {
    pub nodes: Vec<StyleNode>,
}

impl ComputedTree {
    pub fn node(&self, role: NodeRole) -> Option<&StyleNode> {
        self.nodes.iter().find(|node| node.role == role)
    }
}

impl StyleTree {
    /// Cascade enabled stylesheets into the container, then inherit into
    /// the children. Node declarations always win.
    pub fn compute(&self) -> ComputedTree {
        let mut root = StyleMap::new();
        for sheet in self.sheets.iter().filter(|sheet| !sheet.disabled) {
            for (property, value) in sheet.declarations.iter() {
                root.set(*property, value.clone());
            }
        }

        let mut nodes = Vec::with_capacity(self.nodes.len());
        let mut inherited = StyleMap::new();
        for (index, node) in self.nodes.iter().enumerate() {
            let mut computed = if index == 0 {
                root.clone()
            } else {
                inherited.clone()
            };
            for (property, value) in node.style.iter() {
                computed.set(*property, value.clone());
            }
            if index == 0 {
                inherited = computed
                    .iter()
                    .filter(|(property, _)| property.is_inherited())
                    .map(|(p, v)| (*p, v.clone()))
                    .collect();
            }
            nodes.push(StyleNode {
                role: node.role,
                style: computed,
                text: node.text.clone(),
            });
        }
        ComputedTree { nodes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> StyleTree {
        StyleTree {
            sheets: vec![
                Stylesheet::new(
                    "theme",
                    StyleMap::new()
                        .with(StyleProperty::Color, StyleValue::Color(ColorValue::parse("red")))
                        .with(StyleProperty::FontFamily, StyleValue::Keyword("serif".into()))
                        .with(StyleProperty::Opacity, StyleValue::Number(0.5)),
                ),
            ],
            nodes: vec![
                StyleNode::new(NodeRole::Container, StyleMap::new()),
                StyleNode::new(
                    NodeRole::Text { overlay: 0 },
                    StyleMap::new()
                        .with(StyleProperty::Color, StyleValue::Color(ColorValue::parse("blue"))),
                ),
            ],
        }
    }

    #[test]
    fn test_inherited_properties_flow_to_children() {
        let computed = tree().compute();
        let text = computed.node(NodeRole::Text { overlay: 0 }).unwrap();
        assert_eq!(
            text.style.get(StyleProperty::FontFamily),
            Some(&StyleValue::Keyword("serif".into()))
        );
        // Node declarations win over inherited values.
        assert_eq!(
            text.style.get(StyleProperty::Color),
            Some(&StyleValue::Color(ColorValue::parse("blue")))
        );
        // Opacity is not inherited.
        assert!(text.style.get(StyleProperty::Opacity).is_none());
    }

    #[test]
    fn test_disabled_sheets_do_not_cascade() {
        let mut tree = tree();
        tree.sheets[0].disabled = true;
        let computed = tree.compute();
        assert!(computed.nodes[0].style.is_empty());
    }

    #[test]
    fn test_raw_values_parse_as_colors() {
        let value = StyleValue::Raw("#00ff00".into());
        assert_eq!(value.as_color(), Some(ColorValue::device(0, 255, 0, 255)));
        assert_eq!(StyleValue::Length(3.0).as_color(), None);
    }
}
