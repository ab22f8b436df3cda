//! Perceptual-to-device color normalization.
//!
//! The background painter only understands device sRGB. Before painting,
//! the scaffold is copied and every OKLCH / OKLab / Lab / LCH value in it is
//! replaced by the sRGB color it resolves to. Host stylesheets that declare
//! perceptual colors are suppressed in the copy after their values have been
//! inlined onto the container, so the cascade cannot reintroduce them.

use stage_design_model::{format_number, ColorValue, DeviceRgba, LinearGradient};

use crate::style::{ComputedTree, ShadowValue, StyleMap, StyleProperty, StyleTree, StyleValue};

const PERCEPTUAL_FUNCTIONS: [&str; 4] = ["oklch(", "oklab(", "lab(", "lch("];

/// Stateless normalization pass over style values, maps, and trees.
#[derive(Debug, Clone, Copy, Default)]
pub struct StyleNormalizer;

impl StyleNormalizer {
    /// Resolve one color. Device and unresolvable values pass through.
    pub fn resolve_color(color: &ColorValue) -> ColorValue {
        match color {
            ColorValue::Perceptual { .. } => match color.to_device() {
                Some(device) => ColorValue::Device(device),
                None => color.clone(),
            },
            _ => color.clone(),
        }
    }

    pub fn normalize_value(value: &StyleValue) -> StyleValue {
        match value {
            StyleValue::Color(color) => StyleValue::Color(Self::resolve_color(color)),
            StyleValue::Gradient(gradient) => StyleValue::Gradient(LinearGradient {
                angle_deg: gradient.angle_deg,
                stops: gradient
                    .stops
                    .iter()
                    .map(|stop| stage_design_model::GradientStop {
                        color: Self::resolve_color(&stop.color),
                        offset: stop.offset,
                    })
                    .collect(),
            }),
            StyleValue::Shadow(shadow) => StyleValue::Shadow(ShadowValue {
                color: Self::resolve_color(&shadow.color),
                ..shadow.clone()
            }),
            StyleValue::Raw(text) => StyleValue::Raw(Self::normalize_css_text(text)),
            other => other.clone(),
        }
    }

    pub fn normalize_map(map: &StyleMap) -> StyleMap {
        map.iter()
            .map(|(property, value)| (*property, Self::normalize_value(value)))
            .collect()
    }

    /// Replace every perceptual color function call in CSS text with an
    /// `rgb()`/`rgba()` literal. Calls that fail to parse are kept verbatim.
    pub fn normalize_css_text(text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut cursor = 0;
        while let Some((start, end)) = find_perceptual_call(text, cursor) {
            out.push_str(&text[cursor..start]);
            let call = &text[start..end];
            match resolve_call(call) {
                Some(device) => out.push_str(&css_rgb(device)),
                None => {
                    tracing::debug!(expression = call, "Leaving malformed color expression unchanged");
                    out.push_str(call);
                }
            }
            cursor = end;
        }
        out.push_str(&text[cursor..]);
        out
    }

    /// Produce the computed, device-only styles of a scaffold. The input
    /// tree is not modified.
    pub fn snapshot(tree: &StyleTree) -> ComputedTree {
        let mut copy = tree.clone();

        let mut inlined = StyleMap::new();
        for sheet in copy.sheets.iter_mut().filter(|sheet| !sheet.disabled) {
            if !sheet.declarations.iter().any(|(_, v)| declares_perceptual(v)) {
                continue;
            }
            for (property, value) in sheet.declarations.iter() {
                inlined.set(*property, value.clone());
            }
            sheet.disabled = true;
            tracing::debug!(sheet = %sheet.name, "Suppressed stylesheet with perceptual colors for export");
        }
        if let Some(container) = copy.nodes.first_mut() {
            for (property, value) in inlined.iter() {
                if container.style.get(*property).is_none() {
                    container.style.set(*property, value.clone());
                }
            }
        }

        for node in copy.nodes.iter_mut() {
            node.style = Self::normalize_map(&node.style);
        }

        // Recompute with the surviving sheets.
        let computed = copy.compute();
        debug_assert!(
            Self::residual_perceptual(&computed).is_empty(),
            "perceptual colors survived normalization"
        );
        computed
    }

    /// Node index and property of every value still carrying a resolvable
    /// perceptual color.
    pub fn residual_perceptual(tree: &ComputedTree) -> Vec<(usize, StyleProperty)> {
        tree.nodes
            .iter()
            .enumerate()
            .flat_map(|(index, node)| {
                node.style
                    .iter()
                    .filter(|(_, value)| declares_perceptual(value))
                    .map(move |(property, _)| (index, *property))
            })
            .collect::<Vec<_>>()
    }
}

/// Whether a value carries a perceptual color the normalizer can resolve.
pub fn declares_perceptual(value: &StyleValue) -> bool {
    match value {
        StyleValue::Color(color) => color_is_perceptual(color),
        StyleValue::Gradient(gradient) => gradient.stops.iter().any(|s| color_is_perceptual(&s.color)),
        StyleValue::Shadow(shadow) => color_is_perceptual(&shadow.color),
        StyleValue::Raw(text) => contains_resolvable_call(text),
        _ => false,
    }
}

fn color_is_perceptual(color: &ColorValue) -> bool {
    matches!(color, ColorValue::Perceptual { .. })
}

fn contains_resolvable_call(text: &str) -> bool {
    let mut cursor = 0;
    while let Some((start, end)) = find_perceptual_call(text, cursor) {
        if resolve_call(&text[start..end]).is_some() {
            return true;
        }
        cursor = end;
    }
    false
}

fn resolve_call(call: &str) -> Option<DeviceRgba> {
    match ColorValue::parse(call) {
        perceptual @ ColorValue::Perceptual { .. } => perceptual.to_device(),
        _ => None,
    }
}

/// Byte range of the next perceptual function call at or after `from`,
/// including its closing parenthesis. Matching is ASCII case-insensitive
/// and requires a word boundary before the name, so `lab(` does not match
/// inside `oklab(`.
fn find_perceptual_call(text: &str, from: usize) -> Option<(usize, usize)> {
    let bytes = text.as_bytes();
    let mut i = from;
    while i < bytes.len() {
        let at_boundary = i == 0 || {
            let prev = bytes[i - 1];
            !(prev.is_ascii_alphanumeric() || prev == b'-' || prev == b'_')
        };
        if at_boundary {
            for name in PERCEPTUAL_FUNCTIONS {
                let candidate = &bytes[i..];
                if candidate.len() >= name.len()
                    && candidate[..name.len()].eq_ignore_ascii_case(name.as_bytes())
                {
                    let end = matching_paren(bytes, i + name.len())?;
                    return Some((i, end));
                }
            }
        }
        i += 1;
    }
    None
}

/// Index just past the `)` closing a call whose body starts at `from`.
fn matching_paren(bytes: &[u8], from: usize) -> Option<usize> {
    let mut depth = 1usize;
    for (offset, byte) in bytes[from..].iter().enumerate() {
        match byte {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(from + offset + 1);
                }
            }
            _ => {}
        }
    }
    None
}

fn css_rgb(color: DeviceRgba) -> String {
    if color.a == 255 {
        format!("rgb({}, {}, {})", color.r, color.g, color.b)
    } else {
        format!(
            "rgba({}, {}, {}, {})",
            color.r,
            color.g,
            color.b,
            format_number(color.a as f32 / 255.0)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::{NodeRole, StyleNode, Stylesheet};
    use stage_design_model::palette;

    fn oklch_red() -> ColorValue {
        ColorValue::parse("oklch(0.628 0.2577 29.23)")
    }

    #[test]
    fn test_perceptual_color_resolves_to_device() {
        let resolved = StyleNormalizer::resolve_color(&oklch_red());
        match resolved {
            ColorValue::Device(rgba) => {
                assert!(rgba.r >= 250, "expected red, got {rgba:?}");
                assert!(rgba.g <= 5 && rgba.b <= 5, "expected red, got {rgba:?}");
            }
            other => panic!("expected device color, got {other:?}"),
        }
    }

    #[test]
    fn test_device_and_unparsed_pass_through() {
        let white = ColorValue::parse("#ffffff");
        assert_eq!(StyleNormalizer::resolve_color(&white), white);
        let bogus = ColorValue::Unparsed("var(--brand)".to_string());
        assert_eq!(StyleNormalizer::resolve_color(&bogus), bogus);
    }

    #[test]
    fn test_css_text_scan_replaces_each_call() {
        let text = "linear-gradient(90deg, oklch(1 0 0) 0%, oklab(0 0 0 / 0.6) 100%)";
        let normalized = StyleNormalizer::normalize_css_text(text);
        assert_eq!(
            normalized,
            "linear-gradient(90deg, rgb(255, 255, 255) 0%, rgba(0, 0, 0, 0.6) 100%)"
        );
    }

    #[test]
    fn test_css_text_scan_respects_word_boundaries() {
        // `lab(` inside `oklab(` must not be matched separately, and
        // unrelated identifiers ending in `lab` are left alone.
        let text = "collab(1) oklab(0.5 0 0)";
        let normalized = StyleNormalizer::normalize_css_text(text);
        assert!(normalized.starts_with("collab(1) rgb("));
    }

    #[test]
    fn test_malformed_expressions_pass_through() {
        let text = "color: oklch(banana); border: 1px solid lch(";
        assert_eq!(StyleNormalizer::normalize_css_text(text), text);
    }

    #[test]
    fn test_normalize_map_touches_only_colors() {
        let map = StyleMap::new()
            .with(StyleProperty::Color, StyleValue::Color(oklch_red()))
            .with(StyleProperty::FontSize, StyleValue::Length(24.0))
            .with(StyleProperty::FontFamily, StyleValue::Keyword("inter".into()));
        let normalized = StyleNormalizer::normalize_map(&map);
        assert!(matches!(
            normalized.get(StyleProperty::Color),
            Some(StyleValue::Color(ColorValue::Device(_)))
        ));
        assert_eq!(normalized.get(StyleProperty::FontSize), map.get(StyleProperty::FontSize));
        assert_eq!(normalized.get(StyleProperty::FontFamily), map.get(StyleProperty::FontFamily));
        // Input untouched.
        assert!(matches!(
            map.get(StyleProperty::Color),
            Some(StyleValue::Color(ColorValue::Perceptual { .. }))
        ));
    }

    #[test]
    fn test_snapshot_suppresses_perceptual_sheets_but_keeps_appearance() {
        let tree = StyleTree {
            sheets: vec![
                Stylesheet::new(
                    "tailwind-theme",
                    StyleMap::new()
                        .with(StyleProperty::Color, StyleValue::Color(oklch_red()))
                        .with(StyleProperty::FontFamily, StyleValue::Keyword("inter".into())),
                ),
                Stylesheet::new(
                    "plain",
                    StyleMap::new().with(StyleProperty::FontWeight, StyleValue::Number(700.0)),
                ),
            ],
            nodes: vec![
                StyleNode::new(NodeRole::Container, StyleMap::new()),
                StyleNode::new(
                    NodeRole::BaseFill,
                    StyleMap::new().with(
                        StyleProperty::BackgroundImage,
                        StyleValue::Gradient(palette::gradient("ocean").unwrap()),
                    ),
                ),
                StyleNode::new(NodeRole::Text { overlay: 0 }, StyleMap::new()),
            ],
        };

        let computed = StyleNormalizer::snapshot(&tree);
        assert!(StyleNormalizer::residual_perceptual(&computed).is_empty());

        let text = computed.node(NodeRole::Text { overlay: 0 }).unwrap();
        match text.style.get(StyleProperty::Color) {
            Some(StyleValue::Color(ColorValue::Device(rgba))) => assert!(rgba.r >= 250),
            other => panic!("expected inherited device color, got {other:?}"),
        }
        assert_eq!(
            text.style.get(StyleProperty::FontFamily),
            Some(&StyleValue::Keyword("inter".into()))
        );
        assert_eq!(text.style.f64_or(StyleProperty::FontWeight, 400.0), 700.0);

        // The caller's tree still has its perceptual sheet enabled.
        assert!(!tree.sheets[0].disabled);
    }

    #[test]
    fn test_residual_detects_unnormalized_values() {
        let tree = StyleTree {
            sheets: vec![],
            nodes: vec![StyleNode::new(
                NodeRole::Container,
                StyleMap::new().with(StyleProperty::BackgroundColor, StyleValue::Color(oklch_red())),
            )],
        };
        let residual = StyleNormalizer::residual_perceptual(&tree.compute());
        assert_eq!(residual, vec![(0, StyleProperty::BackgroundColor)]);
    }
}
