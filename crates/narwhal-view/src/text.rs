//! Label text: the font style read from a cell style, the [`TextMeasurer`] seam the view sizes
//! labels through, and a deterministic measurer that needs no font backend.

use crate::constants::{DEFAULT_FONTFAMILY, DEFAULT_FONTSIZE, STYLE_FONTFAMILY, STYLE_FONTSIZE, STYLE_FONTSTYLE};
use crate::style::{StyleMap, style_number, style_str};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use unicode_width::UnicodeWidthStr;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextStyle {
    pub font_family: Option<String>,
    pub font_size: f64,
    pub font_style: u32,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_family: Some(DEFAULT_FONTFAMILY.to_string()),
            font_size: DEFAULT_FONTSIZE,
            font_style: 0,
        }
    }
}

impl TextStyle {
    pub fn from_style(style: &StyleMap) -> Self {
        Self {
            font_family: Some(
                style_str(style, STYLE_FONTFAMILY)
                    .unwrap_or(DEFAULT_FONTFAMILY)
                    .to_string(),
            ),
            font_size: style_number(style, STYLE_FONTSIZE, DEFAULT_FONTSIZE),
            font_style: style_number(style, STYLE_FONTSTYLE, 0.0).max(0.0) as u32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextMetrics {
    pub width: f64,
    pub height: f64,
    pub line_count: usize,
}

/// Measures label text. Injected into the view so layout never depends on a font backend.
pub trait TextMeasurer {
    fn measure(&self, text: &str, style: &TextStyle) -> TextMetrics;
}

/// Width from display columns, height from line count. Stable across platforms.
#[derive(Debug, Clone)]
pub struct DeterministicTextMeasurer {
    /// Advance of one display column, in font sizes.
    pub char_width_factor: f64,
    pub line_height_factor: f64,
}

impl Default for DeterministicTextMeasurer {
    fn default() -> Self {
        Self {
            char_width_factor: 0.6,
            line_height_factor: 1.2,
        }
    }
}

const LINE_BREAKS: [&str; 4] = ["\n", "<br>", "<br/>", "<br />"];

/// Splits a label at newlines and HTML line breaks. Always yields at least one line.
fn split_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut rest = text;
    loop {
        let next = LINE_BREAKS
            .iter()
            .filter_map(|br| rest.find(br).map(|at| (at, br.len())))
            .min_by_key(|&(at, _)| at);
        match next {
            Some((at, len)) => {
                lines.push(&rest[..at]);
                rest = &rest[at + len..];
            }
            None => {
                lines.push(rest);
                return lines;
            }
        }
    }
}

impl TextMeasurer for DeterministicTextMeasurer {
    fn measure(&self, text: &str, style: &TextStyle) -> TextMetrics {
        let lines = split_lines(text);
        let columns = lines.iter().map(|line| line.width()).max().unwrap_or(0);
        let size = style.font_size.max(1.0);
        TextMetrics {
            width: columns as f64 * size * self.char_width_factor,
            height: lines.len() as f64 * size * self.line_height_factor,
            line_count: lines.len(),
        }
    }
}

/// Display text of a cell value: strings as is, numbers and booleans formatted, objects through
/// their `label` field. Empty text means no label.
pub fn label_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Object(map) => return map.get("label").and_then(label_text),
        Value::Null | Value::Array(_) => return None,
    };
    (!text.is_empty()).then_some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn measures_columns_and_lines() {
        let m = DeterministicTextMeasurer::default();
        let style = TextStyle {
            font_size: 10.0,
            ..TextStyle::default()
        };
        let metrics = m.measure("abc<br>de", &style);
        assert_eq!(metrics.line_count, 2);
        assert!((metrics.width - 18.0).abs() < 1e-9);
        assert!((metrics.height - 24.0).abs() < 1e-9);

        let wide = m.measure("日本", &style);
        assert!((wide.width - 24.0).abs() < 1e-9);

        assert_eq!(m.measure("", &style).line_count, 1);
    }

    #[test]
    fn splits_at_every_break_form() {
        assert_eq!(split_lines("a<br/>b<br />c\nd"), ["a", "b", "c", "d"]);
        assert_eq!(split_lines("<br>"), ["", ""]);
        assert_eq!(split_lines("<b>x</b>"), ["<b>x</b>"]);
    }

    #[test]
    fn label_text_from_values() {
        assert_eq!(label_text(&json!("A")), Some("A".to_string()));
        assert_eq!(label_text(&json!(3)), Some("3".to_string()));
        assert_eq!(label_text(&json!({"label": "x", "k": 1})), Some("x".to_string()));
        assert_eq!(label_text(&json!("")), None);
        assert_eq!(label_text(&Value::Null), None);
    }
}
