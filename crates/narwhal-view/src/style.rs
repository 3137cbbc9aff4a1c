//! Style strings and the stylesheet they resolve against.
//!
//! A cell style is a `;`-separated list of tokens. A bare token names a base style from the
//! stylesheet, `key=value` sets one entry and `key=none` removes it. Tokens apply left to right
//! on top of the default style for the cell kind, unless the string starts with `;`, in which
//! case they apply to an empty map.

use crate::constants::*;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Resolved key/value style of one cell, in insertion order.
pub type StyleMap = IndexMap<String, String>;

pub const DEFAULT_VERTEX: &str = "defaultVertex";
pub const DEFAULT_EDGE: &str = "defaultEdge";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Stylesheet {
    styles: IndexMap<String, StyleMap>,
}

impl Default for Stylesheet {
    fn default() -> Self {
        let mut styles = IndexMap::new();
        styles.insert(DEFAULT_VERTEX.to_string(), default_vertex_style());
        styles.insert(DEFAULT_EDGE.to_string(), default_edge_style());
        Self { styles }
    }
}

fn style_map(entries: &[(&str, &str)]) -> StyleMap {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn default_vertex_style() -> StyleMap {
    style_map(&[
        (STYLE_SHAPE, SHAPE_RECTANGLE),
        (STYLE_PERIMETER, PERIMETER_RECTANGLE),
        (STYLE_VERTICAL_ALIGN, ALIGN_MIDDLE),
        (STYLE_ALIGN, ALIGN_CENTER),
        (STYLE_FILLCOLOR, "#C3D9FF"),
        (STYLE_STROKECOLOR, "#6482B9"),
        (STYLE_FONTCOLOR, "#774400"),
    ])
}

fn default_edge_style() -> StyleMap {
    style_map(&[
        (STYLE_SHAPE, SHAPE_CONNECTOR),
        ("endArrow", "classic"),
        (STYLE_VERTICAL_ALIGN, ALIGN_MIDDLE),
        (STYLE_ALIGN, ALIGN_CENTER),
        (STYLE_STROKECOLOR, "#6482B9"),
        (STYLE_FONTCOLOR, "#446299"),
    ])
}

impl Stylesheet {
    /// A stylesheet without any named styles, not even the defaults.
    pub fn empty() -> Self {
        Self {
            styles: IndexMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&StyleMap> {
        self.styles.get(name)
    }

    pub fn put(&mut self, name: impl Into<String>, style: StyleMap) {
        self.styles.insert(name.into(), style);
    }

    /// Merges `other` into this stylesheet key by key; named styles missing here are added.
    pub fn merge(&mut self, other: &Stylesheet) {
        for (name, style) in &other.styles {
            let target = self.styles.entry(name.clone()).or_default();
            for (k, v) in style {
                target.insert(k.clone(), v.clone());
            }
        }
    }

    pub fn default_vertex_style(&self) -> StyleMap {
        self.styles.get(DEFAULT_VERTEX).cloned().unwrap_or_default()
    }

    pub fn default_edge_style(&self) -> StyleMap {
        self.styles.get(DEFAULT_EDGE).cloned().unwrap_or_default()
    }

    /// Resolves a cell's style string on top of the default for its kind.
    pub fn cell_style(&self, style: Option<&str>, is_edge: bool) -> StyleMap {
        let default = if is_edge {
            self.default_edge_style()
        } else {
            self.default_vertex_style()
        };
        self.resolve(style, default)
    }

    pub fn resolve(&self, style: Option<&str>, default: StyleMap) -> StyleMap {
        let Some(style) = style.filter(|s| !s.is_empty()) else {
            return default;
        };
        let mut out = if style.starts_with(';') {
            StyleMap::new()
        } else {
            default
        };
        for token in style.split(';').filter(|t| !t.is_empty()) {
            match token.split_once('=') {
                Some((key, NONE)) => {
                    out.shift_remove(key);
                }
                Some((key, value)) => {
                    out.insert(key.to_string(), value.to_string());
                }
                None => match self.styles.get(token) {
                    Some(base) => {
                        for (k, v) in base {
                            out.insert(k.clone(), v.clone());
                        }
                    }
                    None => tracing::trace!(name = token, "unknown base style"),
                },
            }
        }
        out
    }
}

/// Sets (`Some`) or removes (`None`) one `key=value` token in a style string, keeping every
/// other token in place.
pub fn set_style_key(style: Option<&str>, key: &str, value: Option<&str>) -> String {
    let style = style.unwrap_or("");
    let mut tokens: Vec<String> = Vec::new();
    let mut replaced = false;
    for (i, token) in style.split(';').enumerate() {
        let is_key = token.split_once('=').is_some_and(|(k, _)| k == key);
        if is_key {
            if let Some(v) = value {
                if !replaced {
                    tokens.push(format!("{key}={v}"));
                    replaced = true;
                }
            }
        } else if i == 0 || !token.is_empty() {
            tokens.push(token.to_string());
        }
    }
    if !replaced {
        if let Some(v) = value {
            tokens.push(format!("{key}={v}"));
        }
    }
    if tokens.first().is_some_and(|t| t.is_empty()) && tokens.len() == 1 {
        return String::new();
    }
    let joined = tokens.join(";");
    // `split` yields one empty token for an empty input; do not turn it into a leading `;`.
    if style.is_empty() {
        joined.trim_start_matches(';').to_string()
    } else {
        joined
    }
}

pub fn style_str<'a>(style: &'a StyleMap, key: &str) -> Option<&'a str> {
    style.get(key).map(String::as_str)
}

pub fn style_number(style: &StyleMap, key: &str, default: f64) -> f64 {
    style
        .get(key)
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(default)
}

pub fn style_bool(style: &StyleMap, key: &str, default: bool) -> bool {
    match style.get(key).map(|v| v.trim()) {
        Some("1") | Some("true") => true,
        Some("0") | Some("false") => false,
        _ => default,
    }
}
