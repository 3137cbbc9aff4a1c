use crate::error::Result;
use narwhal_model::ModelOptions;
use narwhal_view::{Stylesheet, ViewOptions};
use serde::{Deserialize, Serialize};

/// Switches of a [`crate::Graph`].
///
/// Every field has a default, so a JSON document only needs the keys it changes:
///
/// ```
/// let config = narwhal::GraphConfig::from_json_str(r#"{ "extendParentsOnMove": true }"#).unwrap();
/// assert!(config.extend_parents_on_move);
/// assert_eq!(config.undo_history_size, 100);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GraphConfig {
    pub create_ids: bool,
    pub id_prefix: String,
    pub id_postfix: String,
    pub maintain_edge_parent: bool,
    pub ignore_relative_edge_parent: bool,
    /// Grow a parent vertex when a child is resized past its bounds.
    pub extend_parents: bool,
    pub extend_parents_on_add: bool,
    pub extend_parents_on_move: bool,
    /// Drop the waypoints of edges whose terminals move without them.
    pub reset_edges_on_move: bool,
    /// Kept edits; `0` keeps everything.
    pub undo_history_size: usize,
    pub reset_view_on_root_change: bool,
    pub allow_dangling_edges: bool,
    /// Keep cloned edges that would be invalid on their own.
    pub clone_invalid_edges: bool,
    /// Collapsed groups shrink to the size of their label.
    pub collapse_to_preferred_size: bool,
    pub folding_enabled: bool,
    /// Hit tolerance for edges, in screen units.
    pub tolerance: f64,
    /// Merged over the built-in default styles.
    pub stylesheet: Stylesheet,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            create_ids: true,
            id_prefix: String::new(),
            id_postfix: String::new(),
            maintain_edge_parent: true,
            ignore_relative_edge_parent: true,
            extend_parents: true,
            extend_parents_on_add: true,
            extend_parents_on_move: false,
            reset_edges_on_move: false,
            undo_history_size: 100,
            reset_view_on_root_change: true,
            allow_dangling_edges: true,
            clone_invalid_edges: false,
            collapse_to_preferred_size: true,
            folding_enabled: true,
            tolerance: 4.0,
            stylesheet: Stylesheet::empty(),
        }
    }
}

impl GraphConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_value(value: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn model_options(&self) -> ModelOptions {
        ModelOptions {
            create_ids: self.create_ids,
            id_prefix: self.id_prefix.clone(),
            id_postfix: self.id_postfix.clone(),
            maintain_edge_parent: self.maintain_edge_parent,
            ignore_relative_edge_parent: self.ignore_relative_edge_parent,
        }
    }

    pub fn view_options(&self) -> ViewOptions {
        ViewOptions {
            reset_view_on_root_change: self.reset_view_on_root_change,
            folding_enabled: self.folding_enabled,
            tolerance: self.tolerance,
            ..ViewOptions::default()
        }
    }

    /// The built-in stylesheet with the configured overrides merged in.
    pub fn resolved_stylesheet(&self) -> Stylesheet {
        let mut stylesheet = Stylesheet::default();
        stylesheet.merge(&self.stylesheet);
        stylesheet
    }
}
