//! Atomic, self-inverting model edits.
//!
//! Every variant stores the value to put into the model. Executing it writes that value through
//! the matching model setter and keeps the setter's previous value in its place, so executing the
//! same change again restores the earlier state. After execution a change therefore always holds
//! what undoing it would restore.

use crate::cell::CellId;
use crate::error::Result;
use crate::geometry::Geometry;
use crate::model::Model;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Root {
        root: CellId,
    },
    /// `parent: None` detaches the child from the model (`index` is then ignored).
    Child {
        child: CellId,
        parent: Option<CellId>,
        index: usize,
    },
    Terminal {
        edge: CellId,
        terminal: Option<CellId>,
        is_source: bool,
    },
    Geometry {
        cell: CellId,
        geometry: Option<Geometry>,
    },
    Style {
        cell: CellId,
        style: Option<String>,
    },
    Value {
        cell: CellId,
        value: Value,
    },
    Collapsed {
        cell: CellId,
        collapsed: bool,
    },
    Visible {
        cell: CellId,
        visible: bool,
    },
}

impl Change {
    /// Writes the stored value into the model and keeps the replaced one.
    ///
    /// Setters validate their arguments before touching the model, so on error neither the model
    /// nor the change has been modified.
    pub fn execute(&mut self, model: &mut Model) -> Result<()> {
        match self {
            Change::Root { root } => {
                *root = model.root_changed(*root)?;
            }
            Change::Child {
                child,
                parent,
                index,
            } => {
                let (previous, previous_index) =
                    model.parent_for_cell_changed(*child, *parent, *index)?;
                *parent = previous;
                *index = previous_index;
            }
            Change::Terminal {
                edge,
                terminal,
                is_source,
            } => {
                *terminal = model.terminal_for_cell_changed(*edge, *terminal, *is_source)?;
            }
            Change::Geometry { cell, geometry } => {
                model.ensure_live(*cell)?;
                *geometry = model.geometry_for_cell_changed(*cell, geometry.take())?;
            }
            Change::Style { cell, style } => {
                model.ensure_live(*cell)?;
                *style = model.style_for_cell_changed(*cell, style.take())?;
            }
            Change::Value { cell, value } => {
                model.ensure_live(*cell)?;
                *value = model.value_for_cell_changed(*cell, std::mem::take(value))?;
            }
            Change::Collapsed { cell, collapsed } => {
                *collapsed = model.collapsed_state_for_cell_changed(*cell, *collapsed)?;
            }
            Change::Visible { cell, visible } => {
                *visible = model.visible_state_for_cell_changed(*cell, *visible)?;
            }
        }
        Ok(())
    }

    /// Consuming form of [`Change::execute`]: returns the inverse edit.
    pub fn apply(mut self, model: &mut Model) -> Result<Change> {
        self.execute(model)?;
        Ok(self)
    }

    /// The cell this change is about.
    pub fn cell(&self) -> CellId {
        match *self {
            Change::Root { root } => root,
            Change::Child { child, .. } => child,
            Change::Terminal { edge, .. } => edge,
            Change::Geometry { cell, .. }
            | Change::Style { cell, .. }
            | Change::Value { cell, .. }
            | Change::Collapsed { cell, .. }
            | Change::Visible { cell, .. } => cell,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Change::Root { .. } => "root",
            Change::Child { .. } => "child",
            Change::Terminal { .. } => "terminal",
            Change::Geometry { .. } => "geometry",
            Change::Style { .. } => "style",
            Change::Value { .. } => "value",
            Change::Collapsed { .. } => "collapsed",
            Change::Visible { .. } => "visible",
        }
    }
}
