//! [`Graph`]: the model, its view, and the undo history behind one editing API.
//!
//! Every mutating call runs as one batch. When the outermost batch commits, the view processes
//! the committed changes once, validates, and the edit lands in the undo history. Calls nest:
//! an operation issued from inside [`Graph::batch`] joins the surrounding batch.

use crate::config::GraphConfig;
use crate::error::{Error, Result};
use narwhal_model::{
    Cell, CellId, Change, Edit, Geometry, Model, Point, Rect, RectExt, UndoManager, point, rect,
    topology,
};
use narwhal_view::constants::STYLE_FOLDABLE;
use narwhal_view::style::style_bool;
use narwhal_view::{
    CellRenderer, CellState, EdgeStyleRegistry, GraphView, RenderReport, TextMeasurer,
    set_style_key,
};
use rustc_hash::FxBuildHasher;
use serde_json::Value;
use std::sync::Arc;

type HashSet<T> = hashbrown::HashSet<T, FxBuildHasher>;

pub struct Graph {
    model: Model,
    view: GraphView,
    undo: UndoManager,
    config: GraphConfig,
    /// Cells allocated by editing calls of the open batch, freed again if it rolls back.
    created: Vec<CellId>,
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("view", &self.view)
            .field("undo", &self.undo.len())
            .field("config", &self.config)
            .finish()
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    pub fn new() -> Self {
        Self::with_config(GraphConfig::default())
    }

    pub fn with_config(config: GraphConfig) -> Self {
        let model = Model::with_options(config.model_options());
        let view = GraphView::new()
            .with_options(config.view_options())
            .with_stylesheet(config.resolved_stylesheet());
        let undo = UndoManager::new(config.undo_history_size);
        let mut graph = Self {
            model,
            view,
            undo,
            config,
            created: Vec::new(),
        };
        graph.view.validate(&graph.model);
        graph
    }

    pub fn from_json_config(json: &str) -> Result<Self> {
        Ok(Self::with_config(GraphConfig::from_json_str(json)?))
    }

    pub fn with_measurer(mut self, measurer: Arc<dyn TextMeasurer + Send + Sync>) -> Self {
        self.view = std::mem::take(&mut self.view).with_measurer(measurer);
        self.view.revalidate(&self.model);
        self
    }

    /// Replaces the edge routers; the built-in loop router is only present if `edge_styles`
    /// carries it.
    pub fn with_edge_styles(mut self, edge_styles: EdgeStyleRegistry) -> Self {
        self.view = std::mem::take(&mut self.view).with_edge_styles(edge_styles);
        self.view.revalidate(&self.model);
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.config.tolerance = tolerance;
        self.view.options_mut().tolerance = tolerance;
        self
    }

    pub fn with_allow_dangling_edges(mut self, allow: bool) -> Self {
        self.config.allow_dangling_edges = allow;
        self
    }

    pub fn with_extend_parents_on_move(mut self, extend: bool) -> Self {
        self.config.extend_parents_on_move = extend;
        self
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Direct model access. Changes made here inside [`Graph::batch`] are committed with the
    /// batch; changes made outside one reach the view only through [`Graph::refresh`].
    pub fn model_mut(&mut self) -> &mut Model {
        &mut self.model
    }

    pub fn view(&self) -> &GraphView {
        &self.view
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn undo_manager(&self) -> &UndoManager {
        &self.undo
    }

    pub fn default_parent(&self) -> CellId {
        self.model.default_parent()
    }

    pub fn cell_by_id(&self, id: &str) -> Option<CellId> {
        self.model.cell_by_id(id)
    }

    // ---------------------------------------------------------------------------------------
    // Batches.

    /// Runs `f` as one batch. On error every change made by `f` is rolled back, cells it
    /// allocated are freed, and nothing is committed.
    pub fn batch<R>(&mut self, f: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
        let mark = self.created.len();
        self.model.begin_update();
        match f(self) {
            Ok(value) => {
                let edit = self.model.end_update()?;
                if !self.model.is_updating() {
                    self.created.clear();
                }
                if let Some(edit) = edit {
                    self.commit(edit);
                }
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = self.model.abort_update() {
                    tracing::error!(error = %rollback, "rollback failed");
                }
                self.release_created(mark);
                Err(err)
            }
        }
    }

    fn release_created(&mut self, mark: usize) {
        for cell in self.created.split_off(mark).into_iter().rev() {
            if self.model.cell(cell).is_none() {
                continue;
            }
            if let Err(err) = self.model.release(cell) {
                tracing::warn!(?cell, error = %err, "could not release cell of a failed batch");
            }
        }
    }

    /// Allocates `cell` for the open batch.
    fn create(&mut self, cell: Cell) -> CellId {
        let id = self.model.create(cell);
        self.created.push(id);
        id
    }

    fn commit(&mut self, edit: Edit) {
        tracing::debug!(changes = edit.changes().len(), "graph edit committed");
        self.view.model_changed(&self.model, edit.changes());
        self.view.validate(&self.model);
        self.undo.add(edit);
    }

    pub fn execute(&mut self, change: Change) -> Result<()> {
        self.batch(|g| Ok(g.model.execute(change)?))
    }

    /// Drops every cached state and rebuilds the view from the model.
    pub fn refresh(&mut self) {
        self.view.revalidate(&self.model);
    }

    // ---------------------------------------------------------------------------------------
    // Undo history.

    pub fn can_undo(&self) -> bool {
        self.undo.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.undo.can_redo()
    }

    /// Reverts the most recent edit. Returns `false` when there is nothing to undo.
    pub fn undo(&mut self) -> Result<bool> {
        if !self.undo.can_undo() {
            return Ok(false);
        }
        let edits = self.undo.undo(&mut self.model)?;
        for edit in edits.iter().rev() {
            self.view.model_changed(&self.model, edit.changes());
        }
        self.view.validate(&self.model);
        Ok(true)
    }

    pub fn redo(&mut self) -> Result<bool> {
        if !self.undo.can_redo() {
            return Ok(false);
        }
        let edits = self.undo.redo(&mut self.model)?;
        for edit in edits {
            self.view.model_changed(&self.model, edit.changes());
        }
        self.view.validate(&self.model);
        Ok(true)
    }

    // ---------------------------------------------------------------------------------------
    // Inserting.

    pub fn insert_vertex(
        &mut self,
        parent: Option<CellId>,
        id: Option<&str>,
        value: impl Into<Value>,
        bounds: Rect,
        style: Option<&str>,
    ) -> Result<CellId> {
        let geometry = Geometry::new(
            bounds.origin.x,
            bounds.origin.y,
            bounds.size.width,
            bounds.size.height,
        );
        let cell = build_cell(Cell::vertex(geometry), id, value, style);
        self.add_new(cell, parent, None, None)
    }

    pub fn insert_edge(
        &mut self,
        parent: Option<CellId>,
        id: Option<&str>,
        value: impl Into<Value>,
        source: Option<CellId>,
        target: Option<CellId>,
        style: Option<&str>,
    ) -> Result<CellId> {
        let cell = build_cell(Cell::edge(), id, value, style);
        self.add_new(cell, parent, source, target)
    }

    fn add_new(
        &mut self,
        cell: Cell,
        parent: Option<CellId>,
        source: Option<CellId>,
        target: Option<CellId>,
    ) -> Result<CellId> {
        self.batch(|g| {
            let cell = g.create(cell);
            g.add_cells(&[cell], parent, None, source, target)?;
            Ok(cell)
        })
    }

    /// Adds `cells` under `parent` (default: the default layer) starting at `index`. Cells that
    /// already live elsewhere keep their absolute position. With `source` or `target` given,
    /// every added edge is connected to them.
    pub fn add_cells(
        &mut self,
        cells: &[CellId],
        parent: Option<CellId>,
        index: Option<usize>,
        source: Option<CellId>,
        target: Option<CellId>,
    ) -> Result<Vec<CellId>> {
        let parent = parent.unwrap_or_else(|| self.model.default_parent());
        self.batch(|g| {
            let parent_origin = g.model.origin(parent);
            for (i, &cell) in cells.iter().enumerate() {
                let previous = g.model.parent(cell).filter(|&p| p != parent && cell != parent);
                if let Some(previous) = previous {
                    let o = g.model.origin(previous);
                    if let Some(mut geo) = g.model.geometry(cell).cloned() {
                        geo.translate(o.x - parent_origin.x, o.y - parent_origin.y);
                        g.model.set_geometry(cell, Some(geo))?;
                    }
                }
                g.model.add(parent, cell, index.map(|start| start + i))?;
                if g.config.extend_parents_on_add && g.is_extend_parent(cell) {
                    g.extend_parent(cell)?;
                }
                if g.model.is_edge(cell) {
                    if source.is_some() {
                        g.cell_connected(cell, source, true)?;
                    }
                    if target.is_some() {
                        g.cell_connected(cell, target, false)?;
                    }
                    g.check_dangling(cell)?;
                }
            }
            Ok(cells.to_vec())
        })
    }

    // ---------------------------------------------------------------------------------------
    // Removing.

    /// Removes `cells` with their subtrees. With `include_edges`, edges connected to any removed
    /// cell go too; otherwise such edges stay and their loose end is frozen at the point where it
    /// is currently drawn. Returns the removed topmost cells.
    pub fn remove_cells(&mut self, cells: &[CellId], include_edges: bool) -> Result<Vec<CellId>> {
        let mut cells = if include_edges {
            self.with_all_edges(cells)
        } else {
            cells.to_vec()
        };
        let root = self.model.root();
        cells.retain(|&c| c != root && self.model.contains(c));
        let cells = topology::topmost_cells(&self.model, &cells);
        self.batch(move |g| {
            let removed: HashSet<CellId> = topology::descendants_of(&g.model, &cells)
                .into_iter()
                .collect();
            for &cell in &cells {
                for edge in g.all_edges(&[cell]) {
                    if removed.contains(&edge) {
                        continue;
                    }
                    for is_source in [true, false] {
                        let detached = g
                            .model
                            .terminal(edge, is_source)
                            .is_some_and(|t| removed.contains(&t));
                        if detached {
                            g.disconnect_terminal(edge, is_source)?;
                        }
                    }
                }
                g.model.remove(cell)?;
            }
            tracing::debug!(cells = cells.len(), "cells removed");
            Ok(cells)
        })
    }

    // ---------------------------------------------------------------------------------------
    // Moving and resizing.

    /// Moves `cells` by `(dx, dy)`. With `clone` the moved cells are clones of `cells` and the
    /// originals stay. With `target` the moved cells are also reparented; clones without a
    /// target join the parent of their original. Returns the moved cells.
    pub fn move_cells(
        &mut self,
        cells: &[CellId],
        dx: f64,
        dy: f64,
        clone: bool,
        target: Option<CellId>,
    ) -> Result<Vec<CellId>> {
        if cells.is_empty() || (dx == 0.0 && dy == 0.0 && !clone && target.is_none()) {
            return Ok(cells.to_vec());
        }
        let cells = topology::topmost_cells(&self.model, cells);
        self.batch(move |g| {
            let mut moved: Vec<(CellId, Option<CellId>)> = if clone {
                let allow_invalid = g.config.clone_invalid_edges;
                g.clone_pairs(&cells, allow_invalid, true)?
                    .into_iter()
                    .map(|(original, copy)| (copy, target.or_else(|| g.model.parent(original))))
                    .collect()
            } else {
                cells.iter().map(|&c| (c, target)).collect()
            };
            // Terminals go in before the edges connecting them.
            moved.sort_by_key(|&(cell, _)| g.model.is_edge(cell));

            let list: Vec<CellId> = moved.iter().map(|&(cell, _)| cell).collect();
            let extend = g.config.extend_parents_on_move && target.is_none() && !clone;
            g.cells_moved(&list, dx, dy, extend)?;
            for (cell, parent) in moved {
                if clone || parent.is_some() {
                    g.add_cells(&[cell], parent, None, None, None)?;
                }
            }
            Ok(list)
        })
    }

    fn cells_moved(&mut self, cells: &[CellId], dx: f64, dy: f64, extend: bool) -> Result<()> {
        if dx == 0.0 && dy == 0.0 {
            return Ok(());
        }
        for &cell in cells {
            if let Some(mut geo) = self.model.geometry(cell).cloned() {
                geo.translate(dx, dy);
                if self.config.reset_edges_on_move && self.model.is_edge(cell) {
                    geo.points.clear();
                }
                self.model.set_geometry(cell, Some(geo))?;
            }
        }
        if self.config.reset_edges_on_move {
            self.reset_edges(cells)?;
        }
        if extend {
            for &cell in cells {
                if self.is_extend_parent(cell) {
                    self.extend_parent(cell)?;
                }
            }
        }
        Ok(())
    }

    /// Clears the waypoints of edges with exactly one end inside the moved subtrees.
    fn reset_edges(&mut self, cells: &[CellId]) -> Result<()> {
        let inside: HashSet<CellId> = topology::descendants_of(&self.model, cells)
            .into_iter()
            .collect();
        for edge in self.all_edges(cells) {
            let source_in = self
                .model
                .terminal(edge, true)
                .is_some_and(|t| inside.contains(&t));
            let target_in = self
                .model
                .terminal(edge, false)
                .is_some_and(|t| inside.contains(&t));
            if source_in && target_in {
                continue;
            }
            if let Some(mut geo) = self.model.geometry(edge).cloned() {
                if !geo.points.is_empty() {
                    geo.points.clear();
                    self.model.set_geometry(edge, Some(geo))?;
                }
            }
        }
        Ok(())
    }

    /// Sets new bounds for each cell, pairing `cells` with `bounds` by position.
    pub fn resize_cells(&mut self, cells: &[CellId], bounds: &[Rect]) -> Result<()> {
        self.batch(|g| {
            for (&cell, &b) in cells.iter().zip(bounds) {
                g.cell_resized(cell, b)?;
            }
            Ok(())
        })
    }

    fn cell_resized(&mut self, cell: CellId, bounds: Rect) -> Result<()> {
        let Some(mut geo) = self.model.geometry(cell).cloned() else {
            return Ok(());
        };
        if geo.relative {
            let offset = geo.offset.get_or_insert(point(0.0, 0.0));
            offset.x += bounds.origin.x - geo.bounds.origin.x;
            offset.y += bounds.origin.y - geo.bounds.origin.y;
            geo.bounds.size = bounds.size;
        } else {
            geo.bounds = bounds;
        }
        self.model.set_geometry(cell, Some(geo))?;
        if self.is_extend_parent(cell) {
            self.extend_parent(cell)?;
        }
        Ok(())
    }

    fn is_extend_parent(&self, cell: CellId) -> bool {
        self.config.extend_parents && !self.model.is_edge(cell)
    }

    /// Grows the parent of `cell` so the cell fits inside it. Collapsed parents and relative
    /// geometries are left alone. Returns whether the parent changed.
    pub fn extend_parent(&mut self, cell: CellId) -> Result<bool> {
        let Some(parent) = self.model.parent(cell) else {
            return Ok(false);
        };
        if self.model.is_collapsed(parent) {
            return Ok(false);
        }
        let (Some(p), Some(geo)) = (self.model.geometry(parent), self.model.geometry(cell)) else {
            return Ok(false);
        };
        let right = geo.x() + geo.width();
        let bottom = geo.y() + geo.height();
        if geo.relative || (p.width() >= right && p.height() >= bottom) {
            return Ok(false);
        }
        let mut bounds = p.bounds;
        bounds.size.width = bounds.size.width.max(right);
        bounds.size.height = bounds.size.height.max(bottom);
        self.batch(|g| g.cell_resized(parent, bounds))?;
        Ok(true)
    }

    /// Fits each group around its children, keeping `border` around them. The children are
    /// shifted so the tightest box starts at `border`; with `move_group` the group moves by the
    /// same amount in the opposite direction so the children keep their absolute position.
    /// Cells are processed last to first, so children listed after their group fit first.
    pub fn update_group_bounds(
        &mut self,
        cells: &[CellId],
        border: f64,
        move_group: bool,
    ) -> Result<()> {
        self.batch(|g| {
            for &cell in cells.iter().rev() {
                let Some(mut geo) = g.model.geometry(cell).cloned() else {
                    continue;
                };
                let children: Vec<CellId> = g
                    .model
                    .children(cell)
                    .iter()
                    .copied()
                    .filter(|&c| g.model.is_vertex(c) || g.model.is_edge(c))
                    .collect();
                let Some(bounds) = g.bounds_from_geometry(&children) else {
                    continue;
                };
                if bounds.size.width <= 0.0 || bounds.size.height <= 0.0 {
                    continue;
                }
                if move_group {
                    geo.bounds.origin.x = (geo.x() + bounds.min_x() - border).round();
                    geo.bounds.origin.y = (geo.y() + bounds.min_y() - border).round();
                }
                geo.bounds.size.width = (bounds.size.width + 2.0 * border).round();
                geo.bounds.size.height = (bounds.size.height + 2.0 * border).round();
                g.model.set_geometry(cell, Some(geo))?;
                g.move_cells(
                    &children,
                    border - bounds.min_x(),
                    border - bounds.min_y(),
                    false,
                    None,
                )?;
            }
            Ok(())
        })
    }

    /// Union of the model geometries of `cells`: vertex bounds plus edge waypoints and terminal
    /// points. Relative geometries are skipped.
    fn bounds_from_geometry(&self, cells: &[CellId]) -> Option<Rect> {
        let mut out: Option<Rect> = None;
        for &cell in cells {
            let Some(geo) = self.model.geometry(cell) else {
                continue;
            };
            let b = if self.model.is_edge(cell) {
                let points = geo
                    .points
                    .iter()
                    .copied()
                    .chain(geo.source_point)
                    .chain(geo.target_point);
                Rect::enclosing(points)
            } else if geo.relative {
                None
            } else {
                Some(geo.bounds)
            };
            if let Some(b) = b {
                out = Some(match out {
                    Some(acc) => acc.union_with(&b),
                    None => b,
                });
            }
        }
        out
    }

    // ---------------------------------------------------------------------------------------
    // Connecting.

    /// Connects one end of `edge` to `terminal`, or disconnects it with `None`. A disconnected
    /// end stays where it is drawn.
    pub fn connect_cell(
        &mut self,
        edge: CellId,
        terminal: Option<CellId>,
        is_source: bool,
    ) -> Result<()> {
        if !self.model.contains(edge) {
            return Err(narwhal_model::Error::NotInModel(edge).into());
        }
        if !self.model.is_edge(edge) {
            return Err(narwhal_model::Error::NotAnEdge(edge).into());
        }
        self.batch(|g| {
            match terminal {
                Some(_) => g.cell_connected(edge, terminal, is_source)?,
                None => g.disconnect_terminal(edge, is_source)?,
            }
            g.check_dangling(edge)
        })
    }

    fn cell_connected(
        &mut self,
        edge: CellId,
        terminal: Option<CellId>,
        is_source: bool,
    ) -> Result<()> {
        if let Some(t) = terminal {
            if !self.model.is_connectable(t) {
                return Err(Error::NotConnectable(t));
            }
        }
        self.model.set_terminal(edge, terminal, is_source)?;
        Ok(())
    }

    fn disconnect_terminal(&mut self, edge: CellId, is_source: bool) -> Result<()> {
        if let Some(p) = self.frozen_terminal_point(edge, is_source) {
            let mut geo = self
                .model
                .geometry(edge)
                .cloned()
                .unwrap_or_else(Geometry::edge);
            geo.set_terminal_point(Some(p), is_source);
            self.model.set_geometry(edge, Some(geo))?;
        }
        self.model.set_terminal(edge, None, is_source)?;
        Ok(())
    }

    /// Where an end of `edge` is drawn right now, in the coordinates of the edge's parent. Falls
    /// back to the center of the terminal when the edge has no state.
    fn frozen_terminal_point(&self, edge: CellId, is_source: bool) -> Option<Point> {
        let s = self.view.scale();
        let tr = self.view.translate();
        if let Some(state) = self.view.state(edge) {
            let p = if is_source {
                state.first_point()
            } else {
                state.last_point()
            }?;
            return Some(point(
                p.x / s - tr.x - state.origin.x,
                p.y / s - tr.y - state.origin.y,
            ));
        }
        let terminal = self.model.terminal(edge, is_source)?;
        let c = self.view.state(terminal)?.center();
        let o = self
            .model
            .parent(edge)
            .map_or(point(0.0, 0.0), |p| self.model.origin(p));
        Some(point(c.x / s - tr.x - o.x, c.y / s - tr.y - o.y))
    }

    fn check_dangling(&self, edge: CellId) -> Result<()> {
        if self.config.allow_dangling_edges || !self.model.is_edge(edge) {
            return Ok(());
        }
        if self.model.terminal(edge, true).is_none() || self.model.terminal(edge, false).is_none() {
            return Err(Error::DanglingEdge(edge));
        }
        Ok(())
    }

    // ---------------------------------------------------------------------------------------
    // Cloning.

    /// Detached clones of `cells` with their subtrees, positioned in absolute coordinates so
    /// they can be added anywhere. An edge end whose terminal was not cloned is left loose at the
    /// point where the original end is drawn. Unless `allow_invalid_edges`, cloned edges that
    /// end up dangling while dangling edges are disallowed are dropped.
    pub fn clone_cells(
        &mut self,
        cells: &[CellId],
        allow_invalid_edges: bool,
    ) -> Result<Vec<CellId>> {
        self.batch(|g| {
            Ok(g.clone_pairs(cells, allow_invalid_edges, false)?
                .into_iter()
                .map(|(_, copy)| copy)
                .collect())
        })
    }

    /// Clones `cells` and moves the clones by `(dx, dy)` into `target`, in one batch.
    pub fn import_cells(
        &mut self,
        cells: &[CellId],
        dx: f64,
        dy: f64,
        target: Option<CellId>,
    ) -> Result<Vec<CellId>> {
        self.move_cells(cells, dx, dy, true, target)
    }

    fn clone_pairs(
        &mut self,
        cells: &[CellId],
        allow_invalid_edges: bool,
        keep_position: bool,
    ) -> Result<Vec<(CellId, CellId)>> {
        let cells = topology::topmost_cells(&self.model, cells);
        let result = topology::clone_cells(&mut self.model, &cells, true)?;
        self.created.extend(result.clones.iter().copied());
        let s = self.view.scale();
        let tr = self.view.translate();
        let mut out = Vec::with_capacity(cells.len());
        for (&cell, &copy) in cells.iter().zip(&result.clones) {
            let origin = match self.model.parent(cell) {
                Some(p) if !keep_position => self.model.origin(p),
                _ => point(0.0, 0.0),
            };
            let is_edge = self.model.is_edge(copy);
            let geo = match self.model.geometry(copy).cloned() {
                Some(geo) => Some(geo),
                None if is_edge => Some(Geometry::edge()),
                None => None,
            };
            let Some(mut geo) = geo else {
                out.push((cell, copy));
                continue;
            };
            if is_edge {
                let state = self.view.state(cell);
                for is_source in [true, false] {
                    let Some(t) = self.model.terminal(cell, is_source) else {
                        continue;
                    };
                    if result.mapping.contains_key(&t) {
                        continue;
                    }
                    self.model.set_detached_terminal(copy, None, is_source)?;
                    let drawn = state.and_then(|st| {
                        let p = if is_source {
                            st.first_point()
                        } else {
                            st.last_point()
                        }?;
                        let base = if keep_position {
                            st.origin
                        } else {
                            point(0.0, 0.0)
                        };
                        Some(point(p.x / s - tr.x - base.x, p.y / s - tr.y - base.y))
                    });
                    if drawn.is_some() {
                        geo.set_terminal_point(drawn, is_source);
                    }
                }
                for p in &mut geo.points {
                    p.x += origin.x;
                    p.y += origin.y;
                }
            } else {
                geo.translate(origin.x, origin.y);
            }
            let dangling = is_edge
                && (self.model.terminal(copy, true).is_none()
                    || self.model.terminal(copy, false).is_none());
            if dangling && !allow_invalid_edges && !self.config.allow_dangling_edges {
                tracing::debug!(?cell, "dropping invalid edge clone");
                self.model.release(copy)?;
                continue;
            }
            self.model.set_detached_geometry(copy, Some(geo))?;
            out.push((cell, copy));
        }
        Ok(out)
    }

    // ---------------------------------------------------------------------------------------
    // Styles, values, folding, visibility.

    pub fn set_cell_style(&mut self, cells: &[CellId], style: Option<&str>) -> Result<()> {
        self.batch(|g| {
            for &cell in cells {
                g.model.set_style(cell, style.map(str::to_string))?;
            }
            Ok(())
        })
    }

    /// Sets (or with `None` removes) one `key=value` entry in the style string of each cell.
    pub fn set_cell_style_key(
        &mut self,
        cells: &[CellId],
        key: &str,
        value: Option<&str>,
    ) -> Result<()> {
        self.batch(|g| {
            for &cell in cells {
                let style = set_style_key(g.model.style(cell), key, value);
                let style = (!style.is_empty()).then_some(style);
                g.model.set_style(cell, style)?;
            }
            Ok(())
        })
    }

    pub fn set_value(&mut self, cell: CellId, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        self.batch(|g| Ok(g.model.set_value(cell, value)?))
    }

    /// Collapses or expands the foldable cells among `cells` (and their descendants with
    /// `recurse`), swapping in their alternate bounds. Returns the cells that changed.
    pub fn fold_cells(
        &mut self,
        cells: &[CellId],
        collapse: bool,
        recurse: bool,
    ) -> Result<Vec<CellId>> {
        let candidates = if recurse {
            topology::descendants_of(&self.model, cells)
        } else {
            cells.to_vec()
        };
        let cells: Vec<CellId> = candidates
            .into_iter()
            .filter(|&c| self.is_foldable(c) && self.model.is_collapsed(c) != collapse)
            .collect();
        self.batch(move |g| {
            for &cell in &cells {
                g.model.set_collapsed(cell, collapse)?;
                g.swap_bounds(cell, collapse)?;
            }
            Ok(cells)
        })
    }

    fn is_foldable(&self, cell: CellId) -> bool {
        if self.model.child_count(cell) == 0 || self.model.is_edge(cell) {
            return false;
        }
        match self.view.state(cell) {
            Some(state) => style_bool(&state.style, STYLE_FOLDABLE, true),
            None => true,
        }
    }

    fn swap_bounds(&mut self, cell: CellId, collapse: bool) -> Result<()> {
        let Some(mut geo) = self.model.geometry(cell).cloned() else {
            return Ok(());
        };
        if geo.alternate_bounds.is_none() {
            let preferred = if collapse && self.config.collapse_to_preferred_size {
                self.view.preferred_size(&self.model, cell)
            } else {
                None
            };
            let size = preferred.unwrap_or(geo.bounds.size);
            geo.alternate_bounds = Some(rect(0.0, 0.0, size.width, size.height));
        }
        let origin = geo.bounds.origin;
        if let Some(alt) = geo.alternate_bounds.as_mut() {
            alt.origin = origin;
        }
        geo.swap();
        self.model.set_geometry(cell, Some(geo))?;
        Ok(())
    }

    /// Shows or hides `cells`, with `include_edges` also the edges connected to their subtrees.
    pub fn toggle_cells(
        &mut self,
        show: bool,
        cells: &[CellId],
        include_edges: bool,
    ) -> Result<Vec<CellId>> {
        let cells = if include_edges {
            self.with_all_edges(cells)
        } else {
            cells.to_vec()
        };
        self.batch(move |g| {
            for &cell in &cells {
                g.model.set_visible(cell, show)?;
            }
            Ok(cells)
        })
    }

    fn all_edges(&self, cells: &[CellId]) -> Vec<CellId> {
        let mut seen: HashSet<CellId> = HashSet::default();
        let mut out = Vec::new();
        for cell in topology::descendants_of(&self.model, cells) {
            let Some(data) = self.model.cell(cell) else {
                continue;
            };
            for &edge in data.edges() {
                if seen.insert(edge) {
                    out.push(edge);
                }
            }
        }
        out
    }

    fn with_all_edges(&self, cells: &[CellId]) -> Vec<CellId> {
        let mut out = cells.to_vec();
        for edge in self.all_edges(cells) {
            if !out.contains(&edge) {
                out.push(edge);
            }
        }
        out
    }

    // ---------------------------------------------------------------------------------------
    // View.

    pub fn scale_and_translate(&mut self, scale: f64, dx: f64, dy: f64) {
        self.view.scale_and_translate(&self.model, scale, dx, dy);
    }

    /// Shows only the subtree of `root`; `None` returns to the whole model.
    pub fn set_current_root(&mut self, root: Option<CellId>) {
        self.view.set_current_root(&self.model, root);
    }

    pub fn state(&self, cell: CellId) -> Option<&CellState> {
        self.view.state(cell)
    }

    pub fn graph_bounds(&self) -> Rect {
        self.view.graph_bounds()
    }

    /// Topmost vertex or edge under the screen point `(x, y)`.
    pub fn cell_at(&self, x: f64, y: f64) -> Option<CellId> {
        self.view.cell_at(&self.model, point(x, y))
    }

    pub fn cells_at(&self, x: f64, y: f64) -> Vec<CellId> {
        self.view.states_at(&self.model, point(x, y))
    }

    pub fn render<C>(&mut self, renderer: &mut CellRenderer<C>, ctx: &mut C) -> RenderReport {
        renderer.render(&mut self.view, ctx)
    }
}

fn build_cell(cell: Cell, id: Option<&str>, value: impl Into<Value>, style: Option<&str>) -> Cell {
    let mut cell = cell.with_value(value);
    if let Some(id) = id {
        cell = cell.with_id(id);
    }
    if let Some(style) = style {
        cell = cell.with_style(style);
    }
    cell
}
