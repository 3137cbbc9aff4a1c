//! The cell-state cache.
//!
//! States are created lazily by [`GraphView::validate`] for every visible cell under the current
//! root that is not hidden inside a collapsed ancestor. Model changes only mark states invalid;
//! the next validation recomputes them in pre-order so a parent (and an edge's visible terminals)
//! is always up to date before the cells that depend on it.

use crate::constants::*;
use crate::edge_style::{EdgeStyle, EdgeStyleRegistry, Route};
use crate::perimeter::{perimeter_by_name, segment_distance_sq};
use crate::state::CellState;
use crate::style::{StyleMap, Stylesheet, style_bool, style_number, style_str};
use crate::text::{DeterministicTextMeasurer, TextMeasurer, TextStyle, label_text};
use indexmap::IndexSet;
use narwhal_model::{
    CellId, CellKind, Change, Geometry, Model, Point, Rect, RectExt, Size, point, rect,
};
use rustc_hash::FxBuildHasher;
use std::sync::Arc;

type HashMap<K, V> = hashbrown::HashMap<K, V, FxBuildHasher>;
type HashSet<T> = hashbrown::HashSet<T, FxBuildHasher>;

const PLACEHOLDER_KEYS: [&str; 6] = [
    STYLE_FILLCOLOR,
    STYLE_GRADIENTCOLOR,
    STYLE_STROKECOLOR,
    STYLE_FONTCOLOR,
    STYLE_LABEL_BORDERCOLOR,
    STYLE_LABEL_BACKGROUNDCOLOR,
];

#[derive(Debug, Clone)]
pub struct ViewOptions {
    /// Reset scale and translate when the model gets a new root.
    pub reset_view_on_root_change: bool,
    /// Give foldable vertices with children a folding control box.
    pub folding_enabled: bool,
    /// A geometry change of a cell also invalidates its parent vertex.
    pub invalidate_parent_on_resize: bool,
    /// Hit tolerance for edges, in screen units.
    pub tolerance: f64,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            reset_view_on_root_change: true,
            folding_enabled: true,
            invalidate_parent_on_resize: true,
            tolerance: 4.0,
        }
    }
}

/// States recomputed or dropped since the last render.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderQueue {
    pub repaint: Vec<CellId>,
    pub removed: Vec<CellId>,
}

impl RenderQueue {
    pub fn is_empty(&self) -> bool {
        self.repaint.is_empty() && self.removed.is_empty()
    }
}

#[derive(Clone, Copy)]
struct Constraint {
    point: Point,
    perimeter: bool,
    dx: f64,
    dy: f64,
}

pub struct GraphView {
    states: HashMap<CellId, CellState>,
    scale: f64,
    translate: Point,
    current_root: Option<CellId>,
    stylesheet: Stylesheet,
    measurer: Arc<dyn TextMeasurer + Send + Sync>,
    edge_styles: EdgeStyleRegistry,
    options: ViewOptions,
    graph_bounds: Rect,
    repaint: IndexSet<CellId>,
    removed: IndexSet<CellId>,
}

impl std::fmt::Debug for GraphView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphView")
            .field("states", &self.states.len())
            .field("scale", &self.scale)
            .field("translate", &self.translate)
            .field("current_root", &self.current_root)
            .field("options", &self.options)
            .finish()
    }
}

impl Default for GraphView {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphView {
    pub fn new() -> Self {
        Self {
            states: HashMap::default(),
            scale: 1.0,
            translate: point(0.0, 0.0),
            current_root: None,
            stylesheet: Stylesheet::default(),
            measurer: Arc::new(DeterministicTextMeasurer::default()),
            edge_styles: EdgeStyleRegistry::new(),
            options: ViewOptions::default(),
            graph_bounds: rect(0.0, 0.0, 0.0, 0.0),
            repaint: IndexSet::new(),
            removed: IndexSet::new(),
        }
    }

    pub fn with_stylesheet(mut self, stylesheet: Stylesheet) -> Self {
        self.stylesheet = stylesheet;
        self
    }

    pub fn with_measurer(mut self, measurer: Arc<dyn TextMeasurer + Send + Sync>) -> Self {
        self.measurer = measurer;
        self
    }

    pub fn with_edge_styles(mut self, edge_styles: EdgeStyleRegistry) -> Self {
        self.edge_styles = edge_styles;
        self
    }

    pub fn edge_styles(&self) -> &EdgeStyleRegistry {
        &self.edge_styles
    }

    /// Registering a style here does not touch existing states; call
    /// [`GraphView::revalidate`] afterwards.
    pub fn edge_styles_mut(&mut self) -> &mut EdgeStyleRegistry {
        &mut self.edge_styles
    }

    pub fn with_options(mut self, options: ViewOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &ViewOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut ViewOptions {
        &mut self.options
    }

    pub fn stylesheet(&self) -> &Stylesheet {
        &self.stylesheet
    }

    /// Callers that edit the stylesheet must [`GraphView::revalidate`] afterwards.
    pub fn stylesheet_mut(&mut self) -> &mut Stylesheet {
        &mut self.stylesheet
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn translate(&self) -> Point {
        self.translate
    }

    pub fn current_root(&self) -> Option<CellId> {
        self.current_root
    }

    pub fn state(&self, cell: CellId) -> Option<&CellState> {
        self.states.get(&cell)
    }

    pub fn states(&self) -> impl Iterator<Item = &CellState> {
        self.states.values()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Bounds of all vertex and edge states (with their labels) under the current root, as of
    /// the last validation.
    pub fn graph_bounds(&self) -> Rect {
        self.graph_bounds
    }

    fn effective_root(&self, model: &Model) -> CellId {
        self.current_root
            .filter(|&c| model.contains(c))
            .unwrap_or_else(|| model.root())
    }

    // ---------------------------------------------------------------------------------------
    // Global transforms.

    pub fn set_scale(&mut self, model: &Model, scale: f64) {
        self.scale_and_translate(model, scale, self.translate.x, self.translate.y);
    }

    pub fn set_translate(&mut self, model: &Model, dx: f64, dy: f64) {
        self.scale_and_translate(model, self.scale, dx, dy);
    }

    /// Changes scale and translate together. Every cached state depends on both, so the whole
    /// cache is dropped and rebuilt.
    pub fn scale_and_translate(&mut self, model: &Model, scale: f64, dx: f64, dy: f64) {
        if scale == self.scale && dx == self.translate.x && dy == self.translate.y {
            return;
        }
        tracing::debug!(scale, dx, dy, "view transform changed");
        self.scale = scale;
        self.translate = point(dx, dy);
        self.clear_all();
        self.validate(model);
    }

    /// Shows the subtree of `root` only; `None` goes back to the model root.
    pub fn set_current_root(&mut self, model: &Model, root: Option<CellId>) {
        if root == self.current_root {
            return;
        }
        self.current_root = root.filter(|&c| model.contains(c));
        self.clear_all();
        self.validate(model);
    }

    // ---------------------------------------------------------------------------------------
    // Invalidation.

    /// Marks the state of `cell` (default: the root) invalid, optionally with its subtree and
    /// the edges connected to each visited cell. Each cell is visited once per call, which also
    /// breaks cycles through edges ending on their own ancestors.
    pub fn invalidate(
        &mut self,
        model: &Model,
        cell: Option<CellId>,
        recurse: bool,
        include_edges: bool,
    ) {
        let cell = cell.unwrap_or_else(|| self.effective_root(model));
        let mut visited: HashSet<CellId> = HashSet::default();
        self.invalidate_inner(model, cell, recurse, include_edges, &mut visited);
        tracing::trace!(cells = visited.len(), "invalidated");
    }

    fn invalidate_inner(
        &mut self,
        model: &Model,
        cell: CellId,
        recurse: bool,
        include_edges: bool,
        visited: &mut HashSet<CellId>,
    ) {
        if !visited.insert(cell) {
            return;
        }
        if let Some(state) = self.states.get_mut(&cell) {
            state.invalid = true;
        }
        if recurse {
            for child in model.children(cell).to_vec() {
                self.invalidate_inner(model, child, recurse, include_edges, visited);
            }
        }
        if include_edges {
            let edges = model.cell(cell).map(|c| c.edges().to_vec()).unwrap_or_default();
            for edge in edges {
                self.invalidate_inner(model, edge, recurse, include_edges, visited);
            }
        }
    }

    /// Translates committed changes into invalidations. Runs once per notification, against the
    /// model as it is after the whole batch.
    pub fn model_changed(&mut self, model: &Model, changes: &[Change]) {
        for change in changes {
            match change {
                Change::Root { root: previous } => {
                    self.remove_state_for_cell(model, *previous);
                    if self.current_root.is_some_and(|c| !model.contains(c)) {
                        self.current_root = None;
                    }
                    if self.options.reset_view_on_root_change {
                        self.scale = 1.0;
                        self.translate = point(0.0, 0.0);
                    }
                }
                Change::Child {
                    child,
                    parent: previous,
                    ..
                } => {
                    let new_parent = model.parent(*child);
                    self.invalidate(model, Some(*child), true, true);
                    let hidden = match new_parent {
                        Some(p) => !model.contains(p) || model.is_collapsed(p),
                        None => true,
                    };
                    if hidden {
                        self.remove_state_for_cell(model, *child);
                        if self.current_root == Some(*child) {
                            self.current_root = None;
                        }
                    }
                    if new_parent != *previous {
                        if let Some(p) = new_parent {
                            self.invalidate(model, Some(p), false, false);
                        }
                        if let Some(p) = *previous {
                            self.invalidate(model, Some(p), false, false);
                        }
                    }
                }
                Change::Terminal { edge, .. } => {
                    self.invalidate(model, Some(*edge), true, true);
                }
                Change::Geometry { cell, .. } => {
                    self.invalidate(model, Some(*cell), true, true);
                    if self.options.invalidate_parent_on_resize {
                        if let Some(p) = model.parent(*cell).filter(|&p| model.is_vertex(p)) {
                            self.invalidate(model, Some(p), false, false);
                        }
                    }
                }
                Change::Value { cell, .. } => {
                    self.invalidate(model, Some(*cell), false, false);
                }
                Change::Style { cell, .. } => {
                    self.invalidate(model, Some(*cell), true, true);
                }
                Change::Collapsed { cell, .. } | Change::Visible { cell, .. } => {
                    self.remove_state_for_cell(model, *cell);
                }
            }
        }
    }

    /// Drops the states of `cell` and its subtree; connected edges are invalidated.
    pub fn remove_state_for_cell(&mut self, model: &Model, cell: CellId) {
        for child in model.children(cell).to_vec() {
            self.remove_state_for_cell(model, child);
        }
        self.invalidate(model, Some(cell), false, true);
        self.remove_state(cell);
    }

    pub fn remove_state(&mut self, cell: CellId) -> Option<CellState> {
        let state = self.states.remove(&cell)?;
        self.repaint.shift_remove(&cell);
        if state.kind != CellKind::Plain {
            self.removed.insert(cell);
        }
        Some(state)
    }

    /// Drops the state of `cell` (default: the root), and of its subtree with `recurse`.
    pub fn clear(&mut self, model: &Model, cell: Option<CellId>, recurse: bool) {
        let cell = cell.unwrap_or_else(|| self.effective_root(model));
        self.remove_state(cell);
        if recurse {
            for child in model.children(cell).to_vec() {
                self.clear(model, Some(child), recurse);
            }
        }
    }

    fn clear_all(&mut self) {
        let cells: Vec<CellId> = self.states.keys().copied().collect();
        for cell in cells {
            self.remove_state(cell);
        }
    }

    /// Invalidates everything and validates again.
    pub fn revalidate(&mut self, model: &Model) {
        self.invalidate(model, None, true, true);
        self.validate(model);
    }

    // ---------------------------------------------------------------------------------------
    // Validation.

    /// Creates missing states, drops states of hidden cells and recomputes every invalid state
    /// under the current root. Running it twice without a model change is a no-op.
    pub fn validate(&mut self, model: &Model) {
        if self.current_root.is_some_and(|c| !model.contains(c)) {
            self.current_root = None;
        }
        let root = self.effective_root(model);
        self.validate_cell(model, root, true);
        self.validate_cell_state(model, Some(root), true);
        self.graph_bounds = self.bounds_under(model, root);
        tracing::trace!(
            states = self.states.len(),
            repaint = self.repaint.len(),
            "view validated"
        );
    }

    /// First pass: make the set of states match what is visible.
    fn validate_cell(&mut self, model: &Model, cell: CellId, visible: bool) {
        let visible = visible && model.is_visible(cell);
        if visible {
            if !self.states.contains_key(&cell) {
                let kind = model.cell(cell).map(|c| c.kind()).unwrap_or_default();
                self.states.insert(cell, CellState::new(cell, kind));
                if kind != CellKind::Plain {
                    self.repaint.insert(cell);
                }
            }
        } else if self.states.contains_key(&cell) {
            self.clear(model, Some(cell), true);
            return;
        }

        let root = self.effective_root(model);
        let children = model.children(cell).to_vec();
        if model.is_collapsed(cell) && cell != root {
            for child in children {
                if self.states.contains_key(&child) {
                    self.clear(model, Some(child), true);
                }
            }
        } else if visible {
            for child in children {
                self.validate_cell(model, child, visible);
            }
        }
    }

    /// Second pass: recompute invalid states, parents and visible terminals first. Returns the
    /// cell when it has a valid state afterwards.
    fn validate_cell_state(
        &mut self,
        model: &Model,
        cell: Option<CellId>,
        recurse: bool,
    ) -> Option<CellId> {
        let cell = cell?;
        let state = self.states.get_mut(&cell)?;
        if state.invalid {
            state.invalid = false;
            let before = state.clone();
            let root = self.effective_root(model);

            if cell != root {
                let parent = model.parent(cell);
                self.validate_cell_state(model, parent, false);
            }
            let source = self.visible_terminal(model, cell, true);
            let source = self.validate_cell_state(model, source, false);
            let target = self.visible_terminal(model, cell, false);
            let target = self.validate_cell_state(model, target, false);
            if let Some(state) = self.states.get_mut(&cell) {
                state.visible_source = source;
                state.visible_target = target;
            }

            self.update_cell_state(model, cell, root);

            if let Some(state) = self.states.get(&cell) {
                if cell != root && state.kind != CellKind::Plain && !state.same_output(&before) {
                    self.repaint.insert(cell);
                }
            }
        }

        if recurse && self.states.contains_key(&cell) {
            for child in model.children(cell).to_vec() {
                self.validate_cell_state(model, Some(child), true);
            }
        }
        self.states.contains_key(&cell).then_some(cell)
    }

    /// Terminal of `edge` as shown: the topmost collapsed (or hidden) ancestor of the model
    /// terminal below the current root. Layers, the current root and cells outside the model
    /// are never visible terminals.
    pub fn visible_terminal(&self, model: &Model, edge: CellId, is_source: bool) -> Option<CellId> {
        let terminal = model.terminal(edge, is_source)?;
        let root = self.effective_root(model);
        let mut best = terminal;
        let mut cur = Some(terminal);
        while let Some(c) = cur {
            if c == root {
                break;
            }
            if !model.is_visible(best) || model.is_collapsed(c) {
                best = c;
            }
            cur = model.parent(c);
        }
        if !model.contains(best) || model.is_layer(best) || best == root {
            return None;
        }
        Some(best)
    }

    fn update_cell_state(&mut self, model: &Model, cell: CellId, root: CellId) {
        let Some(data) = model.cell(cell) else {
            self.remove_state(cell);
            return;
        };
        let kind = data.kind();
        let is_edge = kind == CellKind::Edge;
        let mut style = self.stylesheet.cell_style(data.style(), is_edge);
        self.resolve_placeholder_colors(model, cell, is_edge, &mut style);

        let scale = self.scale;
        let tr = self.translate;
        let parent_state = if cell == root {
            None
        } else {
            model.parent(cell).and_then(|p| self.states.get(&p))
        };
        let mut origin = parent_state.map(|p| p.origin).unwrap_or(point(0.0, 0.0));
        let mut absolute_offset = point(0.0, 0.0);
        let geo = data.geometry();

        if let Some(geo) = geo.filter(|_| !is_edge) {
            let offset = geo.offset.unwrap_or(point(0.0, 0.0));
            match parent_state {
                Some(ps) if geo.relative && ps.is_edge() => {
                    let p = self.point_on_edge(ps, Some(geo));
                    origin.x += p.x / scale - ps.origin.x - tr.x;
                    origin.y += p.y / scale - ps.origin.y - tr.y;
                }
                Some(ps) if geo.relative => {
                    origin.x += geo.x() * ps.unscaled_width + offset.x;
                    origin.y += geo.y() * ps.unscaled_height + offset.y;
                }
                _ => {
                    absolute_offset = point(scale * offset.x, scale * offset.y);
                    origin.x += geo.x();
                    origin.y += geo.y();
                }
            }
        }

        let label = if style_bool(&style, STYLE_NOLABEL, false) {
            None
        } else {
            label_text(data.value())
        };

        let Some(state) = self.states.get_mut(&cell) else {
            return;
        };
        state.reset_geometry(origin);
        state.style = style;
        state.label = label;
        state.bounds = rect(scale * (tr.x + origin.x), scale * (tr.y + origin.y), 0.0, 0.0);
        if let Some(geo) = geo.filter(|_| !is_edge) {
            state.bounds.size.width = scale * geo.width();
            state.bounds.size.height = scale * geo.height();
            state.unscaled_width = geo.width();
            state.unscaled_height = geo.height();
            state.absolute_offset = absolute_offset;
        }

        match kind {
            CellKind::Vertex => update_vertex_label_offset(state, scale),
            CellKind::Edge => {
                let geo = geo.cloned().unwrap_or_else(Geometry::edge);
                if !self.update_edge_state(model, cell, &geo) {
                    return;
                }
            }
            CellKind::Plain => {}
        }

        self.update_label_bounds(cell);
        self.update_control_bounds(model, cell);
    }

    // ---------------------------------------------------------------------------------------
    // Styles.

    fn resolve_placeholder_colors(
        &self,
        model: &Model,
        cell: CellId,
        is_edge: bool,
        style: &mut StyleMap,
    ) {
        for key in PLACEHOLDER_KEYS {
            let Some(value) = style.get(key).cloned() else {
                continue;
            };
            let resolved = match value.as_str() {
                COLOR_INHERIT => model
                    .parent(cell)
                    .and_then(|p| self.states.get(&p))
                    .and_then(|s| s.style.get(key).cloned()),
                COLOR_SWIMLANE => {
                    let start = if is_edge {
                        model.terminal(cell, false).or(Some(cell))
                    } else {
                        Some(cell)
                    };
                    let lane = start.and_then(|s| self.swimlane(model, s));
                    let fallback = if key == STYLE_STROKECOLOR || key == STYLE_FONTCOLOR {
                        "#000000"
                    } else {
                        "#ffffff"
                    };
                    Some(
                        lane.and_then(|l| self.states.get(&l))
                            .and_then(|s| {
                                s.style
                                    .get(key)
                                    .or_else(|| s.style.get(STYLE_STROKECOLOR))
                                    .cloned()
                            })
                            .unwrap_or_else(|| fallback.to_string()),
                    )
                }
                COLOR_INDICATED => style.get(STYLE_INDICATOR_COLOR).cloned(),
                STYLE_FILLCOLOR | STYLE_STROKECOLOR if value != key => style.get(&value).cloned(),
                _ => continue,
            };
            match resolved {
                Some(v) => {
                    style.insert(key.to_string(), v);
                }
                None => {
                    style.shift_remove(key);
                }
            }
        }
    }

    /// Nearest cell at or above `cell` whose state uses the swimlane shape.
    fn swimlane(&self, model: &Model, cell: CellId) -> Option<CellId> {
        let mut cur = Some(cell);
        while let Some(c) = cur {
            let is_lane = self
                .states
                .get(&c)
                .and_then(|s| style_str(&s.style, STYLE_SHAPE))
                == Some(SHAPE_SWIMLANE);
            if is_lane {
                return Some(c);
            }
            cur = model.parent(c);
        }
        None
    }

    // ---------------------------------------------------------------------------------------
    // Edges.

    /// Computes the polyline of an edge. Drops the state and returns `false` when an end cannot
    /// be placed: a connected terminal without a visible state, or a dangling end without a
    /// terminal point.
    fn update_edge_state(&mut self, model: &Model, edge: CellId, geo: &Geometry) -> bool {
        let Some(state) = self.states.get(&edge) else {
            return false;
        };
        let source = state.visible_source;
        let target = state.visible_target;
        let unplaceable = |is_source: bool, visible: Option<CellId>| {
            (model.terminal(edge, is_source).is_some() && visible.is_none())
                || (visible.is_none() && geo.terminal_point(is_source).is_none())
        };
        if unplaceable(true, source) || unplaceable(false, target) {
            self.clear(model, Some(edge), true);
            return false;
        }

        let style = &state.style;
        let origin = state.origin;
        let source = self.terminal_port(model, style, source, true);
        let target = self.terminal_port(model, style, target, false);
        let spacing = style_number(style, STYLE_PERIMETER_SPACING, 0.0);
        let source_border = spacing + style_number(style, STYLE_SOURCE_PERIMETER_SPACING, 0.0);
        let target_border = spacing + style_number(style, STYLE_TARGET_PERIMETER_SPACING, 0.0);

        let source_constraint = connection_constraint(style, true);
        let target_constraint = connection_constraint(style, false);
        let source_point =
            self.fixed_terminal_point(source, source_constraint, origin, geo, true);
        let target_point =
            self.fixed_terminal_point(target, target_constraint, origin, geo, false);
        let controls: Vec<Point> = geo
            .points
            .iter()
            .map(|&p| self.transform_point(origin, p))
            .collect();
        let is_loop =
            state.visible_source.is_some() && state.visible_source == state.visible_target;
        let constrained = source_constraint.is_some() || target_constraint.is_some();
        let inner = match self.edge_style(style, geo, is_loop, constrained) {
            Some(edge_style) => edge_style.route(&Route {
                edge: state,
                source: source.and_then(|s| self.states.get(&s)),
                target: target.and_then(|t| self.states.get(&t)),
                points: &controls,
                source_point,
                target_point,
                scale: self.scale,
            }),
            None => controls,
        };

        let mut pts: Vec<Option<Point>> = Vec::with_capacity(inner.len() + 2);
        pts.push(source_point);
        pts.extend(inner.into_iter().map(Some));
        pts.push(target_point);

        let last = pts.len() - 1;
        if pts[last].is_none() {
            if let Some(t) = target.and_then(|t| self.states.get(&t)) {
                let opposite = source.and_then(|s| self.states.get(&s));
                let next = next_point(&pts, opposite, false);
                pts[last] = Some(self.perimeter_point(t, next, false, target_border));
            }
        }
        if pts[0].is_none() {
            if let Some(s) = source.and_then(|s| self.states.get(&s)) {
                let opposite = target.and_then(|t| self.states.get(&t));
                let next = next_point(&pts, opposite, true);
                pts[0] = Some(self.perimeter_point(s, next, false, source_border));
            }
        }

        let points: Option<Vec<Point>> = pts.into_iter().collect();
        let Some(points) = points else {
            self.clear(model, Some(edge), true);
            return false;
        };
        if let Some(state) = self.states.get_mut(&edge) {
            state.absolute_points = points;
            update_edge_bounds(state);
        }

        let Some(state) = self.states.get(&edge) else {
            return false;
        };
        let label_anchor = if geo.relative {
            self.point_on_edge(state, Some(geo))
        } else {
            let p0 = state.absolute_points[0];
            let pe = state.absolute_points[state.absolute_points.len() - 1];
            let offset = geo.offset.unwrap_or(point(0.0, 0.0));
            point(
                p0.x + (pe.x - p0.x) / 2.0 + offset.x * self.scale,
                p0.y + (pe.y - p0.y) / 2.0 + offset.y * self.scale,
            )
        };
        if let Some(state) = self.states.get_mut(&edge) {
            state.absolute_offset = label_anchor;
        }
        true
    }

    /// The router for an edge: `loop` for a self-loop with fewer than two control points (unless
    /// `orthogonalLoop` is set and an end is constrained), otherwise `edgeStyle` unless
    /// `noEdgeStyle`. `None` keeps the control points as they are.
    fn edge_style(
        &self,
        style: &StyleMap,
        geo: &Geometry,
        is_loop: bool,
        constrained: bool,
    ) -> Option<&(dyn EdgeStyle + Send + Sync)> {
        let loop_enabled = is_loop
            && geo.points.len() < 2
            && !(style_bool(style, STYLE_ORTHOGONAL_LOOP, false) && constrained);
        let name = if loop_enabled {
            Some(style_str(style, STYLE_LOOP).unwrap_or(EDGESTYLE_LOOP))
        } else if style_bool(style, STYLE_NOEDGESTYLE, false) {
            None
        } else {
            style_str(style, STYLE_EDGE)
        }?;
        let found = self.edge_styles.get(name);
        if found.is_none() {
            tracing::trace!(name, "edge style not registered; using control points");
        }
        found
    }

    /// A `sourcePort`/`targetPort` style names a cell by id whose state replaces the terminal.
    fn terminal_port(
        &self,
        model: &Model,
        style: &StyleMap,
        terminal: Option<CellId>,
        is_source: bool,
    ) -> Option<CellId> {
        let key = if is_source {
            STYLE_SOURCE_PORT
        } else {
            STYLE_TARGET_PORT
        };
        style_str(style, key)
            .and_then(|id| model.cell_by_id(id))
            .filter(|port| self.states.contains_key(port))
            .or(terminal)
    }

    fn fixed_terminal_point(
        &self,
        terminal: Option<CellId>,
        constraint: Option<Constraint>,
        origin: Point,
        geo: &Geometry,
        is_source: bool,
    ) -> Option<Point> {
        match terminal {
            Some(t) => {
                let state = self.states.get(&t)?;
                constraint.map(|c| self.connection_point(state, c))
            }
            None => geo
                .terminal_point(is_source)
                .map(|p| self.transform_point(origin, p)),
        }
    }

    fn connection_point(&self, terminal: &CellState, c: Constraint) -> Point {
        let b = self.perimeter_bounds(terminal, 0.0);
        let p = point(
            b.min_x() + c.point.x * b.width() + c.dx * self.scale,
            b.min_y() + c.point.y * b.height() + c.dy * self.scale,
        );
        if c.perimeter {
            self.perimeter_point(terminal, Some(p), false, 0.0)
        } else {
            p
        }
    }

    /// Model point in `origin`'s space to screen coordinates.
    fn transform_point(&self, origin: Point, p: Point) -> Point {
        let s = self.scale;
        point(
            s * (self.translate.x + p.x + origin.x),
            s * (self.translate.y + p.y + origin.y),
        )
    }

    /// Bounds used for perimeter projection: the state bounds grown by `border` plus the
    /// terminal's own `perimeterSpacing`, scaled.
    pub fn perimeter_bounds(&self, terminal: &CellState, border: f64) -> Rect {
        let border = border + style_number(&terminal.style, STYLE_PERIMETER_SPACING, 0.0);
        terminal.bounds.grow(border * self.scale)
    }

    /// Where a line from the centre of `terminal` towards `next` crosses its perimeter. Falls
    /// back to the centre without a perimeter function or a direction.
    pub fn perimeter_point(
        &self,
        terminal: &CellState,
        next: Option<Point>,
        orthogonal: bool,
        border: f64,
    ) -> Point {
        let perimeter = style_str(&terminal.style, STYLE_PERIMETER).and_then(perimeter_by_name);
        if let (Some(perimeter), Some(next)) = (perimeter, next) {
            let bounds = self.perimeter_bounds(terminal, border);
            if bounds.width() > 0.0 || bounds.height() > 0.0 {
                let c = bounds.center_point();
                let flip_h = style_bool(&terminal.style, STYLE_FLIPH, false);
                let flip_v = style_bool(&terminal.style, STYLE_FLIPV, false);
                let mut next = next;
                if flip_h {
                    next.x = 2.0 * c.x - next.x;
                }
                if flip_v {
                    next.y = 2.0 * c.y - next.y;
                }
                let mut p = perimeter(&bounds, next, orthogonal);
                if flip_h {
                    p.x = 2.0 * c.x - p.x;
                }
                if flip_v {
                    p.y = 2.0 * c.y - p.y;
                }
                return p;
            }
        }
        terminal.center()
    }

    /// Point along an edge for a relative geometry: `x` in -1..1 runs from source to target,
    /// `y` is an orthogonal distance and `offset` an absolute displacement (both scaled).
    pub fn point_on_edge(&self, state: &CellState, geo: Option<&Geometry>) -> Point {
        let mut p = state.center();
        let pts = &state.absolute_points;
        let relative = geo.is_none_or(|g| g.relative);
        if !state.segments.is_empty() && relative {
            let gx = geo.map_or(0.0, |g| g.x() / 2.0);
            let dist = ((gx + 0.5) * state.length).round();
            let mut segment = state.segments[0];
            let mut length = 0.0;
            let mut index = 1;
            while dist >= (length + segment).round() && index < pts.len() - 1 {
                length += segment;
                segment = state.segments[index];
                index += 1;
            }
            let factor = if segment == 0.0 {
                0.0
            } else {
                (dist - length) / segment
            };
            let p0 = pts[index - 1];
            let pe = pts[index];
            let gy = geo.map_or(0.0, |g| g.y());
            let offset = geo.and_then(|g| g.offset).unwrap_or(point(0.0, 0.0));
            let dx = pe.x - p0.x;
            let dy = pe.y - p0.y;
            let nx = if segment == 0.0 { 0.0 } else { dy / segment };
            let ny = if segment == 0.0 { 0.0 } else { dx / segment };
            p.x = p0.x + dx * factor + (nx * gy + offset.x) * self.scale;
            p.y = p0.y + dy * factor - (ny * gy - offset.y) * self.scale;
        } else if let Some(offset) = geo.and_then(|g| g.offset) {
            p.x += offset.x;
            p.y += offset.y;
        }
        p
    }

    // ---------------------------------------------------------------------------------------
    // Labels and controls.

    fn update_label_bounds(&mut self, cell: CellId) {
        let Some(state) = self.states.get(&cell) else {
            return;
        };
        let bounds = state.label.as_deref().map(|text| {
            let metrics = self
                .measurer
                .measure(text, &TextStyle::from_style(&state.style));
            let s = self.scale;
            let (w, h) = (metrics.width * s, metrics.height * s);
            if state.is_edge() {
                let o = state.absolute_offset;
                return rect(o.x - w / 2.0, o.y - h / 2.0, w, h);
            }
            let spacing = style_number(&state.style, STYLE_SPACING, LABEL_SPACING) * s;
            let region = state
                .bounds
                .translate(state.absolute_offset.to_vector());
            let x = match style_str(&state.style, STYLE_ALIGN) {
                Some(ALIGN_LEFT) => region.min_x() + spacing,
                Some(ALIGN_RIGHT) => region.max_x() - spacing - w,
                _ => region.center_point().x - w / 2.0,
            };
            let y = match style_str(&state.style, STYLE_VERTICAL_ALIGN) {
                Some(ALIGN_TOP) => region.min_y() + spacing,
                Some(ALIGN_BOTTOM) => region.max_y() - spacing - h,
                _ => region.center_point().y - h / 2.0,
            };
            rect(x, y, w, h)
        });
        if let Some(state) = self.states.get_mut(&cell) {
            state.label_bounds = bounds;
        }
    }

    fn update_control_bounds(&mut self, model: &Model, cell: CellId) {
        let has_children = model.child_count(cell) > 0 && !model.is_edge(cell);
        let enabled = self.options.folding_enabled;
        let s = self.scale;
        let Some(state) = self.states.get_mut(&cell) else {
            return;
        };
        if !(enabled && has_children && style_bool(&state.style, STYLE_FOLDABLE, true)) {
            state.control_bounds = None;
            return;
        }
        let size = FOLDING_CONTROL_SIZE * s;
        let cx = state.bounds.min_x() + size;
        let cy = state.bounds.min_y() + size;
        state.control_bounds = Some(rect(
            (cx - size / 2.0).round(),
            (cy - size / 2.0).round(),
            size.round(),
            size.round(),
        ));
    }

    // ---------------------------------------------------------------------------------------
    // Queries.

    fn bounds_under(&self, model: &Model, root: CellId) -> Rect {
        let cells = model.descendants(root);
        self.bounds(&cells).unwrap_or(rect(0.0, 0.0, 0.0, 0.0))
    }

    /// Union of the state and label bounds of the given vertex and edge cells.
    pub fn bounds(&self, cells: &[CellId]) -> Option<Rect> {
        let mut out: Option<Rect> = None;
        for state in cells.iter().filter_map(|c| self.states.get(c)) {
            if state.kind == CellKind::Plain {
                continue;
            }
            let mut b = state.bounds;
            if let Some(label) = state.label_bounds {
                b = b.union_with(&label);
            }
            out = Some(match out {
                Some(acc) => acc.union_with(&b),
                None => b,
            });
        }
        out
    }

    /// Whether `p` hits the state: edges within the hit tolerance of a segment, other cells
    /// inside their bounds.
    pub fn intersects(&self, state: &CellState, p: Point) -> bool {
        if state.is_edge() {
            let t2 = self.options.tolerance * self.options.tolerance;
            return state
                .absolute_points
                .windows(2)
                .any(|w| segment_distance_sq(w[0], w[1], p) <= t2);
        }
        state.bounds.contains_inclusive(p)
    }

    /// Every vertex and edge under `p`, topmost first: later siblings before earlier ones and
    /// children before their parent.
    pub fn states_at(&self, model: &Model, p: Point) -> Vec<CellId> {
        let mut out = Vec::new();
        self.collect_at(model, self.effective_root(model), p, &mut out);
        out
    }

    fn collect_at(&self, model: &Model, parent: CellId, p: Point, out: &mut Vec<CellId>) {
        for &child in model.children(parent).iter().rev() {
            self.collect_at(model, child, p, out);
            if let Some(state) = self.states.get(&child) {
                if state.kind != CellKind::Plain && self.intersects(state, p) {
                    out.push(child);
                }
            }
        }
    }

    pub fn cell_at(&self, model: &Model, p: Point) -> Option<CellId> {
        self.states_at(model, p).first().copied()
    }

    /// Unscaled size the label of `cell` needs, padded by the label spacing on every side.
    /// `None` for cells without label text.
    pub fn preferred_size(&self, model: &Model, cell: CellId) -> Option<Size> {
        let text = label_text(model.value(cell)?)?;
        let style = match self.states.get(&cell) {
            Some(state) => state.style.clone(),
            None => self
                .stylesheet
                .cell_style(model.style(cell), model.is_edge(cell)),
        };
        let metrics = self.measurer.measure(&text, &TextStyle::from_style(&style));
        let spacing = style_number(&style, STYLE_SPACING, LABEL_SPACING);
        Some(Size::new(
            metrics.width + 2.0 * spacing,
            metrics.height + 2.0 * spacing,
        ))
    }

    /// Hands out what changed since the previous call and resets the queue.
    pub fn take_render_queue(&mut self) -> RenderQueue {
        RenderQueue {
            repaint: std::mem::take(&mut self.repaint).into_iter().collect(),
            removed: std::mem::take(&mut self.removed).into_iter().collect(),
        }
    }
}

fn connection_constraint(style: &StyleMap, is_source: bool) -> Option<Constraint> {
    let (kx, ky, kdx, kdy, kp) = if is_source {
        (STYLE_EXIT_X, STYLE_EXIT_Y, STYLE_EXIT_DX, STYLE_EXIT_DY, STYLE_EXIT_PERIMETER)
    } else {
        (STYLE_ENTRY_X, STYLE_ENTRY_Y, STYLE_ENTRY_DX, STYLE_ENTRY_DY, STYLE_ENTRY_PERIMETER)
    };
    let x = style.get(kx)?.trim().parse::<f64>().ok()?;
    let y = style.get(ky)?.trim().parse::<f64>().ok()?;
    Some(Constraint {
        point: point(x, y),
        perimeter: style_bool(style, kp, true),
        dx: style_number(style, kdx, 0.0),
        dy: style_number(style, kdy, 0.0),
    })
}

/// The point an end of the edge aims at: the neighbouring waypoint or opposite end when known,
/// else the centre of the opposite terminal.
fn next_point(pts: &[Option<Point>], opposite: Option<&CellState>, is_source: bool) -> Option<Point> {
    let n = pts.len();
    let index = if is_source {
        1.min(n - 1)
    } else {
        n.saturating_sub(2)
    };
    pts.get(index)
        .copied()
        .flatten()
        .or_else(|| opposite.map(CellState::center))
}

fn update_vertex_label_offset(state: &mut CellState, scale: f64) {
    let width = state.bounds.width();
    let height = state.bounds.height();
    let label_width = state
        .style
        .get(STYLE_LABEL_WIDTH)
        .and_then(|v| v.trim().parse::<f64>().ok());
    match style_str(&state.style, STYLE_LABEL_POSITION) {
        Some(ALIGN_LEFT) => {
            state.absolute_offset.x -= label_width.map_or(width, |w| w * scale);
        }
        Some(ALIGN_RIGHT) => {
            state.absolute_offset.x += width;
        }
        _ => {
            if let Some(lw) = label_width {
                let factor = match style_str(&state.style, STYLE_ALIGN) {
                    Some(ALIGN_RIGHT) => 1.0,
                    Some(ALIGN_LEFT) => 0.0,
                    _ => 0.5,
                };
                state.absolute_offset.x -= (lw * scale - width) * factor;
            }
        }
    }
    match style_str(&state.style, STYLE_VERTICAL_LABEL_POSITION) {
        Some(ALIGN_TOP) => state.absolute_offset.y -= height,
        Some(ALIGN_BOTTOM) => state.absolute_offset.y += height,
        _ => {}
    }
}

/// Segments, length and bounds of an edge from its absolute points. Bounds are at least one
/// unit wide and high.
fn update_edge_bounds(state: &mut CellState) {
    let pts = &state.absolute_points;
    let (Some(&p0), Some(&pe)) = (pts.first(), pts.last()) else {
        return;
    };
    state.terminal_distance = (pe - p0).length();

    let mut segments = Vec::with_capacity(pts.len().saturating_sub(1));
    let mut length = 0.0;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (p0.x, p0.y, p0.x, p0.y);
    for w in pts.windows(2) {
        let segment = (w[1] - w[0]).length();
        segments.push(segment);
        length += segment;
        min_x = min_x.min(w[1].x);
        min_y = min_y.min(w[1].y);
        max_x = max_x.max(w[1].x);
        max_y = max_y.max(w[1].y);
    }
    state.segments = segments;
    state.length = length;
    state.bounds = rect(min_x, min_y, (max_x - min_x).max(1.0), (max_y - min_y).max(1.0));
}
