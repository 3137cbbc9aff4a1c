use crate::style::StyleMap;
use narwhal_model::{CellId, CellKind, Point, Rect, point, rect};
use serde::Serialize;

/// Cached view data for one cell: resolved style plus everything a renderer needs, in scaled
/// and translated screen coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CellState {
    pub cell: CellId,
    pub kind: CellKind,
    pub style: StyleMap,
    /// Unscaled absolute origin of the cell's coordinate space.
    pub origin: Point,
    pub bounds: Rect,
    pub unscaled_width: f64,
    pub unscaled_height: f64,
    /// Label anchor: an offset from `bounds.origin` for vertices, an absolute point for edges.
    pub absolute_offset: Point,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub absolute_points: Vec<Point>,
    pub terminal_distance: f64,
    pub length: f64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub segments: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visible_source: Option<CellId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visible_target: Option<CellId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_bounds: Option<Rect>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub control_bounds: Option<Rect>,
    #[serde(skip)]
    pub(crate) invalid: bool,
}

impl CellState {
    pub(crate) fn new(cell: CellId, kind: CellKind) -> Self {
        Self {
            cell,
            kind,
            style: StyleMap::new(),
            origin: point(0.0, 0.0),
            bounds: rect(0.0, 0.0, 0.0, 0.0),
            unscaled_width: 0.0,
            unscaled_height: 0.0,
            absolute_offset: point(0.0, 0.0),
            absolute_points: Vec::new(),
            terminal_distance: 0.0,
            length: 0.0,
            segments: Vec::new(),
            visible_source: None,
            visible_target: None,
            label: None,
            label_bounds: None,
            control_bounds: None,
            invalid: true,
        }
    }

    pub fn is_edge(&self) -> bool {
        self.kind == CellKind::Edge
    }

    pub fn is_vertex(&self) -> bool {
        self.kind == CellKind::Vertex
    }

    pub fn is_invalid(&self) -> bool {
        self.invalid
    }

    pub fn center(&self) -> Point {
        point(
            self.bounds.origin.x + self.bounds.size.width / 2.0,
            self.bounds.origin.y + self.bounds.size.height / 2.0,
        )
    }

    pub fn visible_terminal(&self, is_source: bool) -> Option<CellId> {
        if is_source {
            self.visible_source
        } else {
            self.visible_target
        }
    }

    pub fn first_point(&self) -> Option<Point> {
        self.absolute_points.first().copied()
    }

    pub fn last_point(&self) -> Option<Point> {
        self.absolute_points.last().copied()
    }

    /// Same rendered output as `other`; the validity flag is ignored.
    pub fn same_output(&self, other: &CellState) -> bool {
        self.style == other.style
            && self.bounds == other.bounds
            && self.absolute_offset == other.absolute_offset
            && self.absolute_points == other.absolute_points
            && self.visible_source == other.visible_source
            && self.visible_target == other.visible_target
            && self.label == other.label
            && self.label_bounds == other.label_bounds
            && self.control_bounds == other.control_bounds
    }

    /// Resets everything derived from geometry before a recompute.
    pub(crate) fn reset_geometry(&mut self, origin: Point) {
        self.origin = origin;
        self.bounds = rect(0.0, 0.0, 0.0, 0.0);
        self.unscaled_width = 0.0;
        self.unscaled_height = 0.0;
        self.absolute_offset = point(0.0, 0.0);
        self.absolute_points.clear();
        self.terminal_distance = 0.0;
        self.length = 0.0;
        self.segments.clear();
        self.label_bounds = None;
        self.control_bounds = None;
    }
}
