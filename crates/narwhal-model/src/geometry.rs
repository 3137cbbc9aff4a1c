//! Geometry value types shared by the model and the view.
//!
//! Points and rectangles are `euclid` types in an untyped unit space; the helpers in [`RectExt`]
//! follow diagram-editor conventions (zero-sized rectangles still take part in unions, failed
//! intersections collapse to an empty rectangle instead of disappearing).

use serde::{Deserialize, Serialize};

pub type Unit = euclid::UnknownUnit;

pub type Point = euclid::Point2D<f64, Unit>;
pub type Vector = euclid::Vector2D<f64, Unit>;
pub type Size = euclid::Size2D<f64, Unit>;
pub type Rect = euclid::Rect<f64, Unit>;

pub fn point(x: f64, y: f64) -> Point {
    euclid::point2(x, y)
}

pub fn vector(x: f64, y: f64) -> Vector {
    euclid::vec2(x, y)
}

pub fn rect(x: f64, y: f64, width: f64, height: f64) -> Rect {
    euclid::rect(x, y, width, height)
}

pub trait RectExt: Sized {
    /// Smallest rectangle containing both, including degenerate (zero-area) inputs.
    fn union_with(&self, other: &Self) -> Self;
    /// Overlapping region, or a zero-sized rectangle at the clamped corner when disjoint.
    fn intersect_with(&self, other: &Self) -> Self;
    /// Grows by `amount` on every side.
    fn grow(&self, amount: f64) -> Self;
    fn center_point(&self) -> Point;
    /// Inclusive on all four edges, so points on a border count as inside.
    fn contains_inclusive(&self, p: Point) -> bool;
    fn enclosing(points: impl IntoIterator<Item = Point>) -> Option<Self>;
}

impl RectExt for Rect {
    fn union_with(&self, other: &Self) -> Self {
        let min_x = self.min_x().min(other.min_x());
        let min_y = self.min_y().min(other.min_y());
        let max_x = self.max_x().max(other.max_x());
        let max_y = self.max_y().max(other.max_y());
        rect(min_x, min_y, max_x - min_x, max_y - min_y)
    }

    fn intersect_with(&self, other: &Self) -> Self {
        let min_x = self.min_x().max(other.min_x());
        let min_y = self.min_y().max(other.min_y());
        let max_x = self.max_x().min(other.max_x());
        let max_y = self.max_y().min(other.max_y());
        rect(
            min_x,
            min_y,
            (max_x - min_x).max(0.0),
            (max_y - min_y).max(0.0),
        )
    }

    fn grow(&self, amount: f64) -> Self {
        self.inflate(amount, amount)
    }

    fn center_point(&self) -> Point {
        point(
            self.origin.x + self.size.width / 2.0,
            self.origin.y + self.size.height / 2.0,
        )
    }

    fn contains_inclusive(&self, p: Point) -> bool {
        p.x >= self.min_x() && p.x <= self.max_x() && p.y >= self.min_y() && p.y <= self.max_y()
    }

    fn enclosing(points: impl IntoIterator<Item = Point>) -> Option<Self> {
        let mut it = points.into_iter();
        let p0 = it.next()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (p0.x, p0.y, p0.x, p0.y);
        for p in it {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Some(rect(min_x, min_y, max_x - min_x, max_y - min_y))
    }
}

/// Model-space geometry of a cell.
///
/// For vertices `bounds` is the position relative to the parent's origin plus the size. With
/// `relative` set (edge labels, ports) `bounds.origin` is a fraction of the parent instead, and
/// `offset` an absolute displacement. Edges keep their waypoints in `points` and the terminal
/// points used while a terminal is not connected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Geometry {
    pub bounds: Rect,
    #[serde(default)]
    pub relative: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<Point>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub points: Vec<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_point: Option<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_point: Option<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternate_bounds: Option<Rect>,
}

impl Default for Geometry {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0)
    }
}

impl Geometry {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            bounds: rect(x, y, width, height),
            relative: false,
            offset: None,
            points: Vec::new(),
            source_point: None,
            target_point: None,
            alternate_bounds: None,
        }
    }

    /// Relative geometry as used for edges: label position is expressed along the edge.
    pub fn edge() -> Self {
        Self {
            relative: true,
            ..Self::default()
        }
    }

    pub fn with_points(mut self, points: impl IntoIterator<Item = Point>) -> Self {
        self.points = points.into_iter().collect();
        self
    }

    pub fn with_offset(mut self, offset: Point) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn x(&self) -> f64 {
        self.bounds.origin.x
    }

    pub fn y(&self) -> f64 {
        self.bounds.origin.y
    }

    pub fn width(&self) -> f64 {
        self.bounds.size.width
    }

    pub fn height(&self) -> f64 {
        self.bounds.size.height
    }

    pub fn terminal_point(&self, is_source: bool) -> Option<Point> {
        if is_source {
            self.source_point
        } else {
            self.target_point
        }
    }

    pub fn set_terminal_point(&mut self, point: Option<Point>, is_source: bool) {
        if is_source {
            self.source_point = point;
        } else {
            self.target_point = point;
        }
    }

    /// Moves the geometry. Relative bounds are fractions and stay put; waypoints and terminal
    /// points are always absolute within the parent and move along.
    pub fn translate(&mut self, dx: f64, dy: f64) {
        if !self.relative {
            self.bounds.origin.x += dx;
            self.bounds.origin.y += dy;
        }
        let d = vector(dx, dy);
        if let Some(p) = self.source_point.as_mut() {
            *p += d;
        }
        if let Some(p) = self.target_point.as_mut() {
            *p += d;
        }
        for p in &mut self.points {
            *p += d;
        }
    }

    pub fn scale(&mut self, sx: f64, sy: f64) {
        let scale_point = |p: &mut Point| {
            p.x *= sx;
            p.y *= sy;
        };
        if let Some(p) = self.source_point.as_mut() {
            scale_point(p);
        }
        if let Some(p) = self.target_point.as_mut() {
            scale_point(p);
        }
        for p in &mut self.points {
            scale_point(p);
        }
        if !self.relative {
            self.bounds.origin.x *= sx;
            self.bounds.origin.y *= sy;
            self.bounds.size.width *= sx;
            self.bounds.size.height *= sy;
        }
    }

    /// Exchanges `bounds` with `alternate_bounds` (used when folding). Returns whether anything
    /// was swapped.
    pub fn swap(&mut self) -> bool {
        let Some(alt) = self.alternate_bounds.as_mut() else {
            return false;
        };
        std::mem::swap(&mut self.bounds, alt);
        true
    }
}
