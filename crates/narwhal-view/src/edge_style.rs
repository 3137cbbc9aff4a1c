//! Edge routing.
//!
//! An [`EdgeStyle`] turns an edge's terminals and control points into the inner points of its
//! polyline; the view then clips the two ends against the terminal perimeters. The view picks a
//! style by the `edgeStyle` key, or for a self-loop by `loop` (default `loopEdgeStyle`). Styles
//! live in an [`EdgeStyleRegistry`] handed to the view, and an edge whose style is not registered
//! keeps its control points as they are.

use crate::constants::*;
use crate::state::CellState;
use crate::style::{style_number, style_str};
use indexmap::IndexMap;
use narwhal_model::{Point, RectExt, point};
use std::sync::Arc;

/// Everything a router sees, in screen coordinates.
pub struct Route<'a> {
    pub edge: &'a CellState,
    pub source: Option<&'a CellState>,
    pub target: Option<&'a CellState>,
    pub points: &'a [Point],
    /// Ends already fixed by a connection constraint or a loose terminal point.
    pub source_point: Option<Point>,
    pub target_point: Option<Point>,
    pub scale: f64,
}

pub trait EdgeStyle {
    fn route(&self, route: &Route<'_>) -> Vec<Point>;
}

impl<F> EdgeStyle for F
where
    F: Fn(&Route<'_>) -> Vec<Point>,
{
    fn route(&self, route: &Route<'_>) -> Vec<Point> {
        self(route)
    }
}

pub type SharedEdgeStyle = Arc<dyn EdgeStyle + Send + Sync>;

#[derive(Clone)]
pub struct EdgeStyleRegistry {
    styles: IndexMap<String, SharedEdgeStyle>,
}

impl std::fmt::Debug for EdgeStyleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EdgeStyleRegistry")
            .field("styles", &self.styles.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for EdgeStyleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EdgeStyleRegistry {
    /// Registry with the built-in `loopEdgeStyle`.
    pub fn new() -> Self {
        Self::empty().with(EDGESTYLE_LOOP, loop_style)
    }

    pub fn empty() -> Self {
        Self {
            styles: IndexMap::new(),
        }
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        style: impl EdgeStyle + Send + Sync + 'static,
    ) -> Option<SharedEdgeStyle> {
        self.styles.insert(name.into(), Arc::new(style))
    }

    pub fn with(
        mut self,
        name: impl Into<String>,
        style: impl EdgeStyle + Send + Sync + 'static,
    ) -> Self {
        self.register(name, style);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.styles.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&(dyn EdgeStyle + Send + Sync)> {
        self.styles.get(name).map(|s| s.as_ref())
    }
}

/// Routes a self-loop as a short segment beside its terminal, two `segment` lengths away from
/// the side named by `direction` (west, the default, loops out of the right side). A first
/// control point outside the terminal moves the loop there.
pub fn loop_style(route: &Route<'_>) -> Vec<Point> {
    if route.source_point.is_some() && route.target_point.is_some() {
        return route.points.to_vec();
    }
    let Some(source) = route.source else {
        return route.points.to_vec();
    };
    let b = source.bounds;
    let c = b.center_point();
    let pt = route
        .points
        .first()
        .copied()
        .filter(|p| !b.contains_inclusive(*p));

    let seg = style_number(&route.edge.style, STYLE_SEGMENT, DEFAULT_LOOP_SEGMENT) * route.scale;
    let dir = style_str(&route.edge.style, STYLE_DIRECTION).unwrap_or(DIRECTION_WEST);
    let vertical = dir == DIRECTION_NORTH || dir == DIRECTION_SOUTH;
    let (mut x, mut y, mut dx, mut dy) = if vertical {
        (c.x, 0.0, seg, 0.0)
    } else {
        (0.0, c.y, 0.0, seg)
    };

    match pt {
        Some(p) if p.x >= b.min_x() && p.x <= b.max_x() => {
            x = c.x;
            dx = (x - p.x).abs().max(dy);
            y = p.y;
            dy = 0.0;
        }
        Some(p) => {
            x = p.x;
            dy = (y - p.y).abs().max(dy);
        }
        None => match dir {
            DIRECTION_NORTH => y = b.min_y() - 2.0 * dx,
            DIRECTION_SOUTH => y = b.max_y() + 2.0 * dx,
            DIRECTION_EAST => x = b.min_x() - 2.0 * dy,
            _ => x = b.max_x() + 2.0 * dy,
        },
    }
    vec![point(x - dx, y - dy), point(x + dx, y + dy)]
}
