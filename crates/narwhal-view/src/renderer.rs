//! The seam between the view and a painting backend.
//!
//! A backend supplies [`Shape`] implementations for its drawing context `C` and registers them
//! by the style `shape` token in a [`ShapeRegistry`]. [`CellRenderer`] drains the view's render
//! queue and calls the matching shape for every state that changed since the previous render.

use crate::constants::{SHAPE_CONNECTOR, SHAPE_RECTANGLE, STYLE_SHAPE};
use crate::state::CellState;
use crate::style::style_str;
use crate::view::GraphView;
use indexmap::IndexMap;
use narwhal_model::CellId;
use rustc_hash::FxBuildHasher;
use serde::Serialize;

type HashMap<K, V> = hashbrown::HashMap<K, V, FxBuildHasher>;

pub trait Shape<C> {
    fn paint(&self, ctx: &mut C, state: &CellState);

    /// The cell's state is gone; drop whatever was drawn for it.
    fn destroy(&self, _ctx: &mut C, _cell: CellId) {}
}

impl<C, F> Shape<C> for F
where
    F: Fn(&mut C, &CellState),
{
    fn paint(&self, ctx: &mut C, state: &CellState) {
        self(ctx, state)
    }
}

pub struct ShapeRegistry<C> {
    shapes: IndexMap<String, Box<dyn Shape<C>>>,
    default_vertex: String,
    default_edge: String,
}

impl<C> std::fmt::Debug for ShapeRegistry<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShapeRegistry")
            .field("shapes", &self.shapes.keys().collect::<Vec<_>>())
            .field("default_vertex", &self.default_vertex)
            .field("default_edge", &self.default_edge)
            .finish()
    }
}

impl<C> Default for ShapeRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of looking a state's shape up.
pub struct ShapeLookup<'a, C> {
    pub name: &'a str,
    pub shape: Option<&'a dyn Shape<C>>,
    /// The state asked for a shape that is not registered and got the default instead.
    pub fallback: bool,
}

impl<C> ShapeRegistry<C> {
    /// Empty registry; unknown vertices fall back to `rectangle`, edges to `connector`.
    pub fn new() -> Self {
        Self {
            shapes: IndexMap::new(),
            default_vertex: SHAPE_RECTANGLE.to_string(),
            default_edge: SHAPE_CONNECTOR.to_string(),
        }
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        shape: impl Shape<C> + 'static,
    ) -> Option<Box<dyn Shape<C>>> {
        self.shapes.insert(name.into(), Box::new(shape))
    }

    pub fn with(mut self, name: impl Into<String>, shape: impl Shape<C> + 'static) -> Self {
        self.register(name, shape);
        self
    }

    pub fn set_default_vertex_shape(&mut self, name: impl Into<String>) {
        self.default_vertex = name.into();
    }

    pub fn set_default_edge_shape(&mut self, name: impl Into<String>) {
        self.default_edge = name.into();
    }

    pub fn contains(&self, name: &str) -> bool {
        self.shapes.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&dyn Shape<C>> {
        self.shapes.get(name).map(|s| s.as_ref())
    }

    pub fn lookup<'a>(&'a self, state: &'a CellState) -> ShapeLookup<'a, C> {
        let default = if state.is_edge() {
            self.default_edge.as_str()
        } else {
            self.default_vertex.as_str()
        };
        match style_str(&state.style, STYLE_SHAPE) {
            Some(name) if self.shapes.contains_key(name) => ShapeLookup {
                name,
                shape: self.get(name),
                fallback: false,
            },
            requested => ShapeLookup {
                name: default,
                shape: self.get(default),
                fallback: requested.is_some(),
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RenderReport {
    pub painted: Vec<CellId>,
    pub removed: Vec<CellId>,
    /// States painted with a default shape because their own was not registered.
    pub fallbacks: usize,
}

/// Paints changed states through a registry and remembers which shape drew each cell.
pub struct CellRenderer<C> {
    registry: ShapeRegistry<C>,
    drawn: HashMap<CellId, String>,
}

impl<C> std::fmt::Debug for CellRenderer<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CellRenderer")
            .field("registry", &self.registry)
            .field("drawn", &self.drawn.len())
            .finish()
    }
}

impl<C> CellRenderer<C> {
    pub fn new(registry: ShapeRegistry<C>) -> Self {
        Self {
            registry,
            drawn: HashMap::default(),
        }
    }

    pub fn registry(&self) -> &ShapeRegistry<C> {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ShapeRegistry<C> {
        &mut self.registry
    }

    /// Whether a shape is currently drawn for `cell`.
    pub fn is_drawn(&self, cell: CellId) -> bool {
        self.drawn.contains_key(&cell)
    }

    /// Destroys shapes of dropped states, then paints every recomputed state in validation
    /// order (parents before children).
    pub fn render(&mut self, view: &mut GraphView, ctx: &mut C) -> RenderReport {
        let queue = view.take_render_queue();
        let mut report = RenderReport::default();

        for cell in queue.removed {
            if let Some(name) = self.drawn.remove(&cell) {
                if let Some(shape) = self.registry.get(&name) {
                    shape.destroy(ctx, cell);
                }
                report.removed.push(cell);
            }
        }

        for cell in queue.repaint {
            let Some(state) = view.state(cell) else {
                continue;
            };
            let lookup = self.registry.lookup(state);
            if lookup.fallback {
                report.fallbacks += 1;
                tracing::debug!(
                    requested = style_str(&state.style, STYLE_SHAPE).unwrap_or_default(),
                    fallback = lookup.name,
                    "shape not registered, using default"
                );
            }
            let Some(shape) = lookup.shape else {
                tracing::warn!(shape = lookup.name, "no shape registered, cell not painted");
                continue;
            };
            if let Some(previous) = self.drawn.get(&cell).filter(|p| p.as_str() != lookup.name) {
                if let Some(old) = self.registry.get(previous) {
                    old.destroy(ctx, cell);
                }
            }
            shape.paint(ctx, state);
            self.drawn.insert(cell, lookup.name.to_string());
            report.painted.push(cell);
        }

        if !report.painted.is_empty() || !report.removed.is_empty() {
            tracing::debug!(
                painted = report.painted.len(),
                removed = report.removed.len(),
                fallbacks = report.fallbacks,
                "rendered"
            );
        }
        report
    }
}
