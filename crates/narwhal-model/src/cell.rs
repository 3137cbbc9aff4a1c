use crate::geometry::Geometry;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Generation-checked handle into a [`crate::CellArena`].
///
/// A handle stays valid until its slot is released; after that every lookup through it fails
/// even if the slot gets reused for a new cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl CellId {
    pub fn index(self) -> u32 {
        self.index
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellKind {
    /// Root and layers, and plain grouping cells that are neither shapes nor connections.
    #[default]
    Plain,
    Vertex,
    Edge,
}

/// A node of the model: vertex, edge or structural cell.
///
/// Relationship fields are only written by the arena so the tree and terminal back-references
/// stay symmetric. A freshly built cell is detached.
#[derive(Debug, Clone, Default)]
pub struct Cell {
    pub(crate) id: Option<String>,
    pub(crate) value: Value,
    pub(crate) geometry: Option<Geometry>,
    pub(crate) style: Option<String>,
    pub(crate) kind: CellKind,
    pub(crate) connectable: bool,
    pub(crate) visible: bool,
    pub(crate) collapsed: bool,

    pub(crate) parent: Option<CellId>,
    pub(crate) children: Vec<CellId>,
    pub(crate) edges: Vec<CellId>,
    pub(crate) source: Option<CellId>,
    pub(crate) target: Option<CellId>,
}

impl Cell {
    pub fn new() -> Self {
        Self {
            connectable: true,
            visible: true,
            ..Default::default()
        }
    }

    pub fn vertex(geometry: Geometry) -> Self {
        Self {
            kind: CellKind::Vertex,
            geometry: Some(geometry),
            ..Self::new()
        }
    }

    pub fn edge() -> Self {
        Self {
            kind: CellKind::Edge,
            geometry: Some(Geometry::edge()),
            ..Self::new()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = value.into();
        self
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }

    pub fn with_geometry(mut self, geometry: Geometry) -> Self {
        self.geometry = Some(geometry);
        self
    }

    pub fn with_connectable(mut self, connectable: bool) -> Self {
        self.connectable = connectable;
        self
    }

    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub fn with_collapsed(mut self, collapsed: bool) -> Self {
        self.collapsed = collapsed;
        self
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn geometry(&self) -> Option<&Geometry> {
        self.geometry.as_ref()
    }

    pub fn style(&self) -> Option<&str> {
        self.style.as_deref()
    }

    pub fn kind(&self) -> CellKind {
        self.kind
    }

    pub fn is_vertex(&self) -> bool {
        self.kind == CellKind::Vertex
    }

    pub fn is_edge(&self) -> bool {
        self.kind == CellKind::Edge
    }

    pub fn is_connectable(&self) -> bool {
        self.connectable
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_collapsed(&self) -> bool {
        self.collapsed
    }

    pub fn parent(&self) -> Option<CellId> {
        self.parent
    }

    pub fn children(&self) -> &[CellId] {
        &self.children
    }

    /// Edges whose source or target is this cell. Maintained by the model, never set directly.
    pub fn edges(&self) -> &[CellId] {
        &self.edges
    }

    pub fn terminal(&self, is_source: bool) -> Option<CellId> {
        if is_source { self.source } else { self.target }
    }

    pub fn source(&self) -> Option<CellId> {
        self.source
    }

    pub fn target(&self) -> Option<CellId> {
        self.target
    }

    /// Copy of the cell's own attributes. Identity, relationships and back-references are left
    /// out; the value payload is deep-cloned.
    pub fn clone_detached(&self) -> Cell {
        Cell {
            id: None,
            value: self.value.clone(),
            geometry: self.geometry.clone(),
            style: self.style.clone(),
            kind: self.kind,
            connectable: self.connectable,
            visible: self.visible,
            collapsed: self.collapsed,
            parent: None,
            children: Vec::new(),
            edges: Vec::new(),
            source: None,
            target: None,
        }
    }
}
