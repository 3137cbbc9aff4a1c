#![forbid(unsafe_code)]

//! Headless diagram graph editing.
//!
//! [`Graph`] bundles a [`Model`] (cells as a containment tree and a connection graph), a
//! [`GraphView`] caching the resolved state of every visible cell, and an [`UndoManager`]. Each
//! editing call commits one edit; the view and the undo history both see it exactly once.
//!
//! ```
//! use narwhal::{Graph, rect};
//!
//! let mut graph = Graph::new();
//! let a = graph.insert_vertex(None, Some("a"), "A", rect(0.0, 0.0, 40.0, 40.0), None).unwrap();
//! let b = graph.insert_vertex(None, Some("b"), "B", rect(100.0, 0.0, 40.0, 40.0), None).unwrap();
//! let e = graph.insert_edge(None, None, "", Some(a), Some(b), None).unwrap();
//!
//! let points = &graph.state(e).unwrap().absolute_points;
//! assert_eq!(points.len(), 2);
//!
//! graph.undo().unwrap();
//! assert!(graph.state(e).is_none());
//! ```

pub mod config;
pub mod error;
pub mod graph;

pub use config::GraphConfig;
pub use error::{Error, Result};
pub use graph::Graph;

pub use narwhal_model as model;
pub use narwhal_view as view;

pub use narwhal_model::{
    Cell, CellId, CellKind, Change, Edit, Geometry, Model, Point, Rect, RectExt, Size,
    UndoManager, point, rect,
};
pub use narwhal_view::{
    CellRenderer, CellState, EdgeStyle, EdgeStyleRegistry, GraphView, RenderReport, Shape,
    ShapeRegistry, Stylesheet, TextMeasurer,
};
