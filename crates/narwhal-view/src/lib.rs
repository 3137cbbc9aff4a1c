#![forbid(unsafe_code)]

//! View layer for narwhal models.
//!
//! [`GraphView`] caches one [`CellState`] per visible cell: the resolved style, absolute bounds,
//! edge polylines and label boxes in screen coordinates. Model notifications invalidate states;
//! validation recomputes them, routing edges through an [`EdgeStyleRegistry`]. [`CellRenderer`]
//! hands the changed ones to registered shapes.

pub mod constants;
pub mod edge_style;
pub mod perimeter;
pub mod renderer;
pub mod state;
pub mod style;
pub mod text;
pub mod view;

pub use edge_style::{EdgeStyle, EdgeStyleRegistry, Route, loop_style};
pub use perimeter::{PerimeterFn, perimeter_by_name};
pub use renderer::{CellRenderer, RenderReport, Shape, ShapeLookup, ShapeRegistry};
pub use state::CellState;
pub use style::{StyleMap, Stylesheet, set_style_key};
pub use text::{DeterministicTextMeasurer, TextMeasurer, TextMetrics, TextStyle};
pub use view::{GraphView, RenderQueue, ViewOptions};
