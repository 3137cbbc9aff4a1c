#![forbid(unsafe_code)]

//! Diagram model core: cells organised as a containment tree and a connection graph at once.
//!
//! Cells live in a [`CellArena`] and are addressed by generation-checked [`CellId`] handles.
//! Every mutation goes through a [`Change`], is recorded in the open batch, and reaches
//! listeners as one [`Edit`] per outermost batch. [`UndoManager`] replays those edits.

pub mod arena;
pub mod cell;
pub mod change;
pub mod error;
pub mod geometry;
pub mod model;
pub mod topology;
pub mod transaction;
pub mod undo;

pub use arena::CellArena;
pub use cell::{Cell, CellId, CellKind};
pub use change::Change;
pub use error::{Error, Result};
pub use geometry::{Geometry, Point, Rect, RectExt, Size, Vector, point, rect, vector};
pub use model::{ListenerId, Model, ModelOptions};
pub use topology::{CloneMapping, CloneResult};
pub use transaction::Edit;
pub use undo::UndoManager;
