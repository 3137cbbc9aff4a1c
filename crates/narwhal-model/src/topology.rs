//! Stateless helpers over sets of cells.

use crate::cell::CellId;
use crate::error::{Error, Result};
use crate::model::Model;
use rustc_hash::FxBuildHasher;

type HashMap<K, V> = hashbrown::HashMap<K, V, FxBuildHasher>;
type HashSet<T> = hashbrown::HashSet<T, FxBuildHasher>;

pub type CloneMapping = HashMap<CellId, CellId>;

/// Drops every cell that has an ancestor in the same set. Input order is kept.
pub fn topmost_cells(model: &Model, cells: &[CellId]) -> Vec<CellId> {
    let set: HashSet<CellId> = cells.iter().copied().collect();
    let mut out = Vec::with_capacity(cells.len());
    for &cell in cells {
        let mut topmost = true;
        let mut parent = model.parent(cell);
        while let Some(p) = parent {
            if set.contains(&p) {
                topmost = false;
                break;
            }
            parent = model.parent(p);
        }
        if topmost && !out.contains(&cell) {
            out.push(cell);
        }
    }
    out
}

/// Far endpoints of `edges` as seen from `terminal`. Self-loops and unconnected ends are
/// skipped; each opposite is reported once.
pub fn opposites(
    model: &Model,
    edges: &[CellId],
    terminal: CellId,
    sources: bool,
    targets: bool,
) -> Vec<CellId> {
    let mut out = Vec::new();
    for &edge in edges {
        let source = model.terminal(edge, true);
        let target = model.terminal(edge, false);
        let opposite = if source == Some(terminal) && targets {
            target.filter(|&t| t != terminal)
        } else if target == Some(terminal) && sources {
            source.filter(|&s| s != terminal)
        } else {
            None
        };
        if let Some(o) = opposite.filter(|o| !out.contains(o)) {
            out.push(o);
        }
    }
    out
}

/// Distinct parents of `cells`, first occurrence order.
pub fn parents(model: &Model, cells: &[CellId]) -> Vec<CellId> {
    let mut out = Vec::new();
    for &cell in cells {
        if let Some(p) = model.parent(cell) {
            if !out.contains(&p) {
                out.push(p);
            }
        }
    }
    out
}

/// Every cell of `cells` and their subtrees, pre-order, without duplicates.
pub fn descendants_of(model: &Model, cells: &[CellId]) -> Vec<CellId> {
    let mut seen: HashSet<CellId> = HashSet::default();
    let mut out = Vec::new();
    for &cell in cells {
        for c in model.descendants(cell) {
            if seen.insert(c) {
                out.push(c);
            }
        }
    }
    out
}

/// Pre-order walk of `root`'s subtree keeping the cells `filter` accepts.
pub fn filter_descendants(
    model: &Model,
    root: CellId,
    mut filter: impl FnMut(CellId) -> bool,
) -> Vec<CellId> {
    model
        .descendants(root)
        .into_iter()
        .filter(|&c| filter(c))
        .collect()
}

#[derive(Debug, Clone)]
pub struct CloneResult {
    /// One clone per input cell, same order.
    pub clones: Vec<CellId>,
    /// Original to clone, for every cloned cell including children.
    pub mapping: CloneMapping,
}

/// Clones `cells` (with their subtrees when `include_children`) as detached cells.
///
/// Terminals are rewired in a second pass once every clone exists: an end whose terminal was
/// cloned points at that clone, an end whose terminal was not keeps the original terminal. The
/// clones are not registered with any terminal until they are added to the model.
pub fn clone_cells(
    model: &mut Model,
    cells: &[CellId],
    include_children: bool,
) -> Result<CloneResult> {
    let mut mapping = CloneMapping::default();
    let clones = clone_cells_with_mapping(model, cells, include_children, &mut mapping)?;
    Ok(CloneResult { clones, mapping })
}

/// Like [`clone_cells`] but reuses and extends a caller-provided mapping. A cell already in the
/// mapping is not cloned again.
pub fn clone_cells_with_mapping(
    model: &mut Model,
    cells: &[CellId],
    include_children: bool,
    mapping: &mut CloneMapping,
) -> Result<Vec<CellId>> {
    let mut targets: HashSet<CellId> = HashSet::default();
    for (&original, &clone) in mapping.iter() {
        model.cells().cell(original)?;
        model.cells().cell(clone)?;
        if !targets.insert(clone) {
            return Err(Error::ConflictingMapping(clone));
        }
    }
    for &cell in cells {
        model.cells().cell(cell)?;
    }

    let mut clones = Vec::with_capacity(cells.len());
    for &cell in cells {
        clones.push(clone_cell_impl(model, cell, mapping, include_children)?);
    }
    for (&cell, &clone) in cells.iter().zip(&clones) {
        restore_clone(model, clone, cell, mapping)?;
    }
    tracing::trace!(roots = clones.len(), mapped = mapping.len(), "cells cloned");
    Ok(clones)
}

fn clone_cell_impl(
    model: &mut Model,
    cell: CellId,
    mapping: &mut CloneMapping,
    include_children: bool,
) -> Result<CellId> {
    if let Some(&clone) = mapping.get(&cell) {
        return Ok(clone);
    }
    let copy = model.cells().cell(cell)?.clone_detached();
    let clone = model.create(copy);
    mapping.insert(cell, clone);
    if include_children {
        let children = model.children(cell).to_vec();
        for child in children {
            let child_clone = clone_cell_impl(model, child, mapping, include_children)?;
            model.insert_detached(clone, child_clone, None)?;
        }
    }
    Ok(clone)
}

fn restore_clone(
    model: &mut Model,
    clone: CellId,
    cell: CellId,
    mapping: &CloneMapping,
) -> Result<()> {
    if model.is_edge(clone) {
        for is_source in [true, false] {
            if let Some(t) = model.terminal(cell, is_source) {
                let terminal = mapping.get(&t).copied().unwrap_or(t);
                model.set_detached_terminal(clone, Some(terminal), is_source)?;
            }
        }
    }
    let pairs: Vec<(CellId, CellId)> = model
        .children(clone)
        .iter()
        .copied()
        .zip(model.children(cell).iter().copied())
        .collect();
    for (child_clone, child) in pairs {
        restore_clone(model, child_clone, child, mapping)?;
    }
    Ok(())
}
