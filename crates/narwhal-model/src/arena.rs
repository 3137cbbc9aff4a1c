//! Slot arena holding every cell plus the raw, non-undoable structural operations.
//!
//! The operations here keep the parent/children and terminal/edges relations symmetric but know
//! nothing about undo or notifications; [`crate::Model`] builds its undoable setters on top.

use crate::cell::{Cell, CellId};
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    cell: Option<Cell>,
}

#[derive(Debug, Clone, Default)]
pub struct CellArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    len: usize,
}

impl CellArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn alloc(&mut self, cell: Cell) -> CellId {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.cell = Some(cell);
            return CellId {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            cell: Some(cell),
        });
        CellId {
            index,
            generation: 0,
        }
    }

    /// Frees the slot. Outstanding handles to it become stale.
    pub(crate) fn release(&mut self, id: CellId) -> Option<Cell> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let cell = slot.cell.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.len -= 1;
        Some(cell)
    }

    pub fn contains(&self, id: CellId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: CellId) -> Option<&Cell> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.cell.as_ref()
    }

    pub(crate) fn get_mut(&mut self, id: CellId) -> Option<&mut Cell> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.cell.as_mut()
    }

    pub(crate) fn cell(&self, id: CellId) -> Result<&Cell> {
        self.get(id).ok_or(Error::StaleCell(id))
    }

    pub(crate) fn cell_mut(&mut self, id: CellId) -> Result<&mut Cell> {
        self.get_mut(id).ok_or(Error::StaleCell(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = (CellId, &Cell)> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.cell.as_ref().map(|cell| {
                (
                    CellId {
                        index: i as u32,
                        generation: slot.generation,
                    },
                    cell,
                )
            })
        })
    }

    pub fn parent(&self, id: CellId) -> Option<CellId> {
        self.get(id)?.parent
    }

    pub fn children(&self, id: CellId) -> &[CellId] {
        self.get(id).map(|c| c.children.as_slice()).unwrap_or(&[])
    }

    pub fn child_count(&self, id: CellId) -> usize {
        self.children(id).len()
    }

    /// Absent for an out-of-range index instead of panicking.
    pub fn child_at(&self, id: CellId, index: usize) -> Option<CellId> {
        self.children(id).get(index).copied()
    }

    pub fn index_of(&self, parent: CellId, child: CellId) -> Option<usize> {
        self.children(parent).iter().position(|&c| c == child)
    }

    pub fn terminal(&self, edge: CellId, is_source: bool) -> Option<CellId> {
        self.get(edge)?.terminal(is_source)
    }

    /// True when `parent` is `child` or one of its ancestors.
    pub fn is_ancestor(&self, parent: CellId, child: CellId) -> bool {
        let mut cur = Some(child);
        while let Some(c) = cur {
            if c == parent {
                return true;
            }
            cur = self.parent(c);
        }
        false
    }

    /// Topmost ancestor of `id` (itself when it has no parent).
    pub fn root_of(&self, id: CellId) -> CellId {
        let mut cur = id;
        while let Some(p) = self.parent(cur) {
            cur = p;
        }
        cur
    }

    /// Deepest cell that is an ancestor of, or equal to, both inputs. The topmost cell of the
    /// tree is never returned, so cells in different layers have no common ancestor.
    pub fn nearest_common_ancestor(&self, a: CellId, b: CellId) -> Option<CellId> {
        let mut path_b = Vec::new();
        let mut cur = Some(b);
        while let Some(c) = cur {
            path_b.push(c);
            cur = self.parent(c);
        }
        let mut cur = Some(a);
        while let Some(c) = cur {
            let parent = self.parent(c);
            if parent.is_some() && path_b.contains(&c) {
                return Some(c);
            }
            cur = parent;
        }
        None
    }

    /// Pre-order list of `id` and all of its descendants.
    pub fn descendants(&self, id: CellId) -> Vec<CellId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(c) = stack.pop() {
            let Some(cell) = self.get(c) else {
                continue;
            };
            out.push(c);
            stack.extend(cell.children.iter().rev().copied());
        }
        out
    }

    /// Incident edges of `id`, filtered by direction. Self-loops are reported only when
    /// `include_loops` is set and at least one direction is requested.
    pub fn edges(
        &self,
        id: CellId,
        incoming: bool,
        outgoing: bool,
        include_loops: bool,
    ) -> Vec<CellId> {
        let Some(cell) = self.get(id) else {
            return Vec::new();
        };
        if !incoming && !outgoing {
            return Vec::new();
        }
        cell.edges
            .iter()
            .copied()
            .filter(|&e| {
                let source = self.terminal(e, true);
                let target = self.terminal(e, false);
                if source == target && source.is_some() {
                    include_loops
                } else {
                    (incoming && target == Some(id)) || (outgoing && source == Some(id))
                }
            })
            .collect()
    }

    /// Inserts `child` under `parent`, detaching it from any previous parent first.
    ///
    /// `None` appends. Re-inserting under the same parent accounts for the slot the child frees,
    /// so appending an existing child moves it to the end. Everything is validated before the
    /// tree is touched. Returns the final index.
    pub fn insert_child(
        &mut self,
        parent: CellId,
        child: CellId,
        index: Option<usize>,
    ) -> Result<usize> {
        self.cell(child)?;
        let len = self.cell(parent)?.children.len();
        if self.is_ancestor(child, parent) {
            return Err(Error::Cycle { parent, child });
        }
        let same_parent = self.parent(child) == Some(parent);
        let max = if same_parent { len - 1 } else { len };
        let index = index.unwrap_or(max);
        if index > max {
            return Err(Error::IndexOutOfRange {
                index,
                len: max,
            });
        }
        self.remove_from_parent(child)?;
        self.cell_mut(parent)?.children.insert(index, child);
        self.cell_mut(child)?.parent = Some(parent);
        Ok(index)
    }

    pub fn remove_child_at(&mut self, parent: CellId, index: usize) -> Result<CellId> {
        let cell = self.cell_mut(parent)?;
        let len = cell.children.len();
        if index >= len {
            return Err(Error::IndexOutOfRange { index, len });
        }
        let child = cell.children.remove(index);
        if let Some(c) = self.get_mut(child) {
            c.parent = None;
        }
        Ok(child)
    }

    /// Detaches `child` from its parent, if any. Returns the index it occupied.
    pub fn remove_from_parent(&mut self, child: CellId) -> Result<Option<usize>> {
        let Some(parent) = self.cell(child)?.parent else {
            return Ok(None);
        };
        let index = self.index_of(parent, child);
        if let Some(i) = index {
            self.remove_child_at(parent, i)?;
        } else {
            debug_assert!(false, "child not listed by its parent");
            self.cell_mut(child)?.parent = None;
        }
        Ok(index)
    }

    /// Connects `edge` to `terminal` on the given end, unregistering it from the previous
    /// terminal of that end first.
    pub fn insert_edge(&mut self, terminal: CellId, edge: CellId, is_source: bool) -> Result<()> {
        self.cell(terminal)?;
        if !self.cell(edge)?.is_edge() {
            return Err(Error::NotAnEdge(edge));
        }
        self.remove_from_terminal(edge, is_source)?;
        self.set_terminal_pointer(edge, Some(terminal), is_source)?;
        self.register_edge(terminal, edge)
    }

    /// Disconnects `edge` from `terminal` on the given end. A self-loop stays listed while its
    /// other end still points at `terminal`.
    pub fn remove_edge(&mut self, terminal: CellId, edge: CellId, is_source: bool) -> Result<()> {
        if self.terminal(edge, !is_source) != Some(terminal) {
            self.unregister_edge(terminal, edge)?;
        }
        self.set_terminal_pointer(edge, None, is_source)
    }

    pub fn remove_from_terminal(&mut self, edge: CellId, is_source: bool) -> Result<()> {
        match self.cell(edge)?.terminal(is_source) {
            Some(t) if self.contains(t) => self.remove_edge(t, edge, is_source),
            _ => self.set_terminal_pointer(edge, None, is_source),
        }
    }

    pub(crate) fn set_terminal_pointer(
        &mut self,
        edge: CellId,
        terminal: Option<CellId>,
        is_source: bool,
    ) -> Result<()> {
        let cell = self.cell_mut(edge)?;
        if is_source {
            cell.source = terminal;
        } else {
            cell.target = terminal;
        }
        Ok(())
    }

    pub(crate) fn register_edge(&mut self, terminal: CellId, edge: CellId) -> Result<()> {
        let t = self.cell_mut(terminal)?;
        if !t.edges.contains(&edge) {
            t.edges.push(edge);
        }
        Ok(())
    }

    pub(crate) fn unregister_edge(&mut self, terminal: CellId, edge: CellId) -> Result<()> {
        let t = self.cell_mut(terminal)?;
        t.edges.retain(|&e| e != edge);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Geometry;

    fn vertex(arena: &mut CellArena) -> CellId {
        arena.alloc(Cell::vertex(Geometry::default()))
    }

    #[test]
    fn stale_handle_is_rejected_after_slot_reuse() {
        let mut arena = CellArena::new();
        let a = vertex(&mut arena);
        arena.release(a);
        let b = vertex(&mut arena);
        assert_eq!(a.index, b.index);
        assert!(arena.get(a).is_none());
        assert!(arena.get(b).is_some());
    }

    #[test]
    fn appending_existing_child_moves_it_last() {
        let mut arena = CellArena::new();
        let p = arena.alloc(Cell::new());
        let a = vertex(&mut arena);
        let b = vertex(&mut arena);
        arena.insert_child(p, a, None).unwrap();
        arena.insert_child(p, b, None).unwrap();
        assert_eq!(arena.insert_child(p, a, None).unwrap(), 1);
        assert_eq!(arena.children(p), &[b, a]);
    }

    #[test]
    fn insert_rejects_cycles_without_mutating() {
        let mut arena = CellArena::new();
        let p = arena.alloc(Cell::new());
        let c = arena.alloc(Cell::new());
        arena.insert_child(p, c, None).unwrap();
        assert!(matches!(
            arena.insert_child(c, p, None),
            Err(Error::Cycle { .. })
        ));
        assert_eq!(arena.parent(c), Some(p));
        assert_eq!(arena.parent(p), None);
    }

    #[test]
    fn out_of_range_index_is_an_error() {
        let mut arena = CellArena::new();
        let p = arena.alloc(Cell::new());
        let c = arena.alloc(Cell::new());
        assert_eq!(
            arena.insert_child(p, c, Some(3)),
            Err(Error::IndexOutOfRange { index: 3, len: 0 })
        );
        assert_eq!(arena.child_at(p, 5), None);
    }

    #[test]
    fn loops_need_a_direction() {
        let mut arena = CellArena::new();
        let v = vertex(&mut arena);
        let e = arena.alloc(Cell::edge());
        arena.insert_edge(v, e, true).unwrap();
        arena.insert_edge(v, e, false).unwrap();
        assert_eq!(arena.edges(v, false, false, true), Vec::<CellId>::new());
        assert_eq!(arena.edges(v, true, false, true), vec![e]);
        assert_eq!(arena.edges(v, true, true, false), Vec::<CellId>::new());
    }
}
