//! The graph model: a cell arena rooted at one cell, mutated only through undoable changes.
//!
//! Structural symmetry lives in the `*_for_cell_changed` setters which [`Change::execute`] calls.
//! The public mutation API wraps every edit in a batch so listeners see exactly one [`Edit`] per
//! outermost `begin_update`/`end_update` pair.

use crate::arena::CellArena;
use crate::cell::{Cell, CellId};
use crate::change::Change;
use crate::error::{Error, Result};
use crate::geometry::{Geometry, Point, point};
use crate::transaction::{Edit, Transaction};
use rustc_hash::FxBuildHasher;
use serde_json::Value;

type HashMap<K, V> = hashbrown::HashMap<K, V, FxBuildHasher>;
type HashSet<T> = hashbrown::HashSet<T, FxBuildHasher>;

#[derive(Debug, Clone)]
pub struct ModelOptions {
    /// Assign ids to cells entering the model without one.
    pub create_ids: bool,
    pub id_prefix: String,
    pub id_postfix: String,
    /// Keep each edge under the nearest common ancestor of its terminals.
    pub maintain_edge_parent: bool,
    /// Climb past terminals with relative geometry (ports) when choosing the edge parent.
    pub ignore_relative_edge_parent: bool,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            create_ids: true,
            id_prefix: String::new(),
            id_postfix: String::new(),
            maintain_edge_parent: true,
            ignore_relative_edge_parent: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub type Listener = Box<dyn FnMut(&Edit)>;

pub struct Model {
    arena: CellArena,
    root: CellId,
    ids: HashMap<String, CellId>,
    next_id: u64,
    options: ModelOptions,
    transaction: Transaction,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: u64,
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("root", &self.root)
            .field("cells", &self.arena.len())
            .field("depth", &self.transaction.depth())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}

impl Model {
    /// A model with a root cell holding one default layer.
    pub fn new() -> Self {
        Self::with_options(ModelOptions::default())
    }

    pub fn with_options(options: ModelOptions) -> Self {
        let mut arena = CellArena::new();
        let root = arena.alloc(Cell::new());
        let layer = arena.alloc(Cell::new());
        if let Some(cell) = arena.get_mut(root) {
            cell.children.push(layer);
        }
        if let Some(cell) = arena.get_mut(layer) {
            cell.parent = Some(root);
        }
        let mut model = Self {
            arena,
            root,
            ids: HashMap::default(),
            next_id: 0,
            options,
            transaction: Transaction::default(),
            listeners: Vec::new(),
            next_listener: 0,
        };
        model.cell_added(root);
        model
    }

    pub fn options(&self) -> &ModelOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut ModelOptions {
        &mut self.options
    }

    pub fn cells(&self) -> &CellArena {
        &self.arena
    }

    pub fn cell(&self, id: CellId) -> Option<&Cell> {
        self.arena.get(id)
    }

    pub(crate) fn ensure_live(&self, id: CellId) -> Result<()> {
        self.arena.cell(id).map(|_| ())
    }

    pub fn root(&self) -> CellId {
        self.root
    }

    /// Allocated cells, in the model or detached.
    pub fn cell_count(&self) -> usize {
        self.arena.len()
    }

    /// First layer of the root, the usual parent for new cells.
    pub fn default_parent(&self) -> CellId {
        self.arena.child_at(self.root, 0).unwrap_or(self.root)
    }

    pub fn cell_by_id(&self, id: &str) -> Option<CellId> {
        self.ids.get(id).copied()
    }

    /// True when `cell` is reachable from the current root.
    pub fn contains(&self, cell: CellId) -> bool {
        self.arena.contains(cell) && self.arena.is_ancestor(self.root, cell)
    }

    pub fn parent(&self, cell: CellId) -> Option<CellId> {
        self.arena.parent(cell)
    }

    pub fn children(&self, cell: CellId) -> &[CellId] {
        self.arena.children(cell)
    }

    pub fn child_count(&self, cell: CellId) -> usize {
        self.arena.child_count(cell)
    }

    pub fn child_at(&self, cell: CellId, index: usize) -> Option<CellId> {
        self.arena.child_at(cell, index)
    }

    pub fn index_of(&self, parent: CellId, child: CellId) -> Option<usize> {
        self.arena.index_of(parent, child)
    }

    pub fn terminal(&self, edge: CellId, is_source: bool) -> Option<CellId> {
        self.arena.terminal(edge, is_source)
    }

    pub fn geometry(&self, cell: CellId) -> Option<&Geometry> {
        self.arena.get(cell)?.geometry()
    }

    pub fn style(&self, cell: CellId) -> Option<&str> {
        self.arena.get(cell)?.style()
    }

    pub fn value(&self, cell: CellId) -> Option<&Value> {
        self.arena.get(cell).map(Cell::value)
    }

    pub fn is_vertex(&self, cell: CellId) -> bool {
        self.arena.get(cell).is_some_and(Cell::is_vertex)
    }

    pub fn is_edge(&self, cell: CellId) -> bool {
        self.arena.get(cell).is_some_and(Cell::is_edge)
    }

    pub fn is_visible(&self, cell: CellId) -> bool {
        self.arena.get(cell).is_some_and(Cell::is_visible)
    }

    pub fn is_collapsed(&self, cell: CellId) -> bool {
        self.arena.get(cell).is_some_and(Cell::is_collapsed)
    }

    pub fn is_connectable(&self, cell: CellId) -> bool {
        self.arena.get(cell).is_some_and(Cell::is_connectable)
    }

    /// A layer is a direct child of the root.
    pub fn is_layer(&self, cell: CellId) -> bool {
        self.parent(cell) == Some(self.root)
    }

    pub fn is_ancestor(&self, parent: CellId, child: CellId) -> bool {
        self.arena.is_ancestor(parent, child)
    }

    pub fn nearest_common_ancestor(&self, a: CellId, b: CellId) -> Option<CellId> {
        self.arena.nearest_common_ancestor(a, b)
    }

    pub fn descendants(&self, cell: CellId) -> Vec<CellId> {
        self.arena.descendants(cell)
    }

    pub fn edges(
        &self,
        cell: CellId,
        incoming: bool,
        outgoing: bool,
        include_loops: bool,
    ) -> Vec<CellId> {
        self.arena.edges(cell, incoming, outgoing, include_loops)
    }

    /// Edges connecting `a` and `b`; with `directed` only those running from `a` to `b`.
    pub fn edges_between(&self, a: CellId, b: CellId, directed: bool) -> Vec<CellId> {
        let Some(cell) = self.arena.get(a) else {
            return Vec::new();
        };
        cell.edges()
            .iter()
            .copied()
            .filter(|&e| {
                let s = self.terminal(e, true);
                let t = self.terminal(e, false);
                (s == Some(a) && t == Some(b)) || (!directed && s == Some(b) && t == Some(a))
            })
            .collect()
    }

    /// Absolute origin of `cell`'s coordinate space: the summed offsets of the cell and its
    /// ancestors. Edges and relative geometries contribute nothing.
    pub fn origin(&self, cell: CellId) -> Point {
        let mut result = point(0.0, 0.0);
        let mut cur = Some(cell);
        while let Some(c) = cur {
            let Some(data) = self.arena.get(c) else {
                break;
            };
            if !data.is_edge() {
                if let Some(geo) = data.geometry().filter(|g| !g.relative) {
                    result.x += geo.x();
                    result.y += geo.y();
                }
            }
            cur = data.parent();
        }
        result
    }

    // ---------------------------------------------------------------------------------------
    // Detached construction.

    /// Allocates a detached cell. It joins the model through [`Model::add`].
    pub fn create(&mut self, cell: Cell) -> CellId {
        self.arena.alloc(cell)
    }

    /// Builds detached subtrees without going through the undo history.
    pub fn insert_detached(
        &mut self,
        parent: CellId,
        child: CellId,
        index: Option<usize>,
    ) -> Result<usize> {
        if self.contains(parent) {
            return Err(Error::Attached(parent));
        }
        if self.contains(child) {
            return Err(Error::Attached(child));
        }
        self.arena.insert_child(parent, child, index)
    }

    /// Points a detached edge at `terminal`. The terminal only lists the edge once the edge is
    /// added to the model.
    pub fn set_detached_terminal(
        &mut self,
        edge: CellId,
        terminal: Option<CellId>,
        is_source: bool,
    ) -> Result<()> {
        if self.contains(edge) {
            return Err(Error::Attached(edge));
        }
        if !self.arena.cell(edge)?.is_edge() {
            return Err(Error::NotAnEdge(edge));
        }
        if let Some(t) = terminal {
            self.arena.cell(t)?;
        }
        self.arena.set_terminal_pointer(edge, terminal, is_source)
    }

    pub fn set_detached_geometry(&mut self, cell: CellId, geometry: Option<Geometry>) -> Result<()> {
        if self.contains(cell) {
            return Err(Error::Attached(cell));
        }
        self.arena.cell_mut(cell)?.geometry = geometry;
        Ok(())
    }

    /// Frees the arena slots of a detached subtree. Handles to it, including those kept by
    /// undo history, become stale.
    pub fn release(&mut self, cell: CellId) -> Result<()> {
        self.arena.cell(cell)?;
        if self.contains(cell) {
            return Err(Error::Attached(cell));
        }
        let subtree = self.arena.descendants(cell);
        for &c in &subtree {
            if let Some(e) = self.arena.get(c).and_then(|data| {
                data.edges()
                    .iter()
                    .copied()
                    .find(|&e| self.contains(e))
            }) {
                tracing::debug!(?c, ?e, "release refused, edge still connected");
                return Err(Error::StillConnected(c));
            }
        }
        self.arena.remove_from_parent(cell)?;
        for c in subtree {
            self.arena.release(c);
        }
        Ok(())
    }

    // ---------------------------------------------------------------------------------------
    // Undoable mutations.

    /// Adds `child` (and its subtree) under `parent`. `None` appends.
    pub fn add(&mut self, parent: CellId, child: CellId, index: Option<usize>) -> Result<()> {
        if parent == child {
            return Err(Error::Cycle { parent, child });
        }
        self.arena.cell(parent)?;
        let previous_parent = self.arena.cell(child)?.parent();
        let index = match index {
            Some(i) => i,
            None => {
                let len = self.child_count(parent);
                if previous_parent == Some(parent) {
                    len - 1
                } else {
                    len
                }
            }
        };
        self.batch(|m| {
            m.execute(Change::Child {
                child,
                parent: Some(parent),
                index,
            })?;
            if m.options.maintain_edge_parent && previous_parent != Some(parent) {
                let root = m.arena.root_of(child);
                m.update_edge_parents(child, root)?;
            }
            Ok(())
        })
    }

    /// Removes `cell` and its subtree from the model. Edges outside the subtree that end on it
    /// are disconnected first, edges inside keep their terminal pointers for a later re-add.
    pub fn remove(&mut self, cell: CellId) -> Result<()> {
        self.arena.cell(cell)?;
        if cell == self.root {
            return Err(Error::Invariant("the root cell cannot be removed".to_string()));
        }
        if self.parent(cell).is_none() {
            return Ok(());
        }
        self.batch(|m| {
            let subtree = m.arena.descendants(cell);
            let inside: HashSet<CellId> = subtree.iter().copied().collect();
            let mut severed: Vec<(CellId, bool)> = Vec::new();
            for &c in &subtree {
                let Some(data) = m.arena.get(c) else {
                    continue;
                };
                for &e in data.edges() {
                    if inside.contains(&e) || !m.contains(e) {
                        continue;
                    }
                    for is_source in [true, false] {
                        if m.terminal(e, is_source) == Some(c) && !severed.contains(&(e, is_source))
                        {
                            severed.push((e, is_source));
                        }
                    }
                }
            }
            for (edge, is_source) in severed {
                m.execute(Change::Terminal {
                    edge,
                    terminal: None,
                    is_source,
                })?;
            }
            m.execute(Change::Child {
                child: cell,
                parent: None,
                index: 0,
            })
        })
    }

    pub fn set_root(&mut self, root: CellId) -> Result<()> {
        self.arena.cell(root)?;
        if root == self.root {
            return Ok(());
        }
        self.execute(Change::Root { root })
    }

    pub fn set_terminal(
        &mut self,
        edge: CellId,
        terminal: Option<CellId>,
        is_source: bool,
    ) -> Result<()> {
        let changed = self.arena.cell(edge)?.terminal(is_source) != terminal;
        self.batch(|m| {
            m.execute(Change::Terminal {
                edge,
                terminal,
                is_source,
            })?;
            if m.options.maintain_edge_parent && changed {
                let root = m.root;
                m.update_edge_parent(edge, root)?;
            }
            Ok(())
        })
    }

    pub fn set_terminals(
        &mut self,
        edge: CellId,
        source: Option<CellId>,
        target: Option<CellId>,
    ) -> Result<()> {
        self.batch(|m| {
            m.set_terminal(edge, source, true)?;
            m.set_terminal(edge, target, false)
        })
    }

    pub fn set_geometry(&mut self, cell: CellId, geometry: Option<Geometry>) -> Result<()> {
        if self.arena.cell(cell)?.geometry.as_ref() == geometry.as_ref() {
            return Ok(());
        }
        self.execute(Change::Geometry { cell, geometry })
    }

    pub fn set_style(&mut self, cell: CellId, style: Option<String>) -> Result<()> {
        if self.arena.cell(cell)?.style == style {
            return Ok(());
        }
        self.execute(Change::Style { cell, style })
    }

    pub fn set_value(&mut self, cell: CellId, value: Value) -> Result<()> {
        if self.arena.cell(cell)?.value == value {
            return Ok(());
        }
        self.execute(Change::Value { cell, value })
    }

    pub fn set_collapsed(&mut self, cell: CellId, collapsed: bool) -> Result<()> {
        if self.arena.cell(cell)?.collapsed == collapsed {
            return Ok(());
        }
        self.execute(Change::Collapsed { cell, collapsed })
    }

    pub fn set_visible(&mut self, cell: CellId, visible: bool) -> Result<()> {
        if self.arena.cell(cell)?.visible == visible {
            return Ok(());
        }
        self.execute(Change::Visible { cell, visible })
    }

    /// Executes `change` and records it in the current batch (opening a single-change batch
    /// when none is open).
    pub fn execute(&mut self, mut change: Change) -> Result<()> {
        change.execute(self)?;
        self.begin_update();
        self.transaction.push(change);
        self.end_update().map(|_| ())
    }

    // ---------------------------------------------------------------------------------------
    // Transactions.

    pub fn is_updating(&self) -> bool {
        self.transaction.depth() > 0
    }

    pub fn update_depth(&self) -> usize {
        self.transaction.depth()
    }

    pub fn begin_update(&mut self) {
        self.transaction.begin();
        tracing::trace!(depth = self.transaction.depth(), "begin update");
    }

    /// Closes one batch level. When the outermost level closes and something changed, the
    /// listeners are notified once and the committed edit is returned.
    pub fn end_update(&mut self) -> Result<Option<Edit>> {
        let Some(changes) = self.transaction.end()? else {
            return Ok(None);
        };
        if changes.is_empty() {
            return Ok(None);
        }
        tracing::debug!(changes = changes.len(), "commit");
        debug_assert!(
            self.check_invariants().is_ok(),
            "model invariants broken after commit: {:?}",
            self.check_invariants()
        );
        let edit = Edit::new(changes);
        self.notify(&edit);
        Ok(Some(edit))
    }

    /// Closes one batch level, reverting every change executed since its `begin_update`.
    /// Nothing is notified for the reverted changes.
    pub fn abort_update(&mut self) -> Result<()> {
        let mut changes = self.transaction.abort()?;
        tracing::debug!(
            changes = changes.len(),
            depth = self.transaction.depth(),
            "rolling back batch"
        );
        for change in changes.iter_mut().rev() {
            change.execute(self)?;
        }
        Ok(())
    }

    /// Runs `f` inside a batch. On error the batch is rolled back and the error returned.
    pub fn batch<R>(&mut self, f: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
        self.begin_update();
        match f(self) {
            Ok(value) => {
                self.end_update()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = self.abort_update() {
                    tracing::error!(error = %rollback, "rollback failed");
                }
                Err(err)
            }
        }
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&Edit) + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(l, _)| *l != id);
        before != self.listeners.len()
    }

    pub(crate) fn notify(&mut self, edit: &Edit) {
        for (_, listener) in &mut self.listeners {
            listener(edit);
        }
    }

    // ---------------------------------------------------------------------------------------
    // Setters behind the changes. Each validates before mutating and returns the old value.

    pub(crate) fn root_changed(&mut self, root: CellId) -> Result<CellId> {
        self.arena.cell(root)?;
        let previous = self.root;
        self.root = root;
        self.ids.clear();
        self.next_id = 0;
        self.cell_added(root);
        Ok(previous)
    }

    pub(crate) fn parent_for_cell_changed(
        &mut self,
        child: CellId,
        parent: Option<CellId>,
        index: usize,
    ) -> Result<(Option<CellId>, usize)> {
        let previous = self.arena.cell(child)?.parent();
        let previous_index = previous
            .and_then(|p| self.arena.index_of(p, child))
            .unwrap_or(0);
        let was_in = self.contains(child);
        let will_be_in = match parent {
            Some(p) => {
                self.arena.cell(p)?;
                if self.arena.is_ancestor(child, p) {
                    return Err(Error::Cycle { parent: p, child });
                }
                let len = self.arena.child_count(p);
                let max = if previous == Some(p) { len - 1 } else { len };
                if index > max {
                    return Err(Error::IndexOutOfRange { index, len: max });
                }
                self.contains(p)
            }
            None => false,
        };

        if will_be_in && !was_in {
            self.ensure_terminals_live(child)?;
        }
        if was_in && !will_be_in {
            self.connect_subtree(child, false)?;
        }

        match parent {
            Some(p) => {
                if previous != Some(p) || previous_index != index {
                    self.arena.insert_child(p, child, Some(index))?;
                }
            }
            None => {
                self.arena.remove_from_parent(child)?;
            }
        }

        if will_be_in && !was_in {
            self.connect_subtree(child, true)?;
            self.cell_added(child);
        } else if was_in && !will_be_in {
            self.cell_removed(child);
        }
        Ok((previous, previous_index))
    }

    pub(crate) fn terminal_for_cell_changed(
        &mut self,
        edge: CellId,
        terminal: Option<CellId>,
        is_source: bool,
    ) -> Result<Option<CellId>> {
        let data = self.arena.cell(edge)?;
        if !data.is_edge() {
            return Err(Error::NotAnEdge(edge));
        }
        let previous = data.terminal(is_source);
        let other_end = data.terminal(!is_source);
        if let Some(t) = terminal {
            self.arena.cell(t)?;
        }
        if self.contains(edge) {
            if let Some(p) = previous.filter(|&p| other_end != Some(p) && self.arena.contains(p)) {
                self.arena.unregister_edge(p, edge)?;
            }
            self.arena.set_terminal_pointer(edge, terminal, is_source)?;
            if let Some(t) = terminal {
                self.arena.register_edge(t, edge)?;
            }
        } else {
            self.arena.set_terminal_pointer(edge, terminal, is_source)?;
        }
        Ok(previous)
    }

    pub(crate) fn geometry_for_cell_changed(
        &mut self,
        cell: CellId,
        geometry: Option<Geometry>,
    ) -> Result<Option<Geometry>> {
        let data = self.arena.cell_mut(cell)?;
        Ok(std::mem::replace(&mut data.geometry, geometry))
    }

    pub(crate) fn style_for_cell_changed(
        &mut self,
        cell: CellId,
        style: Option<String>,
    ) -> Result<Option<String>> {
        let data = self.arena.cell_mut(cell)?;
        Ok(std::mem::replace(&mut data.style, style))
    }

    pub(crate) fn value_for_cell_changed(&mut self, cell: CellId, value: Value) -> Result<Value> {
        let data = self.arena.cell_mut(cell)?;
        Ok(std::mem::replace(&mut data.value, value))
    }

    pub(crate) fn collapsed_state_for_cell_changed(
        &mut self,
        cell: CellId,
        collapsed: bool,
    ) -> Result<bool> {
        let data = self.arena.cell_mut(cell)?;
        Ok(std::mem::replace(&mut data.collapsed, collapsed))
    }

    pub(crate) fn visible_state_for_cell_changed(
        &mut self,
        cell: CellId,
        visible: bool,
    ) -> Result<bool> {
        let data = self.arena.cell_mut(cell)?;
        Ok(std::mem::replace(&mut data.visible, visible))
    }

    fn ensure_terminals_live(&self, cell: CellId) -> Result<()> {
        for c in self.arena.descendants(cell) {
            let Some(data) = self.arena.get(c) else {
                continue;
            };
            for t in [data.source(), data.target()].into_iter().flatten() {
                if !self.arena.contains(t) {
                    return Err(Error::StaleCell(t));
                }
            }
        }
        Ok(())
    }

    /// Registers (or unregisters) every edge of the subtree with its terminals. Terminal
    /// pointers are left alone so a detached subtree can be reconnected later.
    fn connect_subtree(&mut self, cell: CellId, connect: bool) -> Result<()> {
        for c in self.arena.descendants(cell) {
            let Some(data) = self.arena.get(c) else {
                continue;
            };
            if !data.is_edge() {
                continue;
            }
            for t in [data.source(), data.target()].into_iter().flatten() {
                if !self.arena.contains(t) {
                    continue;
                }
                if connect {
                    self.arena.register_edge(t, c)?;
                } else {
                    self.arena.unregister_edge(t, c)?;
                }
            }
        }
        Ok(())
    }

    fn create_id(&mut self) -> String {
        let id = format!(
            "{}{}{}",
            self.options.id_prefix, self.next_id, self.options.id_postfix
        );
        self.next_id += 1;
        id
    }

    /// Registers ids for a subtree that entered the model, renaming on collision.
    fn cell_added(&mut self, cell: CellId) {
        for c in self.arena.descendants(cell) {
            let existing = self.arena.get(c).and_then(|d| d.id.clone());
            let mut id = match existing {
                Some(id) => id,
                None if self.options.create_ids => self.create_id(),
                None => continue,
            };
            loop {
                match self.ids.get(&id) {
                    Some(&other) if other != c => id = self.create_id(),
                    _ => break,
                }
            }
            if let Ok(n) = id.parse::<u64>() {
                self.next_id = self.next_id.max(n + 1);
            }
            if let Some(data) = self.arena.get_mut(c) {
                data.id = Some(id.clone());
            }
            self.ids.insert(id, c);
        }
    }

    fn cell_removed(&mut self, cell: CellId) {
        for c in self.arena.descendants(cell) {
            let Some(id) = self.arena.get(c).and_then(|d| d.id.clone()) else {
                continue;
            };
            if self.ids.get(&id) == Some(&c) {
                self.ids.remove(&id);
            }
        }
    }

    // ---------------------------------------------------------------------------------------
    // Edge parents.

    /// Moves every edge connected to the subtree of `cell` under the nearest common ancestor
    /// of its terminals.
    pub fn update_edge_parents(&mut self, cell: CellId, root: CellId) -> Result<()> {
        let children = self.children(cell).to_vec();
        for child in children {
            self.update_edge_parents(child, root)?;
        }
        let edges = self
            .arena
            .get(cell)
            .map(|d| d.edges().to_vec())
            .unwrap_or_default();
        for edge in edges {
            if self.arena.is_ancestor(root, edge) {
                self.update_edge_parent(edge, root)?;
            }
        }
        Ok(())
    }

    pub fn update_edge_parent(&mut self, edge: CellId, root: CellId) -> Result<()> {
        let source = self.non_relative_terminal(edge, true);
        let target = self.non_relative_terminal(edge, false);
        let (Some(source), Some(target)) = (source, target) else {
            return Ok(());
        };
        if !self.arena.is_ancestor(root, source) || !self.arena.is_ancestor(root, target) {
            return Ok(());
        }
        let cell = if source == target {
            self.parent(source)
        } else {
            self.nearest_common_ancestor(source, target)
        };
        let Some(cell) = cell else {
            return Ok(());
        };
        if (self.parent(cell) == Some(self.root) && !self.arena.is_ancestor(cell, edge))
            || self.parent(edge) == Some(cell)
            || self.arena.is_ancestor(edge, cell)
        {
            return Ok(());
        }
        if let Some(mut geo) = self.geometry(edge).cloned() {
            let from = self.parent(edge).map(|p| self.origin(p)).unwrap_or_default();
            let to = self.origin(cell);
            geo.translate(from.x - to.x, from.y - to.y);
            self.set_geometry(edge, Some(geo))?;
        }
        tracing::trace!(?edge, parent = ?cell, "edge parent updated");
        self.add(cell, edge, None)
    }

    fn non_relative_terminal(&self, edge: CellId, is_source: bool) -> Option<CellId> {
        let mut cur = self.terminal(edge, is_source);
        while let Some(t) = cur {
            let data = self.arena.get(t)?;
            let relative = data.geometry().is_some_and(|g| g.relative);
            if data.is_edge() || !relative || !self.options.ignore_relative_edge_parent {
                break;
            }
            cur = data.parent();
        }
        cur
    }

    // ---------------------------------------------------------------------------------------

    /// Verifies the structural invariants of everything reachable from the root: child lists and
    /// parent pointers agree, and every attached edge is listed by exactly its terminals.
    pub fn check_invariants(&self) -> Result<()> {
        let reachable = self.arena.descendants(self.root);
        let mut seen: HashSet<CellId> = HashSet::default();
        for &c in &reachable {
            if !seen.insert(c) {
                return Err(Error::Invariant(format!("{c:?} reachable twice")));
            }
            let Some(data) = self.arena.get(c) else {
                continue;
            };
            for &child in data.children() {
                if self.parent(child) != Some(c) {
                    return Err(Error::Invariant(format!(
                        "{child:?} listed by {c:?} but parented elsewhere"
                    )));
                }
            }
            if data.is_edge() {
                for is_source in [true, false] {
                    if let Some(t) = data.terminal(is_source) {
                        let listed = self
                            .arena
                            .get(t)
                            .is_some_and(|td| td.edges().contains(&c));
                        if !listed {
                            return Err(Error::Invariant(format!(
                                "{c:?} points at {t:?} which does not list it"
                            )));
                        }
                    }
                }
            }
            for &e in data.edges() {
                if !self.contains(e) {
                    continue;
                }
                let s = self.terminal(e, true);
                let t = self.terminal(e, false);
                if s != Some(c) && t != Some(c) {
                    return Err(Error::Invariant(format!(
                        "{c:?} lists {e:?} which does not point at it"
                    )));
                }
            }
        }
        Ok(())
    }
}
