use crate::error::{Error, Result};
use crate::model::Model;
use crate::transaction::Edit;

pub const DEFAULT_HISTORY_SIZE: usize = 100;

/// Linear history of committed edits.
///
/// `index_of_next_add` splits the history into the undoable prefix and the redoable suffix.
/// Adding an edit drops the redoable suffix.
#[derive(Debug, Clone)]
pub struct UndoManager {
    size: usize,
    history: Vec<Edit>,
    index_of_next_add: usize,
}

impl Default for UndoManager {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_SIZE)
    }
}

impl UndoManager {
    /// `size` caps the number of kept edits; `0` keeps everything.
    pub fn new(size: usize) -> Self {
        Self {
            size,
            history: Vec::new(),
            index_of_next_add: 0,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn history(&self) -> &[Edit] {
        &self.history
    }

    pub fn clear(&mut self) {
        self.history.clear();
        self.index_of_next_add = 0;
    }

    pub fn can_undo(&self) -> bool {
        self.index_of_next_add > 0
    }

    pub fn can_redo(&self) -> bool {
        self.index_of_next_add < self.history.len()
    }

    pub fn add(&mut self, edit: Edit) {
        self.trim();
        if self.size > 0 && self.history.len() >= self.size {
            self.history.remove(0);
        }
        self.history.push(edit);
        self.index_of_next_add = self.history.len();
    }

    fn trim(&mut self) {
        if self.history.len() > self.index_of_next_add {
            let dropped = self.history.len() - self.index_of_next_add;
            self.history.truncate(self.index_of_next_add);
            tracing::trace!(dropped, "redo history trimmed");
        }
    }

    /// Undoes edits back to and including the most recent significant one. Returns the processed
    /// edits, oldest first.
    pub fn undo(&mut self, model: &mut Model) -> Result<&[Edit]> {
        if model.is_updating() {
            return Err(Error::TransactionOpen);
        }
        let end = self.index_of_next_add;
        while self.index_of_next_add > 0 {
            let i = self.index_of_next_add - 1;
            self.history[i].undo(model)?;
            self.index_of_next_add = i;
            if self.history[i].is_significant() {
                break;
            }
        }
        tracing::debug!(edits = end - self.index_of_next_add, "undo");
        Ok(&self.history[self.index_of_next_add..end])
    }

    /// Redoes edits up to and including the next significant one. Returns the processed edits,
    /// oldest first.
    pub fn redo(&mut self, model: &mut Model) -> Result<&[Edit]> {
        if model.is_updating() {
            return Err(Error::TransactionOpen);
        }
        let start = self.index_of_next_add;
        while self.index_of_next_add < self.history.len() {
            let i = self.index_of_next_add;
            self.history[i].redo(model)?;
            self.index_of_next_add = i + 1;
            if self.history[i].is_significant() {
                break;
            }
        }
        tracing::debug!(edits = self.index_of_next_add - start, "redo");
        Ok(&self.history[start..self.index_of_next_add])
    }
}
