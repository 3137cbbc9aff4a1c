//! Nestable update batches and the committed edit they produce.

use crate::cell::CellId;
use crate::change::Change;
use crate::error::{Error, Result};
use crate::model::Model;

/// Open batch state: one mark per nesting level into the shared pending list.
///
/// The depth is the number of marks. A mark records where its level started so a failed inner
/// batch can be rolled back without touching the changes of the levels around it.
#[derive(Debug, Default)]
pub(crate) struct Transaction {
    marks: Vec<usize>,
    pending: Vec<Change>,
}

impl Transaction {
    pub(crate) fn depth(&self) -> usize {
        self.marks.len()
    }

    pub(crate) fn begin(&mut self) {
        self.marks.push(self.pending.len());
    }

    pub(crate) fn push(&mut self, change: Change) {
        debug_assert!(!self.marks.is_empty(), "change recorded outside a batch");
        self.pending.push(change);
    }

    /// Closes one level. Returns the whole pending list when the outermost level closes.
    pub(crate) fn end(&mut self) -> Result<Option<Vec<Change>>> {
        if self.marks.pop().is_none() {
            return Err(Error::NoTransaction);
        }
        if !self.marks.is_empty() {
            return Ok(None);
        }
        Ok(Some(std::mem::take(&mut self.pending)))
    }

    /// Closes one level and hands back the changes recorded since it opened, in execution order.
    pub(crate) fn abort(&mut self) -> Result<Vec<Change>> {
        let Some(mark) = self.marks.pop() else {
            return Err(Error::NoTransaction);
        };
        Ok(self.pending.split_off(mark))
    }
}

/// One committed batch: the ordered changes of an outermost `begin_update`/`end_update` pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Edit {
    changes: Vec<Change>,
    significant: bool,
    undone: bool,
    redone: bool,
}

impl Edit {
    pub fn new(changes: Vec<Change>) -> Self {
        Self {
            changes,
            significant: true,
            undone: false,
            redone: false,
        }
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Insignificant edits are undone together with the next significant one.
    pub fn is_significant(&self) -> bool {
        self.significant
    }

    pub fn set_significant(&mut self, significant: bool) {
        self.significant = significant;
    }

    pub fn is_undone(&self) -> bool {
        self.undone
    }

    pub fn is_redone(&self) -> bool {
        self.redone
    }

    /// Cells touched by the edit, first occurrence order.
    pub fn cells(&self) -> Vec<CellId> {
        let mut out: Vec<CellId> = Vec::with_capacity(self.changes.len());
        for change in &self.changes {
            let cell = change.cell();
            if !out.contains(&cell) {
                out.push(cell);
            }
        }
        out
    }

    /// Re-executes the changes in reverse and notifies the model's listeners.
    pub fn undo(&mut self, model: &mut Model) -> Result<()> {
        if model.is_updating() {
            return Err(Error::TransactionOpen);
        }
        if !self.undone {
            run_all(&mut self.changes, model, true)?;
            self.undone = true;
            self.redone = false;
        }
        model.notify(self);
        Ok(())
    }

    /// Re-executes the changes in order and notifies the model's listeners.
    pub fn redo(&mut self, model: &mut Model) -> Result<()> {
        if model.is_updating() {
            return Err(Error::TransactionOpen);
        }
        if !self.redone {
            run_all(&mut self.changes, model, false)?;
            self.redone = true;
            self.undone = false;
        }
        model.notify(self);
        Ok(())
    }
}

/// Executes every change; if one fails the ones already executed are executed again so the
/// model is back where it started.
fn run_all(changes: &mut [Change], model: &mut Model, reverse: bool) -> Result<()> {
    let order: Vec<usize> = if reverse {
        (0..changes.len()).rev().collect()
    } else {
        (0..changes.len()).collect()
    };
    for (done, &i) in order.iter().enumerate() {
        if let Err(err) = changes[i].execute(model) {
            tracing::warn!(kind = changes[i].kind(), error = %err, "edit replay failed, restoring");
            for &j in order[..done].iter().rev() {
                if let Err(restore) = changes[j].execute(model) {
                    tracing::error!(error = %restore, "failed to restore after partial replay");
                }
            }
            return Err(err);
        }
    }
    Ok(())
}
