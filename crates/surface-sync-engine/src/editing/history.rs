//! Undo and redo built on transaction inverses.
//!
//! Each committed transaction contributes one entry. Undoing an entry runs
//! its inverses as a new transaction; the inverses of *that* transaction
//! become the redo entry, so undo and redo are the same operation pointed at
//! different stacks.

use std::collections::VecDeque;

use log::debug;

use crate::editing::commands::Operation;
use crate::editing::transaction::{TransactionEngine, TransactionResult};
use crate::model::ModelSelection;
use crate::store::NodeStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    /// Inverses in the order the transaction produced them.
    pub inverse_ops: Vec<Operation>,
    /// Selection to restore once the inverses have run.
    pub restore_selection: Option<ModelSelection>,
    /// Selection to restore when the entry moves back the other way.
    pub reapply_selection: Option<ModelSelection>,
}

impl HistoryEntry {
    fn from_result(result: &TransactionResult) -> Self {
        Self {
            inverse_ops: result.inverse_ops.clone(),
            restore_selection: result.selection_before.clone(),
            reapply_selection: result.selection_after.clone(),
        }
    }

    fn operations(&self) -> Vec<Operation> {
        let mut ops: Vec<Operation> = self.inverse_ops.iter().rev().cloned().collect();
        if let Some(selection) = &self.restore_selection {
            ops.push(Operation::SetSelection {
                selection: selection.clone(),
            });
        }
        ops
    }
}

#[derive(Debug, Clone)]
pub struct History {
    undo_stack: VecDeque<HistoryEntry>,
    redo_stack: Vec<HistoryEntry>,
    /// Maximum number of undo levels (0 = unlimited)
    limit: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(100)
    }
}

impl History {
    pub fn new(limit: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            limit,
        }
    }

    /// Records a committed transaction. Failed or empty ones are ignored.
    pub fn record(&mut self, result: &TransactionResult) {
        if !result.success || result.inverse_ops.is_empty() {
            return;
        }
        self.redo_stack.clear();
        self.undo_stack.push_back(HistoryEntry::from_result(result));
        if self.limit > 0 && self.undo_stack.len() > self.limit {
            self.undo_stack.pop_front();
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    /// Reverts the most recent entry. `None` when there is nothing to undo.
    pub fn undo<S: NodeStore>(&mut self, engine: &TransactionEngine<S>) -> Option<TransactionResult> {
        let entry = self.undo_stack.pop_back()?;
        let result = engine.apply(entry.operations());
        if result.success {
            debug!("undo applied {} inverse(s)", entry.inverse_ops.len());
            self.redo_stack.push(Self::flip(&entry, &result));
        } else {
            self.undo_stack.push_back(entry);
        }
        Some(result)
    }

    /// Re-applies the most recently undone entry.
    pub fn redo<S: NodeStore>(&mut self, engine: &TransactionEngine<S>) -> Option<TransactionResult> {
        let entry = self.redo_stack.pop()?;
        let result = engine.apply(entry.operations());
        if result.success {
            debug!("redo applied {} inverse(s)", entry.inverse_ops.len());
            self.undo_stack.push_back(Self::flip(&entry, &result));
        } else {
            self.redo_stack.push(entry);
        }
        Some(result)
    }

    fn flip(entry: &HistoryEntry, result: &TransactionResult) -> HistoryEntry {
        HistoryEntry {
            inverse_ops: result.inverse_ops.clone(),
            restore_selection: entry.reapply_selection.clone(),
            reapply_selection: entry.restore_selection.clone(),
        }
    }
}
