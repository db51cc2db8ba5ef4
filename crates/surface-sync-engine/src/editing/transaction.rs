//! Atomic application of operation lists.
//!
//! A transaction moves `Idle → Running → Committed | RolledBack`. While
//! running it holds the engine's write lock, executes every operation
//! against one overlay and records each operation's inverse. Nothing reaches
//! the store unless every operation applies.

use std::sync::{Mutex, MutexGuard, TryLockError};

use log::{debug, trace, warn};

use crate::editing::commands::{OpOutcome, Operation, TransactionContext, execute};
use crate::error::EngineError;
use crate::model::ModelSelection;
use crate::store::NodeStore;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransactionError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("{operation} rejected: {reason}")]
    Rejected { operation: &'static str, reason: String },
    #[error("vetoed by {extension}: {reason}")]
    Vetoed { extension: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionResult {
    pub success: bool,
    pub selection_before: Option<ModelSelection>,
    pub selection_after: Option<ModelSelection>,
    pub errors: Vec<TransactionError>,
    /// Inverses in execution order; undo applies them back to front.
    pub inverse_ops: Vec<Operation>,
}

impl TransactionResult {
    fn failed(selection: Option<ModelSelection>, error: TransactionError) -> Self {
        Self {
            success: false,
            selection_before: selection.clone(),
            selection_after: selection,
            errors: vec![error],
            inverse_ops: Vec::new(),
        }
    }

    /// The operations that undo this transaction, in the order to run them.
    pub fn undo_ops(&self) -> Vec<Operation> {
        self.inverse_ops.iter().rev().cloned().collect()
    }
}

/// What an extension decided about a pending operation list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intercept {
    Continue(Vec<Operation>),
    Veto(String),
}

/// Hook that sees every operation list before it runs.
pub trait TransactionExtension: Send {
    fn name(&self) -> &str;
    fn intercept(&self, ops: Vec<Operation>) -> Intercept;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Running,
    Committed,
    RolledBack,
}

fn transition(phase: &mut Phase, next: Phase) {
    trace!("transaction {phase:?} -> {next:?}");
    *phase = next;
}

struct EngineState<S> {
    store: S,
    selection: Option<ModelSelection>,
}

/// Owns the store and the model selection; the only writer of either.
pub struct TransactionEngine<S: NodeStore> {
    state: Mutex<EngineState<S>>,
    extensions: Vec<Box<dyn TransactionExtension>>,
}

impl<S: NodeStore> TransactionEngine<S> {
    pub fn new(store: S) -> Self {
        Self {
            state: Mutex::new(EngineState {
                store,
                selection: None,
            }),
            extensions: Vec::new(),
        }
    }

    pub fn with_selection(self, selection: ModelSelection) -> Self {
        self.set_selection(Some(selection));
        self
    }

    pub fn register_extension(&mut self, extension: Box<dyn TransactionExtension>) {
        self.extensions.push(extension);
    }

    /// Read access to the committed store and selection.
    pub fn read<R>(&self, f: impl FnOnce(&S, Option<&ModelSelection>) -> R) -> R {
        let state = self.lock();
        f(&state.store, state.selection.as_ref())
    }

    pub fn selection(&self) -> Option<ModelSelection> {
        self.lock().selection.clone()
    }

    /// Replaces the selection without a transaction (host-driven caret moves).
    pub fn set_selection(&self, selection: Option<ModelSelection>) {
        self.lock().selection = selection;
    }

    pub fn into_store(self) -> S {
        self.state
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .store
    }

    /// Runs `ops` as one transaction.
    ///
    /// Failures never throw: the result carries the errors and the store and
    /// selection are left exactly as they were.
    pub fn apply(&self, ops: Vec<Operation>) -> TransactionResult {
        let mut phase = Phase::Idle;

        let mut ops = ops;
        for extension in &self.extensions {
            match extension.intercept(ops) {
                Intercept::Continue(next) => ops = next,
                Intercept::Veto(reason) => {
                    debug!("transaction vetoed by {}: {reason}", extension.name());
                    return TransactionResult::failed(
                        None,
                        TransactionError::Vetoed {
                            extension: extension.name().to_string(),
                            reason,
                        },
                    );
                }
            }
        }

        let mut guard = match self.state.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                warn!("transaction refused: another transaction is running");
                return TransactionResult::failed(None, EngineError::Busy.into());
            }
        };
        transition(&mut phase, Phase::Running);
        let state = &mut *guard;
        let selection_before = state.selection.clone();

        let outcome = {
            let mut ctx = TransactionContext::new(&state.store, selection_before.clone());
            let mut inverse_ops = Vec::new();
            let mut failure = None;
            for op in &ops {
                ctx.store.begin_journal();
                match execute(&mut ctx, op) {
                    Ok(OpOutcome::Applied) => {
                        let journal = ctx.store.take_journal();
                        if !journal.is_empty() {
                            inverse_ops.push(Operation::Restore {
                                nodes: journal.nodes,
                                annotations: journal.annotations,
                            });
                        }
                    }
                    Ok(OpOutcome::Rejected(reason)) => {
                        failure = Some(TransactionError::Rejected {
                            operation: op.name(),
                            reason,
                        });
                        break;
                    }
                    Err(err) => {
                        failure = Some(err.into());
                        break;
                    }
                }
            }
            match failure {
                Some(error) => Err(error),
                None => {
                    let selection_after = ctx.resolve_selection();
                    Ok((ctx.store.into_changes(), selection_after, inverse_ops))
                }
            }
        };

        match outcome {
            Ok((changes, selection_after, inverse_ops)) => {
                changes.apply_to(&mut state.store);
                state.selection = selection_after.clone();
                transition(&mut phase, Phase::Committed);
                debug!(
                    "committed {} operation(s), {} inverse(s)",
                    ops.len(),
                    inverse_ops.len()
                );
                TransactionResult {
                    success: true,
                    selection_before,
                    selection_after,
                    errors: Vec::new(),
                    inverse_ops,
                }
            }
            Err(error) => {
                transition(&mut phase, Phase::RolledBack);
                match &error {
                    TransactionError::Rejected { .. } => debug!("rolled back: {error}"),
                    _ => warn!("rolled back: {error}"),
                }
                TransactionResult::failed(selection_before, error)
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, EngineState<S>> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ContentRange, MarkKind, MarkRange, Position};
    use crate::store::MemoryStore;
    use crate::tests::{hello_world, init_logging, two_paragraphs};
    use pretty_assertions::assert_eq;

    fn insert(node: &str, offset: usize, text: &str) -> Operation {
        Operation::InsertText {
            at: Position::new(node, offset),
            text: text.to_string(),
        }
    }

    fn text(engine: &TransactionEngine<MemoryStore>, id: &str) -> String {
        engine.read(|store, _| store.text_of(id).unwrap_or_default().to_string())
    }

    #[test]
    fn commit_applies_all_operations() {
        init_logging();
        let engine = TransactionEngine::new(hello_world());
        let result = engine.apply(vec![insert("t1", 0, ">> "), insert("t1", 14, "!")]);

        assert!(result.success);
        assert_eq!(text(&engine, "t1"), ">> Hello World!");
        assert_eq!(result.inverse_ops.len(), 2);
        assert_eq!(engine.selection(), Some(ModelSelection::caret("t1", 15)));
    }

    #[test]
    fn failure_rolls_back_earlier_operations() {
        init_logging();
        let engine =
            TransactionEngine::new(hello_world()).with_selection(ModelSelection::caret("t1", 2));
        let result = engine.apply(vec![insert("t1", 0, "lost "), insert("missing", 0, "x")]);

        assert!(!result.success);
        assert_eq!(
            result.errors,
            vec![TransactionError::Engine(EngineError::NodeNotFound("missing".into()))]
        );
        assert_eq!(text(&engine, "t1"), "Hello World");
        assert_eq!(result.selection_after, Some(ModelSelection::caret("t1", 2)));
        assert_eq!(engine.selection(), Some(ModelSelection::caret("t1", 2)));
    }

    #[test]
    fn rejection_fails_without_error_noise() {
        let engine =
            TransactionEngine::new(two_paragraphs()).with_selection(ModelSelection::caret("t1", 0));
        let result = engine.apply(vec![Operation::DeleteBackward]);

        assert!(!result.success);
        assert!(matches!(
            &result.errors[..],
            [TransactionError::Rejected { operation: "delete_backward", reason }]
                if reason == "already at document start"
        ));
    }

    #[test]
    fn created_block_wins_selection_resolution() {
        let engine = TransactionEngine::new(hello_world());
        let result = engine.apply(vec![
            Operation::SplitBlock {
                at: Position::new("t1", 5),
            },
            Operation::SetSelection {
                selection: ModelSelection::caret("t1", 1),
            },
        ]);

        let after = result.selection_after.unwrap();
        engine.read(|store, _| {
            assert!(store.node(after.focus_node()).unwrap().is_text());
            assert_ne!(after.focus_node(), &"t1".into());
        });
        assert_eq!(after.focus.offset, 0);
    }

    #[test]
    fn undo_ops_restore_text_and_marks() {
        let engine = TransactionEngine::new(hello_world());
        let before = engine.read(|store, _| store.clone());

        let result = engine.apply(vec![
            insert("t1", 6, "New "),
            Operation::AddMark {
                range: ContentRange::within("t1", 0, 5),
                mark: MarkKind::Italic,
            },
        ]);
        engine.read(|store, _| {
            assert_eq!(
                store.node(&"t1".into()).unwrap().marks,
                vec![MarkRange::of(MarkKind::Italic, 0, 5), MarkRange::of(MarkKind::Bold, 10, 15)]
            );
        });

        assert!(engine.apply(result.undo_ops()).success);
        engine.read(|store, _| assert_eq!(store, &before));
    }

    #[test]
    fn undo_of_split_removes_created_nodes() {
        let engine = TransactionEngine::new(hello_world());
        let before = engine.read(|store, _| store.clone());

        let result = engine.apply(vec![Operation::SplitBlock {
            at: Position::new("t1", 5),
        }]);
        assert!(engine.apply(result.undo_ops()).success);

        engine.read(|store, _| assert_eq!(store, &before));
    }

    struct ReadOnly;

    impl TransactionExtension for ReadOnly {
        fn name(&self) -> &str {
            "read-only"
        }

        fn intercept(&self, ops: Vec<Operation>) -> Intercept {
            if ops.iter().all(|op| matches!(op, Operation::SetSelection { .. })) {
                Intercept::Continue(ops)
            } else {
                Intercept::Veto("document is read-only".to_string())
            }
        }
    }

    struct Shout;

    impl TransactionExtension for Shout {
        fn name(&self) -> &str {
            "shout"
        }

        fn intercept(&self, ops: Vec<Operation>) -> Intercept {
            Intercept::Continue(
                ops.into_iter()
                    .map(|op| match op {
                        Operation::InsertText { at, text } => Operation::InsertText {
                            at,
                            text: text.to_uppercase(),
                        },
                        other => other,
                    })
                    .collect(),
            )
        }
    }

    #[test]
    fn extension_can_veto() {
        let mut engine = TransactionEngine::new(hello_world());
        engine.register_extension(Box::new(ReadOnly));

        let result = engine.apply(vec![insert("t1", 0, "x")]);

        assert!(!result.success);
        assert_eq!(
            result.errors,
            vec![TransactionError::Vetoed {
                extension: "read-only".to_string(),
                reason: "document is read-only".to_string(),
            }]
        );
        assert_eq!(text(&engine, "t1"), "Hello World");
    }

    #[test]
    fn extension_can_rewrite_operations() {
        let mut engine = TransactionEngine::new(hello_world());
        engine.register_extension(Box::new(Shout));

        assert!(engine.apply(vec![insert("t1", 0, "hey ")]).success);
        assert_eq!(text(&engine, "t1"), "HEY Hello World");
    }

    #[test]
    fn nested_apply_reports_busy() {
        let engine = TransactionEngine::new(hello_world());
        let nested = engine.read(|_, _| engine.apply(vec![insert("t1", 0, "x")]));

        assert!(!nested.success);
        assert_eq!(nested.errors, vec![TransactionError::Engine(EngineError::Busy)]);
        assert_eq!(text(&engine, "t1"), "Hello World");
    }
}
