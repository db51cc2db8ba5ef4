//! The single entry point between host events and the model.
//!
//! The coordinator owns every piece of per-editor input state: the
//! reentrancy phase, the pending hint, composition, the active node, undo
//! history, outgoing events and the last debug record. Host adapters feed it
//! pre-commit intents, mutation batches and selection changes; it decides
//! what reaches the transaction engine.

use std::collections::VecDeque;

use log::{debug, trace, warn};
use surface_sync_config::Config;

use crate::editing::run_index::{RunIndex, RunIndexOptions};
use crate::editing::{
    DiffOptions, History, Operation, SurfaceSelection, TransactionEngine, TransactionResult,
    diff_with, to_model,
};
use crate::input::classify::{
    ChangeCase, ClassifiedChange, ClassifyContext, MarkAction, StructureShape, classify,
};
use crate::input::debug::{DebugStatus, InputDebug};
use crate::input::events::EditorEvent;
use crate::input::hint::{HintTracker, InputHint};
use crate::input::intent::{InputIntent, InputType};
use crate::model::{ContentRange, ModelSelection, NodeGroup, NodeId, Span};
use crate::store::NodeStore;
use crate::surface::{MutationRecord, SurfaceTree};

/// Who is currently writing to the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReentrancyPhase {
    #[default]
    Idle,
    /// The engine is applying a model change.
    ApplyingModelChange,
    /// The renderer is writing the model back to the surface.
    Rendering,
}

/// What the host should do with its native edit after `before_input`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentOutcome {
    /// Let the host edit; the result is observed as mutations.
    PassThrough,
    /// Applied to the model already; the host must cancel its native edit.
    Handled(TransactionResult),
    /// Nothing to do.
    Ignored,
}

/// Operations for one batch plus how the surface relates to the result.
struct Plan {
    ops: Vec<Operation>,
    skip_render: bool,
    applied_range: Option<ContentRange>,
}

pub struct InputCoordinator<S: NodeStore> {
    engine: TransactionEngine<S>,
    history: History,
    hints: HintTracker,
    phase: ReentrancyPhase,
    active_node: Option<NodeId>,
    composing: bool,
    events: VecDeque<EditorEvent>,
    last_debug: Option<InputDebug>,
    diff_options: DiffOptions,
    drop_inactive_node_changes: bool,
    record_input_debug: bool,
}

impl<S: NodeStore> InputCoordinator<S> {
    pub fn new(store: S, config: &Config) -> Self {
        Self::with_engine(TransactionEngine::new(store), config)
    }

    /// Wraps an engine that may already carry extensions and a selection.
    pub fn with_engine(engine: TransactionEngine<S>, config: &Config) -> Self {
        let active_node = engine.selection().map(|selection| selection.focus.node_id);
        Self {
            engine,
            history: History::new(config.input.history_limit),
            hints: HintTracker::new(config.input.hint_ttl()),
            phase: ReentrancyPhase::Idle,
            active_node,
            composing: false,
            events: VecDeque::new(),
            last_debug: None,
            diff_options: DiffOptions::from(&config.diff),
            drop_inactive_node_changes: config.input.drop_inactive_node_changes,
            record_input_debug: config.debug.record_input_debug,
        }
    }

    pub fn engine(&self) -> &TransactionEngine<S> {
        &self.engine
    }

    pub fn selection(&self) -> Option<ModelSelection> {
        self.engine.selection()
    }

    pub fn phase(&self) -> ReentrancyPhase {
        self.phase
    }

    pub fn active_node(&self) -> Option<&NodeId> {
        self.active_node.as_ref()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn pending_hint(&self) -> Option<&InputHint> {
        self.hints.peek()
    }

    pub fn last_input_debug(&self) -> Option<&InputDebug> {
        self.last_debug.as_ref()
    }

    pub fn drain_events(&mut self) -> Vec<EditorEvent> {
        self.events.drain(..).collect()
    }

    pub fn composition_start(&mut self) {
        self.composing = true;
    }

    pub fn composition_end(&mut self) {
        self.composing = false;
    }

    pub fn is_composing(&self) -> bool {
        self.composing
    }

    /// Marks the renderer as writing; batches it causes are dropped.
    ///
    /// Returns `false` (and changes nothing) unless the coordinator is idle.
    pub fn enter_render(&mut self) -> bool {
        if self.phase != ReentrancyPhase::Idle {
            return false;
        }
        self.transition(ReentrancyPhase::Rendering);
        true
    }

    pub fn exit_render(&mut self) {
        if self.phase == ReentrancyPhase::Rendering {
            self.transition(ReentrancyPhase::Idle);
        }
    }

    /// Replaces the model selection from the host side.
    pub fn set_selection(&mut self, selection: Option<ModelSelection>) {
        let old_selection = self.engine.selection();
        if old_selection == selection {
            return;
        }
        self.engine.set_selection(selection.clone());
        if let Some(selection) = &selection {
            self.active_node = Some(selection.focus.node_id.clone());
        }
        self.events.push_back(EditorEvent::SelectionChanged {
            selection,
            old_selection,
        });
    }

    /// Tracks a selection change the host reported.
    pub fn on_surface_selection<T: SurfaceTree + ?Sized>(
        &mut self,
        surface: &T,
        selection: &SurfaceSelection,
    ) {
        if self.phase != ReentrancyPhase::Idle {
            trace!("ignoring selection change while {:?}", self.phase);
            return;
        }
        let model = self.engine.read(|store, _| to_model(surface, store, selection));
        match model {
            Some(model) => self.set_selection(Some(model)),
            None => debug!("surface selection has no model counterpart"),
        }
    }

    /// Handles a pre-commit intent.
    ///
    /// Hintable intents leave a hint and pass through; structural, delete,
    /// history and format intents are applied to the model immediately.
    pub fn before_input<T: SurfaceTree + ?Sized>(
        &mut self,
        surface: &T,
        intent: &InputIntent,
    ) -> IntentOutcome {
        if self.phase != ReentrancyPhase::Idle {
            trace!("ignoring {} while {:?}", intent.input_type, self.phase);
            return IntentOutcome::Ignored;
        }

        let target = match &intent.target_range {
            Some(target) => self
                .engine
                .read(|store, _| to_model(surface, store, target))
                .map(|selection| selection.range()),
            None => self.engine.selection().map(|selection| selection.range()),
        };

        if intent.input_type.is_hintable() {
            if let Some(range) = target {
                self.hints
                    .capture(intent.input_type.clone(), range, intent.data.clone());
            }
            return IntentOutcome::PassThrough;
        }
        self.hints.clear();

        match &intent.input_type {
            InputType::HistoryUndo => return self.undo(),
            InputType::HistoryRedo => return self.redo(),
            InputType::Other(_) => return IntentOutcome::PassThrough,
            _ => {}
        }

        let Some(range) = target else {
            debug!("{} without a selection", intent.input_type);
            return IntentOutcome::Ignored;
        };
        let ops = match intent_operations(&intent.input_type, range) {
            Some(ops) => ops,
            None => return IntentOutcome::Ignored,
        };
        let result = self.apply(ops);
        if result.success {
            self.committed(&result, false, None);
        }
        IntentOutcome::Handled(result)
    }

    pub fn undo(&mut self) -> IntentOutcome {
        let selection_before = self.engine.selection();
        self.transition(ReentrancyPhase::ApplyingModelChange);
        let result = self.history.undo(&self.engine);
        self.transition(ReentrancyPhase::Idle);
        self.history_outcome(result, selection_before)
    }

    pub fn redo(&mut self) -> IntentOutcome {
        let selection_before = self.engine.selection();
        self.transition(ReentrancyPhase::ApplyingModelChange);
        let result = self.history.redo(&self.engine);
        self.transition(ReentrancyPhase::Idle);
        self.history_outcome(result, selection_before)
    }

    /// Reconciles one batch of observed surface mutations.
    ///
    /// Returns the transaction when one ran. Batches arriving while the
    /// engine or the renderer writes to the surface are dropped.
    pub fn handle_mutations<T: SurfaceTree + ?Sized>(
        &mut self,
        surface: &T,
        mutations: &[MutationRecord],
    ) -> Option<TransactionResult> {
        if self.phase != ReentrancyPhase::Idle {
            trace!("dropping {} mutation(s) while {:?}", mutations.len(), self.phase);
            return None;
        }
        if mutations.is_empty() {
            return None;
        }

        let selection = self.engine.selection();
        let hint = self.hints.validate(self.composing).cloned();
        let ctx = ClassifyContext {
            selection: selection.as_ref(),
            hint: hint.as_ref(),
            is_composing: self.composing,
        };
        let change = self
            .engine
            .read(|store, _| classify(surface, store, mutations, &ctx));

        let mut debug = InputDebug::new(change.case);
        debug.input_type = hint.as_ref().map(|hint| hint.input_type.clone());
        debug.used_input_hint = change.metadata.used_hint;
        debug.classified_content_range = change.content_range.clone();

        if let Some(active) = &self.active_node
            && self.drop_inactive_node_changes
            && !touches_node(&change, active)
        {
            debug.skip(format!("change outside active node {active}"));
            debug!("dropping {:?} change outside active node {active}", change.case);
            self.record_debug(debug);
            return None;
        }

        let plan = match change.case {
            ChangeCase::C1 => self.plan_single_node(&change, selection.as_ref(), &mut debug),
            ChangeCase::C2 => plan_cross_node(&self.engine, &change, &mut debug),
            ChangeCase::C3 => {
                Some(self.plan_structure(surface, &change, selection.as_ref(), &mut debug))
            }
            ChangeCase::C4 => Some(plan_marks(&self.engine, &change, &mut debug)),
            ChangeCase::ImeIntermediate => return None,
            ChangeCase::Unknown => {
                debug.skip("unclassified mutation batch");
                self.record_debug(debug);
                return None;
            }
        };
        let Some(plan) = plan.filter(|plan| !plan.ops.is_empty()) else {
            debug.skip("nothing to apply");
            self.record_debug(debug);
            return None;
        };

        debug.applied_content_range = plan.applied_range;
        let result = self.apply(plan.ops);
        if result.success {
            self.hints.clear();
            self.committed(&result, plan.skip_render, Some(debug));
        } else {
            let reasons: Vec<String> = result.errors.iter().map(ToString::to_string).collect();
            debug.skip(format!("transaction failed: {}", reasons.join("; ")));
            self.record_debug(debug);
        }
        Some(result)
    }

    fn plan_single_node(
        &self,
        change: &ClassifiedChange,
        selection: Option<&ModelSelection>,
        debug: &mut InputDebug,
    ) -> Option<Plan> {
        let node_id = change.node_id.as_ref()?;
        let prev = change.prev_text.as_deref()?;
        let new = change.new_text.as_deref()?;

        let (offset, length) = match (&change.content_range, selection) {
            (Some(hinted), _) => (hinted.start_offset, hinted.end_offset - hinted.start_offset),
            (None, Some(selection)) if selection.range().spans_nodes(node_id, node_id) => {
                let range = selection.range();
                let start = range.start_offset.min(range.end_offset);
                (start, range.start_offset.max(range.end_offset) - start)
            }
            _ => (0, 0),
        };

        let changes = diff_with(prev, new, offset, length, &self.diff_options);
        let text_change = changes.into_iter().next()?;
        let range = ContentRange::within(node_id.clone(), text_change.start, text_change.end);

        if let Some(hinted) = &change.content_range
            && hinted != &range
        {
            warn!(
                "hint range {}..{} disagrees with diff range {}..{} in {node_id}",
                hinted.start_offset, hinted.end_offset, range.start_offset, range.end_offset
            );
            debug.status = DebugStatus::Mismatch;
            debug.note("hint range disagreed with the diff");
        }
        if text_change.confidence < 1.0 {
            debug.note(format!("ambiguous diff, confidence {}", text_change.confidence));
        }

        Some(Plan {
            ops: vec![Operation::ReplaceText {
                range: range.clone(),
                text: text_change.text,
            }],
            skip_render: true,
            applied_range: Some(range),
        })
    }

    fn plan_structure<T: SurfaceTree + ?Sized>(
        &self,
        surface: &T,
        change: &ClassifiedChange,
        selection: Option<&ModelSelection>,
        debug: &mut InputDebug,
    ) -> Plan {
        let shape = change.metadata.structure.as_ref().map(|structure| structure.shape);
        let structural = match (shape, selection) {
            (Some(StructureShape::Split), Some(selection)) => {
                let range = selection.range();
                let mut ops = Vec::new();
                if !range.is_collapsed() {
                    ops.push(Operation::DeleteText {
                        range: range.clone(),
                    });
                }
                ops.push(Operation::SplitBlock { at: range.start() });
                Some(ops)
            }
            (Some(StructureShape::Merge), _) => self.merge_operation(change),
            _ => None,
        };

        match structural {
            Some(ops) => Plan {
                ops,
                skip_render: false,
                applied_range: None,
            },
            None => {
                debug.note("structure change reconciled as text only");
                Plan {
                    ops: self.engine.read(|store, _| {
                        text_only_operations(surface, store, &self.diff_options)
                    }),
                    skip_render: false,
                    applied_range: None,
                }
            }
        }
    }

    /// `MergeBlocks` folding the first removed block into the block before it.
    fn merge_operation(&self, change: &ClassifiedChange) -> Option<Vec<Operation>> {
        let structure = change.metadata.structure.as_ref()?;
        self.engine.read(|store, _| {
            let second = structure
                .removed
                .iter()
                .find(|id| matches!(store.group_of(id), Ok(NodeGroup::Block)))?;
            let first_text = store.first_text_descendant(second)?;
            let previous = store.previous_text_node(&first_text)?;
            let first = store.block_of(&previous).ok()?;
            Some(vec![Operation::MergeBlocks {
                first,
                second: second.clone(),
            }])
        })
    }

    fn apply(&mut self, ops: Vec<Operation>) -> TransactionResult {
        self.transition(ReentrancyPhase::ApplyingModelChange);
        let result = self.engine.apply(ops);
        self.transition(ReentrancyPhase::Idle);
        result
    }

    fn committed(
        &mut self,
        result: &TransactionResult,
        skip_render: bool,
        input_debug: Option<InputDebug>,
    ) {
        self.history.record(result);
        if let Some(selection) = &result.selection_after {
            self.active_node = Some(selection.focus.node_id.clone());
        }
        let input_debug = input_debug.filter(|_| self.record_input_debug);
        if let Some(debug) = &input_debug {
            self.last_debug = Some(debug.clone());
        }
        self.events.push_back(EditorEvent::ContentChanged {
            skip_render,
            transaction: result.clone(),
            input_debug,
        });
        if result.selection_after != result.selection_before {
            self.events.push_back(EditorEvent::SelectionChanged {
                selection: result.selection_after.clone(),
                old_selection: result.selection_before.clone(),
            });
        }
    }

    fn history_outcome(
        &mut self,
        result: Option<TransactionResult>,
        selection_before: Option<ModelSelection>,
    ) -> IntentOutcome {
        let Some(result) = result else {
            return IntentOutcome::Ignored;
        };
        if result.success {
            if let Some(selection) = &result.selection_after {
                self.active_node = Some(selection.focus.node_id.clone());
            }
            self.events.push_back(EditorEvent::ContentChanged {
                skip_render: false,
                transaction: result.clone(),
                input_debug: None,
            });
            if result.selection_after != selection_before {
                self.events.push_back(EditorEvent::SelectionChanged {
                    selection: result.selection_after.clone(),
                    old_selection: selection_before,
                });
            }
        }
        IntentOutcome::Handled(result)
    }

    fn record_debug(&mut self, debug: InputDebug) {
        if self.record_input_debug {
            self.last_debug = Some(debug);
        }
    }

    fn transition(&mut self, next: ReentrancyPhase) {
        trace!("input phase {:?} -> {next:?}", self.phase);
        self.phase = next;
    }

    pub fn into_store(self) -> S {
        self.engine.into_store()
    }
}

/// Operations for intents applied before the surface changes.
fn intent_operations(input_type: &InputType, range: ContentRange) -> Option<Vec<Operation>> {
    let collapsed = range.is_collapsed();
    let ops = match input_type {
        InputType::InsertParagraph => {
            let at = range.start();
            if collapsed {
                vec![Operation::SplitBlock { at }]
            } else {
                vec![Operation::DeleteText { range }, Operation::SplitBlock { at }]
            }
        }
        InputType::InsertLineBreak => vec![Operation::ReplaceText {
            range,
            text: "\n".to_string(),
        }],
        InputType::DeleteContentBackward | InputType::DeleteWordBackward if collapsed => {
            vec![Operation::DeleteBackward]
        }
        InputType::DeleteContentForward | InputType::DeleteWordForward if collapsed => {
            vec![Operation::DeleteForward]
        }
        InputType::DeleteContentBackward
        | InputType::DeleteContentForward
        | InputType::DeleteWordBackward
        | InputType::DeleteWordForward
        | InputType::DeleteByCut
        | InputType::DeleteByDrag => {
            if collapsed {
                return None;
            }
            vec![Operation::DeleteText { range }]
        }
        other => {
            let mark = other.format_mark()?;
            if collapsed {
                return None;
            }
            vec![Operation::ToggleMark { range, mark }]
        }
    };
    Some(ops)
}

fn plan_cross_node<S: NodeStore>(
    engine: &TransactionEngine<S>,
    change: &ClassifiedChange,
    debug: &mut InputDebug,
) -> Option<Plan> {
    let range = change.content_range.clone()?;
    let text = change.new_text.clone()?;
    if change.metadata.low_confidence {
        debug.note("cross-node range widened to whole nodes");
    }
    // joining two blocks detaches one, which the surface still shows
    let same_block = engine.read(|store, _| {
        match (store.block_of(&range.start_node), store.block_of(&range.end_node)) {
            (Ok(start), Ok(end)) => start == end,
            _ => false,
        }
    });
    Some(Plan {
        ops: vec![Operation::ReplaceText {
            range: range.clone(),
            text,
        }],
        skip_render: same_block,
        applied_range: Some(range),
    })
}

fn plan_marks<S: NodeStore>(
    engine: &TransactionEngine<S>,
    change: &ClassifiedChange,
    debug: &mut InputDebug,
) -> Plan {
    let mut ops = Vec::new();
    for signal in &change.metadata.marks {
        // no span means the whole node
        let span = signal.span.or_else(|| {
            engine.read(|store, _| {
                store
                    .get_node(&signal.node_id)
                    .map(|node| Span::new(0, node.text_len()))
            })
        });
        let Some(span) = span else {
            debug.note(format!("mark signal for unknown node {}", signal.node_id));
            continue;
        };
        let range = ContentRange::within(signal.node_id.clone(), span.start, span.end);
        ops.push(match signal.action {
            MarkAction::Add => Operation::AddMark {
                range,
                mark: signal.mark,
            },
            MarkAction::Remove => Operation::RemoveMark {
                range,
                mark: signal.mark,
            },
        });
    }
    debug.note(format!("{} mark signal(s)", change.metadata.marks.len()));
    Plan {
        ops,
        skip_render: false,
        applied_range: None,
    }
}

/// One `ReplaceText` per text node whose surface text drifted from the model.
fn text_only_operations<T, S>(surface: &T, store: &S, options: &DiffOptions) -> Vec<Operation>
where
    T: SurfaceTree + ?Sized,
    S: NodeStore + ?Sized,
{
    let mut ops = Vec::new();
    for id in store.text_nodes_in_order() {
        let Some(container) = surface.find_container(&id) else {
            continue;
        };
        let Some(model_text) = store.get_node(&id).and_then(|node| node.text.as_deref()) else {
            continue;
        };
        let runs = RunIndex::build(surface, container, Some(&id), RunIndexOptions::default());
        let surface_text = runs.text(surface);
        for change in diff_with(model_text, &surface_text, model_text.len(), 0, options) {
            ops.push(Operation::ReplaceText {
                range: ContentRange::within(id.clone(), change.start, change.end),
                text: change.text,
            });
        }
    }
    ops
}

/// True when a node-specific change involves `active`.
fn touches_node(change: &ClassifiedChange, active: &NodeId) -> bool {
    match change.case {
        ChangeCase::C1 | ChangeCase::C4 => change.node_id.as_ref().is_none_or(|id| id == active),
        ChangeCase::C2 => change
            .content_range
            .as_ref()
            .is_none_or(|range| &range.start_node == active || &range.end_node == active),
        _ => true,
    }
}
