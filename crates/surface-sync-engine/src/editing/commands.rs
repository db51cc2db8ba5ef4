//! Model operations and their execution against a transaction overlay.
//!
//! Every edit the engine makes is an [`Operation`]. Operations run inside a
//! [`TransactionContext`], which owns the copy-on-write overlay and the
//! selection being threaded through the transaction. An operation either
//! applies, declines with [`OpOutcome::Rejected`] (a legitimate no-op such
//! as deleting backward at the document start), or fails with an
//! [`EngineError`] for missing nodes and bad offsets.

use std::collections::HashSet;

use log::trace;
use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use crate::editing::edit::TextEdit;
use crate::editing::remap;
use crate::error::{EngineError, Result};
use crate::model::{
    Annotation, ContentRange, LogicalNode, MarkKind, MarkRange, ModelSelection, NodeGroup, NodeId,
    Position, Span, normalize_marks,
};
use crate::store::{NodeStore, Overlay};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    InsertText {
        at: Position,
        text: String,
    },
    DeleteText {
        range: ContentRange,
    },
    /// Replaces a range, which may span several text nodes and blocks.
    ReplaceText {
        range: ContentRange,
        text: String,
    },
    SetMarks {
        node_id: NodeId,
        marks: Vec<MarkRange>,
    },
    AddMark {
        range: ContentRange,
        mark: MarkKind,
    },
    RemoveMark {
        range: ContentRange,
        mark: MarkKind,
    },
    ToggleMark {
        range: ContentRange,
        mark: MarkKind,
    },
    /// Splits the enclosing block at a text position into two blocks.
    SplitBlock {
        at: Position,
    },
    /// Moves the content of `second` to the end of `first` and removes it.
    MergeBlocks {
        first: NodeId,
        second: NodeId,
    },
    /// Deletes one grapheme before the caret or the current selection.
    DeleteBackward,
    /// Deletes one grapheme after the caret or the current selection.
    DeleteForward,
    SetSelection {
        selection: ModelSelection,
    },
    /// Puts nodes and annotations back to recorded values; `None` deletes.
    Restore {
        nodes: Vec<(NodeId, Option<LogicalNode>)>,
        annotations: Option<Vec<Annotation>>,
    },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::InsertText { .. } => "insert_text",
            Operation::DeleteText { .. } => "delete_text",
            Operation::ReplaceText { .. } => "replace_text",
            Operation::SetMarks { .. } => "set_marks",
            Operation::AddMark { .. } => "add_mark",
            Operation::RemoveMark { .. } => "remove_mark",
            Operation::ToggleMark { .. } => "toggle_mark",
            Operation::SplitBlock { .. } => "split_block",
            Operation::MergeBlocks { .. } => "merge_blocks",
            Operation::DeleteBackward => "delete_backward",
            Operation::DeleteForward => "delete_forward",
            Operation::SetSelection { .. } => "set_selection",
            Operation::Restore { .. } => "restore",
        }
    }
}

/// Result of an operation that did not error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpOutcome {
    Applied,
    Rejected(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionState {
    pub before: Option<ModelSelection>,
    pub current: Option<ModelSelection>,
}

/// Mutable state shared by the operations of one transaction.
pub struct TransactionContext<'a, S: NodeStore + ?Sized> {
    pub selection: SelectionState,
    /// Set by operations that create or enter a block.
    pub last_created_block: Option<NodeId>,
    pub store: Overlay<'a, S>,
}

impl<'a, S: NodeStore + ?Sized> TransactionContext<'a, S> {
    pub fn new(base: &'a S, selection: Option<ModelSelection>) -> Self {
        Self {
            selection: SelectionState {
                before: selection.clone(),
                current: selection,
            },
            last_created_block: None,
            store: Overlay::new(base),
        }
    }

    /// The selection the transaction ends with.
    ///
    /// A created block always wins: the caret lands at offset 0 of its first
    /// text-bearing descendant, never on the structural node itself.
    pub fn resolve_selection(&self) -> Option<ModelSelection> {
        if let Some(block) = &self.last_created_block {
            if let Some(text) = self.store.first_text_descendant(block) {
                return Some(ModelSelection::caret(text, 0));
            }
            log::warn!("created block {block} has no text descendant; keeping selection");
        }
        self.selection.current.clone()
    }

    fn set_caret(&mut self, at: Position) {
        self.selection.current = Some(ModelSelection::caret(at.node_id, at.offset));
    }
}

/// Runs one operation against the context's overlay.
pub fn execute<S: NodeStore + ?Sized>(
    ctx: &mut TransactionContext<'_, S>,
    op: &Operation,
) -> Result<OpOutcome> {
    trace!("executing {}", op.name());
    match op {
        Operation::InsertText { at, text } => {
            let caret = replace_text(&mut ctx.store, &ContentRange::collapsed(at), text)?;
            ctx.set_caret(caret);
        }
        Operation::DeleteText { range } => {
            let caret = replace_text(&mut ctx.store, range, "")?;
            ctx.set_caret(caret);
        }
        Operation::ReplaceText { range, text } => {
            let caret = replace_text(&mut ctx.store, range, text)?;
            ctx.set_caret(caret);
        }
        Operation::SetMarks { node_id, marks } => set_marks(&mut ctx.store, node_id, marks)?,
        Operation::AddMark { range, mark } => return add_mark(&mut ctx.store, range, *mark),
        Operation::RemoveMark { range, mark } => return remove_mark(&mut ctx.store, range, *mark),
        Operation::ToggleMark { range, mark } => {
            let segments = mark_segments(&ctx.store, range)?;
            let covered = segments.iter().all(|(id, span)| {
                ctx.store.get_node(id).is_some_and(|node| {
                    normalize_marks(node.marks.clone()).iter().any(|existing| {
                        existing.is_kind(*mark)
                            && existing.span.start <= span.start
                            && span.end <= existing.span.end
                    })
                })
            });
            return if covered {
                remove_mark(&mut ctx.store, range, *mark)
            } else {
                add_mark(&mut ctx.store, range, *mark)
            };
        }
        Operation::SplitBlock { at } => {
            let block = split_block(&mut ctx.store, at)?;
            ctx.last_created_block = Some(block);
        }
        Operation::MergeBlocks { first, second } => {
            let caret = merge_blocks(&mut ctx.store, first, second)?;
            ctx.set_caret(caret);
        }
        Operation::DeleteBackward => return delete_adjacent(ctx, Direction::Backward),
        Operation::DeleteForward => return delete_adjacent(ctx, Direction::Forward),
        Operation::SetSelection { selection } => {
            for end in [&selection.anchor, &selection.focus] {
                ctx.store.text_node(&end.node_id)?.check_offset(end.offset)?;
            }
            ctx.selection.current = Some(selection.clone());
        }
        Operation::Restore { nodes, annotations } => {
            for (id, node) in nodes {
                match node {
                    Some(node) => ctx.store.put_node(node.clone()),
                    None => {
                        ctx.store.delete_node(id);
                    }
                }
            }
            if let Some(annotations) = annotations {
                ctx.store.set_annotations(annotations.clone());
            }
        }
    }
    Ok(OpOutcome::Applied)
}

// ============ Text ============

/// Replaces `range` with `text` and returns the caret after the insertion.
fn replace_text<N: NodeStore + ?Sized>(
    store: &mut N,
    range: &ContentRange,
    text: &str,
) -> Result<Position> {
    if !range.is_single_node() {
        return replace_across(store, range, text);
    }
    if range.start_offset > range.end_offset {
        return Err(EngineError::InvalidRange(format!(
            "start {} after end {} in {}",
            range.start_offset, range.end_offset, range.start_node
        )));
    }
    let node = store.text_node(&range.start_node)?.clone();
    node.check_offset(range.start_offset)?;
    node.check_offset(range.end_offset)?;
    let edit = TextEdit::new(
        node.id.clone(),
        node.text_str()?,
        range.start_offset,
        range.end_offset - range.start_offset,
        text,
    )?;
    apply_text_edit(store, node, &edit);
    Ok(Position::new(range.start_node.clone(), range.start_offset + text.len()))
}

fn apply_text_edit<N: NodeStore + ?Sized>(store: &mut N, mut node: LogicalNode, edit: &TextEdit) {
    node.marks = remap::adjust(&node.marks, edit);
    node.text = Some(edit.new_text.clone());
    let annotations = remap::adjust_annotations(store.annotations(), edit);
    if annotations.as_slice() != store.annotations() {
        store.set_annotations(annotations);
    }
    store.put_node(node);
}

/// Cross-node replace: the start node absorbs the end node's tail and every
/// text node in between is removed.
fn replace_across<N: NodeStore + ?Sized>(
    store: &mut N,
    range: &ContentRange,
    text: &str,
) -> Result<Position> {
    let between = store.text_nodes_between(&range.start_node, &range.end_node)?;
    let start = store.text_node(&range.start_node)?.clone();
    let end = store.text_node(&range.end_node)?.clone();
    start.check_offset(range.start_offset)?;
    end.check_offset(range.end_offset)?;

    let start_text = start.text_str()?;
    let edit = TextEdit::new(
        start.id.clone(),
        start_text,
        range.start_offset,
        start_text.len() - range.start_offset,
        text,
    )?;
    let tail_offset = range.end_offset;
    let base = range.start_offset + text.len();
    let carry = |span: Span| {
        (span.end > tail_offset)
            .then(|| Span::new(span.start.max(tail_offset) - tail_offset + base, span.end - tail_offset + base))
    };

    let mut merged = start.clone();
    let mut marks = remap::adjust(&start.marks, &edit);
    marks.extend(
        end.marks
            .iter()
            .filter_map(|mark| carry(mark.span).map(|span| MarkRange { span, ..mark.clone() })),
    );
    merged.marks = normalize_marks(marks);
    merged.text = Some(format!("{}{}", edit.new_text, &end.text_str()?[tail_offset..]));

    let removed: HashSet<&NodeId> = between.iter().skip(1).collect();
    let annotations: Vec<Annotation> = store
        .annotations()
        .iter()
        .filter_map(|annotation| {
            if annotation.node_id == start.id {
                remap::adjust_span(annotation.span, &edit).map(|span| Annotation {
                    span,
                    ..annotation.clone()
                })
            } else if annotation.node_id == end.id {
                carry(annotation.span).map(|span| Annotation {
                    node_id: start.id.clone(),
                    span,
                    ..annotation.clone()
                })
            } else if removed.contains(&annotation.node_id) {
                None
            } else {
                Some(annotation.clone())
            }
        })
        .collect();
    store.set_annotations(annotations);
    store.put_node(merged);

    let start_block = store.block_of(&start.id)?;
    let end_block = store.block_of(&end.id)?;
    if start_block != end_block {
        hoist_trailing_siblings(store, &end.id, &end_block, &start.id)?;
    }

    let mut emptied = Vec::new();
    for id in between.iter().skip(1) {
        if let Some(parent) = detach(store, id)? {
            emptied.push(parent);
        }
    }
    prune_empty(store, &start.id, emptied)?;

    Ok(Position::new(start.id, base))
}

/// Moves everything after `from` inside `block` to just after `anchor`.
fn hoist_trailing_siblings<N: NodeStore + ?Sized>(
    store: &mut N,
    from: &NodeId,
    block: &NodeId,
    anchor: &NodeId,
) -> Result<()> {
    let target_parent = store
        .parent(anchor)
        .cloned()
        .ok_or_else(|| EngineError::InvalidRange(format!("{anchor} has no parent")))?;
    let mut insert_after = anchor.clone();
    let mut current = from.clone();
    loop {
        let parent_id = store
            .parent(&current)
            .cloned()
            .ok_or_else(|| EngineError::InvalidRange(format!("{current} has no parent")))?;
        let mut parent = store.node(&parent_id)?.clone();
        let index = child_index(&parent, &current)?;
        let trailing = parent.children.split_off(index + 1);
        store.put_node(parent);

        if !trailing.is_empty() {
            let mut target = store.node(&target_parent)?.clone();
            let at = child_index(&target, &insert_after)? + 1;
            target.children.splice(at..at, trailing.iter().cloned());
            store.put_node(target);
            for id in &trailing {
                let mut child = store.node(id)?.clone();
                child.parent = Some(target_parent.clone());
                store.put_node(child);
            }
            if let Some(last) = trailing.last() {
                insert_after = last.clone();
            }
        }

        if &parent_id == block {
            return Ok(());
        }
        current = parent_id;
    }
}

// ============ Marks ============

fn set_marks<N: NodeStore + ?Sized>(store: &mut N, node_id: &NodeId, marks: &[MarkRange]) -> Result<()> {
    let mut node = store.text_node(node_id)?.clone();
    for mark in marks {
        if mark.span.start >= mark.span.end {
            return Err(EngineError::InvalidRange(format!(
                "empty {} mark {}..{} on {node_id}",
                mark.kind, mark.span.start, mark.span.end
            )));
        }
        node.check_offset(mark.span.start)?;
        node.check_offset(mark.span.end)?;
    }
    node.marks = normalize_marks(marks.to_vec());
    store.put_node(node);
    Ok(())
}

/// Per-node pieces of a range, skipping nodes it only touches.
fn mark_segments<N: NodeStore + ?Sized>(store: &N, range: &ContentRange) -> Result<Vec<(NodeId, Span)>> {
    let nodes = if range.is_single_node() {
        vec![range.start_node.clone()]
    } else {
        store.text_nodes_between(&range.start_node, &range.end_node)?
    };
    let mut segments = Vec::with_capacity(nodes.len());
    for id in nodes {
        let node = store.text_node(&id)?;
        let start = if id == range.start_node { range.start_offset } else { 0 };
        let end = if id == range.end_node { range.end_offset } else { node.text_len() };
        node.check_offset(start)?;
        node.check_offset(end)?;
        if start > end {
            return Err(EngineError::InvalidRange(format!("start {start} after end {end} in {id}")));
        }
        if start < end {
            segments.push((id, Span::new(start, end)));
        }
    }
    Ok(segments)
}

fn add_mark<N: NodeStore + ?Sized>(store: &mut N, range: &ContentRange, kind: MarkKind) -> Result<OpOutcome> {
    let segments = mark_segments(store, range)?;
    if segments.is_empty() {
        return Ok(OpOutcome::Rejected("nothing selected to mark".to_string()));
    }
    for (id, span) in segments {
        let mut node = store.node(&id)?.clone();
        node.marks.push(MarkRange::of(kind, span.start, span.end));
        node.marks = normalize_marks(node.marks);
        store.put_node(node);
    }
    Ok(OpOutcome::Applied)
}

fn remove_mark<N: NodeStore + ?Sized>(store: &mut N, range: &ContentRange, kind: MarkKind) -> Result<OpOutcome> {
    let segments = mark_segments(store, range)?;
    if segments.is_empty() {
        return Ok(OpOutcome::Rejected("nothing selected to unmark".to_string()));
    }
    for (id, cut) in segments {
        let mut node = store.node(&id)?.clone();
        node.marks = node
            .marks
            .iter()
            .flat_map(|mark| {
                if !mark.is_kind(kind) || mark.span.intersect(cut).is_none() {
                    return vec![mark.clone()];
                }
                let mut pieces = Vec::new();
                if mark.span.start < cut.start {
                    pieces.push(MarkRange {
                        span: Span::new(mark.span.start, cut.start),
                        ..mark.clone()
                    });
                }
                if cut.end < mark.span.end {
                    pieces.push(MarkRange {
                        span: Span::new(cut.end, mark.span.end),
                        ..mark.clone()
                    });
                }
                pieces
            })
            .collect();
        store.put_node(node);
    }
    Ok(OpOutcome::Applied)
}

// ============ Blocks ============

/// Splits the block holding `at` and returns the new block's id.
///
/// Every container between the text node and the block is split too, so
/// inline wrappers such as links continue on the new side.
fn split_block<N: NodeStore + ?Sized>(store: &mut N, at: &Position) -> Result<NodeId> {
    let text_node = store.text_node(&at.node_id)?.clone();
    text_node.check_offset(at.offset)?;
    let block = store.block_of(&at.node_id)?;
    if block == at.node_id {
        return Err(EngineError::InvalidRange(format!("{block} is a text block and cannot be split")));
    }

    let text = text_node.text_str()?;
    let (head_marks, tail_marks) = split_marks(&text_node.marks, at.offset);
    let mut pending = LogicalNode {
        id: NodeId::generate(),
        text: Some(text[at.offset..].to_string()),
        marks: tail_marks,
        children: Vec::new(),
        ..text_node.clone()
    };
    let mut head = text_node.clone();
    head.text = Some(text[..at.offset].to_string());
    head.marks = head_marks;
    store.put_node(head);

    // Annotations past the split point follow the tail.
    let tail_id = pending.id.clone();
    let annotations: Vec<Annotation> = store
        .annotations()
        .iter()
        .filter_map(|annotation| {
            if annotation.node_id != text_node.id {
                return Some(annotation.clone());
            }
            let span = annotation.span;
            if span.end <= at.offset {
                Some(annotation.clone())
            } else if span.start >= at.offset {
                Some(Annotation {
                    node_id: tail_id.clone(),
                    span: Span::new(span.start - at.offset, span.end - at.offset),
                    ..annotation.clone()
                })
            } else {
                Some(Annotation {
                    span: Span::new(span.start, at.offset),
                    ..annotation.clone()
                })
            }
        })
        .collect();
    store.set_annotations(annotations);

    let mut current = at.node_id.clone();
    loop {
        let parent_id = store
            .parent(&current)
            .cloned()
            .ok_or_else(|| EngineError::InvalidRange(format!("{current} has no parent")))?;
        let mut parent = store.node(&parent_id)?.clone();
        let index = child_index(&parent, &current)?;
        let moved = parent.children.split_off(index + 1);

        let mut sibling = LogicalNode::container(NodeId::generate(), parent.node_type.clone());
        sibling.parent = parent.parent.clone();
        sibling.children = std::iter::once(pending.id.clone()).chain(moved.iter().cloned()).collect();
        pending.parent = Some(sibling.id.clone());
        store.put_node(pending);
        for id in &moved {
            let mut child = store.node(id)?.clone();
            child.parent = Some(sibling.id.clone());
            store.put_node(child);
        }
        store.put_node(parent);

        if parent_id == block {
            let grand_id = sibling
                .parent
                .clone()
                .ok_or_else(|| EngineError::InvalidRange(format!("{block} has no parent")))?;
            let mut grand = store.node(&grand_id)?.clone();
            let at_index = child_index(&grand, &block)? + 1;
            grand.children.insert(at_index, sibling.id.clone());
            store.put_node(grand);
            let created = sibling.id.clone();
            store.put_node(sibling);
            return Ok(created);
        }
        pending = sibling;
        current = parent_id;
    }
}

fn split_marks(marks: &[MarkRange], offset: usize) -> (Vec<MarkRange>, Vec<MarkRange>) {
    let head = marks
        .iter()
        .filter(|mark| mark.span.start < offset)
        .map(|mark| MarkRange {
            span: Span::new(mark.span.start, mark.span.end.min(offset)),
            ..mark.clone()
        })
        .collect();
    let tail = marks
        .iter()
        .filter(|mark| mark.span.end > offset)
        .map(|mark| MarkRange {
            span: Span::new(mark.span.start.max(offset) - offset, mark.span.end - offset),
            ..mark.clone()
        })
        .collect();
    (head, tail)
}

/// Appends `second`'s children to `first` and returns the caret at the seam.
fn merge_blocks<N: NodeStore + ?Sized>(store: &mut N, first: &NodeId, second: &NodeId) -> Result<Position> {
    if first == second {
        return Err(EngineError::InvalidRange(format!("cannot merge {first} into itself")));
    }
    for id in [first, second] {
        if store.group_of(id)? != NodeGroup::Block {
            return Err(EngineError::InvalidRange(format!("{id} is not a block")));
        }
    }

    let left = store.last_text_descendant(first);
    let right = store.first_text_descendant(second);

    let moved = store.node(second)?.children.clone();
    let mut first_node = store.node(first)?.clone();
    first_node.children.extend(moved.iter().cloned());
    store.put_node(first_node);
    for id in &moved {
        let mut child = store.node(id)?.clone();
        child.parent = Some(first.clone());
        store.put_node(child);
    }
    detach(store, second)?;

    match (left, right) {
        (Some(left), Some(right)) => {
            let caret = Position::new(left.clone(), store.node(&left)?.text_len());
            if adjacent_text_siblings(store, first, &left, &right)? {
                join_text_nodes(store, &left, &right)?;
            }
            Ok(caret)
        }
        (Some(left), None) => Ok(Position::new(left.clone(), store.node(&left)?.text_len())),
        (None, Some(right)) => Ok(Position::new(right, 0)),
        (None, None) => Err(EngineError::InvalidRange(format!(
            "neither {first} nor {second} holds text"
        ))),
    }
}

fn adjacent_text_siblings<N: NodeStore + ?Sized>(
    store: &N,
    parent: &NodeId,
    left: &NodeId,
    right: &NodeId,
) -> Result<bool> {
    let parent = store.node(parent)?;
    let position = |id: &NodeId| parent.children.iter().position(|child| child == id);
    let same_type = store.node(left)?.node_type == store.node(right)?.node_type;
    Ok(same_type && matches!((position(left), position(right)), (Some(l), Some(r)) if l + 1 == r))
}

/// Appends `right`'s text, marks and annotations to `left` and removes it.
fn join_text_nodes<N: NodeStore + ?Sized>(store: &mut N, left: &NodeId, right: &NodeId) -> Result<()> {
    let mut left_node = store.text_node(left)?.clone();
    let right_node = store.text_node(right)?.clone();
    let offset = left_node.text_len();

    let mut marks = left_node.marks.clone();
    marks.extend(right_node.marks.iter().map(|mark| MarkRange {
        span: Span::new(mark.span.start + offset, mark.span.end + offset),
        ..mark.clone()
    }));
    left_node.marks = normalize_marks(marks);
    left_node.text = Some(format!("{}{}", left_node.text_str()?, right_node.text_str()?));
    store.put_node(left_node);

    if store.annotations().iter().any(|annotation| &annotation.node_id == right) {
        let annotations = store
            .annotations()
            .iter()
            .map(|annotation| {
                if &annotation.node_id == right {
                    Annotation {
                        node_id: left.clone(),
                        span: Span::new(annotation.span.start + offset, annotation.span.end + offset),
                        ..annotation.clone()
                    }
                } else {
                    annotation.clone()
                }
            })
            .collect();
        store.set_annotations(annotations);
    }
    detach(store, right)?;
    Ok(())
}

// ============ Caret deletion ============

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Backward,
    Forward,
}

fn delete_adjacent<S: NodeStore + ?Sized>(
    ctx: &mut TransactionContext<'_, S>,
    direction: Direction,
) -> Result<OpOutcome> {
    let Some(selection) = ctx.selection.current.clone() else {
        return Ok(OpOutcome::Rejected("no selection".to_string()));
    };
    if !selection.is_collapsed() {
        let caret = replace_text(&mut ctx.store, &selection.range(), "")?;
        ctx.set_caret(caret);
        return Ok(OpOutcome::Applied);
    }

    let at = selection.focus;
    let node = ctx.store.text_node(&at.node_id)?.clone();
    node.check_offset(at.offset)?;
    let text = node.text_str()?;

    let within = match direction {
        Direction::Backward if at.offset > 0 => Some((previous_boundary(text, at.offset), at.offset)),
        Direction::Forward if at.offset < text.len() => Some((at.offset, next_boundary(text, at.offset))),
        _ => None,
    };
    if let Some((start, end)) = within {
        let caret = replace_text(&mut ctx.store, &ContentRange::within(node.id.clone(), start, end), "")?;
        ctx.set_caret(caret);
        return Ok(OpOutcome::Applied);
    }

    let neighbour = match direction {
        Direction::Backward => ctx.store.previous_text_node(&node.id),
        Direction::Forward => ctx.store.next_text_node(&node.id),
    };
    let Some(neighbour) = neighbour else {
        let edge = match direction {
            Direction::Backward => "already at document start",
            Direction::Forward => "already at document end",
        };
        return Ok(OpOutcome::Rejected(edge.to_string()));
    };

    let own_block = ctx.store.block_of(&node.id)?;
    let other_block = ctx.store.block_of(&neighbour)?;
    if own_block != other_block {
        let (first, second) = match direction {
            Direction::Backward => (other_block, own_block),
            Direction::Forward => (own_block, other_block),
        };
        let caret = merge_blocks(&mut ctx.store, &first, &second)?;
        ctx.set_caret(caret);
        return Ok(OpOutcome::Applied);
    }

    // Same block, different inline node: delete across the node boundary.
    let other = ctx.store.text_node(&neighbour)?;
    let other_text = other.text_str()?;
    let range = match direction {
        Direction::Backward if !other_text.is_empty() => {
            let len = other_text.len();
            ContentRange::within(neighbour.clone(), previous_boundary(other_text, len), len)
        }
        Direction::Forward if !other_text.is_empty() => {
            ContentRange::within(neighbour.clone(), 0, next_boundary(other_text, 0))
        }
        _ => return Ok(OpOutcome::Rejected(format!("{neighbour} is empty"))),
    };
    replace_text(&mut ctx.store, &range, "")?;
    // the caret stays where it was in its own node
    ctx.set_caret(at);
    Ok(OpOutcome::Applied)
}

fn previous_boundary(text: &str, offset: usize) -> usize {
    text[..offset]
        .grapheme_indices(true)
        .next_back()
        .map_or(0, |(index, _)| index)
}

fn next_boundary(text: &str, offset: usize) -> usize {
    text[offset..]
        .graphemes(true)
        .next()
        .map_or(offset, |grapheme| offset + grapheme.len())
}

// ============ Tree helpers ============

fn child_index(parent: &LogicalNode, child: &NodeId) -> Result<usize> {
    parent
        .children
        .iter()
        .position(|id| id == child)
        .ok_or_else(|| EngineError::InvalidRange(format!("{child} is not a child of {}", parent.id)))
}

/// Unlinks a node from its parent and deletes it. Returns the former parent.
fn detach<N: NodeStore + ?Sized>(store: &mut N, id: &NodeId) -> Result<Option<NodeId>> {
    let node = store.node(id)?.clone();
    if let Some(parent_id) = &node.parent {
        let mut parent = store.node(parent_id)?.clone();
        parent.children.retain(|child| child != id);
        store.put_node(parent);
    }
    store.delete_node(id);
    Ok(node.parent)
}

/// Removes containers left without children, walking up from each
/// candidate. Ancestors of `keep` and the root are never removed.
fn prune_empty<N: NodeStore + ?Sized>(store: &mut N, keep: &NodeId, candidates: Vec<NodeId>) -> Result<()> {
    let mut protected = HashSet::new();
    let mut current = Some(keep.clone());
    while let Some(id) = current {
        current = store.parent(&id).cloned();
        protected.insert(id);
    }
    protected.insert(store.root().clone());

    for candidate in candidates {
        let mut current = Some(candidate);
        while let Some(id) = current {
            if protected.contains(&id) {
                break;
            }
            let Some(node) = store.get_node(&id) else {
                break;
            };
            if node.is_text() || !node.children.is_empty() {
                break;
            }
            current = detach(store, &id)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::tests::{hello_world, two_paragraphs};
    use pretty_assertions::assert_eq;

    fn run(store: &mut MemoryStore, selection: Option<ModelSelection>, op: Operation) -> (OpOutcome, Option<ModelSelection>) {
        let (outcome, selection, changes) = {
            let mut ctx = TransactionContext::new(&*store, selection);
            let outcome = execute(&mut ctx, &op).unwrap();
            let selection = ctx.resolve_selection();
            (outcome, selection, ctx.store.into_changes())
        };
        changes.apply_to(store);
        (outcome, selection)
    }

    // ============ Text ============

    #[test]
    fn insert_text_remaps_marks_and_moves_caret() {
        let mut store = hello_world();
        let (_, selection) = run(
            &mut store,
            None,
            Operation::InsertText {
                at: Position::new("t1", 6),
                text: "New ".to_string(),
            },
        );

        assert_eq!(store.text_of("t1"), Some("Hello New World"));
        assert_eq!(
            store.node(&"t1".into()).unwrap().marks,
            vec![MarkRange::of(MarkKind::Bold, 10, 15)]
        );
        assert_eq!(selection, Some(ModelSelection::caret("t1", 10)));
    }

    #[test]
    fn replace_across_nodes_joins_into_start_node() {
        let mut store = two_paragraphs();
        let (_, selection) = run(
            &mut store,
            None,
            Operation::ReplaceText {
                range: ContentRange::new("t1", 3, "t2", 2),
                text: "X".to_string(),
            },
        );

        assert_eq!(store.text_of("t1"), Some("HelXrld"));
        assert!(store.get_node(&"t2".into()).is_none());
        assert!(store.get_node(&"p2".into()).is_none());
        assert_eq!(store.node(&"doc".into()).unwrap().children, vec![NodeId::from("p1")]);
        assert_eq!(selection, Some(ModelSelection::caret("t1", 4)));
    }

    #[test]
    fn replace_rejects_mid_char_offsets() {
        let mut store = MemoryStore::new();
        store
            .append_paragraph("p1", "paragraph", LogicalNode::text("t1", "héllo"))
            .unwrap();
        let mut ctx = TransactionContext::new(&store, None);
        let err = execute(
            &mut ctx,
            &Operation::DeleteText {
                range: ContentRange::within("t1", 0, 2),
            },
        )
        .unwrap_err();

        assert_eq!(
            err,
            EngineError::NotCharBoundary {
                node: "t1".into(),
                offset: 2
            }
        );
    }

    #[test]
    fn missing_node_is_an_error() {
        let store = hello_world();
        let mut ctx = TransactionContext::new(&store, None);
        let err = execute(
            &mut ctx,
            &Operation::InsertText {
                at: Position::new("nope", 0),
                text: "x".to_string(),
            },
        )
        .unwrap_err();

        assert_eq!(err, EngineError::NodeNotFound("nope".into()));
    }

    // ============ Marks ============

    #[test]
    fn toggle_mark_adds_then_removes() {
        let mut store = hello_world();
        let range = ContentRange::within("t1", 0, 5);
        let toggle = Operation::ToggleMark {
            range: range.clone(),
            mark: MarkKind::Italic,
        };

        run(&mut store, None, toggle.clone());
        assert!(
            store.node(&"t1".into()).unwrap().marks.contains(&MarkRange::of(MarkKind::Italic, 0, 5))
        );

        run(&mut store, None, toggle);
        assert_eq!(
            store.node(&"t1".into()).unwrap().marks,
            vec![MarkRange::of(MarkKind::Bold, 6, 11)]
        );
    }

    #[test]
    fn remove_mark_splits_existing_range() {
        let mut store = hello_world();
        run(
            &mut store,
            None,
            Operation::RemoveMark {
                range: ContentRange::within("t1", 7, 9),
                mark: MarkKind::Bold,
            },
        );

        assert_eq!(
            store.node(&"t1".into()).unwrap().marks,
            vec![MarkRange::of(MarkKind::Bold, 6, 7), MarkRange::of(MarkKind::Bold, 9, 11)]
        );
    }

    #[test]
    fn collapsed_mark_range_is_rejected() {
        let mut store = hello_world();
        let (outcome, _) = run(
            &mut store,
            None,
            Operation::AddMark {
                range: ContentRange::within("t1", 3, 3),
                mark: MarkKind::Bold,
            },
        );
        assert!(matches!(outcome, OpOutcome::Rejected(_)));
    }

    #[test]
    fn set_marks_validates_ranges() {
        let store = hello_world();
        let mut ctx = TransactionContext::new(&store, None);
        let result = execute(
            &mut ctx,
            &Operation::SetMarks {
                node_id: "t1".into(),
                marks: vec![MarkRange::of(MarkKind::Bold, 4, 40)],
            },
        );
        assert!(matches!(result, Err(EngineError::OffsetOutOfBounds { offset: 40, .. })));
    }

    // ============ Blocks ============

    #[test]
    fn split_block_creates_sibling_and_lands_caret_in_text() {
        let mut store = hello_world();
        let (_, selection) = run(
            &mut store,
            None,
            Operation::SplitBlock {
                at: Position::new("t1", 8),
            },
        );

        let doc = store.node(&"doc".into()).unwrap().clone();
        assert_eq!(doc.children.len(), 2);
        let new_block = &doc.children[1];
        let new_text = store.first_text_descendant(new_block).unwrap();

        assert_eq!(store.text_of("t1"), Some("Hello Wo"));
        assert_eq!(store.text_of(new_text.as_str()), Some("rld"));
        assert_eq!(
            store.node(&new_text).unwrap().marks,
            vec![MarkRange::of(MarkKind::Bold, 0, 3)]
        );
        assert_eq!(store.node(new_block).unwrap().node_type, "paragraph");
        assert_eq!(selection, Some(ModelSelection::caret(new_text, 0)));
    }

    #[test]
    fn split_inside_inline_container_splits_the_wrapper() {
        let mut store = MemoryStore::new();
        let root = store.root().clone();
        let p = store.append(&root, LogicalNode::container("p1", "paragraph")).unwrap();
        store.append(&p, LogicalNode::text("t1", "see ")).unwrap();
        let link = store.append(&p, LogicalNode::container("a1", "link")).unwrap();
        store.append(&link, LogicalNode::text("t2", "docs here")).unwrap();
        store.append(&p, LogicalNode::text("t3", "!")).unwrap();

        run(
            &mut store,
            None,
            Operation::SplitBlock {
                at: Position::new("t2", 4),
            },
        );

        let doc = store.node(&root).unwrap().clone();
        let second = store.node(&doc.children[1]).unwrap().clone();
        assert_eq!(store.node(&p).unwrap().children, vec![NodeId::from("t1"), NodeId::from("a1")]);
        assert_eq!(second.children.len(), 2);
        assert_eq!(store.node(&second.children[0]).unwrap().node_type, "link");
        assert_eq!(second.children[1], NodeId::from("t3"));
        assert_eq!(store.text_of("t2"), Some("docs"));
        assert_eq!(store.parent(&"t3".into()), Some(&second.id));
    }

    #[test]
    fn delete_backward_at_block_start_merges_blocks() {
        let mut store = two_paragraphs();
        let (_, selection) = run(&mut store, Some(ModelSelection::caret("t2", 0)), Operation::DeleteBackward);

        assert_eq!(store.text_of("t1"), Some("HelloWorld"));
        assert!(store.get_node(&"p2".into()).is_none());
        assert!(store.get_node(&"t2".into()).is_none());
        assert_eq!(selection, Some(ModelSelection::caret("t1", 5)));
    }

    #[test]
    fn delete_backward_removes_whole_grapheme() {
        let mut store = MemoryStore::new();
        store
            .append_paragraph("p1", "paragraph", LogicalNode::text("t1", "ok 👍🏽"))
            .unwrap();
        let end = store.text_of("t1").unwrap().len();
        let (_, selection) = run(&mut store, Some(ModelSelection::caret("t1", end)), Operation::DeleteBackward);

        assert_eq!(store.text_of("t1"), Some("ok "));
        assert_eq!(selection, Some(ModelSelection::caret("t1", 3)));
    }

    #[test]
    fn delete_at_document_edges_is_rejected() {
        let mut store = two_paragraphs();
        let (backward, _) = run(&mut store, Some(ModelSelection::caret("t1", 0)), Operation::DeleteBackward);
        let (forward, _) = run(&mut store, Some(ModelSelection::caret("t2", 5)), Operation::DeleteForward);

        assert_eq!(backward, OpOutcome::Rejected("already at document start".to_string()));
        assert_eq!(forward, OpOutcome::Rejected("already at document end".to_string()));
    }

    #[test]
    fn delete_forward_at_block_end_merges_next_block() {
        let mut store = two_paragraphs();
        run(&mut store, Some(ModelSelection::caret("t1", 5)), Operation::DeleteForward);

        assert_eq!(store.text_of("t1"), Some("HelloWorld"));
        assert_eq!(store.node(&"doc".into()).unwrap().children.len(), 1);
    }

    #[test]
    fn journal_captures_everything_an_operation_touched() {
        let store = two_paragraphs();
        let mut ctx = TransactionContext::new(&store, None);
        ctx.store.begin_journal();
        execute(
            &mut ctx,
            &Operation::MergeBlocks {
                first: "p1".into(),
                second: "p2".into(),
            },
        )
        .unwrap();
        let journal = ctx.store.take_journal();
        let touched: HashSet<&str> = journal.nodes.iter().map(|(id, _)| id.as_str()).collect();

        assert!(["p1", "p2", "t1", "t2", "doc"].iter().all(|id| touched.contains(id)));
        assert!(journal.nodes.iter().all(|(_, prior)| prior.is_some()));
    }
}
