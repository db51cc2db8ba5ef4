//! Text cases: edits inside one text node (C1) and across two (C2).

use crate::editing::run_index::{RunIndex, RunIndexOptions};
use crate::input::classify::{
    ChangeCase, ClassifiedChange, ClassifyContext, is_structural_child, text_container,
};
use crate::model::{ContentRange, NodeId, floor_char_boundary};
use crate::store::NodeStore;
use crate::surface::{Container, MutationKind, MutationRecord, SurfaceTree, nearest_container};

/// C1: every text-affecting mutation lands in the same text node and its
/// flattened surface text differs from the model.
pub(super) fn single_node<T, S>(
    surface: &T,
    store: &S,
    mutations: &[MutationRecord],
    ctx: &ClassifyContext<'_>,
) -> Option<ClassifiedChange>
where
    T: SurfaceTree + ?Sized,
    S: NodeStore + ?Sized,
{
    // a block added or removed anywhere in the batch makes it a structure change
    let moves_blocks = mutations.iter().any(|mutation| {
        let (added, removed) = mutation.touched_children();
        added
            .iter()
            .chain(removed)
            .any(|&child| is_structural_child(surface, store, child))
    });
    if moves_blocks {
        return None;
    }

    let mut edited: Option<Container> = None;
    for mutation in mutations {
        if let MutationKind::Attributes { .. } = mutation.kind {
            continue;
        }
        let Some((container, _)) = text_container(surface, store, mutation.target) else {
            continue;
        };

        let (added, removed) = mutation.touched_children();
        for &child in added.iter().chain(removed) {
            // another text node's container moving in or out is C2 territory
            if surface
                .node_identity(child)
                .is_some_and(|id| id != container.node_id)
            {
                return None;
            }
        }

        match &edited {
            None => edited = Some(container),
            Some(existing) if existing.node_id != container.node_id => return None,
            Some(_) => {}
        }
    }

    let container = edited?;
    let node = store.get_node(&container.node_id)?;
    let prev_text = node.text.clone()?;
    let runs = RunIndex::build(surface, container.key, Some(&node.id), RunIndexOptions::default());
    let new_text = runs.text(surface);
    if new_text == prev_text {
        return None;
    }

    let mut change = ClassifiedChange::new(ChangeCase::C1, mutations);
    if let Some(hint) = ctx.hint
        && hint.covers(&node.id, &node.id)
    {
        let start = floor_char_boundary(&prev_text, hint.content_range.start_offset);
        let end = floor_char_boundary(&prev_text, hint.content_range.end_offset).max(start);
        change.content_range = Some(ContentRange::within(node.id.clone(), start, end));
        change.metadata.used_hint = true;
    }
    change.node_id = Some(node.id.clone());
    change.prev_text = Some(prev_text);
    change.new_text = Some(new_text);
    Some(change)
}

/// C2: structural and character mutations together, with the selection
/// spanning two text nodes.
///
/// The surface text of every model node from the start node to the end node
/// is flattened; stripping the untouched model prefix and suffix leaves the
/// replacement for the selected range.
pub(super) fn cross_node<T, S>(
    surface: &T,
    store: &S,
    mutations: &[MutationRecord],
    ctx: &ClassifyContext<'_>,
) -> Option<ClassifiedChange>
where
    T: SurfaceTree + ?Sized,
    S: NodeStore + ?Sized,
{
    let has_structural = mutations.iter().any(MutationRecord::is_structural);
    let has_character = mutations.iter().any(MutationRecord::is_character_data);
    if !has_structural || !has_character {
        return None;
    }

    let selection = ctx.selection.filter(|selection| !selection.is_collapsed())?;
    let selected = selection.range();
    if selected.is_single_node() {
        return None;
    }
    let start_node = store.get_node(&selected.start_node).filter(|node| node.is_text())?;
    let end_node = store.get_node(&selected.end_node).filter(|node| node.is_text())?;

    for mutation in mutations {
        if let Some(container) = nearest_container(surface, mutation.target)
            && store.is_block_group(&container.node_id)
        {
            return None;
        }
    }

    let start_text = start_node.text.as_deref().unwrap_or_default();
    let end_text = end_node.text.as_deref().unwrap_or_default();
    let (start_offset, end_offset, used_hint) = match ctx.hint {
        Some(hint) if hint.covers(&start_node.id, &end_node.id) => (
            hint.content_range.start_offset,
            hint.content_range.end_offset,
            true,
        ),
        _ => (selected.start_offset, selected.end_offset, false),
    };
    let start_offset = floor_char_boundary(start_text, start_offset);
    let end_offset = floor_char_boundary(end_text, end_offset);

    let nodes = store.text_nodes_between(&start_node.id, &end_node.id).ok()?;
    let surface_text = flatten(surface, &nodes);

    let prefix = &start_text[..start_offset];
    let suffix = &end_text[end_offset..];
    let narrowed = surface_text.len() >= prefix.len() + suffix.len()
        && surface_text.starts_with(prefix)
        && surface_text.ends_with(suffix);

    let (range, new_text) = if narrowed {
        (
            ContentRange::new(start_node.id.clone(), start_offset, end_node.id.clone(), end_offset),
            surface_text[prefix.len()..surface_text.len() - suffix.len()].to_string(),
        )
    } else {
        (
            ContentRange::new(start_node.id.clone(), 0, end_node.id.clone(), end_text.len()),
            surface_text,
        )
    };
    let prev_text = model_text(store, &nodes, &range);
    if prev_text == new_text {
        return None;
    }

    let mut change = ClassifiedChange::new(ChangeCase::C2, mutations);
    change.node_id = Some(start_node.id.clone());
    change.content_range = Some(range);
    change.prev_text = Some(prev_text);
    change.new_text = Some(new_text);
    change.metadata.used_hint = used_hint;
    change.metadata.low_confidence = !narrowed;
    Some(change)
}

/// Surface text of `nodes` in order; nodes missing from the surface add nothing.
fn flatten<T: SurfaceTree + ?Sized>(surface: &T, nodes: &[NodeId]) -> String {
    let mut out = String::new();
    for id in nodes {
        if let Some(container) = surface.find_container(id) {
            let runs = RunIndex::build(surface, container, Some(id), RunIndexOptions::default());
            out.push_str(&runs.text(surface));
        }
    }
    out
}

/// Model text covered by `range` across `nodes`.
fn model_text<S: NodeStore + ?Sized>(store: &S, nodes: &[NodeId], range: &ContentRange) -> String {
    let mut out = String::new();
    for id in nodes {
        let Some(text) = store.get_node(id).and_then(|node| node.text.as_deref()) else {
            continue;
        };
        let start = if *id == range.start_node { range.start_offset } else { 0 };
        let end = if *id == range.end_node { range.end_offset } else { text.len() };
        out.push_str(&text[start.min(end)..end]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::classify::{StructureShape, classify};
    use crate::input::hint::HintTracker;
    use crate::input::intent::InputType;
    use crate::model::{Direction, LogicalNode, ModelSelection, Position};
    use crate::store::MemoryStore;
    use crate::surface::{MemorySurface, SurfaceKey, render_document};
    use crate::tests::{hello_world, two_paragraphs};
    use pretty_assertions::assert_eq;

    fn text_below(surface: &MemorySurface, id: &str) -> SurfaceKey {
        let container = surface.find_container(&id.into()).unwrap();
        surface.first_text_below(container).unwrap()
    }

    fn selection(start: (&str, usize), end: (&str, usize)) -> ModelSelection {
        ModelSelection {
            anchor: Position::new(start.0, start.1),
            focus: Position::new(end.0, end.1),
            direction: Direction::Forward,
        }
    }

    #[test]
    fn typing_in_one_node_is_c1() {
        let store = hello_world();
        let mut surface = render_document(&store).unwrap();
        let hello = text_below(&surface, "t1");
        surface.splice_text(hello, 6, 0, "New ");
        let records = surface.take_records();

        let change = classify(&surface, &store, &records, &ClassifyContext::default());

        assert_eq!(change.case, ChangeCase::C1);
        assert_eq!(change.node_id, Some("t1".into()));
        assert_eq!(change.prev_text.as_deref(), Some("Hello World"));
        assert_eq!(change.new_text.as_deref(), Some("Hello New World"));
        assert_eq!(change.content_range, None);
    }

    #[test]
    fn matching_hint_supplies_clamped_range() {
        let store = hello_world();
        let mut surface = render_document(&store).unwrap();
        let hello = text_below(&surface, "t1");
        surface.splice_text(hello, 6, 0, "New ");
        let records = surface.take_records();
        let mut hints = HintTracker::default();
        hints.capture(InputType::InsertText, ContentRange::within("t1", 6, 40), Some("New ".into()));

        let ctx = ClassifyContext {
            hint: hints.validate(false),
            ..Default::default()
        };
        let change = classify(&surface, &store, &records, &ctx);

        assert!(change.metadata.used_hint);
        assert_eq!(change.content_range, Some(ContentRange::within("t1", 6, 11)));
    }

    #[test]
    fn character_change_alone_never_classifies_as_structure() {
        let store = two_paragraphs();
        let mut surface = render_document(&store).unwrap();
        let world = text_below(&surface, "t2");
        surface.set_text(world, "Worlds");
        let records = surface.take_records();

        let change = classify(&surface, &store, &records, &ClassifyContext::default());

        assert_eq!(change.case, ChangeCase::C1);
        assert_eq!(change.node_id, Some("t2".into()));
    }

    #[test]
    fn text_changes_in_two_nodes_are_not_c1() {
        let store = two_paragraphs();
        let mut surface = render_document(&store).unwrap();
        let hello = text_below(&surface, "t1");
        let world = text_below(&surface, "t2");
        surface.set_text(hello, "Hallo");
        surface.set_text(world, "Welt");
        let records = surface.take_records();

        assert_ne!(
            classify(&surface, &store, &records, &ClassifyContext::default()).case,
            ChangeCase::C1
        );
    }

    /// Select "lo" + "Wo" and type "X": the host rewrites t1 and drops t2's head.
    fn cross_node_edit() -> (MemorySurface, Vec<MutationRecord>) {
        let store = two_paragraphs();
        let mut surface = render_document(&store).unwrap();
        let hello = text_below(&surface, "t1");
        let world = text_below(&surface, "t2");
        let t2 = surface.find_container(&"t2".into()).unwrap();
        surface.splice_text(hello, 3, 2, "X");
        surface.remove(world);
        surface.text_node(t2, "rld");
        let records = surface.take_records();
        (surface, records)
    }

    #[test]
    fn selection_across_nodes_is_c2() {
        let store = two_paragraphs();
        let (surface, records) = cross_node_edit();
        let selected = selection(("t1", 3), ("t2", 2));
        let ctx = ClassifyContext {
            selection: Some(&selected),
            ..Default::default()
        };

        let change = classify(&surface, &store, &records, &ctx);

        assert_eq!(change.case, ChangeCase::C2);
        assert_eq!(change.content_range, Some(ContentRange::new("t1", 3, "t2", 2)));
        assert_eq!(change.prev_text.as_deref(), Some("loWo"));
        assert_eq!(change.new_text.as_deref(), Some("X"));
        assert!(!change.metadata.low_confidence);
    }

    #[test]
    fn c2_widens_when_untouched_text_changed() {
        let store = two_paragraphs();
        let (surface, records) = cross_node_edit();
        // claims "Hello" was kept whole, which the surface contradicts
        let selected = selection(("t1", 5), ("t2", 2));
        let ctx = ClassifyContext {
            selection: Some(&selected),
            ..Default::default()
        };

        let change = classify(&surface, &store, &records, &ctx);

        assert_eq!(change.case, ChangeCase::C2);
        assert!(change.metadata.low_confidence);
        assert_eq!(change.content_range, Some(ContentRange::new("t1", 0, "t2", 5)));
        assert_eq!(change.new_text.as_deref(), Some("HelXrld"));
    }

    #[test]
    fn c2_needs_a_selection_across_nodes() {
        let store = two_paragraphs();
        let (surface, records) = cross_node_edit();
        let caret = ModelSelection::caret("t1", 3);
        let ctx = ClassifyContext {
            selection: Some(&caret),
            ..Default::default()
        };

        assert_ne!(classify(&surface, &store, &records, &ctx).case, ChangeCase::C2);
    }

    #[test]
    fn block_added_beside_a_text_change_is_not_c1() {
        // Enter in the middle of "Hello World": the host truncates the text
        // and moves the tail into a fresh paragraph
        let mut store = MemoryStore::new();
        store
            .append_paragraph("p1", "paragraph", LogicalNode::text("t1", "Hello World"))
            .unwrap();
        let mut surface = render_document(&store).unwrap();
        let hello = text_below(&surface, "t1");
        surface.set_text(hello, "Hello");
        let root = surface.root();
        let tail = surface.element(root, "p", &[]);
        surface.text_node(tail, " World");
        let records = surface.take_records();

        let change = classify(&surface, &store, &records, &ClassifyContext::default());

        assert_eq!(change.case, ChangeCase::C3);
        assert_eq!(
            change.metadata.structure.map(|structure| structure.shape),
            Some(StructureShape::Split)
        );
    }

    #[test]
    fn matching_hint_outranks_the_selection_in_c2() {
        let store = two_paragraphs();
        let (surface, records) = cross_node_edit();
        // a stale selection that would widen the range on its own
        let selected = selection(("t1", 5), ("t2", 2));
        let mut hints = HintTracker::default();
        hints.capture(
            InputType::InsertText,
            ContentRange::new("t1", 3, "t2", 2),
            Some("X".into()),
        );
        let ctx = ClassifyContext {
            selection: Some(&selected),
            hint: hints.validate(false),
            ..Default::default()
        };

        let change = classify(&surface, &store, &records, &ctx);

        assert_eq!(change.case, ChangeCase::C2);
        assert!(change.metadata.used_hint);
        assert!(!change.metadata.low_confidence);
        assert_eq!(change.content_range, Some(ContentRange::new("t1", 3, "t2", 2)));
        assert_eq!(change.new_text.as_deref(), Some("X"));
    }
}
