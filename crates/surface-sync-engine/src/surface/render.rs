//! Minimal model → surface renderer.
//!
//! Production hosts bring their own renderer; this one produces the marker
//! attributes the rest of the engine relies on so the pipeline can be
//! driven end-to-end without a host.

use crate::error::Result;
use crate::model::{LogicalNode, MarkKind, NodeGroup};
use crate::store::NodeStore;
use crate::surface::{
    DECORATOR_ATTR, MemorySurface, NODE_ID_ATTR, SurfaceKey, SurfaceTree, TEXT_CONTAINER_ATTR,
};

/// Renders the whole document into a fresh surface with no pending records.
pub fn render_document<S: NodeStore + ?Sized>(store: &S) -> Result<MemorySurface> {
    let mut surface = MemorySurface::new();
    let root = store.node(store.root())?;
    let host = surface.root();
    surface.set_attribute(host, NODE_ID_ATTR, store.root().as_str());
    for child in &root.children {
        render_node(store, &mut surface, host, store.node(child)?)?;
    }
    surface.take_records();
    Ok(surface)
}

fn render_node<S: NodeStore + ?Sized>(
    store: &S,
    surface: &mut MemorySurface,
    parent: SurfaceKey,
    node: &LogicalNode,
) -> Result<()> {
    if let Some(text) = &node.text {
        let span = surface.element(
            parent,
            "span",
            &[(NODE_ID_ATTR, node.id.as_str()), (TEXT_CONTAINER_ATTR, "true")],
        );
        render_marked_text(surface, span, text, node);
        return Ok(());
    }

    let group = store.schema().group_of(&node.node_type)?;
    let tag = match (group, node.node_type.as_str()) {
        (NodeGroup::Block, "heading") => "h2",
        (NodeGroup::Block, "list_item") => "li",
        (NodeGroup::Block, "blockquote") => "blockquote",
        (NodeGroup::Block, "code_block") => "pre",
        (NodeGroup::Block, _) => "p",
        (NodeGroup::Inline, "link") => "a",
        _ => "div",
    };
    let element = surface.element(parent, tag, &[(NODE_ID_ATTR, node.id.as_str())]);
    for child in &node.children {
        render_node(store, surface, element, store.node(child)?)?;
    }
    if group == NodeGroup::Block && store.first_text_descendant(&node.id).is_none_or(|id| {
        store.get_node(&id).is_some_and(|text| text.text_len() == 0)
    }) {
        surface.element(element, "br", &[(DECORATOR_ATTR, "true")]);
    }
    Ok(())
}

/// Splits text at every mark boundary and wraps each segment in its marks.
fn render_marked_text(surface: &mut MemorySurface, span: SurfaceKey, text: &str, node: &LogicalNode) {
    let mut boundaries = vec![0, text.len()];
    for mark in &node.marks {
        boundaries.push(mark.span.start.min(text.len()));
        boundaries.push(mark.span.end.min(text.len()));
    }
    boundaries.sort_unstable();
    boundaries.dedup();

    for window in boundaries.windows(2) {
        let (start, end) = (window[0], window[1]);
        if start >= end || !text.is_char_boundary(start) || !text.is_char_boundary(end) {
            continue;
        }
        let mut parent = span;
        for mark in &node.marks {
            if mark.span.start <= start && end <= mark.span.end {
                let tag = match MarkKind::parse(&mark.kind) {
                    Some(MarkKind::Bold) => "strong",
                    Some(MarkKind::Italic) => "em",
                    Some(MarkKind::Underline) => "u",
                    Some(MarkKind::Strikethrough) => "s",
                    None => continue,
                };
                parent = surface.element(parent, tag, &[]);
            }
        }
        surface.text_node(parent, &text[start..end]);
    }
}
