//! Conversion between surface selections and model selections.
//!
//! A surface point is `(physical node, local offset)`: a character offset for
//! text nodes, a child index for elements. A model point is
//! `(logical node, offset into its text)`. The run index bridges the two no
//! matter how many spans currently back the logical node.

use std::cmp::Ordering;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::editing::run_index::{RunIndex, RunIndexOptions};
use crate::model::{Direction, ModelSelection, NodeId, Position, floor_char_boundary};
use crate::store::NodeStore;
use crate::surface::{SurfaceKey, SurfaceTree, nearest_container};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SurfacePoint {
    pub key: SurfaceKey,
    pub offset: usize,
}

impl SurfacePoint {
    pub fn new(key: SurfaceKey, offset: usize) -> Self {
        Self { key, offset }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SurfaceSelection {
    pub anchor: SurfacePoint,
    pub focus: SurfacePoint,
    /// Direction reported by the host, when it knows it.
    pub direction: Option<Direction>,
}

impl SurfaceSelection {
    pub fn caret(key: SurfaceKey, offset: usize) -> Self {
        let at = SurfacePoint::new(key, offset);
        Self {
            anchor: at,
            focus: at,
            direction: None,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    Start,
    End,
}

/// Converts a surface selection into model coordinates.
///
/// `None` when either endpoint sits outside every addressable container or
/// resolves to a node the model does not know.
pub fn to_model<T, S>(surface: &T, store: &S, selection: &SurfaceSelection) -> Option<ModelSelection>
where
    T: SurfaceTree + ?Sized,
    S: NodeStore + ?Sized,
{
    let anchor = resolve_point(surface, store, selection.anchor)?;
    let focus = if selection.is_collapsed() {
        anchor.clone()
    } else {
        resolve_point(surface, store, selection.focus)?
    };

    let direction = selection.direction.unwrap_or_else(|| {
        let order = if anchor.node_id == focus.node_id {
            anchor.offset.cmp(&focus.offset)
        } else {
            surface.compare_order(selection.anchor.key, selection.focus.key)
        };
        match order {
            Ordering::Greater => Direction::Backward,
            _ => Direction::Forward,
        }
    });

    Some(ModelSelection {
        anchor,
        focus,
        direction,
    })
}

/// Converts a model selection into surface points for the host to apply.
pub fn to_surface<T, S>(surface: &T, store: &S, selection: &ModelSelection) -> Option<SurfaceSelection>
where
    T: SurfaceTree + ?Sized,
    S: NodeStore + ?Sized,
{
    let anchor = surface_point(surface, store, &selection.anchor)?;
    let focus = surface_point(surface, store, &selection.focus)?;
    Some(SurfaceSelection {
        anchor,
        focus,
        direction: Some(selection.direction),
    })
}

fn resolve_point<T, S>(surface: &T, store: &S, point: SurfacePoint) -> Option<Position>
where
    T: SurfaceTree + ?Sized,
    S: NodeStore + ?Sized,
{
    let container = nearest_container(surface, point.key)?;
    let Some(node) = store.get_node(&container.node_id) else {
        debug!("selection endpoint in {} which the model does not have", container.node_id);
        return None;
    };

    if let Some(text) = &node.text {
        let runs = RunIndex::build(surface, container.key, Some(&node.id), RunIndexOptions::default());
        let offset = floor_char_boundary(text, runs.to_global_offset(surface, point.key, point.offset));
        return Some(Position::new(node.id.clone(), offset));
    }

    let edge = if point.offset == 0 && (point.key == container.key || surface.text(point.key).is_some()) {
        Edge::Start
    } else {
        Edge::End
    };
    block_edge(store, &node.id, edge)
}

/// Caret at the start or end of a structural node's text.
fn block_edge<S: NodeStore + ?Sized>(store: &S, id: &NodeId, edge: Edge) -> Option<Position> {
    match edge {
        Edge::Start => store
            .first_text_descendant(id)
            .map(|text| Position::new(text, 0)),
        Edge::End => {
            let text = store.last_text_descendant(id)?;
            let len = store.get_node(&text)?.text_len();
            Some(Position::new(text, len))
        }
    }
}

fn surface_point<T, S>(surface: &T, store: &S, position: &Position) -> Option<SurfacePoint>
where
    T: SurfaceTree + ?Sized,
    S: NodeStore + ?Sized,
{
    let node = store.text_node(&position.node_id).ok()?;
    let container = surface.find_container(&node.id)?;
    let runs = RunIndex::build(surface, container, Some(&node.id), RunIndexOptions::default());
    match runs.locate(position.offset) {
        Some((key, local)) => Some(SurfacePoint::new(key, local)),
        // no text on the surface yet: park the caret before the first child
        None => Some(SurfacePoint::new(container, 0)),
    }
}
