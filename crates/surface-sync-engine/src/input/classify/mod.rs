//! Mutation-batch classification.
//!
//! One batch of surface mutations is matched against the cases below in
//! fixed priority order; the first match wins:
//!
//! | case | meaning |
//! |------|---------|
//! | `C1` | text changed inside one text node |
//! | `C2` | text changed across the two nodes of a non-collapsed selection |
//! | `C3` | blocks were added or removed |
//! | `C4` | inline style elements or attributes changed |
//! | `IME_INTERMEDIATE` | nothing matched while a composition is running |
//! | `UNKNOWN` | nothing matched |
//!
//! Classification only reads the surface and the store. It never fails: a
//! batch that cannot be explained is `UNKNOWN`.

mod marks;
mod structure;
mod text;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::input::hint::InputHint;
use crate::model::{ContentRange, LogicalNode, MarkKind, ModelSelection, NodeId, Span};
use crate::store::NodeStore;
use crate::surface::{Container, MutationRecord, SurfaceKey, SurfaceTree, nearest_container};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeCase {
    C1,
    C2,
    C3,
    C4,
    ImeIntermediate,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureShape {
    /// One block appeared: the host split a paragraph.
    Split,
    /// Several blocks appeared.
    Insert,
    /// Blocks disappeared: the host merged them.
    Merge,
    /// Blocks both appeared and disappeared.
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureChange {
    pub shape: StructureShape,
    /// Block-group nodes whose children changed.
    pub targets: Vec<NodeId>,
    pub added: Vec<NodeId>,
    pub removed: Vec<NodeId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSource {
    Tag,
    Style,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkAction {
    Add,
    Remove,
}

/// A style the host applied to (or removed from) a text node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkSignal {
    pub node_id: NodeId,
    pub mark: MarkKind,
    pub source: SignalSource,
    pub action: MarkAction,
    /// Affected part of the node's text; `None` means the whole node.
    pub span: Option<Span>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeMetadata {
    #[serde(default)]
    pub used_hint: bool,
    /// The edited range could not be narrowed and covers whole nodes.
    #[serde(default)]
    pub low_confidence: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structure: Option<StructureChange>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub marks: Vec<MarkSignal>,
}

/// The classifier's verdict on one mutation batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedChange {
    pub case: ChangeCase,
    pub node_id: Option<NodeId>,
    pub content_range: Option<ContentRange>,
    pub prev_text: Option<String>,
    pub new_text: Option<String>,
    pub mutations: Vec<MutationRecord>,
    pub metadata: ChangeMetadata,
}

impl ClassifiedChange {
    fn new(case: ChangeCase, mutations: &[MutationRecord]) -> Self {
        Self {
            case,
            node_id: None,
            content_range: None,
            prev_text: None,
            new_text: None,
            mutations: mutations.to_vec(),
            metadata: ChangeMetadata::default(),
        }
    }

    pub fn is_text_change(&self) -> bool {
        matches!(self.case, ChangeCase::C1 | ChangeCase::C2)
    }
}

/// What the classifier knows besides the batch itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassifyContext<'a> {
    /// Model selection from before the surface mutated.
    pub selection: Option<&'a ModelSelection>,
    /// A validated hint; callers pass `None` while composing.
    pub hint: Option<&'a InputHint>,
    pub is_composing: bool,
}

/// Classifies one mutation batch.
pub fn classify<T, S>(
    surface: &T,
    store: &S,
    mutations: &[MutationRecord],
    ctx: &ClassifyContext<'_>,
) -> ClassifiedChange
where
    T: SurfaceTree + ?Sized,
    S: NodeStore + ?Sized,
{
    let change = text::single_node(surface, store, mutations, ctx)
        .or_else(|| text::cross_node(surface, store, mutations, ctx))
        .or_else(|| structure::block_change(surface, store, mutations))
        .or_else(|| marks::mark_change(surface, store, mutations))
        .unwrap_or_else(|| {
            let case = if ctx.is_composing {
                ChangeCase::ImeIntermediate
            } else {
                ChangeCase::Unknown
            };
            ClassifiedChange::new(case, mutations)
        });
    debug!(
        "classified {} mutation(s) as {:?} on {}",
        mutations.len(),
        change.case,
        change.node_id.as_ref().map_or("-", NodeId::as_str)
    );
    change
}

/// Tags that always delimit blocks on the surface.
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "li", "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6", "blockquote", "pre",
    "section", "article", "table", "tr",
];

/// An added or removed element that changes block structure.
fn is_structural_child<T, S>(surface: &T, store: &S, key: SurfaceKey) -> bool
where
    T: SurfaceTree + ?Sized,
    S: NodeStore + ?Sized,
{
    if surface.tag(key).is_some_and(|tag| BLOCK_TAGS.contains(&tag)) {
        return true;
    }
    surface
        .node_identity(key)
        .is_some_and(|id| store.is_block_group(&id))
}

/// The nearest container of `key` when it holds a text node the model knows.
fn text_container<'s, T, S>(surface: &T, store: &'s S, key: SurfaceKey) -> Option<(Container, &'s LogicalNode)>
where
    T: SurfaceTree + ?Sized,
    S: NodeStore + ?Sized,
{
    let container = nearest_container(surface, key)?;
    let node = store.get_node(&container.node_id).filter(|node| node.is_text())?;
    Some((container, node))
}
