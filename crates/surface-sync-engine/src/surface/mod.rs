//! Host surface abstraction.
//!
//! The classifier, run index and selection bridge only see the surface
//! through [`SurfaceTree`]: a read-only view of the host's physical node tree
//! plus the marker attributes the renderer writes onto it. [`MemorySurface`]
//! is an arena-backed implementation that also records mutations the way a
//! host observer would.

pub mod memory;
pub mod mutation;
pub mod render;
pub mod resolve;

pub use memory::MemorySurface;
pub use mutation::{MutationKind, MutationRecord};
pub use render::render_document;
pub use resolve::{Container, nearest_container};

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::model::NodeId;

/// Attribute carrying the logical node id of an addressable container.
pub const NODE_ID_ATTR: &str = "data-node-id";
/// Attribute marking a container whose runs make up a text node's text.
pub const TEXT_CONTAINER_ATTR: &str = "data-text-container";
/// Attribute marking decoration-only subtrees excluded from text.
pub const DECORATOR_ATTR: &str = "data-decorator";

/// Handle to one physical node on the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SurfaceKey(pub u32);

/// Read access to the host's physical tree.
pub trait SurfaceTree {
    fn root(&self) -> SurfaceKey;
    fn parent(&self, key: SurfaceKey) -> Option<SurfaceKey>;
    fn children(&self, key: SurfaceKey) -> &[SurfaceKey];
    /// Character data of a text node; `None` for elements.
    fn text(&self, key: SurfaceKey) -> Option<&str>;
    /// Lower-case tag name of an element; `None` for text nodes.
    fn tag(&self, key: SurfaceKey) -> Option<&str>;
    fn attribute(&self, key: SurfaceKey, name: &str) -> Option<&str>;

    fn node_identity(&self, key: SurfaceKey) -> Option<NodeId> {
        self.attribute(key, NODE_ID_ATTR).map(NodeId::from)
    }

    fn is_text_container(&self, key: SurfaceKey) -> bool {
        self.attribute(key, TEXT_CONTAINER_ATTR)
            .is_some_and(|value| value != "false")
    }

    fn is_decoration(&self, key: SurfaceKey) -> bool {
        self.attribute(key, DECORATOR_ATTR)
            .is_some_and(|value| value != "false")
    }

    /// True when `key` is attached under the surface root.
    fn is_connected(&self, key: SurfaceKey) -> bool {
        let root = self.root();
        let mut current = Some(key);
        while let Some(node) = current {
            if node == root {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    /// True when `ancestor` contains `key` (or is `key`).
    fn contains(&self, ancestor: SurfaceKey, key: SurfaceKey) -> bool {
        let mut current = Some(key);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    /// Document (pre-)order of two nodes; ancestors precede descendants.
    fn compare_order(&self, a: SurfaceKey, b: SurfaceKey) -> Ordering {
        if a == b {
            return Ordering::Equal;
        }
        let path_a = index_path(self, a);
        let path_b = index_path(self, b);
        path_a.cmp(&path_b)
    }

    /// The container carrying `node_id`'s identity, searching from the root.
    fn find_container(&self, node_id: &NodeId) -> Option<SurfaceKey> {
        let mut stack = vec![self.root()];
        while let Some(key) = stack.pop() {
            if self.attribute(key, NODE_ID_ATTR) == Some(node_id.as_str()) {
                return Some(key);
            }
            stack.extend(self.children(key).iter().rev().copied());
        }
        None
    }

    /// All character data below `key`, including decorations.
    fn text_content(&self, key: SurfaceKey) -> String {
        let mut out = String::new();
        let mut stack = vec![key];
        while let Some(node) = stack.pop() {
            if let Some(text) = self.text(node) {
                out.push_str(text);
            }
            stack.extend(self.children(node).iter().rev().copied());
        }
        out
    }
}

/// Child indices from the topmost ancestor down to `key`.
///
/// Detached subtrees compare by their own top ancestor, which keeps the
/// ordering total without claiming they sit inside the document.
fn index_path<T: SurfaceTree + ?Sized>(surface: &T, key: SurfaceKey) -> Vec<usize> {
    let mut path = Vec::new();
    let mut current = key;
    while let Some(parent) = surface.parent(current) {
        let index = surface
            .children(parent)
            .iter()
            .position(|child| *child == current)
            .unwrap_or(0);
        path.push(index);
        current = parent;
    }
    path.reverse();
    path
}
