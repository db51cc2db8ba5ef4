use crate::model::NodeId;
use crate::surface::{SurfaceKey, SurfaceTree};

/// An addressable container found on the surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub key: SurfaceKey,
    pub node_id: NodeId,
    pub is_text_container: bool,
}

/// Walks up from `key` (inclusive) to the nearest identity-bearing node.
///
/// A container explicitly marked as a text container wins over a generic
/// identity-bearing ancestor found earlier on the way up.
pub fn nearest_container<T: SurfaceTree + ?Sized>(surface: &T, key: SurfaceKey) -> Option<Container> {
    let mut fallback = None;
    let mut current = Some(key);
    while let Some(node) = current {
        if let Some(node_id) = surface.node_identity(node) {
            let is_text_container = surface.is_text_container(node);
            if is_text_container {
                return Some(Container {
                    key: node,
                    node_id,
                    is_text_container,
                });
            }
            if fallback.is_none() {
                fallback = Some(Container {
                    key: node,
                    node_id,
                    is_text_container,
                });
            }
        }
        current = surface.parent(node);
    }
    fallback
}
