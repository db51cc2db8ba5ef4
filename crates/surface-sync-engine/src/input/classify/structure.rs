//! C3: blocks added to or removed from a block-group container.

use crate::input::classify::{
    ChangeCase, ClassifiedChange, StructureChange, StructureShape, is_structural_child,
};
use crate::model::NodeId;
use crate::store::NodeStore;
use crate::surface::{MutationRecord, SurfaceKey, SurfaceTree, nearest_container};

pub(super) fn block_change<T, S>(
    surface: &T,
    store: &S,
    mutations: &[MutationRecord],
) -> Option<ClassifiedChange>
where
    T: SurfaceTree + ?Sized,
    S: NodeStore + ?Sized,
{
    let mut targets: Vec<NodeId> = Vec::new();
    let mut added: Vec<SurfaceKey> = Vec::new();
    let mut removed: Vec<SurfaceKey> = Vec::new();

    for mutation in mutations.iter().filter(|mutation| mutation.is_structural()) {
        let Some(container) = nearest_container(surface, mutation.target) else {
            continue;
        };
        if !store.is_block_group(&container.node_id) {
            continue;
        }
        let (mutation_added, mutation_removed) = mutation.touched_children();
        let is_block = |key: &&SurfaceKey| is_structural_child(surface, store, **key);
        added.extend(mutation_added.iter().filter(is_block));
        removed.extend(mutation_removed.iter().filter(is_block));
        if !targets.contains(&container.node_id) {
            targets.push(container.node_id);
        }
    }

    // moved elements show up as removed then added; only net changes count
    let net_added: Vec<SurfaceKey> = added
        .iter()
        .filter(|key| !removed.contains(key))
        .copied()
        .collect();
    let net_removed: Vec<SurfaceKey> = removed
        .iter()
        .filter(|key| !added.contains(key))
        .copied()
        .collect();

    let shape = match (net_added.len(), net_removed.len()) {
        (0, 0) => return None,
        (1, 0) => StructureShape::Split,
        (_, 0) => StructureShape::Insert,
        (0, _) => StructureShape::Merge,
        _ => StructureShape::Unknown,
    };

    let ids = |keys: &[SurfaceKey]| -> Vec<NodeId> {
        let mut ids = Vec::new();
        for key in keys {
            if let Some(id) = surface.node_identity(*key)
                && !ids.contains(&id)
            {
                ids.push(id);
            }
        }
        ids
    };

    let mut change = ClassifiedChange::new(ChangeCase::C3, mutations);
    change.node_id = targets.first().cloned();
    change.metadata.structure = Some(StructureChange {
        shape,
        targets,
        added: ids(&net_added),
        removed: ids(&net_removed),
    });
    Some(change)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::classify::{ClassifyContext, classify};
    use crate::surface::{MemorySurface, NODE_ID_ATTR, render_document};
    use crate::tests::two_paragraphs;
    use pretty_assertions::assert_eq;

    fn structure(surface: &MemorySurface, records: &[MutationRecord]) -> ClassifiedChange {
        classify(surface, &two_paragraphs(), records, &ClassifyContext::default())
    }

    #[test]
    fn one_new_paragraph_is_a_split() {
        let mut surface = render_document(&two_paragraphs()).unwrap();
        let root = surface.root();
        let p = surface.element(root, "p", &[]);
        surface.text_node(p, "tail");
        let records = surface.take_records();

        let change = structure(&surface, &records);

        assert_eq!(change.case, ChangeCase::C3);
        assert_eq!(change.node_id, Some("doc".into()));
        assert_eq!(change.metadata.structure.unwrap().shape, StructureShape::Split);
    }

    #[test]
    fn several_new_blocks_are_an_insert() {
        let mut surface = render_document(&two_paragraphs()).unwrap();
        let root = surface.root();
        surface.element(root, "p", &[]);
        surface.element(root, "p", &[]);
        let records = surface.take_records();

        let change = structure(&surface, &records).metadata.structure.unwrap();

        assert_eq!(change.shape, StructureShape::Insert);
    }

    #[test]
    fn removed_block_is_a_merge_and_keeps_ids() {
        let mut surface = render_document(&two_paragraphs()).unwrap();
        let p2 = surface.find_container(&"p2".into()).unwrap();
        surface.remove(p2);
        let records = surface.take_records();

        let change = structure(&surface, &records).metadata.structure.unwrap();

        assert_eq!(
            change,
            StructureChange {
                shape: StructureShape::Merge,
                targets: vec!["doc".into()],
                added: Vec::new(),
                removed: vec!["p2".into()],
            }
        );
    }

    #[test]
    fn replace_is_recorded_as_unknown_shape() {
        let mut surface = render_document(&two_paragraphs()).unwrap();
        let root = surface.root();
        let p2 = surface.find_container(&"p2".into()).unwrap();
        surface.remove(p2);
        surface.element(root, "p", &[(NODE_ID_ATTR, "p9")]);
        let records = surface.take_records();

        let change = structure(&surface, &records).metadata.structure.unwrap();

        assert_eq!(change.shape, StructureShape::Unknown);
        assert_eq!(change.added, vec![NodeId::from("p9")]);
    }

    #[test]
    fn moving_a_block_is_not_structural() {
        let mut surface = render_document(&two_paragraphs()).unwrap();
        let root = surface.root();
        let p1 = surface.find_container(&"p1".into()).unwrap();
        surface.append_child(root, p1);
        let records = surface.take_records();

        assert_eq!(structure(&surface, &records).case, ChangeCase::Unknown);
    }
}
