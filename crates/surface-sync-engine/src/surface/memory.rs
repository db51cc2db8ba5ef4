use std::collections::BTreeMap;

use crate::surface::{MutationRecord, SurfaceKey, SurfaceTree};

#[derive(Debug, Clone, PartialEq)]
enum SlotData {
    Element {
        tag: String,
        attributes: BTreeMap<String, String>,
    },
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
struct Slot {
    data: SlotData,
    parent: Option<SurfaceKey>,
    children: Vec<SurfaceKey>,
}

/// Arena-backed surface tree that records its own mutations.
///
/// Only changes to nodes connected under the root are recorded, matching
/// what a subtree observer on the editable host would deliver. Removed
/// nodes stay in the arena so records can still be inspected after the fact.
#[derive(Debug, Clone, PartialEq)]
pub struct MemorySurface {
    slots: Vec<Slot>,
    root: SurfaceKey,
    records: Vec<MutationRecord>,
}

impl MemorySurface {
    /// A surface whose root is an empty `div` editing host.
    pub fn new() -> Self {
        let root = Slot {
            data: SlotData::Element {
                tag: "div".to_string(),
                attributes: BTreeMap::new(),
            },
            parent: None,
            children: Vec::new(),
        };
        Self {
            slots: vec![root],
            root: SurfaceKey(0),
            records: Vec::new(),
        }
    }

    pub fn create_element(&mut self, tag: &str) -> SurfaceKey {
        self.push(SlotData::Element {
            tag: tag.to_ascii_lowercase(),
            attributes: BTreeMap::new(),
        })
    }

    pub fn create_text(&mut self, text: &str) -> SurfaceKey {
        self.push(SlotData::Text(text.to_string()))
    }

    /// Creates an element with attributes and appends it to `parent`.
    pub fn element(&mut self, parent: SurfaceKey, tag: &str, attributes: &[(&str, &str)]) -> SurfaceKey {
        let key = self.create_element(tag);
        for (name, value) in attributes {
            self.set_attribute(key, name, value);
        }
        self.append_child(parent, key);
        key
    }

    /// Creates a text node and appends it to `parent`.
    pub fn text_node(&mut self, parent: SurfaceKey, text: &str) -> SurfaceKey {
        let key = self.create_text(text);
        self.append_child(parent, key);
        key
    }

    pub fn append_child(&mut self, parent: SurfaceKey, child: SurfaceKey) {
        self.insert_before(parent, child, None);
    }

    /// Inserts `child` into `parent` before `reference`, or last when `None`.
    pub fn insert_before(&mut self, parent: SurfaceKey, child: SurfaceKey, reference: Option<SurfaceKey>) {
        if self.slot(parent).is_none() || self.slot(child).is_none() {
            return;
        }
        self.remove(child);
        let Some(parent_slot) = self.slot_mut(parent) else {
            return;
        };
        let index = reference
            .and_then(|reference| parent_slot.children.iter().position(|c| *c == reference))
            .unwrap_or(parent_slot.children.len());
        parent_slot.children.insert(index, child);
        if let Some(child_slot) = self.slot_mut(child) {
            child_slot.parent = Some(parent);
        }
        self.record(parent, || MutationRecord::child_list(parent, vec![child], Vec::new()));
    }

    /// Detaches `child` from its parent, returning the former parent.
    pub fn remove(&mut self, child: SurfaceKey) -> Option<SurfaceKey> {
        let parent = self.slot(child)?.parent?;
        if let Some(parent_slot) = self.slot_mut(parent) {
            parent_slot.children.retain(|c| *c != child);
        }
        if let Some(child_slot) = self.slot_mut(child) {
            child_slot.parent = None;
        }
        self.record(parent, || MutationRecord::child_list(parent, Vec::new(), vec![child]));
        Some(parent)
    }

    pub fn set_text(&mut self, key: SurfaceKey, text: &str) {
        let Some(Slot {
            data: SlotData::Text(current),
            ..
        }) = self.slot_mut(key)
        else {
            return;
        };
        *current = text.to_string();
        self.record(key, || MutationRecord::character_data(key));
    }

    /// Splices a text node's data the way native typing does.
    pub fn splice_text(&mut self, key: SurfaceKey, offset: usize, delete: usize, insert: &str) {
        let Some(current) = self.text(key) else {
            return;
        };
        let offset = offset.min(current.len());
        let end = (offset + delete).min(current.len());
        let mut updated = String::with_capacity(current.len() + insert.len());
        updated.push_str(&current[..offset]);
        updated.push_str(insert);
        updated.push_str(&current[end..]);
        self.set_text(key, &updated);
    }

    pub fn set_attribute(&mut self, key: SurfaceKey, name: &str, value: &str) {
        let Some(Slot {
            data: SlotData::Element { attributes, .. },
            ..
        }) = self.slot_mut(key)
        else {
            return;
        };
        attributes.insert(name.to_string(), value.to_string());
        self.record(key, || MutationRecord::attributes(key, name));
    }

    pub fn remove_attribute(&mut self, key: SurfaceKey, name: &str) {
        let Some(Slot {
            data: SlotData::Element { attributes, .. },
            ..
        }) = self.slot_mut(key)
        else {
            return;
        };
        if attributes.remove(name).is_some() {
            self.record(key, || MutationRecord::attributes(key, name));
        }
    }

    /// Drains the mutation records observed since the last call.
    pub fn take_records(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.records)
    }

    /// First text node below `key` in document order.
    pub fn first_text_below(&self, key: SurfaceKey) -> Option<SurfaceKey> {
        if self.text(key).is_some() {
            return Some(key);
        }
        self.children(key)
            .iter()
            .find_map(|child| self.first_text_below(*child))
    }

    fn push(&mut self, data: SlotData) -> SurfaceKey {
        let key = SurfaceKey(self.slots.len() as u32);
        self.slots.push(Slot {
            data,
            parent: None,
            children: Vec::new(),
        });
        key
    }

    fn record(&mut self, key: SurfaceKey, make: impl FnOnce() -> MutationRecord) {
        if self.is_connected(key) {
            self.records.push(make());
        }
    }

    fn slot(&self, key: SurfaceKey) -> Option<&Slot> {
        self.slots.get(key.0 as usize)
    }

    fn slot_mut(&mut self, key: SurfaceKey) -> Option<&mut Slot> {
        self.slots.get_mut(key.0 as usize)
    }
}

impl Default for MemorySurface {
    fn default() -> Self {
        Self::new()
    }
}

impl SurfaceTree for MemorySurface {
    fn root(&self) -> SurfaceKey {
        self.root
    }

    fn parent(&self, key: SurfaceKey) -> Option<SurfaceKey> {
        self.slot(key)?.parent
    }

    fn children(&self, key: SurfaceKey) -> &[SurfaceKey] {
        self.slot(key).map_or(&[], |slot| slot.children.as_slice())
    }

    fn text(&self, key: SurfaceKey) -> Option<&str> {
        match &self.slot(key)?.data {
            SlotData::Text(text) => Some(text),
            SlotData::Element { .. } => None,
        }
    }

    fn tag(&self, key: SurfaceKey) -> Option<&str> {
        match &self.slot(key)?.data {
            SlotData::Element { tag, .. } => Some(tag),
            SlotData::Text(_) => None,
        }
    }

    fn attribute(&self, key: SurfaceKey, name: &str) -> Option<&str> {
        match &self.slot(key)?.data {
            SlotData::Element { attributes, .. } => attributes.get(name).map(String::as_str),
            SlotData::Text(_) => None,
        }
    }
}
