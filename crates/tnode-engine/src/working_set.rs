//! The per-run working set: test resources keyed by their entity name,
//! in the order directives first produced them. A test resource name is held
//! by at most one record, since it determines the stored test resource id.

use indexmap::IndexMap;
use tnode_core::{NodeId, WorkingEntityRecord};

#[derive(Debug, Clone)]
pub struct WorkingSet {
    node_id: NodeId,
    entries: IndexMap<String, WorkingEntityRecord>,
}

impl WorkingSet {
    pub fn new(node_id: NodeId) -> Self {
        Self {
            node_id,
            entries: IndexMap::new(),
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert or overwrite the record under its entity name. Returns the key.
    ///
    /// A record under another key with the same test resource name is
    /// dropped; the later directive wins.
    pub fn insert(&mut self, record: WorkingEntityRecord) -> String {
        let key = record.entity_name.clone();
        let same_name = self
            .entries
            .iter()
            .position(|(k, r)| *k != key && r.test_resource_name == record.test_resource_name);
        if let Some(index) = same_name {
            if let Some((previous, _)) = self.entries.shift_remove_index(index) {
                tracing::debug!(
                    node_id = %self.node_id,
                    test_resource = %record.test_resource_name,
                    previous = %previous,
                    "test resource name taken over by a new entity"
                );
            }
        }
        if self.entries.insert(key.clone(), record).is_some() {
            tracing::debug!(node_id = %self.node_id, key = %key, "working entity overwritten");
        }
        key
    }

    pub fn get(&self, key: &str) -> Option<&WorkingEntityRecord> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut WorkingEntityRecord> {
        self.entries.get_mut(key)
    }

    /// Key of the record named `name`: by entity name first, then by test
    /// resource name.
    pub fn find_key(&self, name: &str) -> Option<String> {
        if self.entries.contains_key(name) {
            return Some(name.to_string());
        }
        self.entries
            .iter()
            .find(|(_, r)| r.test_resource_name == name)
            .map(|(k, _)| k.clone())
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Move the record at `key` to the key its (possibly changed) entity
    /// name implies, keeping its position. Returns the new key.
    pub fn rekey(&mut self, key: &str) -> String {
        let Some(index) = self.entries.get_index_of(key) else {
            return key.to_string();
        };
        let new_key = self.entries[index].entity_name.clone();
        if new_key == key {
            return new_key;
        }
        let Some((_, record)) = self.entries.shift_remove_index(index) else {
            return key.to_string();
        };
        if self.entries.shift_remove(&new_key).is_some() {
            tracing::warn!(
                node_id = %self.node_id,
                from = key,
                to = %new_key,
                "root replacement collided with an existing test resource; the existing one was dropped"
            );
        }
        let index = index.min(self.entries.len());
        self.entries.shift_insert(index, new_key.clone(), record);
        new_key
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorkingEntityRecord> {
        self.entries.values()
    }

    pub fn into_records(self) -> Vec<WorkingEntityRecord> {
        self.entries.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tnode_core::{DependencyTreeNode, EntityType};

    fn record(name: &str, test_resource_name: &str) -> WorkingEntityRecord {
        WorkingEntityRecord::new(
            NodeId(1),
            test_resource_name,
            vec![DependencyTreeNode::leaf(format!("id-{name}"), name, EntityType::Resource)],
        )
    }

    #[test]
    fn insert_overwrites_same_entity() {
        let mut set = WorkingSet::new(NodeId(1));
        set.insert(record("a/x", "first"));
        set.insert(record("a/x", "second"));
        assert_eq!(set.len(), 1);
        assert_eq!(set.get("a/x").unwrap().test_resource_name, "second");
    }

    #[test]
    fn insert_under_a_taken_test_resource_name_replaces_the_holder() {
        let mut set = WorkingSet::new(NodeId(1));
        set.insert(record("a/x", "novel"));
        set.insert(record("a/other", "other"));
        set.insert(record("a/y", "novel"));
        assert_eq!(set.keys(), ["a/other", "a/y"]);
        let ids: Vec<_> = set.iter().map(|r| r.test_resource_id.clone()).collect();
        assert_ne!(ids[0], ids[1]);
    }

    #[test]
    fn find_key_falls_back_to_test_resource_name() {
        let mut set = WorkingSet::new(NodeId(1));
        set.insert(record("a/x", "My X"));
        assert_eq!(set.find_key("a/x").as_deref(), Some("a/x"));
        assert_eq!(set.find_key("My X").as_deref(), Some("a/x"));
        assert!(set.find_key("nope").is_none());
    }

    #[test]
    fn rekey_keeps_position() {
        let mut set = WorkingSet::new(NodeId(1));
        set.insert(record("a/one", "one"));
        set.insert(record("a/two", "two"));
        set.insert(record("a/three", "three"));

        let two = set.get_mut("a/two").unwrap();
        two.dependency_tree[0] = DependencyTreeNode::leaf("id-b", "b/two", EntityType::Resource);
        two.sync_identity_with_root();

        assert_eq!(set.rekey("a/two"), "b/two");
        assert_eq!(set.keys(), ["a/one", "b/two", "a/three"]);
        assert_eq!(set.get("b/two").unwrap().test_resource_name, "two");
    }
}
