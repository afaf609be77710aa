use super::NodeId;
use std::hash::{Hash, Hasher};

/// Identity shared by sibling nodes with the same tag or structure name.
///
/// Two keys are equal when their names are equal. The precedence is the
/// position of the addressed line in the parent's schema block and only
/// decides where a new sibling group is placed.
#[derive(Debug, Clone)]
pub struct NodeKey {
    name: String,
    precedence: Option<usize>,
}

impl NodeKey {
    pub fn new(name: impl Into<String>, precedence: Option<usize>) -> Self {
        NodeKey {
            name: name.into(),
            precedence,
        }
    }

    /// Sentinel key of the synthetic root, which nothing can address
    pub fn root() -> Self {
        NodeKey {
            name: String::new(),
            precedence: None,
        }
    }

    pub fn is_root(&self) -> bool {
        self.name.is_empty()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn precedence(&self) -> Option<usize> {
        self.precedence
    }

    /// Keys without precedence keep insertion order after all ranked keys
    pub fn sorts_before(&self, other: &NodeKey) -> bool {
        match (self.precedence, other.precedence) {
            (Some(a), Some(b)) => a < b,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }
}

impl PartialEq for NodeKey {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for NodeKey {}

impl Hash for NodeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

/// Children of one node: sibling groups ordered by key precedence, each
/// group in insertion order.
#[derive(Debug, Clone, Default)]
pub(crate) struct ChildGroups {
    groups: Vec<(NodeKey, Vec<NodeId>)>,
}

impl ChildGroups {
    pub fn get(&self, name: &str) -> &[NodeId] {
        self.groups
            .iter()
            .find(|(key, _)| key.name() == name)
            .map(|(_, ids)| ids.as_slice())
            .unwrap_or(&[])
    }

    pub fn push(&mut self, key: NodeKey, id: NodeId) {
        if let Some((_, ids)) = self.groups.iter_mut().find(|(existing, _)| *existing == key) {
            ids.push(id);
            return;
        }
        let position = self
            .groups
            .iter()
            .position(|(existing, _)| key.sorts_before(existing))
            .unwrap_or(self.groups.len());
        self.groups.insert(position, (key, vec![id]));
    }

    /// Remove `id` from its group; empty groups disappear
    pub fn remove(&mut self, id: NodeId) -> bool {
        for index in 0..self.groups.len() {
            let ids = &mut self.groups[index].1;
            if let Some(position) = ids.iter().position(|&existing| existing == id) {
                ids.remove(position);
                if ids.is_empty() {
                    self.groups.remove(index);
                }
                return true;
            }
        }
        false
    }

    pub fn len(&self) -> usize {
        self.groups.iter().map(|(_, ids)| ids.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.groups.iter().flat_map(|(_, ids)| ids.iter().copied())
    }

    pub fn keys(&self) -> impl Iterator<Item = &NodeKey> {
        self.groups.iter().map(|(key, _)| key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_keys_compare_by_name_only() {
        assert_eq!(NodeKey::new("CHIL", Some(2)), NodeKey::new("CHIL", None));
        assert_ne!(NodeKey::new("CHIL", Some(2)), NodeKey::new("HUSB", Some(2)));
        assert!(NodeKey::root().is_root());
    }

    #[test]
    fn test_groups_follow_precedence() {
        let mut groups = ChildGroups::default();
        groups.push(NodeKey::new("CHIL", Some(3)), NodeId(1));
        groups.push(NodeKey::new("HUSB", Some(1)), NodeId(2));
        groups.push(NodeKey::new("CHIL", Some(3)), NodeId(3));
        groups.push(NodeKey::new("RESN", Some(0)), NodeId(4));

        let order: Vec<NodeId> = groups.iter().collect();
        assert_eq!(order, vec![NodeId(4), NodeId(2), NodeId(1), NodeId(3)]);
    }

    #[test]
    fn test_groups_without_precedence_keep_insertion_order() {
        let mut groups = ChildGroups::default();
        groups.push(NodeKey::new("B", None), NodeId(1));
        groups.push(NodeKey::new("A", None), NodeId(2));
        groups.push(NodeKey::new("C", Some(5)), NodeId(3));

        let names: Vec<&str> = groups.keys().map(NodeKey::name).collect();
        assert_eq!(names, vec!["C", "B", "A"]);
    }

    #[test]
    fn test_remove_drops_empty_group() {
        let mut groups = ChildGroups::default();
        groups.push(NodeKey::new("CHIL", Some(0)), NodeId(1));
        groups.push(NodeKey::new("CHIL", Some(0)), NodeId(2));
        assert!(groups.remove(NodeId(1)));
        assert_eq!(groups.get("CHIL"), &[NodeId(2)]);
        assert!(groups.remove(NodeId(2)));
        assert!(groups.is_empty());
        assert!(!groups.remove(NodeId(2)));
        assert_eq!(groups.len(), 0);
    }
}
