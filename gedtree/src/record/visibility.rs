use super::{NodeId, Payload, RecordNode, RecordTree};
use crate::config::PrintPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContentState {
    Unset,
    Empty,
    Set,
}

fn content_state(field: Option<&str>) -> ContentState {
    match field {
        None => ContentState::Unset,
        Some("") => ContentState::Empty,
        Some(_) => ContentState::Set,
    }
}

impl RecordTree {
    /// Whether `id` is left out when the record is printed under `policy`.
    /// Unknown handles count as hidden.
    pub fn is_node_hidden(&self, id: NodeId, policy: &PrintPolicy) -> bool {
        match self.node(id) {
            Some(node) => self.skip_line(node, policy),
            None => true,
        }
    }

    fn skip_line(&self, node: &RecordNode, policy: &PrintPolicy) -> bool {
        if node.is_root() || node.forced_visible {
            return false;
        }
        if node.is_tag_line() && !node.requires_content() {
            return false;
        }
        if !is_skip_candidate(node, policy) {
            return false;
        }
        // A visible descendant keeps the whole chain above it visible
        !node
            .children
            .iter()
            .filter_map(|child| self.node(child))
            .any(|child| !self.skip_line(child, policy))
    }
}

fn is_skip_candidate(node: &RecordNode, policy: &PrintPolicy) -> bool {
    let (value, xref) = match &node.payload {
        Payload::Tag { value, xref } => (
            content_state(value.as_deref()),
            content_state(xref.as_deref()),
        ),
        _ => (ContentState::Unset, ContentState::Unset),
    };

    if value == ContentState::Set || xref == ContentState::Set {
        return false;
    }
    if value == ContentState::Empty || xref == ContentState::Empty {
        return !policy.print_empty_lines;
    }
    !policy.print_unset_lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::LineSpec;
    use crate::testing::family_store;

    fn policy() -> PrintPolicy {
        PrintPolicy::default()
    }

    #[test]
    fn test_root_is_always_visible() {
        let tree = RecordTree::new(family_store(), "FAMILY").unwrap();
        assert!(!tree.is_node_hidden(tree.root(), &policy()));
    }

    #[test]
    fn test_unset_line_is_hidden() {
        let mut tree = RecordTree::new(family_store(), "FAMILY").unwrap();
        let fam = tree.add_child_line(tree.root(), "FAM").unwrap().unwrap();
        let chil = tree.add_child_line(fam, "CHIL").unwrap().unwrap();
        assert!(tree.is_node_hidden(chil, &policy()));
        assert!(tree.is_node_hidden(fam, &policy()));

        let print_unset = PrintPolicy {
            print_unset_lines: true,
            ..PrintPolicy::default()
        };
        assert!(!tree.is_node_hidden(chil, &print_unset));
    }

    #[test]
    fn test_empty_line_follows_policy() {
        let mut tree = RecordTree::new(family_store(), "FAMILY").unwrap();
        let fam = tree.add_child_line(tree.root(), "FAM").unwrap().unwrap();
        let chil = tree.add_child_line(fam, "CHIL").unwrap().unwrap();
        tree.set_xref(chil, "").unwrap();
        assert!(tree.is_node_hidden(chil, &policy()));

        let print_empty = PrintPolicy {
            print_empty_lines: true,
            ..PrintPolicy::default()
        };
        assert!(!tree.is_node_hidden(chil, &print_empty));
    }

    #[test]
    fn test_visible_descendant_forces_ancestors() {
        let mut tree = RecordTree::new(family_store(), "FAMILY").unwrap();
        let fam = tree.add_child_line(tree.root(), "FAM").unwrap().unwrap();
        let event = tree.add_child_line(fam, "EVENT_DETAIL").unwrap().unwrap();
        let date = tree.add_child_line(event, "DATE").unwrap().unwrap();
        assert!(tree.is_node_hidden(event, &policy()));

        tree.set_value(date, "1 JAN 1900").unwrap();
        assert!(!tree.is_node_hidden(date, &policy()));
        assert!(!tree.is_node_hidden(event, &policy()));
        assert!(!tree.is_node_hidden(fam, &policy()));
    }

    #[test]
    fn test_line_without_requirements_is_never_hidden() {
        let mut tree = RecordTree::new(family_store(), "FAMILY").unwrap();
        let fam = tree.add_child_line(tree.root(), "FAM").unwrap().unwrap();
        let structure = tree
            .add_child_line(
                fam,
                LineSpec::new("NOTE_STRUCTURE").with_tag("NOTE").with_variation(true, false),
            )
            .unwrap()
            .unwrap();
        assert!(tree.is_node_hidden(structure, &policy()));

        let store = std::sync::Arc::new(
            crate::schema::GrammarSchemaStore::parse(&crate::testing::grammar(
                "EVENT :=\nn EVEN {1:1}\n+1 TYPE <KIND> {0:1}\n",
            ))
            .unwrap(),
        );
        let mut tree = RecordTree::new(store, "EVENT").unwrap();
        let even = tree.add_child_line(tree.root(), "EVEN").unwrap().unwrap();
        assert!(!tree.is_node_hidden(even, &policy()));
    }

    #[test]
    fn test_forced_visible_wins() {
        let mut tree = RecordTree::new(family_store(), "FAMILY").unwrap();
        let fam = tree.add_child_line(tree.root(), "FAM").unwrap().unwrap();
        let chil = tree.add_child_line(fam, "CHIL").unwrap().unwrap();
        tree.set_forced_visible(chil, true).unwrap();
        assert!(!tree.is_node_hidden(chil, &policy()));
        assert!(!tree.is_node_hidden(fam, &policy()));
    }

    #[test]
    fn test_removed_node_is_hidden() {
        let mut tree = RecordTree::new(family_store(), "FAMILY").unwrap();
        let fam = tree.add_child_line(tree.root(), "FAM").unwrap().unwrap();
        let resn = tree.add_child_line(fam, "RESN").unwrap().unwrap();
        tree.set_value(resn, "locked").unwrap();
        tree.remove_line(resn).unwrap();
        assert!(tree.is_node_hidden(resn, &policy()));
    }
}
