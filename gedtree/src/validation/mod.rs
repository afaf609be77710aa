use crate::record::{NodeId, Payload, RecordTree};
use serde::Serialize;

/// Result of validating a record tree
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Validate a whole record against the schema it was built from.
/// Cardinality violations are errors, missing or unexpected content is a
/// warning.
pub fn validate_tree(tree: &RecordTree) -> ValidationResult {
    validate_branch(tree, tree.root(), false)
}

/// Validate the subtree below `id`. In strict mode content issues are
/// reported as errors too.
pub fn validate_branch(tree: &RecordTree, id: NodeId, strict: bool) -> ValidationResult {
    let mut result = ValidationResult::default();
    if !tree.is_attached(id) {
        result.errors.push(format!("Node {id} has been removed from its tree"));
        return result;
    }
    check_node(tree, id, strict, &mut result);
    result
}

fn check_node(tree: &RecordTree, id: NodeId, strict: bool, result: &mut ValidationResult) {
    let Some(node) = tree.node(id) else {
        return;
    };
    let location = match tree.node_path(id) {
        path if path.is_empty() => node.name().to_string(),
        path => path,
    };

    if let Some(block) = node.block() {
        for line in block.lines() {
            let names = line.names();
            let counts: Vec<usize> = names
                .iter()
                .map(|name| tree.number_of_child_lines(id, *name))
                .collect();
            let total: usize = counts.iter().sum();

            // Alternative tags share the minimum; the maximum applies per tag
            if total < line.min() as usize {
                result.errors.push(format!(
                    "{location}: missing mandatory '{}' (at least {}, found {total})",
                    names.join("|"),
                    line.min()
                ));
            }
            if let Some(max) = line.max() {
                for (name, count) in names.iter().zip(&counts) {
                    if *count > max as usize {
                        result.errors.push(format!(
                            "{location}: too many '{name}' lines (at most {max}, found {count})"
                        ));
                    }
                }
            }
        }
    }

    if let (Payload::Tag { value, xref }, Some(line)) = (node.payload(), node.line()) {
        let missing = |field: &Option<String>| field.as_deref().map_or(true, str::is_empty);
        if line.requires_xref() && missing(xref) {
            add_issue(result, strict, format!("{location} has no cross-reference"));
        }
        if line.requires_value() && missing(value) {
            add_issue(result, strict, format!("{location} has no value"));
        }
        if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
            if !line.accepts_value(value) {
                add_issue(
                    result,
                    strict,
                    format!(
                        "{location}: value '{value}' is not one of {:?}",
                        line.fixed_values()
                    ),
                );
            }
        }
    }

    for child in tree.children(id) {
        check_node(tree, child, strict, result);
    }
}

fn add_issue(result: &mut ValidationResult, strict: bool, message: String) {
    if strict {
        result.errors.push(message);
    } else {
        result.warnings.push(message);
    }
}
