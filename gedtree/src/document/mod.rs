// Document output - interchange lines and serializable snapshots of a record tree

use crate::config::PrintPolicy;
use crate::error::Result;
use crate::record::{NodeId, Payload, RecordTree};
use serde::{Deserialize, Serialize};

/// Plain-data copy of a (sub)tree, suitable for YAML or JSON output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentNode {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xref: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<DocumentNode>,
}

/// Copy the subtree below `id`, hidden lines included
pub fn snapshot(tree: &RecordTree, id: NodeId) -> Result<DocumentNode> {
    let node = tree.get(id)?;
    let children = tree
        .children(id)
        .into_iter()
        .map(|child| snapshot(tree, child))
        .collect::<Result<Vec<_>>>()?;
    Ok(DocumentNode {
        name: node.name().to_string(),
        tag: node.tag().map(str::to_string),
        value: node.value().map(str::to_string),
        xref: node.xref().map(str::to_string),
        children,
    })
}

/// Render the record as interchange lines (`LEVEL [@XREF@] TAG [VALUE|@XREF@]`).
/// Structure nodes only contribute their children; hidden lines are left out.
pub fn render_lines(tree: &RecordTree, policy: &PrintPolicy) -> Vec<String> {
    let mut lines = Vec::new();
    render_children(tree, tree.root(), 0, policy, &mut lines);
    lines
}

/// [`render_lines`] joined with newlines, with a trailing newline
pub fn render_string(tree: &RecordTree, policy: &PrintPolicy) -> String {
    let mut out = String::new();
    for line in render_lines(tree, policy) {
        out.push_str(&line);
        out.push('\n');
    }
    out
}

fn render_children(
    tree: &RecordTree,
    parent: NodeId,
    level: usize,
    policy: &PrintPolicy,
    lines: &mut Vec<String>,
) {
    for child in tree.children(parent) {
        if tree.is_node_hidden(child, policy) {
            continue;
        }
        let Some(node) = tree.node(child) else {
            continue;
        };
        match node.payload() {
            Payload::Tag { value, xref } => {
                let xref_before_tag = node
                    .line()
                    .map(|line| line.xref_before_tag())
                    .unwrap_or(false);
                lines.push(format_line(
                    level,
                    node.name(),
                    xref.as_deref(),
                    xref_before_tag,
                    value.as_deref(),
                ));
                render_children(tree, child, level + 1, policy, lines);
            }
            Payload::Structure | Payload::Root => {
                render_children(tree, child, level, policy, lines);
            }
        }
    }
}

fn format_line(
    level: usize,
    tag: &str,
    xref: Option<&str>,
    xref_before_tag: bool,
    value: Option<&str>,
) -> String {
    let xref = xref.filter(|x| !x.is_empty());
    let mut line = level.to_string();
    if let (Some(xref), true) = (xref, xref_before_tag) {
        line.push_str(&format!(" @{xref}@"));
    }
    line.push(' ');
    line.push_str(tag);
    if let (Some(xref), false) = (xref, xref_before_tag) {
        line.push_str(&format!(" @{xref}@"));
    }
    if let Some(value) = value.filter(|v| !v.is_empty()) {
        line.push(' ');
        line.push_str(value);
    }
    line
}
