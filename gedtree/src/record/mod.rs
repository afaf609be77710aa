mod key;
mod visibility;

pub use key::NodeKey;

use crate::config::TreeConfig;
use crate::error::{GedTreeError, Result};
use crate::schema::{GrammarSchemaStore, LineVariation, SchemaBlock, SchemaLine, SchemaStructure};
use key::ChildGroups;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Stable handle to a node inside a [`RecordTree`].
///
/// Handles of removed nodes stay invalid forever; slots are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Addresses a child line: its tag or structure name, optionally the
/// variation tag and the xref/value shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineSpec {
    pub name: String,
    pub tag: Option<String>,
    pub variation: Option<LineVariation>,
}

impl LineSpec {
    pub fn new(name: impl Into<String>) -> Self {
        LineSpec {
            name: name.into(),
            tag: None,
            variation: None,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_variation(mut self, with_xref: bool, with_value: bool) -> Self {
        self.variation = Some(LineVariation::new(with_xref, with_value));
        self
    }

    fn matches(&self, node: &RecordNode) -> bool {
        if let Some(tag) = &self.tag {
            if node.tag.as_deref() != Some(tag.as_str()) {
                return false;
            }
        }
        match self.variation {
            Some(variation) => node.variation == Some(variation),
            None => true,
        }
    }
}

impl From<&str> for LineSpec {
    fn from(name: &str) -> Self {
        LineSpec::new(name)
    }
}

impl From<String> for LineSpec {
    fn from(name: String) -> Self {
        LineSpec::new(name)
    }
}

impl From<&LineSpec> for LineSpec {
    fn from(spec: &LineSpec) -> Self {
        spec.clone()
    }
}

/// What a node carries besides its children
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// The synthetic document root
    Root,
    /// A referenced structure; transparent when rendered
    Structure,
    /// A tag line with its optional value and cross-reference
    Tag {
        value: Option<String>,
        xref: Option<String>,
    },
}

/// One line of a record, bound to the schema line that allowed it.
#[derive(Debug, Clone)]
pub struct RecordNode {
    key: NodeKey,
    name: String,
    line: Option<Arc<SchemaLine>>,
    structure: Option<Arc<SchemaStructure>>,
    block: Option<Arc<SchemaBlock>>,
    tag: Option<String>,
    variation: Option<LineVariation>,
    payload: Payload,
    parent: Option<NodeId>,
    children: ChildGroups,
    forced_visible: bool,
    key_cache: RefCell<HashMap<String, NodeKey>>,
}

impl RecordNode {
    pub fn key(&self) -> &NodeKey {
        &self.key
    }

    /// Tag or structure name; the structure name for the root
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn variation(&self) -> Option<LineVariation> {
        self.variation
    }

    /// Schema line this node is bound to; `None` for the root
    pub fn line(&self) -> Option<&Arc<SchemaLine>> {
        self.line.as_ref()
    }

    /// Resolved structure variation for the root and structure lines
    pub fn structure(&self) -> Option<&Arc<SchemaStructure>> {
        self.structure.as_ref()
    }

    /// Block describing the legal children of this node
    pub fn block(&self) -> Option<&Arc<SchemaBlock>> {
        self.block.as_ref()
    }

    /// Name of the resolved structure, if any
    pub fn structure_name(&self) -> Option<&str> {
        self.structure.as_ref().map(|structure| structure.name())
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn is_root(&self) -> bool {
        matches!(self.payload, Payload::Root)
    }

    pub fn is_structure(&self) -> bool {
        matches!(self.payload, Payload::Structure)
    }

    pub fn is_tag_line(&self) -> bool {
        matches!(self.payload, Payload::Tag { .. })
    }

    pub fn value(&self) -> Option<&str> {
        match &self.payload {
            Payload::Tag { value, .. } => value.as_deref(),
            _ => None,
        }
    }

    pub fn xref(&self) -> Option<&str> {
        match &self.payload {
            Payload::Tag { xref, .. } => xref.as_deref(),
            _ => None,
        }
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn is_forced_visible(&self) -> bool {
        self.forced_visible
    }

    /// Whether the bound line needs a value or xref to mean anything
    pub fn requires_content(&self) -> bool {
        self.line
            .as_ref()
            .map(|line| line.requires_value() || line.requires_xref())
            .unwrap_or(false)
    }

    /// Sibling key for a child called `name`, cached per node
    fn child_key(&self, name: &str) -> NodeKey {
        if let Some(key) = self.key_cache.borrow().get(name) {
            return key.clone();
        }
        let precedence = self.block.as_ref().and_then(|block| block.position(name));
        let key = NodeKey::new(name, precedence);
        self.key_cache
            .borrow_mut()
            .insert(name.to_string(), key.clone());
        key
    }

    fn legal_line(&self, name: &str) -> Option<&Arc<SchemaLine>> {
        self.block.as_ref().and_then(|block| block.line(name))
    }
}

/// Build a detached node for `spec`, bound to the line `parent_block`
/// declares for it.
fn create_node(
    store: &GrammarSchemaStore,
    parent_block: Option<&Arc<SchemaBlock>>,
    key: NodeKey,
    spec: &LineSpec,
    parent: NodeId,
) -> Result<RecordNode> {
    let line = parent_block
        .and_then(|block| block.line(&spec.name))
        .ok_or_else(|| GedTreeError::creation(&spec.name, "not allowed at this position"))?
        .clone();

    let (structure, block, tag, payload) = match line.structure_name() {
        Some(structure_name) => {
            let structure =
                store.resolve_variation(structure_name, spec.tag.as_deref(), spec.variation)?;
            let block = Some(structure.block().clone());
            (Some(structure), block, spec.tag.clone(), Payload::Structure)
        }
        None => {
            if let Some(tag) = &spec.tag {
                if *tag != spec.name {
                    return Err(GedTreeError::creation(
                        &spec.name,
                        format!("tag '{tag}' does not match the line"),
                    ));
                }
            }
            let payload = Payload::Tag {
                value: None,
                xref: None,
            };
            (None, line.child_block().cloned(), Some(spec.name.clone()), payload)
        }
    };

    Ok(RecordNode {
        key,
        name: spec.name.clone(),
        line: Some(line),
        structure,
        block,
        tag,
        variation: spec.variation,
        payload,
        parent: Some(parent),
        children: ChildGroups::default(),
        forced_visible: false,
        key_cache: RefCell::new(HashMap::new()),
    })
}

/// A record rooted in one schema structure. Nodes live in an arena and
/// refer to each other through [`NodeId`]s.
#[derive(Debug, Clone)]
pub struct RecordTree {
    store: Arc<GrammarSchemaStore>,
    config: TreeConfig,
    nodes: Vec<Option<RecordNode>>,
    root: NodeId,
}

impl RecordTree {
    /// Create an empty record for the structure `name`
    pub fn new(store: Arc<GrammarSchemaStore>, name: &str) -> Result<Self> {
        Self::with_spec(store, LineSpec::new(name))
    }

    /// Create an empty record for one variation of a structure
    pub fn with_spec(store: Arc<GrammarSchemaStore>, spec: impl Into<LineSpec>) -> Result<Self> {
        let spec = spec.into();
        let structure = store.resolve_variation(&spec.name, spec.tag.as_deref(), spec.variation)?;
        let root = RecordNode {
            key: NodeKey::root(),
            name: spec.name.clone(),
            line: None,
            block: Some(structure.block().clone()),
            structure: Some(structure),
            tag: spec.tag,
            variation: spec.variation,
            payload: Payload::Root,
            parent: None,
            children: ChildGroups::default(),
            forced_visible: false,
            key_cache: RefCell::new(HashMap::new()),
        };
        Ok(RecordTree {
            store,
            config: TreeConfig::default(),
            nodes: vec![Some(root)],
            root: NodeId(0),
        })
    }

    pub fn with_config(mut self, config: TreeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<GrammarSchemaStore> {
        &self.store
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> Option<&RecordNode> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    pub fn is_attached(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    /// Number of attached nodes, root included
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.get(self.root)
            .map(|root| root.children.is_empty())
            .unwrap_or(true)
    }

    pub(crate) fn get(&self, id: NodeId) -> Result<&RecordNode> {
        self.node(id).ok_or(GedTreeError::Detached { node: id })
    }

    fn get_mut(&mut self, id: NodeId) -> Result<&mut RecordNode> {
        self.nodes
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(GedTreeError::Detached { node: id })
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|node| node.parent)
    }

    /// Children ordered by schema precedence, then insertion
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.node(id)
            .map(|node| node.children.iter().collect())
            .unwrap_or_default()
    }

    /// Names of the sibling groups present below `id`, in child order
    pub fn child_names(&self, id: NodeId) -> Vec<&str> {
        self.node(id)
            .map(|node| node.children.keys().map(NodeKey::name).collect())
            .unwrap_or_default()
    }

    // ── Adding lines ────────────────────────────────────────────────

    /// Add a child line. Returns `Ok(None)` when the maximum number of
    /// lines with that name is already reached; a name the schema does not
    /// allow here, or an unresolvable variation, is a creation error.
    pub fn add_child_line(
        &mut self,
        parent: NodeId,
        spec: impl Into<LineSpec>,
    ) -> Result<Option<NodeId>> {
        let spec = spec.into();
        if self.max_number_of_lines_reached(parent, &spec.name)
            && self.is_possible_name(parent, &spec.name)
        {
            return Ok(None);
        }

        let parent_node = self.get(parent)?;
        let key = parent_node.child_key(&spec.name);
        let node = create_node(
            &self.store,
            parent_node.block.as_ref(),
            key.clone(),
            &spec,
            parent,
        )?;

        let id = NodeId(self.nodes.len());
        self.nodes.push(Some(node));
        self.get_mut(parent)?.children.push(key, id);
        Ok(Some(id))
    }

    /// All children addressed by `spec`, in insertion order
    pub fn child_lines(&self, parent: NodeId, spec: impl Into<LineSpec>) -> Vec<NodeId> {
        let spec = spec.into();
        let Some(node) = self.node(parent) else {
            return Vec::new();
        };
        node.children
            .get(&spec.name)
            .iter()
            .copied()
            .filter(|&id| self.node(id).map(|child| spec.matches(child)).unwrap_or(false))
            .collect()
    }

    /// The `line_number`-th (0-based) child matching `spec`, or the first
    /// one when `line_number` is `None`
    pub fn get_child_line(
        &self,
        parent: NodeId,
        spec: impl Into<LineSpec>,
        line_number: Option<usize>,
    ) -> Option<NodeId> {
        self.child_lines(parent, spec)
            .get(line_number.unwrap_or(0))
            .copied()
    }

    pub fn number_of_child_lines(&self, parent: NodeId, spec: impl Into<LineSpec>) -> usize {
        self.child_lines(parent, spec).len()
    }

    pub fn has_child_line(&self, parent: NodeId, spec: impl Into<LineSpec>) -> bool {
        !self.child_lines(parent, spec).is_empty()
    }

    // ── Legality ────────────────────────────────────────────────────

    /// Names (tags and structures) that may appear below `id`
    pub fn possible_names(&self, id: NodeId) -> Vec<String> {
        self.node(id)
            .and_then(|node| node.block.as_ref())
            .map(|block| block.names().into_iter().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn is_possible_name(&self, id: NodeId, name: &str) -> bool {
        self.node(id)
            .and_then(|node| node.legal_line(name))
            .is_some()
    }

    pub fn name_is_possible_structure(&self, id: NodeId, name: &str) -> bool {
        self.node(id)
            .and_then(|node| node.legal_line(name))
            .map(|line| line.is_structure_line())
            .unwrap_or(false)
    }

    pub fn name_is_possible_tag(&self, id: NodeId, name: &str) -> bool {
        self.node(id)
            .and_then(|node| node.legal_line(name))
            .map(|line| line.is_tag_line())
            .unwrap_or(false)
    }

    /// Maximum number of `name` lines below `id`; `Ok(None)` is unbounded
    pub fn max_number_of_lines(&self, id: NodeId, name: &str) -> Result<Option<u32>> {
        let node = self.get(id)?;
        node.legal_line(name)
            .map(|line| line.max())
            .ok_or_else(|| GedTreeError::creation(name, "not allowed at this position"))
    }

    /// True when no further `name` line fits below `id`, including when
    /// the name is not allowed there at all
    pub fn max_number_of_lines_reached(&self, id: NodeId, name: &str) -> bool {
        let Some(node) = self.node(id) else {
            return true;
        };
        match node.legal_line(name) {
            Some(line) => line.cardinality().is_reached(node.children.get(name).len()),
            None => true,
        }
    }

    pub fn can_add_line(&self, id: NodeId, name: &str) -> bool {
        self.is_possible_name(id, name) && !self.max_number_of_lines_reached(id, name)
    }

    // ── Payload ─────────────────────────────────────────────────────

    pub fn value(&self, id: NodeId) -> Option<&str> {
        self.node(id).and_then(RecordNode::value)
    }

    pub fn xref(&self, id: NodeId) -> Option<&str> {
        self.node(id).and_then(RecordNode::xref)
    }

    /// Set the value of a tag line. An empty string marks the value as
    /// present but empty.
    pub fn set_value(&mut self, id: NodeId, new_value: &str) -> Result<()> {
        let node = self.get_mut(id)?;
        let line = node
            .line
            .clone()
            .ok_or_else(|| GedTreeError::Value(format!("'{}' does not take a value", node.name)))?;
        if !line.has_value() {
            return Err(GedTreeError::Value(format!(
                "'{}' does not take a value",
                node.name
            )));
        }
        if !new_value.is_empty() && !line.accepts_value(new_value) {
            return Err(GedTreeError::Value(format!(
                "'{}' is not one of {:?} for '{}'",
                new_value,
                line.fixed_values(),
                node.name
            )));
        }
        match &mut node.payload {
            Payload::Tag { value, .. } => {
                *value = Some(new_value.to_string());
                Ok(())
            }
            _ => Err(GedTreeError::Value(format!(
                "'{}' is a structure and takes no value",
                node.name
            ))),
        }
    }

    /// Set the cross-reference of a tag line; surrounding `@` are dropped
    pub fn set_xref(&mut self, id: NodeId, new_xref: &str) -> Result<()> {
        let node = self.get_mut(id)?;
        let takes_xref = node.line.as_ref().map(|line| line.has_xref()).unwrap_or(false);
        if !takes_xref {
            return Err(GedTreeError::Value(format!(
                "'{}' does not take a cross-reference",
                node.name
            )));
        }
        match &mut node.payload {
            Payload::Tag { xref, .. } => {
                *xref = Some(new_xref.trim_matches('@').to_string());
                Ok(())
            }
            _ => Err(GedTreeError::Value(format!(
                "'{}' is a structure and takes no cross-reference",
                node.name
            ))),
        }
    }

    /// Forced-visible nodes are printed even when they have no content
    pub fn set_forced_visible(&mut self, id: NodeId, forced: bool) -> Result<()> {
        self.get_mut(id)?.forced_visible = forced;
        Ok(())
    }

    // ── Removal ─────────────────────────────────────────────────────

    /// Detach a node and drop its subtree
    pub fn remove_line(&mut self, id: NodeId) -> Result<()> {
        self.detach(id)?;
        Ok(())
    }

    /// Remove a node, then clean up the branch it leaves behind.
    /// Returns the highest ancestor removed by the cleanup.
    pub fn remove_line_cascade(&mut self, id: NodeId) -> Result<Option<NodeId>> {
        let parent = self.detach(id)?;
        self.clean_branch(parent)
    }

    /// Remove `id` if it has no children left, then keep removing ancestors
    /// whose only child is the node just removed. Stops at the root, at a
    /// node with other children and at a tag line that needs a value or
    /// xref of its own. Returns the highest removed node.
    pub fn clean_branch(&mut self, id: NodeId) -> Result<Option<NodeId>> {
        let mut current = id;
        let mut highest: Option<NodeId> = None;
        loop {
            let node = self.get(current)?;
            // Only the child removed on this walk may remain below `current`
            let allowed_children = usize::from(highest.is_some());
            if node.is_root() || node.children.len() > allowed_children {
                break;
            }
            if node.is_tag_line() && node.requires_content() {
                break;
            }
            highest = Some(current);
            match node.parent {
                Some(parent) => current = parent,
                None => break,
            }
        }

        if let Some(highest) = highest {
            log::debug!(
                "Branch cleanup removes {} and its subtree",
                self.node_path(highest)
            );
            self.detach(highest)?;
        }
        Ok(highest)
    }

    /// Unlink `id` from its parent and free its subtree; returns the parent
    fn detach(&mut self, id: NodeId) -> Result<NodeId> {
        let parent = self
            .get(id)?
            .parent
            .ok_or_else(|| GedTreeError::Value("the root line cannot be removed".into()))?;
        self.get_mut(parent)?.children.remove(id);

        let mut pending = vec![id];
        while let Some(next) = pending.pop() {
            if let Some(mut node) = self.nodes.get_mut(next.0).and_then(Option::take) {
                node.parent = None;
                pending.extend(node.children.iter());
            }
        }
        Ok(parent)
    }

    // ── Bulk population ─────────────────────────────────────────────

    /// Add one line for every legal line that has none yet (best effort)
    pub fn add_all_child_lines(&mut self, id: NodeId, recursive: bool) -> Result<Vec<NodeId>> {
        let mut added = Vec::new();
        self.populate(id, false, recursive, &mut added)?;
        Ok(added)
    }

    /// Add lines until every mandatory line reaches its minimum (best effort)
    pub fn add_mandatory_child_lines(
        &mut self,
        id: NodeId,
        recursive: bool,
    ) -> Result<Vec<NodeId>> {
        let mut added = Vec::new();
        self.populate(id, true, recursive, &mut added)?;
        Ok(added)
    }

    fn populate(
        &mut self,
        id: NodeId,
        mandatory_only: bool,
        recursive: bool,
        added: &mut Vec<NodeId>,
    ) -> Result<()> {
        let Some(block) = self.get(id)?.block.clone() else {
            return Ok(());
        };

        for line in block.lines() {
            if mandatory_only && !line.cardinality().is_mandatory() {
                continue;
            }
            let names = line.names();
            let [name] = names.as_slice() else {
                let err = GedTreeError::creation(
                    &names.join("|"),
                    "line offers several tags; pick one explicitly",
                );
                log::debug!("Bulk population skips a line: {err}");
                continue;
            };

            let cyclic = line
                .structure_name()
                .map(|structure| self.structure_on_chain(id, structure))
                .unwrap_or(false);
            let target = if mandatory_only {
                line.min() as usize
            } else {
                (line.min() as usize).max(1)
            };

            for _ in self.number_of_child_lines(id, *name)..target {
                match self.add_child_line(id, *name) {
                    Ok(Some(child)) => {
                        added.push(child);
                        if recursive && !cyclic {
                            self.populate(child, mandatory_only, recursive, added)?;
                        } else if cyclic {
                            log::debug!("Not descending into recursive structure '{name}'");
                        }
                    }
                    Ok(None) => break,
                    Err(err) => {
                        if self.store.has_structure(name) || !line.is_structure_line() {
                            log::debug!("Bulk population skips '{name}': {err}");
                        } else {
                            log::warn!("Bulk population skips '{name}': {err}");
                        }
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    fn structure_on_chain(&self, id: NodeId, structure: &str) -> bool {
        let mut current = Some(id);
        while let Some(node) = current.and_then(|next| self.node(next)) {
            if node.structure.as_ref().map(|s| s.name()) == Some(structure) {
                return true;
            }
            current = node.parent;
        }
        false
    }

    // ── Descriptions ────────────────────────────────────────────────

    /// Names from below the root down to `id`, joined with `/`
    pub fn node_path(&self, id: NodeId) -> String {
        let mut names = Vec::new();
        let mut current = Some(id);
        while let Some(node) = current.and_then(|next| self.node(next)) {
            if node.is_root() {
                break;
            }
            names.push(node.name.as_str());
            current = node.parent;
        }
        names.reverse();
        names.join("/")
    }

    /// Interchange level of a line: structure nodes do not count, lines
    /// directly below the root are level 0
    pub fn level(&self, id: NodeId) -> usize {
        let mut level = 0;
        let mut current = self.parent(id);
        while let Some(node) = current.and_then(|next| self.node(next)) {
            if node.is_tag_line() {
                level += 1;
            }
            current = node.parent;
        }
        level
    }
}
