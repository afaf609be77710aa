use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Occurrence bounds of a schema line, written `{min:max}` in the grammar.
/// `max == None` stands for the unbounded `M`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Cardinality {
    pub min: u32,
    pub max: Option<u32>,
}

impl Cardinality {
    pub fn is_mandatory(&self) -> bool {
        self.min > 0
    }

    /// Whether `count` existing lines already exhaust the maximum
    pub fn is_reached(&self, count: usize) -> bool {
        match self.max {
            Some(max) => count >= max as usize,
            None => false,
        }
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) => write!(f, "{{{}:{}}}", self.min, max),
            None => write!(f, "{{{}:M}}", self.min),
        }
    }
}

/// What a schema line addresses: a referenced structure or a set of tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LineKind {
    Structure(String),
    Tags(Vec<String>),
}

/// One legal child position inside a schema block.
#[derive(Debug, Clone, Serialize)]
pub struct SchemaLine {
    pub(crate) kind: LineKind,
    pub(crate) xref_names: Vec<String>,
    pub(crate) value_names: Vec<String>,
    pub(crate) fixed_values: Vec<String>,
    /// `@<XREF>@ TAG` (a record id) as opposed to `TAG @<XREF>@` (a pointer)
    pub(crate) xref_before_tag: bool,
    pub(crate) cardinality: Cardinality,
    pub(crate) child_block: Option<Arc<SchemaBlock>>,
    #[serde(skip)]
    pub(crate) source_line: usize,
}

impl SchemaLine {
    pub fn kind(&self) -> &LineKind {
        &self.kind
    }

    pub fn structure_name(&self) -> Option<&str> {
        match &self.kind {
            LineKind::Structure(name) => Some(name),
            LineKind::Tags(_) => None,
        }
    }

    pub fn tags(&self) -> &[String] {
        match &self.kind {
            LineKind::Tags(tags) => tags,
            LineKind::Structure(_) => &[],
        }
    }

    pub fn is_structure_line(&self) -> bool {
        matches!(self.kind, LineKind::Structure(_))
    }

    pub fn is_tag_line(&self) -> bool {
        matches!(self.kind, LineKind::Tags(_))
    }

    /// Every name this line can be addressed by inside its block
    pub fn names(&self) -> Vec<&str> {
        match &self.kind {
            LineKind::Structure(name) => vec![name.as_str()],
            LineKind::Tags(tags) => tags.iter().map(String::as_str).collect(),
        }
    }

    pub fn xref_names(&self) -> &[String] {
        &self.xref_names
    }

    pub fn value_names(&self) -> &[String] {
        &self.value_names
    }

    pub fn fixed_values(&self) -> &[String] {
        &self.fixed_values
    }

    pub fn xref_before_tag(&self) -> bool {
        self.xref_before_tag
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    pub fn min(&self) -> u32 {
        self.cardinality.min
    }

    pub fn max(&self) -> Option<u32> {
        self.cardinality.max
    }

    pub fn child_block(&self) -> Option<&Arc<SchemaBlock>> {
        self.child_block.as_ref()
    }

    pub fn source_line(&self) -> usize {
        self.source_line
    }

    pub fn has_xref(&self) -> bool {
        !self.xref_names.is_empty()
    }

    pub fn has_value(&self) -> bool {
        !self.value_names.is_empty() || !self.fixed_values.is_empty()
    }

    /// A line needs a value when it declares anything other than `<NULL>`
    pub fn requires_value(&self) -> bool {
        self.is_tag_line()
            && (!self.fixed_values.is_empty()
                || self.value_names.iter().any(|name| name != NULL_VALUE))
    }

    pub fn requires_xref(&self) -> bool {
        self.is_tag_line() && self.has_xref()
    }

    /// Free-form value fields accept anything; otherwise only a fixed value fits
    pub fn accepts_value(&self, value: &str) -> bool {
        if self.value_names.iter().any(|name| name != NULL_VALUE) {
            return true;
        }
        self.fixed_values.iter().any(|fixed| fixed == value)
    }
}

/// Xref/value shape requested when a tag alone does not pick a variation,
/// e.g. `NOTE @<XREF:NOTE>@` versus `NOTE <SUBMITTER_TEXT>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct LineVariation {
    pub with_xref: bool,
    pub with_value: bool,
}

impl LineVariation {
    pub fn new(with_xref: bool, with_value: bool) -> Self {
        LineVariation {
            with_xref,
            with_value,
        }
    }

    pub fn matches(&self, line: &SchemaLine) -> bool {
        line.has_xref() == self.with_xref && line.has_value() == self.with_value
    }
}

/// Value field name standing for "no value at all"
pub const NULL_VALUE: &str = "NULL";

/// Ordered set of schema lines at one nesting level.
#[derive(Debug, Clone, Serialize)]
pub struct SchemaBlock {
    pub(crate) lines: Vec<Arc<SchemaLine>>,
    #[serde(skip)]
    pub(crate) index: HashMap<String, usize>,
    #[serde(skip)]
    pub(crate) mandatory: Vec<usize>,
    pub(crate) level: u8,
}

impl SchemaBlock {
    pub fn lines(&self) -> &[Arc<SchemaLine>] {
        &self.lines
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    /// The line addressed by `name`, which may be a tag or a structure name
    pub fn line(&self, name: &str) -> Option<&Arc<SchemaLine>> {
        self.index.get(name).map(|&i| &self.lines[i])
    }

    /// Position of the line addressed by `name`, used as sort precedence
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn mandatory_lines(&self) -> impl Iterator<Item = &Arc<SchemaLine>> {
        self.mandatory.iter().map(move |&i| &self.lines[i])
    }

    /// All addressable names, in line order
    pub fn names(&self) -> Vec<&str> {
        self.lines.iter().flat_map(|line| line.names()).collect()
    }

    /// Every tag reachable through this block and its nested blocks,
    /// without following structure references
    pub fn all_tags(&self) -> Vec<&str> {
        let mut tags = Vec::new();
        for line in &self.lines {
            tags.extend(line.tags().iter().map(String::as_str));
            if let Some(child) = &line.child_block {
                tags.extend(child.all_tags());
            }
        }
        tags
    }
}

/// A named grammar unit. Structures with variations exist once per variation.
#[derive(Debug, Clone, Serialize)]
pub struct SchemaStructure {
    pub(crate) name: String,
    pub(crate) variation: usize,
    pub(crate) block: Arc<SchemaBlock>,
}

impl SchemaStructure {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ordinal of this variation among structures sharing the name
    pub fn variation(&self) -> usize {
        self.variation
    }

    pub fn block(&self) -> &Arc<SchemaBlock> {
        &self.block
    }

    /// Top-level line addressed by `tag`, used to disambiguate variations
    pub fn top_line(&self, tag: &str) -> Option<&Arc<SchemaLine>> {
        self.block.line(tag)
    }
}

/// `KEY=VALUE` header preceding the first structure declaration
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchemaHeader {
    pub version: String,
    pub source: String,
    pub description: String,
    pub extra: Vec<(String, String)>,
}
