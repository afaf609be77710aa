use super::parser::parse_grammar_str;
use super::types::{LineVariation, SchemaHeader, SchemaStructure};
use crate::error::{GedTreeError, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Compiled grammar: every structure (one entry per variation) plus the
/// indexes needed to pick a variation by its top-level tag.
///
/// Immutable once built; share it between record trees through an `Arc`.
#[derive(Debug, Clone)]
pub struct GrammarSchemaStore {
    header: SchemaHeader,
    structures: Vec<Arc<SchemaStructure>>,
    by_name: HashMap<String, Vec<Arc<SchemaStructure>>>,
    /// structure name -> top-level tag -> variations exposing that tag
    variation_index: HashMap<String, HashMap<String, Vec<Arc<SchemaStructure>>>>,
    /// tag -> structures using that tag anywhere in their blocks
    tag_index: HashMap<String, Vec<Arc<SchemaStructure>>>,
}

impl GrammarSchemaStore {
    /// Compile grammar definition text
    pub fn parse(content: &str) -> Result<Self> {
        parse_grammar_str(content)
    }

    pub(crate) fn build(header: SchemaHeader, structures: Vec<SchemaStructure>) -> Result<Self> {
        let mut store = GrammarSchemaStore {
            header,
            structures: Vec::with_capacity(structures.len()),
            by_name: HashMap::new(),
            variation_index: HashMap::new(),
            tag_index: HashMap::new(),
        };

        for structure in structures {
            store.index(Arc::new(structure));
        }

        log::debug!(
            "Compiled grammar {} with {} structures",
            store.header.version,
            store.by_name.len()
        );
        Ok(store)
    }

    fn index(&mut self, structure: Arc<SchemaStructure>) {
        let variations = self
            .variation_index
            .entry(structure.name.clone())
            .or_default();
        for name in structure.block.names() {
            variations
                .entry(name.to_string())
                .or_default()
                .push(structure.clone());
        }

        for tag in structure.block.all_tags() {
            let owners = self.tag_index.entry(tag.to_string()).or_default();
            if !owners.iter().any(|owner| Arc::ptr_eq(owner, &structure)) {
                owners.push(structure.clone());
            }
        }

        self.by_name
            .entry(structure.name.clone())
            .or_default()
            .push(structure.clone());
        self.structures.push(structure);
    }

    pub fn header(&self) -> &SchemaHeader {
        &self.header
    }

    /// All structures, one entry per variation, in declaration order
    pub fn structures(&self) -> &[Arc<SchemaStructure>] {
        &self.structures
    }

    /// Distinct structure names in declaration order
    pub fn structure_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for structure in &self.structures {
            if names.last() != Some(&structure.name()) {
                names.push(structure.name());
            }
        }
        names
    }

    pub fn has_structure(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Every variation declared under `name` (empty for unknown names)
    pub fn variations(&self, name: &str) -> &[Arc<SchemaStructure>] {
        self.by_name.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_variations(&self, name: &str) -> bool {
        self.variations(name).len() > 1
    }

    /// Variations of `name` whose top block is addressable by `tag`
    pub fn variations_with_tag(&self, name: &str, tag: &str) -> &[Arc<SchemaStructure>] {
        self.variation_index
            .get(name)
            .and_then(|tags| tags.get(tag))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Top-level tags that identify a variation of `name`
    pub fn top_level_tags(&self, name: &str) -> Vec<&str> {
        let mut tags: Vec<&str> = self
            .variation_index
            .get(name)
            .map(|tags| tags.keys().map(String::as_str).collect())
            .unwrap_or_default();
        tags.sort_unstable();
        tags
    }

    /// Structures that use `tag` somewhere in their own blocks
    pub fn structures_with_tag(&self, tag: &str) -> &[Arc<SchemaStructure>] {
        self.tag_index.get(tag).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Pick exactly one variation of `name`, narrowing by top-level tag and
    /// then by xref/value shape. Anything but a single match is a creation error.
    pub fn resolve_variation(
        &self,
        name: &str,
        tag: Option<&str>,
        variation: Option<LineVariation>,
    ) -> Result<Arc<SchemaStructure>> {
        if !self.has_structure(name) {
            return Err(GedTreeError::creation(
                name,
                "structure is not defined in the grammar",
            ));
        }

        let candidates: Vec<&Arc<SchemaStructure>> = match tag {
            Some(tag) => self.variations_with_tag(name, tag).iter().collect(),
            None => self.variations(name).iter().collect(),
        };
        if candidates.is_empty() {
            return Err(GedTreeError::creation(
                name,
                format!("no variation has the top-level tag '{}'", tag.unwrap_or_default()),
            ));
        }

        let candidates: Vec<&Arc<SchemaStructure>> = match variation {
            Some(variation) => candidates
                .into_iter()
                .filter(|structure| match tag {
                    Some(tag) => structure
                        .top_line(tag)
                        .map(|line| variation.matches(line))
                        .unwrap_or(false),
                    None => structure
                        .block
                        .lines()
                        .iter()
                        .any(|line| variation.matches(line)),
                })
                .collect(),
            None => candidates,
        };

        match candidates.as_slice() {
            [single] => Ok(Arc::clone(single)),
            [] => Err(GedTreeError::creation(
                name,
                format!(
                    "no variation matches tag {:?} with xref/value shape {:?}",
                    tag, variation
                ),
            )),
            many => Err(GedTreeError::creation(
                name,
                format!(
                    "{} variations match; give a tag and xref/value flags to choose one",
                    many.len()
                ),
            )),
        }
    }
}
