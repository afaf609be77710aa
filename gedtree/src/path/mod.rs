// Path language - step parsing, following and creating lines

use crate::error::{GedTreeError, Result};
use crate::record::{LineSpec, NodeId, RecordTree};

/// One parsed step of a path.
///
/// ```text
/// name
/// name;lineNumber
/// name;tag
/// name;tag;lineNumber
/// name;tag;withXRef;withValue
/// name;tag;withXRef;withValue;lineNumber
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathStep {
    pub spec: LineSpec,
    /// 0-based; `None` addresses the first matching line
    pub line_number: Option<usize>,
}

impl PathStep {
    /// Parse one step. Returns `None` for empty or malformed steps, which
    /// the traversal skips.
    pub fn parse(step: &str, delimiter: char) -> Option<PathStep> {
        let fields: Vec<&str> = step.split(delimiter).map(str::trim).collect();
        let name = *fields.first()?;
        if name.is_empty() {
            return None;
        }
        let spec = LineSpec::new(name);
        if fields.len() > 5 {
            return None;
        }

        let (tag, rest) = match &fields[1..] {
            [] => {
                return Some(PathStep {
                    spec,
                    line_number: None,
                })
            }
            [second] => {
                return Some(match parse_line_number(second) {
                    Some(line_number) => PathStep { spec, line_number },
                    None => PathStep {
                        spec: with_tag(spec, second),
                        line_number: None,
                    },
                })
            }
            [tag, rest @ ..] => (*tag, rest),
        };
        let spec = with_tag(spec, tag);

        // An integer third field is a line number, whatever follows it
        if let Some(line_number) = parse_line_number(rest[0]) {
            if rest.len() > 1 {
                log::debug!("Ignoring the fields after the line number in '{step}'");
            }
            return Some(PathStep { spec, line_number });
        }

        match *rest {
            [with_xref, with_value] => Some(PathStep {
                spec: spec.with_variation(parse_flag(with_xref)?, parse_flag(with_value)?),
                line_number: None,
            }),
            [with_xref, with_value, line_number] => Some(PathStep {
                spec: spec.with_variation(parse_flag(with_xref)?, parse_flag(with_value)?),
                line_number: parse_line_number(line_number)?,
            }),
            _ => None,
        }
    }
}

fn with_tag(spec: LineSpec, tag: &str) -> LineSpec {
    if tag.is_empty() {
        spec
    } else {
        spec.with_tag(tag)
    }
}

/// `Some(None)` for negative numbers, which address the first line
fn parse_line_number(field: &str) -> Option<Option<usize>> {
    let number = field.parse::<i64>().ok()?;
    if number < 0 {
        Some(None)
    } else {
        usize::try_from(number).ok().map(Some)
    }
}

fn parse_flag(field: &str) -> Option<bool> {
    match field.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PathMode {
    FollowOrCreate,
    CreateNewAtEnd,
    CreateWholePath,
}

impl RecordTree {
    /// Parse a path with the tree's delimiter, keeping each step's position
    pub fn parse_path<S: AsRef<str>>(&self, path: &[S]) -> Vec<(usize, PathStep)> {
        let delimiter = self.config().path_delimiter;
        path.iter()
            .enumerate()
            .filter_map(|(index, raw)| match PathStep::parse(raw.as_ref(), delimiter) {
                Some(step) => Some((index, step)),
                None => {
                    log::debug!("Skipping path step {index} '{}'", raw.as_ref());
                    None
                }
            })
            .collect()
    }

    /// Follow existing lines only; any missing step yields `None`
    pub fn follow_path<S: AsRef<str>>(&self, start: NodeId, path: &[S]) -> Option<NodeId> {
        if !self.is_attached(start) {
            return None;
        }
        let mut current = start;
        for (_, step) in self.parse_path(path) {
            current = self.get_child_line(current, &step.spec, step.line_number)?;
        }
        Some(current)
    }

    /// Like [`follow_path`](Self::follow_path), but a dead end is reported
    /// as an error naming the step
    pub fn expect_path<S: AsRef<str>>(&self, start: NodeId, path: &[S]) -> Result<NodeId> {
        let mut current = start;
        for (index, step) in self.parse_path(path) {
            current = self
                .get_child_line(current, &step.spec, step.line_number)
                .ok_or_else(|| {
                    path_access_error(path, index, format!("no '{}' line found", step.spec.name))
                })?;
        }
        Ok(current)
    }

    pub fn path_exists<S: AsRef<str>>(&self, start: NodeId, path: &[S]) -> bool {
        self.follow_path(start, path).is_some()
    }

    /// Follow the path and create whatever is missing from the first
    /// missing step onward
    pub fn create_path<S: AsRef<str>>(&mut self, start: NodeId, path: &[S]) -> Result<NodeId> {
        self.walk_path(start, path, PathMode::FollowOrCreate)
    }

    /// Create a new branch at the deepest step that still has room for
    /// another line. If the path does not fully exist yet this behaves like
    /// [`create_path`](Self::create_path).
    pub fn create_path_end<S: AsRef<str>>(
        &mut self,
        start: NodeId,
        path: &[S],
    ) -> Result<NodeId> {
        self.walk_path(start, path, PathMode::CreateNewAtEnd)
    }

    /// Create every step, even when an identical path already exists
    pub fn create_whole_path<S: AsRef<str>>(
        &mut self,
        start: NodeId,
        path: &[S],
    ) -> Result<NodeId> {
        self.walk_path(start, path, PathMode::CreateWholePath)
    }

    fn walk_path<S: AsRef<str>>(
        &mut self,
        start: NodeId,
        path: &[S],
        mode: PathMode,
    ) -> Result<NodeId> {
        if !self.is_attached(start) {
            return Err(GedTreeError::Detached { node: start });
        }
        let steps = self.parse_path(path);

        if mode == PathMode::CreateWholePath {
            return self.create_steps(start, &steps, path);
        }

        let mut current = start;
        // Deepest (last seen) step that still had room for another line
        let mut split: Option<(usize, NodeId)> = None;

        for (position, (_, step)) in steps.iter().enumerate() {
            if mode == PathMode::CreateNewAtEnd
                && self.can_add_line(current, &step.spec.name)
            {
                split = Some((position, current));
            }
            match self.get_child_line(current, &step.spec, step.line_number) {
                Some(child) => current = child,
                None => return self.create_steps(current, &steps[position..], path),
            }
        }

        if mode == PathMode::FollowOrCreate {
            return Ok(current);
        }

        match split {
            Some((position, node)) => self.create_steps(node, &steps[position..], path),
            None => Err(GedTreeError::PathCreation {
                path: owned_path(path),
                index: steps.last().map(|(index, _)| *index).unwrap_or(0),
                reason: "every step has reached its maximum number of lines".into(),
            }),
        }
    }

    fn create_steps<S: AsRef<str>>(
        &mut self,
        start: NodeId,
        steps: &[(usize, PathStep)],
        path: &[S],
    ) -> Result<NodeId> {
        let mut current = start;
        for (index, step) in steps {
            if !self.is_possible_name(current, &step.spec.name) {
                return Err(path_access_error(
                    path,
                    *index,
                    format!(
                        "'{}' is not allowed below '{}'",
                        step.spec.name,
                        self.node_path(current)
                    ),
                ));
            }
            current = match self.add_child_line(current, &step.spec) {
                Ok(Some(child)) => child,
                Ok(None) => {
                    return Err(GedTreeError::PathCreation {
                        path: owned_path(path),
                        index: *index,
                        reason: format!(
                            "maximum number of '{}' lines reached",
                            step.spec.name
                        ),
                    })
                }
                Err(err) => {
                    return Err(GedTreeError::PathCreation {
                        path: owned_path(path),
                        index: *index,
                        reason: err.to_string(),
                    })
                }
            };
        }
        Ok(current)
    }
}

fn owned_path<S: AsRef<str>>(path: &[S]) -> Vec<String> {
    path.iter().map(|step| step.as_ref().to_string()).collect()
}

fn path_access_error<S: AsRef<str>>(path: &[S], index: usize, reason: String) -> GedTreeError {
    GedTreeError::PathAccess {
        path: owned_path(path),
        index,
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TreeConfig;
    use crate::testing::family_store;
    use pretty_assertions::assert_eq;

    fn step(raw: &str) -> Option<PathStep> {
        PathStep::parse(raw, ';')
    }

    #[test]
    fn test_parse_name_only() {
        assert_eq!(
            step("CHIL"),
            Some(PathStep {
                spec: LineSpec::new("CHIL"),
                line_number: None
            })
        );
    }

    #[test]
    fn test_parse_line_number() {
        let parsed = step("CHIL;2").unwrap();
        assert_eq!(parsed.spec, LineSpec::new("CHIL"));
        assert_eq!(parsed.line_number, Some(2));
        assert_eq!(step("CHIL;-1").unwrap().line_number, None);
    }

    #[test]
    fn test_parse_tag_forms() {
        let parsed = step("NOTE_STRUCTURE;NOTE").unwrap();
        assert_eq!(parsed.spec, LineSpec::new("NOTE_STRUCTURE").with_tag("NOTE"));

        let parsed = step("NOTE_STRUCTURE;NOTE;1").unwrap();
        assert_eq!(parsed.spec.tag.as_deref(), Some("NOTE"));
        assert_eq!(parsed.line_number, Some(1));

        let parsed = step("NOTE_STRUCTURE;NOTE;true;false").unwrap();
        assert_eq!(
            parsed.spec,
            LineSpec::new("NOTE_STRUCTURE")
                .with_tag("NOTE")
                .with_variation(true, false)
        );
        assert_eq!(parsed.line_number, None);

        let parsed = step("NOTE_STRUCTURE;NOTE;false;true;3").unwrap();
        assert_eq!(parsed.spec.variation.map(|v| v.with_value), Some(true));
        assert_eq!(parsed.line_number, Some(3));
    }

    #[test]
    fn test_parse_integer_third_field_is_line_number() {
        let parsed = step("NOTE_STRUCTURE;NOTE;1;0").unwrap();
        assert_eq!(parsed.spec, LineSpec::new("NOTE_STRUCTURE").with_tag("NOTE"));
        assert_eq!(parsed.line_number, Some(1));

        let parsed = step("NOTE_STRUCTURE;NOTE;0;1;2").unwrap();
        assert_eq!(parsed.spec.variation, None);
        assert_eq!(parsed.line_number, Some(0));

        let parsed = step("NOTE_STRUCTURE;NOTE;yes;no").unwrap();
        assert_eq!(
            parsed.spec.variation,
            Some(crate::schema::LineVariation::new(true, false))
        );
    }

    #[test]
    fn test_parse_skips_malformed_steps() {
        assert_eq!(step(""), None);
        assert_eq!(step(";NOTE"), None);
        assert_eq!(step("NOTE_STRUCTURE;NOTE;maybe;true"), None);
        assert_eq!(step("NOTE_STRUCTURE;NOTE;x"), None);
        assert_eq!(step("A;B;true;true;1;extra"), None);
    }

    #[test]
    fn test_custom_delimiter() {
        let parsed = PathStep::parse("CHIL,1", ',').unwrap();
        assert_eq!(parsed.line_number, Some(1));
    }

    #[test]
    fn test_follow_on_fresh_tree() {
        let tree = RecordTree::new(family_store(), "FAMILY").unwrap();
        assert_eq!(tree.follow_path(tree.root(), &["FAM"]), None);
        assert_eq!(tree.follow_path(tree.root(), &["FAM", "CHIL"]), None);
        let empty: [&str; 0] = [];
        assert_eq!(tree.follow_path(tree.root(), &empty), Some(tree.root()));
    }

    #[test]
    fn test_create_then_follow() {
        let mut tree = RecordTree::new(family_store(), "FAMILY").unwrap();
        let path = ["FAM", "MARR", "DATE"];
        let created = tree.create_path(tree.root(), &path).unwrap();
        assert_eq!(tree.follow_path(tree.root(), &path), Some(created));
        assert_eq!(tree.create_path(tree.root(), &path).unwrap(), created);
        assert_eq!(tree.node_path(created), "FAM/MARR/DATE");
    }

    #[test]
    fn test_empty_steps_are_skipped() {
        let mut tree = RecordTree::new(family_store(), "FAMILY").unwrap();
        let created = tree.create_path(tree.root(), &["FAM", "", "CHIL"]).unwrap();
        assert_eq!(tree.follow_path(tree.root(), &["FAM", "CHIL"]), Some(created));
    }

    #[test]
    fn test_create_path_end_adds_siblings() {
        let mut tree = RecordTree::new(family_store(), "FAMILY").unwrap();
        let path = ["FAM", "CHIL"];
        let first = tree.create_path_end(tree.root(), &path).unwrap();
        let second = tree.create_path_end(tree.root(), &path).unwrap();
        assert_ne!(first, second);

        let fam = tree.follow_path(tree.root(), &["FAM"]).unwrap();
        assert_eq!(tree.child_lines(fam, "CHIL"), vec![first, second]);
        assert_eq!(tree.follow_path(tree.root(), &["FAM", "CHIL;1"]), Some(second));
    }

    #[test]
    fn test_create_path_end_splits_at_deepest_open_step() {
        let mut tree = RecordTree::new(family_store(), "FAMILY").unwrap();
        let path = ["FAM", "REFN", "TYPE"];
        tree.create_path_end(tree.root(), &path).unwrap();
        // TYPE is {0:1}, so the new branch starts at REFN
        let second = tree.create_path_end(tree.root(), &path).unwrap();

        let fam = tree.follow_path(tree.root(), &["FAM"]).unwrap();
        assert_eq!(tree.number_of_child_lines(fam, "REFN"), 2);
        assert_eq!(tree.follow_path(tree.root(), &["FAM", "REFN;1", "TYPE"]), Some(second));
    }

    #[test]
    fn test_create_path_end_prefers_last_split() {
        let mut tree = RecordTree::new(family_store(), "FAMILY").unwrap();
        let path = ["FAM", "NOTE_STRUCTURE;NOTE;false;true", "NOTE", "CONT"];
        tree.create_path_end(tree.root(), &path).unwrap();
        tree.create_path_end(tree.root(), &path).unwrap();

        let fam = tree.follow_path(tree.root(), &["FAM"]).unwrap();
        assert_eq!(tree.number_of_child_lines(fam, "NOTE_STRUCTURE"), 1);
        let note = tree
            .follow_path(tree.root(), &["FAM", "NOTE_STRUCTURE;NOTE;false;true", "NOTE"])
            .unwrap();
        assert_eq!(tree.number_of_child_lines(note, "CONT"), 2);
    }

    #[test]
    fn test_create_path_end_without_room_fails() {
        let mut tree = RecordTree::new(family_store(), "FAMILY").unwrap();
        let path = ["FAM", "RESN"];
        tree.create_path_end(tree.root(), &path).unwrap();
        let err = tree.create_path_end(tree.root(), &path).unwrap_err();
        match err {
            GedTreeError::PathCreation { path, index, .. } => {
                assert_eq!(path, vec!["FAM".to_string(), "RESN".to_string()]);
                assert_eq!(index, 1);
            }
            other => panic!("Expected PathCreation, got {other}"),
        }
    }

    #[test]
    fn test_create_whole_path_accumulates() {
        let mut tree = RecordTree::new(family_store(), "INDIVIDUAL").unwrap();
        let indi = tree.create_path(tree.root(), &["INDI"]).unwrap();
        let a = tree.create_whole_path(indi, &["NAME", "GIVN"]).unwrap();
        let b = tree.create_whole_path(indi, &["NAME", "GIVN"]).unwrap();
        assert_ne!(a, b);
        assert_eq!(tree.number_of_child_lines(indi, "NAME"), 2);
    }

    #[test]
    fn test_create_whole_path_respects_maximum() {
        let mut tree = RecordTree::new(family_store(), "INDIVIDUAL").unwrap();
        tree.create_whole_path(tree.root(), &["INDI"]).unwrap();
        let err = tree.create_whole_path(tree.root(), &["INDI"]).unwrap_err();
        assert!(matches!(err, GedTreeError::PathCreation { index: 0, .. }));
    }

    #[test]
    fn test_create_illegal_step_is_access_error() {
        let mut tree = RecordTree::new(family_store(), "FAMILY").unwrap();
        let err = tree.create_path(tree.root(), &["FAM", "INDI"]).unwrap_err();
        assert!(matches!(err, GedTreeError::PathAccess { index: 1, .. }));
    }

    #[test]
    fn test_create_ambiguous_variation_is_creation_error() {
        let mut tree = RecordTree::new(family_store(), "FAMILY").unwrap();
        let err = tree
            .create_path(tree.root(), &["FAM", "NOTE_STRUCTURE;NOTE"])
            .unwrap_err();
        assert!(matches!(err, GedTreeError::PathCreation { index: 1, .. }));
    }

    #[test]
    fn test_expect_path_reports_dead_end() {
        let mut tree = RecordTree::new(family_store(), "FAMILY").unwrap();
        tree.create_path(tree.root(), &["FAM"]).unwrap();
        let err = tree.expect_path(tree.root(), &["FAM", "CHIL"]).unwrap_err();
        assert!(matches!(err, GedTreeError::PathAccess { index: 1, .. }));
    }

    #[test]
    fn test_tree_delimiter_is_used() {
        let config = TreeConfig {
            path_delimiter: '|',
            ..TreeConfig::default()
        };
        let mut tree = RecordTree::new(family_store(), "FAMILY")
            .unwrap()
            .with_config(config);
        let path = ["FAM", "NOTE_STRUCTURE|NOTE|true|false", "NOTE"];
        let note = tree.create_path(tree.root(), &path).unwrap();
        let structure = tree.parent(note).unwrap();
        assert_eq!(tree.node(structure).unwrap().tag(), Some("NOTE"));
    }
}
