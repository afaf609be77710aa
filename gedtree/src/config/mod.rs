use crate::error::{GedTreeError, Result};
use serde::{Deserialize, Serialize};

/// Settings shared by every operation on one record tree.
///
/// Usually read from YAML:
///
/// ```yaml
/// path_delimiter: ";"
/// print:
///   print_empty_lines: false
///   print_unset_lines: false
/// recursive_bulk: true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// Separator between the sub-fields of one path step
    pub path_delimiter: char,
    pub print: PrintPolicy,
    /// Whether bulk population descends into newly added lines by default
    pub recursive_bulk: bool,
}

impl Default for TreeConfig {
    fn default() -> Self {
        TreeConfig {
            path_delimiter: ';',
            print: PrintPolicy::default(),
            recursive_bulk: false,
        }
    }
}

/// Decides which lines without content are still printed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrintPolicy {
    /// Print lines whose value or xref is set to an empty string
    pub print_empty_lines: bool,
    /// Print lines whose value and xref were never set
    pub print_unset_lines: bool,
}

impl PrintPolicy {
    pub fn print_all() -> Self {
        PrintPolicy {
            print_empty_lines: true,
            print_unset_lines: true,
        }
    }
}

/// Parse a YAML tree configuration
pub fn parse_config_str(content: &str) -> Result<TreeConfig> {
    if content.trim().is_empty() {
        return Ok(TreeConfig::default());
    }
    let config: TreeConfig = serde_yaml::from_str(content)?;
    if config.path_delimiter.is_alphanumeric() || config.path_delimiter.is_whitespace() {
        return Err(GedTreeError::Config(format!(
            "path_delimiter '{}' would be ambiguous inside a path step",
            config.path_delimiter
        )));
    }
    Ok(config)
}
