pub mod config;
pub mod document;
pub mod error;
pub mod path;
pub mod record;
pub mod schema;
pub mod validation;

#[cfg(test)]
mod testing;

pub use config::{parse_config_str, PrintPolicy, TreeConfig};
pub use document::{render_lines, snapshot, DocumentNode};
pub use error::{GedTreeError, Result};
pub use path::PathStep;
pub use record::{LineSpec, NodeId, NodeKey, Payload, RecordNode, RecordTree};
pub use schema::{parse_grammar_str, GrammarSchemaStore};
pub use validation::{validate_tree, ValidationResult};
