use crate::record::NodeId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GedTreeError {
    #[error("Schema error at line {line}: {message}")]
    Schema { line: usize, message: String },

    #[error("Cannot create line '{name}': {reason}")]
    Creation { name: String, reason: String },

    #[error("Path access failed at step {index} of {path:?}: {reason}")]
    PathAccess {
        path: Vec<String>,
        index: usize,
        reason: String,
    },

    #[error("Path creation failed at step {index} of {path:?}: {reason}")]
    PathCreation {
        path: Vec<String>,
        index: usize,
        reason: String,
    },

    #[error("Node {node} has been removed from its tree")]
    Detached { node: NodeId },

    #[error("Value error: {0}")]
    Value(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GedTreeError {
    pub(crate) fn schema(line: usize, message: impl Into<String>) -> Self {
        GedTreeError::Schema {
            line,
            message: message.into(),
        }
    }

    pub(crate) fn creation(name: &str, reason: impl Into<String>) -> Self {
        GedTreeError::Creation {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, GedTreeError>;
