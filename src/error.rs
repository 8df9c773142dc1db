use std::path::PathBuf;

use thiserror::Error;

use crate::graph::NodeId;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Node not found")]
    NotFound(NodeId),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("Link already exists")]
    Conflict { source_id: NodeId, target_id: NodeId },

    #[error("failed to persist graph to {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed graph document: {0}")]
    MalformedDocument(String),
}

impl GraphError {
    pub fn invalid(message: impl Into<String>) -> Self {
        GraphError::InvalidArgument(message.into())
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        GraphError::MalformedDocument(message.into())
    }
}

impl From<serde_json::Error> for GraphError {
    fn from(error: serde_json::Error) -> Self {
        GraphError::MalformedDocument(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GraphError>;
