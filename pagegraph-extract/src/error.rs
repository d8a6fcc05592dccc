use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Graph error: {0}")]
    GraphError(#[from] pagegraph_core::GraphError),

    #[error("No graph edge with id {0}")]
    MissingEdge(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Task join error: {0}")]
    JoinError(#[from] tokio::task::JoinError),

    #[error("Failed to launch task for {path}: {reason}")]
    LaunchError { path: String, reason: String },
}

pub type Result<T> = std::result::Result<T, ExtractError>;
