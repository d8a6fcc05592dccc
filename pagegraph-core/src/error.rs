use thiserror::Error;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("XML error: {0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("XML attribute error: {0}")]
    XmlAttrError(#[from] quick_xml::events::attributes::AttrError),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Unexpected node type '{0}'")]
    UnknownNodeType(String),

    #[error("Unexpected edge type '{0}'")]
    UnknownEdgeType(String),

    #[error("Invalid element id '{0}', should be either n## or e##")]
    InvalidElementId(String),

    #[error("No node with id {0}")]
    UnknownNode(String),

    #[error("No edge with id {0}")]
    UnknownEdge(String),

    #[error("Element {id} is missing attribute '{attr}'")]
    MissingAttribute { id: String, attr: &'static str },
}

pub type Result<T> = std::result::Result<T, GraphError>;
