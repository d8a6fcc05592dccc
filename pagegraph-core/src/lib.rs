pub mod error;
pub mod graph;
pub mod graphml;
pub mod js;
pub mod model;
pub mod query;
pub mod report;
pub mod requests;
pub mod urls;

pub use error::GraphError;
pub use graph::PageGraph;
pub use js::JsInvocation;
pub use model::{EdgeType, NodeType, ResourceType, ScriptType};
pub use requests::RequestChain;
