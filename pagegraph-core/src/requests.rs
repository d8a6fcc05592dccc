use crate::model::{EdgeType, RequestId};
use petgraph::stable_graph::EdgeIndex;

/// The lifecycle of one network request: its start edge, any redirects, and
/// the completion or error edge if the request finished.
#[derive(Debug, Clone)]
pub struct RequestChain {
    pub request_id: RequestId,
    pub start: EdgeIndex,
    pub redirects: Vec<EdgeIndex>,
    pub result: Option<RequestResult>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestResult {
    pub edge: EdgeIndex,
    pub kind: ResultKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    Complete,
    Error,
}

impl ResultKind {
    pub fn from_edge_type(edge_type: EdgeType) -> Option<Self> {
        match edge_type {
            EdgeType::RequestComplete => Some(ResultKind::Complete),
            EdgeType::RequestError => Some(ResultKind::Error),
            _ => None,
        }
    }
}

impl RequestChain {
    pub fn new(request_id: RequestId, start: EdgeIndex) -> Self {
        Self {
            request_id,
            start,
            redirects: Vec::new(),
            result: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.result, Some(RequestResult { kind: ResultKind::Complete, .. }))
    }

    pub fn result_edge(&self) -> Option<EdgeIndex> {
        self.result.map(|r| r.edge)
    }
}
