// Serializable reports built from a loaded page graph

use crate::error::Result;
use crate::graph::PageGraph;
use crate::js::JsInvocation;
use crate::model::{EdgeType, NodeType, PageGraphId, RequestId};
use crate::requests::{RequestChain, ResultKind};
use indexmap::IndexMap;
use petgraph::stable_graph::{EdgeIndex, NodeIndex};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameReport {
    pub id: PageGraphId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(rename = "blink id", skip_serializing_if = "Option::is_none")]
    pub blink_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomElementReport {
    pub id: PageGraphId,
    pub tag: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsStructureReport {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsInvokeReport {
    pub args: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestReport {
    pub id: PageGraphId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RequestResultReport {
    Complete {
        id: PageGraphId,
        #[serde(skip_serializing_if = "Option::is_none")]
        size: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        hash: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        headers: Option<String>,
    },
    Error {
        id: PageGraphId,
        #[serde(skip_serializing_if = "Option::is_none")]
        headers: Option<String>,
    },
}

impl RequestResultReport {
    pub fn id(&self) -> &str {
        match self {
            RequestResultReport::Complete { id, .. } | RequestResultReport::Error { id, .. } => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestChainReport {
    #[serde(rename = "request id")]
    pub request_id: RequestId,
    #[serde(rename = "request type")]
    pub request_type: String,
    pub request: RequestReport,
    pub redirects: Vec<RequestReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<RequestResultReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScriptReport {
    pub id: PageGraphId,
    #[serde(rename = "type")]
    pub script_type: String,
    pub hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executor: Option<Box<ExecutorReport>>,
}

/// Whatever caused a script to run: another script, or the element that
/// carried it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ExecutorReport {
    Script(ScriptReport),
    Element(DomElementReport),
}

pub type Details = IndexMap<&'static str, String>;

/// Id, type and summary fields of a node or edge, without its neighbors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BriefReport {
    pub id: PageGraphId,
    #[serde(rename = "type")]
    pub type_name: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Details>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeReport {
    #[serde(flatten)]
    pub element: BriefReport,
    #[serde(rename = "incoming edges")]
    pub incoming_edges: Vec<EdgeEntry>,
    #[serde(rename = "outgoing edges")]
    pub outgoing_edges: Vec<EdgeEntry>,
    pub kind: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeReport {
    #[serde(flatten)]
    pub element: BriefReport,
    #[serde(rename = "incoming node")]
    pub incoming_node: NodeEntry,
    #[serde(rename = "outgoing node")]
    pub outgoing_node: NodeEntry,
    pub kind: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EdgeEntry {
    Brief(BriefReport),
    Full(EdgeReport),
    Recursion(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum NodeEntry {
    Brief(BriefReport),
    Full(Box<NodeReport>),
    Recursion(String),
}

/// Result of an element lookup.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ElementReport {
    Node(NodeReport),
    Edge(EdgeReport),
}

fn recursion(id: &str) -> String {
    format!("(recursion {})", id)
}

impl PageGraph {
    pub fn frame_report(&self, domroot: NodeIndex) -> FrameReport {
        let node = self.node(domroot);
        FrameReport {
            id: node.id.clone(),
            url: node.url().map(str::to_string),
            blink_id: node.blink_id().map(str::to_string),
        }
    }

    pub fn dom_element_report(&self, node: NodeIndex) -> DomElementReport {
        let node = self.node(node);
        DomElementReport {
            id: node.id.clone(),
            tag: node.tag_name().to_string(),
        }
    }

    pub fn js_structure_report(&self, structure: NodeIndex) -> JsStructureReport {
        let node = self.node(structure);
        JsStructureReport {
            name: node.method_name().to_string(),
            type_name: node.node_type.as_str().to_string(),
        }
    }

    pub fn js_invoke_report(&self, invocation: &JsInvocation) -> JsInvokeReport {
        JsInvokeReport {
            args: self.invocation_args(invocation),
            result: self.invocation_result(invocation),
        }
    }

    fn request_report(&self, edge: EdgeIndex) -> RequestReport {
        RequestReport {
            id: self.edge(edge).id.clone(),
            url: self.request_url(edge).map(str::to_string),
        }
    }

    pub fn request_chain_report(&self, chain: &RequestChain) -> RequestChainReport {
        let result = chain.result.map(|result| {
            let edge = self.edge(result.edge);
            let headers = edge.headers().map(str::to_string);
            match result.kind {
                ResultKind::Complete => RequestResultReport::Complete {
                    id: edge.id.clone(),
                    size: edge.size(),
                    hash: edge.response_hash().map(str::to_string),
                    headers,
                },
                ResultKind::Error => RequestResultReport::Error {
                    id: edge.id.clone(),
                    headers,
                },
            }
        });

        RequestChainReport {
            request_id: chain.request_id,
            request_type: self.edge(chain.start).resource_type().as_str().to_string(),
            request: self.request_report(chain.start),
            redirects: chain
                .redirects
                .iter()
                .map(|&e| self.request_report(e))
                .collect(),
            result,
        }
    }

    pub fn script_report(&self, script: NodeIndex, include_source: bool) -> ScriptReport {
        self.script_report_guarded(script, include_source, &mut HashSet::new())
    }

    fn script_report_guarded(
        &self,
        script: NodeIndex,
        include_source: bool,
        seen: &mut HashSet<NodeIndex>,
    ) -> ScriptReport {
        seen.insert(script);
        let executor = self
            .creator_node(script)
            .and_then(|creator| match self.node(creator).node_type {
                NodeType::Parser => None,
                NodeType::Script if seen.contains(&creator) => None,
                NodeType::Script => Some(ExecutorReport::Script(self.script_report_guarded(
                    creator,
                    include_source,
                    seen,
                ))),
                _ => Some(ExecutorReport::Element(self.dom_element_report(creator))),
            })
            .map(Box::new);

        let node = self.node(script);
        ScriptReport {
            id: node.id.clone(),
            script_type: node.script_type().as_str().to_string(),
            hash: self.script_hash(script),
            url: self.script_url(script),
            source: include_source.then(|| node.source().to_string()),
            executor,
        }
    }

    fn node_details(&self, index: NodeIndex) -> Option<Details> {
        let node = self.node(index);
        let mut details = Details::new();
        match node.node_type {
            NodeType::Script => {
                details.insert("hash", self.script_hash(index));
                details.insert("script type", node.script_type().as_str().to_string());
            }
            NodeType::HtmlElement => {
                details.insert("tag name", node.tag_name().to_string());
            }
            NodeType::Resource => {
                details.insert("url", node.url().unwrap_or_default().to_string());
            }
            _ => return None,
        }
        Some(details)
    }

    fn edge_details(&self, index: EdgeIndex) -> Option<Details> {
        let edge = self.edge(index);
        let mut details = Details::new();
        match edge.edge_type {
            EdgeType::RequestStart => {
                details.insert("url", self.request_url(index).unwrap_or_default().to_string());
                details.insert("resource type", edge.resource_type().as_str().to_string());
            }
            EdgeType::RequestComplete => {
                details.insert(
                    "size",
                    edge.size().map(|s| s.to_string()).unwrap_or_default(),
                );
                details.insert("hash", edge.response_hash().unwrap_or_default().to_string());
            }
            _ => return None,
        }
        Some(details)
    }

    pub fn brief_node_report(&self, node: NodeIndex) -> BriefReport {
        let data = self.node(node);
        BriefReport {
            id: data.id.clone(),
            type_name: data.node_type.as_str(),
            details: self.node_details(node),
        }
    }

    pub fn brief_edge_report(&self, edge: EdgeIndex) -> BriefReport {
        let data = self.edge(edge);
        BriefReport {
            id: data.id.clone(),
            type_name: data.edge_type.as_str(),
            details: self.edge_details(edge),
        }
    }

    /// Node with its edges expanded `depth` levels deep. Elements already on
    /// the current expansion path are rendered as recursion markers.
    pub fn node_report(&self, node: NodeIndex, depth: usize) -> NodeReport {
        self.node_report_at(node, depth, &mut Vec::new())
    }

    pub fn edge_report(&self, edge: EdgeIndex, depth: usize) -> EdgeReport {
        self.edge_report_at(edge, depth, &mut Vec::new())
    }

    fn node_report_at<'a>(
        &'a self,
        node: NodeIndex,
        depth: usize,
        path: &mut Vec<&'a str>,
    ) -> NodeReport {
        path.push(&self.node(node).id);
        let incoming_edges = self
            .incoming_edges(node)
            .into_iter()
            .map(|e| self.edge_entry(e, depth, path))
            .collect();
        let outgoing_edges = self
            .outgoing_edges(node)
            .into_iter()
            .map(|e| self.edge_entry(e, depth, path))
            .collect();
        path.pop();

        NodeReport {
            element: self.brief_node_report(node),
            incoming_edges,
            outgoing_edges,
            kind: "node",
        }
    }

    fn edge_entry<'a>(&'a self, edge: EdgeIndex, depth: usize, path: &mut Vec<&'a str>) -> EdgeEntry {
        let id = self.edge(edge).id.as_str();
        if depth == 0 {
            EdgeEntry::Brief(self.brief_edge_report(edge))
        } else if path.contains(&id) {
            EdgeEntry::Recursion(recursion(id))
        } else {
            EdgeEntry::Full(self.edge_report_at(edge, depth - 1, path))
        }
    }

    fn edge_report_at<'a>(
        &'a self,
        edge: EdgeIndex,
        depth: usize,
        path: &mut Vec<&'a str>,
    ) -> EdgeReport {
        path.push(&self.edge(edge).id);
        let (source, target) = self.edge_endpoints(edge);
        let incoming_node = self.node_entry(source, depth, path);
        let outgoing_node = self.node_entry(target, depth, path);
        path.pop();

        EdgeReport {
            element: self.brief_edge_report(edge),
            incoming_node,
            outgoing_node,
            kind: "edge",
        }
    }

    fn node_entry<'a>(&'a self, node: NodeIndex, depth: usize, path: &mut Vec<&'a str>) -> NodeEntry {
        let id = self.node(node).id.as_str();
        if path.contains(&id) {
            NodeEntry::Recursion(recursion(id))
        } else if depth > 0 {
            NodeEntry::Full(Box::new(self.node_report_at(node, depth - 1, path)))
        } else {
            NodeEntry::Brief(self.brief_node_report(node))
        }
    }
}

pub fn generate_json_report<T: Serialize + ?Sized>(report: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}
