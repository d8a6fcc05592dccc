use crate::graph::PageGraph;
use crate::model::{attrs, EdgeType};
use petgraph::stable_graph::{EdgeIndex, NodeIndex};
use serde_json::Value;
use tracing::warn;

/// One call into a JS builtin or web API, with its result if one was
/// recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JsInvocation {
    pub structure: NodeIndex,
    pub call: EdgeIndex,
    pub result: Option<EdgeIndex>,
}

impl PageGraph {
    /// Calls and results interleaved by edge id; each result belongs to the
    /// call right before it.
    pub fn js_invocations(&self, structure: NodeIndex) -> Vec<JsInvocation> {
        let mut edges: Vec<EdgeIndex> = self
            .incoming_edges(structure)
            .into_iter()
            .filter(|&e| self.edge(e).is(EdgeType::JsCall))
            .chain(
                self.outgoing_edges(structure)
                    .into_iter()
                    .filter(|&e| self.edge(e).is(EdgeType::JsResult)),
            )
            .collect();
        edges.sort_by_key(|&e| self.edge(e).int_id());

        let mut invocations: Vec<JsInvocation> = Vec::new();
        for edge in edges {
            if self.edge(edge).is(EdgeType::JsCall) {
                invocations.push(JsInvocation {
                    structure,
                    call: edge,
                    result: None,
                });
                continue;
            }
            match invocations.last_mut() {
                Some(last) if last.result.is_none() => last.result = Some(edge),
                _ => warn!(
                    "Result edge {} on {} has no call to attach to",
                    self.edge(edge).id,
                    self.node(structure).id
                ),
            }
        }
        invocations
    }

    /// The script that made the call.
    pub fn calling_script(&self, invocation: &JsInvocation) -> NodeIndex {
        self.edge_endpoints(invocation.call).0
    }

    /// Frame of the calling script.
    pub fn call_context(&self, invocation: &JsInvocation) -> Option<NodeIndex> {
        self.domroot(self.calling_script(invocation))
    }

    /// Frame the call was executed in, taken from the call edge's frame id.
    pub fn receiver_context(&self, invocation: &JsInvocation) -> Option<NodeIndex> {
        self.edge(invocation.call)
            .frame_id()
            .and_then(|frame_id| self.domroot_for_frame_id(frame_id))
    }

    pub fn invocation_args(&self, invocation: &JsInvocation) -> Value {
        json_or_string(self.edge(invocation.call).attr(attrs::ARGS))
    }

    pub fn invocation_result(&self, invocation: &JsInvocation) -> Option<Value> {
        invocation
            .result
            .map(|e| json_or_string(self.edge(e).attr(attrs::VALUE)))
    }
}

// Recorded values are JSON when the engine could serialize them, raw text
// otherwise.
fn json_or_string(raw: Option<&str>) -> Value {
    match raw {
        Some(raw) => serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string())),
        None => Value::Null,
    }
}
