//! Structural queries over a loaded [`PageGraph`].
//!
//! Every query is a plain function over a borrowed graph and returns a list
//! of serializable reports. Entities the graph does not describe well enough
//! to report on are logged and skipped.

use crate::error::{GraphError, Result};
use crate::graph::PageGraph;
use crate::model::PageGraphId;
use crate::report::{
    DomElementReport, ElementReport, FrameReport, JsInvokeReport, JsStructureReport,
    RequestChainReport, ScriptReport,
};
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubframesReport {
    #[serde(rename = "parent frame")]
    pub parent_frame: FrameReport,
    pub iframe: DomElementReport,
    #[serde(rename = "child frames")]
    pub child_frames: Vec<FrameReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestsReport {
    pub request: RequestChainReport,
    pub frame: FrameReport,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsCallsReport {
    pub method: JsStructureReport,
    pub invocation: JsInvokeReport,
    #[serde(rename = "call context")]
    pub call_context: FrameReport,
    #[serde(rename = "receiver context")]
    pub receiver_context: FrameReport,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScriptsReport {
    pub script: ScriptReport,
}

/// Filters for [`js_calls`].
#[derive(Debug, Clone, Default)]
pub struct JsCallFilter {
    /// PageGraph id of the calling frame.
    pub frame: Option<PageGraphId>,
    pub cross_frame_only: bool,
    /// Case-sensitive substring of the builtin or API name.
    pub method: Option<String>,
    pub node_id: Option<PageGraphId>,
}

/// Iframes together with the frames they loaded.
///
/// With `local_only`, only iframes in the top level frame whose child frames
/// are all local are reported.
pub fn subframes(pg: &PageGraph, local_only: bool) -> Vec<SubframesReport> {
    let mut reports = Vec::new();

    for iframe in pg.iframe_nodes() {
        let Some(parent_frame) = pg.domroot(iframe) else {
            warn!("Couldn't find owner of iframe {}", pg.node(iframe).id);
            continue;
        };
        if local_only && !pg.is_top_level_frame(parent_frame) {
            continue;
        }

        let child_domroots = pg.frame_owner_domroots(iframe);
        if local_only && !child_domroots.iter().all(|&d| pg.is_local_frame(d)) {
            continue;
        }
        if child_domroots.is_empty() {
            continue;
        }

        reports.push(SubframesReport {
            parent_frame: pg.frame_report(parent_frame),
            iframe: pg.dom_element_report(iframe),
            child_frames: child_domroots
                .into_iter()
                .map(|d| pg.frame_report(d))
                .collect(),
        });
    }
    reports
}

/// Every request in document order, with the frame that issued it.
///
/// `frame` matches either the frame id recorded on the request or the
/// PageGraph id of the frame's DOM root.
pub fn requests(pg: &PageGraph, frame: Option<&str>) -> Vec<RequestsReport> {
    let mut reports = Vec::new();

    for &start in pg.request_start_edges() {
        let edge = pg.edge(start);
        let frame_id = edge.frame_id();
        let domroot = frame_id.and_then(|id| pg.domroot_for_frame_id(id));

        if let Some(filter) = frame {
            let matches_raw = frame_id == Some(filter);
            let matches_node = domroot.is_some_and(|d| pg.node(d).id == filter);
            if !matches_raw && !matches_node {
                continue;
            }
        }

        let Some(chain) = edge.request_id().and_then(|id| pg.request_chain_for_id(id)) else {
            warn!("No request chain for request start edge {}", edge.id);
            continue;
        };
        let Some(domroot) = domroot else {
            warn!(
                "No frame for frame id {:?} of request start edge {}",
                frame_id, edge.id
            );
            continue;
        };

        reports.push(RequestsReport {
            request: pg.request_chain_report(chain),
            frame: pg.frame_report(domroot),
        });
    }
    reports
}

/// Calls into JS builtins and web APIs.
pub fn js_calls(pg: &PageGraph, filter: &JsCallFilter) -> Vec<JsCallsReport> {
    let mut reports = Vec::new();

    for structure in pg.js_structure_nodes() {
        let node = pg.node(structure);
        if filter.node_id.as_deref().is_some_and(|id| node.id != id) {
            continue;
        }
        if filter
            .method
            .as_deref()
            .is_some_and(|method| !node.method_name().contains(method))
        {
            continue;
        }

        for invocation in pg.js_invocations(structure) {
            let call_id = &pg.edge(invocation.call).id;
            let Some(call_context) = pg.call_context(&invocation) else {
                warn!("Could not find the calling frame for js call {}", call_id);
                continue;
            };
            let Some(receiver_context) = pg.receiver_context(&invocation) else {
                warn!("Could not find the receiving frame for js call {}", call_id);
                continue;
            };

            if filter
                .frame
                .as_deref()
                .is_some_and(|frame| pg.node(call_context).id != frame)
            {
                continue;
            }
            if filter.cross_frame_only && call_context == receiver_context {
                continue;
            }

            reports.push(JsCallsReport {
                method: pg.js_structure_report(structure),
                invocation: pg.js_invoke_report(&invocation),
                call_context: pg.frame_report(call_context),
                receiver_context: pg.frame_report(receiver_context),
            });
        }
    }
    reports
}

/// Scripts executed during the page load.
pub fn scripts(
    pg: &PageGraph,
    frame: Option<&str>,
    node_id: Option<&str>,
    include_source: bool,
) -> Vec<ScriptsReport> {
    let mut reports = Vec::new();

    for &script in pg.script_nodes() {
        if node_id.is_some_and(|id| pg.node(script).id != id) {
            continue;
        }
        if let Some(frame) = frame {
            let in_frame = pg
                .domroot(script)
                .is_some_and(|d| pg.node(d).id == frame);
            if !in_frame {
                continue;
            }
        }
        reports.push(ScriptsReport {
            script: pg.script_report(script, include_source),
        });
    }
    reports
}

/// Looks up a single node (`n##`) or edge (`e##`) and expands its
/// neighborhood `depth` levels deep.
pub fn element_query(pg: &PageGraph, element_id: &str, depth: usize) -> Result<ElementReport> {
    if element_id.starts_with('n') {
        let node = pg
            .node_index(element_id)
            .ok_or_else(|| GraphError::UnknownNode(element_id.to_string()))?;
        Ok(ElementReport::Node(pg.node_report(node, depth)))
    } else if element_id.starts_with('e') {
        let edge = pg
            .edge_index(element_id)
            .ok_or_else(|| GraphError::UnknownEdge(element_id.to_string()))?;
        Ok(ElementReport::Edge(pg.edge_report(edge, depth)))
    } else {
        Err(GraphError::InvalidElementId(element_id.to_string()))
    }
}
