use crate::error::{GraphError, Result};
use crate::graphml::{self, RawEdge, RawGraph, RawNode};
use crate::model::{
    attrs, EdgeData, EdgeType, NodeData, NodeType, RequestId, ScriptType,
};
use crate::requests::{RequestChain, RequestResult, ResultKind};
use crate::urls::is_url_local;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use petgraph::Direction;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Major and minor PageGraph format version this library understands.
pub const SUPPORTED_VERSION: (u32, u32) = (0, 7);

/// One recorded page load. Immutable once loaded.
pub struct PageGraph {
    graph: StableDiGraph<NodeData, EdgeData>,
    node_ids: HashMap<String, NodeIndex>,
    edge_ids: HashMap<String, EdgeIndex>,
    // (source, target) by edge index
    endpoints: Vec<(NodeIndex, NodeIndex)>,
    nodes_by_type: HashMap<NodeType, Vec<NodeIndex>>,
    edges_by_type: HashMap<EdgeType, Vec<EdgeIndex>>,
    blink_ids: HashMap<String, NodeIndex>,
    // frame id -> most recent DOM root recorded for that frame
    frames: HashMap<String, NodeIndex>,
    request_chains: HashMap<RequestId, RequestChain>,
}

impl PageGraph {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading page graph {}", path.display());
        let xml = fs::read_to_string(path)?;
        Self::from_graphml(&xml)
    }

    pub fn from_graphml(xml: &str) -> Result<Self> {
        let raw = graphml::parse(xml)?;
        check_version(raw.version.as_deref());
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawGraph) -> Result<Self> {
        let RawGraph { nodes, edges, .. } = raw;
        let mut graph = StableDiGraph::with_capacity(nodes.len(), edges.len());
        let mut node_ids = HashMap::with_capacity(nodes.len());
        let mut edge_ids = HashMap::with_capacity(edges.len());
        let mut endpoints = Vec::with_capacity(edges.len());
        let mut nodes_by_type: HashMap<NodeType, Vec<NodeIndex>> = HashMap::new();
        let mut edges_by_type: HashMap<EdgeType, Vec<EdgeIndex>> = HashMap::new();

        for RawNode { id, attrs } in nodes {
            let type_name = attrs
                .get(attrs::NODE_TYPE)
                .ok_or_else(|| GraphError::MissingAttribute {
                    id: id.clone(),
                    attr: attrs::NODE_TYPE,
                })?;
            let node_type = NodeType::from_str(type_name)
                .ok_or_else(|| GraphError::UnknownNodeType(type_name.clone()))?;
            if node_ids.contains_key(&id) {
                return Err(GraphError::ParseError(format!("Duplicate node id {}", id)));
            }
            let index = graph.add_node(NodeData {
                id: id.clone(),
                node_type,
                attrs,
            });
            node_ids.insert(id, index);
            nodes_by_type.entry(node_type).or_default().push(index);
        }

        for RawEdge {
            id,
            source,
            target,
            attrs,
        } in edges
        {
            let type_name = attrs
                .get(attrs::EDGE_TYPE)
                .ok_or_else(|| GraphError::MissingAttribute {
                    id: id.clone(),
                    attr: attrs::EDGE_TYPE,
                })?;
            let edge_type = EdgeType::from_str(type_name)
                .ok_or_else(|| GraphError::UnknownEdgeType(type_name.clone()))?;
            let source_index = *node_ids
                .get(&source)
                .ok_or_else(|| GraphError::UnknownNode(source.clone()))?;
            let target_index = *node_ids
                .get(&target)
                .ok_or_else(|| GraphError::UnknownNode(target.clone()))?;
            if edge_ids.contains_key(&id) {
                return Err(GraphError::ParseError(format!("Duplicate edge id {}", id)));
            }
            let index = graph.add_edge(
                source_index,
                target_index,
                EdgeData {
                    id: id.clone(),
                    edge_type,
                    attrs,
                },
            );
            edge_ids.insert(id, index);
            endpoints.push((source_index, target_index));
            edges_by_type.entry(edge_type).or_default().push(index);
        }

        let mut pg = PageGraph {
            graph,
            node_ids,
            edge_ids,
            endpoints,
            nodes_by_type,
            edges_by_type,
            blink_ids: HashMap::new(),
            frames: HashMap::new(),
            request_chains: HashMap::new(),
        };
        pg.build_caches();
        Ok(pg)
    }

    fn build_caches(&mut self) {
        let mut blink_ids = HashMap::new();
        let mut frames: HashMap<String, NodeIndex> = HashMap::new();
        for index in self.graph.node_indices() {
            let node = &self.graph[index];
            if !node.node_type.is_dom_node() {
                continue;
            }
            let Some(blink_id) = node.blink_id() else {
                continue;
            };
            blink_ids.insert(blink_id.to_string(), index);

            if node.node_type == NodeType::DomRoot {
                let newer = match frames.get(blink_id) {
                    Some(&current) => {
                        self.graph[current].timestamp().unwrap_or(i64::MIN)
                            <= node.timestamp().unwrap_or(i64::MIN)
                    }
                    None => true,
                };
                if newer {
                    frames.insert(blink_id.to_string(), index);
                }
            }
        }

        let mut request_chains = HashMap::new();
        for &start in self.edges_of_type(EdgeType::RequestStart) {
            let Some(request_id) = self.graph[start].request_id() else {
                warn!("Request start edge {} has no request id", self.graph[start].id);
                continue;
            };
            if request_chains.contains_key(&request_id) {
                warn!(
                    "Duplicate request id {} on edge {}, keeping the first start edge",
                    request_id, self.graph[start].id
                );
                continue;
            }
            request_chains.insert(request_id, self.chain_for_start(request_id, start));
        }

        self.blink_ids = blink_ids;
        self.frames = frames;
        self.request_chains = request_chains;
    }

    fn chain_for_start(&self, request_id: RequestId, start: EdgeIndex) -> RequestChain {
        let mut chain = RequestChain::new(request_id, start);
        let mut visited = HashSet::new();
        let (_, mut resource) = self.edge_endpoints(start);
        while visited.insert(resource) {
            let Some(next) = self.response_for_id(resource, request_id) else {
                break;
            };
            let edge_type = self.graph[next].edge_type;
            if edge_type == EdgeType::RequestRedirect {
                chain.redirects.push(next);
                resource = self.edge_endpoints(next).1;
                continue;
            }
            if let Some(kind) = ResultKind::from_edge_type(edge_type) {
                chain.result = Some(RequestResult { edge: next, kind });
            }
            break;
        }
        chain
    }

    fn response_for_id(&self, resource: NodeIndex, request_id: RequestId) -> Option<EdgeIndex> {
        self.outgoing_edges(resource).into_iter().find(|&e| {
            let edge = &self.graph[e];
            (edge.edge_type.is_request_result() || edge.edge_type == EdgeType::RequestRedirect)
                && edge.request_id() == Some(request_id)
        })
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    pub fn node(&self, index: NodeIndex) -> &NodeData {
        &self.graph[index]
    }

    pub fn edge(&self, index: EdgeIndex) -> &EdgeData {
        &self.graph[index]
    }

    pub fn node_index(&self, id: &str) -> Option<NodeIndex> {
        self.node_ids.get(id).copied()
    }

    pub fn edge_index(&self, id: &str) -> Option<EdgeIndex> {
        self.edge_ids.get(id).copied()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn node_indices(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.node_indices()
    }

    pub fn nodes_of_type(&self, node_type: NodeType) -> &[NodeIndex] {
        self.nodes_by_type
            .get(&node_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn edges_of_type(&self, edge_type: EdgeType) -> &[EdgeIndex] {
        self.edges_by_type
            .get(&edge_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Request start edges in document order.
    pub fn request_start_edges(&self) -> &[EdgeIndex] {
        self.edges_of_type(EdgeType::RequestStart)
    }

    pub fn script_nodes(&self) -> &[NodeIndex] {
        self.nodes_of_type(NodeType::Script)
    }

    pub fn js_structure_nodes(&self) -> Vec<NodeIndex> {
        self.nodes_of_type(NodeType::JsBuiltin)
            .iter()
            .chain(self.nodes_of_type(NodeType::WebApi))
            .copied()
            .collect()
    }

    pub fn iframe_nodes(&self) -> Vec<NodeIndex> {
        self.nodes_of_type(NodeType::FrameOwner)
            .iter()
            .copied()
            .filter(|&n| self.graph[n].tag_name().eq_ignore_ascii_case("IFRAME"))
            .collect()
    }

    pub fn node_for_blink_id(&self, blink_id: &str) -> Option<NodeIndex> {
        self.blink_ids.get(blink_id).copied()
    }

    pub fn domroot_for_frame_id(&self, frame_id: &str) -> Option<NodeIndex> {
        self.frames.get(frame_id).copied()
    }

    pub fn request_chain_for_id(&self, request_id: RequestId) -> Option<&RequestChain> {
        self.request_chains.get(&request_id)
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    /// (source, target) of an edge.
    pub fn edge_endpoints(&self, edge: EdgeIndex) -> (NodeIndex, NodeIndex) {
        self.endpoints[edge.index()]
    }

    pub fn incoming_edges(&self, node: NodeIndex) -> Vec<EdgeIndex> {
        self.edges_in_direction(node, Direction::Incoming)
    }

    pub fn outgoing_edges(&self, node: NodeIndex) -> Vec<EdgeIndex> {
        self.edges_in_direction(node, Direction::Outgoing)
    }

    fn edges_in_direction(&self, node: NodeIndex, direction: Direction) -> Vec<EdgeIndex> {
        let mut edges: Vec<EdgeIndex> = self
            .graph
            .edges_directed(node, direction)
            .map(|e| e.id())
            .collect();
        edges.sort();
        edges
    }

    pub fn in_degree(&self, node: NodeIndex) -> usize {
        self.graph.edges_directed(node, Direction::Incoming).count()
    }

    pub fn out_degree(&self, node: NodeIndex) -> usize {
        self.graph.edges_directed(node, Direction::Outgoing).count()
    }

    pub fn degree(&self, node: NodeIndex) -> usize {
        self.in_degree(node) + self.out_degree(node)
    }

    /// Distinct nodes with an edge of any type into `node`.
    pub fn predecessors(&self, node: NodeIndex) -> Vec<NodeIndex> {
        self.distinct_neighbors(node, Direction::Incoming, |_| true)
    }

    /// Distinct nodes `node` has an edge of any type into.
    pub fn successors(&self, node: NodeIndex) -> Vec<NodeIndex> {
        self.distinct_neighbors(node, Direction::Outgoing, |_| true)
    }

    /// Parents over structural edges; request lifecycle and JS call edges
    /// do not make one node the parent of another.
    pub fn parent_nodes(&self, node: NodeIndex) -> Vec<NodeIndex> {
        self.distinct_neighbors(node, Direction::Incoming, EdgeType::is_structural)
    }

    pub fn child_nodes(&self, node: NodeIndex) -> Vec<NodeIndex> {
        self.distinct_neighbors(node, Direction::Outgoing, EdgeType::is_structural)
    }

    fn distinct_neighbors(
        &self,
        node: NodeIndex,
        direction: Direction,
        keep: impl Fn(&EdgeType) -> bool,
    ) -> Vec<NodeIndex> {
        let mut seen = HashSet::new();
        let mut neighbors = Vec::new();
        for edge in self.edges_in_direction(node, direction) {
            if !keep(&self.graph[edge].edge_type) {
                continue;
            }
            let (source, target) = self.edge_endpoints(edge);
            let other = match direction {
                Direction::Incoming => source,
                Direction::Outgoing => target,
            };
            if seen.insert(other) {
                neighbors.push(other);
            }
        }
        neighbors
    }

    /// URL of the resource a request start or redirect edge points at.
    pub fn request_url(&self, edge: EdgeIndex) -> Option<&str> {
        let (_, resource) = self.edge_endpoints(edge);
        self.graph[resource].url()
    }

    // ------------------------------------------------------------------
    // Frames
    // ------------------------------------------------------------------

    /// The DOM root (frame) that owns `node`.
    pub fn domroot(&self, node: NodeIndex) -> Option<NodeIndex> {
        match self.graph[node].node_type {
            NodeType::DomRoot => Some(node),
            NodeType::Parser => None,
            NodeType::HtmlElement | NodeType::FrameOwner => self
                .domroot_from_insertions(node, &mut HashSet::new())
                .or_else(|| self.domroot_from_creator(node)),
            _ => self.domroot_from_creator(node),
        }
    }

    // Follows the first resolvable insertion parent up to a DOM root. Elements
    // that were never inserted (e.g. built in script) have none.
    fn domroot_from_insertions(
        &self,
        node: NodeIndex,
        seen: &mut HashSet<NodeIndex>,
    ) -> Option<NodeIndex> {
        if !seen.insert(node) {
            return None;
        }
        for edge in self.incoming_edges(node) {
            let edge = &self.graph[edge];
            if edge.edge_type != EdgeType::NodeInsert {
                continue;
            }
            let Some(parent) = edge
                .attr(attrs::PARENT_BLINK_ID)
                .and_then(|blink_id| self.node_for_blink_id(blink_id))
            else {
                continue;
            };
            if self.graph[parent].is(NodeType::DomRoot) {
                return Some(parent);
            }
            return self.domroot_from_insertions(parent, seen);
        }
        None
    }

    fn domroot_from_creator(&self, node: NodeIndex) -> Option<NodeIndex> {
        let mut seen = HashSet::new();
        let mut creator = self.creator_node(node)?;
        while !self.graph[creator].is(NodeType::Parser) {
            if !seen.insert(creator) {
                return None;
            }
            creator = self.creator_node(creator)?;
        }

        // The owning document is the newest DOM root of that parser that
        // already existed when this node was created.
        let node_id = self.graph[node].int_id()?;
        self.parser_domroots(creator)
            .into_iter()
            .filter_map(|d| self.graph[d].int_id().map(|id| (id, d)))
            .filter(|(id, _)| *id < node_id)
            .max_by_key(|(id, _)| *id)
            .map(|(_, d)| d)
    }

    /// The script or parser responsible for `node`. Scripts are attributed
    /// to whatever executed them.
    pub fn creator_node(&self, node: NodeIndex) -> Option<NodeIndex> {
        if self.graph[node].is(NodeType::Script) {
            let executor = self.executing_node(node)?;
            if self.graph[executor].is(NodeType::Parser) {
                return Some(executor);
            }
            return self.creator_node(executor);
        }
        self.incoming_edges(node)
            .into_iter()
            .find(|&e| self.graph[e].is(EdgeType::NodeCreate))
            .map(|e| self.edge_endpoints(e).0)
    }

    /// Source of the edge that executed a script.
    pub fn executing_node(&self, script: NodeIndex) -> Option<NodeIndex> {
        self.incoming_edges(script)
            .into_iter()
            .find(|&e| self.graph[e].edge_type.is_execute())
            .map(|e| self.edge_endpoints(e).0)
    }

    pub fn parser_domroots(&self, parser: NodeIndex) -> Vec<NodeIndex> {
        let mut seen = HashSet::new();
        self.outgoing_edges(parser)
            .into_iter()
            .filter(|&e| {
                matches!(
                    self.graph[e].edge_type,
                    EdgeType::NodeCreate | EdgeType::Structure
                )
            })
            .map(|e| self.edge_endpoints(e).1)
            .filter(|&n| self.graph[n].is(NodeType::DomRoot) && seen.insert(n))
            .collect()
    }

    /// Every document ever loaded into a frame owner, oldest first.
    pub fn frame_owner_domroots(&self, frame_owner: NodeIndex) -> Vec<NodeIndex> {
        let mut domroots = Vec::new();
        for child in self.child_nodes(frame_owner) {
            if !self.graph[child].is(NodeType::Parser) {
                continue;
            }
            let mut parser_roots = self.parser_domroots(child);
            parser_roots.sort_by_key(|&d| self.graph[d].int_id());
            domroots.extend(parser_roots);
        }
        domroots
    }

    pub fn parser_for_domroot(&self, domroot: NodeIndex) -> Option<NodeIndex> {
        self.parent_nodes(domroot)
            .into_iter()
            .filter(|&n| self.graph[n].is(NodeType::Parser))
            .last()
    }

    pub fn is_toplevel_parser(&self, parser: NodeIndex) -> bool {
        !self
            .incoming_edges(parser)
            .into_iter()
            .any(|e| self.graph[e].is(EdgeType::CrossDom))
    }

    pub fn is_top_level_frame(&self, domroot: NodeIndex) -> bool {
        self.parser_for_domroot(domroot)
            .is_some_and(|parser| self.is_toplevel_parser(parser))
    }

    /// The frame that contains the frame owner element of a child frame.
    pub fn parent_frame(&self, domroot: NodeIndex) -> Option<NodeIndex> {
        let parser = self.parser_for_domroot(domroot)?;
        if self.is_toplevel_parser(parser) {
            return None;
        }
        let frame_owner = self
            .parent_nodes(parser)
            .into_iter()
            .find(|&n| self.graph[n].is(NodeType::FrameOwner))?;
        self.domroot(frame_owner)
    }

    /// Whether a child frame shares its origin host with its parent frame.
    /// Top level frames and intermediate frames without a URL are never local.
    pub fn is_local_frame(&self, domroot: NodeIndex) -> bool {
        let Some(parent) = self.parent_frame(domroot) else {
            return false;
        };
        let (Some(url), Some(parent_url)) = (self.graph[domroot].url(), self.graph[parent].url())
        else {
            return false;
        };
        is_url_local(url, parent_url)
    }

    /// DOM roots created by top level parsers that have both a URL and a
    /// frame id.
    pub fn toplevel_domroot_nodes(&self) -> Vec<NodeIndex> {
        self.nodes_of_type(NodeType::Parser)
            .iter()
            .filter(|&&p| self.is_toplevel_parser(p))
            .flat_map(|&p| self.parser_domroots(p))
            .filter(|&d| self.graph[d].url().is_some() && self.graph[d].blink_id().is_some())
            .collect()
    }

    // ------------------------------------------------------------------
    // Scripts
    // ------------------------------------------------------------------

    /// Base64 encoded SHA-256 of the script source.
    pub fn script_hash(&self, script: NodeIndex) -> String {
        let digest = Sha256::digest(self.graph[script].source().as_bytes());
        BASE64.encode(digest)
    }

    /// URL an external script was fetched from, found by matching the script
    /// hash against completed requests.
    pub fn script_url(&self, script: NodeIndex) -> Option<String> {
        if self.graph[script].script_type() != ScriptType::External {
            return None;
        }
        let hash = self.script_hash(script);
        let matches_hash = |chain: &RequestChain| {
            chain.is_complete()
                && chain
                    .result_edge()
                    .and_then(|e| self.graph[e].response_hash())
                    == Some(hash.as_str())
        };

        let attributed = self.executing_node(script).and_then(|executor| {
            self.outgoing_edges(executor)
                .into_iter()
                .filter(|&e| self.graph[e].is(EdgeType::RequestStart))
                .filter_map(|e| self.graph[e].request_id())
                .filter_map(|id| self.request_chain_for_id(id))
                .find(|chain| matches_hash(*chain))
        });

        // Cached or prefetched scripts are not attributed to their element.
        let chain = attributed.or_else(|| {
            self.request_start_edges()
                .iter()
                .filter_map(|&e| self.graph[e].request_id())
                .filter_map(|id| self.request_chain_for_id(id))
                .find(|chain| matches_hash(*chain))
        })?;
        self.request_url(chain.start).map(str::to_string)
    }
}

fn check_version(version: Option<&str>) {
    match version.and_then(graphml::parse_version) {
        Some((major, minor)) if (major, minor) == SUPPORTED_VERSION => {}
        Some((major, minor)) => warn!(
            "PageGraph file version {}.{} does not match supported version {}.{}, results may be incorrect",
            major, minor, SUPPORTED_VERSION.0, SUPPORTED_VERSION.1
        ),
        None => warn!("Unable to determine version of PageGraph file"),
    }
}
