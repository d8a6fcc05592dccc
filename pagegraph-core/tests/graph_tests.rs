// Tests for GraphML loading, navigation and frame resolution

use pagegraph_core::graphml::{self, parse_version};
use pagegraph_core::model::EdgeType;
use pagegraph_core::{GraphError, NodeType, PageGraph, ScriptType};
use std::io::Write;
use tempfile::NamedTempFile;

const PAGE: &str = include_str!("fixtures/page.graphml");

fn page() -> PageGraph {
    PageGraph::from_graphml(PAGE).expect("fixture graph loads")
}

fn node(pg: &PageGraph, id: &str) -> petgraph::stable_graph::NodeIndex {
    pg.node_index(id).expect("node exists")
}

fn ids(pg: &PageGraph, nodes: &[petgraph::stable_graph::NodeIndex]) -> Vec<String> {
    nodes.iter().map(|&n| pg.node(n).id.clone()).collect()
}

fn minimal_graph(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<graphml xmlns="http://graphml.graphdrawing.org/xmlns">
  <desc><version>0.7.0</version></desc>
  <key id="d0" for="node" attr.name="node type" attr.type="string"/>
  <key id="d1" for="node" attr.name="timestamp" attr.type="string"/>
  <key id="d2" for="node" attr.name="node id" attr.type="string"/>
  <key id="e0" for="edge" attr.name="edge type" attr.type="string"/>
  <graph id="G" edgedefault="directed">
{}
  </graph>
</graphml>"#,
        body
    )
}

// ============================================================================
// GraphML Parsing Tests
// ============================================================================

#[test]
fn test_parse_resolves_key_names() {
    let raw = graphml::parse(PAGE).unwrap();
    assert_eq!(raw.version.as_deref(), Some("0.7.2"));
    assert_eq!(raw.nodes.len(), 19);
    assert_eq!(raw.edges.len(), 29);

    let script = raw.nodes.iter().find(|n| n.id == "n4").unwrap();
    assert_eq!(script.attrs.get("node type").map(String::as_str), Some("script"));
    assert_eq!(
        script.attrs.get("source").map(String::as_str),
        Some("console.log(1)")
    );
}

#[test]
fn test_parse_empty_data_element() {
    let raw = graphml::parse(PAGE).unwrap();
    let error_edge = raw.edges.iter().find(|e| e.id == "e18").unwrap();
    assert_eq!(error_edge.attrs.get("headers").map(String::as_str), Some(""));
}

#[test]
fn test_parse_keeps_whitespace_in_values() {
    let xml = minimal_graph(
        r#"    <node id="n1"><data key="d0">script</data><data key="d5">  x = 1;
</data></node>"#,
    );
    let raw = graphml::parse(&xml).unwrap();
    // d5 is not declared, the raw key id is used as the attribute name
    assert_eq!(
        raw.nodes[0].attrs.get("d5").map(String::as_str),
        Some("  x = 1;\n")
    );
}

#[test]
fn test_parse_version() {
    assert_eq!(parse_version("0.7.2"), Some((0, 7)));
    assert_eq!(parse_version("1.10"), Some((1, 10)));
    assert_eq!(parse_version("garbage"), None);
}

#[test]
fn test_parse_rejects_broken_xml() {
    assert!(graphml::parse("<graphml><graph><node id=\"n1\"></graph>").is_err());
}

// ============================================================================
// Loading Tests
// ============================================================================

#[test]
fn test_from_graphml_counts() {
    let pg = page();
    assert_eq!(pg.node_count(), 19);
    assert_eq!(pg.edge_count(), 29);
    assert_eq!(pg.nodes_of_type(NodeType::Parser).len(), 3);
    assert_eq!(pg.edges_of_type(EdgeType::RequestStart).len(), 3);
}

#[test]
fn test_from_path() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(PAGE.as_bytes()).unwrap();
    file.flush().unwrap();

    let pg = PageGraph::from_path(file.path()).unwrap();
    assert_eq!(pg.node_count(), 19);
}

#[test]
fn test_from_path_missing_file() {
    let result = PageGraph::from_path("/nonexistent/page.graphml");
    assert!(matches!(result, Err(GraphError::IoError(_))));
}

#[test]
fn test_unknown_node_type_is_error() {
    let xml = minimal_graph(r#"    <node id="n1"><data key="d0">spaceship</data></node>"#);
    let result = PageGraph::from_graphml(&xml);
    assert!(matches!(result, Err(GraphError::UnknownNodeType(t)) if t == "spaceship"));
}

#[test]
fn test_edge_to_unknown_node_is_error() {
    let xml = minimal_graph(
        r#"    <node id="n1"><data key="d0">parser</data></node>
    <edge id="e1" source="n1" target="n9"><data key="e0">structure</data></edge>"#,
    );
    let result = PageGraph::from_graphml(&xml);
    assert!(matches!(result, Err(GraphError::UnknownNode(id)) if id == "n9"));
}

#[test]
fn test_version_mismatch_still_loads() {
    let xml = minimal_graph(r#"    <node id="n1"><data key="d0">parser</data></node>"#)
        .replace("0.7.0", "0.3.1");
    let pg = PageGraph::from_graphml(&xml).unwrap();
    assert_eq!(pg.node_count(), 1);
}

#[test]
fn test_frame_id_keeps_latest_domroot() {
    let xml = minimal_graph(
        r#"    <node id="n1"><data key="d0">DOM root</data><data key="d1">50</data><data key="d2">3</data></node>
    <node id="n2"><data key="d0">DOM root</data><data key="d1">20</data><data key="d2">3</data></node>
    <node id="n3"><data key="d0">DOM root</data><data key="d1">10</data><data key="d2">4</data></node>"#,
    );
    let pg = PageGraph::from_graphml(&xml).unwrap();
    assert_eq!(pg.domroot_for_frame_id("3"), pg.node_index("n1"));
    assert_eq!(pg.domroot_for_frame_id("4"), pg.node_index("n3"));
    assert_eq!(pg.domroot_for_frame_id("5"), None);
}

// ============================================================================
// Navigation Tests
// ============================================================================

#[test]
fn test_edges_sorted_by_id() {
    let pg = page();
    let img = node(&pg, "n13");
    let incoming: Vec<_> = pg
        .incoming_edges(img)
        .into_iter()
        .map(|e| pg.edge(e).id.clone())
        .collect();
    assert_eq!(incoming, vec!["e15", "e16", "e18", "e23"]);
    assert_eq!(pg.in_degree(img), 4);
    assert_eq!(pg.out_degree(img), 1);
    assert_eq!(pg.degree(img), 5);
}

#[test]
fn test_parents_ignore_request_edges() {
    let pg = page();
    let img = node(&pg, "n13");
    // n14 answers the image request but is not a structural parent
    assert_eq!(ids(&pg, &pg.parent_nodes(img)), vec!["n4"]);
    assert_eq!(ids(&pg, &pg.predecessors(img)), vec!["n4", "n14"]);
}

#[test]
fn test_children_are_distinct() {
    let pg = page();
    let script = node(&pg, "n4");
    assert_eq!(ids(&pg, &pg.child_nodes(script)), vec!["n13", "n19"]);
}

#[test]
fn test_iframe_nodes() {
    let pg = page();
    assert_eq!(ids(&pg, &pg.iframe_nodes()), vec!["n6", "n9"]);
}

#[test]
fn test_node_for_blink_id() {
    let pg = page();
    assert_eq!(pg.node_for_blink_id("10"), pg.node_index("n13"));
    assert_eq!(pg.node_for_blink_id("404"), None);
}

// ============================================================================
// Frame Tests
// ============================================================================

#[test]
fn test_domroot_of_domroot_is_itself() {
    let pg = page();
    let root = node(&pg, "n2");
    assert_eq!(pg.domroot(root), Some(root));
}

#[test]
fn test_domroot_of_parser_is_none() {
    let pg = page();
    assert_eq!(pg.domroot(node(&pg, "n1")), None);
}

#[test]
fn test_domroot_from_insertion() {
    let pg = page();
    assert_eq!(pg.domroot(node(&pg, "n13")), pg.node_index("n2"));
    assert_eq!(pg.domroot(node(&pg, "n6")), pg.node_index("n2"));
}

#[test]
fn test_domroot_from_creator_chain() {
    let pg = page();
    // external script, executed by an element the parser created
    assert_eq!(pg.domroot(node(&pg, "n4")), pg.node_index("n2"));
    // inline script inside an element created by another script
    assert_eq!(pg.domroot(node(&pg, "n18")), pg.node_index("n2"));
}

#[test]
fn test_creator_node() {
    let pg = page();
    assert_eq!(pg.creator_node(node(&pg, "n4")), pg.node_index("n1"));
    assert_eq!(pg.creator_node(node(&pg, "n18")), pg.node_index("n4"));
    assert_eq!(pg.creator_node(node(&pg, "n13")), pg.node_index("n4"));
}

#[test]
fn test_frame_owner_domroots() {
    let pg = page();
    assert_eq!(ids(&pg, &pg.frame_owner_domroots(node(&pg, "n6"))), vec!["n8"]);
    assert_eq!(ids(&pg, &pg.frame_owner_domroots(node(&pg, "n9"))), vec!["n11"]);
}

#[test]
fn test_top_level_frame() {
    let pg = page();
    assert!(pg.is_top_level_frame(node(&pg, "n2")));
    assert!(!pg.is_top_level_frame(node(&pg, "n8")));
}

#[test]
fn test_toplevel_domroot_nodes() {
    let pg = page();
    assert_eq!(ids(&pg, &pg.toplevel_domroot_nodes()), vec!["n2"]);
}

#[test]
fn test_parent_frame() {
    let pg = page();
    assert_eq!(pg.parent_frame(node(&pg, "n8")), pg.node_index("n2"));
    assert_eq!(pg.parent_frame(node(&pg, "n2")), None);
}

#[test]
fn test_local_frames() {
    let pg = page();
    assert!(pg.is_local_frame(node(&pg, "n8")));
    assert!(!pg.is_local_frame(node(&pg, "n11")));
    // top level frames are never local
    assert!(!pg.is_local_frame(node(&pg, "n2")));
}

// ============================================================================
// Request Chain Tests
// ============================================================================

#[test]
fn test_complete_request_chain() {
    let pg = page();
    let chain = pg.request_chain_for_id(1).unwrap();
    assert!(chain.is_complete());
    assert!(chain.redirects.is_empty());
    assert_eq!(pg.edge(chain.start).id, "e4");
    assert_eq!(chain.result_edge().map(|e| pg.edge(e).id.clone()).as_deref(), Some("e5"));
}

#[test]
fn test_error_request_chain() {
    let pg = page();
    let chain = pg.request_chain_for_id(2).unwrap();
    assert!(!chain.is_complete());
    assert_eq!(chain.result_edge().map(|e| pg.edge(e).id.clone()).as_deref(), Some("e18"));
}

#[test]
fn test_redirected_request_chain() {
    let pg = page();
    let chain = pg.request_chain_for_id(3).unwrap();
    assert_eq!(chain.redirects.len(), 1);
    assert_eq!(
        pg.request_url(chain.redirects[0]),
        Some("https://www.example.com/new.css")
    );
    assert!(chain.is_complete());
}

#[test]
fn test_unknown_request_id() {
    let pg = page();
    assert!(pg.request_chain_for_id(42).is_none());
}

// ============================================================================
// Script Tests
// ============================================================================

#[test]
fn test_script_hash() {
    let pg = page();
    assert_eq!(
        pg.script_hash(node(&pg, "n4")),
        "CihokcEcBW4atb/CW/XWsvWwbTjqwQlE9nj9ii5ww5M="
    );
}

#[test]
fn test_external_script_url() {
    let pg = page();
    let script = node(&pg, "n4");
    assert_eq!(pg.node(script).script_type(), ScriptType::External);
    assert_eq!(
        pg.script_url(script).as_deref(),
        Some("https://cdn.example.com/app.js")
    );
}

#[test]
fn test_inline_script_has_no_url() {
    let pg = page();
    assert_eq!(pg.script_url(node(&pg, "n18")), None);
}

// ============================================================================
// JS Invocation Tests
// ============================================================================

#[test]
fn test_js_invocations_pair_results() {
    let pg = page();
    let cookie = node(&pg, "n12");
    let invocations = pg.js_invocations(cookie);
    assert_eq!(invocations.len(), 1);
    assert_eq!(pg.edge(invocations[0].call).id, "e19");
    assert_eq!(invocations[0].result.map(|e| pg.edge(e).id.clone()).as_deref(), Some("e20"));
}

#[test]
fn test_js_invocation_values() {
    let pg = page();
    let cookie = pg.js_invocations(node(&pg, "n12"))[0];
    assert_eq!(pg.invocation_args(&cookie), serde_json::json!([]));
    // not valid JSON, kept as text
    assert_eq!(pg.invocation_result(&cookie), Some(serde_json::json!("a=b")));

    let parse = pg.js_invocations(node(&pg, "n15"))[0];
    assert_eq!(pg.invocation_args(&parse), serde_json::json!([1, 2]));
    assert_eq!(pg.invocation_result(&parse), Some(serde_json::json!(3)));
}

#[test]
fn test_js_invocation_contexts() {
    let pg = page();
    let parse = pg.js_invocations(node(&pg, "n15"))[0];
    assert_eq!(pg.call_context(&parse), pg.node_index("n2"));
    assert_eq!(pg.receiver_context(&parse), pg.node_index("n8"));
}
