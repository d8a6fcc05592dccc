//! Minimal GraphML reader for PageGraph recordings.
//!
//! Only the parts of GraphML that PageGraph emits are understood: `<key>`
//! declarations, `<node>`/`<edge>` elements with `<data>` children, and the
//! `<version>` element in the graph description.

use crate::error::{GraphError, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Default)]
pub struct RawNode {
    pub id: String,
    pub attrs: HashMap<String, String>,
}

#[derive(Debug, Default)]
pub struct RawEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub attrs: HashMap<String, String>,
}

#[derive(Debug, Default)]
pub struct RawGraph {
    pub version: Option<String>,
    pub nodes: Vec<RawNode>,
    pub edges: Vec<RawEdge>,
}

enum Element {
    Node(RawNode),
    Edge(RawEdge),
}

fn attribute(e: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == name {
            let value = attr
                .unescape_value()
                .map_err(|err| GraphError::ParseError(err.to_string()))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn required_attribute(e: &BytesStart<'_>, name: &'static str) -> Result<String> {
    attribute(e, name.as_bytes())?.ok_or_else(|| {
        GraphError::ParseError(format!(
            "<{}> element without '{}' attribute",
            String::from_utf8_lossy(e.name().as_ref()),
            name
        ))
    })
}

pub fn parse(xml: &str) -> Result<RawGraph> {
    let mut reader = Reader::from_str(xml);
    let mut graph = RawGraph::default();

    // key id -> attribute name
    let mut keys: HashMap<String, String> = HashMap::new();
    let mut current: Option<Element> = None;
    // (attribute name, accumulated text) of the open <data> element
    let mut data: Option<(String, String)> = None;
    let mut in_version = false;
    let mut version_text = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(ref e) => match e.name().as_ref() {
                b"key" => register_key(e, &mut keys)?,
                b"node" => {
                    current = Some(Element::Node(RawNode {
                        id: required_attribute(e, "id")?,
                        attrs: HashMap::new(),
                    }))
                }
                b"edge" => current = Some(Element::Edge(start_edge(e)?)),
                b"data" => {
                    let key = required_attribute(e, "key")?;
                    let name = keys.get(&key).cloned().unwrap_or(key);
                    data = Some((name, String::new()));
                }
                b"version" => {
                    in_version = true;
                    version_text.clear();
                }
                _ => {}
            },
            Event::Empty(ref e) => match e.name().as_ref() {
                b"key" => register_key(e, &mut keys)?,
                b"node" => graph.nodes.push(RawNode {
                    id: required_attribute(e, "id")?,
                    attrs: HashMap::new(),
                }),
                b"edge" => graph.edges.push(start_edge(e)?),
                b"data" => {
                    // <data key=".."/> carries an empty value
                    let key = required_attribute(e, "key")?;
                    let name = keys.get(&key).cloned().unwrap_or(key);
                    set_attr(&mut current, name, String::new());
                }
                _ => {}
            },
            Event::Text(ref e) => {
                if data.is_some() || in_version {
                    let text = e
                        .unescape()
                        .map_err(|err| GraphError::ParseError(err.to_string()))?;
                    if let Some((_, value)) = data.as_mut() {
                        value.push_str(&text);
                    } else {
                        version_text.push_str(&text);
                    }
                }
            }
            Event::CData(e) => {
                if let Some((_, value)) = data.as_mut() {
                    value.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Event::End(ref e) => match e.name().as_ref() {
                b"data" => {
                    if let Some((name, value)) = data.take() {
                        set_attr(&mut current, name, value);
                    }
                }
                b"node" | b"edge" => match current.take() {
                    Some(Element::Node(node)) => graph.nodes.push(node),
                    Some(Element::Edge(edge)) => graph.edges.push(edge),
                    None => {}
                },
                b"version" => {
                    in_version = false;
                    graph.version = Some(version_text.trim().to_string());
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    debug!(
        "Parsed GraphML with {} nodes and {} edges",
        graph.nodes.len(),
        graph.edges.len()
    );
    Ok(graph)
}

fn register_key(e: &BytesStart<'_>, keys: &mut HashMap<String, String>) -> Result<()> {
    let id = required_attribute(e, "id")?;
    let name = attribute(e, b"attr.name")?.unwrap_or_else(|| id.clone());
    keys.insert(id, name);
    Ok(())
}

fn start_edge(e: &BytesStart<'_>) -> Result<RawEdge> {
    Ok(RawEdge {
        id: required_attribute(e, "id")?,
        source: required_attribute(e, "source")?,
        target: required_attribute(e, "target")?,
        attrs: HashMap::new(),
    })
}

fn set_attr(current: &mut Option<Element>, name: String, value: String) {
    match current {
        Some(Element::Node(node)) => {
            node.attrs.insert(name, value);
        }
        Some(Element::Edge(edge)) => {
            edge.attrs.insert(name, value);
        }
        // graph-level <data> is not used
        None => {}
    }
}

/// Splits a `major.minor.patch` version string.
pub fn parse_version(version: &str) -> Option<(u32, u32)> {
    let mut parts = version.split('.');
    let major = parts.next()?.trim().parse().ok()?;
    let minor = parts.next()?.trim().parse().ok()?;
    Some((major, minor))
}
