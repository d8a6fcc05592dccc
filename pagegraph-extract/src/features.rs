//! Per-request feature extraction.
//!
//! Each [`Feature`] is computed from the graph neighborhood of the node that
//! issued a request (the requester) and from the request and page URLs.

use crate::domain::registrable_domain;
use crate::error::{ExtractError, Result};
use crate::record::{FeatureRecord, FeatureValue};
use pagegraph_core::query::RequestsReport;
use pagegraph_core::{NodeType, PageGraph};
use petgraph::stable_graph::{EdgeIndex, NodeIndex};
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::{debug, warn};
use url::Url;

pub const NETWORK_REQUEST_URL: &str = "NETWORK_REQUEST_URL";
pub const FINAL_URL: &str = "FINAL_URL";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    UrlLength,
    FromSubdomain,
    FromThirdParty,
    SemicolonInQuery,
    ResourceType,
    LoadTime,
    InDegree,
    OutDegree,
    InOutDegree,
    ModifiedByScript,
    ParentInDegree,
    ParentOutDegree,
    ParentInOutDegree,
    ParentModifiedByScript,
    AverageDegreeConnectivity,
}

impl Feature {
    /// Extraction order, which is also the key order of every record.
    pub const ALL: [Feature; 15] = [
        Feature::UrlLength,
        Feature::FromSubdomain,
        Feature::FromThirdParty,
        Feature::SemicolonInQuery,
        Feature::ResourceType,
        Feature::LoadTime,
        Feature::InDegree,
        Feature::OutDegree,
        Feature::InOutDegree,
        Feature::ModifiedByScript,
        Feature::ParentInDegree,
        Feature::ParentOutDegree,
        Feature::ParentInOutDegree,
        Feature::ParentModifiedByScript,
        Feature::AverageDegreeConnectivity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::UrlLength => "FEATURE_URL_LENGTH",
            Feature::FromSubdomain => "FEATURE_FROM_SUBDOMAIN",
            Feature::FromThirdParty => "FEATURE_FROM_THIRD_PARTY",
            Feature::SemicolonInQuery => "FEATURE_SEMICOLON_IN_QUERY",
            Feature::ResourceType => "FEATURE_RESOURCE_TYPE",
            Feature::LoadTime => "FEATURE_LOAD_TIME",
            Feature::InDegree => "FEATURE_IN_DEGREE",
            Feature::OutDegree => "FEATURE_OUT_DEGREE",
            Feature::InOutDegree => "FEATURE_IN_OUT_DEGREE",
            Feature::ModifiedByScript => "FEATURE_MODIFIED_BY_SCRIPT",
            Feature::ParentInDegree => "FEATURE_PARENT_IN_DEGREE",
            Feature::ParentOutDegree => "FEATURE_PARENT_OUT_DEGREE",
            Feature::ParentInOutDegree => "FEATURE_PARENT_IN_OUT_DEGREE",
            Feature::ParentModifiedByScript => "FEATURE_PARENT_MODIFIED_BY_SCRIPT",
            Feature::AverageDegreeConnectivity => "FEATURE_AVERAGE_DEGREE_CONNECTIVITY",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Feature::ALL.into_iter().find(|f| f.as_str() == s)
    }

    pub fn extract(&self, cx: &RequestContext<'_>) -> FeatureValue {
        let pg = cx.pg;
        match self {
            Feature::UrlLength => cx.url.map(|url| url.chars().count()).into(),
            Feature::FromSubdomain => cx.same_site().into(),
            Feature::FromThirdParty => cx.same_site().map(|same| !same).into(),
            Feature::SemicolonInQuery => cx
                .url
                .and_then(|url| Url::parse(url).ok())
                .is_some_and(|url| url.query().is_some_and(|q| q.contains(';')))
                .into(),
            Feature::ResourceType => FeatureValue::Text(cx.resource_type.to_string()),
            Feature::LoadTime => match cx.result {
                None => FeatureValue::Int(0),
                Some(result) => match (pg.edge(result).timestamp(), pg.edge(cx.start).timestamp()) {
                    (Some(end), Some(start)) => FeatureValue::Int(end - start),
                    _ => FeatureValue::Missing,
                },
            },
            Feature::InDegree => pg.in_degree(cx.requester).into(),
            Feature::OutDegree => pg.out_degree(cx.requester).into(),
            Feature::InOutDegree => pg.degree(cx.requester).into(),
            Feature::ModifiedByScript => modified_by_script(pg, cx.requester).into(),
            Feature::ParentInDegree => cx.parents.iter().map(|&p| pg.in_degree(p)).sum::<usize>().into(),
            Feature::ParentOutDegree => cx.parents.iter().map(|&p| pg.out_degree(p)).sum::<usize>().into(),
            Feature::ParentInOutDegree => cx.parents.iter().map(|&p| pg.degree(p)).sum::<usize>().into(),
            Feature::ParentModifiedByScript => cx
                .parents
                .iter()
                .any(|&p| modified_by_script(pg, p))
                .into(),
            Feature::AverageDegreeConnectivity => cx
                .connectivity
                .get(&pg.degree(cx.requester))
                .copied()
                .into(),
        }
    }
}

// A script among the node's parents has an edge landing on the node.
fn modified_by_script(pg: &PageGraph, node: NodeIndex) -> bool {
    pg.parent_nodes(node).into_iter().any(|parent| {
        pg.node(parent).is(NodeType::Script)
            && pg
                .outgoing_edges(parent)
                .into_iter()
                .any(|e| pg.edge_endpoints(e).1 == node)
    })
}

/// Mean degree of the neighbors of nodes with degree `k`, for every `k` in
/// the graph. Degrees are in + out and count parallel edges; the neighbors of
/// a node are its distinct predecessors followed by its distinct successors.
pub fn average_degree_connectivity(pg: &PageGraph) -> HashMap<usize, f64> {
    let mut totals: HashMap<usize, (usize, usize)> = HashMap::new();
    for node in pg.node_indices() {
        let k = pg.degree(node);
        let neighbor_degrees: usize = pg
            .predecessors(node)
            .into_iter()
            .chain(pg.successors(node))
            .map(|n| pg.degree(n))
            .sum();
        let entry = totals.entry(k).or_default();
        entry.0 += neighbor_degrees;
        entry.1 += k;
    }

    totals
        .into_iter()
        .map(|(k, (neighbor_sum, degree_sum))| {
            let average = if degree_sum == 0 {
                0.0
            } else {
                neighbor_sum as f64 / degree_sum as f64
            };
            (k, average)
        })
        .collect()
}

/// Everything a [`Feature`] needs to know about one request.
pub struct RequestContext<'a> {
    pub pg: &'a PageGraph,
    pub target_url: Option<&'a str>,
    pub url: Option<&'a str>,
    pub resource_type: &'a str,
    pub start: EdgeIndex,
    pub result: Option<EdgeIndex>,
    pub requester: NodeIndex,
    pub parents: Vec<NodeIndex>,
    connectivity: &'a HashMap<usize, f64>,
}

impl RequestContext<'_> {
    // None when the page URL is unknown
    fn same_site(&self) -> Option<bool> {
        let target = self.target_url?;
        Some(registrable_domain(target) == self.url.and_then(registrable_domain))
    }
}

/// Computes [`Feature::ALL`] for the requests of one page graph.
pub struct RequestFeatureExtractor<'g> {
    pg: &'g PageGraph,
    target_url: Option<String>,
    connectivity: OnceLock<HashMap<usize, f64>>,
}

impl<'g> RequestFeatureExtractor<'g> {
    pub fn new(pg: &'g PageGraph, target_url: Option<String>) -> Self {
        Self {
            pg,
            target_url,
            connectivity: OnceLock::new(),
        }
    }

    pub fn target_url(&self) -> Option<&str> {
        self.target_url.as_deref()
    }

    fn connectivity(&self) -> &HashMap<usize, f64> {
        self.connectivity
            .get_or_init(|| average_degree_connectivity(self.pg))
    }

    fn context<'a>(&'a self, report: &'a RequestsReport) -> Result<RequestContext<'a>> {
        let chain = &report.request;
        let start = self
            .pg
            .edge_index(&chain.request.id)
            .ok_or_else(|| ExtractError::MissingEdge(chain.request.id.clone()))?;
        let result = chain
            .result
            .as_ref()
            .map(|result| {
                self.pg
                    .edge_index(result.id())
                    .ok_or_else(|| ExtractError::MissingEdge(result.id().to_string()))
            })
            .transpose()?;
        let requester = self.pg.edge_endpoints(start).0;

        Ok(RequestContext {
            pg: self.pg,
            target_url: self.target_url.as_deref(),
            url: chain.request.url.as_deref(),
            resource_type: &chain.request_type,
            start,
            result,
            requester,
            parents: self.pg.parent_nodes(requester),
            connectivity: self.connectivity(),
        })
    }

    /// Features of one request, followed by the request URL and page URL.
    pub fn extract(&self, report: &RequestsReport) -> Result<FeatureRecord> {
        let cx = self.context(report)?;
        let mut record = FeatureRecord::new();
        for feature in Feature::ALL {
            record.insert(feature.as_str(), feature.extract(&cx));
        }
        record.insert(NETWORK_REQUEST_URL, cx.url.map(str::to_string));
        record.insert(FINAL_URL, self.target_url.clone());
        Ok(record)
    }

    /// Extracts every request, skipping the ones whose edges cannot be found.
    pub fn extract_all(&self, reports: &[RequestsReport]) -> Vec<FeatureRecord> {
        let mut records = Vec::with_capacity(reports.len());
        for report in reports {
            match self.extract(report) {
                Ok(record) => records.push(record),
                Err(e) => warn!(
                    "Skipping request {}: {}",
                    report.request.request_id, e
                ),
            }
        }
        debug!("Extracted features for {} requests", records.len());
        records
    }
}
