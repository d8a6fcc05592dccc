// Tests for per-request feature extraction

use pagegraph_core::PageGraph;
use pagegraph_core::query::requests;
use pagegraph_extract::features::{FINAL_URL, NETWORK_REQUEST_URL, average_degree_connectivity};
use pagegraph_extract::{Feature, FeatureRecord, FeatureValue, RequestFeatureExtractor};

const PAGE: &str = include_str!("../../pagegraph-core/tests/fixtures/page.graphml");
const TARGET: &str = "https://www.example.com/";
const EDGE_CASES: &str = include_str!("fixtures/requests.graphml");
const EDGE_CASES_TARGET: &str = "https://news.example.com/";

fn page() -> PageGraph {
    PageGraph::from_graphml(PAGE).expect("fixture graph loads")
}

fn edge_cases() -> PageGraph {
    PageGraph::from_graphml(EDGE_CASES).expect("fixture graph loads")
}

fn records(pg: &PageGraph, target: Option<&str>) -> Vec<FeatureRecord> {
    let extractor = RequestFeatureExtractor::new(pg, target.map(str::to_string));
    extractor.extract_all(&requests(pg, None))
}

fn int(record: &FeatureRecord, feature: Feature) -> i64 {
    record
        .get(feature.as_str())
        .and_then(FeatureValue::as_i64)
        .unwrap_or_else(|| panic!("{} is not an integer", feature.as_str()))
}

fn boolean(record: &FeatureRecord, feature: Feature) -> bool {
    record
        .get(feature.as_str())
        .and_then(FeatureValue::as_bool)
        .unwrap_or_else(|| panic!("{} is not a bool", feature.as_str()))
}

// ============================================================================
// Feature Naming Tests
// ============================================================================

#[test]
fn test_feature_names_round_trip() {
    for feature in Feature::ALL {
        assert!(feature.as_str().starts_with("FEATURE_"));
        assert_eq!(Feature::from_str(feature.as_str()), Some(feature));
    }
    assert_eq!(Feature::from_str("FEATURE_UNKNOWN"), None);
}

#[test]
fn test_record_key_order() {
    let pg = page();
    let records = records(&pg, Some(TARGET));
    assert_eq!(records.len(), 3);

    let mut expected: Vec<&str> = Feature::ALL.iter().map(Feature::as_str).collect();
    expected.push(NETWORK_REQUEST_URL);
    expected.push(FINAL_URL);
    for record in &records {
        assert_eq!(record.names().collect::<Vec<_>>(), expected);
    }
}

// ============================================================================
// URL Feature Tests
// ============================================================================

#[test]
fn test_url_length_counts_characters() {
    let pg = page();
    let records = records(&pg, Some(TARGET));
    assert_eq!(int(&records[0], Feature::UrlLength), 30);
    assert_eq!(int(&records[1], Feature::UrlLength), 41);
    assert_eq!(int(&records[2], Feature::UrlLength), 26);
}

#[test]
fn test_semicolon_in_query() {
    let pg = page();
    let records = records(&pg, Some(TARGET));
    assert!(!boolean(&records[0], Feature::SemicolonInQuery));
    assert!(boolean(&records[1], Feature::SemicolonInQuery));
    assert!(!boolean(&records[2], Feature::SemicolonInQuery));
}

#[test]
fn test_same_site_features_are_complementary() {
    let pg = page();
    let records = records(&pg, Some(TARGET));

    // cdn.example.com, img.tracker.net, example.com
    let expected = [true, false, true];
    for (record, same_site) in records.iter().zip(expected) {
        assert_eq!(boolean(record, Feature::FromSubdomain), same_site);
        assert_eq!(boolean(record, Feature::FromThirdParty), !same_site);
    }
}

#[test]
fn test_same_site_features_null_without_target() {
    let pg = page();
    for record in records(&pg, None) {
        assert!(record.get(Feature::FromSubdomain.as_str()).unwrap().is_missing());
        assert!(record.get(Feature::FromThirdParty.as_str()).unwrap().is_missing());
        assert!(record.get(FINAL_URL).unwrap().is_missing());
        assert!(!record.get(Feature::UrlLength.as_str()).unwrap().is_missing());
    }
}

#[test]
fn test_request_and_page_urls_recorded() {
    let pg = page();
    let records = records(&pg, Some(TARGET));
    assert_eq!(
        records[1].get(NETWORK_REQUEST_URL).and_then(FeatureValue::as_str),
        Some("https://img.tracker.net/pixel.gif?a=1;b=2")
    );
    assert_eq!(
        records[1].get(FINAL_URL).and_then(FeatureValue::as_str),
        Some(TARGET)
    );
}

// ============================================================================
// Request Feature Tests
// ============================================================================

#[test]
fn test_resource_type() {
    let pg = page();
    let records = records(&pg, Some(TARGET));
    let types: Vec<_> = records
        .iter()
        .map(|r| r.get(Feature::ResourceType.as_str()).and_then(FeatureValue::as_str))
        .collect();
    assert_eq!(types, vec![Some("Script"), Some("Image"), Some("CSS stylesheet")]);
}

#[test]
fn test_load_time_uses_result_edge() {
    let pg = page();
    let records = records(&pg, Some(TARGET));
    assert_eq!(int(&records[0], Feature::LoadTime), 50);
    assert_eq!(int(&records[1], Feature::LoadTime), 60);
    // redirected: start to final completion
    assert_eq!(int(&records[2], Feature::LoadTime), 100);
}

// ============================================================================
// Structural Feature Tests
// ============================================================================

#[test]
fn test_requester_degrees() {
    let pg = page();
    let records = records(&pg, Some(TARGET));

    // script element n3
    assert_eq!(int(&records[0], Feature::InDegree), 3);
    assert_eq!(int(&records[0], Feature::OutDegree), 2);
    assert_eq!(int(&records[0], Feature::InOutDegree), 5);

    // image n13
    assert_eq!(int(&records[1], Feature::InDegree), 4);
    assert_eq!(int(&records[1], Feature::OutDegree), 1);
    assert_eq!(int(&records[1], Feature::InOutDegree), 5);

    // parser n1
    assert_eq!(int(&records[2], Feature::InDegree), 1);
    assert_eq!(int(&records[2], Feature::OutDegree), 8);
}

#[test]
fn test_parent_degrees() {
    let pg = page();
    let records = records(&pg, Some(TARGET));

    // parent of n3 is the parser n1
    assert_eq!(int(&records[0], Feature::ParentInDegree), 1);
    assert_eq!(int(&records[0], Feature::ParentOutDegree), 8);
    assert_eq!(int(&records[0], Feature::ParentInOutDegree), 9);

    // parent of n13 is the script n4
    assert_eq!(int(&records[1], Feature::ParentInDegree), 3);
    assert_eq!(int(&records[1], Feature::ParentOutDegree), 7);
    assert_eq!(int(&records[1], Feature::ParentInOutDegree), 10);

    // the parser has no structural parent
    assert_eq!(int(&records[2], Feature::ParentInOutDegree), 0);
}

#[test]
fn test_modified_by_script() {
    let pg = page();
    let records = records(&pg, Some(TARGET));

    assert!(!boolean(&records[0], Feature::ModifiedByScript));
    assert!(!boolean(&records[0], Feature::ParentModifiedByScript));

    assert!(boolean(&records[1], Feature::ModifiedByScript));
    assert!(!boolean(&records[1], Feature::ParentModifiedByScript));

    assert!(!boolean(&records[2], Feature::ModifiedByScript));
    assert!(!boolean(&records[2], Feature::ParentModifiedByScript));
}

#[test]
fn test_average_degree_connectivity() {
    let pg = page();
    let connectivity = average_degree_connectivity(&pg);

    // degree 5: n3 (9 + 2 + 2 + 10) and n13 (10 + 2 + 2)
    assert_eq!(connectivity.get(&5), Some(&3.7));
    // degree 9: only n1 (2 + 1 + 5 + 3 + 3 + 2)
    assert_eq!(connectivity.get(&9), Some(&(16.0 / 9.0)));
    // degree 1: n2, n8, n11, n18 with neighbors n1, n7, n10, n19
    assert_eq!(connectivity.get(&1), Some(&(16.0 / 4.0)));

    let records = records(&pg, Some(TARGET));
    let value = |i: usize| {
        records[i]
            .get(Feature::AverageDegreeConnectivity.as_str())
            .and_then(FeatureValue::as_f64)
    };
    assert_eq!(value(0), Some(3.7));
    assert_eq!(value(1), Some(3.7));
    assert_eq!(value(2), Some(16.0 / 9.0));
}

#[test]
fn test_record_serializes_flat() {
    let pg = page();
    let records = records(&pg, None);
    let value = serde_json::to_value(&records[0]).unwrap();
    assert_eq!(value["FEATURE_URL_LENGTH"], serde_json::json!(30));
    assert_eq!(value["FEATURE_FROM_SUBDOMAIN"], serde_json::Value::Null);
    assert_eq!(value["FEATURE_RESOURCE_TYPE"], serde_json::json!("Script"));
    assert_eq!(value["FINAL_URL"], serde_json::Value::Null);
}

// ============================================================================
// Edge Case Tests
// ============================================================================

#[test]
fn test_edge_case_requests_in_document_order() {
    let pg = edge_cases();
    let records = records(&pg, Some(EDGE_CASES_TARGET));
    let urls: Vec<_> = records
        .iter()
        .map(|r| r.get(NETWORK_REQUEST_URL).and_then(FeatureValue::as_str))
        .collect();
    assert_eq!(
        urls,
        vec![
            Some("https://cdn.example.com/app.js"),
            Some("http://a.example/x;y=1"),
            Some("https://img.example.com/p.gif?a=1;b=2"),
        ]
    );
}

#[test]
fn test_unfinished_request_has_zero_load_time() {
    let pg = edge_cases();
    let records = records(&pg, Some(EDGE_CASES_TARGET));
    assert_eq!(int(&records[0], Feature::LoadTime), 80);
    // the fetch never completed
    assert_eq!(int(&records[1], Feature::LoadTime), 0);
    // an error result still ends the request
    assert_eq!(int(&records[2], Feature::LoadTime), 50);
}

#[test]
fn test_semicolon_in_path_is_not_in_query() {
    let pg = edge_cases();
    let records = records(&pg, Some(EDGE_CASES_TARGET));
    assert_eq!(int(&records[1], Feature::UrlLength), 22);
    assert!(!boolean(&records[1], Feature::SemicolonInQuery));
    assert!(boolean(&records[2], Feature::SemicolonInQuery));
}

#[test]
fn test_parent_modified_by_script() {
    let pg = edge_cases();
    let records = records(&pg, Some(EDGE_CASES_TARGET));

    // script element n3, inserted by the parser
    assert!(!boolean(&records[0], Feature::ModifiedByScript));
    assert!(!boolean(&records[0], Feature::ParentModifiedByScript));

    // script n8 runs from element n7, which script n4 inserted
    assert!(!boolean(&records[1], Feature::ModifiedByScript));
    assert!(boolean(&records[1], Feature::ParentModifiedByScript));
    assert_eq!(int(&records[1], Feature::ParentInDegree), 2);
    assert_eq!(int(&records[1], Feature::ParentOutDegree), 1);

    // image n6, inserted by script n4
    assert!(boolean(&records[2], Feature::ModifiedByScript));
    assert!(!boolean(&records[2], Feature::ParentModifiedByScript));
}

#[test]
fn test_edge_case_degrees_exclude_result_parents() {
    let pg = edge_cases();
    let records = records(&pg, Some(EDGE_CASES_TARGET));

    // image n6: create, insert and the error edge in; one request out
    assert_eq!(int(&records[2], Feature::InDegree), 3);
    assert_eq!(int(&records[2], Feature::OutDegree), 1);
    // its only structural parent is script n4
    assert_eq!(int(&records[2], Feature::ParentInOutDegree), 5);

    // degree 2: n5 (5 + 5), n8 (3 + 1) and n10 (4 + 4)
    let value = records[1]
        .get(Feature::AverageDegreeConnectivity.as_str())
        .and_then(FeatureValue::as_f64)
        .unwrap();
    assert!((value - 22.0 / 6.0).abs() < 1e-9);
}

#[test]
fn test_edge_case_same_site() {
    let pg = edge_cases();
    let records = records(&pg, Some(EDGE_CASES_TARGET));
    assert!(boolean(&records[0], Feature::FromSubdomain));
    assert!(!boolean(&records[0], Feature::FromThirdParty));
    assert!(boolean(&records[2], Feature::FromSubdomain));
}
