use std::collections::HashMap;

use front_door::{extract_project, strip_project, RoutingTable, PROJECT_HEADER};
use registry::RoutingMode;

fn headers(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

#[test]
fn path_segment_takes_precedence_over_header_and_host() {
    let headers = headers(&[(PROJECT_HEADER, "header-proj"), ("host", "sub.example.com")]);
    let project = extract_project("/acme/v1/chat", &headers).expect("project should resolve");
    assert_eq!(project.project_id, "acme");
    assert!(project.from_path);
}

#[test]
fn header_is_used_when_path_has_no_segment() {
    let headers = headers(&[(PROJECT_HEADER, "header-proj"), ("host", "sub.example.com")]);
    let project = extract_project("/", &headers).expect("project should resolve");
    assert_eq!(project.project_id, "header-proj");
    assert!(!project.from_path);
}

#[test]
fn subdomain_is_the_last_resort_and_skips_www() {
    let project = extract_project("/", &headers(&[("host", "acme.example.com:8080")]))
        .expect("project should resolve");
    assert_eq!(project.project_id, "acme");

    assert!(extract_project("/", &headers(&[("host", "www.example.com")])).is_none());
    assert!(extract_project("/", &headers(&[("host", "localhost")])).is_none());
    assert!(extract_project("/", &HashMap::new()).is_none());
}

#[test]
fn strips_the_project_prefix_from_paths() {
    assert_eq!(strip_project("/acme/v1/chat", "acme"), "/v1/chat");
    assert_eq!(strip_project("/acme", "acme"), "/");
    assert_eq!(strip_project("/other/v1", "acme"), "/other/v1");
}

#[test]
fn routing_table_defaults_to_unconfigured() {
    let table = RoutingTable::new();
    assert_eq!(table.get("acme"), RoutingMode::Unconfigured);
    assert!(table.is_empty());

    table.set("acme", RoutingMode::Gateway);
    table.set("beta", RoutingMode::Direct);
    assert_eq!(table.get("acme"), RoutingMode::Gateway);
    assert_eq!(table.len(), 2);

    table.set("acme", RoutingMode::Direct);
    assert_eq!(table.get("acme"), RoutingMode::Direct);
    assert_eq!(table.len(), 2);
}
