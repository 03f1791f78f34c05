//! Display formatting for CLI output
//!
//! SBIO pattern: Pure functions that format data for display

use crate::controller::ReconcileReport;
use crate::infra::HypervisorList;
use crate::node::{ComponentType, NodeList};

// ============================================================================
// Table formatting helpers
// ============================================================================

/// Format rows under upper-cased headers, columns three spaces apart.
///
/// Widths count characters, not bytes, so non-ASCII names stay aligned.
/// Trailing padding is trimmed from every line.
pub fn format_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    if rows.is_empty() {
        return "No resources found.\n".to_string();
    }

    let headers: Vec<String> = headers.iter().map(|h| h.to_uppercase()).collect();
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut output = String::new();
    for line in std::iter::once(&headers).chain(rows) {
        let cells: Vec<String> = line
            .iter()
            .enumerate()
            .map(|(i, cell)| match widths.get(i) {
                Some(&width) => format!("{:width$}", cell, width = width),
                None => cell.clone(),
            })
            .collect();
        output.push_str(cells.join("   ").trim_end());
        output.push('\n');
    }

    output
}

fn ready(value: bool) -> String {
    let text = if value { "True" } else { "False" };
    text.to_string()
}

// ============================================================================
// Resource display
// ============================================================================

/// Format node list for display
pub fn format_node_list(nodes: &NodeList) -> String {
    let headers = &["NAME", "CLUSTER", "HYPERVISOR", "READY"];
    let rows: Vec<Vec<String>> = nodes
        .iter()
        .map(|node| {
            vec![
                node.name().to_string(),
                node.cluster_name().to_string(),
                node.hypervisor_name().to_string(),
                ready(node.is_ready()),
            ]
        })
        .collect();

    format_table(headers, &rows)
}

/// Format hypervisor list for display
pub fn format_hypervisor_list(hypervisors: &HypervisorList) -> String {
    let headers = &["NAME", "IP", "PUBLIC", "ENDPOINT"];
    let rows: Vec<Vec<String>> = hypervisors
        .iter()
        .map(|hv| {
            vec![
                hv.name().to_string(),
                hv.ip_address().to_string(),
                hv.is_public().to_string(),
                hv.endpoint().unwrap_or("<local>").to_string(),
            ]
        })
        .collect();

    format_table(headers, &rows)
}

/// Format the component list in reconciliation order
pub fn format_component_list() -> String {
    let headers = &["ORDER", "NAME", "IMAGE"];
    let rows: Vec<Vec<String>> = ComponentType::ALL
        .iter()
        .enumerate()
        .map(|(i, t)| vec![(i + 1).to_string(), t.to_string(), t.image()])
        .collect();

    format_table(headers, &rows)
}

/// Format the outcome of a reconciliation pass as pretty JSON
pub fn format_report_json(report: &ReconcileReport) -> serde_json::Result<String> {
    serde_json::to_string_pretty(report).map(|mut json| {
        json.push('\n');
        json
    })
}

/// Format the outcome of a reconciliation pass
pub fn format_report(report: &ReconcileReport) -> String {
    let mut output = String::new();
    for name in &report.succeeded {
        output.push_str(&format!("✓ {} reconciled\n", name));
    }
    for failure in &report.failed {
        output.push_str(&format!("✗ {}: {}\n", failure.node, failure.error));
    }
    if report.succeeded.is_empty() && report.failed.is_empty() {
        output.push_str("No nodes to reconcile.\n");
    }
    output
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;

    use super::*;
    use crate::controller::NodeFailure;
    use crate::infra::Hypervisor;
    use crate::node::Node;
    use crate::runtime::DryRunRuntime;
    use crate::versioned::NodeManifest;

    #[test]
    fn test_format_table_empty() {
        assert_eq!(format_table(&["NAME"], &[]), "No resources found.\n");
    }

    #[test]
    fn test_format_table_alignment() {
        let table = format_table(
            &["name", "cluster"],
            &[vec!["cp-1".to_string(), "demo".to_string()]],
        );
        assert_eq!(table, "NAME   CLUSTER\ncp-1   demo\n");
    }

    #[test]
    fn test_format_table_counts_characters() {
        let table = format_table(
            &["name", "ready"],
            &[
                vec!["ñodo".to_string(), ready(true)],
                vec!["cp-10".to_string(), ready(false)],
            ],
        );
        assert_eq!(table, "NAME    READY\nñodo    True\ncp-10   False\n");
    }

    #[test]
    fn test_format_node_list() {
        let hypervisor = Arc::new(Hypervisor::new("hv-a", "10.0.0.1", Arc::new(DryRunRuntime)));
        let nodes: NodeList = vec![
            Node::bound("cp-1", "demo", hypervisor),
            Node::from_manifest(&NodeManifest::new("cp-2", "hv-b", "demo")),
        ]
        .into();

        let output = format_node_list(&nodes);
        let lines: Vec<&str> = output.lines().collect();
        assert!(lines[0].starts_with("NAME"));
        assert!(lines[1].contains("hv-a") && lines[1].ends_with("True"));
        assert!(lines[2].contains("hv-b") && lines[2].contains("False"));
    }

    #[test]
    fn test_format_component_list() {
        let output = format_component_list();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[1].contains("kube-apiserver"));
        assert!(lines[3].contains("kube-scheduler"));
    }

    #[test]
    fn test_format_report() {
        let report = ReconcileReport {
            started_at: Utc::now(),
            succeeded: vec!["cp-1".to_string()],
            failed: vec![NodeFailure {
                node: "cp-2".to_string(),
                error: "boom".to_string(),
            }],
        };
        assert_eq!(format_report(&report), "✓ cp-1 reconciled\n✗ cp-2: boom\n");

        let json: serde_json::Value =
            serde_json::from_str(&format_report_json(&report).unwrap()).unwrap();
        assert_eq!(json["succeeded"][0], "cp-1");
        assert_eq!(json["failed"][0]["node"], "cp-2");
        assert!(json["startedAt"].is_string());
    }
}
