//! Test assertions for studies, graphs and engine reports.

use crate::engine::{EngineReport, NodeStatus};
use crate::errors::NiflowError;
use crate::graph::WorkflowGraph;
use crate::study::StudyDefinition;

/// Asserts that `name` is declared and produced by `pipeline`.
pub fn assert_produced_by(definition: &StudyDefinition, name: &str, pipeline: &str) {
    let spec = definition
        .data_spec(name)
        .unwrap_or_else(|err| panic!("Expected '{name}' to be declared: {err}"));
    assert!(
        spec.is_produced_by(pipeline),
        "Expected '{}' to be produced by '{}', got {:?}",
        name,
        pipeline,
        spec.pipeline()
    );
}

/// Asserts that `name` is declared as a study input.
pub fn assert_study_input(definition: &StudyDefinition, name: &str) {
    let spec = definition
        .data_spec(name)
        .unwrap_or_else(|err| panic!("Expected '{name}' to be declared: {err}"));
    assert!(
        spec.is_input(),
        "Expected '{}' to be a study input, but it is produced by {:?}",
        name,
        spec.pipeline()
    );
}

/// Asserts that the error is a spec-not-found error naming `name`.
pub fn assert_spec_not_found(err: &NiflowError, name: &str) {
    assert!(
        err.is_spec_not_found(),
        "Expected spec-not-found error, got: {err}"
    );
    assert!(
        err.to_string().contains(name),
        "Expected error to name '{name}', got: {err}"
    );
}

/// Asserts that the error carries the diagnostic code `code`.
pub fn assert_error_code(err: &NiflowError, code: &str) {
    assert_eq!(
        err.code(),
        Some(code),
        "Expected error code {code}, got error: {err}"
    );
}

/// Asserts the pipelines of `graph` run in exactly `expected` order.
pub fn assert_execution_order(graph: &WorkflowGraph, expected: &[&str]) {
    assert_eq!(
        graph.execution_order(),
        expected,
        "Unexpected execution order for study '{}'",
        graph.study()
    );
}

/// Asserts that `pipeline` runs before `later`.
pub fn assert_runs_before(graph: &WorkflowGraph, pipeline: &str, later: &str) {
    let order = graph.execution_order();
    let first = order.iter().position(|p| *p == pipeline);
    let second = order.iter().position(|p| *p == later);
    match (first, second) {
        (Some(a), Some(b)) => assert!(
            a < b,
            "Expected '{pipeline}' before '{later}', got order {order:?}"
        ),
        _ => panic!("Expected both '{pipeline}' and '{later}' in {order:?}"),
    }
}

/// Asserts that no node of the report failed.
pub fn assert_report_succeeded(report: &EngineReport) {
    let failed: Vec<&str> = report.failed().map(|o| o.node.as_str()).collect();
    assert!(
        report.is_success(),
        "Expected engine '{}' to succeed, failed nodes: {failed:?}",
        report.engine
    );
}

/// Asserts the number of nodes with `status`.
pub fn assert_status_count(report: &EngineReport, status: NodeStatus, expected: usize) {
    assert_eq!(
        report.count(status),
        expected,
        "Expected {expected} {status} nodes in report from '{}'",
        report.engine
    );
}
