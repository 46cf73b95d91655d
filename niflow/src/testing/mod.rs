//! Testing utilities for niflow studies.
//!
//! This module provides:
//! - Pipeline factory fixtures and fully provided study instances
//! - Mock tool runners and workflow engines
//! - Assertions for registries, graphs and engine reports

mod assertions;
pub mod fixtures;
mod mocks;

pub use assertions::{
    assert_error_code, assert_execution_order, assert_produced_by, assert_report_succeeded,
    assert_runs_before, assert_spec_not_found, assert_status_count, assert_study_input,
};
pub use fixtures::{all_inputs, passthrough_pipeline, provided_study};
pub use mocks::{FailingEngine, RecordingEngine, RecordingRunner};
