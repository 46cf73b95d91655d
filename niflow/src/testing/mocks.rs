//! Mock tool runners and workflow engines.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use crate::engine::{
    EngineReport, NodeOutcome, NodeStatus, ToolInvocation, ToolRun, ToolRunner, WorkflowEngine,
};
use crate::errors::{NiflowError, ToolError};
use crate::graph::WorkflowGraph;

/// A tool runner that records every invocation instead of running it.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    calls: Mutex<Vec<Vec<String>>>,
    failing: Mutex<Vec<String>>,
}

impl RecordingRunner {
    /// Creates a runner that succeeds for every tool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes invocations of the tool `id` fail with a non-zero exit.
    pub fn fail_tool(&self, id: impl Into<String>) {
        self.failing.lock().push(id.into());
    }

    /// Returns the rendered command lines in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().clone()
    }

    /// Returns the number of calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl ToolRunner for RecordingRunner {
    fn name(&self) -> &str {
        "recording"
    }

    async fn run(&self, invocation: &ToolInvocation) -> Result<ToolRun, ToolError> {
        let argv = invocation.argv()?;
        self.calls.lock().push(argv.clone());
        let tool = invocation.interface().id();
        if self.failing.lock().iter().any(|id| id == tool) {
            return Err(ToolError::NonZeroExit {
                tool: tool.to_string(),
                code: Some(1),
                stderr: "mock failure".to_string(),
            });
        }
        Ok(ToolRun {
            argv,
            stdout: String::new(),
            duration_ms: 0,
        })
    }
}

/// An engine that records submitted graphs and reports every node as
/// succeeded.
#[derive(Debug, Default)]
pub struct RecordingEngine {
    submissions: Mutex<Vec<Vec<String>>>,
}

impl RecordingEngine {
    /// Creates a recording engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the execution order of every submitted graph.
    #[must_use]
    pub fn submissions(&self) -> Vec<Vec<String>> {
        self.submissions.lock().clone()
    }
}

#[async_trait]
impl WorkflowEngine for RecordingEngine {
    fn name(&self) -> &str {
        "recording"
    }

    async fn submit(&self, graph: &WorkflowGraph) -> Result<EngineReport, NiflowError> {
        let order = graph.execution_order().into_iter().map(str::to_string).collect();
        self.submissions.lock().push(order);
        report(self.name(), graph, |_, _| (NodeStatus::Succeeded, None))
    }
}

/// An engine whose run fails at a named node. Every node after it is
/// reported as skipped.
#[derive(Debug)]
pub struct FailingEngine {
    node: String,
    error: String,
}

impl FailingEngine {
    /// Creates an engine failing at `node` with `error`.
    #[must_use]
    pub fn new(node: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            error: error.into(),
        }
    }
}

#[async_trait]
impl WorkflowEngine for FailingEngine {
    fn name(&self) -> &str {
        "failing"
    }

    async fn submit(&self, graph: &WorkflowGraph) -> Result<EngineReport, NiflowError> {
        let mut failed = false;
        report(self.name(), graph, |_, node| {
            if failed {
                (NodeStatus::Skipped, None)
            } else if node == self.node {
                failed = true;
                (NodeStatus::Failed, Some(self.error.clone()))
            } else {
                (NodeStatus::Succeeded, None)
            }
        })
    }
}

fn report(
    engine: &str,
    graph: &WorkflowGraph,
    mut status: impl FnMut(&str, &str) -> (NodeStatus, Option<String>),
) -> Result<EngineReport, NiflowError> {
    let started_at = Utc::now();
    let outcomes = graph
        .tool_nodes()
        .map(|(pipeline, node)| {
            let (status, message) = status(pipeline.name().as_str(), node.name());
            NodeOutcome {
                pipeline: pipeline.name().clone(),
                node: node.name().to_string(),
                status,
                message,
                wall_time_mins: node.wall_time_mins(),
            }
        })
        .collect();
    Ok(EngineReport {
        engine: engine.to_string(),
        build_id: graph.build_id(),
        fingerprint: graph.fingerprint()?,
        outcomes,
        started_at,
        finished_at: Utc::now(),
    })
}
