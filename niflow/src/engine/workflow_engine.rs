use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};
use uuid::Uuid;

use super::invocation::ToolInvocation;
use crate::config::NiflowConfig;
use crate::errors::NiflowError;
use crate::graph::WorkflowGraph;
use crate::pipeline::ToolNode;
use crate::spec::PipelineName;

/// What happened to one tool node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    /// Scheduled but not run.
    Planned,
    /// Ran successfully.
    Succeeded,
    /// Ran and failed.
    Failed,
    /// Not run because an upstream node failed.
    Skipped,
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Planned => write!(f, "planned"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

/// The outcome of one tool node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeOutcome {
    /// The owning pipeline.
    pub pipeline: PipelineName,
    /// The node name.
    pub node: String,
    /// The status.
    pub status: NodeStatus,
    /// Optional detail, e.g. the program or an error message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Expected wall time in minutes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wall_time_mins: Option<u32>,
}

/// Per-node outcomes of one graph submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineReport {
    /// The engine that handled the graph.
    pub engine: String,
    /// The graph build id.
    pub build_id: Uuid,
    /// The graph fingerprint.
    pub fingerprint: String,
    /// Outcomes in execution order.
    pub outcomes: Vec<NodeOutcome>,
    /// Submission time.
    pub started_at: DateTime<Utc>,
    /// Completion time.
    pub finished_at: DateTime<Utc>,
}

impl EngineReport {
    /// Returns true if no node failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.status != NodeStatus::Failed)
    }

    /// Counts the nodes with `status`.
    #[must_use]
    pub fn count(&self, status: NodeStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    /// Iterates over failed nodes.
    pub fn failed(&self) -> impl Iterator<Item = &NodeOutcome> {
        self.outcomes.iter().filter(|o| o.status == NodeStatus::Failed)
    }
}

/// An execution backend for workflow graphs.
#[async_trait]
pub trait WorkflowEngine: Send + Sync + Debug {
    /// Returns the engine name.
    fn name(&self) -> &str;

    /// Executes (or schedules) every node of `graph`.
    async fn submit(&self, graph: &WorkflowGraph) -> Result<EngineReport, NiflowError>;
}

/// Plans every node in execution order without running anything.
///
/// Nodes that declare no wall time are planned with the engine default,
/// if one is set.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunEngine {
    default_wall_time_mins: Option<u32>,
}

impl DryRunEngine {
    /// Creates a dry-run engine without a default wall time.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            default_wall_time_mins: None,
        }
    }

    /// Creates a dry-run engine using the configured default wall time.
    #[must_use]
    pub const fn from_config(config: &NiflowConfig) -> Self {
        Self::new().with_default_wall_time(config.default_wall_time_mins)
    }

    /// Plans undeclared wall times as `mins`.
    #[must_use]
    pub const fn with_default_wall_time(mut self, mins: u32) -> Self {
        self.default_wall_time_mins = Some(mins);
        self
    }
}

#[async_trait]
impl WorkflowEngine for DryRunEngine {
    fn name(&self) -> &str {
        "dry_run"
    }

    async fn submit(&self, graph: &WorkflowGraph) -> Result<EngineReport, NiflowError> {
        let started_at = Utc::now();
        let outcomes: Vec<NodeOutcome> = graph
            .tool_nodes()
            .map(|(pipeline, node)| {
                let message = preview_command(node)
                    .unwrap_or_else(|| format!("builtin {}", node.interface().id()));
                NodeOutcome {
                    pipeline: pipeline.name().clone(),
                    node: node.name().to_string(),
                    status: NodeStatus::Planned,
                    message: Some(message),
                    wall_time_mins: node.wall_time_mins().or(self.default_wall_time_mins),
                }
            })
            .collect();

        tracing::info!(
            engine = self.name(),
            study = %graph.study(),
            build_id = %graph.build_id(),
            nodes = outcomes.len(),
            "workflow planned"
        );

        Ok(EngineReport {
            engine: self.name().to_string(),
            build_id: graph.build_id(),
            fingerprint: graph.fingerprint()?,
            outcomes,
            started_at,
            finished_at: Utc::now(),
        })
    }
}

/// Renders the command line a node would run with placeholder paths,
/// for display in plans.
#[must_use]
pub fn preview_command(node: &ToolNode) -> Option<String> {
    let mut invocation = ToolInvocation::from_node(node);
    for port in node.interface().inputs() {
        if !node.params().contains_key(&port.name) {
            invocation = invocation.input(&port.name, format!("<{}>", port.name));
        }
    }
    for port in node.interface().outputs() {
        invocation = invocation.output(&port.name, format!("<{}>", port.name));
    }
    invocation.argv().ok().map(|argv| argv.join(" "))
}
