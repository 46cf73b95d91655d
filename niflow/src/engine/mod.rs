//! External collaborator contracts: tool invocation and workflow
//! execution.
//!
//! Graph construction never touches these; they are the hand-off point
//! to whatever actually runs the tools.

mod invocation;
mod runner;
mod workflow_engine;

pub use invocation::ToolInvocation;
pub use runner::{ProcessToolRunner, ToolRun, ToolRunner};
pub use workflow_engine::{
    preview_command, DryRunEngine, EngineReport, NodeOutcome, NodeStatus, WorkflowEngine,
};
