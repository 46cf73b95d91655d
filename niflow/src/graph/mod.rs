//! Producer resolution and the workflow graph.

mod resolve;
mod workflow;

pub use resolve::resolve;
pub use workflow::{DataEdge, EdgeSource, WorkflowGraph};
