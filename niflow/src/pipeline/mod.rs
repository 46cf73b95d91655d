//! Pipeline declaration and producer binding.
//!
//! This module provides:
//! - Tool interfaces and nodes
//! - The pipeline factory registry type and its build context
//! - A builder that checks declarations against the study registry
//! - The validated, immutable [`Pipeline`]

pub mod citation;
mod builder;
mod factory;
mod node;
mod spec;

pub use builder::PipelineBuilder;
pub use citation::{Citation, Requirement};
pub use factory::{PipelineContext, PipelineFactory};
pub use node::{Arg, PortSpec, ToolInterface, ToolKind, ToolNode};
pub use spec::{Connection, Pipeline, PortBinding};
