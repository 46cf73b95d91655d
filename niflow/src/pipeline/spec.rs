//! The validated, immutable pipeline.

use serde::{Deserialize, Serialize};

use super::citation::{Citation, Requirement};
use super::node::ToolNode;
use crate::spec::{DataSpec, OptionSet, PipelineName};

/// A node-to-node connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    /// Source node.
    pub from_node: String,
    /// Source output port.
    pub from_port: String,
    /// Destination node.
    pub to_node: String,
    /// Destination input port.
    pub to_port: String,
}

/// A binding between a declared spec and a node port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortBinding {
    /// The spec name in the owning study.
    pub spec: String,
    /// The node.
    pub node: String,
    /// The node port.
    pub port: String,
}

/// A validated pipeline: tool nodes wired between declared input and
/// output specs.
///
/// Produced only by [`PipelineBuilder::build`](super::PipelineBuilder::build),
/// after every declared port is connected.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pipeline {
    pub(crate) name: PipelineName,
    pub(crate) study: String,
    pub(crate) desc: Option<String>,
    pub(crate) version: u32,
    pub(crate) inputs: Vec<DataSpec>,
    pub(crate) outputs: Vec<DataSpec>,
    pub(crate) nodes: Vec<ToolNode>,
    pub(crate) connections: Vec<Connection>,
    pub(crate) input_bindings: Vec<PortBinding>,
    pub(crate) output_bindings: Vec<PortBinding>,
    pub(crate) options: OptionSet,
    pub(crate) citations: Vec<Citation>,
    pub(crate) requirements: Vec<Requirement>,
}

impl Pipeline {
    /// Returns the pipeline name.
    #[must_use]
    pub const fn name(&self) -> &PipelineName {
        &self.name
    }

    /// Returns the study the pipeline belongs to.
    #[must_use]
    pub fn study(&self) -> &str {
        &self.study
    }

    /// Returns the description.
    #[must_use]
    pub fn desc(&self) -> Option<&str> {
        self.desc.as_deref()
    }

    /// Returns the version.
    #[must_use]
    pub const fn version(&self) -> u32 {
        self.version
    }

    /// Returns the declared inputs.
    #[must_use]
    pub fn inputs(&self) -> &[DataSpec] {
        &self.inputs
    }

    /// Returns the declared outputs.
    #[must_use]
    pub fn outputs(&self) -> &[DataSpec] {
        &self.outputs
    }

    /// Iterates over declared input names.
    pub fn input_names(&self) -> impl Iterator<Item = &str> {
        self.inputs.iter().map(DataSpec::name)
    }

    /// Iterates over declared output names.
    pub fn output_names(&self) -> impl Iterator<Item = &str> {
        self.outputs.iter().map(DataSpec::name)
    }

    /// Returns true if the pipeline declares `name` as an output.
    #[must_use]
    pub fn has_output(&self, name: &str) -> bool {
        self.outputs.iter().any(|spec| spec.name() == name)
    }

    /// Returns the nodes in dependency order.
    #[must_use]
    pub fn nodes(&self) -> &[ToolNode] {
        &self.nodes
    }

    /// Looks up a node.
    #[must_use]
    pub fn node(&self, name: &str) -> Option<&ToolNode> {
        self.nodes.iter().find(|node| node.name() == name)
    }

    /// Returns the node-to-node connections.
    #[must_use]
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Returns the input spec bindings.
    #[must_use]
    pub fn input_bindings(&self) -> &[PortBinding] {
        &self.input_bindings
    }

    /// Returns the output spec bindings.
    #[must_use]
    pub fn output_bindings(&self) -> &[PortBinding] {
        &self.output_bindings
    }

    /// Returns the options the pipeline was built with.
    #[must_use]
    pub const fn options(&self) -> &OptionSet {
        &self.options
    }

    /// Returns the citations.
    #[must_use]
    pub fn citations(&self) -> &[Citation] {
        &self.citations
    }

    /// Returns the software requirements of all nodes.
    #[must_use]
    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }
}
