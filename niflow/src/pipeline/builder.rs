//! Pipeline builder with wiring validation.

use indexmap::IndexMap;
use std::collections::HashSet;

use super::citation::{Citation, Requirement};
use super::node::ToolNode;
use super::spec::{Connection, Pipeline, PortBinding};
use crate::errors::{NiflowError, WiringError};
use crate::spec::{DataSpec, OptionSet, PipelineName};
use crate::study::Study;

/// Declares and wires one pipeline of a study.
///
/// Declarations are checked against the study registry as they are made:
/// inputs must exist, outputs must be attributed to this pipeline.
/// [`build`](Self::build) then checks that everything declared is
/// connected before handing out an immutable [`Pipeline`].
#[derive(Debug)]
pub struct PipelineBuilder<'a> {
    study: &'a Study,
    name: PipelineName,
    options: OptionSet,
    desc: Option<String>,
    version: u32,
    citations: Vec<Citation>,
    inputs: IndexMap<String, DataSpec>,
    outputs: IndexMap<String, DataSpec>,
    nodes: IndexMap<String, ToolNode>,
    connections: Vec<Connection>,
    input_bindings: Vec<PortBinding>,
    output_bindings: Vec<PortBinding>,
}

impl<'a> PipelineBuilder<'a> {
    pub(crate) fn new(study: &'a Study, name: PipelineName, options: OptionSet) -> Self {
        Self {
            study,
            name,
            options,
            desc: None,
            version: 1,
            citations: Vec::new(),
            inputs: IndexMap::new(),
            outputs: IndexMap::new(),
            nodes: IndexMap::new(),
            connections: Vec::new(),
            input_bindings: Vec::new(),
            output_bindings: Vec::new(),
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = Some(desc.into());
        self
    }

    /// Sets the version.
    #[must_use]
    pub const fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Adds a citation.
    #[must_use]
    pub fn citation(mut self, citation: Citation) -> Self {
        if !self.citations.contains(&citation) {
            self.citations.push(citation);
        }
        self
    }

    /// Returns the pipeline name.
    #[must_use]
    pub const fn name(&self) -> &PipelineName {
        &self.name
    }

    /// Returns the number of nodes added so far.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Declares a required input spec.
    ///
    /// # Errors
    ///
    /// Fails with a spec-not-found error if the study does not declare
    /// `name`, or a wiring error if it was already declared.
    pub fn input(mut self, name: &str) -> Result<Self, NiflowError> {
        let spec = self.study.definition().data_spec(name)?.clone();
        if self.inputs.contains_key(name) {
            return Err(self.duplicate("input", name).into());
        }
        self.inputs.insert(name.to_string(), spec);
        Ok(self)
    }

    /// Declares a produced output spec.
    ///
    /// # Errors
    ///
    /// Fails if the study does not attribute `name` to this pipeline.
    pub fn output(mut self, name: &str) -> Result<Self, NiflowError> {
        let spec = self.study.definition().data_spec(name)?.clone();
        if !spec.is_produced_by(self.name.as_str()) {
            return Err(WiringError::foreign_output(
                self.study.name(),
                self.name.as_str(),
                name,
                spec.pipeline().map(PipelineName::as_str),
            )
            .into());
        }
        if self.outputs.contains_key(name) {
            return Err(self.duplicate("output", name).into());
        }
        self.outputs.insert(name.to_string(), spec);
        Ok(self)
    }

    /// Adds a tool node.
    pub fn add_node(mut self, node: ToolNode) -> Result<Self, NiflowError> {
        if self.nodes.contains_key(node.name()) {
            return Err(self.duplicate("node", node.name()).into());
        }
        for citation in node.interface().citations() {
            if !self.citations.contains(citation) {
                self.citations.push(citation.clone());
            }
        }
        self.nodes.insert(node.name().to_string(), node);
        Ok(self)
    }

    /// Connects an output port of one node to an input port of another.
    pub fn connect(
        mut self,
        from_node: &str,
        from_port: &str,
        to_node: &str,
        to_port: &str,
    ) -> Result<Self, NiflowError> {
        self.check_output_port(from_node, from_port)?;
        self.check_input_port(to_node, to_port)?;
        self.connections.push(Connection {
            from_node: from_node.to_string(),
            from_port: from_port.to_string(),
            to_node: to_node.to_string(),
            to_port: to_port.to_string(),
        });
        Ok(self)
    }

    /// Connects a declared input spec to a node input port.
    pub fn connect_input(mut self, spec: &str, node: &str, port: &str) -> Result<Self, NiflowError> {
        if !self.inputs.contains_key(spec) {
            return Err(self.unknown_port("inputs", spec).into());
        }
        self.check_input_port(node, port)?;
        self.input_bindings.push(PortBinding {
            spec: spec.to_string(),
            node: node.to_string(),
            port: port.to_string(),
        });
        Ok(self)
    }

    /// Connects a node output port to a declared output spec.
    pub fn connect_output(mut self, spec: &str, node: &str, port: &str) -> Result<Self, NiflowError> {
        if !self.outputs.contains_key(spec) {
            return Err(self.unknown_port("outputs", spec).into());
        }
        if self.output_bindings.iter().any(|b| b.spec == spec) {
            return Err(self.duplicate("output connection", spec).into());
        }
        self.check_output_port(node, port)?;
        self.output_bindings.push(PortBinding {
            spec: spec.to_string(),
            node: node.to_string(),
            port: port.to_string(),
        });
        Ok(self)
    }

    /// Validates the wiring and freezes the pipeline.
    ///
    /// # Errors
    ///
    /// Fails if a declared input or output, or a mandatory node input,
    /// is left unconnected, or if the nodes form a cycle.
    pub fn build(self) -> Result<Pipeline, NiflowError> {
        self.assert_connected()?;
        let order = self.node_order()?;

        let mut nodes = self.nodes;
        let mut ordered = Vec::with_capacity(order.len());
        for name in &order {
            if let Some(node) = nodes.shift_remove(name) {
                ordered.push(node);
            }
        }

        let mut requirements: Vec<Requirement> = Vec::new();
        for node in &ordered {
            for requirement in node.interface().requirements() {
                if !requirements.contains(requirement) {
                    requirements.push(requirement.clone());
                }
            }
        }

        tracing::info!(
            study = %self.study.name(),
            pipeline = %self.name,
            nodes = ordered.len(),
            inputs = self.inputs.len(),
            outputs = self.outputs.len(),
            "pipeline validated"
        );

        Ok(Pipeline {
            name: self.name,
            study: self.study.name().to_string(),
            desc: self.desc,
            version: self.version,
            inputs: self.inputs.into_values().collect(),
            outputs: self.outputs.into_values().collect(),
            nodes: ordered,
            connections: self.connections,
            input_bindings: self.input_bindings,
            output_bindings: self.output_bindings,
            options: self.options,
            citations: self.citations,
            requirements,
        })
    }

    fn assert_connected(&self) -> Result<(), WiringError> {
        let study = self.study.name();
        let pipeline = self.name.as_str();

        let unconnected_inputs: Vec<String> = self
            .inputs
            .keys()
            .filter(|spec| !self.input_bindings.iter().any(|b| &b.spec == *spec))
            .cloned()
            .collect();
        if !unconnected_inputs.is_empty() {
            return Err(WiringError::unconnected(study, pipeline, "inputs", unconnected_inputs));
        }

        let unconnected_outputs: Vec<String> = self
            .outputs
            .keys()
            .filter(|spec| !self.output_bindings.iter().any(|b| &b.spec == *spec))
            .cloned()
            .collect();
        if !unconnected_outputs.is_empty() {
            return Err(WiringError::unconnected(study, pipeline, "outputs", unconnected_outputs));
        }

        let mut unconnected_ports = Vec::new();
        for node in self.nodes.values() {
            for port in node.interface().inputs().iter().filter(|p| p.mandatory) {
                let fed = self.port_source_count(node.name(), &port.name) > 0
                    || node.params().contains_key(&port.name);
                if !fed {
                    unconnected_ports.push(format!("{}.{}", node.name(), port.name));
                }
            }
        }
        if !unconnected_ports.is_empty() {
            return Err(WiringError::unconnected(study, pipeline, "node ports", unconnected_ports));
        }
        Ok(())
    }

    fn port_source_count(&self, node: &str, port: &str) -> usize {
        let from_nodes = self
            .connections
            .iter()
            .filter(|c| c.to_node == node && c.to_port == port)
            .count();
        let from_inputs = self
            .input_bindings
            .iter()
            .filter(|b| b.node == node && b.port == port)
            .count();
        from_nodes + from_inputs
    }

    /// Topological order of the nodes, stable with respect to insertion.
    fn node_order(&self) -> Result<Vec<String>, WiringError> {
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();
        let mut path = Vec::new();
        let mut order = Vec::with_capacity(self.nodes.len());

        for name in self.nodes.keys() {
            if !visited.contains(name.as_str()) {
                if let Some(cycle) =
                    self.visit(name, &mut visited, &mut rec_stack, &mut path, &mut order)
                {
                    return Err(WiringError::cycle(
                        self.study.name(),
                        Some(self.name.as_str()),
                        cycle,
                    ));
                }
            }
        }
        Ok(order)
    }

    fn visit(
        &self,
        node: &str,
        visited: &mut HashSet<String>,
        rec_stack: &mut HashSet<String>,
        path: &mut Vec<String>,
        order: &mut Vec<String>,
    ) -> Option<Vec<String>> {
        visited.insert(node.to_string());
        rec_stack.insert(node.to_string());
        path.push(node.to_string());

        for upstream in self
            .connections
            .iter()
            .filter(|c| c.to_node == node)
            .map(|c| c.from_node.as_str())
        {
            if !visited.contains(upstream) {
                if let Some(cycle) = self.visit(upstream, visited, rec_stack, path, order) {
                    return Some(cycle);
                }
            } else if rec_stack.contains(upstream) {
                let start = path.iter().position(|n| n == upstream).unwrap_or(0);
                let mut cycle: Vec<String> = path[start..].to_vec();
                cycle.push(upstream.to_string());
                return Some(cycle);
            }
        }

        path.pop();
        rec_stack.remove(node);
        order.push(node.to_string());
        None
    }

    fn check_input_port(&self, node: &str, port: &str) -> Result<(), WiringError> {
        let tool = self
            .nodes
            .get(node)
            .ok_or_else(|| WiringError::unknown_node(self.study.name(), self.name.as_str(), node))?;
        if tool.interface().input_port(port).is_none() {
            return Err(self.unknown_port(node, port));
        }
        if self.port_source_count(node, port) > 0 {
            return Err(self.duplicate("source for port", &format!("{node}.{port}")));
        }
        Ok(())
    }

    fn check_output_port(&self, node: &str, port: &str) -> Result<(), WiringError> {
        let tool = self
            .nodes
            .get(node)
            .ok_or_else(|| WiringError::unknown_node(self.study.name(), self.name.as_str(), node))?;
        if !tool.interface().has_output(port) {
            return Err(self.unknown_port(node, port));
        }
        Ok(())
    }

    fn duplicate(&self, what: &str, name: &str) -> WiringError {
        WiringError::duplicate(self.study.name(), self.name.as_str(), what, name)
    }

    fn unknown_port(&self, owner: &str, port: &str) -> WiringError {
        WiringError::unknown_port(self.study.name(), self.name.as_str(), owner, port)
    }
}
