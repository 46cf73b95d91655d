//! Tool interfaces and the nodes that invoke them.

use indexmap::IndexMap;
use serde::Serialize;

use super::citation::{Citation, Requirement};
use crate::spec::OptionValue;

/// How a tool is run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolKind {
    /// An external executable.
    Command {
        /// Program name or path.
        program: String,
    },
    /// An operation implemented by the workflow engine itself.
    Builtin,
}

/// A named input or output port of a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortSpec {
    /// Port name.
    pub name: String,
    /// Whether the port must be connected.
    pub mandatory: bool,
}

/// One element of a command line template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Arg {
    /// A fixed token.
    Literal {
        /// The token.
        value: String,
    },
    /// The value bound to an input port.
    Input {
        /// The port.
        port: String,
        /// Flag preceding the value.
        flag: Option<String>,
    },
    /// The path bound to an output port.
    Output {
        /// The port.
        port: String,
        /// Flag preceding the value.
        flag: Option<String>,
    },
    /// A node parameter.
    Param {
        /// Parameter name.
        name: String,
        /// Flag preceding the value.
        flag: Option<String>,
    },
}

impl Arg {
    /// A fixed token.
    #[must_use]
    pub fn literal(value: impl Into<String>) -> Self {
        Self::Literal { value: value.into() }
    }

    /// A positional input.
    #[must_use]
    pub fn input(port: impl Into<String>) -> Self {
        Self::Input {
            port: port.into(),
            flag: None,
        }
    }

    /// A flagged input.
    #[must_use]
    pub fn input_flag(flag: impl Into<String>, port: impl Into<String>) -> Self {
        Self::Input {
            port: port.into(),
            flag: Some(flag.into()),
        }
    }

    /// A positional output.
    #[must_use]
    pub fn output(port: impl Into<String>) -> Self {
        Self::Output {
            port: port.into(),
            flag: None,
        }
    }

    /// A flagged output.
    #[must_use]
    pub fn output_flag(flag: impl Into<String>, port: impl Into<String>) -> Self {
        Self::Output {
            port: port.into(),
            flag: Some(flag.into()),
        }
    }

    /// A flagged parameter. Boolean parameters render as the bare flag.
    #[must_use]
    pub fn param(flag: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Param {
            name: name.into(),
            flag: Some(flag.into()),
        }
    }
}

/// Declared ports and command line of an external tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolInterface {
    id: String,
    kind: ToolKind,
    inputs: Vec<PortSpec>,
    outputs: Vec<PortSpec>,
    args: Vec<Arg>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    requirements: Vec<Requirement>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    citations: Vec<Citation>,
}

impl ToolInterface {
    /// An interface run as the external program `program`.
    #[must_use]
    pub fn command(id: impl Into<String>, program: impl Into<String>) -> Self {
        Self::with_kind(
            id,
            ToolKind::Command {
                program: program.into(),
            },
        )
    }

    /// An interface implemented by the workflow engine.
    #[must_use]
    pub fn builtin(id: impl Into<String>) -> Self {
        Self::with_kind(id, ToolKind::Builtin)
    }

    fn with_kind(id: impl Into<String>, kind: ToolKind) -> Self {
        Self {
            id: id.into(),
            kind,
            inputs: Vec::new(),
            outputs: Vec::new(),
            args: Vec::new(),
            requirements: Vec::new(),
            citations: Vec::new(),
        }
    }

    /// Adds a mandatory input port.
    #[must_use]
    pub fn input(mut self, name: impl Into<String>) -> Self {
        self.inputs.push(PortSpec {
            name: name.into(),
            mandatory: true,
        });
        self
    }

    /// Adds an optional input port.
    #[must_use]
    pub fn optional_input(mut self, name: impl Into<String>) -> Self {
        self.inputs.push(PortSpec {
            name: name.into(),
            mandatory: false,
        });
        self
    }

    /// Adds an output port.
    #[must_use]
    pub fn output(mut self, name: impl Into<String>) -> Self {
        self.outputs.push(PortSpec {
            name: name.into(),
            mandatory: true,
        });
        self
    }

    /// Appends a command line element.
    #[must_use]
    pub fn arg(mut self, arg: Arg) -> Self {
        self.args.push(arg);
        self
    }

    /// Adds a software requirement.
    #[must_use]
    pub fn requires(mut self, requirement: Requirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    /// Adds a citation.
    #[must_use]
    pub fn cites(mut self, citation: Citation) -> Self {
        self.citations.push(citation);
        self
    }

    /// Returns the tool identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns how the tool is run.
    #[must_use]
    pub const fn kind(&self) -> &ToolKind {
        &self.kind
    }

    /// Returns the input ports.
    #[must_use]
    pub fn inputs(&self) -> &[PortSpec] {
        &self.inputs
    }

    /// Returns the output ports.
    #[must_use]
    pub fn outputs(&self) -> &[PortSpec] {
        &self.outputs
    }

    /// Returns the command line template.
    #[must_use]
    pub fn args(&self) -> &[Arg] {
        &self.args
    }

    /// Returns the software requirements.
    #[must_use]
    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    /// Returns the citations.
    #[must_use]
    pub fn citations(&self) -> &[Citation] {
        &self.citations
    }

    /// Returns the input port with the given name.
    #[must_use]
    pub fn input_port(&self, name: &str) -> Option<&PortSpec> {
        self.inputs.iter().find(|p| p.name == name)
    }

    /// Returns true if the tool has an output port with the given name.
    #[must_use]
    pub fn has_output(&self, name: &str) -> bool {
        self.outputs.iter().any(|p| p.name == name)
    }
}

/// A tool invocation inside a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolNode {
    name: String,
    interface: ToolInterface,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    params: IndexMap<String, OptionValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    wall_time_mins: Option<u32>,
}

impl ToolNode {
    /// Creates a node invoking `interface`.
    #[must_use]
    pub fn new(name: impl Into<String>, interface: ToolInterface) -> Self {
        Self {
            name: name.into(),
            interface,
            params: IndexMap::new(),
            wall_time_mins: None,
        }
    }

    /// Sets a parameter. Parameters named after an input port satisfy it.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Sets the expected wall time.
    #[must_use]
    pub const fn wall_time(mut self, mins: u32) -> Self {
        self.wall_time_mins = Some(mins);
        self
    }

    /// Returns the node name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the tool interface.
    #[must_use]
    pub const fn interface(&self) -> &ToolInterface {
        &self.interface
    }

    /// Returns the parameters.
    #[must_use]
    pub const fn params(&self) -> &IndexMap<String, OptionValue> {
        &self.params
    }

    /// Returns the expected wall time.
    #[must_use]
    pub const fn wall_time_mins(&self) -> Option<u32> {
        self.wall_time_mins
    }

}
