use indexmap::IndexMap;
use serde::Serialize;

use crate::errors::ToolError;
use crate::pipeline::{Arg, ToolInterface, ToolKind, ToolNode};
use crate::spec::OptionValue;

/// A concrete call of a tool: port values, output paths and parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolInvocation {
    interface: ToolInterface,
    inputs: IndexMap<String, String>,
    outputs: IndexMap<String, String>,
    params: IndexMap<String, OptionValue>,
}

impl ToolInvocation {
    /// Creates an invocation of `interface` with nothing bound.
    #[must_use]
    pub fn new(interface: ToolInterface) -> Self {
        Self {
            interface,
            inputs: IndexMap::new(),
            outputs: IndexMap::new(),
            params: IndexMap::new(),
        }
    }

    /// Creates an invocation of a pipeline node, carrying its parameters.
    #[must_use]
    pub fn from_node(node: &ToolNode) -> Self {
        Self {
            interface: node.interface().clone(),
            inputs: IndexMap::new(),
            outputs: IndexMap::new(),
            params: node.params().clone(),
        }
    }

    /// Binds an input port.
    #[must_use]
    pub fn input(mut self, port: impl Into<String>, value: impl Into<String>) -> Self {
        self.inputs.insert(port.into(), value.into());
        self
    }

    /// Binds an output port to the path the tool writes.
    #[must_use]
    pub fn output(mut self, port: impl Into<String>, path: impl Into<String>) -> Self {
        self.outputs.insert(port.into(), path.into());
        self
    }

    /// Sets a parameter.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Returns the tool interface.
    #[must_use]
    pub const fn interface(&self) -> &ToolInterface {
        &self.interface
    }

    /// Returns the bound output paths.
    #[must_use]
    pub const fn outputs(&self) -> &IndexMap<String, String> {
        &self.outputs
    }

    /// Renders the command line.
    ///
    /// Input ports fall back to a parameter of the same name. Boolean
    /// parameters render as their bare flag when true and are omitted
    /// when false.
    ///
    /// # Errors
    ///
    /// Fails for builtin tools, and when a mandatory input or any
    /// templated output has no value.
    pub fn argv(&self) -> Result<Vec<String>, ToolError> {
        let ToolKind::Command { program } = self.interface.kind() else {
            return Err(ToolError::unsupported(
                self.interface.id(),
                "builtin tools run inside the workflow engine",
            ));
        };

        let mut argv = vec![program.clone()];
        for arg in self.interface.args() {
            match arg {
                Arg::Literal { value } => argv.push(value.clone()),
                Arg::Input { port, flag } => {
                    let value = self
                        .inputs
                        .get(port)
                        .cloned()
                        .or_else(|| self.params.get(port).map(ToString::to_string));
                    match value {
                        Some(value) => push_flagged(&mut argv, flag.as_deref(), value),
                        None if self.is_mandatory(port) => {
                            return Err(ToolError::missing_argument(self.interface.id(), port));
                        }
                        None => {}
                    }
                }
                Arg::Output { port, flag } => {
                    let path = self
                        .outputs
                        .get(port)
                        .ok_or_else(|| ToolError::missing_argument(self.interface.id(), port))?;
                    push_flagged(&mut argv, flag.as_deref(), path.clone());
                }
                Arg::Param { name, flag } => match self.params.get(name) {
                    Some(OptionValue::Bool(true)) => {
                        if let Some(flag) = flag {
                            argv.push(flag.clone());
                        }
                    }
                    Some(OptionValue::Bool(false)) | None => {}
                    Some(OptionValue::List(items)) => {
                        if let Some(flag) = flag {
                            argv.push(flag.clone());
                        }
                        argv.extend(items.iter().map(ToString::to_string));
                    }
                    Some(value) => push_flagged(&mut argv, flag.as_deref(), value.to_string()),
                },
            }
        }
        Ok(argv)
    }

    fn is_mandatory(&self, port: &str) -> bool {
        self.interface
            .input_port(port)
            .is_some_and(|spec| spec.mandatory)
    }
}

fn push_flagged(argv: &mut Vec<String>, flag: Option<&str>, value: String) {
    if let Some(flag) = flag {
        argv.push(flag.to_string());
    }
    argv.push(value);
}
