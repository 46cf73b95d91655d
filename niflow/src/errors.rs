//! Error types for the niflow framework.
//!
//! Errors are split by the phase that raises them:
//!
//! - [`SpecificationError`]: study composition (name collisions, invalid
//!   translation maps, unknown producers). Fatal.
//! - [`SpecNotFoundError`]: lookup of an undeclared data, option or
//!   pipeline name in a study.
//! - [`NameNotFoundError`]: a sub-study or translated name does not
//!   exist. Callers probing optional sub-study participation catch it.
//! - [`WiringError`]: pipeline construction and graph resolution. Fatal.
//! - [`ToolError`]: external tool invocation.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// The main error type for niflow operations.
#[derive(Debug, Error)]
pub enum NiflowError {
    /// A study composition error.
    #[error("{0}")]
    Specification(#[from] SpecificationError),

    /// An undeclared spec was looked up.
    #[error("{0}")]
    SpecNotFound(#[from] SpecNotFoundError),

    /// A name could not be resolved through a sub-study.
    #[error("{0}")]
    NameNotFound(#[from] NameNotFoundError),

    /// A pipeline wiring error.
    #[error("{0}")]
    Wiring(#[from] WiringError),

    /// An external tool error.
    #[error("{0}")]
    Tool(#[from] ToolError),

    /// A configuration error.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl NiflowError {
    /// Returns true for the resolution error raised by sub-study name lookups.
    #[must_use]
    pub const fn is_name_not_found(&self) -> bool {
        matches!(self, Self::NameNotFound(_))
    }

    /// Returns true if the error names an undeclared spec.
    #[must_use]
    pub const fn is_spec_not_found(&self) -> bool {
        matches!(self, Self::SpecNotFound(_))
    }

    /// Returns the structured diagnostic attached to the error, if any.
    #[must_use]
    pub fn error_info(&self) -> Option<&ErrorInfo> {
        match self {
            Self::Specification(err) => err.error_info.as_ref(),
            Self::Wiring(err) => err.error_info.as_ref(),
            _ => None,
        }
    }

    /// Returns the diagnostic code, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.error_info().map(|info| info.code.as_str())
    }
}

/// Stable diagnostic codes.
pub mod codes {
    /// A name is declared twice in the same declaration layer.
    pub const DUPLICATE: &str = "SPEC-001-DUPLICATE";
    /// A spec names a producer pipeline without a registered factory.
    pub const UNKNOWN_PRODUCER: &str = "SPEC-002-UNKNOWN_PRODUCER";
    /// A sub-study translation map is not invertible or names unknown specs.
    pub const INVALID_NAME_MAP: &str = "SPEC-003-INVALID_NAME_MAP";
    /// A study contains itself through bases or sub-studies.
    pub const COMPOSITION_CYCLE: &str = "SPEC-004-COMPOSITION_CYCLE";
    /// A name is not a valid identifier.
    pub const INVALID_NAME: &str = "SPEC-005-INVALID_NAME";
    /// Two declarations of the same name disagree on kind.
    pub const TYPE_MISMATCH: &str = "SPEC-006-TYPE_MISMATCH";
    /// An option value does not match the declared default's type.
    pub const INVALID_OPTION: &str = "SPEC-007-INVALID_OPTION";

    /// A declared input, output or mandatory tool port is not connected.
    pub const UNCONNECTED: &str = "WIRE-001-UNCONNECTED";
    /// A pipeline declares an output produced by another pipeline.
    pub const FOREIGN_OUTPUT: &str = "WIRE-002-FOREIGN_OUTPUT";
    /// A required spec has no producer and is not provided.
    pub const NO_PRODUCER: &str = "WIRE-003-NO_PRODUCER";
    /// A connection references an unknown node.
    pub const UNKNOWN_NODE: &str = "WIRE-004-UNKNOWN_NODE";
    /// A connection references an unknown port or undeclared spec.
    pub const UNKNOWN_PORT: &str = "WIRE-005-UNKNOWN_PORT";
    /// A node, declaration or port connection is duplicated.
    pub const DUPLICATE_WIRING: &str = "WIRE-006-DUPLICATE";
    /// Nodes or pipelines depend on each other in a loop.
    pub const CYCLE: &str = "WIRE-007-CYCLE";
    /// A translated spec disagrees in kind with the containing study.
    pub const KIND_MISMATCH: &str = "WIRE-008-TYPE_MISMATCH";
    /// A producer pipeline does not declare the output attributed to it.
    pub const MISSING_OUTPUT: &str = "WIRE-009-MISSING_OUTPUT";
}

/// Structured diagnostic attached to specification and wiring errors.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ErrorInfo {
    /// Error code (e.g., "WIRE-002-FOREIGN_OUTPUT").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ErrorInfo {
    /// Creates a new error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Builds an info whose hint comes from the suggestion registry.
    #[must_use]
    pub fn suggested(code: &str, summary: impl Into<String>) -> Self {
        let info = Self::new(code, summary);
        match crate::diagnostics::get_suggestion(code) {
            Some(suggestion) => info.with_fix_hint(suggestion.fix_steps.join("; ")),
            None => info,
        }
    }
}

/// Error raised while composing a study definition.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct SpecificationError {
    /// The error message.
    pub message: String,
    /// The study being composed.
    pub study: String,
    /// The names involved in the error.
    pub names: Vec<String>,
    /// Optional diagnostic info.
    pub error_info: Option<ErrorInfo>,
}

impl SpecificationError {
    /// Creates a new specification error.
    #[must_use]
    pub fn new(study: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            study: study.into(),
            names: Vec::new(),
            error_info: None,
        }
    }

    /// Sets the names involved.
    #[must_use]
    pub fn with_names(mut self, names: Vec<String>) -> Self {
        self.names = names;
        self
    }

    /// Sets the diagnostic info.
    #[must_use]
    pub fn with_error_info(mut self, info: ErrorInfo) -> Self {
        self.error_info = Some(info);
        self
    }

    fn coded(study: &str, code: &str, message: String, names: Vec<String>) -> Self {
        let info = ErrorInfo::suggested(code, message.clone()).with_context_entry("study", study);
        Self::new(study, message).with_names(names).with_error_info(info)
    }

    /// A name declared twice in one declaration layer.
    #[must_use]
    pub fn duplicate(study: &str, what: &str, name: &str) -> Self {
        Self::coded(
            study,
            codes::DUPLICATE,
            format!("Study '{study}' declares {what} '{name}' more than once"),
            vec![name.to_string()],
        )
    }

    /// A name that is not a valid identifier.
    #[must_use]
    pub fn invalid_name(study: &str, name: &str) -> Self {
        Self::coded(
            study,
            codes::INVALID_NAME,
            format!("Study '{study}' declares invalid name '{name}'"),
            vec![name.to_string()],
        )
    }

    /// A spec whose producer has no registered factory.
    #[must_use]
    pub fn unknown_producer(study: &str, spec: &str, pipeline: &str) -> Self {
        Self::coded(
            study,
            codes::UNKNOWN_PRODUCER,
            format!(
                "Spec '{spec}' in study '{study}' is produced by '{pipeline}', \
                 but no pipeline factory with that name is registered"
            ),
            vec![spec.to_string(), pipeline.to_string()],
        )
    }

    /// An invalid sub-study translation map.
    #[must_use]
    pub fn invalid_name_map(study: &str, sub_study: &str, reason: impl fmt::Display) -> Self {
        Self::coded(
            study,
            codes::INVALID_NAME_MAP,
            format!("Invalid name map for sub-study '{sub_study}' of study '{study}': {reason}"),
            vec![sub_study.to_string()],
        )
    }

    /// A study that contains itself.
    #[must_use]
    pub fn composition_cycle(study: &str, via: &str) -> Self {
        Self::coded(
            study,
            codes::COMPOSITION_CYCLE,
            format!("Study '{study}' contains itself through '{via}'"),
            vec![study.to_string(), via.to_string()],
        )
    }

    /// Two declarations of one name with different kinds.
    #[must_use]
    pub fn type_mismatch(
        study: &str,
        name: &str,
        expected: impl fmt::Display,
        found: impl fmt::Display,
    ) -> Self {
        Self::coded(
            study,
            codes::TYPE_MISMATCH,
            format!("'{name}' in study '{study}' is declared as {expected} but was given as {found}"),
            vec![name.to_string()],
        )
    }

    /// An option value incompatible with its declared default.
    #[must_use]
    pub fn invalid_option(study: &str, name: &str, reason: impl fmt::Display) -> Self {
        Self::coded(
            study,
            codes::INVALID_OPTION,
            format!("Invalid value for option '{name}' of study '{study}': {reason}"),
            vec![name.to_string()],
        )
    }
}

/// The registry a missing spec was looked up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecKind {
    /// Dataset or field specs.
    Data,
    /// Option specs.
    Option,
    /// Pipeline factories.
    Pipeline,
}

impl fmt::Display for SpecKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Data => write!(f, "Data"),
            Self::Option => write!(f, "Option"),
            Self::Pipeline => write!(f, "Pipeline"),
        }
    }
}

/// Error raised when an undeclared name is looked up in a study.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} spec '{name}' not found in study '{study}'")]
pub struct SpecNotFoundError {
    /// The missing name.
    pub name: String,
    /// The study that was queried.
    pub study: String,
    /// The registry that was queried.
    pub kind: SpecKind,
}

impl SpecNotFoundError {
    /// Creates a new spec not found error.
    #[must_use]
    pub fn new(kind: SpecKind, name: impl Into<String>, study: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            study: study.into(),
            kind,
        }
    }
}

/// The namespace a name resolution miss happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameKind {
    /// A sub-study name in a composite study.
    SubStudy,
    /// A name inside a component study.
    Internal,
    /// A name in the containing study.
    External,
}

impl fmt::Display for NameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SubStudy => write!(f, "sub-study"),
            Self::Internal => write!(f, "internal"),
            Self::External => write!(f, "external"),
        }
    }
}

/// Error raised when a name cannot be resolved through a sub-study.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("No {kind} name '{name}' in '{scope}'")]
pub struct NameNotFoundError {
    /// The unresolved name.
    pub name: String,
    /// The study or sub-study that was queried.
    pub scope: String,
    /// Which namespace the name was looked up in.
    pub kind: NameKind,
}

impl NameNotFoundError {
    /// Creates a new name not found error.
    #[must_use]
    pub fn new(kind: NameKind, name: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scope: scope.into(),
            kind,
        }
    }
}

/// Error raised while wiring a pipeline or resolving a workflow graph.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct WiringError {
    /// The error message.
    pub message: String,
    /// The study the pipeline belongs to.
    pub study: String,
    /// The pipeline being wired, if any.
    pub pipeline: Option<String>,
    /// Specs, nodes or ports involved in the error.
    pub names: Vec<String>,
    /// Optional diagnostic info.
    pub error_info: Option<ErrorInfo>,
}

impl WiringError {
    /// Creates a new wiring error.
    #[must_use]
    pub fn new(study: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            study: study.into(),
            pipeline: None,
            names: Vec::new(),
            error_info: None,
        }
    }

    /// Sets the pipeline.
    #[must_use]
    pub fn with_pipeline(mut self, pipeline: impl Into<String>) -> Self {
        self.pipeline = Some(pipeline.into());
        self
    }

    /// Sets the names involved.
    #[must_use]
    pub fn with_names(mut self, names: Vec<String>) -> Self {
        self.names = names;
        self
    }

    /// Sets the diagnostic info.
    #[must_use]
    pub fn with_error_info(mut self, info: ErrorInfo) -> Self {
        self.error_info = Some(info);
        self
    }

    fn coded(
        study: &str,
        pipeline: Option<&str>,
        code: &str,
        message: String,
        names: Vec<String>,
    ) -> Self {
        let mut info =
            ErrorInfo::suggested(code, message.clone()).with_context_entry("study", study);
        let mut err = Self::new(study, message).with_names(names);
        if let Some(pipeline) = pipeline {
            info = info.with_context_entry("pipeline", pipeline);
            err = err.with_pipeline(pipeline);
        }
        err.with_error_info(info)
    }

    /// A declared input, output or mandatory node port left unconnected.
    #[must_use]
    pub fn unconnected(study: &str, pipeline: &str, what: &str, names: Vec<String>) -> Self {
        Self::coded(
            study,
            Some(pipeline),
            codes::UNCONNECTED,
            format!(
                "Pipeline '{pipeline}' of study '{study}' has unconnected {what}: {}",
                names.join(", ")
            ),
            names,
        )
    }

    /// An output attributed to a different producer.
    #[must_use]
    pub fn foreign_output(study: &str, pipeline: &str, spec: &str, producer: Option<&str>) -> Self {
        let actual = producer.map_or_else(
            || "no producer (it is a study input)".to_string(),
            |p| format!("'{p}'"),
        );
        Self::coded(
            study,
            Some(pipeline),
            codes::FOREIGN_OUTPUT,
            format!(
                "Pipeline '{pipeline}' declares output '{spec}', but in study '{study}' \
                 it is produced by {actual}"
            ),
            vec![spec.to_string()],
        )
    }

    /// A required spec that has no producer and is not provided.
    #[must_use]
    pub fn no_producer(study: &str, spec: &str, consumer: Option<&str>) -> Self {
        let message = match consumer {
            Some(consumer) => format!(
                "Input '{spec}' of pipeline '{consumer}' in study '{study}' has no producer \
                 and was not provided"
            ),
            None => format!("'{spec}' in study '{study}' has no producer and was not provided"),
        };
        Self::coded(
            study,
            consumer,
            codes::NO_PRODUCER,
            message,
            vec![spec.to_string()],
        )
    }

    /// A reference to an unknown node.
    #[must_use]
    pub fn unknown_node(study: &str, pipeline: &str, node: &str) -> Self {
        Self::coded(
            study,
            Some(pipeline),
            codes::UNKNOWN_NODE,
            format!("Pipeline '{pipeline}' of study '{study}' has no node '{node}'"),
            vec![node.to_string()],
        )
    }

    /// A reference to an unknown port or an undeclared spec.
    #[must_use]
    pub fn unknown_port(study: &str, pipeline: &str, owner: &str, port: &str) -> Self {
        Self::coded(
            study,
            Some(pipeline),
            codes::UNKNOWN_PORT,
            format!("Pipeline '{pipeline}' of study '{study}': '{owner}' has no port '{port}'"),
            vec![format!("{owner}.{port}")],
        )
    }

    /// A duplicated node, declaration or port source.
    #[must_use]
    pub fn duplicate(study: &str, pipeline: &str, what: &str, name: &str) -> Self {
        Self::coded(
            study,
            Some(pipeline),
            codes::DUPLICATE_WIRING,
            format!("Pipeline '{pipeline}' of study '{study}' has duplicate {what} '{name}'"),
            vec![name.to_string()],
        )
    }

    /// A dependency cycle between nodes or pipelines.
    #[must_use]
    pub fn cycle(study: &str, pipeline: Option<&str>, path: Vec<String>) -> Self {
        Self::coded(
            study,
            pipeline,
            codes::CYCLE,
            format!("Dependency cycle in study '{study}': {}", path.join(" -> ")),
            path,
        )
    }

    /// A translated spec with a different kind in the containing study.
    #[must_use]
    pub fn kind_mismatch(
        study: &str,
        pipeline: &str,
        spec: &str,
        expected: impl fmt::Display,
        found: impl fmt::Display,
    ) -> Self {
        Self::coded(
            study,
            Some(pipeline),
            codes::KIND_MISMATCH,
            format!(
                "Pipeline '{pipeline}' binds '{spec}' as {found}, but study '{study}' \
                 declares it as {expected}"
            ),
            vec![spec.to_string()],
        )
    }

    /// A producer that does not declare the output attributed to it.
    #[must_use]
    pub fn missing_output(study: &str, pipeline: &str, spec: &str) -> Self {
        Self::coded(
            study,
            Some(pipeline),
            codes::MISSING_OUTPUT,
            format!(
                "Study '{study}' attributes '{spec}' to pipeline '{pipeline}', \
                 which does not declare it as an output"
            ),
            vec![spec.to_string()],
        )
    }
}

/// Errors related to external tool invocation.
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    /// The tool process could not be started.
    #[error("Failed to start tool '{tool}': {reason}")]
    Spawn {
        /// The tool identifier.
        tool: String,
        /// The reason for the failure.
        reason: String,
    },

    /// The tool exited with a non-zero status.
    #[error("Tool '{tool}' exited with status {}: {stderr}", .code.map_or_else(|| "signal".to_string(), |c| c.to_string()))]
    NonZeroExit {
        /// The tool identifier.
        tool: String,
        /// The exit code, `None` if terminated by a signal.
        code: Option<i32>,
        /// Captured standard error.
        stderr: String,
    },

    /// A declared output file was not produced.
    #[error("Tool '{tool}' did not produce output '{port}' at {path}")]
    MissingOutput {
        /// The tool identifier.
        tool: String,
        /// The output port.
        port: String,
        /// The expected path.
        path: String,
    },

    /// The tool cannot be run by this runner.
    #[error("Tool '{tool}' is not supported: {reason}")]
    Unsupported {
        /// The tool identifier.
        tool: String,
        /// The reason.
        reason: String,
    },

    /// A mandatory port has no value.
    #[error("Tool '{tool}' is missing a value for port '{port}'")]
    MissingArgument {
        /// The tool identifier.
        tool: String,
        /// The port without a value.
        port: String,
    },
}

impl ToolError {
    /// Creates a spawn error.
    #[must_use]
    pub fn spawn(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Spawn {
            tool: tool.into(),
            reason: reason.into(),
        }
    }

    /// Creates an unsupported tool error.
    #[must_use]
    pub fn unsupported(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unsupported {
            tool: tool.into(),
            reason: reason.into(),
        }
    }

    /// Creates a missing argument error.
    #[must_use]
    pub fn missing_argument(tool: impl Into<String>, port: impl Into<String>) -> Self {
        Self::MissingArgument {
            tool: tool.into(),
            port: port.into(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A required environment variable or setting is not set.
    #[error("Required setting '{name}' is not set")]
    Missing {
        /// The setting or variable name.
        name: String,
    },

    /// A setting has an unparseable value.
    #[error("Invalid value '{value}' for setting '{name}'")]
    InvalidValue {
        /// The setting name.
        name: String,
        /// The rejected value.
        value: String,
    },

    /// A composition was given too few scans to do anything with.
    #[error("Study '{study}' needs at least one scan besides the reference")]
    InsufficientScans {
        /// The study being created.
        study: String,
    },

    /// The requested reference atlas image does not exist.
    #[error("{atlas} {image} is not available at {resolution} resolution")]
    UnavailableAtlas {
        /// The atlas.
        atlas: String,
        /// The image type.
        image: String,
        /// The resolution.
        resolution: String,
    },
}
