//! # Niflow
//!
//! Declarative composition of neuroimaging processing pipelines.
//!
//! Niflow describes analyses as studies:
//!
//! - **Specs**: named datasets, fields and options, each dataset or field
//!   attributed to the pipeline that produces it
//! - **Study composition**: definitions extend base studies and embed
//!   sub-studies under explicit name maps, composed once into immutable
//!   registries
//! - **Pipelines**: tool nodes wired to study specs, checked against the
//!   registry when built
//! - **Workflow graphs**: requested outputs resolved back through their
//!   producers to the provided scans
//! - **Engines**: graphs handed to a workflow engine; a dry-run engine is
//!   included
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use niflow::prelude::*;
//!
//! let catalog = StudyCatalog::new(NiflowConfig::from_env()?);
//! let study = Study::builder(catalog.t1()?, "subject_01")
//!     .input(InputMatch::dataset("primary", "t1_mprage", FileFormat::Dicom))
//!     .option("bet_frac", 0.4)
//!     .build()?;
//!
//! let graph = study.workflow(&["wm_seg"])?;
//! let report = DryRunEngine::from_config(catalog.config()).submit(&graph).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod errors;
pub mod formats;
pub mod graph;
pub mod observability;
pub mod pipeline;
pub mod spec;
pub mod study;
pub mod testing;

#[cfg(feature = "catalog")]
pub mod studies;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::NiflowConfig;
    pub use crate::engine::{
        DryRunEngine, EngineReport, NodeStatus, ProcessToolRunner, ToolInvocation, ToolRunner,
        WorkflowEngine,
    };
    pub use crate::errors::{
        ConfigError, NameNotFoundError, NiflowError, SpecNotFoundError, SpecificationError,
        ToolError, WiringError,
    };
    pub use crate::formats::{FileFormat, ScalarType};
    pub use crate::graph::WorkflowGraph;
    pub use crate::observability::{init_tracing, LoggingConfig};
    pub use crate::pipeline::{
        citation, Arg, Pipeline, PipelineBuilder, PipelineContext, ToolInterface, ToolNode,
    };
    pub use crate::spec::{DataKind, DataSpec, OptionSet, OptionSpec, OptionValue, PipelineName};
    pub use crate::study::{InputMatch, Study, StudyBuilder, StudyDefinition, SubStudySpec};

    #[cfg(feature = "catalog")]
    pub use crate::studies::{MotionDetectionScans, ReferenceType, StudyCatalog};
}

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_prelude_builds_a_study() {
        let definition = StudyDefinition::builder("minimal")
            .data(DataSpec::dataset("primary", FileFormat::Dicom))
            .build()
            .unwrap();
        let study = Study::builder(definition, "subject")
            .input(InputMatch::dataset("primary", "scan", FileFormat::Dicom))
            .build()
            .unwrap();
        assert!(study.is_provided("primary"));
    }
}
