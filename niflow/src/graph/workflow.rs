//! The validated workflow graph handed to an execution engine.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::errors::NiflowError;
use crate::pipeline::{Pipeline, ToolNode};
use crate::spec::{DataKind, PipelineName};
use crate::study::InputMatch;

/// Where the data on an edge comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "name", rename_all = "snake_case")]
pub enum EdgeSource {
    /// A provided study input.
    StudyInput,
    /// The producing pipeline.
    Pipeline(PipelineName),
}

/// A typed data dependency between two pipelines, or between a provided
/// input and a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataEdge {
    /// The source.
    pub from: EdgeSource,
    /// The consuming pipeline.
    pub to: PipelineName,
    /// The spec flowing along the edge.
    pub spec: String,
    /// Its kind.
    pub kind: DataKind,
}

/// Pipelines in topological order together with their data edges.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowGraph {
    pub(crate) build_id: Uuid,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) study: String,
    pub(crate) targets: Vec<String>,
    pub(crate) pipelines: Vec<Pipeline>,
    pub(crate) edges: Vec<DataEdge>,
    pub(crate) inputs: Vec<InputMatch>,
}

#[derive(Serialize)]
struct Structure<'a> {
    study: &'a str,
    targets: &'a [String],
    pipelines: &'a [Pipeline],
    edges: &'a [DataEdge],
    inputs: &'a [InputMatch],
}

impl WorkflowGraph {
    pub(crate) fn new(
        study: impl Into<String>,
        targets: Vec<String>,
        pipelines: Vec<Pipeline>,
        edges: Vec<DataEdge>,
        inputs: Vec<InputMatch>,
    ) -> Self {
        Self {
            build_id: Uuid::new_v4(),
            created_at: Utc::now(),
            study: study.into(),
            targets,
            pipelines,
            edges,
            inputs,
        }
    }

    /// Returns the unique id of this graph build.
    #[must_use]
    pub const fn build_id(&self) -> Uuid {
        self.build_id
    }

    /// Returns when the graph was resolved.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the study instance name.
    #[must_use]
    pub fn study(&self) -> &str {
        &self.study
    }

    /// Returns the requested targets.
    #[must_use]
    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    /// Returns the pipelines in execution order: every pipeline comes
    /// after the pipelines it consumes from.
    #[must_use]
    pub fn pipelines(&self) -> &[Pipeline] {
        &self.pipelines
    }

    /// Returns the pipeline names in execution order.
    #[must_use]
    pub fn execution_order(&self) -> Vec<&str> {
        self.pipelines.iter().map(|p| p.name().as_str()).collect()
    }

    /// Looks up a pipeline.
    #[must_use]
    pub fn pipeline(&self, name: &str) -> Option<&Pipeline> {
        self.pipelines.iter().find(|p| p.name() == name)
    }

    /// Returns the data edges.
    #[must_use]
    pub fn edges(&self) -> &[DataEdge] {
        &self.edges
    }

    /// Returns the provided inputs the graph consumes.
    #[must_use]
    pub fn inputs(&self) -> &[InputMatch] {
        &self.inputs
    }

    /// Returns the pipelines `name` directly consumes from.
    #[must_use]
    pub fn dependencies_of(&self, name: &str) -> Vec<&PipelineName> {
        let mut deps: Vec<&PipelineName> = Vec::new();
        for edge in self.edges.iter().filter(|e| e.to == *name) {
            if let EdgeSource::Pipeline(from) = &edge.from {
                if !deps.contains(&from) {
                    deps.push(from);
                }
            }
        }
        deps
    }

    /// Iterates over every tool node with its pipeline, in execution order.
    pub fn tool_nodes(&self) -> impl Iterator<Item = (&Pipeline, &ToolNode)> {
        self.pipelines
            .iter()
            .flat_map(|p| p.nodes().iter().map(move |n| (p, n)))
    }

    /// Serializes the graph as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, NiflowError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Returns a SHA-256 digest of the graph structure.
    ///
    /// The build id and timestamp are excluded, so two resolutions of the
    /// same targets in the same study yield the same fingerprint.
    pub fn fingerprint(&self) -> Result<String, NiflowError> {
        let structure = Structure {
            study: &self.study,
            targets: &self.targets,
            pipelines: &self.pipelines,
            edges: &self.edges,
            inputs: &self.inputs,
        };
        let json = serde_json::to_string(&structure)?;
        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        Ok(hex::encode(hasher.finalize()))
    }
}
