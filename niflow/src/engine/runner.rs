use async_trait::async_trait;
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::process::Command;

use super::invocation::ToolInvocation;
use crate::config::{NiflowConfig, FSL_DIR_VAR};
use crate::errors::ToolError;

/// The result of a successful tool run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolRun {
    /// The command line that was run.
    pub argv: Vec<String>,
    /// Captured standard output.
    pub stdout: String,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

/// Runs external tools.
#[async_trait]
pub trait ToolRunner: Send + Sync + Debug {
    /// Returns the runner name.
    fn name(&self) -> &str;

    /// Runs one tool invocation to completion.
    async fn run(&self, invocation: &ToolInvocation) -> Result<ToolRun, ToolError>;
}

/// Runs command tools as child processes.
///
/// Relative output paths are checked against the working directory once
/// the process exits successfully.
#[derive(Debug, Clone, Default)]
pub struct ProcessToolRunner {
    working_dir: Option<PathBuf>,
    env: IndexMap<String, String>,
}

impl ProcessToolRunner {
    /// Creates a runner using the current directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a runner working in the configured scratch directory, with
    /// `FSLDIR` exported when an FSL installation is configured.
    #[must_use]
    pub fn from_config(config: &NiflowConfig) -> Self {
        let runner = Self::new().with_working_dir(config.work_dir.clone());
        match &config.fsl_dir {
            Some(dir) => runner.with_env(FSL_DIR_VAR, dir.display().to_string()),
            None => runner,
        }
    }

    /// Runs tools in `dir`.
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Sets an environment variable for every tool.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        match &self.working_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }
}

#[async_trait]
impl ToolRunner for ProcessToolRunner {
    fn name(&self) -> &str {
        "process"
    }

    async fn run(&self, invocation: &ToolInvocation) -> Result<ToolRun, ToolError> {
        let tool = invocation.interface().id().to_string();
        let argv = invocation.argv()?;
        let Some((program, args)) = argv.split_first() else {
            return Err(ToolError::unsupported(&tool, "empty command line"));
        };

        let mut command = Command::new(program);
        command.args(args).envs(&self.env);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        tracing::debug!(tool = %tool, argv = ?argv, "running tool");
        let started = Instant::now();
        let output = command
            .output()
            .await
            .map_err(|err| ToolError::spawn(&tool, err.to_string()))?;
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::error!(
                tool = %tool,
                code = ?output.status.code(),
                stderr = %stderr,
                "tool failed"
            );
            return Err(ToolError::NonZeroExit {
                tool,
                code: output.status.code(),
                stderr,
            });
        }

        for (port, path) in invocation.outputs() {
            if tokio::fs::metadata(self.resolve(path)).await.is_err() {
                tracing::error!(tool = %tool, port = %port, path = %path, "tool output missing");
                return Err(ToolError::MissingOutput {
                    tool,
                    port: port.clone(),
                    path: path.clone(),
                });
            }
        }

        tracing::info!(tool = %tool, duration_ms, "tool finished");
        Ok(ToolRun {
            argv,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            duration_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{Arg, ToolInterface};
    use pretty_assertions::assert_eq;

    fn touch() -> ToolInterface {
        ToolInterface::command("touch", "touch")
            .output("out_file")
            .arg(Arg::output("out_file"))
    }

    #[tokio::test]
    async fn test_runs_command_and_checks_output() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ProcessToolRunner::new().with_working_dir(dir.path());
        let invocation = ToolInvocation::new(touch()).output("out_file", "brain.nii.gz");

        let run = runner.run(&invocation).await.unwrap();
        assert_eq!(run.argv, vec!["touch", "brain.nii.gz"]);
        assert!(dir.path().join("brain.nii.gz").exists());
    }

    #[tokio::test]
    async fn test_config_work_dir_used_for_tools() {
        let dir = tempfile::tempdir().unwrap();
        let config = NiflowConfig {
            work_dir: dir.path().to_path_buf(),
            fsl_dir: Some("/opt/fsl".into()),
            ..NiflowConfig::default()
        };
        let runner = ProcessToolRunner::from_config(&config);
        assert_eq!(runner.resolve("brain.nii.gz"), dir.path().join("brain.nii.gz"));
        assert_eq!(runner.resolve("/abs/brain.nii.gz"), PathBuf::from("/abs/brain.nii.gz"));

        let invocation = ToolInvocation::new(touch()).output("out_file", "brain.nii.gz");
        runner.run(&invocation).await.unwrap();
        assert!(dir.path().join("brain.nii.gz").exists());

        let interface = ToolInterface::command("env", "sh")
            .arg(Arg::literal("-c"))
            .arg(Arg::literal("printf %s \"$FSLDIR\""));
        let run = runner.run(&ToolInvocation::new(interface)).await.unwrap();
        assert_eq!(run.stdout, "/opt/fsl");
    }

    #[tokio::test]
    async fn test_missing_output_reported() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ProcessToolRunner::new().with_working_dir(dir.path());
        let interface = ToolInterface::command("noop", "true")
            .output("out_file")
            .arg(Arg::output("out_file"));
        let invocation = ToolInvocation::new(interface).output("out_file", "never.nii.gz");

        let err = runner.run(&invocation).await.unwrap_err();
        assert!(matches!(err, ToolError::MissingOutput { ref port, .. } if port == "out_file"));
    }

    #[tokio::test]
    async fn test_non_zero_exit_reported() {
        let runner = ProcessToolRunner::new();
        let interface = ToolInterface::command("fail", "sh")
            .arg(Arg::literal("-c"))
            .arg(Arg::literal("echo broken >&2; exit 3"));

        let err = runner.run(&ToolInvocation::new(interface)).await.unwrap_err();
        match err {
            ToolError::NonZeroExit { code, stderr, .. } => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr, "broken");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_spawn_failure_reported() {
        let runner = ProcessToolRunner::new();
        let interface = ToolInterface::command("missing", "niflow-no-such-program");
        let err = runner.run(&ToolInvocation::new(interface)).await.unwrap_err();
        assert!(matches!(err, ToolError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_environment_passed_to_tool() {
        let runner = ProcessToolRunner::new().with_env("FSLOUTPUTTYPE", "NIFTI_GZ");
        let interface = ToolInterface::command("env", "sh")
            .arg(Arg::literal("-c"))
            .arg(Arg::literal("printf %s \"$FSLOUTPUTTYPE\""));
        let run = runner.run(&ToolInvocation::new(interface)).await.unwrap();
        assert_eq!(run.stdout, "NIFTI_GZ");
    }
}
