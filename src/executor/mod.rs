//! # Sandboxed Execution
//!
//! Turns one submitted program into one completed, cleaned-up container run.
//!
//! ## Execution Flow
//!
//! ```text
//! source
//!   ↓
//! WorkspaceManager::stage()      unique temp dir + entry file
//!   ↓
//! ContainerSpec                  image, [interpreter, entry], bind mount
//!   ↓
//! ContainerRun                   create → start → await(timeout) → logs
//!   ↓
//! stream::demux()                stdout / stderr
//!   ↓
//! remove container, release workspace (always)
//!   ↓
//! ExecutionResult
//! ```
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use sandpit::container::{DockerRuntime, DockerRuntimeConfig};
//! use sandpit::executor::{Executor, SandboxConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = DockerRuntime::connect(DockerRuntimeConfig::default()).await?;
//!     let executor = Executor::new(Arc::new(runtime), SandboxConfig::default());
//!
//!     let result = executor.execute("print('hi')").await?;
//!     assert_eq!(result.message(), "hi\n");
//!     Ok(())
//! }
//! ```

/// Sandbox configuration.
///
/// Defines [`SandboxConfig`]: interpreter image, command, working directory
/// and time limit.
pub mod config;

pub use config::SandboxConfig;

use crate::container::{ContainerRun, ContainerRuntime, ContainerSpec};
use crate::env;
use crate::stream::{self, MalformedStreamError};
use crate::workspace::{Workspace, WorkspaceManager};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// A program submitted for execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// Program source text
    #[serde(rename = "code")]
    pub source: String,
}

impl ExecutionRequest {
    /// Wrap source text in a request
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }
}

/// Outcome of a completed execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Standard output of the program
    pub stdout: String,
    /// Standard error of the program
    pub stderr: String,
    /// Exit code reported by the runtime
    pub exit_code: i64,
    /// Wall time from staging to cleanup
    pub duration: Duration,
}

impl ExecutionResult {
    /// Build a result from raw sub-streams, dropping NUL padding.
    pub fn from_streams(stdout: &[u8], stderr: &[u8], exit_code: i64, duration: Duration) -> Self {
        Self {
            stdout: trim_padding(stdout),
            stderr: trim_padding(stderr),
            exit_code,
            duration,
        }
    }

    /// The single output text shown to callers: stderr if the program wrote
    /// any, otherwise stdout.
    pub fn message(&self) -> &str {
        if self.stderr.is_empty() {
            &self.stdout
        } else {
            &self.stderr
        }
    }

    /// Check if the program exited with code 0
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Decode output bytes as UTF-8 (lossily) without leading or trailing NULs.
fn trim_padding(bytes: &[u8]) -> String {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    let end = bytes.iter().rposition(|&b| b != 0).map_or(start, |i| i + 1);
    String::from_utf8_lossy(&bytes[start..end]).into_owned()
}

/// Errors that end an execution.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    /// Workspace could not be staged
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Container runtime endpoint cannot be reached
    #[error("Container runtime unavailable: {0}")]
    RuntimeUnavailable(String),

    /// Interpreter image is missing
    #[error("Image not found: {0}")]
    ImageNotFound(String),

    /// Runtime refused to create the container
    #[error("Container creation failed: {0}")]
    CreateFailed(String),

    /// Runtime refused to start the container
    #[error("Container start failed: {0}")]
    StartFailed(String),

    /// Program exceeded its time limit
    #[error("Execution timed out after {0:?}")]
    TimedOut(Duration),

    /// Runtime failed while the program was running or afterwards
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Captured output did not follow the log framing
    #[error("Malformed log stream: {0}")]
    MalformedStream(#[from] MalformedStreamError),
}

impl ExecutionError {
    /// Stable machine-readable error kind
    pub fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "IO_ERROR",
            Self::RuntimeUnavailable(_) => "RUNTIME_UNAVAILABLE",
            Self::ImageNotFound(_) => "IMAGE_NOT_FOUND",
            Self::CreateFailed(_) => "CREATE_FAILED",
            Self::StartFailed(_) => "START_FAILED",
            Self::TimedOut(_) => "TIMED_OUT",
            Self::Runtime(_) => "RUNTIME_ERROR",
            Self::MalformedStream(_) => "MALFORMED_STREAM",
        }
    }
}

/// Runs submitted programs in throwaway containers.
///
/// Cheap to share behind an `Arc`; concurrent calls use separate workspaces
/// and containers.
pub struct Executor {
    runtime: Arc<dyn ContainerRuntime>,
    workspaces: WorkspaceManager,
    config: SandboxConfig,
}

impl Executor {
    /// Create an executor over `runtime`.
    pub fn new(runtime: Arc<dyn ContainerRuntime>, config: SandboxConfig) -> Self {
        let workspaces = match &config.workspace_root {
            Some(root) => WorkspaceManager::with_root(root, &config.entry_file),
            None => WorkspaceManager::new(&config.entry_file),
        };

        Self {
            runtime,
            workspaces,
            config,
        }
    }

    /// Sandbox configuration in use
    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Execute a request with the configured time limit.
    ///
    /// # Errors
    ///
    /// See [`Executor::execute_with_timeout`].
    pub async fn run(&self, request: &ExecutionRequest) -> Result<ExecutionResult, ExecutionError> {
        self.execute(&request.source).await
    }

    /// Execute `source` with the configured time limit.
    ///
    /// # Errors
    ///
    /// See [`Executor::execute_with_timeout`].
    pub async fn execute(&self, source: &str) -> Result<ExecutionResult, ExecutionError> {
        self.execute_with_timeout(source, self.config.timeout()).await
    }

    /// Execute `source`, killing the program after `timeout`.
    ///
    /// The container and workspace are removed before this returns, whatever
    /// the outcome. Cleanup failures are logged and never replace the
    /// execution's own error.
    ///
    /// # Errors
    ///
    /// Returns the first [`ExecutionError`] hit by any stage.
    pub async fn execute_with_timeout(
        &self,
        source: &str,
        timeout: Duration,
    ) -> Result<ExecutionResult, ExecutionError> {
        let started = Instant::now();
        let workspace = self.workspaces.stage(source)?;

        let name = format!("{}-{}", self.config.name_prefix, uuid::Uuid::new_v4());
        let mut run = ContainerRun::new(self.runtime.clone(), name);

        let outcome = self.drive(&mut run, &workspace, timeout).await;

        if let Err(e) = run.remove().await {
            warn!("Failed to remove container {}: {}", run.name(), e);
        }
        let workspace_path = workspace.path().to_path_buf();
        if let Err(e) = workspace.release() {
            warn!(
                "Failed to release workspace {}: {}",
                workspace_path.display(),
                e
            );
        }

        let (exit_code, raw) = outcome?;
        let streams = stream::demux(&raw)?;
        let result = ExecutionResult::from_streams(
            &streams.stdout,
            &streams.stderr,
            exit_code,
            started.elapsed(),
        );

        info!(
            "Execution {} finished with exit code {} in {:?}",
            run.name(),
            result.exit_code,
            result.duration
        );
        Ok(result)
    }

    /// Happy path from container creation to captured logs.
    async fn drive(
        &self,
        run: &mut ContainerRun,
        workspace: &Workspace,
        timeout: Duration,
    ) -> Result<(i64, Vec<u8>), ExecutionError> {
        let spec = self.container_spec(workspace)?;
        debug!("Running {} with {:?}", run.name(), spec.cmd);

        run.create(&spec).await?;
        run.start().await?;
        let exit_code = run.await_completion(timeout).await?;
        let raw = run.fetch_logs().await?;
        Ok((exit_code, raw))
    }

    /// Container specification for a staged workspace.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError::CreateFailed`] if the configuration does not
    /// yield a valid specification.
    pub fn container_spec(&self, workspace: &Workspace) -> Result<ContainerSpec, ExecutionError> {
        let mut builder = ContainerSpec::builder()
            .image(&self.config.image)
            .cmd([self.config.interpreter.as_str(), workspace.entry_file()])
            .working_dir(&self.config.working_dir)
            .mount(
                workspace.path().to_string_lossy(),
                &self.config.working_dir,
                false,
            )
            .label(env::MANAGED_LABEL, "true");

        if let Some(mode) = &self.config.network_mode {
            builder = builder.network_mode(mode);
        }
        if let Some(user) = &self.config.user {
            builder = builder.user(user);
        }

        builder
            .build()
            .map_err(|e| ExecutionError::CreateFailed(e.to_string()))
    }
}
