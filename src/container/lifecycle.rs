//! Per-execution container lifecycle.
//!
//! A [`ContainerRun`] owns exactly one container from creation to removal and
//! enforces the order of operations:
//!
//! ```text
//! Idle -> Created -> Started -> Running -> Exited | TimedOut | Failed -> Removed
//! ```
//!
//! Removal is allowed from every state and is idempotent. A run dropped
//! before removal schedules a forced removal on the current Tokio runtime.

use super::runtime::short_id;
use super::{ContainerError, ContainerRuntime, ContainerSpec};
use crate::executor::ExecutionError;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Where a [`ContainerRun`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Nothing exists in the runtime yet
    Idle,
    /// Container created, not started
    Created,
    /// Start accepted by the runtime
    Started,
    /// Waiting for the container to finish
    Running,
    /// Container finished with the given exit code
    Exited(i64),
    /// Time limit hit; the container was killed
    TimedOut,
    /// A runtime operation failed after creation
    Failed,
    /// Container deleted from the runtime
    Removed,
}

impl RunState {
    fn has_container(self) -> bool {
        !matches!(self, RunState::Idle | RunState::Removed)
    }
}

/// Lifecycle controller for one execution container.
pub struct ContainerRun {
    runtime: Arc<dyn ContainerRuntime>,
    name: String,
    id: Option<String>,
    state: RunState,
}

impl ContainerRun {
    /// Prepare a run that will create a container called `name`.
    pub fn new(runtime: Arc<dyn ContainerRuntime>, name: impl Into<String>) -> Self {
        Self {
            runtime,
            name: name.into(),
            id: None,
            state: RunState::Idle,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Container name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runtime-assigned container ID, once created.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn expect_state(&self, expected: RunState, action: &str) -> Result<&str, ExecutionError> {
        match (&self.id, self.state == expected) {
            (Some(id), true) => Ok(id.as_str()),
            _ => Err(ExecutionError::Runtime(format!(
                "cannot {} container {} in state {:?}",
                action, self.name, self.state
            ))),
        }
    }

    /// Materialize the container from `spec`.
    ///
    /// # Errors
    ///
    /// [`ExecutionError::RuntimeUnavailable`], [`ExecutionError::ImageNotFound`]
    /// or [`ExecutionError::CreateFailed`].
    pub async fn create(&mut self, spec: &ContainerSpec) -> Result<(), ExecutionError> {
        if self.state != RunState::Idle {
            return Err(ExecutionError::Runtime(format!(
                "container {} already created",
                self.name
            )));
        }

        let id = self
            .runtime
            .create(&self.name, spec)
            .await
            .map_err(|e| match e {
                ContainerError::ImageNotFound(image) => ExecutionError::ImageNotFound(image),
                ContainerError::Unavailable(msg) => ExecutionError::RuntimeUnavailable(msg),
                other => ExecutionError::CreateFailed(other.to_string()),
            })?;

        self.id = Some(id);
        self.state = RunState::Created;
        Ok(())
    }

    /// Start the created container.
    ///
    /// # Errors
    ///
    /// [`ExecutionError::StartFailed`], or [`ExecutionError::RuntimeUnavailable`]
    /// if the engine went away.
    pub async fn start(&mut self) -> Result<(), ExecutionError> {
        let id = self.expect_state(RunState::Created, "start")?.to_string();

        if let Err(e) = self.runtime.start(&id).await {
            self.state = RunState::Failed;
            return Err(match e {
                ContainerError::Unavailable(msg) => ExecutionError::RuntimeUnavailable(msg),
                other => ExecutionError::StartFailed(other.to_string()),
            });
        }

        self.state = RunState::Started;
        Ok(())
    }

    /// Wait for the container to stop, at most `timeout`.
    ///
    /// Returns the exit code; non-zero codes are normal completions. When the
    /// time limit is hit the container is killed before returning.
    ///
    /// # Errors
    ///
    /// [`ExecutionError::TimedOut`] or [`ExecutionError::Runtime`].
    pub async fn await_completion(&mut self, timeout: Duration) -> Result<i64, ExecutionError> {
        let id = self.expect_state(RunState::Started, "wait for")?.to_string();
        self.state = RunState::Running;

        match tokio::time::timeout(timeout, self.runtime.wait(&id)).await {
            Ok(Ok(code)) => {
                debug!("Container {} exited with code {}", short_id(&id), code);
                self.state = RunState::Exited(code);
                Ok(code)
            }
            Ok(Err(e)) => {
                self.state = RunState::Failed;
                Err(ExecutionError::Runtime(format!(
                    "waiting for container {} failed: {}",
                    short_id(&id),
                    e
                )))
            }
            Err(_) => {
                warn!(
                    "Container {} exceeded {:?}, killing it",
                    short_id(&id),
                    timeout
                );
                self.state = RunState::TimedOut;
                if let Err(e) = self.runtime.kill(&id).await {
                    // Forced removal during cleanup still takes it down.
                    warn!("Failed to kill container {}: {}", short_id(&id), e);
                }
                Err(ExecutionError::TimedOut(timeout))
            }
        }
    }

    /// Fetch the container's captured output as a raw framed stream.
    ///
    /// # Errors
    ///
    /// [`ExecutionError::Runtime`] if the container has not finished or the
    /// runtime fails to deliver the logs.
    pub async fn fetch_logs(&mut self) -> Result<Vec<u8>, ExecutionError> {
        let id = match (&self.id, self.state) {
            (Some(id), RunState::Exited(_) | RunState::TimedOut) => id.clone(),
            _ => {
                return Err(ExecutionError::Runtime(format!(
                    "cannot fetch logs of container {} in state {:?}",
                    self.name, self.state
                )));
            }
        };

        self.runtime.logs(&id).await.map_err(|e| {
            ExecutionError::Runtime(format!(
                "fetching logs of container {} failed: {}",
                short_id(&id),
                e
            ))
        })
    }

    /// Delete the container. Safe to call in any state and more than once.
    ///
    /// # Errors
    ///
    /// Returns the runtime error if removal failed; the run keeps its handle so
    /// the drop guard retries.
    pub async fn remove(&mut self) -> Result<(), ContainerError> {
        let Some(id) = self.id.clone() else {
            self.state = RunState::Removed;
            return Ok(());
        };
        if self.state == RunState::Removed {
            return Ok(());
        }

        match self.runtime.remove(&id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                debug!("Container {} already gone", short_id(&id));
            }
            Err(e) => return Err(e),
        }

        self.state = RunState::Removed;
        Ok(())
    }
}

impl Drop for ContainerRun {
    fn drop(&mut self) {
        if !self.state.has_container() {
            return;
        }
        let Some(id) = self.id.take() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!(
                    "Container {} dropped in state {:?}, scheduling removal",
                    short_id(&id),
                    self.state
                );
                let runtime = self.runtime.clone();
                handle.spawn(async move {
                    if let Err(e) = runtime.remove(&id).await {
                        if !e.is_not_found() {
                            warn!("Deferred removal of container {} failed: {}", short_id(&id), e);
                        }
                    }
                });
            }
            Err(_) => {
                warn!(
                    "Container {} leaked: no async runtime to remove it",
                    short_id(&id)
                );
            }
        }
    }
}
