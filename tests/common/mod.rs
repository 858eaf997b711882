//! Shared helpers for integration tests.
//!
//! [`FakeRuntime`] stands in for Docker: it reads the staged program through
//! the bind mount at create time and plays back scripted output.

#![allow(dead_code)]

use async_trait::async_trait;
use sandpit::container::{ContainerError, ContainerRuntime, ContainerSpec};
use sandpit::executor::{Executor, SandboxConfig};
use sandpit::stream::{self, StreamType};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;
use tokio::sync::Barrier;

/// Runtime operation a [`FakeRuntime`] can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Create,
    Start,
    Wait,
    Logs,
}

/// What a fake container "prints".
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: i64,
    /// Never exit on its own
    pub hang: bool,
    /// Write the staged program back on stdout
    pub echo_source: bool,
    /// Return these bytes from `logs` instead of framing stdout/stderr
    pub raw_logs: Option<Vec<u8>>,
    pub fail_at: Option<Stage>,
}

impl Script {
    pub fn stdout(text: &str) -> Self {
        Self {
            stdout: text.as_bytes().to_vec(),
            ..Default::default()
        }
    }

    pub fn output(stdout: &str, stderr: &str, exit_code: i64) -> Self {
        Self {
            stdout: stdout.as_bytes().to_vec(),
            stderr: stderr.as_bytes().to_vec(),
            exit_code,
            ..Default::default()
        }
    }

    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Default::default()
        }
    }

    pub fn echo() -> Self {
        Self {
            echo_source: true,
            ..Default::default()
        }
    }

    pub fn failing_at(stage: Stage) -> Self {
        Self {
            fail_at: Some(stage),
            ..Default::default()
        }
    }
}

#[derive(Debug, Default)]
struct Container {
    source: String,
    killed: bool,
}

/// In-memory [`ContainerRuntime`].
pub struct FakeRuntime {
    script: Script,
    next_id: AtomicUsize,
    live: Mutex<HashMap<String, Container>>,
    sources: Mutex<Vec<String>>,
    mounts: Mutex<Vec<String>>,
    kills: AtomicUsize,
    peak_live: AtomicUsize,
    /// Holds every `wait` until this many containers are waiting
    gate: Option<Barrier>,
}

impl FakeRuntime {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self::build(script, None))
    }

    /// A runtime whose containers only exit once `parties` of them are
    /// running at the same time.
    pub fn gated(script: Script, parties: usize) -> Arc<Self> {
        Arc::new(Self::build(script, Some(Barrier::new(parties))))
    }

    fn build(script: Script, gate: Option<Barrier>) -> Self {
        Self {
            script,
            next_id: AtomicUsize::new(0),
            live: Mutex::new(HashMap::new()),
            sources: Mutex::new(Vec::new()),
            mounts: Mutex::new(Vec::new()),
            kills: AtomicUsize::new(0),
            peak_live: AtomicUsize::new(0),
            gate,
        }
    }

    /// Most containers alive at once
    pub fn peak_live(&self) -> usize {
        self.peak_live.load(Ordering::SeqCst)
    }

    /// Host directory of every bind mount seen at create time
    pub fn mount_sources(&self) -> Vec<String> {
        self.mounts.lock().unwrap().clone()
    }

    /// Containers created and not yet removed
    pub fn live_count(&self) -> usize {
        self.live.lock().unwrap().len()
    }

    /// Every program text seen at create time
    pub fn sources(&self) -> Vec<String> {
        self.sources.lock().unwrap().clone()
    }

    pub fn kill_count(&self) -> usize {
        self.kills.load(Ordering::SeqCst)
    }

    fn fail(&self, stage: Stage) -> Result<(), ContainerError> {
        if self.script.fail_at == Some(stage) {
            return Err(ContainerError::Other(format!("{:?} refused", stage)));
        }
        Ok(())
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn create(&self, _name: &str, spec: &ContainerSpec) -> Result<String, ContainerError> {
        self.fail(Stage::Create)?;

        let (source_dir, _) = spec
            .bind_mounts()
            .first()
            .copied()
            .ok_or_else(|| ContainerError::ConfigError("no bind mount".to_string()))?;
        let entry = spec
            .cmd
            .last()
            .ok_or_else(|| ContainerError::ConfigError("no command".to_string()))?;
        let source = std::fs::read_to_string(PathBuf::from(source_dir).join(entry))
            .map_err(|e| ContainerError::Other(e.to_string()))?;

        self.sources.lock().unwrap().push(source.clone());
        self.mounts.lock().unwrap().push(source_dir.to_string());

        let id = format!("fake{:060}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let mut live = self.live.lock().unwrap();
        live.insert(
            id.clone(),
            Container {
                source,
                killed: false,
            },
        );
        self.peak_live.fetch_max(live.len(), Ordering::SeqCst);
        Ok(id)
    }

    async fn start(&self, _id: &str) -> Result<(), ContainerError> {
        self.fail(Stage::Start)
    }

    async fn wait(&self, _id: &str) -> Result<i64, ContainerError> {
        self.fail(Stage::Wait)?;
        if let Some(gate) = &self.gate {
            gate.wait().await;
        }
        if self.script.hang {
            std::future::pending::<()>().await;
        }
        Ok(self.script.exit_code)
    }

    async fn logs(&self, id: &str) -> Result<Vec<u8>, ContainerError> {
        self.fail(Stage::Logs)?;
        if let Some(raw) = &self.script.raw_logs {
            return Ok(raw.clone());
        }

        let source = self
            .live
            .lock()
            .unwrap()
            .get(id)
            .map(|c| c.source.clone())
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))?;

        let mut raw = Vec::new();
        if self.script.echo_source {
            stream::encode_frame(StreamType::Stdout, source.as_bytes(), &mut raw);
        }
        stream::encode_frame(StreamType::Stdout, &self.script.stdout, &mut raw);
        stream::encode_frame(StreamType::Stderr, &self.script.stderr, &mut raw);
        Ok(raw)
    }

    async fn kill(&self, id: &str) -> Result<(), ContainerError> {
        self.kills.fetch_add(1, Ordering::SeqCst);
        match self.live.lock().unwrap().get_mut(id) {
            Some(container) => {
                container.killed = true;
                Ok(())
            }
            None => Err(ContainerError::NotFound(id.to_string())),
        }
    }

    async fn remove(&self, id: &str) -> Result<(), ContainerError> {
        match self.live.lock().unwrap().remove(id) {
            Some(_) => Ok(()),
            None => Err(ContainerError::NotFound(id.to_string())),
        }
    }

    async fn list_managed(&self) -> Result<Vec<String>, ContainerError> {
        Ok(self.live.lock().unwrap().keys().cloned().collect())
    }
}

/// Executor over `runtime` staging workspaces under a fresh temp dir.
pub fn executor(runtime: Arc<FakeRuntime>, timeout_secs: u64) -> (Executor, TempDir) {
    let root = TempDir::new().unwrap();
    let config = SandboxConfig {
        timeout_secs,
        ..SandboxConfig::default()
    }
    .with_workspace_root(root.path());
    (Executor::new(runtime, config), root)
}

/// Number of entries left under a workspace root.
pub fn leftover_workspaces(root: &TempDir) -> usize {
    std::fs::read_dir(root.path()).unwrap().count()
}
