//! Sandbox configuration.
//!
//! Describes the interpreter image and how submitted programs are run in it.

use crate::env::sandbox;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// How executions are run inside the container runtime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SandboxConfig {
    /// Interpreter image (default: "python")
    #[serde(default = "default_image")]
    pub image: String,

    /// Interpreter binary; the command is `[interpreter, entry_file]`
    #[serde(default = "default_interpreter")]
    pub interpreter: String,

    /// Working directory in the container; the workspace is mounted here
    #[serde(default = "default_working_dir")]
    pub working_dir: String,

    /// File name the submitted source is staged as
    #[serde(default = "default_entry_file")]
    pub entry_file: String,

    /// Execution time limit in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Host directory for staged workspaces (default: system temp dir)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<PathBuf>,

    /// Container name prefix
    #[serde(default = "default_name_prefix")]
    pub name_prefix: String,

    /// Pull the image when it is missing locally
    #[serde(default)]
    pub auto_pull: bool,

    /// Container network mode, e.g. "none" (default: runtime default)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_mode: Option<String>,

    /// User to run the program as (default: image default)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Engine socket URI (default: local defaults, then Podman sockets)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_socket: Option<String>,
}

fn default_image() -> String {
    sandbox::DEFAULT_IMAGE.to_string()
}

fn default_interpreter() -> String {
    sandbox::DEFAULT_INTERPRETER.to_string()
}

fn default_working_dir() -> String {
    sandbox::DEFAULT_WORKING_DIR.to_string()
}

fn default_entry_file() -> String {
    sandbox::DEFAULT_ENTRY_FILE.to_string()
}

fn default_timeout_secs() -> u64 {
    sandbox::DEFAULT_TIMEOUT_SECS
}

fn default_name_prefix() -> String {
    sandbox::DEFAULT_NAME_PREFIX.to_string()
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            image: default_image(),
            interpreter: default_interpreter(),
            working_dir: default_working_dir(),
            entry_file: default_entry_file(),
            timeout_secs: default_timeout_secs(),
            workspace_root: None,
            name_prefix: default_name_prefix(),
            auto_pull: false,
            network_mode: None,
            user: None,
            runtime_socket: None,
        }
    }
}

impl SandboxConfig {
    /// Create a configuration for the specified image
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            ..Default::default()
        }
    }

    /// Set the interpreter binary
    pub fn with_interpreter(mut self, interpreter: impl Into<String>) -> Self {
        self.interpreter = interpreter.into();
        self
    }

    /// Set the execution time limit
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs().max(1);
        self
    }

    /// Stage workspaces under `root`
    pub fn with_workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = Some(root.into());
        self
    }

    /// Execution time limit
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Check the configuration for values that cannot work.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.image.trim().is_empty() {
            return Err("sandbox.image must not be empty".to_string());
        }
        if self.interpreter.trim().is_empty() {
            return Err("sandbox.interpreter must not be empty".to_string());
        }
        if !self.working_dir.starts_with('/') {
            return Err(format!(
                "sandbox.working_dir must be an absolute container path, got {:?}",
                self.working_dir
            ));
        }
        if self.entry_file.is_empty()
            || self.entry_file.contains(['/', '\\'])
            || self.entry_file == "."
            || self.entry_file == ".."
        {
            return Err(format!(
                "sandbox.entry_file must be a plain file name, got {:?}",
                self.entry_file
            ));
        }
        if self.timeout_secs == 0 {
            return Err("sandbox.timeout_secs must be greater than zero".to_string());
        }
        if self.name_prefix.is_empty() {
            return Err("sandbox.name_prefix must not be empty".to_string());
        }
        Ok(())
    }
}
