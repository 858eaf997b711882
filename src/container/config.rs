//! Container specification builder.
//!
//! Provides a fluent API for describing the container an execution runs in.

use crate::container::{ContainerError, Result};
use bollard::service::{HostConfig, Mount, MountTypeEnum};
use std::collections::HashMap;

/// Container specification builder.
///
/// Defaults are conservative: no privileges, no auto-removal (the lifecycle
/// controller removes containers itself) and the runtime's default network.
#[derive(Debug, Default)]
pub struct ContainerSpecBuilder {
    image: Option<String>,
    cmd: Vec<String>,
    working_dir: Option<String>,
    labels: HashMap<String, String>,
    mounts: Vec<Mount>,
    network_mode: Option<String>,
    user: Option<String>,
}

impl ContainerSpecBuilder {
    /// Create a new container specification builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the container image.
    pub fn image<S: Into<String>>(mut self, image: S) -> Self {
        self.image = Some(image.into());
        self
    }

    /// Set the command to run in the container.
    pub fn cmd<I, S>(mut self, cmd: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cmd = cmd.into_iter().map(|s| s.into()).collect();
        self
    }

    /// Set the working directory in the container.
    pub fn working_dir<S: Into<String>>(mut self, dir: S) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Add a label to the container.
    pub fn label<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Add a bind mount from a host path to a container path.
    pub fn mount<S: Into<String>, T: Into<String>>(
        mut self,
        source: S,
        target: T,
        read_only: bool,
    ) -> Self {
        self.mounts.push(Mount {
            target: Some(target.into()),
            source: Some(source.into()),
            typ: Some(MountTypeEnum::BIND),
            read_only: Some(read_only),
            ..Default::default()
        });
        self
    }

    /// Set network mode (e.g., "bridge", "none").
    pub fn network_mode<S: Into<String>>(mut self, mode: S) -> Self {
        self.network_mode = Some(mode.into());
        self
    }

    /// Set user to run as in the container.
    pub fn user<S: Into<String>>(mut self, user: S) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Build the container specification.
    ///
    /// # Errors
    ///
    /// Returns error if the image or command is missing, or a mount has a
    /// relative source path.
    pub fn build(self) -> Result<ContainerSpec> {
        let image = self
            .image
            .filter(|image| !image.is_empty())
            .ok_or_else(|| ContainerError::ConfigError("Image is required".to_string()))?;

        if self.cmd.is_empty() {
            return Err(ContainerError::ConfigError(
                "Command is required".to_string(),
            ));
        }

        for mount in &self.mounts {
            let source = mount.source.as_deref().unwrap_or_default();
            if !std::path::Path::new(source).is_absolute() {
                return Err(ContainerError::ConfigError(format!(
                    "Bind mount source must be an absolute path: {:?}",
                    source
                )));
            }
        }

        let host_config = HostConfig {
            mounts: if self.mounts.is_empty() {
                None
            } else {
                Some(self.mounts)
            },
            network_mode: self.network_mode,
            auto_remove: Some(false),
            privileged: Some(false),
            ..Default::default()
        };

        Ok(ContainerSpec {
            image,
            cmd: self.cmd,
            working_dir: self.working_dir,
            labels: self.labels,
            user: self.user,
            host_config,
        })
    }
}

/// Everything needed to create one execution container.
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    /// Image name
    pub image: String,
    /// Command to run
    pub cmd: Vec<String>,
    /// Working directory
    pub working_dir: Option<String>,
    /// Labels
    pub labels: HashMap<String, String>,
    /// User
    pub user: Option<String>,
    /// Host configuration
    pub host_config: HostConfig,
}

impl ContainerSpec {
    /// Create a new specification builder.
    pub fn builder() -> ContainerSpecBuilder {
        ContainerSpecBuilder::new()
    }

    /// Bind mounts as `(source, target)` pairs.
    pub fn bind_mounts(&self) -> Vec<(&str, &str)> {
        self.host_config
            .mounts
            .iter()
            .flatten()
            .filter_map(|m| Some((m.source.as_deref()?, m.target.as_deref()?)))
            .collect()
    }

    /// Convert into the bollard container creation body.
    pub fn to_bollard(&self) -> bollard::container::Config<String> {
        bollard::container::Config {
            image: Some(self.image.clone()),
            cmd: Some(self.cmd.clone()),
            working_dir: self.working_dir.clone(),
            labels: if self.labels.is_empty() {
                None
            } else {
                Some(self.labels.clone())
            },
            user: self.user.clone(),
            tty: Some(false),
            attach_stdin: Some(false),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            host_config: Some(self.host_config.clone()),
            ..Default::default()
        }
    }
}
