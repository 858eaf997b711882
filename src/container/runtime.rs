//! Container runtime abstraction.
//!
//! [`ContainerRuntime`] is the seam between the lifecycle controller and the
//! container engine. [`DockerRuntime`] implements it over bollard.

use crate::container::{
    ContainerClient, ContainerClientConfig, ContainerError, ContainerSpec, Result,
};
use crate::env;
use crate::stream::{self, StreamType};
use async_trait::async_trait;
use bollard::container::LogOutput;
use futures::stream::StreamExt;
use std::collections::HashMap;
use tracing::{debug, info};

/// Operations the lifecycle controller needs from a container engine.
///
/// Implementations must support concurrent independent calls.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Create a container named `name` and return its ID.
    ///
    /// Returns [`ContainerError::ImageNotFound`] when the image is missing and
    /// [`ContainerError::Unavailable`] when the engine cannot be reached.
    async fn create(&self, name: &str, spec: &ContainerSpec) -> Result<String>;

    /// Start a created container.
    async fn start(&self, id: &str) -> Result<()>;

    /// Block until the container is no longer running and return its exit code.
    async fn wait(&self, id: &str) -> Result<i64>;

    /// Captured stdout/stderr in the multiplexed frame format of [`crate::stream`].
    async fn logs(&self, id: &str) -> Result<Vec<u8>>;

    /// Kill a running container.
    async fn kill(&self, id: &str) -> Result<()>;

    /// Force-remove a container and its anonymous volumes.
    ///
    /// Returns [`ContainerError::NotFound`] if the container does not exist.
    async fn remove(&self, id: &str) -> Result<()>;

    /// IDs of all containers (running or not) carrying the managed label.
    async fn list_managed(&self) -> Result<Vec<String>>;
}

/// Docker runtime configuration.
#[derive(Debug, Clone, Default)]
pub struct DockerRuntimeConfig {
    /// Pull the image on create when it is not present locally
    pub auto_pull: bool,
    /// Engine socket URI; fallbacks are tried when unset
    pub socket: Option<String>,
}

/// [`ContainerRuntime`] backed by a Docker or Podman daemon.
#[derive(Clone)]
pub struct DockerRuntime {
    client: ContainerClient,
    config: DockerRuntimeConfig,
}

impl DockerRuntime {
    /// Connect to the local Docker/Podman daemon.
    ///
    /// # Errors
    ///
    /// Returns error if connection to container runtime fails.
    pub async fn connect(config: DockerRuntimeConfig) -> Result<Self> {
        let client = ContainerClient::with_config(ContainerClientConfig {
            socket: config.socket.clone(),
            ..Default::default()
        })
        .await?;
        Ok(Self { client, config })
    }

    /// Create a runtime with an existing client.
    pub fn with_client(client: ContainerClient, config: DockerRuntimeConfig) -> Self {
        Self { client, config }
    }

    /// Get the underlying client.
    pub fn client(&self) -> &ContainerClient {
        &self.client
    }

    /// Make sure `image` is available locally, pulling it if allowed.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::ImageNotFound`] if the image is missing and
    /// cannot be pulled.
    pub async fn ensure_image(&self, image: &str) -> Result<()> {
        if self.client.image_exists(image).await? {
            debug!("Image {} already exists locally", image);
            return Ok(());
        }

        if !self.config.auto_pull {
            return Err(ContainerError::ImageNotFound(image.to_string()));
        }

        info!("Pulling image: {}", image);
        self.pull_image(image).await
    }

    /// Pull a container image from registry.
    ///
    /// # Errors
    ///
    /// Returns error if image pull fails.
    pub async fn pull_image(&self, image: &str) -> Result<()> {
        let mut stream = self.client.docker().create_image(
            Some(bollard::image::CreateImageOptions {
                from_image: image,
                ..Default::default()
            }),
            None,
            None,
        );

        while let Some(result) = stream.next().await {
            match result {
                Ok(info) => {
                    if let Some(status) = info.status {
                        debug!("Pull status: {}", status);
                    }
                }
                Err(bollard::errors::Error::DockerResponseServerError {
                    status_code: 404,
                    ..
                }) => {
                    return Err(ContainerError::ImageNotFound(image.to_string()));
                }
                Err(e) => {
                    return Err(ContainerError::from_api(e));
                }
            }
        }

        info!("Successfully pulled image: {}", image);
        Ok(())
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn create(&self, name: &str, spec: &ContainerSpec) -> Result<String> {
        self.ensure_image(&spec.image).await?;

        let options = bollard::container::CreateContainerOptions {
            name,
            ..Default::default()
        };

        debug!("Creating container: {}", name);

        let response = self
            .client
            .docker()
            .create_container(Some(options), spec.to_bollard())
            .await
            .map_err(|e| match e {
                bollard::errors::Error::DockerResponseServerError {
                    status_code: 404, ..
                } => ContainerError::ImageNotFound(spec.image.clone()),
                e => ContainerError::from_api(e),
            })?;

        info!("Created container: {} ({})", name, short_id(&response.id));

        Ok(response.id)
    }

    async fn start(&self, id: &str) -> Result<()> {
        debug!("Starting container: {}", short_id(id));

        self.client
            .docker()
            .start_container(id, None::<bollard::container::StartContainerOptions<String>>)
            .await
            .map_err(ContainerError::from_api)?;

        info!("Started container: {}", short_id(id));
        Ok(())
    }

    async fn wait(&self, id: &str) -> Result<i64> {
        let mut stream = self.client.docker().wait_container(
            id,
            Some(bollard::container::WaitContainerOptions {
                condition: "not-running",
            }),
        );

        match stream.next().await {
            Some(Ok(response)) => Ok(response.status_code),
            // bollard reports non-zero exit codes as errors
            Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => Ok(code),
            Some(Err(e)) => Err(ContainerError::from_api(e)),
            None => Err(ContainerError::Other(format!(
                "Wait stream for container {} closed without a status",
                short_id(id)
            ))),
        }
    }

    async fn logs(&self, id: &str) -> Result<Vec<u8>> {
        let mut stream = self.client.docker().logs(
            id,
            Some(bollard::container::LogsOptions::<String> {
                stdout: true,
                stderr: true,
                follow: false,
                ..Default::default()
            }),
        );

        // bollard already splits the daemon's frames; put them back together
        // so every consumer decodes the same wire format.
        let mut raw = Vec::new();
        while let Some(result) = stream.next().await {
            match result.map_err(ContainerError::from_api)? {
                LogOutput::StdOut { message } | LogOutput::Console { message } => {
                    stream::encode_frame(StreamType::Stdout, &message, &mut raw);
                }
                LogOutput::StdErr { message } => {
                    stream::encode_frame(StreamType::Stderr, &message, &mut raw);
                }
                LogOutput::StdIn { .. } => {}
            }
        }

        debug!(
            "Fetched {} bytes of logs from container {}",
            raw.len(),
            short_id(id)
        );
        Ok(raw)
    }

    async fn kill(&self, id: &str) -> Result<()> {
        debug!("Killing container: {}", short_id(id));

        self.client
            .docker()
            .kill_container(
                id,
                Some(bollard::container::KillContainerOptions { signal: "SIGKILL" }),
            )
            .await
            .map_err(ContainerError::from_api)?;

        info!("Killed container: {}", short_id(id));
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<()> {
        debug!("Removing container: {}", short_id(id));

        self.client
            .docker()
            .remove_container(
                id,
                Some(bollard::container::RemoveContainerOptions {
                    force: true,
                    v: true, // Remove associated volumes
                    ..Default::default()
                }),
            )
            .await
            .map_err(|e| match e {
                bollard::errors::Error::DockerResponseServerError {
                    status_code: 404, ..
                } => ContainerError::NotFound(id.to_string()),
                e => ContainerError::from_api(e),
            })?;

        info!("Removed container: {}", short_id(id));
        Ok(())
    }

    async fn list_managed(&self) -> Result<Vec<String>> {
        let mut filters = HashMap::new();
        filters.insert(
            "label".to_string(),
            vec![format!("{}=true", env::MANAGED_LABEL)],
        );

        let containers = self
            .client
            .docker()
            .list_containers(Some(bollard::container::ListContainersOptions {
                all: true,
                filters,
                ..Default::default()
            }))
            .await
            .map_err(ContainerError::from_api)?;

        Ok(containers.into_iter().filter_map(|c| c.id).collect())
    }
}

/// First 12 characters of a container ID, as the docker CLI prints them.
pub(crate) fn short_id(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}
