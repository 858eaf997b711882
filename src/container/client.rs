//! Docker/Podman client wrapper.
//!
//! Finds a reachable engine endpoint (explicit socket, local defaults, then
//! the usual Podman sockets) and verifies it answers before handing out a
//! client.

use crate::container::{ContainerError, Result};
use bollard::Docker;
use std::sync::Arc;
use tracing::{debug, info};

/// Container client configuration.
#[derive(Debug, Clone)]
pub struct ContainerClientConfig {
    /// Engine socket URI, e.g. `unix:///run/user/1000/podman/podman.sock`.
    /// Tried before any fallback when set.
    pub socket: Option<String>,
    /// Socket request timeout in seconds
    pub timeout: u64,
}

impl Default for ContainerClientConfig {
    fn default() -> Self {
        Self {
            socket: None,
            timeout: 120,
        }
    }
}

/// Handle to a reachable Docker or Podman daemon.
#[derive(Clone)]
pub struct ContainerClient {
    docker: Arc<Docker>,
}

impl ContainerClient {
    /// Connect with default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::Unavailable`] if no engine answers.
    pub async fn new() -> Result<Self> {
        Self::with_config(ContainerClientConfig::default()).await
    }

    /// Connect with custom configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::Unavailable`] if no engine answers.
    pub async fn with_config(config: ContainerClientConfig) -> Result<Self> {
        let docker = Self::connect(&config)?;
        let client = Self {
            docker: Arc::new(docker),
        };
        client.ping().await?;
        Ok(client)
    }

    fn connect(config: &ContainerClientConfig) -> Result<Docker> {
        if let Some(socket) = &config.socket {
            return Docker::connect_with_socket(socket, config.timeout, bollard::API_DEFAULT_VERSION)
                .map_err(|e| {
                    ContainerError::Unavailable(format!("Cannot use socket {}: {}", socket, e))
                });
        }

        match Docker::connect_with_local_defaults() {
            Ok(docker) => {
                debug!("Using local default engine endpoint");
                return Ok(docker);
            }
            Err(e) => debug!("Local defaults failed: {}", e),
        }

        for socket in podman_sockets() {
            match Docker::connect_with_socket(&socket, config.timeout, bollard::API_DEFAULT_VERSION)
            {
                Ok(docker) => {
                    info!("Using Podman socket {}", socket);
                    return Ok(docker);
                }
                Err(e) => debug!("Podman socket {} failed: {}", socket, e),
            }
        }

        Err(ContainerError::Unavailable(
            "no Docker or Podman endpoint found; is the daemon running?".to_string(),
        ))
    }

    /// Check that the engine answers.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::Unavailable`] if the ping fails.
    pub async fn ping(&self) -> Result<()> {
        self.docker.ping().await.map_err(|e| {
            ContainerError::Unavailable(format!("Container runtime did not answer ping: {}", e))
        })?;
        debug!("Container runtime ping successful");
        Ok(())
    }

    /// Get the underlying Docker client.
    pub fn docker(&self) -> &Docker {
        &self.docker
    }

    /// Engine flavour and version, for startup logging.
    ///
    /// # Errors
    ///
    /// Returns error if the version query fails.
    pub async fn runtime_info(&self) -> Result<RuntimeInfo> {
        let version = self
            .docker
            .version()
            .await
            .map_err(ContainerError::from_api)?;

        let is_podman = version
            .components
            .as_deref()
            .unwrap_or_default()
            .iter()
            .any(|c| c.name.to_lowercase().contains("podman"));

        Ok(RuntimeInfo {
            kind: if is_podman {
                RuntimeType::Podman
            } else {
                RuntimeType::Docker
            },
            version: version.version.unwrap_or_else(|| "unknown".to_string()),
            api_version: version.api_version.unwrap_or_else(|| "unknown".to_string()),
        })
    }

    /// Check if the runtime is Docker or Podman.
    ///
    /// # Errors
    ///
    /// Returns error if the version query fails.
    pub async fn runtime_type(&self) -> Result<RuntimeType> {
        Ok(self.runtime_info().await?.kind)
    }

    /// Check if an image exists locally.
    ///
    /// # Errors
    ///
    /// Returns error if image inspection fails.
    pub async fn image_exists(&self, image: &str) -> Result<bool> {
        match self.docker.inspect_image(image).await {
            Ok(_) => Ok(true),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(false),
            Err(e) => Err(ContainerError::from_api(e)),
        }
    }
}

/// Podman sockets to fall back to, rootless first.
fn podman_sockets() -> Vec<String> {
    if !cfg!(unix) {
        return Vec::new();
    }

    let mut sockets = Vec::new();
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        sockets.push(format!("unix://{}/podman/podman.sock", runtime_dir));
    }
    if let Ok(home) = std::env::var("HOME") {
        sockets.push(format!("unix://{}/run/podman/podman.sock", home));
    }
    sockets.push("unix:///run/podman/podman.sock".to_string());
    sockets
}

/// Type of container runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeType {
    Docker,
    Podman,
}

impl std::fmt::Display for RuntimeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuntimeType::Docker => write!(f, "Docker"),
            RuntimeType::Podman => write!(f, "Podman"),
        }
    }
}

/// What the engine reports about itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeInfo {
    pub kind: RuntimeType,
    pub version: String,
    pub api_version: String,
}

impl std::fmt::Display for RuntimeInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} (API {})", self.kind, self.version, self.api_version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_info_display() {
        let info = RuntimeInfo {
            kind: RuntimeType::Podman,
            version: "5.2.1".to_string(),
            api_version: "1.41".to_string(),
        };
        assert_eq!(info.to_string(), "Podman 5.2.1 (API 1.41)");
        assert_eq!(RuntimeType::Docker.to_string(), "Docker");
    }

    #[cfg(unix)]
    #[test]
    fn test_system_podman_socket_is_last_resort() {
        let sockets = podman_sockets();
        assert_eq!(
            sockets.last().map(String::as_str),
            Some("unix:///run/podman/podman.sock")
        );
    }

    #[tokio::test]
    #[ignore] // Requires Docker/Podman to be running
    async fn test_client_connection() {
        let client = ContainerClient::new().await.unwrap();
        client.ping().await.unwrap();
        println!("Runtime: {}", client.runtime_info().await.unwrap());
    }
}
