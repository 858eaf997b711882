//! Container runtime integration.
//!
//! This module runs one throwaway container per execution using Docker/Podman
//! via the bollard API. The rest of the crate only sees the
//! [`ContainerRuntime`] trait, so the lifecycle logic can be exercised against
//! in-memory runtimes in tests.
//!
//! ## Architecture
//!
//! - [`client`]: Docker/Podman API client wrapper with connection fallback
//! - [`config`]: [`ContainerSpec`] builder for programmatic container setup
//! - [`runtime`]: the [`ContainerRuntime`] trait and the bollard-backed [`DockerRuntime`]
//! - [`lifecycle`]: [`ContainerRun`], the per-execution state machine
//!
//! ## Usage
//!
//! ```rust,no_run
//! use sandpit::container::{ContainerRun, ContainerSpec, DockerRuntime, DockerRuntimeConfig};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = Arc::new(DockerRuntime::connect(DockerRuntimeConfig::default()).await?);
//!
//!     let spec = ContainerSpec::builder()
//!         .image("python")
//!         .cmd(vec!["python", "-c", "print('hello')"])
//!         .build()?;
//!
//!     let mut run = ContainerRun::new(runtime, "sandpit-demo");
//!     run.create(&spec).await?;
//!     run.start().await?;
//!     let exit_code = run.await_completion(Duration::from_secs(10)).await?;
//!     let raw = run.fetch_logs().await?;
//!     run.remove().await?;
//!
//!     println!("exit {}: {} bytes of output", exit_code, raw.len());
//!     Ok(())
//! }
//! ```

mod client;
mod config;
mod lifecycle;
mod runtime;

pub use client::{ContainerClient, ContainerClientConfig, RuntimeInfo, RuntimeType};
pub use config::{ContainerSpec, ContainerSpecBuilder};
pub use lifecycle::{ContainerRun, RunState};
pub use runtime::{ContainerRuntime, DockerRuntime, DockerRuntimeConfig};

/// Container runtime errors.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    /// Docker/Podman API error
    #[error("Container API error: {0}")]
    ApiError(#[from] bollard::errors::Error),

    /// Runtime endpoint could not be reached
    #[error("Container runtime unavailable: {0}")]
    Unavailable(String),

    /// Image is not present locally and could not be pulled
    #[error("Image not found: {0}")]
    ImageNotFound(String),

    /// Container not found
    #[error("Container not found: {0}")]
    NotFound(String),

    /// Container configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// General error
    #[error("Container error: {0}")]
    Other(String),
}

impl ContainerError {
    /// Classify a bollard error as a daemon response or a transport failure.
    ///
    /// Anything that is not an HTTP response from the daemon means the daemon
    /// could not be talked to at all.
    pub fn from_api(err: bollard::errors::Error) -> Self {
        match err {
            bollard::errors::Error::DockerResponseServerError { .. } => Self::ApiError(err),
            other => Self::Unavailable(other.to_string()),
        }
    }

    /// Whether the daemon answered with HTTP 404.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ContainerError::NotFound(_)
                | ContainerError::ApiError(bollard::errors::Error::DockerResponseServerError {
                    status_code: 404,
                    ..
                })
        )
    }
}

/// Result type for container operations.
pub type Result<T> = std::result::Result<T, ContainerError>;
