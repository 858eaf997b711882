//! # Sandpit
//!
//! An HTTP service that runs untrusted source code inside throwaway
//! Docker/Podman containers and returns what the program printed.
//!
//! ## Architecture Overview
//!
//! - **[`stream`]**: decoding of the runtime's multiplexed stdout/stderr log stream
//! - **[`workspace`]**: per-request staging directories for submitted source
//! - **[`container`]**: container runtime trait, bollard adapter and per-run lifecycle
//! - **[`executor`]**: the execution orchestrator tying the above together
//! - **[`server`]**: axum routes for `/run`, `/health` and static content
//!
//! Every execution gets its own workspace and container, both removed before
//! the call returns regardless of the outcome.
//!
//! ## Quick Start
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
//!     let result = executor.execute("import sys; sys.exit('boom')").await?;
//!     println!("{}", result.message());
//!     Ok(())
//! }
//! ```

/// Multiplexed log stream framing.
pub mod stream;

/// Per-request workspace staging.
pub mod workspace;

/// Container runtime integration and lifecycle control.
pub mod container;

/// Sandboxed execution orchestration.
///
/// Composes workspace staging, the container lifecycle and stream
/// demultiplexing into [`executor::Executor::execute`].
pub mod executor;

/// HTTP routes and handlers.
pub mod server;

/// Environment constants and path utilities.
pub mod env;

// CLI module for command-line interface
pub mod cli;

pub use container::{ContainerRuntime, DockerRuntime, DockerRuntimeConfig};
pub use executor::{ExecutionError, ExecutionRequest, ExecutionResult, Executor, SandboxConfig};
pub use server::AppState;
