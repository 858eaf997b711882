//! CLI-specific functionality
//!
//! This module contains argument parsing and configuration discovery.

pub mod args;
pub mod config;

pub use args::{Args, Commands};
pub use config::{AppConfig, ConfigDiscovery, ConfigError, ServerConfig};
