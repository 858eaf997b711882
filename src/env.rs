//! Environment constants and path utilities.
//!
//! Centralizes the hardcoded names, defaults and paths used across the
//! service so they can be changed in one place.

use std::path::{Path, PathBuf};

/// Application directory name (hidden directory like .git)
pub const SANDPIT_DIR_NAME: &str = ".sandpit";

/// Configuration file name inside [`SANDPIT_DIR_NAME`]
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Configuration file name looked up in the current directory
pub const LOCAL_CONFIG_FILE_NAME: &str = "sandpit.toml";

/// System-wide configuration file (Unix-like systems)
pub const SYSTEM_CONFIG_FILE: &str = "/etc/sandpit/config.toml";

/// Prefix of per-request workspace directories
pub const WORKSPACE_DIR_PREFIX: &str = "sandpit-";

/// Label attached to every container the service creates
pub const MANAGED_LABEL: &str = "sandpit.managed";

/// Container runtime defaults
pub mod sandbox {
    /// Interpreter image
    pub const DEFAULT_IMAGE: &str = "python";

    /// Interpreter binary invoked with the entry file
    pub const DEFAULT_INTERPRETER: &str = "python";

    /// Working directory inside the container; the workspace is mounted here
    pub const DEFAULT_WORKING_DIR: &str = "/usr/src/app";

    /// Name of the staged entry-point file
    pub const DEFAULT_ENTRY_FILE: &str = "main.py";

    /// Execution time limit in seconds
    pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

    /// Container name prefix
    pub const DEFAULT_NAME_PREFIX: &str = "sandpit";
}

/// HTTP server defaults
pub mod server {
    /// Bind address
    pub const DEFAULT_BIND: &str = "0.0.0.0";

    /// Listen port
    pub const DEFAULT_PORT: u16 = 8000;

    /// Directory served by the `/data` lookup
    pub const DEFAULT_STATIC_DIR: &str = "static";
}

/// Build the .sandpit directory path under `base`
pub fn sandpit_dir_path(base: &Path) -> PathBuf {
    base.join(SANDPIT_DIR_NAME)
}

/// Build the ./.sandpit/config.toml path for a working directory
pub fn local_config_file_path(current_dir: &Path) -> PathBuf {
    sandpit_dir_path(current_dir).join(CONFIG_FILE_NAME)
}

/// Build the ~/.sandpit directory path
pub fn user_config_dir_path(home_dir: &Path) -> PathBuf {
    sandpit_dir_path(home_dir)
}

/// Build the ~/.sandpit/config.toml path
pub fn user_config_file_path(home_dir: &Path) -> PathBuf {
    user_config_dir_path(home_dir).join(CONFIG_FILE_NAME)
}
