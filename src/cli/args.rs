//! Command line argument parsing
//!
//! Subcommands:
//! - `serve`: Run the HTTP service
//! - `run`: Execute one source file in a sandbox and print its output
//! - `show-config`: Show configuration discovery information
//! - `init-config`: Write a default user configuration file

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "sandpit")]
#[command(author = "Sandpit Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run untrusted code in throwaway containers over HTTP")]
#[command(long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the HTTP service
    Serve {
        /// Configuration file path
        #[arg(short = 'c', long = "config", env = "SANDPIT_CONFIG")]
        config: Option<PathBuf>,
        /// Address to bind to
        #[arg(short = 'b', long = "bind", env = "SANDPIT_BIND")]
        bind: Option<String>,
        /// Port to listen on
        #[arg(short = 'p', long = "port", env = "SANDPIT_PORT")]
        port: Option<u16>,
        /// Directory served by the /data lookup
        #[arg(long = "static-dir")]
        static_dir: Option<PathBuf>,
        /// Enable verbose output
        #[arg(short = 'v', long = "verbose")]
        verbose: bool,
    },
    /// Execute a source file once and print its output
    Run {
        /// Path to the source file
        file: PathBuf,
        /// Configuration file path
        #[arg(short = 'c', long = "config", env = "SANDPIT_CONFIG")]
        config: Option<PathBuf>,
        /// Time limit in seconds
        #[arg(short = 't', long = "timeout")]
        timeout: Option<u64>,
        /// Enable verbose output
        #[arg(short = 'v', long = "verbose")]
        verbose: bool,
    },
    /// Show configuration discovery information
    ShowConfig,
    /// Create ~/.sandpit/config.toml with default values
    InitConfig,
}

impl Commands {
    /// Whether debug logging was requested
    pub fn verbose(&self) -> bool {
        match self {
            Commands::Serve { verbose, .. } | Commands::Run { verbose, .. } => *verbose,
            Commands::ShowConfig | Commands::InitConfig => false,
        }
    }
}
