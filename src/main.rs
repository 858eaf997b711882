use anyhow::Context;
use clap::Parser;
use sandpit::cli::{AppConfig, Args, Commands, ConfigDiscovery};
use sandpit::container::{DockerRuntime, DockerRuntimeConfig};
use sandpit::executor::Executor;
use sandpit::server::{self, AppState};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = if args.command.verbose() {
        "sandpit=debug,tower_http=debug"
    } else {
        "sandpit=info,tower_http=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match args.command {
        Commands::Serve {
            config,
            bind,
            port,
            static_dir,
            ..
        } => {
            let mut app_config = ConfigDiscovery::load(config.as_deref())?;
            if let Some(bind) = bind {
                app_config.server.bind = bind;
            }
            if let Some(port) = port {
                app_config.server.port = port;
            }
            if let Some(static_dir) = static_dir {
                app_config.server.static_dir = static_dir;
            }
            app_config.validate()?;
            run_server(app_config).await
        }
        Commands::Run {
            file,
            config,
            timeout,
            ..
        } => {
            let app_config = ConfigDiscovery::load(config.as_deref())?;
            run_file(app_config, &file, timeout).await
        }
        Commands::ShowConfig => {
            ConfigDiscovery::show_discovery_info();
            Ok(())
        }
        Commands::InitConfig => {
            let path = ConfigDiscovery::create_default_user_config()?;
            println!("Configuration file: {}", path.display());
            Ok(())
        }
    }
}

async fn connect_executor(config: &AppConfig) -> anyhow::Result<Executor> {
    let runtime = DockerRuntime::connect(DockerRuntimeConfig {
        auto_pull: config.sandbox.auto_pull,
        socket: config.sandbox.runtime_socket.clone(),
    })
    .await
    .context("container runtime is not reachable")?;

    match runtime.client().runtime_info().await {
        Ok(runtime_info) => info!(
            "Connected to {} with image {}",
            runtime_info, config.sandbox.image
        ),
        Err(e) => warn!("Cannot query container runtime version: {}", e),
    }

    Ok(Executor::new(Arc::new(runtime), config.sandbox.clone()))
}

async fn run_server(config: AppConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = config
        .listen_addr()
        .parse()
        .with_context(|| format!("invalid listen address {}", config.listen_addr()))?;

    let executor = connect_executor(&config).await?;
    info!("Serving static content from: {}", config.server.static_dir.display());

    let state = AppState::new(Arc::new(executor), config.server.static_dir.clone());
    server::serve(addr, state).await?;

    info!("Server stopped");
    Ok(())
}

async fn run_file(config: AppConfig, file: &Path, timeout: Option<u64>) -> anyhow::Result<()> {
    let source = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;

    let timeout = timeout
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.sandbox.timeout());

    let executor = connect_executor(&config).await?;
    let result = executor.execute_with_timeout(&source, timeout).await?;

    print!("{}", result.message());
    if !result.success() {
        std::process::exit(i32::try_from(result.exit_code).unwrap_or(1));
    }
    Ok(())
}
