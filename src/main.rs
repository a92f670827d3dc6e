use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use simbridge::config::Config;
use simbridge::console::ConsoleBus;
use simbridge::logging::init_tracing;
use simbridge::server::{bind_listener, build_router, AppState};
use simbridge::session::SimService;
use simbridge::shutdown::ShutdownHandle;

/// Web bridge for a terminal-driven computer simulator.
#[derive(Parser)]
#[command(name = "simbridge", version)]
struct Cli {
    /// Path to a config file (defaults to the per-user config location).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the server bind address.
    #[arg(long)]
    bind: Option<String>,

    /// Override the simulator executable.
    #[arg(long)]
    simulator: Option<String>,

    /// Arguments passed through to the simulator.
    #[arg(trailing_var_arg = true)]
    args: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(bind) = cli.bind {
        config.server.bind_addr = bind;
    }
    if let Some(simulator) = cli.simulator {
        config.simulator.command = simulator;
    }
    if !cli.args.is_empty() {
        config.simulator.args = cli.args;
    }

    let bus = Arc::new(ConsoleBus::new(config.console.backlog_capacity));
    let service = SimService::new(config.simulator.clone(), Arc::clone(&bus));
    service.start().await?;

    let shutdown = ShutdownHandle::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                shutdown.signal();
            }
        });
    }

    let listener = bind_listener(&config.server.bind_addr).await?;
    let router = build_router(AppState {
        service: service.clone(),
        bus,
        quit_grace: config.simulator.quit_grace(),
    });

    let wait = shutdown.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { wait.wait().await })
        .await?;

    if service.is_running() {
        if let Err(err) = service.quit(config.simulator.quit_grace()).await {
            tracing::warn!(%err, "graceful quit failed");
        }
    }
    Ok(())
}
