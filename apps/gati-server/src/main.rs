use std::path::Path;

use anyhow::Result;
use clap::{Parser, Subcommand};
use gati_bootstrap::{init_logging_unified, AppConfig, AppConfigProvider, CliArgs, ConfigProvider};
use gati_core::registry::LoaderConfig;
use gati_core::runtime::{run, RunOptions, ShutdownOptions};
use mimalloc::MiMalloc;

mod registered_modules;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Gati Server - request-serving runtime for file-addressable HTTP handlers
#[derive(Parser)]
#[command(name = "gati-server")]
#[command(about = "Gati request-serving runtime")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    args: CliArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server (default)
    Run,
    /// Load and validate configuration and the module dependency graph, then exit
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load_or_default(cli.args.config.as_deref());
    config.apply_cli_overrides(&cli.args);
    config.apply_env_overrides();

    init_logging_unified(&config.logging, Path::new(&config.server.home_dir));

    if cli.args.print_config {
        println!("{}", config.to_yaml()?);
        return Ok(());
    }

    tracing::info!(environment = %config.environment, "gati server starting");

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_server(config).await,
        Commands::CheckConfig => check_config(config).await,
    }
}

async fn run_server(config: AppConfig) -> Result<()> {
    let opts = RunOptions {
        config,
        loader_config: LoaderConfig::default(),
        shutdown: ShutdownOptions::Signals,
    };
    run(opts).await
}

async fn check_config(config: AppConfig) -> Result<()> {
    // Discovering and initializing modules against a throwaway context
    // validates the dependency graph (cycles, unknown deps) without
    // binding a socket.
    let config_provider = AppConfigProvider::new(config.clone());
    let ctx_manager = gati_core::ContextManager::new();
    let gctx = ctx_manager.initialize_global_context(gati_core::GlobalContextOptions {
        environment: config.environment.clone(),
        config: config_provider.module_configs(),
        state: Default::default(),
    })?;
    let loader = gati_core::ModuleLoader::discover(LoaderConfig::default())?;
    loader.init_all(&gctx).await?;

    println!("Configuration and module graph are valid.");
    println!("{}", config.to_yaml()?);
    Ok(())
}
