//! Kiln: credential and pipeline config resolution, from the command line.
//!
//! Usage:
//!   kiln key public                  # PEM public key extensions verify with
//!   kiln resolve secrets   --repo repo.json --pipeline pipeline.json --image alpine
//!   kiln resolve registries --repo repo.json --pipeline pipeline.json --json
//!   kiln config --repo repo.json --pipeline pipeline.json --checkout .
//!
//! Stored credentials come from `--seed` (a JSON file); the signing key is
//! persisted under the Kiln home directory.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

mod cli;

use cli::context::GlobalArgs;

#[derive(Parser)]
#[command(name = "kiln")]
#[command(about = "Resolve pipeline credentials and configs")]
#[command(version)]
struct Cli {
    /// Server config file (default: <home>/kiln.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Kiln home directory
    #[arg(long, global = true, env = "KILN_HOME")]
    home: Option<PathBuf>,

    /// JSON file with stored secrets, registries and server records
    #[arg(long, global = true)]
    seed: Option<PathBuf>,

    /// Secret extension endpoint (overrides the config file)
    #[arg(long, global = true, env = "KILN_SECRET_EXTENSION")]
    secret_extension: Option<String>,

    /// Registry extension endpoint (overrides the config file)
    #[arg(long, global = true, env = "KILN_REGISTRY_EXTENSION")]
    registry_extension: Option<String>,

    /// Config extension endpoint (overrides the config file)
    #[arg(long, global = true, env = "KILN_CONFIG_EXTENSION")]
    config_extension: Option<String>,

    /// Docker client config exposing global registries
    #[arg(long, global = true, env = "KILN_DOCKER_CONFIG")]
    docker_config: Option<PathBuf>,

    /// Show info logs on the console
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect the server signing key
    Key {
        #[command(subcommand)]
        action: cli::key::KeyAction,
    },

    /// Resolve the credentials a pipeline would receive
    Resolve {
        #[command(subcommand)]
        kind: cli::resolve::ResolveKind,
    },

    /// Fetch the pipeline config from a local checkout
    Config(cli::config::ConfigArgs),
}

impl Cli {
    fn global(&self) -> GlobalArgs {
        GlobalArgs {
            config: self.config.clone(),
            home: self.home.clone(),
            seed: self.seed.clone(),
            secret_extension: self.secret_extension.clone(),
            registry_extension: self.registry_extension.clone(),
            config_extension: self.config_extension.clone(),
            docker_config: self.docker_config.clone(),
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let global = cli.global();
    let ctx = cli::context::interruptible();
    match cli.command {
        Commands::Key { action } => cli::key::run(&ctx, &global, action).await,
        Commands::Resolve { kind } => cli::resolve::run(&ctx, &global, kind).await,
        Commands::Config(args) => cli::config::run(&ctx, &global, args).await,
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let home = match &cli.home {
        Some(home) => Ok(home.clone()),
        None => kiln_logging::kiln_home(),
    };
    let log_dir = home.map(|home| kiln_logging::logs_dir(&home));
    let _log_guard = match kiln_logging::init_logging(kiln_logging::LogConfig {
        app_name: "kiln",
        verbose: cli.verbose,
        log_dir: log_dir.as_deref().ok(),
    }) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: failed to initialize logging: {:#}", e);
            None
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
