//! `supervisor`: inspect and drive the services of this host

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use service_supervisor::LifecycleOp;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "supervisor")]
#[command(about = "Host service supervisor - lifecycle management for provider-backed services")]
#[command(version)]
struct Cli {
    /// Root configuration file path
    #[arg(short, long, global = true, default_value = "config.toml")]
    config: PathBuf,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Output format of the inspection commands
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human readable table
    #[default]
    Table,
    /// Pretty-printed JSON
    Json,
}

#[derive(Args)]
struct LifecycleArgs {
    /// Service slug
    service: String,

    /// Wait for the service lock instead of failing when the service is busy
    #[arg(short, long)]
    wait: bool,

    /// Stop waiting after this many seconds (implies --wait)
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Run even when the service reports a corrupted state
    #[arg(short, long)]
    force: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List discovered services
    List {
        /// Output format
        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Show the status of one service
    Status {
        /// Service slug
        service: String,

        /// Output format
        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Install a service
    Install(LifecycleArgs),

    /// Uninstall a service
    Uninstall(LifecycleArgs),

    /// Start a service
    Start(LifecycleArgs),

    /// Stop a service
    Stop(LifecycleArgs),

    /// Restart a service
    Restart(LifecycleArgs),

    /// Validate the root configuration and every service definition
    Validate,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    smol::block_on(async {
        let (op, args) = match cli.command {
            Commands::List { format } => return commands::list::run(&cli.config, format).await,
            Commands::Status { service, format } => {
                return commands::status::run(&cli.config, &service, format).await;
            }
            Commands::Validate => return commands::validate::run(&cli.config).await,
            Commands::Install(args) => (LifecycleOp::Install, args),
            Commands::Uninstall(args) => (LifecycleOp::Uninstall, args),
            Commands::Start(args) => (LifecycleOp::Start, args),
            Commands::Stop(args) => (LifecycleOp::Stop, args),
            Commands::Restart(args) => (LifecycleOp::Restart, args),
        };

        let options = commands::lifecycle::Options {
            wait: args.wait,
            timeout: args.timeout,
            force: args.force,
        };
        commands::lifecycle::run(&cli.config, op, &args.service, options).await
    })
}
