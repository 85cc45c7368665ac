//! termsync CLI - attach a local terminal to a remote session.
//!
//! This is the main binary entry point. See the `termsync` library for the
//! reconciliation engine.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use termsync::attach::{self, AttachOptions};
use termsync::env::Environment;
use termsync::terminal::SeedPolicy;
use termsync::Config;

/// Global allocator configured per M-MIMALLOC-APPS guideline.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser)]
#[command(name = "termsync")]
#[command(version)]
#[command(about = "Attach to a remote terminal session")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Attach to a session and render it until it ends or Ctrl-C
    Attach {
        /// Session to attach to
        session_id: String,
        /// Server WebSocket URL (overrides config)
        #[arg(long)]
        url: Option<String>,
        /// Paint the first-attach seed instead of waiting for a redraw
        #[arg(long)]
        render_seed: bool,
    },
    /// Print the effective configuration as JSON
    Config,
}

fn init_logging(environment: Environment) -> Result<()> {
    // Log to a file so output never lands on the rendered terminal.
    let log_path = match std::env::var("TERMSYNC_LOG_FILE") {
        Ok(path) => std::path::PathBuf::from(path),
        Err(_) => Config::config_dir()?.join("termsync.log"),
    };
    let log_file = std::fs::File::create(&log_path)
        .with_context(|| format!("Failed to create log file at {}", log_path.display()))?;
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(environment.default_log_filter()),
    )
    .target(env_logger::Target::Pipe(Box::new(log_file)))
    .format_timestamp_secs()
    .init();
    Ok(())
}

fn main() -> Result<()> {
    let environment = Environment::current();
    init_logging(environment)?;

    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        log::error!("PANIC: {:?}", panic_info);
        attach::restore_terminal();
        default_hook(panic_info);
    }));

    let cli = Cli::parse();

    match cli.command {
        Commands::Attach {
            session_id,
            url,
            render_seed,
        } => {
            let mut config = Config::load()?;
            if let Some(url) = url {
                config.server_url = url;
            }
            if render_seed {
                config.terminal.seed_policy = SeedPolicy::Render;
            }
            log::info!("termsync {} ({environment})", env!("CARGO_PKG_VERSION"));

            let runtime = tokio::runtime::Runtime::new().context("Failed to start runtime")?;
            runtime.block_on(attach::run(AttachOptions { session_id, config }))?;
        }
        Commands::Config => {
            let config = Config::load()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
