//! DeskPilot CLI, the main entry point.
//!
//! Commands:
//! - `agent`     Run a task, then keep chatting interactively
//! - `insights`  Print the insight log
//! - `config`    Show the effective configuration

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "deskpilot",
    about = "DeskPilot: let a model drive your Mac",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Give the agent a task
    Agent {
        /// Send a single message and exit instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Initial message; the session stays interactive afterwards
        #[arg(trailing_var_arg = true)]
        words: Vec<String>,
    },

    /// Print the insight log
    Insights,

    /// Show the effective configuration
    Config {
        /// Print a default config.toml instead
        #[arg(long)]
        default: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Agent { message, words } => {
            commands::agent::run(message, words, cli.verbose).await?
        }
        Commands::Insights => commands::insights::run().await?,
        Commands::Config { default } => commands::config_cmd::run(default)?,
    }

    Ok(())
}
