//! CareGaps CLI — the main entry point.
//!
//! Commands:
//! - `onboard`  — Write a starter config
//! - `chat`     — Interactive chat or single-message mode
//! - `serve`    — Start the HTTP serving surface
//! - `tools`    — List the functions the agent can call
//! - `eval`     — Run the built-in evaluation cases
//! - `doctor`   — Diagnose configuration and connectivity

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "caregaps",
    about = "CareGaps — care-gap analytics agent",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter configuration
    Onboard,

    /// Chat with the agent
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Start the HTTP serving surface
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// List the functions the agent can call
    Tools {
        /// Print the tool definitions as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run the built-in evaluation cases against the configured agent
    Eval {
        /// Only run the case with this id (e.g. T003)
        #[arg(long)]
        case: Option<String>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and connectivity
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Chat { message } => commands::chat::run(message).await?,
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Tools { json } => commands::tools::run(json).await?,
        Commands::Eval { case, json } => commands::eval::run(case, json).await?,
        Commands::Doctor => commands::doctor::run().await?,
    }

    Ok(())
}
