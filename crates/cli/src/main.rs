//! statsagent CLI: the main entry point.
//!
//! Commands:
//! - `ask`: answer one question and exit
//! - `chat`: interactive question loop
//! - `init`: write a default config file
//! - `doctor`: check configuration and connectivity

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "statsagent",
    about = "statsagent — answers statistical questions with Data Commons data",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use the built-in sample dataset instead of the MCP data service
    #[arg(long, global = true)]
    offline: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a single question
    Ask {
        /// The question, e.g. "What is the population of India?"
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,

        /// Override the reasoning-step bound for this question
        #[arg(long, env = "STATSAGENT_MAX_ITERATIONS")]
        max_iterations: Option<u32>,
    },

    /// Ask questions interactively until `quit`
    Chat,

    /// Write a default config file
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Diagnose configuration and connectivity
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Ask { question, max_iterations } => {
            commands::ask::run(&question.join(" "), max_iterations, cli.offline).await?
        }
        Commands::Chat => commands::chat::run(cli.offline).await?,
        Commands::Init { force } => commands::init::run(force).await?,
        Commands::Doctor => commands::doctor::run(cli.offline).await?,
    }

    Ok(())
}
