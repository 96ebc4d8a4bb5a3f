//! M.E.M.I.R. CLI: the main entry point.
//!
//! Commands:
//! - `serve`         Start the HTTP gateway
//! - `chat`          One-shot or interactive chat
//! - `memory`        Add, search, get, list and remove memories
//! - `personality`   Load the personality core
//! - `status`        Show configuration and store status

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "memir",
    about,
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    /// Config file to use instead of ~/.memir/config.toml
    #[arg(long, global = true, env = "MEMIR_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway server
    Serve {
        /// Override the bind host
        #[arg(long)]
        host: Option<String>,

        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Chat with the assistant
    Chat {
        /// Send a single message instead of entering interactive mode
        message: Option<String>,
    },

    /// Manage stored memories
    Memory {
        #[command(subcommand)]
        command: MemoryCommand,
    },

    /// Manage the personality core
    Personality {
        #[command(subcommand)]
        command: PersonalityCommand,
    },

    /// Show system status
    Status,
}

#[derive(Subcommand)]
enum MemoryCommand {
    /// Store a new memory
    Add {
        document: String,

        /// Memory type
        #[arg(long = "type", default_value = "note")]
        kind: String,

        #[arg(long)]
        title: Option<String>,

        /// Comma-separated tags
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
    },

    /// Find the memories nearest to a query
    Search {
        query: String,

        #[arg(short = 'n', long, default_value_t = 3)]
        n_results: usize,

        /// Only memories of this type
        #[arg(long = "type")]
        kind: Option<String>,
    },

    /// Show one memory
    Get { id: String },

    /// List every memory
    List,

    /// Remove a memory
    Remove { id: String },
}

#[derive(Subcommand)]
enum PersonalityCommand {
    /// Store a file as the personality core
    Load { file: PathBuf },
}

fn init_tracing(verbose: bool, json: bool) {
    let filter = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Serve { host, port } => commands::serve::run(config_path, host, port).await?,
        Commands::Chat { message } => commands::chat::run(config_path, message).await?,
        Commands::Memory { command } => {
            let memory = commands::memory::MemoryCli::open(config_path).await?;
            match command {
                MemoryCommand::Add {
                    document,
                    kind,
                    title,
                    tags,
                } => memory.add(&document, &kind, title, tags).await?,
                MemoryCommand::Search {
                    query,
                    n_results,
                    kind,
                } => memory.search(&query, n_results, kind.as_deref()).await?,
                MemoryCommand::Get { id } => memory.get(&id).await?,
                MemoryCommand::List => memory.list().await?,
                MemoryCommand::Remove { id } => memory.remove(&id).await?,
            }
        }
        Commands::Personality {
            command: PersonalityCommand::Load { file },
        } => commands::personality::load(config_path, &file).await?,
        Commands::Status => commands::status::run(config_path).await?,
    }

    Ok(())
}
