use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;
mod output;

use commands::Runtime;
use config::load_config;
use output::OutputFormat;

#[derive(Parser)]
#[command(name = "rag-cli")]
#[command(about = "Command-line interface for the local RAG engine")]
#[command(version, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Human)]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer one question against the knowledge base
    Ask {
        /// The question to answer
        question: String,
    },
    /// Interactive chat reusing one conversation log
    Chat,
    /// Ingest a JSON array of fragments into a collection
    Ingest {
        /// JSON file holding `[{"category": …, "content": …}]`
        file: PathBuf,
        /// Target collection (defaults to store.active_collection)
        #[arg(short = 'n', long)]
        collection: Option<String>,
        /// Delete the collection first if it exists
        #[arg(long)]
        replace: bool,
    },
    /// Collection management
    #[command(alias = "col")]
    Collections {
        #[command(subcommand)]
        command: CollectionCommands,
    },
    /// Configuration inspection
    #[command(alias = "cfg")]
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum CollectionCommands {
    /// List all collections
    List,
    /// Show statistics for one collection
    Stats { collection: String },
    /// Delete a collection and all its fragments
    Delete { collection: String },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Check the configuration without touching the store
    Validate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .init();
    }

    let settings = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Ask { question } => {
            let runtime = Runtime::connect(settings).await?;
            commands::ask::ask(&runtime, &question).await
        }
        Commands::Chat => {
            let runtime = Runtime::connect(settings).await?;
            commands::ask::chat(&runtime).await
        }
        Commands::Ingest {
            file,
            collection,
            replace,
        } => {
            let runtime = Runtime::connect(settings).await?;
            commands::ingest::run(&runtime, &file, collection.as_deref(), replace, cli.format).await
        }
        Commands::Collections { command } => {
            let runtime = Runtime::connect(settings).await?;
            match command {
                CollectionCommands::List => commands::collections::list(&runtime, cli.format).await,
                CollectionCommands::Stats { collection } => {
                    commands::collections::stats(&runtime, &collection, cli.format).await
                }
                CollectionCommands::Delete { collection } => {
                    commands::collections::delete(&runtime, &collection).await
                }
            }
        }
        Commands::Config { command } => match command {
            ConfigCommands::Show => {
                println!("{}", toml::to_string_pretty(&settings)?);
                Ok(())
            }
            ConfigCommands::Validate => match settings.validate() {
                Ok(()) => {
                    output::success("configuration is valid");
                    Ok(())
                }
                Err(err) => {
                    anyhow::bail!("invalid configuration: {err}");
                }
            },
        },
    }
}
