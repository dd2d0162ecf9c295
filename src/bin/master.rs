//! Master binary

use chunkmaster::common::{Config, PersistenceBackend};
use chunkmaster::MasterServer;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "chunkmaster-master")]
#[command(about = "chunkmaster placement and metadata master")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Flags override the config file and environment
#[derive(clap::Args)]
struct ServeArgs {
    /// Bind address for HTTP
    #[arg(long)]
    bind: Option<String>,

    /// Chunk size in bytes
    #[arg(long)]
    chunk_size: Option<u64>,

    /// Replication factor
    #[arg(long)]
    replicas: Option<usize>,

    /// Initial chunkservers (comma-separated)
    #[arg(long, value_delimiter = ',')]
    chunkservers: Vec<String>,

    /// Persistence backend: json, memory or sled
    #[arg(long)]
    backend: Option<PersistenceBackend>,

    /// Metadata file (json) or directory (sled)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Per-call timeout for chunk deletes, in milliseconds
    #[arg(long)]
    delete_timeout_ms: Option<u64>,

    /// Reject planning an object id that already exists
    #[arg(long)]
    no_overwrite: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start master server
    Serve(ServeArgs),

    /// Print the effective configuration and exit
    ShowConfig(ServeArgs),
}

fn effective_config(args: ServeArgs) -> anyhow::Result<Config> {
    let mut config = Config::load()?;
    let master = &mut config.master;

    if let Some(bind) = args.bind {
        master.bind_addr = bind.parse()?;
    }
    if let Some(chunk_size) = args.chunk_size {
        master.chunk_size_bytes = chunk_size;
    }
    if let Some(replicas) = args.replicas {
        master.replication_factor = replicas;
    }
    if !args.chunkservers.is_empty() {
        master.chunkservers = args.chunkservers;
    }
    if let Some(backend) = args.backend {
        master.persistence_backend = backend;
    }
    if let Some(db) = args.db {
        master.persistence_path = db;
    }
    if let Some(timeout) = args.delete_timeout_ms {
        master.delete_timeout_ms = timeout;
    }
    if args.no_overwrite {
        master.allow_overwrite = false;
    }

    master.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => {
            let config = effective_config(args)?;

            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| config.log_level.clone().into()),
                )
                .with(tracing_subscriber::fmt::layer())
                .init();

            MasterServer::new(config.master).serve().await?;
        }
        Commands::ShowConfig(args) => {
            let config = effective_config(args)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
