//! CLI for master operations

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use reqwest::Client;
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "chunkmaster")]
#[command(about = "chunkmaster object placement CLI")]
#[command(version)]
struct Cli {
    /// Master URL
    #[arg(long, default_value = "http://localhost:8080")]
    master: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan chunk placement for an object
    Plan {
        /// Object id
        object_id: String,

        /// Declared size in bytes
        #[arg(long)]
        size: u64,
    },

    /// Show the placement record of an object
    Metadata {
        /// Object id
        object_id: String,
    },

    /// Delete an object and all its replicas
    Delete {
        /// Object id
        object_id: String,
    },

    /// List all objects
    Ls,

    /// Cluster statistics
    Stats,

    /// Cluster health
    Health,

    /// List registered chunkservers
    Chunkservers,

    /// Register a chunkserver
    Register {
        /// Chunkserver endpoint URL
        endpoint: String,
    },

    /// Unregister a chunkserver
    Unregister {
        /// Chunkserver endpoint URL
        endpoint: String,
    },
}

async fn read_json(response: reqwest::Response) -> anyhow::Result<Value> {
    let status = response.status();
    let body: Value = response
        .json()
        .await
        .context("master returned a non-JSON body")?;

    if !status.is_success() {
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        bail!("{} ({})", message, status);
    }
    Ok(body)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = Client::new();
    let api = format!("{}/api/master", cli.master.trim_end_matches('/'));

    let body = match cli.command {
        Commands::Plan { object_id, size } => {
            let response = client
                .post(format!("{}/upload", api))
                .json(&json!({ "object_id": object_id, "size_bytes": size }))
                .send()
                .await?;
            read_json(response).await?
        }
        Commands::Metadata { object_id } => {
            let response = client
                .get(format!("{}/metadata", api))
                .query(&[("object_id", object_id)])
                .send()
                .await?;
            read_json(response).await?
        }
        Commands::Delete { object_id } => {
            let response = client
                .delete(format!("{}/delete", api))
                .query(&[("object_id", object_id)])
                .send()
                .await?;
            read_json(response).await?
        }
        Commands::Ls => read_json(client.get(format!("{}/files", api)).send().await?).await?,
        Commands::Stats => read_json(client.get(format!("{}/stats", api)).send().await?).await?,
        Commands::Health => {
            read_json(client.get(format!("{}/health/cluster", api)).send().await?).await?
        }
        Commands::Chunkservers => {
            read_json(client.get(format!("{}/chunkservers", api)).send().await?).await?
        }
        Commands::Register { endpoint } => {
            let response = client
                .post(format!("{}/chunkservers/register", api))
                .json(&json!({ "endpoint": endpoint }))
                .send()
                .await?;
            read_json(response).await?
        }
        Commands::Unregister { endpoint } => {
            let response = client
                .post(format!("{}/chunkservers/unregister", api))
                .json(&json!({ "endpoint": endpoint }))
                .send()
                .await?;
            read_json(response).await?
        }
    };

    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}
