//! CLI for key operations against a running coordinator or any of its replicas

use anyhow::Context;
use clap::{Parser, Subcommand};
use quorumkv::common::Key;
use quorumkv::{Config, ReplicaId};
use std::path::PathBuf;

/// Keys and values written by `seed`
const SEED: [(Key, &str); 10] = [
    (1, "abc"),
    (2, "bcd"),
    (3, "cde"),
    (4, "edf"),
    (5, "dfg"),
    (6, "ghi"),
    (7, "jkl"),
    (8, "mno"),
    (9, "pqr"),
    (10, "stu"),
];

#[derive(Parser)]
#[command(name = "quorumkv")]
#[command(about = "quorumkv replicated key-value store CLI")]
#[command(version)]
struct Cli {
    /// Coordinator URL
    #[arg(long, default_value = "http://localhost:5000")]
    coordinator: String,

    /// Talk to this replica instead of the coordinator
    #[arg(long)]
    replica: Option<u32>,

    /// Config file used to look up replica addresses
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read a key
    Get {
        /// Key
        key: Key,
    },

    /// Insert or overwrite a key
    Put {
        /// Key
        key: Key,

        /// Value
        value: String,
    },

    /// Delete a key
    Delete {
        /// Key
        key: Key,
    },

    /// Insert keys 1-10, then GET and DELETE keys 0-4
    Seed,
}

struct KvClient {
    http: reqwest::Client,
    base: String,
}

impl KvClient {
    async fn get(&self, key: Key) -> anyhow::Result<String> {
        self.send(self.http.get(self.url(key))).await
    }

    async fn put(&self, key: Key, value: &str) -> anyhow::Result<String> {
        self.send(self.http.put(self.url(key)).body(value.to_string()))
            .await
    }

    async fn delete(&self, key: Key) -> anyhow::Result<String> {
        self.send(self.http.delete(self.url(key))).await
    }

    fn url(&self, key: Key) -> String {
        format!("{}/kv/{}", self.base, key)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> anyhow::Result<String> {
        let response = request
            .send()
            .await
            .with_context(|| format!("failed to reach {}", self.base))?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            anyhow::bail!("{} returned {}: {}", self.base, status, text);
        }
        Ok(text)
    }
}

fn target(cli: &Cli) -> anyhow::Result<String> {
    let Some(id) = cli.replica else {
        return Ok(cli.coordinator.trim_end_matches('/').to_string());
    };
    let config = Config::load(cli.config.as_deref())?;
    let endpoint = config
        .cluster
        .endpoint(ReplicaId(id))
        .with_context(|| format!("replica {} is not in the cluster", id))?;
    Ok(format!("http://{}", endpoint.addr))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let client = KvClient {
        http: reqwest::Client::new(),
        base: target(&cli)?,
    };
    tracing::debug!("Using {}", client.base);

    match &cli.command {
        Commands::Get { key } => println!("{}", client.get(*key).await?),
        Commands::Put { key, value } => println!("{}", client.put(*key, value).await?),
        Commands::Delete { key } => println!("{}", client.delete(*key).await?),
        Commands::Seed => {
            for (key, value) in SEED {
                println!("PUT {}: {}", key, client.put(key, value).await?);
            }
            for key in 0..5 {
                println!("GET {}: {}", key, client.get(key).await?);
                println!("DELETE {}: {}", key, client.delete(key).await?);
            }
        }
    }

    Ok(())
}
