//! # Recall CLI (`rcl`)
//!
//! The `rcl` binary is the primary interface for Recall. It provides
//! commands for initializing the store, ingesting documents, semantic
//! search, item retrieval, listing, and removal.
//!
//! ## Usage
//!
//! ```bash
//! rcl --config ./config/recall.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rcl init` | Create the SQLite database and the item collection |
//! | `rcl ingest <file>` | Ingest a UTF-8 text/markdown file |
//! | `rcl search "<query>"` | Semantic search over stored items |
//! | `rcl get <id>` | Retrieve a full item by id |
//! | `rcl list` | List stored items |
//! | `rcl remove <id>` | Remove an item |

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use recall::config::{self, Config};
use recall::probe::ProcessMemoryProbe;
use recall::service::{IngestRequest, SearchService};
use recall::sqlite_engine::SqliteEngine;
use recall_core::cache::MemoryProbe;
use recall_core::embedding::{Embedder, HashEmbedder};
use recall_core::models::{GetOptions, SourceType};

/// Recall — a content ingestion and semantic retrieval pipeline for
/// heterogeneous documents.
///
/// All commands accept a `--config` flag pointing to a TOML
/// configuration file. See `config/recall.example.toml` for a full
/// example.
#[derive(Parser)]
#[command(
    name = "rcl",
    about = "Recall — a content ingestion and semantic retrieval pipeline",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/recall.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the store.
    ///
    /// Creates the SQLite database file and the item collection. This
    /// command is idempotent — running it multiple times is safe.
    Init,

    /// Ingest a UTF-8 text or markdown file.
    ///
    /// Reads the file, segments it into passages with the configured
    /// strategy, embeds them, and stores the item. Real extraction
    /// adapters (PDF, web, transcripts) feed the same pipeline through
    /// the library API.
    Ingest {
        /// Path to the file to ingest.
        file: PathBuf,

        /// Source type recorded on the item: pdf, url, youtube, or other.
        #[arg(long, default_value = "other")]
        source_type: String,

        /// Item title; defaults to the file stem.
        #[arg(long)]
        title: Option<String>,

        /// Stable item id; a UUID is generated when omitted.
        #[arg(long)]
        id: Option<String>,
    },

    /// Semantic search over stored items.
    Search {
        /// The search query string.
        query: String,

        /// Maximum results to return.
        #[arg(long)]
        limit: Option<usize>,

        /// Minimum relevance score (cosine similarity) to keep a result.
        #[arg(long)]
        min_score: Option<f32>,

        /// Token budget across all returned content; 0 disables it.
        #[arg(long)]
        max_tokens: Option<usize>,

        /// Disable near-duplicate filtering.
        #[arg(long)]
        no_dedup: bool,

        /// Omit assembled passage content from results.
        #[arg(long)]
        no_content: bool,
    },

    /// Retrieve a full item by id.
    Get {
        /// The item id.
        id: String,

        /// Include the primary embedding vector in the output.
        #[arg(long)]
        with_vector: bool,
    },

    /// List stored items.
    List,

    /// Remove an item by id.
    Remove {
        /// The item id.
        id: String,
    },
}

async fn build_service(config: &Config) -> Result<SearchService<SqliteEngine>> {
    let engine = SqliteEngine::connect(&config.store.path).await?;
    let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(config.embedding.dims));
    let probe: Arc<dyn MemoryProbe> = Arc::new(ProcessMemoryProbe::new(config.cache.memory_budget_mb));
    let service = SearchService::new(engine, embedder, probe, config)?;
    service.initialize().await?;
    Ok(service)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let cli = Cli::parse();
    let config = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            build_service(&config).await?;
            println!("initialized {}", config.store.path.display());
        }

        Commands::Ingest {
            file,
            source_type,
            title,
            id,
        } => {
            let service = build_service(&config).await?;
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let source_type = SourceType::from_str(&source_type).map_err(anyhow::Error::msg)?;
            let title = title.unwrap_or_else(|| {
                file.file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "untitled".to_string())
            });

            let item = service
                .ingest(IngestRequest {
                    id,
                    source_type,
                    source_identifier: file.display().to_string(),
                    title,
                    original_path: Some(file.display().to_string()),
                    extracted_text: text,
                    metadata: serde_json::json!({}),
                })
                .await?;

            println!("ingested {}", item.id);
            println!("  title:    {}", item.title);
            println!("  passages: {}", item.passages.len());
        }

        Commands::Search {
            query,
            limit,
            min_score,
            max_tokens,
            no_dedup,
            no_content,
        } => {
            let service = build_service(&config).await?;
            let mut options = service.default_options();
            if let Some(limit) = limit {
                options.limit = limit;
            }
            if let Some(min_score) = min_score {
                options.min_relevance_score = min_score;
            }
            if let Some(max_tokens) = max_tokens {
                options.max_total_tokens = max_tokens;
            }
            if no_dedup {
                options.deduplicate = false;
            }
            if no_content {
                options.include_content = false;
            }

            let results = service.search(&query, Some(options)).await?;
            if results.is_empty() {
                println!("No results.");
                return Ok(());
            }

            for (i, result) in results.iter().enumerate() {
                println!(
                    "{}. [{:.3}] {} ({})",
                    i + 1,
                    result.score,
                    result.title,
                    result.source_type
                );
                println!("   id:     {}", result.item_id);
                println!("   source: {}", result.source_identifier);
                if let Some(ref summary) = result.summary {
                    println!("   summary: {summary}");
                }
                if let Some(ref content) = result.content {
                    let snippet: String = content.chars().take(160).collect();
                    println!("   {snippet}");
                }
                println!("   tokens: ~{}", result.estimated_token_count);
                println!();
            }
        }

        Commands::Get { id, with_vector } => {
            let service = build_service(&config).await?;
            let options = GetOptions {
                include_content: true,
                include_vector: with_vector,
            };
            let item = service.get_by_id(&id, &options).await?;

            println!("--- Item ---");
            println!("id:          {}", item.id);
            println!("title:       {}", item.title);
            println!("source:      {} ({})", item.source_identifier, item.source_type);
            if let Some(ref path) = item.original_path {
                println!("path:        {path}");
            }
            println!("metadata:    {}", item.metadata);
            if with_vector {
                println!("vector dims: {}", item.primary_vector.len());
            }
            println!();
            println!("--- Passages ({}) ---", item.passages.len());
            for (i, passage) in item.passages.iter().enumerate() {
                println!("[passage {i}]");
                println!("{passage}");
                println!();
            }
        }

        Commands::List => {
            let service = build_service(&config).await?;
            let items = service.list_all().await?;
            if items.is_empty() {
                println!("No items.");
                return Ok(());
            }
            for summary in items {
                println!("{}  {}  {}", summary.id, summary.source_type, summary.title);
            }
        }

        Commands::Remove { id } => {
            let service = build_service(&config).await?;
            if service.remove(&id).await? {
                println!("removed {id}");
            } else {
                println!("no item with id {id}");
            }
        }
    }

    Ok(())
}
