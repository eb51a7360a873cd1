use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use semdex::chunker::chunker_for;
use semdex::config::{load_config, Config};
use semdex::embedding::{create_providers, EmbeddingCache, EmbeddingService};
use semdex::library::{DocumentLibrary, FsLibrary};
use semdex::pipeline::IndexingPipeline;
use semdex::repository::IndexRepository;
use semdex::status_cmd;
use semdex::store::{SearchFilters, VectorStore};
use semdex::{db, migrate};

#[derive(Parser)]
#[command(name = "semdex", version, about = "Semantic indexing and search for document libraries")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "semdex.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the database schema
    Init,
    /// Index documents from the library
    Index {
        /// Document ids to index; omit with --all to index everything
        ids: Vec<i64>,
        /// Index every document in the library
        #[arg(long)]
        all: bool,
        /// Rebuild indexes that already have content
        #[arg(long)]
        reindex: bool,
    },
    /// Search indexed chunks by semantic similarity
    Search {
        /// Query text, embedded with the configured provider chain
        query: String,
        /// Maximum number of results
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
        /// Restrict to specific index ids; omit to search all indexes
        #[arg(long = "index")]
        indexes: Vec<i64>,
        /// Only chunks from these documents
        #[arg(long = "include-doc")]
        include_docs: Vec<i64>,
        /// Never chunks from these documents
        #[arg(long = "exclude-doc")]
        exclude_docs: Vec<i64>,
        /// Only documents whose author list contains this substring
        #[arg(long)]
        author: Option<String>,
        /// Only documents carrying at least one of these tags
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// Show per-document indexing status
    Status,
    /// Show library-wide indexing statistics
    Stats,
    /// Inspect or delete indexes
    Indexes {
        #[command(subcommand)]
        command: IndexesCommand,
    },
}

#[derive(Subcommand)]
enum IndexesCommand {
    /// List every index with its statistics
    List,
    /// Delete one index and its chunks
    Delete { index_id: i64 },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "semdex=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;

    let pool = db::connect(&config.db.path).await?;
    migrate::run_migrations(&pool).await?;
    let store = Arc::new(VectorStore::new(pool).await);

    match cli.command {
        Command::Init => {
            println!("Database initialized at {}", config.db.path.display());
        }
        Command::Index { ids, all, reindex } => {
            let pipeline = build_pipeline(&config, store)?;
            let ids = if all {
                pipeline_library(&config)?.list_document_ids().await?
            } else if ids.is_empty() {
                anyhow::bail!("specify document ids or pass --all");
            } else {
                ids
            };

            pipeline.register_progress_callback(Box::new(|event| {
                if let Some(error) = &event.error {
                    eprintln!(
                        "[{}/{}] document {}: {} ({})",
                        event.current,
                        event.total,
                        event.document_id,
                        event.state.as_str(),
                        error
                    );
                } else {
                    eprintln!(
                        "[{}/{}] document {}: {} {:.0}%",
                        event.current,
                        event.total,
                        event.document_id,
                        event.state.as_str(),
                        event.progress * 100.0
                    );
                }
            }));

            let report = pipeline.index_documents(&ids, reindex).await;
            println!(
                "Indexed {} of {} documents ({} skipped, {} failed, {} chunks) in {:.1}s{}",
                report.successful,
                ids.len(),
                report.skipped,
                report.failed,
                report.total_chunks,
                report.elapsed.as_secs_f64(),
                if report.cancelled { " [cancelled]" } else { "" },
            );
            for error in &report.errors {
                eprintln!("  document {}: {}", error.document_id, error.error);
            }
        }
        Command::Search {
            query,
            limit,
            indexes,
            include_docs,
            exclude_docs,
            author,
            tags,
        } => {
            let repository = IndexRepository::new(store.clone());
            let providers = create_providers(&config.embedding)?;
            let service = EmbeddingService::new(
                providers,
                Some(EmbeddingCache::new(config.embedding.cache_size)),
                config.embedding.max_tokens,
            )?;

            let index_ids: Vec<i64> = if indexes.is_empty() {
                store.all_indexes().await?.iter().map(|i| i.index_id).collect()
            } else {
                indexes
            };
            if index_ids.is_empty() {
                println!("No indexes to search. Run `semdex index` first.");
                return Ok(());
            }

            let vector = service.generate_embedding(&query).await?;
            let filters = SearchFilters {
                include_documents: include_docs,
                exclude_documents: exclude_docs,
                author_contains: author,
                any_tags: tags,
            };
            let results = repository
                .search_across_indexes(&index_ids, &vector, limit, &filters)
                .await?;

            if results.is_empty() {
                println!("No results.");
            }
            for (rank, result) in results.iter().enumerate() {
                println!(
                    "{}. [{:.3}] doc {} chunk {} — {}",
                    rank + 1,
                    result.similarity,
                    result.document_id,
                    result.position,
                    preview(&result.text, 160),
                );
            }
        }
        Command::Status => {
            let statuses = store.all_statuses().await?;
            print!("{}", status_cmd::render_statuses(&statuses));
        }
        Command::Stats => {
            let pipeline = build_pipeline(&config, store)?;
            let stats = pipeline.get_library_statistics().await?;
            print!("{}", status_cmd::render_library_statistics(&stats));
        }
        Command::Indexes { command } => match command {
            IndexesCommand::List => {
                let repository = IndexRepository::new(store.clone());
                let mut rows = Vec::new();
                for index in store.all_indexes().await? {
                    let stats = repository.get_index_statistics(index.index_id).await?;
                    rows.push((index, stats));
                }
                print!("{}", status_cmd::render_indexes(&rows));
            }
            IndexesCommand::Delete { index_id } => {
                if store.delete_index(index_id).await? {
                    println!("Deleted index {index_id}");
                } else {
                    println!("No index {index_id}");
                }
            }
        },
    }

    Ok(())
}

fn pipeline_library(config: &Config) -> Result<Arc<dyn DocumentLibrary>> {
    Ok(Arc::new(FsLibrary::open(&config.library)?))
}

fn build_pipeline(config: &Config, store: Arc<VectorStore>) -> Result<IndexingPipeline> {
    let library = pipeline_library(config)?;
    let providers = create_providers(&config.embedding)?;
    let service = EmbeddingService::new(
        providers,
        Some(EmbeddingCache::new(config.embedding.cache_size)),
        config.embedding.max_tokens,
    )?;
    let repository = IndexRepository::new(store);
    let chunker = chunker_for(&config.chunking);
    Ok(IndexingPipeline::new(
        library,
        service,
        repository,
        chunker,
        config.chunking.clone(),
        &config.pipeline,
    ))
}

fn preview(text: &str, max: usize) -> String {
    let flattened: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flattened.chars().count() <= max {
        return flattened;
    }
    let truncated: String = flattened.chars().take(max).collect();
    format!("{truncated}…")
}
