//! tessera: command-line host for relationship discovery over a markdown vault.
//!
//! Documents are read from and links written into `--vault`; batches and the
//! enhancement queue live as JSON files under `--state`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use uuid::Uuid;

use tessera_core::{EnhancementSource, QueuePriority, TextGenerator};
use tessera_inference::OllamaGenerator;
use tessera_jobs::{Runtime, RuntimeConfig, WorkerEvent};

#[derive(Parser)]
#[command(name = "tessera")]
#[command(author, version, about = "Relationship discovery for markdown vaults")]
#[command(propagate_version = true)]
struct Cli {
    /// Vault root holding the markdown documents
    #[arg(long, default_value = ".")]
    vault: PathBuf,

    /// Directory for pending.json, archived.json and queue.json
    #[arg(long, default_value = ".tessera")]
    state: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild the indices and print their sizes
    Refresh,

    /// Analyze one document and store its review tier as a batch
    Analyze {
        /// Vault-relative document path
        doc: String,
    },

    /// List pending batches and their items
    Pending,

    /// Approve a suggestion, or every pending item of a batch with --batch
    Approve {
        id: Uuid,

        /// Treat the id as a batch id
        #[arg(long)]
        batch: bool,
    },

    /// Reject a suggestion, or every pending item of a batch with --batch
    Reject {
        id: Uuid,

        /// Treat the id as a batch id
        #[arg(long)]
        batch: bool,
    },

    /// Write every approved suggestion of a batch into the vault
    Apply { batch_id: Uuid },

    /// Queue a document for deferred analysis
    Enqueue {
        doc: String,

        /// high, medium or low
        #[arg(short, long, default_value = "medium", value_parser = parse_priority)]
        priority: QueuePriority,

        /// calendar, transaction, manual or chat
        #[arg(short, long, default_value = "manual", value_parser = parse_source)]
        source: EnhancementSource,
    },

    /// Process one pass of the enhancement queue
    ProcessQueue {
        /// Items to take (default: TESSERA_QUEUE_BATCH_SIZE)
        #[arg(short, long)]
        batch_size: Option<usize>,
    },

    /// Remove completed and failed queue items
    CleanupQueue,

    /// Show queue counts by status
    QueueStats,

    /// Run the queue worker until interrupted
    Worker,
}

fn parse_priority(value: &str) -> Result<QueuePriority, String> {
    serde_json::from_value(serde_json::Value::String(value.to_lowercase()))
        .map_err(|_| format!("unknown priority '{}'", value))
}

fn parse_source(value: &str) -> Result<EnhancementSource, String> {
    serde_json::from_value(serde_json::Value::String(value.to_lowercase()))
        .map_err(|_| format!("unknown source '{}'", value))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Initialize tracing on stderr so stdout stays machine readable.
///
/// `TESSERA_LOG_FORMAT=json` switches to JSON lines; `RUST_LOG` overrides the
/// default filter.
fn init_tracing() {
    let log_format = std::env::var("TESSERA_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "tessera=info".into());

    let registry = tracing_subscriber::registry().with(env_filter);
    if log_format == "json" {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = RuntimeConfig::from_env(&cli.vault, &cli.state);

    let generator: Option<Arc<dyn TextGenerator>> = if config.queue.llm_enrichment {
        Some(Arc::new(
            OllamaGenerator::from_env().context("failed to create text generator")?,
        ))
    } else {
        None
    };
    let runtime = Runtime::open(config, generator).context("failed to assemble runtime")?;

    match cli.command {
        Commands::Refresh => {
            let stats = runtime.engine.refresh_indices().await?;
            print_json(&stats)?;
        }
        Commands::Analyze { doc } => {
            runtime.engine.refresh_indices().await?;
            let result = runtime.engine.analyze_note(&doc).await?;
            let batch = runtime.suggestions.batch_from_analysis(&result).await?;
            print_json(&serde_json::json!({
                "analysis": result,
                "batchId": batch.map(|b| b.id),
            }))?;
        }
        Commands::Pending => {
            let batches = runtime.suggestions.pending_batches().await?;
            if batches.is_empty() {
                println!("No pending batches");
            }
            for batch in batches {
                println!(
                    "{} {} ({}) {}",
                    batch.id,
                    batch.batch_type.as_str(),
                    batch.source_operation,
                    batch.timestamp.format("%Y-%m-%d %H:%M")
                );
                for item in &batch.suggestions {
                    println!(
                        "  {} [{}] {} -> {} {:.2} {}",
                        item.id,
                        item.status.as_str(),
                        item.source_doc_id,
                        item.target_doc_id.as_deref().unwrap_or("-"),
                        item.confidence,
                        item.link_type.as_str()
                    );
                }
            }
        }
        Commands::Approve { id, batch } => {
            if batch {
                let changed = runtime.suggestions.approve_all(id).await?;
                println!("Approved {} suggestion(s)", changed);
            } else {
                let batch = runtime.suggestions.approve_suggestion(id).await?;
                println!("Approved {} in batch {}", id, batch.id);
            }
        }
        Commands::Reject { id, batch } => {
            if batch {
                let changed = runtime.suggestions.reject_all(id).await?;
                println!("Rejected {} suggestion(s)", changed);
            } else {
                let batch = runtime.suggestions.reject_suggestion(id).await?;
                println!("Rejected {} in batch {}", id, batch.id);
            }
        }
        Commands::Apply { batch_id } => {
            runtime.engine.refresh_indices().await?;
            let report = runtime.suggestions.apply_approved(batch_id).await?;
            print_json(&report)?;
            if report.failed > 0 {
                bail!("{} suggestion(s) failed to apply", report.failed);
            }
        }
        Commands::Enqueue {
            doc,
            priority,
            source,
        } => match runtime.queue().enqueue(&doc, source, None, priority).await? {
            Some(item) => print_json(&item)?,
            None => println!("Queue is disabled"),
        },
        Commands::ProcessQueue { batch_size } => {
            let size = batch_size.unwrap_or(runtime.queue().config().batch_size);
            let report = runtime.processor.process_queue(size).await?;
            print_json(&report)?;
        }
        Commands::CleanupQueue => {
            let removed = runtime.queue().cleanup().await?;
            println!("Removed {} item(s)", removed);
        }
        Commands::QueueStats => {
            print_json(&runtime.queue().stats().await?)?;
        }
        Commands::Worker => run_worker(&runtime).await?,
    }

    Ok(())
}

async fn run_worker(runtime: &Runtime) -> anyhow::Result<()> {
    let handle = runtime.worker().start();
    let mut worker_events = handle.events();
    let mut link_events = runtime.events.subscribe();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupt received, stopping worker");
                handle.shutdown().await?;
                break;
            }
            Ok(event) = worker_events.recv() => match event {
                WorkerEvent::ItemFailed { doc_ref, error } => {
                    eprintln!("failed: {} ({})", doc_ref, error);
                }
                WorkerEvent::PassCompleted { processed, completed, failed } => {
                    eprintln!("pass: {} processed, {} completed, {} failed", processed, completed, failed);
                }
                WorkerEvent::WorkerStopped => break,
                _ => {}
            },
            Ok(envelope) = link_events.recv() => {
                eprintln!("{}", envelope.payload.summary());
            }
        }
    }
    Ok(())
}
