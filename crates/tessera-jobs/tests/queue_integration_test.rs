//! Integration tests for the enhancement queue, processor, and worker.
//!
//! Everything runs against a temp vault on disk and a temp state directory,
//! the same layout the `tessera` binary uses.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::time::timeout;

use tessera_core::{
    BatchType, EnhancementSource, GeneratedSuggestion, LinkingConfig, QueueConfig,
    QueueItemStatus, QueuePriority, SuggestionConfig,
};
use tessera_inference::MockTextGenerator;
use tessera_jobs::{Runtime, RuntimeConfig, WorkerEvent};

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

struct Fixture {
    _vault: TempDir,
    _state: TempDir,
    vault_path: std::path::PathBuf,
    runtime: Runtime,
}

fn write_doc(root: &std::path::Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn fixture(queue: QueueConfig, generator: Option<MockTextGenerator>) -> Fixture {
    let vault = tempfile::tempdir().unwrap();
    let state = tempfile::tempdir().unwrap();

    write_doc(
        vault.path(),
        "Calendar/sync.md",
        "---\ntype: event\nevent_id: evt-9\ndate: 2024-01-20T10:00:00\n---\n# Sync\n",
    );
    write_doc(
        vault.path(),
        "Notes/sync-notes.md",
        "---\ntype: note\nevent_id: evt-9\n---\n# Sync notes\n",
    );
    write_doc(
        vault.path(),
        "Finance/lunch.md",
        "---\ntype: transaction\ndate: 2024-01-20T13:00:00\n---\n# Lunch\n",
    );

    let config = RuntimeConfig {
        vault_dir: vault.path().to_path_buf(),
        state_dir: state.path().to_path_buf(),
        linking: LinkingConfig::default(),
        suggestions: SuggestionConfig::default().with_auto_approve(false),
        queue,
    };
    let generator = generator.map(|g| Arc::new(g) as Arc<dyn tessera_core::TextGenerator>);
    let runtime = Runtime::open(config, generator).unwrap();

    Fixture {
        vault_path: vault.path().to_path_buf(),
        _vault: vault,
        _state: state,
        runtime,
    }
}

// ============================================================================
// PROCESSING
// ============================================================================

#[tokio::test]
async fn process_queue_analyzes_by_priority() {
    let f = fixture(QueueConfig::default(), None);
    let queue = f.runtime.queue();

    queue
        .enqueue("Finance/lunch.md", EnhancementSource::Transaction, None, QueuePriority::Low)
        .await
        .unwrap();
    queue
        .enqueue("Calendar/sync.md", EnhancementSource::Calendar, None, QueuePriority::High)
        .await
        .unwrap();

    let report = f.runtime.processor.process_queue(1).await.unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(report.completed, 1);
    // evt-9 is an identifier match, auto-applied in both directions.
    assert_eq!(report.auto_applied, 1);

    let sync = std::fs::read_to_string(f.vault_path.join("Calendar/sync.md")).unwrap();
    assert!(sync.contains("[[Notes/sync-notes]]"));

    let items = queue.items().await.unwrap();
    let lunch = items.iter().find(|i| i.doc_ref == "Finance/lunch.md").unwrap();
    let sync_item = items.iter().find(|i| i.doc_ref == "Calendar/sync.md").unwrap();
    assert_eq!(lunch.status, QueueItemStatus::Queued);
    assert_eq!(sync_item.status, QueueItemStatus::Completed);
    assert_eq!(sync_item.attempts, 1);
}

#[tokio::test]
async fn review_tier_becomes_queue_batch() {
    let f = fixture(QueueConfig::default(), None);
    f.runtime
        .queue()
        .enqueue("Finance/lunch.md", EnhancementSource::Transaction, None, QueuePriority::Medium)
        .await
        .unwrap();

    let report = f.runtime.processor.process_queue(5).await.unwrap();
    assert_eq!(report.completed, 1);
    assert_eq!(report.batches.len(), 1);

    let batch = f.runtime.suggestions.get_batch(report.batches[0]).await.unwrap();
    assert_eq!(batch.batch_type, BatchType::EnhancementQueue);
    assert_eq!(batch.source_operation, "queue:Finance/lunch.md");
    assert!(batch
        .suggestions
        .iter()
        .any(|s| s.target_doc_id.as_deref() == Some("Calendar/sync.md")));
}

#[tokio::test]
async fn missing_document_fails_and_stays_failed() {
    let f = fixture(QueueConfig::default(), None);
    let queue = f.runtime.queue();
    queue
        .enqueue("Notes/gone.md", EnhancementSource::Manual, None, QueuePriority::High)
        .await
        .unwrap();
    queue
        .enqueue("Notes/sync-notes.md", EnhancementSource::Manual, None, QueuePriority::Low)
        .await
        .unwrap();

    let report = f.runtime.processor.process_queue(5).await.unwrap();
    assert_eq!(report.processed, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.completed, 1);
    assert_eq!(report.failures[0].doc_ref, "Notes/gone.md");

    // A second pass does not retry the failed item.
    let again = f.runtime.processor.process_queue(5).await.unwrap();
    assert_eq!(again.processed, 0);

    let stats = queue.stats().await.unwrap();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.completed, 1);
    let failed = queue
        .items()
        .await
        .unwrap()
        .into_iter()
        .find(|i| i.status == QueueItemStatus::Failed)
        .unwrap();
    assert!(failed.last_error.is_some());

    assert_eq!(queue.cleanup().await.unwrap(), 2);
    assert_eq!(queue.stats().await.unwrap().total, 0);
}

#[tokio::test]
async fn enrichment_adds_llm_batch_with_placeholders() {
    let generator = MockTextGenerator::new()
        .with_answer(
            "Finance/lunch.md",
            GeneratedSuggestion {
                target: Some("Notes/sync-notes".into()),
                confidence: 0.7,
                reasoning: "lunch during the sync".into(),
                link_text: None,
            },
        )
        .with_failure("Calendar/sync.md", "model unavailable");

    let f = fixture(
        QueueConfig::default().with_llm_enrichment(true),
        Some(generator.clone()),
    );
    for doc in ["Finance/lunch.md", "Calendar/sync.md"] {
        f.runtime
            .queue()
            .enqueue(doc, EnhancementSource::Manual, None, QueuePriority::Medium)
            .await
            .unwrap();
    }

    let report = f.runtime.processor.process_queue(5).await.unwrap();
    assert_eq!(report.completed, 2);
    assert_eq!(generator.call_count(), 2);

    let pending = f.runtime.suggestions.pending_batches().await.unwrap();
    let llm = pending
        .iter()
        .find(|b| b.batch_type == BatchType::LlmEnrichment)
        .unwrap();
    assert_eq!(llm.suggestions.len(), 2);
    let answered = llm
        .suggestions
        .iter()
        .find(|s| s.source_doc_id == "Finance/lunch.md")
        .unwrap();
    assert_eq!(answered.target_doc_id.as_deref(), Some("Notes/sync-notes.md"));
    let placeholder = llm
        .suggestions
        .iter()
        .find(|s| s.source_doc_id == "Calendar/sync.md")
        .unwrap();
    assert!(placeholder.target_doc_id.is_none());
    assert_eq!(placeholder.confidence, 0.0);
}

// ============================================================================
// WORKER LIFECYCLE
// ============================================================================

#[tokio::test]
async fn worker_processes_and_shuts_down() {
    let f = fixture(QueueConfig::default().with_poll_interval(20), None);
    f.runtime
        .queue()
        .enqueue("Calendar/sync.md", EnhancementSource::Calendar, None, QueuePriority::High)
        .await
        .unwrap();

    let handle = f.runtime.worker().start();
    let mut events = handle.events();

    let completed = timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await {
                Ok(WorkerEvent::PassCompleted { completed, .. }) => return completed,
                Ok(_) => continue,
                Err(e) => panic!("event channel closed: {e}"),
            }
        }
    })
    .await
    .expect("worker did not complete a pass");
    assert_eq!(completed, 1);

    handle.shutdown().await.unwrap();
    let stopped = timeout(Duration::from_secs(5), async {
        loop {
            if let Ok(WorkerEvent::WorkerStopped) = events.recv().await {
                return;
            }
        }
    })
    .await;
    assert!(stopped.is_ok());
}

#[tokio::test]
async fn disabled_worker_never_starts() {
    let f = fixture(QueueConfig::default().with_enabled(false), None);
    let handle = f.runtime.worker().start();
    let mut events = handle.events();

    let received = timeout(Duration::from_millis(100), events.recv()).await;
    assert!(!matches!(received, Ok(Ok(WorkerEvent::WorkerStarted))));
}
