//! Background worker that drains the enhancement queue on a poll interval.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument};

use tessera_core::{QueueConfig, Result};

use crate::processor::QueueProcessor;

/// Event emitted by the queue worker.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    /// Worker started.
    WorkerStarted,
    /// A pass claimed at least one item and finished.
    PassCompleted {
        processed: usize,
        completed: usize,
        failed: usize,
    },
    /// One queue item was marked failed.
    ItemFailed { doc_ref: String, error: String },
    /// The pass itself failed (store unreadable, for example).
    PassFailed { error: String },
    /// Worker stopped.
    WorkerStopped,
}

/// Handle for controlling a running worker.
pub struct WorkerHandle {
    shutdown_tx: mpsc::Sender<()>,
    event_rx: broadcast::Receiver<WorkerEvent>,
}

impl WorkerHandle {
    /// Signal the worker to shut down after the current pass.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| tessera_core::Error::Internal("Failed to send shutdown signal".into()))?;
        Ok(())
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_rx.resubscribe()
    }
}

/// Runs [`QueueProcessor::process_queue`] until shut down.
pub struct QueueWorker {
    processor: Arc<QueueProcessor>,
    config: QueueConfig,
    event_tx: broadcast::Sender<WorkerEvent>,
}

impl QueueWorker {
    pub fn new(processor: Arc<QueueProcessor>, config: QueueConfig) -> Self {
        let (event_tx, _) = broadcast::channel(tessera_core::defaults::EVENT_BUS_CAPACITY);
        Self {
            processor,
            config,
            event_tx,
        }
    }

    /// Start the worker and return a handle for control.
    pub fn start(self) -> WorkerHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let event_rx = self.event_tx.subscribe();

        tokio::spawn(async move {
            self.run(&mut shutdown_rx).await;
        });

        WorkerHandle {
            shutdown_tx,
            event_rx,
        }
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_tx.subscribe()
    }

    /// Sleeps only when a pass found nothing to do; a full pass is followed
    /// immediately by the next one.
    #[instrument(skip(self, shutdown_rx), fields(subsystem = "jobs", component = "worker"))]
    async fn run(&self, shutdown_rx: &mut mpsc::Receiver<()>) {
        if !self.config.enabled {
            info!("Queue worker is disabled, not starting");
            return;
        }

        info!(
            poll_interval_ms = self.config.poll_interval_ms,
            batch_size = self.config.batch_size,
            "Queue worker started"
        );
        let _ = self.event_tx.send(WorkerEvent::WorkerStarted);

        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);
        let batch_size = self.config.batch_size.max(1);

        loop {
            if shutdown_rx.try_recv().is_ok() {
                info!("Queue worker received shutdown signal");
                break;
            }

            let processed = match self.processor.process_queue(batch_size).await {
                Ok(report) => {
                    for failure in report.failures {
                        let _ = self.event_tx.send(WorkerEvent::ItemFailed {
                            doc_ref: failure.doc_ref,
                            error: failure.error,
                        });
                    }
                    if report.processed > 0 {
                        let _ = self.event_tx.send(WorkerEvent::PassCompleted {
                            processed: report.processed,
                            completed: report.completed,
                            failed: report.failed,
                        });
                    }
                    report.processed
                }
                Err(e) => {
                    error!(error = %e, "Queue pass failed");
                    let _ = self.event_tx.send(WorkerEvent::PassFailed {
                        error: e.to_string(),
                    });
                    0
                }
            };

            if processed == 0 {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Queue worker received shutdown signal");
                        break;
                    }
                    _ = sleep(poll_interval) => {}
                }
            } else {
                debug!(processed, "Pass done, polling again");
            }
        }

        let _ = self.event_tx.send(WorkerEvent::WorkerStopped);
        info!("Queue worker stopped");
    }
}
