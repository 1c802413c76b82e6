//! Wiring for hosts: one vault directory, one state directory.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use tessera_core::{
    DocumentStore, EventBus, EventSink, LinkingConfig, QueueConfig, Result, SuggestionConfig,
    TextGenerator,
};
use tessera_linking::{LinkingEngine, SuggestionManager};
use tessera_store::{BatchStore, FilesystemDocumentStore, JsonStore, QueueStore};

use crate::processor::QueueProcessor;
use crate::queue::EnhancementQueue;
use crate::worker::QueueWorker;

/// Settings needed to assemble a [`Runtime`].
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub vault_dir: PathBuf,
    pub state_dir: PathBuf,
    pub linking: LinkingConfig,
    pub suggestions: SuggestionConfig,
    pub queue: QueueConfig,
}

impl RuntimeConfig {
    /// Directories from the caller, everything else from the environment.
    pub fn from_env(vault_dir: impl Into<PathBuf>, state_dir: impl Into<PathBuf>) -> Self {
        Self {
            vault_dir: vault_dir.into(),
            state_dir: state_dir.into(),
            linking: LinkingConfig::from_env(),
            suggestions: SuggestionConfig::from_env(),
            queue: QueueConfig::from_env(),
        }
    }
}

/// Engine, lifecycle manager, and queue sharing one event bus.
pub struct Runtime {
    pub engine: Arc<LinkingEngine>,
    pub suggestions: Arc<SuggestionManager>,
    pub processor: Arc<QueueProcessor>,
    pub events: Arc<EventBus>,
    queue_config: QueueConfig,
}

impl Runtime {
    /// Validate the configs and build every component.
    pub fn open(config: RuntimeConfig, generator: Option<Arc<dyn TextGenerator>>) -> Result<Self> {
        config.linking.validate()?;
        config.suggestions.validate()?;

        let docs: Arc<dyn DocumentStore> = Arc::new(FilesystemDocumentStore::new(&config.vault_dir));
        let json = Arc::new(JsonStore::new(&config.state_dir));
        let events = Arc::new(EventBus::default());
        let sink: Arc<dyn EventSink> = events.clone();

        let engine = Arc::new(LinkingEngine::new(docs, config.linking).with_events(sink.clone()));
        let suggestions = Arc::new(
            SuggestionManager::new(BatchStore::new(json.clone()), engine.clone(), config.suggestions)
                .with_events(sink),
        );

        let queue = EnhancementQueue::new(QueueStore::new(json), config.queue.clone());
        let mut processor =
            QueueProcessor::new(queue, engine.clone()).with_suggestions(suggestions.clone());
        if let Some(generator) = generator {
            processor = processor.with_generator(generator);
        }

        info!(
            vault_dir = %config.vault_dir.display(),
            state_dir = %config.state_dir.display(),
            "Runtime assembled"
        );

        Ok(Self {
            engine,
            suggestions,
            processor: Arc::new(processor),
            events,
            queue_config: config.queue,
        })
    }

    pub fn queue(&self) -> &EnhancementQueue {
        self.processor.queue()
    }

    /// A worker over this runtime's processor, not yet started.
    pub fn worker(&self) -> QueueWorker {
        QueueWorker::new(self.processor.clone(), self.queue_config.clone())
    }
}
