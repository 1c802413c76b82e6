//! Deterministic text generator for tests and offline hosts.
//!
//! ```rust
//! use tessera_core::GeneratedSuggestion;
//! use tessera_inference::mock::MockTextGenerator;
//!
//! let generator = MockTextGenerator::new()
//!     .with_answer("Notes/a.md", GeneratedSuggestion {
//!         target: Some("Notes/b".into()),
//!         confidence: 0.8,
//!         reasoning: "same project".into(),
//!         link_text: None,
//!     })
//!     .with_failure("Notes/broken.md", "model unavailable");
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use tessera_core::{Document, Error, GeneratedSuggestion, Result, TextGenerator};

#[derive(Debug, Clone, Default)]
struct MockConfig {
    answers: HashMap<String, GeneratedSuggestion>,
    failures: HashMap<String, String>,
    default_answer: Option<GeneratedSuggestion>,
    freeform: Vec<String>,
}

/// Mock generator keyed by document id.
///
/// Documents without a configured answer get the default answer, or an
/// enrichment error when none is set.
#[derive(Clone, Default)]
pub struct MockTextGenerator {
    config: Arc<MockConfig>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockTextGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer for one document id.
    pub fn with_answer(mut self, doc_id: impl Into<String>, answer: GeneratedSuggestion) -> Self {
        Arc::make_mut(&mut self.config)
            .answers
            .insert(doc_id.into(), answer);
        self
    }

    /// Fail `enhance` for one document id.
    pub fn with_failure(mut self, doc_id: impl Into<String>, message: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config)
            .failures
            .insert(doc_id.into(), message.into());
        self
    }

    pub fn with_default_answer(mut self, answer: GeneratedSuggestion) -> Self {
        Arc::make_mut(&mut self.config).default_answer = Some(answer);
        self
    }

    pub fn with_freeform(mut self, lines: Vec<String>) -> Self {
        Arc::make_mut(&mut self.config).freeform = lines;
        self
    }

    /// Document ids passed to `enhance`, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls().len()
    }
}

#[async_trait]
impl TextGenerator for MockTextGenerator {
    async fn enhance(&self, document: &Document) -> Result<GeneratedSuggestion> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(document.id.clone());

        if let Some(message) = self.config.failures.get(&document.id) {
            return Err(Error::Enrichment(message.clone()));
        }
        self.config
            .answers
            .get(&document.id)
            .or(self.config.default_answer.as_ref())
            .cloned()
            .ok_or_else(|| Error::Enrichment(format!("no mock answer for {}", document.id)))
    }

    async fn generate_freeform(&self, _prompt: &str) -> Result<Vec<String>> {
        Ok(self.config.freeform.clone())
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}
