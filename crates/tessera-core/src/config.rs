//! Runtime configuration for linking, suggestion batches, and the enhancement queue.
//!
//! Every config can be built three ways: `Default`, `from_env()` (`TESSERA_*`
//! variables), or `from_json()` for a host settings blob where missing fields
//! take their defaults.

use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::error::{Error, Result};

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .map(|v| v != "false" && v != "0")
}

fn check_unit(name: &str, value: f32) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::Config(format!("{} must be within [0, 1], got {}", name, value)))
    }
}

// =============================================================================
// LINKING
// =============================================================================

/// Configuration for matchers, the categorizer, and the link applier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LinkingConfig {
    /// Master switch; when off every engine operation is a no-op.
    pub enabled: bool,
    /// Time window for document kinds without a specific window (minutes).
    pub base_time_window_minutes: i64,
    /// Entity matches below this confidence are discarded.
    pub fuzzy_match_threshold: f32,
    /// Maximum location distance kept by the location matcher.
    pub location_radius: f64,
    /// Auto-apply tier lower bound.
    pub high_confidence_threshold: f32,
    /// Review tier lower bound.
    pub medium_confidence_threshold: f32,
    /// Auto-apply cap per document per analysis pass.
    pub max_links_per_note: usize,
    /// Frontmatter fields compared by the identifier matcher.
    pub identifier_fields: Vec<String>,
    /// Apply the auto-apply tier during analysis.
    pub auto_apply: bool,
    /// Emit suggestions flagged bidirectional.
    pub bidirectional_links: bool,
}

impl Default for LinkingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_time_window_minutes: defaults::BASE_TIME_WINDOW_MINUTES,
            fuzzy_match_threshold: defaults::FUZZY_MATCH_THRESHOLD,
            location_radius: defaults::LOCATION_RADIUS,
            high_confidence_threshold: defaults::HIGH_CONFIDENCE_THRESHOLD,
            medium_confidence_threshold: defaults::MEDIUM_CONFIDENCE_THRESHOLD,
            max_links_per_note: defaults::MAX_LINKS_PER_NOTE,
            identifier_fields: defaults::IDENTIFIER_FIELDS
                .iter()
                .map(|f| f.to_string())
                .collect(),
            auto_apply: true,
            bidirectional_links: true,
        }
    }
}

impl LinkingConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `TESSERA_LINKING_ENABLED` | `true` | Enable/disable linking |
    /// | `TESSERA_TIME_WINDOW_MINUTES` | `60` | Base time window |
    /// | `TESSERA_FUZZY_THRESHOLD` | `0.70` | Entity match floor |
    /// | `TESSERA_LOCATION_RADIUS` | `100` | Location radius |
    /// | `TESSERA_HIGH_CONFIDENCE` | `0.85` | Auto-apply threshold |
    /// | `TESSERA_MEDIUM_CONFIDENCE` | `0.60` | Review threshold |
    /// | `TESSERA_MAX_LINKS_PER_NOTE` | `5` | Auto-apply cap |
    /// | `TESSERA_IDENTIFIER_FIELDS` | `ical_uid,transaction_id,event_id` | Identifier fields |
    /// | `TESSERA_AUTO_APPLY` | `true` | Apply the auto tier |
    /// | `TESSERA_BIDIRECTIONAL` | `true` | Mirror applied links |
    pub fn from_env() -> Self {
        let base = Self::default();
        Self {
            enabled: env_bool("TESSERA_LINKING_ENABLED").unwrap_or(base.enabled),
            base_time_window_minutes: env_parse("TESSERA_TIME_WINDOW_MINUTES")
                .unwrap_or(base.base_time_window_minutes),
            fuzzy_match_threshold: env_parse("TESSERA_FUZZY_THRESHOLD")
                .unwrap_or(base.fuzzy_match_threshold),
            location_radius: env_parse("TESSERA_LOCATION_RADIUS").unwrap_or(base.location_radius),
            high_confidence_threshold: env_parse("TESSERA_HIGH_CONFIDENCE")
                .unwrap_or(base.high_confidence_threshold),
            medium_confidence_threshold: env_parse("TESSERA_MEDIUM_CONFIDENCE")
                .unwrap_or(base.medium_confidence_threshold),
            max_links_per_note: env_parse("TESSERA_MAX_LINKS_PER_NOTE")
                .unwrap_or(base.max_links_per_note),
            identifier_fields: std::env::var("TESSERA_IDENTIFIER_FIELDS")
                .ok()
                .map(|v| {
                    v.split(',')
                        .map(|f| f.trim().to_string())
                        .filter(|f| !f.is_empty())
                        .collect()
                })
                .unwrap_or(base.identifier_fields),
            auto_apply: env_bool("TESSERA_AUTO_APPLY").unwrap_or(base.auto_apply),
            bidirectional_links: env_bool("TESSERA_BIDIRECTIONAL")
                .unwrap_or(base.bidirectional_links),
        }
    }

    /// Parse a host settings blob; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject out-of-range thresholds and non-positive windows.
    pub fn validate(&self) -> Result<()> {
        check_unit("fuzzyMatchThreshold", self.fuzzy_match_threshold)?;
        check_unit("highConfidenceThreshold", self.high_confidence_threshold)?;
        check_unit("mediumConfidenceThreshold", self.medium_confidence_threshold)?;
        if self.medium_confidence_threshold > self.high_confidence_threshold {
            return Err(Error::Config(
                "mediumConfidenceThreshold must not exceed highConfidenceThreshold".to_string(),
            ));
        }
        if self.base_time_window_minutes <= 0 {
            return Err(Error::Config(
                "baseTimeWindowMinutes must be positive".to_string(),
            ));
        }
        if self.location_radius <= 0.0 {
            return Err(Error::Config("locationRadius must be positive".to_string()));
        }
        Ok(())
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_thresholds(mut self, high: f32, medium: f32) -> Self {
        self.high_confidence_threshold = high;
        self.medium_confidence_threshold = medium;
        self
    }

    pub fn with_max_links_per_note(mut self, max: usize) -> Self {
        self.max_links_per_note = max;
        self
    }

    pub fn with_fuzzy_match_threshold(mut self, threshold: f32) -> Self {
        self.fuzzy_match_threshold = threshold;
        self
    }

    pub fn with_location_radius(mut self, radius: f64) -> Self {
        self.location_radius = radius;
        self
    }

    pub fn with_auto_apply(mut self, auto_apply: bool) -> Self {
        self.auto_apply = auto_apply;
        self
    }

    pub fn with_bidirectional_links(mut self, bidirectional: bool) -> Self {
        self.bidirectional_links = bidirectional;
        self
    }
}

// =============================================================================
// SUGGESTION BATCHES
// =============================================================================

/// Configuration for the suggestion batch lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SuggestionConfig {
    /// Items at or above this confidence are approved at batch creation.
    /// Independent of the categorizer thresholds.
    pub high_confidence_threshold: f32,
    /// Run the auto-approval sweep at batch creation.
    pub auto_approve: bool,
    /// Number of archived batches kept.
    pub archive_cap: usize,
}

impl Default for SuggestionConfig {
    fn default() -> Self {
        Self {
            high_confidence_threshold: defaults::AUTO_APPROVE_THRESHOLD,
            auto_approve: true,
            archive_cap: defaults::ARCHIVE_CAP,
        }
    }
}

impl SuggestionConfig {
    /// | Variable | Default |
    /// |----------|---------|
    /// | `TESSERA_AUTO_APPROVE_THRESHOLD` | `0.90` |
    /// | `TESSERA_AUTO_APPROVE` | `true` |
    /// | `TESSERA_ARCHIVE_CAP` | `50` |
    pub fn from_env() -> Self {
        let base = Self::default();
        Self {
            high_confidence_threshold: env_parse("TESSERA_AUTO_APPROVE_THRESHOLD")
                .unwrap_or(base.high_confidence_threshold),
            auto_approve: env_bool("TESSERA_AUTO_APPROVE").unwrap_or(base.auto_approve),
            archive_cap: env_parse("TESSERA_ARCHIVE_CAP").unwrap_or(base.archive_cap),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        check_unit("highConfidenceThreshold", self.high_confidence_threshold)
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.high_confidence_threshold = threshold;
        self
    }

    pub fn with_auto_approve(mut self, auto_approve: bool) -> Self {
        self.auto_approve = auto_approve;
        self
    }

    pub fn with_archive_cap(mut self, cap: usize) -> Self {
        self.archive_cap = cap;
        self
    }
}

// =============================================================================
// ENHANCEMENT QUEUE
// =============================================================================

/// Configuration for the enhancement queue and its worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QueueConfig {
    /// Whether queue processing runs at all.
    pub enabled: bool,
    /// Items taken per `process_queue` call.
    pub batch_size: usize,
    /// Worker poll interval in milliseconds.
    pub poll_interval_ms: u64,
    /// Ask the text generator for an extra suggestion per processed document.
    pub llm_enrichment: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            batch_size: defaults::QUEUE_BATCH_SIZE,
            poll_interval_ms: defaults::QUEUE_POLL_INTERVAL_MS,
            llm_enrichment: false,
        }
    }
}

impl QueueConfig {
    /// | Variable | Default |
    /// |----------|---------|
    /// | `TESSERA_QUEUE_ENABLED` | `true` |
    /// | `TESSERA_QUEUE_BATCH_SIZE` | `5` |
    /// | `TESSERA_QUEUE_POLL_INTERVAL_MS` | `30000` |
    /// | `TESSERA_LLM_ENRICHMENT` | `false` |
    pub fn from_env() -> Self {
        let base = Self::default();
        Self {
            enabled: env_bool("TESSERA_QUEUE_ENABLED").unwrap_or(base.enabled),
            batch_size: env_parse::<usize>("TESSERA_QUEUE_BATCH_SIZE")
                .unwrap_or(base.batch_size)
                .max(1),
            poll_interval_ms: env_parse("TESSERA_QUEUE_POLL_INTERVAL_MS")
                .unwrap_or(base.poll_interval_ms),
            llm_enrichment: env_bool("TESSERA_LLM_ENRICHMENT").unwrap_or(base.llm_enrichment),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        if config.batch_size == 0 {
            return Err(Error::Config("batchSize must be at least 1".to_string()));
        }
        Ok(config)
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_llm_enrichment(mut self, enabled: bool) -> Self {
        self.llm_enrichment = enabled;
        self
    }
}
