//! # tessera-jobs
//!
//! Deferred relationship analysis for tessera.
//!
//! This crate provides:
//! - The durable enhancement queue with priority ordering and replace-on-requeue
//! - A processor that drains the queue through the linking engine
//! - A background worker with broadcast events and graceful shutdown
//! - Runtime wiring used by the `tessera` command-line host
//!
//! ## Example
//!
//! ```ignore
//! use tessera_jobs::{Runtime, RuntimeConfig};
//!
//! let runtime = Runtime::open(RuntimeConfig::from_env("vault", ".tessera"), None)?;
//!
//! // Start worker and get handle
//! let handle = runtime.worker().start();
//!
//! // Listen for events
//! let mut events = handle.events();
//! while let Ok(event) = events.recv().await {
//!     println!("Event: {:?}", event);
//! }
//!
//! // Graceful shutdown
//! handle.shutdown().await?;
//! ```

pub mod processor;
pub mod queue;
pub mod runtime;
pub mod worker;

// Re-export core types
pub use tessera_core::*;

pub use processor::{ItemFailure, ProcessReport, QueueProcessor};
pub use queue::EnhancementQueue;
pub use runtime::{Runtime, RuntimeConfig};
pub use worker::{QueueWorker, WorkerEvent, WorkerHandle};
