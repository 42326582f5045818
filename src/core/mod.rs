//! Run orchestration: per-target pipeline, worker pool and product discovery.

pub mod discovery;
pub mod orchestrator;
pub mod pipeline;
pub mod worker_pool;

pub use discovery::discover_product_ids;
pub use orchestrator::{Orchestrator, RunReport, TargetFailure};
pub use pipeline::ProductPipeline;
pub use worker_pool::{TargetOutcome, WorkerPool};
