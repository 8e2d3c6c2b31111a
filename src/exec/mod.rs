// src/exec/mod.rs

//! Pipeline execution layer.
//!
//! The runtime hands ready tasks to an [`ExecutorBackend`]; the production
//! [`PipelineExecutor`] runs their pipelines and reports back to the
//! orchestration runtime via `RuntimeEvent`s.

pub mod backend;

pub use backend::{ExecutorBackend, OutputLayout, PipelineExecutor};
