// src/pipeline/mod.rs

//! Pipelines and transform stages.
//!
//! - [`artifact`] defines the immutable [`Artifact`] value and its hash.
//! - [`stage`] defines the [`Stage`] trait and its per-run context.
//! - [`cache`] provides content-addressed memoization of stage output.
//! - [`source`] resolves source globs into input artifacts.
//! - [`stages`] contains the built-in stages.
//!
//! A [`Pipeline`] reads its sources, runs the stages left to right and
//! writes whatever the last stage yields under its output namespace. It
//! only reports completion once every artifact has been written.

pub mod artifact;
pub mod cache;
pub mod source;
pub mod stage;
pub mod stages;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::anyhow;
use tracing::{debug, info};

use crate::errors::StageError;
use crate::fs::FileSystem;
use crate::types::AssetKind;

pub use artifact::{Artifact, ContentHash};
pub use cache::{ArtifactCache, CacheKey, Cached};
pub use source::SourceSet;
pub use stage::{ArtifactIter, FnStage, Stage, StageContext, per_artifact};

/// An ordered composition of stages producing one named output.
pub struct Pipeline {
    sources: SourceSet,
    dest: PathBuf,
    kind: AssetKind,
    stages: Vec<Box<dyn Stage>>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("sources", &self.sources)
            .field("dest", &self.dest)
            .field("kind", &self.kind)
            .field("stages", &self.stage_names())
            .finish()
    }
}

impl Pipeline {
    pub fn new(sources: SourceSet, dest: impl Into<PathBuf>, kind: AssetKind) -> Self {
        Self {
            sources,
            dest: dest.into(),
            kind,
            stages: Vec::new(),
        }
    }

    /// Append a stage.
    pub fn stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn with_stages(mut self, stages: Vec<Box<dyn Stage>>) -> Self {
        self.stages.extend(stages);
        self
    }

    pub fn kind(&self) -> AssetKind {
        self.kind
    }

    /// Output namespace, relative to the output directory.
    pub fn dest(&self) -> &Path {
        &self.dest
    }

    pub fn sources(&self) -> &SourceSet {
        &self.sources
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run the pipeline to completion on the current thread.
    ///
    /// Returns the written paths, relative to `output_dir`.
    pub fn run_blocking(
        &self,
        ctx: &StageContext,
        fs: &dyn FileSystem,
        output_dir: &Path,
    ) -> Result<Vec<PathBuf>, StageError> {
        let inputs = self
            .sources
            .collect(fs, &ctx.root)
            .map_err(|e| StageError::new("source", e))?;

        debug!(
            task = %ctx.task,
            generation = ctx.generation,
            inputs = inputs.len(),
            stages = ?self.stage_names(),
            "running pipeline"
        );

        let mut stream: ArtifactIter<'_> = Box::new(inputs.into_iter().map(Ok));
        for stage in &self.stages {
            stream = stage.process(stream, ctx);
        }

        let target_dir = output_dir.join(&self.dest);
        let mut written = Vec::new();
        for item in stream {
            let artifact = item?;
            let target = target_dir.join(&artifact.path);
            fs.write(&target, &artifact.content)
                .map_err(|e| StageError::new("write", e))?;
            written.push(self.dest.join(&artifact.path));
        }

        info!(
            task = %ctx.task,
            generation = ctx.generation,
            written = written.len(),
            "pipeline complete"
        );
        Ok(written)
    }

    /// Run the pipeline on the blocking thread pool.
    ///
    /// The returned future resolves once every artifact has been written.
    pub async fn run(
        self: Arc<Self>,
        ctx: StageContext,
        fs: Arc<dyn FileSystem>,
        output_dir: PathBuf,
    ) -> Result<Vec<PathBuf>, StageError> {
        tokio::task::spawn_blocking(move || self.run_blocking(&ctx, fs.as_ref(), &output_dir))
            .await
            .map_err(|e| StageError::new("pipeline", anyhow!("pipeline worker panicked: {e}")))?
    }
}
