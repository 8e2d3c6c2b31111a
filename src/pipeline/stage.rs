// src/pipeline/stage.rs

//! The transform stage interface.
//!
//! A stage consumes a lazy stream of artifacts and yields another one. Stages
//! are composed left to right by [`crate::pipeline::Pipeline`]; the output of
//! the last stage is what gets written.

use std::path::PathBuf;
use std::sync::Arc;

use crate::errors::StageError;
use crate::pipeline::ArtifactCache;
use crate::pipeline::artifact::Artifact;
use crate::types::{Generation, TaskName};

/// Finite, non-restartable stream of stage results.
pub type ArtifactIter<'a> = Box<dyn Iterator<Item = Result<Artifact, StageError>> + Send + 'a>;

/// Per-invocation context handed to every stage.
#[derive(Debug, Clone)]
pub struct StageContext {
    pub task: TaskName,
    pub generation: Generation,
    /// Project root all source globs are relative to.
    pub root: PathBuf,
    pub cache: Arc<ArtifactCache>,
}

impl StageContext {
    pub fn new(
        task: impl Into<TaskName>,
        generation: Generation,
        root: impl Into<PathBuf>,
        cache: Arc<ArtifactCache>,
    ) -> Self {
        Self {
            task: task.into(),
            generation,
            root: root.into(),
            cache,
        }
    }
}

pub trait Stage: Send + Sync {
    /// Name used in errors, logs and cache keys.
    fn name(&self) -> &str;

    /// Transform `inputs` into a new artifact stream.
    ///
    /// Errors already present in `inputs` must be passed through unchanged.
    fn process<'a>(&'a self, inputs: ArtifactIter<'a>, ctx: &'a StageContext) -> ArtifactIter<'a>;
}

impl<S: Stage + ?Sized> Stage for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn process<'a>(&'a self, inputs: ArtifactIter<'a>, ctx: &'a StageContext) -> ArtifactIter<'a> {
        (**self).process(inputs, ctx)
    }
}

/// Apply `f` to each successful input, forwarding upstream errors.
///
/// Most stages are one-to-many maps; this keeps them from re-implementing
/// error forwarding.
pub fn per_artifact<'a, F>(stage: &'a str, inputs: ArtifactIter<'a>, f: F) -> ArtifactIter<'a>
where
    F: Fn(Artifact) -> anyhow::Result<Vec<Artifact>> + Send + 'a,
{
    Box::new(inputs.flat_map(move |input| -> Vec<Result<Artifact, StageError>> {
        match input {
            Err(err) => vec![Err(err)],
            Ok(artifact) => {
                let path = artifact.path.clone();
                match f(artifact) {
                    Ok(out) => out.into_iter().map(Ok).collect(),
                    Err(cause) => vec![Err(StageError::new(
                        stage,
                        cause.context(format!("processing {}", path.display())),
                    ))],
                }
            }
        }
    }))
}

/// A stage backed by a closure, for library users composing pipelines in
/// code.
pub struct FnStage<F> {
    name: String,
    f: F,
}

impl<F> FnStage<F>
where
    F: Fn(Artifact, &StageContext) -> anyhow::Result<Vec<Artifact>> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> Stage for FnStage<F>
where
    F: Fn(Artifact, &StageContext) -> anyhow::Result<Vec<Artifact>> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn process<'a>(&'a self, inputs: ArtifactIter<'a>, ctx: &'a StageContext) -> ArtifactIter<'a> {
        per_artifact(&self.name, inputs, move |artifact| (self.f)(artifact, ctx))
    }
}
