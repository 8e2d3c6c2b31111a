// src/pipeline/cache.rs

//! Content-addressed memoization for transform stages.
//!
//! A [`Cached`] stage looks up `(scope, source path, content hash)` in the
//! shared [`ArtifactCache`] before invoking its inner stage. The cache lives
//! in the build context, so it survives across build generations for the
//! whole process.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use tracing::{debug, trace};

use crate::errors::StageError;
use crate::pipeline::artifact::{Artifact, ContentHash};
use crate::pipeline::stage::{ArtifactIter, Stage, StageContext};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    scope: String,
    source: PathBuf,
    hash: ContentHash,
}

impl CacheKey {
    pub fn new(scope: &str, source: &Path, hash: ContentHash) -> Self {
        Self {
            scope: scope.to_string(),
            source: source.to_path_buf(),
            hash,
        }
    }
}

#[derive(Debug, Default)]
pub struct ArtifactCache {
    entries: Mutex<HashMap<CacheKey, Vec<Artifact>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ArtifactCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<Vec<Artifact>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let found = entries.get(key).cloned();
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    pub fn insert(&self, key: CacheKey, artifacts: Vec<Artifact>) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key, artifacts);
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// Wraps a stage so each input is only processed once per distinct content.
///
/// The inner stage is invoked with a single input at a time, so this only
/// makes sense for stages that map inputs independently.
pub struct Cached<S> {
    inner: S,
    scope: String,
}

impl<S: Stage> Cached<S> {
    pub fn new(inner: S) -> Self {
        let scope = inner.name().to_string();
        Self { inner, scope }
    }

    /// Override the cache scope (defaults to the stage name).
    ///
    /// Two cached stages with the same name but different settings must use
    /// different scopes.
    pub fn scoped(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }
}

impl<S: Stage> Stage for Cached<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn process<'a>(&'a self, inputs: ArtifactIter<'a>, ctx: &'a StageContext) -> ArtifactIter<'a> {
        Box::new(inputs.flat_map(move |input| -> Vec<Result<Artifact, StageError>> {
            let artifact = match input {
                Ok(a) => a,
                Err(err) => return vec![Err(err)],
            };

            let key = CacheKey::new(&self.scope, artifact.source_path(), artifact.content_hash);
            if let Some(hit) = ctx.cache.get(&key) {
                trace!(
                    task = %ctx.task,
                    stage = %self.scope,
                    path = %artifact.path.display(),
                    "artifact cache hit"
                );
                return hit.into_iter().map(Ok).collect();
            }

            let produced: Result<Vec<Artifact>, StageError> = self
                .inner
                .process(Box::new(std::iter::once(Ok(artifact))), ctx)
                .collect();

            match produced {
                Ok(out) => {
                    debug!(
                        task = %ctx.task,
                        stage = %self.scope,
                        outputs = out.len(),
                        "caching stage output"
                    );
                    ctx.cache.insert(key, out.clone());
                    out.into_iter().map(Ok).collect()
                }
                Err(err) => vec![Err(err)],
            }
        }))
    }
}
