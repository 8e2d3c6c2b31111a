// src/pipeline/artifact.rs

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// BLAKE3 digest of an artifact's content.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    pub fn of(bytes: &[u8]) -> Self {
        Self(*blake3::hash(bytes).as_bytes())
    }

    pub fn to_hex(&self) -> String {
        blake3::Hash::from(self.0).to_hex().to_string()
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        write!(f, "ContentHash({})", &hex[..12])
    }
}

/// An immutable file produced (or read) by a pipeline.
///
/// `path` is relative: for sources it is relative to the static base of the
/// glob that matched, for outputs it is relative to the pipeline's output
/// namespace. `origin` remembers the on-disk source file the artifact was
/// derived from, when there is one.
#[derive(Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub content: Arc<[u8]>,
    pub content_hash: ContentHash,
    pub origin: Option<PathBuf>,
}

impl Artifact {
    pub fn new(path: impl Into<PathBuf>, content: impl Into<Vec<u8>>) -> Self {
        let content: Vec<u8> = content.into();
        let content_hash = ContentHash::of(&content);
        Self {
            path: path.into(),
            content: Arc::from(content),
            content_hash,
            origin: None,
        }
    }

    pub fn with_origin(mut self, origin: impl Into<PathBuf>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Derive a new artifact from this one, keeping its origin.
    pub fn derive(&self, path: impl Into<PathBuf>, content: impl Into<Vec<u8>>) -> Self {
        let mut next = Artifact::new(path, content);
        next.origin = self.origin.clone();
        next
    }

    /// The path used to key cached results for this artifact.
    pub fn source_path(&self) -> &Path {
        self.origin.as_deref().unwrap_or(&self.path)
    }

    pub fn text(&self) -> anyhow::Result<&str> {
        std::str::from_utf8(&self.content)
            .map_err(|e| anyhow::anyhow!("{} is not valid UTF-8: {e}", self.path.display()))
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

impl fmt::Debug for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artifact")
            .field("path", &self.path)
            .field("len", &self.content.len())
            .field("content_hash", &self.content_hash)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_content_hashes_equal() {
        let a = Artifact::new("a.css", "body{}");
        let b = Artifact::new("b.css", "body{}");
        assert_eq!(a.content_hash, b.content_hash);
        assert_ne!(a, b);
    }

    #[test]
    fn derive_keeps_origin() {
        let a = Artifact::new("a.scss", "x").with_origin("/p/src/a.scss");
        let b = a.derive("a.css", "y");
        assert_eq!(b.source_path(), Path::new("/p/src/a.scss"));
    }
}
