// src/pipeline/source.rs

//! Resolving a pipeline's source globs into input artifacts.

use std::collections::HashSet;
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{GlobMatcher, GlobSet};
use tracing::{debug, warn};

use crate::fs::FileSystem;
use crate::pipeline::artifact::Artifact;
use crate::watch::path_utils::{build_optional_globset, compile_glob, relative_str, static_base};

struct SourceGlob {
    pattern: String,
    base: PathBuf,
    matcher: GlobMatcher,
}

/// Compiled `src` / `exclude` globs of a pipeline.
///
/// Globs are relative to the project root. Each matched file becomes an
/// artifact whose path is relative to the static base of the glob that
/// matched it, so `src/styles/**/*.scss` turns `src/styles/app/main.scss`
/// into `app/main.scss`.
pub struct SourceSet {
    globs: Vec<SourceGlob>,
    exclude: Option<GlobSet>,
    exclude_patterns: Vec<String>,
}

impl fmt::Debug for SourceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceSet")
            .field("include", &self.patterns())
            .field("exclude", &self.exclude_patterns)
            .finish()
    }
}

impl SourceSet {
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self, globset::Error> {
        let mut globs = Vec::with_capacity(include.len());
        for pattern in include {
            let (base, _) = static_base(pattern);
            globs.push(SourceGlob {
                pattern: pattern.clone(),
                base,
                matcher: compile_glob(pattern)?.compile_matcher(),
            });
        }

        Ok(Self {
            globs,
            exclude: build_optional_globset(exclude)?,
            exclude_patterns: exclude.to_vec(),
        })
    }

    pub fn patterns(&self) -> Vec<&str> {
        self.globs.iter().map(|g| g.pattern.as_str()).collect()
    }

    pub fn exclude_patterns(&self) -> &[String] {
        &self.exclude_patterns
    }

    pub fn is_empty(&self) -> bool {
        self.globs.is_empty()
    }

    fn is_excluded(&self, rel: &str) -> bool {
        self.exclude.as_ref().is_some_and(|ex| ex.is_match(rel))
    }

    /// Read every matching file under `root` into an artifact.
    ///
    /// Files are returned in a deterministic order. A file matched by more
    /// than one glob is only read once, for the first glob that matched.
    pub fn collect(&self, fs: &dyn FileSystem, root: &Path) -> Result<Vec<Artifact>> {
        let mut seen: HashSet<PathBuf> = HashSet::new();
        let mut artifacts = Vec::new();

        for glob in &self.globs {
            let base_dir = if glob.base.as_os_str().is_empty() {
                root.to_path_buf()
            } else {
                root.join(&glob.base)
            };

            let mut files = Vec::new();
            if fs.is_file(&base_dir) {
                files.push(base_dir.clone());
            } else if fs.is_dir(&base_dir) {
                walk(fs, &base_dir, &mut files)?;
            } else {
                warn!(pattern = %glob.pattern, "source directory does not exist");
                continue;
            }

            for file in files {
                let Some(rel) = relative_str(root, &file) else {
                    continue;
                };
                if !glob.matcher.is_match(&rel) || self.is_excluded(&rel) {
                    continue;
                }
                if !seen.insert(file.clone()) {
                    continue;
                }

                let artifact_path = match file.strip_prefix(&base_dir) {
                    Ok(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
                    // A concrete file pattern keeps just its file name.
                    _ => file.file_name().map(PathBuf::from).unwrap_or_else(|| file.clone()),
                };

                let mut content = Vec::new();
                fs.open_read(&file)?
                    .read_to_end(&mut content)
                    .with_context(|| format!("reading source {:?}", file))?;

                artifacts.push(Artifact::new(artifact_path, content).with_origin(file));
            }
        }

        debug!(count = artifacts.len(), "collected source artifacts");
        Ok(artifacts)
    }
}

fn walk(fs: &dyn FileSystem, dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let mut entries = fs.read_dir(dir)?;
    entries.sort();
    for entry in entries {
        if fs.is_dir(&entry) {
            walk(fs, &entry, out)?;
        } else if fs.is_file(&entry) {
            out.push(entry);
        }
    }
    Ok(())
}
