// src/watch/path_utils.rs

//! Path and glob helpers shared by the watcher and pipeline sources.

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// - First we try a direct `strip_prefix(root)`.
/// - If that fails (e.g. due to symlinks or different absolute prefixes),
///   we canonicalize both paths and try again.
///
/// Returns `None` if the path cannot be related to `root`.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(to_slash(rel));
    }

    // macOS reports events under /private/var/... for /var/... roots.
    if let (Ok(root_canon), Ok(path_canon)) = (root.canonicalize(), path.canonicalize()) {
        if let Ok(rel) = path_canon.strip_prefix(&root_canon) {
            return Some(to_slash(rel));
        }
    }

    None
}

pub fn to_slash(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn has_glob_meta(s: &str) -> bool {
    s.contains(['*', '?', '[', '{'])
}

/// Split a glob into its static directory prefix and the remaining pattern.
///
/// `"src/styles/**/*.scss"` becomes `("src/styles", "**/*.scss")`. A pattern
/// without wildcards is returned whole as the prefix with an empty remainder.
pub fn static_base(pattern: &str) -> (PathBuf, String) {
    let path = Path::new(pattern);
    let components: Vec<Component<'_>> = path.components().collect();
    let split_idx = components
        .iter()
        .position(|c| has_glob_meta(&c.as_os_str().to_string_lossy()))
        .unwrap_or(components.len());

    let base: PathBuf = components.iter().take(split_idx).collect();
    let rest: PathBuf = components.iter().skip(split_idx).collect();
    (base, to_slash(&rest))
}

/// Reduce a set of directories to the minimal set of recursive watch roots.
///
/// If we watch `/a` and `/a/b`, we only need `/a`. `Path::starts_with`
/// compares whole components, so `/foo-bar` is not inside `/foo`.
pub fn collapse_roots(paths: impl IntoIterator<Item = PathBuf>) -> Vec<PathBuf> {
    let sorted: BTreeSet<PathBuf> = paths.into_iter().collect();

    let mut kept: Vec<PathBuf> = Vec::new();
    for path in sorted {
        if let Some(last) = kept.last() {
            if path.starts_with(last) {
                continue;
            }
        }
        kept.push(path);
    }
    kept
}

/// Compile a single glob. `*` does not cross directory separators; use `**`
/// for that.
pub fn compile_glob(pattern: &str) -> Result<Glob, globset::Error> {
    GlobBuilder::new(pattern).literal_separator(true).build()
}

pub fn build_globset(patterns: &[String]) -> Result<GlobSet, globset::Error> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        builder.add(compile_glob(pat)?);
    }
    builder.build()
}

/// `None` when there is nothing to exclude.
pub fn build_optional_globset(patterns: &[String]) -> Result<Option<GlobSet>, globset::Error> {
    if patterns.is_empty() {
        Ok(None)
    } else {
        build_globset(patterns).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_wildcard_suffix() {
        let (base, rest) = static_base("src/styles/**/*.scss");
        assert_eq!(base, PathBuf::from("src/styles"));
        assert_eq!(rest, "**/*.scss");
    }

    #[test]
    fn concrete_path_has_empty_rest() {
        let (base, rest) = static_base("src/index.html");
        assert_eq!(base, PathBuf::from("src/index.html"));
        assert_eq!(rest, "");
    }

    #[test]
    fn leading_wildcard_has_empty_base() {
        let (base, rest) = static_base("**/*.js");
        assert_eq!(base, PathBuf::new());
        assert_eq!(rest, "**/*.js");
    }

    #[test]
    fn collapse_nested_roots() {
        let roots = collapse_roots(vec![
            PathBuf::from("/a/b/c"),
            PathBuf::from("/a"),
            PathBuf::from("/a/b"),
            PathBuf::from("/c/d"),
            PathBuf::from("/foo"),
            PathBuf::from("/foo-bar"),
        ]);
        assert_eq!(
            roots,
            vec![
                PathBuf::from("/a"),
                PathBuf::from("/c/d"),
                PathBuf::from("/foo"),
                PathBuf::from("/foo-bar"),
            ]
        );
    }

    #[test]
    fn star_does_not_cross_directories() {
        let set = build_globset(&["src/*.html".to_string()]).unwrap();
        assert!(set.is_match("src/index.html"));
        assert!(!set.is_match("src/partials/nav.html"));
    }

    #[test]
    fn relative_str_strips_root() {
        let rel = relative_str(Path::new("/project"), Path::new("/project/src/a.css"));
        assert_eq!(rel.as_deref(), Some("src/a.css"));
    }
}
