// src/watch/rules.rs

//! Watch rules and the pure change-to-trigger mapping.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use globset::GlobSet;
use tracing::{debug, warn};

use crate::types::TaskName;
use crate::watch::path_utils::{
    build_globset, build_optional_globset, collapse_roots, relative_str, static_base,
};

/// Compiled `[[watch]]` rule.
///
/// Patterns are relative to the project root; the watcher passes relative
/// paths (e.g. `"src/styles/main.scss"`) into [`WatchRule::matches`].
#[derive(Clone)]
pub struct WatchRule {
    patterns: Vec<String>,
    exclude: Vec<String>,
    watch_set: GlobSet,
    exclude_set: Option<GlobSet>,
    triggers: Vec<TaskName>,
    reload: bool,
}

impl fmt::Debug for WatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchRule")
            .field("patterns", &self.patterns)
            .field("exclude", &self.exclude)
            .field("triggers", &self.triggers)
            .field("reload", &self.reload)
            .finish_non_exhaustive()
    }
}

impl WatchRule {
    pub fn new(
        patterns: Vec<String>,
        exclude: Vec<String>,
        triggers: Vec<TaskName>,
        reload: bool,
    ) -> Result<Self, globset::Error> {
        let watch_set = build_globset(&patterns)?;
        let exclude_set = build_optional_globset(&exclude)?;
        Ok(Self {
            patterns,
            exclude,
            watch_set,
            exclude_set,
            triggers,
            reload,
        })
    }

    /// Rule that re-runs `triggers` when any of `patterns` changes.
    pub fn triggering<P, T>(patterns: P, triggers: T) -> Result<Self, globset::Error>
    where
        P: IntoIterator,
        P::Item: Into<String>,
        T: IntoIterator,
        T::Item: Into<TaskName>,
    {
        Self::new(
            patterns.into_iter().map(Into::into).collect(),
            Vec::new(),
            triggers.into_iter().map(Into::into).collect(),
            false,
        )
    }

    /// Rule that only reloads the browser.
    pub fn reload_only<P>(patterns: P) -> Result<Self, globset::Error>
    where
        P: IntoIterator,
        P::Item: Into<String>,
    {
        Self::new(
            patterns.into_iter().map(Into::into).collect(),
            Vec::new(),
            Vec::new(),
            true,
        )
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn exclude(&self) -> &[String] {
        &self.exclude
    }

    pub fn triggers(&self) -> &[TaskName] {
        &self.triggers
    }

    pub fn reloads(&self) -> bool {
        self.reload
    }

    /// Whether `rel_path` (relative to the project root) matches one of the
    /// patterns and none of the excludes.
    pub fn matches(&self, rel_path: &str) -> bool {
        if !self.watch_set.is_match(rel_path) {
            return false;
        }
        if let Some(exclude) = &self.exclude_set {
            if exclude.is_match(rel_path) {
                return false;
            }
        }
        true
    }
}

/// What one batch of changes asks for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchPlan {
    /// Tasks to run, de-duplicated in first-seen order.
    pub triggers: Vec<TaskName>,
    /// A matching rule asked for a full page reload.
    pub full_reload: bool,
}

impl WatchPlan {
    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty() && !self.full_reload
    }
}

/// Map a batch of changed paths to the tasks that must re-run.
///
/// Rules are visited in declaration order, so triggers keep the order in
/// which rules and their `triggers` lists name them.
pub fn plan(root: &Path, changed: &[PathBuf], rules: &[WatchRule]) -> WatchPlan {
    let relative: Vec<String> = changed
        .iter()
        .filter_map(|path| {
            let rel = relative_str(root, path);
            if rel.is_none() {
                warn!(?path, ?root, "changed path is outside the project root");
            }
            rel
        })
        .collect();

    let mut out = WatchPlan::default();
    let mut seen: HashSet<&str> = HashSet::new();

    for rule in rules {
        let Some(hit) = relative.iter().find(|rel| rule.matches(rel)) else {
            continue;
        };
        debug!(path = %hit, patterns = ?rule.patterns, "watch rule matched");

        for task in &rule.triggers {
            if seen.insert(task.as_str()) {
                out.triggers.push(task.clone());
            }
        }
        out.full_reload |= rule.reload;
    }

    out
}

/// Directories to subscribe to recursively: the static prefix of every
/// pattern, nested ones collapsed into their ancestor.
pub fn watch_roots(root: &Path, rules: &[WatchRule]) -> Vec<PathBuf> {
    collapse_roots(
        rules
            .iter()
            .flat_map(|rule| rule.patterns.iter())
            .map(|pattern| {
                let (base, rest) = static_base(pattern);
                // A literal file pattern is watched through its directory.
                let dir = if rest.is_empty() {
                    base.parent().map(Path::to_path_buf).unwrap_or_default()
                } else {
                    base
                };
                root.join(dir)
            }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> Vec<WatchRule> {
        vec![
            WatchRule::triggering(["src/styles/**/*.scss"], ["styles"]).unwrap(),
            WatchRule::triggering(["src/scripts/**/*.js"], ["scripts", "styles"]).unwrap(),
            WatchRule::reload_only(["src/*.html"]).unwrap(),
        ]
    }

    #[test]
    fn unmatched_change_plans_nothing() {
        let plan = plan(Path::new("/p"), &[PathBuf::from("/p/README.md")], &rules());
        assert!(plan.is_empty());
    }

    #[test]
    fn triggers_are_deduplicated_in_first_seen_order() {
        let changed = vec![
            PathBuf::from("/p/src/scripts/app.js"),
            PathBuf::from("/p/src/styles/a.scss"),
            PathBuf::from("/p/src/styles/b.scss"),
        ];
        let plan = plan(Path::new("/p"), &changed, &rules());
        assert_eq!(plan.triggers, vec!["styles", "scripts"]);
        assert!(!plan.full_reload);
    }

    #[test]
    fn reload_only_rule_sets_full_reload() {
        let plan = plan(Path::new("/p"), &[PathBuf::from("/p/src/index.html")], &rules());
        assert!(plan.triggers.is_empty());
        assert!(plan.full_reload);
    }

    #[test]
    fn excludes_win_over_patterns() {
        let rule = WatchRule::new(
            vec!["src/**/*".into()],
            vec!["src/**/.DS_Store".into()],
            vec!["extras".into()],
            false,
        )
        .unwrap();
        assert!(rule.matches("src/robots.txt"));
        assert!(!rule.matches("src/images/.DS_Store"));
    }

    #[test]
    fn roots_collapse_nested_directories() {
        let rules = vec![
            WatchRule::triggering(["src/**/*.scss"], ["a"]).unwrap(),
            WatchRule::triggering(["src/scripts/*.js"], ["b"]).unwrap(),
            WatchRule::triggering(["assets/logo.svg"], ["c"]).unwrap(),
        ];
        let roots = watch_roots(Path::new("/p"), &rules);
        assert_eq!(roots, vec![PathBuf::from("/p/assets"), PathBuf::from("/p/src")]);
    }
}
