// src/watch/mod.rs

//! File watching and change detection.
//!
//! This module is responsible for:
//! - Compiling `[[watch]]` rules into glob matchers.
//! - Mapping a batch of changed paths to the tasks that must re-run
//!   ([`plan`], a pure function).
//! - Debouncing bursts of raw notifications.
//! - Wiring up a cross-platform filesystem watcher (`notify`) on the static
//!   roots of the watched patterns.
//!
//! The watcher never reads file content.

pub mod debounce;
pub mod dispatch;
pub mod path_utils;
pub mod rules;
pub mod watcher;

pub use debounce::{DEFAULT_DEBOUNCE, Debouncer, PendingChanges};
pub use dispatch::{ChangeFilter, Dispatcher};
pub use rules::{WatchPlan, WatchRule, plan, watch_roots};
pub use watcher::{WatcherHandle, spawn_watcher};
