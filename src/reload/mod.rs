// src/reload/mod.rs

//! Live-reload notifications.
//!
//! After a build generation finishes without failures, the events collected
//! from its pipelines are coalesced and pushed to every connected browser:
//!
//! - stylesheets are hot-swapped with an [`ReloadEvent::AssetInjected`];
//! - markup, scripts and images trigger a [`ReloadEvent::FullReload`];
//! - fonts and other assets produce nothing.
//!
//! [`channel`] owns the connected clients.

pub mod channel;

use std::path::PathBuf;

use serde::Serialize;

use crate::types::AssetKind;
use crate::watch::path_utils::to_slash;

pub use channel::{BroadcastReport, ClientId, LiveReload, Subscription};

/// Message pushed to browsers. Serialized as
/// `{"type":"reload"}` or `{"type":"inject","kind":"css","path":"/css/app.css"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum ReloadEvent {
    #[serde(rename = "reload")]
    FullReload,
    #[serde(rename = "inject")]
    AssetInjected { kind: AssetKind, path: String },
}

impl ReloadEvent {
    pub fn inject(kind: AssetKind, path: impl Into<String>) -> Self {
        ReloadEvent::AssetInjected {
            kind,
            path: path.into(),
        }
    }

    /// Asset kind the event is scoped to. A full reload concerns every client.
    pub fn kind(&self) -> Option<AssetKind> {
        match self {
            ReloadEvent::FullReload => None,
            ReloadEvent::AssetInjected { kind, .. } => Some(*kind),
        }
    }

    pub fn to_json(&self) -> String {
        // Serializing a fieldless tag or two strings cannot fail.
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"type":"reload"}"#.to_string())
    }
}

/// Events a pipeline of `kind` produces after writing `written` (paths
/// relative to the output directory).
pub fn policy(kind: AssetKind, written: &[PathBuf]) -> Vec<ReloadEvent> {
    if written.is_empty() {
        return Vec::new();
    }

    match kind {
        AssetKind::Css => written
            .iter()
            .filter(|p| p.extension().is_some_and(|ext| ext == "css"))
            .map(|p| ReloadEvent::inject(AssetKind::Css, format!("/{}", to_slash(p))))
            .collect(),
        AssetKind::Html | AssetKind::Js | AssetKind::Image => vec![ReloadEvent::FullReload],
        AssetKind::Font | AssetKind::Other => Vec::new(),
    }
}

/// Collapse one generation's events: any full reload supersedes everything
/// else, otherwise one injection per distinct path in first-seen order.
pub fn coalesce(events: impl IntoIterator<Item = ReloadEvent>) -> Vec<ReloadEvent> {
    let mut out: Vec<ReloadEvent> = Vec::new();
    for event in events {
        if event == ReloadEvent::FullReload {
            return vec![ReloadEvent::FullReload];
        }
        if !out.contains(&event) {
            out.push(event);
        }
    }
    out
}
