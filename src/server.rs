// src/server.rs

//! Development HTTP server.
//!
//! Serves the output directory, mounts the live-reload WebSocket at
//! [`LIVERELOAD_PATH`] and injects the client script into HTML responses.
//! Directories without an `index.html` get a generated listing.

use std::collections::HashSet;
use std::future::Future;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, Request, State};
use axum::handler::Handler;
use axum::http::{StatusCode, Uri, header};
use axum::middleware::{self, Next};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tracing::{debug, info, warn};

use crate::reload::{LiveReload, Subscription};
use crate::types::AssetKind;

pub const LIVERELOAD_PATH: &str = "/__livereload";
pub const CLIENT_SCRIPT_PATH: &str = "/__livereload.js";

/// Largest HTML body the injector will buffer.
const MAX_INJECT_BODY: usize = 16 * 1024 * 1024;

const SCRIPT_TAG: &str = r#"<script src="/__livereload.js"></script>"#;

const CLIENT_SCRIPT: &str = r#"(function () {
  var proto = location.protocol === "https:" ? "wss://" : "ws://";
  var url = proto + location.host + "/__livereload";
  function swapStylesheet(path) {
    var links = document.querySelectorAll('link[rel="stylesheet"]');
    var swapped = false;
    links.forEach(function (link) {
      var href = new URL(link.href, location.href);
      if (href.pathname === path) {
        href.searchParams.set("v", Date.now().toString());
        link.href = href.toString();
        swapped = true;
      }
    });
    if (!swapped) location.reload();
  }
  function connect() {
    var socket = new WebSocket(url);
    socket.onmessage = function (msg) {
      var event = JSON.parse(msg.data);
      if (event.type === "inject" && event.kind === "css") {
        swapStylesheet(event.path);
      } else {
        location.reload();
      }
    };
    socket.onclose = function () { setTimeout(connect, 1000); };
  }
  connect();
})();
"#;

#[derive(Clone)]
struct ServerState {
    reload: Arc<LiveReload>,
}

#[derive(Debug, Default, Deserialize)]
struct SubscribeQuery {
    /// Comma-separated asset kinds, e.g. `css,js`. Absent means all.
    kinds: Option<String>,
}

/// Build the router: live-reload endpoints, then the output tree.
pub fn router(output_dir: &Path, reload: Arc<LiveReload>) -> Router {
    Router::new()
        .route(LIVERELOAD_PATH, get(livereload_socket))
        .route(CLIENT_SCRIPT_PATH, get(client_script))
        .fallback_service(
            ServeDir::new(output_dir).not_found_service(
                directory_listing.with_state(Arc::new(output_dir.to_path_buf())),
            ),
        )
        .layer(middleware::from_fn(inject_livereload))
        .with_state(ServerState { reload })
}

/// Bind the dev server socket on `127.0.0.1:port`. Port 0 picks a free one.
pub async fn bind(port: u16) -> anyhow::Result<TcpListener> {
    let address = SocketAddr::from(([127, 0, 0, 1], port));
    TcpListener::bind(address)
        .await
        .with_context(|| format!("binding dev server to {address}"))
}

/// Serve `output_dir` on an already bound `listener` until `shutdown`
/// resolves.
pub async fn serve<F>(
    listener: TcpListener,
    output_dir: &Path,
    reload: Arc<LiveReload>,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let address = listener.local_addr()?;
    info!(url = %format!("http://localhost:{}/", address.port()), "dev server listening");

    axum::serve(listener, router(output_dir, reload))
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

async fn client_script() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript")],
        CLIENT_SCRIPT,
    )
}

async fn livereload_socket(
    ws: WebSocketUpgrade,
    State(state): State<ServerState>,
    Query(query): Query<SubscribeQuery>,
) -> Response {
    let kinds = query.kinds.as_deref().map(parse_kinds);
    ws.on_upgrade(move |socket| handle_socket(socket, state.reload, kinds))
}

/// Parse `css,js`; unknown names are ignored with a warning.
fn parse_kinds(raw: &str) -> HashSet<AssetKind> {
    raw.split(',')
        .filter(|s| !s.trim().is_empty())
        .filter_map(|s| match s.parse::<AssetKind>() {
            Ok(kind) => Some(kind),
            Err(err) => {
                warn!(error = %err, "ignoring live-reload subscription");
                None
            }
        })
        .collect()
}

async fn handle_socket(
    socket: WebSocket,
    hub: Arc<LiveReload>,
    kinds: Option<HashSet<AssetKind>>,
) {
    let Subscription { id, mut events } = hub.connect(kinds);
    let (mut sender, mut receiver) = socket.split();

    let mut send_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if sender
                .send(Message::Text(event.to_json().into()))
                .await
                .is_err()
            {
                break;
            }
        }
    });

    // Browsers never send anything but pings and close frames.
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    hub.disconnect(id);
    debug!(client = id, "live-reload socket closed");
}

/// Listing for a directory under the output tree that has no `index.html`.
async fn directory_listing(State(root): State<Arc<PathBuf>>, uri: Uri) -> Response {
    let Some(dir) = resolve_dir(&root, uri.path()) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let mut entries = match tokio::fs::read_dir(&dir).await {
        Ok(entries) => entries,
        Err(err) => {
            debug!(dir = %dir.display(), error = %err, "cannot list directory");
            return StatusCode::NOT_FOUND.into_response();
        }
    };
    let mut names = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let mut name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type().await.is_ok_and(|t| t.is_dir()) {
            name.push('/');
        }
        names.push(name);
    }
    names.sort();

    let title = escape_html(uri.path());
    let mut page = format!("<!DOCTYPE html><html><head><title>{title}</title></head><body><h1>{title}</h1><ul>");
    if uri.path() != "/" {
        page.push_str(r#"<li><a href="../">../</a></li>"#);
    }
    for name in &names {
        let name = escape_html(name);
        page.push_str(&format!(r#"<li><a href="{name}">{name}</a></li>"#));
    }
    page.push_str("</ul></body></html>");
    Html(page).into_response()
}

/// Map a request path onto a directory under `root`. Dot segments and
/// missing directories give `None`.
fn resolve_dir(root: &Path, uri_path: &str) -> Option<PathBuf> {
    if !uri_path.ends_with('/') {
        return None;
    }
    let mut dir = root.to_path_buf();
    for segment in uri_path.split('/').filter(|s| !s.is_empty()) {
        if segment == "." || segment == ".." || segment.contains('\\') {
            return None;
        }
        dir.push(segment);
    }
    dir.is_dir().then_some(dir)
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Add the client script to HTML responses.
async fn inject_livereload(req: Request, next: Next) -> Response {
    let response = next.run(req).await;

    let is_html = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/html"));
    if !is_html || !response.status().is_success() {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, MAX_INJECT_BODY).await {
        Ok(b) => b,
        Err(err) => {
            warn!(error = %err, "cannot buffer HTML response");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let html = String::from_utf8_lossy(&bytes);
    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(inject_script(&html)))
}

/// Insert the script tag before the last `</body>`, or append it.
fn inject_script(html: &str) -> String {
    let lower = html.to_ascii_lowercase();
    match lower.rfind("</body>") {
        Some(at) => {
            let mut out = String::with_capacity(html.len() + SCRIPT_TAG.len());
            out.push_str(&html[..at]);
            out.push_str(SCRIPT_TAG);
            out.push_str(&html[at..]);
            out
        }
        None => format!("{html}{SCRIPT_TAG}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_goes_before_closing_body() {
        let out = inject_script("<html><BODY><p>hi</p></BODY></html>");
        assert_eq!(
            out,
            format!("<html><BODY><p>hi</p>{SCRIPT_TAG}</BODY></html>")
        );
    }

    #[test]
    fn script_is_appended_without_body() {
        assert_eq!(inject_script("<p>x</p>"), format!("<p>x</p>{SCRIPT_TAG}"));
    }

    #[test]
    fn listing_paths_stay_inside_the_output_tree() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("css")).unwrap();

        assert_eq!(resolve_dir(dir.path(), "/"), Some(dir.path().to_path_buf()));
        assert_eq!(resolve_dir(dir.path(), "/css/"), Some(dir.path().join("css")));
        assert_eq!(resolve_dir(dir.path(), "/css"), None);
        assert_eq!(resolve_dir(dir.path(), "/missing/"), None);
        assert_eq!(resolve_dir(dir.path(), "/css/../../"), None);
    }

    #[test]
    fn kinds_are_parsed_leniently() {
        let kinds = parse_kinds("css, js,,bogus");
        assert_eq!(kinds.len(), 2);
        assert!(kinds.contains(&AssetKind::Css));
        assert!(kinds.contains(&AssetKind::Js));
    }
}
