// tests/watch_dispatch.rs

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use assetdag::engine::GenerationReport;
use assetdag::reload::ReloadEvent;
use assetdag::types::AssetKind;
use assetdag::watch::{ChangeFilter, Debouncer, Dispatcher, WatchRule, plan, spawn_watcher};
use assetdag_test_utils::{FakeHarness, FakeExecutor, GraphBuilder, init_tracing, with_timeout};

const ROOT: &str = "/project";

fn rules() -> Arc<Vec<WatchRule>> {
    Arc::new(vec![
        WatchRule::triggering(["styles/**/*.scss"], ["styles"]).unwrap(),
        WatchRule::triggering(["scripts/**/*.js"], ["scripts"]).unwrap(),
        WatchRule::reload_only(["static/**/*"]).unwrap(),
    ])
}

fn harness(configure: impl FnOnce(FakeExecutor) -> FakeExecutor) -> (FakeHarness, Dispatcher) {
    let graph = GraphBuilder::new()
        .task_of_kind("styles", &[], AssetKind::Css)
        .task_of_kind("scripts", &[], AssetKind::Js)
        .build();
    let harness = FakeHarness::spawn(graph, configure);
    let dispatcher = Dispatcher::new(
        ROOT,
        rules(),
        harness.handle.clone(),
        Arc::clone(&harness.reload),
    );
    (harness, dispatcher)
}

fn changed(rel: &str) -> PathBuf {
    Path::new(ROOT).join(rel)
}

#[test]
fn plan_unions_triggers_in_first_seen_order() {
    let rules = vec![
        WatchRule::triggering(["styles/**/*.scss"], ["styles", "html"]).unwrap(),
        WatchRule::triggering(["templates/**/*.hbs"], ["hbs", "html"]).unwrap(),
        WatchRule::reload_only(["static/**/*"]).unwrap(),
    ];

    let out = plan(
        Path::new(ROOT),
        &[
            changed("templates/index.hbs"),
            changed("styles/app.scss"),
            changed("styles/other.scss"),
        ],
        &rules,
    );
    assert_eq!(out.triggers, vec!["styles", "html", "hbs"]);
    assert!(!out.full_reload);

    let out = plan(Path::new(ROOT), &[changed("README.md")], &rules);
    assert!(out.is_empty());

    let out = plan(Path::new(ROOT), &[PathBuf::from("/elsewhere/styles/a.scss")], &rules);
    assert!(out.is_empty());
}

#[tokio::test]
async fn unmatched_change_runs_nothing() {
    init_tracing();
    let (harness, dispatcher) = harness(|e| e);

    assert!(dispatcher.dispatch(vec![changed("README.md")]).is_none());
    assert!(harness.executed().is_empty());

    harness.shutdown().await;
}

#[tokio::test]
async fn stylesheet_change_runs_styles_once_and_injects_css() {
    init_tracing();
    let (harness, dispatcher) = harness(|e| e.writes("styles", &["css/app.css"]));
    let mut first = harness.reload.connect(None);
    let mut second = harness.reload.connect(None);

    let job = dispatcher
        .dispatch(vec![changed("styles/app.scss")])
        .expect("styles rule matches");
    let report = with_timeout(job).await.unwrap().expect("generation ran");

    assert!(report.is_success());
    assert_eq!(harness.executed(), vec!["styles"]);

    let expected = Some(ReloadEvent::inject(AssetKind::Css, "/css/app.css"));
    assert_eq!(with_timeout(first.events.recv()).await, expected);
    assert_eq!(with_timeout(second.events.recv()).await, expected);
    assert!(first.events.try_recv().is_err());

    harness.shutdown().await;
}

#[tokio::test]
async fn reload_only_change_broadcasts_without_building() {
    init_tracing();
    let (harness, dispatcher) = harness(|e| e);
    let mut client = harness.reload.connect(Some([AssetKind::Css].into()));

    assert!(dispatcher.dispatch(vec![changed("static/logo.svg")]).is_none());
    assert_eq!(client.events.try_recv().ok(), Some(ReloadEvent::FullReload));
    assert!(harness.executed().is_empty());

    harness.shutdown().await;
}

#[tokio::test]
async fn failed_rebuild_is_reported_not_fatal() {
    init_tracing();
    let (harness, dispatcher) = harness(|e| e.failing("scripts"));

    let job = dispatcher.dispatch(vec![changed("scripts/main.js")]).unwrap();
    let report = with_timeout(job).await.unwrap().unwrap();
    assert!(!report.is_success());

    // The runtime keeps serving later batches.
    let job = dispatcher.dispatch(vec![changed("styles/app.scss")]).unwrap();
    let report = with_timeout(job).await.unwrap().unwrap();
    assert!(report.is_success());

    harness.shutdown().await;
}

/// Feed `dispatcher` through a debouncer; returns the change sender and the
/// jobs each flushed batch started.
fn debounced(
    dispatcher: Dispatcher,
    window: Duration,
) -> (
    mpsc::UnboundedSender<PathBuf>,
    Arc<Mutex<Vec<JoinHandle<Option<GenerationReport>>>>>,
    JoinHandle<()>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let jobs: Arc<Mutex<Vec<JoinHandle<Option<GenerationReport>>>>> = Arc::default();
    let sink = Arc::clone(&jobs);
    let task = tokio::spawn(Debouncer::new(window).run(rx, move |batch| {
        if let Some(job) = dispatcher.dispatch(batch) {
            sink.lock().unwrap().push(job);
        }
    }));
    (tx, jobs, task)
}

async fn finish(
    jobs: Arc<Mutex<Vec<JoinHandle<Option<GenerationReport>>>>>,
) -> Vec<GenerationReport> {
    let jobs: Vec<_> = std::mem::take(&mut *jobs.lock().unwrap());
    let mut reports = Vec::new();
    for job in jobs {
        reports.extend(job.await.unwrap());
    }
    reports
}

#[tokio::test(start_paused = true)]
async fn burst_of_changes_triggers_one_run() {
    init_tracing();
    let (harness, dispatcher) = harness(|e| e);
    let (tx, jobs, debouncer) = debounced(dispatcher, Duration::from_millis(100));

    for i in 0..10 {
        let file = if i % 2 == 0 { "styles/app.scss" } else { "styles/nav.scss" };
        tx.send(changed(file)).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    tokio::time::sleep(Duration::from_millis(300)).await;
    drop(tx);
    debouncer.await.unwrap();

    let reports = finish(jobs).await;
    assert_eq!(reports.len(), 1);
    assert_eq!(harness.runs_of("styles"), 1);

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn changes_during_a_build_start_another_generation() {
    init_tracing();
    let (harness, dispatcher) = harness(|e| e.delay(Duration::from_millis(500)));
    let (tx, jobs, debouncer) = debounced(dispatcher, Duration::from_millis(100));

    tx.send(changed("styles/app.scss")).unwrap();
    // First batch flushed at 100ms; its build runs until ~600ms.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(harness.runs_of("styles"), 1);

    tx.send(changed("styles/app.scss")).unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(harness.runs_of("styles"), 2);

    drop(tx);
    debouncer.await.unwrap();

    let reports = finish(jobs).await;
    assert_eq!(reports.len(), 2);
    assert!(reports[1].generation > reports[0].generation);
    assert!(reports.iter().all(GenerationReport::is_success));

    harness.shutdown().await;
}

#[test]
fn change_filter_drops_output_tree_and_temp_files() {
    let filter = ChangeFilter::default().ignore_dir("/project/dist");

    assert!(filter.accepts(Path::new("/project/src/index.html")));
    assert!(filter.accepts(Path::new("/project/distro/notes.html")));
    assert!(!filter.accepts(Path::new("/project/dist/index.html")));
    assert!(!filter.accepts(Path::new("/project/dist")));
    assert!(!filter.accepts(Path::new("/project/src/.assetdag-Xa1b2C.tmp")));
}

#[tokio::test]
async fn root_level_pattern_ignores_its_own_output() {
    init_tracing();
    let graph = GraphBuilder::new().task_of_kind("html", &[], AssetKind::Html).build();
    let harness = FakeHarness::spawn(graph, |e| e);
    let rules = Arc::new(vec![WatchRule::triggering(["**/*.html"], ["html"]).unwrap()]);
    let dispatcher = Dispatcher::new(
        ROOT,
        rules,
        harness.handle.clone(),
        Arc::clone(&harness.reload),
    )
    .ignoring(changed("dist"));

    assert!(dispatcher.dispatch(vec![changed("dist/index.html")]).is_none());
    assert!(dispatcher.dispatch(vec![changed("dist/.assetdag-k3J9.tmp")]).is_none());
    assert!(harness.executed().is_empty());

    // Output mixed into a real source batch is dropped; the source still counts.
    let job = dispatcher
        .dispatch(vec![changed("dist/index.html"), changed("src/index.html")])
        .expect("source change matches");
    assert!(with_timeout(job).await.unwrap().unwrap().is_success());
    assert_eq!(harness.runs_of("html"), 1);

    harness.shutdown().await;
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    with_timeout(async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
}

#[tokio::test]
async fn real_file_change_reaches_the_dispatcher() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    std::fs::create_dir_all(root.join("styles")).unwrap();
    std::fs::create_dir_all(root.join("dist")).unwrap();

    let graph = GraphBuilder::new().task_of_kind("styles", &[], AssetKind::Css).build();
    let harness = FakeHarness::spawn(graph, |e| e);
    let rules = Arc::new(vec![WatchRule::triggering(["**/*.scss"], ["styles"]).unwrap()]);
    let dispatcher = Dispatcher::new(
        root.clone(),
        Arc::clone(&rules),
        harness.handle.clone(),
        Arc::clone(&harness.reload),
    )
    .ignoring(root.join("dist"));

    let watcher = spawn_watcher(
        root.clone(),
        &rules,
        Debouncer::new(Duration::from_millis(50)),
        dispatcher,
    )
    .unwrap();
    assert_eq!(watcher.roots(), [root.clone()]);

    // Writes under the output tree are invisible.
    std::fs::write(root.join("dist/app.scss"), "a {}").unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(harness.runs_of("styles"), 0);

    std::fs::write(root.join("styles/app.scss"), "a { color: red }").unwrap();
    wait_until(|| harness.runs_of("styles") == 1).await;

    drop(watcher);
    harness.shutdown().await;
}
