// tests/runtime_fake_executor.rs

use std::collections::HashSet;
use std::error::Error;
use std::time::Duration;

use assetdag::errors::TaskError;
use assetdag::reload::ReloadEvent;
use assetdag::types::AssetKind;
use assetdag_test_utils::{FakeHarness, GraphBuilder, init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn site_graph() -> assetdag::dag::TaskGraph {
    GraphBuilder::new()
        .task_of_kind("hbs", &[], AssetKind::Html)
        .task_of_kind("styles", &[], AssetKind::Css)
        .task_of_kind("scripts", &[], AssetKind::Js)
        .task_of_kind("html", &["hbs", "styles", "scripts"], AssetKind::Html)
        .build()
}

#[tokio::test]
async fn full_graph_runs_every_task_once() -> TestResult {
    init_tracing();
    let harness = FakeHarness::spawn(site_graph(), |e| e);

    let report = with_timeout(harness.handle.run_generation(&["html".into()])).await?;
    assert!(report.is_success());

    let mut executed = harness.executed();
    assert_eq!(executed.pop().as_deref(), Some("html"));
    executed.sort();
    assert_eq!(executed, vec!["hbs", "scripts", "styles"]);

    harness.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn independent_subtrees_run_concurrently() -> TestResult {
    init_tracing();
    let harness = FakeHarness::spawn(site_graph(), |e| e.delay(Duration::from_millis(50)));

    with_timeout(harness.handle.run_generation(&["html".into()])).await?;
    assert_eq!(harness.max_in_flight(), 3);

    harness.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn concurrent_runs_share_one_execution() -> TestResult {
    init_tracing();
    let harness = FakeHarness::spawn(site_graph(), |e| {
        e.delay(Duration::from_millis(30)).failing("styles")
    });

    let generation = harness.handle.start_generation().await?;
    let (first, second) = with_timeout(async {
        tokio::join!(
            harness.handle.run("styles", generation),
            harness.handle.run("styles", generation)
        )
    })
    .await;

    assert_eq!(harness.runs_of("styles"), 1);
    for result in [first, second] {
        match result {
            Err(TaskError::Failure { task, .. }) => assert_eq!(task, "styles"),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    harness.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn failing_branch_skips_dependent_but_siblings_succeed() -> TestResult {
    init_tracing();
    let harness = FakeHarness::spawn(site_graph(), |e| e.failing("scripts"));
    let mut summaries = harness.handle.subscribe_summaries();

    let report = with_timeout(harness.handle.run_generation(&["html".into()])).await?;
    assert!(!report.is_success());

    let failures: Vec<_> = report.failures().collect();
    assert_eq!(failures.len(), 1);
    match failures[0] {
        (
            "html",
            TaskError::SkippedDueToDependency {
                failed_prerequisite,
                ..
            },
        ) => assert_eq!(failed_prerequisite, "scripts"),
        other => panic!("unexpected failure: {other:?}"),
    }

    assert_eq!(harness.runs_of("html"), 0);

    let summary = with_timeout(summaries.recv()).await?;
    let succeeded: HashSet<_> = summary.succeeded.iter().map(String::as_str).collect();
    assert_eq!(succeeded, HashSet::from(["hbs", "styles"]));
    assert_eq!(summary.failed, vec!["scripts".to_string()]);

    harness.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn each_generation_reruns_tasks() -> TestResult {
    init_tracing();
    let harness = FakeHarness::spawn(site_graph(), |e| e);

    let first = with_timeout(harness.handle.run_generation(&["styles".into()])).await?;
    let second = with_timeout(harness.handle.run_generation(&["styles".into()])).await?;
    assert!(second.generation > first.generation);
    assert_eq!(harness.runs_of("styles"), 2);

    // Re-requesting inside a finished generation does not run again.
    with_timeout(harness.handle.run("styles", second.generation)).await?;
    assert_eq!(harness.runs_of("styles"), 2);

    harness.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn stylesheet_success_injects_css() -> TestResult {
    init_tracing();
    let harness = FakeHarness::spawn(site_graph(), |e| e.writes("styles", &["css/app.css"]));
    let mut client = harness.reload.connect(None);
    let mut scripts_only = harness
        .reload
        .connect(Some(HashSet::from([AssetKind::Js])));

    with_timeout(harness.handle.run_generation(&["styles".into()])).await?;

    let event = with_timeout(client.events.recv()).await;
    assert_eq!(
        event,
        Some(ReloadEvent::inject(AssetKind::Css, "/css/app.css"))
    );
    assert!(client.events.try_recv().is_err());
    assert!(scripts_only.events.try_recv().is_err());

    harness.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn markup_success_reloads_and_failure_stays_quiet() -> TestResult {
    init_tracing();
    let harness = FakeHarness::spawn(site_graph(), |e| {
        e.writes("hbs", &["index.html"])
            .writes("styles", &["css/app.css"])
            .failing("scripts")
    });
    let mut client = harness.reload.connect(None);
    let mut summaries = harness.handle.subscribe_summaries();

    with_timeout(harness.handle.run_generation(&["hbs".into()])).await?;
    assert_eq!(
        with_timeout(client.events.recv()).await,
        Some(ReloadEvent::FullReload)
    );

    // `hbs` and `styles` succeed but `scripts` fails in the same generation.
    let report = with_timeout(harness.handle.run_generation(&["html".into()])).await?;
    assert!(!report.is_success());

    // Reloads are broadcast before the generation summary is sent.
    loop {
        let summary = with_timeout(summaries.recv()).await?;
        if summary.generation == report.generation {
            assert!(!summary.is_success());
            break;
        }
    }
    assert!(client.events.try_recv().is_err());

    harness.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn requests_after_shutdown_fail_cleanly() -> TestResult {
    init_tracing();
    let harness = FakeHarness::spawn(site_graph(), |e| e);
    let handle = harness.handle.clone();
    harness.shutdown().await;

    assert!(matches!(
        handle.start_generation().await,
        Err(TaskError::RuntimeClosed)
    ));
    assert!(matches!(
        handle.run("styles", 1).await,
        Err(TaskError::RuntimeClosed)
    ));
    Ok(())
}
