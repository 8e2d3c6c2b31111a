// tests/build_end_to_end.rs

use std::error::Error;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use assetdag::cli::{CliArgs, Command};
use assetdag::config::{StageConfig, load_and_validate};
use assetdag::context::BuildContext;
use assetdag::fs::{FileSystem, RealFileSystem};
use assetdag::reload::{LiveReload, ReloadEvent};
use assetdag::types::AssetKind;
use assetdag_test_utils::{ConfigFileBuilder, TaskConfigBuilder, init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn write(root: &Path, rel: &str, body: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
}

fn project() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "src/styles/app.css", "body { margin: 0 }\n");
    write(root, "src/scripts/a.js", "console.log('a');");
    write(root, "src/scripts/b.js", "console.log('b');");
    write(root, "src/index.html", "<html><body>hi</body></html>");
    dir
}

fn site_config() -> assetdag::config::ConfigFile {
    ConfigFileBuilder::new()
        .with_task(
            "styles",
            TaskConfigBuilder::new("src/styles/**/*.css")
                .dest("css")
                .kind(AssetKind::Css)
                .stage(StageConfig::Copy { cache: true })
                .build(),
        )
        .with_task(
            "scripts",
            TaskConfigBuilder::new("src/scripts/**/*.js")
                .dest("js")
                .kind(AssetKind::Js)
                .stage(StageConfig::Concat {
                    file: "app.js".into(),
                    separator: "\n".into(),
                    cache: false,
                })
                .build(),
        )
        .with_task(
            "html",
            TaskConfigBuilder::new("src/index.html")
                .kind(AssetKind::Html)
                .after("styles")
                .after("scripts")
                .build(),
        )
        .with_watch(&["src/styles/**/*.css"], &["styles"])
        .build()
}

#[tokio::test]
async fn build_writes_every_namespace() -> TestResult {
    init_tracing();
    let dir = project();
    let ctx = BuildContext::from_config(&site_config(), dir.path())?;
    assert_eq!(ctx.default_tasks(), vec!["html".to_string()]);

    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let (handle, join) = assetdag::start_runtime(&ctx, fs, Arc::new(LiveReload::default()));

    let report = with_timeout(handle.run_generation(&ctx.default_tasks())).await?;
    assert!(report.is_success(), "{report:?}");

    let out = dir.path().join("dist");
    assert_eq!(fs::read_to_string(out.join("css/app.css"))?, "body { margin: 0 }\n");
    assert_eq!(
        fs::read_to_string(out.join("js/app.js"))?,
        "console.log('a');\nconsole.log('b');"
    );
    assert!(out.join("index.html").is_file());

    handle.shutdown().await;
    join.await??;
    Ok(())
}

#[tokio::test]
async fn rebuilding_unchanged_sources_hits_the_cache() -> TestResult {
    init_tracing();
    let dir = project();
    let ctx = BuildContext::from_config(&site_config(), dir.path())?;
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let (handle, join) = assetdag::start_runtime(&ctx, fs, Arc::new(LiveReload::default()));

    let css = dir.path().join("dist/css/app.css");
    with_timeout(handle.run_generation(&["styles".into()])).await?;
    let first = fs::read(&css)?;
    assert_eq!(ctx.cache().misses(), 1);

    with_timeout(handle.run_generation(&["styles".into()])).await?;
    assert_eq!(fs::read(&css)?, first);
    assert_eq!(ctx.cache().hits(), 1);
    assert_eq!(ctx.cache().misses(), 1);

    handle.shutdown().await;
    join.await??;
    Ok(())
}

#[tokio::test]
async fn stylesheet_rebuild_notifies_clients() -> TestResult {
    init_tracing();
    let dir = project();
    let ctx = BuildContext::from_config(&site_config(), dir.path())?;
    let reload = Arc::new(LiveReload::default());
    let mut client = reload.connect(None);

    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let (handle, join) = assetdag::start_runtime(&ctx, fs, Arc::clone(&reload));

    with_timeout(handle.run_generation(&["styles".into()])).await?;
    assert_eq!(
        with_timeout(client.events.recv()).await,
        Some(ReloadEvent::inject(AssetKind::Css, "/css/app.css"))
    );

    handle.shutdown().await;
    join.await??;
    Ok(())
}

#[tokio::test]
async fn clean_removes_the_output_tree() -> TestResult {
    let dir = project();
    let ctx = BuildContext::from_config(&site_config(), dir.path())?;
    write(dir.path(), "dist/stale.txt", "old");

    ctx.clean(&RealFileSystem)?;
    assert!(!dir.path().join("dist").exists());

    // Cleaning twice is fine.
    ctx.clean(&RealFileSystem)?;
    Ok(())
}

fn cli(config: &Path, command: Command) -> CliArgs {
    CliArgs {
        config: config.to_string_lossy().into_owned(),
        log_level: None,
        dry_run: false,
        command: Some(command),
    }
}

#[cfg(unix)]
#[tokio::test]
async fn one_shot_build_fails_when_a_task_fails() -> TestResult {
    init_tracing();
    let dir = project();
    let config = dir.path().join("Assetdag.toml");
    fs::write(
        &config,
        r#"
[task.styles]
src = ["src/styles/**/*.css"]
dest = "css"
kind = "css"

[task.scripts]
src = ["src/scripts/**/*.js"]
dest = "js"
kind = "js"
stages = [{ use = "check", command = "exit 3" }]

[task.html]
src = ["src/index.html"]
kind = "html"
after = ["styles", "scripts"]
"#,
    )?;

    let err = assetdag::run(cli(&config, Command::Build { tasks: vec![] }))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("build failed"), "{err:#}");

    // The independent branch still ran; the dependent did not.
    let out = dir.path().join("dist");
    assert!(out.join("css/app.css").is_file());
    assert!(!out.join("index.html").exists());

    // The config itself is fine.
    load_and_validate(&config)?;
    Ok(())
}

#[tokio::test]
async fn dry_run_builds_nothing() -> TestResult {
    let dir = project();
    let config = dir.path().join("Assetdag.toml");
    fs::write(
        &config,
        r#"
[task.styles]
src = ["src/styles/**/*.css"]
dest = "css"
"#,
    )?;

    let mut args = cli(&config, Command::Build { tasks: vec![] });
    args.dry_run = true;
    assetdag::run(args).await?;
    assert!(!dir.path().join("dist").exists());
    Ok(())
}

#[test]
fn dry_run_report_lists_settings_and_build_order() -> TestResult {
    let dir = project();
    let ctx = BuildContext::from_config(&site_config(), dir.path())?;
    let report = assetdag::dry_run_report(&ctx);

    assert!(report.contains("source_dir = src"), "{report}");
    let styles = report.find("  - styles").ok_or("styles missing")?;
    let html = report.find("  - html").ok_or("html missing")?;
    assert!(styles < html, "{report}");
    assert!(report.contains("triggers: [\"styles\"]"), "{report}");
    Ok(())
}

#[tokio::test]
async fn develop_on_a_busy_port_fails_before_building() -> TestResult {
    init_tracing();
    let dir = project();
    let config = dir.path().join("Assetdag.toml");
    fs::write(
        &config,
        r#"
[task.styles]
src = ["src/styles/**/*.css"]
dest = "css"

[[watch]]
patterns = ["src/styles/**/*.css"]
triggers = ["styles"]
"#,
    )?;

    let taken = assetdag::server::bind(0).await?;
    let port = taken.local_addr()?.port();
    let args = cli(
        &config,
        Command::Develop {
            port: Some(port),
            no_clean: false,
            tasks: vec![],
        },
    );

    let err = with_timeout(assetdag::run(args)).await.unwrap_err();
    assert!(format!("{err:#}").contains("binding dev server"), "{err:#}");
    assert!(!dir.path().join("dist").exists());
    Ok(())
}
