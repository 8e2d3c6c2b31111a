// src/lib.rs

pub mod cli;
pub mod config;
pub mod context;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod pipeline;
pub mod reload;
pub mod server;
pub mod types;
pub mod watch;

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Result, bail};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::cli::{CliArgs, Command};
use crate::config::load_and_validate;
use crate::context::{BuildContext, project_root};
use crate::engine::{BuildHandle, GenerationReport, spawn_runtime};
use crate::exec::PipelineExecutor;
use crate::fs::{FileSystem, RealFileSystem};
use crate::reload::LiveReload;
use crate::types::TaskName;
use crate::watch::{Dispatcher, spawn_watcher};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and compilation into a [`BuildContext`]
/// - scheduler / runtime / pipeline executor
/// - (develop) file watcher, dev server and Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;
    let root = project_root(&config_path)?;
    let ctx = BuildContext::from_config(&cfg, root)?;

    if args.dry_run {
        print!("{}", dry_run_report(&ctx));
        debug!("dry-run complete (no execution)");
        return Ok(());
    }

    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);

    match args.command.unwrap_or_default() {
        Command::Build { tasks } => build(&ctx, fs, tasks).await,
        Command::Develop {
            port,
            no_clean,
            tasks,
        } => develop(&ctx, fs, port, !no_clean, tasks).await,
        Command::Clean => Ok(ctx.clean(fs.as_ref())?),
    }
}

/// Start the runtime with the production executor.
pub fn start_runtime(
    ctx: &BuildContext,
    fs: Arc<dyn FileSystem>,
    reload: Arc<LiveReload>,
) -> (
    BuildHandle,
    tokio::task::JoinHandle<crate::errors::Result<()>>,
) {
    let layout = ctx.layout().clone();
    let cache = Arc::clone(ctx.cache());
    spawn_runtime(ctx.scheduler(), reload, move |tx| {
        PipelineExecutor::new(tx, fs, layout, cache)
    })
}

fn requested_tasks(ctx: &BuildContext, tasks: Vec<TaskName>) -> Vec<TaskName> {
    if tasks.is_empty() {
        ctx.default_tasks()
    } else {
        tasks
    }
}

async fn build(ctx: &BuildContext, fs: Arc<dyn FileSystem>, tasks: Vec<TaskName>) -> Result<()> {
    let tasks = requested_tasks(ctx, tasks);
    if ctx.settings().clean {
        ctx.clean(fs.as_ref())?;
    }

    let (handle, join) = start_runtime(ctx, fs, Arc::new(LiveReload::default()));
    let report = handle.run_generation(&tasks).await?;
    handle.shutdown().await;
    join.await??;

    print_report(ctx, &report);
    if !report.is_success() {
        bail!(
            "build failed: {} of {} requested task(s) did not succeed",
            report.failures().count(),
            report.results.len()
        );
    }
    Ok(())
}

async fn develop(
    ctx: &BuildContext,
    fs: Arc<dyn FileSystem>,
    port: Option<u16>,
    clean: bool,
    tasks: Vec<TaskName>,
) -> Result<()> {
    let tasks = requested_tasks(ctx, tasks);
    // A busy port fails the command before anything is built or watched.
    let listener = server::bind(port.unwrap_or(ctx.settings().port)).await?;

    if clean && ctx.settings().clean {
        ctx.clean(fs.as_ref())?;
    }

    let reload = Arc::new(LiveReload::default());
    let (handle, join) = start_runtime(ctx, fs, Arc::clone(&reload));

    let report = handle.run_generation(&tasks).await?;
    for (task, err) in report.failures() {
        error!(task = %task, error = %err, "initial build failed; watching anyway");
    }

    let root = ctx.layout().root.clone();
    let output_dir = ctx.layout().output_dir.clone();
    let dispatcher = Dispatcher::new(
        root.clone(),
        Arc::clone(ctx.rules()),
        handle.clone(),
        Arc::clone(&reload),
    )
    .ignoring(output_dir.clone());
    let _watcher = spawn_watcher(root, ctx.rules(), ctx.debouncer(), dispatcher)?;

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let mut server = tokio::spawn(async move {
        server::serve(listener, &output_dir, reload, async move {
            let _ = stop_rx.await;
        })
        .await
    });

    let served = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!(error = %e, "failed to listen for Ctrl+C; shutting down");
            }
            info!("shutting down");
            let _ = stop_tx.send(());
            (&mut server).await
        }
        res = &mut server => {
            error!("dev server stopped unexpectedly");
            res
        }
    };

    handle.shutdown().await;
    join.await??;
    served??;
    Ok(())
}

fn print_report(ctx: &BuildContext, report: &GenerationReport) {
    for (task, result) in &report.results {
        match result {
            Ok(()) => println!("  ok      {task}"),
            Err(err) => println!("  FAILED  {task}: {err}"),
        }
    }

    let output_dir = &ctx.layout().output_dir;
    match output_size(output_dir) {
        Ok((files, bytes)) => println!(
            "{}: {files} file(s), {:.1} KiB",
            output_dir.display(),
            bytes as f64 / 1024.0
        ),
        Err(err) => debug!(error = %err, "cannot measure output directory"),
    }
}

/// Number of files and total bytes under `dir`.
fn output_size(dir: &Path) -> std::io::Result<(usize, u64)> {
    let mut files = 0;
    let mut bytes = 0;
    let mut stack = vec![dir.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let meta = entry.metadata()?;
            if meta.is_dir() {
                stack.push(entry.path());
            } else {
                files += 1;
                bytes += meta.len();
            }
        }
    }
    Ok((files, bytes))
}

/// Dry-run output: settings, tasks in topological order with their
/// pipelines, then the watch rules.
pub fn dry_run_report(ctx: &BuildContext) -> String {
    let graph = ctx.graph();
    let settings = ctx.settings();
    let mut out = String::new();

    // Writing into a String cannot fail.
    let _ = writeln!(out, "assetdag dry-run");
    let _ = writeln!(out, "  root = {}", ctx.layout().root.display());
    let _ = writeln!(out, "  source_dir = {}", settings.source_dir.display());
    let _ = writeln!(out, "  output_dir = {}", ctx.layout().output_dir.display());
    let _ = writeln!(out, "  debounce_ms = {}", settings.debounce_ms);
    let _ = writeln!(out, "  port = {}", settings.port);
    let _ = writeln!(out, "  default = {:?}", ctx.default_tasks());
    let _ = writeln!(out);

    let _ = writeln!(out, "tasks ({}), in build order:", graph.len());
    for name in graph.topological_order() {
        let Some(task) = graph.get(&name) else {
            continue;
        };
        let _ = writeln!(out, "  - {name}");
        if !task.prerequisites.is_empty() {
            let _ = writeln!(out, "      after: {:?}", task.prerequisites);
        }
        match &task.action {
            None => {
                let _ = writeln!(out, "      (group)");
            }
            Some(pipeline) => {
                let sources = pipeline.sources();
                let _ = writeln!(out, "      src: {:?}", sources.patterns());
                if !sources.exclude_patterns().is_empty() {
                    let _ = writeln!(out, "      exclude: {:?}", sources.exclude_patterns());
                }
                let _ = writeln!(out, "      dest: {}", pipeline.dest().display());
                let _ = writeln!(out, "      kind: {}", pipeline.kind());
                let _ = writeln!(out, "      stages: {:?}", pipeline.stage_names());
            }
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "watch rules ({}):", ctx.rules().len());
    for rule in ctx.rules().iter() {
        let _ = writeln!(out, "  - patterns: {:?}", rule.patterns());
        if !rule.exclude().is_empty() {
            let _ = writeln!(out, "      exclude: {:?}", rule.exclude());
        }
        if !rule.triggers().is_empty() {
            let _ = writeln!(out, "      triggers: {:?}", rule.triggers());
        }
        if rule.reloads() {
            let _ = writeln!(out, "      reload: true");
        }
    }
    out
}
