// src/pipeline/stages/shell.rs

//! Stages that hand artifacts to external programs.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use anyhow::{Context, Result, bail};
use tracing::debug;

use crate::pipeline::artifact::Artifact;
use crate::pipeline::stage::{ArtifactIter, Stage, StageContext, per_artifact};

/// Build a shell command appropriate for the platform.
fn shell_command(cmd: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    }
}

/// Run `cmd` with `artifact` on stdin and return its stdout.
///
/// The artifact's paths are exported as `ASSET_PATH` (relative) and
/// `ASSET_SOURCE` (on-disk origin, when known).
fn run_piped(cmd: &str, artifact: &Artifact, ctx: &StageContext) -> Result<Vec<u8>> {
    let mut command = shell_command(cmd);
    command
        .current_dir(&ctx.root)
        .env("ASSET_PATH", &artifact.path)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(origin) = &artifact.origin {
        command.env("ASSET_SOURCE", origin);
    }

    let mut child = command
        .spawn()
        .with_context(|| format!("spawning `{cmd}`"))?;

    if let Some(mut stdin) = child.stdin.take() {
        let content = artifact.content.clone();
        // Feed stdin from a separate thread so a large output can't deadlock
        // against a full stdin pipe.
        std::thread::spawn(move || {
            let _ = stdin.write_all(&content);
        });
    }

    let output = child
        .wait_with_output()
        .with_context(|| format!("waiting for `{cmd}`"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "`{cmd}` exited with {}: {}",
            output.status.code().unwrap_or(-1),
            stderr.trim()
        );
    }

    Ok(output.stdout)
}

/// Replaces each artifact's content with the stdout of a command.
///
/// Used for transpilers and minifiers that read stdin and write stdout.
#[derive(Debug, Clone)]
pub struct Shell {
    command: String,
    extension: Option<String>,
}

impl Shell {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            extension: None,
        }
    }

    /// Rename outputs to this extension (e.g. `"js"` for a `.ts` compiler).
    pub fn extension(mut self, ext: impl Into<String>) -> Self {
        self.extension = Some(ext.into());
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

impl Stage for Shell {
    fn name(&self) -> &str {
        "shell"
    }

    fn process<'a>(&'a self, inputs: ArtifactIter<'a>, ctx: &'a StageContext) -> ArtifactIter<'a> {
        per_artifact(self.name(), inputs, move |artifact| {
            debug!(task = %ctx.task, path = %artifact.path.display(), cmd = %self.command, "piping artifact");
            let stdout = run_piped(&self.command, &artifact, ctx)?;
            let path: PathBuf = match &self.extension {
                Some(ext) => artifact.path.with_extension(ext),
                None => artifact.path.clone(),
            };
            Ok(vec![artifact.derive(path, stdout)])
        })
    }
}

/// Runs a checker per artifact and passes the artifact through unchanged.
///
/// Any non-zero exit fails the stage with the checker's stderr.
#[derive(Debug, Clone)]
pub struct Check {
    command: String,
}

impl Check {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl Stage for Check {
    fn name(&self) -> &str {
        "check"
    }

    fn process<'a>(&'a self, inputs: ArtifactIter<'a>, ctx: &'a StageContext) -> ArtifactIter<'a> {
        per_artifact(self.name(), inputs, move |artifact| {
            run_piped(&self.command, &artifact, ctx)?;
            Ok(vec![artifact])
        })
    }
}
