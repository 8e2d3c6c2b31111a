use anyhow::anyhow;

use crate::pipeline::stage::{ArtifactIter, Stage, StageContext, per_artifact};

/// Compiles `.scss` / `.sass` artifacts into `.css`.
///
/// Partials (file names starting with `_`) are only reachable through
/// imports and produce no output of their own. Imports resolve relative to
/// the source file's directory and the project root.
#[derive(Debug, Clone, Default)]
pub struct Scss {
    compressed: bool,
}

impl Scss {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compressed(mut self, yes: bool) -> Self {
        self.compressed = yes;
        self
    }
}

impl Stage for Scss {
    fn name(&self) -> &str {
        "scss"
    }

    fn process<'a>(&'a self, inputs: ArtifactIter<'a>, ctx: &'a StageContext) -> ArtifactIter<'a> {
        per_artifact(self.name(), inputs, move |artifact| {
            let is_partial = artifact
                .path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with('_'));
            if is_partial {
                return Ok(Vec::new());
            }

            let style = if self.compressed {
                grass::OutputStyle::Compressed
            } else {
                grass::OutputStyle::Expanded
            };
            let mut options = grass::Options::default().style(style);
            if let Some(dir) = artifact.origin.as_ref().and_then(|o| o.parent()) {
                options = options.load_path(dir);
            }
            options = options.load_path(&ctx.root);

            let css = grass::from_string(artifact.text()?.to_string(), &options)
                .map_err(|e| anyhow!("{e}"))?;

            Ok(vec![artifact.derive(artifact.path.with_extension("css"), css)])
        })
    }
}
