use std::io::Cursor;

use anyhow::{Context, anyhow};
use image::ImageFormat;

use crate::pipeline::stage::{ArtifactIter, Stage, StageContext, per_artifact};

/// Decodes each image and writes it back out in `format`.
///
/// Files the decoder does not recognise (e.g. SVG) pass through unchanged.
#[derive(Debug, Clone)]
pub struct Reencode {
    format: ImageFormat,
}

impl Reencode {
    pub fn new(format: ImageFormat) -> Self {
        Self { format }
    }

    /// Parse a format from its usual file extension (`"png"`, `"webp"`, ...).
    pub fn from_extension(ext: &str) -> anyhow::Result<Self> {
        let format = ImageFormat::from_extension(ext)
            .ok_or_else(|| anyhow!("unknown image format '{ext}'"))?;
        Ok(Self::new(format))
    }
}

impl Stage for Reencode {
    fn name(&self) -> &str {
        "image"
    }

    fn process<'a>(&'a self, inputs: ArtifactIter<'a>, _ctx: &'a StageContext) -> ArtifactIter<'a> {
        per_artifact(self.name(), inputs, move |artifact| {
            if image::guess_format(&artifact.content).is_err() {
                return Ok(vec![artifact]);
            }

            let img = image::load_from_memory(&artifact.content).context("decoding image")?;
            let mut out = Vec::new();
            img.write_to(&mut Cursor::new(&mut out), self.format)
                .context("encoding image")?;

            let ext = self.format.extensions_str().first().copied().unwrap_or("img");
            Ok(vec![artifact.derive(artifact.path.with_extension(ext), out)])
        })
    }
}
