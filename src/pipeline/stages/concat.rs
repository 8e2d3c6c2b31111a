use std::path::PathBuf;

use crate::errors::StageError;
use crate::pipeline::artifact::Artifact;
use crate::pipeline::stage::{ArtifactIter, Stage, StageContext};

/// Joins all inputs, in input order, into a single artifact at `file`.
///
/// This consumes its whole input before yielding, so it cannot be cached
/// per input.
#[derive(Debug, Clone)]
pub struct Concat {
    file: PathBuf,
    separator: String,
}

impl Concat {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            separator: "\n".to_string(),
        }
    }

    pub fn separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }
}

impl Stage for Concat {
    fn name(&self) -> &str {
        "concat"
    }

    fn process<'a>(&'a self, inputs: ArtifactIter<'a>, _ctx: &'a StageContext) -> ArtifactIter<'a> {
        Box::new(std::iter::once_with(move || -> Result<Artifact, StageError> {
            let mut out: Vec<u8> = Vec::new();
            for (i, input) in inputs.enumerate() {
                let artifact = input?;
                if i > 0 {
                    out.extend_from_slice(self.separator.as_bytes());
                }
                out.extend_from_slice(&artifact.content);
            }
            Ok(Artifact::new(self.file.clone(), out))
        }))
    }
}
