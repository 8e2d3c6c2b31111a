use crate::pipeline::stage::{ArtifactIter, Stage, StageContext};

/// Identity stage: writes sources to the output namespace as they are.
#[derive(Debug, Clone, Default)]
pub struct Passthrough;

impl Stage for Passthrough {
    fn name(&self) -> &str {
        "copy"
    }

    fn process<'a>(&'a self, inputs: ArtifactIter<'a>, _ctx: &'a StageContext) -> ArtifactIter<'a> {
        inputs
    }
}
