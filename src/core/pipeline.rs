//! Pipeline domain model

use crate::builder::Builder;
use crate::core::{
    config::StepConfig,
    result::PipelineResult,
    step::{Phase, Step},
};
use tracing::{debug, warn};

/// An ordered, immutable list of compiled steps
#[derive(Debug, Default)]
pub struct Pipeline {
    steps: Vec<Box<dyn Step>>,
}

impl Pipeline {
    pub fn new(steps: Vec<Box<dyn Step>>) -> Self {
        Self { steps }
    }

    /// Compile step records into a pipeline
    pub fn compile(configs: &[StepConfig]) -> Self {
        Self::new(configs.iter().map(crate::steps::compile).collect())
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Kind names of the top-level steps, in order
    pub fn kinds(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.kind()).collect()
    }

    /// Run the read phase
    pub async fn get(&self, builder: &mut dyn Builder, sink: &mut String) -> PipelineResult {
        self.run(Phase::Get, builder, sink).await
    }

    /// Run the write phase
    pub async fn post(&self, builder: &mut dyn Builder, sink: &mut String) -> PipelineResult {
        self.run(Phase::Post, builder, sink).await
    }

    /// Run whichever phase the request calls for
    pub async fn execute(
        &self,
        phase: Phase,
        builder: &mut dyn Builder,
        sink: &mut String,
    ) -> PipelineResult {
        match phase {
            Phase::Get => self.get(builder, sink).await,
            Phase::Post => self.post(builder, sink).await,
        }
    }

    /// Linear short-circuiting fold over the steps
    async fn run(&self, phase: Phase, builder: &mut dyn Builder, sink: &mut String) -> PipelineResult {
        let mut result = PipelineResult::new();

        for (index, step) in self.steps.iter().enumerate() {
            debug!(step = step.kind(), index, %phase, "Executing step");

            let behavior = match phase {
                Phase::Get => step.get(builder, sink).await,
                Phase::Post => step.post(builder, sink).await,
            };

            let (contribution, halt) = behavior.into_parts();
            result.merge(contribution);

            if let Some(error) = &result.error {
                warn!(step = step.kind(), index, %phase, "Step failed: {}", error);
                result.halt = true;
                return result;
            }

            if halt || result.halt {
                debug!(step = step.kind(), index, %phase, "Pipeline halted");
                result.halt = true;
                return result;
            }
        }

        result
    }
}
