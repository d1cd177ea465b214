//! Core domain models for the action pipeline
//!
//! This module defines the step contract, the pipeline fold, the result
//! merge algebra and the configuration that compiles into them.

pub mod condition;
pub mod config;
pub mod error;
pub mod markup;
pub mod pipeline;
pub mod record;
pub mod result;
pub mod schema;
pub mod step;
pub mod template;

pub use error::{Capability, PipelineError};
pub use pipeline::Pipeline;
pub use record::{ObjectKind, Record};
pub use result::{PipelineBehavior, PipelineResult};
pub use step::{Phase, Step};
