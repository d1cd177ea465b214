//! actionpipe - declarative action pipelines over domain objects

pub mod builder;
pub mod cli;
pub mod core;
pub mod execution;
pub mod persistence;
pub mod steps;

// Re-export commonly used types
pub use builder::{builder_for, Authorization, Builder, BuilderCore, Factory, Request, RequestScope};
pub use core::config::{DomainConfig, StepConfig};
pub use core::{Phase, Pipeline, PipelineBehavior, PipelineError, PipelineResult, Step};
pub use execution::{ActionEngine, ChannelQueue, EngineEvent, HttpResponse, Task, TaskQueue};
pub use persistence::{InMemoryService, ModelService};
