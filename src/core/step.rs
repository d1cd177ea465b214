//! Step contract

use crate::builder::Builder;
use crate::core::result::PipelineBehavior;
use async_trait::async_trait;
use std::fmt;

/// Request phase a pipeline runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Safe read (GET/HEAD)
    Get,
    /// Mutating write (everything else)
    Post,
}

impl Phase {
    pub fn from_method(method: &str) -> Self {
        if method.eq_ignore_ascii_case("GET") || method.eq_ignore_ascii_case("HEAD") {
            Phase::Get
        } else {
            Phase::Post
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Get => write!(f, "GET"),
            Phase::Post => write!(f, "POST"),
        }
    }
}

/// A compiled, executable pipeline unit
///
/// Steps hold only the parameters captured at compile time. Each
/// invocation receives the current builder and the shared output sink;
/// nothing is remembered between invocations.
#[async_trait]
pub trait Step: Send + Sync + fmt::Debug {
    /// Configured kind name, for logging
    fn kind(&self) -> &str;

    /// Read phase
    async fn get(&self, builder: &mut dyn Builder, sink: &mut String) -> PipelineBehavior;

    /// Write phase
    async fn post(&self, builder: &mut dyn Builder, sink: &mut String) -> PipelineBehavior;
}
