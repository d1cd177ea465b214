//! Pipeline results and step behaviors
//!
//! A `PipelineResult` accumulates the HTTP side effects of a pipeline run.
//! Each step invocation returns a `PipelineBehavior`, which the pipeline
//! folds into its accumulator with [`PipelineResult::merge`].

use crate::core::error::PipelineError;
use serde_json::Value;
use std::collections::BTreeMap;

/// Accumulated side effects of one pipeline run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineResult {
    /// Explicit status code, 0 when unset
    pub status_code: u16,

    /// Explicit content type, empty when unset
    pub content_type: String,

    /// Response headers (first writer wins)
    pub headers: BTreeMap<String, String>,

    /// Client-trigger events (first writer wins)
    pub events: BTreeMap<String, Value>,

    /// Stop executing the current pipeline
    pub halt: bool,

    /// The output is a complete page rather than a fragment
    pub full_page: bool,

    pub error: Option<PipelineError>,
}

impl PipelineResult {
    /// Create an empty result
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold another result into this one.
    ///
    /// Flags are OR-ed. Scalars keep the first explicit value. Map keys
    /// already present are not overwritten. A non-nil error replaces the
    /// current one.
    pub fn merge(&mut self, other: PipelineResult) {
        self.halt |= other.halt;
        self.full_page |= other.full_page;

        if self.status_code == 0 {
            self.status_code = other.status_code;
        }

        if self.content_type.is_empty() {
            self.content_type = other.content_type;
        }

        for (name, value) in other.headers {
            self.headers.entry(name).or_insert(value);
        }

        for (name, value) in other.events {
            self.events.entry(name).or_insert(value);
        }

        if other.error.is_some() {
            self.error = other.error;
        }
    }

    /// A halted result carrying `error`
    pub fn failed(error: PipelineError) -> Self {
        Self {
            halt: true,
            error: Some(error),
            ..Self::default()
        }
    }

    /// True when no further steps should run
    pub fn is_terminal(&self) -> bool {
        self.halt || self.error.is_some()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Verdict of a single step invocation
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineBehavior {
    /// Contribute nothing and continue
    Pass,
    /// Merge the result and continue
    Continue(PipelineResult),
    /// Merge the result and stop the current pipeline
    Halt(PipelineResult),
}

impl PipelineBehavior {
    /// Continue with an empty result, ready for `with_*` additions
    pub fn proceed() -> Self {
        PipelineBehavior::Continue(PipelineResult::new())
    }

    /// Halt with an empty result
    pub fn halt() -> Self {
        PipelineBehavior::Halt(PipelineResult {
            halt: true,
            ..PipelineResult::default()
        })
    }

    /// Halt and carry an error
    pub fn halt_error(error: PipelineError) -> Self {
        PipelineBehavior::Halt(PipelineResult {
            halt: true,
            error: Some(error),
            ..PipelineResult::default()
        })
    }

    /// Adopt the result of an already-executed nested pipeline, including
    /// its halt and error state
    pub fn adopt(result: PipelineResult) -> Self {
        if result.is_terminal() {
            PipelineBehavior::Halt(PipelineResult {
                halt: true,
                ..result
            })
        } else {
            PipelineBehavior::Continue(result)
        }
    }

    pub fn with_header(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let (name, value) = (name.into(), value.into());
        self.map(|result| {
            result.headers.entry(name).or_insert(value);
        })
    }

    pub fn with_event(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let (name, value) = (name.into(), value.into());
        self.map(|result| {
            result.events.entry(name).or_insert(value);
        })
    }

    pub fn with_status(self, code: u16) -> Self {
        self.map(|result| {
            if result.status_code == 0 {
                result.status_code = code;
            }
        })
    }

    pub fn with_content_type(self, content_type: impl Into<String>) -> Self {
        let content_type = content_type.into();
        self.map(|result| {
            if result.content_type.is_empty() {
                result.content_type = content_type;
            }
        })
    }

    pub fn as_full_page(self) -> Self {
        self.map(|result| result.full_page = true)
    }

    pub fn is_halt(&self) -> bool {
        matches!(self, PipelineBehavior::Halt(_))
    }

    /// Split into the carried result and the halt flag; `Pass` yields an
    /// empty result
    pub fn into_parts(self) -> (PipelineResult, bool) {
        match self {
            PipelineBehavior::Pass => (PipelineResult::new(), false),
            PipelineBehavior::Continue(result) => (result, false),
            PipelineBehavior::Halt(result) => (result, true),
        }
    }

    fn map(self, f: impl FnOnce(&mut PipelineResult)) -> Self {
        match self {
            PipelineBehavior::Pass => {
                let mut result = PipelineResult::new();
                f(&mut result);
                PipelineBehavior::Continue(result)
            }
            PipelineBehavior::Continue(mut result) => {
                f(&mut result);
                PipelineBehavior::Continue(result)
            }
            PipelineBehavior::Halt(mut result) => {
                f(&mut result);
                PipelineBehavior::Halt(result)
            }
        }
    }
}
