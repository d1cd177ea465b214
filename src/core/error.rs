//! Runtime error types carried through pipeline results

use crate::core::record::ObjectKind;
use std::fmt;
use thiserror::Error;

/// Optional builder capabilities a step may ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// The context can move its object to another lifecycle state
    SetState,
    /// The context exposes its underlying stream template
    Template,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::SetState => write!(f, "set-state"),
            Capability::Template => write!(f, "template"),
        }
    }
}

/// Error types for pipeline execution
///
/// Errors are values: they travel inside a `PipelineResult` and are
/// classified into an HTTP status by [`PipelineError::status_code`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// Anonymous user attempted a gated action
    #[error("sign in required: {message}")]
    Unauthorized { message: String },

    /// Authenticated user lacks permission
    #[error("forbidden: {message}")]
    Forbidden { message: String },

    #[error("not found: {message}")]
    NotFound { message: String },

    #[error("bad request: {message}")]
    BadRequest { message: String },

    /// Data did not pass the object's schema
    #[error("invalid value for '{field}': {message}")]
    Validation { field: String, message: String },

    /// A step needs a capability the current builder does not have
    #[error("{capability} is not supported for {context} contexts")]
    Unsupported {
        capability: Capability,
        context: ObjectKind,
    },

    /// Configuration named a step kind the compiler does not know
    #[error("unrecognized step '{kind}' in action '{action}' on {object_type} '{object_id}'")]
    UnknownStep {
        kind: String,
        action: String,
        object_type: ObjectKind,
        object_id: String,
    },

    /// A known step kind with parameters that could not be compiled
    #[error("invalid '{kind}' step: {message}")]
    InvalidStep { kind: String, message: String },

    #[error("template error: {0}")]
    Template(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("task queue error: {0}")]
    Queue(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// HTTP status code for this error's classification
    pub fn status_code(&self) -> u16 {
        match self {
            PipelineError::Unauthorized { .. } => 401,
            PipelineError::Forbidden { .. } => 403,
            PipelineError::NotFound { .. } => 404,
            PipelineError::BadRequest { .. } | PipelineError::Validation { .. } => 400,
            PipelineError::Unsupported { .. }
            | PipelineError::UnknownStep { .. }
            | PipelineError::InvalidStep { .. }
            | PipelineError::Template(_)
            | PipelineError::Persistence(_)
            | PipelineError::Queue(_)
            | PipelineError::Internal(_) => 500,
        }
    }

    /// True for the two authorization classifications
    pub fn is_authorization(&self) -> bool {
        matches!(
            self,
            PipelineError::Unauthorized { .. } | PipelineError::Forbidden { .. }
        )
    }
}
