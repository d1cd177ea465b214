//! Per-request handles shared by a builder and all of its children

use crate::builder::factory::Factory;
use crate::core::{error::PipelineError, step::Phase};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Inbound request as seen by the engine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Request {
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub query: BTreeMap<String, String>,
    #[serde(default)]
    pub form: BTreeMap<String, String>,
    /// Header names are stored lower-cased
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl Request {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new("GET", path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new("POST", path)
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    pub fn with_form(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.insert(name.into(), value.into());
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Mark as a fragment request issued by the client library
    pub fn partial(self) -> Self {
        self.with_header("HX-Request", "true")
    }

    pub fn phase(&self) -> Phase {
        Phase::from_method(&self.method)
    }

    pub fn is_partial(&self) -> bool {
        self.header("hx-request") == Some("true")
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Query parameter, falling back to the submitted form
    pub fn param(&self, name: &str) -> Option<&str> {
        self.query
            .get(name)
            .or_else(|| self.form.get(name))
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

/// Response handle for headers assigned outside the pipeline result
#[derive(Debug, Clone, Default)]
pub struct ResponseWriter {
    headers: BTreeMap<String, String>,
}

impl ResponseWriter {
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name.into(), value.into());
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }
}

/// Who is making the request
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Authorization {
    #[default]
    Anonymous,
    Authenticated { user_id: String },
    /// Signed in as the domain owner
    Owner { user_id: String },
}

impl Authorization {
    pub fn user(user_id: impl Into<String>) -> Self {
        Authorization::Authenticated {
            user_id: user_id.into(),
        }
    }

    pub fn owner(user_id: impl Into<String>) -> Self {
        Authorization::Owner {
            user_id: user_id.into(),
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            Authorization::Anonymous => None,
            Authorization::Authenticated { user_id } | Authorization::Owner { user_id } => {
                Some(user_id)
            }
        }
    }

    pub fn is_authenticated(&self) -> bool {
        !matches!(self, Authorization::Anonymous)
    }

    pub fn is_owner(&self) -> bool {
        matches!(self, Authorization::Owner { .. })
    }
}

/// How many builders deep one request may nest
pub const MAX_NESTING: usize = 16;

/// Request, response and authorization for one request
///
/// Cloning shares the same request and response handle, so child
/// builders write to the same response as their parent.
#[derive(Clone)]
pub struct RequestScope {
    factory: Arc<Factory>,
    request: Arc<Request>,
    response: Arc<Mutex<ResponseWriter>>,
    authorization: Authorization,
    depth: usize,
}

impl RequestScope {
    pub fn new(factory: Arc<Factory>, request: Request, authorization: Authorization) -> Self {
        Self {
            factory,
            request: Arc::new(request),
            response: Arc::new(Mutex::new(ResponseWriter::default())),
            authorization,
            depth: 0,
        }
    }

    /// Scope for a builder nested one level below this one. Fails once
    /// the request nests past [`MAX_NESTING`], which only a cycle between
    /// actions can reach.
    pub fn nested(&self, kind: &str) -> Result<Self, PipelineError> {
        if self.depth >= MAX_NESTING {
            return Err(PipelineError::InvalidStep {
                kind: kind.to_string(),
                message: format!("actions nest more than {} levels deep", MAX_NESTING),
            });
        }
        Ok(Self {
            depth: self.depth + 1,
            ..self.clone()
        })
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn factory(&self) -> &Arc<Factory> {
        &self.factory
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn authorization(&self) -> &Authorization {
        &self.authorization
    }

    pub fn response(&self) -> MutexGuard<'_, ResponseWriter> {
        // A poisoned writer still holds valid headers
        match self.response.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Snapshot of the directly assigned headers
    pub fn response_headers(&self) -> BTreeMap<String, String> {
        self.response().headers().clone()
    }
}
