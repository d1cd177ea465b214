//! Request handler - resolves the route, builds the context and applies
//! the pipeline result to an HTTP response

use crate::builder::{builder_for, Authorization, Factory, Request, RequestScope};
use crate::core::{
    error::PipelineError,
    record::{ObjectKind, Record, NEW_TOKEN},
    result::PipelineResult,
};
use crate::steps::control::TEMPLATE_PARAM;
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Header carrying client-trigger events as a JSON object
pub const TRIGGER_HEADER: &str = "HX-Trigger";

/// Query parameter giving the parent of a new record
pub const PARENT_PARAM: &str = "parentId";

/// Markup wrapped around fragments on full navigations
pub const PAGE_MARKUP: &str = "page";

/// `/{kind}/{id|new}[/{action}]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub kind: ObjectKind,
    pub id: String,
    pub action: Option<String>,
}

impl FromStr for Route {
    type Err = PipelineError;

    fn from_str(path: &str) -> Result<Self, Self::Err> {
        let path = path.split('?').next().unwrap_or_default();
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        let (kind, id, action) = match segments.as_slice() {
            [kind, id] => (*kind, *id, None),
            [kind, id, action] => (*kind, *id, Some(action.to_string())),
            _ => return Err(PipelineError::not_found(format!("no route for '{}'", path))),
        };

        let kind = kind
            .parse::<ObjectKind>()
            .map_err(PipelineError::not_found)?;

        Ok(Route {
            kind,
            id: id.to_string(),
            action,
        })
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.kind, self.id)?;
        if let Some(action) = &self.action {
            write!(f, "/{}", action)?;
        }
        Ok(())
    }
}

/// Response handed to the HTTP layer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: String,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    /// The body is a complete page rather than a fragment
    pub full_page: bool,
}

impl HttpResponse {
    /// Apply a pipeline result. Error classification beats an explicit
    /// status; directly assigned headers beat result headers.
    pub fn from_result(
        result: PipelineResult,
        body: String,
        direct_headers: BTreeMap<String, String>,
    ) -> Self {
        let status = match &result.error {
            Some(error) => error.status_code(),
            None if result.status_code != 0 => result.status_code,
            None => 200,
        };

        let content_type = if result.content_type.is_empty() {
            "text/html".to_string()
        } else {
            result.content_type
        };

        let mut headers = result.headers;
        if !result.events.is_empty() {
            match serde_json::to_string(&result.events) {
                Ok(events) => {
                    headers.insert(TRIGGER_HEADER.to_string(), events);
                }
                Err(e) => warn!("Could not encode trigger events: {}", e),
            }
        }
        headers.extend(direct_headers);

        let body = match &result.error {
            Some(error) if body.is_empty() => error.to_string(),
            _ => body,
        };

        Self {
            status,
            content_type,
            headers,
            body,
            full_page: result.full_page,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..400).contains(&self.status)
    }
}

/// Events emitted while handling requests
#[derive(Debug, Clone)]
pub enum EngineEvent {
    RequestStarted {
        request_id: Uuid,
        method: String,
        path: String,
    },
    ActionResolved {
        request_id: Uuid,
        kind: ObjectKind,
        object_id: String,
        action: String,
        steps: usize,
    },
    RequestCompleted {
        request_id: Uuid,
        status: u16,
        halted: bool,
        error: Option<String>,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(EngineEvent) + Send + Sync>;

/// Handles requests against a factory's templates and services
pub struct ActionEngine {
    factory: Arc<Factory>,
    event_handlers: Arc<Mutex<Vec<EventHandler>>>,
}

impl ActionEngine {
    pub fn new(factory: Arc<Factory>) -> Self {
        Self {
            factory,
            event_handlers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn factory(&self) -> &Arc<Factory> {
        &self.factory
    }

    /// Add an event handler
    pub async fn add_event_handler<F>(&self, handler: F)
    where
        F: Fn(EngineEvent) + Send + Sync + 'static,
    {
        self.event_handlers.lock().await.push(Arc::new(handler));
    }

    /// Emit an event to all handlers
    async fn emit_event(&self, event: EngineEvent) {
        let handlers = self.event_handlers.lock().await;
        for handler in handlers.iter() {
            handler(event.clone());
        }
    }

    /// Handle one request from route resolution to response
    pub async fn handle(&self, request: Request, authorization: Authorization) -> HttpResponse {
        let request_id = Uuid::new_v4();
        info!("Handling {} {} ({})", request.method, request.path, request_id);
        self.emit_event(EngineEvent::RequestStarted {
            request_id,
            method: request.method.clone(),
            path: request.path.clone(),
        })
        .await;

        let scope = RequestScope::new(self.factory.clone(), request, authorization);
        let mut body = String::new();
        let mut result = self.dispatch(request_id, &scope, &mut body).await;

        if result.error.is_none() && !result.full_page && !scope.request().is_partial() {
            body = self.wrap_page(&scope, body, &mut result);
        }

        let halted = result.halt;
        let response = HttpResponse::from_result(result, body, scope.response_headers());

        info!(
            "Finished {} {} - {} ({})",
            scope.request().method,
            scope.request().path,
            response.status,
            request_id
        );
        self.emit_event(EngineEvent::RequestCompleted {
            request_id,
            status: response.status,
            halted,
            error: (!response.is_success()).then(|| response.body.clone()),
        })
        .await;

        response
    }

    async fn dispatch(&self, request_id: Uuid, scope: &RequestScope, sink: &mut String) -> PipelineResult {
        let route = match scope.request().path.parse::<Route>() {
            Ok(route) => route,
            Err(e) => return PipelineResult::failed(e),
        };

        let record = match self.resolve(&route, scope).await {
            Ok(record) => record,
            Err(e) => return PipelineResult::failed(e),
        };

        let action_id = match &route.action {
            Some(action) => action.clone(),
            None => match self.factory.registry().template_for(&record) {
                Ok(template) => template.default_action.clone(),
                Err(e) => return PipelineResult::failed(e),
            },
        };

        let mut builder = match builder_for(scope.clone(), record, &action_id) {
            Ok(builder) => builder,
            Err(e) => {
                if e.is_authorization() {
                    info!("Access denied: {}", e);
                } else {
                    debug!("Context rejected: {}", e);
                }
                return PipelineResult::failed(e);
            }
        };

        let pipeline = builder.action().pipeline.clone();
        self.emit_event(EngineEvent::ActionResolved {
            request_id,
            kind: route.kind,
            object_id: builder.object_id().to_string(),
            action: action_id.clone(),
            steps: pipeline.len(),
        })
        .await;

        pipeline
            .execute(scope.request().phase(), builder.as_mut(), sink)
            .await
    }

    /// Load the routed record, or initialize one for `new`
    async fn resolve(&self, route: &Route, scope: &RequestScope) -> Result<Record, PipelineError> {
        let service = self.factory.service(route.kind)?;

        if route.id != NEW_TOKEN {
            return service
                .load(&route.id)
                .await?
                .ok_or_else(|| PipelineError::not_found(format!("{} '{}'", route.kind, route.id)));
        }

        let request = scope.request();
        let mut record = service.new_object();
        record.owner_id = scope.authorization().user_id().map(str::to_string);

        if let Some(parent_id) = request.param(PARENT_PARAM) {
            let parent = self
                .factory
                .locate(parent_id)
                .await?
                .ok_or_else(|| PipelineError::not_found(format!("parent '{}'", parent_id)))?;
            record.parent_id = Some(parent.id.clone());
            record.owner_id = match parent.kind {
                ObjectKind::User => Some(parent.id),
                _ => parent.owner_id.or(record.owner_id),
            };
        }

        if route.kind == ObjectKind::Stream {
            let template_id = request.param(TEMPLATE_PARAM).ok_or_else(|| {
                PipelineError::bad_request(format!("'{}' is required for a new stream", TEMPLATE_PARAM))
            })?;
            record.template_id = Some(template_id.to_string());
        }

        Ok(record)
    }

    /// Wrap fragment output in the page markup when one is defined
    fn wrap_page(&self, scope: &RequestScope, body: String, result: &mut PipelineResult) -> String {
        let markup = self.factory.markup();
        if !markup.contains(PAGE_MARKUP) {
            return body;
        }

        let data = json!({
            "content": body,
            "path": scope.request().path,
            "user": {
                "id": scope.authorization().user_id(),
                "authenticated": scope.authorization().is_authenticated(),
            },
        });
        let mut page = String::new();
        match markup.execute(&mut page, PAGE_MARKUP, &data) {
            Ok(()) => {
                result.full_page = true;
                page
            }
            Err(e) => {
                warn!("Could not render page markup: {}", e);
                body
            }
        }
    }
}
