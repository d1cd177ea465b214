//! Builders: the object being acted upon in the context of one request
//!
//! Every concrete builder wraps a [`BuilderCore`] and decides who counts as
//! the object's author. Optional capabilities are exposed through
//! [`Builder::state_setter`] and [`Builder::template_holder`]; steps that
//! need one fail with [`PipelineError::Unsupported`] when it is absent.

pub mod factory;
pub mod models;
pub mod scope;

pub use factory::Factory;
pub use models::{
    builder_for, scoped_builder_for, CircleBuilder, FolderBuilder, FollowerBuilder, MessageBuilder, ProfileBuilder,
    RuleBuilder, StreamBuilder,
};
pub use scope::{Authorization, Request, RequestScope, ResponseWriter};

use crate::core::{
    config::Role,
    error::PipelineError,
    record::{ObjectKind, Record},
    schema::Schema,
    template::{Action, Template},
};
use crate::persistence::ModelService;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// State shared by every builder variant
pub struct BuilderCore {
    pub scope: RequestScope,
    pub object: Record,
    /// Template whose actions govern this builder
    pub template: Arc<Template>,
    /// The object's own template: schema, states and containers
    pub model: Arc<Template>,
    pub action: Arc<Action>,
    pub service: Arc<dyn ModelService>,
    scratch: Map<String, Value>,
}

impl BuilderCore {
    /// Resolve the template, action and service for `object`
    pub fn new(scope: RequestScope, object: Record, action_id: &str) -> Result<Self, PipelineError> {
        let template = scope.factory().registry().template_for(&object)?;
        let action = template.action(action_id).cloned().ok_or_else(|| {
            PipelineError::not_found(format!(
                "action '{}' on {} '{}'",
                action_id, object.kind, object.id
            ))
        })?;
        Self::with_action(scope, object, template, action)
    }

    /// Bind `object` under a template and action taken from elsewhere,
    /// usually the parent builder of a scoped child
    pub fn with_action(
        scope: RequestScope,
        object: Record,
        template: Arc<Template>,
        action: Arc<Action>,
    ) -> Result<Self, PipelineError> {
        let factory = scope.factory().clone();
        let model = factory.registry().template_for(&object)?;
        let service = factory.service(object.kind)?;

        Ok(Self {
            scope,
            object,
            template,
            model,
            action,
            service,
            scratch: Map::new(),
        })
    }
}

/// Capability: the object can move to another lifecycle state
pub trait StateSetter {
    fn set_state(&mut self, state: &str) -> Result<(), PipelineError>;
}

/// Capability: the builder exposes its stream template
pub trait TemplateHolder {
    fn stream_template(&self) -> &Arc<Template>;

    /// Templates that may be created inside this object
    fn containable_templates(&self) -> Vec<Arc<Template>>;
}

/// Common contract every step may call
pub trait Builder: Send + Sync {
    fn core(&self) -> &BuilderCore;

    fn core_mut(&mut self) -> &mut BuilderCore;

    /// Whether the current user is the author of this object
    fn is_author(&self) -> bool;

    fn state_setter(&mut self) -> Option<&mut dyn StateSetter> {
        None
    }

    fn template_holder(&self) -> Option<&dyn TemplateHolder> {
        None
    }

    fn scope(&self) -> &RequestScope {
        &self.core().scope
    }

    fn factory(&self) -> &Arc<Factory> {
        self.core().scope.factory()
    }

    fn request(&self) -> &Request {
        self.core().scope.request()
    }

    fn authorization(&self) -> &Authorization {
        self.core().scope.authorization()
    }

    fn object(&self) -> &Record {
        &self.core().object
    }

    fn object_mut(&mut self) -> &mut Record {
        &mut self.core_mut().object
    }

    fn object_id(&self) -> &str {
        &self.core().object.id
    }

    fn object_type(&self) -> ObjectKind {
        self.core().object.kind
    }

    fn schema(&self) -> Arc<Schema> {
        self.core().model.schema.clone()
    }

    fn service(&self) -> Arc<dyn ModelService> {
        self.core().service.clone()
    }

    /// Template governing this object
    fn template(&self) -> &Arc<Template> {
        &self.core().template
    }

    fn action(&self) -> &Arc<Action> {
        &self.core().action
    }

    fn action_id(&self) -> &str {
        &self.core().action.id
    }

    fn actions(&self) -> &BTreeMap<String, Arc<Action>> {
        &self.core().template.actions
    }

    fn is_authenticated(&self) -> bool {
        self.authorization().is_authenticated()
    }

    fn is_owner(&self) -> bool {
        self.authorization().is_owner()
    }

    /// Roles the current user holds on this object
    fn roles(&self) -> Vec<Role> {
        let mut roles = vec![Role::Anonymous];
        if self.is_authenticated() {
            roles.push(Role::Authenticated);
        }
        if self.is_owner() {
            roles.push(Role::Owner);
        }
        if self.is_author() {
            roles.push(Role::Author);
        }
        roles
    }

    fn user_can(&self, action_id: &str) -> bool {
        self.actions()
            .get(action_id)
            .map(|action| action.allows(&self.roles()))
            .unwrap_or(false)
    }

    /// Render a named markup template into `sink`
    fn execute(&self, sink: &mut String, name: &str, data: &Value) -> Result<(), PipelineError> {
        self.factory().markup().execute(sink, name, data)
    }

    /// Render a named markup template against this builder's data
    fn render(&self, sink: &mut String, name: &str) -> Result<(), PipelineError> {
        let data = self.template_data();
        self.execute(sink, name, &data)
    }

    /// Data handed to markup and conditions
    fn template_data(&self) -> Value {
        let core = self.core();
        let auth = self.authorization();
        json!({
            "object": core.object.to_template_value(),
            "objectId": core.object.id,
            "objectType": core.object.kind.as_str(),
            "actionId": core.action.id,
            "user": {
                "id": auth.user_id(),
                "authenticated": auth.is_authenticated(),
                "owner": auth.is_owner(),
                "author": self.is_author(),
            },
            "query": self.request().query,
            "form": self.request().form,
            "data": core.scratch,
            "template": {
                "id": core.template.id,
                "role": core.template.role,
                "label": core.template.label,
                "description": core.template.description,
            },
        })
    }

    fn get_string(&self, name: &str) -> String {
        match self.core().scratch.get(name) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        }
    }

    fn set_string(&mut self, name: &str, value: &str) {
        self.core_mut()
            .scratch
            .insert(name.to_string(), Value::String(value.to_string()));
    }

    fn get_bool(&self, name: &str) -> bool {
        match self.core().scratch.get(name) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => crate::core::markup::is_truthy_str(s),
            _ => false,
        }
    }

    fn set_bool(&mut self, name: &str, value: bool) {
        self.core_mut().scratch.insert(name.to_string(), Value::Bool(value));
    }

    fn get_int(&self, name: &str) -> i64 {
        match self.core().scratch.get(name) {
            Some(Value::Number(n)) => n.as_i64().unwrap_or_default(),
            Some(Value::String(s)) => s.trim().parse().unwrap_or_default(),
            _ => 0,
        }
    }

    fn set_int(&mut self, name: &str, value: i64) {
        self.core_mut().scratch.insert(name.to_string(), Value::from(value));
    }
}

/// Reject a request before any step runs when the user may not run the
/// builder's action
pub fn authorize(builder: &dyn Builder) -> Result<(), PipelineError> {
    let action_id = builder.action_id();
    if builder.user_can(action_id) {
        return Ok(());
    }

    let target = format!(
        "'{}' on {} '{}'",
        action_id,
        builder.object_type(),
        builder.object_id()
    );
    if builder.is_authenticated() {
        Err(PipelineError::forbidden(target))
    } else {
        Err(PipelineError::unauthorized(target))
    }
}
