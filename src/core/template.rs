//! Templates, actions and the registry that owns them

use crate::core::{
    config::{ActionConfig, DomainConfig, ModelConfig, Role, TemplateConfig},
    error::PipelineError,
    pipeline::Pipeline,
    record::{ObjectKind, Record},
    schema::{FieldSchema, FieldType, Schema},
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// A named action with its compiled pipeline
#[derive(Debug)]
pub struct Action {
    pub id: String,
    pub roles: Vec<Role>,
    pub pipeline: Arc<Pipeline>,
}

impl Action {
    pub fn from_config(id: &str, config: &ActionConfig) -> Self {
        Self {
            id: id.to_string(),
            roles: config.roles.clone(),
            pipeline: Arc::new(Pipeline::compile(&config.steps)),
        }
    }

    /// Whether any of the held roles grants this action
    pub fn allows(&self, held: &[Role]) -> bool {
        held.contains(&Role::Owner) || self.roles.iter().any(|r| held.contains(r))
    }
}

/// Stream template or per-kind model template
#[derive(Debug)]
pub struct Template {
    pub id: String,
    pub role: String,
    pub label: String,
    pub description: String,
    pub containers: Vec<String>,
    pub states: Vec<String>,
    pub default_action: String,
    pub schema: Arc<Schema>,
    pub actions: BTreeMap<String, Arc<Action>>,
    /// Set for model templates, `None` for stream templates
    pub model: Option<ObjectKind>,
}

fn compile_actions(actions: &BTreeMap<String, ActionConfig>) -> BTreeMap<String, Arc<Action>> {
    actions
        .iter()
        .map(|(id, config)| (id.clone(), Arc::new(Action::from_config(id, config))))
        .collect()
}

fn default_stream_schema() -> Schema {
    let field = |name: &str, max_length: Option<usize>| FieldSchema {
        name: name.to_string(),
        field_type: FieldType::String,
        required: false,
        max_length,
        allowed: Vec::new(),
    };
    Schema {
        fields: vec![field("label", Some(200)), field("summary", Some(1000)), field("body", None)],
    }
}

impl Template {
    pub fn from_config(config: &TemplateConfig) -> Self {
        Self {
            id: config.id.clone(),
            role: config.role.clone().unwrap_or_else(|| config.id.clone()),
            label: config.label.clone(),
            description: config.description.clone(),
            containers: config.containers.clone(),
            states: config.states.clone(),
            default_action: config.default_action.clone(),
            schema: Arc::new(config.schema.clone().unwrap_or_else(default_stream_schema)),
            actions: compile_actions(&config.actions),
            model: None,
        }
    }

    pub fn from_model(kind: ObjectKind, config: &ModelConfig) -> Self {
        Self {
            id: kind.to_string(),
            role: kind.to_string(),
            label: kind.to_string(),
            description: String::new(),
            containers: Vec::new(),
            states: Vec::new(),
            default_action: config.default_action.clone(),
            schema: Arc::new(config.schema.clone()),
            actions: compile_actions(&config.actions),
            model: Some(kind),
        }
    }

    pub fn action(&self, id: &str) -> Option<&Arc<Action>> {
        self.actions.get(id)
    }

    /// Whether `child` may be placed inside streams of this template
    pub fn can_contain(&self, child: &Template) -> bool {
        child.model.is_none() && self.containers.iter().any(|role| *role == child.role)
    }

    pub fn allows_state(&self, state: &str) -> bool {
        self.states.is_empty() || self.states.iter().any(|s| s == state)
    }
}

/// Lookup of every template in the domain
#[derive(Debug, Default)]
pub struct TemplateRegistry {
    templates: BTreeMap<String, Arc<Template>>,
    models: BTreeMap<ObjectKind, Arc<Template>>,
}

impl TemplateRegistry {
    /// Compile every template and action pipeline in the domain
    pub fn from_config(config: &DomainConfig) -> Self {
        let templates: BTreeMap<_, _> = config
            .templates
            .iter()
            .map(|t| (t.id.clone(), Arc::new(Template::from_config(t))))
            .collect();

        let models: BTreeMap<_, _> = config
            .models
            .iter()
            .map(|(kind, m)| (*kind, Arc::new(Template::from_model(*kind, m))))
            .collect();

        debug!(
            templates = templates.len(),
            models = models.len(),
            "Compiled template registry"
        );

        Self { templates, models }
    }

    pub fn template(&self, id: &str) -> Result<Arc<Template>, PipelineError> {
        self.templates
            .get(id)
            .cloned()
            .ok_or_else(|| PipelineError::not_found(format!("template '{}'", id)))
    }

    pub fn model(&self, kind: ObjectKind) -> Result<Arc<Template>, PipelineError> {
        self.models
            .get(&kind)
            .cloned()
            .ok_or_else(|| PipelineError::not_found(format!("no model template for {}", kind)))
    }

    /// Template governing a record: its stream template, or its kind's model
    pub fn template_for(&self, record: &Record) -> Result<Arc<Template>, PipelineError> {
        match (record.kind, &record.template_id) {
            (ObjectKind::Stream, Some(id)) => self.template(id),
            (ObjectKind::Stream, None) => Err(PipelineError::not_found(format!(
                "stream '{}' has no template",
                record.id
            ))),
            (kind, _) => self.model(kind),
        }
    }

    /// Templates that may be created inside `parent`, in the parent's
    /// container preference order
    pub fn containable_by(&self, parent: &Template) -> Vec<Arc<Template>> {
        let mut eligible: Vec<Arc<Template>> = self
            .templates
            .values()
            .filter(|t| parent.can_contain(t))
            .cloned()
            .collect();
        eligible.sort_by_key(|t| {
            parent
                .containers
                .iter()
                .position(|role| *role == t.role)
                .unwrap_or(usize::MAX)
        });
        eligible
    }

    pub fn templates(&self) -> impl Iterator<Item = &Arc<Template>> {
        self.templates.values()
    }

    pub fn models(&self) -> impl Iterator<Item = &Arc<Template>> {
        self.models.values()
    }
}
