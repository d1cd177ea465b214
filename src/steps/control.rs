//! Control-flow steps
//!
//! Each of these embeds one or more nested pipelines and runs them in the
//! same phase as the enclosing pipeline, folding the nested result back
//! with [`PipelineBehavior::adopt`]. A nested error therefore always halts
//! the enclosing pipeline too.

use crate::builder::{builder_for, models::require_template_holder, scoped_builder_for, Builder};
use crate::core::{
    condition::Condition,
    config::{scoped_step_kind, ChooserStyle},
    error::PipelineError,
    markup::escape_html,
    pipeline::Pipeline,
    record::{ObjectKind, Record, NEW_TOKEN},
    result::PipelineBehavior,
    step::{Phase, Step},
    template::Template,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

/// Query parameter naming the template to create
pub const TEMPLATE_PARAM: &str = "templateId";

/// Event telling the client to dismiss an open modal
pub const CLOSE_MODAL_EVENT: &str = "closeModal";

/// Owner for a record created inside `parent`
fn child_owner(parent: &dyn Builder) -> Option<String> {
    let object = parent.object();
    match object.kind {
        ObjectKind::User => Some(object.id.clone()),
        _ => object
            .owner_id
            .clone()
            .or_else(|| parent.authorization().user_id().map(str::to_string)),
    }
}

/// Run one of two nested pipelines depending on a condition
#[derive(Debug)]
pub struct IfStep {
    condition: Condition,
    then: Pipeline,
    otherwise: Pipeline,
}

impl IfStep {
    pub fn new(condition: Condition, then: Pipeline, otherwise: Pipeline) -> Self {
        Self {
            condition,
            then,
            otherwise,
        }
    }

    async fn run(&self, phase: Phase, builder: &mut dyn Builder, sink: &mut String) -> PipelineBehavior {
        let matched = self.condition.evaluate(&builder.template_data());
        debug!(condition = self.condition.source(), matched, "Evaluated condition");

        let branch = if matched { &self.then } else { &self.otherwise };
        PipelineBehavior::adopt(branch.execute(phase, builder, sink).await)
    }
}

#[async_trait]
impl Step for IfStep {
    fn kind(&self) -> &str {
        "if"
    }

    async fn get(&self, builder: &mut dyn Builder, sink: &mut String) -> PipelineBehavior {
        self.run(Phase::Get, builder, sink).await
    }

    async fn post(&self, builder: &mut dyn Builder, sink: &mut String) -> PipelineBehavior {
        self.run(Phase::Post, builder, sink).await
    }
}

/// Bind a child object from the query string and run nested steps on it
#[derive(Debug)]
pub struct WithObjectStep {
    kind: ObjectKind,
    action: Option<String>,
    steps: Pipeline,
}

impl WithObjectStep {
    pub fn new(kind: ObjectKind, action: Option<String>, steps: Pipeline) -> Self {
        Self { kind, action, steps }
    }

    /// Create a fresh record, or load and check the requested one
    async fn resolve(&self, builder: &dyn Builder) -> Result<Record, PipelineError> {
        let token = builder
            .request()
            .param(self.kind.token_param())
            .unwrap_or(NEW_TOKEN)
            .to_string();
        let service = builder.factory().service(self.kind)?;

        if token == NEW_TOKEN {
            let mut record = service.new_object();
            record.parent_id = Some(builder.object_id().to_string());
            record.owner_id = child_owner(builder);
            if self.kind == ObjectKind::Stream {
                let template_id = builder.request().param(TEMPLATE_PARAM).ok_or_else(|| {
                    PipelineError::bad_request(format!("'{}' is required for a new child", TEMPLATE_PARAM))
                })?;
                record.template_id = Some(template_id.to_string());
            }
            return Ok(record);
        }

        match service.load(&token).await? {
            Some(record) if record.parent_id.as_deref() == Some(builder.object_id()) => Ok(record),
            _ => Err(PipelineError::not_found(format!(
                "{} '{}' in {} '{}'",
                self.kind,
                token,
                builder.object_type(),
                builder.object_id()
            ))),
        }
    }

    async fn run(&self, phase: Phase, builder: &mut dyn Builder, sink: &mut String) -> PipelineBehavior {
        let record = match self.resolve(builder).await {
            Ok(record) => record,
            Err(e) => {
                debug!(step = self.kind(), "Scoped object did not resolve: {}", e);
                return PipelineBehavior::halt_error(e);
            }
        };

        // A named action switches to the child's own model; otherwise the
        // child keeps running the parent's template and action
        let child = match &self.action {
            Some(action_id) => builder
                .scope()
                .nested(self.kind())
                .and_then(|scope| builder_for(scope, record, action_id)),
            None => scoped_builder_for(builder, record),
        };
        let mut child = match child {
            Ok(child) => child,
            Err(e) => return PipelineBehavior::halt_error(e),
        };

        PipelineBehavior::adopt(self.steps.execute(phase, child.as_mut(), sink).await)
    }
}

#[async_trait]
impl Step for WithObjectStep {
    fn kind(&self) -> &str {
        scoped_step_kind(self.kind)
    }

    async fn get(&self, builder: &mut dyn Builder, sink: &mut String) -> PipelineBehavior {
        self.run(Phase::Get, builder, sink).await
    }

    async fn post(&self, builder: &mut dyn Builder, sink: &mut String) -> PipelineBehavior {
        self.run(Phase::Post, builder, sink).await
    }
}

/// Presentation wrapped around nested output
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Modal {
        class: Option<String>,
        /// Action rendered behind the modal on a full navigation
        background: String,
    },
    Tooltip {
        /// Action rendered behind the tooltip on a full navigation
        background: String,
    },
}

impl Envelope {
    pub fn background(&self) -> &str {
        match self {
            Envelope::Modal { background, .. } | Envelope::Tooltip { background } => background,
        }
    }

    pub fn wrap(&self, content: &str) -> String {
        match self {
            Envelope::Modal { class, .. } => {
                let class = match class {
                    Some(extra) => format!("modal {}", escape_html(extra)),
                    None => "modal".to_string(),
                };
                format!(
                    "<div id=\"modal\" class=\"{}\"><div class=\"modal-underlay\"></div><div class=\"modal-window\">{}</div></div>",
                    class, content
                )
            }
            Envelope::Tooltip { .. } => format!("<div class=\"tooltip\" role=\"tooltip\">{}</div>", content),
        }
    }
}

/// Present nested output as a modal dialog or tooltip
#[derive(Debug)]
pub struct ModalStep {
    envelope: Envelope,
    steps: Pipeline,
}

impl ModalStep {
    pub fn new(envelope: Envelope, steps: Pipeline) -> Self {
        Self { envelope, steps }
    }

    /// Swap the wrapped output into the client's aside
    async fn partial(&self, builder: &mut dyn Builder, sink: &mut String) -> PipelineBehavior {
        let mut content = String::new();
        let result = self.steps.get(builder, &mut content).await;
        if result.error.is_none() {
            sink.push_str(&self.envelope.wrap(&content));
        }

        PipelineBehavior::adopt(result)
            .with_header("HX-Retarget", "aside")
            .with_header("HX-Reswap", "innerHTML")
            .with_header("HX-Push-Url", "false")
    }

    /// Render the background action as a whole page and splice the modal in
    async fn full_page(
        &self,
        background: &str,
        builder: &mut dyn Builder,
        sink: &mut String,
    ) -> PipelineBehavior {
        if background == builder.action_id() {
            return PipelineBehavior::halt_error(PipelineError::InvalidStep {
                kind: self.kind().to_string(),
                message: format!("background action '{}' is the step's own action", background),
            });
        }

        let backdrop = builder
            .scope()
            .nested(self.kind())
            .and_then(|scope| builder_for(scope, builder.object().clone(), background));
        let mut backdrop = match backdrop {
            Ok(backdrop) => backdrop,
            Err(e) => return PipelineBehavior::halt_error(e),
        };

        let pipeline = backdrop.action().pipeline.clone();
        let mut page = String::new();
        let mut result = pipeline.get(backdrop.as_mut(), &mut page).await;
        if result.error.is_some() {
            return PipelineBehavior::adopt(result);
        }
        // The background pipeline halting only ends the background
        result.halt = false;

        let mut content = String::new();
        let modal = self.steps.get(builder, &mut content).await;
        let failed = modal.error.is_some();
        result.merge(modal);
        result.full_page = true;

        if !failed {
            let aside = format!("<aside>{}</aside>", self.envelope.wrap(&content));
            match page.rfind("</body>") {
                Some(at) => page.insert_str(at, &aside),
                None => page.push_str(&aside),
            }
            sink.push_str(&page);
        }

        PipelineBehavior::adopt(result)
    }
}

#[async_trait]
impl Step for ModalStep {
    fn kind(&self) -> &str {
        match self.envelope {
            Envelope::Modal { .. } => "as-modal",
            Envelope::Tooltip { .. } => "as-tooltip",
        }
    }

    async fn get(&self, builder: &mut dyn Builder, sink: &mut String) -> PipelineBehavior {
        if builder.request().is_partial() {
            self.partial(builder, sink).await
        } else {
            self.full_page(self.envelope.background(), builder, sink).await
        }
    }

    async fn post(&self, builder: &mut dyn Builder, sink: &mut String) -> PipelineBehavior {
        let result = self.steps.post(builder, sink).await;
        if result.error.is_some() {
            return PipelineBehavior::adopt(result);
        }
        PipelineBehavior::adopt(result).with_event(CLOSE_MODAL_EVENT, "")
    }
}

/// Offer the templates that fit inside this stream, or create one directly
#[derive(Debug)]
pub struct AddChildStep {
    style: ChooserStyle,
    templates: Vec<String>,
    action: String,
    steps: Pipeline,
}

impl AddChildStep {
    pub fn new(style: ChooserStyle, templates: Vec<String>, action: String, steps: Pipeline) -> Self {
        Self {
            style,
            templates,
            action,
            steps,
        }
    }

    fn eligible(&self, builder: &dyn Builder) -> Result<Vec<Arc<Template>>, PipelineError> {
        let holder = require_template_holder(builder)?;
        let eligible: Vec<Arc<Template>> = holder
            .containable_templates()
            .into_iter()
            .filter(|t| self.templates.is_empty() || self.templates.contains(&t.id))
            .collect();

        if eligible.is_empty() {
            return Err(PipelineError::bad_request(format!(
                "nothing can be added to '{}'",
                holder.stream_template().id
            )));
        }
        Ok(eligible)
    }

    /// Template to create right away, if the request or style decides it
    fn choose(
        &self,
        builder: &dyn Builder,
        eligible: &[Arc<Template>],
    ) -> Result<Option<Arc<Template>>, PipelineError> {
        if let Some(hint) = builder.request().param(TEMPLATE_PARAM) {
            return eligible
                .iter()
                .find(|t| t.id == hint)
                .cloned()
                .map(Some)
                .ok_or_else(|| PipelineError::bad_request(format!("template '{}' cannot be added here", hint)));
        }

        if self.style == ChooserStyle::Inline || eligible.len() == 1 {
            return Ok(eligible.first().cloned());
        }
        Ok(None)
    }

    async fn create(
        &self,
        phase: Phase,
        template: &Template,
        builder: &mut dyn Builder,
        sink: &mut String,
    ) -> PipelineBehavior {
        let service = match builder.factory().service(ObjectKind::Stream) {
            Ok(service) => service,
            Err(e) => return PipelineBehavior::halt_error(e),
        };

        let mut record = service
            .new_object()
            .with_parent(builder.object_id())
            .with_template(template.id.clone());
        record.owner_id = child_owner(builder);

        debug!(template = %template.id, parent = builder.object_id(), "Adding child");

        let child = builder
            .scope()
            .nested(self.kind())
            .and_then(|scope| builder_for(scope, record, &self.action));
        let mut child = match child {
            Ok(child) => child,
            Err(e) => return PipelineBehavior::halt_error(e),
        };

        // Without nested steps the template's own action does the creating
        let result = if self.steps.is_empty() {
            let pipeline = child.action().pipeline.clone();
            pipeline.execute(phase, child.as_mut(), sink).await
        } else {
            self.steps.execute(phase, child.as_mut(), sink).await
        };
        PipelineBehavior::adopt(result)
    }

    fn render_chooser(
        &self,
        builder: &dyn Builder,
        eligible: &[Arc<Template>],
        sink: &mut String,
    ) -> Result<(), PipelineError> {
        let mut options = String::new();
        for template in eligible {
            let data = json!({
                "parentId": builder.object_id(),
                "action": self.action,
                "template": {
                    "id": template.id,
                    "role": template.role,
                    "label": template.label,
                    "description": template.description,
                },
            });
            if builder.factory().markup().contains("add-child-option") {
                builder.execute(&mut options, "add-child-option", &data)?;
            } else {
                options.push_str(&format!(
                    "<li><button hx-get=\"?{}={}\">{}</button></li>",
                    TEMPLATE_PARAM,
                    escape_html(&template.id),
                    escape_html(&template.label)
                ));
            }
        }

        if builder.factory().markup().contains("add-child-chooser") {
            let mut data = builder.template_data();
            if let Value::Object(map) = &mut data {
                map.insert("options".to_string(), Value::String(options));
            }
            builder.execute(sink, "add-child-chooser", &data)
        } else {
            sink.push_str(&format!("<ul class=\"add-child\">{}</ul>", options));
            Ok(())
        }
    }

    async fn run(&self, phase: Phase, builder: &mut dyn Builder, sink: &mut String) -> PipelineBehavior {
        let decision = match self.eligible(builder) {
            Ok(eligible) => self
                .choose(builder, &eligible)
                .map(|chosen| (chosen, eligible)),
            Err(e) => Err(e),
        };

        match decision {
            Ok((Some(template), _)) => self.create(phase, &template, builder, sink).await,
            Ok((None, eligible)) if phase == Phase::Get => {
                match self.render_chooser(builder, &eligible, sink) {
                    Ok(()) => PipelineBehavior::Pass,
                    Err(e) => PipelineBehavior::halt_error(e),
                }
            }
            Ok((None, _)) => PipelineBehavior::halt_error(PipelineError::bad_request(format!(
                "'{}' is required",
                TEMPLATE_PARAM
            ))),
            Err(e) => PipelineBehavior::halt_error(e),
        }
    }
}

#[async_trait]
impl Step for AddChildStep {
    fn kind(&self) -> &str {
        "add-child"
    }

    async fn get(&self, builder: &mut dyn Builder, sink: &mut String) -> PipelineBehavior {
        self.run(Phase::Get, builder, sink).await
    }

    async fn post(&self, builder: &mut dyn Builder, sink: &mut String) -> PipelineBehavior {
        self.run(Phase::Post, builder, sink).await
    }
}
