//! Step compiler and the built-in step kinds
//!
//! [`compile`] is a closed mapping from [`StepConfig`] to a boxed [`Step`].
//! Anything it cannot turn into a working step becomes an [`ErrorStep`],
//! which halts with a diagnostic the first time it runs.

pub mod control;
pub mod data;
pub mod response;

pub use control::{AddChildStep, Envelope, IfStep, ModalStep, WithObjectStep};
pub use data::{
    BindFormStep, DeleteStep, PublishTaskStep, SaveStep, SetDataStep, SetStateStep, SetStringStep,
    SleepStep, ViewStep,
};
pub use response::{
    HaltStep, RedirectStep, RefreshStep, SetContentTypeStep, SetHeaderStep, SetStatusStep,
    TriggerEventStep,
};

use crate::builder::Builder;
use crate::core::{
    condition::Condition,
    config::StepConfig,
    error::PipelineError,
    markup::Markup,
    pipeline::Pipeline,
    result::PipelineBehavior,
    step::Step,
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{error, warn};

/// Compile one step record
pub fn compile(config: &StepConfig) -> Box<dyn Step> {
    try_compile(config).unwrap_or_else(|e| {
        warn!(step = config.kind(), "Step failed to compile: {}", e);
        Box::new(ErrorStep::invalid(config.kind(), e.to_string()))
    })
}

fn try_compile(config: &StepConfig) -> Result<Box<dyn Step>, PipelineError> {
    let step: Box<dyn Step> = match config {
        StepConfig::If {
            condition,
            then,
            otherwise,
        } => Box::new(IfStep::new(
            Condition::compile(condition)?,
            Pipeline::compile(then),
            Pipeline::compile(otherwise),
        )),
        StepConfig::WithObject {
            kind,
            action,
            steps,
        } => Box::new(WithObjectStep::new(
            *kind,
            action.clone(),
            Pipeline::compile(steps),
        )),
        StepConfig::AsModal {
            class,
            background,
            steps,
        } => Box::new(ModalStep::new(
            Envelope::Modal {
                class: class.clone(),
                background: background.clone(),
            },
            Pipeline::compile(steps),
        )),
        StepConfig::AsTooltip { background, steps } => Box::new(ModalStep::new(
            Envelope::Tooltip {
                background: background.clone(),
            },
            Pipeline::compile(steps),
        )),
        StepConfig::AddChild {
            style,
            templates,
            action,
            steps,
        } => Box::new(AddChildStep::new(
            *style,
            templates.clone(),
            action.clone(),
            Pipeline::compile(steps),
        )),
        StepConfig::SetHeader {
            name,
            value,
            direct,
        } => Box::new(SetHeaderStep::new(name.clone(), Markup::compile(value)?, *direct)),
        StepConfig::TriggerEvent { event, value } => {
            Box::new(TriggerEventStep::new(event.clone(), Markup::compile(value)?))
        }
        StepConfig::SetStatus { code } => Box::new(SetStatusStep::new(*code)),
        StepConfig::SetContentType { value } => Box::new(SetContentTypeStep::new(value.clone())),
        StepConfig::Halt => Box::new(HaltStep),
        StepConfig::RedirectTo { url } => Box::new(RedirectStep::new(Markup::compile(url)?)),
        StepConfig::RefreshPage => Box::new(RefreshStep),
        StepConfig::ViewFragment { file } => Box::new(ViewStep::fragment(file.clone())),
        StepConfig::ViewPage { file } => Box::new(ViewStep::page(file.clone())),
        StepConfig::SetString { name, value } => {
            Box::new(SetStringStep::new(name.clone(), Markup::compile(value)?))
        }
        StepConfig::SetData { values } => Box::new(SetDataStep::new(compile_values(values)?)),
        StepConfig::BindForm { fields } => Box::new(BindFormStep::new(fields.clone())),
        StepConfig::Save { comment } => Box::new(SaveStep::new(comment.clone())),
        StepConfig::Delete { comment, confirm } => {
            Box::new(DeleteStep::new(comment.clone(), confirm.clone()))
        }
        StepConfig::SetState { state } => Box::new(SetStateStep::new(state.clone())),
        StepConfig::Sleep { duration_ms } => {
            Box::new(SleepStep::new(Duration::from_millis(*duration_ms)))
        }
        StepConfig::PublishTask { task, arguments } => {
            Box::new(PublishTaskStep::new(task.clone(), compile_values(arguments)?))
        }
        StepConfig::Unknown { kind } => {
            warn!(step = %kind, "Unrecognized step kind");
            Box::new(ErrorStep::unknown(kind.clone()))
        }
    };
    Ok(step)
}

fn compile_values(values: &BTreeMap<String, String>) -> Result<Vec<(String, Markup)>, PipelineError> {
    values
        .iter()
        .map(|(name, source)| Ok((name.clone(), Markup::compile(source)?)))
        .collect()
}

/// Render a compiled value against the builder without HTML escaping
pub(crate) fn render_value(markup: &Markup, builder: &dyn Builder) -> String {
    markup.render_plain(&builder.template_data())
}

/// Render every compiled value into a JSON map
pub(crate) fn render_values(
    values: &[(String, Markup)],
    builder: &dyn Builder,
) -> serde_json::Map<String, Value> {
    let data = builder.template_data();
    values
        .iter()
        .map(|(name, markup)| (name.clone(), Value::String(markup.render_plain(&data))))
        .collect()
}

#[derive(Debug, Clone)]
enum Failure {
    Unknown(String),
    Invalid { kind: String, message: String },
}

/// Halts every invocation with a diagnostic
#[derive(Debug, Clone)]
pub struct ErrorStep {
    failure: Failure,
}

impl ErrorStep {
    pub fn unknown(kind: impl Into<String>) -> Self {
        Self {
            failure: Failure::Unknown(kind.into()),
        }
    }

    pub fn invalid(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            failure: Failure::Invalid {
                kind: kind.into(),
                message: message.into(),
            },
        }
    }

    fn fail(&self, builder: &dyn Builder) -> PipelineBehavior {
        let err = match &self.failure {
            Failure::Unknown(kind) => PipelineError::UnknownStep {
                kind: kind.clone(),
                action: builder.action_id().to_string(),
                object_type: builder.object_type(),
                object_id: builder.object_id().to_string(),
            },
            Failure::Invalid { kind, message } => PipelineError::InvalidStep {
                kind: kind.clone(),
                message: message.clone(),
            },
        };
        error!("{}", err);
        PipelineBehavior::halt_error(err)
    }
}

#[async_trait]
impl Step for ErrorStep {
    fn kind(&self) -> &str {
        match &self.failure {
            Failure::Unknown(kind) => kind,
            Failure::Invalid { kind, .. } => kind,
        }
    }

    async fn get(&self, builder: &mut dyn Builder, _sink: &mut String) -> PipelineBehavior {
        self.fail(builder)
    }

    async fn post(&self, builder: &mut dyn Builder, _sink: &mut String) -> PipelineBehavior {
        self.fail(builder)
    }
}
