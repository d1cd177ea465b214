//! Steps that render views and read or write the object

use crate::builder::{models::require_state_setter, Builder};
use crate::core::{markup::Markup, result::PipelineBehavior, step::Step};
use crate::execution::queue::Task;
use crate::steps::{render_value, render_values};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info};

/// Render a named markup template on the read phase
#[derive(Debug)]
pub struct ViewStep {
    file: String,
    full_page: bool,
}

impl ViewStep {
    pub fn fragment(file: String) -> Self {
        Self {
            file,
            full_page: false,
        }
    }

    /// A view that produces a complete document
    pub fn page(file: String) -> Self {
        Self {
            file,
            full_page: true,
        }
    }
}

#[async_trait]
impl Step for ViewStep {
    fn kind(&self) -> &str {
        if self.full_page {
            "view-page"
        } else {
            "view-fragment"
        }
    }

    async fn get(&self, builder: &mut dyn Builder, sink: &mut String) -> PipelineBehavior {
        if let Err(e) = builder.render(sink, &self.file) {
            return PipelineBehavior::halt_error(e);
        }
        if self.full_page {
            PipelineBehavior::proceed().as_full_page()
        } else {
            PipelineBehavior::Pass
        }
    }

    async fn post(&self, _builder: &mut dyn Builder, _sink: &mut String) -> PipelineBehavior {
        PipelineBehavior::Pass
    }
}

/// Store a rendered value in the scratch map
#[derive(Debug)]
pub struct SetStringStep {
    name: String,
    value: Markup,
}

impl SetStringStep {
    pub fn new(name: String, value: Markup) -> Self {
        Self { name, value }
    }

    fn apply(&self, builder: &mut dyn Builder) -> PipelineBehavior {
        let value = render_value(&self.value, builder);
        builder.set_string(&self.name, &value);
        PipelineBehavior::Pass
    }
}

#[async_trait]
impl Step for SetStringStep {
    fn kind(&self) -> &str {
        "set-string"
    }

    async fn get(&self, builder: &mut dyn Builder, _sink: &mut String) -> PipelineBehavior {
        self.apply(builder)
    }

    async fn post(&self, builder: &mut dyn Builder, _sink: &mut String) -> PipelineBehavior {
        self.apply(builder)
    }
}

/// Populate object fields through the schema, in both phases so defaults
/// are in place before a form is bound
#[derive(Debug)]
pub struct SetDataStep {
    values: Vec<(String, Markup)>,
}

impl SetDataStep {
    pub fn new(values: Vec<(String, Markup)>) -> Self {
        Self { values }
    }

    fn apply(&self, builder: &mut dyn Builder) -> PipelineBehavior {
        let schema = builder.schema();
        for (name, value) in render_values(&self.values, builder) {
            let raw = value.as_str().unwrap_or_default().to_string();
            if let Err(e) = schema.set(builder.object_mut(), &name, &raw) {
                return PipelineBehavior::halt_error(e);
            }
        }
        PipelineBehavior::Pass
    }
}

#[async_trait]
impl Step for SetDataStep {
    fn kind(&self) -> &str {
        "set-data"
    }

    async fn get(&self, builder: &mut dyn Builder, _sink: &mut String) -> PipelineBehavior {
        self.apply(builder)
    }

    async fn post(&self, builder: &mut dyn Builder, _sink: &mut String) -> PipelineBehavior {
        self.apply(builder)
    }
}

/// Copy submitted form values onto the object
#[derive(Debug)]
pub struct BindFormStep {
    fields: Vec<String>,
}

impl BindFormStep {
    /// Bind only `fields`, or every schema field when empty
    pub fn new(fields: Vec<String>) -> Self {
        Self { fields }
    }
}

#[async_trait]
impl Step for BindFormStep {
    fn kind(&self) -> &str {
        "bind-form"
    }

    async fn get(&self, _builder: &mut dyn Builder, _sink: &mut String) -> PipelineBehavior {
        PipelineBehavior::Pass
    }

    async fn post(&self, builder: &mut dyn Builder, _sink: &mut String) -> PipelineBehavior {
        let schema = builder.schema();
        let names: Vec<String> = if self.fields.is_empty() {
            schema.field_names().into_iter().map(str::to_string).collect()
        } else {
            self.fields.clone()
        };

        for name in names {
            let Some(raw) = builder.request().form.get(&name).cloned() else {
                continue;
            };
            if let Err(e) = schema.set(builder.object_mut(), &name, &raw) {
                return PipelineBehavior::halt_error(e);
            }
        }
        PipelineBehavior::Pass
    }
}

/// Validate and persist the object
#[derive(Debug)]
pub struct SaveStep {
    comment: String,
}

impl SaveStep {
    pub fn new(comment: String) -> Self {
        Self { comment }
    }
}

#[async_trait]
impl Step for SaveStep {
    fn kind(&self) -> &str {
        "save"
    }

    async fn get(&self, _builder: &mut dyn Builder, _sink: &mut String) -> PipelineBehavior {
        PipelineBehavior::Pass
    }

    async fn post(&self, builder: &mut dyn Builder, _sink: &mut String) -> PipelineBehavior {
        if let Err(e) = builder.schema().validate(builder.object()) {
            return PipelineBehavior::halt_error(e);
        }

        let service = builder.service();
        if let Err(e) = service.save(builder.object_mut(), &self.comment).await {
            return PipelineBehavior::halt_error(e);
        }

        info!(kind = %builder.object_type(), id = builder.object_id(), "Saved");
        PipelineBehavior::Pass
    }
}

/// Confirm on read, delete on write
#[derive(Debug)]
pub struct DeleteStep {
    comment: String,
    confirm: Option<String>,
}

impl DeleteStep {
    pub fn new(comment: String, confirm: Option<String>) -> Self {
        Self { comment, confirm }
    }
}

#[async_trait]
impl Step for DeleteStep {
    fn kind(&self) -> &str {
        "delete"
    }

    async fn get(&self, builder: &mut dyn Builder, sink: &mut String) -> PipelineBehavior {
        match &self.confirm {
            Some(file) => match builder.render(sink, file) {
                Ok(()) => PipelineBehavior::Pass,
                Err(e) => PipelineBehavior::halt_error(e),
            },
            None => PipelineBehavior::Pass,
        }
    }

    async fn post(&self, builder: &mut dyn Builder, _sink: &mut String) -> PipelineBehavior {
        let service = builder.service();
        if let Err(e) = service.delete(builder.object(), &self.comment).await {
            return PipelineBehavior::halt_error(e);
        }

        info!(kind = %builder.object_type(), id = builder.object_id(), "Deleted");
        PipelineBehavior::Pass
    }
}

/// Move the object to another lifecycle state
#[derive(Debug)]
pub struct SetStateStep {
    state: String,
}

impl SetStateStep {
    pub fn new(state: String) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Step for SetStateStep {
    fn kind(&self) -> &str {
        "set-state"
    }

    async fn get(&self, _builder: &mut dyn Builder, _sink: &mut String) -> PipelineBehavior {
        PipelineBehavior::Pass
    }

    async fn post(&self, builder: &mut dyn Builder, _sink: &mut String) -> PipelineBehavior {
        match require_state_setter(builder).and_then(|setter| setter.set_state(&self.state)) {
            Ok(()) => PipelineBehavior::Pass,
            Err(e) => PipelineBehavior::halt_error(e),
        }
    }
}

/// Pause the request; runs to completion even if the client goes away
#[derive(Debug)]
pub struct SleepStep {
    duration: Duration,
}

impl SleepStep {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    async fn pause(&self) -> PipelineBehavior {
        debug!(duration_ms = self.duration.as_millis() as u64, "Sleeping");
        tokio::time::sleep(self.duration).await;
        PipelineBehavior::Pass
    }
}

#[async_trait]
impl Step for SleepStep {
    fn kind(&self) -> &str {
        "sleep"
    }

    async fn get(&self, _builder: &mut dyn Builder, _sink: &mut String) -> PipelineBehavior {
        self.pause().await
    }

    async fn post(&self, _builder: &mut dyn Builder, _sink: &mut String) -> PipelineBehavior {
        self.pause().await
    }
}

/// Hand work to the task queue without waiting for it
#[derive(Debug)]
pub struct PublishTaskStep {
    task: String,
    arguments: Vec<(String, Markup)>,
}

impl PublishTaskStep {
    pub fn new(task: String, arguments: Vec<(String, Markup)>) -> Self {
        Self { task, arguments }
    }
}

#[async_trait]
impl Step for PublishTaskStep {
    fn kind(&self) -> &str {
        "publish-task"
    }

    async fn get(&self, _builder: &mut dyn Builder, _sink: &mut String) -> PipelineBehavior {
        PipelineBehavior::Pass
    }

    async fn post(&self, builder: &mut dyn Builder, _sink: &mut String) -> PipelineBehavior {
        let task = Task::new(self.task.clone(), render_values(&self.arguments, builder));
        match builder.factory().queue().publish(task) {
            Ok(()) => PipelineBehavior::Pass,
            Err(e) => PipelineBehavior::halt_error(e),
        }
    }
}
