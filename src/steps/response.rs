//! Steps that only shape the response

use crate::builder::Builder;
use crate::core::{markup::Markup, result::PipelineBehavior, step::Step};
use crate::steps::render_value;
use async_trait::async_trait;

/// Header pointing the client at another page
pub const REDIRECT_HEADER: &str = "HX-Redirect";

/// Header asking the client to reload the current page
pub const REFRESH_HEADER: &str = "HX-Refresh";

/// Add a response header, either through the result or straight onto the
/// response handle (which overrides result headers)
#[derive(Debug)]
pub struct SetHeaderStep {
    name: String,
    value: Markup,
    direct: bool,
}

impl SetHeaderStep {
    pub fn new(name: String, value: Markup, direct: bool) -> Self {
        Self { name, value, direct }
    }

    fn apply(&self, builder: &dyn Builder) -> PipelineBehavior {
        let value = render_value(&self.value, builder);
        if self.direct {
            builder.scope().response().set_header(self.name.clone(), value);
            PipelineBehavior::Pass
        } else {
            PipelineBehavior::proceed().with_header(self.name.clone(), value)
        }
    }
}

#[async_trait]
impl Step for SetHeaderStep {
    fn kind(&self) -> &str {
        "set-header"
    }

    async fn get(&self, builder: &mut dyn Builder, _sink: &mut String) -> PipelineBehavior {
        self.apply(builder)
    }

    async fn post(&self, builder: &mut dyn Builder, _sink: &mut String) -> PipelineBehavior {
        self.apply(builder)
    }
}

/// Raise a client-side event
#[derive(Debug)]
pub struct TriggerEventStep {
    event: String,
    value: Markup,
}

impl TriggerEventStep {
    pub fn new(event: String, value: Markup) -> Self {
        Self { event, value }
    }

    fn apply(&self, builder: &dyn Builder) -> PipelineBehavior {
        PipelineBehavior::proceed().with_event(self.event.clone(), render_value(&self.value, builder))
    }
}

#[async_trait]
impl Step for TriggerEventStep {
    fn kind(&self) -> &str {
        "trigger-event"
    }

    async fn get(&self, builder: &mut dyn Builder, _sink: &mut String) -> PipelineBehavior {
        self.apply(builder)
    }

    async fn post(&self, builder: &mut dyn Builder, _sink: &mut String) -> PipelineBehavior {
        self.apply(builder)
    }
}

#[derive(Debug)]
pub struct SetStatusStep {
    code: u16,
}

impl SetStatusStep {
    pub fn new(code: u16) -> Self {
        Self { code }
    }
}

#[async_trait]
impl Step for SetStatusStep {
    fn kind(&self) -> &str {
        "set-status"
    }

    async fn get(&self, _builder: &mut dyn Builder, _sink: &mut String) -> PipelineBehavior {
        PipelineBehavior::proceed().with_status(self.code)
    }

    async fn post(&self, _builder: &mut dyn Builder, _sink: &mut String) -> PipelineBehavior {
        PipelineBehavior::proceed().with_status(self.code)
    }
}

#[derive(Debug)]
pub struct SetContentTypeStep {
    value: String,
}

impl SetContentTypeStep {
    pub fn new(value: String) -> Self {
        Self { value }
    }
}

#[async_trait]
impl Step for SetContentTypeStep {
    fn kind(&self) -> &str {
        "set-content-type"
    }

    async fn get(&self, _builder: &mut dyn Builder, _sink: &mut String) -> PipelineBehavior {
        PipelineBehavior::proceed().with_content_type(self.value.clone())
    }

    async fn post(&self, _builder: &mut dyn Builder, _sink: &mut String) -> PipelineBehavior {
        PipelineBehavior::proceed().with_content_type(self.value.clone())
    }
}

/// Stop the current pipeline
#[derive(Debug)]
pub struct HaltStep;

#[async_trait]
impl Step for HaltStep {
    fn kind(&self) -> &str {
        "halt"
    }

    async fn get(&self, _builder: &mut dyn Builder, _sink: &mut String) -> PipelineBehavior {
        PipelineBehavior::halt()
    }

    async fn post(&self, _builder: &mut dyn Builder, _sink: &mut String) -> PipelineBehavior {
        PipelineBehavior::halt()
    }
}

/// Send the client elsewhere after a successful write
#[derive(Debug)]
pub struct RedirectStep {
    url: Markup,
}

impl RedirectStep {
    pub fn new(url: Markup) -> Self {
        Self { url }
    }
}

#[async_trait]
impl Step for RedirectStep {
    fn kind(&self) -> &str {
        "redirect-to"
    }

    async fn get(&self, _builder: &mut dyn Builder, _sink: &mut String) -> PipelineBehavior {
        PipelineBehavior::Pass
    }

    async fn post(&self, builder: &mut dyn Builder, _sink: &mut String) -> PipelineBehavior {
        PipelineBehavior::halt().with_header(REDIRECT_HEADER, render_value(&self.url, builder))
    }
}

#[derive(Debug)]
pub struct RefreshStep;

#[async_trait]
impl Step for RefreshStep {
    fn kind(&self) -> &str {
        "refresh-page"
    }

    async fn get(&self, _builder: &mut dyn Builder, _sink: &mut String) -> PipelineBehavior {
        PipelineBehavior::Pass
    }

    async fn post(&self, _builder: &mut dyn Builder, _sink: &mut String) -> PipelineBehavior {
        PipelineBehavior::halt().with_header(REFRESH_HEADER, "true")
    }
}
