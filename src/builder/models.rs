//! Concrete builder for each object kind

use crate::builder::{authorize, Builder, BuilderCore, RequestScope, StateSetter, TemplateHolder};
use crate::core::{
    config::scoped_step_kind,
    error::{Capability, PipelineError},
    record::{ObjectKind, Record},
    template::Template,
};
use std::sync::Arc;
use tracing::debug;

/// States a message may be moved to
pub const MESSAGE_STATES: &[&str] = &["unread", "read", "muted", "archived"];

fn owned_by_user(builder: &dyn Builder) -> bool {
    match (builder.authorization().user_id(), &builder.object().owner_id) {
        (Some(user), Some(owner)) => user == owner,
        _ => false,
    }
}

macro_rules! builder_variant {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        pub struct $name {
            core: BuilderCore,
        }

        impl $name {
            /// Authorize and wrap; fails before any step can run
            pub fn from_core(core: BuilderCore) -> Result<Self, PipelineError> {
                let builder = Self { core };
                authorize(&builder)?;
                Ok(builder)
            }
        }
    };
}

builder_variant!(
    /// A user's profile
    ProfileBuilder
);
builder_variant!(StreamBuilder);
builder_variant!(FolderBuilder);
builder_variant!(MessageBuilder);
builder_variant!(
    /// A follower record; reachable through its secret as well as by the owner
    FollowerBuilder
);
builder_variant!(RuleBuilder);
builder_variant!(CircleBuilder);

impl Builder for ProfileBuilder {
    fn core(&self) -> &BuilderCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut BuilderCore {
        &mut self.core
    }

    fn is_author(&self) -> bool {
        self.authorization().user_id() == Some(self.object_id())
    }
}

impl Builder for StreamBuilder {
    fn core(&self) -> &BuilderCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut BuilderCore {
        &mut self.core
    }

    fn is_author(&self) -> bool {
        owned_by_user(self)
    }

    fn state_setter(&mut self) -> Option<&mut dyn StateSetter> {
        Some(self)
    }

    fn template_holder(&self) -> Option<&dyn TemplateHolder> {
        Some(self)
    }
}

impl StateSetter for StreamBuilder {
    fn set_state(&mut self, state: &str) -> Result<(), PipelineError> {
        if !self.core.model.allows_state(state) {
            return Err(PipelineError::validation(
                "state",
                format!("'{}' is not a state of template '{}'", state, self.core.model.id),
            ));
        }
        self.core.object.state = state.to_string();
        Ok(())
    }
}

impl TemplateHolder for StreamBuilder {
    fn stream_template(&self) -> &Arc<Template> {
        &self.core.model
    }

    fn containable_templates(&self) -> Vec<Arc<Template>> {
        self.factory().registry().containable_by(&self.core.model)
    }
}

impl Builder for FolderBuilder {
    fn core(&self) -> &BuilderCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut BuilderCore {
        &mut self.core
    }

    fn is_author(&self) -> bool {
        owned_by_user(self)
    }
}

impl Builder for MessageBuilder {
    fn core(&self) -> &BuilderCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut BuilderCore {
        &mut self.core
    }

    fn is_author(&self) -> bool {
        owned_by_user(self)
    }

    fn state_setter(&mut self) -> Option<&mut dyn StateSetter> {
        Some(self)
    }
}

impl StateSetter for MessageBuilder {
    fn set_state(&mut self, state: &str) -> Result<(), PipelineError> {
        if !MESSAGE_STATES.contains(&state) {
            return Err(PipelineError::validation(
                "state",
                format!("must be one of: {}", MESSAGE_STATES.join(", ")),
            ));
        }
        self.core.object.state = state.to_string();
        Ok(())
    }
}

impl Builder for FollowerBuilder {
    fn core(&self) -> &BuilderCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut BuilderCore {
        &mut self.core
    }

    fn is_author(&self) -> bool {
        if owned_by_user(self) {
            return true;
        }
        let secret = self.object().field_str("secret");
        !secret.is_empty() && self.request().param("secret") == Some(secret.as_str())
    }
}

impl Builder for RuleBuilder {
    fn core(&self) -> &BuilderCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut BuilderCore {
        &mut self.core
    }

    fn is_author(&self) -> bool {
        owned_by_user(self)
    }
}

impl Builder for CircleBuilder {
    fn core(&self) -> &BuilderCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut BuilderCore {
        &mut self.core
    }

    fn is_author(&self) -> bool {
        owned_by_user(self)
    }
}

/// Build the concrete, authorized builder for a record's kind
pub fn builder_for(
    scope: RequestScope,
    object: Record,
    action_id: &str,
) -> Result<Box<dyn Builder>, PipelineError> {
    debug!(kind = %object.kind, id = %object.id, action = action_id, "Building context");
    builder_from_core(BuilderCore::new(scope, object, action_id)?)
}

/// Build a child bound to `object` that keeps running the parent's
/// template and action
pub fn scoped_builder_for(parent: &dyn Builder, object: Record) -> Result<Box<dyn Builder>, PipelineError> {
    debug!(
        kind = %object.kind,
        id = %object.id,
        action = parent.action_id(),
        template = %parent.template().id,
        "Building scoped context"
    );
    let scope = parent.scope().nested(scoped_step_kind(object.kind))?;
    let core = BuilderCore::with_action(scope, object, parent.template().clone(), parent.action().clone())?;
    builder_from_core(core)
}

fn builder_from_core(core: BuilderCore) -> Result<Box<dyn Builder>, PipelineError> {
    let builder: Box<dyn Builder> = match core.object.kind {
        ObjectKind::User => Box::new(ProfileBuilder::from_core(core)?),
        ObjectKind::Stream => Box::new(StreamBuilder::from_core(core)?),
        ObjectKind::Folder => Box::new(FolderBuilder::from_core(core)?),
        ObjectKind::Message => Box::new(MessageBuilder::from_core(core)?),
        ObjectKind::Follower => Box::new(FollowerBuilder::from_core(core)?),
        ObjectKind::Rule => Box::new(RuleBuilder::from_core(core)?),
        ObjectKind::Circle => Box::new(CircleBuilder::from_core(core)?),
    };
    Ok(builder)
}

/// Require the state capability
pub fn require_state_setter(builder: &mut dyn Builder) -> Result<&mut dyn StateSetter, PipelineError> {
    let context = builder.object_type();
    builder.state_setter().ok_or(PipelineError::Unsupported {
        capability: Capability::SetState,
        context,
    })
}

/// Require the template capability
pub fn require_template_holder(builder: &dyn Builder) -> Result<&dyn TemplateHolder, PipelineError> {
    builder.template_holder().ok_or(PipelineError::Unsupported {
        capability: Capability::Template,
        context: builder.object_type(),
    })
}
