//! Domain configuration from YAML
//!
//! A domain file describes the markup library, stream templates and the
//! per-kind model templates. Every template carries named actions, and
//! every action is a list of step records:
//!
//! ```yaml
//! actions:
//!   edit:
//!     roles: [author]
//!     steps:
//!       - step: as-modal
//!         steps:
//!           - step: view-fragment
//!             file: edit-form
//! ```

use crate::core::{condition::Condition, markup::MarkupLibrary, record::ObjectKind, schema::Schema};
use anyhow::{Context, Result};
use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

/// Every step kind the compiler recognizes
pub const STEP_KINDS: &[&str] = &[
    "if",
    "with-follower",
    "with-rule",
    "with-folder",
    "with-message",
    "with-circle",
    "with-child",
    "as-modal",
    "as-tooltip",
    "add-child",
    "set-header",
    "trigger-event",
    "set-status",
    "set-content-type",
    "halt",
    "redirect-to",
    "refresh-page",
    "view-fragment",
    "view-page",
    "set-string",
    "set-data",
    "bind-form",
    "save",
    "delete",
    "set-state",
    "sleep",
    "publish-task",
];

/// Role a user may hold relative to an object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Anyone, signed in or not
    Anonymous,
    /// Any signed-in user
    Authenticated,
    /// The domain owner
    Owner,
    /// The user the object belongs to
    Author,
}

/// Presentation of the add-child step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChooserStyle {
    /// Render a list of eligible templates
    #[default]
    Chooser,
    /// Create the best eligible template immediately
    Inline,
}

/// One declarative step record
#[derive(Debug, Clone, PartialEq)]
pub enum StepConfig {
    If {
        condition: String,
        then: Vec<StepConfig>,
        otherwise: Vec<StepConfig>,
    },
    WithObject {
        kind: ObjectKind,
        action: Option<String>,
        steps: Vec<StepConfig>,
    },
    AsModal {
        class: Option<String>,
        background: String,
        steps: Vec<StepConfig>,
    },
    AsTooltip {
        background: String,
        steps: Vec<StepConfig>,
    },
    AddChild {
        style: ChooserStyle,
        templates: Vec<String>,
        action: String,
        steps: Vec<StepConfig>,
    },
    SetHeader {
        name: String,
        value: String,
        direct: bool,
    },
    TriggerEvent {
        event: String,
        value: String,
    },
    SetStatus {
        code: u16,
    },
    SetContentType {
        value: String,
    },
    Halt,
    RedirectTo {
        url: String,
    },
    RefreshPage,
    ViewFragment {
        file: String,
    },
    ViewPage {
        file: String,
    },
    SetString {
        name: String,
        value: String,
    },
    SetData {
        values: BTreeMap<String, String>,
    },
    BindForm {
        fields: Vec<String>,
    },
    Save {
        comment: String,
    },
    Delete {
        comment: String,
        confirm: Option<String>,
    },
    SetState {
        state: String,
    },
    Sleep {
        duration_ms: u64,
    },
    PublishTask {
        task: String,
        arguments: BTreeMap<String, String>,
    },
    /// A kind the compiler does not recognize
    Unknown {
        kind: String,
    },
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct NoParams {}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct IfParams {
    condition: String,
    #[serde(default)]
    then: Vec<StepConfig>,
    #[serde(default, alias = "else")]
    otherwise: Vec<StepConfig>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ScopedParams {
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    steps: Vec<StepConfig>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ModalParams {
    #[serde(default)]
    class: Option<String>,
    #[serde(default = "default_background")]
    background: String,
    #[serde(default)]
    steps: Vec<StepConfig>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TooltipParams {
    #[serde(default = "default_background")]
    background: String,
    #[serde(default)]
    steps: Vec<StepConfig>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct AddChildParams {
    #[serde(default)]
    style: ChooserStyle,
    #[serde(default)]
    templates: Vec<String>,
    #[serde(default = "default_create_action")]
    action: String,
    #[serde(default)]
    steps: Vec<StepConfig>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct HeaderParams {
    name: String,
    value: String,
    #[serde(default)]
    direct: bool,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct EventParams {
    event: String,
    #[serde(default)]
    value: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct StatusParams {
    code: u16,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ValueParams {
    value: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct UrlParams {
    url: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct FileParams {
    file: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct NamedValueParams {
    name: String,
    value: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ValuesParams {
    values: BTreeMap<String, String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct FieldsParams {
    #[serde(default)]
    fields: Vec<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CommentParams {
    #[serde(default)]
    comment: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct DeleteParams {
    #[serde(default)]
    comment: String,
    #[serde(default)]
    confirm: Option<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct StateParams {
    state: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SleepParams {
    duration_ms: u64,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TaskParams {
    task: String,
    #[serde(default)]
    arguments: BTreeMap<String, String>,
}

fn default_background() -> String {
    "view".to_string()
}

fn default_create_action() -> String {
    "create".to_string()
}

fn default_action() -> String {
    "view".to_string()
}

fn params<T: DeserializeOwned>(kind: &str, params: Value) -> Result<T> {
    serde_yaml::from_value(params).with_context(|| format!("invalid parameters for '{}' step", kind))
}

impl StepConfig {
    /// Parse a step record. Unrecognized kinds are kept as `Unknown`
    /// so they fail loudly when executed rather than at load time.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Mapping(mut map) = value else {
            anyhow::bail!("step record must be a mapping");
        };

        let kind = match map.remove("step") {
            Some(Value::String(kind)) => kind,
            Some(other) => anyhow::bail!("step kind must be a string, got {:?}", other),
            None => anyhow::bail!("step record is missing its 'step' kind"),
        };
        let rest = Value::Mapping(map);

        let config = match kind.as_str() {
            "if" => {
                let p: IfParams = params(&kind, rest)?;
                StepConfig::If {
                    condition: p.condition,
                    then: p.then,
                    otherwise: p.otherwise,
                }
            }
            "with-follower" | "with-rule" | "with-folder" | "with-message" | "with-circle"
            | "with-child" => {
                let p: ScopedParams = params(&kind, rest)?;
                let object_kind = match kind.as_str() {
                    "with-follower" => ObjectKind::Follower,
                    "with-rule" => ObjectKind::Rule,
                    "with-folder" => ObjectKind::Folder,
                    "with-message" => ObjectKind::Message,
                    "with-circle" => ObjectKind::Circle,
                    _ => ObjectKind::Stream,
                };
                StepConfig::WithObject {
                    kind: object_kind,
                    action: p.action,
                    steps: p.steps,
                }
            }
            "as-modal" => {
                let p: ModalParams = params(&kind, rest)?;
                StepConfig::AsModal {
                    class: p.class,
                    background: p.background,
                    steps: p.steps,
                }
            }
            "as-tooltip" => {
                let p: TooltipParams = params(&kind, rest)?;
                StepConfig::AsTooltip {
                    background: p.background,
                    steps: p.steps,
                }
            }
            "add-child" => {
                let p: AddChildParams = params(&kind, rest)?;
                StepConfig::AddChild {
                    style: p.style,
                    templates: p.templates,
                    action: p.action,
                    steps: p.steps,
                }
            }
            "set-header" => {
                let p: HeaderParams = params(&kind, rest)?;
                StepConfig::SetHeader {
                    name: p.name,
                    value: p.value,
                    direct: p.direct,
                }
            }
            "trigger-event" => {
                let p: EventParams = params(&kind, rest)?;
                StepConfig::TriggerEvent {
                    event: p.event,
                    value: p.value,
                }
            }
            "set-status" => {
                let p: StatusParams = params(&kind, rest)?;
                StepConfig::SetStatus { code: p.code }
            }
            "set-content-type" => {
                let p: ValueParams = params(&kind, rest)?;
                StepConfig::SetContentType { value: p.value }
            }
            "halt" => {
                let _: NoParams = params(&kind, rest)?;
                StepConfig::Halt
            }
            "redirect-to" => {
                let p: UrlParams = params(&kind, rest)?;
                StepConfig::RedirectTo { url: p.url }
            }
            "refresh-page" => {
                let _: NoParams = params(&kind, rest)?;
                StepConfig::RefreshPage
            }
            "view-fragment" => {
                let p: FileParams = params(&kind, rest)?;
                StepConfig::ViewFragment { file: p.file }
            }
            "view-page" => {
                let p: FileParams = params(&kind, rest)?;
                StepConfig::ViewPage { file: p.file }
            }
            "set-string" => {
                let p: NamedValueParams = params(&kind, rest)?;
                StepConfig::SetString {
                    name: p.name,
                    value: p.value,
                }
            }
            "set-data" => {
                let p: ValuesParams = params(&kind, rest)?;
                StepConfig::SetData { values: p.values }
            }
            "bind-form" => {
                let p: FieldsParams = params(&kind, rest)?;
                StepConfig::BindForm { fields: p.fields }
            }
            "save" => {
                let p: CommentParams = params(&kind, rest)?;
                StepConfig::Save { comment: p.comment }
            }
            "delete" => {
                let p: DeleteParams = params(&kind, rest)?;
                StepConfig::Delete {
                    comment: p.comment,
                    confirm: p.confirm,
                }
            }
            "set-state" => {
                let p: StateParams = params(&kind, rest)?;
                StepConfig::SetState { state: p.state }
            }
            "sleep" => {
                let p: SleepParams = params(&kind, rest)?;
                StepConfig::Sleep {
                    duration_ms: p.duration_ms,
                }
            }
            "publish-task" => {
                let p: TaskParams = params(&kind, rest)?;
                StepConfig::PublishTask {
                    task: p.task,
                    arguments: p.arguments,
                }
            }
            _ => StepConfig::Unknown { kind },
        };

        Ok(config)
    }

    /// The configured kind name
    pub fn kind(&self) -> &str {
        match self {
            StepConfig::If { .. } => "if",
            StepConfig::WithObject { kind, .. } => scoped_step_kind(*kind),
            StepConfig::AsModal { .. } => "as-modal",
            StepConfig::AsTooltip { .. } => "as-tooltip",
            StepConfig::AddChild { .. } => "add-child",
            StepConfig::SetHeader { .. } => "set-header",
            StepConfig::TriggerEvent { .. } => "trigger-event",
            StepConfig::SetStatus { .. } => "set-status",
            StepConfig::SetContentType { .. } => "set-content-type",
            StepConfig::Halt => "halt",
            StepConfig::RedirectTo { .. } => "redirect-to",
            StepConfig::RefreshPage => "refresh-page",
            StepConfig::ViewFragment { .. } => "view-fragment",
            StepConfig::ViewPage { .. } => "view-page",
            StepConfig::SetString { .. } => "set-string",
            StepConfig::SetData { .. } => "set-data",
            StepConfig::BindForm { .. } => "bind-form",
            StepConfig::Save { .. } => "save",
            StepConfig::Delete { .. } => "delete",
            StepConfig::SetState { .. } => "set-state",
            StepConfig::Sleep { .. } => "sleep",
            StepConfig::PublishTask { .. } => "publish-task",
            StepConfig::Unknown { kind } => kind,
        }
    }

    /// Nested step lists carried by control-flow steps
    pub fn children(&self) -> Vec<&[StepConfig]> {
        match self {
            StepConfig::If {
                then, otherwise, ..
            } => vec![then.as_slice(), otherwise.as_slice()],
            StepConfig::WithObject { steps, .. }
            | StepConfig::AsModal { steps, .. }
            | StepConfig::AsTooltip { steps, .. }
            | StepConfig::AddChild { steps, .. } => vec![steps.as_slice()],
            _ => Vec::new(),
        }
    }
}

/// Kind name of the scoped step that binds objects of `kind`
pub fn scoped_step_kind(kind: ObjectKind) -> &'static str {
    match kind {
        ObjectKind::Follower => "with-follower",
        ObjectKind::Rule => "with-rule",
        ObjectKind::Folder => "with-folder",
        ObjectKind::Message => "with-message",
        ObjectKind::Circle => "with-circle",
        ObjectKind::Stream | ObjectKind::User => "with-child",
    }
}

impl<'de> Deserialize<'de> for StepConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        StepConfig::from_value(value).map_err(|e| serde::de::Error::custom(format!("{:#}", e)))
    }
}

/// Visit every step record, depth first
pub fn walk_steps<'a>(steps: &'a [StepConfig], visit: &mut dyn FnMut(&'a StepConfig)) {
    for step in steps {
        visit(step);
        for children in step.children() {
            walk_steps(children, visit);
        }
    }
}

/// Background actions a full navigation of `steps` renders on the same
/// object. Steps under `with-X` and `add-child` run on other objects.
fn backgrounds(steps: &[StepConfig]) -> Vec<&str> {
    let mut found = Vec::new();
    for step in steps {
        match step {
            StepConfig::AsModal { background, steps, .. }
            | StepConfig::AsTooltip { background, steps } => {
                found.push(background.as_str());
                found.extend(backgrounds(steps));
            }
            StepConfig::If { then, otherwise, .. } => {
                found.extend(backgrounds(then));
                found.extend(backgrounds(otherwise));
            }
            _ => {}
        }
    }
    found
}

/// Reject actions whose backgrounds lead back to themselves
///
/// A background naming its own action is left to the step, which refuses
/// it when run.
fn check_background_cycles(owner: &str, actions: &BTreeMap<String, ActionConfig>) -> Result<()> {
    let mut visited = HashSet::new();
    let mut recursion_stack = HashSet::new();

    for id in actions.keys() {
        if !visited.contains(id.as_str()) {
            dfs_backgrounds(owner, id, actions, &mut visited, &mut recursion_stack)?;
        }
    }
    Ok(())
}

fn dfs_backgrounds<'a>(
    owner: &str,
    action_id: &'a str,
    actions: &'a BTreeMap<String, ActionConfig>,
    visited: &mut HashSet<&'a str>,
    recursion_stack: &mut HashSet<&'a str>,
) -> Result<()> {
    visited.insert(action_id);
    recursion_stack.insert(action_id);

    if let Some(action) = actions.get(action_id) {
        for background in backgrounds(&action.steps) {
            if background == action_id {
                continue;
            }
            if recursion_stack.contains(background) {
                anyhow::bail!(
                    "{} action '{}': background cycle through '{}'",
                    owner,
                    action_id,
                    background
                );
            }
            if !visited.contains(background) {
                dfs_backgrounds(owner, background, actions, visited, recursion_stack)?;
            }
        }
    }

    recursion_stack.remove(action_id);
    Ok(())
}

/// Count every step record including nested ones
pub fn count_steps(steps: &[StepConfig]) -> usize {
    let mut count = 0;
    walk_steps(steps, &mut |_| count += 1);
    count
}

/// Named action: who may run it and what it does
#[derive(Debug, Clone, Deserialize)]
pub struct ActionConfig {
    /// Roles allowed to run the action (the domain owner always may)
    #[serde(default)]
    pub roles: Vec<Role>,

    #[serde(default)]
    pub steps: Vec<StepConfig>,
}

/// Stream template configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateConfig {
    pub id: String,

    /// Role used for container matching (defaults to the id)
    #[serde(default)]
    pub role: Option<String>,

    #[serde(default)]
    pub label: String,

    #[serde(default)]
    pub description: String,

    /// Roles of templates this template may contain, in preference order
    #[serde(default)]
    pub containers: Vec<String>,

    /// Allowed lifecycle states (empty = any)
    #[serde(default)]
    pub states: Vec<String>,

    #[serde(default = "default_action")]
    pub default_action: String,

    #[serde(default)]
    pub schema: Option<Schema>,

    #[serde(default)]
    pub actions: BTreeMap<String, ActionConfig>,
}

/// Model template for a non-stream object kind
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub schema: Schema,

    #[serde(default = "default_action")]
    pub default_action: String,

    #[serde(default)]
    pub actions: BTreeMap<String, ActionConfig>,
}

/// Top-level domain configuration loaded from YAML
#[derive(Debug, Clone, Deserialize)]
pub struct DomainConfig {
    #[serde(default)]
    pub name: Option<String>,

    /// Markup library sources (name -> source)
    #[serde(default)]
    pub markup: HashMap<String, String>,

    #[serde(default)]
    pub templates: Vec<TemplateConfig>,

    #[serde(default)]
    pub models: BTreeMap<ObjectKind, ModelConfig>,
}

impl DomainConfig {
    /// Load domain configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_yaml(&content)
    }

    /// Parse and validate domain configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: DomainConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Every action in the domain as (owner label, action id, action)
    pub fn actions(&self) -> Vec<(String, &str, &ActionConfig)> {
        let mut actions = Vec::new();
        for template in &self.templates {
            for (id, action) in &template.actions {
                actions.push((format!("template '{}'", template.id), id.as_str(), action));
            }
        }
        for (kind, model) in &self.models {
            for (id, action) in &model.actions {
                actions.push((format!("model '{}'", kind), id.as_str(), action));
            }
        }
        actions
    }

    /// Validate the domain configuration
    pub fn validate(&self) -> Result<()> {
        let library = MarkupLibrary::from_sources(&self.markup)?;

        let mut seen_ids = HashSet::new();
        for template in &self.templates {
            if template.id.is_empty() {
                anyhow::bail!("Template with empty id");
            }
            if !seen_ids.insert(template.id.as_str()) {
                anyhow::bail!("Duplicate template ID: {}", template.id);
            }
            if !template.actions.contains_key(&template.default_action) {
                anyhow::bail!(
                    "Template '{}' default action '{}' is not defined",
                    template.id,
                    template.default_action
                );
            }
        }

        for (kind, model) in &self.models {
            if *kind == ObjectKind::Stream {
                anyhow::bail!("Streams are configured under 'templates', not 'models'");
            }
            if !model.actions.contains_key(&model.default_action) {
                anyhow::bail!(
                    "Model '{}' default action '{}' is not defined",
                    kind,
                    model.default_action
                );
            }
        }

        for (owner, action_id, action) in self.actions() {
            let mut problem: Option<String> = None;
            walk_steps(&action.steps, &mut |step| {
                if problem.is_some() {
                    return;
                }
                problem = self.check_step(step, &library, &seen_ids);
            });

            if let Some(problem) = problem {
                anyhow::bail!("{} action '{}': {}", owner, action_id, problem);
            }
        }

        for template in &self.templates {
            check_background_cycles(&format!("template '{}'", template.id), &template.actions)?;
        }
        for (kind, model) in &self.models {
            check_background_cycles(&format!("model '{}'", kind), &model.actions)?;
        }

        Ok(())
    }

    fn check_step(
        &self,
        step: &StepConfig,
        library: &MarkupLibrary,
        template_ids: &HashSet<&str>,
    ) -> Option<String> {
        use crate::core::markup::MarkupEngine;

        match step {
            StepConfig::If { condition, .. } => Condition::compile(condition)
                .err()
                .map(|e| format!("invalid condition '{}': {}", condition, e)),
            StepConfig::ViewFragment { file } | StepConfig::ViewPage { file }
                if !library.contains(file) =>
            {
                Some(format!("markup '{}' is not defined", file))
            }
            StepConfig::Delete {
                confirm: Some(file), ..
            } if !library.contains(file) => Some(format!("markup '{}' is not defined", file)),
            StepConfig::AddChild { templates, .. } => templates
                .iter()
                .find(|id| !template_ids.contains(id.as_str()))
                .map(|id| format!("add-child references unknown template '{}'", id)),
            StepConfig::SetStatus { code } if !(100..=599).contains(code) => {
                Some(format!("status code {} is out of range", code))
            }
            _ => None,
        }
    }

    /// Step kinds that will compile to the error step, as (location, kind)
    pub fn unknown_steps(&self) -> Vec<(String, String)> {
        let mut unknown = Vec::new();
        for (owner, action_id, action) in self.actions() {
            walk_steps(&action.steps, &mut |step| {
                if let StepConfig::Unknown { kind } = step {
                    unknown.push((format!("{} action '{}'", owner, action_id), kind.clone()));
                }
            });
        }
        unknown
    }
}
